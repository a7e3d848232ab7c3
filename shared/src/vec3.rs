/// 3D vector utilities for the play volume.
/// Math results are plain values; entities keep their own mutable copies.

#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// True when no component is NaN or infinite.
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Shorthand constructor
pub fn vec3(x: f64, y: f64, z: f64) -> Vec3 {
    Vec3::new(x, y, z)
}

/// Dot product
pub fn dot(a: Vec3, b: Vec3) -> f64 {
    a.x * b.x + a.y * b.y + a.z * b.z
}

/// Cross product
pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    Vec3 {
        x: a.y * b.z - a.z * b.y,
        y: a.z * b.x - a.x * b.z,
        z: a.x * b.y - a.y * b.x,
    }
}

/// Vector length
pub fn length(v: Vec3) -> f64 {
    (v.x * v.x + v.y * v.y + v.z * v.z).sqrt()
}

/// Scale vector by scalar
pub fn scale(v: Vec3, s: f64) -> Vec3 {
    Vec3::new(v.x * s, v.y * s, v.z * s)
}

/// Add two vectors
pub fn add(a: Vec3, b: Vec3) -> Vec3 {
    Vec3::new(a.x + b.x, a.y + b.y, a.z + b.z)
}

/// Subtract vectors (a - b)
pub fn sub(a: Vec3, b: Vec3) -> Vec3 {
    Vec3::new(a.x - b.x, a.y - b.y, a.z - b.z)
}

/// Mirror `v` about a plane with unit normal `n`: v - 2(v·n)n.
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    sub(v, scale(n, 2.0 * dot(v, n)))
}

/// Uniformly rescale `v` so its length does not exceed `max`.
pub fn clamp_length(v: Vec3, max: f64) -> Vec3 {
    let len = length(v);
    if len > max {
        scale(v, max / len)
    } else {
        v
    }
}

/// Plane `n·p + d = 0` with unit normal `n`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f64,
}

impl Plane {
    pub const fn new(normal: Vec3, d: f64) -> Self {
        Self { normal, d }
    }

    /// Signed distance from `p`; positive on the side the normal points to.
    pub fn signed_distance(&self, p: Vec3) -> f64 {
        dot(self.normal, p) + self.d
    }

    /// Closest point on the plane to `p`.
    pub fn project(&self, p: Vec3) -> Vec3 {
        sub(p, scale(self.normal, self.signed_distance(p)))
    }
}
