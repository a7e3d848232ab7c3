//! Ball and paddle kinematics inside the arena.
//!
//! The arena is a box bounded by four side walls (x = ±10, y = ±10) and two
//! goal planes (z = ±50) on which the paddles ride. Each tick the ball moves
//! `BALL_TRAVEL_PER_TICK` along its velocity, split into `SUBSTEPS` equal
//! substeps so it cannot tunnel through the 2-unit contact band.

use pong_shared::config::{
    ARENA_HALF_WIDTH, BALL_INERTIA, BALL_TRAVEL_PER_TICK, CONTACT_TOLERANCE, GOAL_DISTANCE,
    GOAL_LINE, MAX_SPIN, PADDLE_DEFLECTION_BIAS, PADDLE_DEFLECTION_DIVISOR, PADDLE_HALF_SIZE,
    SUBSTEPS, SURFACE_SPIN_DRAG,
};
use pong_shared::protocol::Side;
use pong_shared::vec3::{self, Plane, Vec3};
use serde::{Deserialize, Serialize};

/// Side walls, tested in this order. The first one in contact wins.
pub const WALLS: [Plane; 4] = [
    Plane::new(Vec3::new(1.0, 0.0, 0.0), ARENA_HALF_WIDTH),
    Plane::new(Vec3::new(-1.0, 0.0, 0.0), ARENA_HALF_WIDTH),
    Plane::new(Vec3::new(0.0, 1.0, 0.0), ARENA_HALF_WIDTH),
    Plane::new(Vec3::new(0.0, -1.0, 0.0), ARENA_HALF_WIDTH),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    pub pos: Vec3,
    /// Direction of travel; its length scales the distance covered per tick.
    pub velocity: Vec3,
    /// Spin vector, |spin| <= MAX_SPIN.
    pub spin: Vec3,
}

impl Ball {
    /// Ball at the centre heading towards the near paddle.
    pub fn kickoff() -> Self {
        Self {
            pos: Vec3::ZERO,
            velocity: Vec3::new(0.0, 0.0, 1.0),
            spin: Vec3::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paddle {
    pub pos: Vec3,
    /// Goal plane the paddle rides on; its normal points into the arena.
    pub plane: Plane,
    pub side: Side,
}

impl Paddle {
    /// Paddle for the given side at its starting position.
    pub fn home(side: Side) -> Self {
        match side {
            Side::Left => Self {
                pos: Vec3::new(0.0, 0.0, GOAL_DISTANCE),
                plane: Plane::new(Vec3::new(0.0, 0.0, -1.0), GOAL_DISTANCE),
                side,
            },
            Side::Right => Self {
                pos: Vec3::new(0.0, 0.0, -GOAL_DISTANCE),
                plane: Plane::new(Vec3::new(0.0, 0.0, 1.0), GOAL_DISTANCE),
                side,
            },
        }
    }

    /// Whether `point` lies inside the paddle's square window in x and y.
    pub fn covers(&self, point: Vec3) -> bool {
        (point.x - self.pos.x).abs() <= PADDLE_HALF_SIZE
            && (point.y - self.pos.y).abs() <= PADDLE_HALF_SIZE
    }
}

/// Everything needed to put the ball and paddles back where they were.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub ball: Ball,
    pub near_paddle: Vec3,
    pub far_paddle: Vec3,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            ball: Ball::kickoff(),
            near_paddle: Paddle::home(Side::Left).pos,
            far_paddle: Paddle::home(Side::Right).pos,
        }
    }
}

/// What happened during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    pub wall_hit: bool,
    /// Side whose paddle returned the ball.
    pub paddle_hit: Option<Side>,
    /// Side whose paddle missed; the opponent scores.
    pub missed: Option<Side>,
}

enum GoalCheck {
    Clear,
    Returned(Side),
    Missed(Side),
}

pub struct PhysicsEngine {
    pub ball: Ball,
    pub near: Paddle,
    pub far: Paddle,
}

impl Default for PhysicsEngine {
    fn default() -> Self {
        Self::from_placement(Placement::default())
    }
}

impl PhysicsEngine {
    pub fn from_placement(placement: Placement) -> Self {
        let mut near = Paddle::home(Side::Left);
        let mut far = Paddle::home(Side::Right);
        near.pos = placement.near_paddle;
        far.pos = placement.far_paddle;
        Self {
            ball: placement.ball,
            near,
            far,
        }
    }

    pub fn placement(&self) -> Placement {
        Placement {
            ball: self.ball,
            near_paddle: self.near.pos,
            far_paddle: self.far.pos,
        }
    }

    pub fn paddle_mut(&mut self, side: Side) -> &mut Paddle {
        match side {
            Side::Left => &mut self.near,
            Side::Right => &mut self.far,
        }
    }

    pub fn reset_ball(&mut self) {
        self.ball = Ball::kickoff();
    }

    /// False once any ball quantity has gone NaN or infinite.
    pub fn is_sound(&self) -> bool {
        self.ball.pos.is_finite() && self.ball.velocity.is_finite() && self.ball.spin.is_finite()
    }

    /// Advance one tick. Substepping stops early on a wall contact or a goal miss.
    pub fn step(&mut self) -> StepReport {
        let fraction = 1.0 / SUBSTEPS as f64;
        let mut report = StepReport::default();
        for _ in 0..SUBSTEPS {
            let wall_hit = self.substep(fraction, &mut report);
            if wall_hit || report.missed.is_some() {
                break;
            }
        }
        report
    }

    /// Move the ball by `fraction` of its per-tick travel, then resolve contacts.
    /// Returns true when a wall was hit during this substep.
    pub fn substep(&mut self, fraction: f64, report: &mut StepReport) -> bool {
        let travel = vec3::scale(self.ball.velocity, BALL_TRAVEL_PER_TICK * fraction);
        self.ball.pos = vec3::add(self.ball.pos, travel);

        let wall_hit = self.collide_walls();
        report.wall_hit |= wall_hit;

        match self.check_goal_planes() {
            GoalCheck::Clear => {}
            GoalCheck::Returned(side) => report.paddle_hit = Some(side),
            GoalCheck::Missed(side) => report.missed = Some(side),
        }
        wall_hit
    }

    fn collide_walls(&mut self) -> bool {
        for wall in WALLS {
            if wall.signed_distance(self.ball.pos).abs() <= CONTACT_TOLERANCE {
                self.touch_plane(&wall);
                self.ball.velocity = vec3::reflect(self.ball.velocity, wall.normal);
                return true;
            }
        }
        false
    }

    fn check_goal_planes(&mut self) -> GoalCheck {
        let paddle = if self.ball.pos.z >= GOAL_LINE {
            self.near
        } else if self.ball.pos.z <= -GOAL_LINE {
            self.far
        } else {
            return GoalCheck::Clear;
        };

        if paddle.covers(self.ball.pos) {
            self.bounce_off_paddle(&paddle);
            GoalCheck::Returned(paddle.side)
        } else {
            GoalCheck::Missed(paddle.side)
        }
    }

    /// Snap the ball to the contact point pushed out by its radius, and bleed
    /// spin along the surface normal.
    fn touch_plane(&mut self, plane: &Plane) {
        let contact = plane.project(self.ball.pos);
        self.ball.pos = vec3::add(contact, vec3::scale(plane.normal, CONTACT_TOLERANCE));
        let drag = vec3::scale(plane.normal, SURFACE_SPIN_DRAG);
        self.ball.spin = vec3::clamp_length(vec3::sub(self.ball.spin, drag), MAX_SPIN);
    }

    fn bounce_off_paddle(&mut self, paddle: &Paddle) {
        self.touch_plane(&paddle.plane);
        self.ball.velocity = vec3::reflect(self.ball.velocity, paddle.plane.normal);
        self.apply_paddle_torque(paddle.plane.normal);

        // Where the ball meets the paddle steers the rebound.
        self.ball.velocity.x =
            (PADDLE_DEFLECTION_BIAS - (paddle.pos.x - self.ball.pos.x)) / PADDLE_DEFLECTION_DIVISOR;
        self.ball.velocity.y =
            (PADDLE_DEFLECTION_BIAS - (paddle.pos.y - self.ball.pos.y)) / PADDLE_DEFLECTION_DIVISOR;
    }

    /// Linear drag opposing the spin produces a torque about the paddle normal.
    fn apply_paddle_torque(&mut self, normal: Vec3) {
        let force = vec3::scale(self.ball.spin, -1.0);
        let torque = vec3::cross(normal, force);
        let delta = vec3::scale(torque, 1.0 / BALL_INERTIA);
        self.ball.spin = vec3::clamp_length(vec3::add(self.ball.spin, delta), MAX_SPIN);
    }
}
