//! Engine constants shared by the server and any client that renders the arena.
//!
//! These are fixed for every match; nothing here is tunable at runtime.

/// Half-extent of the play volume along x and y. Side walls sit at ±ARENA_HALF_WIDTH.
pub const ARENA_HALF_WIDTH: f64 = 10.0;

/// Distance of each goal (paddle) plane from the origin along z.
pub const GOAL_DISTANCE: f64 = 50.0;

/// Ball radius, also the distance-to-plane band within which contact is detected.
pub const CONTACT_TOLERANCE: f64 = 2.0;

/// |z| at which the ball is tested against a paddle.
pub const GOAL_LINE: f64 = GOAL_DISTANCE - CONTACT_TOLERANCE;

/// Half-size of a paddle's square hit window in x and y.
pub const PADDLE_HALF_SIZE: f64 = 4.0;

/// Offset added before dividing, so a dead-centre return still drifts towards +x/+y.
pub const PADDLE_DEFLECTION_BIAS: f64 = 2.0;

/// Divisor used to turn paddle-relative offset into rebound velocity on x/y.
pub const PADDLE_DEFLECTION_DIVISOR: f64 = 24.0;

/// Distance travelled per tick along the velocity vector.
pub const BALL_TRAVEL_PER_TICK: f64 = 0.4;

/// Substeps per tick.
pub const SUBSTEPS: u32 = 10;

/// Paddle movement per tick for each held direction key.
pub const PADDLE_STEP: f64 = 0.2;

/// Score at which a match ends.
pub const GAME_END_SCORE: u32 = 3;

/// Upper bound on |spin|.
pub const MAX_SPIN: f64 = 0.1;

/// Spin removed along the surface normal on every contact.
pub const SURFACE_SPIN_DRAG: f64 = 0.01;

/// Diagonal of the ball's moment of inertia; its inverse scales paddle torque.
pub const BALL_INERTIA: f64 = 1.6;

/// Number of entrants in a tournament bracket.
pub const TOURNAMENT_PLAYERS: usize = 4;

/// Rounds played in a tournament (two semi-finals and a final).
pub const TOURNAMENT_ROUNDS: u8 = 3;
