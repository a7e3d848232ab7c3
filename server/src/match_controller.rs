//! One match between two paddles: input, physics ticks, scoring and the
//! `playing -> ended` transition.

use crate::input::KeyState;
use crate::physics::{PhysicsEngine, Placement, StepReport};
use pong_shared::config::GAME_END_SCORE;
use pong_shared::protocol::{ScoreMsg, Side, StateMsg};
use pong_shared::vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Playing,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchState {
    pub left_score: u32,
    pub right_score: u32,
    pub lifecycle: Lifecycle,
    /// Set when the match ends on score; stays None if it was aborted.
    pub winner: Option<Side>,
}

impl MatchState {
    pub fn score(&self, side: Side) -> u32 {
        match side {
            Side::Left => self.left_score,
            Side::Right => self.right_score,
        }
    }

    fn score_mut(&mut self, side: Side) -> &mut u32 {
        match side {
            Side::Left => &mut self.left_score,
            Side::Right => &mut self.right_score,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.lifecycle == Lifecycle::Ended
    }
}

/// Result of a single `tick()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub step: StepReport,
    /// Side that scored this tick.
    pub scored: Option<Side>,
    /// True only on the tick the match moved to `Ended`.
    pub ended: bool,
}

pub struct MatchController {
    engine: PhysicsEngine,
    state: MatchState,
}

impl Default for MatchController {
    fn default() -> Self {
        Self::resume(0, 0, Placement::default())
    }
}

impl MatchController {
    /// Continue a match from a score line and ball/paddle placement.
    pub fn resume(left_score: u32, right_score: u32, placement: Placement) -> Self {
        Self {
            engine: PhysicsEngine::from_placement(placement),
            state: MatchState {
                left_score,
                right_score,
                lifecycle: Lifecycle::Playing,
                winner: None,
            },
        }
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn engine(&self) -> &PhysicsEngine {
        &self.engine
    }

    pub fn placement(&self) -> Placement {
        self.engine.placement()
    }

    /// Move both paddles one step along each held direction. Positions are not clamped.
    pub fn apply_input(&mut self, keys: &KeyState) {
        if self.state.is_ended() {
            return;
        }
        let near = self.engine.paddle_mut(Side::Left);
        near.pos = vec3::add(near.pos, keys.near_paddle_delta());
        let far = self.engine.paddle_mut(Side::Right);
        far.pos = vec3::add(far.pos, keys.far_paddle_delta());
    }

    /// Advance the simulation by one tick. A no-op once the match has ended.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state.is_ended() {
            return TickOutcome::default();
        }

        let step = self.engine.step();
        let mut outcome = TickOutcome {
            step,
            ..TickOutcome::default()
        };

        if !self.engine.is_sound() {
            tracing::error!(
                "Simulation fault, aborting match: ball={:?}",
                self.engine.ball
            );
            self.state.lifecycle = Lifecycle::Ended;
            self.state.winner = None;
            outcome.ended = true;
            return outcome;
        }

        if let Some(missed) = step.missed {
            let scorer = missed.opponent();
            self.engine.reset_ball();
            let score = self.state.score_mut(scorer);
            *score += 1;
            let reached = *score >= GAME_END_SCORE;
            outcome.scored = Some(scorer);

            if reached {
                self.state.lifecycle = Lifecycle::Ended;
                self.state.winner = Some(scorer);
                outcome.ended = true;
            }
        }

        outcome
    }

    pub fn state_msg(&self) -> StateMsg {
        let ball = &self.engine.ball;
        StateMsg {
            ball_pos: ball.pos.to_array(),
            panel1: self.engine.near.pos.to_array(),
            panel2: self.engine.far.pos.to_array(),
            ball_rot: ball.spin.to_array(),
        }
    }

    pub fn score_msg(&self) -> ScoreMsg {
        ScoreMsg {
            left_score: self.state.left_score,
            right_score: self.state.right_score,
        }
    }
}
