//! Four-player single-elimination bracket.
//!
//! Round 1 is players 0 vs 1, round 2 is players 2 vs 3, round 3 is the two
//! recorded winners. The machine only tracks who plays whom; scoring stays in
//! `MatchController`.

use pong_shared::config::{TOURNAMENT_PLAYERS, TOURNAMENT_ROUNDS};
use pong_shared::protocol::Side;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TournamentError {
    #[error("tournament needs four players, got {0}")]
    PlayerCount(usize),
    #[error("round {0} is outside the bracket")]
    RoundOutOfRange(u8),
    #[error("round {round} expects {expected} recorded winners, found {found}")]
    HistoryMismatch {
        round: u8,
        expected: usize,
        found: usize,
    },
    #[error("round {closing} was already advanced (current round is {current})")]
    AlreadyAdvanced { closing: u8, current: u8 },
    #[error("tournament is finished")]
    Finished,
}

/// What `advance_round` decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundAdvance {
    /// Another round follows, between these two players (left, right).
    NextRound {
        winner_name: String,
        round: u8,
        players: [String; 2],
    },
    /// The final was won; the bracket is complete.
    Champion { winner_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TournamentStateMachine {
    players: [String; TOURNAMENT_PLAYERS],
    round: u8,
    win_history: Vec<String>,
    champion: Option<String>,
    finished: bool,
}

impl TournamentStateMachine {
    pub fn new(players: [String; TOURNAMENT_PLAYERS]) -> Self {
        Self {
            players,
            round: 1,
            win_history: Vec::new(),
            champion: None,
            finished: false,
        }
    }

    /// Rebuild a bracket from persisted parts, rejecting inconsistent combinations.
    pub fn from_parts(
        players: Vec<String>,
        round: u8,
        win_history: Vec<String>,
    ) -> Result<Self, TournamentError> {
        let count = players.len();
        let players: [String; TOURNAMENT_PLAYERS] = players
            .try_into()
            .map_err(|_| TournamentError::PlayerCount(count))?;
        if !(1..=TOURNAMENT_ROUNDS).contains(&round) {
            return Err(TournamentError::RoundOutOfRange(round));
        }
        let expected = usize::from(round - 1);
        if win_history.len() != expected {
            return Err(TournamentError::HistoryMismatch {
                round,
                expected,
                found: win_history.len(),
            });
        }
        Ok(Self {
            players,
            round,
            win_history,
            champion: None,
            finished: false,
        })
    }

    pub fn round(&self) -> u8 {
        self.round
    }

    pub fn players(&self) -> &[String; TOURNAMENT_PLAYERS] {
        &self.players
    }

    pub fn win_history(&self) -> &[String] {
        &self.win_history
    }

    pub fn champion(&self) -> Option<&str> {
        self.champion.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Names for the current round, left (near paddle) then right.
    pub fn current_pair(&self) -> [String; 2] {
        match self.round {
            1 => [self.players[0].clone(), self.players[1].clone()],
            2 => [self.players[2].clone(), self.players[3].clone()],
            _ => [self.win_history[0].clone(), self.win_history[1].clone()],
        }
    }

    pub fn name_of(&self, side: Side) -> String {
        let [left, right] = self.current_pair();
        match side {
            Side::Left => left,
            Side::Right => right,
        }
    }

    /// Close round `closing` with `winner` taking it. Each round can be closed
    /// exactly once; a repeated or out-of-order call is rejected and changes nothing.
    pub fn advance_round(
        &mut self,
        closing: u8,
        winner: Side,
    ) -> Result<RoundAdvance, TournamentError> {
        if self.finished {
            return Err(TournamentError::Finished);
        }
        if closing != self.round {
            return Err(TournamentError::AlreadyAdvanced {
                closing,
                current: self.round,
            });
        }

        let winner_name = self.name_of(winner);
        if self.round == TOURNAMENT_ROUNDS {
            self.finished = true;
            self.champion = Some(winner_name.clone());
            tracing::info!("Tournament won by {}", winner_name);
            return Ok(RoundAdvance::Champion { winner_name });
        }

        self.win_history.push(winner_name.clone());
        self.round += 1;
        tracing::info!(
            "Round {} won by {}, round {} next",
            closing,
            winner_name,
            self.round
        );
        Ok(RoundAdvance::NextRound {
            winner_name,
            round: self.round,
            players: self.current_pair(),
        })
    }

    /// End the bracket without a champion.
    pub fn abort(&mut self) {
        self.finished = true;
    }
}
