use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

// === Server -> Client ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type")]
pub enum ServerMsg {
    #[serde(rename = "init_data")]
    InitData(InitDataMsg),
    #[serde(rename = "state")]
    State(StateMsg),
    #[serde(rename = "score")]
    Score(ScoreMsg),
    #[serde(rename = "match_end")]
    MatchEnd(MatchEndMsg),
    #[serde(rename = "error")]
    Error(ErrorMsg),
}

/// Sent on connect and at the start of every tournament round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InitDataMsg {
    pub left_score: u32,
    pub right_score: u32,
    /// Left (near paddle) then right (far paddle).
    pub players_name: [String; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StateMsg {
    pub ball_pos: [f64; 3],
    pub panel1: [f64; 3],
    pub panel2: [f64; 3],
    pub ball_rot: [f64; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ScoreMsg {
    pub left_score: u32,
    pub right_score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MatchEndMsg {
    /// None when the match was aborted by a simulation fault.
    pub winner: Option<Side>,
    pub winner_name: Option<String>,
    pub round: u8,
    /// True once nothing is left to play on this connection.
    pub session_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ErrorMsg {
    pub message: String,
}

/// Left owns the near paddle (z = +50), right owns the far paddle (z = -50).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

// === Client -> Server ===

/// Movement keys in KeyState slot order: W, A, S, D, Up, Left, Down, Right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    W,
    A,
    S,
    D,
    Up,
    Left,
    Down,
    Right,
}

impl KeyCode {
    pub const ALL: [KeyCode; 8] = [
        KeyCode::W,
        KeyCode::A,
        KeyCode::S,
        KeyCode::D,
        KeyCode::Up,
        KeyCode::Left,
        KeyCode::Down,
        KeyCode::Right,
    ];

    /// Map a browser `KeyboardEvent.code` to a key. Unknown codes are not movement keys.
    pub fn from_wire(code: &str) -> Option<KeyCode> {
        match code {
            "KeyW" => Some(KeyCode::W),
            "KeyA" => Some(KeyCode::A),
            "KeyS" => Some(KeyCode::S),
            "KeyD" => Some(KeyCode::D),
            "ArrowUp" => Some(KeyCode::Up),
            "ArrowLeft" => Some(KeyCode::Left),
            "ArrowDown" => Some(KeyCode::Down),
            "ArrowRight" => Some(KeyCode::Right),
            _ => None,
        }
    }

    pub fn slot(self) -> usize {
        self as usize
    }
}

/// One inbound text frame, structurally parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    Start,
    Pause,
    Resume,
    /// Partial key update; keys absent from the frame keep their state.
    Keys(Vec<(KeyCode, bool)>),
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid input frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("key {0} must map to a boolean")]
    NotBoolean(String),
}

impl ClientFrame {
    pub fn parse(text: &str) -> Result<ClientFrame, FrameError> {
        match text {
            "start" => return Ok(ClientFrame::Start),
            "pause" => return Ok(ClientFrame::Pause),
            "resume" => return Ok(ClientFrame::Resume),
            _ => {}
        }

        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text)?;
        let mut keys = Vec::with_capacity(map.len());
        for (code, value) in &map {
            let Some(key) = KeyCode::from_wire(code) else {
                continue;
            };
            let pressed = value
                .as_bool()
                .ok_or_else(|| FrameError::NotBoolean(code.clone()))?;
            keys.push((key, pressed));
        }
        Ok(ClientFrame::Keys(keys))
    }
}
