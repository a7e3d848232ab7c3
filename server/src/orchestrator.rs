//! Per-connection game loop.
//!
//! One `ConnectionOrchestrator` runs per client connection as its own task.
//! It owns the held keys, the pause flag, the `MatchController` and, in
//! tournament mode, the bracket. Frames arrive as raw text on an mpsc
//! receiver and leave as `ServerMsg` on an mpsc sender; the transport on the
//! other end of those channels is not its concern.
//!
//! The session is checkpointed when the orchestrator is dropped, which covers
//! a normal return, an aborted task and a panic alike.

use crate::config::ServerConfig;
use crate::input::{KeyState, PendingKeys};
use crate::match_controller::MatchController;
use crate::session::{load_or_fresh, GameMode, SessionBlob, SessionKey, SessionStore};
use crate::tournament::{RoundAdvance, TournamentStateMachine};
use pong_shared::config::TOURNAMENT_PLAYERS;
use pong_shared::protocol::{ClientFrame, ErrorMsg, InitDataMsg, MatchEndMsg, ServerMsg, Side};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Server side of a connection's message channel.
pub struct ConnectionIo {
    pub inbound: mpsc::Receiver<String>,
    pub outbound: mpsc::Sender<ServerMsg>,
}

/// Transport side of a connection's message channel.
pub struct ClientHandle {
    pub to_server: mpsc::Sender<String>,
    pub from_server: mpsc::Receiver<ServerMsg>,
}

/// Create both ends of a connection's message channel.
pub fn connection_channel(capacity: usize) -> (ClientHandle, ConnectionIo) {
    let (to_server, inbound) = mpsc::channel(capacity);
    let (outbound, from_server) = mpsc::channel(capacity);
    (
        ClientHandle {
            to_server,
            from_server,
        },
        ConnectionIo { inbound, outbound },
    )
}

/// The client stopped receiving.
#[derive(Debug)]
struct ClientGone;

struct RestoredBracket {
    roster: Vec<String>,
    tournament: Option<TournamentStateMachine>,
    /// The stored bracket was unusable; play resumes from a fresh round 1.
    restarted: bool,
}

enum Event {
    Frame(String),
    Tick,
}

pub struct ConnectionOrchestrator {
    key: SessionKey,
    store: Arc<dyn SessionStore>,
    tick_period: Duration,
    checkpoint_ttl: Duration,
    /// Names as stored in the session; normal mode plays the first two.
    roster: Vec<String>,
    controller: MatchController,
    tournament: Option<TournamentStateMachine>,
    keys: KeyState,
    pending: PendingKeys,
    paused: bool,
    running: bool,
    /// Nothing left to play; the session has been cleared from the store.
    complete: bool,
}

impl ConnectionOrchestrator {
    /// Load the session for `key` (or start fresh) and build the match from it.
    pub fn connect(key: SessionKey, store: Arc<dyn SessionStore>, config: &ServerConfig) -> Self {
        let blob = load_or_fresh(store.as_ref(), &key);
        let restored = Self::restore_bracket(&key, blob.clone());
        let controller = if restored.restarted {
            MatchController::default()
        } else {
            MatchController::resume(
                blob.left_score,
                blob.right_score,
                blob.placement.unwrap_or_default(),
            )
        };

        let score = controller.score_msg();
        tracing::info!(
            "Session {} connected at {}:{} (round {})",
            key,
            score.left_score,
            score.right_score,
            restored.tournament.as_ref().map_or(1, |t| t.round())
        );

        Self {
            key,
            store,
            tick_period: config.tick_period,
            checkpoint_ttl: config.checkpoint_ttl,
            roster: restored.roster,
            controller,
            tournament: restored.tournament,
            keys: KeyState::default(),
            pending: PendingKeys::default(),
            paused: false,
            running: false,
            complete: false,
        }
    }

    /// Rebuild the bracket from a stored session. An inconsistent bracket
    /// starts over at round 1, keeping the roster if it still names four players.
    fn restore_bracket(key: &SessionKey, blob: SessionBlob) -> RestoredBracket {
        let mut roster = blob.players_name;
        if roster.len() < 2 {
            roster = SessionBlob::fresh(key.mode).players_name;
        }
        if key.mode != GameMode::Tournament {
            return RestoredBracket {
                roster,
                tournament: None,
                restarted: false,
            };
        }
        match TournamentStateMachine::from_parts(roster.clone(), blob.round, blob.win_history) {
            Ok(bracket) => RestoredBracket {
                roster,
                tournament: Some(bracket),
                restarted: false,
            },
            Err(e) => {
                tracing::warn!("Session {} has an invalid bracket, restarting: {}", key, e);
                if roster.len() != TOURNAMENT_PLAYERS {
                    roster = SessionBlob::fresh(key.mode).players_name;
                }
                let tournament =
                    TournamentStateMachine::from_parts(roster.clone(), 1, Vec::new()).ok();
                RestoredBracket {
                    roster,
                    tournament,
                    restarted: true,
                }
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Drive the connection until the client goes away.
    pub async fn run(mut self, mut io: ConnectionIo) {
        if self.drive(&mut io).await.is_err() {
            tracing::debug!("Session {}: client stopped receiving", self.key);
        }
        // Dropping `self` writes the checkpoint.
    }

    async fn drive(&mut self, io: &mut ConnectionIo) -> Result<(), ClientGone> {
        emit(&io.outbound, ServerMsg::InitData(self.init_data())).await?;

        let mut ticker = tokio::time::interval(self.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let event = tokio::select! {
                frame = io.inbound.recv() => match frame {
                    Some(text) => Event::Frame(text),
                    None => return Ok(()),
                },
                _ = ticker.tick(), if self.running => Event::Tick,
            };

            match event {
                Event::Frame(text) => self.handle_frame(&text, &io.outbound).await?,
                Event::Tick => self.on_tick(&io.outbound).await?,
            }
        }
    }

    async fn handle_frame(
        &mut self,
        text: &str,
        out: &mpsc::Sender<ServerMsg>,
    ) -> Result<(), ClientGone> {
        match ClientFrame::parse(text) {
            Ok(ClientFrame::Start) => {
                if self.complete || self.running {
                    tracing::debug!("Session {}: ignoring start", self.key);
                } else {
                    self.running = true;
                    tracing::info!("Session {} started", self.key);
                }
            }
            Ok(ClientFrame::Pause) => self.paused = true,
            Ok(ClientFrame::Resume) => self.paused = false,
            Ok(ClientFrame::Keys(updates)) => self.pending.record(&updates),
            Err(e) => {
                tracing::warn!("Session {}: dropping frame: {}", self.key, e);
                let msg = ServerMsg::Error(ErrorMsg {
                    message: e.to_string(),
                });
                emit(out, msg).await?;
            }
        }
        Ok(())
    }

    async fn on_tick(&mut self, out: &mpsc::Sender<ServerMsg>) -> Result<(), ClientGone> {
        if self.paused || !self.running {
            return Ok(());
        }

        self.pending.drain_into(&mut self.keys);
        self.controller.apply_input(&self.keys);
        let outcome = self.controller.tick();

        // A faulted tick has no position worth sending.
        let faulted = outcome.ended && self.controller.state().winner.is_none();
        let mut frames = Vec::new();
        if !faulted {
            frames.push(ServerMsg::State(self.controller.state_msg()));
        }
        if outcome.scored.is_some() {
            frames.push(ServerMsg::Score(self.controller.score_msg()));
        }
        if outcome.ended {
            frames.extend(self.settle_match());
        }
        for frame in frames {
            emit(out, frame).await?;
        }
        Ok(())
    }

    /// Settle a match that just ended and return the frames announcing it.
    /// All state changes happen here, before anything is sent, so a client
    /// vanishing mid-send still leaves a correct checkpoint behind.
    fn settle_match(&mut self) -> Vec<ServerMsg> {
        let winner = self.controller.state().winner;
        let round = self.round();
        let winner_name = winner.map(|side| self.name_of(side));

        let mut next_round = None;
        match (self.tournament.as_mut(), winner) {
            (Some(bracket), Some(side)) => match bracket.advance_round(round, side) {
                Ok(RoundAdvance::NextRound { players, .. }) => next_round = Some(players),
                Ok(RoundAdvance::Champion { .. }) => {}
                Err(e) => tracing::error!("Session {}: {}", self.key, e),
            },
            (Some(bracket), None) => bracket.abort(),
            (None, _) => {}
        }

        let session_complete = next_round.is_none();
        if session_complete {
            self.close_session();
        } else {
            self.controller = MatchController::default();
        }

        tracing::info!(
            "Session {}: round {} over, winner {:?}",
            self.key,
            round,
            winner_name
        );
        let mut frames = vec![ServerMsg::MatchEnd(MatchEndMsg {
            winner,
            winner_name,
            round,
            session_complete,
        })];
        if let Some(players_name) = next_round {
            frames.push(ServerMsg::InitData(InitDataMsg {
                left_score: 0,
                right_score: 0,
                players_name,
            }));
        }
        frames
    }

    /// Stop ticking and forget the stored session; there is nothing to resume.
    fn close_session(&mut self) {
        self.running = false;
        self.complete = true;
        if let Err(e) = self.store.delete(&self.key) {
            tracing::warn!("Session {}: clearing finished session failed: {}", self.key, e);
        }
    }

    fn round(&self) -> u8 {
        self.tournament.as_ref().map_or(1, |t| t.round())
    }

    fn current_pair(&self) -> [String; 2] {
        match &self.tournament {
            Some(bracket) => bracket.current_pair(),
            None => [self.roster[0].clone(), self.roster[1].clone()],
        }
    }

    fn name_of(&self, side: Side) -> String {
        let [left, right] = self.current_pair();
        match side {
            Side::Left => left,
            Side::Right => right,
        }
    }

    fn init_data(&self) -> InitDataMsg {
        let score = self.controller.score_msg();
        InitDataMsg {
            left_score: score.left_score,
            right_score: score.right_score,
            players_name: self.current_pair(),
        }
    }

    /// Snapshot of everything needed to resume this connection later.
    pub fn snapshot(&self) -> SessionBlob {
        let state = self.controller.state();
        let (players_name, round, win_history) = match &self.tournament {
            Some(bracket) => (
                bracket.players().to_vec(),
                bracket.round(),
                bracket.win_history().to_vec(),
            ),
            None => (self.roster.clone(), 1, Vec::new()),
        };
        SessionBlob {
            game_mode: self.key.mode,
            players_name,
            left_score: state.left_score,
            right_score: state.right_score,
            round,
            win_history,
            placement: Some(self.controller.placement()),
        }
    }

    fn checkpoint(&self) {
        if self.complete || self.controller.state().is_ended() {
            return;
        }
        let blob = self.snapshot();
        match self.store.save(&self.key, &blob, self.checkpoint_ttl) {
            Ok(()) => tracing::info!(
                "Session {} checkpointed at {}:{}",
                self.key,
                blob.left_score,
                blob.right_score
            ),
            Err(e) => tracing::warn!("Session {}: checkpoint failed: {}", self.key, e),
        }
    }
}

impl Drop for ConnectionOrchestrator {
    fn drop(&mut self) {
        self.checkpoint();
    }
}

async fn emit(out: &mpsc::Sender<ServerMsg>, msg: ServerMsg) -> Result<(), ClientGone> {
    out.send(msg).await.map_err(|_| ClientGone)
}
