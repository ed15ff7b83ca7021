//! Human vs. computer play with a cancellable "thinking" delay.

use std::{sync::Arc, time::Duration};

use rand::{rngs::StdRng, SeedableRng};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::debug;

use crate::board::Symbol;
use crate::error::RulesError;
use crate::game::{Game, State};
use crate::opponent::Difficulty;

pub const DEFAULT_THINK_DELAY: Duration = Duration::from_millis(600);

#[derive(Debug, Clone)]
pub struct OfflineConfig {
    pub difficulty: Difficulty,
    pub think_delay: Duration,
    /// The symbol the human plays; the computer takes the other one.
    pub human: Symbol,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::default(),
            think_delay: DEFAULT_THINK_DELAY,
            human: Symbol::X,
        }
    }
}

#[derive(Debug)]
struct PendingMove {
    revision: u64,
    handle: JoinHandle<Option<usize>>,
}

/// Owns an offline [`Game`] and at most one pending computer move.
///
/// Any human move, [`reset`](Self::reset), [`pause`](Self::pause) or drop
/// cancels the pending move. A move that fires anyway after the board
/// changed is discarded by its revision check.
#[derive(Debug)]
pub struct OfflineMatch {
    game: Arc<Mutex<Game>>,
    config: OfflineConfig,
    pending: Option<PendingMove>,
}

impl OfflineMatch {
    pub fn new(config: OfflineConfig) -> Self {
        Self {
            game: Arc::new(Mutex::new(Game::new())),
            config,
            pending: None,
        }
    }

    pub fn config(&self) -> &OfflineConfig {
        &self.config
    }

    pub fn computer(&self) -> Symbol {
        !self.config.human
    }

    pub async fn snapshot(&self) -> Game {
        self.game.lock().await.clone()
    }

    pub fn has_pending_move(&self) -> bool {
        self.pending.is_some()
    }

    /// Starts the match, scheduling the opening move if the computer has it.
    pub async fn start(&mut self) {
        self.schedule_if_computer_turn().await;
    }

    /// Plays the human's move. A pending computer move is discarded either
    /// way; if the computer still has the turn its move is scheduled afresh.
    pub async fn play(&mut self, position: usize) -> Result<State, RulesError> {
        self.cancel_pending();
        let result = self
            .game
            .lock()
            .await
            .submit_move(position, self.config.human);
        self.schedule_if_computer_turn().await;
        result
    }

    /// Waits out the pending computer move. Returns the tile it marked, or
    /// `None` if nothing was pending or the move was cancelled or stale.
    pub async fn computer_move(&mut self) -> Option<usize> {
        let pending = self.pending.take()?;
        match pending.handle.await {
            Ok(position) => position,
            Err(e) => {
                debug!(revision = pending.revision, "computer move did not complete: {e}");
                None
            }
        }
    }

    pub async fn reset(&mut self) {
        self.cancel_pending();
        self.game.lock().await.reset();
        self.schedule_if_computer_turn().await;
    }

    /// Drops the pending computer move, e.g. when the app goes to the background.
    pub fn pause(&mut self) {
        self.cancel_pending();
    }

    /// Reschedules the computer's move after a [`pause`](Self::pause).
    pub async fn resume(&mut self) {
        if self.pending.is_none() {
            self.schedule_if_computer_turn().await;
        }
    }

    pub fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!(revision = pending.revision, "cancelling computer move");
            pending.handle.abort();
        }
    }

    async fn schedule_if_computer_turn(&mut self) {
        let game = self.game.lock().await;
        if game.whos_turn() != Some(self.computer()) {
            return;
        }
        let revision = game.revision();
        drop(game);

        let game = Arc::clone(&self.game);
        let delay = self.config.think_delay;
        let difficulty = self.config.difficulty;
        let me = self.computer();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let mut game = game.lock().await;
            if game.revision() != revision {
                debug!(revision, current = game.revision(), "discarding stale computer move");
                return None;
            }
            let mut rng = StdRng::from_entropy();
            let position = difficulty.choose_move(game.board(), me, &mut rng)?;
            match game.submit_move(position, me) {
                Ok(_) => {
                    debug!(position, %me, "computer moved");
                    Some(position)
                }
                Err(e) => {
                    debug!(position, "computer move rejected: {e}");
                    None
                }
            }
        });

        self.pending = Some(PendingMove { revision, handle });
    }
}

impl Drop for OfflineMatch {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
