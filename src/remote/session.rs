use std::{
    collections::HashMap,
    pin::Pin,
    sync::{Arc, Mutex, PoisonError},
    task::{Context, Poll},
};

use chrono::Utc;
use tokio::{sync::mpsc, task::AbortHandle};
use tokio_stream::Stream;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::board::Cell;
use crate::error::{SessionError, StoreError};
use crate::remote::model::{
    GameId, GameStatus, PlayerInfo, RemoteGame, PLAYER1_FIELD, PLAYER2_FIELD, STATUS_FIELD,
};
use crate::remote::store::GameStore;

type Update = Result<RemoteGame, SessionError>;

#[derive(Debug, Default)]
struct Registry {
    next_id: u64,
    active: HashMap<GameId, HashMap<u64, AbortHandle>>,
}

impl Registry {
    fn release(&mut self, game_id: &str, id: u64) {
        if let Some(subscriptions) = self.active.get_mut(game_id) {
            if let Some(handle) = subscriptions.remove(&id) {
                handle.abort();
            }
            if subscriptions.is_empty() {
                self.active.remove(game_id);
            }
        }
    }
}

/// Client side of online games, backed by whatever [`GameStore`] it is given.
/// Clones share their subscriptions.
#[derive(Clone)]
pub struct GameService {
    store: Arc<dyn GameStore>,
    registry: Arc<Mutex<Registry>>,
}

impl GameService {
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self {
            store,
            registry: Arc::default(),
        }
    }

    #[instrument(skip(self))]
    pub async fn create_game(
        &self,
        host_id: &str,
        host_name: &str,
    ) -> Result<RemoteGame, SessionError> {
        let game = RemoteGame::new(
            Uuid::new_v4().to_string(),
            PlayerInfo::new(host_id, host_name),
            Utc::now(),
        );
        self.store
            .create(&game.id, game.index_fields(), game.encode()?)
            .await?;
        info!(game_id = %game.id, "created game");
        Ok(game)
    }

    pub async fn get_game(&self, game_id: &str) -> Result<RemoteGame, SessionError> {
        self.fetch(game_id).await.map(|(_, game)| game)
    }

    /// Games still looking for a second player, newest first, leaving out
    /// the caller's own.
    #[instrument(skip(self))]
    pub async fn list_open_games(
        &self,
        caller_id: &str,
    ) -> Result<Vec<RemoteGame>, SessionError> {
        let docs = self
            .store
            .query_eq(STATUS_FIELD, GameStatus::Waiting.as_str())
            .await?;

        let mut games = docs
            .iter()
            .map(|doc| RemoteGame::decode(&doc.body))
            .collect::<Result<Vec<_>, _>>()?;
        games.retain(|game| game.is_open() && game.player1.id != caller_id);
        games.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!(count = games.len(), "found open games");
        Ok(games)
    }

    /// Every game `player_id` sits in, in any status, newest first.
    #[instrument(skip(self))]
    pub async fn list_my_games(&self, player_id: &str) -> Result<Vec<RemoteGame>, SessionError> {
        let mut docs = self.store.query_eq(PLAYER1_FIELD, player_id).await?;
        docs.extend(self.store.query_eq(PLAYER2_FIELD, player_id).await?);

        let mut games = docs
            .iter()
            .map(|doc| RemoteGame::decode(&doc.body))
            .collect::<Result<Vec<_>, _>>()?;
        games.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        games.dedup_by(|a, b| a.id == b.id);
        Ok(games)
    }

    #[instrument(skip(self, game), fields(game_id = %game.id))]
    pub async fn join_game(
        &self,
        game: &RemoteGame,
        joiner_id: &str,
        joiner_name: &str,
    ) -> Result<RemoteGame, SessionError> {
        let joiner = PlayerInfo::new(joiner_id, joiner_name);
        let (revision, current) = self.fetch(&game.id).await?;
        let next = current.join(joiner.clone())?;

        match self
            .store
            .update(&game.id, revision, next.index_fields(), next.encode()?)
            .await
        {
            Ok(_) => {
                info!("joined game");
                Ok(next)
            }
            Err(conflict @ StoreError::Conflict { .. }) => Err(self
                .explain_conflict(&game.id, conflict, |current| current.join(joiner))
                .await),
            Err(e) => Err(e.into()),
        }
    }

    /// Marks `position` for `player_id` against the authoritative state.
    ///
    /// The write is conditioned on the revision that was validated, so of two
    /// submissions racing from the same state only one commits. The loser
    /// gets the reason its move no longer applies; it is never retried.
    #[instrument(skip(self))]
    pub async fn submit_move(
        &self,
        game_id: &str,
        position: usize,
        player_id: &str,
    ) -> Result<RemoteGame, SessionError> {
        let (revision, game) = self.fetch(game_id).await?;
        let next = game.apply_move(position, player_id, Utc::now())?;

        match self
            .store
            .update(game_id, revision, next.index_fields(), next.encode()?)
            .await
        {
            Ok(doc) => {
                info!(revision = doc.revision, status = ?next.status, "move committed");
                Ok(next)
            }
            Err(conflict @ StoreError::Conflict { .. }) => Err(self
                .explain_conflict(game_id, conflict, |current| {
                    // Losing a race for the same tile reads best as "occupied".
                    if let Some(Cell::HeldBy(_)) = current.board.get(position) {
                        return Err(SessionError::OccupiedCell(position));
                    }
                    current.apply_move(position, player_id, Utc::now())
                })
                .await),
            Err(e) => Err(e.into()),
        }
    }

    /// Starts streaming snapshots of `game_id`: the current one first, then
    /// one per commit. The stream ends on [`unsubscribe`](Self::unsubscribe),
    /// when the [`Subscription`] is dropped, or after a terminal error.
    pub fn subscribe(&self, game_id: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();

        // Held until the entry exists, so a stream that ends at once still
        // finds it to release.
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let id = registry.next_id;
        registry.next_id += 1;
        let task = tokio::spawn(forward(
            Arc::clone(&self.store),
            game_id.to_string(),
            id,
            tx,
            Arc::clone(&self.registry),
        ));
        registry
            .active
            .entry(game_id.to_string())
            .or_default()
            .insert(id, task.abort_handle());
        debug!(game_id, subscription = id, "subscribed");

        Subscription {
            game_id: game_id.to_string(),
            id,
            rx,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Ends every subscription this service holds on `game_id`. Safe to call
    /// any number of times.
    pub fn unsubscribe(&self, game_id: &str) {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(subscriptions) = registry.active.remove(game_id) {
            debug!(game_id, count = subscriptions.len(), "unsubscribed");
            for handle in subscriptions.into_values() {
                handle.abort();
            }
        }
    }

    pub fn subscription_count(&self, game_id: &str) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .active
            .get(game_id)
            .map_or(0, HashMap::len)
    }

    async fn fetch(&self, game_id: &str) -> Result<(u64, RemoteGame), SessionError> {
        let doc = self.store.get(game_id).await?;
        Ok((doc.revision, RemoteGame::decode(&doc.body)?))
    }

    /// Re-reads the game after losing a conditional write and reports why
    /// the attempt no longer applies.
    async fn explain_conflict<F>(
        &self,
        game_id: &str,
        conflict: StoreError,
        check: F,
    ) -> SessionError
    where
        F: FnOnce(&RemoteGame) -> Result<RemoteGame, SessionError>,
    {
        warn!(game_id, "lost a conditional write: {conflict}");
        match self.fetch(game_id).await {
            Ok((_, current)) => match check(&current) {
                Err(reason) => reason,
                Ok(_) => conflict.into(),
            },
            Err(e) => e,
        }
    }
}

/// Pumps store changes into one subscription. Once the stream ends on its
/// own the subscription leaves the registry before `tx` closes.
async fn forward(
    store: Arc<dyn GameStore>,
    game_id: GameId,
    id: u64,
    tx: mpsc::UnboundedSender<Update>,
    registry: Arc<Mutex<Registry>>,
) {
    match store.watch(&game_id).await {
        Ok(mut watch) => {
            while let Some(change) = watch.recv().await {
                let update = change
                    .map_err(SessionError::from)
                    .and_then(|doc| RemoteGame::decode(&doc.body).map_err(SessionError::from));
                let terminal = update.is_err();
                if tx.send(update).is_err() || terminal {
                    break;
                }
            }
        }
        Err(e) => {
            let _ = tx.send(Err(e.into()));
        }
    }

    debug!(game_id = %game_id, subscription = id, "snapshot stream closed");
    registry
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .release(&game_id, id);
    drop(tx);
}

/// A live stream of [`RemoteGame`] snapshots for one game.
///
/// Dropping it releases the underlying watch, so leaving a game through any
/// path (early return, `?`, cancellation) cleans up.
#[derive(Debug)]
pub struct Subscription {
    game_id: GameId,
    id: u64,
    rx: mpsc::UnboundedReceiver<Update>,
    registry: Arc<Mutex<Registry>>,
}

impl Subscription {
    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    /// The next snapshot, or `None` once the stream has ended. Streams are
    /// not restartable: subscribe again for a fresh one.
    pub async fn next(&mut self) -> Option<Update> {
        self.rx.recv().await
    }
}

impl Stream for Subscription {
    type Item = Update;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .release(&self.game_id, self.id);
    }
}
