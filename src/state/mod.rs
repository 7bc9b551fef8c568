mod presence;
mod registry;
mod round;
pub mod settlement;

use crate::llm::QuestionSource;
use crate::protocol::ServerMessage;
use crate::types::*;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// User-visible room failures, delivered as a unicast error notice.
///
/// Everything else (wrong phase, duplicate submission, non-host privileged
/// call) is silently ignored to tolerate out-of-order client messages.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("Room not found!")]
    RoomNotFound,

    #[error("Game already started! If you were playing, rejoin with the same name.")]
    GameAlreadyStarted,

    #[error("Room is full!")]
    RoomFull,

    #[error("At least 2 players are needed!")]
    InsufficientPlayers,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<RoomCode, Room>>>,
    /// Live outbound channel per connection id
    pub connections: Arc<RwLock<HashMap<PlayerId, mpsc::UnboundedSender<ServerMessage>>>>,
    /// Sliding window of recently asked questions, shared across all rooms
    pub used_questions: Arc<RwLock<VecDeque<String>>>,
    pub question_source: Option<Arc<dyn QuestionSource>>,
    pub config: GameConfig,
}

impl AppState {
    /// State with no question source: every round uses the fallback question
    pub fn new() -> Self {
        Self::new_with_source(None, GameConfig::default())
    }

    pub fn new_with_source(
        question_source: Option<Box<dyn QuestionSource>>,
        config: GameConfig,
    ) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            connections: Arc::new(RwLock::new(HashMap::new())),
            used_questions: Arc::new(RwLock::new(VecDeque::new())),
            question_source: question_source.map(Arc::from),
            config,
        }
    }

    pub async fn register_connection(
        &self,
        conn_id: &str,
        tx: mpsc::UnboundedSender<ServerMessage>,
    ) {
        self.connections
            .write()
            .await
            .insert(conn_id.to_string(), tx);
    }

    pub async fn remove_connection(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Deliver queued messages. Sends to connections that no longer exist
    /// (disconnected players) are silently dropped.
    pub async fn flush(&self, outbox: Outbox) {
        if outbox.messages.is_empty() {
            return;
        }
        let connections = self.connections.read().await;
        for (conn_id, msg) in outbox.messages {
            if let Some(tx) = connections.get(&conn_id) {
                let _ = tx.send(msg);
            }
        }
    }

    /// Record a generated question in the shared history, evicting the oldest
    /// once the window is full.
    pub async fn remember_question(&self, text: &str) {
        let mut used = self.used_questions.write().await;
        used.push_back(text.to_string());
        while used.len() > self.config.question_history_size {
            used.pop_front();
        }
    }

    pub async fn recent_questions(&self) -> Vec<String> {
        self.used_questions.read().await.iter().cloned().collect()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Messages collected while a room lock is held, delivered after release.
///
/// Room broadcasts are expanded to each member id up front so flushing never
/// needs to look at room state again.
#[derive(Default)]
pub struct Outbox {
    messages: Vec<(PlayerId, ServerMessage)>,
}

impl Outbox {
    pub fn unicast(&mut self, to: &str, msg: ServerMessage) {
        self.messages.push((to.to_string(), msg));
    }

    pub fn room(&mut self, room: &Room, msg: ServerMessage) {
        for id in room.players.keys() {
            self.messages.push((id.clone(), msg.clone()));
        }
    }
}
