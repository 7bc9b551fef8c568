use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

/// Opaque ID types for type safety
pub type PlayerId = String;
pub type RoomCode = String;
pub type AnswerId = String;

/// Recorded for players who let the answer deadline lapse (or sent a blank)
pub const PLACEHOLDER_ANSWER: &str = "???";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    Lobby,
    Answering,
    Betting,
    Results,
    GameOver,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub starting_chips: u32,
    pub rounds_per_game: u32,
    pub answer_seconds: u64,
    pub bet_seconds: u64,
    pub room_capacity: usize,
    /// Capacity of the process-wide sliding window of recently asked questions
    pub question_history_size: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            starting_chips: 20,
            rounds_per_game: 6,
            answer_seconds: 60,
            bet_seconds: 45,
            room_capacity: 8,
            question_history_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub chips: u32,
    pub connected: bool,
}

/// One generated trivia question, immutable once drawn for a round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub answer: String,
    pub hint: String,
}

/// A candidate answer shown during betting.
///
/// `id` is a synthetic ulid rather than the author's connection id, so bet
/// keys stay valid when an author rejoins under a new connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PooledAnswer {
    pub id: AnswerId,
    pub text: String,
    pub is_correct: bool,
    pub author_id: Option<PlayerId>,
}

/// Which deadline a room's outstanding timer belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineKind {
    Answering,
    Betting,
}

#[derive(Debug)]
pub struct Room {
    pub code: RoomCode,
    pub host: PlayerId,
    pub players: HashMap<PlayerId, Player>,
    pub phase: GamePhase,
    pub round: u32,
    pub current_question: Option<Question>,
    /// playerId -> submitted text, cleared each round
    pub answers: HashMap<PlayerId, String>,
    /// bettorId -> (answerId -> stake), cleared each round
    pub bets: HashMap<PlayerId, HashMap<AnswerId, i64>>,
    /// Built once per round when betting starts; None outside betting/results
    pub answer_pool: Option<Vec<PooledAnswer>>,
    /// Bumped on every phase transition; a fired timer or a late question
    /// response acts only if its captured epoch still matches.
    pub timer_epoch: u64,
    /// At most one outstanding deadline task per room
    pub timer: Option<tokio::task::JoinHandle<()>>,
    /// When the current phase's deadline elapses (for rejoin replay)
    pub phase_deadline: Option<Instant>,
}

impl Room {
    pub fn new(code: RoomCode, creator: Player) -> Self {
        let host = creator.id.clone();
        let mut players = HashMap::new();
        players.insert(creator.id.clone(), creator);
        Self {
            code,
            host,
            players,
            phase: GamePhase::Lobby,
            round: 0,
            current_question: None,
            answers: HashMap::new(),
            bets: HashMap::new(),
            answer_pool: None,
            timer_epoch: 0,
            timer: None,
            phase_deadline: None,
        }
    }

    /// Cancel any outstanding deadline and invalidate in-flight async work
    /// from the previous phase. Called on every phase transition.
    pub fn bump_epoch(&mut self) -> u64 {
        self.timer_epoch += 1;
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
        self.phase_deadline = None;
        self.timer_epoch
    }

    /// Seconds left until the current phase deadline, for rejoin replay
    pub fn remaining_seconds(&self) -> u64 {
        self.phase_deadline
            .map(|d| d.saturating_duration_since(Instant::now()).as_secs())
            .unwrap_or(0)
    }

    pub fn players_public(&self) -> Vec<Player> {
        self.players.values().cloned().collect()
    }
}
