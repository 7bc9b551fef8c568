use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateRoom {
        player_name: String,
    },
    JoinRoom {
        code: RoomCode,
        player_name: String,
    },
    StartGame {
        code: RoomCode,
    },
    SubmitAnswer {
        code: RoomCode,
        answer: String,
    },
    SubmitBets {
        code: RoomCode,
        /// answerId -> stake; unknown ids and non-positive stakes are
        /// ignored at settlement, not rejected here
        bets: HashMap<AnswerId, i64>,
    },
    NextRound {
        code: RoomCode,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Unicast to the creator
    RoomCreated {
        code: RoomCode,
        player: Player,
    },
    /// Unicast to the joiner
    RoomJoined {
        code: RoomCode,
        player: Player,
        #[serde(skip_serializing_if = "Option::is_none")]
        rejoin: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        game_state: Option<GamePhase>,
    },
    RoomUpdate {
        code: RoomCode,
        state: GamePhase,
        round: u32,
        total: u32,
        players: Vec<Player>,
        host_id: PlayerId,
    },
    Error {
        message: String,
    },
    PlayerRejoined {
        player_name: String,
    },
    PlayerDisconnected {
        player_id: PlayerId,
    },
    NewHost {
        host_id: PlayerId,
    },
    RoundStarting {
        round: u32,
        total: u32,
    },
    QuestionReady {
        round: u32,
        total: u32,
        question: String,
        time_limit: u64,
    },
    AnswerReceived {
        player_id: PlayerId,
        count: usize,
    },
    BetReceived {
        player_id: PlayerId,
        count: usize,
    },
    BettingPhase {
        answers: Vec<PublicAnswer>,
        players: Vec<Player>,
        time_limit: u64,
    },
    RoundResults {
        correct_answer: String,
        hint: String,
        pool: Vec<RevealedAnswer>,
        bets: HashMap<PlayerId, HashMap<AnswerId, i64>>,
        deltas: HashMap<PlayerId, i64>,
        players: Vec<Player>,
        round: u32,
        total: u32,
        is_last_round: bool,
    },
    GameOver {
        ranking: Vec<Player>,
    },
}

/// Pooled answer as exposed during betting (no correctness, no authorship)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicAnswer {
    pub id: AnswerId,
    pub text: String,
}

impl From<&PooledAnswer> for PublicAnswer {
    fn from(a: &PooledAnswer) -> Self {
        Self {
            id: a.id.clone(),
            text: a.text.clone(),
        }
    }
}

/// Pooled answer as revealed in results, with authorship resolved to a name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealedAnswer {
    pub id: AnswerId,
    pub text: String,
    pub is_correct: bool,
    pub author_id: Option<PlayerId>,
    pub author_name: Option<String>,
}

impl ServerMessage {
    /// Public snapshot of a room, broadcast after membership or phase changes
    pub fn room_update(room: &Room, total: u32) -> Self {
        Self::RoomUpdate {
            code: room.code.clone(),
            state: room.phase,
            round: room.round,
            total,
            players: room.players_public(),
            host_id: room.host.clone(),
        }
    }
}
