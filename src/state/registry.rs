use super::{AppState, Outbox, RoomError};
use crate::protocol::{PublicAnswer, ServerMessage};
use crate::types::*;
use rand::Rng;

/// Safe character set for room codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 5;

/// Generate a random room code (5 characters)
fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

impl AppState {
    /// Create a room with the requesting connection as host
    pub async fn create_room(&self, conn_id: &str, player_name: String) {
        let mut out = Outbox::default();
        {
            let mut rooms = self.rooms.write().await;

            // Codes must not collide with any currently live room
            let code = loop {
                let code = generate_room_code();
                if !rooms.contains_key(&code) {
                    break code;
                }
            };

            let player = Player {
                id: conn_id.to_string(),
                name: player_name.trim().to_string(),
                chips: self.config.starting_chips,
                connected: true,
            };
            let room = Room::new(code.clone(), player.clone());

            tracing::info!("Room {} created by {}", code, player.name);
            out.unicast(
                conn_id,
                ServerMessage::RoomCreated {
                    code: code.clone(),
                    player,
                },
            );
            out.room(&room, ServerMessage::room_update(&room, self.config.rounds_per_game));
            rooms.insert(code, room);
        }
        self.flush(out).await;
    }

    /// Join a room: a rejoin if a disconnected player with the same
    /// normalized name exists (any phase), otherwise a fresh lobby join.
    pub async fn join_room(&self, conn_id: &str, code: &str, player_name: String) {
        let mut out = Outbox::default();
        {
            let mut rooms = self.rooms.write().await;
            match rooms.get_mut(code) {
                None => out.unicast(
                    conn_id,
                    ServerMessage::Error {
                        message: RoomError::RoomNotFound.to_string(),
                    },
                ),
                Some(room) => {
                    let normalized = player_name.trim().to_lowercase();
                    let rejoin_id = room
                        .players
                        .values()
                        .find(|p| !p.connected && p.name.trim().to_lowercase() == normalized)
                        .map(|p| p.id.clone());

                    if let Some(old_id) = rejoin_id {
                        self.rejoin(room, &old_id, conn_id, &mut out);
                    } else if room.phase != GamePhase::Lobby {
                        out.unicast(
                            conn_id,
                            ServerMessage::Error {
                                message: RoomError::GameAlreadyStarted.to_string(),
                            },
                        );
                    } else if room.players.len() >= self.config.room_capacity {
                        out.unicast(
                            conn_id,
                            ServerMessage::Error {
                                message: RoomError::RoomFull.to_string(),
                            },
                        );
                    } else {
                        let player = Player {
                            id: conn_id.to_string(),
                            name: player_name.trim().to_string(),
                            chips: self.config.starting_chips,
                            connected: true,
                        };
                        room.players.insert(conn_id.to_string(), player.clone());

                        tracing::info!("{} joined room {}", player.name, room.code);
                        out.unicast(
                            conn_id,
                            ServerMessage::RoomJoined {
                                code: room.code.clone(),
                                player,
                                rejoin: None,
                                game_state: None,
                            },
                        );
                        out.room(
                            room,
                            ServerMessage::room_update(room, self.config.rounds_per_game),
                        );
                    }
                }
            }
        }
        self.flush(out).await;
    }

    /// Migrate a disconnected player's identity to a new connection and
    /// replay the current round so they can resume mid-game.
    fn rejoin(&self, room: &mut Room, old_id: &str, new_id: &str, out: &mut Outbox) {
        super::presence::migrate_identity(room, old_id, new_id);

        let player = room.players[new_id].clone();
        tracing::info!("{} rejoined room {} as {}", player.name, room.code, new_id);

        out.unicast(
            new_id,
            ServerMessage::RoomJoined {
                code: room.code.clone(),
                player: player.clone(),
                rejoin: Some(true),
                game_state: Some(room.phase),
            },
        );
        out.room(
            room,
            ServerMessage::room_update(room, self.config.rounds_per_game),
        );
        out.room(
            room,
            ServerMessage::PlayerRejoined {
                player_name: player.name,
            },
        );

        // Replay enough of the round that the rejoiner can participate
        // without having seen earlier broadcasts. Nothing extra is needed
        // for lobby, results or gameover.
        match room.phase {
            GamePhase::Answering => {
                if let Some(question) = &room.current_question {
                    out.unicast(
                        new_id,
                        ServerMessage::QuestionReady {
                            round: room.round,
                            total: self.config.rounds_per_game,
                            question: question.question.clone(),
                            time_limit: room.remaining_seconds(),
                        },
                    );
                }
            }
            GamePhase::Betting => {
                if let Some(pool) = &room.answer_pool {
                    out.unicast(
                        new_id,
                        ServerMessage::BettingPhase {
                            answers: pool.iter().map(PublicAnswer::from).collect(),
                            players: room.players_public(),
                            time_limit: room.remaining_seconds(),
                        },
                    );
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room_code(state_rooms: &std::collections::HashMap<RoomCode, Room>) -> RoomCode {
        state_rooms.keys().next().cloned().unwrap()
    }

    #[test]
    fn test_room_code_shape() {
        for _ in 0..100 {
            let code = generate_room_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|c| CODE_CHARS.contains(&c)));
            // Confusable characters never appear
            assert!(!code.contains('O') && !code.contains('I') && !code.contains('L'));
            assert!(!code.contains('0') && !code.contains('1'));
        }
    }

    #[tokio::test]
    async fn test_create_room_seeds_host() {
        let state = AppState::new();
        state.create_room("conn-1", "  Alice  ".to_string()).await;

        let rooms = state.rooms.read().await;
        let room = rooms.values().next().unwrap();
        assert_eq!(room.phase, GamePhase::Lobby);
        assert_eq!(room.host, "conn-1");
        assert_eq!(room.players["conn-1"].name, "Alice");
        assert_eq!(room.players["conn-1"].chips, 20);
        assert_eq!(room.round, 0);
    }

    #[tokio::test]
    async fn test_join_unknown_room_errors() {
        let state = AppState::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        state.register_connection("conn-1", tx).await;

        state.join_room("conn-1", "ZZZZZ", "Bob".to_string()).await;
        assert!(matches!(
            rx.try_recv(),
            Ok(ServerMessage::Error { message }) if message == RoomError::RoomNotFound.to_string()
        ));
    }

    #[tokio::test]
    async fn test_join_after_start_rejected_for_new_name() {
        let state = AppState::new();
        state.create_room("host", "Alice".to_string()).await;
        let code = room_code(&*state.rooms.read().await);
        state.join_room("p2", &code, "Bob".to_string()).await;
        state.start_game("host", &code).await;

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        state.register_connection("late", tx).await;
        state.join_room("late", &code, "Carol".to_string()).await;
        assert!(matches!(
            rx.try_recv(),
            Ok(ServerMessage::Error { message })
                if message == RoomError::GameAlreadyStarted.to_string()
        ));
    }

    #[tokio::test]
    async fn test_room_capacity_enforced() {
        let state = AppState::new();
        state.create_room("host", "P0".to_string()).await;
        let code = room_code(&*state.rooms.read().await);
        for i in 1..8 {
            state
                .join_room(&format!("conn-{}", i), &code, format!("P{}", i))
                .await;
        }
        assert_eq!(state.rooms.read().await[&code].players.len(), 8);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        state.register_connection("conn-8", tx).await;
        state.join_room("conn-8", &code, "P8".to_string()).await;
        assert!(matches!(
            rx.try_recv(),
            Ok(ServerMessage::Error { message }) if message == RoomError::RoomFull.to_string()
        ));
        assert_eq!(state.rooms.read().await[&code].players.len(), 8);
    }

    #[tokio::test]
    async fn test_duplicate_name_while_connected_is_a_fresh_join() {
        // Rejoin only matches *disconnected* players; a connected "Alice"
        // does not block a second Alice from joining the lobby.
        let state = AppState::new();
        state.create_room("host", "Alice".to_string()).await;
        let code = room_code(&*state.rooms.read().await);

        state.join_room("conn-2", &code, "alice".to_string()).await;
        let rooms = state.rooms.read().await;
        assert_eq!(rooms[&code].players.len(), 2);
    }
}
