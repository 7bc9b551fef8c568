use super::{AppState, Outbox};
use crate::protocol::ServerMessage;
use crate::types::*;

/// Atomically migrate a player's identity from an old connection id to a new
/// one: the players map key, the host pointer, any pending answers/bets
/// entries, and authorship inside the current answer pool. Chip balance is
/// untouched.
///
/// Precondition: `old_id` exists in the room and is disconnected.
pub(crate) fn migrate_identity(room: &mut Room, old_id: &str, new_id: &str) {
    if let Some(mut player) = room.players.remove(old_id) {
        player.id = new_id.to_string();
        player.connected = true;
        room.players.insert(new_id.to_string(), player);
    }

    if room.host == old_id {
        room.host = new_id.to_string();
    }

    if let Some(answer) = room.answers.remove(old_id) {
        room.answers.insert(new_id.to_string(), answer);
    }
    if let Some(bets) = room.bets.remove(old_id) {
        room.bets.insert(new_id.to_string(), bets);
    }

    if let Some(pool) = room.answer_pool.as_mut() {
        for answer in pool.iter_mut() {
            if answer.author_id.as_deref() == Some(old_id) {
                answer.author_id = Some(new_id.to_string());
            }
        }
    }
}

impl AppState {
    /// React to a connection going away: mark the player disconnected in
    /// whichever room holds them and migrate the host role if needed.
    pub async fn handle_disconnect(&self, conn_id: &str) {
        self.remove_connection(conn_id).await;

        let mut out = Outbox::default();
        {
            let mut rooms = self.rooms.write().await;
            for room in rooms.values_mut() {
                let Some(player) = room.players.get_mut(conn_id) else {
                    continue;
                };
                player.connected = false;
                let name = player.name.clone();
                tracing::info!("{} disconnected from room {}", name, room.code);
                out.room(
                    room,
                    ServerMessage::PlayerDisconnected {
                        player_id: conn_id.to_string(),
                    },
                );

                // Promote any remaining connected player to host. With zero
                // connected players the room simply has no eligible host
                // until someone rejoins.
                if room.host == conn_id {
                    let next = room
                        .players
                        .values()
                        .find(|p| p.id != conn_id && p.connected)
                        .map(|p| p.id.clone());
                    if let Some(next_host) = next {
                        room.host = next_host.clone();
                        out.room(room, ServerMessage::NewHost { host_id: next_host });
                    }
                }
            }
        }
        self.flush(out).await;
    }
}
