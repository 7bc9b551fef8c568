//! Inbound event dispatch
//!
//! Payloads were already shape-validated by serde at the boundary; room and
//! phase validation happens inside the state methods, which silently ignore
//! out-of-order or duplicate messages.

use crate::protocol::ClientMessage;
use crate::state::AppState;
use std::sync::Arc;

/// Route one client message to the owning state operation. All responses
/// travel through the per-connection channels registered in `AppState`.
pub async fn handle_message(state: &Arc<AppState>, conn_id: &str, msg: ClientMessage) {
    match msg {
        ClientMessage::CreateRoom { player_name } => {
            state.create_room(conn_id, player_name).await;
        }
        ClientMessage::JoinRoom { code, player_name } => {
            state.join_room(conn_id, &code, player_name).await;
        }
        ClientMessage::StartGame { code } => {
            state.start_game(conn_id, &code).await;
        }
        ClientMessage::SubmitAnswer { code, answer } => {
            state.submit_answer(conn_id, &code, answer).await;
        }
        ClientMessage::SubmitBets { code, bets } => {
            state.submit_bets(conn_id, &code, bets).await;
        }
        ClientMessage::NextRound { code } => {
            state.next_round(conn_id, &code).await;
        }
    }
}
