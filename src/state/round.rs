use super::{settlement, AppState, Outbox, RoomError};
use crate::llm;
use crate::protocol::{PublicAnswer, RevealedAnswer, ServerMessage};
use crate::types::*;
use rand::seq::SliceRandom;
use std::time::{Duration, Instant};

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Build the betting pool for a round: one entry per submitted answer,
/// graded against the canonical answer case/whitespace-insensitively, plus a
/// synthetic unauthored house entry when nobody got it right. Shuffled so
/// position carries no information.
pub fn build_answer_pool(
    answers: &std::collections::HashMap<PlayerId, String>,
    canonical: &str,
) -> Vec<PooledAnswer> {
    let target = normalize(canonical);

    let mut pool: Vec<PooledAnswer> = answers
        .iter()
        .map(|(player_id, text)| PooledAnswer {
            id: ulid::Ulid::new().to_string(),
            text: text.clone(),
            is_correct: normalize(text) == target,
            author_id: Some(player_id.clone()),
        })
        .collect();

    if !pool.iter().any(|a| a.is_correct) {
        pool.push(PooledAnswer {
            id: ulid::Ulid::new().to_string(),
            text: canonical.to_string(),
            is_correct: true,
            author_id: None,
        });
    }

    pool.shuffle(&mut rand::rng());
    pool
}

impl AppState {
    /// Host starts the game from the lobby. Needs at least 2 players.
    pub async fn start_game(&self, conn_id: &str, code: &str) {
        let mut out = Outbox::default();
        let mut proceed = false;
        {
            let rooms = self.rooms.read().await;
            let Some(room) = rooms.get(code) else { return };
            if room.host != conn_id || room.phase != GamePhase::Lobby {
                return;
            }
            if room.players.len() < 2 {
                out.unicast(
                    conn_id,
                    ServerMessage::Error {
                        message: RoomError::InsufficientPlayers.to_string(),
                    },
                );
            } else {
                proceed = true;
            }
        }
        self.flush(out).await;

        if proceed {
            self.start_round(code).await;
        }
    }

    /// Begin a new round: clear round state, announce it, draw a question
    /// (falling back to the built-in one on any generation failure), then
    /// arm the answering deadline.
    pub async fn start_round(&self, code: &str) {
        let total = self.config.rounds_per_game;
        let epoch;
        let round_no;
        let mut out = Outbox::default();
        {
            let mut rooms = self.rooms.write().await;
            let Some(room) = rooms.get_mut(code) else { return };

            epoch = room.bump_epoch();
            room.phase = GamePhase::Answering;
            room.round += 1;
            room.current_question = None;
            room.answers.clear();
            room.bets.clear();
            room.answer_pool = None;
            round_no = room.round;

            tracing::info!("Room {}: starting round {}/{}", code, round_no, total);
            out.room(
                room,
                ServerMessage::RoundStarting {
                    round: round_no,
                    total,
                },
            );
        }
        self.flush(out).await;

        // The only suspension point in the round: the room sits in
        // `answering` with no question while we wait.
        let question = self.draw_question().await;

        let mut out = Outbox::default();
        {
            let mut rooms = self.rooms.write().await;
            let Some(room) = rooms.get_mut(code) else { return };
            // A response landing after the round already advanced is stale
            if room.timer_epoch != epoch
                || room.phase != GamePhase::Answering
                || room.round != round_no
                || room.current_question.is_some()
            {
                tracing::debug!("Room {}: discarding stale question response", code);
                return;
            }

            out.room(
                room,
                ServerMessage::QuestionReady {
                    round: round_no,
                    total,
                    question: question.question.clone(),
                    time_limit: self.config.answer_seconds,
                },
            );
            room.current_question = Some(question);
            self.arm_deadline(room, DeadlineKind::Answering, self.config.answer_seconds);
        }
        self.flush(out).await;
    }

    /// Ask the question source for a fresh question. Any failure, timeout or
    /// malformed response degrades to the deterministic fallback so the
    /// round never stalls.
    async fn draw_question(&self) -> Question {
        if let Some(source) = &self.question_source {
            let recent = self.recent_questions().await;
            match source.next_question(&recent).await {
                Ok(question) => {
                    self.remember_question(&question.question).await;
                    return question;
                }
                Err(e) => {
                    tracing::warn!("Question generation failed ({}), using fallback", e);
                }
            }
        }
        llm::fallback_question()
    }

    /// Record one answer per player per round. Blank text becomes the
    /// placeholder marker. Betting starts early once everyone answered.
    pub async fn submit_answer(&self, conn_id: &str, code: &str, answer: String) {
        let mut out = Outbox::default();
        {
            let mut rooms = self.rooms.write().await;
            let Some(room) = rooms.get_mut(code) else { return };
            if room.phase != GamePhase::Answering || room.current_question.is_none() {
                return; // stale or premature, silently ignored
            }
            if !room.players.contains_key(conn_id) || room.answers.contains_key(conn_id) {
                return;
            }

            let text = answer.trim();
            let text = if text.is_empty() {
                PLACEHOLDER_ANSWER.to_string()
            } else {
                text.to_string()
            };
            room.answers.insert(conn_id.to_string(), text);

            out.room(
                room,
                ServerMessage::AnswerReceived {
                    player_id: conn_id.to_string(),
                    count: room.answers.len(),
                },
            );

            if room.answers.len() == room.players.len() {
                self.start_betting(room, &mut out);
            }
        }
        self.flush(out).await;
    }

    /// Accept one bet set per player per round. Contents are validated only
    /// at settlement. Resolution starts early once everyone submitted.
    pub async fn submit_bets(
        &self,
        conn_id: &str,
        code: &str,
        bets: std::collections::HashMap<AnswerId, i64>,
    ) {
        let mut out = Outbox::default();
        {
            let mut rooms = self.rooms.write().await;
            let Some(room) = rooms.get_mut(code) else { return };
            if room.phase != GamePhase::Betting {
                return;
            }
            if !room.players.contains_key(conn_id) || room.bets.contains_key(conn_id) {
                return;
            }

            room.bets.insert(conn_id.to_string(), bets);
            out.room(
                room,
                ServerMessage::BetReceived {
                    player_id: conn_id.to_string(),
                    count: room.bets.len(),
                },
            );

            if room.bets.len() == room.players.len() {
                self.resolve_round(room, &mut out);
            }
        }
        self.flush(out).await;
    }

    /// Host advances past the results: next round, or game over once the
    /// configured total has been played.
    pub async fn next_round(&self, conn_id: &str, code: &str) {
        let mut out = Outbox::default();
        let mut start_next = false;
        {
            let mut rooms = self.rooms.write().await;
            let Some(room) = rooms.get_mut(code) else { return };
            if room.host != conn_id || room.phase != GamePhase::Results {
                return;
            }

            if room.round >= self.config.rounds_per_game {
                room.bump_epoch();
                room.phase = GamePhase::GameOver;

                let mut ranking = room.players_public();
                ranking.sort_by(|a, b| b.chips.cmp(&a.chips).then_with(|| a.name.cmp(&b.name)));

                tracing::info!("Room {}: game over", code);
                out.room(room, ServerMessage::GameOver { ranking });
            } else {
                start_next = true;
            }
        }
        self.flush(out).await;

        if start_next {
            self.start_round(code).await;
        }
    }

    /// A phase deadline elapsed. Acts only if the captured epoch still
    /// matches, so timers cancelled by an early exit are inert even if the
    /// abort raced with the wakeup.
    pub async fn deadline_fired(&self, code: &str, epoch: u64, kind: DeadlineKind) {
        let mut out = Outbox::default();
        {
            let mut rooms = self.rooms.write().await;
            let Some(room) = rooms.get_mut(code) else { return };
            if room.timer_epoch != epoch {
                return;
            }

            match kind {
                DeadlineKind::Answering => {
                    if room.phase != GamePhase::Answering {
                        return;
                    }
                    let player_ids: Vec<PlayerId> = room.players.keys().cloned().collect();
                    for player_id in player_ids {
                        room.answers
                            .entry(player_id)
                            .or_insert_with(|| PLACEHOLDER_ANSWER.to_string());
                    }
                    self.start_betting(room, &mut out);
                }
                DeadlineKind::Betting => {
                    if room.phase != GamePhase::Betting {
                        return;
                    }
                    let player_ids: Vec<PlayerId> = room.players.keys().cloned().collect();
                    for player_id in player_ids {
                        room.bets.entry(player_id).or_default();
                    }
                    self.resolve_round(room, &mut out);
                }
            }
        }
        self.flush(out).await;
    }

    /// Enter betting: build and publish the pool (correctness hidden) and
    /// arm the bet deadline.
    fn start_betting(&self, room: &mut Room, out: &mut Outbox) {
        room.bump_epoch();
        room.phase = GamePhase::Betting;

        let canonical = room
            .current_question
            .as_ref()
            .map(|q| q.answer.clone())
            .unwrap_or_default();
        let pool = build_answer_pool(&room.answers, &canonical);

        tracing::info!(
            "Room {}: betting opens with {} pooled answers",
            room.code,
            pool.len()
        );
        out.room(
            room,
            ServerMessage::BettingPhase {
                answers: pool.iter().map(PublicAnswer::from).collect(),
                players: room.players_public(),
                time_limit: self.config.bet_seconds,
            },
        );
        room.answer_pool = Some(pool);

        self.arm_deadline(room, DeadlineKind::Betting, self.config.bet_seconds);
    }

    /// Enter results: settle all bets, apply deltas with the zero floor,
    /// and reveal the pool with authorship.
    fn resolve_round(&self, room: &mut Room, out: &mut Outbox) {
        room.bump_epoch();
        room.phase = GamePhase::Results;

        let Some(pool) = room.answer_pool.clone() else {
            tracing::error!("Room {}: resolving without an answer pool", room.code);
            return;
        };
        let Some(question) = room.current_question.clone() else {
            tracing::error!("Room {}: resolving without a question", room.code);
            return;
        };

        let deltas = settlement::settle(&room.bets, &pool, room.players.keys());

        for (player_id, delta) in &deltas {
            if let Some(player) = room.players.get_mut(player_id) {
                // Floor at zero; saturate and cap so a wire-sized delta can
                // never wrap the balance.
                let balance = (player.chips as i64).saturating_add(*delta);
                player.chips = balance.clamp(0, u32::MAX as i64) as u32;
            }
        }

        let revealed: Vec<RevealedAnswer> = pool
            .iter()
            .map(|a| RevealedAnswer {
                id: a.id.clone(),
                text: a.text.clone(),
                is_correct: a.is_correct,
                author_id: a.author_id.clone(),
                author_name: a
                    .author_id
                    .as_ref()
                    .and_then(|id| room.players.get(id))
                    .map(|p| p.name.clone()),
            })
            .collect();

        let is_last_round = room.round >= self.config.rounds_per_game;
        tracing::info!("Room {}: round {} resolved", room.code, room.round);
        out.room(
            room,
            ServerMessage::RoundResults {
                correct_answer: question.answer,
                hint: question.hint,
                pool: revealed,
                bets: room.bets.clone(),
                deltas,
                players: room.players_public(),
                round: room.round,
                total: self.config.rounds_per_game,
                is_last_round,
            },
        );
    }

    /// Arm the single outstanding deadline for the room's current phase.
    /// `bump_epoch` on the next transition cancels it; the epoch check in
    /// `deadline_fired` catches any abort/wakeup race.
    fn arm_deadline(&self, room: &mut Room, kind: DeadlineKind, seconds: u64) {
        let epoch = room.timer_epoch;
        let code = room.code.clone();
        let duration = Duration::from_secs(seconds);
        room.phase_deadline = Some(Instant::now() + duration);

        let state = self.clone();
        room.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            state.deadline_fired(&code, epoch, kind).await;
        }));
    }
}
