//! The live quiz message channel.
//!
//! Each client holds one WebSocket per `(session, user)`. The socket task
//! reads inbound envelopes strictly in order and forwards outbound frames
//! queued by the [`Dispatcher`](crate::messaging::Dispatcher); all replies
//! and broadcasts flow through the dispatcher registry, never through the
//! raw socket, so the send primitives (and their slow-client handling)
//! apply uniformly.
//!
//! Within one handler the order is always store update, then personal
//! reply, then broadcast: no client ever sees a broadcast referencing
//! state the store has not committed.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::{
    extract::{
        ConnectInfo, Path, Query, State,
        ws::{self, CloseFrame, WebSocket, WebSocketUpgrade, close_code},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};

use trivium::data::{
    ClientEnvelope, JoinOutcome, JoinPayload, LeaderboardPayload, QuizOver, QuizStarted,
    ServerMessage, SessionField, SessionStatus, StartQuizPayload, SubmitAnswerPayload,
};
use trivium::errors::SessionError;
use trivium::id::{SessionCode, UserId};
use trivium::{log, serde_json, tracing};

use crate::messaging::Outbound;
use crate::services::LeaderboardProjection;

/// Handler to upgrade an HTTP connection to the session's WebSocket.
/// The connecting user identifies itself with the `user_id` query
/// parameter; role is determined against the session's host id.
pub async fn upgrade(
    ws: WebSocketUpgrade,
    Path(code): Path<SessionCode>,
    Query(params): Query<HashMap<String, String>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<crate::AppState>>,
) -> Response {
    let Some(user_id) = params.get("user_id").map(|id| UserId::from(id.as_str())) else {
        return (StatusCode::BAD_REQUEST, "user_id query parameter is required").into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(socket, addr, state, code, user_id))
}

/// Handle one WebSocket connection for its entire lifetime.
#[tracing::instrument(name = "websocket", skip(socket, state))]
async fn handle_socket(
    mut socket: WebSocket,
    client_addr: SocketAddr,
    state: Arc<crate::AppState>,
    code: SessionCode,
    user_id: UserId,
) {
    let is_host = state.store.is_host(&code, &user_id).await.unwrap_or(false);
    let mut registration = state.dispatcher.register(&code, &user_id, is_host);
    log::debug!(
        "Connection established (host={is_host}, session connections={})",
        state.dispatcher.connection_count(&code)
    );

    loop {
        tokio::select! {
            // Inbound client messages, processed strictly in order
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(ws::Message::Text(text))) => {
                        dispatch_message(&state, &code, &user_id, is_host, text.as_str()).await;
                    }
                    Some(Ok(ws::Message::Close(_))) => {
                        log::debug!("Connection closed by client");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary, Ping, Pong
                    }
                    Some(Err(e)) => {
                        log::debug!("WebSocket error: {e}");
                        break;
                    }
                    None => break,
                }
            }

            // Outbound frames queued by the dispatcher
            outbound = registration.rx.recv() => {
                match outbound {
                    Some(Outbound::Json(json)) => {
                        if socket.send(ws::Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::GoingAway) => {
                        let _ = socket
                            .send(ws::Message::Close(Some(CloseFrame {
                                code: close_code::AWAY,
                                reason: "Going Away".into(),
                            })))
                            .await;
                        break;
                    }
                    // Channel dropped: this connection was displaced
                    None => break,
                }
            }
        }
    }

    let was_current = state
        .dispatcher
        .unregister(&code, &user_id, registration.conn_id);
    if was_current && !is_host {
        cleanup_participant(state, code, user_id).await;
    }
    log::debug!("Connection ended");
}

/// Parses one inbound envelope and runs the matching handler. Unknown
/// message types are logged and ignored; every error surfaces as a single
/// `error` message and the connection stays open.
pub(crate) async fn dispatch_message(
    state: &Arc<crate::AppState>,
    code: &SessionCode,
    user_id: &UserId,
    is_host: bool,
    text: &str,
) {
    let envelope = match serde_json::from_str::<ClientEnvelope>(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            let error = SessionError::Invalid(format!("Invalid message format: {e}"));
            send_error(state, code, user_id, &error).await;
            return;
        }
    };

    log::debug!("Received message type={} from {user_id}", envelope.kind);

    let result = match envelope.kind.as_str() {
        "join" => handle_join(state, code, user_id, is_host, envelope.payload).await,
        "start_quiz" => handle_start_quiz(state, code, user_id, envelope.payload).await,
        "submit_answer" => handle_submit_answer(state, code, user_id, envelope.payload).await,
        "next_question" => handle_next_question(state, code, user_id).await,
        "request_next_question" => handle_request_next_question(state, code, user_id).await,
        "end_quiz" => handle_end_quiz(state, code, user_id).await,
        "request_leaderboard" => handle_request_leaderboard(state, code, user_id).await,
        other => {
            log::warn!("Unknown message type: {other}");
            return;
        }
    };

    if let Err(error) = result {
        send_error(state, code, user_id, &error).await;
    }
}

async fn send_error(
    state: &Arc<crate::AppState>,
    code: &SessionCode,
    user_id: &UserId,
    error: &SessionError,
) {
    log::warn!("{error}");
    state
        .dispatcher
        .send_personal(code, user_id, &ServerMessage::error(error.to_string()))
        .await;
}

/// Parses a handler payload; a missing payload reads as an empty object so
/// payload-less envelopes still hit the per-field defaults.
fn parse_payload<T: trivium::serde::de::DeserializeOwned>(
    payload: serde_json::Value,
) -> Result<T, SessionError> {
    let payload = if payload.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        payload
    };
    serde_json::from_value(payload)
        .map_err(|e| SessionError::Invalid(format!("Invalid payload: {e}")))
}

async fn require_host(
    state: &crate::AppState,
    code: &SessionCode,
    user_id: &UserId,
    action: &str,
) -> Result<(), SessionError> {
    if state.store.is_host(code, user_id).await? {
        Ok(())
    } else {
        Err(SessionError::Forbidden(format!("Only host can {action}")))
    }
}

async fn handle_join(
    state: &Arc<crate::AppState>,
    code: &SessionCode,
    user_id: &UserId,
    is_host: bool,
    payload: serde_json::Value,
) -> Result<(), SessionError> {
    let payload: JoinPayload = parse_payload(payload)?;
    let session = state.store.get(code).await?;

    if is_host || session.host_id == *user_id {
        // The host observes the lobby without ever entering the roster
        log::info!("Host joined their own session {code}");
        state
            .dispatcher
            .send_personal(code, user_id, &ServerMessage::session_state(&session))
            .await;
        return Ok(());
    }

    let reconnecting = session.participants.contains_key(user_id);
    if session.status != SessionStatus::Waiting && !reconnecting {
        return Err(SessionError::Conflict(
            "Session is already active".to_string(),
        ));
    }

    match state
        .store
        .upsert_participant(code, user_id, &payload.username)
        .await?
    {
        JoinOutcome::Added => log::info!("{} joined session {code}", payload.username),
        JoinOutcome::Reconnected => log::info!("{} reconnected to session {code}", payload.username),
        JoinOutcome::RejectedHost => {
            state
                .dispatcher
                .send_personal(code, user_id, &ServerMessage::session_state(&session))
                .await;
            return Ok(());
        }
        JoinOutcome::RejectedClosed => {
            return Err(SessionError::Conflict(
                "Session is already active".to_string(),
            ));
        }
        JoinOutcome::RejectedFull => {
            return Err(SessionError::Conflict("Session is full".to_string()));
        }
    }

    let session = state.store.get(code).await?;
    state
        .dispatcher
        .send_personal(code, user_id, &ServerMessage::session_state(&session))
        .await;
    state
        .dispatcher
        .broadcast(code, &ServerMessage::session_update(&session))
        .await;

    // A reconnect during an active quiz also gets its current question:
    // the shared one in live mode, its own in self-paced mode.
    if reconnecting && session.status == SessionStatus::Active {
        let question = if session.mode.is_self_paced() {
            let index = state.game.participant_index(code, user_id).await?;
            state.game.question_by_index(code, index).await?
        } else {
            state.game.current_question(code).await?
        };
        state
            .dispatcher
            .send_personal(code, user_id, &ServerMessage::Question(question))
            .await;
    }

    Ok(())
}

async fn handle_start_quiz(
    state: &Arc<crate::AppState>,
    code: &SessionCode,
    user_id: &UserId,
    payload: serde_json::Value,
) -> Result<(), SessionError> {
    require_host(state, code, user_id, "start the quiz").await?;
    let payload: StartQuizPayload = parse_payload(payload)?;

    if let Some(limit) = payload.per_question_time_limit {
        state
            .store
            .set_field(code, SessionField::PerQuestionTimeLimit(limit))
            .await?;
    }

    state
        .store
        .set_field(code, SessionField::Status(SessionStatus::Active))
        .await?;
    state.game.begin(code).await?;

    let question = state
        .game
        .question_by_index(code, 0)
        .await
        .map_err(|e| match e {
            SessionError::NotFound(_) => {
                SessionError::NotFound("No questions available".to_string())
            }
            other => other,
        })?;

    let session = state.store.get(code).await?;
    state
        .dispatcher
        .broadcast(
            code,
            &ServerMessage::QuizStarted(QuizStarted {
                message: "Quiz is starting!".to_string(),
                per_question_time_limit: session.per_question_time_limit,
            }),
        )
        .await;
    state
        .dispatcher
        .broadcast(code, &ServerMessage::Question(question))
        .await;

    Ok(())
}

async fn handle_submit_answer(
    state: &Arc<crate::AppState>,
    code: &SessionCode,
    user_id: &UserId,
    payload: serde_json::Value,
) -> Result<(), SessionError> {
    let payload: SubmitAnswerPayload = parse_payload(payload)
        .map_err(|_| SessionError::Invalid("Invalid answer submission".to_string()))?;

    let result = state
        .game
        .submit_answer(code, user_id, payload.answer, payload.timestamp)
        .await?;

    state
        .dispatcher
        .send_personal(code, user_id, &ServerMessage::AnswerResult(result))
        .await;

    let leaderboard = state.leaderboard.live(code).await?;
    state
        .dispatcher
        .broadcast(
            code,
            &ServerMessage::LeaderboardUpdate(LeaderboardPayload {
                leaderboard,
                total_questions: None,
            }),
        )
        .await;

    Ok(())
}

async fn handle_next_question(
    state: &Arc<crate::AppState>,
    code: &SessionCode,
    user_id: &UserId,
) -> Result<(), SessionError> {
    require_host(state, code, user_id, "control questions").await?;

    match state.game.advance_session(code).await? {
        Some(question) => {
            state
                .dispatcher
                .broadcast(code, &ServerMessage::Question(question))
                .await;
            Ok(())
        }
        None => finish_quiz(state, code).await,
    }
}

async fn handle_request_next_question(
    state: &Arc<crate::AppState>,
    code: &SessionCode,
    user_id: &UserId,
) -> Result<(), SessionError> {
    match state.game.advance_participant(code, user_id).await? {
        Some(question) => {
            state
                .dispatcher
                .send_personal(code, user_id, &ServerMessage::Question(question))
                .await;
        }
        None => {
            let results = state.leaderboard.final_results(code).await?;
            state
                .dispatcher
                .send_personal(
                    code,
                    user_id,
                    &ServerMessage::QuizCompleted(QuizOver {
                        message: "You've completed all questions!".to_string(),
                        results,
                    }),
                )
                .await;
        }
    }
    Ok(())
}

async fn handle_end_quiz(
    state: &Arc<crate::AppState>,
    code: &SessionCode,
    user_id: &UserId,
) -> Result<(), SessionError> {
    require_host(state, code, user_id, "end the quiz").await?;
    finish_quiz(state, code).await
}

/// Shared completion flow for an explicit `end_quiz` and an exhausted
/// `next_question`. Idempotent on the status so a repeated end still
/// re-broadcasts the final results.
async fn finish_quiz(state: &Arc<crate::AppState>, code: &SessionCode) -> Result<(), SessionError> {
    let session = state.store.get(code).await?;
    if session.status != SessionStatus::Completed {
        state
            .store
            .set_field(code, SessionField::Status(SessionStatus::Completed))
            .await?;
    }

    let results = state.leaderboard.final_results(code).await?;
    state
        .dispatcher
        .broadcast(
            code,
            &ServerMessage::QuizEnded(QuizOver {
                message: "Quiz completed!".to_string(),
                results,
            }),
        )
        .await;
    Ok(())
}

async fn handle_request_leaderboard(
    state: &Arc<crate::AppState>,
    code: &SessionCode,
    user_id: &UserId,
) -> Result<(), SessionError> {
    let session = state.store.get(code).await?;
    let leaderboard = LeaderboardProjection::project(&session);

    state
        .dispatcher
        .send_personal(
            code,
            user_id,
            &ServerMessage::LeaderboardResponse(LeaderboardPayload {
                leaderboard,
                total_questions: Some(session.total_questions),
            }),
        )
        .await;
    Ok(())
}

/// Post-disconnect bookkeeping for participants: mark them disconnected
/// (preserving score and answers for a reconnect) and, if the session is
/// still in the lobby once the reconnect grace expires, drop them from
/// the roster.
async fn cleanup_participant(state: Arc<crate::AppState>, code: SessionCode, user_id: UserId) {
    if state
        .store
        .mark_disconnected(&code, &user_id)
        .await
        .is_err()
    {
        return;
    }
    log::info!("Participant {user_id} disconnected from session {code}");

    let grace = state.config.reconnection_timeout();
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;

        let Ok(session) = state.store.get(&code).await else {
            return;
        };
        if session.status != SessionStatus::Waiting {
            return;
        }
        let still_disconnected = session
            .participants
            .get(&user_id)
            .is_some_and(|p| !p.connected);
        if !still_disconnected {
            return;
        }

        if state.store.remove_participant(&code, &user_id).await.is_ok() {
            log::info!("Removed {user_id} from waiting session {code} after reconnect grace");
            if let Ok(session) = state.store.get(&code).await {
                state
                    .dispatcher
                    .broadcast(&code, &ServerMessage::session_update(&session))
                    .await;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use trivium::data::{
        AnswerRecord, AnswerValue, NewSession, Question, QuestionKind, Quiz, SessionMode,
    };
    use trivium::serde_json::{Value, json};

    use crate::AppState;
    use crate::config::Config;
    use crate::messaging::Dispatcher;
    use crate::services::{
        GameController, LeaderboardProjection, QuizStore, QuizStoreInMemory, SessionStore,
        SessionStoreInMemory,
    };

    fn single_mcq(text: &str, correct: u32) -> Question {
        Question {
            kind: QuestionKind::SingleMcq,
            question: text.to_string(),
            options: vec!["A".to_string(), "B".to_string()],
            id: None,
            correct_answer_index: Some(correct),
            correct_answer_indices: None,
            correct_matches: None,
            drag_items: None,
            drop_targets: None,
            image_url: None,
        }
    }

    fn state_with_quiz(questions: Vec<Question>) -> Arc<AppState> {
        let store: Arc<dyn SessionStore> =
            Arc::new(SessionStoreInMemory::new(chrono::Duration::hours(24), 50));
        let quizzes_mem = QuizStoreInMemory::new();
        quizzes_mem.insert(
            "quiz-1",
            Quiz {
                title: "Capitals".to_string(),
                questions,
            },
        );
        let quizzes: Arc<dyn QuizStore> = Arc::new(quizzes_mem);

        Arc::new(AppState {
            started_at: chrono::Utc::now(),
            config: Config::default(),
            game: GameController::new(store.clone(), quizzes.clone()),
            leaderboard: LeaderboardProjection::new(store.clone()),
            dispatcher: Dispatcher::new(Duration::from_millis(200)),
            store,
            quizzes,
        })
    }

    async fn create_session(
        state: &AppState,
        mode: SessionMode,
        total_questions: u32,
    ) -> SessionCode {
        state
            .store
            .create(NewSession {
                quiz_id: "quiz-1".to_string(),
                host_id: "host".into(),
                mode,
                per_question_time_limit: 30,
                quiz_title: "Capitals".to_string(),
                total_questions,
            })
            .await
            .unwrap()
            .code
    }

    /// Registers a test connection in place of a real socket task.
    fn connect(
        state: &AppState,
        code: &SessionCode,
        user: &str,
        is_host: bool,
    ) -> mpsc::Receiver<Outbound> {
        state.dispatcher.register(code, &user.into(), is_host).rx
    }

    async fn send(
        state: &Arc<AppState>,
        code: &SessionCode,
        user: &str,
        is_host: bool,
        message: Value,
    ) {
        dispatch_message(state, code, &user.into(), is_host, &message.to_string()).await;
    }

    /// Reads frames until one with the given type arrives, returning its
    /// payload. Frames of other types on the same connection are skipped.
    async fn recv_type(rx: &mut mpsc::Receiver<Outbound>, kind: &str) -> Value {
        loop {
            match timeout(Duration::from_millis(500), rx.recv()).await {
                Ok(Some(Outbound::Json(json))) => {
                    let value: Value = serde_json::from_str(&json).unwrap();
                    if value["type"] == kind {
                        return value["payload"].clone();
                    }
                }
                other => panic!("did not receive a {kind} frame: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn host_join_does_not_enter_the_roster() {
        let state = state_with_quiz(vec![single_mcq("Q0", 0), single_mcq("Q1", 1)]);
        let code = create_session(&state, SessionMode::Live, 2).await;
        let mut host = connect(&state, &code, "host", true);

        send(&state, &code, "host", true, json!({"type": "join", "payload": {"username": "H"}})).await;

        let snapshot = recv_type(&mut host, "session_state").await;
        assert_eq!(snapshot["participant_count"], 0);
        assert_eq!(snapshot["participants"], json!([]));

        let session = state.store.get(&code).await.unwrap();
        assert!(session.participants.is_empty());
    }

    #[tokio::test]
    async fn synchronous_happy_path() {
        let state = state_with_quiz(vec![single_mcq("Q0", 0), single_mcq("Q1", 1)]);
        let code = create_session(&state, SessionMode::Live, 2).await;
        let mut host = connect(&state, &code, "host", true);
        let mut player = connect(&state, &code, "p1", false);

        send(&state, &code, "p1", false, json!({"type": "join", "payload": {"username": "Ada"}})).await;
        let snapshot = recv_type(&mut player, "session_state").await;
        assert_eq!(snapshot["participant_count"], 1);

        send(&state, &code, "host", true, json!({"type": "start_quiz"})).await;
        let started = recv_type(&mut player, "quiz_started").await;
        assert_eq!(started["per_question_time_limit"], 30);
        let question = recv_type(&mut player, "question").await;
        assert_eq!(question["index"], 0);
        assert_eq!(question["total"], 2);

        // Correct answer 3 seconds in: 1000 + floor((1 - 3/30) * 500)
        send(
            &state, &code, "p1", false,
            json!({"type": "submit_answer", "payload": {"answer": 0, "timestamp": 3}}),
        )
        .await;
        let result = recv_type(&mut player, "answer_result").await;
        assert_eq!(result["is_correct"], true);
        assert_eq!(result["points"], 1450);
        assert_eq!(result["new_total_score"], 1450);
        assert_eq!(result["question_type"], "singleMcq");

        // The leaderboard update reaches the host too
        let update = recv_type(&mut host, "leaderboard_update").await;
        assert_eq!(update["leaderboard"][0]["score"], 1450);

        send(&state, &code, "host", true, json!({"type": "next_question"})).await;
        let question = recv_type(&mut player, "question").await;
        assert_eq!(question["index"], 1);

        // Wrong answer on the second question scores nothing
        send(
            &state, &code, "p1", false,
            json!({"type": "submit_answer", "payload": {"answer": 0, "timestamp": 5}}),
        )
        .await;
        let result = recv_type(&mut player, "answer_result").await;
        assert_eq!(result["is_correct"], false);
        assert_eq!(result["points"], 0);
        assert_eq!(result["new_total_score"], 1450);

        send(&state, &code, "host", true, json!({"type": "end_quiz"})).await;
        let ended = recv_type(&mut player, "quiz_ended").await;
        let entry = &ended["results"][0];
        assert_eq!(entry["score"], 1450);
        assert_eq!(entry["accuracy"], 50.0);
        assert_eq!(entry["correct_answers"], 1);
        assert_eq!(entry["wrong_answers"], 1);
        assert_eq!(
            entry["correct_answers"].as_u64().unwrap() + entry["wrong_answers"].as_u64().unwrap(),
            entry["answered_count"].as_u64().unwrap()
        );

        let session = state.store.get(&code).await.unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn duplicate_answer_is_rejected_and_first_stands() {
        let state = state_with_quiz(vec![single_mcq("Q0", 0), single_mcq("Q1", 1)]);
        let code = create_session(&state, SessionMode::Live, 2).await;
        let _host = connect(&state, &code, "host", true);
        let mut player = connect(&state, &code, "p1", false);

        send(&state, &code, "p1", false, json!({"type": "join", "payload": {"username": "Ada"}})).await;
        send(&state, &code, "host", true, json!({"type": "start_quiz"})).await;
        send(
            &state, &code, "p1", false,
            json!({"type": "submit_answer", "payload": {"answer": 0, "timestamp": 3}}),
        )
        .await;
        let result = recv_type(&mut player, "answer_result").await;
        assert_eq!(result["new_total_score"], 1450);

        // Resubmitting the same question is rejected outright
        send(
            &state, &code, "p1", false,
            json!({"type": "submit_answer", "payload": {"answer": 1, "timestamp": 1}}),
        )
        .await;
        let error = recv_type(&mut player, "error").await;
        assert_eq!(error["message"], "Already answered");

        let session = state.store.get(&code).await.unwrap();
        let participant = &session.participants[&UserId::from("p1")];
        assert_eq!(participant.score, 1450);
        assert_eq!(participant.answers.len(), 1);
    }

    #[tokio::test]
    async fn self_paced_completion() {
        let state = state_with_quiz(vec![
            single_mcq("Q0", 0),
            single_mcq("Q1", 0),
            single_mcq("Q2", 0),
        ]);
        let code = create_session(&state, SessionMode::SelfPaced, 3).await;
        let _host = connect(&state, &code, "host", true);
        let mut player = connect(&state, &code, "p1", false);

        send(&state, &code, "p1", false, json!({"type": "join", "payload": {"username": "Ada"}})).await;
        send(&state, &code, "host", true, json!({"type": "start_quiz"})).await;
        let question = recv_type(&mut player, "question").await;
        assert_eq!(question["index"], 0);

        send(&state, &code, "p1", false, json!({"type": "request_next_question"})).await;
        let question = recv_type(&mut player, "question").await;
        assert_eq!(question["index"], 1);

        send(&state, &code, "p1", false, json!({"type": "request_next_question"})).await;
        let question = recv_type(&mut player, "question").await;
        assert_eq!(question["index"], 2);

        // At the last question the next request completes the quiz for
        // this participant
        send(&state, &code, "p1", false, json!({"type": "request_next_question"})).await;
        let completed = recv_type(&mut player, "quiz_completed").await;
        assert_eq!(completed["message"], "You've completed all questions!");
        assert!(completed["results"].is_array());
    }

    #[tokio::test]
    async fn reconnect_mid_quiz_restores_state_and_question() {
        let state = state_with_quiz(vec![single_mcq("Q0", 0), single_mcq("Q1", 1)]);
        let code = create_session(&state, SessionMode::Live, 2).await;
        let _host = connect(&state, &code, "host", true);
        let mut player = connect(&state, &code, "p1", false);

        send(&state, &code, "p1", false, json!({"type": "join", "payload": {"username": "Ada"}})).await;
        send(&state, &code, "host", true, json!({"type": "start_quiz"})).await;
        send(
            &state, &code, "p1", false,
            json!({"type": "submit_answer", "payload": {"answer": 0, "timestamp": 3}}),
        )
        .await;
        recv_type(&mut player, "answer_result").await;

        // Drop and reconnect with a fresh channel, same user id
        drop(player);
        state
            .store
            .mark_disconnected(&code, &"p1".into())
            .await
            .unwrap();
        let mut rejoined = connect(&state, &code, "p1", false);
        send(&state, &code, "p1", false, json!({"type": "join", "payload": {"username": "Ada"}})).await;

        let snapshot = recv_type(&mut rejoined, "session_state").await;
        let participant = &snapshot["participants"][0];
        assert_eq!(participant["score"], 1450);
        assert_eq!(participant["answers"].as_array().unwrap().len(), 1);
        assert_eq!(participant["connected"], true);

        // Followed by the current question with its remaining time
        let question = recv_type(&mut rejoined, "question").await;
        assert_eq!(question["index"], 0);
        assert!(question["time_remaining"].as_u64().unwrap() <= 30);
    }

    #[tokio::test]
    async fn late_join_is_rejected_unless_reconnecting() {
        let state = state_with_quiz(vec![single_mcq("Q0", 0)]);
        let code = create_session(&state, SessionMode::Live, 1).await;
        let _host = connect(&state, &code, "host", true);
        let mut early = connect(&state, &code, "p1", false);

        send(&state, &code, "p1", false, json!({"type": "join", "payload": {"username": "Ada"}})).await;
        recv_type(&mut early, "session_state").await;
        send(&state, &code, "host", true, json!({"type": "start_quiz"})).await;

        let mut late = connect(&state, &code, "p2", false);
        send(&state, &code, "p2", false, json!({"type": "join", "payload": {"username": "Bob"}})).await;
        let error = recv_type(&mut late, "error").await;
        assert_eq!(error["message"], "Session is already active");

        let session = state.store.get(&code).await.unwrap();
        assert!(!session.participants.contains_key(&UserId::from("p2")));
    }

    #[tokio::test]
    async fn non_host_cannot_drive_the_quiz() {
        let state = state_with_quiz(vec![single_mcq("Q0", 0)]);
        let code = create_session(&state, SessionMode::Live, 1).await;
        let mut player = connect(&state, &code, "p1", false);

        send(&state, &code, "p1", false, json!({"type": "join", "payload": {"username": "Ada"}})).await;
        recv_type(&mut player, "session_state").await;

        for (kind, action) in [
            ("start_quiz", "start the quiz"),
            ("next_question", "control questions"),
            ("end_quiz", "end the quiz"),
        ] {
            send(&state, &code, "p1", false, json!({"type": kind})).await;
            let error = recv_type(&mut player, "error").await;
            assert_eq!(error["message"], format!("Only host can {action}"));
        }
    }

    #[tokio::test]
    async fn unknown_message_type_is_ignored() {
        let state = state_with_quiz(vec![single_mcq("Q0", 0)]);
        let code = create_session(&state, SessionMode::Live, 1).await;
        let mut player = connect(&state, &code, "p1", false);

        send(&state, &code, "p1", false, json!({"type": "dance"})).await;
        // No error frame; the message is dropped
        assert!(
            timeout(Duration::from_millis(100), player.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn malformed_envelope_reports_invalid() {
        let state = state_with_quiz(vec![single_mcq("Q0", 0)]);
        let code = create_session(&state, SessionMode::Live, 1).await;
        let mut player = connect(&state, &code, "p1", false);

        dispatch_message(&state, &code, &"p1".into(), false, "not json").await;
        let error = recv_type(&mut player, "error").await;
        assert!(
            error["message"]
                .as_str()
                .unwrap()
                .starts_with("Invalid message format")
        );
    }

    #[tokio::test]
    async fn next_question_past_the_end_ends_the_quiz() {
        let state = state_with_quiz(vec![single_mcq("Q0", 0)]);
        let code = create_session(&state, SessionMode::Live, 1).await;
        let mut host = connect(&state, &code, "host", true);
        let mut player = connect(&state, &code, "p1", false);

        send(&state, &code, "p1", false, json!({"type": "join", "payload": {"username": "Ada"}})).await;
        send(&state, &code, "host", true, json!({"type": "start_quiz"})).await;
        recv_type(&mut player, "question").await;

        send(&state, &code, "host", true, json!({"type": "next_question"})).await;
        let ended = recv_type(&mut player, "quiz_ended").await;
        assert_eq!(ended["message"], "Quiz completed!");
        recv_type(&mut host, "quiz_ended").await;

        let session = state.store.get(&code).await.unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.current_question_index, session.total_questions);
    }

    #[tokio::test]
    async fn leaderboard_request_returns_ranked_entries() {
        let state = state_with_quiz(vec![single_mcq("Q0", 0), single_mcq("Q1", 1)]);
        let code = create_session(&state, SessionMode::Live, 2).await;
        let _host = connect(&state, &code, "host", true);
        let mut ada = connect(&state, &code, "p1", false);
        let mut bob = connect(&state, &code, "p2", false);

        send(&state, &code, "p1", false, json!({"type": "join", "payload": {"username": "Ada"}})).await;
        send(&state, &code, "p2", false, json!({"type": "join", "payload": {"username": "Bob"}})).await;
        send(&state, &code, "host", true, json!({"type": "start_quiz"})).await;

        send(
            &state, &code, "p1", false,
            json!({"type": "submit_answer", "payload": {"answer": 0, "timestamp": 0}}),
        )
        .await;
        recv_type(&mut ada, "answer_result").await;
        send(
            &state, &code, "p2", false,
            json!({"type": "submit_answer", "payload": {"answer": 1, "timestamp": 0}}),
        )
        .await;
        recv_type(&mut bob, "answer_result").await;

        send(&state, &code, "p2", false, json!({"type": "request_leaderboard"})).await;
        let response = recv_type(&mut bob, "leaderboard_response").await;
        assert_eq!(response["total_questions"], 2);
        let leaderboard = response["leaderboard"].as_array().unwrap();
        assert_eq!(leaderboard.len(), 2);
        assert_eq!(leaderboard[0]["user_id"], "p1");
        assert_eq!(leaderboard[0]["position"], 1);
        assert_eq!(leaderboard[1]["user_id"], "p2");
        assert_eq!(leaderboard[1]["position"], 2);
    }

    #[tokio::test]
    async fn participant_index_falls_back_to_answer_history() {
        let state = state_with_quiz(vec![
            single_mcq("Q0", 0),
            single_mcq("Q1", 0),
            single_mcq("Q2", 0),
        ]);
        let code = create_session(&state, SessionMode::SelfPaced, 3).await;
        state
            .store
            .upsert_participant(&code, &"p1".into(), "Ada")
            .await
            .unwrap();

        // No cursor and no answers: first question
        assert_eq!(
            state.game.participant_index(&code, &"p1".into()).await.unwrap(),
            0
        );

        // With answers on record: the highest answered index
        state
            .store
            .record_answer(
                &code,
                &"p1".into(),
                AnswerRecord {
                    question_index: 1,
                    answer: AnswerValue::Index(0),
                    timestamp: None,
                    is_correct: true,
                    points_earned: 1000,
                },
            )
            .await
            .unwrap();
        assert_eq!(
            state.game.participant_index(&code, &"p1".into()).await.unwrap(),
            1
        );

        // An explicitly set cursor wins over the derivation
        state.store.set_cursor(&code, &"p1".into(), 2).await.unwrap();
        assert_eq!(
            state.game.participant_index(&code, &"p1".into()).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn quiz_store_failure_only_affects_the_requester() {
        let state = state_with_quiz(vec![single_mcq("Q0", 0)]);
        let code = create_session(&state, SessionMode::Live, 1).await;
        let _host = connect(&state, &code, "host", true);
        let mut player = connect(&state, &code, "p1", false);

        send(&state, &code, "p1", false, json!({"type": "join", "payload": {"username": "Ada"}})).await;
        recv_type(&mut player, "session_state").await;

        // Point the session at a quiz the store no longer has
        let bad = create_bad_session(&state).await;
        let mut ghost = connect(&state, &bad, "p9", false);
        send(&state, &bad, "p9", false, json!({"type": "join", "payload": {"username": "Eve"}})).await;
        recv_type(&mut ghost, "session_state").await;
        send(&state, &bad, "host2", true, json!({"type": "start_quiz"})).await;

        // The failing session's participant gets an error; the healthy
        // session is untouched
        send(
            &state, &bad, "p9", false,
            json!({"type": "submit_answer", "payload": {"answer": 0, "timestamp": 1}}),
        )
        .await;
        let error = recv_type(&mut ghost, "error").await;
        assert_eq!(error["message"], "Quiz not found");
        assert!(
            timeout(Duration::from_millis(100), player.recv())
                .await
                .is_err()
        );
    }

    async fn create_bad_session(state: &AppState) -> SessionCode {
        state
            .store
            .create(NewSession {
                quiz_id: "deleted-quiz".to_string(),
                host_id: "host2".into(),
                mode: SessionMode::Live,
                per_question_time_limit: 30,
                quiz_title: "Ghost".to_string(),
                total_questions: 1,
            })
            .await
            .unwrap()
            .code
    }
}
