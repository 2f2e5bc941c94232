//! Data structures and message types for live quiz sessions.
//!
//! This module contains the core data types used throughout the Trivium
//! application for managing sessions, participants, answers, and the JSON
//! messages exchanged with clients over WebSocket and HTTP.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::SessionError;
use crate::id::{SessionCode, UserId};

/// Lifecycle state of a session.
///
/// Transitions are strictly forward: `waiting → active → completed`.
/// The derived ordering is what [`Session::transition_to`] validates against.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Waiting => "waiting",
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Play mode of a session.
///
/// `timed_individual` shares all cursor logic with `self_paced`; the mode
/// value itself is advisory for clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Live,
    SelfPaced,
    TimedIndividual,
}

impl SessionMode {
    /// True for the modes where each participant advances independently.
    pub fn is_self_paced(&self) -> bool {
        matches!(self, SessionMode::SelfPaced | SessionMode::TimedIndividual)
    }
}

impl Default for SessionMode {
    fn default() -> Self {
        SessionMode::Live
    }
}

/// The answer value a participant submits.
///
/// The JSON shape varies with the question type: a bare integer index, a
/// list of indices, or an item-to-target mapping. Shape mismatches against
/// the question type are rejected before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Index(u32),
    Indices(Vec<u32>),
    Matches(HashMap<String, String>),
}

/// Immutable record of one answer event, at most one per
/// `(participant, question_index)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_index: u32,
    pub answer: AnswerValue,
    /// Seconds elapsed since question dispatch, as reported by the client.
    pub timestamp: Option<f64>,
    pub is_correct: bool,
    pub points_earned: u32,
}

/// A joined user other than the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: UserId,
    pub username: String,
    pub joined_at: DateTime<Utc>,
    pub connected: bool,
    pub score: u32,
    pub answers: Vec<AnswerRecord>,
}

impl Participant {
    pub fn new(user_id: UserId, username: String, joined_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            username,
            joined_at,
            connected: true,
            score: 0,
            answers: Vec::new(),
        }
    }

    /// Whether this participant already answered the given question.
    pub fn has_answered(&self, question_index: u32) -> bool {
        self.answers
            .iter()
            .any(|a| a.question_index == question_index)
    }

    /// The highest question index this participant has answered, if any.
    pub fn max_answered_index(&self) -> Option<u32> {
        self.answers.iter().map(|a| a.question_index).max()
    }

    pub fn correct_count(&self) -> u32 {
        self.answers.iter().filter(|a| a.is_correct).count() as u32
    }
}

/// Outcome of a participant upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// New participant added to the roster.
    Added,
    /// Existing participant reconnected; score and answers preserved.
    Reconnected,
    /// The user is the session host; hosts are never participants.
    RejectedHost,
    /// New participants are only accepted while the session is waiting.
    RejectedClosed,
    /// The roster is at the configured capacity.
    RejectedFull,
}

/// Parameters for creating a session. The quiz metadata is cached into the
/// session at create time so the hot path never re-reads the quiz record.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub quiz_id: String,
    pub host_id: UserId,
    pub mode: SessionMode,
    pub per_question_time_limit: u32,
    pub quiz_title: String,
    pub total_questions: u32,
}

/// A typed single-field write against a session, used for status
/// transitions and cursor bumps.
#[derive(Debug, Clone)]
pub enum SessionField {
    Status(SessionStatus),
    CurrentQuestionIndex(u32),
    QuestionStartTime(DateTime<Utc>),
    PerQuestionTimeLimit(u32),
}

/// The top-level session entity, keyed by its 6-character code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub code: SessionCode,
    pub quiz_id: String,
    pub host_id: UserId,
    pub quiz_title: String,
    pub status: SessionStatus,
    pub mode: SessionMode,
    /// Host-synchronized cursor; only meaningful in `live` mode.
    /// Equal to `total_questions` means finished.
    pub current_question_index: u32,
    pub total_questions: u32,
    pub per_question_time_limit: u32,
    pub question_start_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub participants: HashMap<UserId, Participant>,
}

impl Session {
    pub fn new(code: SessionCode, new: NewSession, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            code,
            quiz_id: new.quiz_id,
            host_id: new.host_id,
            quiz_title: new.quiz_title,
            status: SessionStatus::Waiting,
            mode: new.mode,
            current_question_index: 0,
            total_questions: new.total_questions,
            per_question_time_limit: new.per_question_time_limit,
            question_start_time: None,
            created_at: now,
            expires_at: now + ttl,
            participants: HashMap::new(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Moves the session status forward. Backward and repeated transitions
    /// are rejected so the `waiting < active < completed` order is never
    /// violated.
    pub fn transition_to(&mut self, next: SessionStatus) -> Result<(), SessionError> {
        if next > self.status {
            self.status = next;
            Ok(())
        } else {
            Err(SessionError::Conflict(format!(
                "Session is already {}",
                self.status
            )))
        }
    }

    /// Adds or reconnects a participant.
    ///
    /// The host is never added to the roster. New participants are only
    /// accepted while the session is waiting and below capacity; a user
    /// already on the roster may reconnect at any status.
    pub fn upsert_participant(
        &mut self,
        user_id: &UserId,
        username: &str,
        max_participants: usize,
    ) -> JoinOutcome {
        if *user_id == self.host_id {
            return JoinOutcome::RejectedHost;
        }

        if let Some(participant) = self.participants.get_mut(user_id) {
            participant.connected = true;
            // Keep the username current in case the client changed it
            participant.username = username.to_string();
            return JoinOutcome::Reconnected;
        }

        if self.status != SessionStatus::Waiting {
            return JoinOutcome::RejectedClosed;
        }

        if self.participants.len() >= max_participants {
            return JoinOutcome::RejectedFull;
        }

        self.participants.insert(
            user_id.clone(),
            Participant::new(user_id.clone(), username.to_string(), Utc::now()),
        );
        JoinOutcome::Added
    }

    /// Appends an answer record for a participant and updates their score.
    ///
    /// A second record for the same question index is rejected; the first
    /// answer stands. Returns the participant's new total score.
    pub fn record_answer(
        &mut self,
        user_id: &UserId,
        record: AnswerRecord,
    ) -> Result<u32, SessionError> {
        let participant = self
            .participants
            .get_mut(user_id)
            .ok_or_else(|| SessionError::NotFound("Participant not found".to_string()))?;

        if participant.has_answered(record.question_index) {
            return Err(SessionError::Conflict("Already answered".to_string()));
        }

        participant.score += record.points_earned;
        participant.answers.push(record);
        Ok(participant.score)
    }

    /// Marks a participant as disconnected, preserving score and answers.
    pub fn mark_disconnected(&mut self, user_id: &UserId) {
        if let Some(participant) = self.participants.get_mut(user_id) {
            participant.connected = false;
        }
    }

    /// Seconds left on the current question, computed from the dispatch
    /// stamp. Full limit when no question has been dispatched yet.
    pub fn remaining_time(&self, now: DateTime<Utc>) -> u32 {
        match self.question_start_time {
            Some(start) => {
                let elapsed = (now - start).num_seconds().max(0) as u32;
                self.per_question_time_limit.saturating_sub(elapsed)
            }
            None => self.per_question_time_limit,
        }
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Roster as a list in a deterministic order (join time, then user id).
    pub fn participants_list(&self) -> Vec<Participant> {
        let mut list: Vec<Participant> = self.participants.values().cloned().collect();
        list.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.user_id.as_str().cmp(b.user_id.as_str()))
        });
        list
    }
}

// --- Quiz content (consumed read-only from the quiz store) ---

/// Shape tag of a question. Anything outside the known set is carried as
/// `Other` and rejected at validation time rather than at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    SingleMcq,
    TrueFalse,
    MultiMcq,
    DragAndDrop,
    Other(String),
}

impl QuestionKind {
    pub fn as_str(&self) -> &str {
        match self {
            QuestionKind::SingleMcq => "singleMcq",
            QuestionKind::TrueFalse => "trueFalse",
            QuestionKind::MultiMcq => "multiMcq",
            QuestionKind::DragAndDrop => "dragAndDrop",
            QuestionKind::Other(s) => s,
        }
    }

    fn from_tag(tag: String) -> Self {
        match tag.as_str() {
            "singleMcq" => QuestionKind::SingleMcq,
            "trueFalse" => QuestionKind::TrueFalse,
            "multiMcq" => QuestionKind::MultiMcq,
            "dragAndDrop" => QuestionKind::DragAndDrop,
            _ => QuestionKind::Other(tag),
        }
    }
}

// The wire tag is a plain string. A manual serde implementation keeps
// unknown tags as `Other` instead of failing the whole quiz record at
// parse time.
impl Serialize for QuestionKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for QuestionKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::from_tag(tag))
    }
}

impl std::fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A question as stored in the quiz record. Only the fields relevant to the
/// question's type are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(alias = "questionText", default)]
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer_indices: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_matches: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drag_items: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_targets: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// A quiz record as returned by the quiz store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub title: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

/// The normalized question payload sent to clients. Both `questionType`
/// and `type` carry the same tag for client compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionPayload {
    pub question: String,
    #[serde(rename = "questionType")]
    pub question_type: QuestionKind,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub options: Vec<String>,
    pub id: String,
    #[serde(
        rename = "correctAnswerIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub correct_answer_index: Option<u32>,
    #[serde(
        rename = "correctAnswerIndices",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub correct_answer_indices: Option<Vec<u32>>,
    #[serde(
        rename = "correctMatches",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub correct_matches: Option<HashMap<String, String>>,
    #[serde(rename = "dragItems", default, skip_serializing_if = "Option::is_none")]
    pub drag_items: Option<Vec<String>>,
    #[serde(
        rename = "dropTargets",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub drop_targets: Option<Vec<String>>,
    #[serde(rename = "imageUrl", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl QuestionPayload {
    pub fn from_question(question: &Question, index: u32) -> Self {
        Self {
            question: question.question.clone(),
            question_type: question.kind.clone(),
            kind: question.kind.clone(),
            options: question.options.clone(),
            id: question
                .id
                .clone()
                .unwrap_or_else(|| index.to_string()),
            correct_answer_index: question.correct_answer_index,
            correct_answer_indices: question.correct_answer_indices.clone(),
            correct_matches: question.correct_matches.clone(),
            drag_items: question.drag_items.clone(),
            drop_targets: question.drop_targets.clone(),
            image_url: question.image_url.clone(),
        }
    }
}

/// Payload of a `question` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionMessage {
    pub question: QuestionPayload,
    pub index: u32,
    pub total: u32,
    pub time_remaining: u32,
}

// --- Leaderboard views ---

/// One row of the live leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub position: u32,
    pub user_id: UserId,
    pub username: String,
    pub score: u32,
    pub answered_count: u32,
    pub total_questions: u32,
    pub current_question: u32,
    pub is_connected: bool,
}

/// A live leaderboard row extended with accuracy stats for final results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResultEntry {
    #[serde(flatten)]
    pub entry: LeaderboardEntry,
    /// Percentage of answered questions that were correct, one decimal.
    pub accuracy: f64,
    pub correct_answers: u32,
    pub wrong_answers: u32,
}

// --- Outbound messages (server → client) ---

/// The correct answer echoed back in an `answer_result`, shaped by the
/// question type. Single-choice answers are echoed as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    Index(String),
    Indices(Vec<u32>),
    Matches(HashMap<String, String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_code: SessionCode,
    pub quiz_id: String,
    pub host_id: UserId,
    pub quiz_title: String,
    pub status: SessionStatus,
    pub mode: SessionMode,
    pub current_question_index: u32,
    pub total_questions: u32,
    pub per_question_time_limit: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub participants: Vec<Participant>,
    pub participant_count: usize,
}

impl From<&Session> for SessionSnapshot {
    fn from(session: &Session) -> Self {
        let participants = session.participants_list();
        Self {
            session_code: session.code.clone(),
            quiz_id: session.quiz_id.clone(),
            host_id: session.host_id.clone(),
            quiz_title: session.quiz_title.clone(),
            status: session.status,
            mode: session.mode,
            current_question_index: session.current_question_index,
            total_questions: session.total_questions,
            per_question_time_limit: session.per_question_time_limit,
            created_at: session.created_at,
            expires_at: session.expires_at,
            participant_count: participants.len(),
            participants,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub status: SessionStatus,
    pub participant_count: usize,
    pub participants: Vec<Participant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizStarted {
    pub message: String,
    pub per_question_time_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub is_correct: bool,
    pub points: u32,
    pub correct_answer: CorrectAnswer,
    pub new_total_score: u32,
    pub question_type: QuestionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardPayload {
    pub leaderboard: Vec<LeaderboardEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_questions: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizOver {
    pub message: String,
    pub results: Vec<FinalResultEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub message: String,
}

/// Every message the server sends over the channel, as a
/// `{"type": ..., "payload": ...}` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    SessionState(SessionSnapshot),
    SessionUpdate(SessionUpdate),
    QuizStarted(QuizStarted),
    Question(QuestionMessage),
    AnswerResult(AnswerResult),
    LeaderboardUpdate(LeaderboardPayload),
    LeaderboardResponse(LeaderboardPayload),
    QuizEnded(QuizOver),
    QuizCompleted(QuizOver),
    Error(ErrorMessage),
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorMessage {
            message: message.into(),
        })
    }

    pub fn session_state(session: &Session) -> Self {
        ServerMessage::SessionState(SessionSnapshot::from(session))
    }

    pub fn session_update(session: &Session) -> Self {
        let participants = session.participants_list();
        ServerMessage::SessionUpdate(SessionUpdate {
            status: session.status,
            participant_count: participants.len(),
            participants,
        })
    }
}

// --- Inbound messages (client → server) ---

/// The raw inbound envelope. The payload is parsed per message type so an
/// unknown `type` can be logged and ignored without failing the envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

fn default_username() -> String {
    "Anonymous".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinPayload {
    #[serde(default = "default_username")]
    pub username: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartQuizPayload {
    #[serde(default)]
    pub per_question_time_limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswerPayload {
    pub answer: AnswerValue,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

// --- Session admin (HTTP request/response) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub quiz_id: String,
    pub host_id: UserId,
    #[serde(default)]
    pub mode: SessionMode,
    /// Falls back to the configured `QUESTION_TIME_SECONDS` when omitted.
    #[serde(default)]
    pub per_question_time_limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub success: bool,
    pub session_code: SessionCode,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub success: bool,
    pub session: SessionSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantsResponse {
    pub success: bool,
    pub session_code: SessionCode,
    pub participant_count: usize,
    pub participants: Vec<Participant>,
    pub mode: SessionMode,
    pub is_started: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinSessionRequest {
    pub user_id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinSessionResponse {
    pub success: bool,
    pub message: String,
    pub session_code: SessionCode,
    pub participant_count: usize,
    pub quiz_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionActionRequest {
    pub host_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    pub session_code: SessionCode,
}

/// Response of `/validate`. A missing session is reported here rather than
/// as an HTTP error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub success: bool,
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_code: Option<SessionCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Structured error body for the HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

// --- Health check ---

/// Health status enumeration.
///
/// Represents the overall health state of the server.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Dead,
}

/// Health check response structure.
///
/// Contains server health information including status, uptime, and service states.
/// Used by the `/health` endpoint to provide structured health check data.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: String,
    pub started_at: String,
    pub uptime: UptimeInfo,
    pub services: ServiceInfo,
}

/// Uptime information in both seconds and human-readable format.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UptimeInfo {
    pub seconds: i64,
    pub human: String,
}

/// Service status information.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServiceInfo {
    pub sessions: String,
    pub active_sessions: usize,
}

/// Set-equality check used for multi-choice answers.
pub fn index_sets_equal(a: &[u32], b: &[u32]) -> bool {
    let a: HashSet<u32> = a.iter().copied().collect();
    let b: HashSet<u32> = b.iter().copied().collect();
    a == b
}
