//! The authoritative session state store.
//!
//! Every persistent mutation in the engine goes through the
//! [`SessionStore`] trait. The in-memory implementation keeps each session
//! behind its own map entry; read-modify-write operations run inside a
//! single entry guard, which gives the per-session mutual exclusion the
//! participant submap needs without serializing unrelated sessions.
//!
//! Expiry is enforced lazily on every access (an expired session is
//! indistinguishable from a missing one) and swept periodically by the
//! backend's reaper task. Participant cursors live in their own keyspace,
//! `(code, user) → index`, and share the session's lifetime.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use trivium::data::{AnswerRecord, JoinOutcome, NewSession, Session, SessionField};
use trivium::errors::SessionError;
use trivium::id::{SessionCode, UserId};
use trivium::log;

/// Storage contract for session state.
///
/// Implementations must make every operation that touches the participant
/// submap or a score atomic per session; operations on distinct sessions
/// must not serialize against each other.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates a session under a freshly generated unique code.
    async fn create(&self, new: NewSession) -> Result<Session, SessionError>;

    /// Returns a snapshot copy of a session. Expired sessions read as
    /// missing.
    async fn get(&self, code: &SessionCode) -> Result<Session, SessionError>;

    /// Writes a single field. Status writes validate the forward-only
    /// transition order.
    async fn set_field(&self, code: &SessionCode, field: SessionField)
    -> Result<(), SessionError>;

    /// Adds or reconnects a participant under the per-session lock.
    async fn upsert_participant(
        &self,
        code: &SessionCode,
        user_id: &UserId,
        username: &str,
    ) -> Result<JoinOutcome, SessionError>;

    /// Appends an answer record iff none exists for the same question
    /// index, updating the score. Returns the new total score.
    async fn record_answer(
        &self,
        code: &SessionCode,
        user_id: &UserId,
        record: AnswerRecord,
    ) -> Result<u32, SessionError>;

    /// Flips a participant's `connected` flag off, preserving their state.
    async fn mark_disconnected(
        &self,
        code: &SessionCode,
        user_id: &UserId,
    ) -> Result<(), SessionError>;

    /// Drops a participant from the roster entirely (reconnect-grace
    /// cleanup in waiting sessions).
    async fn remove_participant(
        &self,
        code: &SessionCode,
        user_id: &UserId,
    ) -> Result<(), SessionError>;

    /// Sets a participant's self-paced cursor.
    async fn set_cursor(
        &self,
        code: &SessionCode,
        user_id: &UserId,
        index: u32,
    ) -> Result<(), SessionError>;

    /// Reads a participant's self-paced cursor, if one was ever set.
    async fn cursor(
        &self,
        code: &SessionCode,
        user_id: &UserId,
    ) -> Result<Option<u32>, SessionError>;

    async fn is_host(&self, code: &SessionCode, user_id: &UserId) -> Result<bool, SessionError>;

    /// Number of live (non-expired) sessions.
    async fn session_count(&self) -> usize;

    /// Removes every expired session and its derived keys. Returns how
    /// many sessions were reaped.
    async fn purge_expired(&self) -> usize;
}

/// An in-memory implementation of [`SessionStore`].
///
/// Suitable for a single-process deployment and for tests. A networked
/// hash-field store with TTL support slots in behind the same trait for
/// multi-instance deployments.
pub struct SessionStoreInMemory {
    sessions: DashMap<SessionCode, Session>,
    cursors: DashMap<(SessionCode, UserId), u32>,
    expiry: chrono::Duration,
    max_participants: usize,
}

impl SessionStoreInMemory {
    pub fn new(expiry: chrono::Duration, max_participants: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            cursors: DashMap::new(),
            expiry,
            max_participants,
        }
    }

    /// Runs `f` against the session under its entry guard, after the
    /// expiry check. This is the single mutation path for everything that
    /// touches participants or scores.
    fn with_session_mut<T>(
        &self,
        code: &SessionCode,
        f: impl FnOnce(&mut Session) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let mut entry = self
            .sessions
            .get_mut(code)
            .ok_or_else(SessionError::session_not_found)?;

        if entry.is_expired(Utc::now()) {
            drop(entry);
            self.drop_session(code);
            return Err(SessionError::session_not_found());
        }

        f(entry.value_mut())
    }

    fn drop_session(&self, code: &SessionCode) {
        self.sessions.remove(code);
        self.cursors.retain(|(c, _), _| c != code);
    }
}

#[async_trait]
impl SessionStore for SessionStoreInMemory {
    async fn create(&self, new: NewSession) -> Result<Session, SessionError> {
        // Rejection sampling: draw codes until one is free in the store.
        loop {
            let code = SessionCode::generate();
            match self.sessions.entry(code.clone()) {
                Entry::Occupied(_) => {
                    log::debug!("Session code collision on {code}, retrying");
                    continue;
                }
                Entry::Vacant(vacant) => {
                    let session = Session::new(code, new, self.expiry);
                    vacant.insert(session.clone());
                    return Ok(session);
                }
            }
        }
    }

    async fn get(&self, code: &SessionCode) -> Result<Session, SessionError> {
        let entry = self
            .sessions
            .get(code)
            .ok_or_else(SessionError::session_not_found)?;

        if entry.is_expired(Utc::now()) {
            drop(entry);
            self.drop_session(code);
            return Err(SessionError::session_not_found());
        }

        Ok(entry.value().clone())
    }

    async fn set_field(
        &self,
        code: &SessionCode,
        field: SessionField,
    ) -> Result<(), SessionError> {
        self.with_session_mut(code, |session| match field {
            SessionField::Status(next) => session.transition_to(next),
            SessionField::CurrentQuestionIndex(index) => {
                if index > session.total_questions {
                    return Err(SessionError::Invalid(
                        "Question index out of range".to_string(),
                    ));
                }
                session.current_question_index = index;
                Ok(())
            }
            SessionField::QuestionStartTime(stamp) => {
                session.question_start_time = Some(stamp);
                Ok(())
            }
            SessionField::PerQuestionTimeLimit(limit) => {
                session.per_question_time_limit = limit;
                Ok(())
            }
        })
    }

    async fn upsert_participant(
        &self,
        code: &SessionCode,
        user_id: &UserId,
        username: &str,
    ) -> Result<JoinOutcome, SessionError> {
        let max = self.max_participants;
        self.with_session_mut(code, |session| {
            Ok(session.upsert_participant(user_id, username, max))
        })
    }

    async fn record_answer(
        &self,
        code: &SessionCode,
        user_id: &UserId,
        record: AnswerRecord,
    ) -> Result<u32, SessionError> {
        self.with_session_mut(code, |session| session.record_answer(user_id, record))
    }

    async fn mark_disconnected(
        &self,
        code: &SessionCode,
        user_id: &UserId,
    ) -> Result<(), SessionError> {
        self.with_session_mut(code, |session| {
            session.mark_disconnected(user_id);
            Ok(())
        })
    }

    async fn remove_participant(
        &self,
        code: &SessionCode,
        user_id: &UserId,
    ) -> Result<(), SessionError> {
        self.with_session_mut(code, |session| {
            session.participants.remove(user_id);
            Ok(())
        })?;
        self.cursors.remove(&(code.clone(), user_id.clone()));
        Ok(())
    }

    async fn set_cursor(
        &self,
        code: &SessionCode,
        user_id: &UserId,
        index: u32,
    ) -> Result<(), SessionError> {
        // Validate against the live session so cursors can never outrun
        // the quiz or outlive the session.
        self.with_session_mut(code, |session| {
            if index > session.total_questions {
                return Err(SessionError::Invalid(
                    "Question index out of range".to_string(),
                ));
            }
            Ok(())
        })?;
        self.cursors.insert((code.clone(), user_id.clone()), index);
        Ok(())
    }

    async fn cursor(
        &self,
        code: &SessionCode,
        user_id: &UserId,
    ) -> Result<Option<u32>, SessionError> {
        // The session read doubles as the expiry check.
        self.get(code).await?;
        Ok(self
            .cursors
            .get(&(code.clone(), user_id.clone()))
            .map(|entry| *entry.value()))
    }

    async fn is_host(&self, code: &SessionCode, user_id: &UserId) -> Result<bool, SessionError> {
        let session = self.get(code).await?;
        Ok(session.host_id == *user_id)
    }

    async fn session_count(&self) -> usize {
        let now = Utc::now();
        self.sessions
            .iter()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<SessionCode> = self
            .sessions
            .iter()
            .filter(|entry| entry.is_expired(now))
            .map(|entry| entry.key().clone())
            .collect();

        for code in &expired {
            self.drop_session(code);
        }
        expired.len()
    }
}
