//! Game logic over the session and quiz stores.
//!
//! The controller is stateless: it reads session state, validates answers
//! against the question's shape, computes the time-weighted score, and
//! writes results back through the store's atomic operations. Progress is
//! tracked by the host-synchronized cursor in `live` mode and by
//! per-participant cursors in the self-paced modes.

use std::sync::Arc;

use chrono::Utc;

use trivium::data::{
    AnswerRecord, AnswerResult, AnswerValue, CorrectAnswer, Question, QuestionKind,
    QuestionMessage, QuestionPayload, Quiz, Session, SessionField, index_sets_equal,
};
use trivium::errors::SessionError;
use trivium::id::{SessionCode, UserId};
use trivium::log;

use super::quizzes::QuizStore;
use super::sessions::SessionStore;

/// Points for a correct answer before the time bonus.
pub const BASE_POINTS: u32 = 1000;

/// Maximum time bonus, earned by answering instantly.
pub const MAX_TIME_BONUS: u32 = 500;

/// Checks a submitted answer against the question.
///
/// The answer's JSON shape must match the question type; mismatches and
/// unknown question types are `Invalid`, never a crash.
pub fn check_answer(question: &Question, answer: &AnswerValue) -> Result<bool, SessionError> {
    match &question.kind {
        QuestionKind::SingleMcq | QuestionKind::TrueFalse => {
            let correct = question.correct_answer_index.ok_or_else(|| {
                SessionError::Invalid("Invalid question configuration".to_string())
            })?;
            match answer {
                AnswerValue::Index(index) => Ok(*index == correct),
                _ => Err(SessionError::Invalid(
                    "Expected a single answer index".to_string(),
                )),
            }
        }
        QuestionKind::MultiMcq => {
            let correct = question.correct_answer_indices.as_deref().ok_or_else(|| {
                SessionError::Invalid("Invalid question configuration".to_string())
            })?;
            if correct.is_empty() {
                return Err(SessionError::Invalid(
                    "Invalid question configuration".to_string(),
                ));
            }
            match answer {
                AnswerValue::Indices(indices) => Ok(index_sets_equal(indices, correct)),
                _ => Err(SessionError::Invalid(
                    "Expected a list of answer indices".to_string(),
                )),
            }
        }
        QuestionKind::DragAndDrop => {
            let correct = question.correct_matches.as_ref().ok_or_else(|| {
                SessionError::Invalid("Invalid question configuration".to_string())
            })?;
            if correct.is_empty() {
                return Err(SessionError::Invalid(
                    "Invalid question configuration".to_string(),
                ));
            }
            match answer {
                AnswerValue::Matches(matches) => Ok(matches == correct),
                _ => Err(SessionError::Invalid(
                    "Expected an item-to-target mapping".to_string(),
                )),
            }
        }
        QuestionKind::Other(kind) => Err(SessionError::Invalid(format!(
            "Unknown question type: {kind}"
        ))),
    }
}

/// The correct answer echoed back to the submitter, shaped by the question
/// type.
pub fn correct_answer_of(question: &Question) -> Result<CorrectAnswer, SessionError> {
    match &question.kind {
        QuestionKind::SingleMcq | QuestionKind::TrueFalse => question
            .correct_answer_index
            .map(|index| CorrectAnswer::Index(index.to_string()))
            .ok_or_else(|| SessionError::Invalid("Invalid question configuration".to_string())),
        QuestionKind::MultiMcq => Ok(CorrectAnswer::Indices(
            question.correct_answer_indices.clone().unwrap_or_default(),
        )),
        QuestionKind::DragAndDrop => Ok(CorrectAnswer::Matches(
            question.correct_matches.clone().unwrap_or_default(),
        )),
        QuestionKind::Other(kind) => Err(SessionError::Invalid(format!(
            "Unknown question type: {kind}"
        ))),
    }
}

/// Time-weighted score for a submission.
///
/// Incorrect answers score zero. Correct answers earn the base plus a
/// bonus that decays linearly over the question's time limit. The client
/// timestamp is trusted; negative values clamp to zero elapsed (full
/// bonus), values beyond the limit clamp to zero bonus but stay correct.
/// A missing timestamp earns no bonus.
pub fn score_answer(is_correct: bool, timestamp: Option<f64>, limit: u32) -> u32 {
    if !is_correct || limit == 0 {
        return if is_correct { BASE_POINTS } else { 0 };
    }
    let bonus = match timestamp {
        Some(elapsed) => {
            let elapsed = elapsed.clamp(0.0, limit as f64);
            ((1.0 - elapsed / limit as f64).max(0.0) * MAX_TIME_BONUS as f64).floor() as u32
        }
        None => 0,
    };
    BASE_POINTS + bonus
}

pub struct GameController {
    store: Arc<dyn SessionStore>,
    quizzes: Arc<dyn QuizStore>,
}

impl GameController {
    pub fn new(store: Arc<dyn SessionStore>, quizzes: Arc<dyn QuizStore>) -> Self {
        Self { store, quizzes }
    }

    /// Fetches the quiz a session is playing.
    async fn quiz_for(&self, session: &Session) -> Result<Quiz, SessionError> {
        self.quizzes
            .find_by_id(&session.quiz_id)
            .await?
            .ok_or_else(SessionError::quiz_not_found)
    }

    fn question_message(
        quiz: &Quiz,
        index: u32,
        total: u32,
        time_remaining: u32,
    ) -> Result<QuestionMessage, SessionError> {
        let question = quiz
            .questions
            .get(index as usize)
            .ok_or_else(|| SessionError::NotFound("Question not found".to_string()))?;

        if question.question.trim().is_empty() {
            log::error!("Question {index} has empty question text");
            return Err(SessionError::Invalid(
                "Question has no text".to_string(),
            ));
        }

        Ok(QuestionMessage {
            question: QuestionPayload::from_question(question, index),
            index,
            total,
            time_remaining,
        })
    }

    /// A specific question with the full time limit attached, used when a
    /// question is first dispatched.
    pub async fn question_by_index(
        &self,
        code: &SessionCode,
        index: u32,
    ) -> Result<QuestionMessage, SessionError> {
        let session = self.store.get(code).await?;
        let quiz = self.quiz_for(&session).await?;
        Self::question_message(
            &quiz,
            index,
            quiz.questions.len() as u32,
            session.per_question_time_limit,
        )
    }

    /// The session's current question with the remaining time computed
    /// from the dispatch stamp. Used for reconnects in live mode.
    pub async fn current_question(
        &self,
        code: &SessionCode,
    ) -> Result<QuestionMessage, SessionError> {
        let session = self.store.get(code).await?;
        let quiz = self.quiz_for(&session).await?;
        Self::question_message(
            &quiz,
            session.current_question_index,
            quiz.questions.len() as u32,
            session.remaining_time(Utc::now()),
        )
    }

    /// The question index a participant is currently on: the explicit
    /// cursor when one was set, otherwise derived from their highest
    /// answered index, defaulting to the first question.
    pub async fn participant_index(
        &self,
        code: &SessionCode,
        user_id: &UserId,
    ) -> Result<u32, SessionError> {
        if let Some(index) = self.store.cursor(code, user_id).await? {
            return Ok(index);
        }
        let session = self.store.get(code).await?;
        Ok(session
            .participants
            .get(user_id)
            .and_then(|p| p.max_answered_index())
            .unwrap_or(0))
    }

    /// Validates, scores, and records a submission, returning the result
    /// for the submitter. The store rejects resubmission of the same
    /// question, so the first answer always stands.
    pub async fn submit_answer(
        &self,
        code: &SessionCode,
        user_id: &UserId,
        answer: AnswerValue,
        timestamp: Option<f64>,
    ) -> Result<AnswerResult, SessionError> {
        let session = self.store.get(code).await?;

        let index = if session.mode.is_self_paced() {
            self.participant_index(code, user_id).await?
        } else {
            session.current_question_index
        };

        let quiz = self.quiz_for(&session).await?;
        let question = quiz
            .questions
            .get(index as usize)
            .ok_or_else(|| SessionError::Invalid("Invalid question index".to_string()))?;

        let is_correct = check_answer(question, &answer)?;
        let points = score_answer(is_correct, timestamp, session.per_question_time_limit);

        let new_total_score = self
            .store
            .record_answer(
                code,
                user_id,
                AnswerRecord {
                    question_index: index,
                    answer,
                    timestamp,
                    is_correct,
                    points_earned: points,
                },
            )
            .await?;

        log::debug!(
            "Recorded answer for {user_id} on question {index}: correct={is_correct}, points={points}"
        );

        Ok(AnswerResult {
            is_correct,
            points,
            correct_answer: correct_answer_of(question)?,
            new_total_score,
            question_type: question.kind.clone(),
        })
    }

    /// Advances the host-synchronized cursor and restarts the question
    /// timer. Returns the next question, or `None` when the quiz is
    /// exhausted (the cursor parks at `total`, meaning finished).
    pub async fn advance_session(
        &self,
        code: &SessionCode,
    ) -> Result<Option<QuestionMessage>, SessionError> {
        let session = self.store.get(code).await?;
        let next = session.current_question_index + 1;

        if next >= session.total_questions {
            self.store
                .set_field(
                    code,
                    SessionField::CurrentQuestionIndex(session.total_questions),
                )
                .await?;
            return Ok(None);
        }

        self.store
            .set_field(code, SessionField::CurrentQuestionIndex(next))
            .await?;
        self.store
            .set_field(code, SessionField::QuestionStartTime(Utc::now()))
            .await?;
        self.question_by_index(code, next).await.map(Some)
    }

    /// Advances one participant's own cursor (self-paced). Returns the
    /// next question, or `None` when that participant has finished.
    pub async fn advance_participant(
        &self,
        code: &SessionCode,
        user_id: &UserId,
    ) -> Result<Option<QuestionMessage>, SessionError> {
        let session = self.store.get(code).await?;
        let current = self.participant_index(code, user_id).await?;

        if current + 1 >= session.total_questions {
            return Ok(None);
        }

        let next = current + 1;
        self.store.set_cursor(code, user_id, next).await?;
        self.question_by_index(code, next).await.map(Some)
    }

    /// Start-of-quiz bookkeeping: zero every participant's cursor and
    /// stamp the first question's timer.
    pub async fn begin(&self, code: &SessionCode) -> Result<(), SessionError> {
        let session = self.store.get(code).await?;
        for user_id in session.participants.keys() {
            self.store.set_cursor(code, user_id, 0).await?;
        }
        self.store
            .set_field(code, SessionField::QuestionStartTime(Utc::now()))
            .await?;
        Ok(())
    }
}
