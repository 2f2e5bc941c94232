//! Ranked views over participant scores.
//!
//! The projection never mutates session state. Ordering is descending by
//! score, then ascending by answered count (fewer answers for the same
//! score ranks higher), with a final tie-break on user id so the output is
//! total and deterministic. Positions are dense, `1..=N`.

use std::sync::Arc;

use trivium::data::{FinalResultEntry, LeaderboardEntry, Session};
use trivium::errors::SessionError;
use trivium::id::SessionCode;

use super::sessions::SessionStore;

pub struct LeaderboardProjection {
    store: Arc<dyn SessionStore>,
}

impl LeaderboardProjection {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// The live leaderboard for a session.
    pub async fn live(&self, code: &SessionCode) -> Result<Vec<LeaderboardEntry>, SessionError> {
        let session = self.store.get(code).await?;
        Ok(Self::project(&session))
    }

    /// Final results: the live view extended with accuracy stats.
    pub async fn final_results(
        &self,
        code: &SessionCode,
    ) -> Result<Vec<FinalResultEntry>, SessionError> {
        let session = self.store.get(code).await?;
        Ok(Self::project_final(&session))
    }

    /// Pure projection of a session snapshot into ranked entries.
    pub fn project(session: &Session) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = session
            .participants
            .values()
            .map(|participant| LeaderboardEntry {
                position: 0,
                user_id: participant.user_id.clone(),
                username: participant.username.clone(),
                score: participant.score,
                answered_count: participant.answers.len() as u32,
                total_questions: session.total_questions,
                current_question: session.current_question_index + 1,
                is_connected: participant.connected,
            })
            .collect();

        entries.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.answered_count.cmp(&b.answered_count))
                .then_with(|| a.user_id.as_str().cmp(b.user_id.as_str()))
        });

        for (index, entry) in entries.iter_mut().enumerate() {
            entry.position = index as u32 + 1;
        }
        entries
    }

    pub fn project_final(session: &Session) -> Vec<FinalResultEntry> {
        Self::project(session)
            .into_iter()
            .map(|entry| {
                let (correct, answered) = session
                    .participants
                    .get(&entry.user_id)
                    .map(|p| (p.correct_count(), p.answers.len() as u32))
                    .unwrap_or((0, 0));

                let accuracy = if answered > 0 {
                    ((correct as f64 / answered as f64) * 1000.0).round() / 10.0
                } else {
                    0.0
                };

                FinalResultEntry {
                    entry,
                    accuracy,
                    correct_answers: correct,
                    wrong_answers: answered - correct,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trivium::data::{AnswerRecord, AnswerValue, NewSession, SessionMode};
    use trivium::id::UserId;

    fn session_with_scores(scores: &[(&str, u32, u32)]) -> Session {
        // (user, score, answered_count); answers marked correct iff they
        // carry points
        let mut session = Session::new(
            "ABC123".into(),
            NewSession {
                quiz_id: "quiz-1".to_string(),
                host_id: "host-1".into(),
                mode: SessionMode::Live,
                per_question_time_limit: 30,
                quiz_title: "Capitals".to_string(),
                total_questions: 3,
            },
            chrono::Duration::hours(24),
        );

        for (user, score, answered) in scores {
            session.upsert_participant(&UserId::from(*user), user, 50);
            let per_answer = if *answered > 0 { score / answered } else { 0 };
            for i in 0..*answered {
                session
                    .record_answer(
                        &UserId::from(*user),
                        AnswerRecord {
                            question_index: i,
                            answer: AnswerValue::Index(0),
                            timestamp: Some(1.0),
                            is_correct: per_answer > 0,
                            points_earned: per_answer,
                        },
                    )
                    .unwrap();
            }
        }
        session
    }

    #[test]
    fn ordering_score_then_efficiency_then_user_id() {
        // A and B tie on score; A answered fewer questions so ranks first
        let session = session_with_scores(&[("b", 1500, 3), ("c", 800, 2), ("a", 1500, 2)]);
        let entries = LeaderboardProjection::project(&session);

        let order: Vec<&str> = entries.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        let positions: Vec<u32> = entries.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[test]
    fn equal_entries_fall_back_to_user_id() {
        let session = session_with_scores(&[("y", 1000, 2), ("x", 1000, 2)]);
        let entries = LeaderboardProjection::project(&session);
        let order: Vec<&str> = entries.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(order, vec!["x", "y"]);
    }

    #[test]
    fn positions_are_dense_from_one() {
        let session = session_with_scores(&[("a", 10, 1), ("b", 20, 1), ("c", 30, 1), ("d", 0, 0)]);
        let entries = LeaderboardProjection::project(&session);
        let positions: Vec<u32> = entries.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4]);
    }

    #[test]
    fn final_results_carry_accuracy() {
        let mut session = session_with_scores(&[]);
        session.upsert_participant(&"a".into(), "Ada", 50);
        for (index, correct) in [(0u32, true), (1u32, false)] {
            session
                .record_answer(
                    &"a".into(),
                    AnswerRecord {
                        question_index: index,
                        answer: AnswerValue::Index(0),
                        timestamp: Some(1.0),
                        is_correct: correct,
                        points_earned: if correct { 1450 } else { 0 },
                    },
                )
                .unwrap();
        }

        let results = LeaderboardProjection::project_final(&session);
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.entry.score, 1450);
        assert_eq!(result.accuracy, 50.0);
        assert_eq!(result.correct_answers, 1);
        assert_eq!(result.wrong_answers, 1);
        assert_eq!(
            result.correct_answers + result.wrong_answers,
            result.entry.answered_count
        );
    }

    #[test]
    fn accuracy_is_zero_with_no_answers() {
        let mut session = session_with_scores(&[]);
        session.upsert_participant(&"a".into(), "Ada", 50);

        let results = LeaderboardProjection::project_final(&session);
        assert_eq!(results[0].accuracy, 0.0);
        assert_eq!(results[0].correct_answers, 0);
        assert_eq!(results[0].wrong_answers, 0);
    }

    #[test]
    fn accuracy_rounds_to_one_decimal() {
        let mut session = session_with_scores(&[]);
        session.upsert_participant(&"a".into(), "Ada", 50);
        for (index, correct) in [(0u32, true), (1, false), (2, false)] {
            session
                .record_answer(
                    &"a".into(),
                    AnswerRecord {
                        question_index: index,
                        answer: AnswerValue::Index(0),
                        timestamp: None,
                        is_correct: correct,
                        points_earned: 0,
                    },
                )
                .unwrap();
        }

        let results = LeaderboardProjection::project_final(&session);
        // 1/3 correct -> 33.3 after rounding to one decimal
        assert_eq!(results[0].accuracy, 33.3);
    }
}
