//! Read-only access to quiz content.
//!
//! The engine consumes quizzes through the narrow [`QuizStore`] trait; the
//! authoring side of the product owns the real records. The in-memory
//! implementation is used for single-process deployments (seeded from a
//! fixtures file) and for tests.

use async_trait::async_trait;
use dashmap::DashMap;

use trivium::data::Quiz;
use trivium::errors::SessionError;

#[async_trait]
pub trait QuizStore: Send + Sync {
    /// Looks up a quiz by its opaque ID. `Ok(None)` means the quiz does
    /// not exist; `Err` means the backing store failed.
    async fn find_by_id(&self, quiz_id: &str) -> Result<Option<Quiz>, SessionError>;
}

pub struct QuizStoreInMemory {
    quizzes: DashMap<String, Quiz>,
}

impl QuizStoreInMemory {
    pub fn new() -> Self {
        Self {
            quizzes: DashMap::new(),
        }
    }

    pub fn insert(&self, quiz_id: impl Into<String>, quiz: Quiz) {
        self.quizzes.insert(quiz_id.into(), quiz);
    }

    pub fn is_empty(&self) -> bool {
        self.quizzes.is_empty()
    }
}

impl Default for QuizStoreInMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuizStore for QuizStoreInMemory {
    async fn find_by_id(&self, quiz_id: &str) -> Result<Option<Quiz>, SessionError> {
        Ok(self.quizzes.get(quiz_id).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn find_by_id_returns_none_for_unknown() {
        let store = QuizStoreInMemory::new();
        assert!(store.find_by_id("missing").await.unwrap().is_none());

        store.insert(
            "quiz-1",
            Quiz {
                title: "Capitals".to_string(),
                questions: vec![],
            },
        );
        let quiz = store.find_by_id("quiz-1").await.unwrap().unwrap();
        assert_eq!(quiz.title, "Capitals");
    }
}
