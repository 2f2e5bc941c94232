//! Backend services for session state, quiz content, game logic, and
//! leaderboard projection.
//!
//! This module provides the service layer abstractions and implementations.
//! The in-memory store implementations are suitable for single-process
//! deployments and tests; the traits are the seam where networked backends
//! slot in.

pub mod game;
pub mod leaderboard;
pub mod quizzes;
pub mod sessions;

pub use game::GameController;
pub use leaderboard::LeaderboardProjection;
pub use quizzes::{QuizStore, QuizStoreInMemory};
pub use sessions::{SessionStore, SessionStoreInMemory};
