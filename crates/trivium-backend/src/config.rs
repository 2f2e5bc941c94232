//! Environment-backed configuration for the backend.

use std::str::FromStr;
use std::time::Duration;

use trivium::log;

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP/WebSocket server binds to.
    pub bind_addr: String,
    /// TTL of a session and all of its derived keys.
    pub session_expiry_hours: i64,
    /// Fallback per-question time limit in seconds.
    pub question_time_seconds: u32,
    /// Grace period before a disconnected participant is dropped from a
    /// waiting session's roster.
    pub reconnection_timeout_seconds: u64,
    /// Join rejection threshold per session.
    pub max_participants_per_session: usize,
    /// Optional path to a JSON file of quizzes to preload into the quiz
    /// store at startup.
    pub quiz_fixtures: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("TRIVIUM_BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:3030".to_string()),
            session_expiry_hours: env_parse("SESSION_EXPIRY_HOURS", 24),
            question_time_seconds: env_parse("QUESTION_TIME_SECONDS", 30),
            reconnection_timeout_seconds: env_parse("RECONNECTION_TIMEOUT", 60),
            max_participants_per_session: env_parse("MAX_PARTICIPANTS_PER_SESSION", 50),
            quiz_fixtures: std::env::var("TRIVIUM_QUIZZES").ok(),
        }
    }

    pub fn session_expiry(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_expiry_hours)
    }

    pub fn reconnection_timeout(&self) -> Duration {
        Duration::from_secs(self.reconnection_timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3030".to_string(),
            session_expiry_hours: 24,
            question_time_seconds: 30,
            reconnection_timeout_seconds: 60,
            max_participants_per_session: 50,
            quiz_fixtures: None,
        }
    }
}

fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("Ignoring unparseable {key}={raw}, using default");
            default
        }),
        Err(_) => default,
    }
}
