use std::time::Duration;

use crate::rubric::{RubricWeights, COURSES};
use crate::workflow::DEFAULT_SESSION_TTL;

const DEFAULT_PORT: u16 = 8501;
const DEFAULT_MAX_UPLOAD_MB: usize = 25;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub chat_url: String,
    pub max_upload_bytes: usize,
    /// Idle time after which an unsaved grading session is dropped.
    pub session_ttl: Duration,
    pub courses: Vec<String>,
    pub weights: RubricWeights,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://submissions.db".to_string());

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let chat_url = std::env::var("CHAT_URL")
            .unwrap_or_else(|_| "https://chat.openai.com/chat".to_string());

        let max_upload_mb: usize = std::env::var("MAX_UPLOAD_MB")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_MB);

        let session_ttl = std::env::var("SESSION_TTL_MINS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(|mins| Duration::from_secs(mins * 60))
            .unwrap_or(DEFAULT_SESSION_TTL);

        Self {
            database_url,
            host,
            port,
            chat_url,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            session_ttl,
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://submissions.db".to_string(),
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            chat_url: "https://chat.openai.com/chat".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            session_ttl: DEFAULT_SESSION_TTL,
            courses: COURSES.iter().map(|c| c.to_string()).collect(),
            weights: RubricWeights::standard(),
        }
    }
}
