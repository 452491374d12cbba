//! Cratedigger: an authenticated social-graph collection crawler
//!
//! This crate implements a depth-bounded breadth-first crawl of a social
//! graph: each visited user's public collection is scraped, and unvisited
//! contacts are enqueued for further traversal. A fixed pool of worker tasks
//! shares a pool of authenticated HTTP sessions and a single deduplicating
//! result registry.

pub mod auth;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod registry;
pub mod session;

use thiserror::Error;

/// Main error type for crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Fetch failed for {url}: HTTP {status}")]
    Fetch { url: String, status: u16 },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Login page contract changed: {0}")]
    ProtocolMismatch(String),

    #[error("Challenge input failed: {0}")]
    Challenge(String),

    #[error("No registry entry for entity {id}")]
    EntityLookup { id: String },

    #[error("Session pool error: {0}")]
    Pool(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Result serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use auth::{Authenticator, ChallengeSolver, FetchedPage};
pub use config::Config;
pub use crawler::{CollectionFetcher, CrawlTask, Frontier, Scheduler};
pub use extract::{Challenge, LoginForm, Neighbor, PageExtractor, SiteExtractor};
pub use registry::{CollectionItem, Entity, Registry, VisitState};
pub use session::{PooledSession, Session, SessionPool};
