/// Qinjian - relationship journaling backend
///
/// Paired users submit daily check-ins; an OpenAI-compatible chat service
/// turns them into sentiment scores and relationship health reports, and a
/// shared tree grows with the pair's activity.

pub mod account;
pub mod ai;
pub mod api;
pub mod auth;
pub mod checkin;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod pairing;
pub mod rate_limit;
pub mod reports;
pub mod server;
pub mod tree;
pub mod uploads;

pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{AppError, AppResult};
