pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod logging;
pub mod report;
pub mod status;
pub mod sweeper;

pub use cache::PresenceCache;
pub use clock::{Clock, SystemClock};
pub use config::{AttendanceConfig, Config, DayBoundary};
pub use db::Database;
pub use engine::{AttendanceEngine, Outcome, Statistics};
pub use error::{Error, Result};
pub use status::AttendanceStatus;
