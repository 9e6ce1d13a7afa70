pub mod config;
pub mod error;
pub mod mention;
pub mod read;
pub mod types;

pub use config::{Config, ConfigError};
pub use error::{ApiError, AuthError, WriteError};
pub use read::TrackerRead;
