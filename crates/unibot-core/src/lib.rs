pub mod config;
pub mod error;

pub use config::UnibotConfig;
pub use error::{Result, UnibotError};
