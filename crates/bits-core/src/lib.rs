pub mod config;
pub mod error;
pub mod types;

pub use config::BitsConfig;
pub use error::{BitsError, Result};
pub use types::*;
