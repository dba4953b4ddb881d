pub mod config;
pub mod config_loader;
pub mod error;

pub use config::*;
pub use config_loader::{ConfigLoadOptions, ConfigLoader, ConfigOverrides};
pub use error::*;
