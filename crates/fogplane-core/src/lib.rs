pub mod config;
pub mod types;

pub use config::ControllerConfig;
pub use types::*;
