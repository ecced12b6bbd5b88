pub mod loader;
pub mod types;

pub use loader::{Config, DEFAULT_CONFIG_FILE};
pub use types::*;
