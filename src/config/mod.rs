//! Configuration module for Dragnet
//!
//! Options can come from command-line flags or from a TOML file with the
//! same kebab-case keys; both paths run the same validation.

mod parser;
mod types;
mod validation;

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use types::CrawlConfig;
pub use validation::validate;
