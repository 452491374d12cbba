//! Configuration loading and validation
//!
//! Configuration comes from a TOML file with kebab-case keys. Loading parses
//! the file, validation checks value ranges and URL templates before any
//! crawl state is built.

mod parser;
mod types;
mod validation;

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use types::{Config, CrawlerConfig, CredentialsConfig, OutputConfig, SiteConfig};
pub use validation::validate;
