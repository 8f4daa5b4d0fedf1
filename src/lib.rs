//! Populate typed configuration structs from layered sources.
//!
//! For every field, the first non-empty value wins:
//!
//! 1. env files listed in [`LoadOptions::environment_files`], later files first
//! 2. the process environment (or any injected [`EnvSource`])
//! 3. the `default` literal declared on the field
//!
//! Fields that already hold a non-zero value are kept as they are, except
//! `bool` fields which are always resolved.
//!
//! ```rust
//! use layered_env::{LoadOptions, Populate};
//! use std::collections::HashMap;
//!
//! #[derive(Debug, Default, Populate)]
//! struct Config {
//!     #[env(key = "APP_NAME", default = "demo")]
//!     name: String,
//!     #[env(key = "APP_WORKERS", default = "4")]
//!     workers: usize,
//!     #[env(nested)]
//!     database: Database,
//! }
//!
//! #[derive(Debug, Default, Populate)]
//! struct Database {
//!     #[env(key = "DATABASE_URL", forced)]
//!     url: String,
//! }
//!
//! let env = HashMap::from([("DATABASE_URL".to_string(), "postgres://localhost".to_string())]);
//! let mut config = Config::default();
//! config.load_with(&LoadOptions::new(), &env).unwrap();
//!
//! assert_eq!(config.name, "demo");
//! assert_eq!(config.workers, 4);
//! assert_eq!(config.database.url, "postgres://localhost");
//! ```

pub mod coerce;
pub mod docs;
pub mod environment;
pub mod error;
pub mod field;
pub mod options;
pub mod populate;
pub mod source;

// Re-export main types
pub use coerce::{EnvValue, ParsePolicy};
pub use docs::{render_docs, write_docs};
pub use environment::{EnvSource, ProcessEnv};
pub use error::{ConfigError, format_config_error};
pub use field::{FieldDescriptor, FieldKind};
pub use options::LoadOptions;
pub use populate::{Origin, Populate, Resolver, load, load_with, populate};
pub use source::{ValueMap, load_sources, merge_file, parse_source};

// Re-export macro
pub use layered_env_macros::Populate;
