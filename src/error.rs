use colored::Colorize;
use std::{io, path::PathBuf};
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A listed source file does not exist
    ///
    /// Only fatal when `error_on_missing_file` is set, otherwise the file is skipped.
    #[error("source file {} does not exist", .path.display())]
    FileNotFound { path: PathBuf },

    /// Any other failure while reading a source file
    #[error("failed to read source file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A forced field resolved to no value in any source
    #[error("missing value for {key} (field `{field}`)")]
    MissingRequiredValue { field: String, key: String },

    /// The field's declared type cannot be populated from a string
    #[error("env: type \"{type_name}\" not supported (field `{field}`)")]
    UnsupportedType {
        field: String,
        type_name: &'static str,
    },

    /// A value could not be parsed under the strict parse policy
    #[error("invalid value '{value}' for {key} (field `{field}`), expected {expected}")]
    MalformedValue {
        field: String,
        key: String,
        value: String,
        expected: &'static str,
    },
}

impl ConfigError {
    /// Whether the loader may skip past this error and continue
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ConfigError::FileNotFound { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::FileNotFound { path }
        } else {
            ConfigError::Io { path, source }
        }
    }
}

/// Render an error as a coloured, multi-line report meant for a terminal
pub fn format_config_error(error: &ConfigError) -> String {
    match error {
        ConfigError::FileNotFound { path } => format!(
            "{}: Source file does not exist",
            path.display().to_string().magenta().bold()
        ),
        ConfigError::Io { path, source } => format!(
            "{}: Could not be read\n\tReason: {}",
            path.display().to_string().magenta().bold(),
            source
        ),
        ConfigError::MissingRequiredValue { field, key } => format!(
            "{}: Is missing from every source and is required\n\tField: {}",
            key.magenta().bold(),
            field
        ),
        ConfigError::UnsupportedType { field, type_name } => format!(
            "{}: Type {} cannot be loaded from a string",
            field.magenta().bold(),
            type_name.red()
        ),
        ConfigError::MalformedValue {
            field,
            key,
            value,
            expected,
        } => format!(
            "{}: Invalid value {}\n\tField: {}\n\tExpected: {}",
            key.magenta().bold(),
            format!("'{}'", value).red(),
            field,
            expected.cyan()
        ),
    }
}
