use crate::coerce::ParsePolicy;
use std::path::PathBuf;

/// Flags and source files for a single load call
///
/// # Example
/// ```rust
/// use layered_env::LoadOptions;
///
/// let options = LoadOptions::new()
///     .environment_files([".env", ".env.local"])
///     .error_on_missing_file(false)
///     .force(true);
///
/// assert_eq!(options.environment_files.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LoadOptions {
    /// Fail when any visited field resolves to no value
    pub force: bool,
    /// Env files merged in order, later files win
    pub environment_files: Vec<PathBuf>,
    /// Treat a missing env file as fatal instead of skipping it
    pub error_on_missing_file: bool,
    /// What happens when a value cannot be parsed into its field type
    pub parse_policy: ParsePolicy,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Append a single env file
    pub fn environment_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.environment_files.push(path.into());
        self
    }

    /// Replace the list of env files
    pub fn environment_files<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.environment_files = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn error_on_missing_file(mut self, error: bool) -> Self {
        self.error_on_missing_file = error;
        self
    }

    pub fn parse_policy(mut self, policy: ParsePolicy) -> Self {
        self.parse_policy = policy;
        self
    }

    /// Shorthand for switching between [`ParsePolicy::Strict`] and [`ParsePolicy::Permissive`]
    pub fn strict(self, strict: bool) -> Self {
        self.parse_policy(if strict {
            ParsePolicy::Strict
        } else {
            ParsePolicy::Permissive
        })
    }
}
