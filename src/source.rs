//! Env file loading.
//!
//! Files are merged into an in-memory [`ValueMap`] and never written to the
//! process environment, so loading twice gives the same result and nothing
//! leaks into unrelated code.
//!
//! Format, one entry per line:
//!
//! ```text
//! # comment
//! HOST=localhost
//! GREETING="hello"
//! MOTD="first line
//! second line"
//! ```

use crate::error::ConfigError;
use std::{
    collections::{HashMap, hash_map},
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};
use tracing::{debug, warn};

/// Raw values merged from env files, keyed by source key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ValueMap(HashMap<String, String>);

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Insert a value, replacing any earlier value for the key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, String> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for ValueMap {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ValueMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = ValueMap::new();
        values.extend(iter);
        values
    }
}

/// Parse `KEY=VALUE` lines from a reader into `values`
///
/// Blank lines, `#` comments and lines without `=` are skipped. A value that
/// opens a double quote without closing it continues over the following lines
/// until one ends with `"`. Returns the number of entries stored.
pub fn parse_source<R: BufRead>(reader: R, values: &mut ValueMap) -> io::Result<usize> {
    let mut stored = 0;
    let mut pending: Option<(String, String)> = None;

    for line in reader.lines() {
        let line = line?;

        if let Some((key, mut value)) = pending.take() {
            value.push('\n');
            match line.trim_end().strip_suffix('"') {
                Some(last) => {
                    value.push_str(last);
                    values.insert(key, value);
                    stored += 1;
                }
                None => {
                    value.push_str(&line);
                    pending = Some((key, value));
                }
            }
            continue;
        }

        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() {
            continue;
        }

        if let Some(opened) = value.strip_prefix('"') {
            if !value.ends_with('"') {
                pending = Some((key.to_string(), opened.to_string()));
                continue;
            }
        }

        values.insert(key, value.trim_matches('"'));
        stored += 1;
    }

    if let Some((key, _)) = pending {
        warn!(key = %key, "quoted value is never closed, entry dropped");
    }

    Ok(stored)
}

/// Merge a single env file into `values`, later entries win
pub fn merge_file(path: impl AsRef<Path>, values: &mut ValueMap) -> Result<usize, ConfigError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| ConfigError::io(path, e))?;
    let stored = parse_source(BufReader::new(file), values).map_err(|e| ConfigError::io(path, e))?;

    debug!(path = %path.display(), entries = stored, "merged env file");
    Ok(stored)
}

/// Merge env files in order into a fresh [`ValueMap`]
///
/// A missing file is skipped unless `error_on_missing_file` is set, any other
/// read failure is returned immediately.
pub fn load_sources<P: AsRef<Path>>(
    paths: &[P],
    error_on_missing_file: bool,
) -> Result<ValueMap, ConfigError> {
    let mut values = ValueMap::new();

    for path in paths {
        match merge_file(path, &mut values) {
            Ok(_) => {}
            Err(err) if err.is_recoverable() && !error_on_missing_file => {
                debug!(path = %path.as_ref().display(), "env file not found, skipping");
            }
            Err(err) => return Err(err),
        }
    }

    Ok(values)
}
