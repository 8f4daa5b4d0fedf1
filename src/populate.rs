use crate::{
    coerce::{CoerceError, EnvValue, ParsePolicy},
    environment::{EnvSource, ProcessEnv},
    error::{ConfigError, format_config_error},
    field::FieldDescriptor,
    options::LoadOptions,
    source::{ValueMap, load_sources},
};
use tracing::{debug, trace, warn};

/// A record that can be filled in place from layered sources
///
/// Normally implemented with `#[derive(Populate)]`:
///
/// ```rust
/// use layered_env::{LoadOptions, Populate};
/// use std::collections::HashMap;
///
/// #[derive(Debug, Default, Populate)]
/// struct Server {
///     #[env(key = "EXAMPLE_HOST", default = "localhost")]
///     host: String,
///     #[env(key = "EXAMPLE_PORT", default = "8080")]
///     port: u16,
/// }
///
/// let env = HashMap::from([("EXAMPLE_PORT".to_string(), "9000".to_string())]);
/// let mut server = Server::default();
/// server.load_with(&LoadOptions::new(), &env).unwrap();
///
/// assert_eq!(server.host, "localhost");
/// assert_eq!(server.port, 9000);
/// ```
pub trait Populate {
    /// One entry per field, in declaration order
    const FIELDS: &'static [FieldDescriptor];

    /// Resolve every field of this record, stopping at the first error
    fn populate_with(&mut self, resolver: &Resolver<'_>) -> Result<(), ConfigError>;

    /// Load env files and the process environment into this record
    fn load(&mut self, options: &LoadOptions) -> Result<(), ConfigError>
    where
        Self: Sized,
    {
        load(self, options)
    }

    /// Like [`Populate::load`], with an injected environment
    fn load_with<E: EnvSource>(&mut self, options: &LoadOptions, env: &E) -> Result<(), ConfigError>
    where
        Self: Sized,
    {
        load_with(self, options, env)
    }

    /// Load from the process environment, panicking with a readable report on error
    fn load_or_panic(&mut self, options: &LoadOptions)
    where
        Self: Sized,
    {
        if let Err(err) = load(self, options) {
            panic!("Configuration failed to load:\n  - {}", format_config_error(&err));
        }
    }

    /// Build a record from `Default` and load it
    fn loaded(options: &LoadOptions) -> Result<Self, ConfigError>
    where
        Self: Sized + Default,
    {
        let mut record = Self::default();
        load(&mut record, options)?;
        Ok(record)
    }
}

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    File,
    Environment,
    Default,
}

/// Shared state for one populate call, handed down through nested records
pub struct Resolver<'a> {
    options: &'a LoadOptions,
    values: &'a ValueMap,
    env: &'a dyn EnvSource,
    path: String,
}

impl<'a> Resolver<'a> {
    pub fn new(options: &'a LoadOptions, values: &'a ValueMap, env: &'a dyn EnvSource) -> Self {
        Self {
            options,
            values,
            env,
            path: String::new(),
        }
    }

    /// First non-empty value from env files, then the environment, then the default
    pub fn lookup(&self, field: &FieldDescriptor) -> Option<(String, Origin)> {
        if let Some(value) = self.values.get(field.key).filter(|v| !v.is_empty()) {
            return Some((value.to_string(), Origin::File));
        }
        if let Some(value) = self.env.get(field.key).filter(|v| !v.is_empty()) {
            return Some((value, Origin::Environment));
        }
        field
            .default
            .filter(|v| !v.is_empty())
            .map(|v| (v.to_string(), Origin::Default))
    }

    /// Resolve a single value field into `slot`
    ///
    /// A slot that already holds a non-zero value is left alone, unless its
    /// type always resolves (`bool`).
    pub fn resolve<T: EnvValue>(
        &self,
        field: &FieldDescriptor,
        slot: &mut T,
    ) -> Result<(), ConfigError> {
        let _span = tracing::debug_span!("resolve", key = field.key).entered();

        if !T::ALWAYS_RESOLVE && !slot.is_unset() {
            trace!("field already set, keeping current value");
            return Ok(());
        }

        let Some((raw, origin)) = self.lookup(field) else {
            if self.options.force || field.forced {
                return Err(ConfigError::MissingRequiredValue {
                    field: self.field_path(field),
                    key: field.key.to_string(),
                });
            }
            trace!("no value in any source");
            return Ok(());
        };

        trace!(origin = ?origin, "resolved value");
        let coerced = match T::coerce(&raw, ParsePolicy::Strict) {
            Err(CoerceError::Malformed { expected, .. })
                if self.options.parse_policy == ParsePolicy::Permissive =>
            {
                warn!(key = field.key, expected, "value could not be parsed, using the zero value");
                T::coerce(&raw, ParsePolicy::Permissive)
            }
            result => result,
        };
        *slot = coerced.map_err(|err| match err {
            CoerceError::Malformed { value, expected } => ConfigError::MalformedValue {
                field: self.field_path(field),
                key: field.key.to_string(),
                value,
                expected,
            },
            CoerceError::Unsupported => ConfigError::UnsupportedType {
                field: self.field_path(field),
                type_name: field.type_name,
            },
        })?;
        Ok(())
    }

    /// Walk a nested record with the same options and sources
    pub fn descend<R: Populate>(
        &self,
        field: &FieldDescriptor,
        record: &mut R,
    ) -> Result<(), ConfigError> {
        let nested = Resolver {
            options: self.options,
            values: self.values,
            env: self.env,
            path: self.field_path(field),
        };
        record.populate_with(&nested)
    }

    fn field_path(&self, field: &FieldDescriptor) -> String {
        if self.path.is_empty() {
            field.name.to_string()
        } else {
            format!("{}.{}", self.path, field.name)
        }
    }
}

/// Fill `record` from an already merged value map and an environment
///
/// On error the record keeps whatever was assigned before the failing field.
pub fn populate<T: Populate>(
    record: &mut T,
    options: &LoadOptions,
    values: &ValueMap,
    env: &dyn EnvSource,
) -> Result<(), ConfigError> {
    record.populate_with(&Resolver::new(options, values, env))
}

/// Merge the configured env files and populate `record` against `env`
pub fn load_with<T: Populate, E: EnvSource>(
    record: &mut T,
    options: &LoadOptions,
    env: &E,
) -> Result<(), ConfigError> {
    let values = load_sources(&options.environment_files, options.error_on_missing_file)?;
    populate(record, options, &values, env)?;

    debug!(
        files = options.environment_files.len(),
        file_values = values.len(),
        "configuration loaded"
    );
    Ok(())
}

/// Merge the configured env files and populate `record` against the process environment
pub fn load<T: Populate>(record: &mut T, options: &LoadOptions) -> Result<(), ConfigError> {
    load_with(record, options, &ProcessEnv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::HashMap,
        io,
        sync::{Arc, Mutex},
    };
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Debug, Default)]
    struct Database {
        url: String,
        pool: u32,
    }

    impl Populate for Database {
        const FIELDS: &'static [FieldDescriptor] = &[
            FieldDescriptor::value("url", "DATABASE_URL", "String").with_forced(true),
            FieldDescriptor::value("pool", "DATABASE_POOL", "u32").with_default("4"),
        ];

        fn populate_with(&mut self, resolver: &Resolver<'_>) -> Result<(), ConfigError> {
            resolver.resolve(&Self::FIELDS[0], &mut self.url)?;
            resolver.resolve(&Self::FIELDS[1], &mut self.pool)?;
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct Server {
        host: String,
        port: u16,
        debug: bool,
        tags: Vec<String>,
        db: Database,
        name: String,
    }

    impl Populate for Server {
        const FIELDS: &'static [FieldDescriptor] = &[
            FieldDescriptor::value("host", "HOST", "String"),
            FieldDescriptor::value("port", "PORT", "u16").with_default("8080"),
            FieldDescriptor::value("debug", "DEBUG", "bool"),
            FieldDescriptor::value("tags", "TAGS", "Vec<String>"),
            FieldDescriptor::record("db", "Database", Database::FIELDS),
            FieldDescriptor::value("name", "NAME", "String"),
        ];

        fn populate_with(&mut self, resolver: &Resolver<'_>) -> Result<(), ConfigError> {
            resolver.resolve(&Self::FIELDS[0], &mut self.host)?;
            resolver.resolve(&Self::FIELDS[1], &mut self.port)?;
            resolver.resolve(&Self::FIELDS[2], &mut self.debug)?;
            resolver.resolve(&Self::FIELDS[3], &mut self.tags)?;
            resolver.descend(&Self::FIELDS[4], &mut self.db)?;
            resolver.resolve(&Self::FIELDS[5], &mut self.name)?;
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct Grid {
        cells: Vec<Vec<u8>>,
    }

    impl Populate for Grid {
        const FIELDS: &'static [FieldDescriptor] =
            &[FieldDescriptor::value("cells", "GRID_CELLS", "Vec<Vec<u8>>")];

        fn populate_with(&mut self, resolver: &Resolver<'_>) -> Result<(), ConfigError> {
            resolver.resolve(&Self::FIELDS[0], &mut self.cells)
        }
    }

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn values(pairs: &[(&str, &str)]) -> ValueMap {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_file_value_beats_environment_and_default() {
        let mut server = Server::default();
        let env = map(&[("PORT", "9000"), ("DATABASE_URL", "postgres://env")]);
        let files = values(&[("PORT", "7000")]);

        populate(&mut server, &LoadOptions::new(), &files, &env).unwrap();

        assert_eq!(server.port, 7000);
        assert_eq!(server.db.url, "postgres://env");
    }

    #[test]
    fn test_empty_file_value_falls_through() {
        let mut server = Server::default();
        let env = map(&[("HOST", "from-env"), ("DATABASE_URL", "x")]);
        let files = values(&[("HOST", "")]);

        populate(&mut server, &LoadOptions::new(), &files, &env).unwrap();

        assert_eq!(server.host, "from-env");
    }

    #[test]
    fn test_default_used_when_absent() {
        let mut server = Server::default();
        let env = map(&[("DATABASE_URL", "x")]);

        populate(&mut server, &LoadOptions::new(), &ValueMap::new(), &env).unwrap();

        assert_eq!(server.port, 8080);
        assert_eq!(server.db.pool, 4);
        assert_eq!(server.host, "");
    }

    #[test]
    fn test_preset_fields_are_kept() {
        let mut server = Server {
            host: "preset".to_string(),
            port: 1234,
            tags: vec!["keep".to_string()],
            ..Default::default()
        };
        let env = map(&[
            ("HOST", "other"),
            ("PORT", "9999"),
            ("TAGS", "a,b"),
            ("DATABASE_URL", "x"),
        ]);

        populate(&mut server, &LoadOptions::new(), &ValueMap::new(), &env).unwrap();

        assert_eq!(server.host, "preset");
        assert_eq!(server.port, 1234);
        assert_eq!(server.tags, vec!["keep".to_string()]);
    }

    #[test]
    fn test_bool_is_always_resolved() {
        let mut server = Server {
            debug: true,
            ..Default::default()
        };
        let env = map(&[("DEBUG", "false"), ("DATABASE_URL", "x")]);

        populate(&mut server, &LoadOptions::new(), &ValueMap::new(), &env).unwrap();
        assert!(!server.debug);

        let env = map(&[("DEBUG", "true"), ("DATABASE_URL", "x")]);
        populate(&mut server, &LoadOptions::new(), &ValueMap::new(), &env).unwrap();
        assert!(server.debug);
    }

    #[test]
    fn test_preset_bool_kept_without_source() {
        let mut server = Server {
            debug: true,
            ..Default::default()
        };
        let env = map(&[("DATABASE_URL", "x")]);

        populate(&mut server, &LoadOptions::new(), &ValueMap::new(), &env).unwrap();

        assert!(server.debug);
    }

    #[test]
    fn test_force_reports_first_missing_field() {
        let mut server = Server::default();
        let options = LoadOptions::new().force(true);

        let err = populate(&mut server, &options, &ValueMap::new(), &map(&[])).unwrap_err();

        match err {
            ConfigError::MissingRequiredValue { field, key } => {
                assert_eq!(field, "host");
                assert_eq!(key, "HOST");
            }
            other => panic!("expected MissingRequiredValue, got {other:?}"),
        }
    }

    #[test]
    fn test_forced_field_names_nested_path() {
        let mut server = Server::default();

        let err = populate(&mut server, &LoadOptions::new(), &ValueMap::new(), &map(&[]))
            .unwrap_err();

        match err {
            ConfigError::MissingRequiredValue { field, key } => {
                assert_eq!(field, "db.url");
                assert_eq!(key, "DATABASE_URL");
            }
            other => panic!("expected MissingRequiredValue, got {other:?}"),
        }
    }

    #[test]
    fn test_forced_field_preset_is_accepted() {
        let mut db = Database {
            url: "postgres://preset".to_string(),
            pool: 0,
        };

        populate(&mut db, &LoadOptions::new(), &ValueMap::new(), &map(&[])).unwrap();

        assert_eq!(db.url, "postgres://preset");
        assert_eq!(db.pool, 4);
    }

    #[test]
    fn test_nested_error_aborts_remaining_fields() {
        let mut server = Server::default();
        let env = map(&[("HOST", "set-before"), ("NAME", "never-reached")]);

        let err = populate(&mut server, &LoadOptions::new(), &ValueMap::new(), &env);

        assert!(err.is_err());
        assert_eq!(server.host, "set-before");
        assert_eq!(server.name, "");
    }

    #[test]
    fn test_permissive_malformed_value_is_zero() {
        let mut server = Server::default();
        let env = map(&[("PORT", "eighty"), ("DATABASE_URL", "x")]);

        populate(&mut server, &LoadOptions::new(), &ValueMap::new(), &env).unwrap();

        assert_eq!(server.port, 0);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_permissive_warning_names_key() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let mut server = Server::default();
        let env = map(&[("PORT", "eighty"), ("DATABASE_URL", "x")]);

        tracing::subscriber::with_default(subscriber, || {
            populate(&mut server, &LoadOptions::new(), &ValueMap::new(), &env).unwrap();
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let line = output
            .lines()
            .find(|line| line.contains("using the zero value"))
            .expect("permissive fallback should log a warning");
        // Event fields follow the message, span fields come before it
        let (_, fields) = line.split_once("using the zero value").unwrap();
        assert!(line.contains("WARN"));
        assert!(fields.contains("PORT"));
        assert!(fields.contains("u16"));
        assert!(!output.contains("eighty"));
    }

    #[test]
    fn test_strict_malformed_value_is_error() {
        let mut server = Server::default();
        let env = map(&[("PORT", "eighty"), ("DATABASE_URL", "x")]);
        let options = LoadOptions::new().parse_policy(ParsePolicy::Strict);

        let err = populate(&mut server, &options, &ValueMap::new(), &env).unwrap_err();

        match err {
            ConfigError::MalformedValue {
                field,
                key,
                value,
                expected,
            } => {
                assert_eq!(field, "port");
                assert_eq!(key, "PORT");
                assert_eq!(value, "eighty");
                assert_eq!(expected, "u16");
            }
            other => panic!("expected MalformedValue, got {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_type_is_error() {
        let mut grid = Grid::default();
        let env = map(&[("GRID_CELLS", "1,2")]);

        let err = populate(&mut grid, &LoadOptions::new(), &ValueMap::new(), &env).unwrap_err();

        match err {
            ConfigError::UnsupportedType { field, type_name } => {
                assert_eq!(field, "cells");
                assert_eq!(type_name, "Vec<Vec<u8>>");
            }
            other => panic!("expected UnsupportedType, got {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_type_ignored_when_absent() {
        let mut grid = Grid::default();

        populate(&mut grid, &LoadOptions::new(), &ValueMap::new(), &map(&[])).unwrap();

        assert!(grid.cells.is_empty());
    }

    #[test]
    fn test_sequence_field() {
        let mut server = Server::default();
        let env = map(&[("TAGS", "a,b,"), ("DATABASE_URL", "x")]);

        populate(&mut server, &LoadOptions::new(), &ValueMap::new(), &env).unwrap();

        assert_eq!(
            server.tags,
            vec!["a".to_string(), "b".to_string(), String::new()]
        );
    }

    #[test]
    fn test_no_sources_leaves_record_unchanged() {
        let mut db = Database {
            url: "postgres://preset".to_string(),
            pool: 16,
        };

        populate(&mut db, &LoadOptions::new(), &ValueMap::new(), &map(&[])).unwrap();

        assert_eq!(db.url, "postgres://preset");
        assert_eq!(db.pool, 16);
    }

    #[test]
    fn test_lookup_origin() {
        let options = LoadOptions::new();
        let files = values(&[("A", "file")]);
        let env = map(&[("A", "env"), ("B", "env")]);
        let resolver = Resolver::new(&options, &files, &env);

        let a = FieldDescriptor::value("a", "A", "String");
        let b = FieldDescriptor::value("b", "B", "String");
        let c = FieldDescriptor::value("c", "C", "String").with_default("dflt");
        let d = FieldDescriptor::value("d", "D", "String");

        assert_eq!(resolver.lookup(&a), Some(("file".to_string(), Origin::File)));
        assert_eq!(resolver.lookup(&b), Some(("env".to_string(), Origin::Environment)));
        assert_eq!(resolver.lookup(&c), Some(("dflt".to_string(), Origin::Default)));
        assert_eq!(resolver.lookup(&d), None);
    }
}
