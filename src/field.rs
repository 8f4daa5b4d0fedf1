/// Static metadata for one field of a [`crate::Populate`] record
///
/// `#[derive(Populate)]` emits one of these per field, in declaration order,
/// as the record's `FIELDS` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FieldDescriptor {
    /// Rust field name
    pub name: &'static str,
    /// Lookup key in env files and the environment, empty for nested records
    pub key: &'static str,
    /// Literal used when no source has a value
    pub default: Option<&'static str>,
    /// Missing value is an error even without the global `force` flag
    pub forced: bool,
    /// Human-readable description of what this config does
    pub description: &'static str,
    /// Declared type as written on the struct
    pub type_name: &'static str,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FieldKind {
    /// Coerced from a single source string
    Value,
    /// Nested record, walked recursively
    Record(&'static [FieldDescriptor]),
}

impl FieldDescriptor {
    /// A leaf field resolved from the sources
    pub const fn value(name: &'static str, key: &'static str, type_name: &'static str) -> Self {
        Self {
            name,
            key,
            default: None,
            forced: false,
            description: "",
            type_name,
            kind: FieldKind::Value,
        }
    }

    /// A nested record field
    pub const fn record(
        name: &'static str,
        type_name: &'static str,
        fields: &'static [FieldDescriptor],
    ) -> Self {
        Self {
            name,
            key: "",
            default: None,
            forced: false,
            description: "",
            type_name,
            kind: FieldKind::Record(fields),
        }
    }

    pub const fn with_default(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }

    pub const fn with_forced(mut self, forced: bool) -> Self {
        self.forced = forced;
        self
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn is_record(&self) -> bool {
        matches!(self.kind, FieldKind::Record(_))
    }
}
