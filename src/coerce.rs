//! String to typed-field coercion.
//!
//! Every field type the populator can fill implements [`EnvValue`]. Scalars
//! parse a single literal, `Vec<T>` splits on `,` and coerces each element,
//! `Option<T>` wraps a parsed value in `Some` and falls back to `None` when
//! the value is malformed under [`ParsePolicy::Permissive`]. Types without an
//! implementation are rejected when the derive is compiled.
//!
//! Coercion itself never logs. The populator reports permissive fallbacks,
//! since only it knows which key the value came from.

use std::str::FromStr;

/// What to do when a literal cannot be parsed into the field's type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ParsePolicy {
    /// Use the type's zero value, the populator logs a warning with the key
    #[default]
    Permissive,
    /// Fail the load with [`crate::ConfigError::MalformedValue`]
    Strict,
}

impl ParsePolicy {
    fn recover<T: Default>(self, raw: &str, expected: &'static str) -> Result<T, CoerceError> {
        match self {
            ParsePolicy::Permissive => Ok(T::default()),
            ParsePolicy::Strict => Err(CoerceError::Malformed {
                value: raw.to_string(),
                expected,
            }),
        }
    }
}

/// Why a raw string could not be turned into a field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoerceError {
    Malformed {
        value: String,
        expected: &'static str,
    },
    Unsupported,
}

/// A field type that can be populated from a raw source string
pub trait EnvValue: Default {
    /// Sequences cannot nest, `Vec<Vec<T>>` is reported as unsupported
    const IS_SEQUENCE: bool = false;

    /// Resolve even when the current value looks set
    ///
    /// Only `bool` opts in, since `false` can't be told apart from "never set".
    const ALWAYS_RESOLVE: bool = false;

    /// Whether the current value is the type's zero value
    fn is_unset(&self) -> bool;

    fn coerce(raw: &str, policy: ParsePolicy) -> Result<Self, CoerceError>;
}

fn parse_scalar<T: FromStr + Default>(
    raw: &str,
    expected: &'static str,
    policy: ParsePolicy,
) -> Result<T, CoerceError> {
    match raw.parse() {
        Ok(value) => Ok(value),
        Err(_) => policy.recover(raw, expected),
    }
}

macro_rules! impl_numeric {
    ($zero:literal => $($ty:ty),+) => {
        $(
            impl EnvValue for $ty {
                fn is_unset(&self) -> bool {
                    *self == $zero
                }

                fn coerce(raw: &str, policy: ParsePolicy) -> Result<Self, CoerceError> {
                    parse_scalar(raw, stringify!($ty), policy)
                }
            }
        )+
    };
}

impl_numeric!(0 => i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
impl_numeric!(0.0 => f32, f64);

impl EnvValue for bool {
    const ALWAYS_RESOLVE: bool = true;

    fn is_unset(&self) -> bool {
        !*self
    }

    fn coerce(raw: &str, policy: ParsePolicy) -> Result<Self, CoerceError> {
        match raw {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
            _ => policy.recover(raw, "bool"),
        }
    }
}

impl EnvValue for String {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }

    fn coerce(raw: &str, _policy: ParsePolicy) -> Result<Self, CoerceError> {
        Ok(raw.to_string())
    }
}

impl<T: EnvValue> EnvValue for Vec<T> {
    const IS_SEQUENCE: bool = true;

    fn is_unset(&self) -> bool {
        self.is_empty()
    }

    fn coerce(raw: &str, policy: ParsePolicy) -> Result<Self, CoerceError> {
        if T::IS_SEQUENCE {
            return Err(CoerceError::Unsupported);
        }
        raw.split(',')
            .map(|item| {
                if item.is_empty() {
                    Ok(T::default())
                } else {
                    T::coerce(item, policy)
                }
            })
            .collect()
    }
}

impl<T: EnvValue> EnvValue for Option<T> {
    const IS_SEQUENCE: bool = T::IS_SEQUENCE;

    fn is_unset(&self) -> bool {
        self.is_none()
    }

    fn coerce(raw: &str, policy: ParsePolicy) -> Result<Self, CoerceError> {
        // A malformed value must not turn into Some(zero)
        match T::coerce(raw, ParsePolicy::Strict) {
            Ok(value) => Ok(Some(value)),
            Err(CoerceError::Malformed { .. }) if policy == ParsePolicy::Permissive => Ok(None),
            Err(err) => Err(err),
        }
    }
}
