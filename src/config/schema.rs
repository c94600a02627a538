//! Typed option descriptors for the model option schema.
//!
//! Every option declares one of a small set of types. Values arrive as JSON
//! (saved `conf.json` files, request overrides) and go through
//! [`ConfigOption::decode`], the single place where a raw value becomes a
//! typed [`OptionValue`].

use crate::error::{Error, Result, ValidationError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Declared type of an option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionType {
    /// Signed integer.
    Int,
    /// Floating point number. Integers are widened.
    Float,
    /// Boolean flag.
    Bool,
    /// Free text.
    Str,
    /// Homogeneous list.
    List(Box<OptionType>),
}

impl OptionType {
    /// Decode a JSON value into this type.
    pub fn decode(&self, raw: &serde_json::Value) -> std::result::Result<OptionValue, String> {
        use serde_json::Value;

        match (self, raw) {
            (Self::Int, Value::Number(n)) => n
                .as_i64()
                .map(OptionValue::Int)
                .ok_or_else(|| format!("expected int, got {n}")),
            (Self::Float, Value::Number(n)) => n
                .as_f64()
                .map(OptionValue::Float)
                .ok_or_else(|| format!("expected float, got {n}")),
            (Self::Bool, Value::Bool(b)) => Ok(OptionValue::Bool(*b)),
            (Self::Str, Value::String(s)) => Ok(OptionValue::Str(s.clone())),
            (Self::List(inner), Value::Array(items)) => items
                .iter()
                .map(|item| inner.decode(item))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(OptionValue::List),
            (expected, other) => Err(format!("expected {expected}, got {other}")),
        }
    }

    /// Check that an already typed value conforms to this type.
    pub fn accepts(&self, value: &OptionValue) -> bool {
        match (self, value) {
            (Self::Int, OptionValue::Int(_))
            | (Self::Float, OptionValue::Float(_))
            | (Self::Bool, OptionValue::Bool(_))
            | (Self::Str, OptionValue::Str(_)) => true,
            (Self::List(inner), OptionValue::List(items)) => {
                items.iter().all(|item| inner.accepts(item))
            }
            _ => false,
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Bool => write!(f, "bool"),
            Self::Str => write!(f, "str"),
            Self::List(inner) => write!(f, "list[{inner}]"),
        }
    }
}

impl FromStr for OptionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(inner) = s.strip_prefix("list[").and_then(|rest| rest.strip_suffix(']')) {
            return Ok(Self::List(Box::new(inner.parse()?)));
        }
        match s {
            "int" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "bool" => Ok(Self::Bool),
            "str" => Ok(Self::Str),
            other => Err(format!("unknown option type: {other}")),
        }
    }
}

/// A typed option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Boolean value.
    Bool(bool),
    /// String value.
    Str(String),
    /// List value.
    List(Vec<OptionValue>),
    /// Unset value of a nullable option.
    Null,
}

impl OptionValue {
    /// Convert to the JSON form used by the flat configuration.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::Bool(b) => Value::Bool(*b),
            Self::Str(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Null => Value::Null,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// One option of the schema with its current value.
#[derive(Debug, Clone)]
pub struct ConfigOption {
    /// Current value.
    pub value: OptionValue,
    /// Value declared by the schema.
    pub default: OptionValue,
    /// Declared type.
    pub option_type: OptionType,
    /// Allowed values, if restricted.
    pub choices: Option<Vec<OptionValue>>,
    /// Whether `null` is accepted.
    pub nullable: bool,
    /// Help text.
    pub help: String,
}

impl ConfigOption {
    /// Decode a raw JSON value for this option, checking type and choices.
    pub fn decode(
        &self,
        group: &str,
        key: &str,
        raw: &serde_json::Value,
    ) -> std::result::Result<OptionValue, ValidationError> {
        let value = if raw.is_null() {
            OptionValue::Null
        } else {
            self.option_type
                .decode(raw)
                .map_err(|message| ValidationError::new(group, key, message))?
        };
        self.check(group, key, &value)?;
        Ok(value)
    }

    /// Check a typed value against the declared type, nullability and choices.
    pub fn check(
        &self,
        group: &str,
        key: &str,
        value: &OptionValue,
    ) -> std::result::Result<(), ValidationError> {
        if *value == OptionValue::Null {
            if self.nullable {
                return Ok(());
            }
            return Err(ValidationError::new(group, key, "value must not be null"));
        }

        if !self.option_type.accepts(value) {
            return Err(ValidationError::new(
                group,
                key,
                format!("expected {}, got {value}", self.option_type),
            ));
        }

        if let Some(choices) = &self.choices
            && !choices.contains(value)
        {
            let listed = choices
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ValidationError::new(
                group,
                key,
                format!("{value} is not one of [{listed}]"),
            ));
        }

        Ok(())
    }
}

/// Options grouped by name, ordered by group then key.
pub type OptionGroups = BTreeMap<String, BTreeMap<String, ConfigOption>>;

/// Option entry as written in the schema file.
#[derive(Debug, Deserialize)]
struct RawOption {
    #[serde(default)]
    value: Option<serde_json::Value>,
    #[serde(rename = "type")]
    option_type: String,
    #[serde(default)]
    choices: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    nullable: bool,
    #[serde(default)]
    help: String,
}

/// Bundled schema definition.
pub const DEFAULT_SCHEMA: &str = include_str!("default_schema.toml");

/// Parse a schema definition from TOML.
///
/// Omitted `value` entries mean `null` and require `nullable = true`.
pub fn parse_schema(contents: &str) -> Result<OptionGroups> {
    let raw: BTreeMap<String, BTreeMap<String, RawOption>> =
        toml::from_str(contents).map_err(|e| Error::SchemaInvalid {
            message: e.to_string(),
        })?;

    let mut groups = OptionGroups::new();
    for (group, options) in raw {
        let mut parsed = BTreeMap::new();
        for (key, raw_option) in options {
            let option = build_option(&group, &key, raw_option)?;
            parsed.insert(key, option);
        }
        groups.insert(group, parsed);
    }
    Ok(groups)
}

/// Parse the bundled schema.
pub fn default_schema() -> Result<OptionGroups> {
    parse_schema(DEFAULT_SCHEMA)
}

fn build_option(group: &str, key: &str, raw: RawOption) -> Result<ConfigOption> {
    let invalid = |message: String| Error::SchemaInvalid {
        message: format!("{group}.{key}: {message}"),
    };

    let option_type: OptionType = raw.option_type.parse().map_err(invalid)?;

    let choices = raw
        .choices
        .map(|choices| {
            choices
                .iter()
                .map(|choice| option_type.decode(choice))
                .collect::<std::result::Result<Vec<_>, _>>()
        })
        .transpose()
        .map_err(invalid)?;

    let mut option = ConfigOption {
        value: OptionValue::Null,
        default: OptionValue::Null,
        option_type,
        choices,
        nullable: raw.nullable,
        help: raw.help,
    };

    let value = option
        .decode(group, key, &raw.value.unwrap_or(serde_json::Value::Null))
        .map_err(|e| invalid(e.message))?;
    option.value = value.clone();
    option.default = value;
    Ok(option)
}
