//! The active model configuration and the merges applied to it.
//!
//! Merges are copy-on-write: a candidate copy of the options is updated and
//! validated, and only a valid candidate replaces the store together with a
//! freshly flattened [`FlatConfig`]. Readers holding an `Arc<FlatConfig>`
//! never observe a half-merged configuration.

use crate::config::schema::{OptionGroups, OptionValue, default_schema};
use crate::config::validate::validate_options;
use crate::error::{Error, Result, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Plain `group -> key -> value` view of a configuration.
///
/// This is the format of saved `conf.json` files and what every consumer reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlatConfig(pub BTreeMap<String, BTreeMap<String, serde_json::Value>>);

impl FlatConfig {
    /// Raw value of `group.key`.
    pub fn get(&self, group: &str, key: &str) -> Option<&serde_json::Value> {
        self.0.get(group)?.get(key)
    }

    fn require(&self, group: &str, key: &str) -> Result<&serde_json::Value> {
        self.get(group, key).ok_or_else(|| Error::Internal {
            message: format!("configuration has no option '{group}.{key}'"),
        })
    }

    fn mistyped(group: &str, key: &str, expected: &str) -> Error {
        Error::Internal {
            message: format!("configuration option '{group}.{key}' is not {expected}"),
        }
    }

    /// String value of `group.key`.
    pub fn str(&self, group: &str, key: &str) -> Result<&str> {
        self.require(group, key)?
            .as_str()
            .ok_or_else(|| Self::mistyped(group, key, "a string"))
    }

    /// Integer value of `group.key`.
    pub fn int(&self, group: &str, key: &str) -> Result<i64> {
        self.require(group, key)?
            .as_i64()
            .ok_or_else(|| Self::mistyped(group, key, "an integer"))
    }

    /// Boolean value of `group.key`.
    pub fn bool(&self, group: &str, key: &str) -> Result<bool> {
        self.require(group, key)?
            .as_bool()
            .ok_or_else(|| Self::mistyped(group, key, "a boolean"))
    }

    /// Float list value of `group.key`.
    pub fn floats(&self, group: &str, key: &str) -> Result<Vec<f64>> {
        self.require(group, key)?
            .as_array()
            .and_then(|items| items.iter().map(serde_json::Value::as_f64).collect())
            .ok_or_else(|| Self::mistyped(group, key, "a list of numbers"))
    }

    /// Timestamp and checkpoint selected for prediction.
    pub fn model_selection(&self) -> Result<(String, String)> {
        Ok((
            self.str("testing", "timestamp")?.to_string(),
            self.str("testing", "ckpt_name")?.to_string(),
        ))
    }
}

/// Schema options with their current values plus the published flat view.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    groups: OptionGroups,
    published: Arc<FlatConfig>,
}

impl ConfigStore {
    /// Build a store from parsed option groups. The defaults must validate.
    pub fn new(groups: OptionGroups) -> Result<Self> {
        validate_options(&groups).map_err(|e| Error::SchemaInvalid {
            message: e.to_string(),
        })?;
        let published = Arc::new(flatten_groups(&groups));
        Ok(Self { groups, published })
    }

    /// Build a store from the bundled schema.
    pub fn from_default_schema() -> Result<Self> {
        Self::new(default_schema()?)
    }

    /// Option groups with current values.
    pub fn groups(&self) -> &OptionGroups {
        &self.groups
    }

    /// The last successfully validated flat configuration.
    pub fn flatten(&self) -> Arc<FlatConfig> {
        Arc::clone(&self.published)
    }

    /// Return a copy with a saved training configuration applied.
    ///
    /// Only options present in both the saved configuration and the schema are
    /// taken. Everything else keeps its current value.
    pub fn with_saved(&self, saved: &FlatConfig) -> std::result::Result<Self, ValidationError> {
        let mut groups = self.groups.clone();
        for (group, options) in &mut groups {
            let Some(saved_group) = saved.0.get(group) else {
                continue;
            };
            for (key, option) in options.iter_mut() {
                if let Some(raw) = saved_group.get(key) {
                    option.value = option.decode(group, key, raw)?;
                }
            }
        }
        Self::validated(groups)
    }

    /// Apply a saved training configuration in place.
    pub fn merge_saved(&mut self, saved: &FlatConfig) -> std::result::Result<(), ValidationError> {
        *self = self.with_saved(saved)?;
        Ok(())
    }

    /// Apply request overrides in place.
    ///
    /// Every override value is JSON text. Keys not in the schema are ignored;
    /// a key present in several groups updates all of them. On any error the
    /// store is left untouched.
    pub fn merge_query(&mut self, user_args: &BTreeMap<String, String>) -> Result<()> {
        let mut groups = self.groups.clone();
        for (group, options) in &mut groups {
            for (key, option) in options.iter_mut() {
                let Some(raw) = user_args.get(key) else {
                    continue;
                };
                let parsed: serde_json::Value =
                    serde_json::from_str(raw).map_err(|e| Error::OverrideNotJson {
                        key: key.clone(),
                        value: raw.clone(),
                        source: e,
                    })?;
                option.value = option
                    .decode(group, key, &parsed)
                    .map_err(Error::InvalidOverride)?;
                debug!("Override {group}.{key} = {}", option.value);
            }
        }

        *self = Self::validated(groups).map_err(Error::InvalidOverride)?;
        Ok(())
    }

    /// Point the default `testing.timestamp` at an existing run.
    ///
    /// Only applies while the option still holds its schema default: if that
    /// default is not among `available`, the last available timestamp is used,
    /// or an empty string when there are none.
    pub fn resolve_default_timestamp(&mut self, available: &[String]) {
        let Some(option) = self
            .groups
            .get_mut("testing")
            .and_then(|options| options.get_mut("timestamp"))
        else {
            return;
        };
        if option.value != option.default {
            return;
        }
        let OptionValue::Str(current) = &option.value else {
            return;
        };
        if available.contains(current) {
            return;
        }

        let resolved = available.last().cloned().unwrap_or_default();
        debug!("Default timestamp '{current}' not found, using '{resolved}'");
        option.value = OptionValue::Str(resolved.clone());
        option.default = OptionValue::Str(resolved);
        self.published = Arc::new(flatten_groups(&self.groups));
    }

    fn validated(groups: OptionGroups) -> std::result::Result<Self, ValidationError> {
        validate_options(&groups)?;
        let published = Arc::new(flatten_groups(&groups));
        Ok(Self { groups, published })
    }
}

fn flatten_groups(groups: &OptionGroups) -> FlatConfig {
    FlatConfig(
        groups
            .iter()
            .map(|(group, options)| {
                let values = options
                    .iter()
                    .map(|(key, option)| (key.clone(), option.value.to_json()))
                    .collect();
                (group.clone(), values)
            })
            .collect(),
    )
}
