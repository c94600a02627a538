//! Package and deployment metadata.

use crate::constants::CONTAINER_ENV_PREFIX;
use serde::Serialize;
use std::collections::BTreeMap;

/// Package information plus container details from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    /// Package name.
    #[serde(rename = "Name")]
    pub name: String,
    /// Package version.
    #[serde(rename = "Version")]
    pub version: String,
    /// One-line description.
    #[serde(rename = "Summary")]
    pub summary: String,
    /// Project homepage.
    #[serde(rename = "Home-page")]
    pub home_page: String,
    /// Author name.
    #[serde(rename = "Author")]
    pub author: String,
    /// Author email.
    #[serde(rename = "Author-email")]
    pub author_email: String,
    /// License identifier.
    #[serde(rename = "License")]
    pub license: String,
    /// Host the process runs on.
    #[serde(rename = "Hostname")]
    pub hostname: String,
    /// `CONTAINER_*` environment variables, keyed like `Container_name`.
    #[serde(flatten)]
    pub container: BTreeMap<String, String>,
}

/// Collect metadata for the running binary.
pub fn get_metadata() -> Metadata {
    let (author, author_email) = split_author(env!("CARGO_PKG_AUTHORS"));
    Metadata {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        summary: env!("CARGO_PKG_DESCRIPTION").to_string(),
        home_page: env!("CARGO_PKG_HOMEPAGE").to_string(),
        author,
        author_email,
        license: env!("CARGO_PKG_LICENSE").to_string(),
        hostname: hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_default(),
        container: container_vars(std::env::vars()),
    }
}

/// First author of a `Name <email>:Other` list.
fn split_author(authors: &str) -> (String, String) {
    let first = authors.split(':').next().unwrap_or_default().trim();
    match first.split_once('<') {
        Some((name, email)) => (
            name.trim().to_string(),
            email.trim_end_matches('>').trim().to_string(),
        ),
        None => (first.to_string(), String::new()),
    }
}

fn container_vars(vars: impl Iterator<Item = (String, String)>) -> BTreeMap<String, String> {
    vars.filter(|(key, _)| key.starts_with(CONTAINER_ENV_PREFIX))
        .map(|(key, value)| (capitalize(&key), value))
        .collect()
}

/// `CONTAINER_NAME` -> `Container_name`.
fn capitalize(key: &str) -> String {
    let lower = key.to_lowercase();
    let mut chars = lower.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
