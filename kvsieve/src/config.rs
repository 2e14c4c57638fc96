//! Configuration options for the compactor.
//!
//! [`CompactorOptions`] can be built in code, or loaded from files and environment
//! variables.
//!
//! # Examples
//!
//! Loading the default configuration:
//!
//! ```rust
//! use kvsieve::config::CompactorOptions;
//! let options = CompactorOptions::default();
//! ```
//!
//! Loading options from a specific file:
//!
//! ```rust,no_run
//! use kvsieve::config::CompactorOptions;
//! let options = CompactorOptions::from_file("compactor.toml").expect("Failed to load options from file");
//! ```
//!
//! Loading options from environment variables:
//!
//! ```rust
//! use kvsieve::config::CompactorOptions;
//! let options = CompactorOptions::from_env("KVSIEVE_").expect("Failed to load options from env");
//! ```
//!
//! # Configuration formats
//!
//! TOML, JSON, and YAML are supported. Representing `CompactorOptions` with TOML:
//!
//! ```toml
//! max_concurrent_compactions = 4
//! log_filter_summary = true
//! ```
//!
//! Compaction filter factories are code, not configuration. Attach one with
//! [`crate::CompactorBuilder::with_compaction_filter_factory`].

use figment::providers::{Env, Format, Json, Toml, Yaml};
use figment::{Figment, Metadata, Provider};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::KvSieveError;

/// Options for the compactor.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompactorOptions {
    /// The maximum number of compaction runs to execute at once. Must be greater
    /// than 0.
    pub max_concurrent_compactions: usize,

    /// Whether to log a per-run summary of the filter's decisions (entries kept,
    /// modified, and dropped) when a run with a filter completes.
    pub log_filter_summary: bool,
}

impl Default for CompactorOptions {
    fn default() -> Self {
        Self {
            max_concurrent_compactions: 4,
            log_filter_summary: true,
        }
    }
}

impl CompactorOptions {
    /// Converts the options to a JSON string representation
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Loads options from a file.
    ///
    /// The file format is determined by its extension:
    /// - ".json" for JSON format
    /// - ".toml" for TOML format
    /// - ".yaml" or ".yml" for YAML format
    ///
    /// Fields missing from the file keep their default values.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The file extension is not recognized (not json, toml, yaml, or yml).
    /// - The file cannot be read or parsed according to its presumed format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<CompactorOptions, crate::Error> {
        let path = path.as_ref();
        let Some(ext) = path.extension() else {
            return Err(KvSieveError::UnknownConfigurationFormat(path.into()).into());
        };

        let mut builder = Figment::from(CompactorOptions::default());
        match ext.to_str().unwrap_or_default() {
            "json" => builder = builder.merge(Json::file(path)),
            "toml" => builder = builder.merge(Toml::file(path)),
            "yaml" | "yml" => builder = builder.merge(Yaml::file(path)),
            _ => return Err(KvSieveError::UnknownConfigurationFormat(path.into()).into()),
        }
        builder
            .extract()
            .map_err(|e| KvSieveError::InvalidConfigurationFormat(Box::new(e)).into())
    }

    /// Loads options from environment variables with a specified prefix.
    ///
    /// For example, with the prefix "KVSIEVE_" the variable
    /// "KVSIEVE_MAX_CONCURRENT_COMPACTIONS" sets `max_concurrent_compactions`.
    pub fn from_env(prefix: &str) -> Result<CompactorOptions, crate::Error> {
        Figment::from(CompactorOptions::default())
            .merge(Env::prefixed(prefix))
            .extract()
            .map_err(|e| KvSieveError::InvalidConfigurationFormat(Box::new(e)).into())
    }

    /// Loads options from multiple configuration sources in a specific order.
    ///
    /// Sources are merged in the following order, each overriding the previous:
    /// 1. Default options
    /// 2. JSON file ("KvSieve.json")
    /// 3. TOML file ("KvSieve.toml")
    /// 4. YAML files ("KvSieve.yaml" and "KvSieve.yml")
    /// 5. Environment variables prefixed with "KVSIEVE_"
    pub fn load() -> Result<CompactorOptions, crate::Error> {
        Figment::from(CompactorOptions::default())
            .merge(Json::file("KvSieve.json"))
            .merge(Toml::file("KvSieve.toml"))
            .merge(Yaml::file("KvSieve.yaml"))
            .merge(Yaml::file("KvSieve.yml"))
            .admerge(Env::prefixed("KVSIEVE_"))
            .extract()
            .map_err(|e| KvSieveError::InvalidConfigurationFormat(Box::new(e)).into())
    }
}

impl Provider for CompactorOptions {
    fn metadata(&self) -> Metadata {
        Metadata::named("kvsieve compactor options")
    }

    fn data(
        &self,
    ) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        figment::providers::Serialized::defaults(self).data()
    }
}
