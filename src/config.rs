//! Contains the settings for groups and the cluster.
//!
//! Being a library, Ganymede does not own a config file - the embedding application decides
//! where its configuration lives. This module provides the YAML schema used to describe
//! groups and the cluster, so that budgets can be tuned without touching code:
//!
//! ```yaml
//! groups:
//!     thumbnails:
//!         # Specifies the maximal amount of memory to use (in bytes).
//!         # Supports common suffixes like: k, m, g, t
//!         max_memory: 64m
//!         # Specifies whether values fetched from peers are also kept in the local
//!         # cache. Off by default, as the owning peer caches them already.
//!         cache_peer_results: true
//! cluster:
//!     # Specifies the virtual-node multiplier of the consistent-hash ring.
//!     replicas: 50
//! ```
//!
//! Invalid entries never bring a process down: a broken value is reported via the log and
//! replaced by its default, only syntactically broken YAML is rejected as a whole.
use std::collections::HashMap;
use std::path::Path;

use yaml_rust::{Yaml, YamlLoader};

use crate::fmt::parse_size;

/// The memory budget applied when none is configured (64 MiB).
pub const DEFAULT_MAX_MEMORY: usize = 64 * 1024 * 1024;

/// The virtual-node multiplier applied when none is configured.
pub const DEFAULT_REPLICAS: usize = 50;

/// The settings of a single cache group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSettings {
    /// The memory budget of the group's cache in bytes (0 = unbounded).
    pub max_memory: usize,
    /// Determines if values fetched from peers are also placed in the local cache.
    pub cache_peer_results: bool,
}

impl Default for GroupSettings {
    fn default() -> Self {
        GroupSettings {
            max_memory: DEFAULT_MAX_MEMORY,
            cache_peer_results: false,
        }
    }
}

/// The parsed settings of all groups and the cluster.
///
/// # Examples
/// ```
/// # use ganymede::config::Settings;
/// let settings = Settings::from_yaml("
/// groups:
///     thumbnails:
///         max_memory: 64m
///     articles:
///         max_memory: 1g
///         cache_peer_results: true
/// cluster:
///     replicas: 100
/// ").unwrap();
///
/// assert_eq!(settings.group("thumbnails").max_memory, 64 * 1024 * 1024);
/// assert_eq!(settings.group("articles").cache_peer_results, true);
/// assert_eq!(settings.replicas(), 100);
///
/// // Unknown groups simply receive the defaults...
/// assert_eq!(settings.group("unknown").max_memory, 64 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    groups: HashMap<String, GroupSettings>,
    replicas: Option<usize>,
}

impl Settings {
    /// Parses the given YAML string into settings.
    ///
    /// Broken values within the document are logged and replaced by their defaults. Only a
    /// syntactically invalid document is rejected.
    pub fn from_yaml(data: &str) -> anyhow::Result<Self> {
        let docs = YamlLoader::load_from_str(data)
            .map_err(|error| anyhow::anyhow!("Cannot parse settings: {}", error))?;

        let empty_doc = Yaml::Null;
        let doc = docs.first().unwrap_or(&empty_doc);

        let mut groups = HashMap::new();
        if let Some(map) = doc["groups"].as_hash() {
            for (name, config) in map {
                match name.as_str() {
                    Some(name) => {
                        let _ = groups.insert(name.to_owned(), parse_group(name, config));
                    }
                    None => log::error!("Ignoring a group whose name is not a string."),
                }
            }
        }

        Ok(Settings {
            groups,
            replicas: parse_replicas(&doc["cluster"]["replicas"]),
        })
    }

    /// Reads and parses the given YAML file.
    pub async fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read_to_string(path).await.map_err(|error| {
            anyhow::anyhow!("Cannot load settings file {}: {}", path.display(), error)
        })?;

        Self::from_yaml(&data)
    }

    /// Returns the settings of the given group.
    ///
    /// Groups which are not mentioned in the settings receive the defaults - this way an
    /// application can create all its groups uniformly and only configure the exceptions.
    pub fn group(&self, name: &str) -> GroupSettings {
        self.groups.get(name).cloned().unwrap_or_default()
    }

    /// Returns the virtual-node multiplier to use for the cluster ring.
    pub fn replicas(&self) -> usize {
        self.replicas.unwrap_or(DEFAULT_REPLICAS)
    }
}

/// Parses the settings of a single group, falling back to defaults for broken values.
fn parse_group(name: &str, config: &Yaml) -> GroupSettings {
    let mut settings = GroupSettings::default();

    match &config["max_memory"] {
        Yaml::BadValue => (),
        value => match parse_memory(value) {
            Ok(max_memory) => settings.max_memory = max_memory,
            Err(error) => log::error!(
                "Ignoring the invalid 'max_memory' of group '{}': {}",
                name,
                error
            ),
        },
    }

    match &config["cache_peer_results"] {
        Yaml::BadValue => (),
        value => match value.as_bool() {
            Some(flag) => settings.cache_peer_results = flag,
            None => log::error!(
                "Ignoring the invalid 'cache_peer_results' of group '{}': expected a boolean.",
                name
            ),
        },
    }

    settings
}

/// Parses a memory budget which is either a plain number of bytes or a string with one of
/// the suffixes supported by [parse_size](crate::fmt::parse_size).
fn parse_memory(value: &Yaml) -> anyhow::Result<usize> {
    match value {
        Yaml::Integer(bytes) if *bytes >= 0 => Ok(*bytes as usize),
        Yaml::String(size) => parse_size(size),
        _ => Err(anyhow::anyhow!(
            "Expected a positive number of bytes or a size expression like '64m'."
        )),
    }
}

/// Parses the virtual-node multiplier, reporting broken values via the log.
fn parse_replicas(value: &Yaml) -> Option<usize> {
    match value {
        Yaml::BadValue => None,
        value => match value.as_i64() {
            Some(replicas) if replicas >= 1 => Some(replicas as usize),
            _ => {
                log::error!("Ignoring the invalid 'cluster.replicas': expected a number >= 1.");
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Settings, DEFAULT_MAX_MEMORY, DEFAULT_REPLICAS};

    #[test]
    fn settings_are_parsed() {
        let settings = Settings::from_yaml(
            "
groups:
    thumbnails:
        max_memory: 8k
    articles:
        max_memory: 1048576
        cache_peer_results: true
cluster:
    replicas: 128
",
        )
        .unwrap();

        assert_eq!(settings.group("thumbnails").max_memory, 8192);
        assert_eq!(settings.group("thumbnails").cache_peer_results, false);
        assert_eq!(settings.group("articles").max_memory, 1048576);
        assert_eq!(settings.group("articles").cache_peer_results, true);
        assert_eq!(settings.replicas(), 128);
    }

    #[test]
    fn missing_sections_yield_defaults() {
        let settings = Settings::from_yaml("").unwrap();

        assert_eq!(settings.group("anything").max_memory, DEFAULT_MAX_MEMORY);
        assert_eq!(settings.group("anything").cache_peer_results, false);
        assert_eq!(settings.replicas(), DEFAULT_REPLICAS);
    }

    #[test]
    fn broken_values_fall_back_to_defaults() {
        let settings = Settings::from_yaml(
            "
groups:
    thumbnails:
        max_memory: lots
        cache_peer_results: perhaps
cluster:
    replicas: 0
",
        )
        .unwrap();

        // All three values are broken, therefore all three defaults apply...
        assert_eq!(settings.group("thumbnails").max_memory, DEFAULT_MAX_MEMORY);
        assert_eq!(settings.group("thumbnails").cache_peer_results, false);
        assert_eq!(settings.replicas(), DEFAULT_REPLICAS);
    }

    #[test]
    fn malformed_yaml_is_rejected() {
        assert_eq!(Settings::from_yaml("groups: \"test").is_err(), true);
    }
}
