//! Repository set configuration.
//!
//! The repository set lives in one TOML file, `~/.config/repos.toml` by
//! default:
//!
//! ```toml
//! [config]
//! color = true
//!
//! [defaults]
//! fetch = true
//! remote = "origin"
//!
//! [repos.focustree]
//! path = "~/src/focustree"
//! short-name = "ft"
//! comment = "time tracker"
//! ```
//!
//! Repositories keep the order they appear in the file.

use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One repository as the rest of the program sees it. Immutable for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoConfig {
    pub name: String,
    pub path: PathBuf,
    pub short_name: Option<String>,
    pub fetch: bool,
    pub remote: Option<String>,
    pub ignore: bool,
    pub comment: String,
}

impl RepoConfig {
    /// A repository given directly on the command line, outside any config
    /// file. Named after its path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: path.display().to_string(),
            path,
            short_name: None,
            fetch: true,
            remote: None,
            ignore: false,
            comment: String::new(),
        }
    }
}

/// Global settings from the `[config]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Default output styling when `--output-format` is not given.
    pub color: Option<bool>,
}

/// The loaded repository set, in file order.
#[derive(Debug, Clone, Default)]
pub struct RepoSet {
    settings: Settings,
    repos: IndexMap<String, RepoConfig>,
}

impl RepoSet {
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn get(&self, name: &str) -> Option<&RepoConfig> {
        self.repos.get(name)
    }

    /// Look a repository up by name, then by short name.
    pub fn find(&self, name: &str) -> Option<&RepoConfig> {
        self.get(name).or_else(|| {
            self.repos
                .values()
                .find(|repo| repo.short_name.as_deref() == Some(name))
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.repos.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RepoConfig> {
        self.repos.values()
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    /// Owned copies of every repository, for handing to worker threads.
    pub fn to_vec(&self) -> Vec<RepoConfig> {
        self.repos.values().cloned().collect()
    }

    /// Repositories not marked `ignore`, or all of them with
    /// `include_ignored`, in file order.
    pub fn active(&self, include_ignored: bool) -> impl Iterator<Item = &RepoConfig> {
        self.iter().filter(move |repo| include_ignored || !repo.ignore)
    }

    /// Parse a config file's contents. Relative repository paths resolve
    /// against `base_dir`.
    pub fn from_toml(content: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        if file.defaults.path.is_some() {
            return Err(ConfigError::Invalid {
                message: "[defaults] cannot set a path".into(),
            });
        }

        let mut repos = IndexMap::with_capacity(file.repos.len());
        for (name, entry) in file.repos {
            let config = entry.resolve(&name, &file.defaults, base_dir)?;
            repos.insert(name, config);
        }

        Ok(Self {
            settings: Settings {
                color: file.config.color,
            },
            repos,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    config: SettingsEntry,
    #[serde(default)]
    defaults: RepoEntry,
    #[serde(default)]
    repos: IndexMap<String, RepoEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsEntry {
    color: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct RepoEntry {
    path: Option<String>,
    short_name: Option<String>,
    fetch: Option<bool>,
    remote: Option<String>,
    ignore: Option<bool>,
    comment: Option<String>,
}

impl RepoEntry {
    fn resolve(
        self,
        name: &str,
        defaults: &RepoEntry,
        base_dir: &Path,
    ) -> Result<RepoConfig, ConfigError> {
        let path = self
            .path
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingPath {
                repo: name.to_string(),
            })?;
        let path = PathBuf::from(shellexpand::tilde(&path).as_ref());

        Ok(RepoConfig {
            name: name.to_string(),
            path: base_dir.join(path),
            short_name: self.short_name,
            fetch: self.fetch.or(defaults.fetch).unwrap_or(true),
            remote: self.remote.or_else(|| defaults.remote.clone()),
            ignore: self.ignore.or(defaults.ignore).unwrap_or(false),
            comment: self.comment.unwrap_or_default(),
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    Read { path: PathBuf, source: io::Error },
    /// The file is not valid TOML or has unknown keys.
    Parse { message: String },
    /// A repository entry has no `path`.
    MissingPath { repo: String },
    Invalid { message: String },
    /// No home directory to locate the default config file in.
    NoHomeDir,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config file {}: {source}", path.display())
            }
            ConfigError::Parse { message } => {
                write!(f, "failed to parse config: {}", message.trim_end())
            }
            ConfigError::MissingPath { repo } => {
                write!(f, "repository '{repo}' has no path")
            }
            ConfigError::Invalid { message } => write!(f, "invalid config: {message}"),
            ConfigError::NoHomeDir => write!(f, "could not determine home directory"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// `~/.config/repos.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(".config").join("repos.toml"))
}

/// Load the repository set from `path`.
pub fn load(path: &Path) -> Result<RepoSet, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or(Path::new("."));
    let set = RepoSet::from_toml(&content, base_dir)?;
    log::debug!("loaded {} repositories from {}", set.len(), path.display());
    Ok(set)
}

#[derive(Serialize)]
struct GeneratedConfig {
    repos: IndexMap<String, GeneratedRepo>,
}

#[derive(Serialize)]
struct GeneratedRepo {
    path: String,
}

/// A config file listing every direct subdirectory of `dir` that is a git
/// repository (has a `.git` entry), sorted by directory name.
///
/// Returns an empty string when none are found.
pub fn generate_config(dir: &Path) -> Result<String, ConfigError> {
    let read_err = |source| ConfigError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let dir = dunce::canonicalize(dir).map_err(read_err)?;

    let mut found = Vec::new();
    for entry in std::fs::read_dir(&dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if path.is_dir() && path.join(".git").exists() {
            found.push(path);
        }
    }
    found.sort();

    if found.is_empty() {
        return Ok(String::new());
    }

    let repos = found
        .into_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_string_lossy().into_owned();
            let path = path.to_string_lossy().into_owned();
            Some((name, GeneratedRepo { path }))
        })
        .collect();

    toml::to_string(&GeneratedConfig { repos }).map_err(|e| ConfigError::Invalid {
        message: e.to_string(),
    })
}
