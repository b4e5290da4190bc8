//! Benchmark definitions loaded from YAML
//!
//! A definition names a test, the terraform setups it should be deployed to,
//! how the server and benchmark client are configured, and the expectations
//! the results must satisfy.

use crate::defaults;
use crate::error::DefinitionError;
use crate::expectations::{Expectation, deserialize_expectations};
use serde::Deserialize;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// One benchmark definition file
#[derive(Debug, Clone, Deserialize)]
pub struct BenchmarkDefinition {
    /// Test name, used in setup names and artifact keys
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// CI deployment targets
    #[serde(default)]
    pub ci: CiConfig,

    /// Server configuration
    #[serde(default)]
    pub dbconfig: DbConfig,

    /// Benchmark client configuration
    #[serde(default)]
    pub clientconfig: ClientConfig,

    /// Thresholds checked against the results
    #[serde(default, deserialize_with = "deserialize_expectations")]
    pub expectations: Vec<Expectation>,

    /// File this definition was loaded from
    #[serde(skip)]
    pub source: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CiConfig {
    /// Terraform working directories, one deployment each
    #[serde(default)]
    pub terraform: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    /// Dataset to preload: an http(s) URL fetched on the server, or a local path copied to it
    #[serde(default)]
    pub dataset: Option<String>,

    /// Seconds allowed for the server to load the dataset and answer PING
    #[serde(default = "defaults::default_dataset_load_timeout")]
    pub dataset_load_timeout_secs: u64,

    /// Extra arguments passed to the module after `--loadmodule <path>`
    #[serde(default)]
    pub module_args: Vec<String>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            dataset: None,
            dataset_load_timeout_secs: defaults::DEFAULT_DATASET_LOAD_TIMEOUT,
            module_args: Vec::new(),
        }
    }
}

/// Where a dataset comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    /// Downloaded by the server host itself
    Url(String),
    /// Copied from the machine running rmbench
    Local(PathBuf),
}

impl DbConfig {
    /// Classify the dataset, resolving local paths against `base_dir`
    pub fn dataset_source(&self, base_dir: &Path) -> Option<DatasetSource> {
        let dataset = self.dataset.as_deref()?.trim();
        if dataset.is_empty() {
            return None;
        }
        if dataset.starts_with("http://") || dataset.starts_with("https://") {
            Some(DatasetSource::Url(dataset.to_string()))
        } else {
            Some(DatasetSource::Local(base_dir.join(dataset)))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Graph key queried by the benchmark
    #[serde(default = "defaults::default_graph")]
    pub graph: String,

    /// Requests per second limit (0 = unlimited)
    #[serde(default)]
    pub rps: u64,

    /// Number of concurrent clients
    #[serde(default = "defaults::default_clients")]
    pub clients: u32,

    /// Total number of requests
    #[serde(default = "defaults::default_requests")]
    pub requests: u64,

    /// Upper bound for `__rand_int__` substitution
    #[serde(default)]
    pub random_int_max: Option<u64>,

    /// Seed for `__rand_int__` substitution
    #[serde(default)]
    pub random_seed: Option<u64>,

    #[serde(default)]
    pub queries: Vec<Query>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            graph: defaults::default_graph(),
            rps: 0,
            clients: defaults::default_clients(),
            requests: defaults::default_requests(),
            random_int_max: None,
            random_seed: None,
            queries: Vec::new(),
        }
    }
}

/// A weighted benchmark query
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Query {
    pub q: String,
    #[serde(default = "defaults::default_query_ratio")]
    pub ratio: f64,
}

impl BenchmarkDefinition {
    /// Parse a definition from YAML text. `source` is only used for error messages
    /// and resolving relative paths.
    pub fn from_yaml(content: &str, source: &Path) -> Result<Self, DefinitionError> {
        let mut definition: Self =
            serde_yaml::from_str(content).map_err(|e| DefinitionError::Parse {
                path: source.to_path_buf(),
                source: e,
            })?;
        definition.source = source.to_path_buf();
        definition.validate()?;
        Ok(definition)
    }

    /// Load a definition from a YAML file
    pub fn load(path: &Path) -> Result<Self, DefinitionError> {
        let content = fs::read_to_string(path).map_err(|e| DefinitionError::io(path, e))?;
        Self::from_yaml(&content, path)
    }

    /// Validate definition fields
    pub fn validate(&self) -> Result<(), DefinitionError> {
        let path = || self.source.clone();

        if self.name.trim().is_empty() {
            return Err(DefinitionError::EmptyName { path: path() });
        }
        if self.clientconfig.clients == 0 {
            return Err(DefinitionError::InvalidClients { path: path() });
        }
        if self.clientconfig.queries.is_empty() {
            return Err(DefinitionError::NoQueries { path: path() });
        }
        for (index, query) in self.clientconfig.queries.iter().enumerate() {
            if query.q.trim().is_empty() {
                return Err(DefinitionError::EmptyQuery {
                    path: path(),
                    index,
                });
            }
            if !query.ratio.is_finite() || query.ratio <= 0.0 {
                return Err(DefinitionError::InvalidRatio {
                    path: path(),
                    index,
                    ratio: query.ratio,
                });
            }
        }
        for target in &self.ci.terraform {
            if setup_dir_name(target).is_none() {
                return Err(DefinitionError::InvalidTarget {
                    path: path(),
                    target: target.clone(),
                });
            }
        }
        for (index, expectation) in self.expectations.iter().enumerate() {
            if expectation.path.trim().is_empty() {
                return Err(DefinitionError::EmptyExpectationPath {
                    path: path(),
                    index,
                });
            }
        }
        Ok(())
    }

    /// Directory the definition was loaded from
    pub fn base_dir(&self) -> &Path {
        self.source
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    /// Terraform setups this definition is deployed to, in declared order.
    ///
    /// Relative paths resolve against the definition's directory.
    pub fn deployment_targets(&self) -> Vec<DeploymentTarget> {
        self.ci
            .terraform
            .iter()
            .map(|declared| DeploymentTarget::new(declared, self.base_dir()))
            .collect()
    }
}

/// A terraform setup a definition should be deployed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentTarget {
    /// Value as written in the definition
    pub declared: String,
    /// Resolved terraform working directory
    pub working_dir: PathBuf,
}

impl DeploymentTarget {
    pub fn new(declared: &str, base_dir: &Path) -> Self {
        let declared_path = Path::new(declared);
        let working_dir = if declared_path.is_absolute() {
            declared_path.to_path_buf()
        } else {
            base_dir.join(declared_path)
        };
        Self {
            declared: declared.to_string(),
            working_dir,
        }
    }

    /// Last path component of the setup, e.g. `tf-oss-redisgraph-standalone-r5`
    pub fn setup_basename(&self) -> String {
        setup_dir_name(&self.declared).unwrap_or_else(|| self.declared.clone())
    }
}

/// Final directory name of a declared target; `None` for `.`, `..` or a root
fn setup_dir_name(declared: &str) -> Option<String> {
    match Path::new(declared.trim()).components().next_back()? {
        Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
        _ => None,
    }
}

/// List every `*.yml` / `*.yaml` file in a directory, sorted by file name
pub fn definition_files(dir: &Path) -> Result<Vec<PathBuf>, DefinitionError> {
    let entries = fs::read_dir(dir).map_err(|e| DefinitionError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| DefinitionError::io(dir, e))?.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yml" || e == "yaml");
        if is_yaml && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load every definition in a directory, in file-name order.
///
/// Fails on the first invalid file, or if the directory has no definitions.
pub fn load_definitions(dir: &Path) -> Result<Vec<BenchmarkDefinition>, DefinitionError> {
    let files = definition_files(dir)?;
    if files.is_empty() {
        return Err(DefinitionError::NoDefinitions(dir.to_path_buf()));
    }
    files.iter().map(|f| BenchmarkDefinition::load(f)).collect()
}
