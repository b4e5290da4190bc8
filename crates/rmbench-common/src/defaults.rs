//! Default configuration values shared between rmbench crates
//!
//! These constants keep remote paths and CLI defaults consistent across the
//! runner, its tests and the definition loader.

/// Default name of the module under test (also the artifact project prefix)
pub const DEFAULT_REDIS_MODULE: &str = "RedisGraph";

/// Default path of the locally built module
pub const DEFAULT_MODULE_PATH: &str = "./../../src/redisgraph.so";

/// Default terraform binary (overridable with `TERRAFORM_BIN_PATH`)
pub const DEFAULT_TERRAFORM_BIN: &str = "terraform";

/// Default location the private key is written to
pub const DEFAULT_PRIVATE_KEY_PATH: &str = "/tmp/benchmarks.redislabs.redisgraph.pem";

/// Default local path the results file is copied back to
pub const DEFAULT_LOCAL_RESULTS_FILE: &str = "./benchmark-result.json";

/// Default download location of the benchmark client
pub const DEFAULT_BENCHMARK_TOOL_URL: &str = "https://s3.amazonaws.com/benchmarks.redislabs/redisgraph/redisgraph-benchmark-go/unstable/redisgraph-benchmark-go_linux_amd64";

/// Default bucket results are published to
pub const DEFAULT_RESULTS_BUCKET: &str = "ci.benchmarks.redislabs";

/// Remote path of the module on the server host
pub const REMOTE_MODULE_FILE: &str = "/tmp/redisgraph.so";

/// Remote path of the dataset on the server host
pub const REMOTE_DATASET_FILE: &str = "/tmp/dump.rdb";

/// Remote path of the benchmark client on the client host
pub const REMOTE_BENCHMARK_BIN: &str = "/tmp/redisgraph-benchmark-go";

/// Remote path the benchmark client writes its results to
pub const REMOTE_RESULTS_FILE: &str = "/tmp/benchmark-result.json";

/// Login used when terraform does not export `ssh_user`
pub const DEFAULT_SSH_USER: &str = "ubuntu";

/// Server port used when terraform does not export `server_plaintext_port`
pub const DEFAULT_SERVER_PORT: u16 = 6379;

/// Default benchmark timeout in seconds (1 hour)
pub const DEFAULT_BENCHMARK_TIMEOUT: u64 = 3600;

/// Default time allowed for the server to load its dataset
pub const DEFAULT_DATASET_LOAD_TIMEOUT: u64 = 180;

/// Default time allowed for a freshly provisioned host to accept SSH
pub const DEFAULT_SSH_READY_TIMEOUT: u64 = 300;

/// Default timeout for a single terraform invocation (30 minutes)
pub const DEFAULT_TERRAFORM_TIMEOUT: u64 = 1800;

/// Time a cancelled command gets to exit after SIGINT before it is killed.
/// Terraform finishes in-flight operations and records them in state first.
pub const DEFAULT_INTERRUPT_GRACE: u64 = 300;

/// Default timeout for short remote commands (copies, installs)
pub const DEFAULT_REMOTE_COMMAND_TIMEOUT: u64 = 600;

// Serde default functions for struct field defaults

/// Returns the default dataset load timeout
pub fn default_dataset_load_timeout() -> u64 {
    DEFAULT_DATASET_LOAD_TIMEOUT
}

/// Returns the default graph key
pub fn default_graph() -> String {
    "g".to_string()
}

/// Returns the default number of benchmark clients
pub fn default_clients() -> u32 {
    50
}

/// Returns the default number of benchmark requests
pub fn default_requests() -> u64 {
    1_000_000
}

/// Returns the default query ratio
pub fn default_query_ratio() -> f64 {
    1.0
}
