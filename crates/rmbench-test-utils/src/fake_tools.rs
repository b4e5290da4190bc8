//! Stand-in executables for the external tools the runner drives.
//!
//! `terraform` prints canned outputs (or hangs in `apply` until interrupted), `ssh` answers `redis-cli ping` with
//! PONG, and `scp` copies a canned results file when fetching. Every
//! invocation is appended to a log so tests can assert on call order.

use serde_json::{Value, json};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::fixtures::sample_results;

/// `terraform output -json` for a two-host setup
pub fn sample_outputs() -> Value {
    json!({
        "server_private_ip": { "sensitive": false, "type": "string", "value": "10.3.0.12" },
        "server_public_ip": { "sensitive": false, "type": "string", "value": "3.14.15.92" },
        "client_private_ip": { "sensitive": false, "type": "string", "value": "10.3.0.13" },
        "client_public_ip": { "sensitive": false, "type": "string", "value": "3.14.15.93" }
    })
}

/// Configures how the fake tools behave
pub struct FakeToolsBuilder {
    apply_exit: i32,
    apply_hangs: bool,
    destroy_exit: i32,
    outputs: Value,
    results: Value,
}

impl Default for FakeToolsBuilder {
    fn default() -> Self {
        Self {
            apply_exit: 0,
            apply_hangs: false,
            destroy_exit: 0,
            outputs: sample_outputs(),
            results: sample_results(),
        }
    }
}

impl FakeToolsBuilder {
    pub fn apply_exit(mut self, code: i32) -> Self {
        self.apply_exit = code;
        self
    }

    /// `apply` runs until interrupted; on SIGINT it logs `interrupted apply` and exits 130
    pub fn apply_hangs(mut self) -> Self {
        self.apply_hangs = true;
        self
    }

    pub fn destroy_exit(mut self, code: i32) -> Self {
        self.destroy_exit = code;
        self
    }

    pub fn outputs(mut self, outputs: Value) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn results(mut self, results: Value) -> Self {
        self.results = results;
        self
    }

    pub fn build(self) -> FakeTools {
        let dir = TempDir::new().expect("create temp dir");
        let root = dir.path();
        let log = root.join("calls.log");
        let outputs = root.join("outputs.json");
        let results = root.join("results.json");
        std::fs::write(&outputs, self.outputs.to_string()).expect("write outputs");
        std::fs::write(&results, self.results.to_string()).expect("write results");
        std::fs::write(root.join("redisgraph.so"), b"\x7fELF").expect("write module");

        let apply = if self.apply_hangs {
            format!(
                r#"trap "echo 'interrupted apply' >> '{log}'; exit 130" INT; while true; do sleep 0.1; done"#,
                log = log.display()
            )
        } else {
            format!("exit {}", self.apply_exit)
        };

        write_script(
            &root.join("terraform"),
            &format!(
                r#"echo "terraform $*" >> '{log}'
for arg in "$@"; do
  case "$arg" in
    init) exit 0 ;;
    apply) {apply} ;;
    output) cat '{outputs}'; exit 0 ;;
    destroy) exit {destroy} ;;
  esac
done
exit 0
"#,
                log = log.display(),
                outputs = outputs.display(),
                apply = apply,
                destroy = self.destroy_exit,
            ),
        );
        write_script(
            &root.join("ssh"),
            &format!(
                r#"echo "ssh $*" >> '{log}'
case "$*" in
  *redis-cli*) echo PONG ;;
esac
exit 0
"#,
                log = log.display(),
            ),
        );
        write_script(
            &root.join("scp"),
            &format!(
                r#"echo "scp $*" >> '{log}'
for last in "$@"; do :; done
case "$last" in
  *:*) exit 0 ;;
  *) cp '{results}' "$last" ;;
esac
"#,
                log = log.display(),
                results = results.display(),
            ),
        );

        FakeTools { dir, log }
    }
}

fn write_script(path: &Path, body: &str) {
    std::fs::write(path, format!("#!/bin/sh\n{body}")).expect("write script");
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod script");
}

/// A directory of fake `terraform`, `ssh` and `scp` executables
pub struct FakeTools {
    dir: TempDir,
    log: PathBuf,
}

impl Default for FakeTools {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeTools {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> FakeToolsBuilder {
        FakeToolsBuilder::default()
    }

    pub fn terraform(&self) -> String {
        self.tool("terraform")
    }

    pub fn ssh(&self) -> String {
        self.tool("ssh")
    }

    pub fn scp(&self) -> String {
        self.tool("scp")
    }

    /// A dummy module file to upload
    pub fn module_path(&self) -> PathBuf {
        self.dir.path().join("redisgraph.so")
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Logged invocations, one per line, in call order
    pub fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Logged terraform subcommands (`init`, `apply`, `output`, `destroy`), in call order
    pub fn terraform_subcommands(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|line| line.strip_prefix("terraform "))
            .filter_map(|args| {
                args.split_whitespace()
                    .find(|a| matches!(*a, "init" | "apply" | "output" | "destroy"))
                    .map(str::to_string)
            })
            .collect()
    }

    fn tool(&self, name: &str) -> String {
        self.dir.path().join(name).display().to_string()
    }
}
