//! SSH and SCP access to provisioned hosts

use crate::command::{CommandConfig, CommandOutput, CommandSpec, run_checked, run_command};
use crate::wait::{WaitConfig, wait_for_resource};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// A host reachable over SSH
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteHost {
    pub address: String,
    pub user: String,
}

impl RemoteHost {
    pub fn new(address: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            user: user.into(),
        }
    }

    /// `user@address`
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.address)
    }
}

/// Runs ssh/scp with a fixed private key and non-interactive options
#[derive(Debug, Clone)]
pub struct Ssh {
    ssh_bin: String,
    scp_bin: String,
    key_path: PathBuf,
}

impl Ssh {
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        Self {
            ssh_bin: "ssh".to_string(),
            scp_bin: "scp".to_string(),
            key_path: key_path.into(),
        }
    }

    /// Use alternative ssh/scp binaries
    pub fn with_binaries(mut self, ssh_bin: impl Into<String>, scp_bin: impl Into<String>) -> Self {
        self.ssh_bin = ssh_bin.into();
        self.scp_bin = scp_bin.into();
        self
    }

    /// Options shared by ssh and scp
    pub fn options(&self) -> Vec<String> {
        [
            "StrictHostKeyChecking=no",
            "UserKnownHostsFile=/dev/null",
            "ConnectTimeout=10",
            "ServerAliveInterval=30",
            "ServerAliveCountMax=10",
            "BatchMode=yes",
            "LogLevel=ERROR",
        ]
        .into_iter()
        .flat_map(|opt| ["-o".to_string(), opt.to_string()])
        .chain(["-i".to_string(), self.key_path.display().to_string()])
        .collect()
    }

    fn exec_spec(&self, host: &RemoteHost, command: &str) -> CommandSpec<'_> {
        CommandSpec::new(&self.ssh_bin)
            .args(self.options())
            .arg(host.destination())
            .arg(command)
    }

    /// Run a shell command on the host, whatever its exit status
    pub async fn exec(
        &self,
        host: &RemoteHost,
        command: &str,
        timeout_secs: u64,
    ) -> Result<CommandOutput> {
        run_command(
            &self.exec_spec(host, command),
            &CommandConfig::with_timeout_secs(timeout_secs),
        )
        .await
        .with_context(|| format!("ssh to {} failed", host.address))
    }

    /// Run a shell command on the host and fail on non-zero exit
    pub async fn exec_checked(
        &self,
        host: &RemoteHost,
        command: &str,
        timeout_secs: u64,
    ) -> Result<CommandOutput> {
        run_checked(
            &self.exec_spec(host, command),
            &CommandConfig::with_timeout_secs(timeout_secs),
        )
        .await
        .with_context(|| format!("Remote command failed on {}", host.address))
    }

    /// Copy a local file to the host
    pub async fn copy_to(
        &self,
        host: &RemoteHost,
        local: &Path,
        remote: &str,
        timeout_secs: u64,
    ) -> Result<()> {
        info!(host = %host.address, local = %local.display(), remote, "Copying file to host");
        let spec = CommandSpec::new(&self.scp_bin)
            .args(self.options())
            .arg(local.display().to_string())
            .arg(format!("{}:{}", host.destination(), remote));
        run_checked(&spec, &CommandConfig::with_timeout_secs(timeout_secs))
            .await
            .with_context(|| format!("Failed to copy {} to {}", local.display(), host.address))?;
        Ok(())
    }

    /// Copy a file from the host
    pub async fn copy_from(
        &self,
        host: &RemoteHost,
        remote: &str,
        local: &Path,
        timeout_secs: u64,
    ) -> Result<()> {
        info!(host = %host.address, remote, local = %local.display(), "Copying file from host");
        let spec = CommandSpec::new(&self.scp_bin)
            .args(self.options())
            .arg(format!("{}:{}", host.destination(), remote))
            .arg(local.display().to_string());
        run_checked(&spec, &CommandConfig::with_timeout_secs(timeout_secs))
            .await
            .with_context(|| format!("Failed to copy {remote} from {}", host.address))?;
        Ok(())
    }

    /// Whether `ssh host true` succeeds
    pub async fn is_reachable(&self, host: &RemoteHost) -> bool {
        let config = CommandConfig::with_timeout_secs(30).quiet();
        matches!(
            run_command(&self.exec_spec(host, "true"), &config).await,
            Ok(output) if output.success
        )
    }

    /// Poll the host until it accepts SSH connections
    pub async fn wait_until_reachable(
        &self,
        host: &RemoteHost,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        info!(host = %host.address, "Waiting for SSH");
        let config = WaitConfig {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(15),
            timeout,
        };
        wait_for_resource(
            config,
            cancel,
            move || async move { Ok(self.is_reachable(host).await) },
            &format!("ssh on {}", host.address),
        )
        .await
    }
}

/// Quote a value for a POSIX shell command line
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@%+".contains(c))
    {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination() {
        let host = RemoteHost::new("3.14.15.92", "ubuntu");
        assert_eq!(host.destination(), "ubuntu@3.14.15.92");
    }

    #[test]
    fn test_options_include_key() {
        let ssh = Ssh::new("/tmp/key.pem");
        let opts = ssh.options();
        assert!(opts.windows(2).any(|w| w == ["-o", "BatchMode=yes"]));
        assert_eq!(&opts[opts.len() - 2..], ["-i", "/tmp/key.pem"]);
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/tmp/dump.rdb"), "/tmp/dump.rdb");
        assert_eq!(shell_quote("MATCH (n) RETURN n"), "'MATCH (n) RETURN n'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[tokio::test]
    async fn test_exec_uses_configured_binary() {
        // `echo` stands in for ssh: the remote command comes back as the last argument
        let ssh = Ssh::new("/tmp/key.pem").with_binaries("echo", "echo");
        let host = RemoteHost::new("10.0.0.1", "ubuntu");
        let output = ssh.exec(&host, "uname -a", 10).await.unwrap();
        assert!(output.stdout.trim_end().ends_with("ubuntu@10.0.0.1 uname -a"));
        assert!(ssh.is_reachable(&host).await);
    }

    #[tokio::test]
    async fn test_wait_until_reachable_times_out() {
        let ssh = Ssh::new("/tmp/key.pem").with_binaries("false", "false");
        let host = RemoteHost::new("10.0.0.1", "ubuntu");
        let err = ssh
            .wait_until_reachable(&host, Duration::from_millis(100), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Timeout waiting for ssh on 10.0.0.1"));
    }
}
