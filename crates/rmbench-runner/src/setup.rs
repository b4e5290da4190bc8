//! Remote server and benchmark client setup
//!
//! Puts the module under test (and optionally a dataset) on the server host,
//! starts `redis-server` with the module loaded, and installs the benchmark
//! client on the client host.

use crate::remote::{RemoteHost, Ssh, shell_quote};
use crate::wait::{WaitConfig, wait_for_resource};
use anyhow::{Context, Result};
use rmbench_common::defaults::{
    DEFAULT_REMOTE_COMMAND_TIMEOUT, REMOTE_BENCHMARK_BIN, REMOTE_DATASET_FILE, REMOTE_MODULE_FILE,
};
use rmbench_common::{DatasetSource, DbConfig};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Command line that downloads a file on a remote host
pub fn download_command(url: &str, destination: &str) -> String {
    format!(
        "wget -q {} -O {}",
        shell_quote(url),
        shell_quote(destination)
    )
}

/// Command line that starts the server in the background with the module loaded
pub fn server_start_command(port: u16, module_args: &[String]) -> String {
    let dataset = Path::new(REMOTE_DATASET_FILE);
    let dir = dataset
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "/tmp".to_string());
    let dbfilename = dataset
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dump.rdb".to_string());

    let mut parts = vec![
        "redis-server".to_string(),
        "--dir".to_string(),
        dir,
        "--dbfilename".to_string(),
        dbfilename,
        "--port".to_string(),
        port.to_string(),
        "--protected-mode".to_string(),
        "no".to_string(),
        "--daemonize".to_string(),
        "yes".to_string(),
        "--loadmodule".to_string(),
        REMOTE_MODULE_FILE.to_string(),
    ];
    parts.extend(module_args.iter().cloned());
    parts
        .iter()
        .map(|p| shell_quote(p))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Copy module and dataset to the server, start it, and wait until it answers PING
pub async fn spin_up_server(
    ssh: &Ssh,
    server: &RemoteHost,
    port: u16,
    dbconfig: &DbConfig,
    definition_dir: &Path,
    module_path: &Path,
    cancel: Option<&CancellationToken>,
) -> Result<()> {
    info!(host = %server.address, module = %module_path.display(), "Setting up database server");

    if !module_path.is_file() {
        anyhow::bail!("Module file not found: {}", module_path.display());
    }
    ssh.copy_to(
        server,
        module_path,
        REMOTE_MODULE_FILE,
        DEFAULT_REMOTE_COMMAND_TIMEOUT,
    )
    .await?;

    match dbconfig.dataset_source(definition_dir) {
        Some(DatasetSource::Url(url)) => {
            info!(host = %server.address, url = %url, "Fetching dataset on server");
            ssh.exec_checked(
                server,
                &download_command(&url, REMOTE_DATASET_FILE),
                dbconfig.dataset_load_timeout_secs.max(DEFAULT_REMOTE_COMMAND_TIMEOUT),
            )
            .await
            .context("Failed to download dataset")?;
        }
        Some(DatasetSource::Local(path)) => {
            ssh.copy_to(
                server,
                &path,
                REMOTE_DATASET_FILE,
                DEFAULT_REMOTE_COMMAND_TIMEOUT,
            )
            .await
            .context("Failed to copy dataset")?;
        }
        None => info!("No dataset declared, starting empty server"),
    }

    ssh.exec_checked(
        server,
        &server_start_command(port, &dbconfig.module_args),
        DEFAULT_REMOTE_COMMAND_TIMEOUT,
    )
    .await
    .context("Failed to start redis-server")?;

    let ping = format!("redis-cli -p {port} ping");
    let config = WaitConfig {
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(10),
        timeout: Duration::from_secs(dbconfig.dataset_load_timeout_secs),
    };
    let ping = ping.as_str();
    wait_for_resource(
        config,
        cancel,
        move || async move {
            let output = ssh.exec(server, ping, 30).await?;
            Ok::<_, anyhow::Error>(output.success && output.stdout.trim() == "PONG")
        },
        &format!("redis-server on {}", server.address),
    )
    .await?;

    info!(host = %server.address, port, "Database server ready");
    Ok(())
}

/// Download the benchmark client onto the client host
pub async fn install_benchmark_tool(ssh: &Ssh, client: &RemoteHost, tool_url: &str) -> Result<()> {
    info!(host = %client.address, url = %tool_url, "Installing benchmark client");
    let command = format!(
        "{} && chmod 755 {}",
        download_command(tool_url, REMOTE_BENCHMARK_BIN),
        REMOTE_BENCHMARK_BIN
    );
    ssh.exec_checked(client, &command, DEFAULT_REMOTE_COMMAND_TIMEOUT)
        .await
        .context("Failed to install benchmark client")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_start_command() {
        assert_eq!(
            server_start_command(6379, &[]),
            "redis-server --dir /tmp --dbfilename dump.rdb --port 6379 --protected-mode no \
             --daemonize yes --loadmodule /tmp/redisgraph.so"
        );
        assert_eq!(
            server_start_command(6380, &["THREAD_COUNT".to_string(), "4".to_string()]),
            "redis-server --dir /tmp --dbfilename dump.rdb --port 6380 --protected-mode no \
             --daemonize yes --loadmodule /tmp/redisgraph.so THREAD_COUNT 4"
        );
    }

    #[test]
    fn test_download_command() {
        assert_eq!(
            download_command("https://example.com/dump.rdb?x=1&y=2", "/tmp/dump.rdb"),
            "wget -q 'https://example.com/dump.rdb?x=1&y=2' -O /tmp/dump.rdb"
        );
    }

    #[tokio::test]
    async fn test_spin_up_server_missing_module() {
        let ssh = Ssh::new("/tmp/key.pem").with_binaries("true", "true");
        let server = RemoteHost::new("10.0.0.1", "ubuntu");
        let err = spin_up_server(
            &ssh,
            &server,
            6379,
            &DbConfig::default(),
            Path::new("."),
            Path::new("/definitely/not/here/redisgraph.so"),
            None,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Module file not found"));
    }
}
