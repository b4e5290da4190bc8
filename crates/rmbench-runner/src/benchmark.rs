//! Remote benchmark execution
//!
//! Runs the benchmark client on the client host against the server's private
//! address, then copies the JSON results back.

use crate::remote::{RemoteHost, Ssh, shell_quote};
use anyhow::{Context, Result};
use rmbench_common::ClientConfig;
use rmbench_common::defaults::{DEFAULT_REMOTE_COMMAND_TIMEOUT, REMOTE_BENCHMARK_BIN, REMOTE_RESULTS_FILE};
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// Arguments for the benchmark client
pub fn benchmark_args(client: &ClientConfig, server_ip: &str, port: u16) -> Vec<String> {
    let mut args = vec![
        "-h".to_string(),
        server_ip.to_string(),
        "-p".to_string(),
        port.to_string(),
        "-graph-key".to_string(),
        client.graph.clone(),
        "-rps".to_string(),
        client.rps.to_string(),
        "-c".to_string(),
        client.clients.to_string(),
        "-n".to_string(),
        client.requests.to_string(),
    ];
    if let Some(max) = client.random_int_max {
        args.extend(["-random-int-max".to_string(), max.to_string()]);
    }
    if let Some(seed) = client.random_seed {
        args.extend(["-random-seed".to_string(), seed.to_string()]);
    }
    for query in &client.queries {
        args.extend([
            "-query".to_string(),
            query.q.clone(),
            "-query-ratio".to_string(),
            query.ratio.to_string(),
        ]);
    }
    args.extend(["-json-out-file".to_string(), REMOTE_RESULTS_FILE.to_string()]);
    args
}

/// Full shell command line run on the client host
pub fn benchmark_command(client: &ClientConfig, server_ip: &str, port: u16) -> String {
    std::iter::once(REMOTE_BENCHMARK_BIN.to_string())
        .chain(benchmark_args(client, server_ip, port))
        .map(|part| shell_quote(&part))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run the benchmark and fetch its results to `local_results`
pub async fn run_remote_benchmark(
    ssh: &Ssh,
    client_host: &RemoteHost,
    server_ip: &str,
    port: u16,
    client: &ClientConfig,
    local_results: &Path,
    timeout_secs: u64,
) -> Result<Value> {
    info!(
        client = %client_host.address,
        server = %server_ip,
        port,
        queries = client.queries.len(),
        requests = client.requests,
        "Running benchmark"
    );

    ssh.exec_checked(
        client_host,
        &benchmark_command(client, server_ip, port),
        timeout_secs,
    )
    .await
    .context("Benchmark run failed")?;

    ssh.copy_from(
        client_host,
        REMOTE_RESULTS_FILE,
        local_results,
        DEFAULT_REMOTE_COMMAND_TIMEOUT,
    )
    .await?;

    read_results(local_results)
}

/// Read a results file; it must hold a JSON object
pub fn read_results(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read results file: {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse results file: {}", path.display()))?;
    if !value.is_object() {
        anyhow::bail!("Results file {} is not a JSON object", path.display());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmbench_common::Query;

    fn client_config() -> ClientConfig {
        ClientConfig {
            graph: "graph500".to_string(),
            rps: 0,
            clients: 32,
            requests: 1000,
            random_int_max: Some(262016),
            random_seed: None,
            queries: vec![
                Query {
                    q: "MATCH (n) RETURN count(n)".to_string(),
                    ratio: 0.75,
                },
                Query {
                    q: "RETURN 1".to_string(),
                    ratio: 0.25,
                },
            ],
        }
    }

    #[test]
    fn test_benchmark_args() {
        let args = benchmark_args(&client_config(), "10.3.0.12", 6379);
        assert_eq!(
            args,
            vec![
                "-h",
                "10.3.0.12",
                "-p",
                "6379",
                "-graph-key",
                "graph500",
                "-rps",
                "0",
                "-c",
                "32",
                "-n",
                "1000",
                "-random-int-max",
                "262016",
                "-query",
                "MATCH (n) RETURN count(n)",
                "-query-ratio",
                "0.75",
                "-query",
                "RETURN 1",
                "-query-ratio",
                "0.25",
                "-json-out-file",
                "/tmp/benchmark-result.json",
            ]
        );
    }

    #[test]
    fn test_benchmark_command_quotes_queries() {
        let command = benchmark_command(&client_config(), "10.3.0.12", 6379);
        assert!(command.starts_with("/tmp/redisgraph-benchmark-go -h 10.3.0.12 -p 6379"));
        assert!(command.contains("-query 'MATCH (n) RETURN count(n)' -query-ratio 0.75"));
        assert!(command.ends_with("-json-out-file /tmp/benchmark-result.json"));
    }

    #[test]
    fn test_read_results() {
        let dir = tempfile::TempDir::new().unwrap();

        let good = dir.path().join("good.json");
        std::fs::write(&good, r#"{"OverallQueryRates": {"Total": 100}}"#).unwrap();
        let value = read_results(&good).unwrap();
        assert_eq!(value["OverallQueryRates"]["Total"], 100);

        let array = dir.path().join("array.json");
        std::fs::write(&array, "[1, 2]").unwrap();
        assert!(read_results(&array).is_err());

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{").unwrap();
        assert!(read_results(&broken).is_err());

        assert!(read_results(&dir.path().join("missing.json")).is_err());
    }
}
