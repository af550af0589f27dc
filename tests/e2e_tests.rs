//! End-to-end tests against a local mock server
//!
//! A wiremock server stands in for both the system under test and the
//! collector control endpoints. Runs are kept to one second.

use assert_cmd::prelude::*;
use http_client_bench::{
    logging::LoggerFactory,
    models::{Config, RunSettings},
    output::ResultStore,
    types::MonitorBackend,
    PhaseCoordinator, TestRecord,
};
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::process::Command;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn start_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/echo"))
        .and(body_json(serde_json::json!({"msg": "hello"})))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(5)))
        .mount(&server)
        .await;
    for action in ["start", "stop"] {
        Mock::given(method("POST"))
            .and(path(format!("/control/{}", action)))
            .respond_with(ResponseTemplate::new(200))
            .expect(1..)
            .mount(&server)
            .await;
    }
    server
}

fn settings(server: &MockServer, backend: MonitorBackend) -> RunSettings {
    RunSettings {
        server_url: format!("{}/echo", server.uri()),
        control_url: server.uri(),
        concurrency: 4,
        warmup_seconds: 0,
        test_seconds: 1,
        library: "reqwest".to_string(),
        language: "rust".to_string(),
        monitor_backend: backend,
        client_target: "self".to_string(),
        server_target: "self".to_string(),
        sample_interval: Duration::from_millis(200),
    }
}

fn received_benchmark_requests(requests: &[wiremock::Request]) -> u64 {
    requests.iter().filter(|r| r.url.path() == "/echo").count() as u64
}

#[tokio::test]
async fn test_trial_against_mock_server() {
    let server = start_server().await;
    let loggers = LoggerFactory::new(Config::default());

    let mut coordinator =
        PhaseCoordinator::for_http(settings(&server, MonitorBackend::Process), &loggers).unwrap();
    let record = coordinator.run().await;

    assert!(record.has_latency());
    assert!(record.total_requests > 0);
    assert_eq!(record.failed_requests, 0);
    assert_eq!(record.error_rate, 0.0);
    assert_eq!(record.duration, 1);
    assert_eq!(record.throughput, record.total_requests as f64);
    assert!(record.latency_p50_ms.unwrap() >= 5.0);
    assert!(record.latency_min_ms <= record.latency_p50_ms);
    assert!(record.latency_p99_ms <= record.latency_max_ms);

    // Both roles resolve to this test process
    let usage = record.resource_usage;
    assert!(usage.client.memory_used_mb_avg > 0.0);
    assert!(usage.server.memory_used_mb_avg > 0.0);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(received_benchmark_requests(&requests), record.total_requests);
}

#[tokio::test]
async fn test_failing_endpoint_produces_degenerate_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/echo"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let loggers = LoggerFactory::new(Config::default());

    let mut coordinator =
        PhaseCoordinator::for_http(settings(&server, MonitorBackend::None), &loggers).unwrap();
    let record = coordinator.run().await;

    assert!(!record.has_latency());
    assert!(record.total_requests > 0);
    assert_eq!(record.failed_requests, record.total_requests);
    assert_eq!(record.error_rate, 100.0);
    assert_eq!(record.resource_usage, Default::default());

    let temp = TempDir::new().unwrap();
    let path = ResultStore::new(temp.path())
        .write_record(&record)
        .await
        .unwrap();
    let json: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    assert!(json.get("latency_p99_ms").is_none());
    assert_eq!(json["error_rate"], 100.0);
}

/// The binary runs in a blocking task so the mock server keeps serving
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cli_sweep_writes_records_and_summary() {
    let server = start_server().await;
    let workdir = TempDir::new().unwrap();
    let results = workdir.path().join("results");
    let env_file = workdir.path().join("bench.env");
    fs::write(
        &env_file,
        format!(
            "SERVER_URL={}/echo\nWARMUP_DURATION=0\nTEST_DURATION=1\nMONITOR_BACKEND=none\n",
            server.uri()
        ),
    )
    .unwrap();

    let cwd = workdir.path().to_path_buf();
    let results_arg = results.clone();
    let output = tokio::task::spawn_blocking(move || {
        let mut cmd = Command::cargo_bin("hcbench").unwrap();
        cmd.current_dir(cwd)
            .env_remove("SERVER_URL")
            .env_remove("CONCURRENCY")
            .env_remove("WARMUP_DURATION")
            .env_remove("TEST_DURATION")
            .env_remove("MONITOR_BACKEND")
            .env_remove("LIBRARY")
            .arg("sweep")
            .args(["--levels", "1,2", "--pause", "0", "--no-color"])
            .arg("--env-file")
            .arg(env_file)
            .arg("--results-dir")
            .arg(results_arg);
        cmd.assert()
            .success()
            .stdout(predicate::str::contains("RESULTS"))
            .stdout(predicate::str::contains("SWEEP SUMMARY"))
            .get_output()
            .clone()
    })
    .await
    .unwrap();
    assert!(output.status.success());

    for name in ["reqwest_c1.json", "reqwest_c2.json"] {
        let record: TestRecord =
            serde_json::from_str(&fs::read_to_string(results.join(name)).unwrap()).unwrap();
        assert!(record.total_requests > 0, "{}", name);
    }

    let summary: Vec<TestRecord> =
        serde_json::from_str(&fs::read_to_string(results.join("summary.json")).unwrap()).unwrap();
    let levels: Vec<usize> = summary.iter().map(|r| r.concurrency).collect();
    assert_eq!(levels, vec![1, 2]);
}
