//! End-to-end runs through the real HTTP transport against mock backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use surge::controller::{Controller, StartRequest};
use surge::dispatch::HttpTransport;
use surge::run::RunPhase;
use surge::upstream::{Endpoint, EndpointRotator};

mod common;

fn controller(config: &surge::EngineConfig, rotator: EndpointRotator) -> Controller<HttpTransport> {
    let transport = HttpTransport::from_config(&config.request, &config.timeouts).unwrap();
    Controller::new(transport, config, Arc::new(rotator))
}

fn start(target: i64, destination: String) -> StartRequest {
    StartRequest {
        target,
        destination,
        overrides: None,
    }
}

async fn wait_for_phase(controller: &Controller<HttpTransport>, timeout: Duration) -> RunPhase {
    let mut phase = controller.subscribe().expect("no run started");
    let result = tokio::time::timeout(timeout, phase.wait_for(|p| p.is_terminal()))
        .await
        .expect("run did not reach a terminal phase")
        .map(|p| *p);
    result.unwrap()
}

#[tokio::test]
async fn test_target_completes_exactly() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let backend = common::start_programmable_backend(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { (200, "{}".to_string()) }
    })
    .await;

    let c = controller(&common::test_config(), EndpointRotator::disabled());
    c.start(start(100, format!("http://{}/ingest", backend))).unwrap();
    assert_eq!(wait_for_phase(&c, Duration::from_secs(10)).await, RunPhase::Completed);

    let status = c.status();
    assert_eq!(status.succeeded, 100);
    assert_eq!(status.submitted, 100);
    assert_eq!(status.failed, 0);
    assert!(!status.running);

    // Nothing is sent after the target is reached.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 100);
}

#[tokio::test]
async fn test_failures_are_counted_and_run_still_completes() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let backend = common::start_programmable_backend(move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n % 3 == 0 {
                (500, "{}".to_string())
            } else {
                (200, "{}".to_string())
            }
        }
    })
    .await;

    let c = controller(&common::test_config(), EndpointRotator::disabled());
    c.start(start(40, format!("http://{}/", backend))).unwrap();
    assert_eq!(wait_for_phase(&c, Duration::from_secs(10)).await, RunPhase::Completed);
    c.shutdown().await;

    let status = c.status();
    assert_eq!(status.succeeded, 40);
    assert!(status.failed > 0);
    assert_eq!(status.submitted, status.succeeded + status.failed);
    assert!(status.success_ratio < 1.0);
}

#[tokio::test]
async fn test_stop_mid_run() {
    let backend = common::start_slow_backend(Duration::from_millis(20)).await;
    let c = controller(&common::test_config(), EndpointRotator::disabled());
    c.start(start(100, format!("http://{}/", backend))).unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while c.status().succeeded < 40 {
        assert!(tokio::time::Instant::now() < deadline, "run made no progress");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    c.stop().unwrap();
    assert_eq!(wait_for_phase(&c, Duration::from_secs(5)).await, RunPhase::Stopped);
    // Let the batch in flight drain.
    c.shutdown().await;

    let after_stop = c.status();
    assert!(!after_stop.running);
    assert!(after_stop.succeeded >= 40);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let later = c.status();
    assert_eq!(later.batches, after_stop.batches);
    assert_eq!(later.submitted, after_stop.submitted);
}

#[tokio::test]
async fn test_unreachable_destination_counts_failures() {
    let dead = common::closed_port().await;
    let c = controller(&common::test_config(), EndpointRotator::disabled());
    c.start(start(10, format!("http://{}/", dead))).unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    let status = c.status();
    assert!(status.running);
    assert_eq!(status.succeeded, 0);
    assert!(status.failed > 0);
    c.shutdown().await;
}

#[tokio::test]
async fn test_endpoint_rotation_keeps_destination_host() {
    let hosts = Arc::new(Mutex::new(Vec::new()));
    let seen = hosts.clone();
    let backend = common::start_programmable_backend(move |req| {
        seen.lock().unwrap().push(req.host.unwrap_or_default());
        async { (200, "{}".to_string()) }
    })
    .await;

    let rotator = EndpointRotator::new(
        vec![Endpoint::new("127.0.0.1", backend.port())],
        true,
    );
    let c = controller(&common::test_config(), rotator);
    c.start(start(5, "http://api.example.invalid:8080/v1".to_string())).unwrap();
    assert_eq!(wait_for_phase(&c, Duration::from_secs(10)).await, RunPhase::Completed);

    let hosts = hosts.lock().unwrap();
    assert_eq!(hosts.len(), 5);
    assert!(hosts.iter().all(|h| h == "api.example.invalid:8080"));
    assert!(c.status().rotations >= 5);
}

#[tokio::test]
async fn test_success_pointer_gates_success() {
    let backend = common::start_programmable_backend(|req| async move {
        if req.path == "/good" {
            (200, r#"{"data":{"id":7}}"#.to_string())
        } else {
            (200, r#"{"error":"nope"}"#.to_string())
        }
    })
    .await;

    let mut config = common::test_config();
    config.request.success_pointer = Some("/data/id".into());

    let good = controller(&config, EndpointRotator::disabled());
    good.start(start(10, format!("http://{}/good", backend))).unwrap();
    assert_eq!(wait_for_phase(&good, Duration::from_secs(10)).await, RunPhase::Completed);

    let bad = controller(&config, EndpointRotator::disabled());
    bad.start(start(10, format!("http://{}/bad", backend))).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let status = bad.status();
    assert_eq!(status.succeeded, 0);
    assert!(status.failed > 0);
    bad.shutdown().await;
}

#[tokio::test]
async fn test_each_request_carries_unique_request_id() {
    let ids = Arc::new(Mutex::new(Vec::new()));
    let seen = ids.clone();
    let backend = common::start_programmable_backend(move |req| {
        seen.lock().unwrap().push(req.request_id.unwrap_or_default());
        async { (200, "{}".to_string()) }
    })
    .await;

    let c = controller(&common::test_config(), EndpointRotator::disabled());
    c.start(start(30, format!("http://{}/", backend))).unwrap();
    wait_for_phase(&c, Duration::from_secs(10)).await;

    let mut ids = ids.lock().unwrap().clone();
    assert_eq!(ids.len(), 30);
    assert!(ids.iter().all(|id| !id.is_empty()));
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 30);
}
