//! One-shot subcommands of the `scheduled_events` binary.

use std::{process::Stdio, time::Duration};

use clap::Parser as _;
use scheduled_events_coordinator::{cli::Cli, inner_main};

use crate::common::{
    StubEndpoint, StubReply, bin, reboot_document, run_scheduled_events, write_fast_config,
};

/// Far enough ahead that no notice period reaches it.
const FAR_FUTURE: &str = "Fri, 31 Dec 2100 23:59:59 GMT";

#[tokio::test]
async fn get_prints_the_document() {
    let stub = StubEndpoint::start(StubReply::Document(reboot_document(4, FAR_FUTURE))).await;
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_fast_config(dir.path(), &stub.url);

    let (success, stdout) =
        run_scheduled_events(&["get", "--config", config_path.to_str().unwrap()]).await;
    assert!(success, "get failed");
    let document: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(document["DocumentIncarnation"], 4);
    assert_eq!(document["Events"][0]["NotBefore"], FAR_FUTURE);
    assert!(
        !dir.path().join("cache.json").exists(),
        "a leader that exits removes its cache"
    );
}

#[tokio::test]
async fn get_prints_null_without_content() {
    let stub = StubEndpoint::start(StubReply::NoContent).await;
    let dir = tempfile::tempdir().unwrap();
    let lock_path = dir.path().join("role.lock");
    let cache_path = dir.path().join("cache.json");

    let (success, stdout) = run_scheduled_events(&[
        "get",
        "--endpoint",
        stub.url.as_str(),
        "--lock-path",
        lock_path.to_str().unwrap(),
        "--cache-path",
        cache_path.to_str().unwrap(),
    ])
    .await;
    assert!(success, "get failed");
    assert_eq!(stdout.trim(), "null");
}

#[tokio::test]
async fn get_fails_when_upstream_fails() {
    let stub = StubEndpoint::start(StubReply::Status(
        axum::http::StatusCode::SERVICE_UNAVAILABLE,
    ))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_fast_config(dir.path(), &stub.url);

    let (success, stdout) =
        run_scheduled_events(&["get", "--config", config_path.to_str().unwrap()]).await;
    assert!(!success, "get should report the upstream failure");
    assert!(stdout.is_empty(), "nothing is printed on failure");
}

#[tokio::test]
async fn approve_sends_every_event_id() {
    let stub = StubEndpoint::start(StubReply::NoContent).await;

    let (success, _) = run_scheduled_events(&[
        "approve",
        "--endpoint",
        stub.url.as_str(),
        "--event-id",
        "first",
        "--event-id",
        "second",
    ])
    .await;
    assert!(success, "approve failed");
    assert_eq!(
        stub.approvals(),
        [serde_json::json!({
            "StartRequests": [{ "EventId": "first" }, { "EventId": "second" }]
        })]
    );
}

#[tokio::test]
async fn wait_for_notice_returns_once_an_event_is_due() {
    let stub = StubEndpoint::start(StubReply::Document(reboot_document(1, FAR_FUTURE))).await;
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_fast_config(dir.path(), &stub.url);

    let mut child = tokio::process::Command::new(bin())
        .args(["wait-for-notice", "--config", config_path.to_str().unwrap()])
        .env("SCHEDULED_EVENTS_INTEGRATION_TEST", "1")
        .stdout(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .expect("failed to start scheduled_events");

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(
        child.try_wait().unwrap().is_none(),
        "an event in 2100 is not imminent"
    );

    // An empty NotBefore means the event may start at any moment.
    stub.set_reply(StubReply::Document(reboot_document(2, "")));
    let output = tokio::time::timeout(Duration::from_secs(10), child.wait_with_output())
        .await
        .expect("wait-for-notice did not return")
        .unwrap();
    assert!(
        output.status.success(),
        "wait-for-notice exited with {:?}",
        output.status
    );
    let event: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(event["EventId"], "602d9444-d2cd-49c7-8624-8643e7171297");
    assert_eq!(event["NotBefore"], "", "the triggering event is printed as upstream sent it");
}

#[tokio::test]
async fn inner_main_runs_in_process() {
    let stub = StubEndpoint::start(StubReply::NoContent).await;

    let invocation = Cli::try_parse_from([
        "scheduled_events",
        "approve",
        "--endpoint",
        stub.url.as_str(),
        "--event-id",
        "in-process",
    ])
    .unwrap();
    inner_main(invocation).await.unwrap();
    assert_eq!(stub.approvals().len(), 1);

    let dir = tempfile::tempdir().unwrap();
    let invocation = Cli::try_parse_from([
        "scheduled_events",
        "get",
        "--config",
        dir.path().join("missing.toml").to_str().unwrap(),
    ])
    .unwrap();
    assert!(
        inner_main(invocation).await.is_err(),
        "a missing config file is an error"
    );
}
