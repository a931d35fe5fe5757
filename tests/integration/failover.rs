//! Leadership across real processes: a `watch` child leads, this test process follows.

use std::{io::Read as _, sync::Arc, time::Duration};

use nix::{
    sys::signal::{Signal, kill},
    unistd::Pid,
};
use scheduled_events_coordinator::{Coordinator, Role, TracingSink, config};

use crate::common::{
    StubEndpoint, StubReply, reboot_document, spawn_scheduled_events, wait_for_file,
    write_fast_config,
};

async fn follower(config_path: &std::path::Path) -> Coordinator {
    let config = config::load(config_path).await.unwrap();
    let fetcher = config.http_fetcher().unwrap();
    Coordinator::start(config, Arc::new(fetcher), Arc::new(TracingSink)).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn follower_takes_over_after_leader_crash() {
    let stub = StubEndpoint::start(StubReply::Document(reboot_document(1, ""))).await;
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_fast_config(dir.path(), &stub.url);
    let cache_path = dir.path().join("cache.json");

    let mut leader = spawn_scheduled_events(&["watch", "--config", config_path.to_str().unwrap()]);
    wait_for_file(&cache_path, 10).await;

    let follower = follower(&config_path).await;
    assert_eq!(follower.role(), Role::Follower, "the child holds the lock");
    let document = follower.get().await.unwrap().unwrap();
    assert_eq!(document.document_incarnation, 1, "served from the leader's cache");

    // SIGKILL: no cleanup runs, the kernel drops the lock with the process.
    leader.0.kill().unwrap();
    leader.0.wait().unwrap();
    assert!(cache_path.exists(), "a crashed leader leaves its cache behind");

    stub.set_reply(StubReply::Document(reboot_document(2, "")));
    let mut role_rx = follower.subscribe_role();
    tokio::time::timeout(
        Duration::from_secs(10),
        role_rx.wait_for(|role| *role == Role::Leader),
    )
    .await
    .expect("follower was not promoted after the leader died")
    .unwrap();

    let document = follower.get().await.unwrap().unwrap();
    assert_eq!(document.document_incarnation, 2, "the new leader reads upstream");

    follower.shutdown().await;
    assert!(!cache_path.exists(), "the lock holder removes the cache on shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sigterm_shuts_the_leader_down_cleanly() {
    let stub = StubEndpoint::start(StubReply::Document(reboot_document(7, ""))).await;
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_fast_config(dir.path(), &stub.url);
    let cache_path = dir.path().join("cache.json");

    let mut leader = spawn_scheduled_events(&["watch", "--config", config_path.to_str().unwrap()]);
    wait_for_file(&cache_path, 10).await;
    // Give the printing loop a moment to emit its first line.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let pid = Pid::from_raw(i32::try_from(leader.0.id()).unwrap());
    kill(pid, Signal::SIGTERM).unwrap();
    let status = leader.0.wait().unwrap();
    assert!(status.success(), "watch exits cleanly on SIGTERM, got {status:?}");
    assert!(!cache_path.exists(), "graceful shutdown deletes the cache");

    let mut stdout = String::new();
    leader
        .0
        .stdout
        .take()
        .unwrap()
        .read_to_string(&mut stdout)
        .unwrap();
    let first: serde_json::Value =
        serde_json::from_str(stdout.lines().next().expect("watch printed nothing")).unwrap();
    assert_eq!(first["DocumentIncarnation"], 7);
    assert_eq!(
        stdout.lines().count(),
        1,
        "unchanged documents are printed once"
    );

    let follower = follower(&config_path).await;
    assert_eq!(follower.role(), Role::Leader, "the lock is free again");
    follower.shutdown().await;
}
