#![cfg(unix)]

mod common;

use common::{TestRoot, process_exists, spawn_leftover, wait_until};
use std::time::Duration;

#[tokio::test]
async fn test_managed_leftover_is_terminated_on_start() {
    let root = TestRoot::new();
    let mut leftover = spawn_leftover(true);
    let leftover_pid = leftover.id();
    root.pid_file("sleeper").write(leftover_pid).await.unwrap();

    let supervisor = root.supervisor(root.builder("sleeper").bin_path("/bin/sleep").args(&["30"]));
    supervisor.start().await.unwrap();

    assert!(
        wait_until(Duration::from_secs(5), || matches!(leftover.try_wait(), Ok(Some(_)))).await,
        "leftover process was not terminated"
    );

    let pid = supervisor.current_pid().unwrap();
    assert_ne!(pid, leftover_pid);
    assert_eq!(root.pid_file("sleeper").read().await.unwrap(), Some(pid));

    supervisor.stop().await;
}

#[tokio::test]
async fn test_unmarked_process_is_left_alone() {
    let root = TestRoot::new();
    let mut foreign = spawn_leftover(false);
    let foreign_pid = foreign.id();
    root.pid_file("sleeper").write(foreign_pid).await.unwrap();

    let supervisor = root.supervisor(root.builder("sleeper").bin_path("/bin/sleep").args(&["30"]));
    supervisor.start().await.unwrap();

    assert!(foreign.try_wait().unwrap().is_none());
    assert!(process_exists(foreign_pid));
    assert_eq!(
        root.pid_file("sleeper").read().await.unwrap(),
        supervisor.current_pid()
    );

    supervisor.stop().await;
    assert!(foreign.try_wait().unwrap().is_none());
    foreign.kill().unwrap();
    foreign.wait().unwrap();
}

#[tokio::test]
async fn test_other_binary_is_left_alone() {
    let root = TestRoot::new();
    let mut foreign = spawn_leftover(true);
    root.pid_file("shell").write(foreign.id()).await.unwrap();

    let supervisor = root.supervisor(root.builder("shell").shell("exec sleep 30"));
    supervisor.start().await.unwrap();

    assert!(foreign.try_wait().unwrap().is_none());

    supervisor.stop().await;
    foreign.kill().unwrap();
    foreign.wait().unwrap();
}

#[tokio::test]
async fn test_stale_pid_file_is_ignored() {
    let root = TestRoot::new();
    let mut gone = std::process::Command::new("/bin/true").spawn().unwrap();
    let gone_pid = gone.id();
    gone.wait().unwrap();
    root.pid_file("sleeper").write(gone_pid).await.unwrap();

    let supervisor = root.supervisor(root.builder("sleeper").bin_path("/bin/sleep").args(&["30"]));
    supervisor.start().await.unwrap();
    assert!(supervisor.is_running().await);

    supervisor.stop().await;
}

#[tokio::test]
async fn test_malformed_pid_file_fails_start() {
    let root = TestRoot::new();
    let pid_file = root.pid_file("sleeper");
    tokio::fs::write(pid_file.path(), "not a pid\n").await.unwrap();

    let supervisor = root.supervisor(root.builder("sleeper").bin_path("/bin/sleep").args(&["30"]));
    let err = supervisor.start().await.unwrap_err();

    assert!(!err.is_unsupported());
    assert!(!supervisor.is_running().await);
    assert_eq!(supervisor.current_pid(), None);
}

#[tokio::test]
async fn test_pid_zero_fails_start() {
    let root = TestRoot::new();
    let pid_file = root.pid_file("sleeper");
    tokio::fs::write(pid_file.path(), "0\n").await.unwrap();

    let supervisor = root.supervisor(root.builder("sleeper").bin_path("/bin/sleep").args(&["30"]));
    assert!(supervisor.start().await.is_err());
}
