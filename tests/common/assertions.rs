#![allow(dead_code)]

use std::process::Output;

/// Assert that a command output contains text (case-insensitive)
pub fn assert_output_contains(output: &Output, expected: &str) {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let combined = format!("{stdout}{stderr}");

    assert!(
        combined.to_lowercase().contains(&expected.to_lowercase()),
        "Expected output to contain '{expected}'\nActual stdout: {stdout}\nActual stderr: {stderr}"
    );
}

/// Assert that a child's pid file is gone and the process with it
pub fn assert_fully_stopped(pid_file: &std::path::Path, pid: u32) {
    assert!(
        !pid_file.exists(),
        "PID file {} still exists",
        pid_file.display()
    );
    assert!(
        !super::process_exists(pid),
        "Process {pid} is still running"
    );
}
