#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/cvlink-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let start = Instant::now();
    while !path.exists() {
        if start.elapsed() >= timeout {
            panic!("server socket did not appear");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn spawn_server(sock_path: &Path) -> Child {
    let child = Command::new(env!("CARGO_BIN_EXE_cvlink"))
        .args(["--log-level", "error", "serve", "--socket"])
        .arg(sock_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve command should start");
    wait_for_socket(sock_path, Duration::from_secs(3));
    child
}

/// Run `send`, retrying while the previous client is still being torn down.
fn send(sock_path: &Path, format: &str, command: &[&str]) -> Output {
    let start = Instant::now();
    loop {
        let output = Command::new(env!("CARGO_BIN_EXE_cvlink"))
            .args(["--log-level", "error", "--format", format, "send"])
            .args(command)
            .arg("--socket")
            .arg(sock_path)
            .output()
            .expect("send should run");
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.contains("rejected") || start.elapsed() >= Duration::from_secs(3) {
            return output;
        }
        thread::sleep(Duration::from_millis(25));
    }
}

#[test]
fn send_against_demo_server() {
    let dir = unique_temp_dir("send");
    let sock_path = dir.join("scene.sock");
    let mut child = spawn_server(&sock_path);

    let output = send(&sock_path, "raw", &["vget", "/persistent_level/id"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "PersistentLevel");

    let output = send(&sock_path, "raw", &["vexec", "Robot", "SetSpeed", "42"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "ok");

    let output = send(&sock_path, "json", &["vbp", "Robot", "GetSpeed"]);
    assert!(output.status.success());
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("json output should parse");
    assert_eq!(json["status"], "ok");
    assert_eq!(json["data"]["ReturnValue"], "42");

    let output = send(&sock_path, "raw", &["vbp", "Robot", "Echo", "two words"]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        r#"{"ReturnValue":"two words"}"#
    );

    let output = send(&sock_path, "raw", &["frobnicate", "now"]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "error unknown command 'frobnicate now'"
    );

    let _ = child.kill();
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_to_missing_socket_returns_3() {
    let dir = unique_temp_dir("missing");
    let output = Command::new(env!("CARGO_BIN_EXE_cvlink"))
        .args(["send", "vrun", "quit", "--socket"])
        .arg(dir.join("absent.sock"))
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("connect failed"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_reports_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_cvlink"))
        .args(["version", "--extended"])
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&format!("version: {}", env!("CARGO_PKG_VERSION"))));
    assert!(stdout.contains("wire_magic: 0x9E2B83C1"));
}
