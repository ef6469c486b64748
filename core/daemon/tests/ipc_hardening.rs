use claude_bar_protocol::{Method, Request, Response, MAX_REQUEST_BYTES, PROTOCOL_VERSION};
use std::fs;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const CONFIG: &str = r#"
program = "claude-bar-test-no-such-program"
terminals = []
write_handoff = false
"#;

struct DaemonGuard {
    child: Child,
}

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn temp_home(prefix: &str) -> TempDir {
    let home = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in("/tmp")
        .expect("failed to create temp HOME");
    let root = home.path().join(".claude-bar");
    fs::create_dir_all(&root).expect("failed to create config dir");
    fs::write(root.join("config.toml"), CONFIG).expect("failed to write config");
    home
}

fn spawn_daemon(home: &Path) -> Child {
    Command::new(env!("CARGO_BIN_EXE_claude-bar-daemon"))
        .env("HOME", home)
        .env_remove("CLAUDE_BAR_SOCKET")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn claude-bar-daemon")
}

fn socket_path(home: &Path) -> PathBuf {
    home.join(".claude-bar").join("daemon.sock")
}

fn can_bind_socket(home: &Path) -> bool {
    let probe_path = home.join("probe.sock");
    match UnixListener::bind(&probe_path) {
        Ok(listener) => {
            drop(listener);
            let _ = fs::remove_file(&probe_path);
            true
        }
        Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => false,
        Err(_) => true,
    }
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if path.exists() {
            return;
        }
        sleep(Duration::from_millis(25));
    }
    panic!("timed out waiting for daemon socket at {}", path.display());
}

fn start(prefix: &str) -> Option<(TempDir, PathBuf, DaemonGuard)> {
    let home = temp_home(prefix);
    if !can_bind_socket(home.path()) {
        eprintln!("Skipping daemon hardening test: unix socket binding not permitted in this environment.");
        return None;
    }
    let socket = socket_path(home.path());
    let guard = DaemonGuard {
        child: spawn_daemon(home.path()),
    };
    wait_for_socket(&socket, Duration::from_secs(5));
    Some((home, socket, guard))
}

fn send_request(socket: &Path, request: Request) -> Response {
    let mut payload = serde_json::to_vec(&request).expect("failed to serialize request");
    payload.push(b'\n');
    send_raw_request(socket, &payload)
}

fn send_raw_request(socket: &Path, payload: &[u8]) -> Response {
    let mut stream = UnixStream::connect(socket).expect("failed to connect to daemon socket");
    stream.write_all(payload).expect("failed to write request");
    stream.flush().ok();
    read_response(&mut stream)
}

fn read_response(stream: &mut UnixStream) -> Response {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = stream.read(&mut chunk).expect("failed to read response");
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if chunk[..n].contains(&b'\n') {
            break;
        }
    }

    let response_bytes = match buffer.iter().position(|b| *b == b'\n') {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    serde_json::from_slice(response_bytes).expect("failed to parse response JSON")
}

fn error_code(response: &Response) -> Option<&str> {
    response.error.as_ref().map(|err| err.code.as_str())
}

fn assert_healthy(socket: &Path) {
    let health = send_request(socket, Request::new(Method::GetHealth));
    assert!(health.ok, "daemon should remain healthy");
}

#[test]
fn daemon_rejects_protocol_mismatch() {
    let Some((_home, socket, _guard)) = start("claude-bar-hardening-protocol") else {
        return;
    };

    let response = send_request(
        &socket,
        Request {
            protocol_version: PROTOCOL_VERSION + 1,
            method: Method::GetSessions,
            id: Some("future-client".to_string()),
            params: None,
        },
    );
    assert!(!response.ok);
    assert_eq!(response.id.as_deref(), Some("future-client"));
    assert_eq!(error_code(&response), Some("protocol_mismatch"));

    assert_healthy(&socket);
}

#[test]
fn daemon_handles_malformed_payload_flood_without_losing_health() {
    let Some((_home, socket, _guard)) = start("claude-bar-hardening-malformed") else {
        return;
    };

    for _ in 0..64 {
        let response = send_raw_request(&socket, b"{\"bad_json\": true\n");
        assert!(!response.ok, "malformed payload must be rejected");
        assert_eq!(error_code(&response), Some("invalid_json"));
    }

    let response = send_raw_request(&socket, b"   \n");
    assert_eq!(error_code(&response), Some("empty_request"));

    assert_healthy(&socket);
}

#[test]
fn daemon_rejects_oversized_request() {
    let Some((_home, socket, _guard)) = start("claude-bar-hardening-oversized") else {
        return;
    };

    let payload = vec![b'a'; MAX_REQUEST_BYTES + 8 * 1024];
    let response = send_raw_request(&socket, &payload);
    assert!(!response.ok);
    assert_eq!(error_code(&response), Some("request_too_large"));

    assert_healthy(&socket);
}

#[test]
fn daemon_idle_connection_returns_read_timeout_error() {
    let Some((_home, socket, _guard)) = start("claude-bar-hardening-timeout") else {
        return;
    };

    let mut idle = UnixStream::connect(&socket).expect("failed to connect idle stream");
    let response = read_response(&mut idle);
    assert!(!response.ok, "idle request should return an error");
    assert_eq!(error_code(&response), Some("read_timeout"));
}
