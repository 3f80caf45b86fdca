use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;

pub struct McpServerProcess {
    child: Child,
    stdin: ChildStdin,
    rx: mpsc::Receiver<Value>,
    pub log_path: Option<PathBuf>,
}

impl McpServerProcess {
    pub fn spawn(root: &Path) -> Self {
        Self::spawn_with_log(root, None)
    }

    pub fn spawn_with_log(root: &Path, log_path: Option<PathBuf>) -> Self {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_snip"));
        cmd.arg("server")
            .arg("--root")
            .arg(root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        if let Some(path) = log_path.as_ref() {
            cmd.env("SNIP_LOG_PATH", path);
        }

        let mut child = cmd.spawn().expect("spawn snip server");
        let stdin = child.stdin.take().expect("server stdin");
        let stdout = child.stdout.take().expect("server stdout");

        // Forward every JSON line from stdout; anything else is noise.
        let (tx, rx) = mpsc::channel::<Value>();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if let Ok(msg) = serde_json::from_str::<Value>(line.trim())
                    && tx.send(msg).is_err()
                {
                    break;
                }
            }
        });

        Self {
            child,
            stdin,
            rx,
            log_path,
        }
    }

    pub fn send_line(&mut self, line: &str) {
        writeln!(self.stdin, "{line}").expect("write server stdin");
        self.stdin.flush().expect("flush server stdin");
    }

    pub fn recv_json(&mut self, timeout: Duration) -> Option<Value> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn initialize(&mut self) -> Value {
        let resp = self.request(
            1,
            "initialize",
            serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": { "name": "snip-e2e", "version": "0.1" },
            }),
        );
        self.send_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized","params":{}}"#);
        resp
    }

    /// Send a request and wait for the response carrying the same id.
    pub fn request(&mut self, id: u64, method: &str, params: Value) -> Value {
        let req = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        self.send_line(&req.to_string());

        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.recv_json(remaining) {
                Some(msg) if msg["id"].as_u64() == Some(id) => return msg,
                Some(_) => continue,
                None => panic!("no {method} response within 10s"),
            }
        }
    }

    pub fn call_tool(&mut self, id: u64, name: &str, arguments: Value) -> Value {
        self.request(
            id,
            "tools/call",
            serde_json::json!({ "name": name, "arguments": arguments }),
        )
    }

    pub fn kill(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for McpServerProcess {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Concatenated `text` of every content item in a tools/call response.
pub fn response_text(resp: &Value) -> String {
    let mut out = String::new();
    let Some(contents) = resp
        .get("result")
        .and_then(|r| r.get("content"))
        .and_then(|c| c.as_array())
    else {
        return out;
    };

    for item in contents {
        if let Some(text) = item.get("text").and_then(|t| t.as_str()) {
            out.push_str(text);
            out.push('\n');
        }
    }
    out
}
