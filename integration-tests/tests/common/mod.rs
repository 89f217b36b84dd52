use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command};
use std::time::Duration;
use tempfile::TempDir;

/// Find a free TCP port by binding to port 0
pub fn find_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to port 0");
    listener.local_addr().unwrap().port()
}

/// Wait for a TCP port to accept connections
pub async fn wait_for_port(port: u16, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if tokio::time::Instant::now() > deadline {
            panic!("Timed out waiting for port {} to be ready", port);
        }
        if tokio::net::TcpStream::connect(format!("127.0.0.1:{}", port))
            .await
            .is_ok()
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Get the path to a compiled binary in the target directory
fn cargo_bin(name: &str) -> PathBuf {
    // Look for the binary in target/debug (standard cargo test location)
    let mut path = std::env::current_exe()
        .expect("Failed to get current exe")
        .parent()
        .expect("No parent")
        .parent()
        .expect("No grandparent")
        .to_path_buf();
    path.push(name);
    if path.exists() {
        return path;
    }

    // Fallback: try target/debug directly
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.pop(); // integration-tests -> workspace root
    path.push("target");
    path.push("debug");
    path.push(name);
    if path.exists() {
        return path;
    }

    panic!("Binary '{}' not found. Run `cargo build --workspace` first.", name);
}

/// A test fleet: one collector plus any number of agent processes
pub struct TestFleet {
    pub collector_port: u16,
    collector: Child,
    agents: Vec<Child>,
    offline_after_secs: u64,
    session_ttl_secs: u64,
    temp_dir: TempDir,
    db_path: PathBuf,
}

impl TestFleet {
    /// Start a collector with default timings on an ephemeral port
    pub async fn new() -> Self {
        Self::with_options(10, 900).await
    }

    /// Start a collector with explicit presence/session timings
    pub async fn with_options(offline_after_secs: u64, session_ttl_secs: u64) -> Self {
        let port = find_free_port();
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("collector.db");

        let collector = spawn_collector(port, &db_path, offline_after_secs, session_ttl_secs);
        wait_for_port(port, Duration::from_secs(10)).await;

        Self {
            collector_port: port,
            collector,
            agents: Vec::new(),
            offline_after_secs,
            session_ttl_secs,
            temp_dir,
            db_path,
        }
    }

    /// Get the collector API URL
    pub fn collector_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.collector_port)
    }

    /// Provision a PC and return its one-time auth token
    pub async fn provision_pc(&self, pc_id: &str) -> String {
        let resp = reqwest::Client::new()
            .post(format!("{}/api/pcs", self.collector_url()))
            .json(&serde_json::json!({ "pcId": pc_id }))
            .send()
            .await
            .expect("Failed to provision PC")
            .json::<ProvisionPcResponse>()
            .await
            .expect("Failed to parse provision response");
        resp.auth_token
    }

    /// Start an agent for the given identity and give it a moment to register
    pub async fn add_agent(&mut self, pc_id: &str, auth_token: &str) {
        self.spawn_agent(pc_id, auth_token);
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    /// Start an agent without waiting (for failure-path tests)
    pub fn spawn_agent(&mut self, pc_id: &str, auth_token: &str) {
        let log_file = self.temp_dir.path().join(format!("{}.log", pc_id));

        let agent = Command::new(cargo_bin("fleetpulse-agent"))
            .arg(pc_id)
            .arg(auth_token)
            .arg(self.collector_url())
            .args(["--log-file", log_file.to_str().unwrap()])
            .args(["--log-level", "debug"])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .expect("Failed to start agent");

        self.agents.push(agent);
    }

    /// Get a mutable reference to an agent process
    pub fn agent_mut(&mut self, index: usize) -> &mut Child {
        &mut self.agents[index]
    }

    /// Wait for an agent process to exit, up to the given timeout
    pub async fn wait_for_agent_exit(
        &mut self,
        index: usize,
        timeout: Duration,
    ) -> std::process::ExitStatus {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(status) = self.agents[index].try_wait().unwrap() {
                return status;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("Timed out waiting for agent {} to exit", index);
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    /// Fetch the current PC records
    pub async fn list_pcs(&self) -> Vec<PcRecord> {
        reqwest::get(format!("{}/api/pcs", self.collector_url()))
            .await
            .expect("Failed to list PCs")
            .json::<ListPcsResponse>()
            .await
            .expect("Failed to parse list response")
            .pcs
    }

    /// Restart the collector (same DB path, new port)
    pub async fn restart_collector(&mut self) -> u16 {
        let _ = self.collector.kill();
        let _ = self.collector.wait();

        let port = find_free_port();
        self.collector = spawn_collector(
            port,
            &self.db_path,
            self.offline_after_secs,
            self.session_ttl_secs,
        );
        wait_for_port(port, Duration::from_secs(10)).await;

        self.collector_port = port;
        port
    }
}

fn spawn_collector(
    port: u16,
    db_path: &PathBuf,
    offline_after_secs: u64,
    session_ttl_secs: u64,
) -> Child {
    Command::new(cargo_bin("fleetpulse-collector"))
        .args(["--bind", &format!("127.0.0.1:{}", port)])
        .args(["--db-path", db_path.to_str().unwrap()])
        .args(["--offline-after", &offline_after_secs.to_string()])
        .args(["--session-ttl", &session_ttl_secs.to_string()])
        .args(["--log-level", "debug"])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .expect("Failed to start collector")
}

impl Drop for TestFleet {
    fn drop(&mut self) {
        for agent in &mut self.agents {
            let _ = agent.kill();
            let _ = agent.wait();
        }
        let _ = self.collector.kill();
        let _ = self.collector.wait();
    }
}

/// Response types for deserialization
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PcRecord {
    pub pc_id: String,
    pub status: String,
    pub hostname: Option<String>,
    pub registered_at: Option<i64>,
    pub last_seen: Option<i64>,
    pub uptime_seconds: Option<u64>,
    pub memory_usage: Option<u64>,
    pub last_heartbeat_success: Option<bool>,
    pub shutdown_reason: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPcsResponse {
    pub pcs: Vec<PcRecord>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionPcResponse {
    pub pc_id: String,
    pub auth_token: String,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCredentialsResponse {
    pub session_id: String,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: String,
    pub api_key: String,
    pub created_at: i64,
}
