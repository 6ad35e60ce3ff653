//! Load generator configuration
//!
//! Configuration is loaded from environment variables on top of defaults.
//! Unparseable values are ignored and the default is kept.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Main run configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Queue service endpoints
    pub target: TargetConfig,

    /// Shared HTTP transport settings
    pub http: HttpConfig,

    /// Per-session protocol settings
    pub session: SessionConfig,

    /// Run-wide settings
    pub run: RunConfig,

    /// Serve Prometheus metrics on this address while the run is in progress
    pub metrics_addr: Option<SocketAddr>,

    /// Print the report as a JSON line after the summary
    pub report_json: bool,
}

/// Queue service endpoints
#[derive(Debug, Clone)]
pub struct TargetConfig {
    /// Base URL of the queue service
    pub base_url: String,
    /// Path of the check-or-enter call
    pub entry_path: String,
    /// Path of the status event stream
    pub stream_path: String,
    /// Path of the verify call
    pub verify_path: String,
    /// Header carrying the admission credential on verify
    pub token_header: String,
}

/// Shared HTTP transport settings
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Timeout for entry and verify requests
    pub request_timeout: Duration,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Idle pooled connections kept per host
    pub pool_max_idle_per_host: usize,
}

/// Per-session protocol settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Action the virtual users queue for
    pub action_id: i64,
    /// Destination path sent on entry
    pub destination_url: String,
    /// How long a queued session waits for READY
    pub wait_timeout: Duration,
    /// Verify the credential returned by an immediate admission
    pub verify_on_immediate: bool,
}

/// Run-wide settings
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Number of concurrent virtual users
    pub num_clients: usize,
    /// Window over which session starts are spread
    pub ramp_up: Duration,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            entry_path: "/api/v1/queue/check-or-enter".to_string(),
            stream_path: "/waiting/sse".to_string(),
            verify_path: "/api/v1/customer/verify".to_string(),
            token_header: "X-GREENLIGHT-TOKEN".to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            pool_max_idle_per_host: 200,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            action_id: 1,
            destination_url: "/items/test-item-123".to_string(),
            wait_timeout: Duration::from_secs(180),
            verify_on_immediate: false,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            num_clients: 3,
            ramp_up: Duration::ZERO,
        }
    }
}

impl TargetConfig {
    pub fn entry_url(&self) -> String {
        join_url(&self.base_url, &self.entry_path)
    }

    pub fn stream_url(&self) -> String {
        join_url(&self.base_url, &self.stream_path)
    }

    pub fn verify_url(&self) -> String {
        join_url(&self.base_url, &self.verify_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn parse_bool(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}

/// Fractional seconds; None for negative, non-finite or out-of-range values
fn parse_secs_f64(val: &str) -> Option<Duration> {
    let secs = val.trim().parse::<f64>().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Target config
        if let Ok(url) = env::var("QUEUE_BASE_URL")
            && !url.is_empty()
        {
            config.target.base_url = url;
        }
        if let Ok(path) = env::var("ENTRY_PATH") {
            config.target.entry_path = path;
        }
        if let Ok(path) = env::var("STREAM_PATH") {
            config.target.stream_path = path;
        }
        if let Ok(path) = env::var("VERIFY_PATH") {
            config.target.verify_path = path;
        }
        if let Ok(header) = env::var("TOKEN_HEADER")
            && !header.is_empty()
        {
            config.target.token_header = header;
        }

        // HTTP config
        if let Ok(val) = env::var("REQUEST_TIMEOUT_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.http.request_timeout = Duration::from_secs(secs);
        }
        if let Ok(val) = env::var("CONNECT_TIMEOUT_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.http.connect_timeout = Duration::from_secs(secs);
        }
        if let Ok(val) = env::var("POOL_MAX_IDLE_PER_HOST")
            && let Ok(v) = val.parse()
        {
            config.http.pool_max_idle_per_host = v;
        }

        // Session config
        if let Ok(val) = env::var("ACTION_ID")
            && let Ok(id) = val.parse()
        {
            config.session.action_id = id;
        }
        if let Ok(url) = env::var("DESTINATION_URL") {
            config.session.destination_url = url;
        }
        if let Ok(val) = env::var("WAIT_TIMEOUT_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.session.wait_timeout = Duration::from_secs(secs);
        }
        if let Ok(val) = env::var("VERIFY_ON_IMMEDIATE") {
            config.session.verify_on_immediate = parse_bool(&val);
        }

        // Run config
        if let Ok(val) = env::var("NUM_CLIENTS")
            && let Ok(n) = val.parse()
        {
            config.run.num_clients = n;
        }
        if let Ok(val) = env::var("RAMP_UP_SECS")
            && let Some(ramp_up) = parse_secs_f64(&val)
        {
            config.run.ramp_up = ramp_up;
        }

        if let Ok(val) = env::var("METRICS_ADDR")
            && let Ok(addr) = val.parse()
        {
            config.metrics_addr = Some(addr);
        }
        if let Ok(val) = env::var("REPORT_JSON") {
            config.report_json = parse_bool(&val);
        }

        config
    }
}
