use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub reminder: Reminder,
	pub sender: SenderConfig,
	#[serde(default)]
	pub dispatch: Dispatch,
	#[serde(default)]
	pub worker: Worker,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

/// Default reminder settings. Used until an operator stores a settings row.
#[derive(Debug, Clone, Deserialize)]
pub struct Reminder {
	pub enabled: bool,
	/// Local time of day, `HH:MM`.
	pub send_time: String,
	/// Fixed UTC offset, `+07:00`. `Z` and `UTC` are accepted.
	pub timezone: String,
	pub message: String,
	pub days_ahead: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SenderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Dispatch {
	#[serde(default = "default_concurrency")]
	pub concurrency: usize,
	#[serde(default = "default_claim_lease_seconds")]
	pub claim_lease_seconds: i64,
}
impl Default for Dispatch {
	fn default() -> Self {
		Self {
			concurrency: default_concurrency(),
			claim_lease_seconds: default_claim_lease_seconds(),
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Worker {
	/// Run one generation and dispatch pass before waiting for the first scheduled time.
	#[serde(default)]
	pub run_on_startup: bool,
}

fn default_concurrency() -> usize {
	4
}

fn default_claim_lease_seconds() -> i64 {
	120
}
