use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use bday_config::{Config, Error};

const SAMPLE_CONFIG_TOML: &str = include_str!("fixtures/sample_config.toml");

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn write_temp_config(payload: String) -> PathBuf {
	let nanos = SystemTime::now().duration_since(UNIX_EPOCH).expect("System clock is broken.");
	let seq = COUNTER.fetch_add(1, Ordering::SeqCst);
	let path = env::temp_dir().join(format!(
		"bday_config_test_{}_{}_{}.toml",
		std::process::id(),
		nanos.as_nanos(),
		seq
	));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn sample_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value = toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.");
	let table = root
		.as_table_mut()
		.and_then(|root| root.get_mut(section))
		.and_then(Value::as_table_mut)
		.expect("Sample config section is missing.");

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render sample config.")
}

fn sample_without(section: &str) -> String {
	let mut root: Value = toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.");

	root.as_table_mut().expect("Sample config must be a table.").remove(section);

	toml::to_string(&root).expect("Failed to render sample config.")
}

fn load(payload: String) -> bday_config::Result<Config> {
	let path = write_temp_config(payload);
	let result = bday_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

fn expect_validation(payload: String, needle: &str) {
	match load(payload) {
		Err(Error::Validation { message }) => {
			assert!(message.contains(needle), "Unexpected validation message: {message}");
		},
		other => panic!("Expected validation error mentioning {needle}, got {other:?}."),
	}
}

#[test]
fn sample_config_loads() {
	let cfg = load(SAMPLE_CONFIG_TOML.to_string()).expect("Sample config must load.");

	assert!(cfg.reminder.enabled);
	assert_eq!(cfg.reminder.days_ahead, 7);
	assert_eq!(cfg.dispatch.concurrency, 4);
	assert!(cfg.worker.run_on_startup);
	assert_eq!(
		cfg.sender.default_headers.get("X-Channel").and_then(|value| value.as_str()),
		Some("whatsapp")
	);
}

#[test]
fn dispatch_and_worker_sections_are_optional() {
	let without_dispatch = sample_without("dispatch");
	let cfg = load(without_dispatch).expect("Config without [dispatch] must load.");

	assert_eq!(cfg.dispatch.concurrency, 4);
	assert_eq!(cfg.dispatch.claim_lease_seconds, 120);

	let without_worker = sample_without("worker");
	let cfg = load(without_worker).expect("Config without [worker] must load.");

	assert!(!cfg.worker.run_on_startup);
}

#[test]
fn rejects_unparseable_send_time() {
	expect_validation(
		sample_with("reminder", "send_time", Value::String("eight".to_string())),
		"reminder.send_time",
	);
}

#[test]
fn rejects_named_timezones() {
	expect_validation(
		sample_with("reminder", "timezone", Value::String("Asia/Jakarta".to_string())),
		"reminder.timezone",
	);
}

#[test]
fn accepts_utc_alias() {
	let cfg = load(sample_with("reminder", "timezone", Value::String("UTC".to_string())))
		.expect("UTC alias must be accepted.");

	assert_eq!(bday_config::parse_utc_offset(&cfg.reminder.timezone), Some(time::UtcOffset::UTC));
}

#[test]
fn rejects_lookahead_beyond_a_year() {
	expect_validation(sample_with("reminder", "days_ahead", Value::Integer(367)), "days_ahead");
}

#[test]
fn rejects_blank_message() {
	expect_validation(
		sample_with("reminder", "message", Value::String("   ".to_string())),
		"reminder.message",
	);
}

#[test]
fn rejects_zero_concurrency() {
	expect_validation(sample_with("dispatch", "concurrency", Value::Integer(0)), "concurrency");
}

#[test]
fn rejects_blank_sender_key() {
	expect_validation(
		sample_with("sender", "api_key", Value::String(String::new())),
		"sender.api_key",
	);
}

#[test]
fn rejects_lease_shorter_than_sender_timeout() {
	expect_validation(
		sample_with("sender", "timeout_ms", Value::Integer(120_000)),
		"claim_lease_seconds",
	);
}

#[test]
fn missing_file_reports_path() {
	let path = env::temp_dir().join("bday_config_missing_file.toml");

	match bday_config::load(&path) {
		Err(Error::ReadConfig { path: reported, .. }) => assert_eq!(reported, path),
		other => panic!("Expected read error, got {other:?}."),
	}
}
