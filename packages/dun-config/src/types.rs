use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub quiet_hours: QuietHours,
	pub engines: Engines,
	#[serde(default)]
	pub run: Run,
	#[serde(default)]
	pub security: Security,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
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

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub sms: SmsProviderConfig,
}

/// Outbound SMS account. The three credential fields are all-or-none; when every one of them is
/// absent the engines still run but skip delivery.
#[derive(Clone, Debug, Deserialize)]
pub struct SmsProviderConfig {
	pub api_base: String,
	pub account_id: Option<String>,
	pub auth_token: Option<String>,
	pub from_number: Option<String>,
	pub timeout_ms: u64,
}
impl SmsProviderConfig {
	pub fn credentials(&self) -> Option<SmsCredentials<'_>> {
		Some(SmsCredentials {
			account_id: self.account_id.as_deref()?,
			auth_token: self.auth_token.as_deref()?,
			from_number: self.from_number.as_deref()?,
		})
	}
}

#[derive(Clone, Copy, Debug)]
pub struct SmsCredentials<'a> {
	pub account_id: &'a str,
	pub auth_token: &'a str,
	pub from_number: &'a str,
}

/// Whole-run delivery blackout, evaluated in a single fixed UTC offset.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct QuietHours {
	pub enabled: bool,
	pub utc_offset_hours: i8,
	/// Inclusive local hour at which the window opens.
	pub start_hour: u8,
	/// Exclusive local hour at which the window closes. May be smaller than `start_hour`.
	pub end_hour: u8,
}
impl Default for QuietHours {
	fn default() -> Self {
		Self { enabled: true, utc_offset_hours: -5, start_hour: 21, end_hour: 9 }
	}
}

#[derive(Debug, Deserialize)]
pub struct Engines {
	pub chase: EngineConfig,
	pub nudge: EngineConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EngineConfig {
	#[serde(default = "default_true")]
	pub enabled: bool,
	/// View or table exposing pre-filtered candidates, optionally schema-qualified.
	pub candidate_relation: String,
	/// Prefix of the customer-facing link; the tracking id is appended as the last path segment.
	pub link_base: String,
	#[serde(default = "default_batch_limit")]
	pub batch_limit: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Run {
	pub max_error_samples: usize,
	pub delivery_timeout_ms: u64,
}
impl Default for Run {
	fn default() -> Self {
		Self { max_error_samples: 5, delivery_timeout_ms: 10_000 }
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Security {
	pub invoke_token: Option<String>,
}

fn default_true() -> bool {
	true
}

fn default_batch_limit() -> u32 {
	500
}
