mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EngineConfig, Engines, Postgres, Providers, QuietHours, Run, Security, Service,
	SmsCredentials, SmsProviderConfig, Storage,
};

use std::{env, fs, path::Path};

pub const ENV_PG_DSN: &str = "DUN_PG_DSN";
pub const ENV_PG_POOL_MAX_CONNS: &str = "DUN_PG_POOL_MAX_CONNS";
pub const ENV_SMS_ACCOUNT_ID: &str = "DUN_SMS_ACCOUNT_ID";
pub const ENV_SMS_AUTH_TOKEN: &str = "DUN_SMS_AUTH_TOKEN";
pub const ENV_SMS_FROM_NUMBER: &str = "DUN_SMS_FROM_NUMBER";
pub const ENV_INVOKE_TOKEN: &str = "DUN_INVOKE_TOKEN";

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	apply_env_overrides(&mut cfg, |key| env::var(key).ok())?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

/// Overlays secrets and deployment-specific values from the environment. `lookup` is injected so
/// callers (and tests) decide where values come from.
pub fn apply_env_overrides<F>(cfg: &mut Config, lookup: F) -> Result<()>
where
	F: Fn(&str) -> Option<String>,
{
	if let Some(dsn) = lookup(ENV_PG_DSN) {
		cfg.storage.postgres.dsn = dsn;
	}
	if let Some(raw) = lookup(ENV_PG_POOL_MAX_CONNS) {
		cfg.storage.postgres.pool_max_conns = raw
			.trim()
			.parse()
			.map_err(|_| Error::InvalidEnv { key: ENV_PG_POOL_MAX_CONNS, value: raw.clone() })?;
	}
	if let Some(account_id) = lookup(ENV_SMS_ACCOUNT_ID) {
		cfg.providers.sms.account_id = Some(account_id);
	}
	if let Some(auth_token) = lookup(ENV_SMS_AUTH_TOKEN) {
		cfg.providers.sms.auth_token = Some(auth_token);
	}
	if let Some(from_number) = lookup(ENV_SMS_FROM_NUMBER) {
		cfg.providers.sms.from_number = Some(from_number);
	}
	if let Some(token) = lookup(ENV_INVOKE_TOKEN) {
		cfg.security.invoke_token = Some(token);
	}

	Ok(())
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}

	validate_sms(&cfg.providers.sms)?;

	let quiet = &cfg.quiet_hours;

	if !(-14..=14).contains(&quiet.utc_offset_hours) {
		return Err(Error::Validation {
			message: "quiet_hours.utc_offset_hours must be in the range -14 to 14.".to_string(),
		});
	}
	if quiet.start_hour > 23 || quiet.end_hour > 23 {
		return Err(Error::Validation {
			message: "quiet_hours.start_hour and quiet_hours.end_hour must be in the range 0-23."
				.to_string(),
		});
	}
	if quiet.enabled && quiet.start_hour == quiet.end_hour {
		return Err(Error::Validation {
			message: "quiet_hours.start_hour must differ from quiet_hours.end_hour.".to_string(),
		});
	}

	for (label, engine) in [("chase", &cfg.engines.chase), ("nudge", &cfg.engines.nudge)] {
		validate_engine(label, engine)?;
	}

	if cfg.run.max_error_samples == 0 {
		return Err(Error::Validation {
			message: "run.max_error_samples must be greater than zero.".to_string(),
		});
	}
	if cfg.run.delivery_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "run.delivery_timeout_ms must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

/// Accepts `name` or `schema.name` where each part is a plain, unquoted SQL identifier.
pub fn is_relation_name(value: &str) -> bool {
	let parts: Vec<&str> = value.split('.').collect();

	if parts.is_empty() || parts.len() > 2 {
		return false;
	}

	parts.iter().all(|part| {
		let mut chars = part.chars();

		match chars.next() {
			Some(first) if first.is_ascii_alphabetic() || first == '_' =>
				chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
			_ => false,
		}
	})
}

fn validate_sms(sms: &SmsProviderConfig) -> Result<()> {
	if !(sms.api_base.starts_with("https://") || sms.api_base.starts_with("http://")) {
		return Err(Error::Validation {
			message: "providers.sms.api_base must be an http(s) URL.".to_string(),
		});
	}
	if sms.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.sms.timeout_ms must be greater than zero.".to_string(),
		});
	}

	let present = [&sms.account_id, &sms.auth_token, &sms.from_number]
		.iter()
		.filter(|value| value.is_some())
		.count();

	if present != 0 && present != 3 {
		return Err(Error::Validation {
			message: "providers.sms account_id, auth_token, and from_number must be set together."
				.to_string(),
		});
	}

	Ok(())
}

fn validate_engine(label: &str, engine: &EngineConfig) -> Result<()> {
	if !is_relation_name(&engine.candidate_relation) {
		return Err(Error::Validation {
			message: format!(
				"engines.{label}.candidate_relation must be a plain or schema-qualified identifier."
			),
		});
	}
	if !(engine.link_base.starts_with("https://") || engine.link_base.starts_with("http://")) {
		return Err(Error::Validation {
			message: format!("engines.{label}.link_base must be an http(s) URL."),
		});
	}
	if engine.batch_limit == 0 {
		return Err(Error::Validation {
			message: format!("engines.{label}.batch_limit must be greater than zero."),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for value in [
		&mut cfg.providers.sms.account_id,
		&mut cfg.providers.sms.auth_token,
		&mut cfg.providers.sms.from_number,
		&mut cfg.security.invoke_token,
	] {
		if value.as_deref().map(|raw| raw.trim().is_empty()).unwrap_or(false) {
			*value = None;
		}
	}

	cfg.providers.sms.api_base = cfg.providers.sms.api_base.trim_end_matches('/').to_string();

	for engine in [&mut cfg.engines.chase, &mut cfg.engines.nudge] {
		engine.link_base = engine.link_base.trim_end_matches('/').to_string();
	}
}
