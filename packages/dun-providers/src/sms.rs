use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::{DeliveryError, Error, Result};
use dun_config::SmsProviderConfig;
use dun_domain::phone;

/// Twilio-compatible messages API client. Built once from config and shared by both engines.
#[derive(Clone, Debug)]
pub struct SmsClient {
	client: Client,
	endpoint: String,
	account_id: String,
	auth_token: String,
	from_number: String,
	timeout_ms: u64,
}
impl SmsClient {
	/// Returns `Ok(None)` when no credentials are configured; callers treat that as "delivery
	/// unavailable" rather than an error.
	pub fn from_config(cfg: &SmsProviderConfig) -> Result<Option<Self>> {
		let Some(credentials) = cfg.credentials() else {
			return Ok(None);
		};
		let from_number = phone::normalize_e164(credentials.from_number).map_err(|err| {
			Error::InvalidConfig { message: format!("providers.sms.from_number: {err}") }
		})?;
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
		let endpoint = format!(
			"{}/2010-04-01/Accounts/{}/Messages.json",
			cfg.api_base.trim_end_matches('/'),
			credentials.account_id
		);

		Ok(Some(Self {
			client,
			endpoint,
			account_id: credentials.account_id.to_string(),
			auth_token: credentials.auth_token.to_string(),
			from_number,
			timeout_ms: cfg.timeout_ms,
		}))
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	/// Sends one message and returns the provider's message id.
	pub async fn send(&self, to: &str, body: &str) -> Result<String, DeliveryError> {
		let to = phone::normalize_e164(to)?;
		let form = [("To", to.as_str()), ("From", self.from_number.as_str()), ("Body", body)];
		let res = self
			.client
			.post(&self.endpoint)
			.basic_auth(&self.account_id, Some(&self.auth_token))
			.form(&form)
			.send()
			.await
			.map_err(|err| self.map_transport_error(err))?;
		let status = res.status();
		let text = res.text().await.map_err(|err| self.map_transport_error(err))?;

		parse_send_response(status, &text)
	}

	fn map_transport_error(&self, err: reqwest::Error) -> DeliveryError {
		if err.is_timeout() {
			return DeliveryError::Timeout { timeout_ms: self.timeout_ms };
		}

		DeliveryError::Transport { message: err.without_url().to_string() }
	}
}

fn parse_send_response(status: StatusCode, text: &str) -> Result<String, DeliveryError> {
	let json: Option<Value> = serde_json::from_str(text).ok();

	if !status.is_success() {
		let message = json
			.as_ref()
			.and_then(|json| json.get("message").or_else(|| json.get("error")))
			.and_then(error_text)
			.unwrap_or_else(|| {
				status.canonical_reason().unwrap_or("unknown error").to_string()
			});

		return Err(DeliveryError::Rejected { status: status.as_u16(), message });
	}

	let Some(json) = json else {
		return Err(DeliveryError::InvalidResponse {
			message: "Response body is not JSON.".to_string(),
		});
	};

	if let Some(message) = json.get("error").and_then(error_text) {
		return Err(DeliveryError::Rejected { status: status.as_u16(), message });
	}

	json.get("sid")
		.or_else(|| json.get("id"))
		.and_then(Value::as_str)
		.filter(|id| !id.trim().is_empty())
		.map(str::to_string)
		.ok_or_else(|| DeliveryError::InvalidResponse {
			message: "Response is missing a message id.".to_string(),
		})
}

fn error_text(value: &Value) -> Option<String> {
	match value {
		Value::String(text) => Some(text.clone()),
		Value::Object(map) => map.get("message").and_then(Value::as_str).map(str::to_string),
		Value::Null => None,
		other => Some(other.to_string()),
	}
}
