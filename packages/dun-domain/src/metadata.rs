use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

const MAX_FAILURE_REASON_CHARS: usize = 512;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetadataError {
	#[error("Amount must be a finite, non-negative number.")]
	InvalidAmount,
	#[error("Currency {0:?} is not a three-letter ISO code.")]
	InvalidCurrency(String),
	#[error("Hours since anchor must be a finite, non-negative number.")]
	InvalidHours,
	#[error("Tracking id must be non-empty.")]
	MissingTrackingId,
}

/// Facts captured when an attempt slot is claimed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimDetails {
	pub amount: f64,
	pub currency: String,
	pub hours_since_anchor: f64,
	pub balance_variant: bool,
	pub tracking_id: String,
}
impl ClaimDetails {
	pub fn new(
		amount: f64,
		currency: &str,
		hours_since_anchor: f64,
		balance_variant: bool,
		tracking_id: &str,
	) -> Result<Self, MetadataError> {
		if !amount.is_finite() || amount < 0.0 {
			return Err(MetadataError::InvalidAmount);
		}

		let currency = normalize_currency(currency)?;

		if !hours_since_anchor.is_finite() || hours_since_anchor < 0.0 {
			return Err(MetadataError::InvalidHours);
		}

		let tracking_id = tracking_id.trim();

		if tracking_id.is_empty() {
			return Err(MetadataError::MissingTrackingId);
		}

		Ok(Self {
			amount,
			currency,
			hours_since_anchor,
			balance_variant,
			tracking_id: tracking_id.to_string(),
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
	Timeout,
	Rejected,
	Transport,
	InvalidRecipient,
	InvalidResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureDetails {
	pub kind: FailureKind,
	pub reason: String,
	#[serde(with = "crate::time_serde")]
	pub failed_at: OffsetDateTime,
}
impl FailureDetails {
	pub fn new(kind: FailureKind, reason: &str, failed_at: OffsetDateTime) -> Self {
		let mut reason: String = reason.trim().to_string();

		if reason.chars().count() > MAX_FAILURE_REASON_CHARS {
			reason = reason.chars().take(MAX_FAILURE_REASON_CHARS).collect();
			reason.push_str("...");
		}

		Self { kind, reason, failed_at }
	}
}

/// How a claimed attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
	Sent { message_id: String },
	/// Claimed but not sent, for example because the client has no phone number.
	Skipped { reason: String },
	RenderFailed { reason: String },
	Failed(FailureDetails),
}
impl Resolution {
	/// The JSON object merged (`metadata || patch`) into the claimed row.
	pub fn patch(&self) -> serde_json::Result<Value> {
		let patch = match self {
			Self::Sent { message_id } => serde_json::json!({
				"state": "sent",
				"message_id": message_id,
			}),
			Self::Skipped { reason } => serde_json::json!({
				"state": "skipped",
				"skip_reason": reason,
			}),
			Self::RenderFailed { reason } => serde_json::json!({
				"state": "render_failed",
				"reason": reason,
			}),
			Self::Failed(failure) => serde_json::json!({
				"state": "failed",
				"failure": serde_json::to_value(failure)?,
			}),
		};

		Ok(patch)
	}
}

/// Ledger metadata. A row starts as `Claimed`; its [`Resolution`] patch is merged into the stored
/// document so it reads back as one of the other variants with the original details intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AttemptMetadata {
	Claimed(ClaimDetails),
	Sent {
		#[serde(flatten)]
		details: ClaimDetails,
		message_id: String,
	},
	Skipped {
		#[serde(flatten)]
		details: ClaimDetails,
		skip_reason: String,
	},
	RenderFailed {
		#[serde(flatten)]
		details: ClaimDetails,
		reason: String,
	},
	Failed {
		#[serde(flatten)]
		details: ClaimDetails,
		failure: FailureDetails,
	},
}
impl AttemptMetadata {
	pub fn details(&self) -> &ClaimDetails {
		match self {
			Self::Claimed(details) => details,
			Self::Sent { details, .. } => details,
			Self::Skipped { details, .. } => details,
			Self::RenderFailed { details, .. } => details,
			Self::Failed { details, .. } => details,
		}
	}

	/// The metadata after `resolution` is applied, matching what the merged jsonb parses back to.
	pub fn resolved(&self, resolution: &Resolution) -> Self {
		let details = self.details().clone();

		match resolution {
			Resolution::Sent { message_id } => Self::Sent { details, message_id: message_id.clone() },
			Resolution::Skipped { reason } => Self::Skipped { details, skip_reason: reason.clone() },
			Resolution::RenderFailed { reason } =>
				Self::RenderFailed { details, reason: reason.clone() },
			Resolution::Failed(failure) => Self::Failed { details, failure: failure.clone() },
		}
	}
}

fn normalize_currency(raw: &str) -> Result<String, MetadataError> {
	let code = raw.trim().to_ascii_uppercase();

	if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
		return Err(MetadataError::InvalidCurrency(raw.to_string()));
	}

	Ok(code)
}
