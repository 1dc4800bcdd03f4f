use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use uuid::Uuid;

use dun_domain::{Channel, EngineKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
	NotDue,
	AlreadyClaimed,
	DeliveryUnconfigured,
	MissingPhone,
}
impl SkipReason {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::NotDue => "not_due",
			Self::AlreadyClaimed => "already_claimed",
			Self::DeliveryUnconfigured => "delivery_unconfigured",
			Self::MissingPhone => "missing_phone",
		}
	}
}

/// What happened to one candidate.
#[derive(Clone, Debug, PartialEq)]
pub enum ItemOutcome {
	Sent { message_id: String },
	Skipped(SkipReason),
	Errored(String),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
	pub engine: EngineKind,
	pub processed: usize,
	pub sent: usize,
	pub skipped: usize,
	pub errored: usize,
	pub skip_reasons: BTreeMap<SkipReason, usize>,
	/// The first few per-item errors, as `"<subject_id>: <reason>"`.
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub errors: Vec<String>,
	pub duration_ms: u64,
	#[serde(with = "dun_domain::time_serde")]
	pub processed_at: OffsetDateTime,
}
impl RunSummary {
	pub fn new(engine: EngineKind, processed_at: OffsetDateTime) -> Self {
		Self {
			engine,
			processed: 0,
			sent: 0,
			skipped: 0,
			errored: 0,
			skip_reasons: BTreeMap::new(),
			errors: Vec::new(),
			duration_ms: 0,
			processed_at,
		}
	}

	pub fn record(&mut self, subject_id: Uuid, outcome: &ItemOutcome, max_error_samples: usize) {
		self.processed += 1;

		match outcome {
			ItemOutcome::Sent { .. } => self.sent += 1,
			ItemOutcome::Skipped(reason) => {
				self.skipped += 1;
				*self.skip_reasons.entry(*reason).or_default() += 1;
			},
			ItemOutcome::Errored(reason) => {
				self.errored += 1;

				if self.errors.len() < max_error_samples {
					self.errors.push(format!("{subject_id}: {reason}"));
				}
			},
		}
	}
}

/// Result of one invocation.
#[derive(Clone, Debug, PartialEq)]
pub enum RunOutcome {
	/// The quiet-hours gate was closed; nothing was selected or claimed.
	QuietHours { engine: EngineKind, duration_ms: u64, processed_at: OffsetDateTime },
	Completed(RunSummary),
}
impl RunOutcome {
	pub fn engine(&self) -> EngineKind {
		match self {
			Self::QuietHours { engine, .. } => *engine,
			Self::Completed(summary) => summary.engine,
		}
	}

	/// The JSON reported to whoever triggered the run. Completed runs also carry the sent count
	/// under an engine-specific alias (`remindersSent` or `nudgesSent`).
	pub fn report(&self) -> serde_json::Result<Value> {
		match self {
			Self::QuietHours { engine, duration_ms, processed_at } => {
				let processed_at = dun_domain::time_serde::format(*processed_at)
					.map_err(<serde_json::Error as serde::ser::Error>::custom)?;

				Ok(json!({
					"success": true,
					"engine": engine,
					"skipped": "quiet_hours",
					"processed": 0,
					"sent": 0,
					"durationMs": duration_ms,
					"processedAt": processed_at,
				}))
			},
			Self::Completed(summary) => {
				let mut body = Map::new();

				body.insert("success".to_string(), Value::Bool(true));

				if let Value::Object(fields) = serde_json::to_value(summary)? {
					body.extend(fields);
				}

				body.insert(sent_alias(summary.engine).to_string(), json!(summary.sent));

				Ok(Value::Object(body))
			},
		}
	}
}

fn sent_alias(engine: EngineKind) -> &'static str {
	match engine {
		EngineKind::Chase => "remindersSent",
		EngineKind::Nudge => "nudgesSent",
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct SentActivity {
	pub engine: EngineKind,
	pub user_id: Uuid,
	pub subject_id: Uuid,
	pub amount: f64,
	pub attempt_number: u32,
	pub message_id: String,
	pub channel: Channel,
	pub tracking_id: String,
	pub sent_at: OffsetDateTime,
}

/// Entries written to the activity feed.
#[derive(Clone, Debug, PartialEq)]
pub enum ActivityRecord {
	Sent(SentActivity),
	Run(RunSummary),
}
impl ActivityRecord {
	pub fn event_type(&self) -> &'static str {
		match self {
			Self::Sent(sent) => sent.engine.sent_event_type(),
			Self::Run(summary) => summary.engine.run_event_type(),
		}
	}
}
