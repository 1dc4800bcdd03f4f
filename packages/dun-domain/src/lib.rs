pub mod compose;
pub mod metadata;
pub mod phone;
pub mod quiet_hours;
pub mod schedule;
pub mod time_serde;

use serde::{Deserialize, Serialize};

/// The two reminder programs. Both run through the same engine; the kind only selects the
/// schedule, the templates, and the labels written to storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
	/// Unpaid invoice balances.
	Chase,
	/// Estimates awaiting approval or deposit.
	Nudge,
}
impl EngineKind {
	pub const ALL: [Self; 2] = [Self::Chase, Self::Nudge];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Chase => "chase",
			Self::Nudge => "nudge",
		}
	}

	pub fn message_kind(self) -> &'static str {
		match self {
			Self::Chase => "invoice_reminder",
			Self::Nudge => "estimate_nudge",
		}
	}

	pub fn sent_event_type(self) -> &'static str {
		match self {
			Self::Chase => "reminder_sent",
			Self::Nudge => "nudge_sent",
		}
	}

	pub fn run_event_type(self) -> &'static str {
		match self {
			Self::Chase => "chase_run",
			Self::Nudge => "nudge_run",
		}
	}
}
impl std::fmt::Display for EngineKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
impl std::str::FromStr for EngineKind {
	type Err = String;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"chase" => Ok(Self::Chase),
			"nudge" => Ok(Self::Nudge),
			other => Err(format!("Unknown engine {other:?}; expected chase or nudge.")),
		}
	}
}

/// Outbound channel recorded on every claim. Only SMS is wired today.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
	Sms,
}
impl Channel {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Sms => "sms",
		}
	}
}
