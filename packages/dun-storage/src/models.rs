use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

/// One row of an engine's candidate relation. Filtering (enabled, outstanding, status, opt-out)
/// has already happened upstream.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CandidateRow {
	pub subject_id: Uuid,
	pub user_id: Uuid,
	pub client_name: Option<String>,
	pub client_phone: Option<String>,
	pub currency: String,
	pub total: f64,
	/// Remaining balance for invoices, requested deposit for estimates.
	pub partial_amount: Option<f64>,
	pub status: String,
	pub tracking_id: String,
	pub hours_since_anchor: Option<f64>,
	pub prior_attempt_count: i32,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ReminderAttempt {
	pub engine: String,
	pub subject_id: Uuid,
	pub attempt_number: i32,
	pub channel: String,
	pub message_kind: String,
	pub metadata: Value,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ActivityEvent {
	pub event_id: Uuid,
	pub user_id: Option<Uuid>,
	pub r#type: String,
	pub subject_id: Option<Uuid>,
	pub amount: Option<f64>,
	pub metadata: Value,
	pub created_at: OffsetDateTime,
}
