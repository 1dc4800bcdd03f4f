use serde_json::Value;
use sqlx::PgExecutor;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Result, models::ActivityEvent};

pub struct NewActivityEvent<'a> {
	pub user_id: Option<Uuid>,
	pub event_type: &'a str,
	pub subject_id: Option<Uuid>,
	pub amount: Option<f64>,
	pub metadata: &'a Value,
	pub created_at: OffsetDateTime,
}

pub async fn insert_activity_event<'e, E>(executor: E, event: &NewActivityEvent<'_>) -> Result<Uuid>
where
	E: PgExecutor<'e>,
{
	let event_id = Uuid::new_v4();

	sqlx::query(
		"\
INSERT INTO activity_events (event_id, user_id, type, subject_id, amount, metadata, created_at)
VALUES ($1,$2,$3,$4,$5,$6,$7)",
	)
	.bind(event_id)
	.bind(event.user_id)
	.bind(event.event_type)
	.bind(event.subject_id)
	.bind(event.amount)
	.bind(event.metadata)
	.bind(event.created_at)
	.execute(executor)
	.await?;

	Ok(event_id)
}

pub async fn list_activity_events<'e, E>(
	executor: E,
	event_type: &str,
	limit: i64,
) -> Result<Vec<ActivityEvent>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, ActivityEvent>(
		"\
SELECT event_id, user_id, type, subject_id, amount, metadata, created_at
FROM activity_events
WHERE type = $1
ORDER BY created_at DESC
LIMIT $2",
	)
	.bind(event_type)
	.bind(limit)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}
