use serde_json::Value;
use sqlx::PgExecutor;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, Result, models::ReminderAttempt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimResult {
	Claimed,
	AlreadyClaimed,
}

pub struct NewClaim<'a> {
	pub engine: &'a str,
	pub subject_id: Uuid,
	pub attempt_number: i32,
	pub channel: &'a str,
	pub message_kind: &'a str,
	pub metadata: &'a Value,
	pub created_at: OffsetDateTime,
}

/// Inserts the ledger row for one attempt. The primary key arbitrates concurrent runs: exactly one
/// insert wins and every other caller observes `AlreadyClaimed`.
pub async fn insert_claim<'e, E>(executor: E, claim: &NewClaim<'_>) -> Result<ClaimResult>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
INSERT INTO reminder_attempts (
	engine,
	subject_id,
	attempt_number,
	channel,
	message_kind,
	metadata,
	created_at
)
VALUES ($1,$2,$3,$4,$5,$6,$7)
ON CONFLICT (engine, subject_id, attempt_number) DO NOTHING",
	)
	.bind(claim.engine)
	.bind(claim.subject_id)
	.bind(claim.attempt_number)
	.bind(claim.channel)
	.bind(claim.message_kind)
	.bind(claim.metadata)
	.bind(claim.created_at)
	.execute(executor)
	.await?;

	if result.rows_affected() == 0 {
		return Ok(ClaimResult::AlreadyClaimed);
	}

	Ok(ClaimResult::Claimed)
}

/// Merges `patch` into the stored metadata. Existing keys not present in `patch` are kept.
pub async fn patch_claim_metadata<'e, E>(
	executor: E,
	engine: &str,
	subject_id: Uuid,
	attempt_number: i32,
	patch: &Value,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	if !patch.is_object() {
		return Err(Error::InvalidArgument("Metadata patch must be a JSON object.".to_string()));
	}

	let result = sqlx::query(
		"\
UPDATE reminder_attempts
SET metadata = metadata || $1
WHERE engine = $2 AND subject_id = $3 AND attempt_number = $4",
	)
	.bind(patch)
	.bind(engine)
	.bind(subject_id)
	.bind(attempt_number)
	.execute(executor)
	.await?;

	if result.rows_affected() == 0 {
		return Err(Error::NotFound(format!(
			"No {engine} claim for subject {subject_id} attempt {attempt_number}."
		)));
	}

	Ok(())
}

pub async fn list_claims<'e, E>(
	executor: E,
	engine: &str,
	subject_id: Uuid,
) -> Result<Vec<ReminderAttempt>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, ReminderAttempt>(
		"\
SELECT
	engine,
	subject_id,
	attempt_number,
	channel,
	message_kind,
	metadata,
	created_at
FROM reminder_attempts
WHERE engine = $1 AND subject_id = $2
ORDER BY attempt_number ASC",
	)
	.bind(engine)
	.bind(subject_id)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}
