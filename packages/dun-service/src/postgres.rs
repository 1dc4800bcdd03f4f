//! Postgres-backed collaborators.

use serde_json::json;
use sqlx::PgPool;

use crate::{
	ActivityRecord, AttemptClaim, AttemptKey, AuditSink, BoxFuture, Candidate, ClaimResult,
	ClaimStore, EligibilitySelector,
};
use dun_domain::{metadata::Resolution, schedule::ScheduleConfig};
use dun_storage::{
	activity::{self, NewActivityEvent},
	candidates,
	claims::{self, NewClaim},
};

/// Reads one engine's relation, narrowed to rows whose next attempt is due under `schedule`, so
/// exhausted and early subjects never take up the batch.
pub struct PgSelector {
	pool: PgPool,
	relation: String,
	thresholds: Vec<f64>,
	batch_limit: u32,
}
impl PgSelector {
	pub fn new(pool: PgPool, relation: &str, schedule: &ScheduleConfig, batch_limit: u32) -> Self {
		let thresholds = schedule.steps().iter().map(|step| step.hours_after_anchor).collect();

		Self { pool, relation: relation.to_string(), thresholds, batch_limit }
	}
}
impl EligibilitySelector for PgSelector {
	fn select(&self) -> BoxFuture<'_, color_eyre::Result<Vec<Candidate>>> {
		Box::pin(async move {
			let rows = candidates::fetch_candidates(
				&self.pool,
				&self.relation,
				&self.thresholds,
				self.batch_limit,
			)
			.await?;

			Ok(rows)
		})
	}
}

pub struct PgClaimStore {
	pool: PgPool,
}
impl PgClaimStore {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}
}
impl ClaimStore for PgClaimStore {
	fn claim<'a>(&'a self, claim: &'a AttemptClaim) -> BoxFuture<'a, color_eyre::Result<ClaimResult>> {
		Box::pin(async move {
			let metadata = serde_json::to_value(&claim.metadata)?;
			let row = NewClaim {
				engine: claim.key.engine.as_str(),
				subject_id: claim.key.subject_id,
				attempt_number: i32::try_from(claim.key.attempt_number)?,
				channel: claim.channel.as_str(),
				message_kind: claim.key.engine.message_kind(),
				metadata: &metadata,
				created_at: claim.created_at,
			};

			Ok(claims::insert_claim(&self.pool, &row).await?)
		})
	}

	fn resolve<'a>(
		&'a self,
		key: &'a AttemptKey,
		resolution: &'a Resolution,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			let patch = resolution.patch()?;

			claims::patch_claim_metadata(
				&self.pool,
				key.engine.as_str(),
				key.subject_id,
				i32::try_from(key.attempt_number)?,
				&patch,
			)
			.await?;

			Ok(())
		})
	}
}

pub struct PgAuditSink {
	pool: PgPool,
}
impl PgAuditSink {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}
}
impl AuditSink for PgAuditSink {
	fn record<'a>(&'a self, record: &'a ActivityRecord) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			let event = match record {
				ActivityRecord::Sent(sent) => {
					let metadata = json!({
						"attempt_number": sent.attempt_number,
						"message_id": sent.message_id,
						"channel": sent.channel,
						"tracking_id": sent.tracking_id,
					});

					(Some(sent.user_id), Some(sent.subject_id), Some(sent.amount), metadata, sent.sent_at)
				},
				ActivityRecord::Run(summary) =>
					(None, None, None, serde_json::to_value(summary)?, summary.processed_at),
			};
			let (user_id, subject_id, amount, metadata, created_at) = event;

			activity::insert_activity_event(
				&self.pool,
				&NewActivityEvent {
					user_id,
					event_type: record.event_type(),
					subject_id,
					amount,
					metadata: &metadata,
					created_at,
				},
			)
			.await?;

			Ok(())
		})
	}
}
