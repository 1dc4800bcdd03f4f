use std::time::{Duration, Instant};

use time::OffsetDateTime;

use crate::{
	ActivityRecord, AttemptClaim, AttemptKey, Candidate, ClaimResult, Collaborators, EngineError,
	ItemOutcome, RunOutcome, RunSummary, SentActivity, SkipReason, engine_config,
};
use dun_config::{Config, QuietHours};
use dun_domain::{
	Channel, EngineKind,
	compose::{self, MessageInput},
	metadata::{AttemptMetadata, ClaimDetails, FailureDetails, Resolution},
	quiet_hours,
	schedule::ScheduleConfig,
};
use dun_providers::DeliveryError;

#[derive(Clone, Debug)]
pub struct EngineSettings {
	pub schedule: ScheduleConfig,
	/// Link prefix without a trailing slash.
	pub link_base: String,
	pub quiet_hours: QuietHours,
	pub max_error_samples: usize,
	pub delivery_timeout: Duration,
}
impl EngineSettings {
	pub fn from_config(kind: EngineKind, cfg: &Config) -> Self {
		Self {
			schedule: ScheduleConfig::for_kind(kind),
			link_base: engine_config(cfg, kind).link_base.clone(),
			quiet_hours: cfg.quiet_hours.clone(),
			max_error_samples: cfg.run.max_error_samples,
			delivery_timeout: Duration::from_millis(cfg.run.delivery_timeout_ms),
		}
	}
}

/// One reminder program. Chase and nudge are two instances of this type that differ only in
/// their schedule, link base, and collaborators.
pub struct ReminderEngine {
	settings: EngineSettings,
	collaborators: Collaborators,
}
impl ReminderEngine {
	pub fn new(settings: EngineSettings, collaborators: Collaborators) -> Self {
		Self { settings, collaborators }
	}

	pub fn kind(&self) -> EngineKind {
		self.settings.schedule.kind()
	}

	pub async fn run(&self) -> Result<RunOutcome, EngineError> {
		self.run_at(OffsetDateTime::now_utc()).await
	}

	/// Runs one batch as of `now`. Only a selector failure is an error; every per-candidate
	/// problem is counted in the returned summary.
	pub async fn run_at(&self, now: OffsetDateTime) -> Result<RunOutcome, EngineError> {
		let started = Instant::now();
		let kind = self.kind();

		if quiet_hours::is_quiet(&self.settings.quiet_hours, now) {
			tracing::info!(engine = %kind, "Quiet hours are active. Skipping run.");

			return Ok(RunOutcome::QuietHours {
				engine: kind,
				duration_ms: elapsed_ms(started),
				processed_at: now,
			});
		}

		let candidates = self.collaborators.selector.select().await.map_err(|err| {
			tracing::error!(engine = %kind, error = %err, "Candidate selection failed.");

			EngineError::Selector { message: err.to_string() }
		})?;
		let mut summary = RunSummary::new(kind, now);

		tracing::info!(engine = %kind, candidates = candidates.len(), "Run started.");

		for candidate in &candidates {
			let outcome = self.process(candidate).await;

			summary.record(candidate.subject_id, &outcome, self.settings.max_error_samples);
		}

		summary.duration_ms = elapsed_ms(started);

		let record = ActivityRecord::Run(summary.clone());

		if let Err(err) = self.collaborators.audit.record(&record).await {
			tracing::warn!(engine = %kind, error = %err, "Failed to persist run summary.");
		}

		tracing::info!(
			engine = %kind,
			processed = summary.processed,
			sent = summary.sent,
			skipped = summary.skipped,
			errored = summary.errored,
			duration_ms = summary.duration_ms,
			"Run completed."
		);

		Ok(RunOutcome::Completed(summary))
	}

	async fn process(&self, candidate: &Candidate) -> ItemOutcome {
		let kind = self.kind();
		let subject_id = candidate.subject_id;
		let Some(attempt_number) = self
			.settings
			.schedule
			.next_attempt(candidate.prior_attempt_count, candidate.hours_since_anchor)
		else {
			return ItemOutcome::Skipped(SkipReason::NotDue);
		};
		let (amount, balance_variant) = amount_due(kind, candidate.total, candidate.partial_amount);
		let details = match ClaimDetails::new(
			amount,
			&candidate.currency,
			candidate.hours_since_anchor.unwrap_or_default(),
			balance_variant,
			&candidate.tracking_id,
		) {
			Ok(details) => details,
			Err(err) => {
				tracing::warn!(
					engine = %kind,
					%subject_id,
					error = %err,
					"Candidate row is invalid."
				);

				return ItemOutcome::Errored(format!("Invalid candidate: {err}"));
			},
		};
		let key = AttemptKey { engine: kind, subject_id, attempt_number };
		let claim = AttemptClaim {
			key,
			channel: Channel::Sms,
			metadata: AttemptMetadata::Claimed(details.clone()),
			created_at: OffsetDateTime::now_utc(),
		};

		match self.collaborators.claims.claim(&claim).await {
			Ok(ClaimResult::Claimed) => {},
			Ok(ClaimResult::AlreadyClaimed) => {
				tracing::debug!(
					engine = %kind,
					%subject_id,
					attempt = attempt_number,
					"Attempt already claimed."
				);

				return ItemOutcome::Skipped(SkipReason::AlreadyClaimed);
			},
			Err(err) => {
				tracing::warn!(
					engine = %kind,
					%subject_id,
					attempt = attempt_number,
					error = %err,
					"Failed to claim attempt."
				);

				return ItemOutcome::Errored(format!("Claim failed: {err}"));
			},
		}

		let link = format!("{}/{}", self.settings.link_base, details.tracking_id);
		let body = match compose::render(&MessageInput {
			kind,
			balance_variant,
			attempt_number,
			amount: details.amount,
			currency: &details.currency,
			link: &link,
			client_first_name: candidate.client_name.as_deref(),
		}) {
			Ok(body) => body,
			Err(err) => {
				tracing::warn!(
					engine = %kind,
					%subject_id,
					attempt = attempt_number,
					error = %err,
					"Failed to render message."
				);

				let reason = err.to_string();

				self.resolve(&key, Resolution::RenderFailed { reason: reason.clone() }).await;

				return ItemOutcome::Errored(reason);
			},
		};
		let Some(delivery) = self.collaborators.delivery.as_ref() else {
			return self.skip(&key, SkipReason::DeliveryUnconfigured).await;
		};
		let Some(phone) =
			candidate.client_phone.as_deref().map(str::trim).filter(|phone| !phone.is_empty())
		else {
			return self.skip(&key, SkipReason::MissingPhone).await;
		};
		let timeout = self.settings.delivery_timeout;
		let result = match tokio::time::timeout(timeout, delivery.send(phone, &body)).await {
			Ok(result) => result,
			Err(_) => Err(DeliveryError::Timeout {
				timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
			}),
		};

		match result {
			Ok(message_id) => {
				tracing::info!(
					engine = %kind,
					%subject_id,
					attempt = attempt_number,
					%message_id,
					"Reminder sent."
				);

				let sent = ActivityRecord::Sent(SentActivity {
					engine: kind,
					user_id: candidate.user_id,
					subject_id,
					amount: details.amount,
					attempt_number,
					message_id: message_id.clone(),
					channel: Channel::Sms,
					tracking_id: details.tracking_id.clone(),
					sent_at: OffsetDateTime::now_utc(),
				});

				if let Err(err) = self.collaborators.audit.record(&sent).await {
					tracing::warn!(
						engine = %kind,
						%subject_id,
						error = %err,
						"Failed to record sent activity."
					);
				}

				self.resolve(&key, Resolution::Sent { message_id: message_id.clone() }).await;

				ItemOutcome::Sent { message_id }
			},
			Err(err) => {
				tracing::warn!(
					engine = %kind,
					%subject_id,
					attempt = attempt_number,
					error = %err,
					"Delivery failed."
				);

				let failure =
					FailureDetails::new(err.kind(), &err.to_string(), OffsetDateTime::now_utc());

				self.resolve(&key, Resolution::Failed(failure)).await;

				ItemOutcome::Errored(err.to_string())
			},
		}
	}

	async fn skip(&self, key: &AttemptKey, reason: SkipReason) -> ItemOutcome {
		self.resolve(key, Resolution::Skipped { reason: reason.as_str().to_string() }).await;

		ItemOutcome::Skipped(reason)
	}

	/// Patches the claimed row. A failed patch leaves the row `claimed` and is only logged.
	async fn resolve(&self, key: &AttemptKey, resolution: Resolution) {
		if let Err(err) = self.collaborators.claims.resolve(key, &resolution).await {
			tracing::warn!(
				engine = %key.engine,
				subject_id = %key.subject_id,
				attempt = key.attempt_number,
				error = %err,
				"Failed to record attempt resolution."
			);
		}
	}
}

/// Amount quoted in the message and whether the balance/deposit wording applies.
fn amount_due(kind: EngineKind, total: f64, partial: Option<f64>) -> (f64, bool) {
	let partial = partial.filter(|amount| amount.is_finite() && *amount > 0.0);

	match (kind, partial) {
		(EngineKind::Chase, Some(remaining)) => (remaining, remaining < total),
		(EngineKind::Nudge, Some(deposit)) => (deposit, true),
		(_, None) => (total, false),
	}
}

fn elapsed_ms(started: Instant) -> u64 {
	u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
