pub mod engine;
pub mod postgres;
pub mod summary;

mod error;

pub use dun_storage::{claims::ClaimResult, models::CandidateRow as Candidate};
pub use engine::{EngineSettings, ReminderEngine};
pub use error::EngineError;
pub use summary::{ActivityRecord, ItemOutcome, RunOutcome, RunSummary, SentActivity, SkipReason};

use std::{future::Future, pin::Pin, sync::Arc};

use time::OffsetDateTime;
use uuid::Uuid;

use dun_config::{Config, EngineConfig};
use dun_domain::{
	Channel, EngineKind,
	metadata::{AttemptMetadata, Resolution},
	schedule::ScheduleConfig,
};
use dun_providers::{DeliveryError, sms::SmsClient};
use dun_storage::db::Db;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Identifies one ledger slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AttemptKey {
	pub engine: EngineKind,
	pub subject_id: Uuid,
	pub attempt_number: u32,
}

#[derive(Clone, Debug)]
pub struct AttemptClaim {
	pub key: AttemptKey,
	pub channel: Channel,
	pub metadata: AttemptMetadata,
	pub created_at: OffsetDateTime,
}

pub trait EligibilitySelector
where
	Self: Send + Sync,
{
	fn select(&self) -> BoxFuture<'_, color_eyre::Result<Vec<Candidate>>>;
}

pub trait ClaimStore
where
	Self: Send + Sync,
{
	fn claim<'a>(&'a self, claim: &'a AttemptClaim) -> BoxFuture<'a, color_eyre::Result<ClaimResult>>;

	/// Records how a claimed attempt ended. The claim itself is never removed.
	fn resolve<'a>(
		&'a self,
		key: &'a AttemptKey,
		resolution: &'a Resolution,
	) -> BoxFuture<'a, color_eyre::Result<()>>;
}

pub trait DeliveryAdapter
where
	Self: Send + Sync,
{
	fn send<'a>(&'a self, to: &'a str, body: &'a str) -> BoxFuture<'a, Result<String, DeliveryError>>;
}

pub trait AuditSink
where
	Self: Send + Sync,
{
	fn record<'a>(&'a self, record: &'a ActivityRecord) -> BoxFuture<'a, color_eyre::Result<()>>;
}

impl DeliveryAdapter for SmsClient {
	fn send<'a>(&'a self, to: &'a str, body: &'a str) -> BoxFuture<'a, Result<String, DeliveryError>> {
		Box::pin(SmsClient::send(self, to, body))
	}
}

/// Everything an engine talks to. `delivery` is `None` when no SMS account is configured.
#[derive(Clone)]
pub struct Collaborators {
	pub selector: Arc<dyn EligibilitySelector>,
	pub claims: Arc<dyn ClaimStore>,
	pub delivery: Option<Arc<dyn DeliveryAdapter>>,
	pub audit: Arc<dyn AuditSink>,
}
impl Collaborators {
	pub fn postgres(
		db: &Db,
		engine: &EngineConfig,
		schedule: &ScheduleConfig,
		delivery: Option<Arc<dyn DeliveryAdapter>>,
	) -> Self {
		Self {
			selector: Arc::new(postgres::PgSelector::new(
				db.pool.clone(),
				&engine.candidate_relation,
				schedule,
				engine.batch_limit,
			)),
			claims: Arc::new(postgres::PgClaimStore::new(db.pool.clone())),
			delivery,
			audit: Arc::new(postgres::PgAuditSink::new(db.pool.clone())),
		}
	}
}

/// The enabled engines of one deployment.
pub struct ReminderService {
	engines: Vec<ReminderEngine>,
}
impl ReminderService {
	pub fn new(engines: impl IntoIterator<Item = ReminderEngine>) -> Self {
		Self { engines: engines.into_iter().collect() }
	}

	/// Wires every enabled engine to Postgres and a single shared SMS client.
	pub fn from_config(cfg: &Config, db: &Db) -> dun_providers::Result<Self> {
		let delivery = SmsClient::from_config(&cfg.providers.sms)?
			.map(|client| Arc::new(client) as Arc<dyn DeliveryAdapter>);

		if delivery.is_none() {
			tracing::warn!("SMS credentials are not configured. Deliveries will be skipped.");
		}

		let mut engines = Vec::new();

		for kind in EngineKind::ALL {
			let engine_cfg = engine_config(cfg, kind);

			if !engine_cfg.enabled {
				tracing::info!(engine = %kind, "Engine is disabled.");

				continue;
			}

			let settings = EngineSettings::from_config(kind, cfg);
			let collaborators =
				Collaborators::postgres(db, engine_cfg, &settings.schedule, delivery.clone());

			engines.push(ReminderEngine::new(settings, collaborators));
		}

		Ok(Self { engines })
	}

	pub fn engine(&self, kind: EngineKind) -> Option<&ReminderEngine> {
		self.engines.iter().find(|engine| engine.kind() == kind)
	}
}

pub fn engine_config(cfg: &Config, kind: EngineKind) -> &EngineConfig {
	match kind {
		EngineKind::Chase => &cfg.engines.chase,
		EngineKind::Nudge => &cfg.engines.nudge,
	}
}
