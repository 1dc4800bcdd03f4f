use std::{
	collections::{HashMap, HashSet},
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use color_eyre::eyre;
use time::{OffsetDateTime, macros::datetime};
use uuid::Uuid;

use dun_config::QuietHours;
use dun_domain::{
	EngineKind,
	metadata::{AttemptMetadata, FailureKind, Resolution},
	schedule::ScheduleConfig,
};
use dun_providers::DeliveryError;
use dun_service::{
	ActivityRecord, AttemptClaim, AttemptKey, AuditSink, BoxFuture, Candidate, ClaimResult,
	ClaimStore, Collaborators, DeliveryAdapter, EligibilitySelector, EngineError, EngineSettings,
	ReminderEngine, RunOutcome, RunSummary, SkipReason,
};

// 13:00 at UTC-5.
const DAYTIME: OffsetDateTime = datetime!(2026-03-02 18:00 UTC);
// 22:00 at UTC-5.
const NIGHT: OffsetDateTime = datetime!(2026-03-03 03:00 UTC);

struct StaticSelector {
	rows: Vec<Candidate>,
	fail: bool,
	calls: AtomicUsize,
}
impl StaticSelector {
	fn new(rows: Vec<Candidate>) -> Self {
		Self { rows, fail: false, calls: AtomicUsize::new(0) }
	}

	fn failing() -> Self {
		Self { rows: Vec::new(), fail: true, calls: AtomicUsize::new(0) }
	}
}
impl EligibilitySelector for StaticSelector {
	fn select(&self) -> BoxFuture<'_, color_eyre::Result<Vec<Candidate>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			if self.fail {
				return Err(eyre::eyre!("relation \"chase_candidates\" does not exist"));
			}

			Ok(self.rows.clone())
		})
	}
}

#[derive(Default)]
struct MemoryClaims {
	rows: Mutex<HashMap<AttemptKey, AttemptMetadata>>,
	broken_subjects: HashSet<Uuid>,
}
impl MemoryClaims {
	fn get(&self, key: &AttemptKey) -> Option<AttemptMetadata> {
		self.rows.lock().expect("lock").get(key).cloned()
	}

	fn len(&self) -> usize {
		self.rows.lock().expect("lock").len()
	}
}
impl ClaimStore for MemoryClaims {
	fn claim<'a>(&'a self, claim: &'a AttemptClaim) -> BoxFuture<'a, color_eyre::Result<ClaimResult>> {
		Box::pin(async move {
			if self.broken_subjects.contains(&claim.key.subject_id) {
				return Err(eyre::eyre!("connection reset"));
			}

			let mut rows = self.rows.lock().expect("lock");

			if rows.contains_key(&claim.key) {
				return Ok(ClaimResult::AlreadyClaimed);
			}

			rows.insert(claim.key, claim.metadata.clone());

			Ok(ClaimResult::Claimed)
		})
	}

	fn resolve<'a>(
		&'a self,
		key: &'a AttemptKey,
		resolution: &'a Resolution,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			let mut rows = self.rows.lock().expect("lock");
			let current = rows.get_mut(key).ok_or_else(|| eyre::eyre!("missing claim"))?;

			*current = current.resolved(resolution);

			Ok(())
		})
	}
}

#[derive(Default)]
struct RecordingDelivery {
	sent: Mutex<Vec<(String, String)>>,
	rejected_phones: HashSet<String>,
	delay: Duration,
}
impl RecordingDelivery {
	fn bodies(&self) -> Vec<String> {
		self.sent.lock().expect("lock").iter().map(|(_, body)| body.clone()).collect()
	}
}
impl DeliveryAdapter for RecordingDelivery {
	fn send<'a>(&'a self, to: &'a str, body: &'a str) -> BoxFuture<'a, Result<String, DeliveryError>> {
		Box::pin(async move {
			if !self.delay.is_zero() {
				tokio::time::sleep(self.delay).await;
			}
			if self.rejected_phones.contains(to) {
				return Err(DeliveryError::Rejected {
					status: 400,
					message: "Invalid 'To' number.".to_string(),
				});
			}

			let mut sent = self.sent.lock().expect("lock");

			sent.push((to.to_string(), body.to_string()));

			Ok(format!("SM{}", sent.len()))
		})
	}
}

#[derive(Default)]
struct MemoryAudit {
	records: Mutex<Vec<ActivityRecord>>,
}
impl MemoryAudit {
	fn records(&self) -> Vec<ActivityRecord> {
		self.records.lock().expect("lock").clone()
	}
}
impl AuditSink for MemoryAudit {
	fn record<'a>(&'a self, record: &'a ActivityRecord) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			self.records.lock().expect("lock").push(record.clone());

			Ok(())
		})
	}
}

struct Harness {
	selector: Arc<StaticSelector>,
	claims: Arc<MemoryClaims>,
	delivery: Arc<RecordingDelivery>,
	audit: Arc<MemoryAudit>,
	engine: ReminderEngine,
}

fn settings(kind: EngineKind) -> EngineSettings {
	EngineSettings {
		schedule: ScheduleConfig::for_kind(kind),
		link_base: "https://pay.example.com/i".to_string(),
		quiet_hours: QuietHours::default(),
		max_error_samples: 5,
		delivery_timeout: Duration::from_secs(2),
	}
}

fn harness_with(
	settings: EngineSettings,
	selector: StaticSelector,
	claims: MemoryClaims,
	delivery: Option<RecordingDelivery>,
) -> Harness {
	let selector = Arc::new(selector);
	let claims = Arc::new(claims);
	let has_delivery = delivery.is_some();
	let delivery = Arc::new(delivery.unwrap_or_default());
	let audit = Arc::new(MemoryAudit::default());
	let collaborators = Collaborators {
		selector: selector.clone(),
		claims: claims.clone(),
		delivery: has_delivery.then(|| delivery.clone() as Arc<dyn DeliveryAdapter>),
		audit: audit.clone(),
	};
	let engine = ReminderEngine::new(settings, collaborators);

	Harness { selector, claims, delivery, audit, engine }
}

fn harness(kind: EngineKind, rows: Vec<Candidate>) -> Harness {
	harness_with(
		settings(kind),
		StaticSelector::new(rows),
		MemoryClaims::default(),
		Some(RecordingDelivery::default()),
	)
}

fn candidate(phone: Option<&str>, prior_attempt_count: i32, hours: f64) -> Candidate {
	Candidate {
		subject_id: Uuid::new_v4(),
		user_id: Uuid::new_v4(),
		client_name: Some("Dana Whitfield".to_string()),
		client_phone: phone.map(str::to_string),
		currency: "USD".to_string(),
		total: 480.0,
		partial_amount: None,
		status: "sent".to_string(),
		tracking_id: format!("trk_{}", Uuid::new_v4().simple()),
		hours_since_anchor: Some(hours),
		prior_attempt_count,
	}
}

async fn completed(engine: &ReminderEngine, now: OffsetDateTime) -> RunSummary {
	match engine.run_at(now).await.expect("run") {
		RunOutcome::Completed(summary) => summary,
		other => panic!("expected a completed run, got {other:?}"),
	}
}

fn key(kind: EngineKind, row: &Candidate, attempt_number: u32) -> AttemptKey {
	AttemptKey { engine: kind, subject_id: row.subject_id, attempt_number }
}

#[tokio::test]
async fn second_run_sends_nothing() {
	let rows = vec![candidate(Some("+15550000001"), 0, 30.0), candidate(Some("+15550000002"), 1, 100.0)];
	let h = harness(EngineKind::Chase, rows.clone());
	let first = completed(&h.engine, DAYTIME).await;

	assert_eq!((first.processed, first.sent, first.skipped, first.errored), (2, 2, 0, 0));
	assert!(matches!(
		h.claims.get(&key(EngineKind::Chase, &rows[0], 1)),
		Some(AttemptMetadata::Sent { message_id, .. }) if message_id == "SM1"
	));
	// Prior 1 at 100h proposes attempt 2 even though attempt 3 is not due anyway.
	assert!(h.claims.get(&key(EngineKind::Chase, &rows[1], 2)).is_some());

	let second = completed(&h.engine, DAYTIME).await;

	assert_eq!((second.processed, second.sent, second.skipped), (2, 0, 2));
	assert_eq!(second.skip_reasons.get(&SkipReason::AlreadyClaimed), Some(&2));
	assert_eq!(h.delivery.bodies().len(), 2);
}

#[tokio::test]
async fn quiet_hours_skip_the_whole_run() {
	let h = harness(EngineKind::Chase, vec![candidate(Some("+15550000001"), 0, 30.0)]);
	let outcome = h.engine.run_at(NIGHT).await.expect("run");

	assert!(matches!(outcome, RunOutcome::QuietHours { engine: EngineKind::Chase, .. }));
	assert_eq!(h.selector.calls.load(Ordering::SeqCst), 0);
	assert_eq!(h.claims.len(), 0);
	assert!(h.audit.records().is_empty());
}

#[tokio::test]
async fn disabled_quiet_hours_run_at_night() {
	let mut settings = settings(EngineKind::Chase);

	settings.quiet_hours.enabled = false;

	let h = harness_with(
		settings,
		StaticSelector::new(vec![candidate(Some("+15550000001"), 0, 30.0)]),
		MemoryClaims::default(),
		Some(RecordingDelivery::default()),
	);
	let summary = completed(&h.engine, NIGHT).await;

	assert_eq!(summary.sent, 1);
}

#[tokio::test]
async fn failing_delivery_does_not_stop_the_batch() {
	let rows = vec![
		candidate(Some("+15550000001"), 0, 30.0),
		candidate(Some("+15550000002"), 0, 30.0),
		candidate(Some("+15550000003"), 0, 30.0),
	];
	let delivery = RecordingDelivery {
		rejected_phones: HashSet::from(["+15550000002".to_string()]),
		..RecordingDelivery::default()
	};
	let h = harness_with(
		settings(EngineKind::Chase),
		StaticSelector::new(rows.clone()),
		MemoryClaims::default(),
		Some(delivery),
	);
	let summary = completed(&h.engine, DAYTIME).await;

	assert_eq!((summary.processed, summary.sent, summary.errored), (3, 2, 1));
	assert_eq!(summary.errors.len(), 1);
	assert!(summary.errors[0].starts_with(&rows[1].subject_id.to_string()));

	match h.claims.get(&key(EngineKind::Chase, &rows[1], 1)) {
		Some(AttemptMetadata::Failed { failure, details }) => {
			assert_eq!(failure.kind, FailureKind::Rejected);
			assert_eq!(details.tracking_id, rows[1].tracking_id);
		},
		other => panic!("expected a failed claim, got {other:?}"),
	}
}

#[tokio::test]
async fn slow_delivery_times_out_and_keeps_the_claim() {
	let mut settings = settings(EngineKind::Nudge);

	settings.delivery_timeout = Duration::from_millis(20);

	let row = candidate(Some("+15550000001"), 0, 80.0);
	let h = harness_with(
		settings,
		StaticSelector::new(vec![row.clone()]),
		MemoryClaims::default(),
		Some(RecordingDelivery { delay: Duration::from_millis(500), ..RecordingDelivery::default() }),
	);
	let summary = completed(&h.engine, DAYTIME).await;

	assert_eq!(summary.errored, 1);
	assert!(matches!(
		h.claims.get(&key(EngineKind::Nudge, &row, 1)),
		Some(AttemptMetadata::Failed { failure, .. }) if failure.kind == FailureKind::Timeout
	));
}

#[tokio::test]
async fn missing_phone_or_credentials_skip_but_keep_the_claim() {
	let row = candidate(None, 0, 30.0);
	let h = harness(EngineKind::Chase, vec![row.clone()]);
	let summary = completed(&h.engine, DAYTIME).await;

	assert_eq!(summary.skip_reasons.get(&SkipReason::MissingPhone), Some(&1));
	assert!(matches!(
		h.claims.get(&key(EngineKind::Chase, &row, 1)),
		Some(AttemptMetadata::Skipped { skip_reason, .. }) if skip_reason == "missing_phone"
	));

	let row = candidate(Some("+15550000001"), 0, 30.0);
	let h = harness_with(
		settings(EngineKind::Chase),
		StaticSelector::new(vec![row.clone()]),
		MemoryClaims::default(),
		None,
	);
	let summary = completed(&h.engine, DAYTIME).await;

	assert_eq!(summary.skip_reasons.get(&SkipReason::DeliveryUnconfigured), Some(&1));
	assert!(matches!(
		h.claims.get(&key(EngineKind::Chase, &row, 1)),
		Some(AttemptMetadata::Skipped { skip_reason, .. }) if skip_reason == "delivery_unconfigured"
	));
}

#[tokio::test]
async fn exhausted_and_early_subjects_are_not_claimed() {
	let h = harness(
		EngineKind::Nudge,
		vec![
			candidate(Some("+15550000001"), 3, 900.0),
			candidate(Some("+15550000002"), 0, 50.0),
			candidate(Some("+15550000003"), 0, f64::NAN),
		],
	);
	let summary = completed(&h.engine, DAYTIME).await;

	assert_eq!(summary.skip_reasons.get(&SkipReason::NotDue), Some(&3));
	assert_eq!(h.claims.len(), 0);
}

#[tokio::test]
async fn error_samples_are_capped() {
	let rows: Vec<_> = (0..7).map(|_| candidate(Some("+15550000009"), 0, 30.0)).collect();
	let delivery = RecordingDelivery {
		rejected_phones: HashSet::from(["+15550000009".to_string()]),
		..RecordingDelivery::default()
	};
	let h = harness_with(
		settings(EngineKind::Chase),
		StaticSelector::new(rows),
		MemoryClaims::default(),
		Some(delivery),
	);
	let summary = completed(&h.engine, DAYTIME).await;

	assert_eq!(summary.errored, 7);
	assert_eq!(summary.errors.len(), 5);
}

#[tokio::test]
async fn claim_store_errors_are_per_item() {
	let broken = candidate(Some("+15550000001"), 0, 30.0);
	let healthy = candidate(Some("+15550000002"), 0, 30.0);
	let claims = MemoryClaims {
		broken_subjects: HashSet::from([broken.subject_id]),
		..MemoryClaims::default()
	};
	let h = harness_with(
		settings(EngineKind::Chase),
		StaticSelector::new(vec![broken, healthy]),
		claims,
		Some(RecordingDelivery::default()),
	);
	let summary = completed(&h.engine, DAYTIME).await;

	assert_eq!((summary.sent, summary.errored), (1, 1));
	assert!(summary.errors[0].contains("Claim failed"));
}

#[tokio::test]
async fn selector_failure_aborts_the_run() {
	let h = harness_with(
		settings(EngineKind::Chase),
		StaticSelector::failing(),
		MemoryClaims::default(),
		Some(RecordingDelivery::default()),
	);
	let err = h.engine.run_at(DAYTIME).await.expect_err("selector failure");

	assert!(matches!(err, EngineError::Selector { .. }));
	assert!(h.audit.records().is_empty());
}

#[tokio::test]
async fn sent_messages_and_the_summary_are_audited() {
	let mut row = candidate(Some("(555) 000-0001"), 0, 80.0);

	row.partial_amount = Some(150.0);

	let h = harness(EngineKind::Nudge, vec![row.clone()]);
	let summary = completed(&h.engine, DAYTIME).await;
	let records = h.audit.records();

	assert_eq!(summary.sent, 1);
	assert_eq!(records.len(), 2);

	match &records[0] {
		ActivityRecord::Sent(sent) => {
			assert_eq!(sent.subject_id, row.subject_id);
			assert_eq!(sent.user_id, row.user_id);
			assert_eq!(sent.amount, 150.0);
			assert_eq!(sent.attempt_number, 1);
			assert_eq!(sent.message_id, "SM1");
		},
		other => panic!("expected a sent record, got {other:?}"),
	}

	assert_eq!(records[0].event_type(), "nudge_sent");
	assert_eq!(records[1], ActivityRecord::Run(summary));
	assert_eq!(records[1].event_type(), "nudge_run");

	let body = &h.delivery.bodies()[0];

	assert!(body.contains("deposit"), "{body}");
	assert!(body.contains("$150.00"), "{body}");
	assert!(body.contains(&format!("https://pay.example.com/i/{}", row.tracking_id)), "{body}");
	assert!(body.contains("Reply STOP to opt out."), "{body}");
}

#[tokio::test]
async fn later_attempts_omit_the_opt_out_marker() {
	let h = harness(EngineKind::Chase, vec![candidate(Some("+15550000001"), 2, 150.0)]);
	let summary = completed(&h.engine, DAYTIME).await;

	assert_eq!(summary.sent, 1);
	assert!(!h.delivery.bodies()[0].contains("STOP"));
}

#[tokio::test]
async fn invalid_rows_error_without_claiming() {
	let mut bad_currency = candidate(Some("+15550000001"), 0, 30.0);
	let mut blank_tracking = candidate(Some("+15550000002"), 0, 30.0);
	let healthy = candidate(Some("+15550000003"), 0, 30.0);

	bad_currency.currency = "dollars".to_string();
	blank_tracking.tracking_id = "  ".to_string();

	let h = harness(
		EngineKind::Chase,
		vec![bad_currency.clone(), blank_tracking.clone(), healthy.clone()],
	);
	let summary = completed(&h.engine, DAYTIME).await;

	assert_eq!((summary.processed, summary.sent, summary.errored), (3, 1, 2));
	assert!(summary.errors.iter().all(|error| error.contains("Invalid candidate")));
	assert_eq!(h.claims.len(), 1);
	assert!(h.claims.get(&key(EngineKind::Chase, &bad_currency, 1)).is_none());
	assert!(h.claims.get(&key(EngineKind::Chase, &blank_tracking, 1)).is_none());
	assert!(h.claims.get(&key(EngineKind::Chase, &healthy, 1)).is_some());

	// Nothing was spent on the bad rows, so they are reported again until the data is fixed.
	let second = completed(&h.engine, DAYTIME).await;

	assert_eq!((second.errored, second.sent), (2, 0));
	assert_eq!(second.skip_reasons.get(&SkipReason::AlreadyClaimed), Some(&1));
	assert_eq!(h.claims.len(), 1);
}

#[tokio::test]
async fn render_failure_keeps_the_claim_and_the_batch_continues() {
	let mut oversized = candidate(Some("+15550000001"), 0, 30.0);
	let healthy = candidate(Some("+15550000002"), 0, 30.0);

	oversized.tracking_id = "t".repeat(240);

	let h = harness(EngineKind::Chase, vec![oversized.clone(), healthy.clone()]);
	let summary = completed(&h.engine, DAYTIME).await;

	assert_eq!((summary.processed, summary.sent, summary.errored), (2, 1, 1));
	assert!(summary.errors[0].starts_with(&oversized.subject_id.to_string()));
	assert!(summary.errors[0].contains("limit is 240"), "{:?}", summary.errors);
	assert_eq!(h.delivery.bodies().len(), 1);
	assert!(matches!(
		h.claims.get(&key(EngineKind::Chase, &oversized, 1)),
		Some(AttemptMetadata::RenderFailed { .. })
	));
	assert!(matches!(
		h.claims.get(&key(EngineKind::Chase, &healthy, 1)),
		Some(AttemptMetadata::Sent { .. })
	));
}
