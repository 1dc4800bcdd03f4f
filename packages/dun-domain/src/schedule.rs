use crate::EngineKind;

/// Hours after the invoice was sent at which each chase attempt becomes due.
pub const CHASE_HOURS: [f64; 5] = [24.0, 72.0, 144.0, 216.0, 288.0];
/// Hours after the estimate was sent at which each nudge attempt becomes due.
pub const NUDGE_HOURS: [f64; 3] = [72.0, 168.0, 336.0];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScheduleError {
	#[error("Schedule must contain at least one attempt.")]
	Empty,
	#[error("Threshold for attempt {attempt_number} must be a finite, non-negative number of hours.")]
	InvalidThreshold { attempt_number: u32 },
	#[error("Threshold for attempt {attempt_number} must be greater than the previous attempt's.")]
	NotIncreasing { attempt_number: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleStep {
	pub attempt_number: u32,
	pub hours_after_anchor: f64,
}

/// Ordered escalation table. Attempt numbers are dense from 1 and thresholds strictly increase,
/// so the table length is the attempt ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
	kind: EngineKind,
	steps: Vec<ScheduleStep>,
}
impl ScheduleConfig {
	pub fn new(kind: EngineKind, thresholds: &[f64]) -> Result<Self, ScheduleError> {
		if thresholds.is_empty() {
			return Err(ScheduleError::Empty);
		}

		let mut previous: Option<f64> = None;

		for (idx, hours) in thresholds.iter().copied().enumerate() {
			let attempt_number = idx as u32 + 1;

			if !hours.is_finite() || hours < 0.0 {
				return Err(ScheduleError::InvalidThreshold { attempt_number });
			}
			if previous.map(|prev| hours <= prev).unwrap_or(false) {
				return Err(ScheduleError::NotIncreasing { attempt_number });
			}

			previous = Some(hours);
		}

		Ok(Self::from_thresholds(kind, thresholds))
	}

	pub fn chase() -> Self {
		Self::from_thresholds(EngineKind::Chase, &CHASE_HOURS)
	}

	pub fn nudge() -> Self {
		Self::from_thresholds(EngineKind::Nudge, &NUDGE_HOURS)
	}

	pub fn for_kind(kind: EngineKind) -> Self {
		match kind {
			EngineKind::Chase => Self::chase(),
			EngineKind::Nudge => Self::nudge(),
		}
	}

	pub fn kind(&self) -> EngineKind {
		self.kind
	}

	pub fn steps(&self) -> &[ScheduleStep] {
		&self.steps
	}

	pub fn max_attempts(&self) -> u32 {
		self.steps.len() as u32
	}

	pub fn threshold(&self, attempt_number: u32) -> Option<f64> {
		let idx = attempt_number.checked_sub(1)? as usize;

		self.steps.get(idx).map(|step| step.hours_after_anchor)
	}

	/// Returns the single attempt that is due now, if any.
	///
	/// Only `prior_attempt_count + 1` is ever considered: a run that starts late sends the next
	/// reminder in sequence rather than every reminder whose threshold has passed. Unknown,
	/// negative, or non-finite elapsed hours are never due.
	pub fn next_attempt(
		&self,
		prior_attempt_count: i32,
		hours_since_anchor: Option<f64>,
	) -> Option<u32> {
		let prior = prior_attempt_count.max(0) as u32;

		if prior >= self.max_attempts() {
			return None;
		}

		let hours = hours_since_anchor.filter(|hours| hours.is_finite() && *hours >= 0.0)?;
		let candidate = prior + 1;
		let threshold = self.threshold(candidate)?;

		(hours >= threshold).then_some(candidate)
	}

	fn from_thresholds(kind: EngineKind, thresholds: &[f64]) -> Self {
		let steps = thresholds
			.iter()
			.enumerate()
			.map(|(idx, hours)| ScheduleStep {
				attempt_number: idx as u32 + 1,
				hours_after_anchor: *hours,
			})
			.collect();

		Self { kind, steps }
	}
}
