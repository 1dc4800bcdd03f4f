use dun_domain::{metadata::FailureKind, phone::InvalidPhone};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures while building a provider client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error("{message}")]
	InvalidConfig { message: String },
}

/// Failures of a single send. Every outcome of a delivery attempt is one of these values; nothing
/// escapes the adapter as a panic.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeliveryError {
	#[error("SMS request timed out after {timeout_ms} ms.")]
	Timeout { timeout_ms: u64 },
	#[error("SMS provider rejected the message with status {status}: {message}")]
	Rejected { status: u16, message: String },
	#[error("SMS transport failed: {message}")]
	Transport { message: String },
	#[error(transparent)]
	InvalidRecipient(#[from] InvalidPhone),
	#[error("SMS provider response was not understood: {message}")]
	InvalidResponse { message: String },
}
impl DeliveryError {
	pub fn kind(&self) -> FailureKind {
		match self {
			Self::Timeout { .. } => FailureKind::Timeout,
			Self::Rejected { .. } => FailureKind::Rejected,
			Self::Transport { .. } => FailureKind::Transport,
			Self::InvalidRecipient(_) => FailureKind::InvalidRecipient,
			Self::InvalidResponse { .. } => FailureKind::InvalidResponse,
		}
	}
}
