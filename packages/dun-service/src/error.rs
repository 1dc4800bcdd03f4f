/// Run-level failures. Per-candidate problems never surface here; they are counted in the
/// summary instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
	#[error("Candidate selection failed: {message}")]
	Selector { message: String },
}
