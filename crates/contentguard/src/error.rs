use crate::Phase;

/// Errors raised while transforming a document.
///
/// These never abort an exchange. [`crate::Pipeline`] logs them and keeps the
/// original content.
#[derive(Debug, thiserror::Error)]
pub enum SanitizeError {
	#[error("{phase} document does not have the expected shape: {source}")]
	Document {
		phase: Phase,
		#[source]
		source: serde_json::Error,
	},

	#[error("failed to serialize {what} for {phase}: {source}")]
	Serialize {
		phase: Phase,
		what: &'static str,
		#[source]
		source: serde_json::Error,
	},
}

impl SanitizeError {
	pub fn phase(&self) -> Phase {
		match self {
			SanitizeError::Document { phase, .. } | SanitizeError::Serialize { phase, .. } => *phase,
		}
	}
}
