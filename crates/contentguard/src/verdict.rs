use serde::{Deserialize, Serialize};

use crate::config::PhaseKeys;
use crate::context::ExchangeContext;

/// Scanner decision for one phase of the exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanVerdict {
	/// "allow", or any other value meaning the host blocks the exchange
	pub action: String,

	/// Replacement text when the profile masks sensitive content
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub redacted: Option<String>,
}

impl ScanVerdict {
	pub fn new(action: impl Into<String>) -> Self {
		Self {
			action: action.into(),
			redacted: None,
		}
	}

	pub fn with_redacted(mut self, redacted: impl Into<String>) -> Self {
		self.redacted = Some(redacted.into());
		self
	}

	/// Read the verdict the host stored for a phase. `None` if no action is set.
	pub fn from_context(ctx: &ExchangeContext, keys: &PhaseKeys) -> Option<Self> {
		let action = ctx.get(&keys.action)?;
		Some(Self {
			action: action.to_string(),
			redacted: ctx.get(&keys.redacted).map(str::to_string),
		})
	}

	/// Store the verdict under the phase's keys, clearing any stale redaction.
	pub fn record(&self, ctx: &mut ExchangeContext, keys: &PhaseKeys) {
		ctx.set(&keys.action, &self.action);
		match &self.redacted {
			Some(redacted) => ctx.set(&keys.redacted, redacted),
			None => {
				ctx.remove(&keys.redacted);
			},
		}
	}

	pub fn is_allowed(&self, allow_action: &str) -> bool {
		self.action == allow_action
	}

	/// The text to mask with, if the verdict allows the exchange and carries a
	/// non-empty redaction.
	pub fn redaction(&self, allow_action: &str) -> Option<&str> {
		if !self.is_allowed(allow_action) {
			return None;
		}
		self.redacted.as_deref().filter(|r| !r.is_empty())
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;
	use crate::{Phase, SanitizerConfig};

	#[rstest]
	#[case::allow_with_text(ScanVerdict::new("allow").with_redacted("R"), Some("R"))]
	#[case::allow_without_text(ScanVerdict::new("allow"), None)]
	#[case::allow_with_empty_text(ScanVerdict::new("allow").with_redacted(""), None)]
	#[case::block_with_text(ScanVerdict::new("block").with_redacted("R"), None)]
	#[case::case_sensitive(ScanVerdict::new("Allow").with_redacted("R"), None)]
	fn test_redaction(#[case] verdict: ScanVerdict, #[case] expected: Option<&str>) {
		assert_eq!(verdict.redaction("allow"), expected);
	}

	#[test]
	fn test_record_and_read_back() {
		let config = SanitizerConfig::default();
		let keys = config.phase_keys(Phase::Response);
		let mut ctx = ExchangeContext::new();

		assert_eq!(ScanVerdict::from_context(&ctx, keys), None);

		let verdict = ScanVerdict::new("allow").with_redacted("***");
		verdict.record(&mut ctx, keys);
		assert_eq!(ctx.get("airs.scan.response.action"), Some("allow"));
		assert_eq!(ScanVerdict::from_context(&ctx, keys), Some(verdict));

		ScanVerdict::new("block").record(&mut ctx, keys);
		assert_eq!(ctx.get("airs.scan.response.redacted"), None);
		assert_eq!(
			ScanVerdict::from_context(&ctx, keys),
			Some(ScanVerdict::new("block"))
		);
	}

	#[test]
	fn test_deserialize() {
		let verdict: ScanVerdict = serde_json::from_str(r#"{"action":"allow"}"#).unwrap();
		assert_eq!(verdict, ScanVerdict::new("allow"));
	}
}
