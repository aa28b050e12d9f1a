//! Reinjection of scanner-redacted text into the request and response bodies.

use crate::config::SanitizerConfig;
use crate::context::ExchangeContext;
use crate::document::Document;
use crate::pipeline::{Stage, StageOutcome, StageResult};
use crate::verdict::ScanVerdict;
use crate::{Phase, SanitizeError};

/// Replace every text fragment of `raw` with `redacted`.
///
/// Returns the new serialized document and the number of fragments replaced.
/// Each fragment receives the whole redacted string.
pub fn mask_document(phase: Phase, raw: &str, redacted: &str) -> Result<(String, usize), SanitizeError> {
	let mut doc = Document::parse(phase, raw)?;
	let replaced = doc.replace_text(redacted);
	Ok((doc.to_json()?, replaced))
}

fn apply_masking(phase: Phase, ctx: &mut ExchangeContext, config: &SanitizerConfig) -> StageResult {
	let keys = config.phase_keys(phase);
	let Some(verdict) = ScanVerdict::from_context(ctx, keys) else {
		return Ok(StageOutcome::Skipped);
	};
	let Some(redacted) = verdict.redaction(&config.allow_action) else {
		tracing::debug!(%phase, action = %verdict.action, "no redaction to apply");
		return Ok(StageOutcome::Skipped);
	};

	// Nothing is written until the masked document has been fully serialized.
	let raw = ctx.get(&keys.document).unwrap_or_default();
	let (masked, replaced) = mask_document(phase, raw, redacted)?;

	tracing::debug!(%phase, replaced, "applied scanner redaction");
	ctx.set(&keys.document, masked);
	ctx.set_flag(&keys.masking_applied, true);
	Ok(StageOutcome::Applied)
}

/// Applies the prompt redaction before the request goes to the model
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptMasker;

impl Stage for PromptMasker {
	fn name(&self) -> &'static str {
		"prompt_masker"
	}

	fn phase(&self) -> Phase {
		Phase::Prompt
	}

	fn run(&self, ctx: &mut ExchangeContext, config: &SanitizerConfig) -> StageResult {
		apply_masking(Phase::Prompt, ctx, config)
	}
}

/// Applies the response redaction before the response goes back to the caller
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseMasker;

impl Stage for ResponseMasker {
	fn name(&self) -> &'static str {
		"response_masker"
	}

	fn phase(&self) -> Phase {
		Phase::Response
	}

	fn run(&self, ctx: &mut ExchangeContext, config: &SanitizerConfig) -> StageResult {
		apply_masking(Phase::Response, ctx, config)
	}
}
