// Sanitization pipeline
//
// Runs the four sanitization stages at the points the gateway calls them and
// owns the failure policy. Stages report errors as values; the pipeline logs
// them and lets the original content through, so a sanitization failure never
// blocks AI traffic.

use std::sync::Arc;

use crate::config::SanitizerConfig;
use crate::context::ExchangeContext;
use crate::mask::{PromptMasker, ResponseMasker};
use crate::payload::{PromptPayloadBuilder, ResponsePayloadBuilder};
use crate::{Phase, SanitizeError};

/// What a stage did to the exchange
#[derive(Debug)]
pub enum StageOutcome {
	/// The stage wrote its results
	Applied,
	/// Inputs did not call for any change; nothing was written
	Skipped,
	/// The stage hit an error and the exchange continues with original content
	Degraded(SanitizeError),
}

impl StageOutcome {
	pub fn is_applied(&self) -> bool {
		matches!(self, StageOutcome::Applied)
	}

	pub fn is_degraded(&self) -> bool {
		matches!(self, StageOutcome::Degraded(_))
	}
}

pub type StageResult = Result<StageOutcome, SanitizeError>;

/// One transformation run at a fixed point of the exchange.
///
/// Stages are stateless; everything they need is in the context and config.
pub trait Stage: Send + Sync {
	fn name(&self) -> &'static str;

	fn phase(&self) -> Phase;

	fn run(&self, ctx: &mut ExchangeContext, config: &SanitizerConfig) -> StageResult;
}

/// Entry points for the gateway, in the order it calls them.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
	config: Arc<SanitizerConfig>,
}

impl Pipeline {
	pub fn new(config: SanitizerConfig) -> Self {
		Self {
			config: Arc::new(config),
		}
	}

	pub fn config(&self) -> &SanitizerConfig {
		&self.config
	}

	/// Extract the prompt and write its scan payload.
	pub fn build_prompt_payload(&self, ctx: &mut ExchangeContext) -> StageOutcome {
		self.run_stage(&PromptPayloadBuilder, ctx)
	}

	/// Apply the prompt verdict's redaction to the request.
	pub fn mask_prompt(&self, ctx: &mut ExchangeContext) -> StageOutcome {
		self.run_stage(&PromptMasker, ctx)
	}

	/// Extract the model output and write its scan payload.
	pub fn build_response_payload(&self, ctx: &mut ExchangeContext) -> StageOutcome {
		self.run_stage(&ResponsePayloadBuilder, ctx)
	}

	/// Apply the response verdict's redaction to the response.
	pub fn mask_response(&self, ctx: &mut ExchangeContext) -> StageOutcome {
		self.run_stage(&ResponseMasker, ctx)
	}

	/// Run a stage, failing open on error.
	pub fn run_stage(&self, stage: &dyn Stage, ctx: &mut ExchangeContext) -> StageOutcome {
		match stage.run(ctx, &self.config) {
			Ok(StageOutcome::Degraded(e)) | Err(e) => {
				tracing::warn!(
					stage = stage.name(),
					phase = %stage.phase(),
					error = %e,
					"sanitization stage failed, continuing with original content"
				);
				StageOutcome::Degraded(e)
			},
			Ok(outcome) => {
				tracing::debug!(
					stage = stage.name(),
					phase = %stage.phase(),
					outcome = ?outcome,
					"sanitization stage finished"
				);
				outcome
			},
		}
	}
}
