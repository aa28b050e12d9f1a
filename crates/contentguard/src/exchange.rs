//! Drives one request/response exchange through scanning and masking.
//!
//! The scanner and the model backend are collaborators supplied by the host;
//! this module only sequences them around the [`Pipeline`] stages and records
//! verdicts in the exchange context.

use async_trait::async_trait;

use crate::context::ExchangeContext;
use crate::payload::ScanPayload;
use crate::pipeline::Pipeline;
use crate::verdict::ScanVerdict;
use crate::Phase;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Content-safety scanner
#[async_trait]
pub trait Scanner: Send + Sync {
	async fn scan(&self, payload: &ScanPayload) -> Result<ScanVerdict, BoxError>;
}

/// Generative-AI backend taking and returning serialized documents
#[async_trait]
pub trait Backend: Send + Sync {
	async fn generate(&self, request: &str) -> Result<String, BoxError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
	#[error("backend call failed: {0}")]
	Backend(#[source] BoxError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
	/// The (possibly masked) response to return to the caller
	Completed(String),
	/// A verdict other than the allow action stopped the exchange
	Blocked { phase: Phase, action: String },
}

pub struct Exchange<'a, S, B> {
	pipeline: &'a Pipeline,
	scanner: &'a S,
	backend: &'a B,
}

impl<'a, S: Scanner, B: Backend> Exchange<'a, S, B> {
	pub fn new(pipeline: &'a Pipeline, scanner: &'a S, backend: &'a B) -> Self {
		Self {
			pipeline,
			scanner,
			backend,
		}
	}

	/// Run the whole exchange. The request body is read from, and the response
	/// body written to, the document keys of `ctx`.
	pub async fn run(&self, ctx: &mut ExchangeContext) -> Result<ExchangeOutcome, ExchangeError> {
		let config = self.pipeline.config();

		self.pipeline.build_prompt_payload(ctx);
		if let Some(blocked) = self.scan(Phase::Prompt, ctx).await {
			return Ok(blocked);
		}
		self.pipeline.mask_prompt(ctx);

		let request = ctx
			.get(&config.phase_keys(Phase::Prompt).document)
			.unwrap_or_default()
			.to_string();
		let response = self
			.backend
			.generate(&request)
			.await
			.map_err(ExchangeError::Backend)?;
		ctx.set(&config.phase_keys(Phase::Response).document, response);

		self.pipeline.build_response_payload(ctx);
		if let Some(blocked) = self.scan(Phase::Response, ctx).await {
			return Ok(blocked);
		}
		self.pipeline.mask_response(ctx);

		let body = ctx
			.get(&config.phase_keys(Phase::Response).document)
			.unwrap_or_default();
		Ok(ExchangeOutcome::Completed(body.to_string()))
	}

	/// Scan the payload built for `phase` and record the verdict.
	///
	/// Scanner failures are treated as "no verdict": nothing is recorded and the
	/// exchange goes on unmasked.
	async fn scan(&self, phase: Phase, ctx: &mut ExchangeContext) -> Option<ExchangeOutcome> {
		let config = self.pipeline.config();
		let keys = config.phase_keys(phase);

		let payload = match ctx.get(&keys.payload).map(|raw| serde_json::from_str::<ScanPayload>(raw)) {
			Some(Ok(payload)) => payload,
			Some(Err(e)) => {
				tracing::warn!(%phase, error = %e, "stored scan payload is unreadable, skipping scan");
				return None;
			},
			None => {
				tracing::warn!(%phase, "no scan payload, skipping scan");
				return None;
			},
		};

		let verdict = match self.scanner.scan(&payload).await {
			Ok(verdict) => verdict,
			Err(e) => {
				tracing::warn!(%phase, error = %e, "scanner call failed, continuing unscanned");
				return None;
			},
		};

		tracing::debug!(%phase, action = %verdict.action, redacted = verdict.redacted.is_some(), "scan verdict");
		verdict.record(ctx, keys);
		if verdict.is_allowed(&config.allow_action) {
			None
		} else {
			Some(ExchangeOutcome::Blocked {
				phase,
				action: verdict.action,
			})
		}
	}
}
