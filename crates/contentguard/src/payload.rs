//! Scan payload construction for the prompt and response phases.

use serde::{Deserialize, Serialize};

use crate::config::SanitizerConfig;
use crate::context::ExchangeContext;
use crate::document::extract_text;
use crate::pipeline::{Stage, StageOutcome, StageResult};
use crate::{Phase, SanitizeError};

/// Request body for the content-safety scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanPayload {
	/// Correlation id, omitted when the exchange has none
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tr_id: Option<String>,

	pub ai_profile: AiProfile,

	pub metadata: ScanMetadata,

	pub contents: Vec<ScanContent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiProfile {
	pub profile_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanMetadata {
	pub ai_model: String,
	pub app_user: String,
	pub app_name: String,
}

/// Text under scan. A payload carries prompt text or response text, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanContent {
	Prompt(String),
	Response(String),
}

impl ScanContent {
	pub fn text(&self) -> &str {
		match self {
			ScanContent::Prompt(t) | ScanContent::Response(t) => t,
		}
	}
}

impl ScanPayload {
	/// Assemble a payload for `text`, resolving correlation id, profile and model
	/// from the exchange.
	pub fn build(
		phase: Phase,
		text: String,
		ctx: &ExchangeContext,
		config: &SanitizerConfig,
	) -> Self {
		let keys = &config.keys;
		let defaults = &config.defaults;
		let content = match phase {
			Phase::Prompt => ScanContent::Prompt(text),
			Phase::Response => ScanContent::Response(text),
		};
		Self {
			tr_id: ctx.resolve(&keys.correlation_id).map(str::to_string),
			ai_profile: AiProfile {
				profile_name: ctx
					.resolve(&keys.profile_name)
					.unwrap_or(&defaults.profile_name)
					.to_string(),
			},
			metadata: ScanMetadata {
				ai_model: ctx
					.resolve(&keys.ai_model)
					.unwrap_or(&defaults.ai_model)
					.to_string(),
				app_user: defaults.app_user.clone(),
				app_name: defaults.app_name.clone(),
			},
			contents: vec![content],
		}
	}

	pub fn text(&self) -> &str {
		self.contents.first().map(ScanContent::text).unwrap_or_default()
	}
}

/// Extract the text for `phase` and write its scan payload into the exchange.
///
/// A document that does not parse is scanned as raw text; the stage still writes
/// its payload and reports the parse error as [`StageOutcome::Degraded`].
fn build_payload(phase: Phase, ctx: &mut ExchangeContext, config: &SanitizerConfig) -> StageResult {
	let keys = config.phase_keys(phase);
	let raw = ctx.get(&keys.document).unwrap_or_default();
	let (text, degraded) = match extract_text(phase, raw) {
		Ok(text) => (text, None),
		Err(e) => (raw.to_string(), Some(e)),
	};

	let payload = ScanPayload::build(phase, text, ctx, config);
	let serialized = serde_json::to_string(&payload).map_err(|source| SanitizeError::Serialize {
		phase,
		what: "scan payload",
		source,
	})?;

	tracing::debug!(
		%phase,
		text_len = payload.text().len(),
		tr_id = ?payload.tr_id,
		profile = %payload.ai_profile.profile_name,
		"built scan payload"
	);

	ctx.set(&keys.payload, serialized);
	if phase == Phase::Prompt {
		ctx.set(&config.keys.raw_prompt, payload.text());
	}

	Ok(match degraded {
		Some(e) => StageOutcome::Degraded(e),
		None => StageOutcome::Applied,
	})
}

/// Builds the scan payload for the inbound request
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptPayloadBuilder;

impl Stage for PromptPayloadBuilder {
	fn name(&self) -> &'static str {
		"prompt_payload_builder"
	}

	fn phase(&self) -> Phase {
		Phase::Prompt
	}

	fn run(&self, ctx: &mut ExchangeContext, config: &SanitizerConfig) -> StageResult {
		build_payload(Phase::Prompt, ctx, config)
	}
}

/// Builds the scan payload for the backend response
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponsePayloadBuilder;

impl Stage for ResponsePayloadBuilder {
	fn name(&self) -> &'static str {
		"response_payload_builder"
	}

	fn phase(&self) -> Phase {
		Phase::Response
	}

	fn run(&self, ctx: &mut ExchangeContext, config: &SanitizerConfig) -> StageResult {
		build_payload(Phase::Response, ctx, config)
	}
}
