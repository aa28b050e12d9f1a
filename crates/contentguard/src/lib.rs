//! Content sanitization around generative-AI traffic.
//!
//! The gateway calls into this crate at four fixed points of every exchange:
//!
//! 1. [`PromptPayloadBuilder`] turns the inbound request into a scan payload.
//! 2. [`PromptMasker`] applies the scanner's redacted prompt, if any.
//! 3. [`ResponsePayloadBuilder`] turns the backend response into a scan payload.
//! 4. [`ResponseMasker`] applies the scanner's redacted response, if any.
//!
//! All four read and write an [`ExchangeContext`], one per exchange. None of them
//! is allowed to block traffic: [`Pipeline`] logs failures and lets the original
//! content through.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod config;
pub mod context;
pub mod document;
mod error;
pub mod exchange;
pub mod mask;
pub mod payload;
pub mod pipeline;
pub mod verdict;

pub use config::{ConfigError, PhaseKeys, SanitizerConfig};
pub use context::ExchangeContext;
pub use document::Document;
pub use error::SanitizeError;
pub use exchange::{Backend, BoxError, Exchange, ExchangeError, ExchangeOutcome, Scanner};
pub use mask::{PromptMasker, ResponseMasker};
pub use payload::{PromptPayloadBuilder, ResponsePayloadBuilder, ScanPayload};
pub use pipeline::{Pipeline, Stage, StageOutcome, StageResult};
pub use verdict::ScanVerdict;

/// Which half of the exchange is being sanitized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
	/// Inbound request, before it reaches the model
	Prompt,
	/// Model output, before it reaches the caller
	Response,
}

impl fmt::Display for Phase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Phase::Prompt => f.write_str("prompt"),
			Phase::Response => f.write_str("response"),
		}
	}
}
