//! Variable names and payload defaults used by the sanitization stages.
//!
//! Everything has a default matching a stock Apigee + Vertex AI + AIRS proxy,
//! so an empty YAML document is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Phase;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read config: {0}")]
	Io(#[from] std::io::Error),

	#[error("invalid config: {0}")]
	Parse(#[from] serde_yaml::Error),
}

/// Top-level sanitizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SanitizerConfig {
	/// Names of the exchange variables read and written
	#[serde(default)]
	pub keys: VariableKeys,

	/// Values used when a lookup resolves to nothing
	#[serde(default)]
	pub defaults: PayloadDefaults,

	/// Verdict action that lets the exchange through (and allows masking)
	#[serde(default = "default_allow_action")]
	pub allow_action: String,
}

fn default_allow_action() -> String {
	"allow".to_string()
}

impl Default for SanitizerConfig {
	fn default() -> Self {
		Self {
			keys: VariableKeys::default(),
			defaults: PayloadDefaults::default(),
			allow_action: default_allow_action(),
		}
	}
}

impl SanitizerConfig {
	pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
		Ok(serde_yaml::from_str(yaml)?)
	}

	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let raw = fs_err::read_to_string(path.as_ref())?;
		Self::from_yaml(&raw)
	}

	pub fn phase_keys(&self, phase: Phase) -> &PhaseKeys {
		match phase {
			Phase::Prompt => &self.keys.prompt,
			Phase::Response => &self.keys.response,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableKeys {
	/// Lookup order for the scan transaction id
	#[serde(default = "default_correlation_id")]
	pub correlation_id: Vec<String>,

	/// Lookup order for the security profile name
	#[serde(default = "default_profile_name")]
	pub profile_name: Vec<String>,

	/// Lookup order for the model identifier
	#[serde(default = "default_ai_model")]
	pub ai_model: Vec<String>,

	/// Where the prompt builder stores the bare extracted prompt
	#[serde(default = "default_raw_prompt")]
	pub raw_prompt: String,

	#[serde(default = "default_prompt_keys")]
	pub prompt: PhaseKeys,

	#[serde(default = "default_response_keys")]
	pub response: PhaseKeys,
}

fn default_correlation_id() -> Vec<String> {
	vec!["request.header.X-Session-ID".to_string(), "messageid".to_string()]
}

fn default_profile_name() -> Vec<String> {
	vec![
		"request.header.X-Pan-Profile".to_string(),
		"private.prisma.airs.profile".to_string(),
	]
}

fn default_ai_model() -> Vec<String> {
	vec!["private.vertex.model".to_string()]
}

fn default_raw_prompt() -> String {
	"ai.prompt".to_string()
}

fn default_prompt_keys() -> PhaseKeys {
	PhaseKeys {
		document: "request.content".to_string(),
		payload: "airs.request.payload".to_string(),
		action: "airs.action".to_string(),
		redacted: "airs.prompt.redacted".to_string(),
		masking_applied: "airs.prompt.masking.applied".to_string(),
	}
}

fn default_response_keys() -> PhaseKeys {
	PhaseKeys {
		document: "response.content".to_string(),
		payload: "airs.scan.response.payload".to_string(),
		action: "airs.scan.response.action".to_string(),
		redacted: "airs.scan.response.redacted".to_string(),
		masking_applied: "airs.masking.applied".to_string(),
	}
}

impl Default for VariableKeys {
	fn default() -> Self {
		Self {
			correlation_id: default_correlation_id(),
			profile_name: default_profile_name(),
			ai_model: default_ai_model(),
			raw_prompt: default_raw_prompt(),
			prompt: default_prompt_keys(),
			response: default_response_keys(),
		}
	}
}

/// Variables owned by one phase of the exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseKeys {
	/// Serialized request or response body
	pub document: String,
	/// Serialized scan payload written by the builder
	pub payload: String,
	/// Scanner verdict action
	pub action: String,
	/// Scanner redacted text
	pub redacted: String,
	/// Set to "true" once masking has been applied
	pub masking_applied: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PayloadDefaults {
	#[serde(default = "default_profile")]
	pub profile_name: String,

	#[serde(default = "default_model")]
	pub ai_model: String,

	#[serde(default = "default_app_user")]
	pub app_user: String,

	#[serde(default = "default_app_name")]
	pub app_name: String,
}

fn default_profile() -> String {
	"default".to_string()
}

fn default_model() -> String {
	"gemini-2.5-flash".to_string()
}

fn default_app_user() -> String {
	"apigee-user".to_string()
}

fn default_app_name() -> String {
	"vertex-simple".to_string()
}

impl Default for PayloadDefaults {
	fn default() -> Self {
		Self {
			profile_name: default_profile(),
			ai_model: default_model(),
			app_user: default_app_user(),
			app_name: default_app_name(),
		}
	}
}
