use std::{io, process::ExitStatus};

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
	#[error("Precondition failed: {0}.")]
	Precondition(String),

	#[error("Parameter store {op} failed for '{key}': {source}")]
	Transport {
		op: &'static str,
		key: String,
		#[source]
		source: Box<dyn std::error::Error + Send + Sync>,
	},

	#[error("Missing remote state: no join parameters stored at '{key}'.")]
	NotFound { key: String },

	#[error("Malformed JSON: {0}.")]
	Json(#[from] serde_json::Error),

	#[error("Failed to execute command '{cmd}': {source}")]
	CommandLaunch {
		cmd: String,
		#[source]
		source: io::Error,
	},

	#[error("Command failed: {cmd}{}", .stderr.as_deref().map(|err| format!(" ({err})")).unwrap_or_default())]
	CommandFailed {
		cmd: String,
		status: ExitStatus,
		stderr: Option<String>,
	},

	#[error("Step '{step}' failed after attempt to set it.")]
	StepFailed { step: &'static str },

	#[error("I/O error: {0}.")]
	Io(#[from] io::Error),

	#[error("Invalid configuration: {0}.")]
	Config(String),
}

impl ProvisionError {
	pub fn precondition(msg: impl Into<String>) -> Self {
		ProvisionError::Precondition(msg.into())
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, ProvisionError::NotFound { .. })
	}

	pub fn is_precondition(&self) -> bool {
		matches!(self, ProvisionError::Precondition(_))
	}
}
