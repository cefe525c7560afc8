//! Durable put/get of join parameters keyed by cluster identifier.
//!
//! Writes are last-writer-wins: a `put` replaces whatever object is stored
//! under the key, with no versioning and no merge.

mod dir;
mod s3;

pub use dir::DirStore;
pub use s3::S3Store;

use crate::config::StoreConfig;
use crate::error::ProvisionError;
use crate::params::JoinParameters;

pub const OBJECT_NAME: &str = "parameters";

/// Cluster ids are plain names: ASCII alphanumerics, `-`, `_` and `.`, never
/// `.` or `..`, so a key can neither leave the store root nor split a command line.
pub fn validate_cluster_id(cluster_id: &str) -> Result<(), ProvisionError> {
	if cluster_id.is_empty() {
		return Err(ProvisionError::precondition("cluster identifier must not be empty"));
	}
	if cluster_id == "." || cluster_id == ".." {
		return Err(ProvisionError::precondition(format!(
			"cluster identifier {cluster_id:?} is not a valid storage key"
		)));
	}
	if let Some(bad) = cluster_id
		.chars()
		.find(|&c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
	{
		return Err(ProvisionError::precondition(format!(
			"cluster identifier {cluster_id:?} contains {bad:?}; only [A-Za-z0-9._-] are allowed"
		)));
	}
	Ok(())
}

pub fn object_key(cluster_id: &str) -> Result<String, ProvisionError> {
	validate_cluster_id(cluster_id)?;
	Ok(format!("{cluster_id}/{OBJECT_NAME}"))
}

pub trait ParameterStore {
	/// Validates, serializes and stores `params`, replacing any existing object.
	fn put(&self, cluster_id: &str, params: &JoinParameters) -> Result<(), ProvisionError>;

	/// Fetches the stored parameters; a missing or empty object is `NotFound`.
	fn get(&self, cluster_id: &str) -> Result<JoinParameters, ProvisionError>;
}

/// Decodes a fetched object body, treating empty content as missing state.
pub(crate) fn decode(key: &str, body: &[u8]) -> Result<JoinParameters, ProvisionError> {
	if body.iter().all(u8::is_ascii_whitespace) {
		return Err(ProvisionError::NotFound { key: key.to_owned() });
	}
	let params = serde_json::from_slice::<JoinParameters>(body)?;
	params.validate()?;
	Ok(params)
}

pub fn open(config: &StoreConfig) -> Result<Box<dyn ParameterStore>, ProvisionError> {
	config.validate()?;
	match config {
		StoreConfig::S3 { .. } => Ok(Box::new(S3Store::new(config)?)),
		StoreConfig::Dir { root } => Ok(Box::new(DirStore::new(root))),
	}
}
