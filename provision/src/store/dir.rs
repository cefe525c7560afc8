use crate::error::ProvisionError;
use crate::params::JoinParameters;
use crate::store::{decode, object_key, ParameterStore};
use std::{
	fs,
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::info;

/// Parameter store backed by a local directory: `<root>/<cluster_id>/parameters`.
#[derive(Debug, Clone)]
pub struct DirStore {
	root: PathBuf,
}

impl DirStore {
	pub fn new(root: impl AsRef<Path>) -> Self {
		DirStore {
			root: root.as_ref().to_path_buf(),
		}
	}

	fn path_for(&self, key: &str) -> PathBuf {
		self.root.join(key)
	}
}

impl ParameterStore for DirStore {
	fn put(&self, cluster_id: &str, params: &JoinParameters) -> Result<(), ProvisionError> {
		let key = object_key(cluster_id)?;
		params.validate()?;
		let body = params.to_json()?;
		let path = self.path_for(&key);
		let parent = path
			.parent()
			.ok_or_else(|| ProvisionError::Config(format!("invalid object path {}", path.display())))?;
		let transport = |source: std::io::Error| ProvisionError::Transport {
			op: "put",
			key: key.clone(),
			source: Box::new(source),
		};
		fs::create_dir_all(parent).map_err(transport)?;
		// NamedTempFile is created 0600, so the stored object stays private.
		let mut tmp = NamedTempFile::new_in(parent).map_err(transport)?;
		tmp.write_all(body.as_bytes()).map_err(transport)?;
		tmp.as_file().sync_all().map_err(transport)?;
		tmp.persist(&path).map_err(|err| transport(err.error))?;
		info!("Stored join parameters at {}.", path.display());
		Ok(())
	}

	fn get(&self, cluster_id: &str) -> Result<JoinParameters, ProvisionError> {
		let key = object_key(cluster_id)?;
		let path = self.path_for(&key);
		let body = match fs::read(&path) {
			Ok(body) => body,
			Err(err) if err.kind() == ErrorKind::NotFound => {
				return Err(ProvisionError::NotFound { key });
			}
			Err(err) => {
				return Err(ProvisionError::Transport {
					op: "get",
					key,
					source: Box::new(err),
				});
			}
		};
		decode(&key, &body)
	}
}
