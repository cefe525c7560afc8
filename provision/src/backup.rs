//! Recurring refresh of the stored join parameters.
//!
//! Tokens and certificate keys have a bounded lifetime, so a cron job re-runs
//! the producer every few hours and overwrites the stored object.

use crate::config::StoreConfig;
use crate::error::ProvisionError;
use crate::params::JoinParameters;
use crate::producer::{produce, BootstrapTool};
use crate::setup::SetupStep;
use crate::store::{object_key, validate_cluster_id, ParameterStore};
use std::{
	fs,
	path::{Path, PathBuf},
};
use tracing::info;

pub const CRON_PATH: &str = "/etc/cron.d/kube-provision-backup";
pub const LOGROTATE_PATH: &str = "/etc/logrotate.d/kube-provision-backup";
pub const LOG_PATH: &str = "/var/log/kube-provision-backup.log";
pub const BINARY_PATH: &str = "/usr/local/bin/kube-provision";
pub const INTERVAL_HOURS: u32 = 6;

/// Produces fresh parameters and stores them, replacing the previous object.
pub fn run_backup(
	tool: &dyn BootstrapTool,
	store: &dyn ParameterStore,
	cluster_id: &str,
) -> Result<JoinParameters, ProvisionError> {
	let key = object_key(cluster_id)?;
	let params = produce(tool)?;
	store.put(cluster_id, &params)?;
	info!("Join parameters backed up to {key}.");
	Ok(params)
}

/// Installs the cron entry and log rotation policy for [`run_backup`].
pub struct BackupSchedule {
	cluster_id: String,
	store_env: Vec<String>,
	binary: String,
	cron_path: PathBuf,
	logrotate_path: PathBuf,
	log_path: PathBuf,
}

impl BackupSchedule {
	pub fn new(cluster_id: &str, store: &StoreConfig) -> Self {
		BackupSchedule {
			cluster_id: cluster_id.to_owned(),
			store_env: store.env_lines(),
			binary: BINARY_PATH.to_owned(),
			cron_path: PathBuf::from(CRON_PATH),
			logrotate_path: PathBuf::from(LOGROTATE_PATH),
			log_path: PathBuf::from(LOG_PATH),
		}
	}

	/// Relocates the installed artifacts under `root`.
	pub fn rooted_at(mut self, root: &Path) -> Self {
		let relocate = |path: &Path| root.join(path.strip_prefix("/").unwrap_or(path));
		self.cron_path = relocate(&self.cron_path);
		self.logrotate_path = relocate(&self.logrotate_path);
		self.log_path = relocate(&self.log_path);
		self
	}

	pub fn with_binary(mut self, binary: &str) -> Self {
		self.binary = binary.to_owned();
		self
	}

	pub fn cron_entry(&self) -> String {
		let mut lines = vec!["SHELL=/bin/sh".to_owned()];
		lines.extend(self.store_env.iter().cloned());
		lines.push(format!(
			"0 */{INTERVAL_HOURS} * * * root {} backup {} >> {} 2>&1",
			self.binary,
			self.cluster_id,
			self.log_path.display()
		));
		lines.join("\n") + "\n"
	}

	pub fn logrotate_policy(&self) -> String {
		format!(
			"{} {{\n\tweekly\n\trotate 4\n\tcompress\n\tmissingok\n\tnotifempty\n}}\n",
			self.log_path.display()
		)
	}

	/// Everything interpolated into the cron line must stay one shell word on one line.
	fn validate(&self) -> Result<(), ProvisionError> {
		validate_cluster_id(&self.cluster_id)?;
		if let Some(line) = self.store_env.iter().find(|line| line.chars().any(char::is_control)) {
			return Err(ProvisionError::Config(format!(
				"store setting {line:?} contains control characters"
			)));
		}
		let log_path = self.log_path.display().to_string();
		for word in [self.binary.as_str(), log_path.as_str()] {
			if word.is_empty() || word.chars().any(|c| c.is_whitespace() || c.is_control() || c == '%') {
				return Err(ProvisionError::Config(format!("{word:?} is not usable in a cron entry")));
			}
		}
		Ok(())
	}

	fn is_installed(path: &Path, expected: &str) -> bool {
		fs::read_to_string(path).is_ok_and(|current| current == expected)
	}
}

impl SetupStep for BackupSchedule {
	fn name(&self) -> &'static str {
		"BackupSchedule"
	}

	fn check(&self) -> Result<bool, ProvisionError> {
		self.validate()?;
		let is_setup = BackupSchedule::is_installed(&self.cron_path, &self.cron_entry())
			&& BackupSchedule::is_installed(&self.logrotate_path, &self.logrotate_policy());
		if is_setup {
			info!("Join parameter backup is scheduled.");
		} else {
			info!("Join parameter backup is not scheduled.");
		}
		Ok(is_setup)
	}

	fn set(&self) -> Result<(), ProvisionError> {
		self.validate()?;
		for (path, content) in [
			(&self.cron_path, self.cron_entry()),
			(&self.logrotate_path, self.logrotate_policy()),
		] {
			if let Some(parent) = path.parent() {
				fs::create_dir_all(parent)?;
			}
			fs::write(path, content)?;
			info!("Wrote {}.", path.display());
		}
		Ok(())
	}
}
