use crate::config::{ClusterConfig, KubeVipImage};
use crate::error::ProvisionError;
use crate::setup::utils::command;
use crate::setup::SetupStep;
use std::{fs, path::PathBuf};
use tracing::info;

/// Static pod manifest for the kube-vip control-plane VIP.
pub struct KubeVip {
	image: KubeVipImage,
	vip: String,
	interface: String,
	manifest_path: PathBuf,
}

impl KubeVip {
	pub const MANIFEST_DIR: &str = "/etc/kubernetes/manifests";
	pub const MANIFEST_FILE: &str = "kube-vip.yaml";

	pub fn new(cluster: &ClusterConfig) -> Self {
		KubeVip {
			image: cluster.kube_vip.clone(),
			vip: cluster.vip.to_string(),
			interface: cluster.interface.clone(),
			manifest_path: PathBuf::from(KubeVip::MANIFEST_DIR).join(KubeVip::MANIFEST_FILE),
		}
	}

	fn manifest_args(&self) -> Vec<String> {
		let mount = format!(
			"type=bind,src={dir},dst={dir},options=rbind:rw",
			dir = KubeVip::MANIFEST_DIR
		);
		let image = self.image.reference();
		let args: [&str; 16] = [
			"run",
			"--rm",
			"--net-host",
			"--mount",
			mount.as_str(),
			image.as_str(),
			"kube-vip",
			"manifest",
			"pod",
			"--vip",
			self.vip.as_str(),
			"--interface",
			self.interface.as_str(),
			"--arp",
			"--controlplane",
			"--leaderElection",
		];
		args.iter().map(|arg| (*arg).to_owned()).collect()
	}

	/// A manifest is current when some line is exactly `value: <vip>` and some
	/// line is exactly `image: <reference>`, optionally quoted.
	fn matches(&self, manifest: &str) -> bool {
		let has_entry = |field: &str, expected: &str| {
			manifest.lines().any(|line| {
				line.trim()
					.trim_start_matches("- ")
					.strip_prefix(field)
					.map(|value| value.trim().trim_matches(|c| c == '"' || c == '\''))
					.is_some_and(|value| value == expected)
			})
		};
		has_entry("value:", &self.vip) && has_entry("image:", &self.image.reference())
	}
}

impl SetupStep for KubeVip {
	fn name(&self) -> &'static str {
		"KubeVip"
	}

	fn check(&self) -> Result<bool, ProvisionError> {
		let Ok(manifest) = fs::read_to_string(&self.manifest_path) else {
			info!("kube-vip manifest is missing.");
			return Ok(false);
		};
		let is_current = self.matches(&manifest);
		if !is_current {
			info!("kube-vip manifest does not match VIP {}.", self.vip);
		}
		Ok(is_current)
	}

	fn set(&self) -> Result<(), ProvisionError> {
		info!("Pulling kube-vip container {}.", self.image.reference());
		command::status("ctr", &["image", "pull", &self.image.reference()])?;
		info!("Rendering kube-vip manifest.");
		let args = self.manifest_args();
		let manifest = command::output("ctr", &args.iter().map(String::as_str).collect::<Vec<_>>())?;
		if manifest.is_empty() {
			return Err(ProvisionError::precondition("kube-vip rendered an empty manifest"));
		}
		fs::create_dir_all(KubeVip::MANIFEST_DIR)?;
		fs::write(&self.manifest_path, manifest + "\n")?;
		info!("kube-vip manifest written to {}.", self.manifest_path.display());
		Ok(())
	}
}
