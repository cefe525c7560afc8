use crate::config::ClusterConfig;
use crate::error::ProvisionError;
use crate::producer::KUBECONFIG;
use crate::setup::utils::command;
use crate::setup::SetupStep;
use std::path::Path;
use tracing::info;

/// `kubeadm init` on the first control-plane node, with certificates uploaded
/// so further control planes can join with a certificate key.
pub struct ControlPlaneInit {
	endpoint: String,
	advertise_address: String,
	pod_cidr: String,
	kubernetes_version: Option<String>,
}

impl ControlPlaneInit {
	pub fn new(cluster: &ClusterConfig) -> Self {
		ControlPlaneInit {
			endpoint: cluster.control_plane_endpoint(),
			advertise_address: cluster.vip.to_string(),
			pod_cidr: cluster.pod_cidr.clone(),
			kubernetes_version: cluster.kubernetes_version.clone(),
		}
	}

	fn init_args(&self) -> Vec<String> {
		let mut args = vec![
			"init".to_owned(),
			"--control-plane-endpoint".to_owned(),
			self.endpoint.clone(),
			"--upload-certs".to_owned(),
			"--pod-network-cidr".to_owned(),
			self.pod_cidr.clone(),
			"--apiserver-cert-extra-sans".to_owned(),
			format!("{},127.0.0.1,localhost", self.advertise_address),
		];
		if let Some(version) = &self.kubernetes_version {
			args.extend(["--kubernetes-version".to_owned(), version.clone()]);
		}
		args
	}
}

impl SetupStep for ControlPlaneInit {
	fn name(&self) -> &'static str {
		"ControlPlaneInit"
	}

	fn check(&self) -> Result<bool, ProvisionError> {
		let is_setup = Path::new(KUBECONFIG).exists();
		if is_setup {
			info!("Control plane is already initialized.");
		} else {
			info!("Control plane is not initialized.");
		}
		Ok(is_setup)
	}

	fn set(&self) -> Result<(), ProvisionError> {
		info!("Kubeadm init against endpoint {}.", self.endpoint);
		let args = self.init_args();
		command::status("kubeadm", &args.iter().map(String::as_str).collect::<Vec<_>>())?;
		info!("Kubeadm initialized.");
		Ok(())
	}
}
