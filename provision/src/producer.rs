use crate::error::ProvisionError;
use crate::params::{parse_certificate_key, parse_join_command, JoinParameters};
use crate::setup::utils::command;
use tracing::info;

pub const KUBECONFIG: &str = "/etc/kubernetes/admin.conf";

/// Source of fresh bootstrap credentials on an initialized control plane.
pub trait BootstrapTool {
	/// Registers a new token and returns the printed join command.
	fn print_join_command(&self) -> Result<String, ProvisionError>;
	/// Re-uploads control-plane certificates under a new key and returns the tool output.
	fn upload_certs(&self) -> Result<String, ProvisionError>;
}

#[derive(Debug, Clone)]
pub struct Kubeadm {
	pub kubeconfig: String,
}

impl Default for Kubeadm {
	fn default() -> Self {
		Kubeadm {
			kubeconfig: KUBECONFIG.to_owned(),
		}
	}
}

impl BootstrapTool for Kubeadm {
	fn print_join_command(&self) -> Result<String, ProvisionError> {
		command::output(
			"kubeadm",
			&["token", "create", "--print-join-command", "--kubeconfig", &self.kubeconfig],
		)
	}

	fn upload_certs(&self) -> Result<String, ProvisionError> {
		command::output(
			"kubeadm",
			&["init", "phase", "upload-certs", "--upload-certs", "--kubeconfig", &self.kubeconfig],
		)
	}
}

/// Collects the current join credentials of the local control plane.
pub fn produce(tool: &dyn BootstrapTool) -> Result<JoinParameters, ProvisionError> {
	info!("Requesting a fresh join token.");
	let bundle = parse_join_command(&tool.print_join_command()?)?;
	info!("Requesting a fresh certificate key.");
	let cert_key = parse_certificate_key(&tool.upload_certs()?)?;
	let params = JoinParameters::new(bundle.address, bundle.token, bundle.cert_hash, cert_key)?;
	info!("Join parameters collected for endpoint {}.", params.address);
	Ok(params)
}


#[cfg(test)]
mod tests {
	use super::fake::FakeKubeadm;
	use super::*;

	const HASH: &str = "8cb2de97839780a412b93877f8507ad6c94f73add17d5d7058e91741c9d5ec78";

	#[test]
	fn produces_all_four_fields() {
		let tool = FakeKubeadm::new(
			&format!("kubeadm join 10.0.0.5:6443 --token abcdef.0123456789abcdef --discovery-token-ca-cert-hash sha256:{HASH}"),
			"[upload-certs] Using certificate key:\n4b6c1d2e",
		);
		let params = produce(&tool).unwrap();
		assert_eq!(params.address, "10.0.0.5:6443");
		assert_eq!(params.token, "abcdef.0123456789abcdef");
		assert_eq!(params.cert_hash, HASH);
		assert_eq!(params.cert_key, "4b6c1d2e");
		assert_eq!(tool.calls.get(), 2);
	}

	#[test]
	fn empty_certificate_key_is_fatal() {
		let tool = FakeKubeadm::new(
			&format!("kubeadm join 10.0.0.5:6443 --token abcdef.0123456789abcdef --discovery-token-ca-cert-hash sha256:{HASH}"),
			"",
		);
		assert!(produce(&tool).unwrap_err().is_precondition());
	}
}
