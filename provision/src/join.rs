use crate::config::NodeRole;
use crate::environment::{variable_name, FlattenedEnvironment};
use crate::error::ProvisionError;
use crate::params::CERT_HASH_ALGORITHM;
use std::fmt;

/// A `kubeadm join` invocation assembled from flattened join variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinCommand {
	pub address: String,
	pub token: String,
	pub cert_hash: String,
	pub cert_key: Option<String>,
}

fn required(env: &FlattenedEnvironment, prefix: &str, field: &str) -> Result<String, ProvisionError> {
	let name = variable_name(prefix, &[field.to_owned()]);
	match env.get(&name) {
		Some(value) if !value.trim().is_empty() => Ok(value.to_owned()),
		_ => Err(ProvisionError::precondition(format!("join variable {name} is missing or empty"))),
	}
}

impl JoinCommand {
	pub fn from_environment(
		env: &FlattenedEnvironment,
		prefix: &str,
		role: NodeRole,
	) -> Result<Self, ProvisionError> {
		let cert_key = match role {
			NodeRole::ControlPlane => Some(required(env, prefix, "cert_key")?),
			NodeRole::Worker => None,
		};
		Ok(JoinCommand {
			address: required(env, prefix, "address")?,
			token: required(env, prefix, "token")?,
			cert_hash: required(env, prefix, "cert_hash")?,
			cert_key,
		})
	}

	fn discovery_hash(&self) -> String {
		if self.cert_hash.starts_with(CERT_HASH_ALGORITHM) {
			self.cert_hash.clone()
		} else {
			format!("{CERT_HASH_ALGORITHM}{}", self.cert_hash)
		}
	}

	/// Arguments following `kubeadm`.
	pub fn args(&self) -> Vec<String> {
		let mut args = vec![
			"join".to_owned(),
			self.address.clone(),
			"--token".to_owned(),
			self.token.clone(),
			"--discovery-token-ca-cert-hash".to_owned(),
			self.discovery_hash(),
		];
		if let Some(cert_key) = &self.cert_key {
			args.extend(["--control-plane".to_owned(), "--certificate-key".to_owned(), cert_key.clone()]);
		}
		args
	}
}

// Token and certificate key are masked; this is what reaches the logs.
impl fmt::Display for JoinCommand {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"kubeadm join {} --token <redacted> --discovery-token-ca-cert-hash {}",
			self.address,
			self.discovery_hash()
		)?;
		if self.cert_key.is_some() {
			f.write_str(" --control-plane --certificate-key <redacted>")?;
		}
		Ok(())
	}
}
