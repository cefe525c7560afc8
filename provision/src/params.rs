//! Join parameters exchanged between the initializing control plane and
//! joining nodes, plus extraction of their values from kubeadm output.

use crate::error::ProvisionError;
use serde::{Deserialize, Serialize};

/// Credentials a node needs to join the cluster.
///
/// Serialized as a JSON object with exactly these four string fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinParameters {
	pub address: String,
	pub token: String,
	pub cert_hash: String,
	pub cert_key: String,
}

impl JoinParameters {
	pub fn new(
		address: impl Into<String>,
		token: impl Into<String>,
		cert_hash: impl Into<String>,
		cert_key: impl Into<String>,
	) -> Result<Self, ProvisionError> {
		let params = JoinParameters {
			address: address.into(),
			token: token.into(),
			cert_hash: cert_hash.into(),
			cert_key: cert_key.into(),
		};
		params.validate()?;
		Ok(params)
	}

	/// Every field must be non-empty before the object may be persisted.
	pub fn validate(&self) -> Result<(), ProvisionError> {
		let fields = [
			("address", &self.address),
			("token", &self.token),
			("cert_hash", &self.cert_hash),
			("cert_key", &self.cert_key),
		];
		let empty = fields
			.iter()
			.filter(|(_, value)| value.trim().is_empty())
			.map(|(name, _)| *name)
			.collect::<Vec<_>>();
		if !empty.is_empty() {
			return Err(ProvisionError::precondition(format!(
				"join parameters have empty field(s): {}",
				empty.join(", ")
			)));
		}
		Ok(())
	}

	pub fn to_json(&self) -> Result<String, ProvisionError> {
		Ok(serde_json::to_string(self)?)
	}

	pub fn from_json(json: &str) -> Result<Self, ProvisionError> {
		Ok(serde_json::from_str(json)?)
	}
}

/// Endpoint, token and CA hash as printed by
/// `kubeadm token create --print-join-command`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinBundle {
	pub address: String,
	pub token: String,
	pub cert_hash: String,
}

pub const CERT_HASH_ALGORITHM: &str = "sha256:";

/// Parses `kubeadm join <address> --token <token> --discovery-token-ca-cert-hash sha256:<hash> ...`.
pub fn parse_join_command(output: &str) -> Result<JoinBundle, ProvisionError> {
	let words = output
		.split_whitespace()
		.filter(|word| *word != "\\")
		.collect::<Vec<_>>();
	let join_at = words
		.windows(2)
		.position(|pair| pair[0].ends_with("kubeadm") && pair[1] == "join")
		.ok_or_else(|| {
			ProvisionError::precondition(format!("no kubeadm join command found in {output:?}"))
		})?;
	let args = &words[join_at + 2..];
	let address = args
		.first()
		.filter(|arg| !arg.starts_with("--"))
		.map(|arg| (*arg).to_owned())
		.unwrap_or_default();
	let flag_value = |flag: &str| -> String {
		args.iter()
			.enumerate()
			.find_map(|(idx, arg)| {
				if *arg == flag {
					args.get(idx + 1).map(|value| (*value).to_owned())
				} else {
					arg.strip_prefix(flag)
						.and_then(|rest| rest.strip_prefix('='))
						.map(str::to_owned)
				}
			})
			.unwrap_or_default()
	};
	let token = flag_value("--token");
	let raw_hash = flag_value("--discovery-token-ca-cert-hash");
	let cert_hash = raw_hash
		.strip_prefix(CERT_HASH_ALGORITHM)
		.unwrap_or(&raw_hash)
		.to_owned();
	if address.is_empty() || token.is_empty() || cert_hash.is_empty() {
		return Err(ProvisionError::precondition(
			"kubeadm join command is missing the endpoint, token or CA cert hash",
		));
	}
	Ok(JoinBundle {
		address,
		token,
		cert_hash,
	})
}

/// The certificate key is the last line of `kubeadm init phase upload-certs --upload-certs`.
pub fn parse_certificate_key(output: &str) -> Result<String, ProvisionError> {
	output
		.lines()
		.map(str::trim)
		.rfind(|line| !line.is_empty())
		.map(str::to_owned)
		.ok_or_else(|| ProvisionError::precondition("kubeadm returned an empty certificate key"))
}

#[cfg(test)]
mod tests {
	use super::*;

	const HASH: &str = "8cb2de97839780a412b93877f8507ad6c94f73add17d5d7058e91741c9d5ec78";

	#[test]
	fn parses_print_join_command_output() {
		let output = format!(
			"kubeadm join 10.0.0.5:6443 --token abcdef.0123456789abcdef --discovery-token-ca-cert-hash sha256:{HASH} \n"
		);
		let bundle = parse_join_command(&output).unwrap();
		assert_eq!(bundle.address, "10.0.0.5:6443");
		assert_eq!(bundle.token, "abcdef.0123456789abcdef");
		assert_eq!(bundle.cert_hash, HASH);
	}

	#[test]
	fn parses_continued_lines_and_equals_flags() {
		let output = format!(
			"You can join with:\n\n  kubeadm join vip.local:6443 \\\n\t--token=abcdef.0123456789abcdef \\\n\t--discovery-token-ca-cert-hash=sha256:{HASH}\n"
		);
		let bundle = parse_join_command(&output).unwrap();
		assert_eq!(bundle.address, "vip.local:6443");
		assert_eq!(bundle.token, "abcdef.0123456789abcdef");
		assert_eq!(bundle.cert_hash, HASH);
	}

	#[test]
	fn rejects_join_command_without_token() {
		let output = format!("kubeadm join 10.0.0.5:6443 --discovery-token-ca-cert-hash sha256:{HASH}");
		assert!(parse_join_command(&output).unwrap_err().is_precondition());
		assert!(parse_join_command("").unwrap_err().is_precondition());
	}

	#[test]
	fn certificate_key_is_last_non_empty_line() {
		let output = "[upload-certs] Storing the certificates in Secret\n[upload-certs] Using certificate key:\nf2a0f7b5c1\n\n";
		assert_eq!(parse_certificate_key(output).unwrap(), "f2a0f7b5c1");
		assert!(parse_certificate_key(" \n").unwrap_err().is_precondition());
	}

	#[test]
	fn empty_fields_are_rejected() {
		let err = JoinParameters::new("10.0.0.5:6443", "abcdef.0123456789abcdef", "", " ").unwrap_err();
		assert!(err.is_precondition());
		assert!(err.to_string().contains("cert_hash, cert_key"));
	}

	#[test]
	fn json_shape_is_exactly_four_fields() {
		let params = JoinParameters::new("a", "b", "c", "d").unwrap();
		assert_eq!(
			params.to_json().unwrap(),
			r#"{"address":"a","token":"b","cert_hash":"c","cert_key":"d"}"#
		);
		assert!(JoinParameters::from_json(r#"{"address":"a","token":"b","cert_hash":"c"}"#).is_err());
		assert!(
			JoinParameters::from_json(
				r#"{"address":"a","token":"b","cert_hash":"c","cert_key":"d","version":1}"#
			)
			.is_err()
		);
	}
}
