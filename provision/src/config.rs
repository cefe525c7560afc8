use crate::error::ProvisionError;
use crate::store::validate_cluster_id;
use secrecy::SecretString;
use std::{fmt, net::IpAddr, path::PathBuf, str::FromStr};

pub const DEFAULT_ENV_PREFIX: &str = "KUBE_PROVISION";
pub const DEFAULT_API_PORT: u16 = 6443;
pub const DEFAULT_INTERFACE: &str = "eth0";
pub const DEFAULT_POD_CIDR: &str = "10.244.0.0/16";

/// Static blob store credentials. When absent the AWS default provider chain applies.
#[derive(Debug, Clone)]
pub struct StoreCredentials {
	pub access_key_id: String,
	pub secret_access_key: SecretString,
	pub session_token: Option<SecretString>,
}

/// Where join parameters live.
#[derive(Debug, Clone)]
pub enum StoreConfig {
	S3 {
		bucket: String,
		region: Option<String>,
		endpoint_url: Option<String>,
		credentials: Option<StoreCredentials>,
	},
	Dir { root: PathBuf },
}

impl StoreConfig {
	pub fn s3(bucket: impl Into<String>) -> Self {
		StoreConfig::S3 {
			bucket: bucket.into(),
			region: None,
			endpoint_url: None,
			credentials: None,
		}
	}

	pub fn validate(&self) -> Result<(), ProvisionError> {
		match self {
			StoreConfig::S3 { bucket, .. } if bucket.trim().is_empty() => {
				return Err(ProvisionError::Config("storage bucket name must not be empty".to_owned()));
			}
			StoreConfig::Dir { root } if root.as_os_str().is_empty() => {
				return Err(ProvisionError::Config("store directory must not be empty".to_owned()));
			}
			_ => {}
		}
		// Values end up on single lines of the backup cron file.
		if let Some(line) = self.env_lines().iter().find(|line| line.chars().any(char::is_control)) {
			return Err(ProvisionError::Config(format!(
				"store setting {line:?} contains control characters"
			)));
		}
		Ok(())
	}

	/// Environment lines a scheduled job needs to reach the same store.
	pub fn env_lines(&self) -> Vec<String> {
		match self {
			StoreConfig::S3 {
				bucket,
				region,
				endpoint_url,
				..
			} => {
				let mut lines = vec![format!("KUBE_PROVISION_BUCKET={bucket}")];
				if let Some(region) = region {
					lines.push(format!("AWS_REGION={region}"));
				}
				if let Some(endpoint) = endpoint_url {
					lines.push(format!("KUBE_PROVISION_S3_ENDPOINT={endpoint}"));
				}
				lines
			}
			StoreConfig::Dir { root } => {
				vec![format!("KUBE_PROVISION_STORE_DIR={}", root.display())]
			}
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
	ControlPlane,
	Worker,
}

impl FromStr for NodeRole {
	type Err = ProvisionError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"control-plane" | "controlplane" | "master" => Ok(NodeRole::ControlPlane),
			"worker" | "node" => Ok(NodeRole::Worker),
			other => Err(ProvisionError::Config(format!("unknown node role '{other}'"))),
		}
	}
}

impl fmt::Display for NodeRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			NodeRole::ControlPlane => f.write_str("control-plane"),
			NodeRole::Worker => f.write_str("worker"),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMethod {
	Init,
	Join,
}

impl FromStr for JoinMethod {
	type Err = ProvisionError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"init" => Ok(JoinMethod::Init),
			"join" => Ok(JoinMethod::Join),
			other => Err(ProvisionError::Config(format!("unknown method '{other}'"))),
		}
	}
}

impl fmt::Display for JoinMethod {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			JoinMethod::Init => f.write_str("init"),
			JoinMethod::Join => f.write_str("join"),
		}
	}
}

#[derive(Debug, Clone)]
pub struct KubeVipImage {
	pub repository: String,
	pub version: String,
}

impl Default for KubeVipImage {
	fn default() -> Self {
		KubeVipImage {
			repository: "ghcr.io/kube-vip/kube-vip".to_owned(),
			version: "v1.0.2".to_owned(),
		}
	}
}

impl KubeVipImage {
	pub fn reference(&self) -> String {
		format!("{}:{}", self.repository, self.version)
	}
}

/// Everything `provision` needs to bring one node into the cluster.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
	pub cluster_id: String,
	pub role: NodeRole,
	pub method: JoinMethod,
	pub vip: IpAddr,
	pub api_port: u16,
	pub interface: String,
	pub pod_cidr: String,
	pub kubernetes_version: Option<String>,
	pub kube_vip: KubeVipImage,
	pub env_prefix: String,
}

impl ClusterConfig {
	pub fn new(cluster_id: &str, role: NodeRole, method: JoinMethod, vip: &str) -> Result<Self, ProvisionError> {
		let vip = vip
			.parse::<IpAddr>()
			.map_err(|err| ProvisionError::Config(format!("invalid VIP address '{vip}': {err}")))?;
		let config = ClusterConfig {
			cluster_id: cluster_id.to_owned(),
			role,
			method,
			vip,
			api_port: DEFAULT_API_PORT,
			interface: DEFAULT_INTERFACE.to_owned(),
			pod_cidr: DEFAULT_POD_CIDR.to_owned(),
			kubernetes_version: None,
			kube_vip: KubeVipImage::default(),
			env_prefix: DEFAULT_ENV_PREFIX.to_owned(),
		};
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<(), ProvisionError> {
		validate_cluster_id(&self.cluster_id)?;
		if self.method == JoinMethod::Init && self.role != NodeRole::ControlPlane {
			return Err(ProvisionError::Config(
				"only a control-plane node can initialize the cluster".to_owned(),
			));
		}
		if self.api_port == 0 {
			return Err(ProvisionError::Config("API port must be non-zero".to_owned()));
		}
		Ok(())
	}

	pub fn control_plane_endpoint(&self) -> String {
		match self.vip {
			IpAddr::V4(ip) => format!("{ip}:{}", self.api_port),
			IpAddr::V6(ip) => format!("[{ip}]:{}", self.api_port),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn worker_cannot_init() {
		let err = ClusterConfig::new("prod-1", NodeRole::Worker, JoinMethod::Init, "10.0.0.5").unwrap_err();
		assert!(matches!(err, ProvisionError::Config(_)));
	}

	#[test]
	fn vip_must_be_an_ip() {
		assert!(ClusterConfig::new("prod-1", NodeRole::ControlPlane, JoinMethod::Init, "vip.local").is_err());
	}

	#[test]
	fn endpoint_brackets_ipv6() {
		let v4 = ClusterConfig::new("prod-1", NodeRole::ControlPlane, JoinMethod::Init, "10.0.0.5").unwrap();
		assert_eq!(v4.control_plane_endpoint(), "10.0.0.5:6443");
		let v6 = ClusterConfig::new("prod-1", NodeRole::Worker, JoinMethod::Join, "fd00::5").unwrap();
		assert_eq!(v6.control_plane_endpoint(), "[fd00::5]:6443");
	}

	#[test]
	fn roles_and_methods_parse() {
		assert_eq!("control-plane".parse::<NodeRole>().unwrap(), NodeRole::ControlPlane);
		assert_eq!("Worker".parse::<NodeRole>().unwrap(), NodeRole::Worker);
		assert_eq!("join".parse::<JoinMethod>().unwrap(), JoinMethod::Join);
		assert!("restore".parse::<JoinMethod>().is_err());
	}

	#[test]
	fn scheduled_job_env_for_s3() {
		let store = StoreConfig::S3 {
			bucket: "cluster-params".to_owned(),
			region: Some("eu-west-1".to_owned()),
			endpoint_url: None,
			credentials: None,
		};
		assert_eq!(
			store.env_lines(),
			vec!["KUBE_PROVISION_BUCKET=cluster-params", "AWS_REGION=eu-west-1"]
		);
		assert!(StoreConfig::s3(" ").validate().is_err());
	}

	#[test]
	fn store_settings_stay_on_one_line() {
		assert!(StoreConfig::s3("params\n* * * * * root rm -rf /").validate().is_err());
		let store = StoreConfig::S3 {
			bucket: "params".to_owned(),
			region: None,
			endpoint_url: Some("http://minio:9000\r".to_owned()),
			credentials: None,
		};
		assert!(matches!(store.validate(), Err(ProvisionError::Config(_))));
		assert!(StoreConfig::s3("params").validate().is_ok());
	}

	#[test]
	fn cluster_id_must_be_a_plain_name() {
		let err = ClusterConfig::new("prod 1", NodeRole::ControlPlane, JoinMethod::Init, "10.0.0.5").unwrap_err();
		assert!(err.is_precondition());
	}
}
