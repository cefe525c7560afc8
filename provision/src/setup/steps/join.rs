use crate::backup;
use crate::config::{ClusterConfig, NodeRole, StoreConfig};
use crate::environment;
use crate::error::ProvisionError;
use crate::join::JoinCommand;
use crate::producer::Kubeadm;
use crate::setup::utils::command;
use crate::setup::SetupStep;
use crate::store;
use std::{cell::Cell, path::Path, process::Command};
use tracing::info;

pub const KUBELET_KUBECONFIG: &str = "/etc/kubernetes/kubelet.conf";

/// Stores fresh join parameters right after `kubeadm init`.
pub struct PublishJoinParameters {
	cluster_id: String,
	store: StoreConfig,
	published: Cell<bool>,
}

impl PublishJoinParameters {
	pub fn new(cluster: &ClusterConfig, store: &StoreConfig) -> Self {
		PublishJoinParameters {
			cluster_id: cluster.cluster_id.clone(),
			store: store.clone(),
			published: Cell::new(false),
		}
	}
}

impl SetupStep for PublishJoinParameters {
	fn name(&self) -> &'static str {
		"PublishJoinParameters"
	}

	// Always republished: stored tokens and certificate keys expire.
	fn check(&self) -> Result<bool, ProvisionError> {
		Ok(self.published.get())
	}

	fn set(&self) -> Result<(), ProvisionError> {
		let store = store::open(&self.store)?;
		backup::run_backup(&Kubeadm::default(), store.as_ref(), &self.cluster_id)?;
		self.published.set(true);
		Ok(())
	}
}

/// Joins this node using the parameters published by the first control plane.
pub struct ClusterJoin {
	cluster_id: String,
	role: NodeRole,
	prefix: String,
	store: StoreConfig,
}

impl ClusterJoin {
	pub fn new(cluster: &ClusterConfig, store: &StoreConfig) -> Self {
		ClusterJoin {
			cluster_id: cluster.cluster_id.clone(),
			role: cluster.role,
			prefix: cluster.env_prefix.clone(),
			store: store.clone(),
		}
	}
}

impl SetupStep for ClusterJoin {
	fn name(&self) -> &'static str {
		"ClusterJoin"
	}

	fn check(&self) -> Result<bool, ProvisionError> {
		let is_joined = Path::new(KUBELET_KUBECONFIG).exists();
		if is_joined {
			info!("This node has already joined a cluster.");
		}
		Ok(is_joined)
	}

	fn set(&self) -> Result<(), ProvisionError> {
		let store = store::open(&self.store)?;
		let env = environment::consume(store.as_ref(), &self.cluster_id, &self.prefix)?;
		let join = JoinCommand::from_environment(&env, &self.prefix, self.role)?;
		info!("Executing join command: {join}");
		let mut cmd = Command::new("kubeadm");
		env.apply(&mut cmd).args(join.args());
		command::status_of(&mut cmd, join.to_string())?;
		info!("This node has joined the cluster as {}.", self.role);
		Ok(())
	}
}
