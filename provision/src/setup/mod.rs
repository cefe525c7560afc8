pub mod steps;
pub mod utils;

use crate::backup::BackupSchedule;
use crate::config::{ClusterConfig, JoinMethod, NodeRole, StoreConfig};
use crate::error::ProvisionError;
use crate::setup::steps::{ClusterJoin, ControlPlaneInit, KubeVip, PublishJoinParameters};
use tracing::info;

pub trait SetupStep {
	fn name(&self) -> &'static str;
	fn check(&self) -> Result<bool, ProvisionError>;
	fn set(&self) -> Result<(), ProvisionError>;
}

/// Steps for this node's role and method, in execution order.
pub fn plan(cluster: &ClusterConfig, store: &StoreConfig) -> Vec<Box<dyn SetupStep>> {
	let mut steps: Vec<Box<dyn SetupStep>> = Vec::new();
	if cluster.role == NodeRole::ControlPlane {
		steps.push(Box::new(KubeVip::new(cluster)));
	}
	match cluster.method {
		JoinMethod::Init => {
			steps.push(Box::new(ControlPlaneInit::new(cluster)));
			steps.push(Box::new(PublishJoinParameters::new(cluster, store)));
			steps.push(Box::new(BackupSchedule::new(&cluster.cluster_id, store)));
		}
		JoinMethod::Join => {
			steps.push(Box::new(ClusterJoin::new(cluster, store)));
		}
	}
	steps
}

pub fn run(steps: &[Box<dyn SetupStep>]) -> Result<(), ProvisionError> {
	for step in steps {
		if step.check()? {
			info!("Step {} already satisfied.", step.name());
			continue;
		}
		info!("Step {} started.", step.name());
		step.set()?;
		if !step.check()? {
			return Err(ProvisionError::StepFailed { step: step.name() });
		}
		info!("Step {} finished.", step.name());
	}
	Ok(())
}

pub fn setup(cluster: &ClusterConfig, store: &StoreConfig) -> Result<(), ProvisionError> {
	cluster.validate()?;
	store.validate()?;
	info!(
		"Provisioning {} node for cluster {} ({}).",
		cluster.role, cluster.cluster_id, cluster.method
	);
	run(&plan(cluster, store))?;
	info!("Provisioning finished.");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::cell::Cell;

	struct Flaky {
		done: Cell<bool>,
		sticks: bool,
	}

	impl SetupStep for Flaky {
		fn name(&self) -> &'static str {
			"Flaky"
		}

		fn check(&self) -> Result<bool, ProvisionError> {
			Ok(self.done.get())
		}

		fn set(&self) -> Result<(), ProvisionError> {
			self.done.set(self.sticks);
			Ok(())
		}
	}

	#[test]
	fn runner_rechecks_after_set() {
		let ok: Vec<Box<dyn SetupStep>> = vec![Box::new(Flaky {
			done: Cell::new(false),
			sticks: true,
		})];
		run(&ok).unwrap();
		let broken: Vec<Box<dyn SetupStep>> = vec![Box::new(Flaky {
			done: Cell::new(false),
			sticks: false,
		})];
		assert!(matches!(run(&broken), Err(ProvisionError::StepFailed { step: "Flaky" })));
	}

	#[test]
	fn plans_follow_role_and_method() {
		let store = StoreConfig::s3("bucket");
		let names = |cluster: &ClusterConfig| {
			plan(cluster, &store).iter().map(|step| step.name()).collect::<Vec<_>>()
		};
		let init = ClusterConfig::new("prod-1", NodeRole::ControlPlane, JoinMethod::Init, "10.0.0.5").unwrap();
		assert_eq!(
			names(&init),
			vec!["KubeVip", "ControlPlaneInit", "PublishJoinParameters", "BackupSchedule"]
		);
		let cp_join = ClusterConfig::new("prod-1", NodeRole::ControlPlane, JoinMethod::Join, "10.0.0.5").unwrap();
		assert_eq!(names(&cp_join), vec!["KubeVip", "ClusterJoin"]);
		let worker = ClusterConfig::new("prod-1", NodeRole::Worker, JoinMethod::Join, "10.0.0.5").unwrap();
		assert_eq!(names(&worker), vec!["ClusterJoin"]);
	}
}
