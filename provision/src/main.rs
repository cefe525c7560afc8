use anyhow::{Context, Result};
use clap::{error::ErrorKind, Args, Parser, Subcommand};
use kube_provision::{
	backup::{self, BackupSchedule},
	config::{ClusterConfig, JoinMethod, NodeRole, StoreConfig, StoreCredentials, DEFAULT_ENV_PREFIX},
	environment, logging,
	producer::Kubeadm,
	setup::{self, SetupStep},
	store,
};
use secrecy::SecretString;
use std::{fs, io::Read, path::PathBuf};
use tracing::{error, info};

/// Bootstraps HA kubeadm clusters and exchanges their join parameters.
#[derive(Parser)]
#[command(name = "kube-provision", version)]
struct Cli {
	#[command(flatten)]
	store: StoreArgs,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Args)]
struct StoreArgs {
	/// Bucket holding `{cluster_id}/parameters` objects.
	#[arg(long, global = true, env = "KUBE_PROVISION_BUCKET")]
	bucket: Option<String>,

	#[arg(long, global = true, env = "AWS_REGION")]
	region: Option<String>,

	/// Custom S3-compatible endpoint.
	#[arg(long, global = true, env = "KUBE_PROVISION_S3_ENDPOINT")]
	endpoint_url: Option<String>,

	/// Use a local directory instead of S3.
	#[arg(long, global = true, env = "KUBE_PROVISION_STORE_DIR")]
	store_dir: Option<PathBuf>,

	#[arg(long, global = true, env = "AWS_ACCESS_KEY_ID", requires = "secret_access_key")]
	access_key_id: Option<String>,

	#[arg(long, global = true, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
	secret_access_key: Option<String>,

	#[arg(long, global = true, env = "AWS_SESSION_TOKEN", hide_env_values = true)]
	session_token: Option<String>,
}

impl StoreArgs {
	fn config(&self) -> Result<StoreConfig> {
		if let Some(root) = &self.store_dir {
			return Ok(StoreConfig::Dir { root: root.clone() });
		}
		let bucket = self
			.bucket
			.clone()
			.context("a storage bucket (--bucket or KUBE_PROVISION_BUCKET) or --store-dir is required")?;
		let credentials = match (&self.access_key_id, &self.secret_access_key) {
			(Some(access_key_id), Some(secret)) => Some(StoreCredentials {
				access_key_id: access_key_id.clone(),
				secret_access_key: SecretString::new(secret.clone()),
				session_token: self.session_token.clone().map(SecretString::new),
			}),
			_ => None,
		};
		Ok(StoreConfig::S3 {
			bucket,
			region: self.region.clone(),
			endpoint_url: self.endpoint_url.clone(),
			credentials,
		})
	}
}

#[derive(Subcommand)]
enum Commands {
	/// Provision this node: initialize the cluster or join it.
	Provision {
		#[arg(long)]
		cluster_id: String,

		/// `control-plane` or `worker`.
		#[arg(long)]
		role: NodeRole,

		/// `init` or `join`.
		#[arg(long)]
		method: JoinMethod,

		/// Control-plane virtual IP.
		#[arg(long)]
		vip: String,

		#[arg(long, default_value_t = kube_provision::config::DEFAULT_API_PORT)]
		port: u16,

		#[arg(long, default_value = kube_provision::config::DEFAULT_INTERFACE)]
		interface: String,

		#[arg(long, default_value = kube_provision::config::DEFAULT_POD_CIDR)]
		pod_cidr: String,

		#[arg(long)]
		kubernetes_version: Option<String>,
	},

	/// Publish fresh join parameters for a cluster (run by cron).
	Backup { cluster_id: String },

	/// Fetch a cluster's join parameters and print them as shell exports.
	Fetch {
		cluster_id: String,

		#[arg(long, default_value = DEFAULT_ENV_PREFIX)]
		prefix: String,
	},

	/// Flatten any JSON document into shell exports.
	Flatten {
		/// JSON file, or `-` for stdin.
		#[arg(default_value = "-")]
		input: String,

		#[arg(long, default_value = DEFAULT_ENV_PREFIX)]
		prefix: String,
	},

	/// Install the cron entry and log rotation for recurring backups.
	ScheduleBackup { cluster_id: String },
}

fn read_input(input: &str) -> Result<String> {
	if input == "-" {
		let mut buf = String::new();
		std::io::stdin()
			.read_to_string(&mut buf)
			.context("failed to read JSON from stdin")?;
		Ok(buf)
	} else {
		fs::read_to_string(input).with_context(|| format!("failed to read {input}"))
	}
}

fn run(cli: Cli) -> Result<()> {
	match cli.command {
		Commands::Provision {
			cluster_id,
			role,
			method,
			vip,
			port,
			interface,
			pod_cidr,
			kubernetes_version,
		} => {
			let mut cluster = ClusterConfig::new(&cluster_id, role, method, &vip)?;
			cluster.api_port = port;
			cluster.interface = interface;
			cluster.pod_cidr = pod_cidr;
			cluster.kubernetes_version = kubernetes_version;
			setup::setup(&cluster, &cli.store.config()?)?;
		}
		Commands::Backup { cluster_id } => {
			let store = store::open(&cli.store.config()?)?;
			backup::run_backup(&Kubeadm::default(), store.as_ref(), &cluster_id)
				.with_context(|| format!("backup of join parameters for {cluster_id} failed"))?;
		}
		Commands::Fetch { cluster_id, prefix } => {
			let store = store::open(&cli.store.config()?)?;
			let env = environment::consume(store.as_ref(), &cluster_id, &prefix)?;
			print!("{}", env.to_exports());
		}
		Commands::Flatten { input, prefix } => {
			let env = environment::flatten_str(&read_input(&input)?, &prefix)?;
			print!("{}", env.to_exports());
		}
		Commands::ScheduleBackup { cluster_id } => {
			let schedule = BackupSchedule::new(&cluster_id, &cli.store.config()?);
			setup::run(&[Box::new(schedule) as Box<dyn SetupStep>])?;
		}
	}
	Ok(())
}

/// Help and version requests succeed; every other usage error is a failed precondition.
fn usage_exit_code(kind: ErrorKind) -> i32 {
	match kind {
		ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
		_ => 1,
	}
}

fn main() {
	let cli = match Cli::try_parse() {
		Ok(cli) => cli,
		Err(err) => {
			let _ = err.print();
			std::process::exit(usage_exit_code(err.kind()));
		}
	};
	logging::init();
	if let Err(err) = run(cli) {
		error!("{err:#}");
		std::process::exit(1);
	};
	info!("Done.");
}
