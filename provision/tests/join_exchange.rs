use kube_provision::{
	backup::run_backup,
	config::NodeRole,
	environment::{consume, flatten_params},
	join::JoinCommand,
	producer::BootstrapTool,
	store::{DirStore, ParameterStore},
	JoinParameters, ProvisionError,
};

const CERT_HASH: &str = "8cb2de97839780a412b93877f8507ad6c94f73add17d5d7058e91741c9d5ec78";
const CERT_KEY: &str = "f6e0d3c1b2a4958677889900aabbccddeeff00112233445566778899aabbccdd";

struct CannedKubeadm;

impl BootstrapTool for CannedKubeadm {
	fn print_join_command(&self) -> Result<String, ProvisionError> {
		Ok(format!(
			"kubeadm join 10.0.0.5:6443 --token abcdef.0123456789abcdef --discovery-token-ca-cert-hash sha256:{CERT_HASH} "
		))
	}

	fn upload_certs(&self) -> Result<String, ProvisionError> {
		Ok(format!("[upload-certs] Using certificate key:\n{CERT_KEY}\n"))
	}
}

fn expected() -> JoinParameters {
	JoinParameters::new("10.0.0.5:6443", "abcdef.0123456789abcdef", CERT_HASH, CERT_KEY).unwrap()
}

#[test]
fn stored_parameters_flatten_into_join_variables() {
	let dir = tempfile::tempdir().unwrap();
	let store = DirStore::new(dir.path());
	let params = expected();
	store.put("prod-1", &params).unwrap();
	assert_eq!(store.get("prod-1").unwrap(), params);

	let env = consume(&store, "prod-1", "KUBE_PROVISION").unwrap();
	assert_eq!(
		env.iter().collect::<Vec<_>>(),
		vec![
			("KUBE_PROVISION_ADDRESS", "10.0.0.5:6443"),
			("KUBE_PROVISION_TOKEN", "abcdef.0123456789abcdef"),
			("KUBE_PROVISION_CERT_HASH", CERT_HASH),
			("KUBE_PROVISION_CERT_KEY", CERT_KEY),
		]
	);
	assert_eq!(env, flatten_params(&params, "KUBE_PROVISION").unwrap());
}

#[test]
fn backup_then_control_plane_join() {
	let dir = tempfile::tempdir().unwrap();
	let store = DirStore::new(dir.path());
	let published = run_backup(&CannedKubeadm, &store, "prod-1").unwrap();
	assert_eq!(published, expected());

	let env = consume(&store, "prod-1", "KUBE_PROVISION").unwrap();
	let join = JoinCommand::from_environment(&env, "KUBE_PROVISION", NodeRole::ControlPlane).unwrap();
	assert_eq!(
		join.args(),
		vec![
			"join".to_owned(),
			"10.0.0.5:6443".to_owned(),
			"--token".to_owned(),
			"abcdef.0123456789abcdef".to_owned(),
			"--discovery-token-ca-cert-hash".to_owned(),
			format!("sha256:{CERT_HASH}"),
			"--control-plane".to_owned(),
			"--certificate-key".to_owned(),
			CERT_KEY.to_owned(),
		]
	);
}

#[test]
fn clusters_are_isolated_and_missing_state_is_reported() {
	let dir = tempfile::tempdir().unwrap();
	let store = DirStore::new(dir.path());
	store.put("prod-1", &expected()).unwrap();
	let err = consume(&store, "prod-2", "KUBE_PROVISION").unwrap_err();
	assert!(err.is_not_found());
	assert!(err.to_string().contains("prod-2/parameters"));
}

#[test]
fn tampered_object_is_rejected() {
	let dir = tempfile::tempdir().unwrap();
	let store = DirStore::new(dir.path());
	std::fs::create_dir_all(dir.path().join("prod-1")).unwrap();
	std::fs::write(
		dir.path().join("prod-1/parameters"),
		r#"{"address":"10.0.0.5:6443","token":"","cert_hash":"x","cert_key":"y"}"#,
	)
	.unwrap();
	assert!(store.get("prod-1").unwrap_err().is_precondition());
}
