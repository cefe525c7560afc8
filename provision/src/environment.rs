//! Flattening of a JSON document into environment variable bindings.
//!
//! Every scalar leaf becomes one variable named after the prefix and the
//! path of keys and indices leading to it, e.g. `{"a": {"b": "x"}}` with
//! prefix `P` yields `P_A_B=x`.

use crate::error::ProvisionError;
use crate::params::JoinParameters;
use crate::store::ParameterStore;
use serde_json::Value;
use shell_escape::unix::escape;
use std::{borrow::Cow, process::Command};
use tracing::info;

/// Ordered name to value bindings, in document order of the source JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenedEnvironment {
	vars: Vec<(String, String)>,
}

impl FlattenedEnvironment {
	pub fn get(&self, name: &str) -> Option<&str> {
		self.vars
			.iter()
			.rev()
			.find(|(key, _)| key == name)
			.map(|(_, value)| value.as_str())
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.vars.iter().map(|(key, value)| (key.as_str(), value.as_str()))
	}

	pub fn len(&self) -> usize {
		self.vars.len()
	}

	pub fn is_empty(&self) -> bool {
		self.vars.is_empty()
	}

	/// `export NAME=value` lines with shell-escaped values, suitable for `eval`.
	pub fn to_exports(&self) -> String {
		self.vars
			.iter()
			.map(|(key, value)| format!("export {key}={}\n", escape(Cow::Borrowed(value.as_str()))))
			.collect()
	}

	/// Binds every variable into the environment of a child process.
	pub fn apply<'a>(&self, cmd: &'a mut Command) -> &'a mut Command {
		cmd.envs(self.iter())
	}
}

/// Derives a variable name: prefix and path joined, uppercased, non-alphanumerics as `_`.
pub fn variable_name(prefix: &str, path: &[String]) -> String {
	let joined = std::iter::once(prefix)
		.filter(|prefix| !prefix.is_empty())
		.chain(path.iter().map(String::as_str))
		.collect::<Vec<_>>()
		.join(".");
	joined
		.chars()
		.map(|c| {
			if c.is_ascii_alphanumeric() {
				c.to_ascii_uppercase()
			} else {
				'_'
			}
		})
		.collect()
}

fn scalar_text(value: &Value) -> Option<String> {
	match value {
		Value::Null => Some(String::new()),
		Value::Bool(b) => Some(b.to_string()),
		Value::Number(n) => Some(n.to_string()),
		Value::String(s) => Some(s.clone()),
		Value::Array(_) | Value::Object(_) => None,
	}
}

fn walk(value: &Value, prefix: &str, path: &mut Vec<String>, out: &mut Vec<(String, String)>) {
	match value {
		Value::Object(map) => {
			for (key, child) in map {
				path.push(key.clone());
				walk(child, prefix, path, out);
				path.pop();
			}
		}
		Value::Array(items) => {
			for (idx, child) in items.iter().enumerate() {
				path.push(idx.to_string());
				walk(child, prefix, path, out);
				path.pop();
			}
		}
		scalar => {
			if let Some(text) = scalar_text(scalar) {
				out.push((variable_name(prefix, path), text));
			}
		}
	}
}

pub fn flatten(value: &Value, prefix: &str) -> FlattenedEnvironment {
	let mut vars = Vec::new();
	walk(value, prefix, &mut Vec::new(), &mut vars);
	FlattenedEnvironment { vars }
}

/// Parses then flattens; a parse error yields no bindings at all.
pub fn flatten_str(json: &str, prefix: &str) -> Result<FlattenedEnvironment, ProvisionError> {
	let value = serde_json::from_str::<Value>(json)?;
	Ok(flatten(&value, prefix))
}

pub fn flatten_params(params: &JoinParameters, prefix: &str) -> Result<FlattenedEnvironment, ProvisionError> {
	Ok(flatten(&serde_json::to_value(params)?, prefix))
}

/// Fetches a cluster's join parameters and flattens them under `prefix`.
pub fn consume(
	store: &dyn ParameterStore,
	cluster_id: &str,
	prefix: &str,
) -> Result<FlattenedEnvironment, ProvisionError> {
	let params = store.get(cluster_id)?;
	let env = flatten_params(&params, prefix)?;
	info!("Loaded {} join variables for cluster {cluster_id}.", env.len());
	Ok(env)
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn flat_field_naming() {
		let env = flatten_str(r#"{"cert_hash": "abc123"}"#, "KUBE_PROVISION").unwrap();
		assert_eq!(env.len(), 1);
		assert_eq!(env.get("KUBE_PROVISION_CERT_HASH"), Some("abc123"));
	}

	#[test]
	fn nested_objects_join_paths() {
		let env = flatten(&json!({"a": {"b": "x"}}), "P");
		assert_eq!(env.iter().collect::<Vec<_>>(), vec![("P_A_B", "x")]);
	}

	#[test]
	fn arrays_use_indices_and_scalars_render_as_json_text() {
		let env = flatten(
			&json!({"nodes": [{"ip": "10.0.0.1"}, {"ip": "10.0.0.2"}], "port": 6443, "ha": true, "zone": null}),
			"P",
		);
		assert_eq!(
			env.iter().collect::<Vec<_>>(),
			vec![
				("P_NODES_0_IP", "10.0.0.1"),
				("P_NODES_1_IP", "10.0.0.2"),
				("P_PORT", "6443"),
				("P_HA", "true"),
				("P_ZONE", ""),
			]
		);
	}

	#[test]
	fn special_characters_are_sanitized() {
		let env = flatten(&json!({"api-server.url": "x", "ключ": "y"}), "my-prefix");
		assert_eq!(env.get("MY_PREFIX_API_SERVER_URL"), Some("x"));
		assert_eq!(env.get("MY_PREFIX_____"), Some("y"));
	}

	#[test]
	fn empty_prefix_and_scalar_root() {
		assert_eq!(flatten(&json!({"a": 1}), "").get("A"), Some("1"));
		assert_eq!(flatten(&json!("solo"), "P").get("P"), Some("solo"));
		assert!(flatten(&json!({"a": {}, "b": []}), "P").is_empty());
	}

	#[test]
	fn deterministic_across_calls() {
		let json = r#"{"z": 1, "a": {"m": [1, 2]}, "b": "x"}"#;
		let first = flatten_str(json, "P").unwrap();
		for _ in 0..5 {
			assert_eq!(flatten_str(json, "P").unwrap(), first);
		}
		let names = first.iter().map(|(name, _)| name).collect::<Vec<_>>();
		assert_eq!(names, vec!["P_Z", "P_A_M_0", "P_A_M_1", "P_B"]);
	}

	#[test]
	fn malformed_json_exports_nothing() {
		let err = flatten_str(r#"{"token": "abc"#, "P").unwrap_err();
		assert!(matches!(err, ProvisionError::Json(_)));
	}

	#[test]
	fn exports_are_shell_escaped() {
		let env = flatten(&json!({"token": "ab cd'$x", "plain": "abc"}), "P");
		assert_eq!(env.to_exports(), "export P_TOKEN='ab cd'\\''$x'\nexport P_PLAIN=abc\n");
	}

	#[test]
	fn applies_to_child_processes_only() {
		let env = flatten(&json!({"marker": "value"}), "KUBE_PROVISION_TEST");
		let mut cmd = Command::new("sh");
		env.apply(&mut cmd).args(["-c", "printf %s \"$KUBE_PROVISION_TEST_MARKER\""]);
		let out = cmd.output().unwrap();
		assert_eq!(String::from_utf8_lossy(&out.stdout), "value");
		assert!(std::env::var("KUBE_PROVISION_TEST_MARKER").is_err());
	}
}
