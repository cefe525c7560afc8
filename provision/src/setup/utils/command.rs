use crate::error::ProvisionError;
use std::process::{Command, Output, Stdio};

fn display(program: &str, args: &[&str]) -> String {
	if args.is_empty() {
		program.to_owned()
	} else {
		format!("{program} {}", args.join(" "))
	}
}

fn stderr_of(output: &Output) -> Option<String> {
	if output.stderr.is_empty() {
		None
	} else {
		Some(String::from_utf8_lossy(&output.stderr).trim().to_owned())
	}
}

/// Runs a command with inherited stdio and fails on a non-zero exit.
pub fn status(program: &str, args: &[&str]) -> Result<(), ProvisionError> {
	status_of(Command::new(program).args(args), display(program, args))
}

/// Runs a prepared command; `shown` is the text used in errors so secrets
/// passed as arguments stay out of logs.
pub fn status_of(cmd: &mut Command, shown: String) -> Result<(), ProvisionError> {
	let status = cmd.status().map_err(|source| ProvisionError::CommandLaunch {
		cmd: shown.clone(),
		source,
	})?;
	if !status.success() {
		return Err(ProvisionError::CommandFailed {
			cmd: shown,
			status,
			stderr: None,
		});
	}
	Ok(())
}

/// Runs a command and returns its trimmed stdout.
pub fn output(program: &str, args: &[&str]) -> Result<String, ProvisionError> {
	let full_cmd = display(program, args);
	let output = Command::new(program)
		.args(args)
		.stdin(Stdio::null())
		.output()
		.map_err(|source| ProvisionError::CommandLaunch {
			cmd: full_cmd.clone(),
			source,
		})?;
	if !output.status.success() {
		return Err(ProvisionError::CommandFailed {
			cmd: full_cmd,
			stderr: stderr_of(&output),
			status: output.status,
		});
	}
	Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
}
