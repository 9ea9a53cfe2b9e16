//! Running the wrapped command and capturing what it prints.

use std::io::{self, Read as _};
use std::os::unix::fs::PermissionsExt as _;
use std::os::unix::process::ExitStatusExt as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;

/// Status reported when the child's exit status cannot be recovered.
pub const UNDETERMINED_STATUS: i32 = -1;

#[derive(Debug, Error)]
pub enum Error {
	#[error("no command provided to run")]
	NoCommand,
	#[error("error running command {name}: executable file not found in $PATH")]
	NotFound { name: String },
	#[error("cannot spawn {path:?}")]
	Spawn {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
	#[error("cannot capture output of {path:?}")]
	Capture {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
}

pub type Result<T> = std::result::Result<T, Error>;

/// What the operating system told us about a finished child.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Exit {
	/// Combined stdout and stderr, in the order they were written.
	pub output: Vec<u8>,
	pub code: Option<i32>,
	pub signal: Option<i32>,
}

pub trait Execute {
	/// Finds the executable for `name`, if any.
	fn resolve(&self, name: &str) -> Option<PathBuf>;
	/// Runs `program` to completion.
	fn execute(&self, program: &Path, args: &[String]) -> Result<Exit>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
	pub output: String,
	pub status: i32,
}

impl Outcome {
	pub fn success(&self) -> bool {
		self.status == 0
	}
}

/// Runs `argv[0]` with the remaining tokens as arguments.
///
/// A non-zero exit is not an error here; it is reported through
/// [`Outcome::status`]. Errors mean the command never ran.
pub fn run(executor: &impl Execute, argv: &[String]) -> Result<Outcome> {
	let (name, args) = argv.split_first().ok_or(Error::NoCommand)?;
	let program = executor.resolve(name).ok_or_else(|| Error::NotFound {
		name: name.clone(),
	})?;
	log::debug!("running {program:?} with {args:?}");

	let exit = executor.execute(&program, args)?;
	let mut output = String::from_utf8_lossy(&exit.output).into_owned();

	let status = if let Some(code) = exit.code {
		code
	} else {
		let reason = match exit.signal {
			Some(signal) => format!("terminated by signal {signal}"),
			None => "no exit code reported".to_owned(),
		};
		eprintln!("cronmail: couldn't get exit status: {reason}");
		output = format!("cronmail: couldn't get exit status: {reason}\n\n{output}");
		UNDETERMINED_STATUS
	};
	log::info!("{name} exited with status {status}");

	Ok(Outcome { output, status })
}

/// Runs commands as real child processes.
pub struct System;

fn is_executable(path: &Path) -> bool {
	path.metadata()
		.map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
		.unwrap_or(false)
}

impl Execute for System {
	fn resolve(&self, name: &str) -> Option<PathBuf> {
		if name.contains('/') {
			let path = PathBuf::from(name);
			return is_executable(&path).then_some(path);
		}

		let search = std::env::var_os("PATH")?;
		std::env::split_paths(&search)
			.map(|dir| {
				// an empty entry means the current directory
				if dir.as_os_str().is_empty() {
					Path::new(".").join(name)
				} else {
					dir.join(name)
				}
			})
			.find(|candidate| is_executable(candidate))
	}

	fn execute(&self, program: &Path, args: &[String]) -> Result<Exit> {
		let capture = |source: io::Error| Error::Capture {
			path: program.to_owned(),
			source,
		};

		let (mut reader, writer) = io::pipe().map_err(capture)?;
		let mut command = Command::new(program);
		command
			.args(args)
			.stdin(Stdio::null())
			.stdout(writer.try_clone().map_err(capture)?)
			.stderr(writer);

		let mut child = command.spawn().map_err(|source| Error::Spawn {
			path: program.to_owned(),
			source,
		})?;
		// the command still holds our copies of the write end
		drop(command);

		let mut output = Vec::new();
		reader.read_to_end(&mut output).map_err(capture)?;
		let status = child.wait().map_err(capture)?;

		Ok(Exit {
			output,
			code: status.code(),
			signal: status.signal(),
		})
	}
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;

	use super::*;

	fn argv(tokens: &[&str]) -> Vec<String> {
		tokens.iter().map(|&token| token.to_owned()).collect()
	}

	struct Canned {
		exit: Exit,
		calls: RefCell<Vec<PathBuf>>,
	}

	impl Canned {
		fn new(exit: Exit) -> Self {
			Self {
				exit,
				calls: RefCell::default(),
			}
		}
	}

	impl Execute for Canned {
		fn resolve(&self, name: &str) -> Option<PathBuf> {
			(name != "missing").then(|| PathBuf::from("/bin").join(name))
		}

		fn execute(&self, program: &Path, _args: &[String]) -> Result<Exit> {
			self.calls.borrow_mut().push(program.to_owned());
			Ok(self.exit.clone())
		}
	}

	#[test]
	fn empty_argv_is_rejected_before_lookup() {
		let canned = Canned::new(Exit::default());
		assert!(matches!(run(&canned, &[]), Err(Error::NoCommand)));
		assert!(canned.calls.borrow().is_empty());
	}

	#[test]
	fn unresolvable_command() {
		let canned = Canned::new(Exit::default());
		let error = run(&canned, &argv(&["missing", "-x"])).unwrap_err();
		assert!(matches!(&error, Error::NotFound { name } if name == "missing"));
		assert!(canned.calls.borrow().is_empty());
	}

	#[test]
	fn non_zero_exit_is_an_outcome() {
		let canned = Canned::new(Exit {
			output: b"boom\n".to_vec(),
			code: Some(3),
			signal: None,
		});
		let outcome = run(&canned, &argv(&["job"])).unwrap();
		assert_eq!(outcome.output, "boom\n");
		assert_eq!(outcome.status, 3);
		assert!(!outcome.success());
		assert_eq!(*canned.calls.borrow(), vec![PathBuf::from("/bin/job")]);
	}

	#[test]
	fn signal_synthesizes_undetermined_status() {
		let canned = Canned::new(Exit {
			output: b"partial".to_vec(),
			code: None,
			signal: Some(9),
		});
		let outcome = run(&canned, &argv(&["job"])).unwrap();
		assert_eq!(outcome.status, UNDETERMINED_STATUS);
		assert_eq!(
			outcome.output,
			"cronmail: couldn't get exit status: terminated by signal 9\n\npartial"
		);
	}

	#[test]
	fn system_interleaves_stdout_and_stderr() {
		let outcome = run(
			&System,
			&argv(&["sh", "-c", "echo one; echo two >&2; echo three"]),
		)
		.unwrap();
		assert_eq!(outcome.output, "one\ntwo\nthree\n");
		assert!(outcome.success());
	}

	#[test]
	fn system_reports_exit_code() {
		let outcome = run(&System, &argv(&["sh", "-c", "printf oops; exit 7"])).unwrap();
		assert_eq!(outcome.output, "oops");
		assert_eq!(outcome.status, 7);
	}

	#[test]
	fn system_reports_killed_child() {
		let outcome = run(&System, &argv(&["sh", "-c", "kill -9 $$"])).unwrap();
		assert_eq!(outcome.status, UNDETERMINED_STATUS);
		assert!(outcome.output.contains("terminated by signal 9"));
	}

	#[test]
	fn system_does_not_find_nonsense() {
		let error = run(&System, &argv(&["cronmail-no-such-command-xyz"])).unwrap_err();
		assert!(matches!(error, Error::NotFound { .. }));
	}

	#[test]
	fn system_resolves_paths_directly() {
		assert_eq!(System.resolve("/bin/sh"), Some(PathBuf::from("/bin/sh")));
		assert_eq!(System.resolve("./definitely/not/here"), None);
	}
}
