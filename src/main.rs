#![deny(
	absolute_paths_not_starting_with_crate,
	keyword_idents,
	macro_use_extern_crate,
	meta_variable_misuse,
	missing_abi,
	missing_copy_implementations,
	non_ascii_idents,
	nonstandard_style,
	noop_method_call,
	pointer_structural_match,
	private_in_public,
	rust_2018_idioms,
	unused_qualifications
)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;

use crate::env::Environment;
use crate::mail::{Delivery, Request};
use crate::run::Execute;
use crate::smtp::Transport;

mod address;
mod config;
mod env;
mod mail;
mod run;
mod smtp;

/// Exit code for failures of cronmail itself, as opposed to the command.
const FAILURE: u8 = 255;

/// Run a command and mail its output if it printed anything or failed.
#[derive(argh::FromArgs)]
#[argh(note = "\
Settings are read from the [cronmail] section of ~/etc/cronmail.conf unless
--conf is given. Recognized keys: server, mailto, mailfrom, auth_user and
auth_passwd. A missing default file is not an error.")]
struct Args {
	/// configuration file, defaults to ~/etc/cronmail.conf
	#[argh(option)]
	conf: Option<PathBuf>,

	/// override the SMTP server:port from the configuration file
	#[argh(option)]
	server: Option<String>,

	/// subject of the message, defaults to the command line
	#[argh(option)]
	subject: Option<String>,

	/// from address to use for the message
	#[argh(option)]
	from: Option<String>,

	/// recipient addresses, defaults to the MAILTO environment variable
	#[argh(option)]
	to: Option<String>,

	/// value of the List-Id header to insert
	#[argh(option, long = "listid")]
	list_id: Option<String>,

	/// prepend the command line to the email
	#[argh(switch, long = "prependcmd")]
	prepend_cmd: bool,

	/// print the resolved mail settings instead of sending
	#[argh(switch)]
	debug: bool,

	/// the command to run, followed by its arguments
	#[argh(positional, greedy)]
	command: Vec<String>,
}

fn exit_code(status: i32) -> ExitCode {
	u8::try_from(status).map_or(ExitCode::from(FAILURE), ExitCode::from)
}

fn cronmail(
	args: &Args,
	env: &impl Environment,
	executor: &impl Execute,
	transport: &impl Transport,
) -> ExitCode {
	let cmdline = args.command.join(" ");

	let config = match config::load(args.conf.as_deref(), config::DEFAULT_SECTION, env)
		.with_context(|| {
			let path = args.conf.clone().or_else(|| config::default_path(env));
			format!("failed to load configuration file {}", path.unwrap_or_default().display())
		}) {
		Ok(config) => config,
		Err(error) => {
			eprintln!("cronmail: {error:#}");
			return ExitCode::from(FAILURE);
		}
	};

	let outcome = match run::run(executor, &args.command) {
		Ok(outcome) => outcome,
		Err(error) => {
			eprintln!(
				"cronmail: could not run cmd ({cmdline}) : {:#}",
				anyhow::Error::new(error)
			);
			return ExitCode::from(FAILURE);
		}
	};

	let request = Request {
		server: args.server.as_deref(),
		subject: args.subject.as_deref(),
		from: args.from.as_deref(),
		to: args.to.as_deref(),
		list_id: args.list_id.as_deref(),
		cmdline: &cmdline,
		prepend_cmd: args.prepend_cmd,
	};

	let mut stderr = io::stderr();
	let debug: Option<&mut dyn io::Write> = if args.debug { Some(&mut stderr) } else { None };

	match mail::notify(
		&config,
		env,
		transport,
		&request,
		&outcome.output,
		outcome.status,
		debug,
	) {
		Ok(Delivery::Debugged) => ExitCode::SUCCESS,
		Ok(delivery) => {
			log::debug!("{delivery:?}, exiting with {}", outcome.status);
			if outcome.success() {
				ExitCode::SUCCESS
			} else {
				exit_code(outcome.status)
			}
		}
		Err(error) => {
			eprintln!(
				"cronmail: couldn't send email: {:#}\n\nOutput:\n{}",
				anyhow::Error::new(error),
				outcome.output
			);
			ExitCode::from(FAILURE)
		}
	}
}

fn main() -> ExitCode {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

	let args: Args = argh::from_env();
	cronmail(&args, &env::System, &run::System, &smtp::Relay)
}
