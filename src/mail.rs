//! Composing the report mail for a finished command.

use std::fmt::Write as _;
use std::io;

use lettre::Address;
use thiserror::Error;

use crate::address;
use crate::config::Config;
use crate::env::Environment;
use crate::smtp::{self, Auth, Server, Transport};

#[derive(Debug, Error)]
pub enum Error {
	#[error("couldn't parse from address")]
	ParseFrom(#[source] address::Error),
	#[error("couldn't parse to address(es) '{0}'")]
	ParseTo(String, #[source] address::Error),
	#[error("cannot determine the current user for a default address")]
	NoUser,
	#[error("cannot write debug report")]
	Report(#[source] io::Error),
	#[error(transparent)]
	Smtp(#[from] smtp::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Everything the caller decided on the command line.
#[derive(Debug, Default, Clone)]
pub struct Request<'a> {
	pub server: Option<&'a str>,
	pub subject: Option<&'a str>,
	pub from: Option<&'a str>,
	pub to: Option<&'a str>,
	pub list_id: Option<&'a str>,
	/// The command as invoked, joined with spaces.
	pub cmdline: &'a str,
	pub prepend_cmd: bool,
}

/// A fully resolved message, ready to hand to a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
	pub server: Server,
	pub auth: Option<Auth>,
	pub envelope_from: Address,
	pub envelope_to: Vec<Address>,
	pub from: String,
	pub to: String,
	pub subject: String,
	pub list_id: Option<String>,
	pub body: String,
}

impl Message {
	/// The header block, CRLF terminated, including the blank separator.
	pub fn headers(&self) -> String {
		let mut headers = String::new();
		if let Some(list_id) = &self.list_id {
			write!(headers, "List-Id: {list_id}\r\n").unwrap();
		}
		write!(
			headers,
			"From: {}\r\nTo: {}\r\nSubject: {}\r\n\r\n",
			self.from, self.to, self.subject
		)
		.unwrap();
		headers
	}

	pub fn formatted(&self) -> String {
		self.headers() + &self.body
	}

	fn report(&self, out: &mut impl io::Write) -> io::Result<()> {
		let (user, password) = match &self.auth {
			Some(auth) => (auth.user.as_str(), auth.password.as_str()),
			None => ("", ""),
		};
		let password = if password.is_empty() { "" } else { "XXXXXXXXXX" };
		let envelope_to = self
			.envelope_to
			.iter()
			.map(ToString::to_string)
			.collect::<Vec<_>>()
			.join(", ");

		writeln!(out, "server: {}", self.server)?;
		writeln!(out, "auth user: {user}")?;
		writeln!(out, "auth passwd: {password}")?;
		writeln!(out, "from address (envelope): {}", self.envelope_from)?;
		writeln!(out, "from address (header): {}", self.from)?;
		writeln!(out, "to (envelope): {envelope_to}")?;
		writeln!(out, "to (header): {}", self.to)?;
		writeln!(out, "subject: {}", self.subject)
	}
}

fn non_empty(value: Option<&str>) -> Option<&str> {
	value.filter(|value| !value.is_empty())
}

fn local_address(env: &impl Environment) -> Result<String> {
	let user = env.user_name().ok_or(Error::NoUser)?;
	let host = env.hostname().unwrap_or_else(|| "localhost".to_owned());
	Ok(format!("{user}@{host}"))
}

/// Builds the message for a finished command, or `None` when there is
/// nothing worth reporting.
pub fn compose(
	config: &Config,
	env: &impl Environment,
	request: &Request<'_>,
	output: &str,
	status: i32,
) -> Result<Option<Message>> {
	if status == 0 && output.is_empty() {
		return Ok(None);
	}

	let mut body = String::new();
	if status != 0 {
		write!(body, "Process exited with non-zero exit status ({status})\n\n").unwrap();
	}
	if request.prepend_cmd {
		write!(body, "{}\n\n", request.cmdline).unwrap();
	}
	body.push_str(output);

	let server: Server = non_empty(request.server)
		.or_else(|| config.get("server"))
		.unwrap_or(smtp::DEFAULT_SERVER)
		.parse()?;

	let to = match non_empty(request.to)
		.map(str::to_owned)
		.or_else(|| env.var("MAILTO").filter(|to| !to.is_empty()))
		.or_else(|| config.get("mailto").map(str::to_owned))
	{
		Some(to) => to,
		None => local_address(env)?,
	};

	let from = match non_empty(request.from).or_else(|| config.get("mailfrom")) {
		Some(from) => from.to_owned(),
		None => local_address(env)?,
	};

	let subject = non_empty(request.subject).unwrap_or(request.cmdline);

	let envelope_from = address::parse_sender(&from).map_err(Error::ParseFrom)?.email;
	let envelope_to = address::parse_list(&to)
		.map_err(|error| Error::ParseTo(to.clone(), error))?
		.into_iter()
		.map(|mailbox| mailbox.email)
		.collect();

	let auth = config.get("auth_user").map(|user| Auth {
		user: user.to_owned(),
		password: config.get_raw("auth_passwd").unwrap_or_default().to_owned(),
		host: server.hostname().to_owned(),
	});

	Ok(Some(Message {
		server,
		auth,
		envelope_from,
		envelope_to,
		from,
		to,
		subject: subject.to_owned(),
		list_id: non_empty(request.list_id).map(str::to_owned),
		body,
	}))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
	/// Nothing to report, no message was built.
	Skipped,
	/// The resolved settings were written out instead of sending.
	Debugged,
	Sent,
}

/// Composes and delivers. With `debug` set, the message is described on
/// that writer and never handed to the transport.
pub fn notify(
	config: &Config,
	env: &impl Environment,
	transport: &impl Transport,
	request: &Request<'_>,
	output: &str,
	status: i32,
	debug: Option<&mut dyn io::Write>,
) -> Result<Delivery> {
	let Some(message) = compose(config, env, request, output, status)? else {
		log::info!("no output and exit status 0, not sending mail");
		return Ok(Delivery::Skipped);
	};

	if let Some(mut out) = debug {
		message.report(&mut out).map_err(Error::Report)?;
		return Ok(Delivery::Debugged);
	}

	transport.send(
		&message.server,
		message.auth.as_ref(),
		&message.envelope_from,
		&message.envelope_to,
		message.formatted().as_bytes(),
	)?;
	Ok(Delivery::Sent)
}
