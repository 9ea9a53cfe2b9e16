//! Delivery of a composed message to an SMTP relay.

use std::str::FromStr;

use lettre::address::Envelope;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::transport::smtp::SmtpTransport;
use lettre::Address;
use thiserror::Error;

pub const DEFAULT_SERVER: &str = "localhost:25";
const DEFAULT_PORT: u16 = 25;

#[derive(Debug, Error)]
pub enum Error {
	#[error("invalid server {0:?}: expected host[:port]")]
	InvalidServer(String),
	#[error("cannot build tls parameters for {0}")]
	Tls(String, #[source] lettre::transport::smtp::Error),
	#[error("cannot build envelope")]
	Envelope(#[source] lettre::error::Error),
	#[error("cannot send email via {0}")]
	Send(String, #[source] lettre::transport::smtp::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A relay given as `host[:port]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
	raw: String,
	host: String,
	port: u16,
}

impl Server {
	/// Everything before the first `:`, used as the authentication domain.
	pub fn hostname(&self) -> &str {
		&self.host
	}

	pub fn port(&self) -> u16 {
		self.port
	}
}

impl FromStr for Server {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		let invalid = || Error::InvalidServer(s.to_owned());
		let (host, port) = match s.split_once(':') {
			Some((host, port)) => (host, port.parse().map_err(|_| invalid())?),
			None => (s, DEFAULT_PORT),
		};
		if host.is_empty() {
			return Err(invalid());
		}
		Ok(Self {
			raw: s.to_owned(),
			host: host.to_owned(),
			port,
		})
	}
}

impl std::fmt::Display for Server {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.raw)
	}
}

/// Login for relays that want one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Auth {
	pub user: String,
	pub password: String,
	pub host: String,
}

pub trait Transport {
	fn send(
		&self,
		server: &Server,
		auth: Option<&Auth>,
		from: &Address,
		to: &[Address],
		message: &[u8],
	) -> Result<()>;
}

/// Talks SMTP to the relay, upgrading with STARTTLS when it is offered.
pub struct Relay;

impl Transport for Relay {
	fn send(
		&self,
		server: &Server,
		auth: Option<&Auth>,
		from: &Address,
		to: &[Address],
		message: &[u8],
	) -> Result<()> {
		let envelope = Envelope::new(Some(from.clone()), to.to_vec()).map_err(Error::Envelope)?;

		let tls = TlsParameters::new(server.hostname().to_owned())
			.map_err(|error| Error::Tls(server.hostname().to_owned(), error))?;
		let mut builder = SmtpTransport::builder_dangerous(server.hostname())
			.port(server.port())
			.tls(Tls::Opportunistic(tls));
		if let Some(auth) = auth {
			log::debug!("authenticating as {} for {}", auth.user, auth.host);
			builder = builder
				.credentials(Credentials::new(auth.user.clone(), auth.password.clone()))
				.authentication(vec![Mechanism::Plain]);
		}

		log::info!("sending to {} recipient(s) via {server}", to.len());
		lettre::Transport::send_raw(&builder.build(), &envelope, message)
			.map_err(|error| Error::Send(server.to_string(), error))?;
		Ok(())
	}
}
