//! Parsing of `From`/`To` header values into mailboxes.
//!
//! Header syntax is handled by [`mailparse::addrparse`]; every addr-spec it
//! yields is then validated by [`lettre::Address`].

use lettre::address::AddressError;
use lettre::message::Mailbox;
use lettre::Address;
use mailparse::{MailAddr, MailParseError, SingleInfo};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("no address")]
	Empty,
	#[error("no angle-addr in {input:?}")]
	MissingAngleAddr { input: String },
	#[error("expected a single address in {input:?}")]
	NotSingle { input: String },
	#[error("cannot parse address {input:?}")]
	Parse {
		input: String,
		#[source]
		source: MailParseError,
	},
	#[error("invalid address {input:?}")]
	Invalid {
		input: String,
		#[source]
		source: AddressError,
	},
}

pub type Result<T> = std::result::Result<T, Error>;

fn to_mailbox(info: SingleInfo) -> Result<Mailbox> {
	let email = info.addr.parse().map_err(|source| Error::Invalid {
		input: info.addr.clone(),
		source,
	})?;
	Ok(Mailbox::new(info.display_name, email))
}

fn parse(input: &str) -> Result<Vec<Mailbox>> {
	let addrs = mailparse::addrparse(input).map_err(|source| Error::Parse {
		input: input.to_owned(),
		source,
	})?;

	let mut mailboxes = Vec::new();
	for addr in addrs.iter().cloned() {
		match addr {
			MailAddr::Single(info) => mailboxes.push(to_mailbox(info)?),
			MailAddr::Group(group) => {
				for info in group.addrs {
					mailboxes.push(to_mailbox(info)?);
				}
			}
		}
	}

	if mailboxes.is_empty() {
		return Err(Error::Empty);
	}
	Ok(mailboxes)
}

/// A failed value with words but no `<` most likely is a display name
/// followed by a bare address.
fn lacks_angle_addr(input: &str) -> bool {
	let trimmed = input.trim();
	!trimmed.contains('<') && (trimmed.contains(char::is_whitespace) || trimmed.starts_with('"'))
}

fn parse_single(input: &str) -> Result<Mailbox> {
	let mut mailboxes = parse(input)?;
	if mailboxes.len() != 1 {
		return Err(Error::NotSingle {
			input: input.to_owned(),
		});
	}
	Ok(mailboxes.remove(0))
}

/// Parses a single mailbox.
pub fn parse_mailbox(input: &str) -> Result<Mailbox> {
	if input.trim().is_empty() {
		return Err(Error::Empty);
	}

	match parse_single(input) {
		Err(Error::Parse { .. } | Error::Invalid { .. }) if lacks_angle_addr(input) => {
			Err(Error::MissingAngleAddr {
				input: input.trim().to_owned(),
			})
		}
		result => result,
	}
}

/// Parses a sender address. A value rejected only for lacking angle
/// brackets gets a second chance wrapped in `<...>`.
pub fn parse_sender(input: &str) -> Result<Mailbox> {
	match parse_mailbox(input) {
		Err(Error::MissingAngleAddr { .. }) => parse_single(&format!("<{}>", input.trim())),
		result => result,
	}
}

/// Parses a comma-separated list of mailboxes. Every entry must hold a
/// valid address.
pub fn parse_list(input: &str) -> Result<Vec<Mailbox>> {
	if input.trim().is_empty() {
		return Err(Error::Empty);
	}
	parse(input)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn emails(mailboxes: &[Mailbox]) -> Vec<String> {
		mailboxes.iter().map(|m| m.email.to_string()).collect()
	}

	#[test]
	fn bare_address() {
		let mailbox = parse_mailbox("alice@example.com").unwrap();
		assert_eq!(mailbox.name, None);
		assert_eq!(mailbox.email.to_string(), "alice@example.com");
	}

	#[test]
	fn bare_and_bracketed_sender_agree() {
		assert_eq!(
			parse_sender("alice@example.com").unwrap(),
			parse_sender("<alice@example.com>").unwrap()
		);
	}

	#[test]
	fn display_names() {
		let mailbox = parse_mailbox("Alice Smith <alice@example.com>").unwrap();
		assert_eq!(mailbox.name.as_deref(), Some("Alice Smith"));
		assert_eq!(mailbox.email.to_string(), "alice@example.com");

		let mailbox = parse_mailbox("\"Smith, Alice\" <alice@example.com>").unwrap();
		assert_eq!(mailbox.name.as_deref(), Some("Smith, Alice"));
	}

	#[test]
	fn words_without_brackets_are_missing_angle_addr() {
		assert!(matches!(
			parse_mailbox("not an address"),
			Err(Error::MissingAngleAddr { .. })
		));
		assert!(matches!(parse_mailbox("  "), Err(Error::Empty)));
	}

	#[test]
	fn sender_retry_still_validates() {
		let error = parse_sender("not an address").unwrap_err();
		assert!(!matches!(error, Error::MissingAngleAddr { .. }), "{error:?}");
		assert!(matches!(parse_sender("nobody"), Err(Error::Invalid { .. })));
	}

	#[test]
	fn sender_must_be_single() {
		assert!(matches!(
			parse_sender("a@x.com, b@y.com"),
			Err(Error::NotSingle { .. })
		));
	}

	#[test]
	fn lists() {
		let mailboxes =
			parse_list("\"Ops, Team\" <ops@example.com>, b@y.com,Carol <carol@z.org>").unwrap();
		assert_eq!(emails(&mailboxes), ["ops@example.com", "b@y.com", "carol@z.org"]);
		assert_eq!(mailboxes[0].name.as_deref(), Some("Ops, Team"));
	}

	#[test]
	fn brackets_inside_quoted_names() {
		let mailboxes = parse_list("\"a<b\" <x@y.com>, c@d.com").unwrap();
		assert_eq!(emails(&mailboxes), ["x@y.com", "c@d.com"]);
		assert_eq!(mailboxes[0].name.as_deref(), Some("a<b"));
	}

	#[test]
	fn trailing_comment() {
		let mailboxes = parse_list("alice@example.com (Alice)").unwrap();
		assert_eq!(emails(&mailboxes), ["alice@example.com"]);
	}

	#[test]
	fn malformed_lists() {
		assert!(parse_list("not an address, ,").is_err());
		assert!(matches!(parse_list(""), Err(Error::Empty)));
	}
}
