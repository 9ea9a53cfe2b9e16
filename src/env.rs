use std::path::PathBuf;

use nix::unistd::{gethostname, Uid, User};

/// Read-only lookups of the host the process is running on.
pub trait Environment {
	fn user_name(&self) -> Option<String>;
	fn hostname(&self) -> Option<String>;
	fn home_dir(&self) -> Option<PathBuf>;
	fn var(&self, key: &str) -> Option<String>;
}

pub struct System;

impl Environment for System {
	fn user_name(&self) -> Option<String> {
		match User::from_uid(Uid::current()) {
			Ok(user) => user.map(|user| user.name),
			Err(error) => {
				log::warn!("cannot look up current user: {error}");
				None
			}
		}
	}

	fn hostname(&self) -> Option<String> {
		match gethostname() {
			Ok(name) => Some(name.to_string_lossy().into_owned()),
			Err(error) => {
				log::warn!("cannot read hostname: {error}");
				None
			}
		}
	}

	fn home_dir(&self) -> Option<PathBuf> {
		dirs::home_dir()
	}

	fn var(&self, key: &str) -> Option<String> {
		std::env::var(key).ok()
	}
}

#[cfg(test)]
pub mod fixed {
	use std::collections::HashMap;
	use std::path::PathBuf;

	/// Canned answers for tests.
	#[derive(Default)]
	pub struct Fixed {
		pub user: Option<String>,
		pub host: Option<String>,
		pub home: Option<PathBuf>,
		pub vars: HashMap<String, String>,
	}

	impl Fixed {
		pub fn new() -> Self {
			Self {
				user: Some("cron".into()),
				host: Some("box".into()),
				..Self::default()
			}
		}

		pub fn with_var(mut self, key: &str, value: &str) -> Self {
			self.vars.insert(key.into(), value.into());
			self
		}
	}

	impl super::Environment for Fixed {
		fn user_name(&self) -> Option<String> {
			self.user.clone()
		}

		fn hostname(&self) -> Option<String> {
			self.host.clone()
		}

		fn home_dir(&self) -> Option<PathBuf> {
			self.home.clone()
		}

		fn var(&self, key: &str) -> Option<String> {
			self.vars.get(key).cloned()
		}
	}
}
