//! Loading of the `[cronmail]` section of an INI configuration file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::env::Environment;

pub const DEFAULT_SECTION: &str = "cronmail";

#[derive(Debug, Error)]
pub enum Error {
	#[error("cannot load {path:?}")]
	Load {
		path: PathBuf,
		#[source]
		source: ini::Error,
	},
	#[error("couldn't find '{section}' section in {path:?}")]
	SectionMissing { section: String, path: PathBuf },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Key/value pairs of one configuration section.
///
/// Recognized keys are `server`, `mailto`, `mailfrom`, `auth_user` and
/// `auth_passwd`; anything else is kept but ignored.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Config {
	values: HashMap<String, String>,
}

impl Config {
	/// Returns the value for `key`, treating an empty value as unset.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.values
			.get(key)
			.map(String::as_str)
			.filter(|value| !value.is_empty())
	}

	/// Like [`Config::get`] but keeps empty values, for keys where an
	/// explicit empty string is meaningful (an empty password).
	pub fn get_raw(&self, key: &str) -> Option<&str> {
		self.values.get(key).map(String::as_str)
	}
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Config {
	fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
		Self {
			values: iter
				.into_iter()
				.map(|(key, value)| (key.into(), value.into()))
				.collect(),
		}
	}
}

pub fn default_path(env: &impl Environment) -> Option<PathBuf> {
	env.home_dir()
		.map(|home| home.join("etc").join("cronmail.conf"))
}

/// Loads `section` from `path`, or from `~/etc/cronmail.conf` when no path
/// is given. A missing default file yields an empty configuration.
pub fn load(path: Option<&Path>, section: &str, env: &impl Environment) -> Result<Config> {
	let path = if let Some(path) = path {
		path.to_owned()
	} else {
		let Some(path) = default_path(env) else {
			log::debug!("no home directory, using empty configuration");
			return Ok(Config::default());
		};
		if !path.exists() {
			log::debug!("{path:?} does not exist, using empty configuration");
			return Ok(Config::default());
		}
		path
	};

	log::debug!("loading configuration from {path:?}");
	// values such as passwords are taken as written, backslashes included
	let options = ini::ParseOption {
		enabled_escape: false,
		..ini::ParseOption::default()
	};
	let file = ini::Ini::load_from_file_opt(&path, options).map_err(|source| Error::Load {
		path: path.clone(),
		source,
	})?;

	let section_name = if section.is_empty() {
		DEFAULT_SECTION
	} else {
		section
	};

	let properties = file
		.section(Some(section_name))
		.ok_or_else(|| Error::SectionMissing {
			section: section_name.to_owned(),
			path: path.clone(),
		})?;

	Ok(properties.iter().collect())
}
