// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, a TOML file and environment
//! variables.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{LoggingConfigLayer, RbacConfigLayer};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		Ok(ServerConfigLayer::default())
	}
}

/// Reads a TOML file; a missing file contributes nothing.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/keel/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!(path = %self.path.display(), "parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variables, named `KEEL_SERVER_<SECTION>_<FIELD>`.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		Ok(ServerConfigLayer {
			rbac: Some(load_rbac_from_env()?),
			logging: Some(load_logging_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Result<Option<bool>, ConfigError> {
	match env_var(name) {
		Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => Ok(Some(true)),
		Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => Ok(Some(false)),
		Some(v) => Err(ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid boolean value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_parse<T: std::str::FromStr>(name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {kind} value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn load_rbac_from_env() -> Result<RbacConfigLayer, ConfigError> {
	Ok(RbacConfigLayer {
		enabled_flag: env_var("KEEL_SERVER_RBAC_ENABLED_FLAG"),
		default_enabled: env_bool("KEEL_SERVER_RBAC_DEFAULT_ENABLED")?,
		page_size: env_parse("KEEL_SERVER_RBAC_PAGE_SIZE", "usize")?,
		cache_ttl_secs: env_parse("KEEL_SERVER_RBAC_CACHE_TTL_SECS", "u64")?,
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	Ok(LoggingConfigLayer {
		level: env_var("KEEL_SERVER_LOG_LEVEL"),
		json: env_bool("KEEL_SERVER_LOG_JSON")?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Defaults < Precedence::ConfigFile);
		assert!(Precedence::ConfigFile < Precedence::Environment);
	}

	#[test]
	fn test_missing_toml_file_is_empty() {
		let layer = TomlSource::new("/nonexistent/keel/server.toml").load().unwrap();
		assert_eq!(layer, ServerConfigLayer::default());
	}

	#[test]
	fn test_toml_file_is_parsed() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[rbac]\npage_size = 25\ncache_ttl_secs = 0").unwrap();
		let layer = TomlSource::new(file.path()).load().unwrap();
		let rbac = layer.rbac.unwrap();
		assert_eq!(rbac.page_size, Some(25));
		assert_eq!(rbac.cache_ttl_secs, Some(0));
	}

	#[test]
	fn test_malformed_toml_is_an_error() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[rbac\npage_size = ").unwrap();
		let err = TomlSource::new(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}

	#[test]
	fn test_env_parse_rejects_garbage() {
		std::env::set_var("KEEL_TEST_SOURCES_GARBAGE_U64", "many");
		let err = env_parse::<u64>("KEEL_TEST_SOURCES_GARBAGE_U64", "u64").unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { .. }));
		std::env::remove_var("KEEL_TEST_SOURCES_GARBAGE_U64");
	}

	#[test]
	fn test_env_bool_accepts_common_spellings() {
		std::env::set_var("KEEL_TEST_SOURCES_BOOL", "TRUE");
		assert_eq!(env_bool("KEEL_TEST_SOURCES_BOOL").unwrap(), Some(true));
		std::env::set_var("KEEL_TEST_SOURCES_BOOL", "0");
		assert_eq!(env_bool("KEEL_TEST_SOURCES_BOOL").unwrap(), Some(false));
		std::env::remove_var("KEEL_TEST_SOURCES_BOOL");
		assert_eq!(env_bool("KEEL_TEST_SOURCES_BOOL").unwrap(), None);
	}

	#[test]
	fn test_invalid_log_json_flag_is_rejected() {
		std::env::set_var("KEEL_SERVER_LOG_JSON", "maybe");
		let result = EnvSource.load();
		std::env::remove_var("KEEL_SERVER_LOG_JSON");
		match result {
			Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "KEEL_SERVER_LOG_JSON"),
			other => panic!("expected invalid value error, got {other:?}"),
		}
	}
}
