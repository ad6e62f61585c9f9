// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the Keel RBAC server components.
//!
//! Configuration is layered from built-in defaults, an optional TOML file and
//! `KEEL_SERVER_*` environment variables, in increasing precedence.
//!
//! # Usage
//!
//! ```ignore
//! use keel_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("entity store page size: {}", config.rbac.page_size);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerConfig {
	pub rbac: RbacConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`KEEL_SERVER_*`)
/// 2. Config file (`/etc/keel/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	];
	load_from_sources(sources)
}

/// Load configuration from the environment only.
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![Box::new(EnvSource)];
	load_from_sources(sources)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(config_path: impl Into<std::path::PathBuf>) -> Result<ServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	];
	load_from_sources(sources)
}

/// Merge the given sources in precedence order and finalize the result.
pub fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Finalize a merged layer into resolved, validated configuration.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let rbac = layer.rbac.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&rbac)?;

	info!(
		enabled_flag = %rbac.enabled_flag,
		default_enabled = rbac.default_enabled,
		page_size = rbac.page_size,
		cache_ttl_secs = rbac.cache_ttl_secs,
		log_level = %logging.level,
		log_json = logging.json,
		"RBAC configuration loaded"
	);

	Ok(ServerConfig { rbac, logging })
}

fn validate_config(rbac: &RbacConfig) -> Result<(), ConfigError> {
	if rbac.page_size == 0 {
		return Err(ConfigError::Validation(
			"KEEL_SERVER_RBAC_PAGE_SIZE must be greater than zero".to_string(),
		));
	}
	if rbac.enabled_flag.trim().is_empty() {
		return Err(ConfigError::Validation(
			"KEEL_SERVER_RBAC_ENABLED_FLAG must not be blank".to_string(),
		));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn test_finalize_empty_layer_uses_defaults() {
		let config = finalize(ServerConfigLayer::default()).unwrap();
		assert_eq!(config, ServerConfig::default());
	}

	#[test]
	fn test_zero_page_size_is_rejected() {
		let layer = ServerConfigLayer {
			rbac: Some(RbacConfigLayer {
				page_size: Some(0),
				..Default::default()
			}),
			logging: None,
		};
		assert!(matches!(finalize(layer), Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_blank_flag_is_rejected() {
		let layer = ServerConfigLayer {
			rbac: Some(RbacConfigLayer {
				enabled_flag: Some("  ".to_string()),
				..Default::default()
			}),
			logging: None,
		};
		assert!(finalize(layer).is_err());
	}

	#[test]
	fn test_file_layer_overrides_defaults() {
		use std::io::Write;

		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[rbac]\nenabled_flag = \"RBAC_V2\"\n\n[logging]\nlevel = \"debug\"").unwrap();
		let sources: Vec<Box<dyn ConfigSource>> = vec![Box::new(TomlSource::new(file.path())), Box::new(DefaultsSource)];
		let config = load_from_sources(sources).unwrap();
		assert_eq!(config.rbac.enabled_flag, "RBAC_V2");
		assert_eq!(config.rbac.page_size, 500);
		assert_eq!(config.logging.level, "debug");
	}

	proptest! {
		#[test]
		fn test_positive_page_sizes_validate(page_size in 1usize..100_000) {
			let layer = ServerConfigLayer {
				rbac: Some(RbacConfigLayer { page_size: Some(page_size), ..Default::default() }),
				logging: None,
			};
			let config = finalize(layer).unwrap();
			prop_assert_eq!(config.rbac.page_size, page_size);
		}
	}
}
