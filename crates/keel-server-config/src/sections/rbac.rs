// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! RBAC computation configuration section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ENABLED_FLAG: &str = "RBAC_ENFORCED";
pub const DEFAULT_PAGE_SIZE: usize = 500;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 1800;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RbacConfigLayer {
	pub enabled_flag: Option<String>,
	pub default_enabled: Option<bool>,
	pub page_size: Option<usize>,
	pub cache_ttl_secs: Option<u64>,
}

impl RbacConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.enabled_flag.is_some() {
			self.enabled_flag = other.enabled_flag;
		}
		if other.default_enabled.is_some() {
			self.default_enabled = other.default_enabled;
		}
		if other.page_size.is_some() {
			self.page_size = other.page_size;
		}
		if other.cache_ttl_secs.is_some() {
			self.cache_ttl_secs = other.cache_ttl_secs;
		}
	}

	pub fn finalize(self) -> RbacConfig {
		RbacConfig {
			enabled_flag: self
				.enabled_flag
				.unwrap_or_else(|| DEFAULT_ENABLED_FLAG.to_string()),
			default_enabled: self.default_enabled.unwrap_or(true),
			page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
			cache_ttl_secs: self.cache_ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS),
		}
	}
}

/// Settings for permission computation and caching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RbacConfig {
	/// Feature flag consulted per account to decide whether RBAC is enforced.
	pub enabled_flag: String,
	/// Used when the flag source has no answer for the account.
	pub default_enabled: bool,
	/// Page size for entity store reads.
	pub page_size: usize,
	/// Lifetime of a cached permission structure; 0 keeps entries until
	/// invalidated.
	pub cache_ttl_secs: u64,
}

impl RbacConfig {
	pub fn cache_ttl(&self) -> Option<Duration> {
		match self.cache_ttl_secs {
			0 => None,
			secs => Some(Duration::from_secs(secs)),
		}
	}
}

impl Default for RbacConfig {
	fn default() -> Self {
		RbacConfigLayer::default().finalize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = RbacConfig::default();
		assert_eq!(config.enabled_flag, "RBAC_ENFORCED");
		assert!(config.default_enabled);
		assert_eq!(config.page_size, 500);
		assert_eq!(config.cache_ttl(), Some(Duration::from_secs(1800)));
	}

	#[test]
	fn test_zero_ttl_disables_expiry() {
		let config = RbacConfigLayer {
			cache_ttl_secs: Some(0),
			..Default::default()
		}
		.finalize();
		assert_eq!(config.cache_ttl(), None);
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = RbacConfigLayer {
			enabled_flag: Some("OLD".to_string()),
			default_enabled: Some(true),
			..Default::default()
		};
		base.merge(RbacConfigLayer {
			default_enabled: Some(false),
			..Default::default()
		});
		assert_eq!(base.enabled_flag.as_deref(), Some("OLD"));
		assert_eq!(base.default_enabled, Some(false));
	}

	#[test]
	fn test_deserialize_layer_partial() {
		let layer: RbacConfigLayer = toml::from_str("page_size = 100\n").unwrap();
		assert_eq!(layer.page_size, Some(100));
		assert!(layer.enabled_flag.is_none());
	}
}
