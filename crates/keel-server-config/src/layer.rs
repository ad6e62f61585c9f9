// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The partial configuration each source produces.

use serde::{Deserialize, Serialize};

use crate::sections::{LoggingConfigLayer, RbacConfigLayer};

/// One source's view of the configuration. Absent sections and fields defer to
/// lower-precedence sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub rbac: Option<RbacConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl ServerConfigLayer {
	pub fn merge(&mut self, other: Self) {
		merge_section(&mut self.rbac, other.rbac, RbacConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: fn(&mut T, T)) {
	let Some(incoming) = other else {
		return;
	};
	match base {
		Some(existing) => merge(existing, incoming),
		None => *base = Some(incoming),
	}
}
