// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

use crate::types::{EntityId, PermissionType};

/// Errors raised while computing or evaluating permissions.
///
/// Computation errors are fatal for the whole user: a partially built
/// permission structure is never returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RbacError {
	#[error("invalid {context} filter type: {filter_type}")]
	InvalidFilterType {
		context: &'static str,
		filter_type: String,
	},

	#[error("unknown permission type: {0}")]
	UnknownPermissionType(PermissionType),

	#[error("user not authorized to access entity {entity_id}")]
	AccessDenied { entity_id: EntityId },

	#[error("invalid authorization request: {0}")]
	InvalidRequest(String),
}

impl RbacError {
	pub(crate) fn invalid_filter(context: &'static str, filter_type: impl Into<String>) -> Self {
		Self::InvalidFilterType {
			context,
			filter_type: filter_type.into(),
		}
	}
}

pub type Result<T> = std::result::Result<T, RbacError>;
