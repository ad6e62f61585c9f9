// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use keel_rbac_core::{EntityKind, RbacError};
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum RbacServerError {
	#[error(transparent)]
	Rbac(#[from] RbacError),

	#[error("failed to fetch {kind} entities: {source}")]
	EntityFetch {
		kind: EntityKind,
		#[source]
		source: StoreError,
	},
}

impl RbacServerError {
	/// Transient store failures may succeed on a later attempt. Rule errors
	/// come from stored group data and will fail again until it changes.
	pub fn is_retryable(&self) -> bool {
		match self {
			RbacServerError::Rbac(_) => false,
			RbacServerError::EntityFetch { source, .. } => source.is_transient(),
		}
	}
}

pub type Result<T> = std::result::Result<T, RbacServerError>;
