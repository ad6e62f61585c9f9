// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The entity store seam.
//!
//! Hosts implement [`EntityStore`] over whatever persistence they use. The
//! engine only ever asks for one collection, restricted to a set of
//! applications, one page at a time.

use std::collections::BTreeSet;

use async_trait::async_trait;
use keel_rbac_core::{AppId, Entity, EntityKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
	#[error("entity store unavailable: {0}")]
	Unavailable(String),

	#[error("entity store query timed out after {0} ms")]
	Timeout(u64),

	#[error("entity store query failed: {0}")]
	Query(String),
}

impl StoreError {
	pub fn is_transient(&self) -> bool {
		matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
	pub offset: usize,
	pub limit: usize,
}

/// An entity together with the application that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
	pub app_id: AppId,
	pub entity: Entity,
}

impl EntityRecord {
	pub fn new(app_id: impl Into<AppId>, entity: Entity) -> Self {
		Self {
			app_id: app_id.into(),
			entity,
		}
	}
}

/// One page of a collection query. `total` counts every matching record, not
/// just those on this page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
	pub items: Vec<EntityRecord>,
	pub total: usize,
}

#[async_trait]
pub trait EntityStore: Send + Sync {
	/// List entities of `kind` owned by any of `app_ids`.
	async fn list_entities(
		&self,
		kind: EntityKind,
		app_ids: &BTreeSet<AppId>,
		page: PageRequest,
	) -> Result<Page, StoreError>;
}

#[async_trait]
impl<S: EntityStore + ?Sized> EntityStore for std::sync::Arc<S> {
	async fn list_entities(
		&self,
		kind: EntityKind,
		app_ids: &BTreeSet<AppId>,
		page: PageRequest,
	) -> Result<Page, StoreError> {
		(**self).list_entities(kind, app_ids, page).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use keel_rbac_core::{Environment, EnvironmentType};

	#[test]
	fn transient_errors() {
		assert!(StoreError::Unavailable("down".into()).is_transient());
		assert!(StoreError::Timeout(100).is_transient());
		assert!(!StoreError::Query("bad filter".into()).is_transient());
	}

	#[test]
	fn record_decodes_from_stored_json() {
		let json = r#"{"app_id":"app-1","entity":{"kind":"environment","id":"e1","env_type":"NON_PROD"}}"#;
		let record: EntityRecord = serde_json::from_str(json).unwrap();
		assert_eq!(
			record,
			EntityRecord::new("app-1", Entity::Environment(Environment::new("e1", EnvironmentType::NonProd)))
		);
		assert_eq!(record.entity.kind(), EntityKind::Environment);
	}
}
