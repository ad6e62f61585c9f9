// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fetch the entity snapshot a permission computation needs.

use keel_rbac_core::{EntityKind, EntitySnapshot, RequiredAppIds};
use tracing::{debug, instrument, warn};

use crate::error::{RbacServerError, Result};
use crate::paging::fetch_all_pages;
use crate::store::{EntityRecord, EntityStore};

/// Fetch all five collections concurrently. Collections with no required
/// applications are skipped without touching the store.
#[instrument(level = "debug", skip(store, required))]
pub async fn fetch_snapshot<S>(store: &S, required: &RequiredAppIds, page_size: usize) -> Result<EntitySnapshot>
where
	S: EntityStore + ?Sized,
{
	let (services, provisioners, environments, workflows, pipelines) = tokio::try_join!(
		fetch_collection(store, EntityKind::Service, required, page_size),
		fetch_collection(store, EntityKind::Provisioner, required, page_size),
		fetch_collection(store, EntityKind::Environment, required, page_size),
		fetch_collection(store, EntityKind::Workflow, required, page_size),
		fetch_collection(store, EntityKind::Pipeline, required, page_size),
	)?;

	let mut snapshot = EntitySnapshot::new();
	for record in [services, provisioners, environments, workflows, pipelines]
		.into_iter()
		.flatten()
	{
		snapshot.insert(record.app_id, record.entity);
	}
	Ok(snapshot)
}

async fn fetch_collection<S>(
	store: &S,
	kind: EntityKind,
	required: &RequiredAppIds,
	page_size: usize,
) -> Result<Vec<EntityRecord>>
where
	S: EntityStore + ?Sized,
{
	let app_ids = required.for_collection(kind);
	if app_ids.is_empty() {
		return Ok(Vec::new());
	}

	let records = fetch_all_pages(store, kind, app_ids, page_size)
		.await
		.map_err(|source| RbacServerError::EntityFetch { kind, source })?;
	let fetched = records.len();

	let kept: Vec<EntityRecord> = records
		.into_iter()
		.filter(|record| record.entity.kind() == kind && app_ids.contains(&record.app_id))
		.collect();
	if kept.len() != fetched {
		warn!(%kind, dropped = fetched - kept.len(), "store returned records outside the requested scope");
	}
	debug!(%kind, apps = app_ids.len(), records = kept.len(), "fetched collection");
	Ok(kept)
}
