// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Drain a paged collection query.
//!
//! Pages are requested sequentially. Iteration stops at the first empty page
//! or once the offset reaches the reported total, so a store whose total
//! shrinks mid-scan terminates rather than spinning.

use std::collections::BTreeSet;

use futures::stream::{self, Stream, TryStreamExt};
use keel_rbac_core::{AppId, EntityKind};
use tracing::trace;

use crate::store::{EntityRecord, EntityStore, PageRequest, StoreError};

/// Stream successive pages of `kind` for `app_ids`.
pub fn page_stream<'a, S>(
	store: &'a S,
	kind: EntityKind,
	app_ids: &'a BTreeSet<AppId>,
	page_size: usize,
) -> impl Stream<Item = Result<Vec<EntityRecord>, StoreError>> + Send + 'a
where
	S: EntityStore + ?Sized,
{
	stream::try_unfold(Some(0usize), move |cursor| next_page(store, kind, app_ids, page_size, cursor))
}

async fn next_page<S>(
	store: &S,
	kind: EntityKind,
	app_ids: &BTreeSet<AppId>,
	page_size: usize,
	cursor: Option<usize>,
) -> Result<Option<(Vec<EntityRecord>, Option<usize>)>, StoreError>
where
	S: EntityStore + ?Sized,
{
	let Some(offset) = cursor else {
		return Ok(None);
	};
	let page = store
		.list_entities(kind, app_ids, PageRequest { offset, limit: page_size })
		.await?;
	trace!(%kind, offset, fetched = page.items.len(), total = page.total, "fetched page");

	if page.items.is_empty() {
		return Ok(None);
	}
	let next_offset = offset + page.items.len();
	let next = (next_offset < page.total).then_some(next_offset);
	Ok(Some((page.items, next)))
}

/// Fetch every record of `kind` for `app_ids`.
pub async fn fetch_all_pages<S>(
	store: &S,
	kind: EntityKind,
	app_ids: &BTreeSet<AppId>,
	page_size: usize,
) -> Result<Vec<EntityRecord>, StoreError>
where
	S: EntityStore + ?Sized,
{
	page_stream(store, kind, app_ids, page_size).try_concat().await
}
