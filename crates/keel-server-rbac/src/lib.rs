// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server-side glue around the Keel RBAC engine.
//!
//! [`AuthHandler::compute_permissions`] gates enforcement on a per-account
//! feature flag, fetches the entities the user's groups need through an
//! [`EntityStore`], and hands them to `keel-rbac-core` to build a
//! [`PermissionInfo`](keel_rbac_core::PermissionInfo). [`PermissionCache`]
//! keeps the result per user until it expires or is invalidated.

pub mod cache;
pub mod error;
pub mod fetch;
pub mod flags;
pub mod handler;
pub mod logging;
pub mod memory;
pub mod paging;
pub mod store;

pub use cache::PermissionCache;
pub use error::{RbacServerError, Result};
pub use fetch::fetch_snapshot;
pub use flags::{FeatureFlagSource, StaticFeatureFlags};
pub use handler::AuthHandler;
pub use logging::init_tracing;
pub use memory::InMemoryEntityStore;
pub use paging::{fetch_all_pages, page_stream};
pub use store::{EntityRecord, EntityStore, Page, PageRequest, StoreError};
