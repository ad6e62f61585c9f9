// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application RBAC engine for Keel.
//!
//! Turns a user's group memberships into a per-application summary of which
//! entities they may read, update, delete or execute, and answers
//! authorization queries against that summary.
//!
//! A computation runs in three steps:
//!
//! 1. [`collect_required_app_ids`] works out which entity collections must be
//!    fetched for which applications.
//! 2. The host fetches those entities into an [`EntitySnapshot`].
//! 3. [`build_permission_info`] assembles and compacts the grants into a
//!    [`PermissionInfo`].
//!
//! Evaluation ([`PermissionInfo::authorize`],
//! [`PermissionInfo::entity_ids_visible_for`]) is pure and cheap.
//!
//! This crate does no I/O. Fetching, feature flags and caching live in
//! `keel-server-rbac`.

pub mod assembler;
pub mod collector;
pub mod entity;
pub mod error;
pub mod evaluator;
pub mod filter;
pub mod group;
pub mod info;
pub mod resolver;
pub mod summary;
pub mod types;

pub use assembler::{AppPermissionAccumulator, AssembledPermissions, EnvActionLedger, PermissionAssembler};
pub use collector::{collect_account_permissions, collect_required_app_ids, RequiredAppIds};
pub use entity::{
	AppEntities, Entity, EntityKind, EntitySnapshot, EnvReference, Environment, Pipeline, PipelineStage, Provisioner,
	Service, StageElement, Workflow,
};
pub use error::{RbacError, Result};
pub use evaluator::EntityIdFilter;
pub use filter::{
	AppFilter, EntityFilter, EnvFilter, EnvFilterType, GenericEntityFilter, WorkflowFilter, WorkflowFilterType,
};
pub use group::{AppPermission, UserGroup};
pub use info::{build_permission_info, PermissionInfo};
pub use resolver::{resolver_for, EntityResolver};
pub use summary::{ActionBuckets, AppPermissionSummary, EntityBuckets, EnvBuckets};
pub use types::{
	AccountId, Action, AppId, EntityId, EntityType, EnvironmentType, PermissionAttribute, PermissionType, UserId,
};
