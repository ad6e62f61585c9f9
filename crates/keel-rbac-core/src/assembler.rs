// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Second pass: apply every application permission, in declaration order, to
//! the fetched entities and accumulate per-entity action sets.
//!
//! Pipelines are granted through their stages. A pipeline matches an
//! environment-filtered grant when every environment it deploys to is covered,
//! either by the current grant or by an earlier grant of the same target. Cover
//! from an earlier grant narrows the result to the actions both grants share.
//! The record of earlier grants is an explicit [`EnvActionLedger`] owned by the
//! assembler for the duration of one computation.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, error};

use crate::entity::{EntitySnapshot, EnvReference, Pipeline};
use crate::error::{RbacError, Result};
use crate::filter::{AppFilter, EnvFilter, EntityFilter, WorkflowFilter};
use crate::group::{AppPermission, UserGroup};
use crate::resolver::resolver_for;
use crate::types::{AppId, Action, EntityId, EntityType, EnvironmentType, PermissionType};

pub type EntityActionMap = BTreeMap<EntityId, BTreeSet<Action>>;

/// Environment IDs granted by earlier permissions, with the actions granted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvActionLedger {
	entries: BTreeMap<EntityId, BTreeSet<Action>>,
}

impl EnvActionLedger {
	pub fn record(&mut self, env_ids: &BTreeSet<EntityId>, actions: &BTreeSet<Action>) {
		for env_id in env_ids {
			self.entries
				.entry(env_id.clone())
				.or_default()
				.extend(actions.iter().copied());
		}
	}

	pub fn actions_for(&self, env_id: &str) -> Option<&BTreeSet<Action>> {
		self.entries.get(env_id)
	}
}

/// Per-application accumulation before compaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppPermissionAccumulator {
	pub services: EntityActionMap,
	pub provisioners: EntityActionMap,
	pub envs: EntityActionMap,
	pub workflows: EntityActionMap,
	pub pipelines: EntityActionMap,
	pub deployments: EntityActionMap,
	pub can_create_service: bool,
	pub can_create_provisioner: bool,
	pub can_create_environment: bool,
	pub can_create_workflow: bool,
	pub can_create_pipeline: bool,
	pub env_create_types: BTreeSet<EnvironmentType>,
	pub can_create_templatized_workflow: bool,
}

impl AppPermissionAccumulator {
	pub fn actions(&self, entity_type: EntityType) -> &EntityActionMap {
		match entity_type {
			EntityType::Service => &self.services,
			EntityType::Provisioner => &self.provisioners,
			EntityType::Env => &self.envs,
			EntityType::Workflow => &self.workflows,
			EntityType::Pipeline => &self.pipelines,
			EntityType::Deployment => &self.deployments,
		}
	}

	fn actions_mut(&mut self, entity_type: EntityType) -> &mut EntityActionMap {
		match entity_type {
			EntityType::Service => &mut self.services,
			EntityType::Provisioner => &mut self.provisioners,
			EntityType::Env => &mut self.envs,
			EntityType::Workflow => &mut self.workflows,
			EntityType::Pipeline => &mut self.pipelines,
			EntityType::Deployment => &mut self.deployments,
		}
	}

	fn grant(&mut self, entity_type: EntityType, ids: BTreeSet<EntityId>, actions: &BTreeSet<Action>) {
		let map = self.actions_mut(entity_type);
		for id in ids {
			map.entry(id).or_default().extend(actions.iter().copied());
		}
	}

	fn record_create(&mut self, entity_type: EntityType, filter: Option<&EntityFilter>) -> Result<()> {
		match entity_type {
			EntityType::Service => self.can_create_service = true,
			EntityType::Provisioner => self.can_create_provisioner = true,
			EntityType::Pipeline => self.can_create_pipeline = true,
			EntityType::Deployment => {}
			EntityType::Env => {
				let types = match filter {
					None => EnvFilter::default().environment_types(),
					Some(EntityFilter::Env(env)) => {
						env.validate()?;
						env.environment_types()
					}
					Some(other) => return Err(RbacError::invalid_filter("environment", other.shape_name())),
				};
				self.can_create_environment = true;
				self.env_create_types.extend(types);
			}
			EntityType::Workflow => {
				let templates = match filter {
					None => WorkflowFilter::default().includes_templates(),
					Some(EntityFilter::Workflow(workflow)) => {
						workflow.validate()?;
						workflow.includes_templates()
					}
					Some(EntityFilter::Generic(_)) => false,
					Some(other) => return Err(RbacError::invalid_filter("workflow", other.shape_name())),
				};
				self.can_create_workflow = true;
				self.can_create_templatized_workflow |= templates;
			}
		}
		Ok(())
	}
}

/// Output of the assembly pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledPermissions {
	/// Every application touched by at least one permission, even when the
	/// permission granted nothing there.
	pub apps: BTreeMap<AppId, AppPermissionAccumulator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineTarget {
	Pipeline,
	Deployment,
}

impl PipelineTarget {
	fn entity_type(self) -> EntityType {
		match self {
			PipelineTarget::Pipeline => EntityType::Pipeline,
			PipelineTarget::Deployment => EntityType::Deployment,
		}
	}
}

/// Entity types a blanket `ALL_APP_ENTITIES` grant attaches through the
/// resolver table. Pipelines and pipeline-keyed deployments follow separately.
const ALL_APP_ENTITY_TYPES: [EntityType; 5] = [
	EntityType::Service,
	EntityType::Provisioner,
	EntityType::Env,
	EntityType::Workflow,
	EntityType::Deployment,
];

pub struct PermissionAssembler<'a> {
	snapshot: &'a EntitySnapshot,
	all_app_ids: &'a BTreeSet<AppId>,
	apps: BTreeMap<AppId, AppPermissionAccumulator>,
	pipeline_ledger: EnvActionLedger,
	deployment_ledger: EnvActionLedger,
}

impl<'a> PermissionAssembler<'a> {
	pub fn new(snapshot: &'a EntitySnapshot, all_app_ids: &'a BTreeSet<AppId>) -> Self {
		Self {
			snapshot,
			all_app_ids,
			apps: BTreeMap::new(),
			pipeline_ledger: EnvActionLedger::default(),
			deployment_ledger: EnvActionLedger::default(),
		}
	}

	pub fn assemble(mut self, groups: &[UserGroup]) -> Result<AssembledPermissions> {
		for group in groups {
			for permission in &group.app_permissions {
				self.apply(permission)?;
			}
		}
		Ok(AssembledPermissions { apps: self.apps })
	}

	fn apply(&mut self, permission: &AppPermission) -> Result<()> {
		if permission.actions.is_empty() {
			error!(
				permission_type = %permission.permission_type,
				"app permission carries no actions, skipping"
			);
			return Ok(());
		}

		let app_ids = AppFilter::resolve(permission.app_filter.as_ref(), self.all_app_ids)?;
		let filter = permission.entity_filter.as_ref();
		let actions = &permission.actions;

		match permission.permission_type {
			PermissionType::AllAppEntities => {
				for entity_type in ALL_APP_ENTITY_TYPES {
					self.attach(&app_ids, entity_type, None, actions)?;
				}
				self.attach_pipelines(&app_ids, PipelineTarget::Pipeline, None, actions)?;
				self.attach_pipelines(&app_ids, PipelineTarget::Deployment, None, actions)?;
			}
			PermissionType::Pipeline => {
				self.attach_pipelines(&app_ids, PipelineTarget::Pipeline, filter, actions)?;
			}
			PermissionType::Deployment => {
				self.attach(&app_ids, EntityType::Deployment, filter, actions)?;
				self.attach_pipelines(&app_ids, PipelineTarget::Deployment, filter, actions)?;
			}
			other => {
				let entity_type = EntityType::try_from(other)?;
				self.attach(&app_ids, entity_type, filter, actions)?;
			}
		}
		Ok(())
	}

	fn attach(
		&mut self,
		app_ids: &BTreeSet<AppId>,
		entity_type: EntityType,
		filter: Option<&EntityFilter>,
		actions: &BTreeSet<Action>,
	) -> Result<()> {
		let entity_actions = Action::entity_actions(actions);
		let resolver = resolver_for(entity_type);

		for app_id in app_ids {
			let accumulator = self.apps.entry(app_id.clone()).or_default();
			if actions.contains(&Action::Create) {
				accumulator.record_create(entity_type, filter)?;
			}
			if entity_actions.is_empty() {
				continue;
			}
			let ids = resolver.resolve(self.snapshot.app(app_id), filter)?;
			accumulator.grant(entity_type, ids, &entity_actions);
		}
		Ok(())
	}

	fn attach_pipelines(
		&mut self,
		app_ids: &BTreeSet<AppId>,
		target: PipelineTarget,
		filter: Option<&EntityFilter>,
		actions: &BTreeSet<Action>,
	) -> Result<()> {
		let default_filter = EnvFilter::default();
		let env_filter = match filter {
			Some(EntityFilter::Generic(_)) if target == PipelineTarget::Pipeline => {
				return self.attach(app_ids, EntityType::Pipeline, filter, actions);
			}
			None => &default_filter,
			Some(EntityFilter::Env(env)) => env,
			Some(other) => {
				return Err(RbacError::invalid_filter(
					if target == PipelineTarget::Pipeline { "pipeline" } else { "deployment" },
					other.shape_name(),
				));
			}
		};

		let entity_actions = Action::entity_actions(actions);
		let ledger = match target {
			PipelineTarget::Pipeline => &mut self.pipeline_ledger,
			PipelineTarget::Deployment => &mut self.deployment_ledger,
		};

		for app_id in app_ids {
			let accumulator = self.apps.entry(app_id.clone()).or_default();
			if target == PipelineTarget::Pipeline && actions.contains(&Action::Create) {
				accumulator.can_create_pipeline = true;
			}
			if entity_actions.is_empty() {
				continue;
			}

			let entities = self.snapshot.app(app_id);
			let env_ids = env_filter.resolve(&entities.environments)?;
			ledger.record(&env_ids, &entity_actions);

			for pipeline in &entities.pipelines {
				if let Some(granted) = match_pipeline(pipeline, &env_ids, ledger, &entity_actions) {
					if !granted.is_empty() {
						accumulator.grant(target.entity_type(), [pipeline.id.clone()].into(), &granted);
					}
				}
			}
		}
		Ok(())
	}
}

/// Decide whether `pipeline` matches an environment-filtered grant and, if so,
/// with which actions.
///
/// Approvals, deploy elements without an environment and `${...}` expressions
/// match. A concrete environment matches when the current grant covers it, or
/// when an earlier grant recorded in `ledger` does; the latter narrows the
/// result to the actions that grant held.
pub fn match_pipeline(
	pipeline: &Pipeline,
	env_ids: &BTreeSet<EntityId>,
	ledger: &EnvActionLedger,
	actions: &BTreeSet<Action>,
) -> Option<BTreeSet<Action>> {
	let mut granted = actions.clone();

	for element in pipeline.elements() {
		match element.env_reference() {
			None | Some(EnvReference::Absent) => {}
			Some(EnvReference::Unresolved(expression)) => {
				debug!(pipeline_id = %pipeline.id, %expression, "pipeline env is an expression, treating as matched");
			}
			Some(EnvReference::Literal(env_id)) => {
				if env_ids.contains(env_id) {
					continue;
				}
				let other = ledger.actions_for(env_id)?;
				granted.retain(|action| other.contains(action));
			}
		}
	}

	Some(granted)
}
