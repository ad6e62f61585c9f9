// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application entities as seen by the permission engine.
//!
//! Only the fields that influence permission resolution are modelled. The
//! [`EntitySnapshot`] holds everything fetched for one computation, grouped by
//! owning application.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::{AppId, EntityId, EntityType, EnvironmentType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
	pub id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provisioner {
	pub id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
	pub id: EntityId,
	pub env_type: EnvironmentType,
}

impl Environment {
	pub fn new(id: impl Into<EntityId>, env_type: EnvironmentType) -> Self {
		Self {
			id: id.into(),
			env_type,
		}
	}
}

/// A workflow bound to at most one environment.
///
/// An env-templatized workflow picks its environment at run time, so its
/// visibility is governed by the `TEMPLATES` workflow filter type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
	pub id: EntityId,
	#[serde(default)]
	pub env_id: Option<EntityId>,
	#[serde(default)]
	pub env_templatized: bool,
}

impl Workflow {
	pub fn new(id: impl Into<EntityId>, env_id: Option<&str>) -> Self {
		Self {
			id: id.into(),
			env_id: env_id.map(EntityId::from),
			env_templatized: false,
		}
	}

	pub fn templatized(id: impl Into<EntityId>) -> Self {
		Self {
			id: id.into(),
			env_id: None,
			env_templatized: true,
		}
	}
}

/// An element inside a pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageElement {
	Approval,
	Deploy {
		#[serde(default)]
		env_id: Option<String>,
	},
}

/// How a stage element refers to an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvReference<'a> {
	/// No environment recorded on the element.
	Absent,
	/// A `${...}` expression resolved only when the pipeline runs.
	Unresolved(&'a str),
	/// A concrete environment ID.
	Literal(&'a str),
}

impl StageElement {
	pub fn deploy(env_id: &str) -> Self {
		StageElement::Deploy {
			env_id: Some(env_id.to_string()),
		}
	}

	/// The environment reference carried by this element. Approvals carry none.
	pub fn env_reference(&self) -> Option<EnvReference<'_>> {
		match self {
			StageElement::Approval => None,
			StageElement::Deploy { env_id: None } => Some(EnvReference::Absent),
			StageElement::Deploy { env_id: Some(env) } if is_expression(env) => Some(EnvReference::Unresolved(env)),
			StageElement::Deploy { env_id: Some(env) } if env.is_empty() => Some(EnvReference::Absent),
			StageElement::Deploy { env_id: Some(env) } => Some(EnvReference::Literal(env)),
		}
	}
}

fn is_expression(value: &str) -> bool {
	match value.find("${") {
		Some(start) => value[start + 2..].contains('}'),
		None => false,
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStage {
	pub elements: Vec<StageElement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
	pub id: EntityId,
	#[serde(default)]
	pub stages: Vec<PipelineStage>,
}

impl Pipeline {
	pub fn new(id: impl Into<EntityId>, stages: Vec<PipelineStage>) -> Self {
		Self { id: id.into(), stages }
	}

	/// Convenience constructor: one stage per environment, each deploying to it.
	pub fn deploying_to(id: impl Into<EntityId>, env_ids: &[&str]) -> Self {
		let stages = env_ids
			.iter()
			.map(|env| PipelineStage {
				elements: vec![StageElement::deploy(env)],
			})
			.collect();
		Self::new(id, stages)
	}

	pub fn elements(&self) -> impl Iterator<Item = &StageElement> {
		self.stages.iter().flat_map(|stage| stage.elements.iter())
	}

	/// True when every concrete environment this pipeline deploys to is in
	/// `allowed`. Approvals, absent references and unresolved expressions do
	/// not constrain the result.
	pub fn deploys_only_to(&self, allowed: &BTreeSet<EntityId>) -> bool {
		self.elements().all(|element| match element.env_reference() {
			Some(EnvReference::Literal(env)) => allowed.contains(env),
			_ => true,
		})
	}
}

/// A fetched entity of any kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
	Service(Service),
	Provisioner(Provisioner),
	Environment(Environment),
	Workflow(Workflow),
	Pipeline(Pipeline),
}

impl Entity {
	pub fn kind(&self) -> EntityKind {
		match self {
			Entity::Service(_) => EntityKind::Service,
			Entity::Provisioner(_) => EntityKind::Provisioner,
			Entity::Environment(_) => EntityKind::Environment,
			Entity::Workflow(_) => EntityKind::Workflow,
			Entity::Pipeline(_) => EntityKind::Pipeline,
		}
	}

	pub fn id(&self) -> &EntityId {
		match self {
			Entity::Service(s) => &s.id,
			Entity::Provisioner(p) => &p.id,
			Entity::Environment(e) => &e.id,
			Entity::Workflow(w) => &w.id,
			Entity::Pipeline(p) => &p.id,
		}
	}
}

/// The five collections an entity store serves.
///
/// Deployments are not stored entities: their permissions are derived from
/// workflows and pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
	Service,
	Provisioner,
	Environment,
	Workflow,
	Pipeline,
}

impl EntityKind {
	pub const ALL: [EntityKind; 5] = [
		EntityKind::Service,
		EntityKind::Provisioner,
		EntityKind::Environment,
		EntityKind::Workflow,
		EntityKind::Pipeline,
	];

	pub fn entity_type(self) -> EntityType {
		match self {
			EntityKind::Service => EntityType::Service,
			EntityKind::Provisioner => EntityType::Provisioner,
			EntityKind::Environment => EntityType::Env,
			EntityKind::Workflow => EntityType::Workflow,
			EntityKind::Pipeline => EntityType::Pipeline,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			EntityKind::Service => "service",
			EntityKind::Provisioner => "provisioner",
			EntityKind::Environment => "environment",
			EntityKind::Workflow => "workflow",
			EntityKind::Pipeline => "pipeline",
		}
	}
}

impl std::fmt::Display for EntityKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// All fetched entities of one application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppEntities {
	pub services: Vec<Service>,
	pub provisioners: Vec<Provisioner>,
	pub environments: Vec<Environment>,
	pub workflows: Vec<Workflow>,
	pub pipelines: Vec<Pipeline>,
}

static EMPTY_APP: AppEntities = AppEntities::new();

impl AppEntities {
	pub const fn new() -> Self {
		Self {
			services: Vec::new(),
			provisioners: Vec::new(),
			environments: Vec::new(),
			workflows: Vec::new(),
			pipelines: Vec::new(),
		}
	}

	pub fn insert(&mut self, entity: Entity) {
		match entity {
			Entity::Service(s) => self.services.push(s),
			Entity::Provisioner(p) => self.provisioners.push(p),
			Entity::Environment(e) => self.environments.push(e),
			Entity::Workflow(w) => self.workflows.push(w),
			Entity::Pipeline(p) => self.pipelines.push(p),
		}
	}

	pub fn env_type(&self, env_id: &str) -> Option<EnvironmentType> {
		self.environments
			.iter()
			.find(|env| env.id.as_str() == env_id)
			.map(|env| env.env_type)
	}
}

/// Entities fetched for one permission computation, keyed by application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitySnapshot {
	apps: BTreeMap<AppId, AppEntities>,
}

impl EntitySnapshot {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, app_id: AppId, entity: Entity) {
		self.apps.entry(app_id).or_default().insert(entity);
	}

	pub fn with(mut self, app_id: &str, entity: Entity) -> Self {
		self.insert(AppId::new(app_id), entity);
		self
	}

	/// Entities of one application; an application nothing was fetched for has
	/// no entities.
	pub fn app(&self, app_id: &AppId) -> &AppEntities {
		self.apps.get(app_id).unwrap_or(&EMPTY_APP)
	}

	pub fn app_ids(&self) -> impl Iterator<Item = &AppId> {
		self.apps.keys()
	}
}
