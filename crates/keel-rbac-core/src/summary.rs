// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Compaction of accumulated per-entity actions into the read-optimized
//! per-application summary used at request time.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;
use tracing::warn;

use crate::assembler::{AppPermissionAccumulator, EntityActionMap};
use crate::entity::AppEntities;
use crate::types::{AppId, Action, EntityId, EntityType, EnvironmentType};

/// One collection per entity action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionBuckets<T> {
	pub read: T,
	pub update: T,
	pub delete: T,
	pub execute: T,
}

impl<T> ActionBuckets<T> {
	/// The bucket for `action`; `Create` has none.
	pub fn get(&self, action: Action) -> Option<&T> {
		match action {
			Action::Read => Some(&self.read),
			Action::Update => Some(&self.update),
			Action::Delete => Some(&self.delete),
			Action::Execute => Some(&self.execute),
			Action::Create => None,
		}
	}

	fn get_mut(&mut self, action: Action) -> Option<&mut T> {
		match action {
			Action::Read => Some(&mut self.read),
			Action::Update => Some(&mut self.update),
			Action::Delete => Some(&mut self.delete),
			Action::Execute => Some(&mut self.execute),
			Action::Create => None,
		}
	}
}

pub type EntityBuckets = ActionBuckets<HashSet<EntityId>>;
pub type EnvBuckets = ActionBuckets<HashMap<EntityId, EnvironmentType>>;

/// Everything a user may do inside one application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppPermissionSummary {
	pub services: EntityBuckets,
	pub provisioners: EntityBuckets,
	pub envs: EnvBuckets,
	pub workflows: EntityBuckets,
	pub pipelines: EntityBuckets,
	pub deployments: EntityBuckets,
	pub can_create_service: bool,
	pub can_create_provisioner: bool,
	pub can_create_environment: bool,
	pub can_create_workflow: bool,
	pub can_create_pipeline: bool,
	pub env_create_types: BTreeSet<EnvironmentType>,
	pub can_create_templatized_workflow: bool,
}

impl AppPermissionSummary {
	pub fn allows(&self, entity_type: EntityType, action: Action, entity_id: &str) -> bool {
		if action == Action::Create {
			return self.can_create(entity_type);
		}
		match entity_type {
			EntityType::Env => self.envs.get(action).is_some_and(|bucket| bucket.contains_key(entity_id)),
			other => self
				.entity_buckets(other)
				.and_then(|buckets| buckets.get(action))
				.is_some_and(|bucket| bucket.contains(entity_id)),
		}
	}

	pub fn can_create(&self, entity_type: EntityType) -> bool {
		match entity_type {
			EntityType::Service => self.can_create_service,
			EntityType::Provisioner => self.can_create_provisioner,
			EntityType::Env => self.can_create_environment,
			EntityType::Workflow => self.can_create_workflow,
			EntityType::Pipeline => self.can_create_pipeline,
			EntityType::Deployment => false,
		}
	}

	/// IDs holding `action` on entities of `entity_type`.
	pub fn entity_ids(&self, entity_type: EntityType, action: Action) -> Vec<&EntityId> {
		match entity_type {
			EntityType::Env => self
				.envs
				.get(action)
				.map(|bucket| bucket.keys().collect())
				.unwrap_or_default(),
			other => self
				.entity_buckets(other)
				.and_then(|buckets| buckets.get(action))
				.map(|bucket| bucket.iter().collect())
				.unwrap_or_default(),
		}
	}

	fn entity_buckets(&self, entity_type: EntityType) -> Option<&EntityBuckets> {
		match entity_type {
			EntityType::Service => Some(&self.services),
			EntityType::Provisioner => Some(&self.provisioners),
			EntityType::Workflow => Some(&self.workflows),
			EntityType::Pipeline => Some(&self.pipelines),
			EntityType::Deployment => Some(&self.deployments),
			EntityType::Env => None,
		}
	}
}

/// Bucket accumulated actions and attach environment types.
///
/// An environment whose type cannot be found among the application's fetched
/// environments is dropped with a warning.
pub fn compact(app_id: &AppId, accumulator: AppPermissionAccumulator, entities: &AppEntities) -> AppPermissionSummary {
	let AppPermissionAccumulator {
		services,
		provisioners,
		envs,
		workflows,
		pipelines,
		deployments,
		can_create_service,
		can_create_provisioner,
		can_create_environment,
		can_create_workflow,
		can_create_pipeline,
		env_create_types,
		can_create_templatized_workflow,
	} = accumulator;

	AppPermissionSummary {
		services: bucket_entities(services),
		provisioners: bucket_entities(provisioners),
		envs: bucket_environments(app_id, envs, entities),
		workflows: bucket_entities(workflows),
		pipelines: bucket_entities(pipelines),
		deployments: bucket_entities(deployments),
		can_create_service,
		can_create_provisioner,
		can_create_environment,
		can_create_workflow,
		can_create_pipeline,
		env_create_types,
		can_create_templatized_workflow,
	}
}

fn bucket_entities(actions: EntityActionMap) -> EntityBuckets {
	let mut buckets = EntityBuckets::default();
	for (entity_id, held) in actions {
		for action in held {
			if let Some(bucket) = buckets.get_mut(action) {
				bucket.insert(entity_id.clone());
			}
		}
	}
	buckets
}

fn bucket_environments(app_id: &AppId, actions: EntityActionMap, entities: &AppEntities) -> EnvBuckets {
	let mut buckets = EnvBuckets::default();
	for (env_id, held) in actions {
		let Some(env_type) = entities.env_type(env_id.as_str()) else {
			warn!(%app_id, %env_id, "environment type unknown, dropping from permission summary");
			continue;
		};
		for action in held {
			if let Some(bucket) = buckets.get_mut(action) {
				bucket.insert(env_id.clone(), env_type);
			}
		}
	}
	buckets
}
