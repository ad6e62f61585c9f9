// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-entity-type resolution of an entity filter to concrete entity IDs.
//!
//! Each entity type has a stateless resolver; [`resolver_for`] is the lookup
//! table the assembler dispatches through. Pipelines filtered by environment
//! are not handled here: they go through the stage-matching procedure in the
//! assembler.

use std::collections::BTreeSet;

use tracing::info;

use crate::entity::AppEntities;
use crate::error::{RbacError, Result};
use crate::filter::{EnvFilter, EntityFilter, WorkflowFilter};
use crate::types::{EntityId, EntityType};

pub trait EntityResolver: Send + Sync {
	/// IDs of the entities in `entities` that `filter` selects.
	fn resolve(&self, entities: &AppEntities, filter: Option<&EntityFilter>) -> Result<BTreeSet<EntityId>>;
}

pub struct ServiceResolver;
pub struct ProvisionerResolver;
pub struct EnvResolver;
pub struct WorkflowResolver;
pub struct PipelineResolver;
pub struct DeploymentResolver;

pub fn resolver_for(entity_type: EntityType) -> &'static dyn EntityResolver {
	match entity_type {
		EntityType::Service => &ServiceResolver,
		EntityType::Provisioner => &ProvisionerResolver,
		EntityType::Env => &EnvResolver,
		EntityType::Workflow => &WorkflowResolver,
		EntityType::Pipeline => &PipelineResolver,
		EntityType::Deployment => &DeploymentResolver,
	}
}

fn mismatched(context: &'static str, filter: &EntityFilter) -> RbacError {
	RbacError::invalid_filter(context, filter.shape_name())
}

impl EntityResolver for ServiceResolver {
	fn resolve(&self, entities: &AppEntities, filter: Option<&EntityFilter>) -> Result<BTreeSet<EntityId>> {
		let ids = entities.services.iter().map(|s| &s.id);
		match filter {
			None => Ok(ids.cloned().collect()),
			Some(EntityFilter::Generic(generic)) => generic.select("service", ids),
			Some(other) => Err(mismatched("service", other)),
		}
	}
}

impl EntityResolver for ProvisionerResolver {
	fn resolve(&self, entities: &AppEntities, filter: Option<&EntityFilter>) -> Result<BTreeSet<EntityId>> {
		let ids = entities.provisioners.iter().map(|p| &p.id);
		match filter {
			None => Ok(ids.cloned().collect()),
			Some(EntityFilter::Generic(generic)) => generic.select("provisioner", ids),
			Some(other) => Err(mismatched("provisioner", other)),
		}
	}
}

impl EntityResolver for EnvResolver {
	fn resolve(&self, entities: &AppEntities, filter: Option<&EntityFilter>) -> Result<BTreeSet<EntityId>> {
		match filter {
			None => EnvFilter::default().resolve(&entities.environments),
			Some(EntityFilter::Env(env)) => env.resolve(&entities.environments),
			Some(other) => Err(mismatched("environment", other)),
		}
	}
}

impl EntityResolver for WorkflowResolver {
	fn resolve(&self, entities: &AppEntities, filter: Option<&EntityFilter>) -> Result<BTreeSet<EntityId>> {
		match filter {
			None => WorkflowFilter::default().resolve(&entities.workflows, &entities.environments),
			Some(EntityFilter::Workflow(workflow)) => workflow.resolve(&entities.workflows, &entities.environments),
			Some(EntityFilter::Generic(generic)) => generic.select("workflow", entities.workflows.iter().map(|w| &w.id)),
			Some(other) => Err(mismatched("workflow", other)),
		}
	}
}

/// Only per-entity pipeline grants resolve here.
impl EntityResolver for PipelineResolver {
	fn resolve(&self, entities: &AppEntities, filter: Option<&EntityFilter>) -> Result<BTreeSet<EntityId>> {
		match filter {
			Some(EntityFilter::Generic(generic)) => generic.select("pipeline", entities.pipelines.iter().map(|p| &p.id)),
			None => Ok(entities.pipelines.iter().map(|p| p.id.clone()).collect()),
			Some(other) => Err(mismatched("pipeline", other)),
		}
	}
}

/// Deployments are keyed by the workflow they run: an environment filter on a
/// deployment grant becomes a workflow filter that also admits templates.
impl EntityResolver for DeploymentResolver {
	fn resolve(&self, entities: &AppEntities, filter: Option<&EntityFilter>) -> Result<BTreeSet<EntityId>> {
		let default_filter = EnvFilter::default();
		let env_filter = match filter {
			None => &default_filter,
			Some(EntityFilter::Env(env)) => env,
			Some(other) => return Err(mismatched("deployment", other)),
		};

		let env_ids = env_filter.resolve(&entities.environments)?;
		if env_ids.is_empty() && !entities.environments.is_empty() {
			info!("deployment env filter matched no environments, granting no workflows");
			return Ok(BTreeSet::new());
		}

		env_filter
			.to_deployment_workflow_filter()
			.resolve(&entities.workflows, &entities.environments)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::entity::{Environment, Pipeline, Service, Workflow};
	use crate::filter::{EnvFilterType, GenericEntityFilter, WorkflowFilterType};
	use crate::types::EnvironmentType;

	fn ids(raw: &[&str]) -> BTreeSet<EntityId> {
		raw.iter().map(|id| EntityId::new(*id)).collect()
	}

	fn app() -> AppEntities {
		AppEntities {
			services: vec![Service { id: "s1".into() }, Service { id: "s2".into() }],
			provisioners: vec![],
			environments: vec![
				Environment::new("prod", EnvironmentType::Prod),
				Environment::new("qa", EnvironmentType::NonProd),
			],
			workflows: vec![
				Workflow::new("wf-prod", Some("prod")),
				Workflow::new("wf-qa", Some("qa")),
				Workflow::templatized("wf-tmpl"),
			],
			pipelines: vec![Pipeline::deploying_to("p1", &["prod"])],
		}
	}

	#[test]
	fn service_without_filter_is_all() {
		let resolved = resolver_for(EntityType::Service).resolve(&app(), None).unwrap();
		assert_eq!(resolved, ids(&["s1", "s2"]));
	}

	#[test]
	fn service_with_env_filter_is_rejected() {
		let filter = EntityFilter::Env(EnvFilter::default());
		let err = resolver_for(EntityType::Service).resolve(&app(), Some(&filter)).unwrap_err();
		assert_eq!(
			err,
			RbacError::InvalidFilterType {
				context: "service",
				filter_type: "ENV".to_string()
			}
		);
	}

	#[test]
	fn workflow_accepts_generic_filter() {
		let filter = EntityFilter::Generic(GenericEntityFilter::selected(["wf-qa"]));
		let resolved = resolver_for(EntityType::Workflow).resolve(&app(), Some(&filter)).unwrap();
		assert_eq!(resolved, ids(&["wf-qa"]));
	}

	#[test]
	fn workflow_filter_by_type() {
		let filter = EntityFilter::Workflow(WorkflowFilter::of_types(&[WorkflowFilterType::NonProd]));
		let resolved = resolver_for(EntityType::Workflow).resolve(&app(), Some(&filter)).unwrap();
		assert_eq!(resolved, ids(&["wf-qa"]));
	}

	#[test]
	fn deployment_env_filter_adds_templates() {
		let filter = EntityFilter::Env(EnvFilter::of_types(&[EnvFilterType::Prod]));
		let resolved = resolver_for(EntityType::Deployment).resolve(&app(), Some(&filter)).unwrap();
		assert_eq!(resolved, ids(&["wf-prod", "wf-tmpl"]));
	}

	#[test]
	fn deployment_with_no_matching_env_grants_nothing() {
		let filter = EntityFilter::Env(EnvFilter::selected(["gone"]));
		let resolved = resolver_for(EntityType::Deployment).resolve(&app(), Some(&filter)).unwrap();
		assert!(resolved.is_empty());
	}

	#[test]
	fn deployment_in_app_without_environments_uses_workflow_filter() {
		let entities = AppEntities {
			workflows: vec![Workflow::new("wf-free", None), Workflow::templatized("wf-tmpl")],
			..AppEntities::default()
		};
		let filter = EntityFilter::Env(EnvFilter::selected(["gone"]));
		let resolved = resolver_for(EntityType::Deployment).resolve(&entities, Some(&filter)).unwrap();
		assert_eq!(resolved, ids(&["wf-free", "wf-tmpl"]));
	}

	#[test]
	fn pipeline_generic_filter() {
		let filter = EntityFilter::Generic(GenericEntityFilter::All);
		let resolved = resolver_for(EntityType::Pipeline).resolve(&app(), Some(&filter)).unwrap();
		assert_eq!(resolved, ids(&["p1"]));
	}
}
