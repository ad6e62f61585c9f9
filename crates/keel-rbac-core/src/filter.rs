// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application and entity filters attached to a permission.
//!
//! Filters arrive from stored group definitions, so every filter type enum
//! carries an `Unrecognized` catch-all. Deserialization always succeeds and the
//! unknown type surfaces as [`RbacError::InvalidFilterType`] when the filter is
//! resolved, which fails the whole computation closed.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::entity::{Environment, Workflow};
use crate::error::{RbacError, Result};
use crate::types::{AppId, EntityId, EnvironmentType};

// =============================================================================
// Application Filter
// =============================================================================

/// Selects the applications a permission applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "filter_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppFilter {
	All,
	Selected {
		#[serde(default)]
		ids: BTreeSet<AppId>,
	},
	ExcludeSelected {
		#[serde(default)]
		ids: BTreeSet<AppId>,
	},
	#[serde(other)]
	Unrecognized,
}

impl AppFilter {
	pub fn selected<I, T>(ids: I) -> Self
	where
		I: IntoIterator<Item = T>,
		T: Into<AppId>,
	{
		AppFilter::Selected {
			ids: ids.into_iter().map(Into::into).collect(),
		}
	}

	pub fn exclude_selected<I, T>(ids: I) -> Self
	where
		I: IntoIterator<Item = T>,
		T: Into<AppId>,
	{
		AppFilter::ExcludeSelected {
			ids: ids.into_iter().map(Into::into).collect(),
		}
	}

	/// Resolve an optional filter against the account's applications.
	///
	/// A missing filter means every application. Selected IDs that are not in
	/// the account are dropped.
	pub fn resolve(filter: Option<&AppFilter>, all_app_ids: &BTreeSet<AppId>) -> Result<BTreeSet<AppId>> {
		match filter {
			None | Some(AppFilter::All) => Ok(all_app_ids.clone()),
			Some(AppFilter::Selected { ids }) => Ok(all_app_ids.intersection(ids).cloned().collect()),
			Some(AppFilter::ExcludeSelected { ids }) => Ok(all_app_ids.difference(ids).cloned().collect()),
			Some(AppFilter::Unrecognized) => Err(RbacError::invalid_filter("app", "UNRECOGNIZED")),
		}
	}
}

// =============================================================================
// Generic Entity Filter
// =============================================================================

/// Selects individual entities by ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "filter_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenericEntityFilter {
	All,
	Selected {
		#[serde(default)]
		ids: BTreeSet<EntityId>,
	},
	#[serde(other)]
	Unrecognized,
}

impl GenericEntityFilter {
	pub fn selected<I, T>(ids: I) -> Self
	where
		I: IntoIterator<Item = T>,
		T: Into<EntityId>,
	{
		GenericEntityFilter::Selected {
			ids: ids.into_iter().map(Into::into).collect(),
		}
	}

	/// Pick the matching IDs out of `candidates`.
	pub fn select<'a, I>(&self, context: &'static str, candidates: I) -> Result<BTreeSet<EntityId>>
	where
		I: IntoIterator<Item = &'a EntityId>,
	{
		match self {
			GenericEntityFilter::All => Ok(candidates.into_iter().cloned().collect()),
			GenericEntityFilter::Selected { ids } => {
				Ok(candidates.into_iter().filter(|id| ids.contains(*id)).cloned().collect())
			}
			GenericEntityFilter::Unrecognized => Err(RbacError::invalid_filter(context, "UNRECOGNIZED")),
		}
	}
}

// =============================================================================
// Environment Filter
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvFilterType {
	Prod,
	NonProd,
	Selected,
	#[serde(other)]
	Unrecognized,
}

/// Selects environments by type, or by explicit ID when `SELECTED` is present.
///
/// An empty type set behaves as `{PROD, NON_PROD}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvFilter {
	pub filter_types: BTreeSet<EnvFilterType>,
	pub ids: BTreeSet<EntityId>,
}

impl EnvFilter {
	pub fn of_types(types: &[EnvFilterType]) -> Self {
		Self {
			filter_types: types.iter().copied().collect(),
			ids: BTreeSet::new(),
		}
	}

	pub fn selected<I, T>(ids: I) -> Self
	where
		I: IntoIterator<Item = T>,
		T: Into<EntityId>,
	{
		Self {
			filter_types: [EnvFilterType::Selected].into_iter().collect(),
			ids: ids.into_iter().map(Into::into).collect(),
		}
	}

	pub fn effective_types(&self) -> BTreeSet<EnvFilterType> {
		if self.filter_types.is_empty() {
			[EnvFilterType::Prod, EnvFilterType::NonProd].into_iter().collect()
		} else {
			self.filter_types.clone()
		}
	}

	pub fn validate(&self) -> Result<()> {
		if self.filter_types.contains(&EnvFilterType::Unrecognized) {
			return Err(RbacError::invalid_filter("environment", "UNRECOGNIZED"));
		}
		Ok(())
	}

	pub fn is_selected(&self) -> bool {
		self.filter_types.contains(&EnvFilterType::Selected)
	}

	/// Environment types covered by the type part of the filter.
	pub fn environment_types(&self) -> BTreeSet<EnvironmentType> {
		self.effective_types()
			.into_iter()
			.filter_map(|t| match t {
				EnvFilterType::Prod => Some(EnvironmentType::Prod),
				EnvFilterType::NonProd => Some(EnvironmentType::NonProd),
				EnvFilterType::Selected | EnvFilterType::Unrecognized => None,
			})
			.collect()
	}

	/// IDs of the environments this filter selects.
	pub fn resolve(&self, environments: &[Environment]) -> Result<BTreeSet<EntityId>> {
		self.validate()?;
		if self.is_selected() {
			return Ok(environments
				.iter()
				.filter(|env| self.ids.contains(&env.id))
				.map(|env| env.id.clone())
				.collect());
		}
		let types = self.environment_types();
		Ok(environments
			.iter()
			.filter(|env| types.contains(&env.env_type))
			.map(|env| env.id.clone())
			.collect())
	}

	/// The workflow filter equivalent to this environment filter, extended to
	/// cover templatized workflows. Used for deployments.
	pub fn to_deployment_workflow_filter(&self) -> WorkflowFilter {
		let mut filter_types: BTreeSet<WorkflowFilterType> = self
			.effective_types()
			.into_iter()
			.map(|t| match t {
				EnvFilterType::Prod => WorkflowFilterType::Prod,
				EnvFilterType::NonProd => WorkflowFilterType::NonProd,
				EnvFilterType::Selected => WorkflowFilterType::Selected,
				EnvFilterType::Unrecognized => WorkflowFilterType::Unrecognized,
			})
			.collect();
		filter_types.insert(WorkflowFilterType::Templates);
		WorkflowFilter {
			filter_types,
			ids: self.ids.clone(),
		}
	}
}

// =============================================================================
// Workflow Filter
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowFilterType {
	Prod,
	NonProd,
	Templates,
	Selected,
	#[serde(other)]
	Unrecognized,
}

/// Selects workflows through the environment they are bound to.
///
/// An empty type set behaves as `{PROD, NON_PROD, TEMPLATES}`. The `ids` are
/// environment IDs, not workflow IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowFilter {
	pub filter_types: BTreeSet<WorkflowFilterType>,
	pub ids: BTreeSet<EntityId>,
}

impl WorkflowFilter {
	pub fn of_types(types: &[WorkflowFilterType]) -> Self {
		Self {
			filter_types: types.iter().copied().collect(),
			ids: BTreeSet::new(),
		}
	}

	pub fn with_env_ids<I, T>(mut self, ids: I) -> Self
	where
		I: IntoIterator<Item = T>,
		T: Into<EntityId>,
	{
		self.ids.extend(ids.into_iter().map(Into::into));
		self
	}

	pub fn effective_types(&self) -> BTreeSet<WorkflowFilterType> {
		if self.filter_types.is_empty() {
			[
				WorkflowFilterType::Prod,
				WorkflowFilterType::NonProd,
				WorkflowFilterType::Templates,
			]
			.into_iter()
			.collect()
		} else {
			self.filter_types.clone()
		}
	}

	pub fn validate(&self) -> Result<()> {
		if self.filter_types.contains(&WorkflowFilterType::Unrecognized) {
			return Err(RbacError::invalid_filter("workflow", "UNRECOGNIZED"));
		}
		Ok(())
	}

	pub fn includes_templates(&self) -> bool {
		self.effective_types().contains(&WorkflowFilterType::Templates)
	}

	/// IDs of the workflows this filter makes visible.
	///
	/// Templatized workflows need `TEMPLATES`. Workflows without an environment
	/// are always visible. Otherwise the bound environment must be listed
	/// explicitly or have a type the filter covers.
	pub fn resolve(&self, workflows: &[Workflow], environments: &[Environment]) -> Result<BTreeSet<EntityId>> {
		self.validate()?;
		let types = self.effective_types();
		let env_types: HashMap<&str, EnvironmentType> =
			environments.iter().map(|env| (env.id.as_str(), env.env_type)).collect();

		let visible = workflows.iter().filter(|workflow| {
			if workflow.env_templatized {
				return types.contains(&WorkflowFilterType::Templates);
			}
			let Some(env_id) = &workflow.env_id else {
				return true;
			};
			if self.ids.contains(env_id) {
				return true;
			}
			match env_types.get(env_id.as_str()) {
				Some(EnvironmentType::Prod) => types.contains(&WorkflowFilterType::Prod),
				Some(EnvironmentType::NonProd) => types.contains(&WorkflowFilterType::NonProd),
				None => false,
			}
		});
		Ok(visible.map(|workflow| workflow.id.clone()).collect())
	}
}

// =============================================================================
// Entity Filter
// =============================================================================

/// The entity filter carried by an application permission. Which shape is
/// valid depends on the permission type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityFilter {
	Generic(GenericEntityFilter),
	Env(EnvFilter),
	Workflow(WorkflowFilter),
}

impl EntityFilter {
	pub fn shape_name(&self) -> &'static str {
		match self {
			EntityFilter::Generic(_) => "GENERIC",
			EntityFilter::Env(_) => "ENV",
			EntityFilter::Workflow(_) => "WORKFLOW",
		}
	}
}
