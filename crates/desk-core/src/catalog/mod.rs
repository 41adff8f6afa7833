//! The desk's model catalog
//!
//! Everything the views need to know about the domain: the model registry,
//! list settings per app, form layouts, multi-model list groups, the delete
//! allow-list and the apps that own routes.

mod contract;
mod database;

use crate::error::{DeskError, DeskResult};
use crate::fieldconfig::ListConfig;
use crate::layout::FormLayout;
use crate::registry::{ModelDescriptor, Registry};
use std::collections::{HashMap, HashSet};

pub use contract::{
	CONTRACT_LIST_SETTING, CONTROL_PRICE_CHOICES, LETTER_STATUS_CHOICES, STAGE_GROUP,
};
pub use database::{HELP_VIEW, MAX_LENGTH};

/// An app owning a route namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
	pub label: &'static str,
	pub verbose_name: &'static str,
	/// URL prefix without slashes, e.g. `settings/database`
	pub route: &'static str,
}

/// Several models listed, permission-checked and added together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelGroup {
	pub name: &'static str,
	pub verbose_name: &'static str,
	pub verbose_name_plural: &'static str,
	pub models: Vec<&'static str>,
}

#[derive(Debug, Default)]
pub struct Catalog {
	pub registry: Registry,
	configs: HashMap<(&'static str, &'static str), ListConfig>,
	layouts: HashMap<&'static str, FormLayout>,
	groups: Vec<ModelGroup>,
	deletable: HashSet<&'static str>,
	apps: Vec<AppConfig>,
}

impl Catalog {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, model: ModelDescriptor) {
		self.registry.register(model);
	}

	/// List settings of `model` as seen from `app`'s pages
	pub fn set_list_config(&mut self, app: &'static str, model: &'static str, config: ListConfig) {
		self.configs.insert((app, model), config);
	}

	pub fn set_layout(&mut self, model: &'static str, layout: FormLayout) {
		self.layouts.insert(model, layout);
	}

	pub fn add_group(&mut self, group: ModelGroup) {
		self.groups.push(group);
	}

	pub fn allow_delete(&mut self, model: &'static str) {
		self.deletable.insert(model);
	}

	pub fn add_app(&mut self, app: AppConfig) {
		self.apps.push(app);
	}

	/// List settings, empty (all defaults) when none are declared
	pub fn list_config(&self, app: &str, model: &str) -> ListConfig {
		self.configs
			.iter()
			.find(|((a, m), _)| *a == app && *m == model)
			.map(|(_, config)| config.clone())
			.unwrap_or_default()
	}

	/// Form layout of a model, falling back to its display columns
	pub fn layout(&self, app: &str, model: &ModelDescriptor) -> DeskResult<FormLayout> {
		if let Some(layout) = self.layouts.get(model.model_name) {
			return Ok(layout.clone());
		}
		let display = self
			.list_config(app, model.model_name)
			.fields_display
			.unwrap_or_default();
		let fields: Vec<&'static str> = model
			.fields
			.iter()
			.map(|f| f.name)
			.filter(|name| display.iter().any(|d| d == name))
			.collect();
		if fields.is_empty() {
			return Err(DeskError::ImproperlyConfigured(format!(
				"Form fields of '{}' are not declared. Specify 'fields_display' or create a layout.",
				model.model_name
			)));
		}
		Ok(FormLayout::new(&fields))
	}

	pub fn group(&self, name: &str) -> Option<&ModelGroup> {
		self.groups.iter().find(|g| g.name == name)
	}

	pub fn groups(&self) -> &[ModelGroup] {
		&self.groups
	}

	/// Group containing `model`, if any
	pub fn group_of(&self, model: &str) -> Option<&ModelGroup> {
		self.groups.iter().find(|g| g.models.iter().any(|m| *m == model))
	}

	/// Models a slug model name stands for: a group's members or itself
	pub fn models_for(&self, name: &str) -> DeskResult<Vec<&ModelDescriptor>> {
		match self.group(name) {
			Some(group) => group
				.models
				.iter()
				.map(|m| self.registry.model(m))
				.collect(),
			None => Ok(vec![self.registry.model(name)?]),
		}
	}

	pub fn is_deletable(&self, model: &str) -> bool {
		self.deletable.contains(model)
	}

	pub fn deletable(&self) -> &HashSet<&'static str> {
		&self.deletable
	}

	pub fn apps(&self) -> &[AppConfig] {
		&self.apps
	}

	pub fn app(&self, label: &str) -> Option<&AppConfig> {
		self.apps.iter().find(|a| a.label == label)
	}
}

/// The full catalog of the desk: reference dictionaries and contracts
pub fn site() -> Catalog {
	let mut catalog = Catalog::new();
	database::register(&mut catalog);
	contract::register(&mut catalog);
	catalog
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::registry::FieldKind;
	use rstest::{fixture, rstest};

	#[fixture]
	fn catalog() -> Catalog {
		site()
	}

	#[rstest]
	fn test_every_list_config_resolves(catalog: Catalog) {
		for ((app, model), config) in &catalog.configs {
			let descriptor = catalog.registry.model(model).unwrap();
			let resolved = config
				.resolve(descriptor.verbose_name)
				.unwrap_or_else(|e| panic!("{}.{}: {}", app, model, e));
			for column in resolved.display {
				assert!(descriptor.has_column(&column), "{}.{} has no column {}", app, model, column);
			}
		}
	}

	#[rstest]
	fn test_relations_point_at_registered_models(catalog: Catalog) {
		for model in catalog.registry.models() {
			for field in &model.fields {
				if let Some(target) = field.related_model() {
					assert!(
						catalog.registry.get(target).is_some(),
						"{}.{} points at unknown {}",
						model.model_name,
						field.name,
						target
					);
				}
			}
		}
	}

	#[rstest]
	fn test_layout_fields_exist(catalog: Catalog) {
		for model in catalog.registry.models() {
			let Ok(layout) = catalog.layout(model.app_label, model) else {
				continue;
			};
			for name in layout.fields.iter().chain(layout.readonly.iter()) {
				assert!(model.field(name).is_some(), "{} has no field {}", model.model_name, name);
			}
		}
	}

	#[rstest]
	fn test_stage_group(catalog: Catalog) {
		let models = catalog.models_for(STAGE_GROUP).unwrap();
		let names: Vec<_> = models.iter().map(|m| m.model_name).collect();
		assert_eq!(names, vec!["stagebeginlist", "stagemiddlelist", "stageendlist"]);
		assert_eq!(catalog.group_of("stageendlist").map(|g| g.name), Some(STAGE_GROUP));
	}

	#[rstest]
	fn test_delete_allow_list(catalog: Catalog) {
		for model in ["contract", "letter", "addagreement", "member", "post", "employee"] {
			assert!(catalog.is_deletable(model), "{} should be deletable", model);
		}
		for model in ["calculation", "stagebeginlist", "timework", "contact"] {
			assert!(!catalog.is_deletable(model), "{} should be protected", model);
		}
	}

	#[rstest]
	fn test_calculation_is_one_to_one(catalog: Catalog) {
		let calculation = catalog.registry.model("calculation").unwrap();
		let field = calculation.one_to_one_field().unwrap();
		assert!(matches!(field.kind, FieldKind::OneToOne { to: "contract", .. }));
	}
}
