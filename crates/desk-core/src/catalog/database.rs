use super::{AppConfig, Catalog};
use crate::fieldconfig::ListConfig;
use crate::layout::{FormLayout, FormRule};
use crate::registry::{Computed, DisplayRule, FieldDescriptor, ModelDescriptor, OnDelete};
use crate::value::FieldValue;

pub const APP_LABEL: &str = "database";

pub const HELP_VIEW: &str =
	"Check if the value should be offered in choice lists. Uncheck it instead of deleting the value.";
pub const MAX_LENGTH: usize = 50;
const HELP_MAX_LENGTH: &str = "No more than 50 characters.";

fn view_field() -> FieldDescriptor {
	FieldDescriptor::boolean("view", "Visible")
		.with_default(FieldValue::Bool(true))
		.with_help_text(HELP_VIEW)
}

fn short_text(name: &'static str, label: &'static str) -> FieldDescriptor {
	FieldDescriptor::char(name, label, MAX_LENGTH)
		.required()
		.with_help_text(HELP_MAX_LENGTH)
}

/// A named dictionary: unique name plus the visibility flag
fn dictionary(
	model_name: &'static str,
	verbose_name: &'static str,
	verbose_name_plural: &'static str,
	name_label: &'static str,
) -> ModelDescriptor {
	ModelDescriptor::new(APP_LABEL, model_name, verbose_name, verbose_name_plural)
		.with_fields(vec![
			FieldDescriptor::char("name", name_label, 200).required().unique(),
			view_field(),
		])
		.with_ordering(vec!["name"])
}

fn stage_name(
	model_name: &'static str,
	verbose_name: &'static str,
	verbose_name_plural: &'static str,
	name_label: &'static str,
) -> ModelDescriptor {
	ModelDescriptor::new(APP_LABEL, model_name, verbose_name, verbose_name_plural)
		.with_fields(vec![
			FieldDescriptor::char("name", name_label, 255).unique(),
			FieldDescriptor::boolean("file", "Report document required"),
			view_field(),
		])
		.with_ordering(vec!["name"])
}

fn name_config(fields: &[&str]) -> ListConfig {
	ListConfig::new().with_display(fields).with_link(&["name"])
}

pub(super) fn register(catalog: &mut Catalog) {
	catalog.add_app(AppConfig {
		label: APP_LABEL,
		verbose_name: "Database",
		route: "settings/database",
	});

	let post = ModelDescriptor::new(APP_LABEL, "post", "post", "posts")
		.with_fields(vec![
			FieldDescriptor::char("name", "Post", 200).required().unique(),
			FieldDescriptor::char("abbr", "Post abbreviation", 200).required(),
			view_field(),
		])
		.with_ordering(vec!["name"]);
	catalog.register(post);
	catalog.set_layout(
		"post",
		FormLayout::new(&["name", "abbr", "view"])
			.with_override(short_text("name", "Post"))
			.with_override(short_text("abbr", "Post abbreviation")),
	);
	catalog.set_list_config(APP_LABEL, "post", name_config(&["name", "abbr", "view"]));

	let simple = [
		("division", "division", "divisions", "Division"),
		("conditioncontract", "contract condition", "contract conditions", "Contract condition"),
		("statuscontract", "contract status", "contract statuses", "Contract status"),
		("department", "department", "departments", "Department"),
	];
	for (model_name, verbose_name, plural, label) in simple {
		catalog.register(dictionary(model_name, verbose_name, plural, label));
		catalog.set_layout(
			model_name,
			FormLayout::new(&["name", "view"]).with_override(short_text("name", label)),
		);
		catalog.set_list_config(APP_LABEL, model_name, name_config(&["name", "view"]));
	}

	let subdivision = ModelDescriptor::new(APP_LABEL, "subdivision", "subdivision", "subdivisions")
		.with_fields(vec![
			FieldDescriptor::char("name", "Subdivision", 200).required().unique(),
			FieldDescriptor::foreign_key("division", "Division", "division", OnDelete::Protect)
				.required(),
			view_field(),
		])
		.with_ordering(vec!["name"]);
	catalog.register(subdivision);
	catalog.set_layout(
		"subdivision",
		FormLayout::new(&["division", "name", "view"])
			.with_override(short_text("name", "Subdivision")),
	);
	catalog.set_list_config(
		APP_LABEL,
		"subdivision",
		name_config(&["division", "name", "view"]).with_related(&["division"]),
	);

	let client = ModelDescriptor::new(APP_LABEL, "client", "organisation", "organisations")
		.with_fields(vec![
			FieldDescriptor::char("name", "Organisation", 200).required().unique(),
			FieldDescriptor::char("city", "City", 200),
			FieldDescriptor::integer("inn", "Taxpayer number"),
			FieldDescriptor::foreign_key("department", "Department", "department", OnDelete::Protect),
			FieldDescriptor::boolean("getdoc", "Issues documents"),
			view_field(),
		])
		.with_ordering(vec!["name"]);
	catalog.register(client);
	catalog.set_layout(
		"client",
		FormLayout::new(&["name", "city", "inn", "department", "view"])
			.with_override(short_text("name", "Organisation"))
			.with_override(
				FieldDescriptor::char("city", "City", MAX_LENGTH).with_help_text(HELP_MAX_LENGTH),
			),
	);
	catalog.set_list_config(
		APP_LABEL,
		"client",
		name_config(&["name", "city", "inn", "department", "view"]).with_related(&["department"]),
	);

	let stages = [
		("stagebeginname", "preparation stage name", "preparation stage names", "Preparation stage"),
		("stagemiddlename", "execution stage name", "execution stage names", "Execution stage"),
		("stageendname", "completion stage name", "completion stage names", "Completion stage"),
	];
	for (model_name, verbose_name, plural, label) in stages {
		catalog.register(stage_name(model_name, verbose_name, plural, label));
		catalog.set_layout(
			model_name,
			FormLayout::new(&["name", "file"]).with_override(short_text("name", label)),
		);
		catalog.set_list_config(APP_LABEL, model_name, name_config(&["name", "file"]));
	}

	let employee = ModelDescriptor::new(APP_LABEL, "employee", "employee", "employees")
		.with_fields(vec![
			FieldDescriptor::char("last_name", "Last name", 150),
			FieldDescriptor::char("first_name", "First name", 150),
			FieldDescriptor::char("middle_name", "Middle name", 150),
			FieldDescriptor::integer("tabel", "Personnel number")
				.unique()
				.with_range(Some(0), None),
			FieldDescriptor::char("norma", "Working hours norm", 150),
			FieldDescriptor::foreign_key("post", "Post", "post", OnDelete::Protect),
			FieldDescriptor::foreign_key("division", "Division", "division", OnDelete::Protect),
			FieldDescriptor::boolean("getdoc", "Issues documents"),
			view_field(),
		])
		.with_computed("full_name", "Employee", Computed::FullName)
		.with_computed(
			"post_abbr",
			"Post abbreviation",
			Computed::RelatedField {
				relation: "post",
				field: "abbr",
			},
		)
		.with_display(DisplayRule::ShortName)
		.with_ordering(vec!["last_name", "first_name"]);
	catalog.register(employee);
	catalog.set_layout(
		"employee",
		FormLayout::new(&[
			"last_name",
			"first_name",
			"middle_name",
			"tabel",
			"norma",
			"division",
			"post",
			"getdoc",
			"view",
		])
		.with_override(short_text("last_name", "Last name"))
		.with_override(short_text("first_name", "First name"))
		.with_override(short_text("middle_name", "Middle name"))
		.with_override(
			FieldDescriptor::integer("tabel", "Personnel number")
				.required()
				.unique()
				.with_range(Some(0), None),
		)
		.with_override(short_text("norma", "Working hours norm"))
		.with_override(
			FieldDescriptor::boolean("getdoc", "Issues documents")
				.with_help_text("Allowed to issue documents"),
		)
		.with_rule(FormRule::Cyrillic {
			fields: &["last_name", "first_name", "middle_name"],
		}),
	);
	catalog.set_list_config(
		APP_LABEL,
		"employee",
		ListConfig::new()
			.with_related(&["post", "division"])
			.with_display(&["__str__", "tabel", "norma", "post", "division", "view"])
			.with_link(&["__str__"]),
	);

	for model_name in [
		"post",
		"division",
		"subdivision",
		"conditioncontract",
		"statuscontract",
		"department",
		"client",
		"stagebeginname",
		"stagemiddlename",
		"stageendname",
		"employee",
	] {
		catalog.allow_delete(model_name);
	}
}
