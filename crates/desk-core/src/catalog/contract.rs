use super::{AppConfig, Catalog, ModelGroup};
use crate::fieldconfig::ListConfig;
use crate::layout::{ChoiceScope, Fieldset, FormLayout, FormRule};
use crate::registry::{Computed, DisplayRule, FieldDescriptor, ModelDescriptor, OnDelete};
use crate::value::FieldValue;

pub const APP_LABEL: &str = "contract";

pub const STAGE_GROUP: &str = "stage";

/// User setting holding the contract list columns
pub const CONTRACT_LIST_SETTING: &str = "contract_list";

pub const CONTROL_PRICE_CHOICES: &[(i64, &str)] = &[
	(1, "with pricing"),
	(2, "without pricing"),
	(3, "no control"),
];

pub const LETTER_STATUS_CHOICES: &[(i64, &str)] = &[(1, "incoming"), (2, "outgoing")];

const HELP_MAX_LENGTH: &str = "No more than 50 characters.";
const HELP_MAX_500: &str = "No more than 500 characters.";
const LENGTH_EXCEEDED: &str = "Length exceeds 10 characters";

fn contract_fk() -> FieldDescriptor {
	FieldDescriptor::foreign_key("contract", "Contract", "contract", OnDelete::Cascade).required()
}

fn short_text(name: &'static str, label: &'static str) -> FieldDescriptor {
	FieldDescriptor::char(name, label, 50).with_help_text(HELP_MAX_LENGTH)
}

fn long_text(name: &'static str, label: &'static str) -> FieldDescriptor {
	FieldDescriptor::text(name, label)
		.with_max_length(500)
		.with_help_text(HELP_MAX_500)
}

fn price(name: &'static str, label: &'static str) -> FieldDescriptor {
	FieldDescriptor::decimal(name, label, 15, 2).with_default(FieldValue::Decimal(0.into()))
}

const CONTRACT_FIELDS: &[&str] = &[
	"number",
	"date",
	"eosdo",
	"title",
	"comment",
	"condition",
	"concurs",
	"guarantee_letter",
	"status",
	"soprovojdenie",
	"otvetstvenny",
	"num_ng",
	"num_stage",
	"igk",
	"date_begin",
	"date_end_plan",
	"date_end_prognoz",
	"date_end_fact",
	"control_price",
	"client",
	"city",
	"inn",
	"department",
	"great_client",
	"great_department",
	"general_client",
	"price_no_nds",
	"nds",
	"price_plus_nds",
	"summ_nds",
];

fn register_contract(catalog: &mut Catalog) {
	let contract = ModelDescriptor::new(APP_LABEL, "contract", "contract", "contracts")
		.with_fields(vec![
			FieldDescriptor::char("number", "Number", 255),
			FieldDescriptor::date("date", "Date"),
			FieldDescriptor::char("eosdo", "EOSDO number", 255),
			FieldDescriptor::char("title", "Title", 255),
			FieldDescriptor::text("comment", "Comment"),
			FieldDescriptor::foreign_key(
				"condition",
				"Contract condition",
				"conditioncontract",
				OnDelete::Protect,
			),
			FieldDescriptor::boolean("concurs", "Competitive procedure"),
			FieldDescriptor::boolean("guarantee_letter", "Guarantee letter"),
			FieldDescriptor::boolean("closed", "Contract closed"),
			FieldDescriptor::foreign_key("status", "Contract status", "statuscontract", OnDelete::Protect),
			FieldDescriptor::foreign_key("soprovojdenie", "Support", "member", OnDelete::SetNull),
			FieldDescriptor::foreign_key("otvetstvenny", "Responsible", "member", OnDelete::SetNull),
			FieldDescriptor::integer("num_ng", "Nomenclature group number"),
			FieldDescriptor::integer("num_stage", "Stage number"),
			FieldDescriptor::char("igk", "IGK", 255),
			FieldDescriptor::date("date_begin", "Work start date"),
			FieldDescriptor::date("date_end_plan", "End date, planned"),
			FieldDescriptor::date("date_end_prognoz", "End date, forecast"),
			FieldDescriptor::date("date_end_fact", "End date, actual"),
			FieldDescriptor::choice("control_price", "Price control", CONTROL_PRICE_CHOICES),
			FieldDescriptor::foreign_key("client", "Client", "client", OnDelete::Protect),
			FieldDescriptor::char("city", "City", 255),
			FieldDescriptor::char("inn", "Taxpayer number", 255),
			FieldDescriptor::char("department", "Department", 255),
			FieldDescriptor::foreign_key("great_client", "Lead contractor", "client", OnDelete::SetNull),
			FieldDescriptor::char("great_department", "Lead contractor department", 255),
			FieldDescriptor::char("general_client", "General client", 255),
			price("price_no_nds", "Price excl. VAT"),
			FieldDescriptor::integer("nds", "VAT, %")
				.with_range(Some(0), Some(100))
				.with_default(FieldValue::Int(0)),
			price("price_plus_nds", "Price incl. VAT"),
			price("summ_nds", "VAT amount"),
		])
		.with_display(DisplayRule::NumberOrEmpty)
		.with_permission("close_contract", "Can close contract")
		.with_ordering(vec!["-id"]);
	catalog.register(contract);

	catalog.set_layout(
		"contract",
		FormLayout::new(CONTRACT_FIELDS)
			.with_add_fields(&["number", "date", "eosdo", "num_ng", "igk"])
			.with_readonly(&["summ_nds", "price_plus_nds", "city", "inn", "department"])
			.with_fieldset(Fieldset::flat(
				"",
				&[
					"number",
					"date",
					"eosdo",
					"title",
					"comment",
					"condition",
					"concurs",
					"guarantee_letter",
					"status",
					"soprovojdenie",
					"otvetstvenny",
					"num_ng",
					"num_stage",
					"igk",
				],
			))
			.with_fieldset(
				Fieldset::flat(
					"Execution dates",
					&["date_begin", "date_end_plan", "date_end_prognoz", "date_end_fact"],
				)
				.collapsed(),
			)
			.with_fieldset(
				Fieldset::new(
					"Client",
					vec![
						vec!["control_price"],
						vec!["client", "city", "inn", "department"],
						vec!["great_client"],
						vec!["great_department"],
						vec!["general_client"],
					],
				)
				.collapsed(),
			)
			.with_fieldset(
				Fieldset::new(
					"Cost",
					vec![vec!["price_no_nds", "nds"], vec!["price_plus_nds", "summ_nds"]],
				)
				.collapsed(),
			)
			.with_override(short_text("number", "Contract number"))
			.with_override(short_text("eosdo", "EOSDO number"))
			.with_override(short_text("title", "Title"))
			.with_override(short_text("igk", "IGK"))
			.with_override(long_text("comment", "Comment"))
			.with_override(
				FieldDescriptor::integer("nds", "VAT, %")
					.with_range(Some(0), Some(100))
					.with_default(FieldValue::Int(20)),
			)
			.with_choices(
				"soprovojdenie",
				ChoiceScope::ContractMembers {
					flag: Some("soprovojdenie"),
				},
			)
			.with_choices(
				"otvetstvenny",
				ChoiceScope::ContractMembers {
					flag: Some("otvetstvenny"),
				},
			)
			.with_rule(FormRule::MaxChars {
				field: "number",
				max: 10,
				message: LENGTH_EXCEEDED,
			})
			.with_rule(FormRule::MaxChars {
				field: "title",
				max: 10,
				message: LENGTH_EXCEEDED,
			})
			.with_rule(FormRule::FillFromRelated {
				relation: "client",
				pairs: &[("city", "city"), ("inn", "inn"), ("department", "department")],
			}),
	);
	catalog.set_list_config(
		APP_LABEL,
		"contract",
		ListConfig::new()
			.with_related(&[
				"condition",
				"status",
				"otvetstvenny",
				"soprovojdenie",
				"client",
				"great_client",
			])
			.with_display(CONTRACT_FIELDS)
			.with_link(&["number"]),
	);
}

fn register_member(catalog: &mut Catalog) {
	let member = ModelDescriptor::new(APP_LABEL, "member", "assigned employee", "assigned employees")
		.with_fields(vec![
			contract_fk(),
			FieldDescriptor::foreign_key("employee", "Employee", "employee", OnDelete::Protect),
			FieldDescriptor::text("function", "Functions").with_max_length(1000),
			FieldDescriptor::boolean("otvetstvenny", "Responsible"),
			FieldDescriptor::boolean("ispolnitel", "Executor"),
			FieldDescriptor::boolean("soprovojdenie", "Support"),
		])
		.with_display(DisplayRule::Related("employee"));
	catalog.register(member);

	catalog.set_layout(
		"member",
		FormLayout::new(&["employee", "otvetstvenny", "ispolnitel", "soprovojdenie"])
			.with_add_fields(&["employee"])
			.with_readonly(&["employee"])
			.with_override(
				FieldDescriptor::foreign_key("employee", "Employee", "employee", OnDelete::Protect)
					.required(),
			)
			.with_override(
				FieldDescriptor::boolean("otvetstvenny", "Responsible")
					.with_help_text("Responsible for the contract"),
			)
			.with_override(
				FieldDescriptor::boolean("ispolnitel", "Executor").with_help_text("Stage executor"),
			)
			.with_override(
				FieldDescriptor::boolean("soprovojdenie", "Support")
					.with_help_text("Contract support"),
			)
			.with_choices("employee", ChoiceScope::EmployeesOutsideContract)
			.with_rule(FormRule::UniqueInContract {
				field: "employee",
				message: "This employee has already been added to the list.",
			}),
	);
	catalog.set_list_config(
		APP_LABEL,
		"member",
		ListConfig::new()
			.with_related(&["employee"])
			.with_display(&["employee", "otvetstvenny", "ispolnitel", "soprovojdenie"])
			.with_link(&["employee"]),
	);
}

fn register_calculation(catalog: &mut Catalog) {
	let calculation = ModelDescriptor::new(APP_LABEL, "calculation", "calculation", "calculation")
		.with_fields(vec![
			FieldDescriptor::one_to_one("contract", "Contract", "contract", OnDelete::Cascade)
				.required(),
			FieldDescriptor::char("matzatrall", "Material costs", 255),
			FieldDescriptor::char("zarpall", "Salary costs", 255),
			FieldDescriptor::char("proizvzatr", "Production costs", 255),
			FieldDescriptor::char("zatrkomandir", "Travel costs", 255),
		])
		.with_display(DisplayRule::Prefixed {
			prefix: "Calculation of contract ",
			relation: "contract",
		});
	catalog.register(calculation);
	catalog.set_layout(
		"calculation",
		FormLayout::new(&["matzatrall", "zarpall", "proizvzatr", "zatrkomandir"]),
	);
}

/// `middle` lists track plan/fact instead of quantity/readiness
fn stage_list(
	model_name: &'static str,
	verbose_name: &'static str,
	verbose_name_plural: &'static str,
	name_model: &'static str,
	middle: bool,
) -> (ModelDescriptor, Vec<&'static str>) {
	let (first, second) = if middle {
		(
			FieldDescriptor::char("plan", "Plan", 255),
			FieldDescriptor::char("fact", "Fact", 255),
		)
	} else {
		(
			FieldDescriptor::char("kolichestvo", "Quantity", 255),
			FieldDescriptor::char("gotov", "Readiness", 255),
		)
	};
	let fields = vec![
		"name",
		"ispolnitel",
		"date_end_plan",
		first.name,
		second.name,
		"date_end_prognoz",
		"date_end_fact",
		"number",
		"file",
	];
	let model = ModelDescriptor::new(APP_LABEL, model_name, verbose_name, verbose_name_plural)
		.with_fields(vec![
			contract_fk(),
			FieldDescriptor::foreign_key("name", "Name", name_model, OnDelete::Protect),
			FieldDescriptor::foreign_key("ispolnitel", "Executor", "member", OnDelete::Cascade),
			FieldDescriptor::date("date_end_plan", "Due date, contract"),
			first,
			second,
			FieldDescriptor::date("date_end_prognoz", "Due date, forecast"),
			FieldDescriptor::date("date_end_fact", "Due date, actual"),
			FieldDescriptor::char("number", "Number", 255),
			FieldDescriptor::file("file", "File", "document/"),
		]);
	(model, fields)
}

fn register_stages(catalog: &mut Catalog) {
	let stages = [
		("stagebeginlist", "preparation stage", "preparation stages", "stagebeginname", false),
		("stagemiddlelist", "execution stage", "execution stages", "stagemiddlename", true),
		("stageendlist", "completion stage", "completion stages", "stageendname", false),
	];
	for (model_name, verbose_name, plural, name_model, middle) in stages {
		let (model, fields) = stage_list(model_name, verbose_name, plural, name_model, middle);
		catalog.register(model);

		let mut layout = FormLayout::new(&fields)
			.with_readonly(&["name"])
			.with_choices("ispolnitel", ChoiceScope::ContractMembers { flag: Some("ispolnitel") });
		if model_name == "stageendlist" {
			layout = layout.with_add_fields(&["name"]).with_rule(FormRule::UniqueInContract {
				field: "name",
				message: "This stage has already been added to the list.",
			});
		}
		catalog.set_layout(model_name, layout);
		catalog.set_list_config(
			APP_LABEL,
			model_name,
			ListConfig::new()
				.with_related(&["name", "ispolnitel"])
				.with_display(&fields)
				.with_link(&["name"]),
		);
	}

	catalog.add_group(ModelGroup {
		name: STAGE_GROUP,
		verbose_name: "stage",
		verbose_name_plural: "stages",
		models: vec!["stagebeginlist", "stagemiddlelist", "stageendlist"],
	});
}

fn register_documents(catalog: &mut Catalog) {
	let letter = ModelDescriptor::new(APP_LABEL, "letter", "letter", "letters")
		.with_fields(vec![
			contract_fk(),
			FieldDescriptor::char("number", "Number", 255),
			FieldDescriptor::date("date", "Date"),
			FieldDescriptor::foreign_key("ispolnitel", "Executor", "member", OnDelete::SetNull),
			FieldDescriptor::choice("status", "Status", LETTER_STATUS_CHOICES),
			FieldDescriptor::text("content", "Content").with_max_length(1000),
			FieldDescriptor::file("file", "File", "document/"),
		])
		.with_display(DisplayRule::NumberOrEmpty)
		.with_ordering(vec!["-date"]);
	catalog.register(letter);
	let letter_fields = ["number", "ispolnitel", "date", "status", "content", "file"];
	catalog.set_layout(
		"letter",
		FormLayout::new(&letter_fields)
			.with_override(short_text("number", "Number"))
			.with_override(long_text("content", "Content"))
			.with_override(
				FieldDescriptor::foreign_key("ispolnitel", "Executor", "member", OnDelete::SetNull)
					.with_help_text("Assigned employee"),
			)
			.with_choices("ispolnitel", ChoiceScope::ContractMembers { flag: None }),
	);
	catalog.set_list_config(
		APP_LABEL,
		"letter",
		ListConfig::new()
			.with_related(&["ispolnitel", "ispolnitel__employee"])
			.with_display(&letter_fields)
			.with_link(&["number"])
			.with_editable(&["status", "date"])
			.with_readonly(&["content"]),
	);

	let agreement = ModelDescriptor::new(
		APP_LABEL,
		"addagreement",
		"additional agreement",
		"additional agreements",
	)
	.with_fields(vec![
		contract_fk(),
		FieldDescriptor::char("number", "Number", 255),
		FieldDescriptor::date("date", "Date"),
		FieldDescriptor::text("comment", "Comment").with_max_length(1000),
		FieldDescriptor::file("file", "File", "document/"),
	])
	.with_display(DisplayRule::NumberOrEmpty)
	.with_short_plural("add. agreements");
	catalog.register(agreement);
	let agreement_fields = ["number", "date", "comment", "file"];
	catalog.set_layout(
		"addagreement",
		FormLayout::new(&agreement_fields)
			.with_override(short_text("number", "Agreement number"))
			.with_override(long_text("comment", "Comment"))
			.with_override(FieldDescriptor::file("file", "Agreement file", "document/")),
	);
	catalog.set_list_config(
		APP_LABEL,
		"addagreement",
		ListConfig::new()
			.with_display(&agreement_fields)
			.with_link(&["number"]),
	);

	let contact = ModelDescriptor::new(APP_LABEL, "contact", "contact", "contacts")
		.with_fields(vec![
			contract_fk(),
			FieldDescriptor::char("first_name", "First name", 150),
			FieldDescriptor::char("last_name", "Last name", 150),
			FieldDescriptor::char("middle_name", "Middle name", 150),
			FieldDescriptor::text("comment", "Comment").with_max_length(1000),
			FieldDescriptor::char("post", "Post", 150),
			FieldDescriptor::char("division", "Division", 150),
			FieldDescriptor::char("telephone", "Telephone", 150),
			FieldDescriptor::char("email", "Email address", 150),
		])
		.with_computed("name", "Full name", Computed::FullName)
		.with_display(DisplayRule::FullName);
	catalog.register(contact);
	catalog.set_layout(
		"contact",
		FormLayout::new(&[
			"first_name",
			"last_name",
			"middle_name",
			"comment",
			"post",
			"division",
			"telephone",
			"email",
		])
		.with_override(long_text("comment", "Comment")),
	);
	catalog.set_list_config(
		APP_LABEL,
		"contact",
		ListConfig::new()
			.with_display(&["name", "comment", "post", "division", "telephone", "email"])
			.with_link(&["name"]),
	);
}

fn register_timework(catalog: &mut Catalog) {
	let timework = ModelDescriptor::new(APP_LABEL, "timework", "working time", "working time")
		.with_fields(vec![
			FieldDescriptor::date("date", "Date"),
			FieldDescriptor::foreign_key("member", "Employee", "member", OnDelete::Cascade),
			FieldDescriptor::foreign_key("contract", "Project", "contract", OnDelete::Cascade),
			FieldDescriptor::decimal("time", "Hours", 3, 1).with_range(Some(0), Some(24)),
		])
		.with_display(DisplayRule::Related("contract"));
	catalog.register(timework);
	catalog.set_list_config(
		APP_LABEL,
		"timework",
		ListConfig::new()
			.with_related(&["contract"])
			.with_display(&["contract", "time"])
			.with_link(&["contract"])
			.with_editable(&["time"]),
	);

	// Employee list of the time sheet pages
	catalog.set_list_config(
		APP_LABEL,
		"employee",
		ListConfig::new()
			.with_related(&["post", "division"])
			.with_display(&["__str__", "tabel", "post", "division"])
			.with_link(&["__str__"]),
	);
}

pub(super) fn register(catalog: &mut Catalog) {
	catalog.add_app(AppConfig {
		label: APP_LABEL,
		verbose_name: "Contracts",
		route: "contract",
	});

	register_contract(catalog);
	register_member(catalog);
	register_calculation(catalog);
	register_stages(catalog);
	register_documents(catalog);
	register_timework(catalog);

	for model_name in ["contract", "letter", "addagreement", "member"] {
		catalog.allow_delete(model_name);
	}
}
