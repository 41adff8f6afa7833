use desk_core::catalog::site;
use desk_core::{Catalog, DeskError, FieldValue, Record};
use desk_db::{Collector, Database, Filter, QuerySet, SqliteConnection, repo};
use rstest::{fixture, rstest};

fn text(value: &str) -> FieldValue {
	FieldValue::Text(value.to_string())
}

async fn insert(conn: &mut SqliteConnection, catalog: &Catalog, record: Record) -> i64 {
	let model = catalog.registry.model(&record.model).unwrap();
	repo::insert(conn, model, &record).await.unwrap()
}

struct Fixture {
	catalog: Catalog,
	db: Database,
	contract: i64,
	member: i64,
	employee: i64,
}

#[fixture]
async fn seeded() -> Fixture {
	let catalog = site();
	let db = Database::memory().await.unwrap();
	db.migrate(&catalog.registry).await.unwrap();
	let mut conn = db.acquire().await.unwrap();

	let post = insert(
		&mut conn,
		&catalog,
		Record::new("post", 0)
			.with_value("name", text("Engineer"))
			.with_value("abbr", text("eng.")),
	)
	.await;
	let employee = insert(
		&mut conn,
		&catalog,
		Record::new("employee", 0)
			.with_value("last_name", text("ИВАНОВ"))
			.with_value("first_name", text("Пётр"))
			.with_value("middle_name", text("Ильич"))
			.with_value("tabel", FieldValue::Int(12))
			.with_value("post", FieldValue::Ref(post)),
	)
	.await;
	let contract = insert(
		&mut conn,
		&catalog,
		Record::new("contract", 0).with_value("number", text("K-1")),
	)
	.await;
	insert(
		&mut conn,
		&catalog,
		Record::new("calculation", 0).with_value("contract", FieldValue::Ref(contract)),
	)
	.await;
	let member = insert(
		&mut conn,
		&catalog,
		Record::new("member", 0)
			.with_value("contract", FieldValue::Ref(contract))
			.with_value("employee", FieldValue::Ref(employee))
			.with_value("otvetstvenny", FieldValue::Bool(true)),
	)
	.await;
	let model = catalog.registry.model("contract").unwrap();
	repo::set_field(&mut conn, model, "otvetstvenny", &FieldValue::Ref(member), &[contract])
		.await
		.unwrap();
	insert(
		&mut conn,
		&catalog,
		Record::new("letter", 0)
			.with_value("contract", FieldValue::Ref(contract))
			.with_value("number", text("L-1"))
			.with_value("ispolnitel", FieldValue::Ref(member)),
	)
	.await;
	drop(conn);

	Fixture {
		catalog,
		db,
		contract,
		member,
		employee,
	}
}

#[rstest]
#[tokio::test]
async fn test_nested_related_rows_are_loaded(#[future] seeded: Fixture) {
	let fx = seeded.await;
	let mut conn = fx.db.acquire().await.unwrap();
	let letter = fx.catalog.registry.model("letter").unwrap();

	let rows = QuerySet::new(&fx.catalog.registry, letter)
		.filter(Filter::eq("contract", FieldValue::Ref(fx.contract)))
		.select_related(&["ispolnitel", "ispolnitel__employee"])
		.fetch(&mut conn)
		.await
		.unwrap();

	assert_eq!(rows.len(), 1);
	let executor = rows[0].related("ispolnitel").unwrap();
	assert_eq!(fx.catalog.registry.display(executor), "Иванов П.И.");
	assert_eq!(
		rows[0].related("ispolnitel__employee__post").map(|p| p.get("abbr").clone()),
		Some(text("eng."))
	);
}

#[rstest]
#[tokio::test]
async fn test_related_filter_hides_closed_contracts(#[future] seeded: Fixture) {
	let fx = seeded.await;
	let mut conn = fx.db.acquire().await.unwrap();
	let registry = &fx.catalog.registry;
	let letter = registry.model("letter").unwrap();
	let open_letters = || {
		QuerySet::new(registry, letter).filter(Filter::related(
			"contract",
			vec![Filter::eq("closed", FieldValue::Bool(false))],
		))
	};

	assert_eq!(open_letters().count(&mut conn).await.unwrap(), 1);

	let contract = registry.model("contract").unwrap();
	repo::set_field(&mut conn, contract, "closed", &FieldValue::Bool(true), &[fx.contract])
		.await
		.unwrap();
	assert_eq!(open_letters().count(&mut conn).await.unwrap(), 0);
}

#[rstest]
#[tokio::test]
async fn test_update_writes_present_fields_only(#[future] seeded: Fixture) {
	let fx = seeded.await;
	let mut conn = fx.db.acquire().await.unwrap();
	let contract = fx.catalog.registry.model("contract").unwrap();
	let qs = QuerySet::new(&fx.catalog.registry, contract);

	let record = Record::new("contract", fx.contract)
		.with_value("title", text("Supply"))
		.with_value("last_change", text("Title: added: Supply"));
	repo::update(&mut conn, contract, &record).await.unwrap();

	let stored = qs.get(&mut conn, fx.contract).await.unwrap();
	assert_eq!(stored.get("number"), &text("K-1"));
	assert_eq!(stored.get("title"), &text("Supply"));
	assert_eq!(stored.get("last_change"), &text("Title: added: Supply"));

	let mut missing = record.clone();
	missing.id = 999;
	assert!(matches!(
		repo::update(&mut conn, contract, &missing).await,
		Err(DeskError::NotFound(_))
	));
}

#[rstest]
#[tokio::test]
async fn test_contract_deletion_cascades_to_allowed_rows(#[future] seeded: Fixture) {
	let fx = seeded.await;
	let mut conn = fx.db.acquire().await.unwrap();
	let registry = &fx.catalog.registry;
	let contract = registry.model("contract").unwrap();
	let root = QuerySet::new(registry, contract).get(&mut conn, fx.contract).await.unwrap();

	let mut collector = Collector::new(&fx.catalog);
	collector.collect(&mut conn, root).await.unwrap();
	assert!(collector.can_delete());

	let summary = collector.summary();
	assert_eq!(summary[0], ("contracts".to_string(), 1));
	assert!(summary.contains(&("calculation".to_string(), 1)));
	assert!(summary.contains(&("assigned employees".to_string(), 1)));
	assert!(summary.contains(&("letters".to_string(), 1)));

	let deleted = collector.delete(&mut conn).await.unwrap();
	assert_eq!(deleted.len(), 4);
	for model in ["contract", "calculation", "member", "letter"] {
		let model = registry.model(model).unwrap();
		assert_eq!(QuerySet::new(registry, model).count(&mut conn).await.unwrap(), 0);
	}
	let employee = registry.model("employee").unwrap();
	assert!(QuerySet::new(registry, employee).exists(&mut conn).await.unwrap());
}

#[rstest]
#[tokio::test]
async fn test_dependents_outside_allow_list_protect(#[future] seeded: Fixture) {
	let fx = seeded.await;
	let mut conn = fx.db.acquire().await.unwrap();
	let registry = &fx.catalog.registry;
	let stage_name = insert(
		&mut conn,
		&fx.catalog,
		Record::new("stagebeginname", 0).with_value("name", text("Design")),
	)
	.await;
	insert(
		&mut conn,
		&fx.catalog,
		Record::new("stagebeginlist", 0)
			.with_value("contract", FieldValue::Ref(fx.contract))
			.with_value("name", FieldValue::Ref(stage_name)),
	)
	.await;

	let contract = registry.model("contract").unwrap();
	let root = QuerySet::new(registry, contract).get(&mut conn, fx.contract).await.unwrap();
	let mut collector = Collector::new(&fx.catalog);
	collector.collect(&mut conn, root).await.unwrap();

	assert!(!collector.can_delete());
	assert_eq!(collector.protected().len(), 1);
	assert_eq!(collector.protected()[0].model, "stagebeginlist");
	assert!(matches!(
		collector.delete(&mut conn).await,
		Err(DeskError::Protected(1))
	));
	assert!(QuerySet::new(registry, contract).exists(&mut conn).await.unwrap());
}

#[rstest]
#[tokio::test]
async fn test_protecting_relation_blocks_employee_delete(#[future] seeded: Fixture) {
	let fx = seeded.await;
	let mut conn = fx.db.acquire().await.unwrap();
	let registry = &fx.catalog.registry;
	let employee = registry.model("employee").unwrap();
	let root = QuerySet::new(registry, employee).get(&mut conn, fx.employee).await.unwrap();

	let mut collector = Collector::new(&fx.catalog);
	collector.collect(&mut conn, root).await.unwrap();
	assert_eq!(collector.protected().len(), 1);
	assert_eq!(collector.protected()[0].id, fx.member);
}

#[rstest]
#[tokio::test]
async fn test_member_delete_clears_references(#[future] seeded: Fixture) {
	let fx = seeded.await;
	let mut conn = fx.db.acquire().await.unwrap();
	let registry = &fx.catalog.registry;
	let member = registry.model("member").unwrap();
	let root = QuerySet::new(registry, member).get(&mut conn, fx.member).await.unwrap();

	let mut collector = Collector::new(&fx.catalog);
	collector.collect(&mut conn, root).await.unwrap();
	assert!(collector.can_delete());
	collector.delete(&mut conn).await.unwrap();

	let contract = registry.model("contract").unwrap();
	let stored = QuerySet::new(registry, contract).get(&mut conn, fx.contract).await.unwrap();
	assert_eq!(stored.get("otvetstvenny"), &FieldValue::Null);
	let letter = registry.model("letter").unwrap();
	let letters = QuerySet::new(registry, letter).fetch(&mut conn).await.unwrap();
	assert_eq!(letters[0].get("ispolnitel"), &FieldValue::Null);
}

#[rstest]
#[tokio::test]
async fn test_row_added_after_collection_stops_the_delete(#[future] seeded: Fixture) {
	let fx = seeded.await;
	let registry = &fx.catalog.registry;
	let contract = registry.model("contract").unwrap();
	let letter = registry.model("letter").unwrap();
	let timework = registry.model("timework").unwrap();

	let mut conn = fx.db.acquire().await.unwrap();
	let root = QuerySet::new(registry, contract).get(&mut conn, fx.contract).await.unwrap();
	let mut collector = Collector::new(&fx.catalog);
	collector.collect(&mut conn, root).await.unwrap();
	assert!(collector.can_delete());

	// Written between the confirmation page and the delete
	insert(
		&mut conn,
		&fx.catalog,
		Record::new("timework", 0)
			.with_value("contract", FieldValue::Ref(fx.contract))
			.with_value("member", FieldValue::Ref(fx.member)),
	)
	.await;
	drop(conn);

	let mut tx = fx.db.begin().await.unwrap();
	assert!(collector.delete(&mut *tx).await.is_err());
	drop(tx);

	let mut conn = fx.db.acquire().await.unwrap();
	assert!(QuerySet::new(registry, contract).exists(&mut conn).await.unwrap());
	assert!(QuerySet::new(registry, letter).exists(&mut conn).await.unwrap());
	assert_eq!(QuerySet::new(registry, timework).count(&mut conn).await.unwrap(), 1);
}

#[rstest]
#[tokio::test]
async fn test_referencing_rows_are_deleted_before_their_targets(#[future] seeded: Fixture) {
	let fx = seeded.await;
	let mut conn = fx.db.acquire().await.unwrap();
	let registry = &fx.catalog.registry;
	insert(
		&mut conn,
		&fx.catalog,
		Record::new("addagreement", 0).with_value("contract", FieldValue::Ref(fx.contract)),
	)
	.await;
	let contract = registry.model("contract").unwrap();
	let root = QuerySet::new(registry, contract).get(&mut conn, fx.contract).await.unwrap();

	let mut collector = Collector::new(&fx.catalog);
	collector.collect(&mut conn, root).await.unwrap();
	let deleted = collector.delete(&mut conn).await.unwrap();

	assert_eq!(deleted.len(), 5);
	for model in ["contract", "addagreement", "member", "letter"] {
		let model = registry.model(model).unwrap();
		assert_eq!(QuerySet::new(registry, model).count(&mut conn).await.unwrap(), 0);
	}
}
