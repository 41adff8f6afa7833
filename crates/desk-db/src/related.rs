//! Batched loading of related rows
//!
//! For every relation named by a path, the targets of all records are
//! fetched with a single `id IN (...)` query and attached to the records'
//! `related` map. Nested paths (`ispolnitel__employee`) recurse on the
//! fetched targets.

use crate::query::{Filter, QuerySet};
use desk_core::{DeskError, DeskResult, Record, Registry};
use futures::future::BoxFuture;
use sqlx::SqliteConnection;
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub fn load_related<'a>(
	conn: &'a mut SqliteConnection,
	registry: &'a Registry,
	records: &'a mut [Record],
	paths: &'a [String],
) -> BoxFuture<'a, DeskResult<()>> {
	Box::pin(async move {
		let Some(model_name) = records.first().map(|r| r.model.clone()) else {
			return Ok(());
		};
		let model = registry.model(&model_name)?;

		let mut grouped: BTreeMap<&str, Vec<String>> = BTreeMap::new();
		for path in paths {
			match path.split_once("__") {
				Some((head, rest)) => grouped.entry(head).or_default().push(rest.to_string()),
				None => {
					grouped.entry(path.as_str()).or_default();
				}
			}
		}

		for (head, mut nested) in grouped {
			let field = model.field(head).filter(|f| f.is_relation()).ok_or_else(|| {
				DeskError::ImproperlyConfigured(format!(
					"'{}' is not a relation of '{}'",
					head, model_name
				))
			})?;
			let Some(target) = field.related_model() else {
				continue;
			};
			let target = registry.model(target)?;

			let ids: BTreeSet<i64> = records.iter().filter_map(|r| r.ref_id(head)).collect();
			if ids.is_empty() {
				continue;
			}

			let mut rows = QuerySet::new(registry, target)
				.filter(Filter::is_in("id", ids))
				.fetch_rows(conn)
				.await?;
			for path in registry.row_paths(target.model_name) {
				if !nested.contains(&path) {
					nested.push(path);
				}
			}
			if !nested.is_empty() {
				load_related(conn, registry, &mut rows, &nested).await?;
			}

			let by_id: HashMap<i64, Record> = rows.into_iter().map(|r| (r.id, r)).collect();
			for record in records.iter_mut() {
				if let Some(id) = record.ref_id(head)
					&& let Some(row) = by_id.get(&id)
				{
					record.related.insert(head.to_string(), row.clone());
				}
			}
		}
		Ok(())
	})
}
