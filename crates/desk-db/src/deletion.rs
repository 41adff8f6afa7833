//! Deletion with dependency collection
//!
//! Before an object is deleted every row pointing at it is visited:
//!
//! - a protecting relation makes the referencing row protected
//! - a set-null relation is cleared on the referencing row
//! - a cascading relation deletes the referencing row when its model is on
//!   the delete allow-list or the relation is one-to-one (an owned
//!   sub-record); otherwise the row is protected
//!
//! Any protected row blocks the whole deletion.

use crate::query::{Filter, QuerySet};
use crate::repo;
use desk_core::registry::{FieldDescriptor, FieldKind, ModelDescriptor, OnDelete};
use desk_core::{Catalog, DeskError, DeskResult, FieldValue, Record};
use sqlx::SqliteConnection;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

#[derive(Debug)]
struct Nullify<'a> {
	model: &'a ModelDescriptor,
	field: &'a FieldDescriptor,
	ids: Vec<i64>,
}

#[derive(Debug)]
pub struct Collector<'a> {
	catalog: &'a Catalog,
	/// Parents before their dependents
	deletions: Vec<Record>,
	seen: HashSet<(String, i64)>,
	nullify: Vec<Nullify<'a>>,
	protected: Vec<Record>,
}

impl<'a> Collector<'a> {
	pub fn new(catalog: &'a Catalog) -> Self {
		Self {
			catalog,
			deletions: Vec::new(),
			seen: HashSet::new(),
			nullify: Vec::new(),
			protected: Vec::new(),
		}
	}

	fn protect(&mut self, rows: Vec<Record>) {
		for row in rows {
			let already = self
				.protected
				.iter()
				.any(|p| p.model == row.model && p.id == row.id);
			if !already && !self.seen.contains(&(row.model.clone(), row.id)) {
				self.protected.push(row);
			}
		}
	}

	/// Visit the root and everything depending on it
	pub async fn collect(&mut self, conn: &mut SqliteConnection, root: Record) -> DeskResult<()> {
		let catalog = self.catalog;
		let registry = &catalog.registry;
		let mut queue: VecDeque<(String, Vec<i64>)> = VecDeque::new();
		self.seen.insert((root.model.clone(), root.id));
		queue.push_back((root.model.clone(), vec![root.id]));
		self.deletions.push(root);

		while let Some((model_name, ids)) = queue.pop_front() {
			for dependent in registry.dependents(&model_name) {
				let Some(on_delete) = dependent.field.on_delete() else {
					continue;
				};
				let rows = QuerySet::new(registry, dependent.model)
					.filter(Filter::is_in(dependent.field.name, ids.iter().copied()))
					.fetch(conn)
					.await?;
				if rows.is_empty() {
					continue;
				}

				match on_delete {
					OnDelete::Protect => self.protect(rows),
					OnDelete::SetNull => self.nullify.push(Nullify {
						model: dependent.model,
						field: dependent.field,
						ids: rows.iter().map(|r| r.id).collect(),
					}),
					OnDelete::Cascade => {
						let owned = matches!(dependent.field.kind, FieldKind::OneToOne { .. });
						if !owned && !catalog.is_deletable(dependent.model.model_name) {
							self.protect(rows);
							continue;
						}
						let mut next = Vec::new();
						for row in rows {
							if self.seen.insert((row.model.clone(), row.id)) {
								next.push(row.id);
								self.deletions.push(row);
							}
						}
						if !next.is_empty() {
							queue.push_back((dependent.model.model_name.to_string(), next));
						}
					}
				}
			}
		}
		Ok(())
	}

	pub fn protected(&self) -> &[Record] {
		&self.protected
	}

	pub fn deletions(&self) -> &[Record] {
		&self.deletions
	}

	pub fn can_delete(&self) -> bool {
		self.protected.is_empty()
	}

	/// Number of rows to delete per model plural name, root model first
	pub fn summary(&self) -> Vec<(String, usize)> {
		let mut order: Vec<&str> = Vec::new();
		let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
		for record in &self.deletions {
			if !counts.contains_key(record.model.as_str()) {
				order.push(record.model.as_str());
			}
			*counts.entry(record.model.as_str()).or_default() += 1;
		}
		order
			.into_iter()
			.map(|model| {
				let name = self
					.catalog
					.registry
					.get(model)
					.map(|m| m.verbose_name_plural)
					.unwrap_or(model);
				(name.to_string(), counts[model])
			})
			.collect()
	}

	/// Indices into `deletions` such that no row goes while another collected
	/// row still references it
	///
	/// Set-null references are left to the database. Rows reached later are
	/// tried first; rows caught in a reference cycle keep that order and are
	/// left for the database to judge.
	fn deletion_order(&self) -> Vec<usize> {
		let registry = &self.catalog.registry;
		let key = |record: &Record| (record.model.clone(), record.id);
		let mut referrers: HashMap<(String, i64), usize> = HashMap::new();
		let mut targets: Vec<Vec<(String, i64)>> = Vec::with_capacity(self.deletions.len());

		for record in &self.deletions {
			let own = key(record);
			let fields = registry.get(&record.model).map(|m| m.fields.as_slice()).unwrap_or_default();
			let pointed: Vec<(String, i64)> = fields
				.iter()
				.filter(|field| !matches!(field.on_delete(), Some(OnDelete::SetNull)))
				.filter_map(|field| Some((field.related_model()?.to_string(), record.ref_id(field.name)?)))
				.filter(|target| *target != own && self.seen.contains(target))
				.collect();
			for target in &pointed {
				*referrers.entry(target.clone()).or_default() += 1;
			}
			targets.push(pointed);
		}

		let mut pending: Vec<usize> = (0..self.deletions.len()).rev().collect();
		let mut order = Vec::with_capacity(pending.len());
		while !pending.is_empty() {
			let (free, blocked): (Vec<usize>, Vec<usize>) = pending
				.into_iter()
				.partition(|&i| referrers.get(&key(&self.deletions[i])).copied().unwrap_or(0) == 0);
			if free.is_empty() {
				order.extend(blocked);
				break;
			}
			for &i in &free {
				for target in &targets[i] {
					if let Some(count) = referrers.get_mut(target) {
						*count -= 1;
					}
				}
			}
			order.extend(free);
			pending = blocked;
		}
		order
	}

	/// Run the deletion, returning the deleted rows
	///
	/// Fails with [`DeskError::Protected`] without touching anything when a
	/// protected row was found.
	pub async fn delete(self, conn: &mut SqliteConnection) -> DeskResult<Vec<Record>> {
		if !self.can_delete() {
			return Err(DeskError::Protected(self.protected.len()));
		}
		let catalog = self.catalog;
		let registry = &catalog.registry;

		for nullify in &self.nullify {
			let ids: Vec<i64> = nullify
				.ids
				.iter()
				.copied()
				.filter(|id| !self.seen.contains(&(nullify.model.model_name.to_string(), *id)))
				.collect();
			repo::set_field(conn, nullify.model, nullify.field.name, &FieldValue::Null, &ids).await?;
		}

		for index in self.deletion_order() {
			let record = &self.deletions[index];
			let model = registry.model(&record.model)?;
			repo::delete(conn, model, &[record.id]).await?;
		}
		tracing::info!(rows = self.deletions.len(), "Deleted collected rows");
		Ok(self.deletions)
	}
}
