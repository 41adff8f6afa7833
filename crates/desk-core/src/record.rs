//! Loaded rows

use crate::value::FieldValue;
use std::collections::BTreeMap;

static NULL: FieldValue = FieldValue::Null;

/// One row of a registered model
///
/// `values` is keyed by field name (relations hold `FieldValue::Ref`), and
/// `related` holds rows loaded for relation fields, nested for `a__b` paths.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
	pub model: String,
	/// Primary key, `0` for a row that is not saved yet
	pub id: i64,
	pub values: BTreeMap<String, FieldValue>,
	pub related: BTreeMap<String, Record>,
}

impl Record {
	pub fn new(model: impl Into<String>, id: i64) -> Self {
		Self {
			model: model.into(),
			id,
			values: BTreeMap::new(),
			related: BTreeMap::new(),
		}
	}

	pub fn with_value(mut self, field: impl Into<String>, value: FieldValue) -> Self {
		self.set(field, value);
		self
	}

	pub fn with_related(mut self, field: impl Into<String>, related: Record) -> Self {
		self.related.insert(field.into(), related);
		self
	}

	pub fn set(&mut self, field: impl Into<String>, value: FieldValue) {
		self.values.insert(field.into(), value);
	}

	/// Field value, `Null` when absent
	pub fn get(&self, field: &str) -> &FieldValue {
		self.values.get(field).unwrap_or(&NULL)
	}

	/// Owned field value; `id` resolves to the primary key
	pub fn value(&self, field: &str) -> FieldValue {
		if field == "id" {
			FieldValue::Int(self.id)
		} else {
			self.get(field).clone()
		}
	}

	/// Id stored in a relation field
	pub fn ref_id(&self, field: &str) -> Option<i64> {
		self.get(field).as_ref_id()
	}

	/// Loaded related row, following `__` separated paths
	///
	/// # Examples
	///
	/// ```
	/// use desk_core::{FieldValue, Record};
	///
	/// let employee = Record::new("employee", 2);
	/// let member = Record::new("member", 5).with_related("employee", employee);
	/// let letter = Record::new("letter", 9).with_related("ispolnitel", member);
	///
	/// assert_eq!(letter.related("ispolnitel__employee").map(|r| r.id), Some(2));
	/// assert!(letter.related("contract").is_none());
	/// ```
	pub fn related(&self, path: &str) -> Option<&Record> {
		let mut current = self;
		for segment in path.split("__") {
			current = current.related.get(segment)?;
		}
		Some(current)
	}

	pub fn is_saved(&self) -> bool {
		self.id > 0
	}
}
