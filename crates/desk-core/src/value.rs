//! Typed column values
//!
//! Dates are kept as `NaiveDate` and shown as `dd.mm.yyyy`; input accepts
//! both that form and ISO `yyyy-mm-dd`. Decimals use `rust_decimal`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt;

pub const DATE_DISPLAY_FORMAT: &str = "%d.%m.%Y";
pub const DATE_ISO_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
	#[default]
	Null,
	Text(String),
	Int(i64),
	Decimal(Decimal),
	Bool(bool),
	Date(NaiveDate),
	/// Primary key of a related row
	Ref(i64),
	/// Storage-relative path of an uploaded file
	File(String),
}

impl FieldValue {
	/// Whether the value counts as blank for required checks and display
	pub fn is_empty(&self) -> bool {
		match self {
			FieldValue::Null => true,
			FieldValue::Text(s) | FieldValue::File(s) => s.is_empty(),
			_ => false,
		}
	}

	pub fn as_ref_id(&self) -> Option<i64> {
		match self {
			FieldValue::Ref(id) | FieldValue::Int(id) => Some(*id),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> bool {
		matches!(self, FieldValue::Bool(true))
	}

	pub fn as_text(&self) -> Option<&str> {
		match self {
			FieldValue::Text(s) | FieldValue::File(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_date(&self) -> Option<NaiveDate> {
		match self {
			FieldValue::Date(d) => Some(*d),
			_ => None,
		}
	}

	/// Value as it is prefilled into an HTML input
	pub fn to_input(&self) -> String {
		match self {
			FieldValue::Null => String::new(),
			FieldValue::Text(s) | FieldValue::File(s) => s.clone(),
			FieldValue::Int(i) | FieldValue::Ref(i) => i.to_string(),
			FieldValue::Decimal(d) => d.normalize().to_string(),
			FieldValue::Bool(b) => b.to_string(),
			FieldValue::Date(d) => d.format(DATE_ISO_FORMAT).to_string(),
		}
	}
}

impl fmt::Display for FieldValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			FieldValue::Null => Ok(()),
			FieldValue::Text(s) | FieldValue::File(s) => f.write_str(s),
			FieldValue::Int(i) | FieldValue::Ref(i) => write!(f, "{}", i),
			FieldValue::Decimal(d) => write!(f, "{}", d.normalize()),
			FieldValue::Bool(true) => f.write_str("Yes"),
			FieldValue::Bool(false) => f.write_str("No"),
			FieldValue::Date(d) => write!(f, "{}", d.format(DATE_DISPLAY_FORMAT)),
		}
	}
}

/// Parse a user supplied date in `dd.mm.yyyy` or `yyyy-mm-dd` form
///
/// # Examples
///
/// ```
/// use desk_core::value::parse_date;
///
/// assert_eq!(parse_date("05.03.2024"), parse_date("2024-03-05"));
/// assert!(parse_date("2024/03/05").is_none());
/// ```
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
	let raw = raw.trim();
	NaiveDate::parse_from_str(raw, DATE_DISPLAY_FORMAT)
		.or_else(|_| NaiveDate::parse_from_str(raw, DATE_ISO_FORMAT))
		.ok()
}
