//! Cleaning of submitted values
//!
//! Every model field kind turns the raw submitted string into a typed
//! [`FieldValue`] or a [`FieldError`] carrying the message shown next to the
//! input.

use desk_core::registry::{FieldDescriptor, FieldKind};
use desk_core::value::parse_date;
use desk_core::FieldValue;
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
	#[error("This field is required.")]
	Required,
	#[error("Ensure this value has at most {max} characters (it has {length}).")]
	MaxLength { max: usize, length: usize },
	#[error("Enter a whole number.")]
	InvalidInteger,
	#[error("Enter a number.")]
	InvalidNumber,
	#[error("Ensure that there are no more than {0} digits in total.")]
	MaxDigits(u32),
	#[error("Ensure that there are no more than {0} decimal places.")]
	MaxDecimalPlaces(u32),
	#[error("Ensure that there are no more than {0} digits before the decimal point.")]
	MaxWholeDigits(u32),
	#[error("Ensure this value is greater than or equal to {0}.")]
	MinValue(i64),
	#[error("Ensure this value is less than or equal to {0}.")]
	MaxValue(i64),
	#[error("Enter a valid date.")]
	InvalidDate,
	#[error("Select a valid choice. That choice is not one of the available choices.")]
	InvalidChoice,
	#[error("{0}")]
	Custom(String),
}

pub type FieldResult<T> = Result<T, FieldError>;

/// Input element a field renders as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Widget {
	TextInput,
	Textarea,
	NumberInput,
	CheckboxInput,
	DateInput,
	Select,
	SelectMultiple,
	FileInput,
	HiddenInput,
}

impl Widget {
	pub fn for_field(field: &FieldDescriptor) -> Self {
		match field.kind {
			FieldKind::Char { .. } => Widget::TextInput,
			FieldKind::Text { .. } => Widget::Textarea,
			FieldKind::Integer { .. } | FieldKind::Decimal { .. } => Widget::NumberInput,
			FieldKind::Boolean => Widget::CheckboxInput,
			FieldKind::Date => Widget::DateInput,
			FieldKind::Choice { .. } | FieldKind::ForeignKey { .. } | FieldKind::OneToOne { .. } => {
				Widget::Select
			}
			FieldKind::File { .. } => Widget::FileInput,
		}
	}
}

/// One selectable option of a select widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
	pub value: i64,
	pub label: String,
}

impl Choice {
	pub fn new(value: i64, label: impl Into<String>) -> Self {
		Self {
			value,
			label: label.into(),
		}
	}
}

/// Checkbox semantics: an absent key or a falsy literal is `false`
pub fn checkbox_value(raw: Option<&str>) -> bool {
	match raw {
		None => false,
		Some(value) => !matches!(value.trim().to_ascii_lowercase().as_str(), "" | "false" | "0" | "off"),
	}
}

fn check_range(value: Decimal, min: Option<i64>, max: Option<i64>) -> FieldResult<()> {
	if let Some(min) = min
		&& value < Decimal::from(min)
	{
		return Err(FieldError::MinValue(min));
	}
	if let Some(max) = max
		&& value > Decimal::from(max)
	{
		return Err(FieldError::MaxValue(max));
	}
	Ok(())
}

fn check_length(value: &str, max: Option<usize>) -> FieldResult<()> {
	let length = value.chars().count();
	match max {
		Some(max) if length > max => Err(FieldError::MaxLength { max, length }),
		_ => Ok(()),
	}
}

fn clean_decimal(raw: &str, max_digits: u32, decimal_places: u32) -> FieldResult<Decimal> {
	let normalized = raw.replace(',', ".");
	let value = Decimal::from_str(&normalized).map_err(|_| FieldError::InvalidNumber)?;

	let unsigned = normalized.trim_start_matches(['-', '+']);
	let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
	let whole_digits = whole.trim_start_matches('0').len() as u32;
	let fraction_digits = fraction.trim_end_matches('0').len() as u32;

	if whole_digits + fraction_digits > max_digits {
		return Err(FieldError::MaxDigits(max_digits));
	}
	if fraction_digits > decimal_places {
		return Err(FieldError::MaxDecimalPlaces(decimal_places));
	}
	let max_whole = max_digits.saturating_sub(decimal_places);
	if whole_digits > max_whole {
		return Err(FieldError::MaxWholeDigits(max_whole));
	}
	Ok(value)
}

fn clean_choice_id(raw: &str, choices: Option<&[Choice]>) -> FieldResult<i64> {
	let id = raw.parse::<i64>().map_err(|_| FieldError::InvalidChoice)?;
	match choices {
		Some(choices) if !choices.iter().any(|c| c.value == id) => Err(FieldError::InvalidChoice),
		_ => Ok(id),
	}
}

/// Clean one raw submitted value
///
/// `choices` restricts relation fields; `None` accepts any id. File fields
/// are not cleaned here, uploads are attached by the form.
///
/// # Examples
///
/// ```
/// use desk_core::registry::FieldDescriptor;
/// use desk_core::FieldValue;
/// use desk_forms::field::{clean, FieldError};
///
/// let tabel = FieldDescriptor::integer("tabel", "Personnel number").with_range(Some(0), None);
/// assert_eq!(clean(&tabel, Some(" 12 "), None), Ok(FieldValue::Int(12)));
/// assert_eq!(clean(&tabel, Some("-1"), None), Err(FieldError::MinValue(0)));
/// assert_eq!(clean(&tabel, Some(""), None), Ok(FieldValue::Null));
/// ```
pub fn clean(field: &FieldDescriptor, raw: Option<&str>, choices: Option<&[Choice]>) -> FieldResult<FieldValue> {
	if matches!(field.kind, FieldKind::Boolean) {
		let checked = checkbox_value(raw);
		if field.required && !checked {
			return Err(FieldError::Required);
		}
		return Ok(FieldValue::Bool(checked));
	}

	let raw = raw.map(str::trim).unwrap_or_default();
	if raw.is_empty() {
		if field.required {
			return Err(FieldError::Required);
		}
		return Ok(match field.kind {
			FieldKind::Char { .. } | FieldKind::Text { .. } => FieldValue::Text(String::new()),
			_ => FieldValue::Null,
		});
	}

	match &field.kind {
		FieldKind::Char { max_length } => {
			check_length(raw, Some(*max_length))?;
			Ok(FieldValue::Text(raw.to_string()))
		}
		FieldKind::Text { max_length } => {
			check_length(raw, *max_length)?;
			Ok(FieldValue::Text(raw.to_string()))
		}
		FieldKind::Integer { min, max } => {
			let value = raw.parse::<i64>().map_err(|_| FieldError::InvalidInteger)?;
			check_range(Decimal::from(value), *min, *max)?;
			Ok(FieldValue::Int(value))
		}
		FieldKind::Decimal {
			max_digits,
			decimal_places,
			min,
			max,
		} => {
			let value = clean_decimal(raw, *max_digits, *decimal_places)?;
			check_range(value, *min, *max)?;
			Ok(FieldValue::Decimal(value))
		}
		FieldKind::Date => parse_date(raw)
			.map(FieldValue::Date)
			.ok_or(FieldError::InvalidDate),
		FieldKind::Choice { choices: options } => {
			let value = raw.parse::<i64>().map_err(|_| FieldError::InvalidChoice)?;
			if options.iter().any(|(key, _)| *key == value) {
				Ok(FieldValue::Int(value))
			} else {
				Err(FieldError::InvalidChoice)
			}
		}
		FieldKind::ForeignKey { .. } | FieldKind::OneToOne { .. } => {
			clean_choice_id(raw, choices).map(FieldValue::Ref)
		}
		FieldKind::Boolean | FieldKind::File { .. } => Ok(FieldValue::Null),
	}
}

/// Whether two values count as equal for change detection
///
/// Blank text, `NULL` and an unchecked box compare equal, so an untouched
/// empty input does not register as a change.
pub fn same_value(a: &FieldValue, b: &FieldValue) -> bool {
	let blank = |v: &FieldValue| v.is_empty() || matches!(v, FieldValue::Bool(false));
	match (a, b) {
		_ if blank(a) && blank(b) => true,
		(FieldValue::Int(x) | FieldValue::Ref(x), FieldValue::Int(y) | FieldValue::Ref(y)) => x == y,
		_ => a == b,
	}
}
