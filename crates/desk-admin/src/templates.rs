//! Tera templates of the desk pages
//!
//! The templates are compiled into the binary and registered under their
//! file names. Every page extends `base.html`.

use desk_core::{DeskError, DeskResult};
use std::collections::HashMap;
use tera::{Tera, Value};

const TEMPLATES: &[(&str, &str)] = &[
	("base.html", include_str!("../templates/base.html")),
	("index.html", include_str!("../templates/index.html")),
	("app_index.html", include_str!("../templates/app_index.html")),
	("sidebar.html", include_str!("../templates/sidebar.html")),
	("change_list.html", include_str!("../templates/change_list.html")),
	("contract_list.html", include_str!("../templates/contract_list.html")),
	("change_form.html", include_str!("../templates/change_form.html")),
	("stage_form.html", include_str!("../templates/stage_form.html")),
	("delete_confirmation.html", include_str!("../templates/delete_confirmation.html")),
	("close_confirmation.html", include_str!("../templates/close_confirmation.html")),
	("object_history.html", include_str!("../templates/object_history.html")),
	("timesheet.html", include_str!("../templates/timesheet.html")),
	("account_settings.html", include_str!("../templates/account_settings.html")),
	("column_settings.html", include_str!("../templates/column_settings.html")),
	("field.html", include_str!("../templates/field.html")),
];

/// Compiled page templates
#[derive(Debug, Clone)]
pub struct Templates {
	tera: Tera,
}

impl Templates {
	/// Compile the built-in templates
	///
	/// # Examples
	///
	/// ```
	/// use desk_admin::Templates;
	///
	/// let templates = Templates::new().unwrap();
	/// assert!(templates.names().any(|name| name == "change_list.html"));
	/// ```
	pub fn new() -> DeskResult<Self> {
		let mut tera = Tera::default();
		tera.add_raw_templates(TEMPLATES.iter().copied())
			.map_err(|e| DeskError::Template(format!("Failed to compile templates: {}", e)))?;
		tera.autoescape_on(vec![".html"]);
		tera.register_filter("linebreaksbr", linebreaksbr);
		Ok(Self { tera })
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.tera.get_template_names()
	}

	pub fn render(&self, name: &str, context: &tera::Context) -> DeskResult<String> {
		self.tera.render(name, context).map_err(|e| {
			tracing::error!(template = name, error = ?e, "Template rendering failed");
			DeskError::Template(format!("Failed to render {}: {}", name, e))
		})
	}
}

/// Escape the text, then turn newlines into `<br>`; pair with `| safe`
fn linebreaksbr(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
	let text = match value {
		Value::String(text) => text.clone(),
		Value::Null => String::new(),
		other => other.to_string(),
	};
	Ok(Value::String(tera::escape_html(&text).replace('\n', "<br>")))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_linebreaksbr_escapes_before_breaking() {
		let value = linebreaksbr(&Value::String("a<b>\nc".into()), &HashMap::new()).unwrap();
		assert_eq!(value, Value::String("a&lt;b&gt;<br>c".into()));
	}

	#[rstest]
	fn test_every_template_compiles() {
		let templates = Templates::new().unwrap();
		assert_eq!(templates.names().count(), TEMPLATES.len());
	}
}
