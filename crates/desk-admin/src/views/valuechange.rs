//! Lookups behind the dependent form inputs
//!
//! `GET /valuechange/?element=...&id=...` answers `{"element", "data"}`:
//! picking a client fills its city, INN and department, picking a post
//! fills its abbreviation, picking a division narrows the subdivisions.

use super::require;
use crate::site::AdminSite;
use desk_core::{DeskError, DeskResult, FieldValue, PermissionSet, RequestContext};
use desk_db::{Filter, QuerySet};
use desk_http::Response;
use serde_json::{Map, Value, json};

fn json_value(value: &FieldValue) -> Value {
	match value {
		FieldValue::Null => Value::String(String::new()),
		FieldValue::Int(number) => json!(number),
		FieldValue::Bool(flag) => json!(flag),
		other => Value::String(other.to_string()),
	}
}

fn lookup_id(ctx: &RequestContext) -> Option<i64> {
	ctx.query_param("id")
		.map(str::trim)
		.filter(|raw| !raw.is_empty())
		.and_then(|raw| raw.parse().ok())
}

pub(crate) async fn value_change(site: &AdminSite, ctx: &RequestContext) -> DeskResult<Response> {
	let element = ctx.query_param("element").unwrap_or_default().to_string();
	let model_name = match element.as_str() {
		"client_name" => "client",
		"post_abbr" => "post",
		"division" => "subdivision",
		_ => return Err(DeskError::not_found()),
	};
	let registry = site.registry();
	let model = registry.model(model_name)?;
	require(PermissionSet::for_model(&ctx.user, model).view)?;
	let id = lookup_id(ctx);

	let mut conn = site.db.acquire().await?;
	let data = match element.as_str() {
		"client_name" => {
			let client = match id {
				Some(id) => QuerySet::new(registry, model)
					.select_related(&["department"])
					.filter(Filter::eq("id", FieldValue::Int(id)))
					.first(&mut conn)
					.await?,
				None => None,
			};
			let mut data = Map::new();
			for field in ["city", "inn"] {
				let value = client.as_ref().map(|c| json_value(c.get(field))).unwrap_or_else(|| json!(""));
				data.insert(field.to_string(), value);
			}
			let department = client
				.as_ref()
				.and_then(|c| c.related("department"))
				.map(|d| json_value(d.get("name")))
				.unwrap_or_else(|| json!(""));
			data.insert("department__name".to_string(), department);
			Value::Object(data)
		}
		"post_abbr" => {
			let post = match id {
				Some(id) => QuerySet::new(registry, model)
					.filter(Filter::eq("id", FieldValue::Int(id)))
					.first(&mut conn)
					.await?,
				None => None,
			};
			json!({ "abbr": post.map(|p| json_value(p.get("abbr"))).unwrap_or_else(|| json!("")) })
		}
		_ => {
			let mut query = QuerySet::new(registry, model);
			if let Some(id) = id {
				query = query.filter(Filter::eq("division", FieldValue::Ref(id)));
			}
			let rows = query.fetch(&mut conn).await?;
			Value::Array(
				rows.iter()
					.map(|row| json!({ "id": row.id, "text": json_value(row.get("name")) }))
					.collect(),
			)
		}
	};
	Response::json(&json!({ "element": element, "data": data }))
}
