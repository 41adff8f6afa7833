//! Permission checks
//!
//! Permissions are strings in the format `"app_label.codename"` where the
//! codename is `{action}_{model_name}` (e.g. `"contract.change_letter"`).
//! Users hold them directly or through groups; active superusers hold every
//! permission and inactive users hold none.
//!
//! Two actions are composite:
//! - `view` is granted by `view_<model>` or by `change_<model>`
//! - `close` needs both `close_<model>` and `change_<model>`

use crate::registry::ModelDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Action a permission gates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
	Add,
	Change,
	Delete,
	View,
	Close,
}

impl Action {
	pub fn as_str(&self) -> &'static str {
		match self {
			Action::Add => "add",
			Action::Change => "change",
			Action::Delete => "delete",
			Action::View => "view",
			Action::Close => "close",
		}
	}

	/// Permission codename for a model, e.g. `close_contract`
	pub fn codename(&self, model_name: &str) -> String {
		format!("{}_{}", self.as_str(), model_name)
	}
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Permission lookup for user types
pub trait PermissionsMixin: Send + Sync {
	fn is_active(&self) -> bool;

	fn is_superuser(&self) -> bool;

	/// Permissions assigned to the user directly
	fn user_permissions(&self) -> &HashSet<String>;

	/// Permissions inherited from the user's groups
	fn group_permissions(&self) -> &HashSet<String>;

	fn get_all_permissions(&self) -> HashSet<String> {
		self.user_permissions()
			.union(self.group_permissions())
			.cloned()
			.collect()
	}

	fn has_perm(&self, perm: &str) -> bool {
		if !self.is_active() {
			return false;
		}
		if self.is_superuser() {
			return true;
		}
		self.user_permissions().contains(perm) || self.group_permissions().contains(perm)
	}

	fn has_perms(&self, perms: &[&str]) -> bool {
		perms.iter().all(|perm| self.has_perm(perm))
	}

	/// Whether the user holds any permission in `app_label`
	fn has_module_perms(&self, app_label: &str) -> bool {
		if !self.is_active() {
			return false;
		}
		if self.is_superuser() {
			return true;
		}
		let prefix = format!("{}.", app_label);
		self.user_permissions()
			.iter()
			.chain(self.group_permissions())
			.any(|perm| perm.starts_with(&prefix))
	}
}

/// Authenticated user attached to a request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthUser {
	pub id: i64,
	pub username: String,
	pub is_active: bool,
	pub is_superuser: bool,
	pub permissions: HashSet<String>,
	pub group_permissions: HashSet<String>,
}

impl AuthUser {
	pub fn new(id: i64, username: impl Into<String>) -> Self {
		Self {
			id,
			username: username.into(),
			is_active: true,
			..Default::default()
		}
	}

	pub fn superuser(mut self) -> Self {
		self.is_superuser = true;
		self
	}

	pub fn inactive(mut self) -> Self {
		self.is_active = false;
		self
	}

	pub fn with_perm(mut self, perm: impl Into<String>) -> Self {
		self.permissions.insert(perm.into());
		self
	}

	pub fn with_group_perm(mut self, perm: impl Into<String>) -> Self {
		self.group_permissions.insert(perm.into());
		self
	}
}

impl PermissionsMixin for AuthUser {
	fn is_active(&self) -> bool {
		self.is_active
	}

	fn is_superuser(&self) -> bool {
		self.is_superuser
	}

	fn user_permissions(&self) -> &HashSet<String> {
		&self.permissions
	}

	fn group_permissions(&self) -> &HashSet<String> {
		&self.group_permissions
	}
}

/// Check an action against a model, applying the composite rules
///
/// # Examples
///
/// ```
/// use desk_core::permissions::{has_permission, Action, AuthUser};
/// use desk_core::registry::ModelDescriptor;
///
/// let contract = ModelDescriptor::new("contract", "contract", "contract", "contracts");
/// let editor = AuthUser::new(1, "editor").with_perm("contract.change_contract");
///
/// assert!(has_permission(&editor, &contract, Action::View));
/// assert!(!has_permission(&editor, &contract, Action::Close));
///
/// let closer = editor.with_perm("contract.close_contract");
/// assert!(has_permission(&closer, &contract, Action::Close));
/// ```
pub fn has_permission<U: PermissionsMixin + ?Sized>(
	user: &U,
	model: &ModelDescriptor,
	action: Action,
) -> bool {
	let perm = |action: Action| user.has_perm(&model.perm(action.as_str()));
	match action {
		Action::View => perm(Action::View) || perm(Action::Change),
		Action::Close => perm(Action::Close) && perm(Action::Change),
		other => perm(other),
	}
}

/// Resolved permissions of one user over one or several models
///
/// For a multi-model list every flag requires the action on all models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PermissionSet {
	pub add: bool,
	pub change: bool,
	pub delete: bool,
	pub view: bool,
	pub close: bool,
}

impl PermissionSet {
	pub fn for_model<U: PermissionsMixin + ?Sized>(user: &U, model: &ModelDescriptor) -> Self {
		Self {
			add: has_permission(user, model, Action::Add),
			change: has_permission(user, model, Action::Change),
			delete: has_permission(user, model, Action::Delete),
			view: has_permission(user, model, Action::View),
			close: has_permission(user, model, Action::Close),
		}
	}

	pub fn for_models<U: PermissionsMixin + ?Sized>(user: &U, models: &[&ModelDescriptor]) -> Self {
		if models.is_empty() {
			return Self::default();
		}
		models
			.iter()
			.map(|model| Self::for_model(user, model))
			.fold(Self::all(), |acc, set| Self {
				add: acc.add && set.add,
				change: acc.change && set.change,
				delete: acc.delete && set.delete,
				view: acc.view && set.view,
				close: acc.close && set.close,
			})
	}

	pub fn all() -> Self {
		Self {
			add: true,
			change: true,
			delete: true,
			view: true,
			close: true,
		}
	}

	pub fn allows(&self, action: Action) -> bool {
		match action {
			Action::Add => self.add,
			Action::Change => self.change,
			Action::Delete => self.delete,
			Action::View => self.view,
			Action::Close => self.close,
		}
	}

	pub fn any(&self) -> bool {
		self.add || self.change || self.delete || self.view
	}

	/// Drop everything but viewing (archive pages)
	pub fn read_only(self) -> Self {
		Self {
			view: self.view,
			..Self::default()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn letter() -> ModelDescriptor {
		ModelDescriptor::new("contract", "letter", "letter", "letters")
	}

	#[rstest]
	#[case(&["contract.view_letter"], Action::View, true)]
	#[case(&["contract.change_letter"], Action::View, true)]
	#[case(&["contract.add_letter"], Action::View, false)]
	#[case(&["contract.close_letter"], Action::Close, false)]
	#[case(&["contract.close_letter", "contract.change_letter"], Action::Close, true)]
	#[case(&["contract.delete_letter"], Action::Delete, true)]
	#[case(&["database.delete_letter"], Action::Delete, false)]
	fn test_composite_rules(#[case] perms: &[&str], #[case] action: Action, #[case] expected: bool) {
		let user = perms
			.iter()
			.fold(AuthUser::new(1, "u"), |user, perm| user.with_perm(*perm));
		assert_eq!(has_permission(&user, &letter(), action), expected);
	}

	#[rstest]
	fn test_superuser_and_inactive() {
		let admin = AuthUser::new(1, "admin").superuser();
		assert!(has_permission(&admin, &letter(), Action::Close));

		let disabled = AuthUser::new(2, "gone").superuser().inactive();
		assert!(!has_permission(&disabled, &letter(), Action::View));
		assert!(!disabled.has_module_perms("contract"));
	}

	#[rstest]
	fn test_group_permissions_count() {
		let user = AuthUser::new(3, "clerk").with_group_perm("contract.view_letter");
		assert!(has_permission(&user, &letter(), Action::View));
		assert!(user.has_module_perms("contract"));
		assert!(!user.has_module_perms("database"));
		assert_eq!(user.get_all_permissions().len(), 1);
	}

	#[rstest]
	fn test_set_over_several_models_needs_all() {
		let begin = ModelDescriptor::new("contract", "stagebeginlist", "b", "b");
		let end = ModelDescriptor::new("contract", "stageendlist", "e", "e");
		let user = AuthUser::new(4, "u")
			.with_perm("contract.view_stagebeginlist")
			.with_perm("contract.view_stageendlist")
			.with_perm("contract.add_stagebeginlist");

		let set = PermissionSet::for_models(&user, &[&begin, &end]);
		assert!(set.view);
		assert!(!set.add);
		assert!(!PermissionSet::for_models(&user, &[]).view);
	}
}
