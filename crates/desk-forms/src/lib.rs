//! # Contract Desk forms
//!
//! Model forms and formsets over the catalog's form layouts, plus the few
//! hand-built forms of the desk:
//!
//! - [`ModelForm`]: add and change forms driven by a [`desk_core::layout::FormLayout`]
//! - [`FormSet`]: one form per list row with a management form
//! - [`scope`]: choice lists and the validation rules that need the database
//! - [`ColumnSettingsForm`]: per-user list column picks
//! - [`StageAddForm`]: bulk add of contract stages
//! - [`timesheet`]: employee hours per day

pub mod bound_field;
pub mod field;
pub mod form;
pub mod formset;
pub mod scope;
pub mod settings_form;
pub mod stage;
pub mod timesheet;

pub use bound_field::{BoundField, ChoiceOption};
pub use field::{Choice, FieldError, Widget};
pub use form::{FormField, ModelForm};
pub use formset::{FormSet, ManagementForm};
pub use settings_form::{ColumnField, ColumnSettingsForm};
pub use stage::{StageAddForm, StageField};
pub use timesheet::TimeSheetForm;
