//! # Contract Desk core
//!
//! Domain-independent building blocks of the desk plus its model catalog:
//!
//! - [`Slug`]: `model-obj-related` object addresses
//! - [`registry`]: static model descriptors and display rules
//! - [`fieldconfig`]: list column configuration and its resolution
//! - [`permissions`]: permission strings, users and composite checks
//! - [`layout`]: form layouts, fieldsets and form rules
//! - [`catalog`]: the concrete apps and models of the desk

pub mod catalog;
pub mod context;
pub mod error;
pub mod fieldconfig;
pub mod formdata;
pub mod layout;
pub mod permissions;
pub mod record;
pub mod registry;
pub mod slug;
pub mod value;

pub use catalog::Catalog;
pub use context::{PageAction, RequestContext};
pub use error::{DeskError, DeskResult};
pub use fieldconfig::{ListConfig, ResolvedFields};
pub use formdata::{FormData, UploadedFile};
pub use permissions::{Action, AuthUser, PermissionSet, PermissionsMixin};
pub use record::Record;
pub use registry::{FieldDescriptor, FieldKind, ModelDescriptor, Registry};
pub use slug::Slug;
pub use value::FieldValue;
