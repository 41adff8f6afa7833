//! Typed values attached to a request by middleware
//!
//! The authentication middleware stores the resolved user here; handlers
//! read it back by type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct Extensions {
	map: Arc<Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>>,
}

impl Extensions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Store a value, replacing any earlier value of the same type
	///
	/// # Examples
	///
	/// ```
	/// use desk_http::Extensions;
	///
	/// let extensions = Extensions::new();
	/// extensions.insert(7_i64);
	/// extensions.insert(8_i64);
	/// assert_eq!(extensions.get::<i64>(), Some(8));
	/// assert!(!extensions.contains::<String>());
	/// ```
	pub fn insert<T: Send + Sync + 'static>(&self, value: T) {
		let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
		map.insert(TypeId::of::<T>(), Box::new(value));
	}

	pub fn get<T>(&self) -> Option<T>
	where
		T: Clone + Send + Sync + 'static,
	{
		let map = self.map.lock().unwrap_or_else(|e| e.into_inner());
		map.get(&TypeId::of::<T>())
			.and_then(|boxed| boxed.downcast_ref::<T>())
			.cloned()
	}

	pub fn contains<T: 'static>(&self) -> bool {
		let map = self.map.lock().unwrap_or_else(|e| e.into_inner());
		map.contains_key(&TypeId::of::<T>())
	}
}

impl std::fmt::Debug for Extensions {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let len = self.map.lock().map(|map| map.len()).unwrap_or_default();
		f.debug_struct("Extensions").field("len", &len).finish()
	}
}
