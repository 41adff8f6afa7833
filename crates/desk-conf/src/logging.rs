//! Tracing subscriber setup

use crate::settings::{LogFormat, Settings};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter from `RUST_LOG` when set, otherwise from `log_level`
fn filter(log_level: &str) -> EnvFilter {
	EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(log_level))
		.unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber; later calls are ignored
pub fn init(settings: &Settings) {
	let registry = tracing_subscriber::registry().with(filter(&settings.log_level));
	let installed = match settings.log_format {
		LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
		LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
	};
	if installed.is_err() {
		tracing::debug!("Tracing subscriber already installed");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serial_test::serial;

	#[test]
	#[serial]
	fn test_init_twice_is_harmless() {
		let settings = Settings {
			log_level: "not a directive ===".to_string(),
			..Settings::default()
		};
		init(&settings);
		init(&Settings::default());
	}
}
