//! Graceful shutdown
//!
//! A [`ShutdownCoordinator`] fans one shutdown signal out to the accept
//! loop and every open connection, then lets the caller wait until the
//! server has stopped, bounded by a timeout.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, broadcast};

#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
	sender: broadcast::Sender<()>,
	complete: Arc<Notify>,
	timeout: Duration,
}

impl ShutdownCoordinator {
	pub fn new(timeout: Duration) -> Self {
		let (sender, _) = broadcast::channel(1);
		Self {
			sender,
			complete: Arc::new(Notify::new()),
			timeout,
		}
	}

	pub fn subscribe(&self) -> broadcast::Receiver<()> {
		self.sender.subscribe()
	}

	/// Tell every subscriber to stop
	pub fn shutdown(&self) {
		// no subscribers means nothing is running
		let _ = self.sender.send(());
	}

	pub fn notify_shutdown_complete(&self) {
		self.complete.notify_one();
	}

	/// Wait for the server to report it stopped; `false` on timeout
	///
	/// # Examples
	///
	/// ```
	/// use desk_server::ShutdownCoordinator;
	/// use std::time::Duration;
	///
	/// # tokio_test::block_on(async {
	/// let coordinator = ShutdownCoordinator::new(Duration::from_millis(50));
	/// assert!(!coordinator.wait_for_completion().await);
	///
	/// coordinator.notify_shutdown_complete();
	/// assert!(coordinator.wait_for_completion().await);
	/// # });
	/// ```
	pub async fn wait_for_completion(&self) -> bool {
		tokio::time::timeout(self.timeout, self.complete.notified())
			.await
			.is_ok()
	}

	pub fn timeout(&self) -> Duration {
		self.timeout
	}
}

/// Resolve on Ctrl+C, or SIGTERM on Unix
pub async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(err) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %err, "Failed to listen for Ctrl+C");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(err) => {
				tracing::error!(error = %err, "Failed to listen for SIGTERM");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => tracing::info!("Received Ctrl+C"),
		_ = terminate => tracing::info!("Received SIGTERM"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_shutdown_reaches_every_subscriber() {
		let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
		let mut first = coordinator.subscribe();
		let mut second = coordinator.clone().subscribe();

		coordinator.shutdown();

		assert!(first.recv().await.is_ok());
		assert!(second.recv().await.is_ok());
	}

	#[tokio::test]
	async fn test_shutdown_without_subscribers_is_harmless() {
		let coordinator = ShutdownCoordinator::new(Duration::from_millis(10));
		coordinator.shutdown();
		assert_eq!(coordinator.timeout(), Duration::from_millis(10));
	}
}
