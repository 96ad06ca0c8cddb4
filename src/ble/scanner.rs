//! Time-boxed device discovery.
//!
//! A [`ScanSession`] runs transport discovery for at most one scan window,
//! matching advertised names against a fixed filter. The first exact match
//! is handed off by the session driver to the connection state machine; a
//! timer stops the scan when nothing matches within the window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::Result;
use crate::transport::Transport;

/// One scan window at a time: bounded duration, exact name filter.
pub struct ScanSession {
    transport: Arc<dyn Transport>,
    name_filter: String,
    duration: Duration,
    active: Arc<AtomicBool>,
    timer: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl ScanSession {
    /// Create a scan session with a device-name filter and window length.
    pub fn new(transport: Arc<dyn Transport>, name_filter: String, duration: Duration) -> Self {
        Self {
            transport,
            name_filter,
            duration,
            active: Arc::new(AtomicBool::new(false)),
            timer: RwLock::new(None),
        }
    }

    /// Start the scan window.
    ///
    /// Calling `start` while a window is already running toggles the session
    /// off instead, mirroring a scan button that flips between the two.
    ///
    /// # Errors
    ///
    /// Propagates transport errors from starting or stopping discovery.
    pub async fn start(&self) -> Result<()> {
        if self.active.load(Ordering::SeqCst) {
            debug!("scan already running, toggling off");
            return self.stop().await;
        }

        info!(filter = %self.name_filter, window = ?self.duration, "starting scan");
        self.transport.start_discovery().await?;
        self.active.store(true, Ordering::SeqCst);

        // Auto-stop when the window elapses without a match.
        let transport = self.transport.clone();
        let active = self.active.clone();
        let duration = self.duration;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if active.swap(false, Ordering::SeqCst) {
                info!("scan window elapsed without a match");
                let _ = transport.stop_discovery().await;
            }
        });
        *self.timer.write() = Some(handle);

        Ok(())
    }

    /// Stop the scan window. Idempotent: a no-op when not running.
    ///
    /// # Errors
    ///
    /// Propagates transport errors from stopping discovery.
    pub async fn stop(&self) -> Result<()> {
        if !self.active.swap(false, Ordering::SeqCst) {
            debug!("scan not running, ignoring stop request");
            return Ok(());
        }

        if let Some(handle) = self.timer.write().take() {
            handle.abort();
        }

        info!("stopping scan");
        self.transport.stop_discovery().await
    }

    /// Check if a scan window is currently running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Check an advertised name against the filter, exact match only.
    pub fn matches(&self, name: Option<&str>) -> bool {
        name == Some(self.name_filter.as_str())
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(handle) = self.timer.write().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    const WINDOW: Duration = Duration::from_secs(10);

    fn session(transport: MockTransport) -> ScanSession {
        ScanSession::new(Arc::new(transport), "Thermometer".to_string(), WINDOW)
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let mut transport = MockTransport::new();
        transport
            .expect_start_discovery()
            .times(1)
            .returning(|| Ok(()));
        transport
            .expect_stop_discovery()
            .times(1)
            .returning(|| Ok(()));

        let session = session(transport);
        session.start().await.unwrap();
        assert!(session.is_active());

        session.stop().await.unwrap();
        assert!(!session.is_active());

        // Idempotent: second stop touches nothing.
        session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_while_running_toggles_off() {
        let mut transport = MockTransport::new();
        transport
            .expect_start_discovery()
            .times(1)
            .returning(|| Ok(()));
        transport
            .expect_stop_discovery()
            .times(1)
            .returning(|| Ok(()));

        let session = session(transport);
        session.start().await.unwrap();
        session.start().await.unwrap();
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn test_name_filter_exact_match() {
        let session = session(MockTransport::new());
        assert!(session.matches(Some("Thermometer")));
        assert!(!session.matches(Some("Thermometer Pro")));
        assert!(!session.matches(Some("thermometer")));
        assert!(!session.matches(None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_elapses_and_auto_stops() {
        let mut transport = MockTransport::new();
        transport
            .expect_start_discovery()
            .times(1)
            .returning(|| Ok(()));
        transport
            .expect_stop_discovery()
            .times(1)
            .returning(|| Ok(()));

        let session = session(transport);
        session.start().await.unwrap();

        tokio::time::sleep(WINDOW + Duration::from_millis(10)).await;
        assert!(!session.is_active());

        // Stop after the timer fired stays a no-op.
        session.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_stop_cancels_timer() {
        let mut transport = MockTransport::new();
        transport
            .expect_start_discovery()
            .times(1)
            .returning(|| Ok(()));
        transport
            .expect_stop_discovery()
            .times(1)
            .returning(|| Ok(()));

        let session = session(transport);
        session.start().await.unwrap();
        session.stop().await.unwrap();

        // Past the window: the aborted timer must not call the transport.
        tokio::time::sleep(WINDOW + Duration::from_millis(10)).await;
        assert!(!session.is_active());
    }
}
