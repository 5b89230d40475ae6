use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type OnChangeFn = Box<dyn Fn(usize) + Send + Sync>;

/// Open-connection bookkeeping for one server.
///
/// The counter moves on accept and on connection-task exit. An optional
/// callback observes every change, so an application can export the value
/// to whatever metrics pipeline it runs.
#[derive(Default)]
pub struct ConnectionMetrics {
    open: AtomicUsize,
    on_change: Mutex<Option<OnChangeFn>>,
}

impl ConnectionMetrics {
    /// Number of currently open client connections.
    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::Relaxed)
    }

    /// Installs the change callback, replacing any previous one. The
    /// callback runs on server tasks and must not block.
    pub fn on_open_connections_changed(&self, callback: impl Fn(usize) + Send + Sync + 'static) {
        *self.on_change.lock().unwrap() = Some(Box::new(callback));
    }

    pub(crate) fn connection_opened(&self) {
        let count = self.open.fetch_add(1, Ordering::Relaxed) + 1;
        self.notify(count);
    }

    pub(crate) fn connection_closed(&self) {
        let count = self.open.fetch_sub(1, Ordering::Relaxed) - 1;
        self.notify(count);
    }

    fn notify(&self, count: usize) {
        if let Some(callback) = self.on_change.lock().unwrap().as_ref() {
            callback(count);
        }
    }
}

impl fmt::Debug for ConnectionMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionMetrics")
            .field("open", &self.open_connections())
            .finish()
    }
}
