//! Network reachability signal.
//!
//! [`ConnectivityProbe`] is a plain passthrough: no polling or debouncing
//! happens here. The host decides how the flag behind [`NetworkStatus`] is
//! kept current (a CLI flag, an OS notification, a failed request).

pub mod indicator;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use indicator::{spawn_indicator, spawn_indicator_with_period, IndicatorState};

pub trait ConnectivityProbe: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Shared online/offline flag. Clones observe the same flag.
#[derive(Debug, Clone)]
pub struct NetworkStatus {
    online: Arc<AtomicBool>,
}

impl NetworkStatus {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn online() -> Self {
        Self::new(true)
    }

    pub fn offline() -> Self {
        Self::new(false)
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self::online()
    }
}

impl ConnectivityProbe for NetworkStatus {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

impl<P: ConnectivityProbe + ?Sized> ConnectivityProbe for Arc<P> {
    fn is_online(&self) -> bool {
        (**self).is_online()
    }
}

impl<P: ConnectivityProbe + ?Sized> ConnectivityProbe for &P {
    fn is_online(&self) -> bool {
        (**self).is_online()
    }
}
