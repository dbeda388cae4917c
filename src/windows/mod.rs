//! SimConnect backend
//!
//! Talks to the simulator through `SimConnect.dll`, loaded at runtime so the
//! crate builds without the SDK import library.
//!
//! # Design
//!
//! - **Runtime binding**: the five entry points the client needs are resolved
//!   with `GetProcAddress`; a missing library or symbol is a connect failure
//! - **Event-driven**: sessions are opened with an auto-reset event instead of
//!   a window handle; a waiter thread turns event signals into
//!   [`Notification`](crate::Notification)s for the driver
//! - **Portable decoding**: raw dispatch buffers are copied out and decoded by
//!   [`crate::message`], which is platform independent
//!
//! On other platforms [`SimConnectHost::load`] returns
//! [`SimError::UnsupportedPlatform`](crate::SimError::UnsupportedPlatform).

#[cfg(windows)]
mod simconnect;

#[cfg(windows)]
pub use simconnect::{SimConnectHost, SimConnectSession};

/// Placeholder for the SimConnect host on platforms without SimConnect.
#[cfg(not(windows))]
#[derive(Debug)]
pub struct SimConnectHost {
    _private: (),
}

#[cfg(not(windows))]
impl SimConnectHost {
    /// Always fails: SimConnect is only available on Windows.
    ///
    /// Implement [`crate::Host`] for a custom backend to run elsewhere.
    pub fn load(_config: &crate::ClientConfig) -> crate::Result<Self> {
        Err(crate::SimError::unsupported_platform("SimConnect", "Windows"))
    }
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;

    #[test]
    fn load_is_unsupported_off_windows() {
        let err = SimConnectHost::load(&crate::ClientConfig::default()).err().unwrap();
        assert!(matches!(err, crate::SimError::UnsupportedPlatform { .. }));
    }
}
