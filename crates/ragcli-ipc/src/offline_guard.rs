//! Process-wide switch that keeps outbound requests on the loopback
//! interface.
//!
//! The guard is reference counted: every [`OfflineGuard::install`] call
//! returns a handle, and the guard stays active until every handle has been
//! restored or dropped.

use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::warn;
use url::{Host, Url};

use crate::error::IpcError;

const GUARD_TARGET: &str = "ragcli_ipc::offline_guard";

static ACTIVE_GUARDS: AtomicUsize = AtomicUsize::new(0);

/// Entry point for the offline guard.
#[derive(Debug, Clone, Copy)]
pub struct OfflineGuard;

impl OfflineGuard {
    /// Activates the guard until the returned handle is restored.
    #[must_use = "the guard is lifted as soon as the handle is dropped"]
    pub fn install() -> OfflineGuardHandle {
        ACTIVE_GUARDS.fetch_add(1, Ordering::SeqCst);
        OfflineGuardHandle { installed: true }
    }

    /// `true` while at least one handle is outstanding.
    #[must_use]
    pub fn is_active() -> bool {
        ACTIVE_GUARDS.load(Ordering::SeqCst) > 0
    }

    /// Checks that `target` points at the local machine.
    ///
    /// Always succeeds while the guard is inactive. URLs without a host
    /// (such as `unix:` or `file:` URLs) are local by definition.
    ///
    /// # Errors
    ///
    /// [`IpcError::InvalidArgument`] when `target` is not a URL and
    /// [`IpcError::ExternalNetworkBlocked`] when it names a remote host.
    pub fn ensure_loopback(target: &str) -> Result<(), IpcError> {
        if !Self::is_active() {
            return Ok(());
        }
        let url = Url::parse(target)
            .map_err(|error| IpcError::InvalidArgument(format!("invalid URL {target:?}: {error}")))?;
        match url.host() {
            None => Ok(()),
            Some(host) if is_loopback(&host) => Ok(()),
            Some(remote) => {
                let host = remote.to_string();
                warn!(target: GUARD_TARGET, host = %host, "blocked external network access");
                Err(IpcError::ExternalNetworkBlocked { host })
            }
        }
    }
}

fn is_loopback(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(domain) => {
            let name = domain.trim_end_matches('.');
            name.eq_ignore_ascii_case("localhost")
                || name.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
        }
        Host::Ipv4(address) => address.is_loopback(),
        Host::Ipv6(address) => address.is_loopback(),
    }
}

/// Keeps the offline guard active until restored or dropped.
#[derive(Debug)]
pub struct OfflineGuardHandle {
    installed: bool,
}

impl OfflineGuardHandle {
    /// Releases this handle. Calling it again has no effect.
    pub fn restore(&mut self) {
        if std::mem::take(&mut self.installed) {
            ACTIVE_GUARDS.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for OfflineGuardHandle {
    fn drop(&mut self) {
        self.restore();
    }
}
