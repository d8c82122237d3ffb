//! Data pack mounting backends.
//!
//! One contract, three transports: an HTTP POST to the local proxy, a QMP
//! session against the bundled emulator, and an HTTP GET against the
//! launcher's router endpoint. `TMount` picks the variants to try from the
//! install's recognized daemon.

use async_trait::async_trait;

use crate::domain::error::ClifpError;

pub mod proxy;
pub mod qmp;
pub mod router;

pub use proxy::ProxyMounter;
pub use qmp::QmpMounter;
pub use router::RouterMounter;

/// A single mount attempt over one transport.
#[async_trait]
pub trait Mounter: Send {
    fn name(&self) -> &'static str;

    /// Attempt the mount. Resolves when the backend acknowledged it.
    async fn mount(&mut self) -> Result<(), ClifpError>;

    /// Best-effort cancellation of an in-flight mount.
    fn abort(&self);
}
