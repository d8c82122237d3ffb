//! OS-level process plumbing with no pipeline dependencies.

pub mod bider;
pub mod instance_lock;

pub use bider::ProcessBider;
pub use instance_lock::InstanceLock;
