//! Per-host send primitive
//!
//! Wire encoding and connection management live behind this trait.

use crate::error::TransportError;
use crate::op::WriteOp;
use async_trait::async_trait;
use quiver_cluster::Host;

/// Sends write operations to storage hosts
#[async_trait]
pub trait HostTransport: Send + Sync + 'static {
    /// Send one op to `host`, resolving when the host acknowledges or fails
    async fn send(&self, host: &Host, op: &WriteOp) -> Result<(), TransportError>;
}
