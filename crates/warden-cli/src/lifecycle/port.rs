//! Free port allocation.

use std::net::{Ipv4Addr, TcpListener};

use super::error::LifecycleError;

/// Source of ports for servers launched without an explicit one.
pub trait PortAllocator {
    /// Returns a port that is free at the time of the call.
    fn allocate(&self) -> Result<u16, LifecycleError>;
}

/// Asks the operating system for an ephemeral loopback port.
///
/// The probe listener is released before the port is handed out, so another
/// process could claim it before the server binds.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoopbackPortAllocator;

impl PortAllocator for LoopbackPortAllocator {
    fn allocate(&self) -> Result<u16, LifecycleError> {
        allocate_free_port()
    }
}

/// Binds `127.0.0.1:0` and returns the port the kernel picked.
pub fn allocate_free_port() -> Result<u16, LifecycleError> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .map_err(|source| LifecycleError::AllocatePort { source })?;
    listener
        .local_addr()
        .map(|address| address.port())
        .map_err(|source| LifecycleError::AllocatePort { source })
}
