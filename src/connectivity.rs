use crate::error::{Result, TransferError};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Verify the network is reachable by opening a TCP connection to `probe` (`host:port`).
pub fn check(probe: &str, timeout: Duration) -> Result<()> {
    let unreachable = |reason: String| TransferError::Connectivity {
        target: probe.to_string(),
        reason,
    };
    let addrs: Vec<_> = probe
        .to_socket_addrs()
        .map_err(|e| unreachable(e.to_string()))?
        .collect();
    if addrs.is_empty() {
        return Err(unreachable("no addresses resolved".into()));
    }
    let mut last_err = String::new();
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(_) => return Ok(()),
            Err(e) => last_err = e.to_string(),
        }
    }
    Err(unreachable(last_err))
}
