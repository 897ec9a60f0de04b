//! Local TCP port probing for workspace services.
//!
//! A port is "available" if a listener can be bound on `127.0.0.1` at probe
//! time. The listener is dropped immediately, so another process may grab the
//! port before docker publishes it. Nothing here reserves ports.

use crate::error::{FilterError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::net::TcpListener;

/// A logical service that needs one host port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRequest {
    /// Compose service name, also the key in the resulting port map.
    pub service: String,
    /// First host port to try.
    pub start: u16,
    /// Port the service listens on inside its container.
    pub container_port: u16,
}

impl PortRequest {
    pub fn new(service: impl Into<String>, start: u16, container_port: u16) -> Self {
        Self {
            service: service.into(),
            start,
            container_port,
        }
    }
}

fn can_bind(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}

/// Inclusive scan window for `max_attempts` candidates starting at `start`.
fn scan_window(start: u16, max_attempts: u16) -> (u16, u16) {
    let first = start.max(1);
    let last = first.saturating_add(max_attempts.saturating_sub(1));
    (first, last)
}

/// Return the first bindable port `>= start`, checking at most `max_attempts`
/// candidates in ascending order.
pub fn find_available_port(start: u16, max_attempts: u16) -> Result<u16> {
    find_port_excluding(start, max_attempts, &BTreeSet::new())
}

fn find_port_excluding(start: u16, max_attempts: u16, taken: &BTreeSet<u16>) -> Result<u16> {
    let (first, last) = scan_window(start, max_attempts);
    if max_attempts > 0 {
        for port in first..=last {
            if taken.contains(&port) {
                continue;
            }
            if can_bind(port) {
                return Ok(port);
            }
        }
    }
    Err(FilterError::ResourceExhausted {
        start: first,
        end: last,
    })
}

/// Allocate one host port per request. Ports handed out earlier in the same
/// call are skipped, so two services never share a host port even when their
/// start ports overlap.
pub fn allocate(requests: &[PortRequest], max_attempts: u16) -> Result<BTreeMap<String, u16>> {
    let mut taken = BTreeSet::new();
    let mut ports = BTreeMap::new();
    for req in requests {
        let port = find_port_excluding(req.start, max_attempts, &taken)?;
        tracing::debug!(service = %req.service, port, "allocated port");
        taken.insert(port);
        ports.insert(req.service.clone(), port);
    }
    Ok(ports)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn occupied_port() -> (TcpListener, u16) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    /// Hold listeners on `len` consecutive ports. Retries from a fresh
    /// ephemeral base when a neighbour is already taken.
    fn occupied_range(len: u16) -> (Vec<TcpListener>, u16) {
        for _ in 0..50 {
            let (first, base) = occupied_port();
            let Some(last) = base.checked_add(len - 1) else {
                continue;
            };
            let mut held = vec![first];
            for port in base + 1..=last {
                match TcpListener::bind(("127.0.0.1", port)) {
                    Ok(l) => held.push(l),
                    Err(_) => break,
                }
            }
            if held.len() == usize::from(len) {
                return (held, base);
            }
        }
        panic!("could not hold {len} consecutive local ports");
    }

    #[test]
    fn fully_occupied_range_is_exhausted() {
        let (_held, base) = occupied_range(4);
        let err = find_available_port(base, 4).unwrap_err();
        assert!(matches!(
            err,
            FilterError::ResourceExhausted { start, end } if start == base && end == base + 3
        ));
    }

    #[test]
    fn single_occupied_port_is_exhausted() {
        let (_guard, port) = occupied_port();
        let err = find_available_port(port, 1).unwrap_err();
        assert!(matches!(
            err,
            FilterError::ResourceExhausted { start, end } if start == port && end == port
        ));
    }

    #[test]
    fn probed_port_is_not_reserved() {
        // Accepted check-then-use race: the probe releases the port, so a
        // second process can take it before docker publishes it.
        let Ok(port) = find_available_port(20000, 2000) else {
            return;
        };
        let other = TcpListener::bind(("127.0.0.1", port));
        assert!(other.is_ok());
        assert!(!matches!(find_available_port(port, 1), Ok(p) if p == port));
    }

    #[test]
    fn zero_attempts_is_exhausted() {
        assert!(matches!(
            find_available_port(20000, 0),
            Err(FilterError::ResourceExhausted { .. })
        ));
    }

    #[test]
    fn occupied_port_is_skipped() {
        let (_guard, port) = occupied_port();
        if let Ok(found) = find_available_port(port, 50) {
            assert!(found > port);
        }
    }

    #[test]
    fn scan_window_clamps_at_u16_max() {
        assert_eq!(scan_window(65530, 100), (65530, u16::MAX));
        assert_eq!(scan_window(0, 3), (1, 3));
    }

    #[test]
    fn allocate_never_hands_out_the_same_port_twice() {
        let (_guard, base) = occupied_port();
        let requests = vec![
            PortRequest::new("a", base, 8000),
            PortRequest::new("b", base, 8000),
            PortRequest::new("c", base, 8000),
        ];
        let Ok(ports) = allocate(&requests, 200) else {
            return;
        };
        let unique: BTreeSet<u16> = ports.values().copied().collect();
        assert_eq!(unique.len(), 3);
        assert!(!unique.contains(&base));
    }
}
