//! A single unit of scan work.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One (host, port) pair to be probed.
///
/// Produced by the address stream, consumed exactly once by a worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_display() {
        let addr = Address::new("10.0.0.1", 8080);
        assert_eq!(addr.to_string(), "10.0.0.1:8080");
    }
}
