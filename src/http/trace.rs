//! Wire tracing
//!
//! Connections report every line they exchange to a `WireTrace` sink handed
//! to them by their `Root`. The default sink forwards to `tracing` under the
//! `davnode::wire` target; `NoWire` discards everything.

use std::fmt;

pub trait WireTrace: Send + Sync {
    /// A line written to the peer (request line or header)
    fn sent(&self, peer: &str, line: &str);

    /// A line read from the peer (status line or header)
    fn received(&self, peer: &str, line: &str);

    /// A body of `len` bytes, or an unknown length, went out
    fn sent_body(&self, _peer: &str, _len: Option<u64>) {}
}

/// Forwards wire lines to `tracing` at TRACE level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWire;

impl WireTrace for TracingWire {
    fn sent(&self, peer: &str, line: &str) {
        tracing::trace!(target: "davnode::wire", peer, "> {}", Redacted(line));
    }

    fn received(&self, peer: &str, line: &str) {
        tracing::trace!(target: "davnode::wire", peer, "< {}", line);
    }

    fn sent_body(&self, peer: &str, len: Option<u64>) {
        tracing::trace!(target: "davnode::wire", peer, len, "> [body]");
    }
}

/// Discards all wire lines
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWire;

impl WireTrace for NoWire {
    fn sent(&self, _peer: &str, _line: &str) {}

    fn received(&self, _peer: &str, _line: &str) {}
}

/// Hides credentials in `Authorization` headers
struct Redacted<'a>(&'a str);

impl fmt::Display for Redacted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.split_once(':') {
            Some((name, _)) if name.eq_ignore_ascii_case("authorization") => {
                write!(f, "{}: ***", name)
            }
            _ => f.write_str(self.0),
        }
    }
}
