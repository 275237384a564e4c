//! Driver-side connection plumbing
//!
//! This module handles:
//! * `sslmode` semantics and their mapping onto the driver
//! * TLS configuration (root store, client certificates)
//! * The rustls transport the driver upgrades connections with

mod tls;
mod transport;

pub use tls::{SslMode, TlsConfig, TlsConfigBuilder};
pub use transport::{MakeRustlsConnect, RustlsConnect, RustlsStream};
