//! # rudis-protocol
//!
//! Wire protocol implementation for rudis.
//!
//! This crate provides:
//! - Command framing (length-prefixed, binary-safe request frames)
//! - An incremental reply decoder (status, error, integer, bulk, multibulk)
//! - Protocol error types

pub mod command;
pub mod error;
pub mod reply;

pub use command::Command;
pub use error::ProtocolError;
pub use reply::{Decoder, Reply};

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 6379;

/// Line terminator used by the wire protocol.
pub const CRLF: &[u8] = b"\r\n";
