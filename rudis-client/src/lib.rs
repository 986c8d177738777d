//! # rudis-client
//!
//! Client library for a key-value store speaking a line-oriented wire
//! protocol.
//!
//! This crate provides:
//! - A pooled async TCP client with one transparent reconnect per call
//! - Typed wrappers for the common command surface
//! - Structural marshaling between hash replies and record types

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod marshal;
pub mod pool;

pub use client::Client;
pub use config::ClientConfig;
pub use connection::Connection;
pub use error::ClientError;
pub use marshal::{MarshalError, Record, Scalar};
pub use pool::{Pool, Slot, SlotGuard};
