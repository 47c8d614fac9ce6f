//! Thin client for the VELUX KLF-200 gateway.
//!
//! The KLF-200 exposes its public API over a TLS socket (port 51200) carrying
//! SLIP-framed binary frames. This crate implements exactly the surface a
//! bridge needs and nothing more:
//!
//! - [`connection`] - TLS session, login, request/confirm exchange
//! - [`frame`] - Transport frame encoding and decoding
//! - [`slip`] - SLIP framing of the raw byte stream
//! - [`messages`] - Typed views over the handful of frames we exchange
//! - [`product`] - Product handles returned by node enumeration
//! - [`position`] - Parameter-value encoding for positions
//! - [`error`] - Error types

pub mod connection;
pub mod error;
pub mod frame;
pub mod messages;
pub mod position;
pub mod product;
pub mod slip;

// Re-export commonly used types at the crate root
pub use connection::{Connection, DEFAULT_PORT};
pub use error::{Error, Result};
pub use messages::{IncomingMessage, StateChange};
pub use position::Position;
pub use product::Product;
