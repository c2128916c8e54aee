//! Transport boundary for the routing-slip engine.
//!
//! The engine only needs to send a message to an address and receive
//! messages addressed to an endpoint. Broker bindings implement
//! [`SendTransport`] and [`ReceiveTransport`]; [`InMemoryTransport`] is the
//! in-process implementation used by tests and the bundled host.

pub mod error;
pub mod memory;
pub mod message;
pub mod transport;

pub use common::Address;
pub use error::{Result, TransportError};
pub use memory::{DeadLetter, InMemoryTransport};
pub use message::{MessageId, TransportMessage};
pub use transport::{Delivery, ReceiveTransport, SendTransport};
