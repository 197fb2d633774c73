//! WebSocket layer: the `graphql-ws` protocol.
//!
//! One socket multiplexes any number of concurrently running operations.
//! Each operation runs in its own [`operation::OperationRunner`] task; the
//! [`connection`] run loop is the single writer to the socket.

pub mod connection;
pub mod handler;
pub mod keep_alive;
pub mod messages;
pub mod operation;
pub mod outbound;
pub mod registry;
pub mod transport;
