//! # graphql-ws-gateway
//!
//! GraphQL subscriptions over WebSocket, speaking the `graphql-ws`
//! subprotocol.
//!
//! A single long-lived socket multiplexes any number of concurrently
//! running operations. Each operation is driven by its own task, while the
//! connection runs an independent handshake and keep-alive state machine
//! and is the only writer to the socket. Query semantics are delegated to
//! a [`engine::GraphQLEngine`]; this crate only orchestrates calls into it.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket, graphql-ws)
//!     │
//!     ├── Upgrade Handler (ws/handler)
//!     ├── Transport Adapter (ws/transport)
//!     │
//!     ├── Connection State Machine (ws/connection)
//!     │     ├── Message Codec (ws/messages)
//!     │     ├── Keep-Alive Timer (ws/keep_alive)
//!     │     └── Operation Registry (ws/registry)
//!     │
//!     ├── Operation Runners (ws/operation) ──► Outbound queue (ws/outbound)
//!     │
//!     └── GraphQL Engine (engine/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod engine;
pub mod error;
pub mod ws;
