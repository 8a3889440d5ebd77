//! Agent backend connection management
//!
//! Provides the WebSocket connection to the agent backend and the frame
//! handler that turns inbound frames into UI events and tool executions.

mod client;
mod handler;

pub use client::{Connection, ConnectionState, TransportEvent};
pub use handler::{Effect, FrameHandler};
