//! nohup-client: session orchestration core for the nohup desktop companion
//!
//! Holds the WebSocket connection to the agent backend, aggregates streamed
//! responses, gates backend-requested tool calls behind user approval,
//! executes them locally and reports results back. The UI talks to it only
//! through [`Intent`]s and [`UiEvent`]s.

pub mod config;
pub mod connection;
pub mod events;
pub mod executor;
pub mod gateway;
pub mod pending;
pub mod registry;
pub mod session;
pub mod stream;

#[cfg(test)]
mod test_support;

pub use config::ClientConfig;
pub use connection::{Connection, ConnectionState, Effect, FrameHandler, TransportEvent};
pub use events::{Intent, NoticeLevel, UiEvent, UiSink};
pub use executor::{
    ActionExecutor, ActionResult, Automation, Decision, ExecutorConfig, SystemAutomation,
};
pub use gateway::{ControlFrame, FrameSink, OutboundGateway};
pub use pending::{ApprovalPolicy, PendingAction, PendingActions};
pub use registry::{SessionId, SessionRegistry};
pub use session::{CoreConfig, SessionCore};
pub use stream::StreamAggregator;
