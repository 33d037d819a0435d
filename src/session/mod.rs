//! Remote conversational session
//!
//! [`SessionClient`] is the capability the rest of the crate holds on the
//! remote session: start, stream frames, cancel, complete. The controller
//! in [`controller`] is the only caller of the lifecycle operations.

mod client;
mod controller;

pub use client::{HttpSessionClient, InboundSessionEvent, SessionClient};
pub use controller::{SessionController, SessionState};
