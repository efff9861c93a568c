//! Core infrastructure for hublink.
//!
//! This crate provides the pieces shared by every hublink connection:
//! - Event system for lifecycle observability
//! - Registry of named handlers for server-pushed invocations

pub mod events;
pub mod handlers;

pub use events::{BoxedEventListener, EventListener, EventListeners, FnListener, HubEvent};
pub use handlers::{Handler, HandlerRegistry};
