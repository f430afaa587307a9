//! Presentation layer: pages that read the stores and dispatch intents, the
//! router with its authentication guard and the interactive console.

pub mod auth;
pub mod console;
pub mod dashboard;
pub mod forms;
pub mod profile;
pub mod roster;
pub mod router;
pub mod table;

pub use console::{Console, Outcome};
pub use router::{Route, Router};
