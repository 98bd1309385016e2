pub mod accumulator;
pub mod action;
pub mod connection;
pub mod server;
pub mod state_machine;

pub use action::{classify, Action};
pub use state_machine::{evaluate, Request, Response, State};
