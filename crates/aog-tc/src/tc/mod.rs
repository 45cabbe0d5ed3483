//! The task controller server: per-client state and the process-data hooks
//! invoked by the session layer.

mod client;
mod server;

pub use client::ClientState;
pub use server::{
    activation_error, pool_error, PoolActivationResult, TaskControllerServer, TcCommand,
};
