//! Test harness for driving a running server over real sockets.
//!
//! The client speaks raw frames so tests can check bytes on the wire.

#![allow(dead_code)]

mod client;
mod server;

pub use client::{TestClient, UPGRADE_KEY, UPGRADE_RESPONSE, upgrade_request};
pub use server::{EchoApp, TestServer, echo_factory};
