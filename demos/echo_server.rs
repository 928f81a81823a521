//! Echo server with a status app on a second virtual host.
//!
//! Run with: cargo run --example echo_server
//!
//! Clients sending `Host: status.localhost` get the status app; everyone
//! else gets the echo app, which replies in upper case.

use hybi::{Application, CloseFrame, HandshakeRequest, Message, Server, Session};
use tracing::info;

struct EchoApp;

impl Application for EchoApp {
    fn on_message(&mut self, session: &mut Session<'_>, message: Message) {
        let reply = match message {
            Message::Text(text) => {
                info!(%text, "echo got message");
                Message::text(text.to_uppercase())
            }
            Message::Binary(data) => Message::binary(data),
        };
        let _ = session.send(reply);
    }

    fn on_close(&mut self, session: &mut Session<'_>, _frame: Option<CloseFrame>) {
        info!(client = %session.address_string(), "echo app shut down");
    }
}

struct StatusApp;

impl Application for StatusApp {
    fn on_message(&mut self, session: &mut Session<'_>, message: Message) {
        let Some(command) = message.as_text() else {
            return;
        };
        let reply = match command {
            "pid" => format!("pid: {}", std::process::id()),
            "version" => format!("hybi {}", env!("CARGO_PKG_VERSION")),
            other => format!("unknown command '{other}'"),
        };
        let _ = session.send(reply);
    }

    fn on_error(&mut self, _session: &mut Session<'_>, error: &hybi::Error) {
        info!(%error, "status app error");
    }

    fn on_close(&mut self, session: &mut Session<'_>, _frame: Option<CloseFrame>) {
        info!(client = %session.address_string(), "status app shut down");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    hybi::logging::init(None)?;

    let mut server = Server::new("localhost", "12345")?;
    server.register_app("echo", None, |_: &HandshakeRequest| {
        Box::new(EchoApp) as Box<dyn Application>
    });
    server.register_app("status", Some("status.localhost"), |request: &HandshakeRequest| {
        info!(host = ?request.host, "status app instantiated");
        Box::new(StatusApp) as Box<dyn Application>
    });

    let handle = server.run().await?;
    info!(addr = %handle.local_addr(), "press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    server.shutdown().await;
    Ok(())
}
