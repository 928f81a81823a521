//! Spawns servers on ephemeral ports.

use std::net::SocketAddr;

use hybi::{Application, CloseFrame, HandshakeRequest, Message, Server, Session};

/// Replies to text in upper case and to binary unchanged. Closes on "quit".
pub struct EchoApp;

impl Application for EchoApp {
    fn on_message(&mut self, session: &mut Session<'_>, message: Message) {
        match message {
            Message::Text(text) if text == "quit" => session.close(),
            Message::Text(text) => {
                let _ = session.send(text.to_uppercase());
            }
            Message::Binary(data) => {
                let _ = session.send(data);
            }
        }
    }

    fn on_close(&mut self, _session: &mut Session<'_>, _frame: Option<CloseFrame>) {}
}

pub fn echo_factory(_: &HandshakeRequest) -> Box<dyn Application> {
    Box::new(EchoApp)
}

/// A running server bound to `127.0.0.1` on an OS-chosen port.
pub struct TestServer {
    server: Server,
    addr: SocketAddr,
}

impl TestServer {
    /// Start a server with [`EchoApp`] as the default application.
    pub async fn spawn() -> (Self, SocketAddr) {
        let mut server = Server::new("127.0.0.1", "0").unwrap();
        server.register_app("echo", None, echo_factory);
        Self::start(server).await
    }

    /// Start an already configured server.
    pub async fn start(mut server: Server) -> (Self, SocketAddr) {
        let addr = server.run().await.unwrap().local_addr();
        (Self { server, addr }, addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn server_mut(&mut self) -> &mut Server {
        &mut self.server
    }

    pub async fn shutdown(mut self) -> bool {
        self.server.shutdown().await
    }
}
