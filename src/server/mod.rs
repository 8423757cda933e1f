//! The coordination server: a hand-rolled HTTP/1.1 + WebSocket server
//! owning the canonical sequence. See SPEC_FULL.md §4.3/§4.3A.

pub mod gesture_map;
pub mod routes;
pub mod state;
pub mod transport;

use crate::llm::GeminiClient;
use log::{error, info, warn};
use state::ServerState;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use transport::{parse_request, read_inbound_frame, respond_json, ws_handshake, InboundFrame, WsConnection};

pub struct CoordinationServer {
    addr: String,
    state: Arc<Mutex<ServerState>>,
    llm: Option<Arc<GeminiClient>>,
}

impl CoordinationServer {
    pub fn new(addr: String, llm: Option<Arc<GeminiClient>>) -> Self {
        Self {
            addr,
            state: Arc::new(Mutex::new(ServerState::new())),
            llm,
        }
    }

    /// Binds and accepts connections until the process is killed. One
    /// acceptor thread, one short-lived thread per connection.
    pub fn run(self) {
        let listener = match TcpListener::bind(&self.addr) {
            Ok(l) => l,
            Err(e) => {
                error!("coordination server failed to bind {}: {}", self.addr, e);
                return;
            }
        };
        info!("coordination server listening on http://{}", self.addr);

        for stream in listener.incoming() {
            match stream {
                Ok(mut stream) => {
                    let state = self.state.clone();
                    let llm = self.llm.clone();
                    thread::spawn(move || {
                        let req = match parse_request(&mut stream) {
                            Ok(r) => r,
                            Err(e) => {
                                warn!("request parse error: {e}");
                                return;
                            }
                        };

                        if req.is_ws_upgrade {
                            handle_ws_upgrade(&mut stream, req.ws_key.as_deref(), &state);
                            return;
                        }

                        let (status, reason, body) = match (req.method.as_str(), req.path.as_str()) {
                            ("GET", "/sequence") => routes::get_sequence(&state),
                            ("PUT", "/sequence") => routes::put_sequence(&state, &req.body),
                            ("POST", "/gestures") => routes::post_gestures(&state, &req.body),
                            ("POST", "/speech") => routes::post_speech(&state, &llm, &req.body),
                            ("GET", "/health") => routes::health(),
                            _ => routes::not_found(),
                        };
                        respond_json(&mut stream, status, reason, &body);
                    });
                }
                Err(e) => warn!("TCP accept error: {e}"),
            }
        }
    }

    /// Closes every live subscriber and stops accepting connections by
    /// dropping the listener (§5 shutdown contract). The caller is
    /// responsible for not calling [`run`] again afterward.
    pub fn shutdown(&self) {
        self.state.lock().unwrap().close_all();
    }
}

fn handle_ws_upgrade(stream: &mut std::net::TcpStream, ws_key: Option<&str>, state: &Arc<Mutex<ServerState>>) {
    let Some(key) = ws_key else {
        warn!("WS upgrade request missing Sec-WebSocket-Key");
        return;
    };
    if let Err(e) = ws_handshake(stream, key) {
        warn!("WS handshake failed: {e}");
        return;
    }
    info!("WebSocket client connected");

    let mut read_stream = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            warn!("failed to clone WS stream for reader: {e}");
            return;
        }
    };
    let write_stream = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            warn!("failed to clone WS stream for writer: {e}");
            return;
        }
    };
    state.lock().unwrap().register_subscriber(WsConnection::new(write_stream));

    loop {
        match read_inbound_frame(&mut read_stream) {
            Some(InboundFrame::Text(text)) => {
                info!("ignoring inbound WS message: {text}");
            }
            Some(InboundFrame::Close) | None => break,
            Some(InboundFrame::Ignored) => continue,
        }
    }
}
