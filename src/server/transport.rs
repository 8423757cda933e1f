//! Hand-rolled HTTP/1.1 + WebSocket (RFC 6455) transport, generalized from a
//! read-only streaming server into one that also parses method, headers, and
//! request body so it can route `GET`/`PUT`/`POST` to the route handlers.

use log::warn;
use sha1_smol::Sha1;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;

/// A parsed HTTP request, or enough of a WebSocket upgrade to act on it.
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub is_ws_upgrade: bool,
    pub ws_key: Option<String>,
}

pub fn parse_request(stream: &mut TcpStream) -> Result<HttpRequest, String> {
    let mut reader = BufReader::new(stream.try_clone().map_err(|e| e.to_string())?);
    let mut method = String::new();
    let mut path = String::from("/");
    let mut headers = HashMap::new();
    let mut first = true;

    loop {
        let mut line = String::new();
        reader.read_line(&mut line).map_err(|e| e.to_string())?;
        let trimmed = line.trim_end_matches(['\r', '\n']).to_string();
        if trimmed.is_empty() {
            break;
        }
        if first {
            let parts: Vec<&str> = trimmed.split_whitespace().collect();
            if parts.len() >= 2 {
                method = parts[0].to_uppercase();
                path = parts[1].to_string();
            }
            first = false;
            continue;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            headers.insert(name.trim().to_lowercase(), value.trim().to_string());
        }
    }

    let is_ws_upgrade = headers
        .get("upgrade")
        .map(|v| v.to_lowercase().contains("websocket"))
        .unwrap_or(false);
    let ws_key = headers.get("sec-websocket-key").cloned();

    let mut body = Vec::new();
    if let Some(len) = headers.get("content-length").and_then(|v| v.parse::<usize>().ok()) {
        body.resize(len, 0);
        reader.read_exact(&mut body).map_err(|e| e.to_string())?;
    }

    Ok(HttpRequest {
        method,
        path,
        headers,
        body,
        is_ws_upgrade,
        ws_key,
    })
}

pub fn respond_json(stream: &mut TcpStream, status: u16, reason: &str, body: &str) {
    let header = format!(
        "HTTP/1.1 {status} {reason}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n",
        body.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(body.as_bytes());
}

pub fn respond_404(stream: &mut TcpStream) {
    respond_json(stream, 404, "Not Found", "{\"status\":\"error\",\"reason\":\"not found\"}");
}

const WS_MAGIC: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

pub fn ws_handshake(stream: &mut TcpStream, key: &str) -> Result<(), String> {
    let mut hasher = Sha1::new();
    hasher.update(format!("{key}{WS_MAGIC}").as_bytes());
    let accept = base64_encode(&hasher.digest().bytes());
    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\
         \r\n"
    );
    stream.write_all(response.as_bytes()).map_err(|e| e.to_string())
}

fn base64_encode(data: &[u8]) -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut result = String::new();
    let mut i = 0;
    while i < data.len() {
        let b0 = data[i] as u32;
        let b1 = if i + 1 < data.len() { data[i + 1] as u32 } else { 0 };
        let b2 = if i + 2 < data.len() { data[i + 2] as u32 } else { 0 };
        let triple = (b0 << 16) | (b1 << 8) | b2;
        result.push(CHARS[((triple >> 18) & 0x3F) as usize] as char);
        result.push(CHARS[((triple >> 12) & 0x3F) as usize] as char);
        result.push(if i + 1 < data.len() {
            CHARS[((triple >> 6) & 0x3F) as usize] as char
        } else {
            '='
        });
        result.push(if i + 2 < data.len() {
            CHARS[(triple & 0x3F) as usize] as char
        } else {
            '='
        });
        i += 3;
    }
    result
}

/// A registered WebSocket subscriber. Outbound frames use the reference
/// system's hand-rolled `send_text` framing; inbound frames are decoded
/// minimally (text frames only) and discarded, per §4.3's `WS /ws` contract.
pub struct WsConnection {
    stream: TcpStream,
    pub alive: bool,
}

impl WsConnection {
    pub fn new(stream: TcpStream) -> Self {
        let _ = stream.set_nodelay(true);
        Self { stream, alive: true }
    }

    pub fn send_text(&mut self, text: &str) -> bool {
        let payload = text.as_bytes();
        let len = payload.len();
        let mut frame = Vec::with_capacity(10 + len);
        frame.push(0x81); // FIN + text opcode
        if len < 126 {
            frame.push(len as u8);
        } else if len < 65536 {
            frame.push(126);
            frame.push((len >> 8) as u8);
            frame.push((len & 0xFF) as u8);
        } else {
            frame.push(127);
            for i in (0..8).rev() {
                frame.push(((len >> (i * 8)) & 0xFF) as u8);
            }
        }
        frame.extend_from_slice(payload);
        match self.stream.write_all(&frame) {
            Ok(()) => true,
            Err(_) => {
                self.alive = false;
                false
            }
        }
    }

    pub fn close(mut self) {
        let _ = self.stream.write_all(&[0x88, 0x00]); // close frame, no payload
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }

    pub fn try_clone(&self) -> std::io::Result<TcpStream> {
        self.stream.try_clone()
    }
}

/// Outcome of decoding one inbound client WS frame.
pub enum InboundFrame {
    Text(String),
    Close,
    Ignored,
}

/// Decodes one inbound client frame (minimal RFC 6455: text frames only,
/// masked-or-unmasked). The server only logs these, never acts on them
/// (§4.3's `WS /ws` contract) — this runs on a cloned read-half stream so
/// the write-half can live in the broadcast registry independently.
pub fn read_inbound_frame(stream: &mut TcpStream) -> Option<InboundFrame> {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).ok()?;
    let opcode = header[0] & 0x0F;
    let masked = header[1] & 0x80 != 0;
    let mut len = (header[1] & 0x7F) as u64;

    if len == 126 {
        let mut ext = [0u8; 2];
        stream.read_exact(&mut ext).ok()?;
        len = u16::from_be_bytes(ext) as u64;
    } else if len == 127 {
        let mut ext = [0u8; 8];
        stream.read_exact(&mut ext).ok()?;
        len = u64::from_be_bytes(ext);
    }

    let mask_key = if masked {
        let mut k = [0u8; 4];
        stream.read_exact(&mut k).ok()?;
        Some(k)
    } else {
        None
    };

    let mut payload = vec![0u8; len as usize];
    stream.read_exact(&mut payload).ok()?;
    if let Some(key) = mask_key {
        for (i, b) in payload.iter_mut().enumerate() {
            *b ^= key[i % 4];
        }
    }

    if opcode == 0x8 {
        return Some(InboundFrame::Close);
    }
    if opcode != 0x1 {
        return Some(InboundFrame::Ignored);
    }
    match String::from_utf8(payload) {
        Ok(text) => Some(InboundFrame::Text(text)),
        Err(_) => {
            warn!("discarding non-UTF8 inbound WS frame");
            Some(InboundFrame::Ignored)
        }
    }
}
