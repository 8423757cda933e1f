//! End-to-end integration tests for the composition copilot.
//!
//! These tests exercise the full wiring: a [`GesturePipeline`] driven by
//! scripted camera frames posts gesture events over a real TCP connection to
//! a [`CoordinationServer`], which mutates its canonical [`Sequence`] and
//! reports the result back over the plain HTTP surface, driving the whole
//! chain over real TCP rather than in-process channels.

use ensemble_copilot::gesture::emit::GestureEmitter;
use ensemble_copilot::gesture::landmarks::{HandObservation, INDEX_DIP, INDEX_MCP, INDEX_PIP, INDEX_TIP, Point3};
use ensemble_copilot::gesture::source::{ScriptedDetector, SyntheticSource};
use ensemble_copilot::gesture::GesturePipeline;
use ensemble_copilot::model::{Note, NoteType, Sequence};
use ensemble_copilot::server::CoordinationServer;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

/// Starts a coordination server on `addr` in a background thread and gives
/// it a moment to bind before returning.
fn spawn_server(addr: &str) {
    let server = CoordinationServer::new(addr.to_string(), None);
    thread::spawn(move || server.run());
    thread::sleep(Duration::from_millis(100));
}

/// A minimal blocking HTTP/1.1 client sufficient for this server's surface:
/// sends one request, reads headers + body, returns `(status, body)`.
fn http_request(addr: &str, method: &str, path: &str, body: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).unwrap();
    let request = format!(
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(request.as_bytes()).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

    let mut raw = Vec::new();
    let _ = stream.read_to_end(&mut raw);
    let text = String::from_utf8_lossy(&raw);
    let mut parts = text.splitn(2, "\r\n\r\n");
    let head = parts.next().unwrap_or_default();
    let body = parts.next().unwrap_or_default().to_string();
    let status = head
        .lines()
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);
    (status, body)
}

fn note(pitch: &str, beat: f64) -> Note {
    Note {
        pitch: pitch.to_string(),
        duration: 1.0,
        beat,
        note_type: NoteType::Quarter,
        instrument: 0,
        sample_bank: None,
    }
}

/// Builds a scripted sequence of landmark observations showing only the
/// index finger extended, moving steadily downward — enough frames and
/// displacement to cross the index-swipe detector's thresholds.
fn index_swipe_script(n: usize) -> Vec<Option<HandObservation>> {
    (0..n)
        .map(|i| {
            let mut lm: [Point3; 21] = [[0.5, 0.5, 0.0]; 21];
            lm[INDEX_MCP] = [0.5, 0.6, 0.0];
            lm[INDEX_PIP] = [0.5, 0.45, 0.0];
            lm[INDEX_DIP] = [0.5, 0.3, 0.0];
            lm[INDEX_TIP] = [0.5, 0.6 - i as f32 * 0.03, 0.0];
            Some(HandObservation {
                landmarks: lm,
                right_hand: true,
            })
        })
        .collect()
}

#[test]
fn put_sequence_then_get_round_trips() {
    let addr = "127.0.0.1:18081";
    spawn_server(addr);

    let mut seq = Sequence::untitled();
    seq.notes = vec![note("C4", 0.0), note("D4", 1.0), note("E4", 2.0)];
    let body = serde_json::json!({"sequence": seq}).to_string();

    let (status, resp) = http_request(addr, "PUT", "/sequence", &body);
    assert_eq!(status, 200);
    assert!(resp.contains("\"note_count\":3"));

    let (status, resp) = http_request(addr, "GET", "/sequence", "");
    assert_eq!(status, 200);
    assert!(resp.contains("\"C4\""));
    assert!(resp.contains("\"cursor\":0"));
}

#[test]
fn gesture_post_mutates_cursor_and_pitch() {
    let addr = "127.0.0.1:18082";
    spawn_server(addr);

    let mut seq = Sequence::untitled();
    seq.notes = vec![note("C4", 0.0), note("D4", 1.0)];
    let body = serde_json::json!({"sequence": seq}).to_string();
    let (status, _) = http_request(addr, "PUT", "/sequence", &body);
    assert_eq!(status, 200);

    let gesture = serde_json::json!({"gesture": "SCROLL_FORWARD", "confidence": 0.9, "timestamp": 0.0}).to_string();
    let (status, resp) = http_request(addr, "POST", "/gestures", &gesture);
    assert_eq!(status, 200);
    assert!(resp.contains("\"cursor\":1"));

    let gesture = serde_json::json!({"gesture": "PITCH_UP", "confidence": 0.9, "timestamp": 0.0}).to_string();
    let (status, resp) = http_request(addr, "POST", "/gestures", &gesture);
    assert_eq!(status, 200);
    assert!(resp.contains("\"cursor\":1"));

    let (_, resp) = http_request(addr, "GET", "/sequence", "");
    assert!(resp.contains("\"D#4\""), "expected pitch shift to have landed: {resp}");
}

#[test]
fn unknown_gesture_label_is_ignored_without_mutating_cursor() {
    let addr = "127.0.0.1:18083";
    spawn_server(addr);

    let mut seq = Sequence::untitled();
    seq.notes = vec![note("C4", 0.0), note("D4", 1.0)];
    let body = serde_json::json!({"sequence": seq}).to_string();
    http_request(addr, "PUT", "/sequence", &body);

    let gesture = serde_json::json!({"gesture": "JAZZ_HANDS", "confidence": 0.5, "timestamp": 0.0}).to_string();
    let (status, resp) = http_request(addr, "POST", "/gestures", &gesture);
    assert_eq!(status, 200);
    assert!(resp.contains("\"ignored\""));

    let (_, resp) = http_request(addr, "GET", "/sequence", "");
    assert!(resp.contains("\"cursor\":0"));
}

#[test]
fn health_endpoint_reports_ok() {
    let addr = "127.0.0.1:18084";
    spawn_server(addr);
    let (status, resp) = http_request(addr, "GET", "/health", "");
    assert_eq!(status, 200);
    assert!(resp.contains("\"ok\""));
}

#[test]
fn speech_edit_without_configured_llm_reports_error() {
    let addr = "127.0.0.1:18085";
    spawn_server(addr);
    let body = serde_json::json!({"text": "double the tempo"}).to_string();
    let (status, resp) = http_request(addr, "POST", "/speech", &body);
    assert_eq!(status, 200);
    assert!(resp.contains("\"error\""));
}

/// Drives a [`GesturePipeline`] against scripted frames that fire a
/// `PITCH_UP` index-swipe gesture, with the emitter's outbound POST target
/// set to a live coordination server, and checks the note under the cursor
/// actually shifted — exercising the boundary from camera frame through
/// classifier, emitter worker thread, wire format, and server-side command
/// dispatch.
#[test]
fn gesture_pipeline_end_to_end_shifts_pitch_on_server() {
    let addr = "127.0.0.1:18086";
    spawn_server(addr);

    let mut seq = Sequence::untitled();
    seq.notes = vec![note("C4", 0.0), note("D4", 1.0), note("E4", 2.0)];
    let body = serde_json::json!({"sequence": seq}).to_string();
    http_request(addr, "PUT", "/sequence", &body);

    let n = 14;
    let script = index_swipe_script(n);
    let source = SyntheticSource::new(n);
    let detector = ScriptedDetector::new(script);
    let emitter = GestureEmitter::new(format!("http://{addr}/gestures"));
    let mut pipeline = GesturePipeline::new(Box::new(source), Box::new(detector), emitter);

    let mut t = 0.0;
    let frames = pipeline.run(|| {
        t += 0.03;
        t
    });
    assert_eq!(frames, n);

    // The emitter's worker POSTs asynchronously; give it a moment to land.
    thread::sleep(Duration::from_millis(300));

    let (_, resp) = http_request(addr, "GET", "/sequence", "");
    assert!(resp.contains("\"C#4\""), "expected the cursor note to shift up a semitone: {resp}");
}
