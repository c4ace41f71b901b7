//! Minimal HTTP/1.1 server serving fake PNG images for integration tests.
//!
//! `GET /img/{index}` returns a small body derived from the index. Selected
//! indices answer 404, and every response can be delayed to keep transfers
//! in flight.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    /// Indices that get `404 Not Found`.
    pub fail: Vec<u32>,
    /// Sleep before answering each request.
    pub delay: Duration,
}

pub struct ImageServer {
    base: String,
    requests: Arc<AtomicUsize>,
}

impl ImageServer {
    /// URL template for `SourceConfig::url_template`.
    pub fn template(&self) -> String {
        format!("{}img/{{index}}?r={{nonce}}", self.base)
    }

    /// Number of requests received so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// Body served for `index`: PNG signature followed by the index as text.
pub fn image_bytes(index: u32) -> Vec<u8> {
    let mut body = b"\x89PNG\r\n\x1a\n".to_vec();
    body.extend_from_slice(format!("image-{index}").as_bytes());
    body
}

/// Starts a server in a background thread. It runs until the process exits.
pub fn start(opts: ServerOptions) -> ImageServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&requests);
    let opts = Arc::new(opts);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let opts = Arc::clone(&opts);
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                handle(stream, &opts);
            });
        }
    });
    ImageServer {
        base: format!("http://127.0.0.1:{}/", port),
        requests,
    }
}

fn handle(mut stream: std::net::TcpStream, opts: &ServerOptions) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    thread::sleep(opts.delay);

    let index = parse_index(request);
    match index {
        Some(i) if !opts.fail.contains(&i) => {
            let body = image_bytes(i);
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&body);
        }
        _ => {
            let _ = stream.write_all(
                b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            );
        }
    }
}

/// `GET /img/7?r=... HTTP/1.1` → `Some(7)`.
fn parse_index(request: &str) -> Option<u32> {
    let target = request.lines().next()?.split_whitespace().nth(1)?;
    let path = target.split('?').next()?;
    path.strip_prefix("/img/")?.parse().ok()
}
