#![allow(dead_code)]

use std::io::{BufRead, BufReader, Cursor, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const WORKER_EXE: &str = env!("CARGO_BIN_EXE_paradigms");

/// A response the test server sends back after an optional delay.
pub struct Canned {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub delay: Duration,
    /// Bytes of `body` actually written before hanging up. `Content-Length`
    /// still announces the whole body.
    pub sent: Option<usize>,
}

impl Canned {
    pub fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Canned {
            status: 200,
            content_type,
            body: body.into(),
            delay: Duration::ZERO,
            sent: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Canned {
            status,
            content_type: "text/plain",
            body: b"nope".to_vec(),
            delay: Duration::ZERO,
            sent: None,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn cut_after(mut self, bytes: usize) -> Self {
        self.sent = Some(bytes);
        self
    }
}

/// HTTP/1.1 server on a random local port, one thread per connection.
pub struct TestServer {
    addr: SocketAddr,
}

impl TestServer {
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&str) -> Canned + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handler = Arc::new(handler);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else {
                    continue;
                };
                let handler = Arc::clone(&handler);
                thread::spawn(move || {
                    let _ = respond(stream, &*handler);
                });
            }
        });
        TestServer { addr }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

fn respond(mut stream: TcpStream, handler: &dyn Fn(&str) -> Canned) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 || header.trim().is_empty() {
            break;
        }
    }
    let path = request_line.split_whitespace().nth(1).unwrap_or("/");

    let canned = handler(path);
    thread::sleep(canned.delay);
    write!(
        stream,
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        canned.status,
        if canned.status == 200 { "OK" } else { "Error" },
        canned.content_type,
        canned.body.len()
    )?;
    let sent = canned.sent.unwrap_or(canned.body.len()).min(canned.body.len());
    stream.write_all(&canned.body[..sent])?;
    stream.flush()
}

/// A black PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, image::ImageFormat::Png)
}

/// A black JPEG of the given size.
pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, image::ImageFormat::Jpeg)
}

fn encode(width: u32, height: u32, format: image::ImageFormat) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    image::DynamicImage::new_rgb8(width, height)
        .write_to(&mut bytes, format)
        .unwrap();
    bytes.into_inner()
}
