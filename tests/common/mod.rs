//! Scripted varnishadm stand-in for integration tests
//!
//! Accepts connections on a loopback port and plays a fixed script per
//! connection, recording every byte the client sends.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use varnish_admin::protocol::{encode_response, Response};

/// Challenge token used by auth scripts (32 bytes)
pub const CHALLENGE: &str = "ixslvvxrgkjptxmcgnnsdxsvdmvfympg";

/// Short timeout for tests that expect success
pub const TIMEOUT: Duration = Duration::from_secs(2);

/// One scripted server action
#[derive(Debug, Clone)]
pub enum Step {
    /// Send a framed response
    Reply(u16, String),

    /// Send raw bytes
    Raw(Vec<u8>),

    /// Read one line from the client
    ReadLine,

    /// Do nothing for a while
    Hold(Duration),

    /// Read until the client closes
    Drain,
}

/// Shorthand for `Step::Reply`
pub fn reply(code: u16, body: &str) -> Step {
    Step::Reply(code, body.to_string())
}

/// Banner greeting
pub fn banner() -> Step {
    reply(200, "-----------------------------\nVarnish Cache CLI 1.0\n-----------------------------\n")
}

/// Auth challenge greeting as varnishd 3 sends it
pub fn challenge() -> Step {
    reply(107, &format!("{}\n\nAuthentication required.\n", CHALLENGE))
}

/// A command exchange: read the client's line, send a reply
pub fn exchange(code: u16, body: &str) -> Vec<Step> {
    vec![Step::ReadLine, reply(code, body)]
}

/// Loopback server running scripts on a background thread
pub struct ScriptedServer {
    port: u16,
    handle: JoinHandle<Vec<Vec<u8>>>,
}

impl ScriptedServer {
    /// Serve a single connection
    pub fn start(script: Vec<Step>) -> Self {
        Self::start_many(vec![script])
    }

    /// Serve one connection per script, in order
    pub fn start_many(scripts: Vec<Vec<Step>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            scripts
                .into_iter()
                .map(|script| {
                    let (stream, _) = listener.accept().unwrap();
                    play(stream, script)
                })
                .collect()
        });

        Self { port, handle }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Wait for every script to finish; returns the bytes received per connection
    pub fn finish(self) -> Vec<Vec<u8>> {
        self.handle.join().unwrap()
    }

    /// Bytes received on the single connection, as text
    pub fn finish_one(self) -> String {
        let mut received = self.finish();
        String::from_utf8(received.remove(0)).unwrap()
    }
}

fn play(stream: TcpStream, script: Vec<Step>) -> Vec<u8> {
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);
    let mut received = Vec::new();

    for step in script {
        match step {
            Step::Reply(code, body) => {
                let frame = encode_response(&Response::new(code, body));
                if writer.write_all(&frame).is_err() {
                    break;
                }
            }
            Step::Raw(bytes) => {
                if writer.write_all(&bytes).is_err() {
                    break;
                }
            }
            Step::ReadLine => {
                if reader.read_until(b'\n', &mut received).unwrap_or(0) == 0 {
                    break;
                }
            }
            Step::Hold(duration) => thread::sleep(duration),
            Step::Drain => {
                let _ = reader.read_to_end(&mut received);
            }
        }
    }

    let _ = writer.shutdown(Shutdown::Both);
    received
}

/// A port with nothing listening on it
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
