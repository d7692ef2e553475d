// Copyright (c) 2017 Chef Software Inc. and/or applicable contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Wraps one accepted `TcpStream` for the lifetime of a single bridge.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::thread;

use crossbeam_channel::{unbounded, Receiver};

use error::Error;

/// Chunks are delivered up to this many bytes at a time; boundaries carry
/// no framing meaning.
const READ_CHUNK_SIZE: usize = 65_535;

pub struct NetworkConnection {
    stream: TcpStream,
    output: Receiver<Vec<u8>>,
}

impl NetworkConnection {
    /// Wraps `stream` and immediately starts a reader thread that feeds
    /// `output()` until the socket errors (including a clean EOF).
    pub fn new(stream: TcpStream) -> Self {
        let reader_stream = stream.try_clone().expect("failed to clone TCP stream");
        let (tx, rx) = unbounded();

        thread::Builder::new()
            .name("net-reader".to_string())
            .spawn(move || {
                let mut stream = reader_stream;
                let mut buf = vec![0u8; READ_CHUNK_SIZE];
                loop {
                    match stream.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            if tx.send(buf[..n].to_vec()).is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
                // Dropping `tx` closes the channel, which is how `output()`
                // signals end-of-stream to the bridge loop.
            })
            .expect("failed to spawn network reader thread");

        NetworkConnection {
            stream,
            output: rx,
        }
    }

    /// A handle to the lazy sequence of inbound chunks. Closes when the
    /// underlying read errors or hits EOF.
    pub fn output(&self) -> &Receiver<Vec<u8>> {
        &self.output
    }

    /// Writes all of `data`; returns whether the write succeeded. Errors
    /// are the caller's cue that the socket is broken; there are no
    /// retries.
    pub fn send(&self, data: &[u8]) -> bool {
        match (&self.stream).write_all(data) {
            Ok(()) => true,
            Err(source) => {
                warn!("{}: {}", Error::TransportBroken, source);
                false
            }
        }
    }

    /// Idempotent. Unblocks any in-flight read on the reader thread with
    /// an error, which is what closes `output()`.
    pub fn close(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
