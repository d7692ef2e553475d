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

//! End-to-end scenarios against a real `Superserver`, driving real child
//! processes over real loopback sockets.

extern crate superserver;

use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use superserver::config::{ServiceConfig, SupervisorConfig};
use superserver::{Superserver, SuperserverConfig};

fn echo_service(port: u16) -> ServiceConfig {
    ServiceConfig {
        name: "echo".to_string(),
        port,
        program: PathBuf::from("/bin/cat"),
        program_args: vec!["cat".to_string()],
    }
}

fn connect_with_retry(port: u16) -> TcpStream {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if let Ok(stream) = TcpStream::connect(("127.0.0.1", port)) {
            return stream;
        }
        if Instant::now() > deadline {
            panic!("could not connect to 127.0.0.1:{} before listener came up", port);
        }
        thread::sleep(Duration::from_millis(20));
    }
}

/// S1: one `cat` service; a client round-trips a line and disconnects.
#[test]
fn s1_echo_bridge() {
    let port = 17001;
    let superserver = Superserver::start(SuperserverConfig {
        services: vec![echo_service(port)],
        supervisor: SupervisorConfig {
            service_termination_timeout: Duration::from_millis(500),
            limit: 0,
        },
    })
    .expect("failed to start superserver");

    let mut client = connect_with_retry(port);
    client.write_all(b"hello\n").expect("failed to write to echo service");

    let mut buf = [0u8; 6];
    client
        .read_exact(&mut buf)
        .expect("failed to read echo reply");
    assert_eq!(&buf, b"hello\n");

    drop(client);
    // Give the bridge loop a moment to notice the closed socket and tear
    // the service down before we drain.
    thread::sleep(Duration::from_millis(200));

    superserver.stop();
}

/// S2: `limit = 1` with a long-running service; a second simultaneous
/// connection is rejected while the first is still live.
#[test]
fn s2_admission_cap() {
    let port = 17002;
    let sleeper = ServiceConfig {
        name: "sleeper".to_string(),
        port,
        program: PathBuf::from("/bin/sleep"),
        program_args: vec!["sleep".to_string(), "60".to_string()],
    };

    let superserver = Superserver::start(SuperserverConfig {
        services: vec![sleeper],
        supervisor: SupervisorConfig {
            service_termination_timeout: Duration::from_millis(200),
            limit: 1,
        },
    })
    .expect("failed to start superserver");

    let _first = connect_with_retry(port);
    // Give the first connection's service time to register and claim the
    // only admission slot before the second connects.
    thread::sleep(Duration::from_millis(200));

    let mut second = connect_with_retry(port);
    // The second connection is accepted at the TCP level (there's always
    // a listener) but rejected at admission; the supervisor closes the
    // socket without ever starting a service for it.
    let mut buf = [0u8; 1];
    let read = second.read(&mut buf);
    match read {
        Ok(0) => {} // closed cleanly
        Err(_) => {} // reset or otherwise broken
        Ok(n) => panic!("expected the second connection to be closed, got {} bytes", n),
    }

    superserver.stop();
}

/// S5: the child exits immediately after writing a short reply; the
/// client should still receive it before the socket closes.
#[test]
fn s5_bridge_half_close() {
    let port = 17005;
    let service = ServiceConfig {
        name: "bye".to_string(),
        port,
        program: PathBuf::from("/bin/sh"),
        program_args: vec!["sh".to_string(), "-c".to_string(), "printf bye".to_string()],
    };

    let superserver = Superserver::start(SuperserverConfig {
        services: vec![service],
        supervisor: SupervisorConfig {
            service_termination_timeout: Duration::from_millis(500),
            limit: 0,
        },
    })
    .expect("failed to start superserver");

    let mut client = connect_with_retry(port);
    let mut received = Vec::new();
    client
        .read_to_end(&mut received)
        .expect("failed to read from half-closing service");
    assert_eq!(received, b"bye");

    superserver.stop();
}
