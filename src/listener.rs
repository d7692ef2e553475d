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

//! One accept loop per configured service, blending acceptance with
//! shutdown observation via a short polling deadline.

use std::io;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use config::ServiceConfig;
use supervisor::Supervisor;

/// How long each accept attempt is allowed to sit idle before the loop
/// re-checks the stop-broadcast.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub fn bind(config: &ServiceConfig) -> io::Result<TcpListener> {
    let listener = TcpListener::bind(("0.0.0.0", config.port))?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

/// Runs the accept loop for one listener until `stop` is closed. Intended
/// to be run on its own thread; returns (releasing the bound port) once
/// the stop-broadcast closes.
pub fn run(
    listener: TcpListener,
    config: ServiceConfig,
    supervisor: Arc<Supervisor>,
    stop: Receiver<()>,
) {
    info!(
        "listening on port {} for service {}",
        config.port, config.name
    );

    loop {
        match listener.accept() {
            Ok((stream, _addr)) => {
                debug!(
                    "service {}: connection accepted, starting service",
                    config.name
                );
                let supervisor = supervisor.clone();
                let config = config.clone();
                std::thread::spawn(move || {
                    if let Err(err) = supervisor.start_service(stream, &config) {
                        warn!("service {}: {}", config.name, err);
                    }
                });
                continue;
            }
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                // No connection pending within this poll; fall through to
                // the stop-broadcast check below.
            }
            Err(err) => {
                warn!("service {}: error accepting connection: {}", config.name, err);
                continue;
            }
        }

        match stop.recv_timeout(POLL_INTERVAL) {
            Err(RecvTimeoutError::Timeout) => continue,
            _ => {
                debug!("service {}: listener stopping", config.name);
                return;
            }
        }
    }
}
