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

//! Top-level aggregate: binds every configured listener, runs them until
//! told to stop, then drains the supervisor.

use std::net::TcpListener;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};

use config::{ServiceConfig, SupervisorConfig};
use error::{Error, Result};
use listener;
use supervisor::Supervisor;

pub struct SuperserverConfig {
    pub services: Vec<ServiceConfig>,
    pub supervisor: SupervisorConfig,
}

pub struct Superserver {
    supervisor: Arc<Supervisor>,
    stop: Sender<()>,
    listeners: Vec<JoinHandle<()>>,
}

impl Superserver {
    /// Binds every configured port up front -- a `BindFailed` on any one
    /// of them aborts startup before any listener begins accepting --
    /// then spawns one accept-loop thread per service.
    pub fn start(config: SuperserverConfig) -> Result<Self> {
        let bound: Vec<(TcpListener, ServiceConfig)> = config
            .services
            .into_iter()
            .map(|service| {
                listener::bind(&service)
                    .map(|listener| (listener, service.clone()))
                    .map_err(|source| Error::BindFailed {
                        port: service.port,
                        source,
                    })
            })
            .collect::<Result<_>>()?;

        let supervisor = Arc::new(Supervisor::new(config.supervisor));
        let (stop_tx, stop_rx) = unbounded();

        let listeners = bound
            .into_iter()
            .map(|(tcp_listener, service)| {
                let supervisor = supervisor.clone();
                let stop_rx = stop_rx.clone();
                thread::Builder::new()
                    .name(format!("listener-{}", service.name))
                    .spawn(move || listener::run(tcp_listener, service, supervisor, stop_rx))
                    .expect("failed to spawn listener thread")
            })
            .collect();

        Ok(Superserver {
            supervisor,
            stop: stop_tx,
            listeners,
        })
    }

    /// Closes the stop-broadcast, waits for every listener to return
    /// (releasing its port), then drains the supervisor. Not required to
    /// be idempotent: callers invoke this at most once, from a signal
    /// handler.
    pub fn stop(self) {
        drop(self.stop);
        for listener in self.listeners {
            let _ = listener.join();
        }
        self.supervisor.exit();
    }
}
