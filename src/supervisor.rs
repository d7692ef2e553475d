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

//! Owns the set of live [`Service`]s and the global [`LimitCounter`];
//! bridges each accepted connection to its own service and drives the
//! coordinated global shutdown.

use std::collections::HashMap;
use std::net::TcpStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::select;

use config::{ServiceConfig, SupervisorConfig};
use limit::LimitCounter;
use net::NetworkConnection;
use service::Service;

use error::{Error, Result};

type ServiceId = u64;

pub struct Supervisor {
    config: SupervisorConfig,
    limit: LimitCounter,
    registry: Mutex<HashMap<ServiceId, Arc<Service>>>,
    next_id: AtomicU64,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Supervisor {
            limit: LimitCounter::new(config.limit),
            config,
            registry: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// The central per-connection operation: admits, spawns, bridges, and
    /// tears down exactly one service. Runs the bridge loop synchronously
    /// on the calling thread; returns once the connection and its service
    /// have both been fully torn down.
    pub fn start_service(&self, socket: TcpStream, config: &ServiceConfig) -> Result<()> {
        if !self.limit.try_increment() {
            return Err(Error::LimitReached);
        }

        let network = NetworkConnection::new(socket);

        let service = match Service::start(config) {
            Ok(service) => service,
            Err(err) => {
                network.close();
                self.limit.decrement();
                return Err(Error::SpawnFailed(err));
            }
        };

        let id = self.register_service(service.clone());

        info!("service {}: connection accepted, service started", config.name);
        bridge(&network, &service);

        network.close();
        self.stop_service(id, &service);
        Ok(())
    }

    /// Initiates global drain: every currently registered service is
    /// stopped concurrently, and this call blocks until all of them have
    /// completed their escalating shutdown and been removed from the
    /// registry. Services started after the snapshot is taken are drained
    /// by their own bridge's post-loop `stop_service` call instead; the
    /// registry/counter pairing invariant prevents a double decrement if
    /// both paths race on the same service.
    pub fn exit(&self) {
        let snapshot: Vec<(ServiceId, Arc<Service>)> = {
            let registry = self.registry.lock().expect("registry lock poisoned");
            registry.iter().map(|(id, svc)| (*id, svc.clone())).collect()
        };

        let stoppers: Vec<_> = snapshot
            .into_iter()
            .map(|(id, service)| {
                let timeout = self.config.service_termination_timeout;
                thread::spawn(move || {
                    service.stop(timeout).wait();
                    (id, service)
                })
            })
            .collect();

        for handle in stoppers {
            let (id, service) = handle.join().expect("drain stop thread panicked");
            let existed = self.remove_service(id);
            if existed {
                self.limit.decrement();
            }
            debug!("service {}: removed during drain", service.name());
        }
    }

    fn register_service(&self, service: Arc<Service>) -> ServiceId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.registry
            .lock()
            .expect("registry lock poisoned")
            .insert(id, service);
        id
    }

    /// Returns whether an entry was actually present, so the caller can
    /// decrement the limit counter iff it was: this is what prevents a
    /// double decrement when a bridge's own teardown races with `exit`'s
    /// drain over the same service.
    fn remove_service(&self, id: ServiceId) -> bool {
        self.registry
            .lock()
            .expect("registry lock poisoned")
            .remove(&id)
            .is_some()
    }

    fn stop_service(&self, id: ServiceId, service: &Arc<Service>) {
        service
            .stop(self.config.service_termination_timeout)
            .wait();
        let existed = self.remove_service(id);
        if existed {
            self.limit.decrement();
        }
    }
}

/// Forwards bytes in both directions until one side closes. Exactly one
/// thread (the caller's) owns both endpoints for the duration of the
/// loop; `select!` gives a fair, non-starving choice when both are ready
/// simultaneously.
fn bridge(network: &NetworkConnection, service: &Arc<Service>) {
    loop {
        select! {
            recv(network.output()) -> msg => {
                match msg {
                    Ok(chunk) => service.send(&chunk),
                    Err(_) => {
                        debug!("network connection closed");
                        return;
                    }
                }
            }
            recv(service.output()) -> msg => {
                match msg {
                    Ok(chunk) => {
                        if !network.send(&chunk) {
                            debug!("network connection closed while writing");
                            return;
                        }
                    }
                    Err(_) => {
                        debug!("service {}: output closed", service.name());
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::path::PathBuf;
    use std::time::Duration;

    fn supervisor(limit: u32) -> Supervisor {
        Supervisor::new(SupervisorConfig {
            service_termination_timeout: Duration::from_millis(500),
            limit,
        })
    }

    fn cat_config() -> ServiceConfig {
        ServiceConfig {
            name: "echo".to_string(),
            port: 0,
            program: PathBuf::from("/bin/cat"),
            program_args: vec!["cat".to_string()],
        }
    }

    fn accepted_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind loopback listener");
        let addr = listener.local_addr().expect("failed to read local addr");
        let client = TcpStream::connect(addr).expect("failed to connect to loopback listener");
        let (server, _) = listener.accept().expect("failed to accept loopback connection");
        (server, client)
    }

    #[test]
    fn echoes_bytes_through_cat_and_tears_down_on_client_close() {
        let supervisor = Arc::new(supervisor(0));
        let config = cat_config();
        let (server_sock, mut client) = accepted_pair();

        let sup = supervisor.clone();
        let handle = thread::spawn(move || sup.start_service(server_sock, &config));

        client.write_all(b"hello\n").expect("failed to write to client socket");

        let mut buf = [0u8; 6];
        client.read_exact(&mut buf).expect("failed to read echo");
        assert_eq!(&buf, b"hello\n");

        drop(client);
        handle.join().expect("start_service thread panicked").expect("start_service failed");
    }

    #[test]
    fn admission_cap_rejects_second_connection() {
        let supervisor = supervisor(1);
        assert!(supervisor.limit.try_increment());
        assert!(!supervisor.limit.try_increment());
        supervisor.limit.decrement();
        assert!(supervisor.limit.try_increment());
    }

    /// A bridge's own teardown and a concurrent `exit()` drain can race
    /// over the same registered service. Exactly one of them must observe
    /// the registry removal and decrement the limit counter; if both did,
    /// `current()` would underflow to 0 via two decrements from 1 instead
    /// of staying correctly paired with the single earlier increment.
    #[test]
    fn concurrent_stop_service_and_exit_decrement_the_limit_exactly_once() {
        let supervisor = Arc::new(supervisor(1));
        assert!(supervisor.limit.try_increment());

        let config = cat_config();
        let service = Service::start(&config).expect("failed to spawn /bin/cat");
        let id = supervisor.register_service(service.clone());

        let sup_a = supervisor.clone();
        let service_a = service.clone();
        let stopper = thread::spawn(move || sup_a.stop_service(id, &service_a));

        let sup_b = supervisor.clone();
        let drainer = thread::spawn(move || sup_b.exit());

        stopper.join().expect("stop_service thread panicked");
        drainer.join().expect("exit thread panicked");

        assert_eq!(supervisor.limit.current(), 0);
        assert!(supervisor
            .registry
            .lock()
            .expect("registry lock poisoned")
            .is_empty());
    }
}
