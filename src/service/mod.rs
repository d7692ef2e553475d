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

//! A spawned child process, from the supervisor's perspective: its stdio
//! plumbing and its escalating shutdown protocol.

mod stop_handle;

pub use self::stop_handle::StopHandle;

use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStderr, ChildStdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use ansi_term::Colour;
use crossbeam_channel::{self, Receiver, Sender};

use config::ServiceConfig;
use error::Error;
use sys::process;

/// Bounded by `DEFAULT_EXIT_TIMEOUT` after stdin-close and again after
/// SIGKILL; the caller-supplied timeout governs the wait after SIGTERM.
const DEFAULT_EXIT_TIMEOUT: Duration = Duration::from_millis(500);

const READ_CHUNK_SIZE: usize = 65_535;

/// A running (or stopping) child process spawned for one connection.
pub struct Service {
    name: String,
    pid: u32,
    child: Mutex<Child>,
    stdin: Mutex<Option<ChildStdin>>,
    output: Receiver<Vec<u8>>,
    stopping: AtomicBool,
    stop_handle: StopHandle,
}

impl Service {
    /// Spawns `config.program` and starts the background stdout/stderr
    /// readers. Fails if spawn or pipe creation fails.
    pub fn start(config: &ServiceConfig) -> io::Result<Arc<Self>> {
        let mut child = process::spawn(config)?;
        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .expect("child spawned without stdout pipe");
        let stderr = child
            .stderr
            .take()
            .expect("child spawned without stderr pipe");
        let pid = child.id();
        let name = config.name.clone();

        let (tx, rx) = crossbeam_channel::unbounded();
        spawn_stdout_reader(name.clone(), stdout, tx);
        spawn_stderr_logger(name.clone(), stderr);

        Ok(Arc::new(Service {
            name,
            pid,
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            output: rx,
            stopping: AtomicBool::new(false),
            stop_handle: StopHandle::new(),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lazy sequence of stdout chunks; closes on EOF or read error.
    pub fn output(&self) -> &Receiver<Vec<u8>> {
        &self.output
    }

    /// Writes to the child's stdin. Write errors are logged, not
    /// propagated: the bridge loop notices a dead child via `output()`
    /// closing instead.
    pub fn send(&self, data: &[u8]) {
        let mut guard = self.stdin.lock().expect("service stdin lock poisoned");
        if let Some(stdin) = guard.as_mut() {
            if let Err(source) = stdin.write_all(data) {
                warn!("service {}: {}: {}", self.name, Error::TransportBroken, source);
            }
        }
    }

    /// Runs the escalating termination protocol at most once, no matter
    /// how many callers invoke `stop` concurrently. Every caller gets a
    /// handle to the same stopped-signal, which fires exactly once.
    pub fn stop(self: &Arc<Self>, timeout: Duration) -> StopHandle {
        if self.stopping.compare_and_swap(false, true, Ordering::SeqCst) {
            // Someone else already started the protocol; they'll fire it.
            return self.stop_handle.clone();
        }

        debug!("service {}: stopping", self.name);

        // Step 1: close stdin and start waiting for exit in the background.
        self.stdin.lock().expect("service stdin lock poisoned").take();

        let exited = wait_in_background(self.clone());

        let service = self.clone();
        let complete = self.stop_handle.clone();

        thread::Builder::new()
            .name(format!("{}-stop", service.name))
            .spawn(move || {
                run_termination_protocol(&service.name, service.pid, exited, timeout);
                complete.signal();
            })
            .expect("failed to spawn termination protocol thread");

        self.stop_handle.clone()
    }
}

fn run_termination_protocol(
    name: &str,
    pid: u32,
    exited: mpsc::Receiver<()>,
    timeout: Duration,
) {
    // Step 2: wait for exit after stdin has been closed.
    if exited.recv_timeout(DEFAULT_EXIT_TIMEOUT).is_ok() {
        debug!("service {}: exited after stdin close", name);
        return;
    }

    // Step 3: SIGTERM.
    if let Err(source) = process::terminate(pid) {
        let err = Error::SignalSendFailed {
            signal: "SIGTERM",
            source,
        };
        warn!("service {}: {} (pid {})", name, err, pid);
    }

    // Step 4: wait for exit after SIGTERM, bounded by the caller's timeout.
    if exited.recv_timeout(timeout).is_ok() {
        debug!("service {}: exited after SIGTERM", name);
        return;
    }

    // Step 5: SIGKILL. A failed SIGKILL short-circuits straight to
    // STOPPED: there's nothing further we can do to this process.
    if let Err(source) = process::kill(pid) {
        let err = Error::SignalSendFailed {
            signal: "SIGKILL",
            source,
        };
        warn!("service {}: {} (pid {})", name, err, pid);
        return;
    }

    // Step 6: wait once more after SIGKILL.
    if exited.recv_timeout(DEFAULT_EXIT_TIMEOUT).is_ok() {
        debug!("service {}: exited after SIGKILL", name);
    } else {
        warn!(
            "service {}: process {} did not terminate after SIGKILL",
            name, pid
        );
    }
    // Step 7: whether or not it actually exited, the caller moves on.
}

/// Spawns a thread that blocks on `Child::wait` and reports completion
/// over a one-shot `mpsc` channel, so the termination protocol can wait
/// on it with a timeout (`Child::wait` itself has no timeout variant).
/// Holds an `Arc<Service>` so the child handle stays valid regardless of
/// what the supervisor does with its own reference in the meantime.
fn wait_in_background(service: Arc<Service>) -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name(format!("{}-wait", service.name))
        .spawn(move || {
            let status = service
                .child
                .lock()
                .expect("service child lock poisoned")
                .wait();
            if let Err(ref err) = status {
                warn!("service {}: error waiting for child: {}", service.name, err);
            }
            let _ = tx.send(());
        })
        .expect("failed to spawn wait thread");
    rx
}

fn spawn_stdout_reader(name: String, stdout: ChildStdout, tx: Sender<Vec<u8>>) {
    thread::Builder::new()
        .name(format!("{}-stdout", name))
        .spawn(move || {
            use std::io::Read;
            let mut stdout = stdout;
            let mut buf = vec![0u8; READ_CHUNK_SIZE];
            loop {
                match stdout.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(
                            "service {}: unexpected error reading stdout: {}",
                            name, err
                        );
                        break;
                    }
                }
            }
        })
        .expect("failed to spawn stdout reader thread");
}

fn spawn_stderr_logger(name: String, stderr: ChildStderr) {
    thread::Builder::new()
        .name(format!("{}-stderr", name))
        .spawn(move || {
            let mut reader = BufReader::new(stderr);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        let trimmed = line.trim_end_matches('\n');
                        eprintln!(
                            "{} {}",
                            Colour::Red.bold().paint(format!("service {}:", name)),
                            trimmed
                        );
                    }
                    Err(err) => {
                        warn!(
                            "service {}: unexpected error reading stderr: {}",
                            name, err
                        );
                        break;
                    }
                }
            }
        })
        .expect("failed to spawn stderr logger thread");
}
