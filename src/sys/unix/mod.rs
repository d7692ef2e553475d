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

use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};

use config::ServiceConfig;

/// Spawns `config.program` with an **empty environment** and argv taken
/// verbatim from `config.program_args` — argv[0] is *not* set to the
/// program path. If `program_args` is empty, the spawned process still
/// sees a one-element argv (`argv[0] == ""`, argc == 1): `std::process::Command`
/// has no way to express a true zero-length argv, so `arg0("")` is the
/// closest approximation. This may surprise programs that inspect
/// argv[0]; callers that need the conventional argv[0] should include it
/// as the first element of `program_args`.
pub fn spawn(config: &ServiceConfig) -> io::Result<Child> {
    let mut cmd = Command::new(&config.program);
    cmd.env_clear();
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    match config.program_args.split_first() {
        Some((arg0, rest)) => {
            cmd.arg0(arg0);
            cmd.args(rest);
        }
        None => {
            cmd.arg0("");
        }
    }

    cmd.spawn()
}

/// Sends SIGTERM to `pid`.
pub fn terminate(pid: u32) -> io::Result<()> {
    send_signal(pid, libc::SIGTERM)
}

/// Sends SIGKILL to `pid`.
pub fn kill(pid: u32) -> io::Result<()> {
    send_signal(pid, libc::SIGKILL)
}

fn send_signal(pid: u32, signal: libc::c_int) -> io::Result<()> {
    let result = unsafe { libc::kill(pid as libc::pid_t, signal) };
    if result == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
