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

#[macro_use]
extern crate log;

use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{App, Arg};
use signal_hook::consts::{SIGINT, SIGTERM};

use superserver::config::{self, SupervisorConfig};
use superserver::{Superserver, SuperserverConfig};

const DEFAULT_CONFIG_PATH: &str = "superserver.toml";
const DEFAULT_TERMINATION_TIMEOUT_MS: u64 = 3000;

fn main() {
    env_logger::init();

    let default_timeout = DEFAULT_TERMINATION_TIMEOUT_MS.to_string();
    let args = normalize_single_dash_long_flags(std::env::args());
    let matches = App::new("superserver")
        .about("An inetd-style superserver")
        .arg(
            Arg::with_name("config")
                .short("f")
                .value_name("PATH")
                .help("Config file path")
                .default_value(DEFAULT_CONFIG_PATH)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("timeout")
                .short("t")
                .value_name("MILLISECONDS")
                .help("Per-service SIGTERM to SIGKILL grace window, in milliseconds")
                .default_value(&default_timeout)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("limit")
                .long("limit")
                .value_name("COUNT")
                .help("Maximum number of concurrently running services (0 = unlimited)")
                .default_value("0")
                .takes_value(true),
        )
        .get_matches_from(args);

    let config_path = matches.value_of("config").unwrap_or(DEFAULT_CONFIG_PATH);
    let timeout_ms: u64 = matches
        .value_of("timeout")
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_TERMINATION_TIMEOUT_MS);
    let limit: u32 = matches
        .value_of("limit")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    info!("reading config from file {}", config_path);
    let services = match config::read_from_file(config_path) {
        Ok(services) => services,
        Err(err) => {
            error!("error reading config: {}", err);
            process::exit(1);
        }
    };

    if services.is_empty() {
        info!("no services specified, exiting");
        return;
    }

    let superserver_config = SuperserverConfig {
        services,
        supervisor: SupervisorConfig {
            service_termination_timeout: Duration::from_millis(timeout_ms),
            limit,
        },
    };

    let superserver = match Superserver::start(superserver_config) {
        Ok(superserver) => superserver,
        Err(err) => {
            error!("error starting superserver: {}", err);
            process::exit(1);
        }
    };

    wait_for_shutdown_signal();

    info!("stopping...");
    superserver.stop();
    info!("stopped");
}

/// `--limit` is clap's only spelling for a multi-character flag, but the
/// documented CLI surface also accepts the single-dash `-limit` (the Go
/// `flag` package's convention of treating one or two leading dashes as
/// equivalent for any flag). Rewrite that one spelling before clap ever
/// sees the argument list.
fn normalize_single_dash_long_flags(args: impl Iterator<Item = String>) -> Vec<String> {
    args.map(|arg| {
        if arg == "-limit" {
            "--limit".to_string()
        } else {
            arg
        }
    })
    .collect()
}

/// Blocks the calling thread until SIGINT or SIGTERM is received.
fn wait_for_shutdown_signal() {
    let received = Arc::new(AtomicBool::new(false));

    for signal in &[SIGINT, SIGTERM] {
        signal_hook::flag::register(*signal, received.clone())
            .expect("failed to register shutdown signal handler");
    }

    while !received.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(100));
    }
}
