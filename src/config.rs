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

//! Config file parsing and validation for the superserver.
//!
//! The file format is a top-level array of `[[service]]` tables.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use error::{Error, Result};

/// A single `[[service]]` table before validation.
#[derive(Debug, Clone, Deserialize)]
struct RawServiceConfig {
    name: Option<String>,
    port: Option<u32>,
    program: Option<String>,
    #[serde(rename = "program-args", default)]
    program_args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    #[serde(rename = "service", default)]
    services: Vec<RawServiceConfig>,
}

/// A single validated service definition: a unique name, a unique port to
/// listen on, and the program (plus literal argv) to spawn per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub name: String,
    pub port: u16,
    pub program: PathBuf,
    pub program_args: Vec<String>,
}

/// The tunables that apply to every service managed by this process, as
/// opposed to the per-service definitions above.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorConfig {
    pub service_termination_timeout: Duration,
    pub limit: u32,
}

fn parse(contents: &str) -> Result<Vec<ServiceConfig>> {
    let raw: RawConfig = toml::from_str(contents)?;
    validate(raw.services)
}

fn validate(raw_services: Vec<RawServiceConfig>) -> Result<Vec<ServiceConfig>> {
    let mut services = Vec::with_capacity(raw_services.len());

    for raw in raw_services {
        let name = raw
            .name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::ConfigInvalid("service name required".to_string()))?;
        let port = raw
            .port
            .ok_or_else(|| Error::ConfigInvalid(format!("service {}: port required", name)))?;
        let port = port_in_range(port)
            .ok_or_else(|| Error::ConfigInvalid(format!("service {}: port required", name)))?;
        let program = raw
            .program
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::ConfigInvalid(format!("service {}: program required", name)))?;

        services.push(ServiceConfig {
            name,
            port,
            program: PathBuf::from(program),
            program_args: raw.program_args,
        });
    }

    for (i, service) in services.iter().enumerate() {
        for other in services.iter().skip(i + 1) {
            if other.name == service.name {
                return Err(Error::ConfigInvalid(format!(
                    "duplicate service name: {}",
                    service.name
                )));
            }
            if other.port == service.port {
                return Err(Error::ConfigInvalid(format!(
                    "duplicate service port: {}",
                    service.port
                )));
            }
        }
    }

    Ok(services)
}

/// Ports are 1-65535; `0` means "no port configured" here, just as an
/// absent field would.
fn port_in_range(value: u32) -> Option<u16> {
    if value == 0 || value > u32::from(u16::max_value()) {
        None
    } else {
        Some(value as u16)
    }
}

pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<ServiceConfig>> {
    let contents = fs::read_to_string(path)?;
    parse(&contents)
}
