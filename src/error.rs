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

use std::error;
use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// The config file failed validation (missing field, duplicate name or
    /// port). Fatal at startup.
    ConfigInvalid(String),
    /// The config file could not be parsed as TOML.
    ConfigParse(toml::de::Error),
    /// A listener could not bind its configured port. Fatal at startup.
    BindFailed { port: u16, source: io::Error },
    /// The global concurrency limit was already reached.
    LimitReached,
    /// The child process could not be spawned, or a pipe could not be
    /// created for it.
    SpawnFailed(io::Error),
    /// A socket or pipe read/write failed; ends the owning bridge.
    TransportBroken,
    /// Sending a signal to a child process failed.
    SignalSendFailed {
        signal: &'static str,
        source: io::Error,
    },
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::ConfigInvalid(ref msg) => write!(f, "invalid config: {}", msg),
            Error::ConfigParse(ref err) => write!(f, "could not parse config: {}", err),
            Error::BindFailed { port, ref source } => {
                write!(f, "could not bind port {}: {}", port, source)
            }
            Error::LimitReached => write!(f, "global service limit reached"),
            Error::SpawnFailed(ref err) => write!(f, "could not spawn service: {}", err),
            Error::TransportBroken => write!(f, "transport closed unexpectedly"),
            Error::SignalSendFailed { signal, ref source } => {
                write!(f, "could not send {} to child: {}", signal, source)
            }
            Error::Io(ref err) => write!(f, "{}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::ConfigParse(ref err) => Some(err),
            Error::BindFailed { ref source, .. } => Some(source),
            Error::SpawnFailed(ref err) => Some(err),
            Error::SignalSendFailed { ref source, .. } => Some(source),
            Error::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Error {
        Error::ConfigParse(err)
    }
}
