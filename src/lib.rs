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

//! An inetd-style superserver: TCP listeners bridged to per-connection
//! child processes, under a global concurrency cap and an escalating
//! shutdown protocol.

#[macro_use]
extern crate log;

pub mod config;
pub mod error;
pub mod limit;
pub mod net;
pub mod service;
pub mod supervisor;
pub mod sys;

mod listener;
mod superserver;

pub use error::{Error, Result};
pub use superserver::{Superserver, SuperserverConfig};
