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

//! OS-specific process spawn and signal primitives.
//!
//! Only Unix is implemented: the escalating termination protocol is
//! built on SIGTERM/SIGKILL, which have no Windows equivalent.

#[cfg(unix)]
pub mod unix;

#[cfg(unix)]
pub use self::unix as process;

#[cfg(not(unix))]
compile_error!("superserver's escalating SIGTERM/SIGKILL termination protocol requires a Unix target");
