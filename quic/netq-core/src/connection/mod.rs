// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! Connection identifiers and the terminal errors a connection can close
//! with, RFC 9000 §5.1, §10.

pub mod error;
pub mod id;

pub use error::Error;
pub use id::{ConnectionId, IssuedConnectionId};

/// Which side of a connection originated some event (a close, an error).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Local,
    Remote,
}

impl Location {
    pub fn is_local(self) -> bool {
        matches!(self, Location::Local)
    }

    pub fn is_remote(self) -> bool {
        matches!(self, Location::Remote)
    }
}
