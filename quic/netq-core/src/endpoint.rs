// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! The two roles an endpoint can play in a QUIC connection, RFC 9000 §2.1.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Client,
    Server,
}

impl Type {
    pub fn is_client(self) -> bool {
        matches!(self, Type::Client)
    }

    pub fn is_server(self) -> bool {
        matches!(self, Type::Server)
    }

    pub fn peer(self) -> Self {
        match self {
            Type::Client => Type::Server,
            Type::Server => Type::Client,
        }
    }
}
