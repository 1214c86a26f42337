// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! Transport-level error codes, RFC 9000 §20.

pub mod error;

pub use error::TransportError;
