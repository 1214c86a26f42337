// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod connection;
pub mod crypto;
pub mod endpoint;
pub mod frame;
pub mod packet;
pub mod path;
pub mod range_set;
pub mod recovery;
pub mod stream;
pub mod time;
pub mod transport;
pub mod varint;
