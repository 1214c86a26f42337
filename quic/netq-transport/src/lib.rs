// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod ack_tracker;
pub mod config;
pub mod connection;
pub mod space;
pub mod stream;

/// The operation queue, worker executor, and UDP binding/listener all
/// require OS threads, synchronization primitives, and sockets — they have
/// no meaningful `no_std` rendition, unlike the rest of this crate.
#[cfg(feature = "std")]
pub mod binding;
#[cfg(feature = "std")]
pub mod operation;
#[cfg(feature = "std")]
pub mod worker;
