// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![doc = include_str!("../README.md")]
#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod buffer;
mod codec;
mod error;
pub mod examine;
mod frame;
pub mod master;
pub mod registry;
pub mod slave;
#[cfg(feature = "std")]
pub mod transport;
pub mod util;

pub use codec::rtu;
pub use error::*;
pub use frame::*;
