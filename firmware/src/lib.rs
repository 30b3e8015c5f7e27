#![cfg_attr(not(test), no_std)]

//! Firmware for a pocket credential vault: a wireless client asks for or stores a
//! credential, the operator approves it on the local console, and the device answers.

extern crate alloc;

pub mod reassembly;
pub mod storage;
pub mod system;
pub mod transport;
pub mod vault;

#[cfg(target_arch = "xtensa")]
pub mod runtime;
