//! Gantry Hardware Abstraction Layer
//!
//! This crate defines the contracts between the board-agnostic logic
//! (protocol stack, motion engine, controller) and the hardware it runs on.
//! The same traits are implemented by the RP2040 firmware and by the host
//! test doubles.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  gantry-protocol / gantry-core          │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  gantry-hal (this crate - traits)       │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ gantry-       │       │ host loopback │
//! │   firmware    │       │  + simulators │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`serial::ByteDevice`] - Raw byte stream plus millisecond clock
//! - [`interrupt::IrqControl`] - Masking of named interrupt sources
//! - [`store::CalibrationStore`] - Named scalar persistence

#![no_std]
#![deny(unsafe_code)]

pub mod interrupt;
pub mod serial;
pub mod store;

// Re-export key traits at crate root for convenience
pub use interrupt::{IrqControl, IrqGuard, IrqSet, IrqSource};
pub use serial::{ByteDevice, DEFAULT_BAUDRATE};
pub use store::{CalibrationStore, MemoryStore, Scalar, StoreError};
