//! Drivers de hardware.

pub mod serial;
