//! The device-owner frontend half: HTTP wrapper, polling reconciler,
//! and the settings bridge to paired hardware.

pub mod api;
pub mod bridge;
pub mod poller;
pub mod transport;
