//! Control-plane driver core for Broadcom FullMAC wireless adapters.
//!
//! Issues configuration commands over a [`transport::ControlTransport`],
//! routes asynchronous firmware events through an
//! [`dispatcher::EventDispatcher`], and drives the scan and join workflows
//! to completion or timeout.  The bus transport itself lives outside this
//! crate; [`adapters::sim`] provides a host stand-in.

#![deny(unused_must_use)]

pub mod adapters;
pub mod auth;
pub mod config;
pub mod device;
pub mod diagnostics;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod frame;
pub mod ioctl;
pub mod scan;
pub mod sync;
pub mod transport;

pub use device::Device;
pub use error::{Error, Result};
