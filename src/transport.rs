//! Command transport facade: the driver's only way to talk to firmware.
//!
//! Concrete implementations live outside the core:
//! - SDIO/SPI bus drivers with CDC framing (production)
//! - [`SimFirmware`](crate::adapters::sim::SimFirmware) (host simulation)
//! - recording mocks (tests)
//!
//! Every workflow is generic over [`ControlTransport`], so a new bus needs
//! zero changes to scan or join logic.  All calls are synchronous: they
//! block the calling context until the firmware replies or the bus faults.

use core::fmt;

/// Logical firmware interface a command is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interface(pub u32);

impl Interface {
    /// Primary station interface.  The only one this driver manages.
    pub const STA: Self = Self(0);

    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Transport-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoError {
    /// The bus reported an error while moving the request or response.
    BusFault,
    /// Firmware never answered the control request.
    NoResponse,
    /// Firmware answered with a negative status code.
    Firmware(i32),
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusFault => write!(f, "bus fault"),
            Self::NoResponse => write!(f, "no response from firmware"),
            Self::Firmware(code) => write!(f, "firmware status {code}"),
        }
    }
}

/// Synchronous request/response channel to adapter firmware.
///
/// `write == true` sets a value from `buf`; `write == false` queries one into
/// `buf`.  Retry policy, if any, belongs to the implementation.
pub trait ControlTransport: Send + Sync {
    /// Fixed-opcode control operation.
    fn ioctl(&self, iface: Interface, write: bool, opcode: u32, buf: &mut [u8]) -> Result<(), IoError>;

    /// Named, variable-length control operation.
    fn iovar(&self, iface: Interface, write: bool, name: &str, buf: &mut [u8]) -> Result<(), IoError>;

    /// Set-only named operation that borrows the caller's buffer without an
    /// internal copy.  The caller keeps `buf` alive for the whole call; the
    /// transport must not retain it afterwards.
    fn iovar_unsafe(&self, iface: Interface, name: &str, buf: &[u8]) -> Result<(), IoError>;
}

impl<T: ControlTransport + ?Sized> ControlTransport for std::sync::Arc<T> {
    fn ioctl(&self, iface: Interface, write: bool, opcode: u32, buf: &mut [u8]) -> Result<(), IoError> {
        (**self).ioctl(iface, write, opcode, buf)
    }

    fn iovar(&self, iface: Interface, write: bool, name: &str, buf: &mut [u8]) -> Result<(), IoError> {
        (**self).iovar(iface, write, name, buf)
    }

    fn iovar_unsafe(&self, iface: Interface, name: &str, buf: &[u8]) -> Result<(), IoError> {
        (**self).iovar_unsafe(iface, name, buf)
    }
}

/// A transport that accepts every set and answers every query with zeros.
/// Useful before the bus is up, or as a stand-in in tests.
pub struct NullTransport;

impl ControlTransport for NullTransport {
    fn ioctl(&self, _iface: Interface, write: bool, _opcode: u32, buf: &mut [u8]) -> Result<(), IoError> {
        if !write {
            buf.fill(0);
        }
        Ok(())
    }

    fn iovar(&self, _iface: Interface, write: bool, _name: &str, buf: &mut [u8]) -> Result<(), IoError> {
        if !write {
            buf.fill(0);
        }
        Ok(())
    }

    fn iovar_unsafe(&self, _iface: Interface, _name: &str, _buf: &[u8]) -> Result<(), IoError> {
        Ok(())
    }
}
