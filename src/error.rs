//! Lightbar error types.

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};

use crate::session::DeviceId;

/// Errors raised while talking to the lightbar.
#[derive(Debug)]
pub enum Error {
    /// No attached USB device matches the requested IDs.
    DeviceNotFound(DeviceId),
    /// The USB stack rejected a control transfer.
    Transfer(rusb::Error),
    /// The device accepted fewer bytes than were sent.
    ShortTransfer { expected: usize, written: usize },
    /// Enumerating, opening or preparing the device failed.
    Usb(rusb::Error),
    /// LED index outside of the addressable range.
    InvalidLedIndex(u8),
    /// Frame holds more entries than the device has positions.
    FrameTooLong(usize),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceNotFound(device) => {
                write!(f, "device not found matching {} (is it plugged in?)", device)
            },
            Self::Transfer(err) => {
                write!(f, "unable to write to device: {} (root permissions required?)", err)
            },
            Self::ShortTransfer { expected, written } => {
                write!(f, "short write to device: {} of {} bytes", written, expected)
            },
            Self::Usb(err) => write!(f, "USB error: {}", err),
            Self::InvalidLedIndex(index) => write!(f, "invalid LED index: {}", index),
            Self::FrameTooLong(len) => write!(f, "too many LEDs in frame: {}", len),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Transfer(err) | Self::Usb(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusb::Error> for Error {
    fn from(err: rusb::Error) -> Self {
        Self::Usb(err)
    }
}
