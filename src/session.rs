//! USB device session.

use std::fmt::{self, Display, Formatter};
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::error::Error;
use crate::frame::{self, ReportType};

/// Default lightbar vendor ID.
pub const VENDOR_ID: u16 = 0x1038;

/// Default lightbar product ID.
pub const PRODUCT_ID: u16 = 0x1134;

/// Interface receiving the control transfers.
pub const INTERFACE: u8 = 0;

/// Host to device, class request, interface recipient.
pub const REQUEST_TYPE: u8 = 0x21;

/// HID SET_REPORT.
pub const SET_REPORT: u8 = 0x09;

/// Control transfer wIndex.
pub const REQUEST_INDEX: u16 = 0x00;

/// Wait before committing a write.
///
/// Committing right after a write is ignored by the firmware now and then.
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// USB vendor and product ID pair.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub struct DeviceId {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceId {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self { vendor_id, product_id }
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::new(VENDOR_ID, PRODUCT_ID)
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}:0x{:04x}", self.vendor_id, self.product_id)
    }
}

/// Access to attached USB devices.
pub trait UsbTransport {
    type Handle: UsbHandle;

    /// Open the first device matching `device`.
    fn open(&self, device: DeviceId) -> Result<Option<Self::Handle>, Error>;
}

/// Open USB device handle.
///
/// Dropping the handle closes it.
pub trait UsbHandle {
    /// Check if a kernel driver is bound to an interface.
    fn kernel_driver_active(&mut self, interface: u8) -> Result<bool, Error>;

    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), Error>;

    fn claim_interface(&mut self, interface: u8) -> Result<(), Error>;

    fn release_interface(&mut self, interface: u8) -> Result<(), Error>;

    /// Send a host to device control transfer, returning the number of bytes written.
    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<usize, Error>;
}

/// Session behavior.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub struct SessionOptions {
    /// Follow every write with a commit command.
    pub commit: bool,
    /// Delay between a write and its commit.
    pub settle_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { commit: true, settle_delay: SETTLE_DELAY }
    }
}

/// Exclusive connection to a lightbar.
pub struct Session<H: UsbHandle> {
    handle: Option<H>,
    claimed: bool,
    device: DeviceId,
    options: SessionOptions,
}

impl<H: UsbHandle> Session<H> {
    /// Open a lightbar and prepare it for control transfers.
    pub fn open<T>(transport: &T, device: DeviceId, options: SessionOptions) -> Result<Self, Error>
    where
        T: UsbTransport<Handle = H>,
    {
        let handle = transport.open(device)?.ok_or(Error::DeviceNotFound(device))?;

        // Release happens in `Drop` if preparing the device fails.
        let mut session = Self { handle: Some(handle), claimed: false, device, options };
        session.prepare()?;

        Ok(session)
    }

    /// Write a command buffer.
    pub fn write(&mut self, data: &[u8], report_type: ReportType) -> Result<(), Error> {
        self.transfer(data, report_type)?;

        if self.options.commit {
            thread::sleep(self.options.settle_delay);
            self.transfer(&frame::encode_commit(), ReportType::Short)?;
        }

        Ok(())
    }

    /// Release the device.
    ///
    /// Closing an already closed session does nothing.
    pub fn close(&mut self) {
        let mut handle = match self.handle.take() {
            Some(handle) => handle,
            None => return,
        };

        if self.claimed {
            self.claimed = false;
            if let Err(err) = handle.release_interface(INTERFACE) {
                warn!("Unable to release interface {} of {}: {}", INTERFACE, self.device, err);
            }
        }

        debug!("Closed {}", self.device);
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Detach the kernel driver and claim the interface.
    fn prepare(&mut self) -> Result<(), Error> {
        let device = self.device;
        let handle = self.handle_mut()?;

        let driver_active = match handle.kernel_driver_active(INTERFACE) {
            Ok(active) => active,
            // Platforms without kernel driver support have nothing to detach.
            Err(Error::Usb(rusb::Error::NotSupported)) => false,
            Err(err) => return Err(err),
        };

        if driver_active {
            debug!("Detaching kernel driver from interface {} of {}", INTERFACE, device);
            handle.detach_kernel_driver(INTERFACE)?;
        }

        handle.claim_interface(INTERFACE)?;
        self.claimed = true;

        Ok(())
    }

    fn transfer(&mut self, data: &[u8], report_type: ReportType) -> Result<(), Error> {
        let handle = self.handle_mut()?;

        debug!("Writing {:02x?} with report type 0x{:04x}", data, report_type.value());

        let written = handle.write_control(
            REQUEST_TYPE,
            SET_REPORT,
            report_type.value(),
            REQUEST_INDEX,
            data,
        )?;

        if written != data.len() {
            return Err(Error::ShortTransfer { expected: data.len(), written });
        }

        Ok(())
    }

    fn handle_mut(&mut self) -> Result<&mut H, Error> {
        self.handle.as_mut().ok_or(Error::Usb(rusb::Error::NoDevice))
    }
}

impl<H: UsbHandle> Drop for Session<H> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Run `f` with an open session, closing it afterwards.
pub fn with_session<T, F, R>(
    transport: &T,
    device: DeviceId,
    options: SessionOptions,
    f: F,
) -> Result<R, Error>
where
    T: UsbTransport,
    F: FnOnce(&mut Session<T::Handle>) -> Result<R, Error>,
{
    let mut session = Session::open(transport, device, options)?;
    debug!("Opened {}", session.device());

    let result = f(&mut session);
    session.close();
    result
}
