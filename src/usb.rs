//! libusb transport.

use std::time::Duration;

use log::debug;
use rusb::{DeviceHandle, GlobalContext, UsbContext};

use crate::error::Error;
use crate::session::{DeviceId, UsbHandle, UsbTransport};

/// Timeout for a single control transfer.
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(1);

/// USB devices attached to the system.
pub struct RusbTransport<T: UsbContext = GlobalContext> {
    context: T,
}

impl RusbTransport {
    pub fn new() -> Self {
        Self { context: GlobalContext::default() }
    }
}

impl<T: UsbContext> UsbTransport for RusbTransport<T> {
    type Handle = DeviceHandle<T>;

    fn open(&self, id: DeviceId) -> Result<Option<Self::Handle>, Error> {
        for device in self.context.devices()?.iter() {
            let descriptor = device.device_descriptor()?;
            if descriptor.vendor_id() != id.vendor_id || descriptor.product_id() != id.product_id {
                continue;
            }

            debug!("Found {} on bus {:03} device {:03}", id, device.bus_number(), device.address());

            return Ok(Some(device.open()?));
        }

        Ok(None)
    }
}

impl<T: UsbContext> UsbHandle for DeviceHandle<T> {
    fn kernel_driver_active(&mut self, interface: u8) -> Result<bool, Error> {
        Ok(DeviceHandle::kernel_driver_active(self, interface)?)
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), Error> {
        Ok(DeviceHandle::detach_kernel_driver(self, interface)?)
    }

    fn claim_interface(&mut self, interface: u8) -> Result<(), Error> {
        Ok(DeviceHandle::claim_interface(self, interface)?)
    }

    fn release_interface(&mut self, interface: u8) -> Result<(), Error> {
        Ok(DeviceHandle::release_interface(self, interface)?)
    }

    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<usize, Error> {
        let timeout = TRANSFER_TIMEOUT;
        DeviceHandle::write_control(self, request_type, request, value, index, data, timeout)
            .map_err(Error::Transfer)
    }
}
