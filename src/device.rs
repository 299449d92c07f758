use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),
    #[error("HID subsystem is not initialized")]
    NotInitialized,
    #[error("{0}")]
    Io(String),
}

/// Byte-level access to one open controller.
///
/// Dropping the value closes the device.
pub trait Transport {
    fn write_report(&mut self, buf: &[u8]) -> Result<usize, TransportError>;

    /// Reads one input report, returning 0 when nothing arrived within
    /// `timeout_ms`.
    fn read(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError>;

    fn send_feature_report(&mut self, buf: &[u8]) -> Result<(), TransportError>;

    /// `buf[0]` carries the requested report id.
    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
}

/// Brings up the HID stack and opens devices on it.
pub trait Backend {
    type Device: Transport;

    fn init(&mut self) -> Result<(), TransportError>;

    fn open(&self, vendor_id: u16, product_id: u16) -> Result<Self::Device, TransportError>;

    /// Releases the HID stack. Devices opened from it must already be closed.
    fn exit(&mut self);
}

#[derive(Default)]
pub struct HidBackend {
    api: Option<hidapi::HidApi>,
}

impl HidBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for HidBackend {
    type Device = Device;

    fn init(&mut self) -> Result<(), TransportError> {
        if self.api.is_none() {
            self.api = Some(hidapi::HidApi::new()?);
            tracing::debug!("hidapi initialized");
        }
        Ok(())
    }

    fn open(&self, vendor_id: u16, product_id: u16) -> Result<Device, TransportError> {
        let api = self.api.as_ref().ok_or(TransportError::NotInitialized)?;
        let device = api.open(vendor_id, product_id)?;
        tracing::debug!(
            "Opened {:04x}:{:04x} ({:?})",
            vendor_id,
            product_id,
            device.get_product_string().ok().flatten()
        );

        Ok(Device {
            vendor_id,
            product_id,
            device,
        })
    }

    fn exit(&mut self) {
        if self.api.take().is_some() {
            tracing::debug!("hidapi finalized");
        }
    }
}

pub struct Device {
    vendor_id: u16,
    product_id: u16,
    device: hidapi::HidDevice,
}

impl Transport for Device {
    fn write_report(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        let written = self.device.write(buf)?;
        tracing::trace!("Wrote {} bytes", written);
        Ok(written)
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError> {
        Ok(self.device.read_timeout(buf, timeout_ms)?)
    }

    fn send_feature_report(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        Ok(self.device.send_feature_report(buf)?)
    }

    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        Ok(self.device.get_feature_report(buf)?)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        tracing::debug!("Closing {:04x}:{:04x}", self.vendor_id, self.product_id);
    }
}
