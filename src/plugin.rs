use std::rc::Rc;

use thiserror::Error;

use crate::device::Backend;
use crate::logger::Logger;
use crate::poll::{PollOutcome, PollSettings, PollState, Poller};
use crate::scheduler::{Scheduler, TimerToken};

#[derive(Error, Debug)]
pub enum PluginError {
    #[error("hidapi initialization failed: {0}")]
    TransportInitFailure(String),
    #[error("Failed to open controller {vendor_id:04x}:{product_id:04x}: {reason}")]
    DeviceOpenFailure {
        vendor_id: u16,
        product_id: u16,
        reason: String,
    },
    #[error("Controller is already open")]
    AlreadyLoaded,
}

/// Owns the controller handle and the poll loop that reads it.
pub struct Plugin<B: Backend, S: Scheduler> {
    backend: B,
    scheduler: S,
    logger: Rc<dyn Logger>,
    vendor_id: u16,
    product_id: u16,
    device: Option<B::Device>,
    poller: Poller,
}

impl<B: Backend, S: Scheduler> Plugin<B, S> {
    pub fn new(
        backend: B,
        scheduler: S,
        logger: Rc<dyn Logger>,
        vendor_id: u16,
        product_id: u16,
        settings: PollSettings,
    ) -> Self {
        let poller = Poller::new(settings, logger.clone());
        Self {
            backend,
            scheduler,
            logger,
            vendor_id,
            product_id,
            device: None,
            poller,
        }
    }

    /// Initializes the HID stack, opens the controller and arms the first
    /// poll. Failures are logged once and leave the plugin idle.
    pub fn load(&mut self) -> Result<(), PluginError> {
        if self.device.is_some() {
            return Err(PluginError::AlreadyLoaded);
        }
        self.logger.log("Plugin loaded!");

        if let Err(e) = self.backend.init() {
            let err = PluginError::TransportInitFailure(e.to_string());
            self.logger.log(&err.to_string());
            return Err(err);
        }
        self.logger.log("hidapi initialized.");

        let device = match self.backend.open(self.vendor_id, self.product_id) {
            Ok(device) => device,
            Err(e) => {
                let err = PluginError::DeviceOpenFailure {
                    vendor_id: self.vendor_id,
                    product_id: self.product_id,
                    reason: e.to_string(),
                };
                self.logger.log(&err.to_string());
                return Err(err);
            }
        };
        self.logger.log("Controller opened.");

        self.device = Some(device);
        self.poller.start(&mut self.scheduler);
        Ok(())
    }

    /// Hands a fired timer to the poll loop.
    pub fn fire(&mut self, token: TimerToken) -> Option<PollOutcome> {
        let device = self.device.as_mut()?;
        self.poller.on_timer(token, device, &mut self.scheduler)
    }

    /// Stops polling, closes the controller and shuts the HID stack down.
    /// Safe to call more than once.
    pub fn unload(&mut self) {
        self.poller.stop(&mut self.scheduler);
        if let Some(device) = self.device.take() {
            drop(device);
            self.logger.log("Plugin unloaded!");
        }
        self.backend.exit();
    }

    pub fn is_loaded(&self) -> bool {
        self.device.is_some()
    }

    pub fn poll_state(&self) -> PollState {
        self.poller.state()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }
}

impl<B: Backend, S: Scheduler> Drop for Plugin<B, S> {
    fn drop(&mut self) {
        self.unload();
    }
}
