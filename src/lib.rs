pub mod config;
pub mod device;
pub mod logger;
pub mod plugin;
pub mod poll;
pub mod report;
pub mod scheduler;

pub use device::{Backend, Device, HidBackend, Transport, TransportError};
pub use logger::{Logger, TracingLogger};
pub use plugin::{Plugin, PluginError};
pub use poll::{PollError, PollOutcome, PollSettings, PollState, Poller};
pub use report::{
    decode, select_mode, BatteryEncoding, BatteryReading, ChargingStatus, DecodeError,
    TransportMode,
};
pub use scheduler::{Scheduler, TimerQueue, TimerToken};

// Sony DualShock 4 (second revision)
pub const VENDOR_ID: u16 = 0x054c;
pub const PRODUCT_ID: u16 = 0x09cc;

pub const REPORT_LEN: usize = 64;

// output report 0x05 with every feature flag set; asks the controller for
// full input reports
pub const INPUT_REPORT_REQUEST: [u8; 2] = [0x05, 0xFF];

// feature report polled for the battery byte when input reports are too short
pub const BATTERY_FEATURE_REPORT_ID: u8 = 0x05;
