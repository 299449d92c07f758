use std::fmt;

use enum_iterator::Sequence;
use serde::Deserialize;
use thiserror::Error;

// wired input report, byte 12:
// bits 0-3 = battery level
// bits 4-7 = cable/charging state (0x10 and 0x20 mean the battery is charging)
pub const WIRED_BATTERY_OFFSET: usize = 12;

// wireless feature report, byte 1:
// bits 0-3 = battery level, no charging bits
pub const WIRELESS_BATTERY_OFFSET: usize = 1;

const LEVEL_MASK: u8 = 0x0F;
const CHARGING_MASK: u8 = 0xF0;

const UNKNOWN_LEVEL: &str = "Battery level is unknown!";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TransportMode {
    Wired,
    Wireless,
}

impl TransportMode {
    /// Smallest buffer length that still holds the battery byte for this mode.
    pub fn min_len(&self) -> usize {
        match self {
            TransportMode::Wired => WIRED_BATTERY_OFFSET + 1,
            TransportMode::Wireless => WIRELESS_BATTERY_OFFSET + 1,
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransportMode::Wired => write!(f, "wired"),
            TransportMode::Wireless => write!(f, "wireless"),
        }
    }
}

/// Picks the transport mode from the length of the primary input report.
///
/// Anything too short to carry the wired battery byte, including an empty
/// read, goes through the feature report exchange.
pub fn select_mode(primary_read_length: usize) -> TransportMode {
    if primary_read_length > WIRED_BATTERY_OFFSET {
        TransportMode::Wired
    } else {
        TransportMode::Wireless
    }
}

/// How the firmware scales the battery nibble.
///
/// Controllers in the field report either 0-8 or 0-11; which one a given
/// firmware uses has to be checked on hardware.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Sequence, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatteryEncoding {
    #[default]
    EightLevel,
    ElevenLevel,
}

impl BatteryEncoding {
    pub fn max_level(&self) -> u8 {
        match self {
            BatteryEncoding::EightLevel => 8,
            BatteryEncoding::ElevenLevel => 11,
        }
    }

    // one entry per nibble value so malformed input still lands on a message
    fn messages(&self) -> &'static [&'static str; 16] {
        static EIGHT: [&str; 16] = [
            "Battery is empty!",
            "Battery is very low!",
            "Battery is low!",
            "Battery is medium-low!",
            "Battery is medium!",
            "Battery is medium-high!",
            "Battery is high!",
            "Battery is full!",
            "Battery is charging or fully charged!",
            UNKNOWN_LEVEL,
            UNKNOWN_LEVEL,
            UNKNOWN_LEVEL,
            UNKNOWN_LEVEL,
            UNKNOWN_LEVEL,
            UNKNOWN_LEVEL,
            UNKNOWN_LEVEL,
        ];
        static ELEVEN: [&str; 16] = [
            "Battery is empty!",
            "Battery is critically low!",
            "Battery is very low!",
            "Battery is low!",
            "Battery is medium-low!",
            "Battery is medium!",
            "Battery is medium-high!",
            "Battery is high!",
            "Battery is very high!",
            "Battery is almost full!",
            "Battery is full!",
            "Battery is fully charged!",
            UNKNOWN_LEVEL,
            UNKNOWN_LEVEL,
            UNKNOWN_LEVEL,
            UNKNOWN_LEVEL,
        ];

        match self {
            BatteryEncoding::EightLevel => &EIGHT,
            BatteryEncoding::ElevenLevel => &ELEVEN,
        }
    }

    pub fn message(&self, raw_level: u8) -> &'static str {
        self.messages()[(raw_level & LEVEL_MASK) as usize]
    }

    /// `floor(raw_level * 100 / max_level)`, capped at 100 for levels past the
    /// encoding's maximum.
    pub fn percentage(&self, raw_level: u8) -> u8 {
        let percentage = u16::from(raw_level) * 100 / u16::from(self.max_level());
        percentage.min(100) as u8
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ChargingStatus {
    Charging,
    NotCharging,
    Unknown,
}

impl ChargingStatus {
    fn from_nibble(nibble: u8) -> Self {
        match nibble {
            0x10 | 0x20 => ChargingStatus::Charging,
            _ => ChargingStatus::NotCharging,
        }
    }
}

impl fmt::Display for ChargingStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChargingStatus::Charging => write!(f, "charging"),
            ChargingStatus::NotCharging => write!(f, "not charging"),
            ChargingStatus::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct BatteryReading {
    pub raw_level: u8,
    pub percentage: u8,
    pub charging: ChargingStatus,
    pub message: &'static str,
}

impl fmt::Display for BatteryReading {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} ({}%, {})",
            self.message, self.percentage, self.charging
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Insufficient {mode} report data: expected at least {required} bytes, got {actual}")]
    InsufficientData {
        mode: TransportMode,
        required: usize,
        actual: usize,
    },
}

/// Decodes a battery reading out of a primary input report (wired) or a
/// feature report (wireless).
pub fn decode(
    buffer: &[u8],
    mode: TransportMode,
    encoding: BatteryEncoding,
) -> Result<BatteryReading, DecodeError> {
    let required = mode.min_len();
    if buffer.len() < required {
        return Err(DecodeError::InsufficientData {
            mode,
            required,
            actual: buffer.len(),
        });
    }

    let (status_byte, charging) = match mode {
        TransportMode::Wired => {
            let byte = buffer[WIRED_BATTERY_OFFSET];
            (byte, ChargingStatus::from_nibble(byte & CHARGING_MASK))
        }
        TransportMode::Wireless => (buffer[WIRELESS_BATTERY_OFFSET], ChargingStatus::Unknown),
    };

    let raw_level = status_byte & LEVEL_MASK;
    Ok(BatteryReading {
        raw_level,
        percentage: encoding.percentage(raw_level),
        charging,
        message: encoding.message(raw_level),
    })
}

/// Hex bytes with a printable-ASCII column, `chunk_size` bytes per row.
pub fn hexdump(data: &[u8], chunk_size: usize) -> String {
    data.chunks(chunk_size)
        .map(|chunk| {
            let hex = chunk
                .iter()
                .map(|byte| format!("{:02x}", byte))
                .collect::<Vec<_>>()
                .join(" ");
            let ascii: String = chunk
                .iter()
                .map(|&byte| match char::from(byte) {
                    c if c.is_ascii_graphic() || c == ' ' => c,
                    _ => '.',
                })
                .collect();
            format!("{:<width$}  {}", hex, ascii, width = 3 * chunk_size)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
