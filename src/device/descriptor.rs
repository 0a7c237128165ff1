use std::fmt;
use uuid::Uuid;

use crate::device::constants::{
    BATTERY_CHARGE_LEVEL_CHARACTERISTIC, BATTERY_PERCENTAGE_CHARACTERISTIC, BATTERY_VOLTAGE_CHARACTERISTIC,
};
use crate::error::DeviceError;

/// The data points exposed by the battery monitor service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataPointKind {
    BatteryPercentage,
    BatteryVoltage,
    BatteryChargeLevel,
}

pub const DATA_POINT_KINDS: [DataPointKind; 3] = [
    DataPointKind::BatteryPercentage,
    DataPointKind::BatteryVoltage,
    DataPointKind::BatteryChargeLevel,
];

/// Background colour of the gauge, one per charge level. Red to green in 5 steps and white for
/// the unknown state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeColor {
    White,
    Red,
    Orange,
    Yellow,
    LightGreen,
    Green,
}

const CHARGE_COLORS: [ChargeColor; 6] = [
    ChargeColor::White,
    ChargeColor::Red,
    ChargeColor::Orange,
    ChargeColor::Yellow,
    ChargeColor::LightGreen,
    ChargeColor::Green,
];

impl ChargeColor {
    pub fn rgb(&self) -> [u8; 3] {
        match self {
            ChargeColor::White => [0xff, 0xff, 0xff],
            ChargeColor::Red => [0xff, 0x2d, 0x2d],
            ChargeColor::Orange => [0xfc, 0x92, 0x28],
            ChargeColor::Yellow => [0xff, 0xea, 0x00],
            ChargeColor::LightGreen => [0xad, 0xfd, 0x5c],
            ChargeColor::Green => [0x00, 0xc6, 0x00],
        }
    }
}

impl fmt::Display for ChargeColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.rgb();
        write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
    }
}

impl DataPointKind {
    pub fn name(&self) -> &'static str {
        match self {
            DataPointKind::BatteryPercentage => "Battery Percentage",
            DataPointKind::BatteryVoltage => "Battery Voltage",
            DataPointKind::BatteryChargeLevel => "Battery Charge Level",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            DataPointKind::BatteryPercentage => "%",
            DataPointKind::BatteryVoltage => "V",
            DataPointKind::BatteryChargeLevel => "",
        }
    }

    pub fn uuid(&self) -> Uuid {
        match self {
            DataPointKind::BatteryPercentage => BATTERY_PERCENTAGE_CHARACTERISTIC,
            DataPointKind::BatteryVoltage => BATTERY_VOLTAGE_CHARACTERISTIC,
            DataPointKind::BatteryChargeLevel => BATTERY_CHARGE_LEVEL_CHARACTERISTIC,
        }
    }

    // position in DATA_POINT_KINDS
    fn index(&self) -> usize {
        match self {
            DataPointKind::BatteryPercentage => 0,
            DataPointKind::BatteryVoltage => 1,
            DataPointKind::BatteryChargeLevel => 2,
        }
    }

    /// Number of bytes the payload of this data point must contain.
    pub fn payload_len(&self) -> usize {
        match self {
            DataPointKind::BatteryVoltage => 4,
            _ => 1,
        }
    }

    pub fn decode(&self, raw: &[u8]) -> Result<f64, DeviceError> {
        let expected = self.payload_len();
        if raw.len() < expected {
            return Err(DeviceError::MalformedPayload { kind: *self, expected, actual: raw.len() });
        }

        let value = match self {
            DataPointKind::BatteryVoltage => {
                let bytes = [raw[0], raw[1], raw[2], raw[3]];
                f64::from(f32::from_le_bytes(bytes))
            },
            DataPointKind::BatteryPercentage | DataPointKind::BatteryChargeLevel => {
                f64::from(raw[0] as i8)
            },
        };

        Ok(value)
    }

    /// Only the charge level has a colour mapping; levels outside [0, 5] have no colour.
    pub fn color_for_value(&self, value: f64) -> Option<ChargeColor> {
        match self {
            DataPointKind::BatteryChargeLevel => {
                if value.fract() != 0.0 || value < 0.0 {
                    return None;
                }
                CHARGE_COLORS.get(value as usize).copied()
            },
            _ => None,
        }
    }
}

impl fmt::Display for DataPointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub kind: DataPointKind,
    pub value: f64,
}

/// The last decoded value of every data point. Values survive a disconnect.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoints {
    points: [DataPoint; 3],
}

impl DataPoints {
    pub fn new() -> Self {
        DataPoints {
            points: DATA_POINT_KINDS.map(|kind| DataPoint { kind, value: 0.0 }),
        }
    }

    pub fn get(&self, kind: DataPointKind) -> f64 {
        self.points[kind.index()].value
    }

    pub fn set(&mut self, kind: DataPointKind, value: f64) {
        self.points[kind.index()].value = value;
    }

    pub fn find_by_uuid(&self, uuid: &Uuid) -> Option<&DataPoint> {
        self.points.iter().find(|point| point.kind.uuid().eq(uuid))
    }
}

impl Default for DataPoints {
    fn default() -> Self {
        DataPoints::new()
    }
}
