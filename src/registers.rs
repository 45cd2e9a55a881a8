use crate::modbus::Category;

/// Raw value the controller reports for sensor readings that are not available.
pub const UNAVAILABLE: u16 = 0x7FFF;

/// How the raw register contents map onto a meaningful value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Kind {
    /// Plain unsigned number.
    U16,
    /// Bit field with device specific meaning.
    Bits,
    /// Lower byte only.
    Byte,
    /// Sensor reading in tenths of a degree Celsius, [`UNAVAILABLE`] when not present.
    Sensor,
    /// Setpoint in tenths of a degree Celsius.
    Setpoint,
    /// Signal strengths at the base (low byte) and at the sensor (high byte).
    Rssi,
    /// Battery level in tens of percent in the low nibble.
    Battery,
    HardwareVersion,
    SoftwareVersion,
    DeviceName,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, strum::Display)]
pub enum Mode {
    #[serde(rename = "R-")]
    #[strum(to_string = "R-")]
    R,
    #[serde(rename = "RW")]
    #[strum(to_string = "RW")]
    RW,
}

/// A decoded register value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    U16(u16),
    /// Degrees Celsius, `NaN` when the reading is unavailable.
    Celsius(f32),
    Rssi { base: f32, remote: f32 },
    Percent(u8),
    Text(String),
}

impl Kind {
    pub fn decode(self, raw: u16) -> Value {
        match self {
            Kind::U16 | Kind::Bits => Value::U16(raw),
            Kind::Byte => Value::U16(raw & 0xFF),
            Kind::Sensor => Value::Celsius(sensor_celsius(raw)),
            Kind::Setpoint => Value::Celsius(setpoint_celsius(raw)),
            Kind::Rssi => Value::Rssi { base: rssi_dbm(raw as u8), remote: rssi_dbm((raw >> 8) as u8) },
            Kind::Battery => Value::Percent(battery_percent(raw)),
            Kind::HardwareVersion => Value::Text(hardware_version(raw)),
            Kind::SoftwareVersion => Value::Text(software_version(raw)),
            Kind::DeviceName => Value::Text(device_name(raw)),
        }
    }
}

pub fn sensor_celsius(raw: u16) -> f32 {
    if raw >= UNAVAILABLE { f32::NAN } else { f32::from(raw) / 10.0 }
}

pub fn setpoint_celsius(raw: u16) -> f32 {
    f32::from(raw) / 10.0
}

/// Encode a temperature into tenths of a degree, if it is representable in a register.
pub fn encode_celsius(celsius: f32) -> Option<u16> {
    if !celsius.is_finite() || celsius < 0.0 {
        return None;
    }
    let raw = (celsius * 10.0).round();
    (raw <= f32::from(u16::MAX)).then_some(raw as u16)
}

pub fn rssi_dbm(raw: u8) -> f32 {
    -74.0 + 0.5 * f32::from(raw)
}

/// Only changes in steps of 10%.
pub fn battery_percent(raw: u16) -> u8 {
    (raw & 0x0F) as u8 * 10
}

pub fn hardware_version(raw: u16) -> String {
    format!("MC110{}", raw & 0x7F)
}

pub fn software_version(raw: u16) -> String {
    let mut version = format!("MC610{:X}", (raw >> 4) & 0xFF);
    let beta = raw & 0x0F;
    if beta != 0 {
        version.push_str(&format!("b{beta}"));
    }
    version
}

pub fn device_name(raw: u16) -> String {
    format!("AC-{raw}")
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::U16(n) => write!(f, "{n}"),
            Value::Celsius(c) if c.is_nan() => f.write_str("n/a"),
            Value::Celsius(c) => write!(f, "{c:.1}"),
            Value::Rssi { base, remote } => write!(f, "{base:.1} dBm / {remote:.1} dBm"),
            Value::Percent(p) => write!(f, "{p}%"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        match self {
            Value::U16(n) => serializer.serialize_u16(*n),
            Value::Celsius(c) if c.is_nan() => serializer.serialize_none(),
            Value::Celsius(c) => serializer.serialize_f32(*c),
            Value::Rssi { base, remote } => {
                let mut s = serializer.serialize_struct("Rssi", 2)?;
                s.serialize_field("base", base)?;
                s.serialize_field("remote", remote)?;
                s.end()
            }
            Value::Percent(p) => serializer.serialize_u8(*p),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// A named register in the controller's register map.
#[derive(Clone, Copy, Debug, serde::Serialize)]
pub struct Register {
    pub name: &'static str,
    pub category: Category,
    pub index: u8,
    /// Registers addressed per channel use the channel as the page, others always use page 0.
    pub paged: bool,
    pub kind: Kind,
    pub mode: Mode,
    pub description: &'static str,
}

impl Register {
    pub fn from_name(name: &str) -> Option<&'static Register> {
        let name = name.to_uppercase().replace('-', "_");
        ALL.iter().find(|r| r.name == name)
    }

    /// Number of pages (channels) in this register's category.
    pub fn pages(&self) -> u8 {
        if !self.paged {
            return 1;
        }
        match self.category {
            Category::Elements => crate::categories::elements::CHANNELS,
            Category::PackedData => crate::categories::packed_data::CHANNELS,
            _ => 1,
        }
    }

    pub fn is_match(&self, pattern: &str) -> bool {
        let pattern = pattern.to_uppercase();
        self.name.contains(&pattern)
            || self.description.to_uppercase().contains(&pattern)
            || self.category.to_string().to_uppercase().contains(&pattern)
    }
}

macro_rules! registers {
    (@paged page) => { true };
    (@paged) => { false };
    ($($name:ident: $category:ident[$index:literal $(, $paged:ident)?], $kind:ident, $mode:ident, $description:literal;)*) => {
        $(pub const $name: Register = Register {
            name: stringify!($name),
            category: Category::$category,
            index: $index,
            paged: registers!(@paged $($paged)?),
            kind: Kind::$kind,
            mode: Mode::$mode,
            description: $description,
        };)*

        /// Every register with a known meaning, ordered by category and index.
        pub const ALL: &[Register] = &[$($name),*];
    };
}

registers! {
    ELEMENTS_ADDRESS_LOW: Elements[0, page], U16, R, "Sensor address, low 16 bits. Zero if no sensor is bound.";
    ELEMENTS_ADDRESS_HIGH: Elements[1, page], U16, R, "Sensor address, high 16 bits.";
    ELEMENTS_TEMP_AIR: Elements[4, page], Sensor, R, "Air temperature at the sensor in °C.";
    ELEMENTS_TEMP_FLOOR: Elements[5, page], Sensor, R, "Floor temperature at the sensor in °C.";
    ELEMENTS_TEMP_DEW: Elements[6, page], Sensor, R, "Dew point temperature at the sensor in °C.";
    ELEMENTS_HUMIDITY: Elements[7, page], U16, R, "Relative humidity in %.";
    ELEMENTS_STATUS: Elements[8, page], Bits, R, "Sensor status flags.";
    ELEMENTS_RSSI: Elements[9, page], Rssi, R, "Signal strength at the base (low byte) and at the sensor (high byte).";
    ELEMENTS_BATTERY: Elements[10, page], Battery, R, "Sensor battery level in %, in 10% steps.";
    ELEMENTS_SYNC_GROUP: Elements[11, page], Byte, R, "Synchronisation group of the sensor.";
    PACKED_DATA_MANUAL_TEMPERATURE: PackedData[0, page], Setpoint, RW, "Setpoint in manual mode in °C.";
    PACKED_DATA_COMFORT_TEMPERATURE: PackedData[1, page], Setpoint, RW, "Comfort setpoint in °C.";
    PACKED_DATA_ECO_TEMPERATURE: PackedData[2, page], Setpoint, RW, "Eco setpoint in °C.";
    PACKED_DATA_HOLIDAY_TEMPERATURE: PackedData[3, page], Setpoint, RW, "Holiday setpoint in °C.";
    PACKED_DATA_STANDBY_TEMPERATURE: PackedData[4, page], Setpoint, RW, "Standby setpoint in °C.";
    PACKED_DATA_PARTY_TEMPERATURE: PackedData[5, page], Setpoint, RW, "Party setpoint in °C.";
    PACKED_DATA_MIN_TEMPERATURE: PackedData[8, page], Setpoint, RW, "Lowest allowed air temperature in °C.";
    PACKED_DATA_MAX_TEMPERATURE: PackedData[9, page], Setpoint, RW, "Highest allowed air temperature in °C.";
    PACKED_DATA_MIN_FLOOR_TEMPERATURE: PackedData[10, page], Setpoint, RW, "Lowest allowed floor temperature in °C.";
    PACKED_DATA_MAX_FLOOR_TEMPERATURE: PackedData[11, page], Setpoint, RW, "Highest allowed floor temperature in °C.";
    PACKED_DATA_HYSTERESIS: PackedData[14, page], Setpoint, RW, "Regulation hysteresis in °C.";
    PACKED_DATA_DESIRED_TEMPERATURE: PackedData[16, page], Setpoint, R, "Currently effective setpoint in °C.";
    CLOCK_YEAR: Clock[0], U16, RW, "Controller clock: year.";
    CLOCK_MONTH: Clock[1], U16, RW, "Controller clock: month, 1-12.";
    CLOCK_DAY: Clock[2], U16, RW, "Controller clock: day of the month.";
    CLOCK_WEEKDAY: Clock[3], U16, RW, "Controller clock: day of the week, 0=Monday.";
    CLOCK_HOUR: Clock[4], U16, RW, "Controller clock: hour.";
    CLOCK_MINUTE: Clock[5], U16, RW, "Controller clock: minute.";
    CLOCK_SECOND: Clock[6], U16, RW, "Controller clock: second.";
    INFO_HW_VERSION: Info[2], HardwareVersion, R, "Hardware version.";
    INFO_SW_VERSION: Info[3], SoftwareVersion, R, "Software version, with a beta build number if any.";
    INFO_DEVICE_NAME: Info[4], DeviceName, R, "Device model name.";
}
