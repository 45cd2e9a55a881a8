use super::{Error, check_channel};
use crate::connection::{Connection, Transport};
use crate::modbus::Category;
use crate::registers::{self, Register};

/// Number of rooms the controller keeps setpoints for.
pub const CHANNELS: u8 = 17;

/// Registers 0 through 16 cover every setpoint of a room.
const SETTINGS_LENGTH: u8 = 17;

/// Writable temperature settings of a room.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum, strum::Display, strum::VariantArray,
)]
#[strum(serialize_all = "kebab-case")]
pub enum Setpoint {
    Manual,
    Comfort,
    Eco,
    Holiday,
    Standby,
    Party,
    MinAir,
    MaxAir,
    MinFloor,
    MaxFloor,
    Hysteresis,
}

impl Setpoint {
    pub fn register(self) -> Register {
        match self {
            Setpoint::Manual => registers::PACKED_DATA_MANUAL_TEMPERATURE,
            Setpoint::Comfort => registers::PACKED_DATA_COMFORT_TEMPERATURE,
            Setpoint::Eco => registers::PACKED_DATA_ECO_TEMPERATURE,
            Setpoint::Holiday => registers::PACKED_DATA_HOLIDAY_TEMPERATURE,
            Setpoint::Standby => registers::PACKED_DATA_STANDBY_TEMPERATURE,
            Setpoint::Party => registers::PACKED_DATA_PARTY_TEMPERATURE,
            Setpoint::MinAir => registers::PACKED_DATA_MIN_TEMPERATURE,
            Setpoint::MaxAir => registers::PACKED_DATA_MAX_TEMPERATURE,
            Setpoint::MinFloor => registers::PACKED_DATA_MIN_FLOOR_TEMPERATURE,
            Setpoint::MaxFloor => registers::PACKED_DATA_MAX_FLOOR_TEMPERATURE,
            Setpoint::Hysteresis => registers::PACKED_DATA_HYSTERESIS,
        }
    }
}

/// All setpoints of a room in °C, read out in one transaction.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Settings {
    pub channel: u8,
    pub manual: f32,
    pub comfort: f32,
    pub eco: f32,
    pub holiday: f32,
    pub standby: f32,
    pub party: f32,
    pub min_air: f32,
    pub max_air: f32,
    pub min_floor: f32,
    pub max_floor: f32,
    pub hysteresis: f32,
    pub desired: f32,
}

impl Settings {
    fn from_registers(channel: u8, values: &[u16]) -> Self {
        let at = |register: Register| registers::setpoint_celsius(values[usize::from(register.index)]);
        Self {
            channel,
            manual: at(Setpoint::Manual.register()),
            comfort: at(Setpoint::Comfort.register()),
            eco: at(Setpoint::Eco.register()),
            holiday: at(Setpoint::Holiday.register()),
            standby: at(Setpoint::Standby.register()),
            party: at(Setpoint::Party.register()),
            min_air: at(Setpoint::MinAir.register()),
            max_air: at(Setpoint::MaxAir.register()),
            min_floor: at(Setpoint::MinFloor.register()),
            max_floor: at(Setpoint::MaxFloor.register()),
            hysteresis: at(Setpoint::Hysteresis.register()),
            desired: at(registers::PACKED_DATA_DESIRED_TEMPERATURE),
        }
    }
}

/// Temperature settings of one room (zone).
pub struct PackedData<'a, T> {
    connection: &'a mut Connection<T>,
    channel: u8,
}

impl<'a, T: Transport> PackedData<'a, T> {
    pub(crate) fn new(connection: &'a mut Connection<T>, channel: u8) -> Result<Self, Error> {
        check_channel(Category::PackedData, channel, CHANNELS)?;
        Ok(Self { connection, channel })
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    fn read(&mut self, register: Register) -> Result<f32, Error> {
        let raw = self.connection.read_single(Category::PackedData, register.index, self.channel)?;
        Ok(registers::setpoint_celsius(raw))
    }

    pub fn temperature(&mut self, setpoint: Setpoint) -> Result<f32, Error> {
        self.read(setpoint.register())
    }

    /// Store a new setpoint, rounded to a tenth of a degree.
    pub fn set_temperature(&mut self, setpoint: Setpoint, celsius: f32) -> Result<(), Error> {
        let raw = registers::encode_celsius(celsius).ok_or(Error::InvalidTemperature(celsius))?;
        let index = setpoint.register().index;
        self.connection.write_register(Category::PackedData, index, self.channel, &[raw])?;
        Ok(())
    }

    /// The setpoint currently in effect. Read-only, derived by the controller from the mode.
    pub fn desired_temperature(&mut self) -> Result<f32, Error> {
        self.read(registers::PACKED_DATA_DESIRED_TEMPERATURE)
    }

    pub fn settings(&mut self) -> Result<Settings, Error> {
        let values =
            self.connection.read_register(Category::PackedData, 0, self.channel, SETTINGS_LENGTH)?;
        Ok(Settings::from_registers(self.channel, &values))
    }
}

macro_rules! setpoint_accessors {
    ($($setpoint:ident: $get:ident, $set:ident;)*) => {
        impl<T: Transport> PackedData<'_, T> {
            $(
                pub fn $get(&mut self) -> Result<f32, Error> {
                    self.temperature(Setpoint::$setpoint)
                }

                pub fn $set(&mut self, celsius: f32) -> Result<(), Error> {
                    self.set_temperature(Setpoint::$setpoint, celsius)
                }
            )*
        }
    };
}

setpoint_accessors! {
    Manual: manual_temperature, set_manual_temperature;
    Comfort: comfort_temperature, set_comfort_temperature;
    Eco: eco_temperature, set_eco_temperature;
    Holiday: holiday_temperature, set_holiday_temperature;
    Standby: standby_temperature, set_standby_temperature;
    Party: party_temperature, set_party_temperature;
    MinAir: min_air_temperature, set_min_air_temperature;
    MaxAir: max_air_temperature, set_max_air_temperature;
    MinFloor: min_floor_temperature, set_min_floor_temperature;
    MaxFloor: max_floor_temperature, set_max_floor_temperature;
    Hysteresis: hysteresis, set_hysteresis;
}
