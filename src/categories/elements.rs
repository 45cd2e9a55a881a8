use super::{Error, check_channel};
use crate::connection::{Connection, Transport};
use crate::modbus::Category;
use crate::registers::{self, Register};

/// Number of sensor zones the controller supports.
pub const CHANNELS: u8 = 48;

/// Registers 0 through 11 cover everything known about a sensor.
const SNAPSHOT_LENGTH: u8 = 12;

/// The sensor (element) bound to one zone.
pub struct Elements<'a, T> {
    connection: &'a mut Connection<T>,
    channel: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct Rssi {
    /// Signal strength as received by the base, in dBm.
    pub base: f32,
    /// Signal strength as received by the sensor, in dBm.
    pub remote: f32,
}

impl Rssi {
    pub fn from_raw(raw: u16) -> Self {
        Self { base: registers::rssi_dbm(raw as u8), remote: registers::rssi_dbm((raw >> 8) as u8) }
    }
}

/// Every sensor register, read out in one transaction.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Snapshot {
    pub channel: u8,
    pub address: u32,
    pub temp_air: f32,
    pub temp_floor: f32,
    pub temp_dew: f32,
    pub humidity: u16,
    pub status: u16,
    pub rssi: Rssi,
    pub battery: u8,
    pub sync_group: u16,
}

impl Snapshot {
    fn from_registers(channel: u8, values: &[u16]) -> Self {
        let at = |register: Register| values[usize::from(register.index)];
        Self {
            channel,
            address: combine_address(at(registers::ELEMENTS_ADDRESS_LOW), at(registers::ELEMENTS_ADDRESS_HIGH)),
            temp_air: registers::sensor_celsius(at(registers::ELEMENTS_TEMP_AIR)),
            temp_floor: registers::sensor_celsius(at(registers::ELEMENTS_TEMP_FLOOR)),
            temp_dew: registers::sensor_celsius(at(registers::ELEMENTS_TEMP_DEW)),
            humidity: at(registers::ELEMENTS_HUMIDITY),
            status: at(registers::ELEMENTS_STATUS),
            rssi: Rssi::from_raw(at(registers::ELEMENTS_RSSI)),
            battery: registers::battery_percent(at(registers::ELEMENTS_BATTERY)),
            sync_group: at(registers::ELEMENTS_SYNC_GROUP) & 0xFF,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.address > 0
    }
}

fn combine_address(low: u16, high: u16) -> u32 {
    (u32::from(high) << 16) | u32::from(low)
}

impl<'a, T: Transport> Elements<'a, T> {
    pub(crate) fn new(connection: &'a mut Connection<T>, channel: u8) -> Result<Self, Error> {
        check_channel(Category::Elements, channel, CHANNELS)?;
        Ok(Self { connection, channel })
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    fn read(&mut self, register: Register) -> Result<u16, Error> {
        self.connection.read_single(Category::Elements, register.index, self.channel)
    }

    pub fn address_low(&mut self) -> Result<u16, Error> {
        self.read(registers::ELEMENTS_ADDRESS_LOW)
    }

    pub fn address_high(&mut self) -> Result<u16, Error> {
        self.read(registers::ELEMENTS_ADDRESS_HIGH)
    }

    /// The radio address of the bound sensor, zero if there is none.
    pub fn address(&mut self) -> Result<u32, Error> {
        let index = registers::ELEMENTS_ADDRESS_LOW.index;
        let parts = self.connection.read_register(Category::Elements, index, self.channel, 2)?;
        Ok(combine_address(parts[0], parts[1]))
    }

    pub fn is_bound(&mut self) -> Result<bool, Error> {
        Ok(self.address()? > 0)
    }

    /// Air temperature in °C, `NaN` if not available.
    pub fn temp_air(&mut self) -> Result<f32, Error> {
        Ok(registers::sensor_celsius(self.read(registers::ELEMENTS_TEMP_AIR)?))
    }

    /// Floor temperature in °C, `NaN` if not available.
    pub fn temp_floor(&mut self) -> Result<f32, Error> {
        Ok(registers::sensor_celsius(self.read(registers::ELEMENTS_TEMP_FLOOR)?))
    }

    /// Dew point in °C, `NaN` if not available.
    pub fn temp_dew(&mut self) -> Result<f32, Error> {
        Ok(registers::sensor_celsius(self.read(registers::ELEMENTS_TEMP_DEW)?))
    }

    /// Relative humidity in percent.
    pub fn humidity(&mut self) -> Result<u16, Error> {
        self.read(registers::ELEMENTS_HUMIDITY)
    }

    pub fn status(&mut self) -> Result<u16, Error> {
        self.read(registers::ELEMENTS_STATUS)
    }

    pub fn rssi(&mut self) -> Result<Rssi, Error> {
        Ok(Rssi::from_raw(self.read(registers::ELEMENTS_RSSI)?))
    }

    pub fn rssi_base(&mut self) -> Result<f32, Error> {
        Ok(self.rssi()?.base)
    }

    pub fn rssi_remote(&mut self) -> Result<f32, Error> {
        Ok(self.rssi()?.remote)
    }

    /// Battery level in percent. Only changes in steps of 10%.
    pub fn battery(&mut self) -> Result<u8, Error> {
        Ok(registers::battery_percent(self.read(registers::ELEMENTS_BATTERY)?))
    }

    pub fn sync_group(&mut self) -> Result<u16, Error> {
        Ok(self.read(registers::ELEMENTS_SYNC_GROUP)? & 0xFF)
    }

    pub fn snapshot(&mut self) -> Result<Snapshot, Error> {
        let values =
            self.connection.read_register(Category::Elements, 0, self.channel, SNAPSHOT_LENGTH)?;
        Ok(Snapshot::from_registers(self.channel, &values))
    }
}
