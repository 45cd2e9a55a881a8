//! Typed access to the registers of each category.
//!
//! The accessors borrow the [`Connection`] mutably for as long as they live, so that a controller
//! is only ever involved in one transaction at a time.
use crate::connection::{self, Connection, Transport};
use crate::modbus::{Category, ErrorKind};
use crate::registers::{Register, Value};

pub mod clock;
pub mod elements;
pub mod info;
pub mod packed_data;

pub use clock::Clock;
pub use elements::Elements;
pub use info::Info;
pub use packed_data::{PackedData, Setpoint};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("channel {channel} does not exist in category {category} (valid are 0 to {})", .limit - 1)]
    ChannelOutOfRange { category: Category, channel: u8, limit: u8 },
    #[error("temperature {0:.1}°C cannot be stored in a register")]
    InvalidTemperature(f32),
    #[error("year {0} cannot be stored in a register")]
    InvalidYear(i16),
    #[error("controller clock holds an invalid date and time ({0:?})")]
    InvalidClock(Vec<u16>),
    #[error(transparent)]
    Connection(#[from] connection::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ChannelOutOfRange { .. } | Error::InvalidTemperature(_) | Error::InvalidYear(_) => {
                ErrorKind::Validation
            }
            Error::InvalidClock(_) => ErrorKind::Integrity,
            Error::Connection(e) => e.kind(),
        }
    }
}

pub(crate) fn check_channel(category: Category, channel: u8, limit: u8) -> Result<(), Error> {
    if channel >= limit {
        return Err(Error::ChannelOutOfRange { category, channel, limit });
    }
    Ok(())
}

impl<T: Transport> Connection<T> {
    /// Access the sensor bound to zone `channel`.
    pub fn sensor(&mut self, channel: u8) -> Result<Elements<'_, T>, Error> {
        Elements::new(self, channel)
    }

    /// Access the setpoints of room `channel`.
    pub fn room(&mut self, channel: u8) -> Result<PackedData<'_, T>, Error> {
        PackedData::new(self, channel)
    }

    pub fn clock(&mut self) -> Clock<'_, T> {
        Clock::new(self)
    }

    pub fn info(&mut self) -> Info<'_, T> {
        Info::new(self)
    }

    /// Channels of all zones that have a sensor bound to them.
    pub fn bound_sensor_channels(&mut self) -> Result<Vec<u8>, Error> {
        let mut channels = Vec::new();
        for channel in 0..elements::CHANNELS {
            if self.sensor(channel)?.is_bound()? {
                channels.push(channel);
            }
        }
        tracing::debug!(message = "scanned for bound sensors", ?channels);
        Ok(channels)
    }

    /// Read and decode a single named register. `channel` is ignored for unpaged registers.
    pub fn read_named(&mut self, register: &Register, channel: u8) -> Result<Value, Error> {
        let page = if register.paged {
            check_channel(register.category, channel, register.pages())?;
            channel
        } else {
            0
        };
        let raw = self.read_single(register.category, register.index, page)?;
        Ok(register.kind.decode(raw))
    }

    pub(crate) fn read_single(&mut self, category: Category, index: u8, page: u8) -> Result<u16, Error> {
        let registers = self.read_register(category, index, page, 1)?;
        Ok(registers[0])
    }
}
