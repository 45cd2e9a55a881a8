use super::Error;
use crate::connection::{Connection, Transport};
use crate::modbus::Category;
use crate::registers;
use jiff::civil::DateTime;

/// Year, month, day, weekday, hour, minute and second.
const CLOCK_LENGTH: u8 = 7;

/// The controller's real-time clock.
pub struct Clock<'a, T> {
    connection: &'a mut Connection<T>,
}

impl<'a, T: Transport> Clock<'a, T> {
    pub(crate) fn new(connection: &'a mut Connection<T>) -> Self {
        Self { connection }
    }

    pub fn get(&mut self) -> Result<DateTime, Error> {
        let index = registers::CLOCK_YEAR.index;
        let values = self.connection.read_register(Category::Clock, index, 0, CLOCK_LENGTH)?;
        decode(&values).ok_or(Error::InvalidClock(values))
    }

    /// Set the clock. The day of the week is derived from the date.
    pub fn set(&mut self, time: DateTime) -> Result<(), Error> {
        let values = encode(time)?;
        let index = registers::CLOCK_YEAR.index;
        self.connection.write_register(Category::Clock, index, 0, &values)?;
        Ok(())
    }
}

fn decode(values: &[u16]) -> Option<DateTime> {
    let &[year, month, day, _weekday, hour, minute, second] = values else {
        return None;
    };
    let small = |v: u16| i8::try_from(v).ok();
    let year = i16::try_from(year).ok()?;
    DateTime::new(year, small(month)?, small(day)?, small(hour)?, small(minute)?, small(second)?, 0)
        .ok()
}

fn encode(time: DateTime) -> Result<[u16; CLOCK_LENGTH as usize], Error> {
    let year = u16::try_from(time.year()).map_err(|_| Error::InvalidYear(time.year()))?;
    let small = |v: i8| v as u16;
    Ok([
        year,
        small(time.month()),
        small(time.day()),
        small(time.weekday().to_monday_zero_offset()),
        small(time.hour()),
        small(time.minute()),
        small(time.second()),
    ])
}
