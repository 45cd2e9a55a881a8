use super::Error;
use crate::connection::{Connection, Transport};
use crate::modbus::Category;
use crate::registers;

/// Identification of the controller.
pub struct Info<'a, T> {
    connection: &'a mut Connection<T>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Summary {
    pub hardware_version: String,
    pub software_version: String,
    pub device_name: String,
}

impl<'a, T: Transport> Info<'a, T> {
    pub(crate) fn new(connection: &'a mut Connection<T>) -> Self {
        Self { connection }
    }

    fn read(&mut self, register: registers::Register) -> Result<u16, Error> {
        self.connection.read_single(Category::Info, register.index, 0)
    }

    /// Hardware model, e.g. `MC1105`.
    pub fn hw_version(&mut self) -> Result<String, Error> {
        Ok(registers::hardware_version(self.read(registers::INFO_HW_VERSION)?))
    }

    /// Firmware version, e.g. `MC61012` or `MC61012b3` for beta builds.
    pub fn sw_version(&mut self) -> Result<String, Error> {
        Ok(registers::software_version(self.read(registers::INFO_SW_VERSION)?))
    }

    pub fn device_name(&mut self) -> Result<String, Error> {
        Ok(registers::device_name(self.read(registers::INFO_DEVICE_NAME)?))
    }

    /// All of the above in a single transaction.
    pub fn summary(&mut self) -> Result<Summary, Error> {
        let first = registers::INFO_HW_VERSION.index;
        let count = registers::INFO_DEVICE_NAME.index - first + 1;
        let values = self.connection.read_register(Category::Info, first, 0, count)?;
        let at = |register: registers::Register| values[usize::from(register.index - first)];
        Ok(Summary {
            hardware_version: registers::hardware_version(at(registers::INFO_HW_VERSION)),
            software_version: registers::software_version(at(registers::INFO_SW_VERSION)),
            device_name: registers::device_name(at(registers::INFO_DEVICE_NAME)),
        })
    }
}
