//! Modbus flavoured CRC-16 (reflected polynomial `0xA001`, seed `0xFFFF`).

/// Number of CRC bytes trailing every frame.
pub const CRC_LENGTH: usize = 2;

const MODBUS: ::crc::Crc<u16> = ::crc::Crc::<u16>::new(&::crc::CRC_16_MODBUS);

pub fn crc16(data: &[u8]) -> u16 {
    MODBUS.checksum(data)
}

/// The CRC of `data` in wire order, i.e. low byte first.
pub fn crc16_bytes(data: &[u8]) -> [u8; CRC_LENGTH] {
    crc16(data).to_le_bytes()
}
