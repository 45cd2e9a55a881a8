//! Frame codec for the proprietary AHC-9000 Modbus dialect.
//!
//! Unlike regular Modbus RTU, registers are addressed by a `(category, index, page)` triple and
//! the controller uses its own function codes for reading (`0x43`) and writing (`0x44`).
//!
//! ```text
//! read request:   addr | 0x43 | category | index | page | count | crc_lo | crc_hi
//! read response:  addr | 0x43 | unused   | data (2 * count)     | crc_lo | crc_hi
//! write request:  addr | 0x44 | category | index | page | count | data (2 * count) | crc
//! write response: addr | 0x44 | length   | data (length)        | crc_lo | crc_hi
//! ```
use crate::crc::{CRC_LENGTH, crc16, crc16_bytes};

/// Length of the fixed response header: address, command echo and a length or error code byte.
pub const HEADER_LENGTH: usize = 3;
/// Length of the fixed request header preceding the payload.
pub const REQUEST_HEADER_LENGTH: usize = 6;
/// The write response echoes the payload length in a single byte.
pub const MAX_WRITE_COUNT: usize = u8::MAX as usize / 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[repr(u8)]
pub enum Command {
    #[strum(to_string = "register read")]
    Read = 0x43,
    #[strum(to_string = "register write")]
    Write = 0x44,
}

/// Top-level address spaces of the register map.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    clap::ValueEnum,
    serde::Serialize,
    strum::Display,
    strum::EnumString,
    strum::VariantArray,
    num_derive::FromPrimitive,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
#[repr(u8)]
pub enum Category {
    Main = 0,
    Elements = 1,
    PackedData = 2,
    Channels = 3,
    Relays = 4,
    Clock = 5,
    Schedules = 6,
    Info = 7,
}

/// Error codes the controller puts in place of the command echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, num_derive::FromPrimitive)]
#[repr(u8)]
pub enum DeviceError {
    #[strum(to_string = "could not read register from address")]
    ReadFromAddress = 0xC1,
    #[strum(to_string = "could not write register to address")]
    WriteToAddress = 0xC2,
    #[strum(to_string = "could not read register from index")]
    ReadFromIndex = 0xC3,
    #[strum(to_string = "could not write register to index")]
    WriteToIndex = 0xC4,
}

/// Broad classification of failures, independent of where exactly they were detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A caller supplied argument is out of range. Detected before any I/O.
    Validation,
    /// No or insufficient bytes arrived, or the transport itself failed.
    Transport,
    /// The controller responded with an error code.
    Protocol,
    /// The amount of data in the response disagrees with what was expected or declared.
    Framing,
    /// Checksum failure, or the controller did not store what was sent.
    Integrity,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("at least one register must be transferred")]
    NoRegisters,
    #[error("{0} registers do not fit a single write (at most {max})", max = MAX_WRITE_COUNT)]
    TooManyRegisters(usize),
    #[error("missing response to {command}, received only {received} bytes")]
    MissingResponse { command: Command, received: usize },
    #[error("controller returned {response:#04x} (error code {code:#04x}) in response to {command}")]
    Device { command: Command, response: u8, code: u8 },
    #[error("incorrect amount of data received, expected {expected} bytes but received {actual}")]
    UnexpectedLength { expected: usize, actual: usize },
    #[error("write response declares {declared} bytes of data but carries {actual}")]
    IncompleteEcho { declared: usize, actual: usize },
    #[error("register data must have an even length, got {0} bytes")]
    OddLength(usize),
    #[error("CRC mismatch, computed {computed:#06x} but received {received:#06x}")]
    CrcMismatch { computed: u16, received: u16 },
    #[error("incorrect data written, expected {expected:02x?} but the controller echoed {actual:02x?}")]
    EchoMismatch { expected: Vec<u8>, actual: Vec<u8> },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoRegisters | Error::TooManyRegisters(_) => ErrorKind::Validation,
            Error::MissingResponse { .. } => ErrorKind::Transport,
            Error::Device { .. } => ErrorKind::Protocol,
            Error::UnexpectedLength { .. } | Error::IncompleteEcho { .. } | Error::OddLength(_) => {
                ErrorKind::Framing
            }
            Error::CrcMismatch { .. } | Error::EchoMismatch { .. } => ErrorKind::Integrity,
        }
    }

    /// Interpretation of the code a controller returned in place of the command echo, if known.
    pub fn device_error(&self) -> Option<DeviceError> {
        match self {
            Error::Device { response, .. } => num_traits::FromPrimitive::from_u8(*response),
            _ => None,
        }
    }
}

/// Where a register lives in the controller's register map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub category: Category,
    pub index: u8,
    pub page: u8,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub device_id: u8,
    pub location: Location,
    pub operation: Operation,
}

#[derive(Debug, Clone)]
pub enum Operation {
    Read { count: u8 },
    Write { values: Vec<u16> },
}

impl Request {
    /// Number of registers carried or requested by this request.
    fn count(&self) -> Result<u8, Error> {
        let count = match &self.operation {
            Operation::Read { count } => usize::from(*count),
            Operation::Write { values } if values.len() > MAX_WRITE_COUNT => {
                return Err(Error::TooManyRegisters(values.len()));
            }
            Operation::Write { values } => values.len(),
        };
        match u8::try_from(count) {
            Ok(0) => Err(Error::NoRegisters),
            Ok(count) => Ok(count),
            Err(_) => Err(Error::TooManyRegisters(count)),
        }
    }

    pub fn command(&self) -> Command {
        match self.operation {
            Operation::Read { .. } => Command::Read,
            Operation::Write { .. } => Command::Write,
        }
    }

    /// Check the request can be represented on the wire.
    pub fn validate(&self) -> Result<(), Error> {
        self.count().map(drop)
    }

    /// Exact number of bytes a successful response to this request occupies.
    pub fn expected_response_length(&self) -> usize {
        let data = match &self.operation {
            Operation::Read { count } => 2 * usize::from(*count),
            Operation::Write { values } => 2 * values.len(),
        };
        HEADER_LENGTH + data + CRC_LENGTH
    }

    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let count = self.count()?;
        let Location { category, index, page } = self.location;
        let mut frame = Vec::with_capacity(REQUEST_HEADER_LENGTH + 2 * usize::from(count) + 2);
        frame.extend([self.device_id, self.command() as u8, category as u8, index, page, count]);
        if let Operation::Write { values } = &self.operation {
            frame.extend(pack(values));
        }
        frame.extend(crc16_bytes(&frame));
        Ok(frame)
    }

    /// Validate a response to this request, returning the registers read (empty for writes).
    pub fn decode_response(&self, response: &[u8]) -> Result<Vec<u16>, Error> {
        match &self.operation {
            Operation::Read { count } => decode_read_response(response, *count),
            Operation::Write { values } => {
                decode_write_response(response, &pack(values)).map(|()| Vec::new())
            }
        }
    }
}

fn check_command_echo(response: &[u8], command: Command) -> Result<(), Error> {
    let &[_, echo, code, ..] = response else {
        return Err(Error::MissingResponse { command, received: response.len() });
    };
    if echo != command as u8 {
        return Err(Error::Device { command, response: echo, code });
    }
    Ok(())
}

fn check_crc(response: &[u8]) -> Result<(), Error> {
    let (message, crc) = response.split_at(response.len() - CRC_LENGTH);
    let received = u16::from_le_bytes([crc[0], crc[1]]);
    let computed = crc16(message);
    if computed != received {
        return Err(Error::CrcMismatch { computed, received });
    }
    Ok(())
}

/// Validate a read response and extract the `count` registers it carries.
pub fn decode_read_response(response: &[u8], count: u8) -> Result<Vec<u16>, Error> {
    check_command_echo(response, Command::Read)?;
    let data_length = response.len().saturating_sub(HEADER_LENGTH + CRC_LENGTH);
    if response.len() < HEADER_LENGTH + CRC_LENGTH || data_length != 2 * usize::from(count) {
        return Err(Error::UnexpectedLength {
            expected: HEADER_LENGTH + 2 * usize::from(count) + CRC_LENGTH,
            actual: response.len(),
        });
    }
    check_crc(response)?;
    unpack(&response[HEADER_LENGTH..][..data_length])
}

/// Validate the controller's echo of a write carrying `payload`.
///
/// The write is only committed once the echo is complete, carries a valid CRC and matches the
/// payload byte for byte.
pub fn decode_write_response(response: &[u8], payload: &[u8]) -> Result<(), Error> {
    check_command_echo(response, Command::Write)?;
    let declared = usize::from(response[2]);
    let Some(echoed) = response.get(HEADER_LENGTH..response.len() - CRC_LENGTH) else {
        return Err(Error::IncompleteEcho { declared, actual: 0 });
    };
    if declared != echoed.len() {
        return Err(Error::IncompleteEcho { declared, actual: echoed.len() });
    }
    check_crc(response)?;
    if echoed != payload {
        return Err(Error::EchoMismatch { expected: payload.to_vec(), actual: echoed.to_vec() });
    }
    Ok(())
}

/// Serialize registers most significant byte first.
pub fn pack(registers: &[u16]) -> Vec<u8> {
    registers.iter().flat_map(|r| r.to_be_bytes()).collect()
}

pub fn unpack(bytes: &[u8]) -> Result<Vec<u16>, Error> {
    if bytes.len() % 2 != 0 {
        return Err(Error::OddLength(bytes.len()));
    }
    Ok(bytes.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect())
}
