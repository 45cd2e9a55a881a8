use crate::modbus::{self, Category, ErrorKind, Location, Operation, Request};
use std::io::{Read as _, Write as _};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Serial parameters the controller requires apart from the stop bits.
pub const DEFAULT_BAUDRATE: u32 = 38_400;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not open {1:?} for reading and writing")]
    OpenDevice(#[source] serialport::Error, PathBuf),
    #[error("could not discard stale input")]
    DiscardInput(#[source] std::io::Error),
    #[error("could not discard pending output")]
    DiscardOutput(#[source] std::io::Error),
    #[error("could not send out the request")]
    Send(#[source] std::io::Error),
    #[error("could not read the response")]
    Receive(#[source] std::io::Error),
    #[error("register transaction failed")]
    Modbus(#[from] modbus::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Modbus(e) => e.kind(),
            Error::OpenDevice(..)
            | Error::DiscardInput(_)
            | Error::DiscardOutput(_)
            | Error::Send(_)
            | Error::Receive(_) => ErrorKind::Transport,
        }
    }
}

/// A duplex byte channel to the controller.
pub trait Transport {
    /// Drop any bytes received but not read yet.
    fn discard_input(&mut self) -> std::io::Result<()>;
    /// Drop any bytes queued but not transmitted yet.
    fn discard_output(&mut self) -> std::io::Result<()>;
    /// Write out the entire frame and wait for it to be flushed.
    fn send(&mut self, frame: &[u8]) -> std::io::Result<()>;
    /// Block until `buffer` is filled or the timeout elapses, returning the number of bytes read.
    ///
    /// Running out of time is not an error: fewer bytes than requested are returned instead.
    fn receive(&mut self, buffer: &mut [u8]) -> std::io::Result<usize>;
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

#[derive(clap::Parser, Clone)]
#[group(id = "connection::Args")]
pub struct Args {
    /// Path to the serial device the controller is attached to (e.g. /dev/ttyUSB0).
    #[arg(long, short = 'd')]
    device: PathBuf,

    /// The modbus device ID of the controller.
    #[arg(long, short = 'i', default_value = "1")]
    device_id: u8,

    #[arg(long, default_value_t = DEFAULT_BAUDRATE)]
    baudrate: u32,

    /// The number of stop bits.
    ///
    /// The controller documentation states a single stop bit, but some setups have been seen
    /// configured with two. Confirm against your hardware if transactions keep timing out.
    #[arg(long, value_enum, default_value_t = StopBits::One)]
    stop_bits: StopBits,

    /// Consider the transaction failed if the full response isn't received in this amount of time.
    #[arg(long, default_value = "5s")]
    timeout: humantime::Duration,
}

/// [`Transport`] over a serial port, 8 data bits and no parity.
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
    timeout: Duration,
}

impl SerialTransport {
    pub fn open(args: &Args) -> Result<Self, Error> {
        let stop_bits = match args.stop_bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        };
        let timeout = *args.timeout;
        info!(message = "opening serial device", device = ?args.device, baudrate = args.baudrate);
        let port = serialport::new(args.device.to_string_lossy(), args.baudrate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(stop_bits)
            .flow_control(serialport::FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|e| Error::OpenDevice(e, args.device.clone()))?;
        Ok(Self { port, timeout })
    }
}

impl Transport for SerialTransport {
    fn discard_input(&mut self) -> std::io::Result<()> {
        Ok(self.port.clear(serialport::ClearBuffer::Input)?)
    }

    fn discard_output(&mut self) -> std::io::Result<()> {
        Ok(self.port.clear(serialport::ClearBuffer::Output)?)
    }

    fn send(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.port.write_all(frame)?;
        self.port.flush()
    }

    fn receive(&mut self, buffer: &mut [u8]) -> std::io::Result<usize> {
        let deadline = Instant::now() + self.timeout;
        let mut filled = 0;
        while filled < buffer.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            self.port.set_timeout(remaining)?;
            match self.port.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => break,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

/// Executes register transactions against a single controller, one at a time.
///
/// The connection owns its transport exclusively. Every transaction starts by discarding whatever
/// is left in the transport buffers, so that bytes from an earlier, abandoned transaction are
/// never mistaken for the response to the current one.
pub struct Connection<T> {
    transport: T,
    device_id: u8,
}

impl Connection<SerialTransport> {
    pub fn open(args: &Args) -> Result<Self, Error> {
        Ok(Self::new(SerialTransport::open(args)?, args.device_id))
    }
}

impl<T: Transport> Connection<T> {
    pub fn new(transport: T, device_id: u8) -> Self {
        Self { transport, device_id }
    }

    pub fn device_id(&self) -> u8 {
        self.device_id
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Read `length` consecutive registers starting at `index`.
    pub fn read_register(
        &mut self,
        category: Category,
        index: u8,
        page: u8,
        length: u8,
    ) -> Result<Vec<u16>, Error> {
        let location = Location { category, index, page };
        self.transact(Request {
            device_id: self.device_id,
            location,
            operation: Operation::Read { count: length },
        })
    }

    /// Write `data` to consecutive registers starting at `index`.
    ///
    /// Returns only once the controller has echoed back exactly the data that was sent.
    pub fn write_register(
        &mut self,
        category: Category,
        index: u8,
        page: u8,
        data: &[u16],
    ) -> Result<(), Error> {
        let location = Location { category, index, page };
        self.transact(Request {
            device_id: self.device_id,
            location,
            operation: Operation::Write { values: data.to_vec() },
        })
        .map(drop)
    }

    fn transact(&mut self, request: Request) -> Result<Vec<u16>, Error> {
        request.validate()?;
        let frame = request.encode()?;
        self.transport.discard_input().map_err(Error::DiscardInput)?;
        self.transport.discard_output().map_err(Error::DiscardOutput)?;
        trace!(message = "sending request", buffer = ?frame);
        self.transport.send(&frame).map_err(Error::Send)?;
        let mut response = vec![0; request.expected_response_length()];
        let received = self.transport.receive(&mut response).map_err(Error::Receive)?;
        response.truncate(received);
        trace!(message = "received response", buffer = ?response);
        let result = request.decode_response(&response);
        debug!(
            message = "transaction complete",
            command = %request.command(),
            location = ?request.location,
            ok = result.is_ok(),
        );
        Ok(result?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::crc::crc16_bytes;
    use std::collections::VecDeque;

    /// Replays canned responses and records everything written to it.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        pub sent: Vec<Vec<u8>>,
        pub responses: VecDeque<Vec<u8>>,
        pub pending_input: Vec<u8>,
        /// Names of the transport methods in the order they were invoked.
        pub calls: Vec<&'static str>,
    }

    impl ScriptedTransport {
        pub fn replying(responses: impl IntoIterator<Item = Vec<u8>>) -> Self {
            Self { responses: responses.into_iter().collect(), ..Default::default() }
        }
    }

    impl Transport for ScriptedTransport {
        fn discard_input(&mut self) -> std::io::Result<()> {
            self.pending_input.clear();
            self.calls.push("discard_input");
            Ok(())
        }

        fn discard_output(&mut self) -> std::io::Result<()> {
            self.calls.push("discard_output");
            Ok(())
        }

        fn send(&mut self, frame: &[u8]) -> std::io::Result<()> {
            self.calls.push("send");
            self.sent.push(frame.to_vec());
            if let Some(response) = self.responses.pop_front() {
                self.pending_input.extend(response);
            }
            Ok(())
        }

        fn receive(&mut self, buffer: &mut [u8]) -> std::io::Result<usize> {
            self.calls.push("receive");
            let n = buffer.len().min(self.pending_input.len());
            buffer[..n].copy_from_slice(&self.pending_input[..n]);
            self.pending_input.drain(..n);
            Ok(n)
        }
    }

    pub(crate) fn with_crc(mut frame: Vec<u8>) -> Vec<u8> {
        let crc = crc16_bytes(&frame);
        frame.extend(crc);
        frame
    }

    #[test]
    fn read_air_temperature_register() {
        let reply = with_crc(vec![1, 0x43, 0, 0x00, 0xFA]);
        let mut connection = Connection::new(ScriptedTransport::replying([reply]), 1);
        let registers = connection.read_register(Category::Elements, 4, 0, 1).unwrap();
        assert_eq!(registers, vec![250]);
        let transport = connection.into_transport();
        assert_eq!(transport.sent.len(), 1);
        assert_eq!(&transport.sent[0][..6], &[1, 0x43, 1, 4, 0, 1]);
        assert_eq!(transport.sent[0].len(), 8);
    }

    #[test]
    fn device_error_is_a_protocol_error() {
        let reply = with_crc(vec![1, 0xC1, 0]);
        let mut connection = Connection::new(ScriptedTransport::replying([reply]), 1);
        let err = connection.read_register(Category::Elements, 4, 0, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(matches!(err, Error::Modbus(modbus::Error::Device { response: 0xC1, .. })));
    }

    #[test]
    fn zero_length_is_rejected_before_io() {
        let mut connection = Connection::new(ScriptedTransport::default(), 1);
        let err = connection.read_register(Category::Main, 0, 0, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = connection.write_register(Category::Main, 0, 0, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let transport = connection.into_transport();
        assert!(transport.sent.is_empty());
        assert!(transport.calls.is_empty());
    }

    #[test]
    fn silence_is_a_transport_error() {
        let mut connection = Connection::new(ScriptedTransport::default(), 1);
        let err = connection.read_register(Category::Clock, 0, 0, 7).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn stale_bytes_are_discarded_before_sending() {
        let reply = with_crc(vec![1, 0x43, 0, 0x01, 0x02]);
        let mut transport = ScriptedTransport::replying([reply]);
        transport.pending_input = with_crc(vec![1, 0x43, 0, 0xFF, 0xFF]);
        let mut connection = Connection::new(transport, 1);
        let registers = connection.read_register(Category::Main, 3, 0, 1).unwrap();
        assert_eq!(registers, vec![0x0102]);
        assert_eq!(
            connection.transport().calls,
            ["discard_input", "discard_output", "send", "receive"]
        );
    }

    #[test]
    fn both_directions_are_cleared_before_every_send() {
        let replies = [
            with_crc(vec![1, 0x43, 0, 0x00, 0xFA]),
            with_crc(vec![1, 0x44, 2, 0x00, 0xD7]),
            with_crc(vec![1, 0x43, 0, 0x00, 0xD7]),
        ];
        let mut connection = Connection::new(ScriptedTransport::replying(replies), 1);
        connection.read_register(Category::Elements, 4, 0, 1).unwrap();
        connection.write_register(Category::PackedData, 1, 2, &[215]).unwrap();
        connection.read_register(Category::PackedData, 1, 2, 1).unwrap();
        let transport = connection.into_transport();
        assert_eq!(transport.sent.len(), 3);
        for calls in transport.calls.chunks(4) {
            assert_eq!(calls, ["discard_input", "discard_output", "send", "receive"]);
        }
        assert_eq!(transport.calls.len(), 12);
    }

    #[test]
    fn write_is_confirmed_by_echo() {
        let reply = with_crc(vec![1, 0x44, 4, 0x00, 0xD7, 0x00, 0x64]);
        let mut connection = Connection::new(ScriptedTransport::replying([reply]), 1);
        connection.write_register(Category::PackedData, 1, 2, &[215, 100]).unwrap();
        let transport = connection.into_transport();
        assert_eq!(&transport.sent[0][..10], &[1, 0x44, 2, 1, 2, 2, 0x00, 0xD7, 0x00, 0x64]);
    }

    #[test]
    fn write_with_altered_echo_is_rejected() {
        let reply = with_crc(vec![1, 0x44, 2, 0x00, 0xD6]);
        let mut connection = Connection::new(ScriptedTransport::replying([reply]), 1);
        let err = connection.write_register(Category::PackedData, 1, 2, &[215]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[test]
    fn truncated_response_is_a_framing_error() {
        let reply = with_crc(vec![1, 0x43, 0, 0x00, 0xFA]);
        let mut connection = Connection::new(ScriptedTransport::replying([reply]), 1);
        let err = connection.read_register(Category::Elements, 4, 0, 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Framing);
    }
}
