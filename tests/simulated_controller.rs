//! End to end transactions against an in-memory controller speaking the wire protocol.

use std::collections::{HashMap, VecDeque};

use jiff::civil::date;
use wavin_ahc9000_tools::categories::{self, packed_data::Setpoint};
use wavin_ahc9000_tools::connection::{self, Connection, Transport};
use wavin_ahc9000_tools::crc::{crc16, crc16_bytes};
use wavin_ahc9000_tools::modbus::{self, Category, DeviceError, ErrorKind, pack, unpack};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Fault {
    /// Respond with this code in place of the command echo.
    Code(u8),
    CorruptCrc,
    Silent,
    /// Store and echo every written register incremented by one.
    AlterWrites,
}

#[derive(Default)]
struct SimulatedController {
    device_id: u8,
    registers: HashMap<(Category, u8, u8), u16>,
    outbox: VecDeque<u8>,
    fault: Option<Fault>,
    requests: usize,
}

impl SimulatedController {
    fn new(device_id: u8) -> Self {
        Self { device_id, ..Default::default() }
    }

    fn set(&mut self, category: Category, index: u8, page: u8, value: u16) {
        self.registers.insert((category, index, page), value);
    }

    fn get(&self, category: Category, index: u8, page: u8) -> u16 {
        self.registers.get(&(category, index, page)).copied().unwrap_or(0)
    }

    fn respond(&mut self, request: &[u8]) -> Vec<u8> {
        let (message, crc) = request.split_at(request.len() - 2);
        assert_eq!(crc16(message).to_le_bytes(), crc, "request carries a bad CRC");
        let &[device_id, command, category, index, page, count, ..] = message else {
            panic!("request too short: {request:02x?}");
        };
        assert_eq!(device_id, self.device_id);
        let category = num_traits::FromPrimitive::from_u8(category).expect("known category");
        if let Some(Fault::Code(code)) = self.fault {
            return vec![device_id, code, 0];
        }
        let mut response = vec![device_id, command, 2 * count];
        match command {
            0x43 => {
                let values: Vec<u16> =
                    (0..count).map(|i| self.get(category, index + i, page)).collect();
                response.extend(pack(&values));
            }
            0x44 => {
                let mut values = unpack(&message[6..]).expect("even payload");
                assert_eq!(values.len(), usize::from(count));
                if self.fault == Some(Fault::AlterWrites) {
                    values.iter_mut().for_each(|v| *v += 1);
                }
                for (i, value) in (0..).zip(&values) {
                    self.set(category, index + i, page, *value);
                }
                response.extend(pack(&values));
            }
            other => panic!("unexpected command {other:#04x}"),
        }
        response
    }
}

impl Transport for SimulatedController {
    fn discard_input(&mut self) -> std::io::Result<()> {
        self.outbox.clear();
        Ok(())
    }

    fn discard_output(&mut self) -> std::io::Result<()> {
        Ok(())
    }

    fn send(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.requests += 1;
        if self.fault == Some(Fault::Silent) {
            return Ok(());
        }
        let mut response = self.respond(frame);
        let mut crc = crc16_bytes(&response);
        if self.fault == Some(Fault::CorruptCrc) {
            crc[0] ^= 0xFF;
        }
        response.extend(crc);
        self.outbox.extend(response);
        Ok(())
    }

    fn receive(&mut self, buffer: &mut [u8]) -> std::io::Result<usize> {
        let n = buffer.len().min(self.outbox.len());
        for (slot, byte) in buffer.iter_mut().zip(self.outbox.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

fn connect(controller: SimulatedController) -> Connection<SimulatedController> {
    let device_id = controller.device_id;
    Connection::new(controller, device_id)
}

fn modbus_error(err: &categories::Error) -> &modbus::Error {
    match err {
        categories::Error::Connection(connection::Error::Modbus(e)) => e,
        other => panic!("expected a protocol error, got {other:?}"),
    }
}

#[test]
fn sensor_snapshot() {
    let mut controller = SimulatedController::new(1);
    for (index, value) in [(0, 0x1234), (1, 0x0001), (4, 215), (5, 0x7FFF), (6, 120), (7, 45)] {
        controller.set(Category::Elements, index, 2, value);
    }
    controller.set(Category::Elements, 9, 2, 0x5A64);
    controller.set(Category::Elements, 10, 2, 8);
    let mut connection = connect(controller);

    let snapshot = connection.sensor(2).unwrap().snapshot().unwrap();
    assert_eq!(snapshot.address, 0x0001_1234);
    assert!(snapshot.is_bound());
    assert_eq!(snapshot.temp_air, 21.5);
    assert!(snapshot.temp_floor.is_nan());
    assert_eq!(snapshot.temp_dew, 12.0);
    assert_eq!(snapshot.humidity, 45);
    assert_eq!(snapshot.battery, 80);
    assert_eq!(connection.transport().requests, 1);

    let mut sensor = connection.sensor(2).unwrap();
    assert_eq!(sensor.temp_air().unwrap(), 21.5);
    assert!(sensor.temp_floor().unwrap().is_nan());
    assert_eq!(sensor.address().unwrap(), 0x0001_1234);
}

#[test]
fn scan_for_bound_sensors() {
    let mut controller = SimulatedController::new(1);
    controller.set(Category::Elements, 0, 2, 0x00AA);
    controller.set(Category::Elements, 1, 7, 0x0100);
    controller.set(Category::Elements, 0, 47, 0x0001);
    let mut connection = connect(controller);
    assert_eq!(connection.bound_sensor_channels().unwrap(), vec![2, 7, 47]);
    assert!(connection.transport().requests >= 48);
}

#[test]
fn change_setpoint_and_read_it_back() {
    let mut connection = connect(SimulatedController::new(3));
    let mut room = connection.room(4).unwrap();
    room.set_comfort_temperature(21.46).unwrap();
    assert_eq!(room.comfort_temperature().unwrap(), 21.5);
    room.set_hysteresis(0.5).unwrap();
    room.set_holiday_temperature(12.0).unwrap();
    room.set_temperature(Setpoint::MaxFloor, 27.0).unwrap();
    assert_eq!(room.max_floor_temperature().unwrap(), 27.0);
    assert_eq!(connection.transport().get(Category::PackedData, 1, 4), 215);
    assert_eq!(connection.transport().get(Category::PackedData, 3, 4), 120);
    assert_eq!(connection.transport().get(Category::PackedData, 11, 4), 270);
    assert_eq!(connection.transport().get(Category::PackedData, 14, 4), 5);

    let settings = connection.room(4).unwrap().settings().unwrap();
    assert_eq!(settings.comfort, 21.5);
    assert_eq!(settings.hysteresis, 0.5);
    assert_eq!(settings.holiday, 12.0);
    assert_eq!(settings.max_floor, 27.0);
    assert_eq!(settings.manual, 0.0);
}

#[test]
fn clock_round_trip() {
    let mut connection = connect(SimulatedController::new(1));
    let time = date(2024, 6, 19).at(15, 22, 45, 0);
    connection.clock().set(time).unwrap();
    // 2024-06-19 was a Wednesday.
    assert_eq!(connection.transport().get(Category::Clock, 3, 0), 2);
    assert_eq!(connection.clock().get().unwrap(), time);
}

#[test]
fn controller_identification() {
    let mut controller = SimulatedController::new(1);
    controller.set(Category::Info, 2, 0, 0x0083);
    controller.set(Category::Info, 3, 0, 0x0130);
    controller.set(Category::Info, 4, 0, 9000);
    let mut connection = connect(controller);
    let summary = connection.info().summary().unwrap();
    assert_eq!(summary.hardware_version, "MC1103");
    assert_eq!(summary.software_version, "MC61013");
    assert_eq!(summary.device_name, "AC-9000");
}

#[test]
fn controller_error_code() {
    let mut controller = SimulatedController::new(1);
    controller.fault = Some(Fault::Code(0xC3));
    let mut connection = connect(controller);
    let err = connection.sensor(0).unwrap().temp_air().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(modbus_error(&err).device_error(), Some(DeviceError::ReadFromIndex));
}

#[test]
fn corrupted_response() {
    let mut controller = SimulatedController::new(1);
    controller.fault = Some(Fault::CorruptCrc);
    let mut connection = connect(controller);
    let err = connection.room(0).unwrap().manual_temperature().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert!(matches!(modbus_error(&err), modbus::Error::CrcMismatch { .. }));
}

#[test]
fn silent_controller() {
    let mut controller = SimulatedController::new(1);
    controller.fault = Some(Fault::Silent);
    let mut connection = connect(controller);
    let err = connection.info().hw_version().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(matches!(modbus_error(&err), modbus::Error::MissingResponse { received: 0, .. }));
}

#[test]
fn altered_write_is_not_committed() {
    let mut controller = SimulatedController::new(1);
    controller.fault = Some(Fault::AlterWrites);
    let mut connection = connect(controller);
    let err = connection.room(1).unwrap().set_eco_temperature(18.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert!(matches!(modbus_error(&err), modbus::Error::EchoMismatch { .. }));
}

#[test]
fn rejected_arguments_never_reach_the_controller() {
    let mut connection = connect(SimulatedController::new(1));
    assert_eq!(connection.sensor(48).err().unwrap().kind(), ErrorKind::Validation);
    assert_eq!(connection.room(17).err().unwrap().kind(), ErrorKind::Validation);
    let err = connection.room(0).unwrap().set_manual_temperature(-5.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = connection.read_register(Category::Main, 0, 0, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = connection.write_register(Category::Main, 0, 0, &[0; 128]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(connection.transport().requests, 0);
}
