use crate::categories::{self, elements, packed_data};
use crate::connection::{self, Connection, SerialTransport};
use crate::modbus::Category;
use crate::output::{self, Record};
use crate::registers::{Register, Value};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not connect to the controller")]
    Connect(#[source] connection::Error),
    #[error("`{0}` is not a known register, see the `registers` command")]
    UnknownRegister(String),
    #[error("could not read register {1}")]
    ReadRegister(#[source] categories::Error, &'static str),
    #[error("could not read {2} registers at {1:?}")]
    ReadRaw(#[source] connection::Error, (Category, u8, u8), u8),
    #[error("could not write registers to {1:?}")]
    WriteRaw(#[source] connection::Error, (Category, u8, u8)),
    #[error("could not read the settings of room {1}")]
    ReadRoom(#[source] categories::Error, u8),
    #[error("could not change the {1} temperature of room {2}")]
    SetTemperature(#[source] categories::Error, packed_data::Setpoint, u8),
    #[error("could not read the controller clock")]
    ReadClock(#[source] categories::Error),
    #[error("could not set the controller clock")]
    SetClock(#[source] categories::Error),
    #[error("could not read the controller identification")]
    ReadInfo(#[source] categories::Error),
    #[error("could not produce output")]
    Output(#[from] output::Error),
}

fn connect(args: &connection::Args) -> Result<Connection<SerialTransport>, Error> {
    Connection::open(args).map_err(Error::Connect)
}

impl Record for Register {
    fn headers() -> Vec<&'static str> {
        vec!["Category", "Index", "Pages", "Name", "Kind", "Mode", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.category.to_string(),
            self.index.to_string(),
            self.pages().to_string(),
            self.name.to_string(),
            self.kind.to_string(),
            self.mode.to_string(),
            self.description.to_string(),
        ]
    }
}

pub mod registers {
    use super::*;

    /// Search and output known controller registers.
    #[derive(clap::Parser)]
    pub struct Args {
        /// Only output registers whose name, description or category contains this text.
        filter: Option<String>,
        #[clap(flatten)]
        output: output::Args,
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let mut output = args.output.to_output::<Register>()?;
        for register in crate::registers::ALL {
            if let Some(pattern) = &args.filter {
                if !register.is_match(pattern) {
                    continue;
                }
            }
            output.record(register)?;
        }
        Ok(output.commit()?)
    }
}

pub mod read {
    use super::*;

    #[derive(serde::Serialize)]
    pub struct Reading {
        name: &'static str,
        channel: Option<u8>,
        value: Value,
    }

    impl Record for Reading {
        fn headers() -> Vec<&'static str> {
            vec!["Name", "Channel", "Value"]
        }

        fn row(&self) -> Vec<String> {
            vec![
                self.name.to_string(),
                self.channel.map(|c| c.to_string()).unwrap_or_default(),
                self.value.to_string(),
            ]
        }
    }

    /// Read and decode named registers.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: connection::Args,
        #[clap(flatten)]
        output: output::Args,
        /// The channel (zone or room) to read per-channel registers of.
        #[arg(long, short = 'c', default_value = "0")]
        channel: u8,
        /// Register names as listed by the `registers` command.
        #[arg(required = true)]
        names: Vec<String>,
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let registers = args
            .names
            .iter()
            .map(|name| Register::from_name(name).ok_or_else(|| Error::UnknownRegister(name.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        let mut connection = connect(&args.connection)?;
        let mut output = args.output.to_output::<Reading>()?;
        for register in registers {
            let value = connection
                .read_named(register, args.channel)
                .map_err(|e| Error::ReadRegister(e, register.name))?;
            let channel = register.paged.then_some(args.channel);
            output.record(&Reading { name: register.name, channel, value })?;
        }
        Ok(output.commit()?)
    }
}

pub mod read_raw {
    use super::*;

    #[derive(serde::Serialize)]
    pub struct RawRegister {
        category: Category,
        index: u16,
        page: u8,
        value: u16,
    }

    impl Record for RawRegister {
        fn headers() -> Vec<&'static str> {
            vec!["Category", "Index", "Page", "Value", "Hex"]
        }

        fn row(&self) -> Vec<String> {
            vec![
                self.category.to_string(),
                self.index.to_string(),
                self.page.to_string(),
                self.value.to_string(),
                format!("{:#06x}", self.value),
            ]
        }
    }

    /// Read registers without interpreting them.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: connection::Args,
        #[clap(flatten)]
        output: output::Args,
        #[arg(long, value_enum)]
        category: Category,
        #[arg(long)]
        index: u8,
        #[arg(long, default_value = "0")]
        page: u8,
        /// Number of consecutive registers to read.
        #[arg(long, default_value = "1")]
        length: u8,
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let Args { category, index, page, length, .. } = args;
        let mut connection = connect(&args.connection)?;
        let values = connection
            .read_register(category, index, page, length)
            .map_err(|e| Error::ReadRaw(e, (category, index, page), length))?;
        let mut output = args.output.to_output::<RawRegister>()?;
        for (index, value) in (u16::from(index)..).zip(values) {
            output.record(&RawRegister { category, index, page, value })?;
        }
        Ok(output.commit()?)
    }
}

pub mod write_raw {
    use super::*;

    /// Write registers without any checks on their meaning.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: connection::Args,
        #[arg(long, value_enum)]
        category: Category,
        #[arg(long)]
        index: u8,
        #[arg(long, default_value = "0")]
        page: u8,
        /// Register values to write, starting at `--index`.
        #[arg(required = true)]
        values: Vec<u16>,
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let mut connection = connect(&args.connection)?;
        let location = (args.category, args.index, args.page);
        connection
            .write_register(args.category, args.index, args.page, &args.values)
            .map_err(|e| Error::WriteRaw(e, location))?;
        tracing::info!(message = "registers written", ?location, count = args.values.len());
        Ok(())
    }
}

pub mod sensors {
    use super::*;

    impl Record for elements::Snapshot {
        fn headers() -> Vec<&'static str> {
            vec![
                "Channel", "Address", "Air", "Floor", "Dew", "Humidity", "Status", "RSSI base",
                "RSSI remote", "Battery", "Sync group",
            ]
        }

        fn row(&self) -> Vec<String> {
            vec![
                self.channel.to_string(),
                format!("{:08x}", self.address),
                Value::Celsius(self.temp_air).to_string(),
                Value::Celsius(self.temp_floor).to_string(),
                Value::Celsius(self.temp_dew).to_string(),
                format!("{}%", self.humidity),
                format!("{:#06x}", self.status),
                format!("{:.1}", self.rssi.base),
                format!("{:.1}", self.rssi.remote),
                Value::Percent(self.battery).to_string(),
                self.sync_group.to_string(),
            ]
        }
    }

    /// Scan all zones and output the readings of every bound sensor.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: connection::Args,
        #[clap(flatten)]
        output: output::Args,
        /// Also output zones without a bound sensor.
        #[arg(long)]
        all: bool,
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let mut connection = connect(&args.connection)?;
        let mut output = args.output.to_output::<elements::Snapshot>()?;
        for channel in 0..elements::CHANNELS {
            let snapshot = connection.sensor(channel).and_then(|mut s| s.snapshot());
            match snapshot {
                Ok(snapshot) if args.all || snapshot.is_bound() => output.record(&snapshot)?,
                Ok(_) => tracing::debug!(message = "no sensor bound", channel),
                Err(e) => tracing::warn!(
                    message = "could not read sensor, skipping",
                    channel,
                    error = (&e as &dyn std::error::Error)
                ),
            }
        }
        Ok(output.commit()?)
    }
}

pub mod room {
    use super::*;

    impl Record for packed_data::Settings {
        fn headers() -> Vec<&'static str> {
            vec![
                "Channel", "Manual", "Comfort", "Eco", "Holiday", "Standby", "Party", "Min air",
                "Max air", "Min floor", "Max floor", "Hysteresis", "Desired",
            ]
        }

        fn row(&self) -> Vec<String> {
            let c = |v: f32| Value::Celsius(v).to_string();
            vec![
                self.channel.to_string(),
                c(self.manual),
                c(self.comfort),
                c(self.eco),
                c(self.holiday),
                c(self.standby),
                c(self.party),
                c(self.min_air),
                c(self.max_air),
                c(self.min_floor),
                c(self.max_floor),
                c(self.hysteresis),
                c(self.desired),
            ]
        }
    }

    /// Output the temperature settings of a room.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: connection::Args,
        #[clap(flatten)]
        output: output::Args,
        channel: u8,
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let mut connection = connect(&args.connection)?;
        let settings = connection
            .room(args.channel)
            .and_then(|mut room| room.settings())
            .map_err(|e| Error::ReadRoom(e, args.channel))?;
        let mut output = args.output.to_output::<packed_data::Settings>()?;
        output.record(&settings)?;
        Ok(output.commit()?)
    }
}

pub mod set_temperature {
    use super::*;

    /// Change a temperature setting of a room.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: connection::Args,
        channel: u8,
        #[arg(value_enum)]
        setpoint: packed_data::Setpoint,
        /// The new temperature in °C, rounded to a tenth of a degree.
        celsius: f32,
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let mut connection = connect(&args.connection)?;
        connection
            .room(args.channel)
            .and_then(|mut room| room.set_temperature(args.setpoint, args.celsius))
            .map_err(|e| Error::SetTemperature(e, args.setpoint, args.channel))?;
        tracing::info!(
            message = "temperature changed",
            channel = args.channel,
            setpoint = %args.setpoint,
            celsius = args.celsius
        );
        Ok(())
    }
}

pub mod clock {
    use super::*;
    use jiff::civil::DateTime;

    #[derive(serde::Serialize)]
    pub struct ClockReading {
        time: String,
        weekday: String,
    }

    impl Record for ClockReading {
        fn headers() -> Vec<&'static str> {
            vec!["Time", "Weekday"]
        }

        fn row(&self) -> Vec<String> {
            vec![self.time.clone(), self.weekday.clone()]
        }
    }

    /// Read or adjust the controller clock.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: connection::Args,
        #[clap(flatten)]
        output: output::Args,
        /// Set the clock to this local date and time, e.g. `2024-06-19T15:22:45`.
        #[arg(long, conflicts_with = "sync")]
        set: Option<DateTime>,
        /// Set the clock to the current time of this system's time zone.
        #[arg(long)]
        sync: bool,
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let mut connection = connect(&args.connection)?;
        let new_time = match (args.set, args.sync) {
            (Some(time), _) => Some(time),
            (None, true) => Some(jiff::Zoned::now().datetime()),
            (None, false) => None,
        };
        if let Some(time) = new_time {
            connection.clock().set(time).map_err(Error::SetClock)?;
            tracing::info!(message = "clock set", %time);
        }
        let time = connection.clock().get().map_err(Error::ReadClock)?;
        let mut output = args.output.to_output::<ClockReading>()?;
        output.record(&ClockReading {
            time: time.to_string(),
            weekday: format!("{:?}", time.weekday()),
        })?;
        Ok(output.commit()?)
    }
}

pub mod info {
    use super::*;

    impl Record for categories::info::Summary {
        fn headers() -> Vec<&'static str> {
            vec!["Hardware", "Software", "Device"]
        }

        fn row(&self) -> Vec<String> {
            vec![
                self.hardware_version.clone(),
                self.software_version.clone(),
                self.device_name.clone(),
            ]
        }
    }

    /// Identify the controller.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: connection::Args,
        #[clap(flatten)]
        output: output::Args,
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let mut connection = connect(&args.connection)?;
        let summary = connection.info().summary().map_err(Error::ReadInfo)?;
        let mut output = args.output.to_output::<categories::info::Summary>()?;
        output.record(&summary)?;
        Ok(output.commit()?)
    }
}
