use clap::Parser as _;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};
use wavin_ahc9000_tools::commands;

const LOG_FILTER_VAR: &str = "WAVIN_AHC9000_TOOLS_LOG";

#[derive(clap::Parser)]
#[clap(version, about, author)]
enum Commands {
    Registers(commands::registers::Args),
    Read(commands::read::Args),
    ReadRaw(commands::read_raw::Args),
    WriteRaw(commands::write_raw::Args),
    Sensors(commands::sensors::Args),
    Room(commands::room::Args),
    SetTemperature(commands::set_temperature::Args),
    Clock(commands::clock::Args),
    Info(commands::info::Args),
}

fn end<E: std::error::Error>(r: Result<(), E>) {
    std::process::exit(match r {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            let mut cause = e.source();
            while let Some(e) = cause {
                eprintln!("  because: {e}");
                cause = e.source();
            }
            1
        }
    });
}

fn log_filter() -> tracing_subscriber::filter::Targets {
    let description = std::env::var(LOG_FILTER_VAR).unwrap_or_else(|_| "warn".into());
    description.parse().unwrap_or_else(|e| {
        eprintln!("warning: ignoring invalid {LOG_FILTER_VAR}: {e}");
        tracing_subscriber::filter::Targets::new()
            .with_default(tracing_subscriber::filter::LevelFilter::WARN)
    })
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(log_filter())
        .init();
    match Commands::parse() {
        Commands::Registers(args) => end(commands::registers::run(args)),
        Commands::Read(args) => end(commands::read::run(args)),
        Commands::ReadRaw(args) => end(commands::read_raw::run(args)),
        Commands::WriteRaw(args) => end(commands::write_raw::run(args)),
        Commands::Sensors(args) => end(commands::sensors::run(args)),
        Commands::Room(args) => end(commands::room::run(args)),
        Commands::SetTemperature(args) => end(commands::set_temperature::run(args)),
        Commands::Clock(args) => end(commands::clock::run(args)),
        Commands::Info(args) => end(commands::info::run(args)),
    }
}
