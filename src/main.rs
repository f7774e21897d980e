//! Interactive bench entry point
//!
//! Connects the power supply and multimeter on their serial ports, asks
//! the operator for the three test voltages, runs the beep sequence, and
//! appends the summary row to the results log.

use std::{
    io::{ self, Write },
    path::Path,
    process,
};
use tokio_serial::{ SerialPortBuilderExt, SerialStream };
use beepcheck::{
    AcquisitionTiming, Connection, Multimeter, PowerSupply, SequencePlan, Volt,
    devices::ACTIVE_CHANNEL,
    report,
    run_beep_sequence,
};

const DEFAULT_PSU_PORT: &str = "/dev/ttyUSB0";
const DEFAULT_DMM_PORT: &str = "/dev/ttyUSB1";
const BAUD_RATE: u32 = 9600;
const SUMMARY_PATH: &str = "summary_results.csv";

#[tokio::main(flavor = "current_thread")]
async fn main()
{
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let psu_port = args.next().unwrap_or_else(|| DEFAULT_PSU_PORT.to_string());
    let dmm_port = args.next().unwrap_or_else(|| DEFAULT_DMM_PORT.to_string());

    let mut dmm = match connect_multimeter(&dmm_port).await {
        Connection::Connected(dmm) => dmm,
        Connection::Disconnected(reason) => {
            eprintln!("multimeter unavailable ({}), skipping tests", reason);
            process::exit(1);
        }
    };

    let mut psu = connect_power_supply(&psu_port).await;
    if let Some(reason) = psu.reason() {
        eprintln!("power supply unavailable ({}), stopping", reason);
        process::exit(1);
    }

    let plan = match prompt_plan() {
        Ok(plan) => plan,
        Err(message) => {
            eprintln!("{}", message);
            process::exit(2);
        }
    };

    let timing = AcquisitionTiming::default();

    match run_beep_sequence(&mut psu, &mut dmm, &plan, &timing).await {
        Ok(outcome) => {
            println!();
            println!(
                "main draw at {:.2}: {}",
                plan.main_voltage.display(),
                outcome.main_stats
            );
            println!(
                "double beep at {:.2}: {}",
                plan.double_voltage.display(),
                if outcome.summary.double_detected { "PASS" } else { "FAIL" }
            );
            println!(
                "triple beep at {:.2}: {}",
                plan.triple_voltage.display(),
                if outcome.summary.triple_detected { "PASS" } else { "FAIL" }
            );

            if let Err(err) = report::append_summary(Path::new(SUMMARY_PATH), &outcome.summary) {
                eprintln!("{}", err);
                process::exit(1);
            }
            println!("summary appended to {}", SUMMARY_PATH);
        }
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    }
}

/// Asks the operator for the three test voltages
///
/// Malformed input is reported to the operator and never reaches the
/// instruments.
fn prompt_plan() -> Result<SequencePlan, String>
{
    println!("Enter test voltages for the automated run:");

    Ok(SequencePlan {
        main_voltage: prompt_voltage("  MAIN test voltage: ")?,
        double_voltage: prompt_voltage("  DOUBLE BEEP test voltage: ")?,
        triple_voltage: prompt_voltage("  TRIPLE BEEP test voltage: ")?,
    })
}

fn prompt_voltage(prompt: &str) -> Result<Volt, String>
{
    print!("{}", prompt);
    io::stdout().flush().map_err(|err| err.to_string())?;

    let mut line = String::new();
    io::stdin().read_line(&mut line).map_err(|err| err.to_string())?;

    line.trim()
        .parse::<f64>()
        .map(Volt::from_volts)
        .map_err(|_| format!("invalid input {:?}, enter a numeric voltage", line.trim()))
}

async fn connect_power_supply(path: &str) -> Connection<PowerSupply<SerialStream>>
{
    let stream = match tokio_serial::new(path, BAUD_RATE).open_native_async() {
        Ok(stream) => stream,
        Err(err) => return Connection::Disconnected(format!("{}: {}", path, err)),
    };

    let mut psu = PowerSupply::with(stream);

    match psu.identify().await {
        Ok(id) => log::info!("power supply on {}: {}", path, id.trim()),
        Err(err) => return Connection::Disconnected(format!("{}: {}", path, err)),
    }

    // park the supply in a known-safe state before any test runs
    if let Err(err) = init_power_supply(&mut psu).await {
        return Connection::Disconnected(format!("{}: {}", path, err));
    }

    Connection::Connected(psu)
}

async fn init_power_supply(psu: &mut PowerSupply<SerialStream>) -> Result<(), io::Error>
{
    psu.clear_status().await?;
    psu.select_channel(ACTIVE_CHANNEL).await?;
    psu.output_off().await?;
    psu.set_voltage(Volt::from_volts(0.0)).await
}

async fn connect_multimeter(path: &str) -> Connection<Multimeter<SerialStream>>
{
    let stream = match tokio_serial::new(path, BAUD_RATE).open_native_async() {
        Ok(stream) => stream,
        Err(err) => return Connection::Disconnected(format!("{}: {}", path, err)),
    };

    let mut dmm = Multimeter::with(stream);

    match dmm.identify().await {
        Ok(id) => log::info!("multimeter on {}: {}", path, id.trim()),
        Err(err) => return Connection::Disconnected(format!("{}: {}", path, err)),
    }

    if let Err(err) = dmm.clear_status().await {
        return Connection::Disconnected(format!("{}: {}", path, err));
    }

    Connection::Connected(dmm)
}
