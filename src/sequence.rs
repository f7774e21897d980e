//! The three-run beep test sequence
//!
//! A full check is three acquisitions in fixed order: a fast run to
//! characterize the steady-state draw, a fast run that should show the
//! double beep, and a slow high-resolution run for the sparser triple
//! beep. Runs are strictly sequential; one acquisition fully completes
//! before the next begins.

use std::{ error::Error, fmt, io, time::Duration };
use serde::Serialize;
use tokio::io::{ AsyncReadExt, AsyncWriteExt };
use tokio::time::sleep;
use crate::{
    acquire::{ self, AcquisitionRequest, AcquisitionResult, AcquisitionTiming, SamplingProfile },
    beep::{ BeepPattern, SpikePolicy },
    devices::{ Connection, Multimeter, PowerSupply, ACTIVE_CHANNEL },
    units::{ Ampere, Volt },
};

const MAIN_LABEL: &str = "main draw";

/// The three voltages a full sequence energizes the DUT at
#[derive(Debug, Clone, Copy)]
pub struct SequencePlan
{
    pub main_voltage: Volt,
    pub double_voltage: Volt,
    pub triple_voltage: Volt,
}

/// Aggregate current statistics of one run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStats
{
    pub min: Ampere,
    pub max: Ampere,
    pub mean: Ampere,
}

impl RunStats
{
    /// Returns `None` on an empty reading set rather than dividing by zero
    pub fn from_readings(readings: &[f64]) -> Option<Self>
    {
        if readings.is_empty() {
            return None;
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;

        for &reading in readings {
            min = min.min(reading);
            max = max.max(reading);
            sum += reading;
        }

        Some(Self {
            min: Ampere::from_amps(min),
            max: Ampere::from_amps(max),
            mean: Ampere::from_amps(sum / readings.len() as f64),
        })
    }
}

impl fmt::Display for RunStats
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(
            f,
            "min {:.3} | max {:.3} | mean {:.3}",
            self.min.display_milli(),
            self.max.display_milli(),
            self.mean.display_milli()
        )
    }
}

/// The one long-lived record of a full sequence, appended to the summary
/// log once per run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestRunSummary
{
    #[serde(rename = "Voltage (V)")]
    pub main_voltage: f64,
    #[serde(rename = "Max Current (mA)")]
    pub max_current_ma: f64,
    #[serde(rename = "Double Beep", serialize_with = "pass_fail")]
    pub double_detected: bool,
    #[serde(rename = "Triple Beep", serialize_with = "pass_fail")]
    pub triple_detected: bool,
}

fn pass_fail<S>(detected: &bool, serializer: S) -> Result<S::Ok, S::Error>
    where S: serde::Serializer
{
    serializer.serialize_str(if *detected { "PASS" } else { "FAIL" })
}

/// Everything a full sequence produces, for reporting and plotting
/// collaborators
#[derive(Debug, Clone)]
pub struct SequenceOutcome
{
    pub summary: TestRunSummary,
    pub main_stats: RunStats,
    /// The main, double, and triple acquisitions, in run order
    pub acquisitions: Vec<AcquisitionResult>,
}

/// A condition that stops the whole sequence
#[derive(Debug)]
pub enum SequenceError
{
    /// The power supply precondition failed; nothing was sent to any
    /// instrument
    PowerSupplyOffline(String),
    /// The characterization run returned no data, so there is nothing to
    /// analyze
    NoMainReadings,
}

impl fmt::Display for SequenceError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            SequenceError::PowerSupplyOffline(reason) => {
                write!(f, "cannot run test, power supply is not connected: {}", reason)
            }
            SequenceError::NoMainReadings => {
                f.write_str("no current readings collected on the main run, skipping analysis")
            }
        }
    }
}

impl Error for SequenceError {}

/// Runs the full three-acquisition beep sequence
///
/// Refuses immediately, without issuing a single instrument command, if
/// the power supply is not connected. Aborts after the main run if it
/// produced no readings. In every case past the precondition check the
/// supply is returned to standby before this returns, including the abort
/// paths.
pub async fn run_beep_sequence<P, M>(
    psu: &mut Connection<PowerSupply<P>>,
    dmm: &mut Multimeter<M>,
    plan: &SequencePlan,
    timing: &AcquisitionTiming,
) -> Result<SequenceOutcome, SequenceError>
    where P: AsyncReadExt + AsyncWriteExt + Unpin + Send,
          M: AsyncReadExt + AsyncWriteExt + Unpin + Send
{
    let psu = psu
        .device()
        .map_err(|offline| SequenceError::PowerSupplyOffline(offline.reason))?;

    let outcome = sequence_runs(psu, dmm, plan, timing).await;

    // park the supply on success and on abort alike
    if let Err(err) = psu.standby().await {
        log::warn!("failed to return power supply to standby: {}", err);
    }

    outcome
}

async fn sequence_runs<P, M>(
    psu: &mut PowerSupply<P>,
    dmm: &mut Multimeter<M>,
    plan: &SequencePlan,
    timing: &AcquisitionTiming,
) -> Result<SequenceOutcome, SequenceError>
    where P: AsyncReadExt + AsyncWriteExt + Unpin + Send,
          M: AsyncReadExt + AsyncWriteExt + Unpin + Send
{
    let main = acquire::run_acquisition(
        psu,
        dmm,
        &AcquisitionRequest::new(MAIN_LABEL, plan.main_voltage, SamplingProfile::FAST),
        timing,
    )
    .await;

    let main_stats = RunStats::from_readings(&main.readings)
        .ok_or(SequenceError::NoMainReadings)?;

    log::info!(
        "{} at {:.2}: {}",
        MAIN_LABEL,
        plan.main_voltage.display(),
        main_stats
    );

    let policy = SpikePolicy::default();

    let double_pattern = BeepPattern::TwoPulse;
    let double = acquire::run_acquisition(
        psu,
        dmm,
        &AcquisitionRequest::new(double_pattern.name(), plan.double_voltage, SamplingProfile::FAST),
        timing,
    )
    .await;
    let double_verdict = double_pattern.classify(&double.readings, &policy);
    log::info!(
        "{}: {} spike(s), detected: {}",
        double_pattern,
        double_verdict.spike_count,
        double_verdict.detected
    );

    let triple_pattern = BeepPattern::ThreePulse;
    let triple = acquire::run_acquisition(
        psu,
        dmm,
        &AcquisitionRequest::new(triple_pattern.name(), plan.triple_voltage, SamplingProfile::PRECISE),
        timing,
    )
    .await;
    let triple_verdict = triple_pattern.classify(&triple.readings, &policy);
    log::info!(
        "{}: {} spike(s), detected: {}",
        triple_pattern,
        triple_verdict.spike_count,
        triple_verdict.detected
    );

    let summary = TestRunSummary {
        main_voltage: plan.main_voltage.as_f64(),
        max_current_ma: round_milli(main_stats.max.as_f64() * 1000.0),
        double_detected: double_verdict.detected,
        triple_detected: triple_verdict.detected,
    };

    Ok(SequenceOutcome {
        summary: summary,
        main_stats: main_stats,
        acquisitions: vec![main, double, triple],
    })
}

/// Round to the microamp digit the summary log records
fn round_milli(milliamps: f64) -> f64
{
    (milliamps * 1000.0).round() / 1000.0
}

/// Energizes the DUT at one voltage for a fixed hold time, then disables
/// the output
///
/// No measurement is taken; this exists for manually exercising a DUT on
/// the bench.
pub async fn run_at_voltage<P>(
    psu: &mut PowerSupply<P>,
    voltage: Volt,
    hold: Duration,
) -> Result<(), io::Error>
    where P: AsyncReadExt + AsyncWriteExt + Unpin + Send
{
    psu.select_channel(ACTIVE_CHANNEL).await?;
    psu.set_voltage(voltage).await?;
    psu.output_on().await?;

    log::info!("output held at {:.2} for {:?}", voltage.display(), hold);
    sleep(hold).await;

    psu.output_off().await?;

    Ok(())
}
