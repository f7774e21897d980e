//! Asynchronous bench driver for checking a DUT's current "beep" signature
//!
//! A device under test is energized from a programmable power supply while
//! a digital multimeter burst-samples its current draw; the captured
//! waveform is then scanned for the short current pulses ("beeps") the
//! device is expected to emit. A full check is three acquisitions: a fast
//! run to characterize the steady-state draw, a fast run expecting a
//! double beep, and a slow high-resolution run expecting a triple beep.
//!
//! Instrument handles are generic over any `AsyncRead + AsyncWrite`
//! stream. Opening the actual port (USB-serial, TCP bridge, in-memory
//! double for tests) is the caller's job; see the `beepcheck` binary for a
//! serial-port entry point.
//!
//! Failure philosophy: a run that cannot produce data yields an empty
//! reading sequence and the sequence carries on where it can, rather than
//! tearing down the bench session for one bad fetch. Only a missing power
//! supply or a dataless characterization run stops a sequence.

pub mod acquire;
pub mod beep;
pub mod cmd;
pub mod devices;
pub mod executor;
pub mod report;
pub mod samples;
pub mod sequence;
pub mod units;

pub use acquire::{
    AcquisitionRequest, AcquisitionResult, AcquisitionTiming, SamplingProfile, run_acquisition,
};
pub use beep::{ BeepPattern, Classification, SpikePolicy };
pub use cmd::PowerLineFrequency;
pub use devices::{ Connection, Multimeter, PowerSupply, ACTIVE_CHANNEL };
pub use sequence::{
    RunStats, SequenceError, SequenceOutcome, SequencePlan, TestRunSummary, run_at_voltage,
    run_beep_sequence,
};
pub use units::{ Ampere, Volt };
