//! Instrument command definition and serialization
//!
//! Both instruments speak line-oriented SCPI. Commands are modeled as enums
//! and serialized through `fmt::Display` so that the executor never sees a
//! raw string and every wire form lives in exactly one place.

use std::{ fmt, time::Duration };
use crate::units::Volt;

/// Mains frequency that the multimeter's integration time is expressed
/// against
///
/// One integration period ("NPLC") is one full cycle of the local power
/// line, so the cycle time feeds directly into acquisition timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerLineFrequency
{
    Hz50,
    Hz60,
}

impl PowerLineFrequency
{
    /// Duration of one power-line cycle
    pub fn cycle_time(&self) -> Duration
    {
        match self {
            PowerLineFrequency::Hz50 => Duration::from_millis(20),
            PowerLineFrequency::Hz60 => Duration::from_micros(16_667),
        }
    }
}

/// Commands understood by the programmable power supply
#[derive(Clone)]
pub enum PsuCmd
{
    /// Reset the error and status registers
    ///
    /// Command: `*CLS`
    ClearStatus,
    /// Select the output channel subsequent commands apply to
    ///
    /// Command: `:INST CH<n>`
    SelectChannel(u32),
    /// Program the output voltage on the selected channel
    ///
    /// The supply accepts two decimal places, so the value is programmed at
    /// centivolt resolution.
    ///
    /// Command: `:VOLT <volts>`
    SetVoltage(Volt),
    /// Enable the selected output channel
    ///
    /// Command: `:OUTP ON`
    OutputOn,
    /// Disable the selected output channel
    ///
    /// Command: `:OUTP OFF`
    OutputOff,
    /// Query the identification string
    ///
    /// Command: `*IDN?`
    Identify,
}

impl fmt::Display for PsuCmd
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            PsuCmd::ClearStatus => f.write_str("*CLS"),
            PsuCmd::SelectChannel(channel) => write!(f, ":INST CH{}", channel),
            PsuCmd::SetVoltage(volts) => write!(f, ":VOLT {:.2}", volts.display_anon()),
            PsuCmd::OutputOn => f.write_str(":OUTP ON"),
            PsuCmd::OutputOff => f.write_str(":OUTP OFF"),
            PsuCmd::Identify => f.write_str("*IDN?"),
        }
    }
}

/// Commands understood by the digital multimeter
#[derive(Clone)]
pub enum DmmCmd
{
    /// Reset the error and status registers
    ///
    /// Command: `*CLS`
    ClearStatus,
    /// Select the DC current measurement function
    ///
    /// Command: `:CONF:CURR:DC`
    ConfigureCurrentDc,
    /// Set the integration time in power-line cycles
    ///
    /// Longer integration rejects more mains noise at the cost of sample
    /// rate.
    ///
    /// Command: `:CURR:DC:NPLC <cycles>`
    IntegrationPeriods(f64),
    /// Set how many samples one acquisition collects
    ///
    /// Command: `:SAMP:COUN <count>`
    SampleCount(u32),
    /// Select the immediate (software) trigger source
    ///
    /// Command: `:TRIG:SOUR IMM`
    TriggerImmediate,
    /// Start the acquisition and begin filling the reading buffer
    ///
    /// Command: `:INIT`
    Initiate,
    /// Query the accumulated reading buffer as comma-delimited text
    ///
    /// Command: `:FETC?`
    Fetch,
    /// Query the identification string
    ///
    /// Command: `*IDN?`
    Identify,
}

impl fmt::Display for DmmCmd
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            DmmCmd::ClearStatus => f.write_str("*CLS"),
            DmmCmd::ConfigureCurrentDc => f.write_str(":CONF:CURR:DC"),
            DmmCmd::IntegrationPeriods(cycles) => write!(f, ":CURR:DC:NPLC {}", cycles),
            DmmCmd::SampleCount(count) => write!(f, ":SAMP:COUN {}", count),
            DmmCmd::TriggerImmediate => f.write_str(":TRIG:SOUR IMM"),
            DmmCmd::Initiate => f.write_str(":INIT"),
            DmmCmd::Fetch => f.write_str(":FETC?"),
            DmmCmd::Identify => f.write_str("*IDN?"),
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::{ DmmCmd, PowerLineFrequency, PsuCmd };
    use crate::units::Volt;
    use std::time::Duration;

    #[test]
    fn serialize_psu_core()
    {
        assert_eq!(&format!("{}", PsuCmd::ClearStatus), "*CLS");
        assert_eq!(&format!("{}", PsuCmd::SelectChannel(1)), ":INST CH1");
        assert_eq!(&format!("{}", PsuCmd::OutputOn), ":OUTP ON");
        assert_eq!(&format!("{}", PsuCmd::OutputOff), ":OUTP OFF");
        assert_eq!(&format!("{}", PsuCmd::Identify), "*IDN?");
    }

    #[test]
    fn voltage_programs_at_centivolt_resolution()
    {
        assert_eq!(&format!("{}", PsuCmd::SetVoltage(Volt::from_volts(5.2))), ":VOLT 5.20");
        assert_eq!(&format!("{}", PsuCmd::SetVoltage(Volt::from_volts(5.234))), ":VOLT 5.23");
        assert_eq!(&format!("{}", PsuCmd::SetVoltage(Volt::from_volts(0.0))), ":VOLT 0.00");
    }

    #[test]
    fn serialize_dmm_core()
    {
        assert_eq!(&format!("{}", DmmCmd::ClearStatus), "*CLS");
        assert_eq!(&format!("{}", DmmCmd::ConfigureCurrentDc), ":CONF:CURR:DC");
        assert_eq!(&format!("{}", DmmCmd::IntegrationPeriods(0.1)), ":CURR:DC:NPLC 0.1");
        assert_eq!(&format!("{}", DmmCmd::IntegrationPeriods(1.0)), ":CURR:DC:NPLC 1");
        assert_eq!(&format!("{}", DmmCmd::SampleCount(600)), ":SAMP:COUN 600");
        assert_eq!(&format!("{}", DmmCmd::TriggerImmediate), ":TRIG:SOUR IMM");
        assert_eq!(&format!("{}", DmmCmd::Initiate), ":INIT");
        assert_eq!(&format!("{}", DmmCmd::Fetch), ":FETC?");
    }

    #[test]
    fn cycle_times()
    {
        assert_eq!(PowerLineFrequency::Hz50.cycle_time(), Duration::from_millis(20));
        assert_eq!(PowerLineFrequency::Hz60.cycle_time(), Duration::from_micros(16_667));
    }
}
