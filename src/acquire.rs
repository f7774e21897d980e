//! Single timed burst acquisitions
//!
//! One acquisition energizes the DUT, arms the meter for a synchronous
//! burst of current samples, waits out the sampling window, and fetches the
//! buffer. There is no completion event to wait on: the meter holds its
//! `:FETC?` reply until the buffer is ready, so the controller sleeps for
//! the expected fill time and sizes the reply deadline from the sampling
//! parameters.

use std::{ error::Error, fmt, io, time::Duration };
use tokio::io::{ AsyncReadExt, AsyncWriteExt };
use tokio::time::sleep;
use crate::{
    cmd::PowerLineFrequency,
    devices::{ Multimeter, PowerSupply, ACTIVE_CHANNEL },
    samples,
    units::Volt,
};

/// Sampling parameters for one acquisition
///
/// Valid by construction: both fields are checked to be positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingProfile
{
    integration_periods: f64,
    sample_count: u32,
}

impl SamplingProfile
{
    /// Fast, noisy profile for steady-state characterization and densely
    /// spaced pulses
    pub const FAST: SamplingProfile = SamplingProfile {
        integration_periods: 0.1,
        sample_count: 100,
    };

    /// Slow, precise profile for sparse pulse patterns that need a longer
    /// observation window
    pub const PRECISE: SamplingProfile = SamplingProfile {
        integration_periods: 1.0,
        sample_count: 600,
    };

    pub fn new(integration_periods: f64, sample_count: u32) -> Result<Self, InvalidProfile>
    {
        if !(integration_periods > 0.0) {
            return Err(InvalidProfile::NonPositiveIntegration(integration_periods));
        }

        if sample_count == 0 {
            return Err(InvalidProfile::ZeroSampleCount);
        }

        Ok(Self {
            integration_periods: integration_periods,
            sample_count: sample_count,
        })
    }

    pub fn integration_periods(&self) -> f64
    {
        self.integration_periods
    }

    pub fn sample_count(&self) -> u32
    {
        self.sample_count
    }
}

/// A sampling profile with a non-positive parameter was requested
#[derive(Debug)]
pub enum InvalidProfile
{
    NonPositiveIntegration(f64),
    ZeroSampleCount,
}

impl fmt::Display for InvalidProfile
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            InvalidProfile::NonPositiveIntegration(cycles) => {
                write!(f, "integration periods must be greater than zero, got {}", cycles)
            }
            InvalidProfile::ZeroSampleCount => {
                f.write_str("sample count must be greater than zero")
            }
        }
    }
}

impl Error for InvalidProfile {}

/// Everything needed to run one acquisition, immutable once built
#[derive(Debug, Clone)]
pub struct AcquisitionRequest
{
    label: String,
    target_voltage: Volt,
    profile: SamplingProfile,
}

impl AcquisitionRequest
{
    pub fn new<L>(label: L, target_voltage: Volt, profile: SamplingProfile) -> Self
        where L: Into<String>
    {
        Self {
            label: label.into(),
            target_voltage: target_voltage,
            profile: profile,
        }
    }

    pub fn label(&self) -> &str
    {
        &self.label
    }

    pub fn target_voltage(&self) -> Volt
    {
        self.target_voltage
    }

    pub fn profile(&self) -> &SamplingProfile
    {
        &self.profile
    }
}

/// Wait and deadline tuning for acquisitions
///
/// The defaults reproduce the empirically proven bench values. They are
/// fields rather than constants because they are coupled to the specific
/// meter's processing overhead, and a different bench may need different
/// margins.
#[derive(Debug, Clone)]
pub struct AcquisitionTiming
{
    /// Local mains frequency; sets the duration of one integration period
    pub line_frequency: PowerLineFrequency,
    /// Margin multiplied onto the ideal sampling window when computing the
    /// reply deadline, absorbing per-reading processing overhead
    pub timeout_safety_factor: f64,
    /// Reply deadline never drops below this, so short bursts still ride
    /// out connection hiccups
    pub timeout_floor: Duration,
    /// How long to sleep per requested sample before fetching the buffer
    pub buffer_fill_per_sample: Duration,
}

impl Default for AcquisitionTiming
{
    fn default() -> Self
    {
        Self {
            line_frequency: PowerLineFrequency::Hz50,
            timeout_safety_factor: 4.0,
            timeout_floor: Duration::from_secs(3),
            buffer_fill_per_sample: Duration::from_millis(10),
        }
    }
}

impl AcquisitionTiming
{
    /// Reply deadline for one acquisition with the given profile
    ///
    /// `samples x integration periods x line cycle x safety factor`,
    /// floored at `timeout_floor`.
    pub fn response_timeout(&self, profile: &SamplingProfile) -> Duration
    {
        let window = profile.sample_count() as f64
            * profile.integration_periods()
            * self.line_frequency.cycle_time().as_secs_f64()
            * self.timeout_safety_factor;

        Duration::from_secs_f64(window).max(self.timeout_floor)
    }

    /// How long to give the meter to fill its buffer before fetching
    pub fn buffer_fill_wait(&self, profile: &SamplingProfile) -> Duration
    {
        self.buffer_fill_per_sample * profile.sample_count()
    }
}

/// Readings collected by one acquisition
///
/// An empty reading sequence is the valid terminal state of a failed
/// acquisition, not an error value.
#[derive(Debug, Clone)]
pub struct AcquisitionResult
{
    pub label: String,
    pub target_voltage: Volt,
    pub readings: Vec<f64>,
}

impl AcquisitionResult
{
    pub fn is_empty(&self) -> bool
    {
        self.readings.is_empty()
    }

    /// The readings scaled to milliamps, for reporting collaborators
    pub fn milliamps(&self) -> Vec<f64>
    {
        self.readings.iter().map(|amps| amps * 1000.0).collect()
    }
}

/// Performs one complete timed acquisition
///
/// Any communication failure at any step is caught here and converted into
/// an empty-readings result so that a sequence of acquisitions survives a
/// single bad run.
pub async fn run_acquisition<P, M>(
    psu: &mut PowerSupply<P>,
    dmm: &mut Multimeter<M>,
    request: &AcquisitionRequest,
    timing: &AcquisitionTiming,
) -> AcquisitionResult
    where P: AsyncReadExt + AsyncWriteExt + Unpin + Send,
          M: AsyncReadExt + AsyncWriteExt + Unpin + Send
{
    log::info!(
        "running '{}' acquisition at {:.2}",
        request.label(),
        request.target_voltage().display()
    );

    let readings = match acquire_readings(psu, dmm, request, timing).await {
        Ok(readings) => readings,
        Err(err) => {
            log::warn!(
                "'{}' acquisition failed ({}); continuing with no data",
                request.label(),
                err
            );
            Vec::new()
        }
    };

    AcquisitionResult {
        label: request.label().to_string(),
        target_voltage: request.target_voltage(),
        readings: readings,
    }
}

async fn acquire_readings<P, M>(
    psu: &mut PowerSupply<P>,
    dmm: &mut Multimeter<M>,
    request: &AcquisitionRequest,
    timing: &AcquisitionTiming,
) -> Result<Vec<f64>, io::Error>
    where P: AsyncReadExt + AsyncWriteExt + Unpin + Send,
          M: AsyncReadExt + AsyncWriteExt + Unpin + Send
{
    let profile = request.profile();

    psu.select_channel(ACTIVE_CHANNEL).await?;
    psu.set_voltage(request.target_voltage()).await?;
    psu.output_on().await?;

    dmm.set_response_timeout(timing.response_timeout(profile));
    dmm.clear_status().await?;
    dmm.configure_current_dc().await?;
    dmm.set_integration_periods(profile.integration_periods()).await?;
    dmm.set_sample_count(profile.sample_count()).await?;
    dmm.trigger_immediate().await?;
    dmm.initiate().await?;

    sleep(timing.buffer_fill_wait(profile)).await;

    let payload = dmm.fetch().await?;

    Ok(samples::parse_sample_stream(&payload))
}

#[cfg(test)]
mod tests
{
    use super::{ AcquisitionTiming, InvalidProfile, SamplingProfile };
    use std::time::Duration;

    #[test]
    fn profiles_validate_their_parameters()
    {
        assert!(SamplingProfile::new(0.02, 1000).is_ok());
        assert!(matches!(
            SamplingProfile::new(0.0, 100),
            Err(InvalidProfile::NonPositiveIntegration(_))
        ));
        assert!(matches!(
            SamplingProfile::new(-1.0, 100),
            Err(InvalidProfile::NonPositiveIntegration(_))
        ));
        assert!(matches!(
            SamplingProfile::new(0.1, 0),
            Err(InvalidProfile::ZeroSampleCount)
        ));
    }

    #[test]
    fn short_burst_timeout_hits_the_floor()
    {
        // 100 samples x 0.1 NPLC x 20 ms x 4 = 0.8 s, below the 3 s floor
        let timing = AcquisitionTiming::default();
        assert_eq!(
            timing.response_timeout(&SamplingProfile::FAST),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn long_burst_timeout_scales_with_the_window()
    {
        // 600 samples x 1 NPLC x 20 ms x 4 = 48 s
        let timing = AcquisitionTiming::default();
        assert_eq!(
            timing.response_timeout(&SamplingProfile::PRECISE),
            Duration::from_secs(48)
        );
    }

    #[test]
    fn buffer_fill_wait_is_proportional_to_sample_count()
    {
        let timing = AcquisitionTiming::default();
        assert_eq!(
            timing.buffer_fill_wait(&SamplingProfile::FAST),
            Duration::from_secs(1)
        );
        assert_eq!(
            timing.buffer_fill_wait(&SamplingProfile::PRECISE),
            Duration::from_secs(6)
        );
    }
}
