//! Device handles and connection state
//!
//! # Purpose
//! This module defines handles to active I/O streams which provide
//! high-level RPCs for the two bench instruments:
//!   - `PowerSupply`: channel selection, voltage programming, output
//!     control
//!   - `Multimeter`: DC current burst configuration, triggering, and buffer
//!     retrieval
//!
//! Creating I/O handles is not done by this library so that you are not
//! restricted to a particular hardware interface. A USB-serial adapter, a
//! TCP/IP serial bridge, or an in-memory test double all work the same as
//! long as the stream is `AsyncRead + AsyncWrite`.
//!
//! # Cancel Safety
//! The query RPCs (`identify`, `fetch`) are not cancel safe, i.e. they
//! should not be used inside a `tokio::select!`. Each has both a write and
//! a read; cancelling between the two leaves the reply in flight, and it
//! will be misread as the answer to the next query.

use std::{ fmt, io, time::Duration };
use tokio::io::{ AsyncReadExt, AsyncWriteExt };
use crate::{
    cmd::{ DmmCmd, PsuCmd },
    executor::ScpiExecutor,
    units::Volt,
};

/// Output channel the device under test is wired to
pub const ACTIVE_CHANNEL: u32 = 1;

/// A connected programmable power supply
pub struct PowerSupply<T>
{
    link: ScpiExecutor<T>,
}

impl <T> PowerSupply<T>
    where T: AsyncReadExt + AsyncWriteExt + Unpin + Send
{
    /// Construct a new device handle from an async I/O stream
    pub fn with(io_handle: T) -> Self
    {
        Self {
            link: ScpiExecutor::with(io_handle),
        }
    }

    /// Query the instrument identification string
    pub async fn identify(&mut self) -> Result<String, io::Error>
    {
        self.link.query(PsuCmd::Identify).await
    }

    pub async fn clear_status(&mut self) -> Result<(), io::Error>
    {
        self.link.send(PsuCmd::ClearStatus).await
    }

    pub async fn select_channel(&mut self, channel: u32) -> Result<(), io::Error>
    {
        self.link.send(PsuCmd::SelectChannel(channel)).await
    }

    /// Program the output voltage on the selected channel
    ///
    /// The value is written at the supply's two-decimal command resolution.
    pub async fn set_voltage(&mut self, volts: Volt) -> Result<(), io::Error>
    {
        self.link.send(PsuCmd::SetVoltage(volts)).await
    }

    pub async fn output_on(&mut self) -> Result<(), io::Error>
    {
        self.link.send(PsuCmd::OutputOn).await
    }

    pub async fn output_off(&mut self) -> Result<(), io::Error>
    {
        self.link.send(PsuCmd::OutputOff).await
    }

    /// Disable the output and program it back to 0 V
    ///
    /// The safe parking state between test runs and at shutdown.
    pub async fn standby(&mut self) -> Result<(), io::Error>
    {
        self.link.send(PsuCmd::OutputOff).await?;
        self.link.send(PsuCmd::SetVoltage(Volt::from_volts(0.0))).await
    }
}

/// A connected digital multimeter
pub struct Multimeter<T>
{
    link: ScpiExecutor<T>,
}

impl <T> Multimeter<T>
    where T: AsyncReadExt + AsyncWriteExt + Unpin + Send
{
    /// Construct a new device handle from an async I/O stream
    pub fn with(io_handle: T) -> Self
    {
        Self {
            link: ScpiExecutor::with(io_handle),
        }
    }

    /// Sets the deadline for the meter's replies
    ///
    /// A burst acquisition holds the reply to `:FETC?` until the buffer is
    /// ready, so the deadline must cover the whole sampling window.
    pub fn set_response_timeout(&mut self, timeout: Duration)
    {
        self.link.set_response_timeout(timeout);
    }

    /// Query the instrument identification string
    pub async fn identify(&mut self) -> Result<String, io::Error>
    {
        self.link.query(DmmCmd::Identify).await
    }

    pub async fn clear_status(&mut self) -> Result<(), io::Error>
    {
        self.link.send(DmmCmd::ClearStatus).await
    }

    pub async fn configure_current_dc(&mut self) -> Result<(), io::Error>
    {
        self.link.send(DmmCmd::ConfigureCurrentDc).await
    }

    pub async fn set_integration_periods(&mut self, cycles: f64) -> Result<(), io::Error>
    {
        self.link.send(DmmCmd::IntegrationPeriods(cycles)).await
    }

    pub async fn set_sample_count(&mut self, count: u32) -> Result<(), io::Error>
    {
        self.link.send(DmmCmd::SampleCount(count)).await
    }

    pub async fn trigger_immediate(&mut self) -> Result<(), io::Error>
    {
        self.link.send(DmmCmd::TriggerImmediate).await
    }

    pub async fn initiate(&mut self) -> Result<(), io::Error>
    {
        self.link.send(DmmCmd::Initiate).await
    }

    /// Retrieve the accumulated reading buffer as one raw delimited payload
    pub async fn fetch(&mut self) -> Result<String, io::Error>
    {
        self.link.query(DmmCmd::Fetch).await
    }
}

/// Explicit connection state for an instrument
///
/// Connecting can fail for reasons worth reporting later (port missing,
/// identification query timed out), so the failed state carries its reason
/// instead of collapsing into a bare `None` that every call site would have
/// to re-interpret.
pub enum Connection<D>
{
    Connected(D),
    Disconnected(String),
}

impl <D> Connection<D>
{
    pub fn is_connected(&self) -> bool
    {
        match self {
            Connection::Connected(_) => true,
            Connection::Disconnected(_) => false,
        }
    }

    /// Why the instrument is unavailable, if it is
    pub fn reason(&self) -> Option<&str>
    {
        match self {
            Connection::Connected(_) => None,
            Connection::Disconnected(reason) => Some(reason),
        }
    }

    /// Borrow the live device handle, or learn why there is none
    pub fn device(&mut self) -> Result<&mut D, NotConnected>
    {
        match self {
            Connection::Connected(device) => Ok(device),
            Connection::Disconnected(reason) => Err(NotConnected { reason: reason.clone() }),
        }
    }
}

/// An operation required an instrument which is not connected
#[derive(Debug)]
pub struct NotConnected
{
    pub reason: String,
}

impl fmt::Display for NotConnected
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "instrument is not connected: {}", self.reason)
    }
}

impl std::error::Error for NotConnected {}

#[cfg(test)]
mod tests
{
    use super::Connection;

    #[test]
    fn connection_reports_its_state()
    {
        let mut live = Connection::Connected(42u32);
        assert!(live.is_connected());
        assert_eq!(live.reason(), None);
        assert_eq!(*live.device().unwrap(), 42);

        let mut dead = Connection::<u32>::Disconnected("no such port".to_string());
        assert!(!dead.is_connected());
        assert_eq!(dead.reason(), Some("no such port"));
        assert_eq!(dead.device().unwrap_err().reason, "no such port");
    }
}
