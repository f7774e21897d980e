//! Scalar quantities exchanged with the instruments
//!
//! Every value here is born as a float: the multimeter returns readings as
//! ASCII float text and the supply is programmed at a fixed two-decimal
//! resolution. The newtypes exist for type safety at the RPC boundaries and
//! for scaled display, not for lossless arithmetic.

use std::fmt;

/// Display adapter for a unit value at a chosen scale
///
/// Honors the formatter's precision, so `{:.2}` programs a supply at
/// centivolt resolution and `{:.3}` reports microamp-resolved milliamps.
pub struct Scaled
{
    value: f64,
    notation: &'static str,
    symbol: &'static str,
}

impl fmt::Display for Scaled
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match f.precision() {
            Some(precision) => write!(f, "{:.*}", precision, self.value)?,
            None => write!(f, "{}", self.value)?,
        }

        f.write_str(self.notation)?;
        f.write_str(self.symbol)
    }
}

/// An electrical potential in volts
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Volt
{
    volts: f64,
}

impl Volt
{
    pub fn from_volts(volts: f64) -> Self
    {
        Self { volts: volts }
    }

    pub fn as_f64(&self) -> f64
    {
        self.volts
    }

    /// Displays the value with its unit symbol e.g. `5.20V`
    pub fn display(&self) -> Scaled
    {
        Scaled {
            value: self.volts,
            notation: "",
            symbol: "V",
        }
    }

    /// Displays the bare number the way it goes onto the wire
    pub fn display_anon(&self) -> Scaled
    {
        Scaled {
            value: self.volts,
            notation: "",
            symbol: "",
        }
    }
}

/// An electrical current in amperes
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ampere
{
    amps: f64,
}

impl Ampere
{
    pub fn from_amps(amps: f64) -> Self
    {
        Self { amps: amps }
    }

    pub fn as_f64(&self) -> f64
    {
        self.amps
    }

    /// Displays the value with its unit symbol e.g. `0.010A`
    pub fn display(&self) -> Scaled
    {
        Scaled {
            value: self.amps,
            notation: "",
            symbol: "A",
        }
    }

    /// Displays the value scaled to milliamps e.g. `10.000mA`
    pub fn display_milli(&self) -> Scaled
    {
        Scaled {
            value: self.amps * 1000.0,
            notation: "m",
            symbol: "A",
        }
    }
}
