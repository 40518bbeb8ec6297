//! Reset and Clock Control
//!
//! Types shared by the family drivers in [`f3`](crate::f3) and
//! [`wb`](crate::wb): derived clock frequencies, errors and the bounded
//! polling used while waiting for oscillators, PLLs and clock switches.
//!
//! # Derived frequencies
//!
//! Reading a kernel clock frequency never fails. When the oscillator behind
//! a clock is not ready the reading is [`ClockFreq::NoClock`]; when the
//! clock comes from outside the device and no frequency can be known it is
//! [`ClockFreq::NotApplicable`]. The raw encodings of those two readings
//! are [`ClockFreq::NO_CLOCK`] and [`ClockFreq::NA`].
#![deny(missing_docs)]

use embedded_hal::delay::DelayNs;

use crate::time::{Hertz, MilliSeconds};

#[macro_use]
pub mod rec;

pub use rec::{LowPowerMode, RecTokenizer, ResetEnable, Token};

/// The frequency of a clock derived from register state
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClockFreq {
    /// The clock is running at this frequency
    Running(Hertz),
    /// The source of the clock is not ready, or no source is selected
    NoClock,
    /// The clock has no frequency that can be derived from register state,
    /// for example an external input pin
    NotApplicable,
}

impl ClockFreq {
    /// Raw encoding of [`ClockFreq::NoClock`]
    pub const NO_CLOCK: u32 = 0;
    /// Raw encoding of [`ClockFreq::NotApplicable`]
    pub const NA: u32 = 0xFFFF_FFFF;

    /// Frequency in Hz, or one of the sentinels [`NO_CLOCK`](Self::NO_CLOCK)
    /// and [`NA`](Self::NA)
    pub const fn raw(self) -> u32 {
        match self {
            ClockFreq::Running(f) => f.raw(),
            ClockFreq::NoClock => Self::NO_CLOCK,
            ClockFreq::NotApplicable => Self::NA,
        }
    }

    /// Decode a raw frequency
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            Self::NO_CLOCK => ClockFreq::NoClock,
            Self::NA => ClockFreq::NotApplicable,
            f => ClockFreq::Running(Hertz::from_raw(f)),
        }
    }

    /// Returns `Some(frequency)` if the clock is running
    pub const fn hertz(self) -> Option<Hertz> {
        match self {
            ClockFreq::Running(f) => Some(f),
            _ => None,
        }
    }

    /// Returns `true` if the clock is running
    pub const fn is_running(self) -> bool {
        matches!(self, ClockFreq::Running(_))
    }

    /// Apply `f` to a running frequency, passing the sentinels through
    pub fn map(self, f: impl FnOnce(u32) -> u32) -> Self {
        match self {
            ClockFreq::Running(hz) => ClockFreq::from_raw(f(hz.raw())),
            other => other,
        }
    }
}

impl From<Option<Hertz>> for ClockFreq {
    fn from(f: Option<Hertz>) -> Self {
        match f {
            Some(f) => ClockFreq::Running(f),
            None => ClockFreq::NoClock,
        }
    }
}

impl From<ClockFreq> for u32 {
    fn from(f: ClockFreq) -> u32 {
        f.raw()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ClockFreq {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ClockFreq::Running(hz) => defmt::write!(f, "{=u32} Hz", hz.raw()),
            ClockFreq::NoClock => defmt::write!(f, "no clock"),
            ClockFreq::NotApplicable => defmt::write!(f, "n/a"),
        }
    }
}

/// A clock, oscillator or clock stage named in errors
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Clock {
    /// High speed external oscillator
    Hse,
    /// High speed internal oscillator
    Hsi,
    /// Low speed external oscillator
    Lse,
    /// Low speed internal oscillator
    Lsi,
    /// Low speed internal oscillator 1
    Lsi1,
    /// Low speed internal oscillator 2
    Lsi2,
    /// Multi-speed internal oscillator
    Msi,
    /// 48 MHz internal oscillator
    Hsi48,
    /// Main PLL
    Pll,
    /// SAI1 PLL
    PllSai1,
    /// System clock switch
    SysClk,
    /// Backup domain write access
    BackupDomain,
    /// AHB / APB prescaler update
    HclkPrescaler,
    /// Flash wait states
    FlashLatency,
}

/// RCC error
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The hardware did not reach the requested state in time
    Timeout(Clock),
    /// The clock is the current system clock source, or feeds it, and
    /// cannot be stopped or reconfigured
    InUse(Clock),
    /// The clock selected as a source is not running
    NotReady(Clock),
    /// The requested configuration is outside of the hardware limits
    InvalidConfig,
}

/// Upper bound of polls for the register-level waits
pub(crate) const SPIN_LIMIT: u32 = 0x000F_FFFF;

fn timed_out(clock: Clock) -> Result<(), Error> {
    #[cfg(feature = "log")]
    log::warn!("RCC: timeout waiting for {:?}", clock);

    #[cfg(feature = "defmt")]
    defmt::warn!("RCC: timeout waiting for {}", clock);

    Err(Error::Timeout(clock))
}

/// Poll `ready` until it returns `true`, giving up after
/// [`SPIN_LIMIT`] polls
pub(crate) fn spin_until(
    clock: Clock,
    mut ready: impl FnMut() -> bool,
) -> Result<(), Error> {
    for _ in 0..SPIN_LIMIT {
        if ready() {
            return Ok(());
        }
        core::hint::spin_loop();
    }

    if ready() {
        Ok(())
    } else {
        timed_out(clock)
    }
}

/// Poll `ready` once per millisecond until it returns `true`, giving up
/// when `timeout` has elapsed
pub(crate) fn wait_until<D: DelayNs>(
    delay: &mut D,
    timeout: MilliSeconds,
    clock: Clock,
    mut ready: impl FnMut() -> bool,
) -> Result<(), Error> {
    let mut elapsed = 0;
    loop {
        if ready() {
            return Ok(());
        }
        if elapsed >= timeout.to_millis() {
            return timed_out(clock);
        }
        delay.delay_ms(1);
        elapsed += 1;
    }
}
