//! Delay providers
//!
//! The configuration tier of both families waits for oscillators and clock
//! switches through an [`embedded_hal::delay::DelayNs`]. On target,
//! [`Delay`] counts system timer (SysTick) ticks at HCLK / 8.
//!
//! `freeze` changes HCLK while it waits, so the delay asks an
//! [`HclkSource`] for the frequency on every call. Each family provides an
//! `HclkMonitor` that reads HCLK back from the RCC registers. A plain
//! [`Hertz`] can be used once the clock tree is fixed.
//!
//! # Examples
//!
//! ```ignore
//! let rcc = dp.RCC.constrain().use_hse(8.MHz()).sys_ck(72.MHz());
//! let mut delay = Delay::new(core.SYST, rcc.hclk_monitor());
//!
//! // Timeouts stay in milliseconds across the switch from 8 to 72 MHz
//! let ccdr = rcc.freeze(&pwr, &flash, &mut delay)?;
//!
//! delay.delay_ms(500);
//!
//! // Release SYST from the delay
//! let syst = delay.free();
//! ```

use crate::time::Hertz;

#[cfg(target_arch = "arm")]
pub use systick::Delay;

/// SysTick runs from HCLK through a fixed /8 divider
#[cfg_attr(not(target_arch = "arm"), allow(dead_code))]
const SYSTICK_HCLK_DIV: u64 = 8;

/// The SysTick Reload Value register holds values up to 0x00FFFFFF
#[cfg_attr(not(target_arch = "arm"), allow(dead_code))]
const MAX_RVR: u64 = 0x00FF_FFFF;

/// The current HCLK frequency
pub trait HclkSource {
    /// HCLK at the time of the call
    fn hclk(&self) -> Hertz;
}

impl HclkSource for Hertz {
    fn hclk(&self) -> Hertz {
        *self
    }
}

/// SysTick ticks in `ns` nanoseconds at `hclk`, never less than one so
/// that polling loops make progress
#[cfg_attr(not(target_arch = "arm"), allow(dead_code))]
fn systick_ticks(ns: u32, hclk: Hertz) -> u64 {
    let ticks = u64::from(ns) * u64::from(hclk.raw())
        / (1_000_000_000 * SYSTICK_HCLK_DIV);
    ticks.max(1)
}

/// Reload values covering `ticks`
#[cfg_attr(not(target_arch = "arm"), allow(dead_code))]
fn reload_values(mut ticks: u64) -> impl Iterator<Item = u32> {
    core::iter::from_fn(move || {
        (ticks != 0).then(|| {
            let rvr = ticks.min(MAX_RVR);
            ticks -= rvr;
            rvr as u32
        })
    })
}

#[cfg(target_arch = "arm")]
mod systick {
    use cortex_m::peripheral::syst::SystClkSource;
    use cortex_m::peripheral::SYST;
    use embedded_hal::delay::DelayNs;

    use super::{reload_values, systick_ticks, HclkSource};
    use crate::time::Hertz;

    /// System timer (SysTick) as a delay provider
    pub struct Delay<H = Hertz> {
        syst: SYST,
        hclk: H,
    }

    impl<H: HclkSource> Delay<H> {
        /// Configures the system timer (SysTick) as a delay provider
        pub fn new(mut syst: SYST, hclk: H) -> Self {
            syst.disable_counter();
            syst.set_clock_source(SystClkSource::External);

            Delay { syst, hclk }
        }

        /// Releases the system timer (SysTick) resource
        pub fn free(self) -> SYST {
            self.syst
        }
    }

    impl<H: HclkSource> DelayNs for Delay<H> {
        fn delay_ns(&mut self, ns: u32) {
            for rvr in reload_values(systick_ticks(ns, self.hclk.hclk())) {
                self.syst.set_reload(rvr);
                self.syst.clear_current();
                self.syst.enable_counter();

                while !self.syst.has_wrapped() {}

                self.syst.disable_counter();
            }
        }
    }
}
