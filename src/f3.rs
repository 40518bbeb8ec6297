//! STM32F3 Reset and Clock Control
//!
//! This module configures the RCC unit to provide set frequencies for
//! the system clock `sys_ck`, the High-performance Bus (AHB) `hclk` and
//! the Peripheral (APB) Buses `pclk1` and `pclk2`.
//!
//! See Figure 13 "STM32F303xD/E clock tree" in Reference Manual RM0316.
//!
//! HSI is 8 MHz.
//! LSI is 40 kHz.
//!
//! # Usage
//!
//! A builder pattern is used to specify the state and frequency of
//! possible clocks. The `freeze` method configures the RCC peripheral
//! in a best-effort attempt to generate these clocks. The actual
//! clocks configured are returned in `ccdr.clocks`.
//!
//! Some clock specifications imply other clock specifications, as follows:
//!
//! * `use_hse(a)` implies `sys_ck(a)`
//!
//! * `sys_ck(b)` implies the PLL unless `b` equals HSI or `use_hse(b)` was
//!   specified
//!
//! * `hclk(c)` defaults to `sys_ck`, `pclk1` to `hclk` limited to 36 MHz and
//!   `pclk2` to `hclk`
//!
//! If a configuration cannot be achieved by hardware, `freeze` returns
//! [`Error::InvalidConfig`].
//!
//! ```ignore
//! let rcc = RCC::take().unwrap().constrain();
//! let ccdr = rcc
//!     .use_hse(8.MHz())
//!     .sys_ck(72.MHz())
//!     .pclk1(36.MHz())
//!     .freeze(&pwr, &flash, &mut delay)?;
//!
//! assert_eq!(ccdr.clocks.sysclk().raw(), 72_000_000);
//!
//! // Enable the clock to a peripheral and reset it
//! ccdr.peripheral.USART1.enable().reset();
//! ```
//!
//! # Layers
//!
//! * [`ll`]: every RCC bit-field as a method on the [`regs::RegisterBlock`]
//! * [`clocks`]: clock frequencies decoded from the register state
//! * [`hal`]: oscillator, system clock and kernel clock configuration with
//!   timeouts, as methods on [`Rcc`]
//! * [`rec`]: peripheral reset, enable and kernel clock selection
#![deny(missing_docs)]

use embedded_hal::delay::DelayNs;
#[cfg(feature = "log")]
use log::debug;

use crate::rcc::Error;
use crate::time::Hertz;

pub mod clocks;
pub mod hal;
pub mod ll;
pub mod rec;
pub mod regs;

pub use clocks::{CoreClocks, HclkMonitor, OscillatorValues};
pub use hal::{
    ClkConfig, ExtOscState, HsiState, OscConfig, OscState, PeriphClk,
    PeriphClkConfig, PllConfig, PllState, ResetReason,
};
pub use rec::PeripheralREC;
pub use regs::{FLASH, PWR, RCC};

use clocks::HSI;
use ll::{AhbPrescaler, ApbPrescaler, PllMul, PllSource, Prediv, SysClkSource};

/// Highest SYSCLK and HCLK frequency
pub const MAX_SYSCLK_FREQ_HZ: u32 = 72_000_000;
/// Highest APB1 frequency
pub const MAX_PCLK1_FREQ_HZ: u32 = 36_000_000;
/// Highest HSE frequency
pub const MAX_HSE_FREQ_HZ: u32 = 32_000_000;

const PLL_IN_MIN: u32 = 1_000_000;
const PLL_IN_MAX: u32 = 24_000_000;
const PLL_OUT_MIN: u32 = 16_000_000;

/// Configuration of the core clocks
#[derive(Copy, Clone, Debug, Default)]
pub struct Config {
    hse: Option<u32>,
    bypass_hse: bool,
    lse: Option<u32>,
    sys_ck: Option<u32>,
    rcc_hclk: Option<u32>,
    rcc_pclk1: Option<u32>,
    rcc_pclk2: Option<u32>,
}

/// Extension trait that constrains the `RCC` peripheral
pub trait RccExt: crate::Sealed {
    /// Constrains the `RCC` peripheral so it plays nicely with the
    /// other abstractions
    fn constrain(self) -> Rcc;
}

impl RccExt for RCC {
    fn constrain(self) -> Rcc {
        Rcc {
            config: Config::default(),
            osc: OscillatorValues::default(),
            rb: self,
        }
    }
}

/// Constrained RCC peripheral
///
/// Generated by calling `constrain` on the RCC peripheral.
///
/// ```ignore
/// let rcc = RCC::take().unwrap().constrain();
/// ```
pub struct Rcc {
    config: Config,
    pub(crate) osc: OscillatorValues,
    pub(crate) rb: RCC,
}

/// Core Clock Distribution and Reset (CCDR)
///
/// Generated when the RCC is frozen. The configuration of the system clock
/// `sys_ck`, AHB clock `hclk` and APB clocks `pclkN` are frozen. However the
/// distribution of some clocks may still be modified and peripherals
/// enabled / reset by passing this object to other implementations in this
/// stack.
pub struct Ccdr {
    /// A record of the frozen core clock frequencies
    pub clocks: CoreClocks,

    /// Peripheral reset / enable / kernel clock control
    pub peripheral: PeripheralREC,
}

/// Setter definition for pclk 1 - 2
macro_rules! pclk_setter {
    ($($name:ident: $pclk:ident,)+) => {
        $(
            /// Set the peripheral clock frequency for APB
            /// peripherals.
            #[must_use]
            pub fn $name(mut self, freq: Hertz) -> Self {
                self.config.$pclk = Some(freq.raw());
                self
            }
        )+
    };
}

impl Rcc {
    /// Uses HSE (external oscillator) instead of HSI (internal RC
    /// oscillator) as the clock source. `freeze` returns
    /// [`Error::Timeout`] if an external oscillator is not connected or it
    /// fails to start.
    #[must_use]
    pub fn use_hse(mut self, freq: Hertz) -> Self {
        self.config.hse = Some(freq.raw());
        self.osc.hse = freq;
        self
    }

    /// Use an external clock signal rather than a crystal oscillator,
    /// bypassing the XTAL driver.
    #[must_use]
    pub fn bypass_hse(mut self) -> Self {
        self.config.bypass_hse = true;
        self
    }

    /// Set SYSCLK frequency
    #[must_use]
    pub fn sys_ck(mut self, freq: Hertz) -> Self {
        self.config.sys_ck = Some(freq.raw());
        self
    }

    /// Set SYSCLK frequency - ALIAS
    #[must_use]
    pub fn sysclk(self, freq: Hertz) -> Self {
        self.sys_ck(freq)
    }

    /// Start the low speed external oscillator, a crystal of frequency
    /// `freq`
    #[must_use]
    pub fn lse(mut self, freq: Hertz) -> Self {
        self.config.lse = Some(freq.raw());
        self.osc.lse = freq;
        self
    }

    /// Set the peripheral clock frequency for AHB peripherals.
    #[must_use]
    pub fn hclk(mut self, freq: Hertz) -> Self {
        self.config.rcc_hclk = Some(freq.raw());
        self
    }

    pclk_setter! {
        pclk1: rcc_pclk1,
        pclk2: rcc_pclk2,
    }

    /// Set the frequencies of the external oscillators used when clock
    /// frequencies are read back
    #[must_use]
    pub fn oscillators(mut self, osc: OscillatorValues) -> Self {
        self.osc = osc;
        self
    }

    /// Frequencies of the external oscillators
    pub fn oscillator_values(&self) -> OscillatorValues {
        self.osc
    }

    /// A live HCLK reading for a [`Delay`](crate::delay) used by
    /// `freeze`
    ///
    /// Call it after the external oscillators are set.
    pub fn hclk_monitor(&self) -> HclkMonitor {
        HclkMonitor::new(&self.rb, self.osc)
    }

    /// Release the RCC peripheral
    pub fn free(self) -> RCC {
        self.rb
    }

    /// Returns the peripheral reset / enable controls without changing the
    /// clock tree
    ///
    /// # Safety
    ///
    /// The controls returned by an earlier `freeze` may still exist, and
    /// multiple accesses to the same bits would then exist.
    pub unsafe fn steal_peripheral_rec(&self) -> PeripheralREC {
        PeripheralREC::new_singleton(self.rb.block())
    }
}

/// Divider calculator for pclk 1 - 2
///
/// A clock is never faster than requested. Requests above the bus limit
/// are rejected, the default is HCLK limited to the bus maximum.
macro_rules! ppre_calculate {
    ($(($ppre:ident, $bits:ident): ($self: ident, $hclk: ident, $pclk: ident, $max: expr),)+) => {
        $(
            // Get intended rcc_pclkN frequency
            let $pclk: u32 = match $self.config.$pclk {
                Some(f) if f == 0 || f > $max => return Err(Error::InvalidConfig),
                Some(f) => f,
                None => $hclk.min($max),
            };

            // Calculate suitable divider
            let ($bits, $ppre) = match $hclk.div_ceil($pclk)
            {
                0..=1 => (ApbPrescaler::Div1, 1u8),
                2 => (ApbPrescaler::Div2, 2),
                3..=4 => (ApbPrescaler::Div4, 4),
                5..=8 => (ApbPrescaler::Div8, 8),
                _ => (ApbPrescaler::Div16, 16),
            };

            // Calculate real APBn clock
            let $pclk = $hclk / u32::from($ppre);
        )+
    };
}

/// PLL settings for the highest output frequency that is not above
/// `target`
///
/// Returns the input divider, the multiplication factor and the output
/// frequency. Among equal outputs the smallest input divider wins.
pub fn calc_pll(input: u32, target: u32) -> Option<(Prediv, PllMul, u32)> {
    let target = target.min(MAX_SYSCLK_FREQ_HZ);
    let mut best: Option<(u32, u32, u32)> = None;

    for div in 1..=16 {
        let pll_in = input / div;
        if !(PLL_IN_MIN..=PLL_IN_MAX).contains(&pll_in) {
            continue;
        }
        for mul in 2..=16 {
            let out = pll_in * mul;
            if out > target {
                break;
            }
            if out < PLL_OUT_MIN {
                continue;
            }
            if best.map_or(true, |(_, _, f)| out > f) {
                best = Some((div, mul, out));
            }
        }
    }

    let (div, mul, out) = best?;
    Some((Prediv::from_divisor(div)?, PllMul::from_factor(mul)?, out))
}

/// Flash wait states for a SYSCLK frequency
pub const fn flash_latency(sys_ck: u32) -> u32 {
    match sys_ck {
        0..=24_000_000 => 0,
        24_000_001..=48_000_000 => 1,
        _ => 2,
    }
}

impl Rcc {
    /// Setup sys_ck
    /// Returns sys_ck frequency, and the PLL settings when the PLL
    /// generates it
    fn sys_ck_setup(&self) -> Result<(Hertz, Option<PllConfig>), Error> {
        if self.config.hse.is_some_and(|f| f == 0 || f > MAX_HSE_FREQ_HZ) {
            return Err(Error::InvalidConfig);
        }

        // Compare available with wanted clocks
        let srcclk = self.config.hse.unwrap_or(HSI.raw()); // Available clocks
        let sys_ck = self.config.sys_ck.unwrap_or(srcclk);

        if sys_ck > MAX_SYSCLK_FREQ_HZ {
            return Err(Error::InvalidConfig);
        }

        if sys_ck != srcclk {
            // The requested system clock is not the immediately available
            // HSE/HSI clock. Therefore we must use the PLL
            let source = if self.config.hse.is_some() {
                PllSource::HsePrediv
            } else {
                PllSource::HsiPrediv
            };
            let (prediv, mul, pll_ck) =
                calc_pll(srcclk, sys_ck).ok_or(Error::InvalidConfig)?;

            Ok((
                Hertz::from_raw(pll_ck),
                Some(PllConfig {
                    source,
                    prediv,
                    mul,
                }),
            ))
        } else {
            // sys_ck is derived directly from a source clock (HSE/HSI)
            Ok((Hertz::from_raw(sys_ck), None))
        }
    }

    /// Freeze the core clocks, returning a Core Clocks Distribution
    /// and Reset (CCDR) structure. The actual frequency of the clocks
    /// configured is returned in the `clocks` member of the CCDR
    /// structure.
    ///
    /// Note that `freeze` will never result in a clock _faster_ than
    /// that specified.
    ///
    /// `pwr` is required to start the LSE, `flash` to set the wait states
    /// and `delay` to time out oscillators that fail to start.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] if a clock specification cannot be
    /// achieved within the hardware specification, and the errors of
    /// [`osc_config`](Rcc::osc_config) and
    /// [`clock_config`](Rcc::clock_config) while the hardware is
    /// programmed.
    pub fn freeze<D: DelayNs>(
        mut self,
        pwr: &PWR,
        flash: &FLASH,
        delay: &mut D,
    ) -> Result<Ccdr, Error> {
        // We do not reset RCC here. A PLL or HSE that drives SYSCLK is moved
        // off before it is reconfigured.

        // sys_ck from PLL if needed, else HSE or HSI
        let (sys_ck, pll) = self.sys_ck_setup()?;
        let sys_ck = sys_ck.raw();

        // Get AHB clock or sensible default
        let rcc_hclk = match self.config.rcc_hclk {
            Some(0) => return Err(Error::InvalidConfig),
            Some(f) => f,
            None => sys_ck,
        };

        // Estimate divisor
        let (hpre_bits, hpre_div) = match sys_ck.div_ceil(rcc_hclk) {
            0..=1 => (AhbPrescaler::Div1, 1),
            2 => (AhbPrescaler::Div2, 2),
            3..=4 => (AhbPrescaler::Div4, 4),
            5..=8 => (AhbPrescaler::Div8, 8),
            9..=16 => (AhbPrescaler::Div16, 16),
            17..=64 => (AhbPrescaler::Div64, 64),
            65..=128 => (AhbPrescaler::Div128, 128),
            129..=256 => (AhbPrescaler::Div256, 256),
            _ => (AhbPrescaler::Div512, 512),
        };

        // Calculate real AHB clock
        let rcc_hclk = sys_ck / hpre_div;

        // Calculate ppreN dividers and real rcc_pclkN frequencies
        ppre_calculate! {
            (ppre1, ppre1_bits): (self, rcc_hclk, rcc_pclk1, MAX_PCLK1_FREQ_HZ),
            (ppre2, ppre2_bits): (self, rcc_hclk, rcc_pclk2, MAX_SYSCLK_FREQ_HZ),
        }

        let latency = flash_latency(sys_ck);

        // Start switching clocks here! ----------------------------------------

        let hse = self.config.hse.map(|_| {
            if self.config.bypass_hse {
                ExtOscState::Bypass
            } else {
                ExtOscState::On
            }
        });
        let hse_changes = hse.is_some_and(|state| state != self.rb.hse_state());

        if (pll.is_some() && self.rb.sys_clk_source_status() == SysClkSource::Pll)
            || (hse_changes && self.rb.hse_in_use())
        {
            // Run from HSI while the PLL or HSE is reconfigured
            let trim = self.rb.get_hsi_calib_trimming() as u8;
            self.osc_config(
                &OscConfig {
                    hsi: Some(HsiState::On { trim }),
                    ..Default::default()
                },
                pwr,
                delay,
            )?;
            self.clock_config(
                &ClkConfig {
                    sysclk: Some(SysClkSource::Hsi),
                    ..Default::default()
                },
                flash,
                flash.latency(),
                delay,
            )?;
        }

        self.osc_config(
            &OscConfig {
                hse,
                lse: self.config.lse.map(|_| ExtOscState::On),
                pll: pll.map(PllState::On),
                ..Default::default()
            },
            pwr,
            delay,
        )?;

        // Select system clock source
        let sysclk = match (pll.is_some(), hse.is_some()) {
            (true, _) => SysClkSource::Pll,
            (false, true) => SysClkSource::Hse,
            _ => SysClkSource::Hsi,
        };
        let clocks = self.clock_config(
            &ClkConfig {
                sysclk: Some(sysclk),
                ahb: Some(hpre_bits),
                apb1: Some(ppre1_bits),
                apb2: Some(ppre2_bits),
            },
            flash,
            latency,
            delay,
        )?;

        debug_assert_eq!(clocks.hclk().raw(), rcc_hclk);
        debug_assert_eq!(clocks.pclk1().raw(), rcc_pclk1);
        debug_assert_eq!(clocks.pclk2().raw(), rcc_pclk2);
        debug_assert_eq!((clocks.ppre1(), clocks.ppre2()), (ppre1, ppre2));

        // This section prints the final register configuration for the main RCC registers:
        // - System Clock and PLL Source MUX
        // - PLL configuration
        // - System Prescalers
        // Does not include peripheral/MCO/RTC clock MUXes
        #[cfg(feature = "log")]
        {
            let rcc = &*self.rb;
            debug!("--- RCC register settings");

            debug!(
                "CFGR register: SWS (System Clock Mux)={:?}",
                rcc.sys_clk_source_status()
            );
            debug!(
                "CFGR register: HPRE={:?} PPRE1={:?} PPRE2={:?}",
                rcc.get_ahb_prescaler(),
                rcc.get_apb1_prescaler(),
                rcc.get_apb2_prescaler(),
            );
            debug!(
                "CFGR register: PLLSRC={:?} PLLMUL={:?} CFGR2 register: PREDIV={:?}",
                rcc.get_pll_main_source(),
                rcc.get_pll_multiplicator(),
                rcc.get_pll_prediv(),
            );
            debug!("FLASH ACR register: LATENCY={}", flash.latency());
        }

        // Return frozen clock configuration
        Ok(Ccdr {
            clocks,
            peripheral: unsafe {
                // unsafe: we consume self which was a singleton, hence
                // we can safely create a singleton here
                PeripheralREC::new_singleton(self.rb.block())
            },
        })
    }
}
