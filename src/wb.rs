//! STM32WB Reset and Clock Control
//!
//! This module configures the RCC unit of the STM32WB55 to provide set
//! frequencies for the system clock `sys_ck`, the AHB clocks of both CPUs
//! `hclk` and `hclk2`, the shared AHB4 clock `hclk4` and the Peripheral
//! (APB) Buses `pclk1` and `pclk2`.
//!
//! See Figure 16 "Clock tree" in Reference Manual RM0434.
//!
//! HSI16 is 16 MHz. HSE32 is a 32 MHz crystal.
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
//! * `use_hse()` implies `sys_ck(32.MHz())`
//!
//! * `sys_ck(b)` implies the PLL unless `b` is the frequency of the
//!   oscillator in use
//!
//! * `hclk(c)` and `hclk4(d)` default to `sys_ck`, `hclk2(e)` to `sys_ck`
//!   limited to 32 MHz, and `pclk1` / `pclk2` to `hclk`
//!
//! If a configuration cannot be achieved by hardware, `freeze` returns
//! [`Error::InvalidConfig`].
//!
//! ```ignore
//! let rcc = RCC::take().unwrap().constrain();
//! let ccdr = rcc
//!     .use_hse()
//!     .sys_ck(64.MHz())
//!     .hclk2(32.MHz())
//!     .freeze(&pwr, &flash, &mut delay)?;
//!
//! assert_eq!(ccdr.clocks.hclk4().raw(), 64_000_000);
//!
//! // Enable the clock to a peripheral and reset it
//! ccdr.peripheral.LPUART1.enable().reset();
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
    ClkConfig, ExtOscState, MsiState, OscConfig, OscState, PeriphClk,
    PeriphClkConfig, PllConfig, PllSai1Config, PllSai1State, PllState,
    ResetReason, TrimmedOscState,
};
pub use rec::PeripheralREC;
pub use regs::{FLASH, PWR, RCC};

use clocks::HSI;
use ll::{AhbPrescaler, ApbPrescaler, PllDiv, PllM, PllP, PllSource, SysClkSource};

/// Highest SYSCLK, HCLK1 and HCLK4 frequency
pub const MAX_SYSCLK_FREQ_HZ: u32 = 64_000_000;
/// Highest CPU2 frequency (HCLK2)
pub const MAX_HCLK2_FREQ_HZ: u32 = 32_000_000;
/// HSE32 crystal frequency
pub const HSE_FREQ_HZ: u32 = 32_000_000;

const VCO_IN_MIN: u32 = 2_660_000;
const VCO_IN_MAX: u32 = 16_000_000;
const VCO_OUT_MIN: u32 = 96_000_000;
const VCO_OUT_MAX: u32 = 344_000_000;
const CLK48_FREQ_HZ: u32 = 48_000_000;

/// AHB prescalers in increasing order of division
const AHB_PRESCALERS: [AhbPrescaler; 14] = [
    AhbPrescaler::Div1,
    AhbPrescaler::Div2,
    AhbPrescaler::Div3,
    AhbPrescaler::Div4,
    AhbPrescaler::Div5,
    AhbPrescaler::Div6,
    AhbPrescaler::Div8,
    AhbPrescaler::Div10,
    AhbPrescaler::Div16,
    AhbPrescaler::Div32,
    AhbPrescaler::Div64,
    AhbPrescaler::Div128,
    AhbPrescaler::Div256,
    AhbPrescaler::Div512,
];

/// Configuration of the core clocks
#[derive(Copy, Clone, Debug, Default)]
pub struct Config {
    hse: bool,
    lse: Option<u32>,
    sys_ck: Option<u32>,
    rcc_hclk: Option<u32>,
    rcc_hclk2: Option<u32>,
    rcc_hclk4: Option<u32>,
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
/// `sys_ck`, AHB clocks `hclkN` and APB clocks `pclkN` are frozen. However
/// the distribution of some clocks may still be modified and peripherals
/// enabled / reset by passing this object to other implementations in this
/// stack.
pub struct Ccdr {
    /// A record of the frozen core clock frequencies
    pub clocks: CoreClocks,

    /// Peripheral reset / enable / kernel clock control
    pub peripheral: PeripheralREC,
}

/// Setter definition for hclk 2, hclk 4 and pclk 1 - 2
macro_rules! bus_setter {
    ($($name:ident: $field:ident, $doc:literal,)+) => {
        $(
            #[doc = $doc]
            #[must_use]
            pub fn $name(mut self, freq: Hertz) -> Self {
                self.config.$field = Some(freq.raw());
                self
            }
        )+
    };
}

impl Rcc {
    /// Uses the HSE32 crystal instead of HSI16 as the clock source.
    /// `freeze` returns [`Error::Timeout`] if the crystal fails to start.
    #[must_use]
    pub fn use_hse(mut self) -> Self {
        self.config.hse = true;
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

    /// Set the CPU1 AHB clock frequency (HCLK1).
    #[must_use]
    pub fn hclk(mut self, freq: Hertz) -> Self {
        self.config.rcc_hclk = Some(freq.raw());
        self
    }

    bus_setter! {
        hclk2: rcc_hclk2, "Set the CPU2 AHB clock frequency (HCLK2).",
        hclk4: rcc_hclk4, "Set the shared AHB4 clock frequency (HCLK4), which also clocks the flash.",
        pclk1: rcc_pclk1, "Set the peripheral clock frequency for APB1 peripherals.",
        pclk2: rcc_pclk2, "Set the peripheral clock frequency for APB2 peripherals.",
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

    /// A live HCLK1 reading for a [`Delay`](crate::delay) used by
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
/// are rejected, the default is HCLK1.
macro_rules! ppre_calculate {
    ($(($ppre:ident, $bits:ident): ($self: ident, $hclk: ident, $pclk: ident),)+) => {
        $(
            // Get intended rcc_pclkN frequency
            let $pclk: u32 = match $self.config.$pclk {
                Some(f) if f == 0 || f > MAX_SYSCLK_FREQ_HZ => return Err(Error::InvalidConfig),
                Some(f) => f,
                None => $hclk,
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

/// The smallest AHB prescaler that brings `sys_ck` to at most `target`
///
/// Returns the prescaler and the resulting frequency.
pub fn calc_ahb_prescaler(sys_ck: u32, target: u32) -> Option<(AhbPrescaler, u32)> {
    if target == 0 {
        return None;
    }
    let div = sys_ck.div_ceil(target);
    let hpre = AHB_PRESCALERS
        .iter()
        .copied()
        .find(|p| p.divisor() >= div)
        .unwrap_or(AhbPrescaler::Div512);
    Some((hpre, sys_ck / hpre.divisor()))
}

/// Main PLL settings for the highest R output frequency that is not above
/// `target`
///
/// Returns the input divider, the multiplication factor, the R divider and
/// the output frequency. Among equal outputs the smallest input divider
/// and multiplication factor win.
pub fn calc_pll(input: u32, target: u32) -> Option<(PllM, u32, PllDiv, u32)> {
    let target = target.min(MAX_SYSCLK_FREQ_HZ);
    let mut best: Option<(u32, u32, u32, u32)> = None;

    for m in 1..=8 {
        let vco_in = input / m;
        if !(VCO_IN_MIN..=VCO_IN_MAX).contains(&vco_in) {
            continue;
        }
        for n in 6..=127 {
            let vco = vco_in * n;
            if vco < VCO_OUT_MIN {
                continue;
            }
            if vco > VCO_OUT_MAX {
                break;
            }
            for r in 2..=8 {
                let out = vco / r;
                if out > target {
                    continue;
                }
                if best.map_or(true, |(.., f)| out > f) {
                    best = Some((m, n, r, out));
                }
                break;
            }
        }
    }

    let (m, n, r, out) = best?;
    Some((PllM::from_divisor(m)?, n, PllDiv::from_divisor(r)?, out))
}

/// Flash wait states for a HCLK4 frequency
pub const fn flash_latency(hclk4: u32) -> u32 {
    match hclk4 {
        0..=18_000_000 => 0,
        18_000_001..=36_000_000 => 1,
        36_000_001..=54_000_000 => 2,
        _ => 3,
    }
}

impl Rcc {
    /// Setup sys_ck
    /// Returns sys_ck frequency, and the PLL settings when the PLL
    /// generates it
    fn sys_ck_setup(&self) -> Result<(Hertz, Option<PllConfig>), Error> {
        // Compare available with wanted clocks
        let (srcclk, source) = if self.config.hse {
            (HSE_FREQ_HZ, PllSource::Hse)
        } else {
            (HSI.raw(), PllSource::Hsi)
        };
        let sys_ck = self.config.sys_ck.unwrap_or(srcclk);

        if sys_ck == 0 || sys_ck > MAX_SYSCLK_FREQ_HZ {
            return Err(Error::InvalidConfig);
        }

        if sys_ck != srcclk {
            // The requested system clock is not the immediately available
            // HSE/HSI clock. Therefore we must use the PLL
            let (m, n, r, pll_ck) =
                calc_pll(srcclk, sys_ck).ok_or(Error::InvalidConfig)?;
            let vco = (srcclk / m.divisor()) * n;
            // Q as close to 48 MHz as possible from below
            let q = PllDiv::from_divisor(vco.div_ceil(CLK48_FREQ_HZ).clamp(2, 8))
                .ok_or(Error::InvalidConfig)?;

            Ok((
                Hertz::from_raw(pll_ck),
                Some(PllConfig {
                    source,
                    m,
                    n: n as u8,
                    p: PllP::Div2,
                    q,
                    r,
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

        // AHB clocks of CPU1, CPU2 and AHB4
        let (hpre_bits, rcc_hclk) =
            calc_ahb_prescaler(sys_ck, self.config.rcc_hclk.unwrap_or(sys_ck))
                .ok_or(Error::InvalidConfig)?;
        let hclk2 = match self.config.rcc_hclk2 {
            Some(f) if f > MAX_HCLK2_FREQ_HZ => return Err(Error::InvalidConfig),
            Some(f) => f,
            None => sys_ck.min(MAX_HCLK2_FREQ_HZ),
        };
        let (c2hpre_bits, rcc_hclk2) =
            calc_ahb_prescaler(sys_ck, hclk2).ok_or(Error::InvalidConfig)?;
        let (shdhpre_bits, rcc_hclk4) =
            calc_ahb_prescaler(sys_ck, self.config.rcc_hclk4.unwrap_or(sys_ck))
                .ok_or(Error::InvalidConfig)?;

        // Calculate ppreN dividers and real rcc_pclkN frequencies
        ppre_calculate! {
            (ppre1, ppre1_bits): (self, rcc_hclk, rcc_pclk1),
            (ppre2, ppre2_bits): (self, rcc_hclk, rcc_pclk2),
        }

        // Start switching clocks here! ----------------------------------------

        let hse = self.config.hse.then_some(ExtOscState::On);
        // HSE runs undivided from here on
        let hse_changes = hse.is_some_and(|state| {
            state != self.rb.hse_state() || self.rb.hse_div2_is_enabled()
        });

        if (pll.is_some() && self.rb.sys_clk_source_status() == SysClkSource::Pll)
            || (hse_changes
                && self.rb.osc_in_use(SysClkSource::Hse, PllSource::Hse))
        {
            // Run from HSI16 while the PLL or HSE is reconfigured
            let trim = self.rb.get_hsi_calib_trimming() as u8;
            self.osc_config(
                &OscConfig {
                    hsi: Some(TrimmedOscState::On { trim }),
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
                delay,
            )?;
        }

        let hsi = (!self.config.hse).then(|| TrimmedOscState::On {
            trim: self.rb.get_hsi_calib_trimming() as u8,
        });
        self.osc_config(
            &OscConfig {
                hsi,
                hse,
                lse: self.config.lse.map(|_| ExtOscState::On),
                pll: pll.map(PllState::On),
                ..Default::default()
            },
            pwr,
            delay,
        )?;

        // Select system clock source
        let sysclk = match (pll.is_some(), self.config.hse) {
            (true, _) => SysClkSource::Pll,
            (false, true) => SysClkSource::Hse,
            _ => SysClkSource::Hsi,
        };
        let clocks = self.clock_config(
            &ClkConfig {
                sysclk: Some(sysclk),
                ahb: Some(hpre_bits),
                c2_ahb: Some(c2hpre_bits),
                ahb4: Some(shdhpre_bits),
                apb1: Some(ppre1_bits),
                apb2: Some(ppre2_bits),
            },
            flash,
            delay,
        )?;

        debug_assert_eq!(clocks.hclk1().raw(), rcc_hclk);
        debug_assert_eq!(clocks.hclk2().raw(), rcc_hclk2);
        debug_assert_eq!(clocks.hclk4().raw(), rcc_hclk4);
        debug_assert_eq!(clocks.pclk1().raw(), rcc_pclk1);
        debug_assert_eq!(clocks.pclk2().raw(), rcc_pclk2);
        debug_assert_eq!((clocks.ppre1(), clocks.ppre2()), (ppre1, ppre2));

        // This section prints the final register configuration for the main RCC registers:
        // - System Clock and PLL Source MUX
        // - PLL configuration
        // - System Prescalers of both CPUs and AHB4
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
                "EXTCFGR register: C2HPRE={:?} SHDHPRE={:?}",
                rcc.get_c2_ahb_prescaler(),
                rcc.get_ahb4_prescaler(),
            );
            debug!(
                "PLLCFGR register: PLLSRC={:?} PLLM={:?} PLLN={} PLLR={:?}",
                rcc.get_pll_main_source(),
                rcc.get_pll_divider(),
                rcc.get_pll_n(),
                rcc.get_pll_r(),
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
