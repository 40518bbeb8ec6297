//! STM32WB clock frequencies derived from register state
//!
//! HSI16 is 16 MHz, HSI48 is 48 MHz and both LSI oscillators run at
//! 32 kHz. MSI follows the selected range. The HSE32 and LSE crystal
//! frequencies are given in [`OscillatorValues`].
//!
//! ```ignore
//! let osc = OscillatorValues::default();
//!
//! let clocks = rcc.system_clocks_freq(&osc);
//! let clk48 = rcc.clk48_clk_freq(&osc);
//! ```

use super::ll::{
    AdcClkSel, AhbPrescaler, ApbPrescaler, Clk48ClkSel, I2cClkSel, LptimClkSel,
    MsiRange, PllSource, RfClkSource, RfWakeupClkSource, RngClkSel, RtcClkSource,
    SaiClkSel, SmpsClkStatus, SysClkSource, UsartClkSel,
};
use super::regs::{RegisterBlock, RCC};
use crate::delay::HclkSource;
use crate::rcc::ClockFreq;
use crate::time::Hertz;

/// HSI16 oscillator frequency
pub const HSI: Hertz = Hertz::from_raw(16_000_000);
/// LSI1 and LSI2 oscillator frequency
pub const LSI: Hertz = Hertz::from_raw(32_000);
/// HSI48 oscillator frequency
pub const HSI48: Hertz = Hertz::from_raw(48_000_000);

/// MSI frequency for each MSIRANGE code
pub const MSI_RANGE_TABLE: [u32; 12] = [
    100_000, 200_000, 400_000, 800_000, 1_000_000, 2_000_000, 4_000_000,
    8_000_000, 16_000_000, 24_000_000, 32_000_000, 48_000_000,
];
/// Division factor for each HPRE, C2HPRE and SHDHPRE code
pub const AHB_PRESC_DIV: [u16; 16] = [
    1, 3, 5, 1, 1, 6, 10, 32, 2, 4, 8, 16, 64, 128, 256, 512,
];
/// Right shift applied to HCLK1 for each PPRE code
pub const APB_PRESC_SHIFT: [u8; 8] = [0, 0, 0, 0, 1, 2, 3, 4];
/// SMPS clock divider, indexed by SMPSDIV then by source: MSI at 16, 24, 32
/// and 48 MHz, HSI16 and HSE32
pub const SMPS_PRESC_TABLE: [[u8; 6]; 4] = [
    [1, 3, 2, 2, 1, 2],
    [2, 6, 4, 3, 2, 4],
    [4, 12, 8, 6, 4, 8],
    [8, 24, 16, 12, 8, 16],
];

/// Frequencies of the external oscillators
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OscillatorValues {
    /// HSE32 crystal or bypass clock frequency
    pub hse: Hertz,
    /// LSE crystal or bypass clock frequency
    pub lse: Hertz,
}

impl Default for OscillatorValues {
    fn default() -> Self {
        OscillatorValues {
            hse: Hertz::from_raw(32_000_000),
            lse: Hertz::from_raw(32_768),
        }
    }
}

impl OscillatorValues {
    /// Set the HSE32 frequency
    #[must_use]
    pub fn hse(mut self, freq: Hertz) -> Self {
        self.hse = freq;
        self
    }

    /// Set the LSE frequency
    #[must_use]
    pub fn lse(mut self, freq: Hertz) -> Self {
        self.lse = freq;
        self
    }
}

/// USART and LPUART instances
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Usart {
    /// USART1, on APB2
    Usart1,
    /// LPUART1, on APB1
    Lpuart1,
}

/// I2C instances
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2c {
    /// I2C1
    I2c1,
    /// I2C3
    I2c3,
}

/// Low-power timer instances
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Lptim {
    /// LPTIM1
    Lptim1,
    /// LPTIM2
    Lptim2,
}

/// HCLK for a SYSCLK frequency and AHB prescaler
#[inline]
pub const fn calc_hclk_freq(sysclk: u32, hpre: AhbPrescaler) -> u32 {
    sysclk / AHB_PRESC_DIV[hpre.bits() as usize] as u32
}

/// PCLK for a HCLK1 frequency and APB prescaler
#[inline]
pub const fn calc_pclk_freq(hclk: u32, ppre: ApbPrescaler) -> u32 {
    hclk >> APB_PRESC_SHIFT[ppre.bits() as usize]
}

/// PLL output for an input frequency, input divider `m`, multiplication
/// factor `n` and output divider `div`
///
/// The programmed VCO frequency can exceed `u32::MAX` Hz. Output dividers
/// are at least 2, so the result fits.
#[inline]
pub const fn calc_pll_freq(input: u32, m: u32, n: u32, div: u32) -> u32 {
    ((input / m) as u64 * n as u64 / div as u64) as u32
}

/// HCLK1 read back from the RCC registers on every call
///
/// Lets a [`Delay`](crate::delay) keep time while the clock tree is
/// reconfigured.
#[derive(Copy, Clone)]
pub struct HclkMonitor {
    rb: &'static RegisterBlock,
    osc: OscillatorValues,
}

impl HclkMonitor {
    /// Monitor the clock tree of `rcc`, with external oscillators at `osc`
    pub fn new(rcc: &RCC, osc: OscillatorValues) -> Self {
        HclkMonitor {
            rb: rcc.block(),
            osc,
        }
    }
}

impl HclkSource for HclkMonitor {
    fn hclk(&self) -> Hertz {
        self.rb.hclk1_freq(&self.osc)
    }
}

/// Frozen core clock frequencies
///
/// The existence of this value indicates that the core clock
/// configuration can no longer be changed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoreClocks {
    pub(crate) sysclk: Hertz,
    pub(crate) hclk1: Hertz,
    pub(crate) hclk2: Hertz,
    pub(crate) hclk4: Hertz,
    pub(crate) hclk5: Hertz,
    pub(crate) pclk1: Hertz,
    pub(crate) pclk2: Hertz,
    pub(crate) ppre1: u8,
    pub(crate) ppre2: u8,
    pub(crate) msi_ck: Option<Hertz>,
    pub(crate) hse_ck: Option<Hertz>,
    pub(crate) hsi_ck: Option<Hertz>,
    pub(crate) hsi48_ck: Option<Hertz>,
    pub(crate) lse_ck: Option<Hertz>,
    pub(crate) lsi_ck: Option<Hertz>,
    pub(crate) pll_ck: Option<Hertz>,
}

impl CoreClocks {
    ck_getter! {
        sysclk: "the system clock (SYSCLK)",
        hclk1: "the CPU1 AHB bus and core (HCLK1)",
        hclk2: "the CPU2 AHB bus and core (HCLK2)",
        hclk4: "the shared AHB bus, flash and SRAM2 (HCLK4)",
        hclk5: "the radio system (HCLK5)",
        pclk1: "the APB1 bus",
        pclk2: "the APB2 bus",
    }

    optional_ck_getter! {
        msi_ck: "the MSI oscillator",
        hse_ck: "the HSE32 oscillator, after HSEPRE",
        hsi_ck: "the HSI16 oscillator",
        hsi48_ck: "the HSI48 oscillator",
        lse_ck: "the LSE oscillator",
        lsi_ck: "the LSI1 or LSI2 oscillator",
        pll_ck: "the main PLL R output",
    }

    /// Returns the prescaler of APB1
    pub fn ppre1(&self) -> u8 {
        self.ppre1
    }

    /// Returns the prescaler of APB2
    pub fn ppre2(&self) -> u8 {
        self.ppre2
    }

    /// Returns the kernel clock of timers on APB1 selecting PCLK
    pub fn timx_ker_ck(&self) -> Hertz {
        tim_pclk(self.pclk1, self.ppre1)
    }

    /// Returns the kernel clock of timers on APB2 selecting PCLK
    pub fn timy_ker_ck(&self) -> Hertz {
        tim_pclk(self.pclk2, self.ppre2)
    }
}

/// Timers run at twice the APB clock unless the APB prescaler is 1
fn tim_pclk(pclk: Hertz, ppre: u8) -> Hertz {
    if ppre == 1 {
        pclk
    } else {
        pclk * 2
    }
}

fn apb_divisor(ppre: ApbPrescaler) -> u8 {
    1 << APB_PRESC_SHIFT[ppre.bits() as usize]
}

fn if_ready(ready: bool, f: Hertz) -> ClockFreq {
    if ready {
        ClockFreq::Running(f)
    } else {
        ClockFreq::NoClock
    }
}

impl RegisterBlock {
    /// MSI frequency for the selected range
    pub fn msi_freq(&self) -> Hertz {
        Hertz::from_raw(MSI_RANGE_TABLE[self.get_msi_range().bits() as usize])
    }

    /// HSE32 frequency after the HSEPRE prescaler
    pub fn hse_sys_freq(&self, osc: &OscillatorValues) -> Hertz {
        if self.hse_div2_is_enabled() {
            osc.hse / 2
        } else {
            osc.hse
        }
    }

    fn lsi_is_ready(&self) -> bool {
        self.lsi1_is_ready() || self.lsi2_is_ready()
    }

    /// SYSCLK frequency from the system clock switch status
    pub fn sysclk_freq(&self, osc: &OscillatorValues) -> Hertz {
        match self.sys_clk_source_status() {
            SysClkSource::Msi => self.msi_freq(),
            SysClkSource::Hsi => HSI,
            SysClkSource::Hse => self.hse_sys_freq(osc),
            SysClkSource::Pll => self.pll_freq_domain_sys(osc),
        }
    }

    /// Frequency entering the PLL input divider, shared by both PLLs
    ///
    /// Zero when no entry clock is selected.
    pub fn pll_input_freq(&self, osc: &OscillatorValues) -> u32 {
        match self.get_pll_main_source() {
            PllSource::None => 0,
            PllSource::Msi => self.msi_freq().raw(),
            PllSource::Hsi => HSI.raw(),
            PllSource::Hse => self.hse_sys_freq(osc).raw(),
        }
    }

    fn pll_freq(&self, osc: &OscillatorValues, n: u32, div: u32) -> Hertz {
        let m = self.get_pll_divider().divisor();
        Hertz::from_raw(calc_pll_freq(self.pll_input_freq(osc), m, n, div))
    }

    /// Main PLL R output frequency
    ///
    /// This is the frequency the PLL would output with its current
    /// configuration, whether or not it is locked.
    pub fn pll_freq_domain_sys(&self, osc: &OscillatorValues) -> Hertz {
        self.pll_freq(osc, self.get_pll_n(), self.get_pll_r().divisor())
    }

    /// Main PLL P output frequency, used by SAI1 and the ADC
    pub fn pll_freq_domain_sai(&self, osc: &OscillatorValues) -> Hertz {
        self.pll_freq(osc, self.get_pll_n(), self.get_pll_p().divisor())
    }

    /// Main PLL P output frequency seen by the ADC
    pub fn pll_freq_domain_adc(&self, osc: &OscillatorValues) -> Hertz {
        self.pll_freq_domain_sai(osc)
    }

    /// Main PLL Q output frequency, used for CLK48
    pub fn pll_freq_domain_48m(&self, osc: &OscillatorValues) -> Hertz {
        self.pll_freq(osc, self.get_pll_n(), self.get_pll_q().divisor())
    }

    /// PLLSAI1 P output frequency, used by SAI1
    pub fn pllsai1_freq_domain_sai(&self, osc: &OscillatorValues) -> Hertz {
        self.pll_freq(osc, self.get_pllsai1_n(), self.get_pllsai1_p().divisor())
    }

    /// PLLSAI1 Q output frequency, used for CLK48
    pub fn pllsai1_freq_domain_48m(&self, osc: &OscillatorValues) -> Hertz {
        self.pll_freq(osc, self.get_pllsai1_n(), self.get_pllsai1_q().divisor())
    }

    /// PLLSAI1 R output frequency, used by the ADC
    pub fn pllsai1_freq_domain_adc(&self, osc: &OscillatorValues) -> Hertz {
        self.pll_freq(osc, self.get_pllsai1_n(), self.get_pllsai1_r().divisor())
    }

    /// HCLK1 frequency (CPU1, AHB1, AHB2, AHB3)
    pub fn hclk1_freq(&self, osc: &OscillatorValues) -> Hertz {
        Hertz::from_raw(calc_hclk_freq(
            self.sysclk_freq(osc).raw(),
            self.get_ahb_prescaler(),
        ))
    }

    /// HCLK2 frequency (CPU2)
    pub fn hclk2_freq(&self, osc: &OscillatorValues) -> Hertz {
        Hertz::from_raw(calc_hclk_freq(
            self.sysclk_freq(osc).raw(),
            self.get_c2_ahb_prescaler(),
        ))
    }

    /// HCLK4 frequency (AHB4, flash, SRAM2)
    pub fn hclk4_freq(&self, osc: &OscillatorValues) -> Hertz {
        Hertz::from_raw(calc_hclk_freq(
            self.sysclk_freq(osc).raw(),
            self.get_ahb4_prescaler(),
        ))
    }

    /// HCLK5 frequency (radio system)
    pub fn hclk5_freq(&self, osc: &OscillatorValues) -> Hertz {
        match self.get_rf_clk_source() {
            RfClkSource::Hsi => HSI,
            RfClkSource::HseDiv2 => osc.hse / 2,
        }
    }

    /// PCLK1 frequency
    pub fn pclk1_freq(&self, osc: &OscillatorValues) -> Hertz {
        Hertz::from_raw(calc_pclk_freq(
            self.hclk1_freq(osc).raw(),
            self.get_apb1_prescaler(),
        ))
    }

    /// PCLK2 frequency
    pub fn pclk2_freq(&self, osc: &OscillatorValues) -> Hertz {
        Hertz::from_raw(calc_pclk_freq(
            self.hclk1_freq(osc).raw(),
            self.get_apb2_prescaler(),
        ))
    }

    /// Bus clock frequencies together with the oscillators that are ready
    pub fn system_clocks_freq(&self, osc: &OscillatorValues) -> CoreClocks {
        let sysclk = self.sysclk_freq(osc);
        let hclk1 = calc_hclk_freq(sysclk.raw(), self.get_ahb_prescaler());
        let ppre1 = self.get_apb1_prescaler();
        let ppre2 = self.get_apb2_prescaler();

        CoreClocks {
            sysclk,
            hclk1: Hertz::from_raw(hclk1),
            hclk2: Hertz::from_raw(calc_hclk_freq(
                sysclk.raw(),
                self.get_c2_ahb_prescaler(),
            )),
            hclk4: Hertz::from_raw(calc_hclk_freq(
                sysclk.raw(),
                self.get_ahb4_prescaler(),
            )),
            hclk5: self.hclk5_freq(osc),
            pclk1: Hertz::from_raw(calc_pclk_freq(hclk1, ppre1)),
            pclk2: Hertz::from_raw(calc_pclk_freq(hclk1, ppre2)),
            ppre1: apb_divisor(ppre1),
            ppre2: apb_divisor(ppre2),
            msi_ck: self.msi_is_ready().then(|| self.msi_freq()),
            hse_ck: self.hse_is_ready().then(|| self.hse_sys_freq(osc)),
            hsi_ck: self.hsi_is_ready().then_some(HSI),
            hsi48_ck: self.hsi48_is_ready().then_some(HSI48),
            lse_ck: self.lse_is_ready().then_some(osc.lse),
            lsi_ck: self.lsi_is_ready().then_some(LSI),
            pll_ck: self
                .pll_is_ready()
                .then(|| self.pll_freq_domain_sys(osc)),
        }
    }

    /// SMPS step down converter clock
    ///
    /// [`ClockFreq::NotApplicable`] when MSI runs below 16 MHz, which the
    /// converter cannot use.
    pub fn smps_clk_freq(&self, osc: &OscillatorValues) -> ClockFreq {
        let div = &SMPS_PRESC_TABLE[self.get_smps_prescaler().bits() as usize];
        match self.smps_clk_source_status() {
            SmpsClkStatus::Hsi => ClockFreq::Running(HSI / div[4] as u32),
            SmpsClkStatus::Hse => ClockFreq::Running(osc.hse / div[5] as u32),
            SmpsClkStatus::Msi => {
                let range = self.get_msi_range();
                if range.bits() < MsiRange::Range16M.bits() {
                    return ClockFreq::NotApplicable;
                }
                let col = (range.bits() - MsiRange::Range16M.bits()) as usize;
                ClockFreq::Running(self.msi_freq() / div[col] as u32)
            }
            SmpsClkStatus::NoClock => ClockFreq::NoClock,
        }
    }

    /// USART1 / LPUART1 kernel clock
    pub fn usart_clk_freq(&self, osc: &OscillatorValues, usart: Usart) -> ClockFreq {
        let (sel, pclk) = match usart {
            Usart::Usart1 => (self.get_usart1_clk_source(), self.pclk2_freq(osc)),
            Usart::Lpuart1 => (self.get_lpuart1_clk_source(), self.pclk1_freq(osc)),
        };
        match sel {
            UsartClkSel::Pclk => ClockFreq::Running(pclk),
            UsartClkSel::Sysclk => ClockFreq::Running(self.sysclk_freq(osc)),
            UsartClkSel::Hsi => if_ready(self.hsi_is_ready(), HSI),
            UsartClkSel::Lse => if_ready(self.lse_is_ready(), osc.lse),
        }
    }

    /// I2C kernel clock
    pub fn i2c_clk_freq(&self, osc: &OscillatorValues, i2c: I2c) -> ClockFreq {
        let sel = match i2c {
            I2c::I2c1 => self.get_i2c1_clk_source(),
            I2c::I2c3 => self.get_i2c3_clk_source(),
        };
        match sel {
            I2cClkSel::Pclk => ClockFreq::Running(self.pclk1_freq(osc)),
            I2cClkSel::Sysclk => ClockFreq::Running(self.sysclk_freq(osc)),
            I2cClkSel::Hsi => if_ready(self.hsi_is_ready(), HSI),
        }
    }

    /// LPTIM kernel clock
    pub fn lptim_clk_freq(&self, osc: &OscillatorValues, lptim: Lptim) -> ClockFreq {
        let sel = match lptim {
            Lptim::Lptim1 => self.get_lptim1_clk_source(),
            Lptim::Lptim2 => self.get_lptim2_clk_source(),
        };
        match sel {
            LptimClkSel::Pclk => ClockFreq::Running(self.pclk1_freq(osc)),
            LptimClkSel::Lsi => if_ready(self.lsi_is_ready(), LSI),
            LptimClkSel::Hsi => if_ready(self.hsi_is_ready(), HSI),
            LptimClkSel::Lse => if_ready(self.lse_is_ready(), osc.lse),
        }
    }

    /// SAI1 kernel clock
    ///
    /// [`ClockFreq::NotApplicable`] when fed from the SAI1_EXTCLK pin.
    pub fn sai_clk_freq(&self, osc: &OscillatorValues) -> ClockFreq {
        match self.get_sai1_clk_source() {
            SaiClkSel::PllSai1 => self.output_if(
                self.pllsai1_is_ready() && self.pllsai1_domain_sai_is_enabled(),
                self.pllsai1_freq_domain_sai(osc),
            ),
            SaiClkSel::Pll => self.output_if(
                self.pll_is_ready() && self.pll_domain_sai_is_enabled(),
                self.pll_freq_domain_sai(osc),
            ),
            SaiClkSel::Hsi => if_ready(self.hsi_is_ready(), HSI),
            SaiClkSel::Pin => ClockFreq::NotApplicable,
        }
    }

    /// 48 MHz clock (CLK48), the USB kernel clock
    pub fn clk48_clk_freq(&self, osc: &OscillatorValues) -> ClockFreq {
        match self.get_clk48_clk_source() {
            Clk48ClkSel::Hsi48 => if_ready(self.hsi48_is_ready(), HSI48),
            Clk48ClkSel::PllSai1 => self.output_if(
                self.pllsai1_is_ready() && self.pllsai1_domain_48m_is_enabled(),
                self.pllsai1_freq_domain_48m(osc),
            ),
            Clk48ClkSel::Pll => self.output_if(
                self.pll_is_ready() && self.pll_domain_48m_is_enabled(),
                self.pll_freq_domain_48m(osc),
            ),
            Clk48ClkSel::Msi => if_ready(self.msi_is_ready(), self.msi_freq()),
        }
    }

    /// USB kernel clock
    pub fn usb_clk_freq(&self, osc: &OscillatorValues) -> ClockFreq {
        self.clk48_clk_freq(osc)
    }

    /// RNG kernel clock
    pub fn rng_clk_freq(&self, osc: &OscillatorValues) -> ClockFreq {
        match self.get_rng_clk_source() {
            RngClkSel::Clk48Div3 => self.clk48_clk_freq(osc).map(|f| f / 3),
            RngClkSel::Lsi => if_ready(self.lsi_is_ready(), LSI),
            RngClkSel::Lse => if_ready(self.lse_is_ready(), osc.lse),
        }
    }

    /// ADC kernel clock
    pub fn adc_clk_freq(&self, osc: &OscillatorValues) -> ClockFreq {
        match self.get_adc_clk_source() {
            AdcClkSel::None => ClockFreq::NoClock,
            AdcClkSel::PllSai1 => self.output_if(
                self.pllsai1_is_ready() && self.pllsai1_domain_adc_is_enabled(),
                self.pllsai1_freq_domain_adc(osc),
            ),
            AdcClkSel::Pll => self.output_if(
                self.pll_is_ready() && self.pll_domain_adc_is_enabled(),
                self.pll_freq_domain_adc(osc),
            ),
            AdcClkSel::Sysclk => ClockFreq::Running(self.sysclk_freq(osc)),
        }
    }

    /// RTC clock
    pub fn rtc_clk_freq(&self, osc: &OscillatorValues) -> ClockFreq {
        match self.get_rtc_clk_source() {
            RtcClkSource::Lse => if_ready(self.lse_is_ready(), osc.lse),
            RtcClkSource::Lsi => if_ready(self.lsi_is_ready(), LSI),
            RtcClkSource::HseDiv32 => {
                if_ready(self.hse_is_ready(), osc.hse / 32)
            }
            RtcClkSource::None => ClockFreq::NoClock,
        }
    }

    /// RF wake-up clock
    pub fn rfwkp_clk_freq(&self, osc: &OscillatorValues) -> ClockFreq {
        match self.get_rfwkp_clk_source() {
            RfWakeupClkSource::Lse => if_ready(self.lse_is_ready(), osc.lse),
            RfWakeupClkSource::Lsi => if_ready(self.lsi_is_ready(), LSI),
            RfWakeupClkSource::HseDiv1024 => {
                if_ready(self.hse_is_ready(), osc.hse / 1024)
            }
            RfWakeupClkSource::None => ClockFreq::NoClock,
        }
    }

    /// A PLL output, when the PLL is locked with that output enabled
    fn output_if(&self, running: bool, f: Hertz) -> ClockFreq {
        if running {
            ClockFreq::from_raw(f.raw())
        } else {
            ClockFreq::NoClock
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wb::ll::{PllDiv, PllM, SmpsPrescaler};

    #[test]
    fn ahb_prescaler_is_not_a_power_of_two_table() {
        assert_eq!(calc_hclk_freq(64_000_000, AhbPrescaler::Div1), 64_000_000);
        assert_eq!(calc_hclk_freq(48_000_000, AhbPrescaler::Div3), 16_000_000);
        assert_eq!(calc_hclk_freq(64_000_000, AhbPrescaler::Div2), 32_000_000);
        assert_eq!(calc_hclk_freq(60_000_000, AhbPrescaler::Div10), 6_000_000);
        assert_eq!(calc_hclk_freq(64_000_000, AhbPrescaler::Div32), 2_000_000);
        assert_eq!(calc_hclk_freq(64_000_000, AhbPrescaler::Div512), 125_000);
        assert_eq!(calc_pclk_freq(64_000_000, ApbPrescaler::Div16), 4_000_000);
    }

    #[test]
    fn pll_output() {
        // HSE32 / 2 x 8 / 2
        assert_eq!(calc_pll_freq(32_000_000, 2, 8, 2), 64_000_000);
        // MSI 4 MHz x 32 / 2
        assert_eq!(calc_pll_freq(4_000_000, 1, 32, 2), 64_000_000);
        // MSI 48 MHz x 127, a 6.096 GHz VCO
        assert_eq!(calc_pll_freq(48_000_000, 1, 127, 2), 3_048_000_000);
    }

    #[test]
    fn out_of_range_vco_still_reads_back() {
        let rcc = RegisterBlock::new();
        let osc = OscillatorValues::default();
        rcc.set_msi_range(MsiRange::Range48M);
        rcc.pll_config_domain_sys(PllSource::Msi, PllM::Div1, 127, PllDiv::Div2);
        rcc.pll_config_domain_48m(PllSource::Msi, PllM::Div1, 127, PllDiv::Div8);

        assert_eq!(rcc.pll_freq_domain_sys(&osc), Hertz::Hz(3_048_000_000));
        assert_eq!(rcc.pll_freq_domain_48m(&osc), Hertz::Hz(762_000_000));
        rcc.pllsai1_config_domain_adc(PllSource::Msi, PllM::Div1, 127, PllDiv::Div2);
        assert_eq!(rcc.pllsai1_freq_domain_adc(&osc), Hertz::Hz(3_048_000_000));

        rcc.cr.set_bits(1 << 25);
        rcc.cfgr.set_field(2, 2, SysClkSource::Pll.bits());
        let clocks = rcc.system_clocks_freq(&osc);
        assert_eq!(clocks.sysclk(), Hertz::Hz(3_048_000_000));
    }

    #[test]
    fn reset_state_runs_on_msi() {
        let rcc = RegisterBlock::new();
        let osc = OscillatorValues::default();
        assert_eq!(rcc.sysclk_freq(&osc), Hertz::MHz(4));
        assert_eq!(rcc.hclk2_freq(&osc), Hertz::MHz(4));
        assert_eq!(rcc.hclk5_freq(&osc), HSI);
        // PLLSRC is none at reset
        assert_eq!(rcc.pll_input_freq(&osc), 0);
        assert_eq!(rcc.adc_clk_freq(&osc), ClockFreq::NoClock);
        assert_eq!(rcc.rtc_clk_freq(&osc), ClockFreq::NoClock);
        assert_eq!(rcc.rfwkp_clk_freq(&osc), ClockFreq::NoClock);
    }

    #[test]
    fn hse_prescaler_feeds_sysclk_and_pll() {
        let rcc = RegisterBlock::new();
        let osc = OscillatorValues::default();
        rcc.hse_div2_enable();
        rcc.pll_config_domain_sys(PllSource::Hse, PllM::Div1, 8, PllDiv::Div2);
        assert_eq!(rcc.pll_freq_domain_sys(&osc), Hertz::MHz(64));
        rcc.set_sys_clk_source(SysClkSource::Hse);
        rcc.cfgr.set_field(2, 2, SysClkSource::Hse.bits());
        assert_eq!(rcc.sysclk_freq(&osc), Hertz::MHz(16));
    }

    #[test]
    fn pll_outputs_need_lock_and_enable() {
        let rcc = RegisterBlock::new();
        let osc = OscillatorValues::default();
        rcc.set_clk48_clk_source(Clk48ClkSel::Pll);
        rcc.pll_config_domain_48m(PllSource::Msi, PllM::Div1, 24, PllDiv::Div2);
        assert_eq!(rcc.clk48_clk_freq(&osc), ClockFreq::NoClock);

        rcc.pll_domain_48m_enable();
        rcc.cr.set_bits(1 << 25);
        assert_eq!(rcc.clk48_clk_freq(&osc), ClockFreq::Running(Hertz::MHz(48)));
        assert_eq!(rcc.rng_clk_freq(&osc), ClockFreq::Running(Hertz::MHz(16)));
    }

    #[test]
    fn sai_pin_is_not_applicable() {
        let rcc = RegisterBlock::new();
        let osc = OscillatorValues::default();
        rcc.set_sai1_clk_source(SaiClkSel::Pin);
        assert_eq!(rcc.sai_clk_freq(&osc), ClockFreq::NotApplicable);
        assert_eq!(u32::from(rcc.sai_clk_freq(&osc)), 0xFFFF_FFFF);
    }

    #[test]
    fn smps_clock() {
        let rcc = RegisterBlock::new();
        let osc = OscillatorValues::default();
        // SMPSSWS reads no clock at reset
        assert_eq!(rcc.smps_clk_freq(&osc), ClockFreq::NoClock);
        rcc.smpscr.set_field(8, 2, SmpsClkStatus::Hsi.bits());
        rcc.set_smps_prescaler(SmpsPrescaler::Div1);
        assert_eq!(rcc.smps_clk_freq(&osc), ClockFreq::Running(Hertz::MHz(8)));
        rcc.smpscr.set_field(8, 2, SmpsClkStatus::Hse.bits());
        rcc.set_smps_prescaler(SmpsPrescaler::Div0);
        assert_eq!(rcc.smps_clk_freq(&osc), ClockFreq::Running(Hertz::MHz(16)));

        rcc.smpscr.set_field(8, 2, SmpsClkStatus::Msi.bits());
        assert_eq!(rcc.smps_clk_freq(&osc), ClockFreq::NotApplicable);
        rcc.set_msi_range(MsiRange::Range24M);
        assert_eq!(rcc.smps_clk_freq(&osc), ClockFreq::Running(Hertz::MHz(8)));

        rcc.smpscr.set_field(8, 2, SmpsClkStatus::NoClock.bits());
        assert_eq!(rcc.smps_clk_freq(&osc), ClockFreq::NoClock);
    }

    #[test]
    fn lsi_from_either_oscillator() {
        let rcc = RegisterBlock::new();
        let osc = OscillatorValues::default();
        rcc.set_lptim1_clk_source(LptimClkSel::Lsi);
        assert_eq!(rcc.lptim_clk_freq(&osc, Lptim::Lptim1), ClockFreq::NoClock);
        rcc.csr.set_bits(1 << 3);
        assert_eq!(
            rcc.lptim_clk_freq(&osc, Lptim::Lptim1),
            ClockFreq::Running(LSI)
        );
    }
}
