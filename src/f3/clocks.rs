//! STM32F3 clock frequencies derived from register state
//!
//! HSI is 8 MHz. LSI is 40 kHz. The HSE and LSE crystal frequencies depend
//! on the board and are given in [`OscillatorValues`].
//!
//! Frequencies may be inexact for fractional crystal values: every stage is
//! computed with integer division.
//!
//! ```ignore
//! let osc = OscillatorValues::default().hse(12.MHz());
//!
//! let clocks = rcc.system_clocks_freq(&osc);
//! let usart1 = rcc.usart_clk_freq(&osc, Usart::Usart1);
//! ```

use super::ll::{
    AdcClkSel, AhbPrescaler, ApbPrescaler, I2cClkSel, I2sClkSel, PllMul,
    PllSource, Prediv, RtcClkSource, SysClkSource, TimClkSel, UsartClkSel,
    UsbPrescaler,
};
use super::regs::{RegisterBlock, RCC};
use crate::delay::HclkSource;
use crate::rcc::ClockFreq;
use crate::time::Hertz;

/// HSI oscillator frequency
pub const HSI: Hertz = Hertz::from_raw(8_000_000);
/// LSI oscillator frequency
pub const LSI: Hertz = Hertz::from_raw(40_000);

/// Right shift applied to SYSCLK for each HPRE code
pub const AHB_PRESC_SHIFT: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4, 6, 7, 8, 9];
/// Right shift applied to HCLK for each PPRE code
pub const APB_PRESC_SHIFT: [u8; 8] = [0, 0, 0, 0, 1, 2, 3, 4];
/// PLL divider for each of the low four bits of an ADCxxPRES code
pub const ADC_PLL_DIV: [u16; 16] = [
    1, 2, 4, 6, 8, 10, 12, 16, 32, 64, 128, 256, 256, 256, 256, 256,
];

/// Frequencies of the external oscillators
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OscillatorValues {
    /// HSE crystal or bypass clock frequency
    pub hse: Hertz,
    /// LSE crystal or bypass clock frequency
    pub lse: Hertz,
}

impl Default for OscillatorValues {
    fn default() -> Self {
        OscillatorValues {
            hse: Hertz::from_raw(8_000_000),
            lse: Hertz::from_raw(32_768),
        }
    }
}

impl OscillatorValues {
    /// Set the HSE frequency
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

/// USART and UART instances with a kernel clock selection
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Usart {
    /// USART1, on APB2
    Usart1,
    /// USART2
    Usart2,
    /// USART3
    Usart3,
    /// UART4
    Uart4,
    /// UART5
    Uart5,
}

/// I2C instances
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2c {
    /// I2C1
    I2c1,
    /// I2C2
    I2c2,
    /// I2C3
    I2c3,
}

/// Timer instances with a kernel clock selection
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Tim {
    /// TIM1, on APB2
    Tim1,
    /// TIM2, on APB1
    Tim2,
    /// TIM3 and TIM4, on APB1
    Tim34,
    /// TIM8, on APB2
    Tim8,
    /// TIM15, on APB2
    Tim15,
    /// TIM16, on APB2
    Tim16,
    /// TIM17, on APB2
    Tim17,
    /// TIM20, on APB2
    Tim20,
}

/// ADC pairs sharing a kernel clock
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Adc {
    /// ADC1 and ADC2
    Adc12,
    /// ADC3 and ADC4
    Adc34,
}

/// HCLK for a SYSCLK frequency and AHB prescaler
#[inline]
pub const fn calc_hclk_freq(sysclk: u32, hpre: AhbPrescaler) -> u32 {
    sysclk >> AHB_PRESC_SHIFT[hpre.bits() as usize]
}

/// PCLK for a HCLK frequency and APB prescaler
#[inline]
pub const fn calc_pclk_freq(hclk: u32, ppre: ApbPrescaler) -> u32 {
    hclk >> APB_PRESC_SHIFT[ppre.bits() as usize]
}

/// PLL output for an input frequency, input divider and multiplication
/// factor
#[inline]
pub const fn calc_pll_freq(input: u32, prediv: Prediv, mul: PllMul) -> u32 {
    (input / prediv.divisor()) * mul.factor()
}

/// HCLK read back from the RCC registers on every call
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
        self.rb.hclk_freq(&self.osc)
    }
}

/// Frozen core clock frequencies
///
/// The existence of this value indicates that the core clock
/// configuration can no longer be changed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoreClocks {
    pub(crate) sysclk: Hertz,
    pub(crate) hclk: Hertz,
    pub(crate) pclk1: Hertz,
    pub(crate) pclk2: Hertz,
    pub(crate) ppre1: u8,
    pub(crate) ppre2: u8,
    pub(crate) hse_ck: Option<Hertz>,
    pub(crate) hsi_ck: Option<Hertz>,
    pub(crate) lse_ck: Option<Hertz>,
    pub(crate) lsi_ck: Option<Hertz>,
    pub(crate) pll_ck: Option<Hertz>,
}

/// Getters for pclk and ppre
macro_rules! pclk_ppre_getter {
    ($(($pclk:ident, $ppre:ident),)+) => {
        $(
            /// Returns the frequency of the APBn
            pub fn $pclk(&self) -> Hertz {
                self.$pclk
            }
            /// Returns the prescaler of the APBn
            pub fn $ppre(&self) -> u8 {
                self.$ppre
            }
        )+
    };
}

impl CoreClocks {
    ck_getter! {
        sysclk: "the system clock (SYSCLK)",
        hclk: "the AHB bus and core (HCLK)",
    }

    pclk_ppre_getter! {
        (pclk1, ppre1),
        (pclk2, ppre2),
    }

    optional_ck_getter! {
        hse_ck: "the HSE oscillator",
        hsi_ck: "the HSI oscillator",
        lse_ck: "the LSE oscillator",
        lsi_ck: "the LSI oscillator",
        pll_ck: "the PLL",
    }

    /// Returns the input frequency to the SCGU - ALIAS
    pub fn sys_ck(&self) -> Hertz {
        self.sysclk
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
    /// SYSCLK frequency from the system clock switch status
    pub fn sysclk_freq(&self, osc: &OscillatorValues) -> Hertz {
        match self.sys_clk_source_status() {
            SysClkSource::Hsi => HSI,
            SysClkSource::Hse => osc.hse,
            SysClkSource::Pll => self.pll_freq_domain_sys(osc),
        }
    }

    /// PLL output frequency
    ///
    /// This is the frequency the PLL would output with its current
    /// configuration, whether or not it is locked.
    pub fn pll_freq_domain_sys(&self, osc: &OscillatorValues) -> Hertz {
        let prediv = self.get_pll_prediv();
        let mul = self.get_pll_multiplicator();
        let f = match self.get_pll_main_source() {
            PllSource::HsiDiv2 => (HSI.raw() / 2) * mul.factor(),
            PllSource::HsiPrediv => calc_pll_freq(HSI.raw(), prediv, mul),
            PllSource::HsePrediv => calc_pll_freq(osc.hse.raw(), prediv, mul),
        };
        Hertz::from_raw(f)
    }

    /// HCLK frequency
    pub fn hclk_freq(&self, osc: &OscillatorValues) -> Hertz {
        Hertz::from_raw(calc_hclk_freq(
            self.sysclk_freq(osc).raw(),
            self.get_ahb_prescaler(),
        ))
    }

    /// PCLK1 frequency
    pub fn pclk1_freq(&self, osc: &OscillatorValues) -> Hertz {
        Hertz::from_raw(calc_pclk_freq(
            self.hclk_freq(osc).raw(),
            self.get_apb1_prescaler(),
        ))
    }

    /// PCLK2 frequency
    pub fn pclk2_freq(&self, osc: &OscillatorValues) -> Hertz {
        Hertz::from_raw(calc_pclk_freq(
            self.hclk_freq(osc).raw(),
            self.get_apb2_prescaler(),
        ))
    }

    /// SYSCLK, HCLK, PCLK1 and PCLK2 frequencies together with the
    /// oscillators that are ready
    pub fn system_clocks_freq(&self, osc: &OscillatorValues) -> CoreClocks {
        let sysclk = self.sysclk_freq(osc);
        let hclk = calc_hclk_freq(sysclk.raw(), self.get_ahb_prescaler());
        let ppre1 = self.get_apb1_prescaler();
        let ppre2 = self.get_apb2_prescaler();

        CoreClocks {
            sysclk,
            hclk: Hertz::from_raw(hclk),
            pclk1: Hertz::from_raw(calc_pclk_freq(hclk, ppre1)),
            pclk2: Hertz::from_raw(calc_pclk_freq(hclk, ppre2)),
            ppre1: apb_divisor(ppre1),
            ppre2: apb_divisor(ppre2),
            hse_ck: self.hse_is_ready().then_some(osc.hse),
            hsi_ck: self.hsi_is_ready().then_some(HSI),
            lse_ck: self.lse_is_ready().then_some(osc.lse),
            lsi_ck: self.lsi_is_ready().then_some(LSI),
            pll_ck: self
                .pll_is_ready()
                .then(|| self.pll_freq_domain_sys(osc)),
        }
    }

    /// USART / UART kernel clock
    pub fn usart_clk_freq(&self, osc: &OscillatorValues, usart: Usart) -> ClockFreq {
        let (sel, pclk) = match usart {
            Usart::Usart1 => (self.get_usart1_clk_source(), self.pclk2_freq(osc)),
            Usart::Usart2 => (self.get_usart2_clk_source(), self.pclk1_freq(osc)),
            Usart::Usart3 => (self.get_usart3_clk_source(), self.pclk1_freq(osc)),
            Usart::Uart4 => (self.get_uart4_clk_source(), self.pclk1_freq(osc)),
            Usart::Uart5 => (self.get_uart5_clk_source(), self.pclk1_freq(osc)),
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
            I2c::I2c2 => self.get_i2c2_clk_source(),
            I2c::I2c3 => self.get_i2c3_clk_source(),
        };
        match sel {
            I2cClkSel::Hsi => if_ready(self.hsi_is_ready(), HSI),
            I2cClkSel::Sysclk => ClockFreq::Running(self.sysclk_freq(osc)),
        }
    }

    /// I2S kernel clock
    ///
    /// [`ClockFreq::NotApplicable`] when fed from the I2S_CKIN pin.
    pub fn i2s_clk_freq(&self, osc: &OscillatorValues) -> ClockFreq {
        match self.get_i2s_clk_source() {
            I2sClkSel::Sysclk => ClockFreq::Running(self.sysclk_freq(osc)),
            I2sClkSel::Ext => ClockFreq::NotApplicable,
        }
    }

    /// USB kernel clock
    pub fn usb_clk_freq(&self, osc: &OscillatorValues) -> ClockFreq {
        if !self.pll_is_ready() {
            return ClockFreq::NoClock;
        }
        let pll = self.pll_freq_domain_sys(osc).raw();
        match self.get_usb_prescaler() {
            UsbPrescaler::Div1 => ClockFreq::from_raw(pll),
            UsbPrescaler::Div1_5 => ClockFreq::from_raw(pll * 2 / 3),
        }
    }

    /// ADC kernel clock
    pub fn adc_clk_freq(&self, osc: &OscillatorValues, adc: Adc) -> ClockFreq {
        let sel = match adc {
            Adc::Adc12 => self.get_adc12_clk_source(),
            Adc::Adc34 => self.get_adc34_clk_source(),
        };
        match sel {
            AdcClkSel::Hclk => ClockFreq::Running(self.hclk_freq(osc)),
            pll if self.pll_is_ready() => {
                let div = ADC_PLL_DIV[(pll.bits() & 0xF) as usize] as u32;
                ClockFreq::from_raw(self.pll_freq_domain_sys(osc).raw() / div)
            }
            _ => ClockFreq::NoClock,
        }
    }

    /// Timer kernel clock
    ///
    /// The PLL source is the PLL vco output, twice the PLL clock.
    pub fn tim_clk_freq(&self, osc: &OscillatorValues, tim: Tim) -> ClockFreq {
        let (sel, apb2) = match tim {
            Tim::Tim1 => (self.get_tim1_clk_source(), true),
            Tim::Tim2 => (self.get_tim2_clk_source(), false),
            Tim::Tim34 => (self.get_tim34_clk_source(), false),
            Tim::Tim8 => (self.get_tim8_clk_source(), true),
            Tim::Tim15 => (self.get_tim15_clk_source(), true),
            Tim::Tim16 => (self.get_tim16_clk_source(), true),
            Tim::Tim17 => (self.get_tim17_clk_source(), true),
            Tim::Tim20 => (self.get_tim20_clk_source(), true),
        };
        match sel {
            TimClkSel::Pclk => {
                let (pclk, ppre) = if apb2 {
                    (self.pclk2_freq(osc), self.get_apb2_prescaler())
                } else {
                    (self.pclk1_freq(osc), self.get_apb1_prescaler())
                };
                ClockFreq::Running(tim_pclk(pclk, apb_divisor(ppre)))
            }
            TimClkSel::Pll => if_ready(
                self.pll_is_ready(),
                self.pll_freq_domain_sys(osc) * 2,
            ),
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
}
