//! STM32F3 oscillator, system clock and kernel clock configuration
//!
//! The methods in this module are the run-time configuration tier on top of
//! the register accessors. Every wait for an oscillator, the PLL or a clock
//! switch is bounded by a timeout counted on a
//! [`DelayNs`](embedded_hal::delay::DelayNs) provider, and an oscillator that
//! feeds the system clock is never stopped.
//!
//! ```ignore
//! let mut rcc = dp.RCC.constrain();
//!
//! rcc.osc_config(
//!     &OscConfig {
//!         hse: Some(ExtOscState::On),
//!         pll: Some(PllState::On(PllConfig {
//!             source: PllSource::HsePrediv,
//!             prediv: Prediv::Div1,
//!             mul: PllMul::Mul9,
//!         })),
//!         ..Default::default()
//!     },
//!     &pwr,
//!     &mut delay,
//! )?;
//!
//! let clocks = rcc.clock_config(
//!     &ClkConfig {
//!         sysclk: Some(SysClkSource::Pll),
//!         apb1: Some(ApbPrescaler::Div2),
//!         ..Default::default()
//!     },
//!     &flash,
//!     2,
//!     &mut delay,
//! )?;
//! ```

use embedded_hal::delay::DelayNs;
#[cfg(feature = "log")]
use log::trace;

use super::clocks::{Adc, CoreClocks, I2c, Tim, Usart};
use super::ll::{
    AdcClkSel, AhbPrescaler, ApbPrescaler, I2cClkSel, I2sClkSel, McoPrescaler,
    McoSource, PllMul, PllSource, Prediv, RtcClkSource, SysClkSource,
    TimClkSel, UsartClkSel, UsbPrescaler,
};
use super::regs::{RegisterBlock, FLASH, PWR};
use super::Rcc;
use crate::rcc::{spin_until, wait_until, Clock, ClockFreq, Error};
use crate::time::MilliSeconds;

/// HSE start-up timeout
pub const HSE_TIMEOUT: MilliSeconds = MilliSeconds::millis(100);
/// HSI start-up timeout
pub const HSI_TIMEOUT: MilliSeconds = MilliSeconds::millis(2);
/// LSI start-up timeout
pub const LSI_TIMEOUT: MilliSeconds = MilliSeconds::millis(2);
/// LSE start-up timeout
pub const LSE_TIMEOUT: MilliSeconds = MilliSeconds::millis(5000);
/// PLL lock timeout
pub const PLL_TIMEOUT: MilliSeconds = MilliSeconds::millis(2);
/// System clock switch timeout
pub const CLOCKSWITCH_TIMEOUT: MilliSeconds = MilliSeconds::millis(5000);
/// Backup domain write access timeout
pub const DBP_TIMEOUT: MilliSeconds = MilliSeconds::millis(100);

/// Highest number of flash wait states
pub const MAX_LATENCY: u32 = 2;

const APB1ENR_PWREN: u32 = 1 << 28;
const BDCR_RTCSEL: u32 = 0b11 << 8;
const BDCR_LSEON: u32 = 1 << 0;

/// State of an external oscillator
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExtOscState {
    /// Stopped
    Off,
    /// Crystal oscillator running
    On,
    /// External clock on the oscillator input, crystal driver bypassed
    Bypass,
}

/// State of the HSI oscillator
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HsiState {
    /// Stopped
    Off,
    /// Running with a trimming value (0..=31, 16 is the factory setting)
    On {
        /// HSITRIM
        trim: u8,
    },
}

/// State of an oscillator without further settings
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OscState {
    /// Stopped
    Off,
    /// Running
    On,
}

/// Main PLL settings
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PllConfig {
    /// Entry clock
    pub source: PllSource,
    /// Input divider, not applied to [`PllSource::HsiDiv2`]
    pub prediv: Prediv,
    /// Multiplication factor
    pub mul: PllMul,
}

/// State of the main PLL
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllState {
    /// Stopped
    Off,
    /// Configured and locked
    On(PllConfig),
}

/// Oscillator and PLL configuration
///
/// `None` leaves an oscillator as it is.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct OscConfig {
    /// HSE oscillator
    pub hse: Option<ExtOscState>,
    /// HSI oscillator
    pub hsi: Option<HsiState>,
    /// LSE oscillator
    pub lse: Option<ExtOscState>,
    /// LSI oscillator
    pub lsi: Option<OscState>,
    /// Main PLL
    pub pll: Option<PllState>,
}

/// System clock and bus prescaler configuration
///
/// `None` leaves a setting as it is.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ClkConfig {
    /// System clock source
    pub sysclk: Option<SysClkSource>,
    /// AHB prescaler
    pub ahb: Option<AhbPrescaler>,
    /// APB1 prescaler
    pub apb1: Option<ApbPrescaler>,
    /// APB2 prescaler
    pub apb2: Option<ApbPrescaler>,
}

/// Kernel clock selections
///
/// `None` leaves a selection as it is. Changing the RTC source resets the
/// RTC domain.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PeriphClkConfig {
    /// RTC clock source
    pub rtc: Option<RtcClkSource>,
    /// USART1 kernel clock
    pub usart1: Option<UsartClkSel>,
    /// USART2 kernel clock
    pub usart2: Option<UsartClkSel>,
    /// USART3 kernel clock
    pub usart3: Option<UsartClkSel>,
    /// UART4 kernel clock
    pub uart4: Option<UsartClkSel>,
    /// UART5 kernel clock
    pub uart5: Option<UsartClkSel>,
    /// I2C1 kernel clock
    pub i2c1: Option<I2cClkSel>,
    /// I2C2 kernel clock
    pub i2c2: Option<I2cClkSel>,
    /// I2C3 kernel clock
    pub i2c3: Option<I2cClkSel>,
    /// I2S kernel clock
    pub i2s: Option<I2sClkSel>,
    /// TIM1 kernel clock
    pub tim1: Option<TimClkSel>,
    /// TIM2 kernel clock
    pub tim2: Option<TimClkSel>,
    /// TIM3 and TIM4 kernel clock
    pub tim34: Option<TimClkSel>,
    /// TIM8 kernel clock
    pub tim8: Option<TimClkSel>,
    /// TIM15 kernel clock
    pub tim15: Option<TimClkSel>,
    /// TIM16 kernel clock
    pub tim16: Option<TimClkSel>,
    /// TIM17 kernel clock
    pub tim17: Option<TimClkSel>,
    /// TIM20 kernel clock
    pub tim20: Option<TimClkSel>,
    /// USB prescaler
    pub usb: Option<UsbPrescaler>,
    /// ADC1 and ADC2 kernel clock
    pub adc12: Option<AdcClkSel>,
    /// ADC3 and ADC4 kernel clock
    pub adc34: Option<AdcClkSel>,
}

/// Kernel clocks whose frequency can be read back
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeriphClk {
    /// RTC clock
    Rtc,
    /// USART / UART kernel clock
    Usart(Usart),
    /// I2C kernel clock
    I2c(I2c),
    /// I2S kernel clock
    I2s,
    /// Timer kernel clock
    Tim(Tim),
    /// USB kernel clock
    Usb,
    /// ADC kernel clock
    Adc(Adc),
}

/// Reason of the last reset
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetReason {
    /// Power-on or power-down reset
    PowerOnReset,
    /// Reset from the NRST pin
    PinReset,
    /// Reset of the 1.8 V domain
    Domain18Reset,
    /// Software reset
    SoftwareReset,
    /// Independent watchdog
    IndependentWatchdogReset,
    /// Window watchdog
    WindowWatchdogReset,
    /// Illegal Stop or Standby entry
    LowPowerReset,
    /// Option byte loading
    OptionByteLoaderReset,
    /// The combination of flags could not be decoded
    Unknown {
        /// Content of RCC_CSR
        rcc_csr: u32,
    },
}

impl ResetReason {
    fn from_csr(csr: u32) -> Self {
        const POR: u32 = 1 << 27;
        const PIN: u32 = 1 << 26;
        let flag = |bit: u32| csr & (1 << bit) != 0;

        // A power-on reset also sets PINRSTF
        if csr & POR != 0 {
            ResetReason::PowerOnReset
        } else if flag(31) {
            ResetReason::LowPowerReset
        } else if flag(30) {
            ResetReason::WindowWatchdogReset
        } else if flag(29) {
            ResetReason::IndependentWatchdogReset
        } else if flag(28) {
            ResetReason::SoftwareReset
        } else if flag(25) {
            ResetReason::OptionByteLoaderReset
        } else if flag(23) {
            ResetReason::Domain18Reset
        } else if csr & PIN != 0 {
            ResetReason::PinReset
        } else {
            ResetReason::Unknown { rcc_csr: csr }
        }
    }
}

impl RegisterBlock {
    /// Returns `true` if HSE is the system clock or feeds the PLL that is
    pub(crate) fn hse_in_use(&self) -> bool {
        match self.sys_clk_source_status() {
            SysClkSource::Hse => true,
            SysClkSource::Pll => {
                self.get_pll_main_source() == PllSource::HsePrediv
            }
            SysClkSource::Hsi => false,
        }
    }

    /// Returns `true` if HSI is the system clock or feeds the PLL that is
    fn hsi_in_use(&self) -> bool {
        match self.sys_clk_source_status() {
            SysClkSource::Hsi => true,
            SysClkSource::Pll => {
                self.get_pll_main_source() != PllSource::HsePrediv
            }
            SysClkSource::Hse => false,
        }
    }

    pub(crate) fn hse_state(&self) -> ExtOscState {
        match (self.hse_is_enabled(), self.hse_bypass_is_enabled()) {
            (false, _) => ExtOscState::Off,
            (true, false) => ExtOscState::On,
            (true, true) => ExtOscState::Bypass,
        }
    }

    fn lse_state(&self) -> ExtOscState {
        match (self.lse_is_enabled(), self.lse_bypass_is_enabled()) {
            (false, _) => ExtOscState::Off,
            (true, false) => ExtOscState::On,
            (true, true) => ExtOscState::Bypass,
        }
    }

    fn pll_config(&self) -> PllConfig {
        PllConfig {
            source: self.get_pll_main_source(),
            prediv: self.get_pll_prediv(),
            mul: self.get_pll_multiplicator(),
        }
    }
}

impl Rcc {
    /// Start or stop oscillators and the main PLL
    ///
    /// The oscillators are handled in the order HSE, HSI, LSI, LSE, PLL. The
    /// first failure stops the sequence.
    ///
    /// `pwr` is required to enable write access to the RTC domain, where
    /// the LSE control bits live.
    pub fn osc_config<D: DelayNs>(
        &mut self,
        cfg: &OscConfig,
        pwr: &PWR,
        delay: &mut D,
    ) -> Result<(), Error> {
        if let Some(state) = cfg.hse {
            self.hse_config(state, delay)?;
        }
        if let Some(state) = cfg.hsi {
            self.hsi_config(state, delay)?;
        }
        if let Some(state) = cfg.lsi {
            self.lsi_config(state, delay)?;
        }
        if let Some(state) = cfg.lse {
            self.with_backup_access(pwr, delay, |rcc, delay| {
                lse_config(rcc, state, delay)
            })?;
        }
        if let Some(state) = cfg.pll {
            self.pll_config(state, delay)?;
        }
        Ok(())
    }

    fn hse_config<D: DelayNs>(
        &mut self,
        state: ExtOscState,
        delay: &mut D,
    ) -> Result<(), Error> {
        let rcc = &*self.rb;
        let current = rcc.hse_state();

        if rcc.hse_in_use() {
            return if state == current {
                Ok(())
            } else {
                Err(Error::InUse(Clock::Hse))
            };
        }
        if state == current {
            return Ok(());
        }

        #[cfg(feature = "log")]
        trace!("RCC: HSE {:?} -> {:?}", current, state);

        // HSEBYP may only change while HSE is off
        rcc.hse_disable();
        wait_until(delay, HSE_TIMEOUT, Clock::Hse, || !rcc.hse_is_ready())?;
        rcc.hse_bypass_disable();

        match state {
            ExtOscState::Off => Ok(()),
            ExtOscState::On | ExtOscState::Bypass => {
                if state == ExtOscState::Bypass {
                    rcc.hse_bypass_enable();
                }
                rcc.hse_enable();
                wait_until(delay, HSE_TIMEOUT, Clock::Hse, || {
                    rcc.hse_is_ready()
                })
            }
        }
    }

    fn hsi_config<D: DelayNs>(
        &mut self,
        state: HsiState,
        delay: &mut D,
    ) -> Result<(), Error> {
        let rcc = &*self.rb;

        match state {
            HsiState::On { trim } => {
                if !rcc.hsi_is_enabled() || !rcc.hsi_is_ready() {
                    #[cfg(feature = "log")]
                    trace!("RCC: HSI on");

                    rcc.hsi_enable();
                    wait_until(delay, HSI_TIMEOUT, Clock::Hsi, || {
                        rcc.hsi_is_ready()
                    })?;
                }
                rcc.set_hsi_calib_trimming(trim as u32);
                Ok(())
            }
            HsiState::Off if rcc.hsi_in_use() => Err(Error::InUse(Clock::Hsi)),
            HsiState::Off => {
                #[cfg(feature = "log")]
                trace!("RCC: HSI off");

                rcc.hsi_disable();
                wait_until(delay, HSI_TIMEOUT, Clock::Hsi, || {
                    !rcc.hsi_is_ready()
                })
            }
        }
    }

    fn lsi_config<D: DelayNs>(
        &mut self,
        state: OscState,
        delay: &mut D,
    ) -> Result<(), Error> {
        let rcc = &*self.rb;

        #[cfg(feature = "log")]
        trace!("RCC: LSI {:?}", state);

        match state {
            OscState::On => {
                rcc.lsi_enable();
                wait_until(delay, LSI_TIMEOUT, Clock::Lsi, || rcc.lsi_is_ready())
            }
            OscState::Off => {
                rcc.lsi_disable();
                wait_until(delay, LSI_TIMEOUT, Clock::Lsi, || {
                    !rcc.lsi_is_ready()
                })
            }
        }
    }

    fn pll_config<D: DelayNs>(
        &mut self,
        state: PllState,
        delay: &mut D,
    ) -> Result<(), Error> {
        let rcc = &*self.rb;

        if rcc.sys_clk_source_status() == SysClkSource::Pll {
            return match state {
                PllState::On(cfg) if cfg == rcc.pll_config() => Ok(()),
                _ => Err(Error::InUse(Clock::Pll)),
            };
        }

        #[cfg(feature = "log")]
        trace!("RCC: PLL {:?}", state);

        rcc.pll_disable();
        wait_until(delay, PLL_TIMEOUT, Clock::Pll, || !rcc.pll_is_ready())?;

        if let PllState::On(cfg) = state {
            rcc.pll_config_domain_sys(cfg.source, cfg.prediv, cfg.mul);
            rcc.pll_enable();
            wait_until(delay, PLL_TIMEOUT, Clock::Pll, || rcc.pll_is_ready())?;
        }
        Ok(())
    }

    /// Run `f` with write access to the RTC domain
    ///
    /// The PWR clock is enabled for the duration of `f` if it was off.
    fn with_backup_access<D: DelayNs, R>(
        &mut self,
        pwr: &PWR,
        delay: &mut D,
        f: impl FnOnce(&RegisterBlock, &mut D) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let rcc = &*self.rb;
        let pwr_clk_changed = !rcc.apb1enr.is_set(APB1ENR_PWREN);
        if pwr_clk_changed {
            rcc.apb1enr.set_bits(APB1ENR_PWREN);
        }

        let result = if pwr.backup_access_is_enabled() {
            Ok(())
        } else {
            pwr.backup_access_enable();
            wait_until(delay, DBP_TIMEOUT, Clock::BackupDomain, || {
                pwr.backup_access_is_enabled()
            })
        }
        .and_then(|()| f(rcc, delay));

        if pwr_clk_changed {
            rcc.apb1enr.clear_bits(APB1ENR_PWREN);
        }
        result
    }

    /// Select the system clock and program the bus prescalers
    ///
    /// `latency` is the number of flash wait states for the new HCLK
    /// frequency (0 up to 24 MHz, 1 up to 48 MHz, 2 above). The wait states
    /// are raised before and lowered after the frequency changes.
    ///
    /// Returns the resulting core clock frequencies.
    pub fn clock_config<D: DelayNs>(
        &mut self,
        cfg: &ClkConfig,
        flash: &FLASH,
        latency: u32,
        delay: &mut D,
    ) -> Result<CoreClocks, Error> {
        if latency > MAX_LATENCY {
            return Err(Error::InvalidConfig);
        }
        let rcc = &*self.rb;

        if latency > flash.latency() {
            flash.set_latency(latency);
            spin_until(Clock::FlashLatency, || flash.latency() == latency)?;
        }

        if let Some(hpre) = cfg.ahb {
            // Slowest APB clocks while HCLK changes
            if cfg.apb1.is_some() {
                rcc.set_apb1_prescaler(ApbPrescaler::Div16);
            }
            if cfg.apb2.is_some() {
                rcc.set_apb2_prescaler(ApbPrescaler::Div16);
            }
            rcc.set_ahb_prescaler(hpre);
        }

        if let Some(source) = cfg.sysclk {
            let (ready, clock) = match source {
                SysClkSource::Hse => (rcc.hse_is_ready(), Clock::Hse),
                SysClkSource::Hsi => (rcc.hsi_is_ready(), Clock::Hsi),
                SysClkSource::Pll => (rcc.pll_is_ready(), Clock::Pll),
            };
            if !ready {
                return Err(Error::NotReady(clock));
            }

            #[cfg(feature = "log")]
            trace!("RCC: SYSCLK from {:?}", source);

            rcc.set_sys_clk_source(source);
            wait_until(delay, CLOCKSWITCH_TIMEOUT, Clock::SysClk, || {
                rcc.sys_clk_source_status() == source
            })?;
        }

        if latency < flash.latency() {
            flash.set_latency(latency);
            spin_until(Clock::FlashLatency, || flash.latency() == latency)?;
        }

        if let Some(ppre1) = cfg.apb1 {
            rcc.set_apb1_prescaler(ppre1);
        }
        if let Some(ppre2) = cfg.apb2 {
            rcc.set_apb2_prescaler(ppre2);
        }

        Ok(rcc.system_clocks_freq(&self.osc))
    }

    /// Read back the oscillator and PLL configuration
    pub fn osc_config_get(&self) -> OscConfig {
        let rcc = &*self.rb;
        OscConfig {
            hse: Some(rcc.hse_state()),
            hsi: Some(if rcc.hsi_is_enabled() {
                HsiState::On {
                    trim: rcc.get_hsi_calib_trimming() as u8,
                }
            } else {
                HsiState::Off
            }),
            lse: Some(rcc.lse_state()),
            lsi: Some(if rcc.lsi_is_enabled() {
                OscState::On
            } else {
                OscState::Off
            }),
            pll: Some(if rcc.pll_is_enabled() {
                PllState::On(rcc.pll_config())
            } else {
                PllState::Off
            }),
        }
    }

    /// Read back the system clock configuration and flash wait states
    pub fn clock_config_get(&self, flash: &FLASH) -> (ClkConfig, u32) {
        let rcc = &*self.rb;
        let cfg = ClkConfig {
            sysclk: Some(rcc.sys_clk_source_status()),
            ahb: Some(rcc.get_ahb_prescaler()),
            apb1: Some(rcc.get_apb1_prescaler()),
            apb2: Some(rcc.get_apb2_prescaler()),
        };
        (cfg, flash.latency())
    }

    /// Output a clock on the MCO pin
    ///
    /// The pin itself is configured by the GPIO driver.
    pub fn mco_config(&mut self, source: McoSource, div: McoPrescaler) {
        self.rb.config_mco(source, div);
    }

    /// Enable the clock security system on HSE
    ///
    /// An HSE failure raises the NMI, handled by
    /// [`nmi_irq_handler`](Self::nmi_irq_handler).
    pub fn enable_css(&mut self) {
        self.rb.hse_css_enable();
    }

    /// Handle an HSE clock security event
    ///
    /// Call from the NMI handler. When the CSS flag is set it is cleared
    /// and `callback` is run.
    pub fn nmi_irq_handler(&mut self, callback: impl FnOnce()) {
        let rcc = &*self.rb;
        if rcc.is_active_flag_hsecss() {
            rcc.clear_flag_hsecss();
            interrupt_clear_clock_sync_delay!(rcc.cir);
            callback();
        }
    }

    /// Select kernel clocks
    ///
    /// Changing the RTC clock source resets the RTC domain: the RTC
    /// registers and backup registers return to their reset values. The
    /// other BDCR settings, the LSE among them, are restored.
    pub fn periph_clk_config<D: DelayNs>(
        &mut self,
        cfg: &PeriphClkConfig,
        pwr: &PWR,
        delay: &mut D,
    ) -> Result<(), Error> {
        if let Some(source) = cfg.rtc {
            self.with_backup_access(pwr, delay, |rcc, delay| {
                rtc_config(rcc, source, delay)
            })?;
        }

        let rcc = &*self.rb;
        macro_rules! select {
            ($($field:ident => $setter:ident,)+) => {
                $(
                    if let Some(sel) = cfg.$field {
                        rcc.$setter(sel);
                    }
                )+
            };
        }
        select! {
            usart1 => set_usart1_clk_source,
            usart2 => set_usart2_clk_source,
            usart3 => set_usart3_clk_source,
            uart4 => set_uart4_clk_source,
            uart5 => set_uart5_clk_source,
            i2c1 => set_i2c1_clk_source,
            i2c2 => set_i2c2_clk_source,
            i2c3 => set_i2c3_clk_source,
            i2s => set_i2s_clk_source,
            tim1 => set_tim1_clk_source,
            tim2 => set_tim2_clk_source,
            tim34 => set_tim34_clk_source,
            tim8 => set_tim8_clk_source,
            tim15 => set_tim15_clk_source,
            tim16 => set_tim16_clk_source,
            tim17 => set_tim17_clk_source,
            tim20 => set_tim20_clk_source,
            usb => set_usb_prescaler,
            adc12 => set_adc12_clk_source,
            adc34 => set_adc34_clk_source,
        }
        Ok(())
    }

    /// Frequency of a kernel clock
    pub fn periph_clk_freq(&self, clk: PeriphClk) -> ClockFreq {
        let rcc = &*self.rb;
        let osc = &self.osc;
        match clk {
            PeriphClk::Rtc => rcc.rtc_clk_freq(osc),
            PeriphClk::Usart(usart) => rcc.usart_clk_freq(osc, usart),
            PeriphClk::I2c(i2c) => rcc.i2c_clk_freq(osc, i2c),
            PeriphClk::I2s => rcc.i2s_clk_freq(osc),
            PeriphClk::Tim(tim) => rcc.tim_clk_freq(osc, tim),
            PeriphClk::Usb => rcc.usb_clk_freq(osc),
            PeriphClk::Adc(adc) => rcc.adc_clk_freq(osc, adc),
        }
    }

    /// Gets and clears the reason of why the mcu was reset
    pub fn reset_reason(&mut self) -> ResetReason {
        let reason = ResetReason::from_csr(self.rb.csr.read());
        self.rb.clear_reset_flags();
        reason
    }
}

fn lse_config<D: DelayNs>(
    rcc: &RegisterBlock,
    state: ExtOscState,
    delay: &mut D,
) -> Result<(), Error> {
    let current = rcc.lse_state();
    if state == current {
        return Ok(());
    }

    #[cfg(feature = "log")]
    trace!("RCC: LSE {:?} -> {:?}", current, state);

    // LSEBYP may only change while LSE is off
    rcc.lse_disable();
    wait_until(delay, LSE_TIMEOUT, Clock::Lse, || !rcc.lse_is_ready())?;
    rcc.lse_bypass_disable();

    match state {
        ExtOscState::Off => Ok(()),
        ExtOscState::On | ExtOscState::Bypass => {
            if state == ExtOscState::Bypass {
                rcc.lse_bypass_enable();
            }
            rcc.lse_enable();
            wait_until(delay, LSE_TIMEOUT, Clock::Lse, || rcc.lse_is_ready())
        }
    }
}

fn rtc_config<D: DelayNs>(
    rcc: &RegisterBlock,
    source: RtcClkSource,
    delay: &mut D,
) -> Result<(), Error> {
    let current = rcc.get_rtc_clk_source();

    // RTCSEL is write-once until the RTC domain is reset
    if current != RtcClkSource::None && current != source {
        let bdcr = rcc.bdcr.read() & !BDCR_RTCSEL;

        #[cfg(feature = "log")]
        trace!("RCC: RTC domain reset, BDCR = {:#x}", bdcr);

        rcc.force_backup_domain_reset();
        rcc.release_backup_domain_reset();
        rcc.bdcr.write(bdcr);

        if bdcr & BDCR_LSEON != 0 {
            wait_until(delay, LSE_TIMEOUT, Clock::Lse, || rcc.lse_is_ready())?;
        }
    }

    rcc.set_rtc_clk_source(source);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_reason_decoding() {
        // Power-on sets both PORRSTF and PINRSTF
        assert_eq!(
            ResetReason::from_csr((1 << 27) | (1 << 26)),
            ResetReason::PowerOnReset
        );
        assert_eq!(ResetReason::from_csr(1 << 26), ResetReason::PinReset);
        // A software reset also pulls NRST
        assert_eq!(
            ResetReason::from_csr((1 << 28) | (1 << 26)),
            ResetReason::SoftwareReset
        );
        assert_eq!(
            ResetReason::from_csr((1 << 29) | (1 << 26)),
            ResetReason::IndependentWatchdogReset
        );
        assert_eq!(
            ResetReason::from_csr(1 << 25),
            ResetReason::OptionByteLoaderReset
        );
        assert_eq!(
            ResetReason::from_csr(0x0000_0003),
            ResetReason::Unknown { rcc_csr: 3 }
        );
    }
}
