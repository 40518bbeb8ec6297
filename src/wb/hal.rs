//! STM32WB oscillator, system clock and kernel clock configuration
//!
//! The run-time configuration tier on top of the register accessors. Every
//! wait for an oscillator, a PLL, a prescaler update or a clock switch is
//! bounded by a timeout counted on a
//! [`DelayNs`](embedded_hal::delay::DelayNs) provider, and an oscillator that
//! feeds the system clock is never stopped.
//!
//! ```ignore
//! let mut rcc = RCC::take().unwrap().constrain();
//!
//! rcc.osc_config(
//!     &OscConfig {
//!         hse: Some(ExtOscState::On),
//!         pll: Some(PllState::On(PllConfig {
//!             source: PllSource::Hse,
//!             m: PllM::Div2,
//!             n: 8,
//!             p: PllP::Div2,
//!             q: PllDiv::Div2,
//!             r: PllDiv::Div2,
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
//!         ahb4: Some(AhbPrescaler::Div1),
//!         ..Default::default()
//!     },
//!     &flash,
//!     &mut delay,
//! )?;
//! ```

use embedded_hal::delay::DelayNs;
#[cfg(feature = "log")]
use log::trace;

use super::clocks::{
    calc_hclk_freq, CoreClocks, I2c, Lptim, OscillatorValues, Usart, HSI,
};
use super::ll::{
    AdcClkSel, AhbPrescaler, ApbPrescaler, Clk48ClkSel, I2cClkSel, LptimClkSel,
    McoPrescaler, McoSource, MsiRange, PllDiv, PllM, PllP, PllSource,
    RfWakeupClkSource, RngClkSel, RtcClkSource, SaiClkSel, SmpsClkSource,
    SmpsPrescaler, SysClkSource, UsartClkSel,
};
use super::regs::{RegisterBlock, FLASH, PWR};
use super::{flash_latency, Rcc};
use crate::rcc::{wait_until, Clock, ClockFreq, Error};
use crate::time::{Hertz, MilliSeconds};

/// HSE32 start-up timeout
pub const HSE_TIMEOUT: MilliSeconds = MilliSeconds::millis(100);
/// MSI start-up timeout
pub const MSI_TIMEOUT: MilliSeconds = MilliSeconds::millis(2);
/// HSI16 start-up timeout
pub const HSI_TIMEOUT: MilliSeconds = MilliSeconds::millis(2);
/// HSI48 start-up timeout
pub const HSI48_TIMEOUT: MilliSeconds = MilliSeconds::millis(2);
/// LSI1 and LSI2 start-up timeout
pub const LSI_TIMEOUT: MilliSeconds = MilliSeconds::millis(2);
/// LSE start-up timeout
pub const LSE_TIMEOUT: MilliSeconds = MilliSeconds::millis(5000);
/// PLL and PLLSAI1 lock timeout
pub const PLL_TIMEOUT: MilliSeconds = MilliSeconds::millis(2);
/// System clock switch and prescaler update timeout
pub const CLOCKSWITCH_TIMEOUT: MilliSeconds = MilliSeconds::millis(5000);
/// Backup domain write access timeout
pub const DBP_TIMEOUT: MilliSeconds = MilliSeconds::millis(100);

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

/// State of the MSI oscillator
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MsiState {
    /// Stopped
    Off,
    /// Running
    On {
        /// Frequency range
        range: MsiRange,
        /// MSITRIM, 0 is the factory setting
        trim: u8,
    },
}

/// State of an oscillator with a trimming value
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrimmedOscState {
    /// Stopped
    Off,
    /// Running with a trimming value
    On {
        /// HSITRIM (0..=127, 64 is the factory setting) or LSI2TRIM
        /// (0..=15)
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
///
/// The R output drives SYSCLK and is always enabled. The P and Q outputs are
/// enabled when a kernel clock selects them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PllConfig {
    /// Entry clock, shared with PLLSAI1
    pub source: PllSource,
    /// Input divider, shared with PLLSAI1
    pub m: PllM,
    /// VCO multiplication factor (6..=127)
    pub n: u8,
    /// P output divider (SAI1, ADC)
    pub p: PllP,
    /// Q output divider (CLK48)
    pub q: PllDiv,
    /// R output divider (SYSCLK)
    pub r: PllDiv,
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

/// PLLSAI1 settings
///
/// PLLSAI1 runs from the entry clock and input divider of the main PLL.
/// Outputs set to `None` are disabled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PllSai1Config {
    /// VCO multiplication factor (6..=127)
    pub n: u8,
    /// P output divider (SAI1)
    pub p: Option<PllP>,
    /// Q output divider (CLK48)
    pub q: Option<PllDiv>,
    /// R output divider (ADC)
    pub r: Option<PllDiv>,
}

/// State of PLLSAI1
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllSai1State {
    /// Stopped
    Off,
    /// Configured and locked
    On(PllSai1Config),
}

/// Oscillator and PLL configuration
///
/// `None` leaves an oscillator as it is.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct OscConfig {
    /// MSI oscillator
    pub msi: Option<MsiState>,
    /// HSI16 oscillator
    pub hsi: Option<TrimmedOscState>,
    /// HSE32 oscillator
    pub hse: Option<ExtOscState>,
    /// Divide HSE32 by 2 ahead of SYSCLK and the PLLs, applied when HSE32
    /// is started
    pub hse_div2: bool,
    /// LSE oscillator
    pub lse: Option<ExtOscState>,
    /// LSI1 oscillator
    pub lsi1: Option<OscState>,
    /// LSI2 oscillator
    pub lsi2: Option<TrimmedOscState>,
    /// HSI48 oscillator
    pub hsi48: Option<OscState>,
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
    /// CPU1 AHB prescaler (HCLK1)
    pub ahb: Option<AhbPrescaler>,
    /// CPU2 AHB prescaler (HCLK2)
    pub c2_ahb: Option<AhbPrescaler>,
    /// Shared AHB4 prescaler (HCLK4)
    pub ahb4: Option<AhbPrescaler>,
    /// APB1 prescaler
    pub apb1: Option<ApbPrescaler>,
    /// APB2 prescaler
    pub apb2: Option<ApbPrescaler>,
}

/// Kernel clock selections
///
/// `None` leaves a selection as it is. Changing the RTC source resets the
/// backup domain.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PeriphClkConfig {
    /// RTC clock source
    pub rtc: Option<RtcClkSource>,
    /// RF wake-up clock source
    pub rfwkp: Option<RfWakeupClkSource>,
    /// USART1 kernel clock
    pub usart1: Option<UsartClkSel>,
    /// LPUART1 kernel clock
    pub lpuart1: Option<UsartClkSel>,
    /// I2C1 kernel clock
    pub i2c1: Option<I2cClkSel>,
    /// I2C3 kernel clock
    pub i2c3: Option<I2cClkSel>,
    /// LPTIM1 kernel clock
    pub lptim1: Option<LptimClkSel>,
    /// LPTIM2 kernel clock
    pub lptim2: Option<LptimClkSel>,
    /// SAI1 kernel clock
    pub sai1: Option<SaiClkSel>,
    /// 48 MHz clock (USB, RNG)
    pub clk48: Option<Clk48ClkSel>,
    /// RNG kernel clock
    pub rng: Option<RngClkSel>,
    /// ADC kernel clock
    pub adc: Option<AdcClkSel>,
    /// SMPS step down converter clock source and prescaler
    pub smps: Option<(SmpsClkSource, SmpsPrescaler)>,
}

/// Kernel clocks whose frequency can be read back
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeriphClk {
    /// RTC clock
    Rtc,
    /// RF wake-up clock
    RfWakeup,
    /// USART / LPUART kernel clock
    Usart(Usart),
    /// I2C kernel clock
    I2c(I2c),
    /// LPTIM kernel clock
    Lptim(Lptim),
    /// SAI1 kernel clock
    Sai1,
    /// 48 MHz clock
    Clk48,
    /// USB kernel clock
    Usb,
    /// RNG kernel clock
    Rng,
    /// ADC kernel clock
    Adc,
    /// SMPS step down converter clock
    Smps,
}

/// Reason of the last reset
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetReason {
    /// Brown-out reset, power-on included
    BrownOutReset,
    /// Reset from the NRST pin
    PinReset,
    /// Software reset
    SoftwareReset,
    /// Independent watchdog
    IndependentWatchdogReset,
    /// Window watchdog
    WindowWatchdogReset,
    /// Illegal Stop, Standby or Shutdown entry
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
        let flag = |bit: u32| csr & (1 << bit) != 0;

        // Every reset source also sets PINRSTF
        if flag(27) {
            ResetReason::BrownOutReset
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
        } else if flag(26) {
            ResetReason::PinReset
        } else {
            ResetReason::Unknown { rcc_csr: csr }
        }
    }
}

impl RegisterBlock {
    /// Returns `true` if the oscillator behind `source` is the system clock
    /// or feeds the PLL that is
    pub(crate) fn osc_in_use(&self, sysclk: SysClkSource, pll: PllSource) -> bool {
        match self.sys_clk_source_status() {
            SysClkSource::Pll => self.get_pll_main_source() == pll,
            s => s == sysclk,
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
            m: self.get_pll_divider(),
            n: self.get_pll_n() as u8,
            p: self.get_pll_p(),
            q: self.get_pll_q(),
            r: self.get_pll_r(),
        }
    }

    /// Frequency SYSCLK would have when switched to `source`
    fn sysclk_source_freq(
        &self,
        source: SysClkSource,
        osc: &OscillatorValues,
    ) -> Hertz {
        match source {
            SysClkSource::Msi => self.msi_freq(),
            SysClkSource::Hsi => HSI,
            SysClkSource::Hse => self.hse_sys_freq(osc),
            SysClkSource::Pll => self.pll_freq_domain_sys(osc),
        }
    }
}

/// Start or stop an oscillator without settings and wait for its ready
/// flag
macro_rules! on_off {
    ($rcc:ident, $delay:ident, $state:expr, $timeout:expr, $clock:expr,
     $enable:ident, $disable:ident, $ready:ident) => {
        match $state {
            OscState::On => {
                $rcc.$enable();
                wait_until($delay, $timeout, $clock, || $rcc.$ready())
            }
            OscState::Off => {
                $rcc.$disable();
                wait_until($delay, $timeout, $clock, || !$rcc.$ready())
            }
        }
    };
}

impl Rcc {
    /// Start or stop oscillators and the main PLL
    ///
    /// The oscillators are handled in the order MSI, HSI16, HSE32, LSI1,
    /// LSI2, LSE, HSI48, PLL. The first failure stops the sequence.
    ///
    /// `pwr` is required to enable write access to the backup domain, where
    /// the LSE control bits live.
    pub fn osc_config<D: DelayNs>(
        &mut self,
        cfg: &OscConfig,
        pwr: &PWR,
        delay: &mut D,
    ) -> Result<(), Error> {
        if let Some(state) = cfg.msi {
            self.msi_config(state, delay)?;
        }
        if let Some(state) = cfg.hsi {
            self.hsi_config(state, delay)?;
        }
        if let Some(state) = cfg.hse {
            self.hse_config(state, cfg.hse_div2, delay)?;
        }
        let rcc = &*self.rb;
        if let Some(state) = cfg.lsi1 {
            #[cfg(feature = "log")]
            trace!("RCC: LSI1 {:?}", state);

            on_off!(rcc, delay, state, LSI_TIMEOUT, Clock::Lsi1,
                lsi1_enable, lsi1_disable, lsi1_is_ready)?;
        }
        if let Some(state) = cfg.lsi2 {
            #[cfg(feature = "log")]
            trace!("RCC: LSI2 {:?}", state);

            match state {
                TrimmedOscState::On { trim } => {
                    rcc.set_lsi2_trimming(trim as u32);
                    on_off!(rcc, delay, OscState::On, LSI_TIMEOUT, Clock::Lsi2,
                        lsi2_enable, lsi2_disable, lsi2_is_ready)?;
                }
                TrimmedOscState::Off => {
                    on_off!(rcc, delay, OscState::Off, LSI_TIMEOUT, Clock::Lsi2,
                        lsi2_enable, lsi2_disable, lsi2_is_ready)?;
                }
            }
        }
        if let Some(state) = cfg.lse {
            self.with_backup_access(pwr, delay, |rcc, delay| {
                lse_config(rcc, state, delay)
            })?;
        }
        if let Some(state) = cfg.hsi48 {
            let rcc = &*self.rb;

            #[cfg(feature = "log")]
            trace!("RCC: HSI48 {:?}", state);

            on_off!(rcc, delay, state, HSI48_TIMEOUT, Clock::Hsi48,
                hsi48_enable, hsi48_disable, hsi48_is_ready)?;
        }
        if let Some(state) = cfg.pll {
            self.pll_config(state, delay)?;
        }
        Ok(())
    }

    fn msi_config<D: DelayNs>(
        &mut self,
        state: MsiState,
        delay: &mut D,
    ) -> Result<(), Error> {
        let rcc = &*self.rb;
        let in_use = rcc.osc_in_use(SysClkSource::Msi, PllSource::Msi);

        match state {
            MsiState::On { range, trim } => {
                // MSIRANGE changes the SYSCLK frequency under a fixed
                // flash latency
                if in_use && range != rcc.get_msi_range() {
                    return Err(Error::InUse(Clock::Msi));
                }
                if !rcc.msi_is_ready() {
                    #[cfg(feature = "log")]
                    trace!("RCC: MSI on");

                    rcc.msi_enable();
                    wait_until(delay, MSI_TIMEOUT, Clock::Msi, || {
                        rcc.msi_is_ready()
                    })?;
                }
                rcc.set_msi_range(range);
                rcc.set_msi_calib_trimming(trim as u32);
                Ok(())
            }
            MsiState::Off if in_use => Err(Error::InUse(Clock::Msi)),
            MsiState::Off => {
                #[cfg(feature = "log")]
                trace!("RCC: MSI off");

                rcc.msi_disable();
                wait_until(delay, MSI_TIMEOUT, Clock::Msi, || {
                    !rcc.msi_is_ready()
                })
            }
        }
    }

    fn hsi_config<D: DelayNs>(
        &mut self,
        state: TrimmedOscState,
        delay: &mut D,
    ) -> Result<(), Error> {
        let rcc = &*self.rb;

        match state {
            TrimmedOscState::On { trim } => {
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
            TrimmedOscState::Off
                if rcc.osc_in_use(SysClkSource::Hsi, PllSource::Hsi) =>
            {
                Err(Error::InUse(Clock::Hsi))
            }
            TrimmedOscState::Off => {
                #[cfg(feature = "log")]
                trace!("RCC: HSI off");

                rcc.hsi_disable();
                wait_until(delay, HSI_TIMEOUT, Clock::Hsi, || {
                    !rcc.hsi_is_ready()
                })
            }
        }
    }

    fn hse_config<D: DelayNs>(
        &mut self,
        state: ExtOscState,
        div2: bool,
        delay: &mut D,
    ) -> Result<(), Error> {
        let rcc = &*self.rb;
        let current = rcc.hse_state();
        let unchanged = state == current
            && (state == ExtOscState::Off || div2 == rcc.hse_div2_is_enabled());

        if rcc.osc_in_use(SysClkSource::Hse, PllSource::Hse) {
            return if unchanged {
                Ok(())
            } else {
                Err(Error::InUse(Clock::Hse))
            };
        }
        if unchanged {
            return Ok(());
        }

        #[cfg(feature = "log")]
        trace!("RCC: HSE {:?} -> {:?}, /2 {}", current, state, div2);

        // HSEBYP and HSEPRE may only change while HSE is off
        rcc.hse_disable();
        wait_until(delay, HSE_TIMEOUT, Clock::Hse, || !rcc.hse_is_ready())?;
        rcc.hse_bypass_disable();

        match state {
            ExtOscState::Off => Ok(()),
            ExtOscState::On | ExtOscState::Bypass => {
                if state == ExtOscState::Bypass {
                    rcc.hse_bypass_enable();
                }
                if div2 {
                    rcc.hse_div2_enable();
                } else {
                    rcc.hse_div2_disable();
                }
                rcc.hse_enable();
                wait_until(delay, HSE_TIMEOUT, Clock::Hse, || {
                    rcc.hse_is_ready()
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

        if let PllState::On(cfg) = state {
            if !(6..=127).contains(&cfg.n) || cfg.source == PllSource::None {
                return Err(Error::InvalidConfig);
            }
            // The entry clock and M are shared with a running PLLSAI1
            if rcc.pllsai1_is_enabled()
                && (cfg.source != rcc.get_pll_main_source()
                    || cfg.m != rcc.get_pll_divider())
            {
                return Err(Error::InUse(Clock::PllSai1));
            }
        }

        #[cfg(feature = "log")]
        trace!("RCC: PLL {:?}", state);

        rcc.pll_disable();
        wait_until(delay, PLL_TIMEOUT, Clock::Pll, || !rcc.pll_is_ready())?;

        if let PllState::On(cfg) = state {
            let n = cfg.n as u32;
            rcc.pll_config_domain_sys(cfg.source, cfg.m, n, cfg.r);
            rcc.pll_config_domain_sai(cfg.source, cfg.m, n, cfg.p);
            rcc.pll_config_domain_48m(cfg.source, cfg.m, n, cfg.q);
            rcc.pll_domain_sys_enable();
            rcc.pll_enable();
            wait_until(delay, PLL_TIMEOUT, Clock::Pll, || rcc.pll_is_ready())?;
        }
        Ok(())
    }

    /// Start or stop PLLSAI1
    ///
    /// PLLSAI1 runs from the entry clock and input divider programmed for
    /// the main PLL: [`Error::InvalidConfig`] is returned when no entry
    /// clock is selected, or when no output is requested.
    pub fn pllsai1_config<D: DelayNs>(
        &mut self,
        state: PllSai1State,
        delay: &mut D,
    ) -> Result<(), Error> {
        let rcc = &*self.rb;

        let source = rcc.get_pll_main_source();
        let m = rcc.get_pll_divider();
        if let PllSai1State::On(cfg) = state {
            if source == PllSource::None
                || !(6..=127).contains(&cfg.n)
                || (cfg.p.is_none() && cfg.q.is_none() && cfg.r.is_none())
            {
                return Err(Error::InvalidConfig);
            }
        }

        #[cfg(feature = "log")]
        trace!("RCC: PLLSAI1 {:?}", state);

        rcc.pllsai1_disable();
        wait_until(delay, PLL_TIMEOUT, Clock::PllSai1, || {
            !rcc.pllsai1_is_ready()
        })?;

        let PllSai1State::On(cfg) = state else {
            return Ok(());
        };
        let n = cfg.n as u32;

        macro_rules! output {
            ($div:expr, $config:ident, $enable:ident, $disable:ident) => {
                match $div {
                    Some(div) => {
                        rcc.$config(source, m, n, div);
                        rcc.$enable();
                    }
                    None => rcc.$disable(),
                }
            };
        }
        output!(cfg.p, pllsai1_config_domain_sai,
            pllsai1_domain_sai_enable, pllsai1_domain_sai_disable);
        output!(cfg.q, pllsai1_config_domain_48m,
            pllsai1_domain_48m_enable, pllsai1_domain_48m_disable);
        output!(cfg.r, pllsai1_config_domain_adc,
            pllsai1_domain_adc_enable, pllsai1_domain_adc_disable);

        rcc.pllsai1_enable();
        wait_until(delay, PLL_TIMEOUT, Clock::PllSai1, || {
            rcc.pllsai1_is_ready()
        })
    }

    /// Run `f` with write access to the backup domain
    fn with_backup_access<D: DelayNs, R>(
        &mut self,
        pwr: &PWR,
        delay: &mut D,
        f: impl FnOnce(&RegisterBlock, &mut D) -> Result<R, Error>,
    ) -> Result<R, Error> {
        if !pwr.backup_access_is_enabled() {
            pwr.backup_access_enable();
            wait_until(delay, DBP_TIMEOUT, Clock::BackupDomain, || {
                pwr.backup_access_is_enabled()
            })?;
        }
        f(&*self.rb, delay)
    }

    /// Select the system clock and program the bus prescalers of both CPUs
    ///
    /// The flash wait states follow the new HCLK4 frequency (0 up to
    /// 18 MHz, 1 up to 36 MHz, 2 up to 54 MHz, 3 above). They are raised
    /// before and lowered after the frequency changes.
    ///
    /// Returns the resulting core clock frequencies.
    pub fn clock_config<D: DelayNs>(
        &mut self,
        cfg: &ClkConfig,
        flash: &FLASH,
        delay: &mut D,
    ) -> Result<CoreClocks, Error> {
        let rcc = &*self.rb;

        let source = cfg.sysclk.unwrap_or(rcc.sys_clk_source_status());
        if cfg.sysclk.is_some() {
            let (ready, clock) = match source {
                SysClkSource::Msi => (rcc.msi_is_ready(), Clock::Msi),
                SysClkSource::Hsi => (rcc.hsi_is_ready(), Clock::Hsi),
                SysClkSource::Hse => (rcc.hse_is_ready(), Clock::Hse),
                SysClkSource::Pll => (rcc.pll_is_ready(), Clock::Pll),
            };
            if !ready {
                return Err(Error::NotReady(clock));
            }
        }

        let sysclk = rcc.sysclk_source_freq(source, &self.osc).raw();
        let hclk4 = calc_hclk_freq(
            sysclk,
            cfg.ahb4.unwrap_or(rcc.get_ahb4_prescaler()),
        );
        let latency = flash_latency(hclk4);

        if latency > flash.latency() {
            flash.set_latency(latency);
            wait_until(delay, CLOCKSWITCH_TIMEOUT, Clock::FlashLatency, || {
                flash.latency() == latency
            })?;
        }

        if let Some(hpre) = cfg.ahb {
            rcc.set_ahb_prescaler(hpre);
            wait_until(delay, CLOCKSWITCH_TIMEOUT, Clock::HclkPrescaler, || {
                rcc.is_active_flag_hpre()
            })?;
        }
        if let Some(c2hpre) = cfg.c2_ahb {
            rcc.set_c2_ahb_prescaler(c2hpre);
            wait_until(delay, CLOCKSWITCH_TIMEOUT, Clock::HclkPrescaler, || {
                rcc.is_active_flag_c2hpre()
            })?;
        }
        if let Some(shdhpre) = cfg.ahb4 {
            rcc.set_ahb4_prescaler(shdhpre);
            wait_until(delay, CLOCKSWITCH_TIMEOUT, Clock::HclkPrescaler, || {
                rcc.is_active_flag_shdhpre()
            })?;
        }
        if let Some(ppre1) = cfg.apb1 {
            rcc.set_apb1_prescaler(ppre1);
            wait_until(delay, CLOCKSWITCH_TIMEOUT, Clock::HclkPrescaler, || {
                rcc.is_active_flag_ppre1()
            })?;
        }
        if let Some(ppre2) = cfg.apb2 {
            rcc.set_apb2_prescaler(ppre2);
            wait_until(delay, CLOCKSWITCH_TIMEOUT, Clock::HclkPrescaler, || {
                rcc.is_active_flag_ppre2()
            })?;
        }

        if cfg.sysclk.is_some() {
            #[cfg(feature = "log")]
            trace!("RCC: SYSCLK from {:?}", source);

            rcc.set_sys_clk_source(source);
            wait_until(delay, CLOCKSWITCH_TIMEOUT, Clock::SysClk, || {
                rcc.sys_clk_source_status() == source
            })?;
        }

        if latency < flash.latency() {
            flash.set_latency(latency);
            wait_until(delay, CLOCKSWITCH_TIMEOUT, Clock::FlashLatency, || {
                flash.latency() == latency
            })?;
        }

        Ok(rcc.system_clocks_freq(&self.osc))
    }

    /// Read back the oscillator and PLL configuration
    pub fn osc_config_get(&self) -> OscConfig {
        let rcc = &*self.rb;
        let on_off = |on: bool| if on { OscState::On } else { OscState::Off };
        OscConfig {
            msi: Some(if rcc.msi_is_enabled() {
                MsiState::On {
                    range: rcc.get_msi_range(),
                    trim: rcc.get_msi_calib_trimming() as u8,
                }
            } else {
                MsiState::Off
            }),
            hsi: Some(if rcc.hsi_is_enabled() {
                TrimmedOscState::On {
                    trim: rcc.get_hsi_calib_trimming() as u8,
                }
            } else {
                TrimmedOscState::Off
            }),
            hse: Some(rcc.hse_state()),
            hse_div2: rcc.hse_div2_is_enabled(),
            lse: Some(rcc.lse_state()),
            lsi1: Some(on_off(rcc.lsi1_is_enabled())),
            lsi2: Some(if rcc.lsi2_is_enabled() {
                TrimmedOscState::On {
                    trim: rcc.get_lsi2_trimming() as u8,
                }
            } else {
                TrimmedOscState::Off
            }),
            hsi48: Some(on_off(rcc.hsi48_is_enabled())),
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
            c2_ahb: Some(rcc.get_c2_ahb_prescaler()),
            ahb4: Some(rcc.get_ahb4_prescaler()),
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

    /// Enable the clock security system on HSE32
    ///
    /// An HSE32 failure raises the NMI, handled by
    /// [`nmi_irq_handler`](Self::nmi_irq_handler). The CSS stays on until
    /// the next reset.
    pub fn enable_css(&mut self) {
        self.rb.hse_css_enable();
    }

    /// Enable the clock security system on LSE
    ///
    /// LSE must be ready and write access to the backup domain enabled.
    pub fn enable_lse_css(&mut self) {
        self.rb.lse_css_enable();
    }

    /// Disable the clock security system on LSE
    pub fn disable_lse_css(&mut self) {
        self.rb.lse_css_disable();
    }

    /// Handle an HSE32 clock security event
    ///
    /// Call from the NMI handler. When the CSS flag is set it is cleared
    /// and `callback` is run.
    pub fn nmi_irq_handler(&mut self, callback: impl FnOnce()) {
        let rcc = &*self.rb;
        if rcc.is_active_flag_hsecss() {
            rcc.clear_flag_hsecss();
            interrupt_clear_clock_sync_delay!(rcc.cifr);
            callback();
        }
    }

    /// Handle an LSE clock security event
    ///
    /// Call from the RCC interrupt handler. When the LSE CSS flag is set it
    /// is cleared and `callback` is run.
    pub fn lse_css_irq_handler(&mut self, callback: impl FnOnce()) {
        let rcc = &*self.rb;
        if rcc.is_active_flag_lsecss() {
            rcc.clear_flag_lsecss();
            interrupt_clear_clock_sync_delay!(rcc.cifr);
            callback();
        }
    }

    /// Select kernel clocks
    ///
    /// Changing the RTC clock source resets the backup domain: the RTC
    /// registers and backup registers return to their reset values. The
    /// other BDCR settings, the LSE among them, are restored.
    ///
    /// Main PLL outputs selected by SAI1, the ADC or CLK48 are enabled.
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
            rfwkp => set_rfwkp_clk_source,
            usart1 => set_usart1_clk_source,
            lpuart1 => set_lpuart1_clk_source,
            i2c1 => set_i2c1_clk_source,
            i2c3 => set_i2c3_clk_source,
            lptim1 => set_lptim1_clk_source,
            lptim2 => set_lptim2_clk_source,
            sai1 => set_sai1_clk_source,
            clk48 => set_clk48_clk_source,
            rng => set_rng_clk_source,
            adc => set_adc_clk_source,
        }

        if cfg.sai1 == Some(SaiClkSel::Pll) {
            rcc.pll_domain_sai_enable();
        }
        if cfg.adc == Some(AdcClkSel::Pll) {
            rcc.pll_domain_adc_enable();
        }
        if cfg.clk48 == Some(Clk48ClkSel::Pll) {
            rcc.pll_domain_48m_enable();
        }

        if let Some((source, div)) = cfg.smps {
            rcc.set_smps_clk_source(source);
            rcc.set_smps_prescaler(div);
        }
        Ok(())
    }

    /// Frequency of a kernel clock
    pub fn periph_clk_freq(&self, clk: PeriphClk) -> ClockFreq {
        let rcc = &*self.rb;
        let osc = &self.osc;
        match clk {
            PeriphClk::Rtc => rcc.rtc_clk_freq(osc),
            PeriphClk::RfWakeup => rcc.rfwkp_clk_freq(osc),
            PeriphClk::Usart(usart) => rcc.usart_clk_freq(osc, usart),
            PeriphClk::I2c(i2c) => rcc.i2c_clk_freq(osc, i2c),
            PeriphClk::Lptim(lptim) => rcc.lptim_clk_freq(osc, lptim),
            PeriphClk::Sai1 => rcc.sai_clk_freq(osc),
            PeriphClk::Clk48 => rcc.clk48_clk_freq(osc),
            PeriphClk::Usb => rcc.usb_clk_freq(osc),
            PeriphClk::Rng => rcc.rng_clk_freq(osc),
            PeriphClk::Adc => rcc.adc_clk_freq(osc),
            PeriphClk::Smps => rcc.smps_clk_freq(osc),
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

    // RTCSEL is write-once until the backup domain is reset
    if current != RtcClkSource::None && current != source {
        let bdcr = rcc.bdcr.read() & !BDCR_RTCSEL;

        #[cfg(feature = "log")]
        trace!("RCC: backup domain reset, BDCR = {:#x}", bdcr);

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
        // Reset value after power-on: BORRSTF and PINRSTF
        assert_eq!(
            ResetReason::from_csr(0x0C00_0000),
            ResetReason::BrownOutReset
        );
        assert_eq!(ResetReason::from_csr(1 << 26), ResetReason::PinReset);
        assert_eq!(
            ResetReason::from_csr((1 << 28) | (1 << 26)),
            ResetReason::SoftwareReset
        );
        assert_eq!(
            ResetReason::from_csr((1 << 30) | (1 << 26)),
            ResetReason::WindowWatchdogReset
        );
        assert_eq!(
            ResetReason::from_csr((1 << 31) | (1 << 26)),
            ResetReason::LowPowerReset
        );
        assert_eq!(ResetReason::from_csr(0), ResetReason::Unknown { rcc_csr: 0 });
    }

    #[test]
    fn oscillator_use() {
        let rcc = RegisterBlock::new();
        // MSI is the system clock at reset
        assert!(rcc.osc_in_use(SysClkSource::Msi, PllSource::Msi));
        assert!(!rcc.osc_in_use(SysClkSource::Hsi, PllSource::Hsi));

        rcc.cfgr.set_field(2, 2, SysClkSource::Pll.bits());
        rcc.set_pll_main_source(PllSource::Hse);
        assert!(rcc.osc_in_use(SysClkSource::Hse, PllSource::Hse));
        assert!(!rcc.osc_in_use(SysClkSource::Msi, PllSource::Msi));
    }
}
