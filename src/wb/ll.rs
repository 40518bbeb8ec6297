//! STM32WB low-layer RCC accessors
//!
//! Every RCC bit-field is exposed as a method on the
//! [`RegisterBlock`]. Multi-bit fields are typed with enumerations whose
//! discriminants are the hardware encodings (RM0434 Section 7.4).
//!
//! Accessors prefixed with `c2` act on the settings of CPU2.
//!
//! ```ignore
//! let rcc = RCC::take().unwrap();
//!
//! rcc.hse_enable();
//! while !rcc.hse_is_ready() {}
//!
//! rcc.pll_config_domain_sys(PllSource::Hse, PllM::Div2, 8, PllDiv::Div2);
//! rcc.pll_domain_sys_enable();
//! rcc.pll_enable();
//! ```

use super::regs::RegisterBlock;
use crate::rcc::{spin_until, Clock, Error};

bits_enum! {
    /// System clock switch (SW) and status (SWS)
    pub enum SysClkSource {
        /// MSI oscillator
        Msi = 0b00,
        /// HSI16 oscillator
        Hsi = 0b01,
        /// HSE32 oscillator
        Hse = 0b10,
        /// Main PLL R output
        Pll = 0b11,
    }
    reserved => Msi;

    /// AHB prescaler (HPRE, C2HPRE, SHDHPRE)
    pub enum AhbPrescaler {
        /// Not divided
        Div1 = 0b0000,
        /// / 2
        Div2 = 0b1000,
        /// / 3
        Div3 = 0b0001,
        /// / 4
        Div4 = 0b1001,
        /// / 5
        Div5 = 0b0010,
        /// / 6
        Div6 = 0b0101,
        /// / 8
        Div8 = 0b1010,
        /// / 10
        Div10 = 0b0110,
        /// / 16
        Div16 = 0b1011,
        /// / 32
        Div32 = 0b0111,
        /// / 64
        Div64 = 0b1100,
        /// / 128
        Div128 = 0b1101,
        /// / 256
        Div256 = 0b1110,
        /// / 512
        Div512 = 0b1111,
    }
    reserved => Div1;

    /// APB1 (PPRE1) and APB2 (PPRE2) prescaler
    pub enum ApbPrescaler {
        /// HCLK1 not divided
        Div1 = 0b000,
        /// HCLK1 / 2
        Div2 = 0b100,
        /// HCLK1 / 4
        Div4 = 0b101,
        /// HCLK1 / 8
        Div8 = 0b110,
        /// HCLK1 / 16
        Div16 = 0b111,
    }
    reserved => Div1;

    /// Microcontroller clock output source (MCOSEL)
    pub enum McoSource {
        /// MCO output disabled
        NoClock = 0b0000,
        /// System clock
        Sysclk = 0b0001,
        /// MSI oscillator
        Msi = 0b0010,
        /// HSI16 oscillator
        Hsi = 0b0011,
        /// HSE32 oscillator after stabilisation
        Hse = 0b0100,
        /// Main PLL R output
        Pll = 0b0101,
        /// LSI1 oscillator
        Lsi1 = 0b0110,
        /// LSI2 oscillator
        Lsi2 = 0b0111,
        /// LSE oscillator
        Lse = 0b1000,
        /// HSI48 oscillator
        Hsi48 = 0b1001,
        /// HSE32 oscillator before stabilisation
        HseBeforeStab = 0b1100,
    }
    reserved => NoClock;

    /// Microcontroller clock output prescaler (MCOPRE)
    pub enum McoPrescaler {
        /// MCO / 1
        Div1 = 0b000,
        /// MCO / 2
        Div2 = 0b001,
        /// MCO / 4
        Div4 = 0b010,
        /// MCO / 8
        Div8 = 0b011,
        /// MCO / 16
        Div16 = 0b100,
    }
    reserved => Div1;

    /// MSI frequency range (MSIRANGE)
    pub enum MsiRange {
        /// 100 kHz
        Range100k = 0,
        /// 200 kHz
        Range200k = 1,
        /// 400 kHz
        Range400k = 2,
        /// 800 kHz
        Range800k = 3,
        /// 1 MHz
        Range1M = 4,
        /// 2 MHz
        Range2M = 5,
        /// 4 MHz, the reset value
        Range4M = 6,
        /// 8 MHz
        Range8M = 7,
        /// 16 MHz
        Range16M = 8,
        /// 24 MHz
        Range24M = 9,
        /// 32 MHz
        Range32M = 10,
        /// 48 MHz
        Range48M = 11,
    }
    reserved => Range48M;

    /// Clock used after wake-up from Stop (STOPWUCK)
    pub enum StopWakeupClock {
        /// MSI oscillator
        Msi = 0,
        /// HSI16 oscillator
        Hsi = 1,
    }
    reserved => Msi;

    /// Radio system clock source (RFCSS)
    pub enum RfClkSource {
        /// HSI16 oscillator
        Hsi = 0,
        /// HSE32 oscillator / 2
        HseDiv2 = 1,
    }
    reserved => Hsi;

    /// SMPS step down converter clock source selection (SMPSSEL)
    pub enum SmpsClkSource {
        /// HSI16 oscillator
        Hsi = 0b00,
        /// MSI oscillator, in the 16, 24, 32 and 48 MHz ranges only
        Msi = 0b01,
        /// HSE32 oscillator
        Hse = 0b10,
    }
    reserved => Hsi;

    /// SMPS step down converter clock in use (SMPSSWS)
    pub enum SmpsClkStatus {
        /// HSI16 oscillator
        Hsi = 0b00,
        /// MSI oscillator
        Msi = 0b01,
        /// HSE32 oscillator
        Hse = 0b10,
        /// No clock
        NoClock = 0b11,
    }
    reserved => NoClock;

    /// SMPS step down converter clock prescaler (SMPSDIV)
    pub enum SmpsPrescaler {
        /// Division setting 0
        Div0 = 0b00,
        /// Division setting 1
        Div1 = 0b01,
        /// Division setting 2
        Div2 = 0b10,
        /// Division setting 3
        Div3 = 0b11,
    }
    reserved => Div0;

    /// HSE current control maximum limit (HSEGMC)
    pub enum HseCurrentMax {
        /// 0.18 mA/V
        Max0 = 0b000,
        /// 0.57 mA/V
        Max1 = 0b001,
        /// 0.78 mA/V
        Max2 = 0b010,
        /// 1.13 mA/V
        Max3 = 0b011,
        /// 0.61 mA/V
        Max4 = 0b100,
        /// 1.65 mA/V
        Max5 = 0b101,
        /// 2.12 mA/V
        Max6 = 0b110,
        /// 2.84 mA/V
        Max7 = 0b111,
    }
    reserved => Max0;

    /// HSE sense amplifier threshold (HSES)
    pub enum HseSenseAmplifier {
        /// Bias current factor 1/2
        Threshold1_2 = 0,
        /// Bias current factor 3/4
        Threshold3_4 = 1,
    }
    reserved => Threshold1_2;

    /// LSE oscillator drive capability (LSEDRV)
    pub enum LseDrive {
        /// Lowest drive
        Low = 0b00,
        /// Medium low drive
        MediumLow = 0b01,
        /// Medium high drive
        MediumHigh = 0b10,
        /// Highest drive
        High = 0b11,
    }
    reserved => Low;

    /// Low speed clock output source (LSCOSEL)
    pub enum LscoSource {
        /// LSI oscillator
        Lsi = 0,
        /// LSE oscillator
        Lse = 1,
    }
    reserved => Lsi;

    /// USART1 and LPUART1 kernel clock source
    pub enum UsartClkSel {
        /// APB clock of the bus of the peripheral
        Pclk = 0b00,
        /// System clock
        Sysclk = 0b01,
        /// HSI16 oscillator
        Hsi = 0b10,
        /// LSE oscillator
        Lse = 0b11,
    }
    reserved => Pclk;

    /// I2C1 and I2C3 kernel clock source
    pub enum I2cClkSel {
        /// APB1 clock
        Pclk = 0b00,
        /// System clock
        Sysclk = 0b01,
        /// HSI16 oscillator
        Hsi = 0b10,
    }
    reserved => Pclk;

    /// LPTIM1 and LPTIM2 kernel clock source
    pub enum LptimClkSel {
        /// APB1 clock
        Pclk = 0b00,
        /// LSI oscillator
        Lsi = 0b01,
        /// HSI16 oscillator
        Hsi = 0b10,
        /// LSE oscillator
        Lse = 0b11,
    }
    reserved => Pclk;

    /// SAI1 kernel clock source
    pub enum SaiClkSel {
        /// PLLSAI1 P output
        PllSai1 = 0b00,
        /// Main PLL P output
        Pll = 0b01,
        /// HSI16 oscillator
        Hsi = 0b10,
        /// External input on the SAI1_EXTCLK pin
        Pin = 0b11,
    }
    reserved => PllSai1;

    /// 48 MHz clock (CLK48) source, used by USB and RNG
    pub enum Clk48ClkSel {
        /// HSI48 oscillator
        Hsi48 = 0b00,
        /// PLLSAI1 Q output
        PllSai1 = 0b01,
        /// Main PLL Q output
        Pll = 0b10,
        /// MSI oscillator
        Msi = 0b11,
    }
    reserved => Hsi48;

    /// RNG kernel clock source
    pub enum RngClkSel {
        /// CLK48 / 3
        Clk48Div3 = 0b00,
        /// LSI oscillator
        Lsi = 0b01,
        /// LSE oscillator
        Lse = 0b10,
    }
    reserved => Clk48Div3;

    /// ADC kernel clock source
    pub enum AdcClkSel {
        /// No clock
        None = 0b00,
        /// PLLSAI1 R output
        PllSai1 = 0b01,
        /// Main PLL P output
        Pll = 0b10,
        /// System clock
        Sysclk = 0b11,
    }
    reserved => None;

    /// RTC clock source (RTCSEL)
    pub enum RtcClkSource {
        /// No clock
        None = 0b00,
        /// LSE oscillator
        Lse = 0b01,
        /// LSI oscillator
        Lsi = 0b10,
        /// HSE32 oscillator / 32
        HseDiv32 = 0b11,
    }
    reserved => None;

    /// RF wake-up clock source (RFWKPSEL)
    pub enum RfWakeupClkSource {
        /// No clock
        None = 0b00,
        /// LSE oscillator
        Lse = 0b01,
        /// LSI oscillator
        Lsi = 0b10,
        /// HSE32 oscillator / 1024
        HseDiv1024 = 0b11,
    }
    reserved => None;

    /// Main PLL and PLLSAI1 entry clock source (PLLSRC)
    pub enum PllSource {
        /// No clock
        None = 0b00,
        /// MSI oscillator
        Msi = 0b01,
        /// HSI16 oscillator
        Hsi = 0b10,
        /// HSE32 oscillator, divided by 2 when HSEPRE is set
        Hse = 0b11,
    }
    reserved => None;

    /// Main PLL and PLLSAI1 input divider (PLLM)
    pub enum PllM {
        /// Not divided
        Div1 = 0,
        /// / 2
        Div2 = 1,
        /// / 3
        Div3 = 2,
        /// / 4
        Div4 = 3,
        /// / 5
        Div5 = 4,
        /// / 6
        Div6 = 5,
        /// / 7
        Div7 = 6,
        /// / 8
        Div8 = 7,
    }
    reserved => Div1;

    /// PLL P output divider (PLLP)
    pub enum PllP {
        /// / 2
        Div2 = 1,
        /// / 3
        Div3 = 2,
        /// / 4
        Div4 = 3,
        /// / 5
        Div5 = 4,
        /// / 6
        Div6 = 5,
        /// / 7
        Div7 = 6,
        /// / 8
        Div8 = 7,
        /// / 9
        Div9 = 8,
        /// / 10
        Div10 = 9,
        /// / 11
        Div11 = 10,
        /// / 12
        Div12 = 11,
        /// / 13
        Div13 = 12,
        /// / 14
        Div14 = 13,
        /// / 15
        Div15 = 14,
        /// / 16
        Div16 = 15,
        /// / 17
        Div17 = 16,
        /// / 18
        Div18 = 17,
        /// / 19
        Div19 = 18,
        /// / 20
        Div20 = 19,
        /// / 21
        Div21 = 20,
        /// / 22
        Div22 = 21,
        /// / 23
        Div23 = 22,
        /// / 24
        Div24 = 23,
        /// / 25
        Div25 = 24,
        /// / 26
        Div26 = 25,
        /// / 27
        Div27 = 26,
        /// / 28
        Div28 = 27,
        /// / 29
        Div29 = 28,
        /// / 30
        Div30 = 29,
        /// / 31
        Div31 = 30,
        /// / 32
        Div32 = 31,
    }
    reserved => Div2;

    /// PLL Q and R output divider (PLLQ, PLLR)
    pub enum PllDiv {
        /// / 2
        Div2 = 1,
        /// / 3
        Div3 = 2,
        /// / 4
        Div4 = 3,
        /// / 5
        Div5 = 4,
        /// / 6
        Div6 = 5,
        /// / 7
        Div7 = 6,
        /// / 8
        Div8 = 7,
    }
    reserved => Div2;
}

impl AhbPrescaler {
    /// Division factor
    pub const fn divisor(self) -> u32 {
        super::clocks::AHB_PRESC_DIV[self.bits() as usize] as u32
    }
}

impl PllM {
    /// Division factor
    pub const fn divisor(self) -> u32 {
        self.bits() + 1
    }

    /// The encoding of a division factor in 1..=8
    pub const fn from_divisor(div: u32) -> Option<Self> {
        match div {
            1..=8 => Some(Self::from_bits(div - 1)),
            _ => None,
        }
    }
}

impl PllP {
    /// Division factor
    pub const fn divisor(self) -> u32 {
        self.bits() + 1
    }

    /// The encoding of a division factor in 2..=32
    pub const fn from_divisor(div: u32) -> Option<Self> {
        match div {
            2..=32 => Some(Self::from_bits(div - 1)),
            _ => None,
        }
    }
}

impl PllDiv {
    /// Division factor
    pub const fn divisor(self) -> u32 {
        self.bits() + 1
    }

    /// The encoding of a division factor in 2..=8
    pub const fn from_divisor(div: u32) -> Option<Self> {
        match div {
            2..=8 => Some(Self::from_bits(div - 1)),
            _ => None,
        }
    }
}

/// Key that unlocks a single write of HSECR
pub const HSE_CONTROL_UNLOCK_KEY: u32 = 0xCAFE_CAFE;

// CR
const CR_MSION: u32 = 1 << 0;
const CR_MSIPLLEN: u32 = 1 << 2;
const CR_HSION: u32 = 1 << 8;
const CR_HSIKERON: u32 = 1 << 9;
const CR_HSIASFS: u32 = 1 << 11;
const CR_HSEON: u32 = 1 << 16;
const CR_HSEBYP: u32 = 1 << 18;
const CR_CSSON: u32 = 1 << 19;
const CR_HSEPRE: u32 = 1 << 20;
const CR_PLLON: u32 = 1 << 24;
const CR_PLLSAI1ON: u32 = 1 << 26;
// CFGR
const CFGR_HPREF: u32 = 1 << 16;
const CFGR_PPRE1F: u32 = 1 << 17;
const CFGR_PPRE2F: u32 = 1 << 18;
const CFGR_MCOSEL: u32 = 0xF << 24;
const CFGR_MCOPRE: u32 = 0b111 << 28;
const CFGR_RESET: u32 = CFGR_HPREF | CFGR_PPRE1F | CFGR_PPRE2F;
// PLLCFGR / PLLSAI1CFGR
const PLLCFGR_PLLSRC: u32 = 0b11;
const PLLCFGR_PLLM: u32 = 0b111 << 4;
const PLLCFGR_PLLN: u32 = 0x7F << 8;
const PLLCFGR_PLLP: u32 = 0x1F << 17;
const PLLCFGR_PLLQ: u32 = 0b111 << 25;
const PLLCFGR_PLLR: u32 = 0b111 << 29;
const PLLCFGR_RESET: u32 = 0x2204_0100;
// EXTCFGR
const EXTCFGR_SHDHPREF: u32 = 1 << 16;
const EXTCFGR_C2HPREF: u32 = 1 << 17;
const EXTCFGR_RESET: u32 = EXTCFGR_SHDHPREF | EXTCFGR_C2HPREF;
// CICR
const CICR_ALL: u32 = 0x0000_0F7F;

impl RegisterBlock {
    // ---------------------------------------------------------------- HSE

    bit_control! {
        hse: cr[16] "the HSE32 oscillator";
        hse_bypass: cr[18] "the HSE32 crystal oscillator bypass";
        hse_div2: cr[20] "the HSE32 / 2 prescaler of SYSCLK and the PLL input (HSEPRE)";
    }

    status_bits! {
        hse_is_ready: cr[17] "Returns `true` if the HSE32 oscillator is ready";
    }

    /// Enable the clock security system on HSE32
    ///
    /// CSSON is only cleared by a reset.
    #[inline(always)]
    pub fn hse_css_enable(&self) {
        self.cr.set_bits(CR_CSSON);
    }

    /// Returns `true` if the clock security system is enabled
    #[inline(always)]
    pub fn hse_css_is_enabled(&self) -> bool {
        self.cr.is_set(CR_CSSON)
    }

    /// Returns `true` if HSECR is locked against writes
    #[inline(always)]
    pub fn hse_is_clock_control_locked(&self) -> bool {
        !self.hsecr.bit(0)
    }

    /// Write a HSECR field behind the unlock key
    #[inline(always)]
    fn hsecr_set_field(&self, pos: u8, width: u8, value: u32) {
        self.hsecr.write(HSE_CONTROL_UNLOCK_KEY);
        self.hsecr.set_field(pos, width, value);
    }

    /// Set the HSE32 load capacitor tuning (HSETUNE, 0..=63)
    #[inline(always)]
    pub fn set_hse_capacitor_tuning(&self, value: u32) {
        self.hsecr_set_field(8, 6, value);
    }

    /// Get the HSE32 load capacitor tuning
    #[inline(always)]
    pub fn get_hse_capacitor_tuning(&self) -> u32 {
        self.hsecr.field(8, 6)
    }

    /// Set the HSE32 current control maximum limit
    #[inline(always)]
    pub fn set_hse_current_control(&self, max: HseCurrentMax) {
        self.hsecr_set_field(4, 3, max.bits());
    }

    /// Get the HSE32 current control maximum limit
    #[inline(always)]
    pub fn get_hse_current_control(&self) -> HseCurrentMax {
        HseCurrentMax::from_bits(self.hsecr.field(4, 3))
    }

    /// Set the HSE32 sense amplifier threshold
    #[inline(always)]
    pub fn set_hse_sense_amplifier(&self, threshold: HseSenseAmplifier) {
        self.hsecr_set_field(3, 1, threshold.bits());
    }

    /// Get the HSE32 sense amplifier threshold
    #[inline(always)]
    pub fn get_hse_sense_amplifier(&self) -> HseSenseAmplifier {
        HseSenseAmplifier::from_bits(self.hsecr.field(3, 1))
    }

    // ---------------------------------------------------------------- HSI

    bit_control! {
        hsi: cr[8] "the HSI16 oscillator";
        hsi_in_stop_mode: cr[9] "HSI16 as kernel clock in Stop mode (HSIKERON)";
        hsi_auto_from_stop: cr[11] "the automatic start of HSI16 on wake-up from Stop (HSIASFS)";
    }

    status_bits! {
        hsi_is_ready: cr[10] "Returns `true` if the HSI16 oscillator is ready";
    }

    /// Factory calibration of the HSI16 oscillator (HSICAL)
    #[inline(always)]
    pub fn hsi_calibration(&self) -> u32 {
        self.icscr.field(16, 8)
    }

    field_value! {
        hsi_calib_trimming: icscr[24; 7], "the HSI16 trimming value (default 64)";
    }

    // -------------------------------------------------------------- HSI48

    bit_control! {
        hsi48: crrcr[0] "the HSI48 oscillator";
    }

    status_bits! {
        hsi48_is_ready: crrcr[1] "Returns `true` if the HSI48 oscillator is ready";
    }

    /// Factory calibration of the HSI48 oscillator (HSI48CAL)
    #[inline(always)]
    pub fn hsi48_calibration(&self) -> u32 {
        self.crrcr.field(7, 9)
    }

    // ---------------------------------------------------------------- LSE

    bit_control! {
        lse: bdcr[0] "the LSE oscillator";
        lse_bypass: bdcr[2] "the LSE crystal oscillator bypass";
        lse_css: bdcr[5] "the clock security system on LSE";
    }

    status_bits! {
        lse_is_ready: bdcr[1] "Returns `true` if the LSE oscillator is ready";
        lse_is_css_detected: bdcr[6] "Returns `true` if a failure was detected on LSE";
    }

    field_select! {
        lse_drive_capability: bdcr[3; 2] => LseDrive, "the LSE oscillator drive capability";
    }

    // ---------------------------------------------------------- LSI1/LSI2

    bit_control! {
        lsi1: csr[0] "the LSI1 oscillator";
        lsi2: csr[2] "the LSI2 oscillator";
    }

    status_bits! {
        lsi1_is_ready: csr[1] "Returns `true` if the LSI1 oscillator is ready";
        lsi2_is_ready: csr[3] "Returns `true` if the LSI2 oscillator is ready";
    }

    field_value! {
        lsi2_trimming: csr[8; 4], "the LSI2 trimming value";
    }

    // ---------------------------------------------------------------- MSI

    bit_control! {
        msi: cr[0] "the MSI oscillator";
        msi_pll_mode: cr[2] "the MSI hardware auto calibration with LSE (MSIPLLEN)";
    }

    status_bits! {
        msi_is_ready: cr[1] "Returns `true` if the MSI oscillator is ready";
    }

    field_select! {
        msi_range: cr[4; 4] => MsiRange, "the MSI frequency range";
    }

    /// Factory calibration of the MSI oscillator (MSICAL)
    #[inline(always)]
    pub fn msi_calibration(&self) -> u32 {
        self.icscr.field(0, 8)
    }

    field_value! {
        msi_calib_trimming: icscr[8; 8], "the MSI trimming value";
    }

    // --------------------------------------------------------------- LSCO

    bit_control! {
        lsco: bdcr[24] "the low speed clock output";
    }

    field_select! {
        lsco_source: bdcr[25; 1] => LscoSource, "the low speed clock output source";
    }

    // ------------------------------------------------------------- System

    field_select! {
        sys_clk_source: cfgr[0; 2] => SysClkSource, "the system clock source (SW)";
        ahb_prescaler: cfgr[4; 4] => AhbPrescaler, "the CPU1 AHB prescaler (HCLK1)";
        apb1_prescaler: cfgr[8; 3] => ApbPrescaler, "the APB1 prescaler";
        apb2_prescaler: cfgr[11; 3] => ApbPrescaler, "the APB2 prescaler";
        c2_ahb_prescaler: extcfgr[4; 4] => AhbPrescaler, "the CPU2 AHB prescaler (HCLK2)";
        ahb4_prescaler: extcfgr[0; 4] => AhbPrescaler, "the shared AHB4 prescaler (HCLK4)";
        clk_after_wake_from_stop: cfgr[15; 1] => StopWakeupClock, "the clock used after wake-up from Stop";
    }

    /// The clock currently used as system clock (SWS)
    #[inline(always)]
    pub fn sys_clk_source_status(&self) -> SysClkSource {
        SysClkSource::from_bits(self.cfgr.field(2, 2))
    }

    /// Radio system clock source
    #[inline(always)]
    pub fn get_rf_clk_source(&self) -> RfClkSource {
        RfClkSource::from_bits(self.extcfgr.field(20, 1))
    }

    status_bits! {
        is_active_flag_hpre: cfgr[16] "Returns `true` if the HCLK1 prescaler value is applied";
        is_active_flag_ppre1: cfgr[17] "Returns `true` if the APB1 prescaler value is applied";
        is_active_flag_ppre2: cfgr[18] "Returns `true` if the APB2 prescaler value is applied";
        is_active_flag_shdhpre: extcfgr[16] "Returns `true` if the HCLK4 prescaler value is applied";
        is_active_flag_c2hpre: extcfgr[17] "Returns `true` if the HCLK2 prescaler value is applied";
    }

    /// Configure the microcontroller clock output
    #[inline(always)]
    pub fn config_mco(&self, source: McoSource, prescaler: McoPrescaler) {
        self.cfgr.modify(
            CFGR_MCOSEL | CFGR_MCOPRE,
            (source.bits() << 24) | (prescaler.bits() << 28),
        );
    }

    /// Microcontroller clock output source
    #[inline(always)]
    pub fn get_mco_source(&self) -> McoSource {
        McoSource::from_bits(self.cfgr.field(24, 4))
    }

    /// Microcontroller clock output prescaler
    #[inline(always)]
    pub fn get_mco_prescaler(&self) -> McoPrescaler {
        McoPrescaler::from_bits(self.cfgr.field(28, 3))
    }

    // --------------------------------------------------------------- SMPS

    field_select! {
        smps_clk_source: smpscr[0; 2] => SmpsClkSource, "the SMPS step down converter clock source";
        smps_prescaler: smpscr[4; 2] => SmpsPrescaler, "the SMPS step down converter clock prescaler";
    }

    /// The clock currently used by the SMPS step down converter
    #[inline(always)]
    pub fn smps_clk_source_status(&self) -> SmpsClkStatus {
        SmpsClkStatus::from_bits(self.smpscr.field(8, 2))
    }

    // ------------------------------------------ Peripheral clock sources

    field_select! {
        usart1_clk_source: ccipr[0; 2] => UsartClkSel, "the USART1 kernel clock source";
        lpuart1_clk_source: ccipr[10; 2] => UsartClkSel, "the LPUART1 kernel clock source";
        i2c1_clk_source: ccipr[12; 2] => I2cClkSel, "the I2C1 kernel clock source";
        i2c3_clk_source: ccipr[16; 2] => I2cClkSel, "the I2C3 kernel clock source";
        lptim1_clk_source: ccipr[18; 2] => LptimClkSel, "the LPTIM1 kernel clock source";
        lptim2_clk_source: ccipr[20; 2] => LptimClkSel, "the LPTIM2 kernel clock source";
        sai1_clk_source: ccipr[22; 2] => SaiClkSel, "the SAI1 kernel clock source";
        clk48_clk_source: ccipr[26; 2] => Clk48ClkSel, "the 48 MHz clock source (USB, RNG)";
        adc_clk_source: ccipr[28; 2] => AdcClkSel, "the ADC kernel clock source";
        rng_clk_source: ccipr[30; 2] => RngClkSel, "the RNG kernel clock source";
    }

    /// Select the RNG kernel clock, and CLK48 when the RNG uses it
    #[inline(always)]
    pub fn config_rng_clk_source(&self, rng: RngClkSel, clk48: Clk48ClkSel) {
        if rng == RngClkSel::Clk48Div3 {
            self.set_clk48_clk_source(clk48);
        }
        self.set_rng_clk_source(rng);
    }

    // --------------------------------------------------------------- RTC

    field_select! {
        rtc_clk_source: bdcr[8; 2] => RtcClkSource, "the RTC clock source";
        rfwkp_clk_source: csr[14; 2] => RfWakeupClkSource, "the RF wake-up clock source";
    }

    bit_control! {
        rtc: bdcr[15] "the RTC clock";
    }

    status_bits! {
        rf_is_under_reset: csr[16] "Returns `true` if the radio system is in reset (RFRSTS)";
    }

    /// Assert the backup domain software reset
    #[inline(always)]
    pub fn force_backup_domain_reset(&self) {
        self.bdcr.set_bits(1 << 16);
    }

    /// Release the backup domain software reset
    #[inline(always)]
    pub fn release_backup_domain_reset(&self) {
        self.bdcr.clear_bits(1 << 16);
    }

    // --------------------------------------------------------------- PLL

    bit_control! {
        pll: cr[24] "the main PLL";
        pll_domain_sai: pllcfgr[16] "the main PLL P output for SAI1 (PLLPEN)";
        pll_domain_adc: pllcfgr[16] "the main PLL P output for the ADC (PLLPEN)";
        pll_domain_48m: pllcfgr[24] "the main PLL Q output for CLK48 (PLLQEN)";
        pll_domain_sys: pllcfgr[28] "the main PLL R output for SYSCLK (PLLREN)";
    }

    status_bits! {
        pll_is_ready: cr[25] "Returns `true` if the main PLL is locked";
    }

    /// Program the entry clock and input divider shared by the main PLL
    /// and PLLSAI1
    ///
    /// Both PLLs must be disabled.
    #[inline(always)]
    pub fn pll_config_source(&self, source: PllSource, m: PllM) {
        self.pllcfgr.modify(
            PLLCFGR_PLLSRC | PLLCFGR_PLLM,
            source.bits() | (m.bits() << 4),
        );
    }

    /// Configure the main PLL R output used as system clock
    ///
    /// The PLL must be disabled. `n` is the VCO multiplication factor
    /// (PLLN).
    #[inline(always)]
    pub fn pll_config_domain_sys(&self, source: PllSource, m: PllM, n: u32, r: PllDiv) {
        self.pllcfgr.modify(
            PLLCFGR_PLLSRC | PLLCFGR_PLLM | PLLCFGR_PLLN | PLLCFGR_PLLR,
            source.bits() | (m.bits() << 4) | ((n & 0x7F) << 8) | (r.bits() << 29),
        );
    }

    /// Configure the main PLL P output used by SAI1
    #[inline(always)]
    pub fn pll_config_domain_sai(&self, source: PllSource, m: PllM, n: u32, p: PllP) {
        self.pllcfgr.modify(
            PLLCFGR_PLLSRC | PLLCFGR_PLLM | PLLCFGR_PLLN | PLLCFGR_PLLP,
            source.bits() | (m.bits() << 4) | ((n & 0x7F) << 8) | (p.bits() << 17),
        );
    }

    /// Configure the main PLL P output used by the ADC
    #[inline(always)]
    pub fn pll_config_domain_adc(&self, source: PllSource, m: PllM, n: u32, p: PllP) {
        self.pll_config_domain_sai(source, m, n, p);
    }

    /// Configure the main PLL Q output used for CLK48
    #[inline(always)]
    pub fn pll_config_domain_48m(&self, source: PllSource, m: PllM, n: u32, q: PllDiv) {
        self.pllcfgr.modify(
            PLLCFGR_PLLSRC | PLLCFGR_PLLM | PLLCFGR_PLLN | PLLCFGR_PLLQ,
            source.bits() | (m.bits() << 4) | ((n & 0x7F) << 8) | (q.bits() << 25),
        );
    }

    field_select! {
        pll_main_source: pllcfgr[0; 2] => PllSource, "the main PLL and PLLSAI1 entry clock source";
    }

    /// PLL and PLLSAI1 input divider (PLLM)
    #[inline(always)]
    pub fn get_pll_divider(&self) -> PllM {
        PllM::from_bits(self.pllcfgr.field(4, 3))
    }

    /// Main PLL VCO multiplication factor (PLLN)
    #[inline(always)]
    pub fn get_pll_n(&self) -> u32 {
        self.pllcfgr.field(8, 7)
    }

    /// Main PLL P output divider
    #[inline(always)]
    pub fn get_pll_p(&self) -> PllP {
        PllP::from_bits(self.pllcfgr.field(17, 5))
    }

    /// Main PLL Q output divider
    #[inline(always)]
    pub fn get_pll_q(&self) -> PllDiv {
        PllDiv::from_bits(self.pllcfgr.field(25, 3))
    }

    /// Main PLL R output divider
    #[inline(always)]
    pub fn get_pll_r(&self) -> PllDiv {
        PllDiv::from_bits(self.pllcfgr.field(29, 3))
    }

    // ----------------------------------------------------------- PLLSAI1

    bit_control! {
        pllsai1: cr[26] "the SAI1 PLL";
        pllsai1_domain_sai: pllsai1cfgr[16] "the PLLSAI1 P output for SAI1 (PLLPEN)";
        pllsai1_domain_48m: pllsai1cfgr[24] "the PLLSAI1 Q output for CLK48 (PLLQEN)";
        pllsai1_domain_adc: pllsai1cfgr[28] "the PLLSAI1 R output for the ADC (PLLREN)";
    }

    status_bits! {
        pllsai1_is_ready: cr[27] "Returns `true` if the SAI1 PLL is locked";
    }

    /// Configure the PLLSAI1 P output used by SAI1
    ///
    /// The entry clock and input divider are shared with the main PLL:
    /// both PLLs must be disabled.
    #[inline(always)]
    pub fn pllsai1_config_domain_sai(&self, source: PllSource, m: PllM, n: u32, p: PllP) {
        self.pll_config_source(source, m);
        self.pllsai1cfgr.modify(
            PLLCFGR_PLLN | PLLCFGR_PLLP,
            ((n & 0x7F) << 8) | (p.bits() << 17),
        );
    }

    /// Configure the PLLSAI1 Q output used for CLK48
    #[inline(always)]
    pub fn pllsai1_config_domain_48m(&self, source: PllSource, m: PllM, n: u32, q: PllDiv) {
        self.pll_config_source(source, m);
        self.pllsai1cfgr.modify(
            PLLCFGR_PLLN | PLLCFGR_PLLQ,
            ((n & 0x7F) << 8) | (q.bits() << 25),
        );
    }

    /// Configure the PLLSAI1 R output used by the ADC
    #[inline(always)]
    pub fn pllsai1_config_domain_adc(&self, source: PllSource, m: PllM, n: u32, r: PllDiv) {
        self.pll_config_source(source, m);
        self.pllsai1cfgr.modify(
            PLLCFGR_PLLN | PLLCFGR_PLLR,
            ((n & 0x7F) << 8) | (r.bits() << 29),
        );
    }

    /// PLLSAI1 VCO multiplication factor (PLLN)
    #[inline(always)]
    pub fn get_pllsai1_n(&self) -> u32 {
        self.pllsai1cfgr.field(8, 7)
    }

    /// PLLSAI1 P output divider
    #[inline(always)]
    pub fn get_pllsai1_p(&self) -> PllP {
        PllP::from_bits(self.pllsai1cfgr.field(17, 5))
    }

    /// PLLSAI1 Q output divider
    #[inline(always)]
    pub fn get_pllsai1_q(&self) -> PllDiv {
        PllDiv::from_bits(self.pllsai1cfgr.field(25, 3))
    }

    /// PLLSAI1 R output divider
    #[inline(always)]
    pub fn get_pllsai1_r(&self) -> PllDiv {
        PllDiv::from_bits(self.pllsai1cfgr.field(29, 3))
    }

    // ------------------------------------------------ Flags and interrupts

    interrupt_flags! {
        lsi1rdy: cifr[0], cicr[0] write, cier[0] "LSI1 ready";
        lserdy: cifr[1], cicr[1] write, cier[1] "LSE ready";
        msirdy: cifr[2], cicr[2] write, cier[2] "MSI ready";
        hsirdy: cifr[3], cicr[3] write, cier[3] "HSI16 ready";
        hserdy: cifr[4], cicr[4] write, cier[4] "HSE32 ready";
        pllrdy: cifr[5], cicr[5] write, cier[5] "main PLL ready";
        pllsai1rdy: cifr[6], cicr[6] write, cier[6] "PLLSAI1 ready";
        hsecss: cifr[8], cicr[8] write "HSE32 clock security system";
        lsecss: cifr[9], cicr[9] write, cier[9] "LSE clock security system";
        hsi48rdy: cifr[10], cicr[10] write, cier[10] "HSI48 ready";
        lsi2rdy: cifr[11], cicr[11] write, cier[11] "LSI2 ready";
    }

    status_bits! {
        is_active_flag_oblrst: csr[25] "Returns `true` if an option byte loader reset occurred";
        is_active_flag_pinrst: csr[26] "Returns `true` if a reset from the NRST pin occurred";
        is_active_flag_borrst: csr[27] "Returns `true` if a brown out reset occurred";
        is_active_flag_sftrst: csr[28] "Returns `true` if a software reset occurred";
        is_active_flag_iwdgrst: csr[29] "Returns `true` if an independent watchdog reset occurred";
        is_active_flag_wwdgrst: csr[30] "Returns `true` if a window watchdog reset occurred";
        is_active_flag_lpwrrst: csr[31] "Returns `true` if a low-power reset occurred";
    }

    /// Clear every reset flag (RMVF)
    #[inline(always)]
    pub fn clear_reset_flags(&self) {
        self.csr.set_bits(1 << 23);
    }

    // ------------------------------------------------------------ De-init

    /// Reset the clock tree to its reset configuration
    ///
    /// MSI at 4 MHz becomes the system clock. HSI16, HSE32, both PLLs and
    /// HSI48 are stopped. The prescalers of both CPUs, the MCO and the PLL
    /// configurations return to their reset values, interrupts are disabled
    /// and every flag is cleared. LSI1, LSI2, the backup domain and the
    /// peripheral enables are left untouched.
    pub fn deinit(&self) -> Result<(), Error> {
        self.cr.set_bits(CR_MSION);
        spin_until(Clock::Msi, || self.msi_is_ready())?;

        self.set_msi_range(MsiRange::Range4M);
        self.set_msi_calib_trimming(0);
        self.set_hsi_calib_trimming(64);

        self.cfgr.write(CFGR_RESET);
        spin_until(Clock::SysClk, || {
            self.sys_clk_source_status() == SysClkSource::Msi
        })?;
        spin_until(Clock::HclkPrescaler, || {
            self.cfgr.is_set(CFGR_HPREF | CFGR_PPRE1F | CFGR_PPRE2F)
        })?;

        self.extcfgr.write(EXTCFGR_RESET);
        spin_until(Clock::HclkPrescaler, || {
            self.extcfgr.is_set(EXTCFGR_C2HPREF | EXTCFGR_SHDHPREF)
        })?;

        // HSEBYP can only be cleared once HSE is off
        self.cr.clear_bits(
            CR_MSIPLLEN
                | CR_HSION
                | CR_HSIKERON
                | CR_HSIASFS
                | CR_HSEON
                | CR_CSSON
                | CR_HSEPRE
                | CR_PLLON
                | CR_PLLSAI1ON,
        );
        self.cr.clear_bits(CR_HSEBYP);

        spin_until(Clock::Pll, || !self.pll_is_ready())?;
        spin_until(Clock::PllSai1, || !self.pllsai1_is_ready())?;

        self.pllcfgr.write(PLLCFGR_RESET);
        self.pllsai1cfgr.write(PLLCFGR_RESET);

        self.hsi48_disable();

        self.cier.write(0);
        self.cicr.write(CICR_ALL);

        self.clear_reset_flags();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ahb_prescaler_encoding() {
        assert_eq!(AhbPrescaler::Div3.bits(), 0b0001);
        assert_eq!(AhbPrescaler::Div2.bits(), 0b1000);
        assert_eq!(AhbPrescaler::Div32.bits(), 0b0111);
        // 0b0011 and 0b0100 are reserved and do not divide
        assert_eq!(AhbPrescaler::from_bits(0b0011), AhbPrescaler::Div1);
        assert_eq!(AhbPrescaler::from_bits(0b0100), AhbPrescaler::Div1);
        assert_eq!(AhbPrescaler::Div6.divisor(), 6);
        assert_eq!(AhbPrescaler::Div512.divisor(), 512);
    }

    #[test]
    fn msi_range_saturates() {
        assert_eq!(MsiRange::from_bits(6), MsiRange::Range4M);
        assert_eq!(MsiRange::from_bits(12), MsiRange::Range48M);
        assert_eq!(MsiRange::from_bits(15), MsiRange::Range48M);

        let rcc = RegisterBlock::new();
        assert_eq!(rcc.get_msi_range(), MsiRange::Range4M);
        rcc.cr.set_field(4, 4, 0xF);
        assert_eq!(rcc.get_msi_range(), MsiRange::Range48M);
    }

    #[test]
    fn pll_dividers() {
        assert_eq!(PllM::from_divisor(0), None);
        assert_eq!(PllM::from_divisor(8), Some(PllM::Div8));
        assert_eq!(PllP::from_divisor(1), None);
        assert_eq!(PllP::from_divisor(32), Some(PllP::Div32));
        assert_eq!(PllP::Div17.divisor(), 17);
        assert_eq!(PllDiv::from_divisor(9), None);
        assert_eq!(PllDiv::Div2.bits(), 1);
        // PLLR code 0 is not a valid setting
        assert_eq!(PllDiv::from_bits(0), PllDiv::Div2);
    }

    #[test]
    fn pll_reset_configuration() {
        let rcc = RegisterBlock::new();
        assert_eq!(rcc.get_pll_main_source(), PllSource::None);
        assert_eq!(rcc.get_pll_divider(), PllM::Div1);
        assert_eq!(rcc.get_pll_n(), 1);
        assert_eq!(rcc.get_pll_p(), PllP::Div3);
        assert_eq!(rcc.get_pll_q(), PllDiv::Div2);
        assert_eq!(rcc.get_pll_r(), PllDiv::Div2);
        assert!(!rcc.pll_domain_sys_is_enabled());
    }

    #[test]
    fn pllsai1_shares_source_and_divider() {
        let rcc = RegisterBlock::new();
        rcc.pllsai1_config_domain_48m(PllSource::Msi, PllM::Div2, 24, PllDiv::Div4);
        assert_eq!(rcc.get_pll_main_source(), PllSource::Msi);
        assert_eq!(rcc.get_pll_divider(), PllM::Div2);
        assert_eq!(rcc.get_pllsai1_n(), 24);
        assert_eq!(rcc.get_pllsai1_q(), PllDiv::Div4);
        // The main PLL multiplier is untouched
        assert_eq!(rcc.get_pll_n(), 1);
    }

    #[test]
    fn hsecr_fields() {
        let rcc = RegisterBlock::new();
        assert!(rcc.hse_is_clock_control_locked());
        rcc.set_hse_capacitor_tuning(42);
        assert_eq!(rcc.get_hse_capacitor_tuning(), 42);
        rcc.set_hse_current_control(HseCurrentMax::Max5);
        assert_eq!(rcc.get_hse_current_control(), HseCurrentMax::Max5);
        rcc.set_hse_sense_amplifier(HseSenseAmplifier::Threshold1_2);
        assert_eq!(rcc.get_hse_sense_amplifier(), HseSenseAmplifier::Threshold1_2);
    }

    #[test]
    fn flags_are_cleared_through_cicr() {
        let rcc = RegisterBlock::new();
        rcc.clear_flag_hsecss();
        assert_eq!(rcc.cicr.read(), 1 << 8);
        rcc.clear_flag_lsi2rdy();
        assert_eq!(rcc.cicr.read(), 1 << 11);

        rcc.enable_it_lsecss();
        assert!(rcc.is_enabled_it_lsecss());
        assert_eq!(rcc.cier.read(), 1 << 9);
    }

    #[test]
    fn rng_from_clk48_selects_clk48() {
        let rcc = RegisterBlock::new();
        rcc.config_rng_clk_source(RngClkSel::Lsi, Clk48ClkSel::Msi);
        assert_eq!(rcc.get_clk48_clk_source(), Clk48ClkSel::Hsi48);
        rcc.config_rng_clk_source(RngClkSel::Clk48Div3, Clk48ClkSel::Msi);
        assert_eq!(rcc.get_clk48_clk_source(), Clk48ClkSel::Msi);
        assert_eq!(rcc.get_rng_clk_source(), RngClkSel::Clk48Div3);
    }
}
