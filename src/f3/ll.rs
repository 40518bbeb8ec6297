//! STM32F3 low-layer RCC accessors
//!
//! Every RCC bit-field is exposed as a method on the
//! [`RegisterBlock`]. Multi-bit fields are typed with enumerations whose
//! discriminants are the hardware encodings (RM0316 Section 9.4).
//!
//! ```ignore
//! let rcc = RCC::take().unwrap();
//!
//! rcc.hse_enable();
//! while !rcc.hse_is_ready() {}
//!
//! rcc.pll_config_domain_sys(PllSource::HsePrediv, Prediv::Div1, PllMul::Mul9);
//! rcc.pll_enable();
//! ```

use super::regs::RegisterBlock;
use crate::rcc::{spin_until, Clock, Error};

bits_enum! {
    /// System clock switch (SW) and status (SWS)
    pub enum SysClkSource {
        /// HSI oscillator
        Hsi = 0b00,
        /// HSE oscillator
        Hse = 0b01,
        /// PLL output
        Pll = 0b10,
    }
    reserved => Hsi;

    /// AHB prescaler (HPRE)
    pub enum AhbPrescaler {
        /// SYSCLK not divided
        Div1 = 0b0000,
        /// SYSCLK / 2
        Div2 = 0b1000,
        /// SYSCLK / 4
        Div4 = 0b1001,
        /// SYSCLK / 8
        Div8 = 0b1010,
        /// SYSCLK / 16
        Div16 = 0b1011,
        /// SYSCLK / 64
        Div64 = 0b1100,
        /// SYSCLK / 128
        Div128 = 0b1101,
        /// SYSCLK / 256
        Div256 = 0b1110,
        /// SYSCLK / 512
        Div512 = 0b1111,
    }
    reserved => Div1;

    /// APB1 (PPRE1) and APB2 (PPRE2) prescaler
    pub enum ApbPrescaler {
        /// HCLK not divided
        Div1 = 0b000,
        /// HCLK / 2
        Div2 = 0b100,
        /// HCLK / 4
        Div4 = 0b101,
        /// HCLK / 8
        Div8 = 0b110,
        /// HCLK / 16
        Div16 = 0b111,
    }
    reserved => Div1;

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
        /// MCO / 32
        Div32 = 0b101,
        /// MCO / 64
        Div64 = 0b110,
        /// MCO / 128
        Div128 = 0b111,
    }
    reserved => Div1;

    /// PLL entry clock source (PLLSRC)
    pub enum PllSource {
        /// HSI / 2, PREDIV is not applied
        HsiDiv2 = 0b00,
        /// HSI / PREDIV
        HsiPrediv = 0b01,
        /// HSE / PREDIV
        HsePrediv = 0b10,
    }
    reserved => HsePrediv;

    /// PLL multiplication factor (PLLMUL)
    pub enum PllMul {
        /// x2
        Mul2 = 0,
        /// x3
        Mul3 = 1,
        /// x4
        Mul4 = 2,
        /// x5
        Mul5 = 3,
        /// x6
        Mul6 = 4,
        /// x7
        Mul7 = 5,
        /// x8
        Mul8 = 6,
        /// x9
        Mul9 = 7,
        /// x10
        Mul10 = 8,
        /// x11
        Mul11 = 9,
        /// x12
        Mul12 = 10,
        /// x13
        Mul13 = 11,
        /// x14
        Mul14 = 12,
        /// x15
        Mul15 = 13,
        /// x16
        Mul16 = 14,
    }
    reserved => Mul16;

    /// PLL input divider (PREDIV)
    pub enum Prediv {
        /// Input not divided
        Div1 = 0,
        /// Input / 2
        Div2 = 1,
        /// Input / 3
        Div3 = 2,
        /// Input / 4
        Div4 = 3,
        /// Input / 5
        Div5 = 4,
        /// Input / 6
        Div6 = 5,
        /// Input / 7
        Div7 = 6,
        /// Input / 8
        Div8 = 7,
        /// Input / 9
        Div9 = 8,
        /// Input / 10
        Div10 = 9,
        /// Input / 11
        Div11 = 10,
        /// Input / 12
        Div12 = 11,
        /// Input / 13
        Div13 = 12,
        /// Input / 14
        Div14 = 13,
        /// Input / 15
        Div15 = 14,
        /// Input / 16
        Div16 = 15,
    }
    reserved => Div16;

    /// USB prescaler (USBPRE)
    pub enum UsbPrescaler {
        /// PLL clock / 1.5
        Div1_5 = 0,
        /// PLL clock not divided
        Div1 = 1,
    }
    reserved => Div1_5;

    /// I2S kernel clock source (I2SSRC)
    pub enum I2sClkSel {
        /// System clock
        Sysclk = 0,
        /// External clock on the I2S_CKIN pin
        Ext = 1,
    }
    reserved => Sysclk;

    /// USART and UART kernel clock source (USARTxSW, UARTxSW)
    pub enum UsartClkSel {
        /// APB clock of the bus of the peripheral
        Pclk = 0b00,
        /// System clock
        Sysclk = 0b01,
        /// LSE oscillator
        Lse = 0b10,
        /// HSI oscillator
        Hsi = 0b11,
    }
    reserved => Pclk;

    /// I2C kernel clock source (I2CxSW)
    pub enum I2cClkSel {
        /// HSI oscillator
        Hsi = 0,
        /// System clock
        Sysclk = 1,
    }
    reserved => Hsi;

    /// Timer kernel clock source (TIMxSW)
    pub enum TimClkSel {
        /// APB clock, x2 when the APB prescaler is not 1
        Pclk = 0,
        /// PLL vco output
        Pll = 1,
    }
    reserved => Pclk;

    /// RTC clock source (RTCSEL)
    pub enum RtcClkSource {
        /// No clock
        None = 0b00,
        /// LSE oscillator
        Lse = 0b01,
        /// LSI oscillator
        Lsi = 0b10,
        /// HSE oscillator / 32
        HseDiv32 = 0b11,
    }
    reserved => None;

    /// LSE oscillator drive capability (LSEDRV)
    pub enum LseDrive {
        /// Lowest drive
        Low = 0b00,
        /// Medium low drive
        MediumLow = 0b10,
        /// Medium high drive
        MediumHigh = 0b01,
        /// Highest drive
        High = 0b11,
    }
    reserved => Low;
}

/// Microcontroller clock output source (MCO, PLLNODIV)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum McoSource {
    /// MCO output disabled
    NoClock,
    /// LSI oscillator
    Lsi,
    /// LSE oscillator
    Lse,
    /// System clock
    Sysclk,
    /// HSI oscillator
    Hsi,
    /// HSE oscillator
    Hse,
    /// PLL clock / 2
    PllDiv2,
    /// PLL clock not divided
    Pll,
}

impl McoSource {
    /// MCO field encoding
    pub const fn bits(self) -> u32 {
        match self {
            McoSource::NoClock => 0b000,
            McoSource::Lsi => 0b010,
            McoSource::Lse => 0b011,
            McoSource::Sysclk => 0b100,
            McoSource::Hsi => 0b101,
            McoSource::Hse => 0b110,
            McoSource::PllDiv2 | McoSource::Pll => 0b111,
        }
    }

    /// Returns `true` if the PLLNODIV bit is set for this source
    pub const fn pll_nodiv(self) -> bool {
        matches!(self, McoSource::Pll)
    }

    /// Decode the MCO field and the PLLNODIV bit
    pub const fn from_bits(bits: u32, pll_nodiv: bool) -> Self {
        match bits {
            0b010 => McoSource::Lsi,
            0b011 => McoSource::Lse,
            0b100 => McoSource::Sysclk,
            0b101 => McoSource::Hsi,
            0b110 => McoSource::Hse,
            0b111 if pll_nodiv => McoSource::Pll,
            0b111 => McoSource::PllDiv2,
            _ => McoSource::NoClock,
        }
    }
}

/// ADC kernel clock (ADCxxPRES)
///
/// The ADC runs either from the AHB clock (synchronous mode, selected in
/// the ADC itself) or from the PLL through this prescaler.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AdcClkSel {
    /// PLL clock disabled, the ADC can use the AHB clock
    Hclk = 0b00000,
    /// PLL clock / 1
    PllDiv1 = 0b10000,
    /// PLL clock / 2
    PllDiv2 = 0b10001,
    /// PLL clock / 4
    PllDiv4 = 0b10010,
    /// PLL clock / 6
    PllDiv6 = 0b10011,
    /// PLL clock / 8
    PllDiv8 = 0b10100,
    /// PLL clock / 10
    PllDiv10 = 0b10101,
    /// PLL clock / 12
    PllDiv12 = 0b10110,
    /// PLL clock / 16
    PllDiv16 = 0b10111,
    /// PLL clock / 32
    PllDiv32 = 0b11000,
    /// PLL clock / 64
    PllDiv64 = 0b11001,
    /// PLL clock / 128
    PllDiv128 = 0b11010,
    /// PLL clock / 256
    PllDiv256 = 0b11011,
}

impl AdcClkSel {
    /// Field encoding
    pub const fn bits(self) -> u32 {
        self as u8 as u32
    }

    /// Decode a field value. `0b0xxxx` is the AHB clock, `0b111xx` is
    /// PLL clock / 256.
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0x1F {
            b if b & 0b10000 == 0 => AdcClkSel::Hclk,
            0b10000 => AdcClkSel::PllDiv1,
            0b10001 => AdcClkSel::PllDiv2,
            0b10010 => AdcClkSel::PllDiv4,
            0b10011 => AdcClkSel::PllDiv6,
            0b10100 => AdcClkSel::PllDiv8,
            0b10101 => AdcClkSel::PllDiv10,
            0b10110 => AdcClkSel::PllDiv12,
            0b10111 => AdcClkSel::PllDiv16,
            0b11000 => AdcClkSel::PllDiv32,
            0b11001 => AdcClkSel::PllDiv64,
            0b11010 => AdcClkSel::PllDiv128,
            _ => AdcClkSel::PllDiv256,
        }
    }
}

impl PllMul {
    /// Multiplication factor
    pub const fn factor(self) -> u32 {
        self.bits() + 2
    }

    /// The encoding of a multiplication factor in 2..=16
    pub const fn from_factor(mul: u32) -> Option<Self> {
        match mul {
            2..=16 => Some(Self::from_bits(mul - 2)),
            _ => None,
        }
    }
}

impl Prediv {
    /// Division factor
    pub const fn divisor(self) -> u32 {
        self.bits() + 1
    }

    /// The encoding of a division factor in 1..=16
    pub const fn from_divisor(div: u32) -> Option<Self> {
        match div {
            1..=16 => Some(Self::from_bits(div - 1)),
            _ => None,
        }
    }
}

// CR
const CR_HSION: u32 = 1 << 0;
const CR_HSEON: u32 = 1 << 16;
const CR_HSEBYP: u32 = 1 << 18;
const CR_CSSON: u32 = 1 << 19;
const CR_PLLON: u32 = 1 << 24;
// CFGR
const CFGR_SW: u32 = 0b11;
const CFGR_HPRE: u32 = 0xF << 4;
const CFGR_PPRE1: u32 = 0b111 << 8;
const CFGR_PPRE2: u32 = 0b111 << 11;
const CFGR_PLLSRC: u32 = 0b11 << 15;
const CFGR_PLLXTPRE: u32 = 1 << 17;
const CFGR_PLLMUL: u32 = 0xF << 18;
const CFGR_USBPRE: u32 = 1 << 22;
const CFGR_I2SSRC: u32 = 1 << 23;
const CFGR_MCO: u32 = 0b111 << 24;
const CFGR_MCOPRE: u32 = 0b111 << 28;
const CFGR_PLLNODIV: u32 = 1 << 31;
// CIR
const CIR_IE: u32 = 0x1F << 8;
const CIR_CLEAR: u32 = (0x1F << 16) | (1 << 23);

impl RegisterBlock {
    // ---------------------------------------------------------------- HSE

    bit_control! {
        hse: cr[16] "the HSE oscillator";
        hse_bypass: cr[18] "the HSE crystal oscillator bypass";
    }

    status_bits! {
        hse_is_ready: cr[17] "Returns `true` if the HSE oscillator is ready";
    }

    /// Enable the clock security system on HSE
    ///
    /// CSSON is only cleared by a reset or by [`deinit`](Self::deinit).
    #[inline(always)]
    pub fn hse_css_enable(&self) {
        self.cr.set_bits(CR_CSSON);
    }

    /// Returns `true` if the clock security system is enabled
    #[inline(always)]
    pub fn hse_css_is_enabled(&self) -> bool {
        self.cr.is_set(CR_CSSON)
    }

    // ---------------------------------------------------------------- HSI

    bit_control! {
        hsi: cr[0] "the HSI oscillator";
    }

    status_bits! {
        hsi_is_ready: cr[1] "Returns `true` if the HSI oscillator is ready";
    }

    /// Factory calibration of the HSI oscillator (HSICAL)
    #[inline(always)]
    pub fn hsi_calibration(&self) -> u32 {
        self.cr.field(8, 8)
    }

    field_value! {
        hsi_calib_trimming: cr[3; 5], "the HSI trimming value added to HSICAL (default 16)";
    }

    // ---------------------------------------------------------------- LSE

    bit_control! {
        lse: bdcr[0] "the LSE oscillator";
        lse_bypass: bdcr[2] "the LSE crystal oscillator bypass";
    }

    status_bits! {
        lse_is_ready: bdcr[1] "Returns `true` if the LSE oscillator is ready";
    }

    field_select! {
        lse_drive_capability: bdcr[3; 2] => LseDrive, "the LSE oscillator drive capability";
    }

    // ---------------------------------------------------------------- LSI

    bit_control! {
        lsi: csr[0] "the LSI oscillator";
    }

    status_bits! {
        lsi_is_ready: csr[1] "Returns `true` if the LSI oscillator is ready";
    }

    // ------------------------------------------------------------- System

    field_select! {
        sys_clk_source: cfgr[0; 2] => SysClkSource, "the system clock source (SW)";
        ahb_prescaler: cfgr[4; 4] => AhbPrescaler, "the AHB prescaler";
        apb1_prescaler: cfgr[8; 3] => ApbPrescaler, "the APB1 prescaler";
        apb2_prescaler: cfgr[11; 3] => ApbPrescaler, "the APB2 prescaler";
    }

    /// The clock currently used as system clock (SWS)
    #[inline(always)]
    pub fn sys_clk_source_status(&self) -> SysClkSource {
        SysClkSource::from_bits(self.cfgr.field(2, 2))
    }

    /// Configure the microcontroller clock output
    #[inline(always)]
    pub fn config_mco(&self, source: McoSource, prescaler: McoPrescaler) {
        let nodiv = if source.pll_nodiv() { CFGR_PLLNODIV } else { 0 };
        self.cfgr.modify(
            CFGR_MCO | CFGR_MCOPRE | CFGR_PLLNODIV,
            (source.bits() << 24) | (prescaler.bits() << 28) | nodiv,
        );
    }

    /// Microcontroller clock output source
    #[inline(always)]
    pub fn get_mco_source(&self) -> McoSource {
        McoSource::from_bits(
            self.cfgr.field(24, 3),
            self.cfgr.is_set(CFGR_PLLNODIV),
        )
    }

    /// Microcontroller clock output prescaler
    #[inline(always)]
    pub fn get_mco_prescaler(&self) -> McoPrescaler {
        McoPrescaler::from_bits(self.cfgr.field(28, 3))
    }

    // ------------------------------------------ Peripheral clock sources

    field_select! {
        usart1_clk_source: cfgr3[0; 2] => UsartClkSel, "the USART1 kernel clock source";
        usart2_clk_source: cfgr3[16; 2] => UsartClkSel, "the USART2 kernel clock source";
        usart3_clk_source: cfgr3[18; 2] => UsartClkSel, "the USART3 kernel clock source";
        uart4_clk_source: cfgr3[20; 2] => UsartClkSel, "the UART4 kernel clock source";
        uart5_clk_source: cfgr3[22; 2] => UsartClkSel, "the UART5 kernel clock source";
        i2c1_clk_source: cfgr3[4; 1] => I2cClkSel, "the I2C1 kernel clock source";
        i2c2_clk_source: cfgr3[5; 1] => I2cClkSel, "the I2C2 kernel clock source";
        i2c3_clk_source: cfgr3[6; 1] => I2cClkSel, "the I2C3 kernel clock source";
        tim1_clk_source: cfgr3[8; 1] => TimClkSel, "the TIM1 kernel clock source";
        tim8_clk_source: cfgr3[9; 1] => TimClkSel, "the TIM8 kernel clock source";
        tim15_clk_source: cfgr3[10; 1] => TimClkSel, "the TIM15 kernel clock source";
        tim16_clk_source: cfgr3[11; 1] => TimClkSel, "the TIM16 kernel clock source";
        tim17_clk_source: cfgr3[13; 1] => TimClkSel, "the TIM17 kernel clock source";
        tim20_clk_source: cfgr3[15; 1] => TimClkSel, "the TIM20 kernel clock source";
        tim2_clk_source: cfgr3[24; 1] => TimClkSel, "the TIM2 kernel clock source";
        tim34_clk_source: cfgr3[25; 1] => TimClkSel, "the TIM3 and TIM4 kernel clock source";
        i2s_clk_source: cfgr[23; 1] => I2sClkSel, "the I2S kernel clock source";
        usb_prescaler: cfgr[22; 1] => UsbPrescaler, "the USB prescaler";
        adc12_clk_source: cfgr2[4; 5] => AdcClkSel, "the ADC1/ADC2 kernel clock";
        adc34_clk_source: cfgr2[9; 5] => AdcClkSel, "the ADC3/ADC4 kernel clock";
    }

    // --------------------------------------------------------------- RTC

    field_select! {
        rtc_clk_source: bdcr[8; 2] => RtcClkSource, "the RTC clock source";
    }

    bit_control! {
        rtc: bdcr[15] "the RTC clock";
    }

    /// Assert the RTC domain software reset
    #[inline(always)]
    pub fn force_backup_domain_reset(&self) {
        self.bdcr.set_bits(1 << 16);
    }

    /// Release the RTC domain software reset
    #[inline(always)]
    pub fn release_backup_domain_reset(&self) {
        self.bdcr.clear_bits(1 << 16);
    }

    // --------------------------------------------------------------- PLL

    bit_control! {
        pll: cr[24] "the main PLL";
    }

    status_bits! {
        pll_is_ready: cr[25] "Returns `true` if the main PLL is locked";
    }

    /// Configure the PLL as system clock source
    ///
    /// The PLL must be disabled. `prediv` is not applied to
    /// [`PllSource::HsiDiv2`].
    #[inline(always)]
    pub fn pll_config_domain_sys(
        &self,
        source: PllSource,
        prediv: Prediv,
        mul: PllMul,
    ) {
        self.cfgr.modify(
            CFGR_PLLSRC | CFGR_PLLMUL,
            (source.bits() << 15) | (mul.bits() << 18),
        );
        self.cfgr2.set_field(0, 4, prediv.bits());
    }

    /// PLL entry clock source
    #[inline(always)]
    pub fn get_pll_main_source(&self) -> PllSource {
        PllSource::from_bits(self.cfgr.field(15, 2))
    }

    /// PLL multiplication factor
    #[inline(always)]
    pub fn get_pll_multiplicator(&self) -> PllMul {
        PllMul::from_bits(self.cfgr.field(18, 4))
    }

    /// PLL input divider
    #[inline(always)]
    pub fn get_pll_prediv(&self) -> Prediv {
        Prediv::from_bits(self.cfgr2.field(0, 4))
    }

    // ------------------------------------------------ Flags and interrupts

    interrupt_flags! {
        lsirdy: cir[0], cir[16] set, cir[8] "LSI ready";
        lserdy: cir[1], cir[17] set, cir[9] "LSE ready";
        hsirdy: cir[2], cir[18] set, cir[10] "HSI ready";
        hserdy: cir[3], cir[19] set, cir[11] "HSE ready";
        pllrdy: cir[4], cir[20] set, cir[12] "PLL ready";
        hsecss: cir[7], cir[23] set "HSE clock security system";
    }

    status_bits! {
        is_active_flag_v18pwrrst: csr[23] "Returns `true` if a reset of the 1.8 V domain occurred";
        is_active_flag_oblrst: csr[25] "Returns `true` if an option byte loader reset occurred";
        is_active_flag_pinrst: csr[26] "Returns `true` if a reset from the NRST pin occurred";
        is_active_flag_porrst: csr[27] "Returns `true` if a power-on or power-down reset occurred";
        is_active_flag_sftrst: csr[28] "Returns `true` if a software reset occurred";
        is_active_flag_iwdgrst: csr[29] "Returns `true` if an independent watchdog reset occurred";
        is_active_flag_wwdgrst: csr[30] "Returns `true` if a window watchdog reset occurred";
        is_active_flag_lpwrrst: csr[31] "Returns `true` if a low-power reset occurred";
    }

    /// Clear every reset flag (RMVF)
    #[inline(always)]
    pub fn clear_reset_flags(&self) {
        self.csr.set_bits(1 << 24);
    }

    // ------------------------------------------------------------ De-init

    /// Reset the clock tree to its reset configuration
    ///
    /// HSI becomes the system clock. HSE, the clock security system and the
    /// PLL are stopped. Prescalers, the MCO and the kernel clock selections
    /// return to their reset values, interrupts are disabled and every flag
    /// is cleared. The RTC domain and the peripheral enables are left
    /// untouched.
    pub fn deinit(&self) -> Result<(), Error> {
        self.cr.set_bits(CR_HSION);
        spin_until(Clock::Hsi, || self.hsi_is_ready())?;

        self.set_hsi_calib_trimming(16);

        self.cfgr.clear_bits(CFGR_SW);
        spin_until(Clock::SysClk, || {
            self.sys_clk_source_status() == SysClkSource::Hsi
        })?;

        self.cfgr.clear_bits(
            CFGR_SW
                | CFGR_HPRE
                | CFGR_PPRE1
                | CFGR_PPRE2
                | CFGR_MCO
                | CFGR_MCOPRE
                | CFGR_PLLNODIV,
        );

        // HSEBYP can only be cleared once HSE is off
        self.cr.clear_bits(CR_HSEON | CR_CSSON | CR_PLLON);
        self.cr.clear_bits(CR_HSEBYP);

        spin_until(Clock::Pll, || !self.pll_is_ready())?;

        self.cfgr.clear_bits(
            CFGR_PLLSRC | CFGR_PLLXTPRE | CFGR_PLLMUL | CFGR_USBPRE | CFGR_I2SSRC,
        );
        self.cfgr2.write(0);
        self.cfgr3.write(0);

        self.cir.clear_bits(CIR_IE);
        self.cir.set_bits(CIR_CLEAR);

        self.clear_reset_flags();

        Ok(())
    }
}
