//! STM32F3 clock tree against register blocks in RAM
//!
//! `Hardware` stands in for the RCC state machine: every time the driver
//! waits, ready flags follow their enable bits and SWS follows SW.

use embedded_hal::delay::DelayNs;
use stm32_rcc::delay::HclkSource;
use stm32_rcc::f3::clocks::{I2c, Tim, Usart};
use stm32_rcc::f3::ll::{
    I2cClkSel, I2sClkSel, McoPrescaler, McoSource, PllMul, PllSource, Prediv,
    RtcClkSource, SysClkSource, TimClkSel, UsartClkSel,
};
use stm32_rcc::f3::regs::{FlashRegisterBlock, PwrRegisterBlock, RegisterBlock};
use stm32_rcc::f3::{
    ClkConfig, ExtOscState, OscConfig, OscState, PeriphClk, PeriphClkConfig,
    PllConfig, PllState, ResetReason, FLASH, PWR, RCC,
};
use stm32_rcc::prelude::*;
use stm32_rcc::rcc::{Clock, ClockFreq, Error, ResetEnable};
use stm32_rcc::time::Hertz;

const CR_HSIRDY: u32 = 1 << 1;
const CR_HSERDY: u32 = 1 << 17;
const CR_PLLRDY: u32 = 1 << 25;

struct Hardware {
    rcc: &'static RegisterBlock,
    /// CR ready flags that never come up
    dead: u32,
    elapsed_ns: u64,
}

impl Hardware {
    fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns / 1_000_000
    }

    fn step(&self) {
        let rb = self.rcc;
        for (on, rdy) in [(0u8, 1u8), (16, 17), (24, 25)] {
            let up = rb.cr.bit(on) && self.dead & (1 << rdy) == 0;
            rb.cr.set_bit(rdy, up);
        }
        rb.csr.set_bit(1, rb.csr.bit(0));
        rb.bdcr.set_bit(1, rb.bdcr.bit(0));
        rb.cfgr.set_field(2, 2, rb.cfgr.field(0, 2));
    }
}

impl DelayNs for Hardware {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
        self.step();
    }
}

struct Board {
    rb: &'static RegisterBlock,
    pwr: PWR,
    flash: FLASH,
    hw: Hardware,
}

impl Board {
    /// A new handle to the RCC block
    fn rcc(&self) -> RCC {
        unsafe { RCC::from_ptr(self.rb) }
    }
}

fn init() -> Board {
    let rb: &'static RegisterBlock = Box::leak(Box::new(RegisterBlock::new()));
    let flash: &'static FlashRegisterBlock =
        Box::leak(Box::new(FlashRegisterBlock::new()));
    let pwr: &'static PwrRegisterBlock =
        Box::leak(Box::new(PwrRegisterBlock::new()));

    Board {
        rb,
        pwr: unsafe { PWR::from_ptr(pwr) },
        flash: unsafe { FLASH::from_ptr(flash) },
        hw: Hardware {
            rcc: rb,
            dead: 0,
            elapsed_ns: 0,
        },
    }
}

#[test]
fn freeze_defaults_to_hsi() {
    let mut b = init();

    let ccdr = b.rcc().constrain().freeze(&b.pwr, &b.flash, &mut b.hw).unwrap();

    assert_eq!(ccdr.clocks.sys_ck(), Hertz::MHz(8));
    assert_eq!(ccdr.clocks.hclk(), Hertz::MHz(8));
    assert_eq!(ccdr.clocks.pclk1(), Hertz::MHz(8));
    assert_eq!(ccdr.clocks.pclk2(), Hertz::MHz(8));
    assert_eq!(ccdr.clocks.hsi_ck(), Some(Hertz::MHz(8)));
    assert_eq!(ccdr.clocks.pll_ck(), None);
    assert_eq!(b.flash.latency(), 0);
}

#[test]
fn freeze_pll_from_hse() {
    let mut b = init();

    let ccdr = b
        .rcc()
        .constrain()
        .use_hse(8.MHz())
        .sys_ck(72.MHz())
        .freeze(&b.pwr, &b.flash, &mut b.hw)
        .unwrap();

    assert_eq!(ccdr.clocks.sys_ck(), Hertz::MHz(72));
    assert_eq!(ccdr.clocks.hclk(), Hertz::MHz(72));
    // APB1 is limited to 36 MHz
    assert_eq!(ccdr.clocks.pclk1(), Hertz::MHz(36));
    assert_eq!(ccdr.clocks.ppre1(), 2);
    assert_eq!(ccdr.clocks.pclk2(), Hertz::MHz(72));
    assert_eq!(ccdr.clocks.timx_ker_ck(), Hertz::MHz(72));
    assert_eq!(ccdr.clocks.timy_ker_ck(), Hertz::MHz(72));
    assert_eq!(ccdr.clocks.hse_ck(), Some(Hertz::MHz(8)));
    assert_eq!(ccdr.clocks.pll_ck(), Some(Hertz::MHz(72)));

    assert_eq!(b.rb.sys_clk_source_status(), SysClkSource::Pll);
    assert_eq!(b.rb.get_pll_main_source(), PllSource::HsePrediv);
    assert_eq!(b.rb.get_pll_prediv(), Prediv::Div1);
    assert_eq!(b.rb.get_pll_multiplicator(), PllMul::Mul9);
    assert_eq!(b.flash.latency(), 2);

    // The peripheral controls come with the frozen clocks
    let usart1 = ccdr.peripheral.USART1.enable();
    assert!(usart1.is_enabled());
    assert!(b.rb.apb2enr.bit(14));
}

#[test]
fn freeze_prescalers() {
    let mut b = init();

    let ccdr = b
        .rcc()
        .constrain()
        .use_hse(8.MHz())
        .sys_ck(48.MHz())
        .hclk(24.MHz())
        .pclk1(6.MHz())
        .pclk2(12.MHz())
        .freeze(&b.pwr, &b.flash, &mut b.hw)
        .unwrap();

    assert_eq!(ccdr.clocks.hclk(), Hertz::MHz(24));
    assert_eq!(ccdr.clocks.pclk1(), Hertz::MHz(6));
    assert_eq!(ccdr.clocks.ppre1(), 4);
    assert_eq!(ccdr.clocks.pclk2(), Hertz::MHz(12));
    assert_eq!(ccdr.clocks.ppre2(), 2);
    // Timers behind a divided APB clock run at twice its frequency
    assert_eq!(ccdr.clocks.timx_ker_ck(), Hertz::MHz(12));
    // Wait states follow SYSCLK
    assert_eq!(b.flash.latency(), 1);
}

#[test]
fn freeze_rejects_impossible_trees() {
    let mut b = init();

    let err = b
        .rcc()
        .constrain()
        .sys_ck(80.MHz())
        .freeze(&b.pwr, &b.flash, &mut b.hw);
    assert_eq!(err.err(), Some(Error::InvalidConfig));

    let err = b
        .rcc()
        .constrain()
        .pclk1(48.MHz())
        .freeze(&b.pwr, &b.flash, &mut b.hw);
    assert_eq!(err.err(), Some(Error::InvalidConfig));

    let err = b
        .rcc()
        .constrain()
        .use_hse(40.MHz())
        .freeze(&b.pwr, &b.flash, &mut b.hw);
    assert_eq!(err.err(), Some(Error::InvalidConfig));

    // Nothing was touched
    assert_eq!(b.rb.sys_clk_source_status(), SysClkSource::Hsi);
    assert!(!b.rb.hse_is_enabled());
    assert_eq!(b.hw.elapsed_ms(), 0);
}

#[test]
fn hse_start_timeout() {
    let mut b = init();
    b.hw.dead = CR_HSERDY;

    let err = b
        .rcc()
        .constrain()
        .use_hse(8.MHz())
        .sys_ck(72.MHz())
        .freeze(&b.pwr, &b.flash, &mut b.hw);

    assert_eq!(err.err(), Some(Error::Timeout(Clock::Hse)));
    assert_eq!(b.hw.elapsed_ms(), 100);
    // Still running from HSI
    assert_eq!(b.rb.sys_clk_source_status(), SysClkSource::Hsi);
    assert!(!b.rb.pll_is_enabled());
}

#[test]
fn pll_lock_timeout() {
    let mut b = init();
    b.hw.dead = CR_PLLRDY;

    let err = b
        .rcc()
        .constrain()
        .sys_ck(64.MHz())
        .freeze(&b.pwr, &b.flash, &mut b.hw);

    assert_eq!(err.err(), Some(Error::Timeout(Clock::Pll)));
    assert_eq!(b.hw.elapsed_ms(), 2);
    assert_eq!(b.flash.latency(), 0);
}

#[test]
fn refreeze_moves_off_the_pll() {
    let mut b = init();

    b.rcc()
        .constrain()
        .use_hse(8.MHz())
        .sys_ck(72.MHz())
        .freeze(&b.pwr, &b.flash, &mut b.hw)
        .unwrap();

    // Reprogramming the PLL while it drives SYSCLK is refused
    let mut rcc = b.rcc().constrain();
    let err = rcc.osc_config(
        &OscConfig {
            pll: Some(PllState::Off),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    );
    assert_eq!(err, Err(Error::InUse(Clock::Pll)));
    let err = rcc.osc_config(
        &OscConfig {
            hse: Some(ExtOscState::Off),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    );
    assert_eq!(err, Err(Error::InUse(Clock::Hse)));

    // freeze passes through HSI while the PLL is stopped
    let ccdr = rcc
        .use_hse(8.MHz())
        .sys_ck(48.MHz())
        .freeze(&b.pwr, &b.flash, &mut b.hw)
        .unwrap();

    assert_eq!(ccdr.clocks.sys_ck(), Hertz::MHz(48));
    assert_eq!(b.rb.get_pll_multiplicator(), PllMul::Mul6);
    assert_eq!(b.rb.sys_clk_source_status(), SysClkSource::Pll);
    assert_eq!(b.flash.latency(), 1);
}

#[test]
fn refreeze_switches_hse_to_bypass() {
    let mut b = init();

    b.rcc()
        .constrain()
        .use_hse(8.MHz())
        .freeze(&b.pwr, &b.flash, &mut b.hw)
        .unwrap();
    assert_eq!(b.rb.sys_clk_source_status(), SysClkSource::Hse);
    assert!(!b.rb.hse_bypass_is_enabled());

    // HSEBYP only changes with HSE stopped, so SYSCLK passes through HSI
    let ccdr = b
        .rcc()
        .constrain()
        .use_hse(8.MHz())
        .bypass_hse()
        .freeze(&b.pwr, &b.flash, &mut b.hw)
        .unwrap();

    assert_eq!(ccdr.clocks.sys_ck(), Hertz::MHz(8));
    assert_eq!(b.rb.sys_clk_source_status(), SysClkSource::Hse);
    assert!(b.rb.hse_bypass_is_enabled());
    assert!(b.rb.hse_is_ready());
    assert!(b.rb.hsi_is_ready());
}

#[test]
fn hclk_monitor_follows_freeze() {
    let mut b = init();

    let rcc = b.rcc().constrain().use_hse(8.MHz()).sys_ck(72.MHz());
    let monitor = rcc.hclk_monitor();
    assert_eq!(monitor.hclk(), Hertz::MHz(8));

    rcc.freeze(&b.pwr, &b.flash, &mut b.hw).unwrap();
    assert_eq!(monitor.hclk(), Hertz::MHz(72));
}

#[test]
fn pll_from_hsi_half() {
    let mut b = init();
    let mut rcc = b.rcc().constrain();

    rcc.osc_config(
        &OscConfig {
            pll: Some(PllState::On(PllConfig {
                source: PllSource::HsiDiv2,
                prediv: Prediv::Div1,
                mul: PllMul::Mul16,
            })),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    )
    .unwrap();

    let clocks = rcc
        .clock_config(
            &ClkConfig {
                sysclk: Some(SysClkSource::Pll),
                ..Default::default()
            },
            &b.flash,
            2,
            &mut b.hw,
        )
        .unwrap();
    assert_eq!(clocks.sys_ck(), Hertz::MHz(64));

    // HSI feeds the PLL that drives SYSCLK
    let err = rcc.osc_config(
        &OscConfig {
            hsi: Some(stm32_rcc::f3::HsiState::Off),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    );
    assert_eq!(err, Err(Error::InUse(Clock::Hsi)));

    let (cfg, latency) = rcc.clock_config_get(&b.flash);
    assert_eq!(cfg.sysclk, Some(SysClkSource::Pll));
    assert_eq!(latency, 2);
}

#[test]
fn switch_to_a_stopped_oscillator() {
    let mut b = init();
    let mut rcc = b.rcc().constrain();

    let err = rcc.clock_config(
        &ClkConfig {
            sysclk: Some(SysClkSource::Hse),
            ..Default::default()
        },
        &b.flash,
        0,
        &mut b.hw,
    );
    assert_eq!(err.err(), Some(Error::NotReady(Clock::Hse)));

    let err = rcc.clock_config(&ClkConfig::default(), &b.flash, 3, &mut b.hw);
    assert_eq!(err.err(), Some(Error::InvalidConfig));
}

#[test]
fn low_speed_oscillators_and_rtc() {
    let mut b = init();
    let mut rcc = b.rcc().constrain();

    rcc.osc_config(
        &OscConfig {
            lse: Some(ExtOscState::On),
            lsi: Some(OscState::On),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    )
    .unwrap();
    assert!(b.rb.lse_is_ready());
    assert!(b.rb.lsi_is_ready());
    assert!(b.pwr.backup_access_is_enabled());
    // The PWR clock is restored
    assert!(!b.rb.apb1enr.bit(28));

    rcc.periph_clk_config(
        &PeriphClkConfig {
            rtc: Some(RtcClkSource::Lse),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    )
    .unwrap();
    assert_eq!(
        rcc.periph_clk_freq(PeriphClk::Rtc),
        ClockFreq::Running(Hertz::from_raw(32_768))
    );

    // A new source resets the RTC domain, the LSE survives
    rcc.periph_clk_config(
        &PeriphClkConfig {
            rtc: Some(RtcClkSource::Lsi),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    )
    .unwrap();
    assert_eq!(b.rb.get_rtc_clk_source(), RtcClkSource::Lsi);
    assert!(b.rb.lse_is_enabled());
    assert!(!b.rb.bdcr.bit(16));
    assert_eq!(
        rcc.periph_clk_freq(PeriphClk::Rtc),
        ClockFreq::Running(Hertz::kHz(40))
    );
}

#[test]
fn kernel_clocks() {
    let mut b = init();

    b.rcc()
        .constrain()
        .use_hse(8.MHz())
        .sys_ck(72.MHz())
        .freeze(&b.pwr, &b.flash, &mut b.hw)
        .unwrap();

    let mut rcc = b.rcc().constrain();
    rcc.periph_clk_config(
        &PeriphClkConfig {
            usart1: Some(UsartClkSel::Sysclk),
            usart2: Some(UsartClkSel::Lse),
            usart3: Some(UsartClkSel::Pclk),
            i2c1: Some(I2cClkSel::Hsi),
            i2s: Some(I2sClkSel::Ext),
            tim1: Some(TimClkSel::Pll),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    )
    .unwrap();

    let freq = |clk| rcc.periph_clk_freq(clk);
    assert_eq!(
        freq(PeriphClk::Usart(Usart::Usart1)),
        ClockFreq::Running(Hertz::MHz(72))
    );
    // LSE is not running
    assert_eq!(freq(PeriphClk::Usart(Usart::Usart2)), ClockFreq::NoClock);
    assert_eq!(freq(PeriphClk::Usart(Usart::Usart2)).raw(), ClockFreq::NO_CLOCK);
    assert_eq!(
        freq(PeriphClk::Usart(Usart::Usart3)),
        ClockFreq::Running(Hertz::MHz(36))
    );
    assert_eq!(
        freq(PeriphClk::I2c(I2c::I2c1)),
        ClockFreq::Running(Hertz::MHz(8))
    );
    // I2S_CKIN has no known frequency
    assert_eq!(freq(PeriphClk::I2s).raw(), ClockFreq::NA);
    // TIM1 from the PLL runs at twice the PLL clock
    assert_eq!(
        freq(PeriphClk::Tim(Tim::Tim1)),
        ClockFreq::Running(Hertz::MHz(144))
    );
    // The USB prescaler divides by 1.5 after reset
    assert_eq!(freq(PeriphClk::Usb), ClockFreq::Running(Hertz::MHz(48)));
}

#[test]
fn clock_security_system() {
    let b = init();
    let mut rcc = b.rcc().constrain();

    rcc.enable_css();
    assert!(b.rb.hse_css_is_enabled());

    let mut events = 0;
    rcc.nmi_irq_handler(|| events += 1);
    assert_eq!(events, 0);

    // CSSF
    b.rb.cir.set_bits(1 << 7);
    rcc.nmi_irq_handler(|| events += 1);
    assert_eq!(events, 1);
    // CSSC
    assert!(b.rb.cir.bit(23));
}

#[test]
fn mco_output() {
    let b = init();
    let mut rcc = b.rcc().constrain();

    rcc.mco_config(McoSource::Sysclk, McoPrescaler::Div4);
    assert_eq!(b.rb.get_mco_source(), McoSource::Sysclk);
    assert_eq!(b.rb.get_mco_prescaler(), McoPrescaler::Div4);
}

#[test]
fn reset_reason_is_read_and_cleared() {
    let b = init();
    let mut rcc = b.rcc().constrain();

    // Power-on after construction
    assert_eq!(rcc.reset_reason(), ResetReason::PowerOnReset);
    // RMVF
    assert!(b.rb.csr.bit(24));

    b.rb.csr.write(1 << 29);
    assert_eq!(rcc.reset_reason(), ResetReason::IndependentWatchdogReset);
}

#[test]
fn deinit_restores_hsi() {
    let b = init();
    let rb = b.rb;

    // Leftovers of an earlier configuration, all with stopped oscillators
    rb.set_ahb_prescaler(stm32_rcc::f3::ll::AhbPrescaler::Div4);
    rb.pll_config_domain_sys(PllSource::HsePrediv, Prediv::Div2, PllMul::Mul9);
    rb.set_usart1_clk_source(UsartClkSel::Lse);
    rb.cfgr2.write(0x1F);
    rb.set_hsi_calib_trimming(3);

    rb.deinit().unwrap();

    assert_eq!(rb.sys_clk_source_status(), SysClkSource::Hsi);
    assert_eq!(rb.get_hsi_calib_trimming(), 16);
    assert_eq!(rb.cfgr.read(), 0);
    assert_eq!(rb.cfgr2.read(), 0);
    assert_eq!(rb.cfgr3.read(), 0);
    assert_eq!(rb.cr.read() & !(0xFF << 8), 0x83 & !(0xFF << 8));
}

#[test]
fn deinit_times_out_on_a_stuck_oscillator() {
    let b = init();
    let rb = b.rb;

    // HSI never comes up
    rb.cr.clear_bits(CR_HSIRDY);
    assert_eq!(rb.deinit(), Err(Error::Timeout(Clock::Hsi)));

    // The PLL never stops
    rb.cr.set_bits(CR_HSIRDY | CR_PLLRDY);
    assert_eq!(rb.deinit(), Err(Error::Timeout(Clock::Pll)));
}
