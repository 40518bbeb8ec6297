//! STM32WB clock tree against register blocks in RAM
//!
//! `Hardware` stands in for the RCC state machine: every time the driver
//! waits, ready flags follow their enable bits, SWS follows SW, prescaler
//! updates complete and CICR clears CIFR.

use embedded_hal::delay::DelayNs;
use stm32_rcc::delay::HclkSource;
use stm32_rcc::prelude::*;
use stm32_rcc::rcc::{Clock, ClockFreq, Error, ResetEnable};
use stm32_rcc::time::Hertz;
use stm32_rcc::wb::clocks::{I2c, Lptim, Usart};
use stm32_rcc::wb::ll::{
    AdcClkSel, AhbPrescaler, Clk48ClkSel, I2cClkSel, LptimClkSel, MsiRange,
    PllDiv, PllM, PllP, PllSource, RngClkSel, RtcClkSource, SaiClkSel,
    SmpsClkSource, SmpsPrescaler, SysClkSource, UsartClkSel,
};
use stm32_rcc::wb::regs::{FlashRegisterBlock, PwrRegisterBlock, RegisterBlock};
use stm32_rcc::wb::{
    ClkConfig, ExtOscState, MsiState, OscConfig, OscState, PeriphClk,
    PeriphClkConfig, PllConfig, PllSai1Config, PllSai1State, PllState,
    ResetReason, TrimmedOscState, FLASH, PWR, RCC,
};

const CR_MSIRDY: u32 = 1 << 1;
const CR_HSERDY: u32 = 1 << 17;
const CR_PLLRDY: u32 = 1 << 25;

struct Hardware {
    rcc: &'static RegisterBlock,
    /// CR ready flags that never come up
    dead: u32,
    /// SWS ignores SW
    sws_stuck: bool,
    elapsed_ns: u64,
}

impl Hardware {
    fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns / 1_000_000
    }

    fn step(&self) {
        let rb = self.rcc;
        for (on, rdy) in [(0u8, 1u8), (8, 10), (16, 17), (24, 25), (26, 27)] {
            let up = rb.cr.bit(on) && self.dead & (1 << rdy) == 0;
            rb.cr.set_bit(rdy, up);
        }
        rb.crrcr.set_bit(1, rb.crrcr.bit(0));
        rb.csr.set_bit(1, rb.csr.bit(0));
        rb.csr.set_bit(3, rb.csr.bit(2));
        rb.bdcr.set_bit(1, rb.bdcr.bit(0));

        if !self.sws_stuck {
            rb.cfgr.set_field(2, 2, rb.cfgr.field(0, 2));
        }
        rb.cfgr.set_bits(0b111 << 16);
        rb.extcfgr.set_bits(0b11 << 16);
        rb.smpscr.set_field(8, 2, rb.smpscr.field(0, 2));

        rb.cifr.clear_bits(rb.cicr.read());
        rb.cicr.write(0);
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

    // MSI starts at reset and is ready by the time code runs
    rb.cr.set_bits(CR_MSIRDY);

    Board {
        rb,
        pwr: unsafe { PWR::from_ptr(pwr) },
        flash: unsafe { FLASH::from_ptr(flash) },
        hw: Hardware {
            rcc: rb,
            dead: 0,
            sws_stuck: false,
            elapsed_ns: 0,
        },
    }
}

fn freeze_64mhz(b: &mut Board) {
    b.rcc()
        .constrain()
        .use_hse()
        .sys_ck(64.MHz())
        .freeze(&b.pwr, &b.flash, &mut b.hw)
        .unwrap();
}

#[test]
fn reset_state_runs_on_msi() {
    let b = init();
    let rcc = b.rcc().constrain();
    let clocks = b.rb.system_clocks_freq(&rcc.oscillator_values());

    assert_eq!(clocks.sysclk(), Hertz::MHz(4));
    assert_eq!(clocks.msi_ck(), Some(Hertz::MHz(4)));
    assert_eq!(clocks.hclk2(), Hertz::MHz(4));
    assert_eq!(clocks.hse_ck(), None);
}

#[test]
fn freeze_defaults_to_hsi() {
    let mut b = init();

    let ccdr = b.rcc().constrain().freeze(&b.pwr, &b.flash, &mut b.hw).unwrap();

    assert_eq!(ccdr.clocks.sysclk(), Hertz::MHz(16));
    assert_eq!(ccdr.clocks.hclk1(), Hertz::MHz(16));
    assert_eq!(ccdr.clocks.hclk2(), Hertz::MHz(16));
    assert_eq!(ccdr.clocks.hclk4(), Hertz::MHz(16));
    assert_eq!(ccdr.clocks.pclk1(), Hertz::MHz(16));
    assert_eq!(ccdr.clocks.pclk2(), Hertz::MHz(16));
    assert_eq!(ccdr.clocks.hsi_ck(), Some(Hertz::MHz(16)));
    assert_eq!(b.rb.sys_clk_source_status(), SysClkSource::Hsi);
    assert_eq!(b.flash.latency(), 0);
}

#[test]
fn freeze_pll_from_hse() {
    let mut b = init();

    let ccdr = b
        .rcc()
        .constrain()
        .use_hse()
        .sys_ck(64.MHz())
        .pclk1(16.MHz())
        .freeze(&b.pwr, &b.flash, &mut b.hw)
        .unwrap();

    assert_eq!(ccdr.clocks.sysclk(), Hertz::MHz(64));
    assert_eq!(ccdr.clocks.hclk1(), Hertz::MHz(64));
    // CPU2 is limited to 32 MHz
    assert_eq!(ccdr.clocks.hclk2(), Hertz::MHz(32));
    assert_eq!(ccdr.clocks.hclk4(), Hertz::MHz(64));
    assert_eq!(ccdr.clocks.pclk1(), Hertz::MHz(16));
    assert_eq!(ccdr.clocks.ppre1(), 4);
    assert_eq!(ccdr.clocks.timx_ker_ck(), Hertz::MHz(32));
    assert_eq!(ccdr.clocks.pclk2(), Hertz::MHz(64));
    assert_eq!(ccdr.clocks.hse_ck(), Some(Hertz::MHz(32)));
    assert_eq!(ccdr.clocks.pll_ck(), Some(Hertz::MHz(64)));

    let rb = b.rb;
    assert_eq!(rb.sys_clk_source_status(), SysClkSource::Pll);
    assert_eq!(rb.get_pll_main_source(), PllSource::Hse);
    assert_eq!(rb.get_pll_divider(), PllM::Div2);
    assert_eq!(rb.get_pll_n(), 8);
    assert_eq!(rb.get_pll_r(), PllDiv::Div2);
    assert_eq!(rb.get_c2_ahb_prescaler(), AhbPrescaler::Div2);
    assert!(rb.pll_domain_sys_is_enabled());
    // Wait states follow HCLK4
    assert_eq!(b.flash.latency(), 3);

    let lpuart1 = ccdr.peripheral.LPUART1.enable();
    assert!(lpuart1.is_enabled());
    assert!(rb.apb1enr2.bit(0));
}

#[test]
fn slow_shared_bus_lowers_the_wait_states() {
    let mut b = init();

    let ccdr = b
        .rcc()
        .constrain()
        .use_hse()
        .hclk4(16.MHz())
        .freeze(&b.pwr, &b.flash, &mut b.hw)
        .unwrap();

    assert_eq!(ccdr.clocks.sysclk(), Hertz::MHz(32));
    assert_eq!(ccdr.clocks.hclk4(), Hertz::MHz(16));
    assert_eq!(b.rb.get_ahb4_prescaler(), AhbPrescaler::Div2);
    assert_eq!(b.flash.latency(), 0);
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
        .hclk2(48.MHz())
        .freeze(&b.pwr, &b.flash, &mut b.hw);
    assert_eq!(err.err(), Some(Error::InvalidConfig));

    let err = b
        .rcc()
        .constrain()
        .pclk2(0.Hz())
        .freeze(&b.pwr, &b.flash, &mut b.hw);
    assert_eq!(err.err(), Some(Error::InvalidConfig));

    // The PLL cannot output less than 12 MHz
    let err = b
        .rcc()
        .constrain()
        .sys_ck(11.MHz())
        .freeze(&b.pwr, &b.flash, &mut b.hw);
    assert_eq!(err.err(), Some(Error::InvalidConfig));

    // Nothing was touched
    assert_eq!(b.rb.sys_clk_source_status(), SysClkSource::Msi);
    assert!(!b.rb.hsi_is_enabled());
    assert_eq!(b.hw.elapsed_ms(), 0);
}

#[test]
fn hse_start_timeout() {
    let mut b = init();
    b.hw.dead = CR_HSERDY;

    let err = b
        .rcc()
        .constrain()
        .use_hse()
        .sys_ck(64.MHz())
        .freeze(&b.pwr, &b.flash, &mut b.hw);

    assert_eq!(err.err(), Some(Error::Timeout(Clock::Hse)));
    assert_eq!(b.hw.elapsed_ms(), 100);
    assert_eq!(b.rb.sys_clk_source_status(), SysClkSource::Msi);
    assert!(!b.rb.pll_is_enabled());
}

#[test]
fn clock_switch_timeout() {
    let mut b = init();
    b.hw.sws_stuck = true;
    let mut rcc = b.rcc().constrain();

    rcc.osc_config(
        &OscConfig {
            hsi: Some(TrimmedOscState::On { trim: 64 }),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    )
    .unwrap();

    let err = rcc.clock_config(
        &ClkConfig {
            sysclk: Some(SysClkSource::Hsi),
            ..Default::default()
        },
        &b.flash,
        &mut b.hw,
    );
    assert_eq!(err.err(), Some(Error::Timeout(Clock::SysClk)));
    assert!(b.hw.elapsed_ms() >= 5000);
}

#[test]
fn switch_to_a_stopped_oscillator() {
    let mut b = init();
    let mut rcc = b.rcc().constrain();

    let err = rcc.clock_config(
        &ClkConfig {
            sysclk: Some(SysClkSource::Pll),
            ..Default::default()
        },
        &b.flash,
        &mut b.hw,
    );
    assert_eq!(err.err(), Some(Error::NotReady(Clock::Pll)));
    assert_eq!(b.rb.sys_clk_source_status(), SysClkSource::Msi);
}

#[test]
fn refreeze_moves_off_the_pll() {
    let mut b = init();
    freeze_64mhz(&mut b);

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

    // freeze passes through HSI16 while the PLL is stopped
    let ccdr = rcc
        .use_hse()
        .sys_ck(48.MHz())
        .freeze(&b.pwr, &b.flash, &mut b.hw)
        .unwrap();

    assert_eq!(ccdr.clocks.sysclk(), Hertz::MHz(48));
    assert_eq!(b.rb.get_pll_n(), 6);
    assert!(b.rb.hsi_is_ready());
    assert_eq!(b.flash.latency(), 2);
}

#[test]
fn refreeze_drops_the_hse_prescaler() {
    let mut b = init();
    let mut rcc = b.rcc().constrain();

    // SYSCLK on HSE / 2
    rcc.osc_config(
        &OscConfig {
            hse: Some(ExtOscState::On),
            hse_div2: true,
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    )
    .unwrap();
    let clocks = rcc
        .clock_config(
            &ClkConfig {
                sysclk: Some(SysClkSource::Hse),
                ..Default::default()
            },
            &b.flash,
            &mut b.hw,
        )
        .unwrap();
    assert_eq!(clocks.sysclk(), Hertz::MHz(16));

    // HSEPRE only changes with HSE stopped
    let err = rcc.osc_config(
        &OscConfig {
            hse: Some(ExtOscState::On),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    );
    assert_eq!(err, Err(Error::InUse(Clock::Hse)));

    // freeze passes through HSI16 instead
    let ccdr = rcc.use_hse().freeze(&b.pwr, &b.flash, &mut b.hw).unwrap();

    assert_eq!(ccdr.clocks.sysclk(), Hertz::MHz(32));
    assert_eq!(b.rb.sys_clk_source_status(), SysClkSource::Hse);
    assert!(!b.rb.hse_div2_is_enabled());
    assert!(b.rb.hsi_is_ready());
}

#[test]
fn hclk_monitor_follows_freeze() {
    let mut b = init();

    let rcc = b.rcc().constrain().use_hse().sys_ck(64.MHz()).hclk(32.MHz());
    let monitor = rcc.hclk_monitor();
    // MSI after reset
    assert_eq!(monitor.hclk(), Hertz::MHz(4));

    rcc.freeze(&b.pwr, &b.flash, &mut b.hw).unwrap();
    assert_eq!(monitor.hclk(), Hertz::MHz(32));
}

#[test]
fn configuration_read_back() {
    let mut b = init();
    freeze_64mhz(&mut b);

    let rcc = b.rcc().constrain();
    let osc = rcc.osc_config_get();
    assert_eq!(osc.hse, Some(ExtOscState::On));
    assert_eq!(
        osc.pll,
        Some(PllState::On(PllConfig {
            source: PllSource::Hse,
            m: PllM::Div2,
            n: 8,
            p: PllP::Div2,
            q: PllDiv::Div3,
            r: PllDiv::Div2,
        }))
    );
    assert_eq!(
        osc.msi,
        Some(MsiState::On {
            range: MsiRange::Range4M,
            trim: 0
        })
    );

    let (cfg, latency) = rcc.clock_config_get(&b.flash);
    assert_eq!(cfg.sysclk, Some(SysClkSource::Pll));
    assert_eq!(cfg.ahb, Some(AhbPrescaler::Div1));
    assert_eq!(cfg.c2_ahb, Some(AhbPrescaler::Div2));
    assert_eq!(latency, 3);
}

#[test]
fn msi_range_is_locked_while_in_use() {
    let mut b = init();
    let mut rcc = b.rcc().constrain();

    let err = rcc.osc_config(
        &OscConfig {
            msi: Some(MsiState::On {
                range: MsiRange::Range16M,
                trim: 0,
            }),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    );
    assert_eq!(err, Err(Error::InUse(Clock::Msi)));

    let err = rcc.osc_config(
        &OscConfig {
            msi: Some(MsiState::Off),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    );
    assert_eq!(err, Err(Error::InUse(Clock::Msi)));

    // Once off SYSCLK the range is free
    let mut rcc = b.rcc().constrain();
    rcc.osc_config(
        &OscConfig {
            hsi: Some(TrimmedOscState::On { trim: 64 }),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    )
    .unwrap();
    rcc.clock_config(
        &ClkConfig {
            sysclk: Some(SysClkSource::Hsi),
            ..Default::default()
        },
        &b.flash,
        &mut b.hw,
    )
    .unwrap();
    rcc.osc_config(
        &OscConfig {
            msi: Some(MsiState::On {
                range: MsiRange::Range16M,
                trim: 0,
            }),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    )
    .unwrap();
    assert_eq!(b.rb.msi_freq(), Hertz::MHz(16));

    rcc.osc_config(
        &OscConfig {
            msi: Some(MsiState::Off),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    )
    .unwrap();
    assert!(!b.rb.msi_is_ready());
}

#[test]
fn pll_outputs() {
    let mut b = init();
    let mut rcc = b.rcc().constrain();

    // VCO 16 MHz x 12 = 192 MHz
    rcc.osc_config(
        &OscConfig {
            hsi: Some(TrimmedOscState::On { trim: 64 }),
            pll: Some(PllState::On(PllConfig {
                source: PllSource::Hsi,
                m: PllM::Div1,
                n: 12,
                p: PllP::Div4,
                q: PllDiv::Div4,
                r: PllDiv::Div3,
            })),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    )
    .unwrap();
    assert!(b.rb.pll_is_ready());

    // P is off until a kernel clock selects it
    b.rb.set_sai1_clk_source(SaiClkSel::Pll);
    assert_eq!(rcc.periph_clk_freq(PeriphClk::Sai1), ClockFreq::NoClock);

    rcc.periph_clk_config(
        &PeriphClkConfig {
            sai1: Some(SaiClkSel::Pll),
            clk48: Some(Clk48ClkSel::Pll),
            adc: Some(AdcClkSel::Pll),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    )
    .unwrap();
    assert!(b.rb.pll_domain_sai_is_enabled());
    assert!(b.rb.pll_domain_48m_is_enabled());

    let mhz = |f| ClockFreq::Running(Hertz::MHz(f));
    assert_eq!(rcc.periph_clk_freq(PeriphClk::Sai1), mhz(48));
    assert_eq!(rcc.periph_clk_freq(PeriphClk::Adc), mhz(48));
    assert_eq!(rcc.periph_clk_freq(PeriphClk::Clk48), mhz(48));
    assert_eq!(rcc.periph_clk_freq(PeriphClk::Usb), mhz(48));
    // RNG after reset takes CLK48 / 3
    assert_eq!(rcc.periph_clk_freq(PeriphClk::Rng), mhz(16));

    let pll_ck = b.rb.pll_freq_domain_sys(&rcc.oscillator_values());
    assert_eq!(pll_ck, Hertz::MHz(64));

    // Out of range multiplication factor
    let err = rcc.osc_config(
        &OscConfig {
            pll: Some(PllState::On(PllConfig {
                source: PllSource::Hsi,
                m: PllM::Div1,
                n: 200,
                p: PllP::Div4,
                q: PllDiv::Div4,
                r: PllDiv::Div3,
            })),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    );
    assert_eq!(err, Err(Error::InvalidConfig));

    // A refused request leaves the running PLL alone
    assert!(b.rb.pll_is_enabled());
    assert!(b.rb.pll_is_ready());
    assert_eq!(b.rb.get_pll_n(), 12);
    assert_eq!(
        rcc.periph_clk_freq(PeriphClk::Clk48),
        ClockFreq::Running(Hertz::MHz(48))
    );
}

#[test]
fn pllsai1_shares_the_main_pll_input() {
    let mut b = init();
    let mut rcc = b.rcc().constrain();

    rcc.osc_config(
        &OscConfig {
            hsi: Some(TrimmedOscState::On { trim: 64 }),
            pll: Some(PllState::On(PllConfig {
                source: PllSource::Hsi,
                m: PllM::Div2,
                n: 16,
                p: PllP::Div2,
                q: PllDiv::Div2,
                r: PllDiv::Div2,
            })),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    )
    .unwrap();

    // Requests without any output are refused
    let err = rcc.pllsai1_config(
        PllSai1State::On(PllSai1Config {
            n: 24,
            p: None,
            q: None,
            r: None,
        }),
        &mut b.hw,
    );
    assert_eq!(err, Err(Error::InvalidConfig));

    // 16 MHz / 2 x 24 = 192 MHz
    rcc.pllsai1_config(
        PllSai1State::On(PllSai1Config {
            n: 24,
            p: Some(PllP::Div8),
            q: Some(PllDiv::Div4),
            r: None,
        }),
        &mut b.hw,
    )
    .unwrap();
    assert!(b.rb.pllsai1_is_ready());
    assert!(!b.rb.pllsai1_domain_adc_is_enabled());

    // An out of range factor is refused before PLLSAI1 is stopped
    let err = rcc.pllsai1_config(
        PllSai1State::On(PllSai1Config {
            n: 128,
            p: Some(PllP::Div8),
            q: None,
            r: None,
        }),
        &mut b.hw,
    );
    assert_eq!(err, Err(Error::InvalidConfig));
    assert!(b.rb.pllsai1_is_ready());
    assert_eq!(b.rb.get_pllsai1_n(), 24);

    rcc.periph_clk_config(
        &PeriphClkConfig {
            sai1: Some(SaiClkSel::PllSai1),
            clk48: Some(Clk48ClkSel::PllSai1),
            adc: Some(AdcClkSel::PllSai1),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    )
    .unwrap();
    let mhz = |f| ClockFreq::Running(Hertz::MHz(f));
    assert_eq!(rcc.periph_clk_freq(PeriphClk::Sai1), mhz(24));
    assert_eq!(rcc.periph_clk_freq(PeriphClk::Usb), mhz(48));
    // R output disabled
    assert_eq!(rcc.periph_clk_freq(PeriphClk::Adc), ClockFreq::NoClock);

    // The entry clock may not change under a running PLLSAI1
    let err = rcc.osc_config(
        &OscConfig {
            pll: Some(PllState::On(PllConfig {
                source: PllSource::Msi,
                m: PllM::Div1,
                n: 32,
                p: PllP::Div2,
                q: PllDiv::Div2,
                r: PllDiv::Div2,
            })),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    );
    assert_eq!(err, Err(Error::InUse(Clock::PllSai1)));
    assert!(b.rb.pll_is_ready());
    assert_eq!(b.rb.get_pll_main_source(), PllSource::Hsi);

    rcc.pllsai1_config(PllSai1State::Off, &mut b.hw).unwrap();
    assert!(!b.rb.pllsai1_is_ready());
}

#[test]
fn low_speed_oscillators_and_rtc() {
    let mut b = init();
    let mut rcc = b.rcc().constrain();

    rcc.osc_config(
        &OscConfig {
            lse: Some(ExtOscState::On),
            lsi1: Some(OscState::On),
            lsi2: Some(TrimmedOscState::On { trim: 4 }),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    )
    .unwrap();
    assert!(b.pwr.backup_access_is_enabled());
    assert!(b.rb.lse_is_ready());
    assert!(b.rb.lsi1_is_ready());
    assert!(b.rb.lsi2_is_ready());
    assert_eq!(b.rb.get_lsi2_trimming(), 4);

    rcc.periph_clk_config(
        &PeriphClkConfig {
            rtc: Some(RtcClkSource::Lse),
            rng: Some(RngClkSel::Lse),
            lptim2: Some(LptimClkSel::Lsi),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    )
    .unwrap();
    let lse = ClockFreq::Running(Hertz::from_raw(32_768));
    assert_eq!(rcc.periph_clk_freq(PeriphClk::Rtc), lse);
    assert_eq!(rcc.periph_clk_freq(PeriphClk::Rng), lse);
    assert_eq!(
        rcc.periph_clk_freq(PeriphClk::Lptim(Lptim::Lptim2)),
        ClockFreq::Running(Hertz::kHz(32))
    );

    // A new source resets the backup domain, the LSE survives
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
    assert_eq!(
        rcc.periph_clk_freq(PeriphClk::Rtc),
        ClockFreq::Running(Hertz::kHz(32))
    );
}

#[test]
fn kernel_clocks() {
    let mut b = init();
    freeze_64mhz(&mut b);

    let mut rcc = b.rcc().constrain();
    rcc.periph_clk_config(
        &PeriphClkConfig {
            usart1: Some(UsartClkSel::Sysclk),
            lpuart1: Some(UsartClkSel::Hsi),
            i2c1: Some(I2cClkSel::Pclk),
            i2c3: Some(I2cClkSel::Sysclk),
            lptim1: Some(LptimClkSel::Lse),
            sai1: Some(SaiClkSel::Pin),
            adc: Some(AdcClkSel::Sysclk),
            smps: Some((SmpsClkSource::Hse, SmpsPrescaler::Div1)),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    )
    .unwrap();

    let freq = |clk| rcc.periph_clk_freq(clk);
    let mhz = |f| ClockFreq::Running(Hertz::MHz(f));
    assert_eq!(freq(PeriphClk::Usart(Usart::Usart1)), mhz(64));
    // HSI16 is off after a freeze from HSE32
    assert_eq!(freq(PeriphClk::Usart(Usart::Lpuart1)), ClockFreq::NoClock);
    assert_eq!(freq(PeriphClk::I2c(I2c::I2c1)), mhz(64));
    assert_eq!(freq(PeriphClk::I2c(I2c::I2c3)), mhz(64));
    assert_eq!(freq(PeriphClk::Lptim(Lptim::Lptim1)).raw(), ClockFreq::NO_CLOCK);
    assert_eq!(freq(PeriphClk::Sai1).raw(), ClockFreq::NA);
    assert_eq!(freq(PeriphClk::Adc), mhz(64));
    // SMPSSWS follows SMPSSEL once the converter switched
    b.rb.smpscr.set_field(8, 2, 0b10);
    assert_eq!(freq(PeriphClk::Smps), mhz(8));
    // CLK48 from HSI48, which is off
    assert_eq!(freq(PeriphClk::Clk48), ClockFreq::NoClock);
}

#[test]
fn hsi48_for_usb() {
    let mut b = init();
    let mut rcc = b.rcc().constrain();

    rcc.osc_config(
        &OscConfig {
            hsi48: Some(OscState::On),
            ..Default::default()
        },
        &b.pwr,
        &mut b.hw,
    )
    .unwrap();
    assert_eq!(
        rcc.periph_clk_freq(PeriphClk::Usb),
        ClockFreq::Running(Hertz::MHz(48))
    );

    let rec = unsafe { rcc.steal_peripheral_rec() };
    let usb = rec.USB.kernel_clk_mux(Clk48ClkSel::Msi);
    assert_eq!(usb.get_kernel_clk_mux(), Clk48ClkSel::Msi);
    assert_eq!(
        rcc.periph_clk_freq(PeriphClk::Usb),
        ClockFreq::Running(Hertz::MHz(4))
    );
}

#[test]
fn clock_security_systems() {
    let b = init();
    let mut rcc = b.rcc().constrain();

    rcc.enable_css();
    assert!(b.rb.hse_css_is_enabled());

    let mut events = 0;
    rcc.nmi_irq_handler(|| events += 1);
    assert_eq!(events, 0);

    // HSECSSF
    b.rb.cifr.set_bits(1 << 8);
    rcc.nmi_irq_handler(|| events += 1);
    assert_eq!(events, 1);
    assert!(b.rb.cicr.bit(8));

    rcc.enable_lse_css();
    assert!(b.rb.lse_css_is_enabled());
    // LSECSSF
    b.rb.cifr.set_bits(1 << 9);
    rcc.lse_css_irq_handler(|| events += 1);
    assert_eq!(events, 2);
    assert!(b.rb.cicr.bit(9));
    rcc.disable_lse_css();
    assert!(!b.rb.lse_css_is_enabled());
}

#[test]
fn reset_reason_is_read_and_cleared() {
    let b = init();
    let mut rcc = b.rcc().constrain();

    // Brown out after construction, NRST is pulled as well
    assert_eq!(rcc.reset_reason(), ResetReason::BrownOutReset);
    // RMVF
    assert!(b.rb.csr.bit(23));

    b.rb.csr.write(1 << 30);
    assert_eq!(rcc.reset_reason(), ResetReason::WindowWatchdogReset);
}

#[test]
fn deinit_restores_msi() {
    let b = init();
    let rb = b.rb;

    // Leftovers of an earlier configuration, all with stopped oscillators
    rb.set_ahb_prescaler(AhbPrescaler::Div4);
    rb.set_c2_ahb_prescaler(AhbPrescaler::Div8);
    rb.set_msi_range(MsiRange::Range16M);
    rb.pll_config_domain_sys(PllSource::Hse, PllM::Div2, 8, PllDiv::Div2);
    rb.hse_bypass_enable();
    rb.hse_div2_enable();
    rb.cier.write(0x3F);

    rb.deinit().unwrap();

    assert_eq!(rb.sys_clk_source_status(), SysClkSource::Msi);
    assert_eq!(rb.get_msi_range(), MsiRange::Range4M);
    assert_eq!(rb.msi_freq(), Hertz::MHz(4));
    assert_eq!(rb.get_hsi_calib_trimming(), 64);
    assert_eq!(rb.cfgr.read(), 0x0007_0000);
    assert_eq!(rb.extcfgr.read(), 0x0003_0000);
    assert_eq!(rb.pllcfgr.read(), 0x2204_0100);
    assert_eq!(rb.pllsai1cfgr.read(), 0x2204_0100);
    assert_eq!(rb.cier.read(), 0);
    assert!(!rb.hse_bypass_is_enabled());
    assert!(!rb.hse_div2_is_enabled());
    // RMVF
    assert!(rb.csr.bit(23));
}

#[test]
fn deinit_times_out_on_a_stuck_oscillator() {
    let b = init();
    let rb = b.rb;

    // MSI never comes up
    rb.cr.clear_bits(CR_MSIRDY);
    assert_eq!(rb.deinit(), Err(Error::Timeout(Clock::Msi)));

    // The PLL never stops
    rb.cr.set_bits(CR_MSIRDY | CR_PLLRDY);
    assert_eq!(rb.deinit(), Err(Error::Timeout(Clock::Pll)));
}
