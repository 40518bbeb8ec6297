//! STM32WB register blocks
//!
//! RM0434 Section 7.4 (RCC), 3.10 (FLASH) and 6.6 (PWR).

use crate::reg::Reg;

const RESERVED: Reg = Reg::new(0);

/// RCC register block
#[repr(C)]
pub struct RegisterBlock {
    /// 0x00: Clock control register
    pub cr: Reg,
    /// 0x04: Internal clock sources calibration register
    pub icscr: Reg,
    /// 0x08: Clock configuration register
    pub cfgr: Reg,
    /// 0x0C: PLL configuration register
    pub pllcfgr: Reg,
    /// 0x10: PLLSAI1 configuration register
    pub pllsai1cfgr: Reg,
    _reserved0: Reg,
    /// 0x18: Clock interrupt enable register
    pub cier: Reg,
    /// 0x1C: Clock interrupt flag register
    pub cifr: Reg,
    /// 0x20: Clock interrupt clear register
    pub cicr: Reg,
    /// 0x24: Step down converter clock switch register
    pub smpscr: Reg,
    /// 0x28: AHB1 peripheral reset register
    pub ahb1rstr: Reg,
    /// 0x2C: AHB2 peripheral reset register
    pub ahb2rstr: Reg,
    /// 0x30: AHB3 and AHB4 peripheral reset register
    pub ahb3rstr: Reg,
    _reserved1: Reg,
    /// 0x38: APB1 peripheral reset register 1
    pub apb1rstr1: Reg,
    /// 0x3C: APB1 peripheral reset register 2
    pub apb1rstr2: Reg,
    /// 0x40: APB2 peripheral reset register
    pub apb2rstr: Reg,
    /// 0x44: APB3 peripheral reset register
    pub apb3rstr: Reg,
    /// 0x48: AHB1 peripheral clock enable register
    pub ahb1enr: Reg,
    /// 0x4C: AHB2 peripheral clock enable register
    pub ahb2enr: Reg,
    /// 0x50: AHB3 and AHB4 peripheral clock enable register
    pub ahb3enr: Reg,
    _reserved2: Reg,
    /// 0x58: APB1 peripheral clock enable register 1
    pub apb1enr1: Reg,
    /// 0x5C: APB1 peripheral clock enable register 2
    pub apb1enr2: Reg,
    /// 0x60: APB2 peripheral clock enable register
    pub apb2enr: Reg,
    _reserved3: Reg,
    /// 0x68: AHB1 peripheral clocks enable in Sleep and Stop modes
    pub ahb1smenr: Reg,
    /// 0x6C: AHB2 peripheral clocks enable in Sleep and Stop modes
    pub ahb2smenr: Reg,
    /// 0x70: AHB3 and AHB4 peripheral clocks enable in Sleep and Stop modes
    pub ahb3smenr: Reg,
    _reserved4: Reg,
    /// 0x78: APB1 peripheral clocks enable in Sleep and Stop modes 1
    pub apb1smenr1: Reg,
    /// 0x7C: APB1 peripheral clocks enable in Sleep and Stop modes 2
    pub apb1smenr2: Reg,
    /// 0x80: APB2 peripheral clocks enable in Sleep and Stop modes
    pub apb2smenr: Reg,
    _reserved5: Reg,
    /// 0x88: Peripherals independent clock configuration register
    pub ccipr: Reg,
    _reserved6: Reg,
    /// 0x90: Backup domain control register
    pub bdcr: Reg,
    /// 0x94: Control/status register
    pub csr: Reg,
    /// 0x98: Clock recovery RC register
    pub crrcr: Reg,
    /// 0x9C: Clock HSE register
    pub hsecr: Reg,
    _reserved7: [Reg; 26],
    /// 0x108: Extended clock recovery register
    pub extcfgr: Reg,
}

impl RegisterBlock {
    /// A register block holding the reset values
    pub const fn new() -> Self {
        RegisterBlock {
            cr: Reg::new(0x0000_0061),
            icscr: Reg::new(0x4000_0000),
            cfgr: Reg::new(0x0007_0000),
            pllcfgr: Reg::new(0x2204_0100),
            pllsai1cfgr: Reg::new(0x2204_0100),
            _reserved0: RESERVED,
            cier: Reg::new(0),
            cifr: Reg::new(0),
            cicr: Reg::new(0),
            smpscr: Reg::new(0x0000_0301),
            ahb1rstr: Reg::new(0),
            ahb2rstr: Reg::new(0),
            ahb3rstr: Reg::new(0),
            _reserved1: RESERVED,
            apb1rstr1: Reg::new(0),
            apb1rstr2: Reg::new(0),
            apb2rstr: Reg::new(0),
            apb3rstr: Reg::new(0),
            ahb1enr: Reg::new(0),
            ahb2enr: Reg::new(0),
            ahb3enr: Reg::new(0x0200_0000),
            _reserved2: RESERVED,
            apb1enr1: Reg::new(0),
            apb1enr2: Reg::new(0),
            apb2enr: Reg::new(0),
            _reserved3: RESERVED,
            ahb1smenr: Reg::new(0x0001_1207),
            ahb2smenr: Reg::new(0x0001_209F),
            ahb3smenr: Reg::new(0x0307_0100),
            _reserved4: RESERVED,
            apb1smenr1: Reg::new(0x85A0_4E01),
            apb1smenr2: Reg::new(0x0000_0021),
            apb2smenr: Reg::new(0x0026_5800),
            _reserved5: RESERVED,
            ccipr: Reg::new(0),
            _reserved6: RESERVED,
            bdcr: Reg::new(0),
            csr: Reg::new(0x0C00_0000),
            crrcr: Reg::new(0),
            hsecr: Reg::new(0x0000_0030),
            _reserved7: [RESERVED; 26],
            extcfgr: Reg::new(0x0003_0000),
        }
    }
}

impl Default for RegisterBlock {
    fn default() -> Self {
        Self::new()
    }
}

/// FLASH interface register block (access control only)
#[repr(C)]
pub struct FlashRegisterBlock {
    /// 0x00: Flash access control register
    pub acr: Reg,
}

impl FlashRegisterBlock {
    /// A register block holding the reset values
    pub const fn new() -> Self {
        FlashRegisterBlock {
            acr: Reg::new(0x0000_0600),
        }
    }

    /// Number of flash wait states
    #[inline(always)]
    pub fn latency(&self) -> u32 {
        self.acr.field(0, 3)
    }

    /// Set the number of flash wait states
    #[inline(always)]
    pub fn set_latency(&self, ws: u32) {
        self.acr.set_field(0, 3, ws);
    }
}

impl Default for FlashRegisterBlock {
    fn default() -> Self {
        Self::new()
    }
}

/// Power control register block (CR1 only)
#[repr(C)]
pub struct PwrRegisterBlock {
    /// 0x00: Power control register 1
    pub cr1: Reg,
}

impl PwrRegisterBlock {
    /// A register block holding the reset values
    pub const fn new() -> Self {
        PwrRegisterBlock {
            cr1: Reg::new(0x0000_0200),
        }
    }

    bit_control! {
        backup_access: cr1[8] "write access to the backup domain (DBP)";
    }
}

impl Default for PwrRegisterBlock {
    fn default() -> Self {
        Self::new()
    }
}

peripheral! {
    /// Reset and clock control
    RCC: RegisterBlock = 0x5800_0000;
}

peripheral! {
    /// Flash memory interface
    FLASH: FlashRegisterBlock = 0x5800_4000;
}

peripheral! {
    /// Power control
    PWR: PwrRegisterBlock = 0x5800_0400;
}

impl crate::Sealed for RCC {}
