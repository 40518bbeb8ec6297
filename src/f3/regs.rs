//! STM32F3 register blocks
//!
//! RM0316 Section 9.4 (RCC), 3.5 (FLASH) and 6.4 (PWR).

use crate::reg::Reg;

/// RCC register block
#[repr(C)]
pub struct RegisterBlock {
    /// 0x00: Clock control register
    pub cr: Reg,
    /// 0x04: Clock configuration register
    pub cfgr: Reg,
    /// 0x08: Clock interrupt register
    pub cir: Reg,
    /// 0x0C: APB2 peripheral reset register
    pub apb2rstr: Reg,
    /// 0x10: APB1 peripheral reset register
    pub apb1rstr: Reg,
    /// 0x14: AHB peripheral clock enable register
    pub ahbenr: Reg,
    /// 0x18: APB2 peripheral clock enable register
    pub apb2enr: Reg,
    /// 0x1C: APB1 peripheral clock enable register
    pub apb1enr: Reg,
    /// 0x20: RTC domain control register
    pub bdcr: Reg,
    /// 0x24: Control/status register
    pub csr: Reg,
    /// 0x28: AHB peripheral reset register
    pub ahbrstr: Reg,
    /// 0x2C: Clock configuration register 2
    pub cfgr2: Reg,
    /// 0x30: Clock configuration register 3
    pub cfgr3: Reg,
}

impl RegisterBlock {
    /// A register block holding the reset values
    pub const fn new() -> Self {
        RegisterBlock {
            cr: Reg::new(0x0000_0083),
            cfgr: Reg::new(0),
            cir: Reg::new(0),
            apb2rstr: Reg::new(0),
            apb1rstr: Reg::new(0),
            ahbenr: Reg::new(0x0000_0014),
            apb2enr: Reg::new(0),
            apb1enr: Reg::new(0),
            bdcr: Reg::new(0),
            csr: Reg::new(0x0C00_0000),
            ahbrstr: Reg::new(0),
            cfgr2: Reg::new(0),
            cfgr3: Reg::new(0),
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
            acr: Reg::new(0x0000_0030),
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

/// Power control register block
#[repr(C)]
pub struct PwrRegisterBlock {
    /// 0x00: Power control register
    pub cr: Reg,
    /// 0x04: Power control/status register
    pub csr: Reg,
}

impl PwrRegisterBlock {
    /// A register block holding the reset values
    pub const fn new() -> Self {
        PwrRegisterBlock {
            cr: Reg::new(0),
            csr: Reg::new(0),
        }
    }

    bit_control! {
        backup_access: cr[8] "write access to the RTC domain (DBP)";
    }
}

impl Default for PwrRegisterBlock {
    fn default() -> Self {
        Self::new()
    }
}

peripheral! {
    /// Reset and clock control
    RCC: RegisterBlock = 0x4002_1000;
}

peripheral! {
    /// Flash memory interface
    FLASH: FlashRegisterBlock = 0x4002_2000;
}

peripheral! {
    /// Power control
    PWR: PwrRegisterBlock = 0x4000_7000;
}

impl crate::Sealed for RCC {}
