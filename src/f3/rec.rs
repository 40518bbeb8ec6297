//! Peripheral Reset and Enable Control (REC) for STM32F3
//!
//! See [`crate::rcc::rec`] for the shared traits. RM0316 Section 9.4.

use super::ll::{AdcClkSel, I2cClkSel, TimClkSel, UsartClkSel};
use super::regs::RegisterBlock;

peripheral_reset_and_enable_control! {
    #[cfg(all())]
    Ahb, "AMBA High-performance Bus (AHB) peripherals" => [ahbenr, ahbrstr, _] [
        (NoReset) Dma1 [0],
        (NoReset) Dma2 [1],
        (NoReset) Sram [2],
        (NoReset) Flitf [4],
        Fmc [5],
        (NoReset) Crc [6],
        Gpioh [16],
        Gpioa [17],
        Gpiob [18],
        Gpioc [19],
        Gpiod [20],
        Gpioe [21],
        Gpiof [22],
        Gpiog [23],
        Tsc [24],
        Adc12 [28] [kernel clk: AdcClkSel cfgr2[4; 5] "ADC12"],
        Adc34 [29] [kernel clk: AdcClkSel cfgr2[9; 5] "ADC34"]
    ];

    #[cfg(all())]
    Apb2, "Advanced Peripheral Bus 2 (APB2) peripherals" => [apb2enr, apb2rstr, _] [
        Syscfg [0],
        Tim1 [11] [kernel clk: TimClkSel cfgr3[8; 1] "TIM1"],
        Spi1 [12],
        Tim8 [13] [kernel clk: TimClkSel cfgr3[9; 1] "TIM8"],
        Usart1 [14] [kernel clk: UsartClkSel cfgr3[0; 2] "USART1"],
        Spi4 [15],
        Tim15 [16] [kernel clk: TimClkSel cfgr3[10; 1] "TIM15"],
        Tim16 [17] [kernel clk: TimClkSel cfgr3[11; 1] "TIM16"],
        Tim17 [18] [kernel clk: TimClkSel cfgr3[13; 1] "TIM17"],
        Tim20 [20] [kernel clk: TimClkSel cfgr3[15; 1] "TIM20"]
    ];

    #[cfg(all())]
    Apb1, "Advanced Peripheral Bus 1 (APB1) peripherals" => [apb1enr, apb1rstr, _] [
        Tim2 [0] [kernel clk: TimClkSel cfgr3[24; 1] "TIM2"],
        Tim3 [1] [group clk: TimClkSel cfgr3[25; 1] "TIM34"],
        Tim4 [2] [group clk: TimClkSel cfgr3[25; 1] "TIM34"],
        Tim6 [4],
        Tim7 [5],
        Wwdg [11],
        Spi2 [14],
        Spi3 [15],
        Usart2 [17] [kernel clk: UsartClkSel cfgr3[16; 2] "USART2"],
        Usart3 [18] [kernel clk: UsartClkSel cfgr3[18; 2] "USART3"],
        Uart4 [19] [kernel clk: UsartClkSel cfgr3[20; 2] "UART4"],
        Uart5 [20] [kernel clk: UsartClkSel cfgr3[22; 2] "UART5"],
        I2c1 [21] [kernel clk: I2cClkSel cfgr3[4; 1] "I2C1"],
        I2c2 [22] [kernel clk: I2cClkSel cfgr3[5; 1] "I2C2"],
        Usb [23],
        Can [25],
        Dac2 [26],
        Pwr [28],
        Dac1 [29],
        I2c3 [30] [kernel clk: I2cClkSel cfgr3[6; 1] "I2C3"]
    ];
}

impl PeripheralREC {
    /// Modify the kernel clock for TIM3 and TIM4.
    ///
    /// The user must ensure that both the old and the new clock are
    /// running while switching.
    pub fn kernel_tim34_clk_mux(&mut self, sel: TimClkSel) -> &mut Self {
        // Owned exclusive access to this bitfield
        critical_section::with(|_| {
            self.rb.cfgr3.set_field(25, 1, sel.bits());
        });
        self
    }
}

tokenable!(Usart1, Usart2, Usart3, Uart4, Uart5, I2c1, I2c2, I2c3, Spi1, Spi2, Spi3);
