//! Peripheral Reset and Enable Control (REC) for STM32WB
//!
//! See [`crate::rcc::rec`] for the shared traits. The controls act on the
//! CPU1 enable registers. RM0434 Section 7.4.

use super::ll::{
    AdcClkSel, Clk48ClkSel, I2cClkSel, LptimClkSel, RngClkSel, SaiClkSel,
    UsartClkSel,
};
use super::regs::RegisterBlock;

peripheral_reset_and_enable_control! {
    #[cfg(all())]
    Ahb1, "AMBA High-performance Bus 1 (AHB1) peripherals" => [ahb1enr, ahb1rstr, ahb1smenr] [
        Dma1 [0],
        Dma2 [1],
        Dmamux1 [2],
        Crc [12],
        Tsc [16]
    ];

    #[cfg(all())]
    Ahb2, "AMBA High-performance Bus 2 (AHB2) peripherals" => [ahb2enr, ahb2rstr, ahb2smenr] [
        Gpioa [0],
        Gpiob [1],
        Gpioc [2],
        Gpiod [3],
        Gpioe [4],
        Gpioh [7],
        Adc [13] [kernel clk: AdcClkSel ccipr[28; 2] "ADC"],
        Aes1 [16]
    ];

    #[cfg(all())]
    Ahb3, "AMBA High-performance Bus 3 (AHB3) peripherals" => [ahb3enr, ahb3rstr, ahb3smenr] [
        Quadspi [8],
        Pka [16],
        Aes2 [17],
        Rng [18] [kernel clk: RngClkSel ccipr[30; 2] "RNG"],
        Flash [25]
    ];

    #[cfg(all())]
    Ahb4, "Shared AHB4 peripherals, gated by CPU1 through AHB3ENR" => [ahb3enr, ahb3rstr, _] [
        Hsem [19],
        Ipcc [20]
    ];

    #[cfg(all())]
    Apb1l, "Advanced Peripheral Bus 1 (APB1) peripherals, first register" => [apb1enr1, apb1rstr1, apb1smenr1] [
        Tim2 [0],
        Lcd [9],
        (NoReset) Rtcapb [10],
        (NoReset) Wwdg [11],
        Spi2 [14],
        I2c1 [21] [kernel clk: I2cClkSel ccipr[12; 2] "I2C1"],
        I2c3 [23] [kernel clk: I2cClkSel ccipr[16; 2] "I2C3"],
        Crs [24],
        Usb [26] [kernel clk: Clk48ClkSel ccipr[26; 2] "CLK48"],
        Lptim1 [31] [kernel clk: LptimClkSel ccipr[18; 2] "LPTIM1"]
    ];

    #[cfg(all())]
    Apb1h, "Advanced Peripheral Bus 1 (APB1) peripherals, second register" => [apb1enr2, apb1rstr2, apb1smenr2] [
        Lpuart1 [0] [kernel clk: UsartClkSel ccipr[10; 2] "LPUART1"],
        Lptim2 [5] [kernel clk: LptimClkSel ccipr[20; 2] "LPTIM2"]
    ];

    #[cfg(all())]
    Apb2, "Advanced Peripheral Bus 2 (APB2) peripherals" => [apb2enr, apb2rstr, apb2smenr] [
        Tim1 [11],
        Spi1 [12],
        Usart1 [14] [kernel clk: UsartClkSel ccipr[0; 2] "USART1"],
        Tim16 [17],
        Tim17 [18],
        Sai1 [21] [kernel clk: SaiClkSel ccipr[22; 2] "SAI1"]
    ];
}

tokenable!(Usart1, Lpuart1, I2c1, I2c3, Spi1, Spi2, Lptim1, Lptim2);
