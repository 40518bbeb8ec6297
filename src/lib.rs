//! Reset and Clock Control (RCC) for STM32F3 and STM32WB microcontrollers
//!
//! Two tiers are provided for each family:
//!
//! * A low layer ([`f3::ll`], [`wb::ll`]) that exposes every RCC bit-field
//!   as a method on the register block, together with the frequency
//!   derivations ([`f3::clocks`], [`wb::clocks`]) that decode the current
//!   register state into clock frequencies.
//!
//! * A configuration layer built on top of it: oscillator, bus clock and
//!   peripheral kernel clock configuration with bounded timeouts, and a
//!   builder that freezes a complete clock tree from target frequencies.
//!
//! The register blocks can be placed anywhere in memory, which makes every
//! accessor usable against a block in RAM as well as against the real
//! peripheral.
#![cfg_attr(not(test), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(non_camel_case_types)]

#[cfg(not(feature = "device-selected"))]
compile_error!(
    "This crate requires one of the following device features enabled:
        stm32f3
        stm32wb
"
);

#[macro_use]
mod macros;

pub mod prelude;
pub mod reg;
pub mod time;

#[cfg(feature = "device-selected")]
#[macro_use]
pub mod rcc;

#[cfg(feature = "device-selected")]
pub mod delay;

#[cfg(feature = "stm32f3")]
#[cfg_attr(docsrs, doc(cfg(feature = "stm32f3")))]
pub mod f3;

#[cfg(feature = "stm32wb")]
#[cfg_attr(docsrs, doc(cfg(feature = "stm32wb")))]
pub mod wb;

mod sealed {
    pub trait Sealed {}
}

pub(crate) use sealed::Sealed;
