//! Prelude

#[cfg(feature = "stm32f3")]
pub use crate::f3::RccExt as _stm32_rcc_f3_RccExt;
#[cfg(feature = "stm32wb")]
pub use crate::wb::RccExt as _stm32_rcc_wb_RccExt;

pub use fugit::{ExtU32 as _, RateExtU32 as _};
