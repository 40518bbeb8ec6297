//! Peripheral Reset and Enable Control (REC)
//!
//! This module contains the traits shared by the peripheral reset, enable
//! and kernel clock controls of each family (see
//! [`f3::rec`](crate::f3::rec) and [`wb::rec`](crate::wb::rec)).
//!
//! At a minimum each peripheral implements [ResetEnable]. Peripherals that
//! have an individual kernel clock multiplexer also have methods
//! `kernel_clk_mux` and `get_kernel_clk_mux`. These set and get the state
//! of the kernel clock multiplexer respectively.
//!
//! Peripherals that share a clock multiplexer with other peripherals only
//! have a `get_kernel_clk_mux` method. Because the multiplexer is shared, it
//! cannot be set by any individual one of them. Instead it can only be set
//! by methods on the `PeripheralREC` itself. These methods are named
//! `kernel_xxxx_clk_mux()`.
//!
//! # Reset/Enable Example
//!
//! ```ignore
//! let ccdr = rcc.sys_ck(72.MHz()).freeze(&pwr, &flash, &mut delay)?;
//!
//! // Enable the clock to a peripheral and reset it
//! ccdr.peripheral.USART1.enable().reset();
//! ```
//!
//! # REC object
//!
//! There is a REC object for each peripheral. If a REC object is dropped by
//! user code, then the Reset or Enable state of this peripheral cannot be
//! modified for the lifetime of the program.
#![deny(missing_docs)]

use core::marker::PhantomData;

/// A trait for Resetting, Enabling and Disabling a single peripheral
pub trait ResetEnable {
    /// Enable this peripheral
    #[allow(clippy::return_self_not_must_use)]
    fn enable(self) -> Self;
    /// Disable this peripheral
    #[allow(clippy::return_self_not_must_use)]
    fn disable(self) -> Self;
    /// Reset this peripheral
    #[allow(clippy::return_self_not_must_use)]
    fn reset(self) -> Self;
    /// Returns `true` if the bus clock of this peripheral is enabled
    fn is_enabled(&self) -> bool;
}

/// The clock gating state of a peripheral in low-power mode
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LowPowerMode {
    /// Kernel and bus interface clocks are not provided in Sleep and Stop
    /// modes.
    Off,
    /// Kernel and bus interface clocks are provided in Sleep and Stop
    /// modes.
    #[default]
    Enabled,
}

/// A Token to represent a peripheral has been enabled
pub struct Token<P> {
    ph: PhantomData<P>,
}

/// A trait to represent that a peripheral can be turned into a token
pub trait RecTokenizer: ResetEnable + Sized {
    /// Turns the ResetEnable into a token
    fn tokenize(self) -> Token<Self> {
        let _ = self.enable().reset();

        Token { ph: PhantomData {} }
    }
}

// This macro uses the paste::item! macro to create identifiers.
//
// https://crates.io/crates/paste
//
// Invoked from a family's `rec` module with that family's `RegisterBlock`
// in scope. Each bus grouping names its enable register, its reset register
// and its sleep mode enable register (`_` when the bus has none).
macro_rules! peripheral_reset_and_enable_control {
    ($( #[ $tmeta:meta ] $AXBn:ident, $axb_doc:expr =>
        [$enr:ident, $rstr:ident, $lpenr:tt] [
        $(
            $( #[ $pmeta:meta ] )*
                $(($NoReset:ident))? $p:ident [$bit:literal]
                $([ kernel $clk:ident: $Sel:ident $ccip:ident[$pos:literal; $width:literal] $clk_doc:expr ])*
                $([ group clk: $Sel_g:ident $ccip_g:ident[$pos_g:literal; $width_g:literal] $clk_doc_g:expr ])*
        ),*
    ];)+) => {
        paste::item! {
            /// Peripheral Reset and Enable Control
            #[allow(non_snake_case)]
            #[non_exhaustive]
            pub struct PeripheralREC {
                $(
                    $(
                        #[allow(missing_docs)]
                        #[ $tmeta ]
                        $( #[ $pmeta ] )*
                        pub [< $p:upper >]: $p,
                    )*
                )+
                rb: &'static RegisterBlock,
            }
            impl PeripheralREC {
                /// Return a new instance of the peripheral resets /
                /// enables / kernel clocks
                ///
                /// # Safety
                ///
                /// If this method is called multiple times, then multiple
                /// accesses to the same memory exist.
                pub(crate) unsafe fn new_singleton(rb: &'static RegisterBlock) -> PeripheralREC {
                    PeripheralREC {
                        $(
                            $(
                                #[ $tmeta ]
                                $( #[ $pmeta ] )*
                                [< $p:upper >]: $p {
                                    rb,
                                },
                            )*
                        )+
                        rb,
                    }
                }
            }
            $(
                $(
                    #[ $tmeta ]
                    peripheral_reset_and_enable_control_generator! (
                        $AXBn, $enr, $rstr, $lpenr, $(($NoReset))* $p, [< $p:upper >], $bit,
                        $( $pmeta )*
                        $(
                            [kernel $clk: $Sel $ccip[$pos; $width] $clk_doc]
                        )*
                        $(
                            [group clk: $Sel_g $ccip_g[$pos_g; $width_g] $clk_doc_g]
                        )*
                    );
                )*
            )+
        }
    }
}

macro_rules! peripheral_reset_function_behavior {
    (
        $rb:expr, $rstr:ident, $bit:literal
    ) => {
        critical_section::with(|_| {
            $rb.$rstr.set_bits(1 << $bit);
            $rb.$rstr.clear_bits(1 << $bit);
        });
    };
    (
        $rb:expr, $rstr:ident, $NoReset:ident $bit:literal
    ) => {};
}

macro_rules! peripheral_low_power_behavior {
    (_, $p:ident, $bit:literal) => {};
    ($lpenr:ident, $p:ident, $bit:literal) => {
        impl $p {
            /// Set Low Power Mode for peripheral
            #[allow(clippy::return_self_not_must_use)]
            pub fn low_power(self, lpm: $crate::rcc::rec::LowPowerMode) -> Self {
                critical_section::with(|_| {
                    self.rb.$lpenr.set_bit(
                        $bit,
                        lpm != $crate::rcc::rec::LowPowerMode::Off,
                    );
                });
                self
            }

            /// Returns the current Low Power Mode of the peripheral
            pub fn get_low_power(&self) -> $crate::rcc::rec::LowPowerMode {
                if self.rb.$lpenr.bit($bit) {
                    $crate::rcc::rec::LowPowerMode::Enabled
                } else {
                    $crate::rcc::rec::LowPowerMode::Off
                }
            }
        }
    };
}

// This macro uses the paste::item! macro to create identifiers.
//
// https://crates.io/crates/paste
//
// The macro is intended only to be called from within the
// peripheral_reset_and_enable_control macro
macro_rules! peripheral_reset_and_enable_control_generator {
    (
        $AXBn:ident, $enr:ident, $rstr:ident, $lpenr:tt,
        $(($NoReset:ident))? $p:ident,
        $p_upper:ident,         // Upper case $p available for use in comments
        $bit:literal,

        $( $pmeta:meta )*
        $([ kernel $clk:ident: $Sel:ident $ccip:ident[$pos:literal; $width:literal] $clk_doc:expr ])*
        $([ group clk: $Sel_g:ident $ccip_g:ident[$pos_g:literal; $width_g:literal] $clk_doc_g:expr ])*
    ) => {
        paste::item! {
            #[doc = " Reset, Enable and Clock functionality for " $p]
            ///
            /// # Reset/Enable Example
            ///
            /// ```ignore
            /// let ccdr = ...; // From RCC
            ///
            /// // Enable the clock to the peripheral and reset it
            #[doc = "ccdr.peripheral." $p_upper ".enable().reset();"]
            /// ```
            ///
            $(                  // Individual kernel clocks
                /// # Individual Kernel Clock
                ///
                /// This peripheral has its own dedicated kernel clock.
                #[doc = "See [" $Sel "] for possible clock sources."]
                #[doc = "(" $clk_doc ")"]
            )*
            $(                  // Group kernel clocks
                /// # Group Kernel Clock
                ///
                /// This peripheral has a kernel clock that is shared with other
                /// peripherals.
                ///
                #[doc = "Since it is shared (" $clk_doc_g "), it must be set "
                  "using a `kernel_xxxx_clk_mux` method on the PeripheralREC."]
            )*
            $( #[ $pmeta ] )*
            pub struct $p {
                pub(crate) rb: &'static RegisterBlock,
            }
            $( #[ $pmeta ] )*
            unsafe impl Send for $p {}
            $( #[ $pmeta ] )*
            impl $crate::rcc::rec::ResetEnable for $p {
                #[inline(always)]
                fn enable(self) -> Self {
                    // Owned exclusive access to this bitfield
                    critical_section::with(|_| {
                        self.rb.$enr.set_bits(1 << $bit);
                    });
                    self
                }
                #[inline(always)]
                fn disable(self) -> Self {
                    // Owned exclusive access to this bitfield
                    critical_section::with(|_| {
                        self.rb.$enr.clear_bits(1 << $bit);
                    });
                    self
                }
                #[inline(always)]
                fn reset(self) -> Self {
                    peripheral_reset_function_behavior!(self.rb, $rstr, $($NoReset)? $bit);
                    self
                }
                #[inline(always)]
                fn is_enabled(&self) -> bool {
                    self.rb.$enr.bit($bit)
                }
            }
            peripheral_low_power_behavior!($lpenr, $p, $bit);
            $( #[ $pmeta ] )*
            impl $p {
                $(      // Individual kernel clocks
                    #[inline(always)]
                    #[allow(clippy::return_self_not_must_use)]
                    /// Modify the kernel clock for
                    #[doc=$clk_doc "."]
                    ///
                    /// The user must ensure that both the old and the new
                    /// clock are running while switching.
                    pub fn [< kernel_ $clk _mux >](self, sel: $Sel) -> Self {
                        // Owned exclusive access to this bitfield
                        critical_section::with(|_| {
                            self.rb.$ccip.set_field($pos, $width, sel.bits());
                        });
                        self
                    }

                    #[inline(always)]
                    /// Return the current kernel clock selection
                    pub fn [< get_kernel_ $clk _mux>](&self) -> $Sel {
                        $Sel::from_bits(self.rb.$ccip.field($pos, $width))
                    }
                )*
                $(      // Group kernel clocks
                    #[inline(always)]
                    /// Return the
                    #[doc=$clk_doc_g]
                    /// kernel clock selection
                    pub fn get_kernel_clk_mux(&self) -> $Sel_g {
                        $Sel_g::from_bits(self.rb.$ccip_g.field($pos_g, $width_g))
                    }
                )*
            }
        }
    }
}

macro_rules! tokenable {
    ($($TK:ty),*) => {
        $(
            impl $crate::rcc::rec::RecTokenizer for $TK {}
        )*
    };
}
