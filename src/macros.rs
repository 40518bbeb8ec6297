/// Reads a status register twice after an interrupt flag has been cleared
///
/// The write to the clear register reaches RCC a few cycles after the CPU
/// issued it. Without the reads the NMI or RCC handler can return before
/// the flag drops and fire again. ARM Application Note 321, Section 4.9.
macro_rules! interrupt_clear_clock_sync_delay {
    ($status_reg:expr) => {
        let _ = $status_reg.read();
        let _ = $status_reg.read();
    };
}

/// Owned handle to a memory-mapped register block
///
/// The handle dereferences to the register block. `take` hands it out
/// once, `steal` and `from_ptr` bypass that check.
macro_rules! peripheral {
    ($(#[$meta:meta])* $NAME:ident: $Block:ty = $addr:expr;) => {
        $(#[$meta])*
        pub struct $NAME {
            rb: &'static $Block,
        }

        unsafe impl Send for $NAME {}

        impl $NAME {
            /// Address of the register block
            pub const PTR: *const $Block = $addr as *const $Block;

            /// Returns a pointer to the register block
            #[inline(always)]
            pub const fn ptr() -> *const $Block {
                Self::PTR
            }

            /// Returns the peripheral the first time it is called,
            /// `None` afterwards
            pub fn take() -> Option<Self> {
                static TAKEN: core::sync::atomic::AtomicBool =
                    core::sync::atomic::AtomicBool::new(false);

                critical_section::with(|_| {
                    if TAKEN.load(core::sync::atomic::Ordering::Relaxed) {
                        None
                    } else {
                        TAKEN.store(true, core::sync::atomic::Ordering::Relaxed);
                        // unsafe: first and only hand-out
                        Some(unsafe { Self::steal() })
                    }
                })
            }

            /// Unchecked access to the peripheral
            ///
            /// # Safety
            ///
            /// Multiple handles to the same registers may exist.
            #[inline(always)]
            pub unsafe fn steal() -> Self {
                Self::from_ptr(Self::PTR)
            }

            /// A handle to a register block at an arbitrary address, for
            /// example a block in RAM
            ///
            /// # Safety
            ///
            /// `ptr` must point to a register block that lives for the rest
            /// of the program, and multiple handles to it may exist.
            #[inline(always)]
            pub unsafe fn from_ptr(ptr: *const $Block) -> Self {
                $NAME { rb: &*ptr }
            }

            #[allow(dead_code)]
            #[inline(always)]
            pub(crate) fn block(&self) -> &'static $Block {
                self.rb
            }
        }

        impl core::ops::Deref for $NAME {
            type Target = $Block;

            #[inline(always)]
            fn deref(&self) -> &$Block {
                self.rb
            }
        }
    };
}

/// An enumeration whose discriminants are the bit patterns of a register
/// field
///
/// `from_bits` decodes a field value. Patterns that are not listed decode to
/// the variant named after `reserved =>`.
macro_rules! bits_enum {
    ($(
        $(#[$meta:meta])*
        pub enum $Name:ident {
            $(
                $(#[$vmeta:meta])*
                $Variant:ident = $bits:literal,
            )+
        }
        reserved => $Fallback:ident;
    )+) => {
        $(
            $(#[$meta])*
            #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
            #[cfg_attr(feature = "defmt", derive(defmt::Format))]
            #[repr(u8)]
            pub enum $Name {
                $(
                    $(#[$vmeta])*
                    $Variant = $bits,
                )+
            }

            impl $Name {
                /// Field encoding
                #[inline(always)]
                pub const fn bits(self) -> u32 {
                    self as u8 as u32
                }

                /// Decode a field value
                #[inline(always)]
                pub const fn from_bits(bits: u32) -> Self {
                    match bits {
                        $( $bits => Self::$Variant, )+
                        _ => Self::$Fallback,
                    }
                }
            }
        )+
    };
}

/// Enable, disable and query single control bits
///
/// `name: reg[bit] "description";` generates `name_enable`, `name_disable`
/// and `name_is_enabled`.
macro_rules! bit_control {
    ($($name:ident: $reg:ident[$bit:expr] $doc:literal;)+) => {
        paste::item! {
            $(
                #[doc = "Enable " $doc]
                #[inline(always)]
                pub fn [< $name _enable >](&self) {
                    self.$reg.set_bits(1 << $bit);
                }

                #[doc = "Disable " $doc]
                #[inline(always)]
                pub fn [< $name _disable >](&self) {
                    self.$reg.clear_bits(1 << $bit);
                }

                #[doc = "Returns `true` if " $doc " is enabled"]
                #[inline(always)]
                pub fn [< $name _is_enabled >](&self) -> bool {
                    self.$reg.bit($bit)
                }
            )+
        }
    };
}

/// Read-only status bits
macro_rules! status_bits {
    ($($name:ident: $reg:ident[$bit:expr] $doc:literal;)+) => {
        $(
            #[doc = $doc]
            #[inline(always)]
            pub fn $name(&self) -> bool {
                self.$reg.bit($bit)
            }
        )+
    };
}

/// Enumerated multi-bit fields
///
/// `name: reg[pos; width] => Type "description";` generates `set_name` and
/// `get_name`.
macro_rules! field_select {
    ($($name:ident: $reg:ident[$pos:expr; $width:expr] => $T:ty, $doc:literal;)+) => {
        paste::item! {
            $(
                #[doc = "Set " $doc]
                #[inline(always)]
                pub fn [< set_ $name >](&self, value: $T) {
                    self.$reg.set_field($pos, $width, value.bits());
                }

                #[doc = "Get " $doc]
                #[inline(always)]
                pub fn [< get_ $name >](&self) -> $T {
                    <$T>::from_bits(self.$reg.field($pos, $width))
                }
            )+
        }
    };
}

/// Raw numeric fields (trimming, tuning and multiplication factors)
macro_rules! field_value {
    ($($name:ident: $reg:ident[$pos:expr; $width:expr], $doc:literal;)+) => {
        paste::item! {
            $(
                #[doc = "Set " $doc]
                ///
                /// The value is truncated to the width of the field.
                #[inline(always)]
                pub fn [< set_ $name >](&self, value: u32) {
                    self.$reg.set_field($pos, $width, value);
                }

                #[doc = "Get " $doc]
                #[inline(always)]
                pub fn [< get_ $name >](&self) -> u32 {
                    self.$reg.field($pos, $width)
                }
            )+
        }
    };
}

/// Ready and clock security flags with their interrupt enables
///
/// `name: flag_reg[flag_bit], clear_reg[clear_bit] (write|set)
/// [, ie_reg[ie_bit]] "description";` generates `clear_flag_name`,
/// `is_active_flag_name` and, when an interrupt enable is given,
/// `enable_it_name`, `disable_it_name` and `is_enabled_it_name`.
///
/// `write` clears a flag by writing only its clear bit, `set` by a
/// read-modify-write of the clear bit.
macro_rules! interrupt_flags {
    ($(
        $name:ident: $fr:ident[$fb:expr], $cr:ident[$cb:expr] $how:ident
        $(, $ier:ident[$ieb:expr])? $doc:literal;
    )+) => {
        paste::item! {
            $(
                #[doc = "Clear the " $doc " flag"]
                #[inline(always)]
                pub fn [< clear_flag_ $name >](&self) {
                    interrupt_flags!(@clear $how, self.$cr, $cb);
                }

                #[doc = "Returns `true` if the " $doc " flag is set"]
                #[inline(always)]
                pub fn [< is_active_flag_ $name >](&self) -> bool {
                    self.$fr.bit($fb)
                }

                $(
                    #[doc = "Enable the " $doc " interrupt"]
                    #[inline(always)]
                    pub fn [< enable_it_ $name >](&self) {
                        self.$ier.set_bits(1 << $ieb);
                    }

                    #[doc = "Disable the " $doc " interrupt"]
                    #[inline(always)]
                    pub fn [< disable_it_ $name >](&self) {
                        self.$ier.clear_bits(1 << $ieb);
                    }

                    #[doc = "Returns `true` if the " $doc " interrupt is enabled"]
                    #[inline(always)]
                    pub fn [< is_enabled_it_ $name >](&self) -> bool {
                        self.$ier.bit($ieb)
                    }
                )?
            )+
        }
    };
    (@clear write, $reg:expr, $bit:expr) => {
        $reg.write(1 << $bit)
    };
    (@clear set, $reg:expr, $bit:expr) => {
        $reg.set_bits(1 << $bit)
    };
}

/// Getters for frozen bus clocks
macro_rules! ck_getter {
    ($($ck:ident: $doc:expr,)+) => {
        $(
            /// Returns the frequency of
            #[doc=$doc]
            #[inline(always)]
            pub fn $ck(&self) -> Hertz {
                self.$ck
            }
        )+
    };
}

/// Getters for optional clocks
macro_rules! optional_ck_getter {
    ($($opt_ck:ident: $doc:expr,)+) => {
        $(
            /// Returns `Some(frequency)` if
            #[doc=$doc]
            /// is running, otherwise `None`
            #[inline(always)]
            pub fn $opt_ck(&self) -> Option<Hertz> {
                self.$opt_ck
            }
        )+
    };
}
