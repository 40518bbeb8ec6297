//! Volatile register cell
//!
//! Every register block in this crate is a `#[repr(C)]` struct of [`Reg`]
//! cells. A cell is a 32-bit word that is only ever accessed with volatile
//! loads and stores, so it can describe a memory-mapped register as well as
//! a plain word in RAM.

use core::cell::UnsafeCell;
use core::ptr;

/// A 32-bit read/write register
#[repr(transparent)]
pub struct Reg {
    value: UnsafeCell<u32>,
}

// The register is `Send` like a PAC register: ownership of the containing
// block can move between execution contexts.
unsafe impl Send for Reg {}

impl Reg {
    /// Create a register holding `value`
    pub const fn new(value: u32) -> Self {
        Reg {
            value: UnsafeCell::new(value),
        }
    }

    /// Raw pointer to the register
    #[inline(always)]
    pub fn as_ptr(&self) -> *mut u32 {
        self.value.get()
    }

    /// Read the register (`READ_REG`)
    #[inline(always)]
    pub fn read(&self) -> u32 {
        // unsafe: the cell is always a valid, aligned u32
        unsafe { ptr::read_volatile(self.value.get()) }
    }

    /// Write the register (`WRITE_REG`)
    #[inline(always)]
    pub fn write(&self, value: u32) {
        // unsafe: the cell is always a valid, aligned u32
        unsafe { ptr::write_volatile(self.value.get(), value) }
    }

    /// Set every bit of `mask` (`SET_BIT`)
    #[inline(always)]
    pub fn set_bits(&self, mask: u32) {
        self.write(self.read() | mask);
    }

    /// Clear every bit of `mask` (`CLEAR_BIT`)
    #[inline(always)]
    pub fn clear_bits(&self, mask: u32) {
        self.write(self.read() & !mask);
    }

    /// Clear `clear` and then set `set` in one read-modify-write
    /// (`MODIFY_REG`)
    #[inline(always)]
    pub fn modify(&self, clear: u32, set: u32) {
        self.write((self.read() & !clear) | set);
    }

    /// Bits of `mask` that are currently set (`READ_BIT`)
    #[inline(always)]
    pub fn read_bits(&self, mask: u32) -> u32 {
        self.read() & mask
    }

    /// Returns `true` if every bit of `mask` is set
    #[inline(always)]
    pub fn is_set(&self, mask: u32) -> bool {
        self.read_bits(mask) == mask
    }

    /// Write a single bit
    #[inline(always)]
    pub fn set_bit(&self, bit: u8, value: bool) {
        if value {
            self.set_bits(1 << bit);
        } else {
            self.clear_bits(1 << bit);
        }
    }

    /// Read a single bit
    #[inline(always)]
    pub fn bit(&self, bit: u8) -> bool {
        self.is_set(1 << bit)
    }

    /// Extract the unsigned field `[pos + width - 1 : pos]`
    #[inline(always)]
    pub fn field(&self, pos: u8, width: u8) -> u32 {
        (self.read() >> pos) & mask(width)
    }

    /// Replace the field `[pos + width - 1 : pos]` with `value`
    ///
    /// `value` is truncated to `width` bits; the other bits of the
    /// register are preserved.
    #[inline(always)]
    pub fn set_field(&self, pos: u8, width: u8, value: u32) {
        let mask = mask(width);
        self.modify(mask << pos, (value & mask) << pos);
    }
}

/// A mask of `width` ones
#[inline(always)]
pub const fn mask(width: u8) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1 << width) - 1
    }
}

impl core::fmt::Debug for Reg {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#010x}", self.read())
    }
}
