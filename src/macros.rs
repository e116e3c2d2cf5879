//! # Internal Macros
//!
//! Accessor generation for zerocopy header structs whose multi-byte fields
//! use the big-endian wrapper types (`U16`, `U32`). Every on-disk integer in
//! this file format is big-endian, so headers store wrapped fields and expose
//! native-integer getters and setters generated here.
//!
//! ```ignore
//! use zerocopy::big_endian::{U16, U32};
//!
//! #[repr(C)]
//! struct Header {
//!     page_size: U16,
//!     change_counter: U32,
//! }
//!
//! impl Header {
//!     be_accessors! {
//!         page_size: u16,
//!         change_counter: u32,
//!     }
//! }
//! ```

/// Generates getter and setter methods for zerocopy big-endian fields.
#[macro_export]
macro_rules! be_accessors {
    (@impl $field:ident, u16) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u16 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u16) {
                self.$field = ::zerocopy::big_endian::U16::new(val);
            }
        }
    };
    (@impl $field:ident, u32) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u32 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u32) {
                self.$field = ::zerocopy::big_endian::U32::new(val);
            }
        }
    };
    ($($field:ident : $ty:tt),* $(,)?) => {
        $(
            $crate::be_accessors!(@impl $field, $ty);
        )*
    };
}
