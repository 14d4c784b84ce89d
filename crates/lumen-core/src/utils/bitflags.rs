// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Declarative flag sets used by the resource descriptors.

/// Declares a `Copy` flag set over an unsigned integer.
///
/// The generated type exposes one associated constant per flag, the usual
/// set operations and the bitwise operators. Its `Debug` output lists the
/// named flags and reports any leftover bits as `UNKNOWN(..)`.
#[macro_export]
#[doc(hidden)]
macro_rules! lumen_bitflags {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident: $ty:ty {
            $(
                $(#[$flag_attr:meta])*
                const $flag:ident = $value:expr;
            )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $name {
            bits: $ty,
        }

        impl $name {
            /// The set with no flag.
            pub const EMPTY: Self = Self { bits: 0 };

            $(
                $(#[$flag_attr])*
                pub const $flag: Self = Self { bits: $value };
            )*

            /// Builds a set from raw bits, keeping bits no flag names.
            pub const fn from_bits_retain(bits: $ty) -> Self {
                Self { bits }
            }

            /// Returns the raw bits.
            pub const fn bits(&self) -> $ty {
                self.bits
            }

            /// Returns `true` when no bit is set.
            pub const fn is_empty(&self) -> bool {
                self.bits == 0
            }

            /// Returns `true` if every flag of `other` is set in `self`.
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// Returns `true` if `self` and `other` share at least one flag.
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// Returns the union of both sets.
            #[must_use]
            pub const fn union(self, other: Self) -> Self {
                Self { bits: self.bits | other.bits }
            }

            /// Returns `self` without the flags of `other`.
            #[must_use]
            pub const fn difference(self, other: Self) -> Self {
                Self { bits: self.bits & !other.bits }
            }

            /// Sets the flags of `other`.
            pub fn insert(&mut self, other: Self) {
                self.bits |= other.bits;
            }

            /// Clears the flags of `other`.
            pub fn remove(&mut self, other: Self) {
                self.bits &= !other.bits;
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                self.union(rhs)
            }
        }

        impl core::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.insert(rhs);
            }
        }

        impl core::ops::BitAnd for $name {
            type Output = Self;

            fn bitand(self, rhs: Self) -> Self {
                Self { bits: self.bits & rhs.bits }
            }
        }

        impl core::ops::Sub for $name {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self {
                self.difference(rhs)
            }
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                let mut rest = self.bits;
                let mut named = 0usize;

                write!(f, "{} {{ ", stringify!($name))?;
                $(
                    let bits = Self::$flag.bits;
                    if bits != 0 && (rest & bits) == bits {
                        if named > 0 {
                            f.write_str(" | ")?;
                        }
                        f.write_str(stringify!($flag))?;
                        rest &= !bits;
                        named += 1;
                    }
                )*
                if rest != 0 {
                    if named > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "UNKNOWN({:#x})", rest)?;
                } else if named == 0 {
                    f.write_str("EMPTY")?;
                }
                f.write_str(" }")
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::lumen_bitflags;

    lumen_bitflags! {
        /// Flags exercised by the tests below.
        pub struct Access: u16 {
            /// Read access.
            const READ = 1 << 0;
            /// Write access.
            const WRITE = 1 << 1;
            /// Both of the above.
            const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
            /// Execute access.
            const EXECUTE = 1 << 4;
        }
    }

    #[test]
    fn default_is_empty() {
        let access = Access::default();
        assert!(access.is_empty());
        assert_eq!(access, Access::EMPTY);
        assert!(access.contains(Access::EMPTY));
        assert!(!access.intersects(Access::READ));
        assert_eq!(format!("{:?}", access), "Access { EMPTY }");
    }

    #[test]
    fn union_and_contains() {
        let access = Access::READ | Access::EXECUTE;
        assert_eq!(access.bits(), 0b1_0001);
        assert!(access.contains(Access::READ));
        assert!(!access.contains(Access::READ_WRITE));
        assert!(access.intersects(Access::READ_WRITE));
    }

    #[test]
    fn insert_remove_and_difference() {
        let mut access = Access::READ;
        access |= Access::WRITE;
        assert!(access.contains(Access::READ_WRITE));

        access.remove(Access::READ);
        assert_eq!(access, Access::WRITE);
        assert_eq!(Access::READ_WRITE - Access::WRITE, Access::READ);
        assert_eq!((Access::READ_WRITE & Access::WRITE).bits(), 0b10);

        access.insert(Access::EXECUTE);
        assert_eq!(access.difference(Access::WRITE), Access::EXECUTE);
    }

    #[test]
    fn debug_lists_named_flags_and_reports_unknown_bits() {
        assert_eq!(
            format!("{:?}", Access::READ | Access::WRITE),
            "Access { READ | WRITE }"
        );
        assert_eq!(
            format!("{:?}", Access::WRITE | Access::from_bits_retain(0x100)),
            "Access { WRITE | UNKNOWN(0x100) }"
        );
        assert_eq!(
            format!("{:?}", Access::from_bits_retain(0x20)),
            "Access { UNKNOWN(0x20) }"
        );
    }
}
