#![macro_use]

macro_rules! impl_id_traits {
    ($idtype: ty) => {
        impl $idtype {
            /// The "null" identifier, `-1`.
            pub const NULL: $idtype = Self(-1);

            pub fn is_null(&self) -> bool {
                *self == Self::NULL
            }

            /// Convenience function to convert to usize.
            /// Implemented via `as`.
            /// Negative values will therefore wrap.
            pub fn as_usize(&self) -> usize {
                self.0 as usize
            }

            /// Convenience function to convert to usize.
            ///
            /// # Returns
            ///
            /// * `None` if the underlying value is negative.
            /// * `Some(usize)` otherwise.
            pub fn to_usize(&self) -> Option<usize> {
                usize::try_from(self.0).ok()
            }
        }

        impl Default for $idtype {
            fn default() -> Self {
                Self::NULL
            }
        }

        impl std::fmt::Display for $idtype {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                if self.is_null() {
                    write!(f, "NULL")
                } else {
                    write!(f, "{}", self.0)
                }
            }
        }

        impl From<i32> for $idtype {
            fn from(value: i32) -> Self {
                Self(value)
            }
        }

        impl From<$idtype> for i32 {
            fn from(value: $idtype) -> Self {
                value.0
            }
        }

        impl TryFrom<usize> for $idtype {
            type Error = $crate::CoalseqError;

            fn try_from(value: usize) -> Result<Self, Self::Error> {
                match i32::try_from(value) {
                    Ok(v) => Ok(Self(v)),
                    Err(_) => Err($crate::CoalseqError::IndexError),
                }
            }
        }

        impl TryFrom<$idtype> for usize {
            type Error = $crate::CoalseqError;

            fn try_from(value: $idtype) -> Result<Self, Self::Error> {
                match usize::try_from(value.0) {
                    Ok(v) => Ok(v),
                    Err(_) => Err($crate::CoalseqError::IndexError),
                }
            }
        }

        impl PartialEq<i32> for $idtype {
            fn eq(&self, other: &i32) -> bool {
                self.0 == *other
            }
        }

        impl PartialEq<$idtype> for i32 {
            fn eq(&self, other: &$idtype) -> bool {
                *self == other.0
            }
        }

        impl PartialOrd<i32> for $idtype {
            fn partial_cmp(&self, other: &i32) -> Option<std::cmp::Ordering> {
                self.0.partial_cmp(other)
            }
        }

        impl PartialOrd<$idtype> for i32 {
            fn partial_cmp(&self, other: &$idtype) -> Option<std::cmp::Ordering> {
                self.partial_cmp(&other.0)
            }
        }
    };
}

macro_rules! impl_f64_newtype_traits {
    ($type: ty) => {
        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<f64> for $type {
            fn from(value: f64) -> Self {
                Self(value)
            }
        }

        impl From<$type> for f64 {
            fn from(value: $type) -> Self {
                value.0
            }
        }

        impl PartialEq<f64> for $type {
            fn eq(&self, other: &f64) -> bool {
                self.0 == *other
            }
        }

        impl PartialEq<$type> for f64 {
            fn eq(&self, other: &$type) -> bool {
                *self == other.0
            }
        }

        impl PartialOrd<f64> for $type {
            fn partial_cmp(&self, other: &f64) -> Option<std::cmp::Ordering> {
                self.0.partial_cmp(other)
            }
        }

        impl PartialOrd<$type> for f64 {
            fn partial_cmp(&self, other: &$type) -> Option<std::cmp::Ordering> {
                self.partial_cmp(&other.0)
            }
        }

        impl std::ops::Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self {
                Self(self.0 + rhs.0)
            }
        }

        impl std::ops::Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self {
                Self(self.0 - rhs.0)
            }
        }
    };
}

macro_rules! value_error {
    ($got: expr, $expected: expr) => {
        $crate::CoalseqError::ValueError {
            got: format!("{}", $got),
            expected: $expected.to_string(),
        }
    };
}
