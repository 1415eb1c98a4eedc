//! This module contains the single value of the arrays: the owned [`ElementImpl`] and
//! the borrowed [`ElementImplRef`]

pub mod timestamp;

use std::fmt::Display;

use self::timestamp::LongTimestampTz;
use crate::types::PhysicalType;

macro_rules! element_impl {
    ($({$variant:ident, $element_ty:ty, $_:ident, $__:ident}),+) => {
        /// Owned value of an array, enum dispatch over the physical types
        #[derive(Debug, Clone, PartialEq)]
        pub enum ElementImpl {
            $(
                #[doc = concat!("Element of `", stringify!($element_ty), "`")]
                $variant($element_ty),
            )+
            /// Variable length bytes
            Binary(Vec<u8>),
        }

        /// Borrowed value of an array
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub enum ElementImplRef<'a> {
            $(
                #[doc = concat!("Element of `", stringify!($element_ty), "`")]
                $variant($element_ty),
            )+
            /// Variable length bytes
            Binary(&'a [u8]),
        }

        impl ElementImpl {
            /// Get the reference of the element
            #[inline]
            pub fn as_ref(&self) -> ElementImplRef<'_> {
                match self {
                    $(
                        Self::$variant(v) => ElementImplRef::$variant(*v),
                    )+
                    Self::Binary(v) => ElementImplRef::Binary(v),
                }
            }

            /// Physical type of the element
            #[inline]
            pub fn physical_type(&self) -> PhysicalType {
                self.as_ref().physical_type()
            }

            /// Number of bytes the element allocated in the heap
            #[inline]
            pub fn heap_size(&self) -> usize {
                match self {
                    Self::Binary(v) => v.capacity(),
                    _ => 0,
                }
            }
        }

        impl ElementImplRef<'_> {
            /// Convert the reference to owned element
            #[inline]
            pub fn to_owned(self) -> ElementImpl {
                match self {
                    $(
                        Self::$variant(v) => ElementImpl::$variant(v),
                    )+
                    Self::Binary(v) => ElementImpl::Binary(v.to_vec()),
                }
            }

            /// Physical type of the element
            #[inline]
            pub fn physical_type(&self) -> PhysicalType {
                match self {
                    $(
                        Self::$variant(_) => PhysicalType::$variant,
                    )+
                    Self::Binary(_) => PhysicalType::Binary,
                }
            }

            /// Get ident of the element
            pub fn ident(&self) -> &'static str {
                match self {
                    $(
                        Self::$variant(_) => stringify!($variant),
                    )+
                    Self::Binary(_) => "Binary",
                }
            }
        }

        impl Display for ElementImplRef<'_> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        Self::$variant(v) => write!(f, "{}", v),
                    )+
                    Self::Binary(v) => match std::str::from_utf8(v) {
                        Ok(s) => write!(f, "{}", s),
                        Err(_) => write!(f, "{:02x?}", v),
                    },
                }
            }
        }

        $(
            impl From<$element_ty> for ElementImpl {
                #[inline]
                fn from(value: $element_ty) -> Self {
                    Self::$variant(value)
                }
            }

            impl From<$element_ty> for ElementImplRef<'_> {
                #[inline]
                fn from(value: $element_ty) -> Self {
                    Self::$variant(value)
                }
            }
        )+
    };
}

crate::macros::for_all_primitive_types!(element_impl);

impl From<Vec<u8>> for ElementImpl {
    #[inline]
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(value)
    }
}

impl From<&str> for ElementImpl {
    #[inline]
    fn from(value: &str) -> Self {
        Self::Binary(value.as_bytes().to_vec())
    }
}

impl<'a> From<&'a [u8]> for ElementImplRef<'a> {
    #[inline]
    fn from(value: &'a [u8]) -> Self {
        Self::Binary(value)
    }
}

impl<'a> From<&'a str> for ElementImplRef<'a> {
    #[inline]
    fn from(value: &'a str) -> Self {
        Self::Binary(value.as_bytes())
    }
}

impl Display for ElementImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.as_ref(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_round_trip_through_ref() {
        let elements = [
            ElementImpl::from(-7_i64),
            ElementImpl::from("quarry"),
            ElementImpl::from(LongTimestampTz::try_new(1, 2, 3).unwrap()),
        ];
        for element in &elements {
            assert_eq!(&element.as_ref().to_owned(), element);
        }
        assert_eq!(elements[1].physical_type(), PhysicalType::Binary);
        assert_eq!(elements[1].to_string(), "quarry");
    }
}
