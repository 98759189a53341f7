//! Raster element trait for generic cell values

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Trait for types that can be stored in a raster cell.
///
/// Band samples arrive from disk as integers or floats and are cast
/// into the element type through `f64`. Conversion back to `f64` goes
/// through `num_traits::ToPrimitive::to_f64`, inherited via `NumCast`.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Value used when a sample cannot be represented in this type
    fn default_nodata() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Cast an `f64` sample into this type, falling back to [`default_nodata`](Self::default_nodata)
    fn from_f64_or_nodata(value: f64) -> Self {
        num_traits::cast(value).unwrap_or_else(Self::default_nodata)
    }
}

macro_rules! impl_raster_element_int {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::MIN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                nodata == Some(*self)
            }
        }
    )*};
}

macro_rules! impl_raster_element_float {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) if nd.is_nan() => false,
                    Some(nd) => (self - nd).abs() < <$t>::EPSILON * 100.0,
                    None => false,
                }
            }
        }
    )*};
}

impl_raster_element_int!(u8, u16, i16, i32);
impl_raster_element_float!(f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_always_nodata() {
        assert!(f64::NAN.is_nodata(None));
        assert!(f32::NAN.is_nodata(Some(0.0)));
    }

    #[test]
    fn declared_nodata_matches() {
        assert!((-9999.0_f64).is_nodata(Some(-9999.0)));
        assert!(!0.5_f64.is_nodata(Some(-9999.0)));
        assert!(0_u16.is_nodata(Some(0)));
        assert!(!1_u16.is_nodata(None));
    }

    #[test]
    fn out_of_range_cast_becomes_nodata() {
        assert_eq!(u8::from_f64_or_nodata(300.0), u8::MIN);
        assert_eq!(u16::from_f64_or_nodata(1200.0), 1200);
    }
}
