//! Cell value trait

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Types that can be stored in a [`Raster`](super::Raster) cell.
pub trait RasterElement:
    Copy + Debug + PartialOrd + NumCast + Zero + Send + Sync + 'static
{
    /// Lossy conversion to f64 (`None` if the cast overflows)
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_raster_element {
    ($($t:ty),+) => {
        $(impl RasterElement for $t {})+
    };
}

impl_raster_element!(u8, u16, u32, u64, i16, i32, i64, f32, f64);
