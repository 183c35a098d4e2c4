use num_traits as num;

/// This trait represents the operations a histogram must be able to perform on the underlying
/// counter type. The `ToPrimitive` trait is needed to perform floating point operations on the
/// counts (usually for quantiles). The `FromPrimitive` to convert back into an integer count.
/// Partial ordering is used for threshholding, also usually in the context of quantiles.
pub trait Counter:
    num::Num
    + num::ToPrimitive
    + num::FromPrimitive
    + num::CheckedSub
    + num::CheckedAdd
    + Copy
    + PartialOrd<Self>
    + std::fmt::Debug
{
    /// Counter as a f64.
    fn as_f64(&self) -> f64;
    /// Counter as a u64.
    fn as_u64(&self) -> u64;
}

macro_rules! impl_counter {
    ($($t:ty),*) => {
        $(
            impl Counter for $t {
                #[inline]
                fn as_f64(&self) -> f64 {
                    *self as f64
                }
                #[inline]
                fn as_u64(&self) -> u64 {
                    *self as u64
                }
            }
        )*
    };
}

impl_counter!(u8, u16, u32);

impl Counter for u64 {
    #[inline]
    fn as_f64(&self) -> f64 {
        *self as f64
    }
    #[inline]
    fn as_u64(&self) -> u64 {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::Counter;

    #[test]
    fn widen_to_u64_and_f64() {
        assert_eq!(255, u8::max_value().as_u64());
        assert_eq!(65_535, u16::max_value().as_u64());
        assert_eq!(4_294_967_295, u32::max_value().as_u64());
        assert_eq!(u64::max_value(), u64::max_value().as_u64());

        assert_eq!(255.0, 255_u8.as_f64());
        assert_eq!(65_535.0, 65_535_u16.as_f64());
        assert_eq!(4_294_967_295.0, u32::max_value().as_f64());
        assert_eq!(1_000_000.0, 1_000_000_u64.as_f64());
    }
}
