pub trait GetBit {
    #[must_use]
    fn bit(self, i: u8) -> bool;
}

macro_rules! impl_get_bit {
    ($t:ty) => {
        impl GetBit for $t {
            #[inline]
            fn bit(self, i: u8) -> bool {
                debug_assert!(i < (<$t>::BITS as u8));
                self & (1 << i) != 0
            }
        }
    };
}

impl_get_bit!(u8);
impl_get_bit!(u16);

/// Color index (0-3) of pixel `i` in a tile row, where pixel 0 is the leftmost (MSB) pixel
#[inline]
#[must_use]
pub fn tile_pixel(data_low: u8, data_high: u8, i: u8) -> u8 {
    let bit = 7 - i;
    u8::from(data_low.bit(bit)) | (u8::from(data_high.bit(bit)) << 1)
}
