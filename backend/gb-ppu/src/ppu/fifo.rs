//! Fixed-capacity pixel queues used by the fetch pipeline

use bincode::{Decode, Encode};

// Large enough to hold a full line plus a sprite's worth of lookahead
pub const FIFO_CAPACITY: usize = 320;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub struct BgPixel {
    pub color: u8,
    pub blank: bool,
    pub palette: u8,
}

impl BgPixel {
    pub const BLANK: Self = Self { color: 0, blank: true, palette: 0 };

    #[must_use]
    pub fn new(color: u8) -> Self {
        Self { color, blank: false, palette: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub struct SpritePixel {
    pub color: u8,
    // OBP selector + 1
    pub palette: u8,
    pub oam_index: u8,
    pub bg_priority: bool,
    pub blank: bool,
    pub x: i16,
    // Screen X of the sprite's leftmost column
    pub origin_x: i16,
}

impl SpritePixel {
    #[must_use]
    pub fn blank_at(x: i16) -> Self {
        Self { color: 0, palette: 0, oam_index: 0, bg_priority: false, blank: true, x, origin_x: x }
    }

    /// Whether `incoming` should replace this pixel in the sprite FIFO.
    ///
    /// Transparent and blank slots always give way. Between two opaque pixels the sprite with the
    /// lower X wins, and on equal X the lower OAM index wins.
    #[must_use]
    pub fn yields_to(&self, incoming: &Self) -> bool {
        if self.blank || self.color == 0 {
            return true;
        }

        if self.origin_x == incoming.origin_x {
            incoming.oam_index < self.oam_index
        } else {
            incoming.origin_x < self.origin_x
        }
    }
}

/// Ring buffer with a fixed backing array. `start` and `len` are both kept below the capacity,
/// and the array is never reallocated so the serialized size is constant.
#[derive(Debug, Clone, Encode, Decode)]
pub struct PixelFifo<T> {
    pixels: Box<[T; FIFO_CAPACITY]>,
    start: u16,
    len: u16,
}

impl<T: Copy + Default> PixelFifo<T> {
    #[must_use]
    pub fn new() -> Self {
        Self { pixels: Box::new([T::default(); FIFO_CAPACITY]), start: 0, len: 0 }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len.into()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn physical_index(&self, i: usize) -> usize {
        (usize::from(self.start) + i) % FIFO_CAPACITY
    }

    #[must_use]
    pub fn front(&self) -> Option<&T> {
        self.get(0)
    }

    #[must_use]
    pub fn back(&self) -> Option<&T> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    #[must_use]
    pub fn get(&self, i: usize) -> Option<&T> {
        (i < self.len()).then(|| &self.pixels[self.physical_index(i)])
    }

    pub fn get_mut(&mut self, i: usize) -> Option<&mut T> {
        if i < self.len() {
            let idx = self.physical_index(i);
            Some(&mut self.pixels[idx])
        } else {
            None
        }
    }

    pub fn push(&mut self, pixel: T) {
        if self.len() == FIFO_CAPACITY {
            log::error!("Pixel FIFO overflow, dropping pixel");
            return;
        }

        let idx = self.physical_index(self.len());
        self.pixels[idx] = pixel;
        self.len += 1;
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let pixel = self.pixels[self.start as usize];
        self.start = ((usize::from(self.start) + 1) % FIFO_CAPACITY) as u16;
        self.len -= 1;
        Some(pixel)
    }

    /// Empty the queue without touching the backing array
    pub fn reset(&mut self) {
        self.start = 0;
        self.len = 0;
    }

    /// Empty the queue and zero the backing array
    pub fn clear(&mut self) {
        self.pixels.fill(T::default());
        self.reset();
    }

    /// Whether the indices are consistent with the capacity; only fails for corrupt savestates
    #[must_use]
    pub fn indices_valid(&self) -> bool {
        usize::from(self.start) < FIFO_CAPACITY && self.len() <= FIFO_CAPACITY
    }
}

impl<T: Copy + Default> Default for PixelFifo<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain<T: Copy + Default>(fifo: &mut PixelFifo<T>) -> Vec<T> {
        std::iter::from_fn(|| fifo.pop()).collect()
    }

    #[test]
    fn push_pop_in_order() {
        let mut fifo: PixelFifo<u8> = PixelFifo::new();
        assert!(fifo.is_empty());
        assert_eq!(fifo.pop(), None);

        for i in 0..8 {
            fifo.push(i);
        }
        assert_eq!(fifo.len(), 8);
        assert_eq!(fifo.front(), Some(&0));
        assert_eq!(fifo.back(), Some(&7));

        assert_eq!(drain(&mut fifo), (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn wraps_around_capacity() {
        let mut fifo: PixelFifo<u16> = PixelFifo::new();
        for i in 0..FIFO_CAPACITY as u16 - 3 {
            fifo.push(i);
            fifo.pop();
        }

        for i in 0..10 {
            fifo.push(1000 + i);
        }
        assert_eq!(fifo.len(), 10);
        assert_eq!(fifo.get(5), Some(&1005));
        assert_eq!(fifo.get(10), None);

        *fifo.get_mut(9).unwrap() = 7;
        assert!(fifo.indices_valid());

        let mut expected: Vec<_> = (1000..1009).collect();
        expected.push(7);
        assert_eq!(drain(&mut fifo), expected);
    }

    #[test]
    fn full_queue_drops_pushes() {
        let mut fifo: PixelFifo<u8> = PixelFifo::new();
        for _ in 0..FIFO_CAPACITY {
            fifo.push(1);
        }
        fifo.push(2);
        assert_eq!(fifo.len(), FIFO_CAPACITY);
        assert_eq!(fifo.back(), Some(&1));
    }

    fn opaque(color: u8, oam_index: u8, origin_x: i16) -> SpritePixel {
        SpritePixel {
            color,
            palette: 1,
            oam_index,
            blank: false,
            origin_x,
            ..SpritePixel::blank_at(9)
        }
    }

    #[test]
    fn sprite_merge_priority() {
        let incoming = opaque(2, 5, 4);

        assert!(SpritePixel::blank_at(9).yields_to(&incoming));
        // Transparent pixels of a lower-X, lower-index sprite still let later sprites through
        assert!(opaque(0, 0, 0).yields_to(&incoming));

        assert!(!opaque(1, 7, 0).yields_to(&incoming));
        assert!(opaque(1, 7, 4).yields_to(&incoming));
        assert!(!opaque(1, 3, 4).yields_to(&incoming));
    }

    #[test]
    fn reset_keeps_contents_clear_zeroes() {
        let mut fifo: PixelFifo<u8> = PixelFifo::new();
        fifo.push(5);
        fifo.reset();
        assert!(fifo.is_empty());
        assert_eq!(fifo.pixels[0], 5);

        fifo.push(6);
        fifo.clear();
        assert!(fifo.is_empty());
        assert_eq!(fifo.front(), None);
        assert_eq!(fifo.pixels[0], 0);
    }
}
