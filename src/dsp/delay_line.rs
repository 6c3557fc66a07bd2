//! # Circular Buffers and Read-Head Arithmetic
//!
//! The multi-tap delay keeps one circular buffer per stereo channel. A
//! single integer write head walks forward through both buffers in lock
//! step, and four fractional read heads (one per tap) trail behind it.
//!
//! ## Write-then-read ordering
//!
//! Every frame first writes `input + feedback` at the write head and only
//! then reads the taps. Because the newest sample already sits at the write
//! head, each read position is nudged one step forward before it is used:
//!
//! ```text
//! position = wrap_advance(write_head - delay_in_samples + offset, len)
//! ```
//!
//! [`wrap_advance`] is the one place where a raw (possibly negative, possibly
//! past-the-end) head position is folded back into `[0, len)`. All four
//! taps go through it, so there is no per-tap wraparound code to drift out
//! of sync.
//!
//! ## Linear Interpolation
//!
//! Tap positions are rarely whole numbers. The position is split into a
//! floor index `x`, its neighbour `y = (x + 1) % len`, and a phase in
//! `[0, 1)`:
//!
//! ```text
//! out = (1 - phase) * buffer[x] + phase * buffer[y]
//! ```

/// Fold a raw read-head position into `[0, len)` and step it one sample
/// forward.
///
/// The common case is a single conditional add/subtract. Positions more
/// than one buffer length out of range (very large spread at low sample
/// rates) fall back to a Euclidean remainder so the result is always a
/// valid index.
#[inline]
pub fn wrap_advance(position: f64, len: usize) -> f64 {
    let len_f = len as f64;

    let mut wrapped = position;
    if wrapped < 0.0 {
        wrapped += len_f;
    }
    wrapped += 1.0;
    if wrapped >= len_f {
        wrapped -= len_f;
    }

    if !(0.0..len_f).contains(&wrapped) {
        wrapped = wrapped.rem_euclid(len_f);
        // `rem_euclid` can round up to exactly `len` for tiny negatives.
        if wrapped >= len_f {
            wrapped = 0.0;
        }
    }

    wrapped
}

/// Split a wrapped position into `(x, y, phase)` where `x` is the floor
/// index, `y` the next index (wrapping to 0), and `phase` the fractional
/// distance from `x` towards `y`.
#[inline]
pub fn split_position(position: f64, len: usize) -> (usize, usize, f32) {
    let floor = position.floor();
    let x = (floor as usize).min(len - 1);
    let phase = (position - floor) as f32;

    let mut y = x + 1;
    if y >= len {
        y -= len;
    }

    (x, y, phase)
}

/// Blend two neighbouring samples.
///
/// `phase = 0.0` returns `x`, `phase = 1.0` would return `y`.
#[inline]
pub fn linear_interpolation(x: f32, y: f32, phase: f32) -> f32 {
    (1.0 - phase) * x + phase * y
}

/// A fixed-length, zero-initialised sample buffer for one channel.
///
/// The length is chosen once in `prepare()` and never changes while audio
/// is running, so indexing never allocates.
#[derive(Debug, Clone, Default)]
pub struct ChannelBuffer {
    samples: Vec<f32>,
}

impl ChannelBuffer {
    /// A silent buffer of `len` samples.
    pub fn new(len: usize) -> Self {
        Self {
            samples: vec![0.0; len],
        }
    }

    /// Number of samples, fixed since construction.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Store a sample at `index`. The caller guarantees `index < len()`.
    #[inline]
    pub fn write(&mut self, index: usize, sample: f32) {
        self.samples[index] = sample;
    }

    /// Read at a fractional position that has already been through
    /// [`wrap_advance`].
    #[inline]
    pub fn read_interpolated(&self, position: f64) -> f32 {
        let (x, y, phase) = split_position(position, self.samples.len());
        linear_interpolation(self.samples[x], self.samples[y], phase)
    }

    /// Overwrite every sample with silence.
    pub fn clear(&mut self) {
        self.samples.fill(0.0);
    }

    /// True when every stored sample is exactly zero.
    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|s| *s == 0.0)
    }
}

/// Left and right [`ChannelBuffer`]s sharing one write head.
///
/// Both channels are always the same length; allocation and clearing happen
/// for the pair, never for one side alone.
#[derive(Debug, Clone, Default)]
pub struct StereoBuffer {
    left: ChannelBuffer,
    right: ChannelBuffer,
    write_head: usize,
}

impl StereoBuffer {
    /// Make both channels `len` samples long and silent, and move the write
    /// head back to 0. The existing allocation is reused when the length is
    /// unchanged.
    pub fn allocate(&mut self, len: usize) {
        if self.left.len() == len && self.right.len() == len {
            self.left.clear();
            self.right.clear();
        } else {
            self.left = ChannelBuffer::new(len);
            self.right = ChannelBuffer::new(len);
        }
        self.write_head = 0;
    }

    /// Silence both channels and rewind the write head, keeping the
    /// allocation.
    pub fn clear(&mut self) {
        self.left.clear();
        self.right.clear();
        self.write_head = 0;
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Index the next `write()` lands on.
    pub fn write_head(&self) -> usize {
        self.write_head
    }

    // Read-only channel views, for inspection.
    pub fn left(&self) -> &ChannelBuffer {
        &self.left
    }

    pub fn right(&self) -> &ChannelBuffer {
        &self.right
    }

    /// Write one frame at the current write head.
    #[inline]
    pub fn write(&mut self, left: f32, right: f32) {
        self.left.write(self.write_head, left);
        self.right.write(self.write_head, right);
    }

    /// Interpolated read of both channels at the same tap position.
    #[inline]
    pub fn read(&self, position: f64) -> (f32, f32) {
        (
            self.left.read_interpolated(position),
            self.right.read_interpolated(position),
        )
    }

    /// Move the write head one frame forward, wrapping to 0 at the end.
    #[inline]
    pub fn advance(&mut self) {
        self.write_head += 1;
        if self.write_head >= self.left.len() {
            self.write_head = 0;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_wrap_advance_negative_position() {
        // -5 on a ring of 100 is 95, then one step forward.
        assert_relative_eq!(wrap_advance(-5.0, 100), 96.0);
    }

    #[test]
    fn test_wrap_advance_last_index_wraps_to_zero() {
        assert_relative_eq!(wrap_advance(99.0, 100), 0.0);
        assert_relative_eq!(wrap_advance(-1.0, 100), 0.0);
    }

    #[test]
    fn test_wrap_advance_keeps_fraction() {
        assert_relative_eq!(wrap_advance(10.25, 100), 11.25);
        assert_relative_eq!(wrap_advance(-0.5, 100), 0.5);
    }

    /// Positions further than one length away still land inside the ring.
    #[test]
    fn test_wrap_advance_far_out_of_range() {
        for position in [-350.0, -100.0, 250.0, 1000.5, -1e-17] {
            let wrapped = wrap_advance(position, 100);
            assert!(
                (0.0..100.0).contains(&wrapped),
                "{position} wrapped to {wrapped}"
            );
        }
        assert_relative_eq!(wrap_advance(250.0, 100), 51.0);
    }

    #[test]
    fn test_split_position_wraps_neighbour() {
        let (x, y, phase) = split_position(9.75, 10);
        assert_eq!((x, y), (9, 0));
        assert_relative_eq!(phase, 0.75);
    }

    #[test]
    fn test_linear_interpolation_endpoints() {
        assert_relative_eq!(linear_interpolation(2.0, 4.0, 0.0), 2.0);
        assert_relative_eq!(linear_interpolation(2.0, 4.0, 0.5), 3.0);
        assert_relative_eq!(linear_interpolation(2.0, 4.0, 0.25), 2.5);
    }

    #[test]
    fn test_channel_read_between_samples() {
        let mut buffer = ChannelBuffer::new(4);
        buffer.write(1, 1.0);
        buffer.write(2, 3.0);

        assert_relative_eq!(buffer.read_interpolated(1.0), 1.0);
        assert_relative_eq!(buffer.read_interpolated(1.5), 2.0);
        // Between the last index and index 0.
        buffer.write(3, 4.0);
        assert_relative_eq!(buffer.read_interpolated(3.5), 2.0);
    }

    #[test]
    fn test_stereo_write_head_wraps() {
        let mut buffer = StereoBuffer::default();
        buffer.allocate(3);

        for _ in 0..3 {
            buffer.advance();
        }
        assert_eq!(buffer.write_head(), 0);

        buffer.advance();
        assert_eq!(buffer.write_head(), 1);
    }

    #[test]
    fn test_stereo_channels_are_independent() {
        let mut buffer = StereoBuffer::default();
        buffer.allocate(8);
        buffer.write(0.5, -0.25);

        assert_eq!(buffer.read(0.0), (0.5, -0.25));
        assert!(!buffer.left().is_silent());
        assert!(!buffer.right().is_silent());
    }

    /// Re-allocating with the same length clears content and the head.
    #[test]
    fn test_allocate_same_length_clears() {
        let mut buffer = StereoBuffer::default();
        buffer.allocate(16);
        buffer.write(1.0, 1.0);
        buffer.advance();

        buffer.allocate(16);

        assert_eq!(buffer.len(), 16);
        assert_eq!(buffer.write_head(), 0);
        assert!(buffer.left().is_silent());
        assert!(buffer.right().is_silent());
    }

    #[test]
    fn test_allocate_new_length() {
        let mut buffer = StereoBuffer::default();
        assert!(buffer.is_empty());

        buffer.allocate(16);
        buffer.allocate(32);

        assert_eq!(buffer.left().len(), 32);
        assert_eq!(buffer.right().len(), 32);
    }
}
