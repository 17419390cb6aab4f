//! Fixed-capacity circular diagnostic trace buffer. Single writer (the
//! control core), single reader (the diagnostics sink); no allocation.

/// One recorded sample of the control cycle, written whenever the platform is
/// moving or a nonzero ESC command is issued.
#[derive(Clone, Copy, Debug, Default, defmt::Format)]
pub struct TraceSample {
    pub pos: i32,
    pub speed: i32,
    pub stick: i32,
    pub distance_to_stop: i32,
    pub esc: u16,
    pub tick: u32,
}

/// Circular buffer of the most recent `CAPACITY` trace samples.
///
/// The original C firmware incremented its ring head and compared it with a
/// strict greater-than against capacity, which allows a one-slot overrun
/// before wrapping. This type uses strict modular arithmetic instead, per
/// `spec.md` §9's recommendation — the off-by-one is a defect, not a
/// behavior to preserve.
#[derive(Debug, defmt::Format)]
pub struct TraceRing<const CAPACITY: usize> {
    samples: [TraceSample; CAPACITY],
    head: usize,
    len: usize,
}

impl<const CAPACITY: usize> TraceRing<CAPACITY> {
    pub fn new() -> Self {
        Self {
            samples: [TraceSample::default(); CAPACITY],
            head: 0,
            len: 0,
        }
    }

    /// Append a sample, overwriting the oldest entry once the ring is full.
    pub fn push(&mut self, sample: TraceSample) {
        self.samples[self.head] = sample;
        self.head = (self.head + 1) % CAPACITY;
        if self.len < CAPACITY {
            self.len += 1;
        }
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate samples oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &TraceSample> {
        let start = if self.len < CAPACITY { 0 } else { self.head };
        (0..self.len).map(move |i| &self.samples[(start + i) % CAPACITY])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_wraps_with_strict_modulus() {
        let mut ring: TraceRing<4> = TraceRing::new();
        for i in 0..4 {
            ring.push(TraceSample {
                pos: i,
                ..Default::default()
            });
        }
        // After exactly CAPACITY pushes the head must have wrapped to 0, never
        // sitting at an out-of-bounds CAPACITY slot.
        assert_eq!(ring.head(), 0);
        assert_eq!(ring.len(), 4);
    }

    #[test]
    fn oldest_entry_overwritten_on_overrun() {
        let mut ring: TraceRing<2> = TraceRing::new();
        ring.push(TraceSample {
            pos: 1,
            ..Default::default()
        });
        ring.push(TraceSample {
            pos: 2,
            ..Default::default()
        });
        ring.push(TraceSample {
            pos: 3,
            ..Default::default()
        });
        let mut iter = ring.iter().map(|s| s.pos);
        assert_eq!(iter.next(), Some(2));
        assert_eq!(iter.next(), Some(3));
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn empty_ring_reports_empty() {
        let ring: TraceRing<8> = TraceRing::new();
        assert!(ring.is_empty());
        assert_eq!(ring.iter().count(), 0);
    }
}
