//! Read-only candle window consumed by the interpreter.
//!
//! Index 0 is always the most recent candle; larger indices walk back in time.

use serde::{Deserialize, Serialize};

pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

pub trait CandleSource {
    fn len(&self) -> usize;

    /// Candle `index` bars back from the newest.
    fn candle(&self, index: usize) -> Option<&Candle>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Slices are taken as already ordered newest-first.
impl CandleSource for [Candle] {
    fn len(&self) -> usize {
        <[Candle]>::len(self)
    }

    fn candle(&self, index: usize) -> Option<&Candle> {
        self.get(index)
    }
}

impl CandleSource for Vec<Candle> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn candle(&self, index: usize) -> Option<&Candle> {
        self.get(index)
    }
}

/// Fixed-capacity ring of candles, capacity rounded up to a power of two.
/// Pushing into a full ring overwrites the oldest candle.
#[derive(Debug, Clone)]
pub struct CandleBuffer {
    slots: Vec<Candle>,
    mask: usize,
    head: usize,
    len: usize,
}

impl CandleBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        Self {
            slots: Vec::with_capacity(capacity),
            mask: capacity - 1,
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Appends a new most-recent candle and returns the one it evicted, if any.
    pub fn push(&mut self, candle: Candle) -> Option<Candle> {
        let slot = self.head & self.mask;
        self.head = self.head.wrapping_add(1);
        if self.slots.len() < self.capacity() {
            self.slots.push(candle);
            self.len += 1;
            None
        } else {
            Some(std::mem::replace(&mut self.slots[slot], candle))
        }
    }

    /// Replaces the newest candle in place (an updating, not-yet-closed bar).
    pub fn update_latest(&mut self, candle: Candle) -> bool {
        if self.len == 0 {
            return false;
        }
        let slot = self.head.wrapping_sub(1) & self.mask;
        self.slots[slot] = candle;
        true
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
        self.len = 0;
    }
}

impl Default for CandleBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl Extend<Candle> for CandleBuffer {
    fn extend<I: IntoIterator<Item = Candle>>(&mut self, iter: I) {
        for candle in iter {
            self.push(candle);
        }
    }
}

impl CandleSource for CandleBuffer {
    fn len(&self) -> usize {
        self.len
    }

    fn candle(&self, index: usize) -> Option<&Candle> {
        if index >= self.len {
            return None;
        }
        let slot = self.head.wrapping_sub(1 + index) & self.mask;
        self.slots.get(slot)
    }
}
