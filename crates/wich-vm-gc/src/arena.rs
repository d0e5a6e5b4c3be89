//! Slot-arena vector heap

use crate::error::{HeapError, HeapResult};
use crate::heap::{HeapConfig, HeapStats, VectorHandle, VectorHeap};

/// Default [`VectorHeap`]: vectors live in numbered slots until released.
///
/// Released slots are reused, so a stale handle may alias a newer vector.
/// Callers that release vectors must drop every copy of the handle first.
#[derive(Debug)]
pub struct VectorArena {
    config: HeapConfig,
    slots: Vec<Option<Box<[f64]>>>,
    free: Vec<u32>,
    stats: HeapStats,
}

impl Default for VectorArena {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorArena {
    /// Create an arena with the default config
    pub fn new() -> Self {
        Self::with_config(HeapConfig::default())
    }

    /// Create an arena with a custom config
    pub fn with_config(config: HeapConfig) -> Self {
        Self {
            slots: Vec::with_capacity(config.initial_slots),
            free: Vec::new(),
            stats: HeapStats::default(),
            config,
        }
    }

    /// Current statistics
    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    /// Release a vector so its slot can be reused
    pub fn release(&mut self, handle: VectorHandle) -> HeapResult<()> {
        let slot = self
            .slots
            .get_mut(handle.0 as usize)
            .ok_or(HeapError::InvalidHandle(handle))?;
        let data = slot.take().ok_or(HeapError::InvalidHandle(handle))?;
        self.stats.live_vectors -= 1;
        self.stats.live_elements -= data.len();
        self.free.push(handle.0);

        #[cfg(feature = "gc_logging")]
        tracing::debug!(target: "wich::gc", handle = handle.0, len = data.len(), "vector released");

        Ok(())
    }

    fn data(&self, handle: VectorHandle) -> HeapResult<&[f64]> {
        self.slots
            .get(handle.0 as usize)
            .and_then(|slot| slot.as_deref())
            .ok_or(HeapError::InvalidHandle(handle))
    }

    fn data_mut(&mut self, handle: VectorHandle) -> HeapResult<&mut [f64]> {
        self.slots
            .get_mut(handle.0 as usize)
            .and_then(|slot| slot.as_deref_mut())
            .ok_or(HeapError::InvalidHandle(handle))
    }
}

impl VectorHeap for VectorArena {
    fn allocate(&mut self, len: usize) -> HeapResult<VectorHandle> {
        let available = self
            .config
            .max_elements
            .saturating_sub(self.stats.live_elements);
        if len > available {
            return Err(HeapError::HeapExhausted {
                requested: len,
                available,
            });
        }

        let data = vec![0.0; len].into_boxed_slice();
        let handle = match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Some(data);
                VectorHandle(slot)
            }
            None => {
                self.slots.push(Some(data));
                VectorHandle((self.slots.len() - 1) as u32)
            }
        };

        self.stats.live_vectors += 1;
        self.stats.live_elements += len;
        self.stats.total_allocations += 1;

        #[cfg(feature = "gc_logging")]
        tracing::debug!(target: "wich::gc", handle = handle.0, len, "vector allocated");

        Ok(handle)
    }

    fn get(&self, handle: VectorHandle, index: usize) -> HeapResult<f64> {
        let data = self.data(handle)?;
        data.get(index).copied().ok_or(HeapError::IndexOutOfBounds {
            index,
            len: data.len(),
        })
    }

    fn set(&mut self, handle: VectorHandle, index: usize, value: f64) -> HeapResult<()> {
        let data = self.data_mut(handle)?;
        let len = data.len();
        let slot = data
            .get_mut(index)
            .ok_or(HeapError::IndexOutOfBounds { index, len })?;
        *slot = value;
        Ok(())
    }

    fn length(&self, handle: VectorHandle) -> HeapResult<usize> {
        self.data(handle).map(<[f64]>::len)
    }

    fn elements(&self, handle: VectorHandle) -> HeapResult<&[f64]> {
        self.data(handle)
    }
}
