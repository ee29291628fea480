use crate::prelude::{EngineResult, FkError};

/// Scratch arena for the trigonometric and accumulator buffers of a
/// computation. Owned by one engine and reused across its calls.
pub struct ScratchArena {
    buffers: Vec<Vec<f64>>,
    max_capacity: usize,
    outstanding: usize,
}

impl ScratchArena {
    pub fn with_capacity(max_capacity: usize) -> Self {
        Self {
            buffers: Vec::with_capacity(max_capacity),
            max_capacity,
            outstanding: 0,
        }
    }

    /// Hands out a zeroed buffer, recycling a released one when possible.
    pub fn checkout(&mut self, length: usize) -> EngineResult<Vec<f64>> {
        if self.outstanding >= self.max_capacity {
            return Err(FkError::AllocationFailure(format!(
                "scratch arena depleted ({} buffers out)",
                self.outstanding
            )));
        }
        let mut buffer = self.buffers.pop().unwrap_or_default();
        buffer.clear();
        buffer
            .try_reserve_exact(length)
            .map_err(|err| FkError::AllocationFailure(format!("{} f64 values: {}", length, err)))?;
        buffer.resize(length, 0.0);
        self.outstanding += 1;
        Ok(buffer)
    }

    /// Returns a buffer to the arena for reuse.
    pub fn release(&mut self, mut buffer: Vec<f64>) {
        buffer.clear();
        self.outstanding = self.outstanding.saturating_sub(1);
        if self.buffers.len() < self.max_capacity {
            self.buffers.push(buffer);
        }
    }

    pub fn pooled(&self) -> usize {
        self.buffers.len()
    }
}

/// Fallible zeroed allocation for buffers that outlive a computation.
pub fn try_zeroed<T: Clone + Default>(length: usize) -> EngineResult<Vec<T>> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(length).map_err(|err| {
        FkError::AllocationFailure(format!(
            "{} x {}: {}",
            length,
            std::any::type_name::<T>(),
            err
        ))
    })?;
    buffer.resize(length, T::default());
    Ok(buffer)
}
