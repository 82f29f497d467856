//! Welcome to `memsim`!
//!
//! A discrete-event simulator of a scheduler with an infinite number of
//! processors and a finite, contiguously allocated main memory. Processes
//! run for as long as their whole address space is resident; when memory
//! runs out they wait in a swap area until some other process terminates.
//!
//! The interesting parts are the allocator strategies under [`alloc`] and
//! the engine in [`sim`]. Everything else is bookkeeping around them.

mod event;
mod pct;
mod swap;

pub mod alloc;
pub mod helpe;
pub mod logging;
pub mod report;
pub mod sim;
pub mod workload;

pub use crate::helpe::*;

/// The memory a process needs: one contiguous block per segment, all of
/// them resident at the same time.
///
/// A profile always holds between 1 and [`MAX_SEGMENTS`] non-zero sizes.
/// Sizes are kept as *requested*; rounding to the allocation chunk
/// happens inside [`alloc::Memory`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressSpaceProfile {
    sizes: Vec<Bytes>,
}

/// Where a profile ended up in main memory. `addresses[i]` is the start
/// of the block hosting segment `i` of the matching profile.
///
/// Empty for every process that is not (or no longer) active.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AddressSpaceMapping {
    addresses: Vec<Address>,
}

/// An entry of the workload: everything known about a process before it
/// reaches the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForthcomingProcess {
    pub pid:            Pid,
    pub arrival:        Time,
    // Time spent in memory once activated. Always positive.
    pub lifetime:       Time,
    pub profile:        AddressSpaceProfile,
}

impl AddressSpaceProfile {
    /// Checks segment count and sizes. This is the only way to build
    /// a profile, so every profile in the system is valid.
    pub fn new(sizes: Vec<Bytes>) -> SimResult<Self> {
        if sizes.is_empty() || sizes.len() > MAX_SEGMENTS {
            return Err(SimError::InvalidArgument(format!(
                "a profile needs 1 to {MAX_SEGMENTS} segments, got {}",
                sizes.len()
            )));
        }
        if sizes.iter().any(|s| *s == 0) {
            return Err(SimError::InvalidArgument(String::from(
                "segment sizes must be non-zero"
            )));
        }

        Ok(Self { sizes })
    }

    pub fn sizes(&self) -> &[Bytes] {
        &self.sizes
    }

    pub fn segment_count(&self) -> usize {
        self.sizes.len()
    }

    /// Sum of the requested (unrounded) sizes, saturating.
    pub fn total(&self) -> Bytes {
        self.sizes.iter().fold(0, |acc, s| acc.saturating_add(*s))
    }
}

impl AddressSpaceMapping {
    pub fn new(addresses: Vec<Address>) -> Self {
        Self { addresses }
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    pub fn block_count(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl ForthcomingProcess {
    /// Time at which the process would finish if activated at `activation`.
    #[inline(always)]
    pub fn finish_if_activated_at(&self, activation: Time) -> SimResult<Time> {
        activation
            .checked_add(self.lifetime)
            .ok_or_else(|| SimError::Internal(format!(
                "termination time of process {} overflows", self.pid
            )))
    }
}
