pub mod buddy;
pub mod first_fit;

use crate::helpe::*;

use self::{
    buddy::BuddySystem,
    first_fit::FirstFit,
};

/// Fixed for the whole run.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MemParameters {
    /// Allocation granularity. Every request is rounded up to a multiple.
    pub chunk_size:     Bytes,
    pub total_size:     Bytes,
    /// Reserved at the bottom of memory. Never allocatable.
    pub kernel_size:    Bytes,
    pub policy:         Policy,
}

impl MemParameters {
    pub fn new(
        total_size:     Bytes,
        kernel_size:    Bytes,
        chunk_size:     Bytes,
        policy:         Policy,
    ) -> SimResult<Self> {
        if chunk_size == 0 {
            return Err(SimError::InvalidArgument(String::from("chunk size must be non-zero")));
        } else if total_size <= kernel_size {
            return Err(SimError::InvalidArgument(String::from(
                "memory must be bigger than the kernel reservation"
            )));
        } else if total_size % chunk_size != 0 {
            return Err(SimError::InvalidArgument(String::from(
                "memory size must be a multiple of the chunk size"
            )));
        } else if kernel_size % chunk_size != 0 {
            return Err(SimError::InvalidArgument(String::from(
                "kernel size must be a multiple of the chunk size"
            )));
        }

        Ok(Self {
            chunk_size,
            total_size,
            kernel_size,
            policy,
        })
    }

    /// Bytes available to processes.
    #[inline(always)]
    pub fn usable(&self) -> Bytes {
        self.total_size - self.kernel_size
    }
}

/// A contiguous piece of main memory. `owner` is `None` for free blocks.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MemBlock {
    pub owner:      Option<Pid>,
    pub address:    Address,
    pub size:       Bytes,
}

impl MemBlock {
    #[inline(always)]
    pub fn is_free(&self) -> bool {
        self.owner.is_none()
    }

    #[inline(always)]
    pub fn end(&self) -> Address {
        self.address + self.size
    }
}

/// The placement/release contract shared by every strategy.
///
/// "No room right now" is `Ok(None)`, not an error: the caller is
/// expected to try again once something is released.
pub trait Allocator {
    /// Finds room for `size` bytes on behalf of `pid`. The size is
    /// assumed to be a chunk multiple already.
    fn allocate(&mut self, pid: Pid, size: Bytes) -> SimResult<Option<Address>>;
    /// Frees the occupied block starting at `address`.
    fn release(&mut self, address: Address) -> SimResult<()>;
    /// Every block, free or occupied, by increasing address.
    fn blocks(&self) -> Vec<MemBlock>;
    fn policy(&self) -> Policy;
}

/// The outcome of placing a whole [AddressSpaceProfile].
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Placement {
    Mapped(AddressSpaceMapping),
    /// Does not fit at the moment. Memory is left as it was.
    Unavailable,
    /// Would not fit even in empty memory.
    Impossible,
}

/// Policy dispatch plus multi-segment bookkeeping on top of an
/// [Allocator].
pub struct Memory {
    params:     MemParameters,
    strategy:   Box<dyn Allocator>,
}

impl Memory {
    pub fn new(params: MemParameters) -> Self {
        info!(
            total = params.total_size,
            kernel = params.kernel_size,
            chunk = params.chunk_size,
            policy = %params.policy,
            "memory init"
        );
        Self {
            params,
            strategy: Self::strategy_for(&params),
        }
    }

    fn strategy_for(params: &MemParameters) -> Box<dyn Allocator> {
        match params.policy {
            Policy::FirstFit    => Box::new(FirstFit::new(params)),
            Policy::Buddy       => Box::new(BuddySystem::new(params)),
        }
    }

    /// Whether `sizes` could be placed in memory with nothing else in it.
    fn fits_when_empty(&self, pid: Pid, sizes: &[Bytes]) -> SimResult<bool> {
        let mut scratch = Self::strategy_for(&self.params);
        for size in sizes {
            if scratch.allocate(pid, *size)?.is_none() {
                return Ok(false);
            }
        }

        Ok(true)
    }

    pub fn params(&self) -> &MemParameters {
        &self.params
    }

    /// Rounds `size` up to the next chunk multiple.
    #[inline(always)]
    pub fn round_up(&self, size: Bytes) -> SimResult<Bytes> {
        let chunk = self.params.chunk_size;
        size.div_ceil(chunk)
            .checked_mul(chunk)
            .ok_or_else(|| SimError::InvalidArgument(format!("segment size {size} is too large")))
    }

    /// Places every segment of `profile`, in order, or none of them.
    pub fn allocate_profile(
        &mut self,
        pid:        Pid,
        profile:    &AddressSpaceProfile,
    ) -> SimResult<Placement> {
        debug!(pid, sizes = ?profile.sizes(), "mem alloc");
        if pid == 0 {
            return Err(SimError::InvalidArgument(String::from("process ID must be non-zero")));
        }

        let rounded = profile.sizes()
            .iter()
            .map(|s| self.round_up(*s))
            .collect::<SimResult<Vec<Bytes>>>()?;
        // Checked first so that hopeless requests never touch the allocator.
        let required = rounded.iter()
            .try_fold(0 as Bytes, |acc, s| acc.checked_add(*s));
        match required {
            Some(r) if r <= self.params.usable() => {},
            _   => { return Ok(Placement::Impossible); }
        }

        let mut placed: Vec<Address> = Vec::with_capacity(rounded.len());
        for size in rounded.iter().copied() {
            match self.strategy.allocate(pid, size)? {
                Some(addr)  => { placed.push(addr); },
                None        => {
                    // Roll back, newest first.
                    for addr in placed.into_iter().rev() {
                        self.strategy.release(addr)?;
                    }
                    // Buddy blocks can outgrow every root even when the
                    // total is small enough.
                    if !self.fits_when_empty(pid, &rounded)? {
                        return Ok(Placement::Impossible);
                    }

                    return Ok(Placement::Unavailable);
                }
            }
        }

        Ok(Placement::Mapped(AddressSpaceMapping::new(placed)))
    }

    /// Gives back every block of `mapping`.
    pub fn release_profile(&mut self, mapping: &AddressSpaceMapping) -> SimResult<()> {
        debug!(addresses = ?mapping.addresses(), "mem free");
        for addr in mapping.addresses() {
            self.strategy.release(*addr)?;
        }

        Ok(())
    }

    pub fn blocks(&self) -> Vec<MemBlock> {
        self.strategy.blocks()
    }

    pub fn policy(&self) -> Policy {
        self.strategy.policy()
    }

    pub fn free_bytes(&self) -> Bytes {
        self.blocks()
            .iter()
            .filter(|b| b.is_free())
            .map(|b| b.size)
            .sum()
    }

    pub fn occupied_bytes(&self) -> Bytes {
        self.params.usable() - self.free_bytes()
    }
}
