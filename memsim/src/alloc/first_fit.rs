use crate::helpe::*;
use super::{Allocator, MemBlock, MemParameters};

/// A coalescing first-fit allocator.
///
/// Free and occupied blocks live in two maps keyed by start address.
/// Together they tile the allocatable region exactly, and no two free
/// blocks are ever adjacent: every release merges eagerly.
pub struct FirstFit {
    // address -> size
    free:       BTreeMap<Address, Bytes>,
    // address -> (owner, size)
    occupied:   BTreeMap<Address, (Pid, Bytes)>,
}

impl FirstFit {
    pub fn new(params: &MemParameters) -> Self {
        Self {
            free:       BTreeMap::from([(params.kernel_size, params.usable())]),
            occupied:   BTreeMap::new(),
        }
    }

    pub fn free_blocks(&self) -> impl Iterator<Item = MemBlock> + '_ {
        self.free
            .iter()
            .map(|(a, s)| MemBlock { owner: None, address: *a, size: *s })
    }

    pub fn occupied_blocks(&self) -> impl Iterator<Item = MemBlock> + '_ {
        self.occupied
            .iter()
            .map(|(a, (p, s))| MemBlock { owner: Some(*p), address: *a, size: *s })
    }
}

impl Allocator for FirstFit {
    fn allocate(&mut self, pid: Pid, size: Bytes) -> SimResult<Option<Address>> {
        trace!(pid, size, "first-fit alloc");
        if pid == 0 {
            return Err(SimError::InvalidArgument(String::from("process ID must be non-zero")));
        } else if size == 0 {
            return Err(SimError::InvalidArgument(String::from("segment size must be non-zero")));
        }

        // Lowest address wins, not tightest fit.
        let found = self.free
            .iter()
            .find(|(_, s)| **s >= size)
            .map(|(a, s)| (*a, *s));

        match found {
            Some((addr, block_size)) => {
                self.free.remove(&addr);
                if block_size > size {
                    self.free.insert(addr + size, block_size - size);
                }
                self.occupied.insert(addr, (pid, size));

                Ok(Some(addr))
            },
            None    => Ok(None),
        }
    }

    fn release(&mut self, address: Address) -> SimResult<()> {
        trace!(address, "first-fit free");
        let (_, mut size) = self.occupied
            .remove(&address)
            .ok_or_else(|| SimError::InvalidArgument(format!(
                "no occupied block starts at {address:#x}"
            )))?;
        let mut start = address;
        let end = address + size;

        // At most one free neighbour on each side, since free blocks
        // are never adjacent to each other.
        let lower = self.free
            .range(..address)
            .next_back()
            .map(|(a, s)| (*a, *s));
        if let Some((lower_addr, lower_size)) = lower {
            if lower_addr + lower_size == address {
                self.free.remove(&lower_addr);
                start = lower_addr;
                size += lower_size;
            }
        }
        if let Some(upper_size) = self.free.remove(&end) {
            size += upper_size;
        }
        self.free.insert(start, size);

        Ok(())
    }

    fn blocks(&self) -> Vec<MemBlock> {
        self.free_blocks()
            .merge_by(self.occupied_blocks(), |a, b| a.address < b.address)
            .collect()
    }

    fn policy(&self) -> Policy {
        Policy::FirstFit
    }
}
