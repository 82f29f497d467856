use crate::helpe::*;

/// A process waiting for memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwappedProcess {
    pub pid:        Pid,
    pub profile:    AddressSpaceProfile,
}

/// The swap area: plain FIFO, addressed by position from the head.
#[derive(Default)]
pub struct SwapQueue {
    queue: VecDeque<SwappedProcess>,
}

impl SwapQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pid: Pid, profile: &AddressSpaceProfile) -> SimResult<()> {
        debug!(pid, "swp add");
        if pid == 0 {
            return Err(SimError::InvalidArgument(String::from("process ID must be non-zero")));
        }
        self.queue.push_back(SwappedProcess {
            pid,
            profile: profile.clone(),
        });

        Ok(())
    }

    pub fn peek(&self, idx: usize) -> SimResult<&SwappedProcess> {
        self.queue
            .get(idx)
            .ok_or(SimError::NotFound { what: "swap queue position", key: idx as u64 })
    }

    pub fn remove(&mut self, idx: usize) -> SimResult<SwappedProcess> {
        debug!(idx, "swp remove");
        self.queue
            .remove(idx)
            .ok_or(SimError::NotFound { what: "swap queue position", key: idx as u64 })
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SwappedProcess> {
        self.queue.iter()
    }

    pub fn reset(&mut self) {
        self.queue.clear();
    }
}
