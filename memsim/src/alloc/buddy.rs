use crate::helpe::*;
use super::{Allocator, MemBlock, MemParameters};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum NodeState {
    Free,
    Occupied(Pid),
    /// Indices of the low and high halves.
    Split(usize, usize),
}

#[derive(Copy, Clone, Debug)]
struct Node {
    address:    Address,
    size:       Bytes,
    parent:     Option<usize>,
    state:      NodeState,
}

/// A binary buddy allocator.
///
/// Nodes live in an arena and refer to each other by index. Parents are
/// split only on demand and collapsed back as soon as both halves are
/// free again, so a leaf is either occupied or has an occupied buddy.
///
/// Every node covers a power-of-two number of chunks. When the usable
/// region is not such a size it is tiled by several roots, one per set
/// bit of its chunk count, biggest (lowest address) first.
pub struct BuddySystem {
    chunk:      Bytes,
    arena:      Vec<Node>,
    // Recycled arena slots.
    vacant:     Vec<usize>,
    roots:      Vec<usize>,
}

impl BuddySystem {
    pub fn new(params: &MemParameters) -> Self {
        let chunk = params.chunk_size;
        let mut chunks_left = params.usable() / chunk;
        let mut address = params.kernel_size;
        let mut arena = vec![];
        let mut roots = vec![];
        while chunks_left > 0 {
            let order = Bytes::BITS - 1 - chunks_left.leading_zeros();
            let size = (1 << order) * chunk;
            roots.push(arena.len());
            arena.push(Node {
                address,
                size,
                parent: None,
                state:  NodeState::Free,
            });
            address += size;
            chunks_left -= 1 << order;
        }

        Self {
            chunk,
            arena,
            vacant: vec![],
            roots,
        }
    }

    /// Smallest power-of-two multiple of the chunk that holds `size`.
    #[inline(always)]
    fn block_size_for(&self, size: Bytes) -> Option<Bytes> {
        size.div_ceil(self.chunk)
            .checked_next_power_of_two()?
            .checked_mul(self.chunk)
    }

    fn spawn(&mut self, node: Node) -> usize {
        match self.vacant.pop() {
            Some(idx)   => {
                self.arena[idx] = node;
                idx
            },
            None        => {
                self.arena.push(node);
                self.arena.len() - 1
            }
        }
    }

    /// Left-to-right depth-first search for the first free leaf of at
    /// least `size` bytes.
    fn find_free_leaf(&self, size: Bytes) -> Option<usize> {
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(idx) = stack.pop() {
            let node = &self.arena[idx];
            if node.size < size {
                // Nothing below can be bigger.
                continue;
            }
            match node.state {
                NodeState::Free             => { return Some(idx); },
                NodeState::Occupied(_)      => {},
                NodeState::Split(lo, hi)    => {
                    stack.push(hi);
                    stack.push(lo);
                }
            }
        }

        None
    }

    /// Halves a free leaf. Returns the index of the low half.
    fn split(&mut self, idx: usize) -> usize {
        let Node { address, size, .. } = self.arena[idx];
        debug_assert!(self.arena[idx].state == NodeState::Free, "Splitting a non-free node!");
        let half = size / 2;
        let lo = self.spawn(Node {
            address,
            size:   half,
            parent: Some(idx),
            state:  NodeState::Free,
        });
        let hi = self.spawn(Node {
            address: address + half,
            size:   half,
            parent: Some(idx),
            state:  NodeState::Free,
        });
        self.arena[idx].state = NodeState::Split(lo, hi);

        lo
    }

    /// Finds the occupied leaf starting at `address`.
    fn find_occupied(&self, address: Address) -> Option<usize> {
        let mut idx = *self.roots
            .iter()
            .take_while(|r| self.arena[**r].address <= address)
            .last()?;
        loop {
            let node = &self.arena[idx];
            match node.state {
                NodeState::Split(lo, hi)    => {
                    idx = if address < self.arena[hi].address { lo } else { hi };
                },
                NodeState::Occupied(_) if node.address == address   => { return Some(idx); },
                _   => { return None; }
            }
        }
    }

    fn is_free(&self, idx: usize) -> bool {
        self.arena[idx].state == NodeState::Free
    }

    /// Leaves, left to right.
    fn leaves(&self) -> Vec<usize> {
        let mut res = vec![];
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(idx) = stack.pop() {
            if let NodeState::Split(lo, hi) = self.arena[idx].state {
                stack.push(hi);
                stack.push(lo);
            } else {
                res.push(idx);
            }
        }

        res
    }

    /// Pairs of sibling leaves, as blocks.
    pub fn sibling_leaves(&self) -> Vec<(MemBlock, MemBlock)> {
        self.arena
            .iter()
            .enumerate()
            .filter(|(idx, _)| !self.vacant.contains(idx))
            .filter_map(|(_, n)| match n.state {
                NodeState::Split(lo, hi) => {
                    let (l, h) = (&self.arena[lo], &self.arena[hi]);
                    if matches!(l.state, NodeState::Split(..)) || matches!(h.state, NodeState::Split(..)) {
                        None
                    } else {
                        Some((Self::as_block(l), Self::as_block(h)))
                    }
                },
                _   => None,
            })
            .collect()
    }

    fn as_block(node: &Node) -> MemBlock {
        MemBlock {
            owner:      match node.state {
                NodeState::Occupied(pid)    => Some(pid),
                _                           => None,
            },
            address:    node.address,
            size:       node.size,
        }
    }
}

impl Allocator for BuddySystem {
    fn allocate(&mut self, pid: Pid, size: Bytes) -> SimResult<Option<Address>> {
        trace!(pid, size, "buddy alloc");
        if pid == 0 {
            return Err(SimError::InvalidArgument(String::from("process ID must be non-zero")));
        } else if size == 0 {
            return Err(SimError::InvalidArgument(String::from("segment size must be non-zero")));
        }
        let Some(target) = self.block_size_for(size) else {
            return Ok(None);
        };

        match self.find_free_leaf(size) {
            Some(mut idx)   => {
                // Keep the low half until the block is as small as it gets.
                while self.arena[idx].size > target {
                    idx = self.split(idx);
                }
                self.arena[idx].state = NodeState::Occupied(pid);

                Ok(Some(self.arena[idx].address))
            },
            None            => Ok(None),
        }
    }

    fn release(&mut self, address: Address) -> SimResult<()> {
        trace!(address, "buddy free");
        let idx = self.find_occupied(address)
            .ok_or_else(|| SimError::InvalidArgument(format!(
                "no occupied block starts at {address:#x}"
            )))?;
        self.arena[idx].state = NodeState::Free;

        // Collapse upwards for as long as both halves are free.
        let mut parent = self.arena[idx].parent;
        while let Some(p) = parent {
            let NodeState::Split(lo, hi) = self.arena[p].state else {
                return Err(SimError::Internal(format!(
                    "buddy node at {:#x} has children but is not split",
                    self.arena[p].address
                )));
            };
            if !(self.is_free(lo) && self.is_free(hi)) {
                break;
            }
            self.arena[p].state = NodeState::Free;
            self.vacant.push(lo);
            self.vacant.push(hi);
            parent = self.arena[p].parent;
        }

        Ok(())
    }

    fn blocks(&self) -> Vec<MemBlock> {
        self.leaves()
            .into_iter()
            .map(|idx| Self::as_block(&self.arena[idx]))
            .collect()
    }

    fn policy(&self) -> Policy {
        Policy::Buddy
    }
}
