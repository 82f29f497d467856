use crate::helpe::*;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
/// An [Event] either brings a process into the system or
/// takes one out of memory.
pub enum EventKind {
    Arrival,
    Termination,
}

impl EventKind {
    // Terminations go first so that memory released at time `t` is
    // visible to processes arriving at `t`.
    #[inline(always)]
    fn rank(self) -> u8 {
        match self {
            EventKind::Termination  => 0,
            EventKind::Arrival      => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EventKind::Arrival      => "ARRIVAL",
            EventKind::Termination  => "TERMINATE",
        }
    }
}

/// Something that will happen to process [`pid`](Event::pid) at
/// [`time`](Event::time). Consumed exactly once by the engine.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Event {
    pub pid:    Pid,
    pub kind:   EventKind,
    pub time:   Time,
}

// What actually sits in the heap. The sequence number is what keeps
// events of the same time and kind in insertion order.
#[derive(Eq)]
struct Pending {
    event:  Event,
    seq:    u64,
}

impl Pending {
    #[inline(always)]
    fn key(&self) -> (Time, u8, u64) {
        (self.event.time, self.event.kind.rank(), self.seq)
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Smallest (time, rank, seq) must surface first from the max-heap.
        other.key().cmp(&self.key())
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

/// The future event queue. Pops events by increasing time; at equal
/// times terminations come before arrivals; at equal time and kind,
/// whatever was inserted first comes out first.
///
/// The last rule makes every run over a given workload reproducible.
#[derive(Default)]
pub struct EventQueue {
    heap:       BinaryHeap<Pending>,
    next_seq:   u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: EventKind, time: Time, pid: Pid) -> SimResult<()> {
        debug!(kind = kind.label(), time, pid, "feq insert");
        if pid == 0 {
            return Err(SimError::InvalidArgument(String::from(
                "event for process 0"
            )));
        }
        self.heap.push(Pending {
            event:  Event { pid, kind, time },
            seq:    self.next_seq,
        });
        self.next_seq += 1;

        Ok(())
    }

    pub fn pop(&mut self) -> SimResult<Event> {
        match self.heap.pop() {
            Some(p) => {
                debug!(kind = p.event.kind.label(), time = p.event.time, pid = p.event.pid, "feq pop");
                Ok(p.event)
            },
            None    => Err(SimError::InvalidArgument(String::from(
                "pop from an empty event queue"
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Drops every pending event.
    pub fn reset(&mut self) {
        self.heap.clear();
        self.next_seq = 0;
    }

    /// Pending events in the order [EventQueue::pop] would return them.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.heap
            .iter()
            .sorted_by_key(|p| p.key())
            .map(|p| &p.event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use EventKind::*;

    fn drain(q: &mut EventQueue) -> Vec<(Time, EventKind, Pid)> {
        let mut res = vec![];
        while !q.is_empty() {
            let e = q.pop().unwrap();
            res.push((e.time, e.kind, e.pid));
        }

        res
    }

    #[test]
    fn time_then_kind_then_insertion() {
        let mut q = EventQueue::new();
        q.insert(Arrival, 10, 1).unwrap();
        q.insert(Arrival, 5, 2).unwrap();
        q.insert(Termination, 10, 3).unwrap();
        q.insert(Arrival, 10, 4).unwrap();
        q.insert(Termination, 10, 5).unwrap();
        q.insert(Arrival, 0, 6).unwrap();

        assert_eq!(
            drain(&mut q),
            vec![
                (0, Arrival, 6),
                (5, Arrival, 2),
                (10, Termination, 3),
                (10, Termination, 5),
                (10, Arrival, 1),
                (10, Arrival, 4),
            ]
        );
    }

    #[test]
    fn iter_matches_pop_order() {
        let mut q = EventQueue::new();
        for (i, t) in [7, 3, 3, 9, 3].into_iter().enumerate() {
            let kind = if i % 2 == 0 { Arrival } else { Termination };
            q.insert(kind, t, i as Pid + 1).unwrap();
        }
        let peeked: Vec<Event> = q.iter().copied().collect();
        let popped: Vec<Event> = std::iter::from_fn(|| q.pop().ok()).collect();
        assert_eq!(peeked, popped);
    }

    #[test]
    fn rejects_pid_zero_and_empty_pop() {
        let mut q = EventQueue::new();
        assert!(matches!(q.insert(Arrival, 0, 0), Err(SimError::InvalidArgument(_))));
        assert!(q.is_empty());
        assert!(matches!(q.pop(), Err(SimError::InvalidArgument(_))));
    }

    #[test]
    fn reset_empties() {
        let mut q = EventQueue::new();
        q.insert(Arrival, 1, 1).unwrap();
        q.insert(Termination, 2, 1).unwrap();
        assert_eq!(q.len(), 2);
        q.reset();
        assert!(q.is_empty());
        assert_eq!(q.iter().count(), 0);
    }
}
