//! The discrete-event engine.

use crate::{
    alloc::{Memory, MemParameters, Placement},
    helpe::*,
    workload::{RandomWorkload, WorkloadFile, WorkloadGen},
};

/// One self-contained simulation. Owns every piece of mutable state, so
/// any number of them can live side by side.
pub struct Simulator {
    memory:         Memory,
    feq:            EventQueue,
    pct:            ProcessTable,
    swp:            SwapQueue,
    // The workload, in arrival order, indexed by pid.
    forthcoming:    IndexMap<Pid, ForthcomingProcess>,
    step_count:     u64,
    sim_time:       Time,
}

/// A summary of where a run got to.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimStats {
    pub steps:          u64,
    pub finished:       usize,
    pub active:         usize,
    pub swapped:        usize,
    pub discarded:      usize,
    /// Processes that were activated later than they arrived.
    pub waited:         usize,
    /// Over every activated process.
    pub mean_wait:      f64,
    /// Largest finish time seen so far.
    pub makespan:       Time,
}

impl Simulator {
    pub fn new(params: MemParameters) -> Self {
        Self {
            memory:         Memory::new(params),
            feq:            EventQueue::new(),
            pct:            ProcessTable::new(),
            swp:            SwapQueue::new(),
            forthcoming:    IndexMap::new(),
            step_count:     0,
            sim_time:       0,
        }
    }

    /// Reads the workload in `path`. Nothing changes unless the whole
    /// file is valid.
    pub fn load(&mut self, path: &Path) -> SimResult<()> {
        info!(path = %path.display(), "loading workload");
        self.fill_from(&WorkloadFile::new(path.to_path_buf()))
    }

    /// Generates a synthetic workload, see [RandomWorkload].
    pub fn random_fill(&mut self, count: usize, seed: u64) -> SimResult<()> {
        info!(count, seed, "generating workload");
        self.fill_from(&RandomWorkload::new(count, seed)?)
    }

    /// Registers every process of `source` and its arrival event.
    pub fn fill_from<G: WorkloadGen>(&mut self, source: &G) -> SimResult<()> {
        if !self.forthcoming.is_empty() {
            return Err(SimError::InvalidArgument(String::from(
                "a workload has already been loaded"
            )));
        }
        let processes = source.read_processes()?;

        // Sources promise this; a bad one would break the engine.
        if processes.len() > MAX_PROCESSES {
            return Err(SimError::InvalidArgument(format!(
                "{} processes exceed the limit of {MAX_PROCESSES}", processes.len()
            )));
        }
        let mut table: IndexMap<Pid, ForthcomingProcess> = IndexMap::with_capacity(processes.len());
        for p in processes {
            if let Some((_, last)) = table.last() {
                if p.arrival < last.arrival {
                    return Err(SimError::InvalidArgument(String::from("arrivals out of order")));
                }
            }
            if p.pid == 0 || p.lifetime == 0 || table.contains_key(&p.pid) {
                return Err(SimError::InvalidArgument(format!("bad process entry {}", p.pid)));
            }
            table.insert(p.pid, p);
        }

        for p in table.values() {
            self.feq.insert(EventKind::Arrival, p.arrival, p.pid)?;
        }
        self.forthcoming = table;
        info!(processes = self.forthcoming.len(), "workload ready");

        Ok(())
    }

    pub fn get_process(&self, pid: Pid) -> SimResult<&ForthcomingProcess> {
        self.forthcoming
            .get(&pid)
            .ok_or(SimError::NotFound { what: "forthcoming process", key: pid as u64 })
    }

    /// Processes the next event, if any. Returns `false` when there
    /// was nothing left to do.
    pub fn step(&mut self) -> SimResult<bool> {
        if self.feq.is_empty() {
            return Ok(false);
        }
        let event = self.feq.pop()?;
        self.sim_time = event.time;
        self.step_count += 1;
        trace!(step = self.step_count, time = event.time, pid = event.pid, kind = event.kind.label(), "step");

        match event.kind {
            EventKind::Arrival      => self.arrive(event.pid, event.time)?,
            EventKind::Termination  => self.terminate(event.pid, event.time)?,
        }

        Ok(true)
    }

    /// Runs `count` steps, or until the queue drains. `count == 0` runs
    /// to completion. Returns how many steps were taken.
    pub fn run(&mut self, count: u64) -> SimResult<u64> {
        let mut done = 0;
        while (count == 0 || done < count) && self.step()? {
            done += 1;
        }

        Ok(done)
    }

    fn arrive(&mut self, pid: Pid, time: Time) -> SimResult<()> {
        let process = self.get_process(pid)?.clone();
        self.pct.insert(pid, process.arrival, process.lifetime, &process.profile)?;

        match self.memory.allocate_profile(pid, &process.profile)? {
            Placement::Mapped(mapping)  => {
                self.activate(pid, time, mapping)?;
            },
            Placement::Unavailable      => {
                info!(pid, time, "swapped");
                self.pct.update_state(pid, ProcessState::Swapped, None, None)?;
                self.swp.add(pid, &process.profile)?;
            },
            Placement::Impossible       => {
                warn!(pid, time, sizes = ?process.profile.sizes(), "discarded: address space larger than memory");
                self.pct.update_state(pid, ProcessState::Discarded, None, None)?;
            },
        }

        Ok(())
    }

    fn activate(&mut self, pid: Pid, time: Time, mapping: AddressSpaceMapping) -> SimResult<()> {
        info!(pid, time, addresses = ?mapping.addresses(), "activated");
        let finish = self.get_process(pid)?.finish_if_activated_at(time)?;
        self.pct.update_state(pid, ProcessState::Active, Some(time), Some(mapping))?;
        self.feq.insert(EventKind::Termination, finish, pid)
    }

    fn terminate(&mut self, pid: Pid, time: Time) -> SimResult<()> {
        let record = self.pct.get(pid)?;
        if record.state != ProcessState::Active {
            return Err(SimError::Internal(format!(
                "termination of process {pid} in state {}", record.state.label()
            )));
        }
        let mapping = record.mapping.clone();
        info!(pid, time, "finished");
        self.pct.update_state(pid, ProcessState::Finished, Some(time), None)?;
        self.memory.release_profile(&mapping)?;

        // Memory just got freed. Every waiter gets a go, in queue order;
        // one that still does not fit must not hold back the rest.
        let mut idx = 0;
        while idx < self.swp.len() {
            let waiting = self.swp.peek(idx)?;
            let candidate = waiting.pid;
            match self.memory.allocate_profile(candidate, &waiting.profile)? {
                Placement::Mapped(mapping)  => {
                    self.swp.remove(idx)?;
                    self.activate(candidate, time, mapping)?;
                },
                Placement::Unavailable      => { idx += 1; },
                Placement::Impossible       => {
                    return Err(SimError::Internal(format!(
                        "swapped process {candidate} can never fit"
                    )));
                },
            }
        }

        Ok(())
    }

    /// Puts everything back to the freshly built state. Memory
    /// parameters are kept.
    pub fn reset(&mut self) {
        debug!("sim reset");
        self.memory = Memory::new(*self.memory.params());
        self.feq.reset();
        self.pct.reset();
        self.swp.reset();
        self.forthcoming.clear();
        self.step_count = 0;
        self.sim_time = 0;
    }

    pub fn stats(&self) -> SimStats {
        let mut res = SimStats {
            steps: self.step_count,
            ..Default::default()
        };
        let mut total_wait = 0;
        let mut activated = 0;
        for r in self.pct.iter() {
            match r.state {
                ProcessState::Finished  => { res.finished += 1; },
                ProcessState::Active    => { res.active += 1; },
                ProcessState::Swapped   => { res.swapped += 1; },
                ProcessState::Discarded => { res.discarded += 1; },
                ProcessState::New       => {},
            }
            if let Some(a) = r.activation {
                activated += 1;
                total_wait += a - r.arrival;
                if a > r.arrival { res.waited += 1; }
            }
            if let Some(f) = r.finish {
                res.makespan = res.makespan.max(f);
            }
        }
        if activated > 0 {
            res.mean_wait = total_wait as f64 / activated as f64;
        }

        res
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn events(&self) -> &EventQueue {
        &self.feq
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.pct
    }

    pub fn swapped(&self) -> &SwapQueue {
        &self.swp
    }

    pub fn forthcoming(&self) -> impl Iterator<Item = &ForthcomingProcess> {
        self.forthcoming.values()
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn sim_time(&self) -> Time {
        self.sim_time
    }
}
