use crate::helpe::*;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ProcessState {
    /// Just arrived, nothing decided yet.
    New,
    /// Resident in memory and running.
    Active,
    /// Waiting in the swap area for memory.
    Swapped,
    Finished,
    /// Could never fit in memory.
    Discarded,
}

impl ProcessState {
    pub fn label(self) -> &'static str {
        match self {
            ProcessState::New       => "NEW",
            ProcessState::Active    => "ACTIVE",
            ProcessState::Swapped   => "SWAPPED",
            ProcessState::Finished  => "FINISHED",
            ProcessState::Discarded => "DISCARDED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessState::Finished | ProcessState::Discarded)
    }
}

/// What the system knows about a process once it has arrived.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid:            Pid,
    pub state:          ProcessState,
    pub arrival:        Time,
    pub lifetime:       Time,
    pub activation:     Option<Time>,
    pub finish:         Option<Time>,
    pub profile:        AddressSpaceProfile,
    pub mapping:        AddressSpaceMapping,
}

/// The process control table, ordered by pid.
#[derive(Default)]
pub struct ProcessTable {
    records: BTreeMap<Pid, ProcessRecord>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        pid:        Pid,
        arrival:    Time,
        lifetime:   Time,
        profile:    &AddressSpaceProfile,
    ) -> SimResult<()> {
        debug!(pid, arrival, lifetime, "pct insert");
        if pid == 0 {
            return Err(SimError::InvalidArgument(String::from("process ID must be non-zero")));
        } else if lifetime == 0 {
            return Err(SimError::InvalidArgument(String::from("lifetime must be positive")));
        } else if self.records.contains_key(&pid) {
            return Err(SimError::InvalidArgument(format!("process {pid} already in the table")));
        }
        self.records.insert(pid, ProcessRecord {
            pid,
            state:      ProcessState::New,
            arrival,
            lifetime,
            activation: None,
            finish:     None,
            profile:    profile.clone(),
            mapping:    AddressSpaceMapping::default(),
        });

        Ok(())
    }

    pub fn get(&self, pid: Pid) -> SimResult<&ProcessRecord> {
        self.records
            .get(&pid)
            .ok_or(SimError::NotFound { what: "process", key: pid as u64 })
    }

    fn get_mut(&mut self, pid: Pid) -> SimResult<&mut ProcessRecord> {
        self.records
            .get_mut(&pid)
            .ok_or(SimError::NotFound { what: "process", key: pid as u64 })
    }

    pub fn lifetime(&self, pid: Pid) -> SimResult<Time> {
        Ok(self.get(pid)?.lifetime)
    }

    pub fn profile(&self, pid: Pid) -> SimResult<&AddressSpaceProfile> {
        Ok(&self.get(pid)?.profile)
    }

    pub fn mapping(&self, pid: Pid) -> SimResult<&AddressSpaceMapping> {
        Ok(&self.get(pid)?.mapping)
    }

    pub fn state_label(&self, pid: Pid) -> SimResult<&'static str> {
        Ok(self.get(pid)?.state.label())
    }

    /// Moves `pid` to `state`.
    ///
    /// `time` is the activation time when going [ProcessState::Active]
    /// and the finish time when going [ProcessState::Finished]; it is
    /// ignored otherwise. Going active requires a `mapping`. Leaving the
    /// active state clears the stored mapping.
    pub fn update_state(
        &mut self,
        pid:        Pid,
        state:      ProcessState,
        time:       Option<Time>,
        mapping:    Option<AddressSpaceMapping>,
    ) -> SimResult<()> {
        debug!(pid, state = state.label(), time, "pct update state");
        let record = self.get_mut(pid)?;
        match state {
            ProcessState::Active    => {
                let Some(mapping) = mapping else {
                    return Err(SimError::InvalidArgument(format!(
                        "process {pid} cannot go active without a mapping"
                    )));
                };
                record.activation = time;
                record.mapping = mapping;
            },
            ProcessState::Finished  => {
                record.finish = time;
                record.mapping = AddressSpaceMapping::default();
            },
            _   => {},
        }
        record.state = state;

        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn reset(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> AddressSpaceProfile {
        AddressSpaceProfile::new(vec![0x100, 0x200]).unwrap()
    }

    #[test]
    fn ordered_by_pid_and_unique() {
        let mut t = ProcessTable::new();
        for pid in [30, 4, 17] {
            t.insert(pid, 0, 10, &profile()).unwrap();
        }
        assert!(t.insert(17, 5, 10, &profile()).is_err());
        assert_eq!(t.iter().map(|r| r.pid).collect::<Vec<_>>(), vec![4, 17, 30]);
        assert_eq!(t.state_label(4).unwrap(), "NEW");
    }

    #[test]
    fn lifecycle() {
        let mut t = ProcessTable::new();
        t.insert(1, 3, 50, &profile()).unwrap();
        assert!(t.update_state(1, ProcessState::Active, Some(3), None).is_err());
        let map = AddressSpaceMapping::new(vec![0x1000, 0x1100]);
        t.update_state(1, ProcessState::Active, Some(3), Some(map.clone())).unwrap();
        assert_eq!(t.mapping(1).unwrap(), &map);
        assert_eq!(t.get(1).unwrap().activation, Some(3));
        t.update_state(1, ProcessState::Finished, Some(53), None).unwrap();
        let r = t.get(1).unwrap();
        assert_eq!((r.state, r.finish), (ProcessState::Finished, Some(53)));
        assert!(r.mapping.is_empty());
        assert_eq!(t.lifetime(1).unwrap(), 50);
        assert_eq!(t.profile(1).unwrap().sizes(), &[0x100, 0x200]);
    }

    #[test]
    fn missing_pid() {
        let mut t = ProcessTable::new();
        assert!(matches!(t.lifetime(9), Err(SimError::NotFound { key: 9, .. })));
        assert!(t.update_state(9, ProcessState::Swapped, None, None).is_err());
        assert!(t.insert(0, 0, 1, &profile()).is_err());
        assert!(t.insert(1, 0, 0, &profile()).is_err());
    }
}
