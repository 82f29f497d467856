use memsim::{
    alloc::{MemBlock, MemParameters},
    report,
    sim::Simulator,
    *,
};
use std::fs;
use tempfile::tempdir;

fn sim(policy: Policy) -> Simulator {
    Simulator::new(MemParameters::new(0x10000, 0x1000, 0x100, policy).unwrap())
}

fn process(pid: Pid, arrival: Time, lifetime: Time, sizes: &[Bytes]) -> ForthcomingProcess {
    ForthcomingProcess {
        pid,
        arrival,
        lifetime,
        profile: AddressSpaceProfile::new(sizes.to_vec()).unwrap(),
    }
}

fn state(s: &Simulator, pid: Pid) -> ProcessState {
    s.processes().get(pid).unwrap().state
}

fn swapped_pids(s: &Simulator) -> Vec<Pid> {
    s.swapped().iter().map(|w| w.pid).collect()
}

#[test]
fn lone_process_lands_after_kernel() {
    let mut s = sim(Policy::FirstFit);
    s.fill_from(&vec![process(1, 0, 100, &[0x200])]).unwrap();
    s.step().unwrap();

    assert_eq!(state(&s, 1), ProcessState::Active);
    assert_eq!(s.processes().mapping(1).unwrap().addresses(), &[0x1000]);
    let pending: Vec<Event> = s.events().iter().copied().collect();
    assert_eq!(pending, vec![Event { pid: 1, kind: EventKind::Termination, time: 100 }]);
}

#[test]
fn oversized_process_is_discarded() {
    for policy in [Policy::FirstFit, Policy::Buddy] {
        let mut s = sim(policy);
        // Rounds to 0xF100, one chunk over the usable region.
        s.fill_from(&vec![process(4, 0, 10, &[0x7000, 0x8001])]).unwrap();
        s.run(0).unwrap();

        let r = s.processes().get(4).unwrap();
        assert_eq!(r.state, ProcessState::Discarded);
        assert_eq!(r.activation, None);
        assert!(s.swapped().is_empty());
        assert_eq!(s.step_count(), 1);
        assert_eq!(s.memory().free_bytes(), 0xF000);
    }
}

#[test]
fn back_to_back_arrivals_share_through_swap() {
    for policy in [Policy::FirstFit, Policy::Buddy] {
        let mut s = sim(policy);
        s.fill_from(&vec![
            process(1, 0, 50, &[0x6000, 0x2000]),
            process(2, 0, 30, &[0x8000]),
        ]).unwrap();
        s.run(2).unwrap();
        assert_eq!(state(&s, 1), ProcessState::Active);
        assert_eq!(state(&s, 2), ProcessState::Swapped);
        assert_eq!(swapped_pids(&s), vec![2]);

        s.step().unwrap();
        assert_eq!(state(&s, 1), ProcessState::Finished);
        assert_eq!(state(&s, 2), ProcessState::Active);
        assert_eq!(s.processes().get(2).unwrap().activation, Some(50));
        assert!(s.swapped().is_empty());

        s.run(0).unwrap();
        assert_eq!(s.processes().get(2).unwrap().finish, Some(80));
        assert_eq!(s.sim_time(), 80);
    }
}

#[test]
fn small_late_waiter_overtakes_large_one() {
    let mut s = sim(Policy::FirstFit);
    s.fill_from(&vec![
        process(1, 0, 10, &[0x8000]),
        process(2, 0, 100, &[0x7000]),
        process(3, 1, 10, &[0xA000]),
        process(4, 2, 10, &[0x800]),
    ]).unwrap();
    s.run(4).unwrap();
    assert_eq!(swapped_pids(&s), vec![3, 4]);

    // Process 1 leaves 0x8000 behind: too little for 3, plenty for 4.
    s.step().unwrap();
    assert_eq!(state(&s, 3), ProcessState::Swapped);
    assert_eq!(state(&s, 4), ProcessState::Active);
    assert_eq!(s.processes().mapping(4).unwrap().addresses(), &[0x1000]);
    assert_eq!(swapped_pids(&s), vec![3]);

    s.run(0).unwrap();
    let st = s.stats();
    assert_eq!((st.finished, st.swapped, st.discarded), (4, 0, 0));
    // 3 gets in once 2 is gone at 100.
    assert_eq!(s.processes().get(3).unwrap().activation, Some(100));
}

#[test]
fn small_late_waiter_overtakes_large_one_buddy() {
    let mut s = sim(Policy::Buddy);
    // Fills the four roots: 0x8000, 0x4000, 0x2000, 0x1000.
    s.fill_from(&vec![
        process(1, 0, 100, &[0x8000]),
        process(2, 0, 10, &[0x4000]),
        process(3, 0, 100, &[0x2000]),
        process(4, 0, 100, &[0x1000]),
        process(5, 1, 10, &[0x8000]),
        process(6, 2, 10, &[0x400]),
    ]).unwrap();
    s.run(6).unwrap();
    assert_eq!(swapped_pids(&s), vec![5, 6]);

    s.step().unwrap();
    assert_eq!(state(&s, 2), ProcessState::Finished);
    assert_eq!(state(&s, 5), ProcessState::Swapped);
    assert_eq!(state(&s, 6), ProcessState::Active);
    assert_eq!(s.processes().mapping(6).unwrap().addresses(), &[0x9000]);
}

#[test]
fn release_at_arrival_time_is_seen() {
    let mut s = sim(Policy::FirstFit);
    s.fill_from(&vec![
        process(1, 0, 10, &[0xF000]),
        process(2, 10, 10, &[0xF000]),
    ]).unwrap();
    s.run(0).unwrap();
    // The termination at 10 went before the arrival at 10.
    assert_eq!(s.processes().get(2).unwrap().activation, Some(10));
    assert_eq!(s.stats().waited, 0);
}

#[test]
fn loads_workload_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("workload.txt");
    fs::write(&path, "% pid;arrival;lifetime;sizes\n1;0;20;0x200,0x300\n\n2;5;10;1000\n").unwrap();

    let mut s = sim(Policy::Buddy);
    s.load(&path).unwrap();
    assert_eq!(s.events().len(), 2);
    assert_eq!(s.get_process(2).unwrap().profile.sizes(), &[1000]);
    assert!(s.load(&path).is_err());

    s.run(0).unwrap();
    assert_eq!(s.stats().finished, 2);
    assert_eq!(s.memory().free_bytes(), 0xF000);
}

#[test]
fn failed_load_changes_nothing() {
    let dir = tempdir().unwrap();
    let bad = dir.path().join("bad.txt");
    fs::write(&bad, "1;0;20;0x200\n2;5;10;1000\n3;4;10;100\n").unwrap();

    let mut s = sim(Policy::FirstFit);
    match s.load(&bad) {
        Err(e @ SimError::Parse { line: 3, .. }) => assert_eq!(e.kind(), ErrorKind::InvalidArgument),
        other => panic!("unexpected {other:?}"),
    }
    assert!(s.events().is_empty());
    assert_eq!(s.forthcoming().count(), 0);
    assert!(s.get_process(1).is_err());

    let good = dir.path().join("good.txt");
    fs::write(&good, "1;0;20;0x200\n").unwrap();
    s.load(&good).unwrap();
    assert_eq!(s.events().len(), 1);
}

#[test]
fn missing_file_reports_os_error() {
    let dir = tempdir().unwrap();
    let mut s = sim(Policy::FirstFit);
    let err = s.load(&dir.path().join("nope.txt")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SystemIo);
    assert!(matches!(err, SimError::Io { code: Some(_), .. }));
}

#[test]
fn unreadable_input_is_a_system_error() {
    let dir = tempdir().unwrap();
    let mut s = sim(Policy::Buddy);
    // Opening a directory works on Linux, reading from it does not.
    let err = s.load(dir.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SystemIo);
    assert!(matches!(err, SimError::Io { code: Some(_), .. }));
    assert!(s.events().is_empty());
    assert_eq!(s.forthcoming().count(), 0);
}

#[test]
fn independent_simulators_side_by_side() {
    let mut a = sim(Policy::FirstFit);
    let mut b = sim(Policy::FirstFit);
    let mut c = sim(Policy::Buddy);
    for s in [&mut a, &mut b, &mut c] {
        s.random_fill(60, 42).unwrap();
    }
    // Interleave stepping to make sure nothing is shared.
    while a.step().unwrap() {
        c.step().unwrap();
    }
    b.run(0).unwrap();
    c.run(0).unwrap();

    assert_eq!(a.stats(), b.stats());
    let render = |s: &Simulator| {
        let mut buf = vec![];
        report::write_all(&mut buf, s).unwrap();
        buf
    };
    assert_eq!(render(&a), render(&b));
    assert_eq!(c.memory().policy(), Policy::Buddy);
    assert_eq!(c.stats().finished + c.stats().discarded, 60);
}

#[test]
fn completed_run_leaves_memory_empty() {
    for policy in [Policy::FirstFit, Policy::Buddy] {
        let mut s = sim(policy);
        s.random_fill(MAX_PROCESSES, 9).unwrap();
        s.run(0).unwrap();
        assert!(s.swapped().is_empty());
        assert!(s.processes().iter().all(|r| r.state.is_terminal()));
        assert_eq!(
            s.memory().blocks(),
            match policy {
                Policy::FirstFit    => vec![MemBlock { owner: None, address: 0x1000, size: 0xF000 }],
                Policy::Buddy       => vec![
                    MemBlock { owner: None, address: 0x1000, size: 0x8000 },
                    MemBlock { owner: None, address: 0x9000, size: 0x4000 },
                    MemBlock { owner: None, address: 0xD000, size: 0x2000 },
                    MemBlock { owner: None, address: 0xF000, size: 0x1000 },
                ],
            }
        );
    }
}
