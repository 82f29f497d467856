//! Plain-text tables describing a [Simulator] at one point in time.
//!
//! Every function only borrows the simulator.

use std::io;
use crate::{
    alloc::MemBlock,
    helpe::*,
    sim::{SimStats, Simulator},
};

fn hex_list(values: &[u64]) -> String {
    if values.is_empty() {
        String::from("-")
    } else {
        values.iter().map(|v| format!("{v:#x}")).join(",")
    }
}

fn maybe(t: Option<Time>) -> String {
    t.map_or_else(|| String::from("-"), |t| t.to_string())
}

pub fn write_workload<W: Write>(out: &mut W, sim: &Simulator) -> io::Result<()> {
    writeln!(out, "== WORKLOAD (step {}, time {}) ==", sim.step_count(), sim.sim_time())?;
    writeln!(out, "PID\tARRIVAL\tLIFETIME\tSIZES\tTOTAL")?;
    for p in sim.forthcoming() {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{:#x}",
            p.pid,
            p.arrival,
            p.lifetime,
            hex_list(p.profile.sizes()),
            p.profile.total(),
        )?;
    }

    Ok(())
}

pub fn write_processes<W: Write>(out: &mut W, sim: &Simulator) -> io::Result<()> {
    writeln!(out, "== PROCESS TABLE ==")?;
    writeln!(out, "PID\tSTATE\tARRIVAL\tLIFETIME\tACTIVATION\tFINISH\tSIZES\tMAPPING")?;
    for r in sim.processes().iter() {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            r.pid,
            r.state.label(),
            r.arrival,
            r.lifetime,
            maybe(r.activation),
            maybe(r.finish),
            hex_list(r.profile.sizes()),
            hex_list(r.mapping.addresses()),
        )?;
    }

    Ok(())
}

pub fn write_events<W: Write>(out: &mut W, sim: &Simulator) -> io::Result<()> {
    writeln!(out, "== FUTURE EVENTS ==")?;
    writeln!(out, "TIME\tKIND\tPID")?;
    for e in sim.events().iter() {
        writeln!(out, "{}\t{}\t{}", e.time, e.kind.label(), e.pid)?;
    }

    Ok(())
}

pub fn write_swap<W: Write>(out: &mut W, sim: &Simulator) -> io::Result<()> {
    writeln!(out, "== SWAP ==")?;
    writeln!(out, "POS\tPID\tSIZES")?;
    for (pos, s) in sim.swapped().iter().enumerate() {
        writeln!(out, "{pos}\t{}\t{}", s.pid, hex_list(s.profile.sizes()))?;
    }

    Ok(())
}

pub fn write_memory<W: Write>(out: &mut W, sim: &Simulator) -> io::Result<()> {
    let mem = sim.memory();
    let params = mem.params();
    writeln!(
        out,
        "== MEMORY ({}, total {:#x}, kernel {:#x}, chunk {:#x}) ==",
        mem.policy(),
        params.total_size,
        params.kernel_size,
        params.chunk_size,
    )?;
    writeln!(out, "START\tEND\tSIZE\tOWNER")?;
    for MemBlock { owner, address, size } in mem.blocks() {
        let owner = owner.map_or_else(|| String::from("FREE"), |pid| pid.to_string());
        writeln!(out, "{address:#x}\t{:#x}\t{size:#x}\t{owner}", address + size)?;
    }
    writeln!(out, "free {:#x}, occupied {:#x}", mem.free_bytes(), mem.occupied_bytes())?;

    Ok(())
}

/// Every table, in the order the front ends print them.
pub fn write_all<W: Write>(out: &mut W, sim: &Simulator) -> io::Result<()> {
    write_workload(out, sim)?;
    writeln!(out)?;
    write_processes(out, sim)?;
    writeln!(out)?;
    write_events(out, sim)?;
    writeln!(out)?;
    write_swap(out, sim)?;
    writeln!(out)?;
    write_memory(out, sim)?;
    writeln!(out)
}

pub fn write_stats<W: Write>(out: &mut W, stats: &SimStats) -> io::Result<()> {
    writeln!(out, "Steps:\t\t{}", stats.steps)?;
    writeln!(
        out,
        "Finished:\t{}\nActive:\t\t{}\nSwapped:\t{}\nDiscarded:\t{}",
        stats.finished, stats.active, stats.swapped, stats.discarded
    )?;
    writeln!(out, "Waited:\t\t{} (mean wait {:.2})", stats.waited, stats.mean_wait)?;
    writeln!(out, "Makespan:\t{}", stats.makespan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{alloc::MemParameters, workload::WorkloadFile};

    fn render(sim: &Simulator) -> String {
        let mut buf = vec![];
        write_all(&mut buf, sim).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn tables_follow_the_run() {
        let params = MemParameters::new(0x10000, 0x1000, 0x100, Policy::FirstFit).unwrap();
        let mut sim = Simulator::new(params);
        let ps = WorkloadFile::parse("1;0;100;0x200,0x80\n2;3;10;0x10000\n".as_bytes(), Path::new("inline")).unwrap();
        sim.fill_from(&ps).unwrap();

        let text = render(&sim);
        assert!(text.contains("== WORKLOAD (step 0, time 0) =="));
        assert!(text.contains("1\t0\t100\t0x200,0x80\t0x280\n"));
        assert!(text.contains("2\t3\t10\t0x10000\t0x10000\n"));
        assert!(text.contains("0\tARRIVAL\t1"));
        assert!(text.contains("0x1000\t0x10000\t0xf000\tFREE"));

        sim.run(2).unwrap();
        let text = render(&sim);
        assert!(text.contains("1\tACTIVE\t0\t100\t0\t-\t0x200,0x80\t0x1000,0x1200"));
        assert!(text.contains("2\tDISCARDED\t3\t10\t-\t-\t0x10000\t-"));
        assert!(text.contains("100\tTERMINATE\t1"));
        assert!(text.contains("0x1200\t0x1300\t0x100\t1"));
        assert!(text.contains("free 0xed00, occupied 0x300"));
    }

    #[test]
    fn stats_block() {
        let stats = SimStats { steps: 4, finished: 2, makespan: 20, ..Default::default() };
        let mut buf = vec![];
        write_stats(&mut buf, &stats).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Steps:\t\t4\n"));
        assert!(text.contains("Finished:\t2"));
        assert!(text.ends_with("Makespan:\t20\n"));
    }
}
