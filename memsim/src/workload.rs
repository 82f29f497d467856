//! Sources of processes to simulate.
//!
//! To write your own source, simply make sure that it satisfies the
//! [WorkloadGen] trait.

use crate::helpe::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Defines the interface for producing a workload.
///
/// Whatever comes out must be ready for the engine: at most
/// [MAX_PROCESSES] processes, distinct non-zero pids, positive lifetimes,
/// arrivals in non-decreasing order.
pub trait WorkloadGen {
    fn read_processes(&self) -> SimResult<Vec<ForthcomingProcess>>;
}

/// An in-memory workload, handed over as is.
impl WorkloadGen for Vec<ForthcomingProcess> {
    fn read_processes(&self) -> SimResult<Vec<ForthcomingProcess>> {
        Ok(self.clone())
    }
}

//---START FILE WORKLOADS
/// A line-oriented workload file. Lines starting with `%` and blank
/// lines are skipped; every other line reads
///
/// ```text
/// pid;arrival;lifetime;size1,size2,...
/// ```
pub struct WorkloadFile {
    pub path: PathBuf,
}

impl WorkloadFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
        }
    }

    /// Parses a whole workload read from `origin`. The first offending
    /// line aborts parsing, and its number is reported in the error.
    /// Read failures other than bad UTF-8 are I/O errors on `origin`.
    pub fn parse<R: BufRead>(reader: R, origin: &Path) -> SimResult<Vec<ForthcomingProcess>> {
        let mut res: IndexMap<Pid, ForthcomingProcess> = IndexMap::new();
        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.map_err(|e| match e.kind() {
                std::io::ErrorKind::InvalidData => SimError::Parse {
                    line:       line_no,
                    message:    format!("unreadable line: {e}"),
                },
                _   => SimError::io(origin, e),
            })?;
            let data = line.trim();
            if data.is_empty() || data.starts_with('%') {
                continue;
            }

            let reject = |message: String| {
                error!(line = line_no, %message, "bad workload line");
                SimError::Parse { line: line_no, message }
            };
            let p = Self::parse_line(data).map_err(&reject)?;
            if res.contains_key(&p.pid) {
                return Err(reject(format!("duplicate pid {}", p.pid)));
            }
            if let Some((_, last)) = res.last() {
                if p.arrival < last.arrival {
                    return Err(reject(String::from("arrival times must be in ascending order")));
                }
            }
            if res.len() == MAX_PROCESSES {
                return Err(reject(format!("more than {MAX_PROCESSES} processes")));
            }
            res.insert(p.pid, p);
        }

        Ok(res.into_values().collect())
    }

    fn parse_line(data: &str) -> Result<ForthcomingProcess, String> {
        let fields: Vec<&str> = data.split(';').map(str::trim).collect();
        let [pid, arrival, lifetime, sizes] = fields[..] else {
            return Err(format!("expected 4 `;`-separated fields, found {}", fields.len()));
        };

        let pid = pid.parse::<Pid>()
            .map_err(|e| format!("bad pid `{pid}`: {e}"))?;
        if pid == 0 {
            return Err(String::from("pid must be greater than zero"));
        }
        let arrival = arrival.parse::<Time>()
            .map_err(|e| format!("bad arrival time `{arrival}`: {e}"))?;
        let lifetime = lifetime.parse::<Time>()
            .map_err(|e| format!("bad lifetime `{lifetime}`: {e}"))?;
        if lifetime == 0 {
            return Err(String::from("lifetime must be greater than zero"));
        }

        let sizes = sizes.split(',')
            .map(parse_size)
            .collect::<Result<Vec<Bytes>, String>>()?;
        if sizes.len() > MAX_SEGMENTS {
            return Err(format!("more than {MAX_SEGMENTS} segments"));
        }
        let profile = AddressSpaceProfile::new(sizes).map_err(|e| e.to_string())?;

        Ok(ForthcomingProcess {
            pid,
            arrival,
            lifetime,
            profile,
        })
    }
}

impl WorkloadGen for WorkloadFile {
    fn read_processes(&self) -> SimResult<Vec<ForthcomingProcess>> {
        let path = self.path.as_path();
        let fd = std::fs::File::open(path).map_err(|e| SimError::io(path, e))?;

        Self::parse(BufReader::new(fd), path)
    }
}
//---END FILE WORKLOADS

//---START SYNTHETIC WORKLOADS
/// A pseudo-random workload. The same non-zero seed always yields the
/// same processes.
///
/// - `count == 0` lets the generator pick between 2 and [MAX_PROCESSES]
/// - `seed == 0` seeds from the OS process id
pub struct RandomWorkload {
    pub count:  usize,
    pub seed:   u64,
}

pub const RANDOM_MAX_PID: Pid = 65535;
pub const RANDOM_MAX_GAP: Time = 100;
pub const RANDOM_LIFETIMES: (Time, Time) = (10, 1000);
pub const RANDOM_SEGMENT_SIZES: (Bytes, Bytes) = (0x100, 0x800);

impl RandomWorkload {
    pub fn new(count: usize, seed: u64) -> SimResult<Self> {
        if count == 1 || count > MAX_PROCESSES {
            return Err(SimError::InvalidArgument(format!(
                "random workloads hold 2 to {MAX_PROCESSES} processes (0 for any), got {count}"
            )));
        }

        Ok(Self {
            count,
            seed,
        })
    }
}

impl WorkloadGen for RandomWorkload {
    fn read_processes(&self) -> SimResult<Vec<ForthcomingProcess>> {
        let seed = if self.seed == 0 { std::process::id() as u64 } else { self.seed };
        let mut rng = StdRng::seed_from_u64(seed);
        let count = if self.count == 0 {
            rng.gen_range(2..=MAX_PROCESSES)
        } else { self.count };
        debug!(count, seed, "random workload");

        let mut res: IndexMap<Pid, ForthcomingProcess> = IndexMap::with_capacity(count);
        let mut arrival = 0;
        while res.len() < count {
            let pid = rng.gen_range(1..=RANDOM_MAX_PID);
            if res.contains_key(&pid) {
                continue;
            }
            arrival += rng.gen_range(0..=RANDOM_MAX_GAP);
            let lifetime = rng.gen_range(RANDOM_LIFETIMES.0..=RANDOM_LIFETIMES.1);
            let segments = rng.gen_range(1..=MAX_SEGMENTS);
            let sizes = (0..segments)
                .map(|_| rng.gen_range(RANDOM_SEGMENT_SIZES.0..=RANDOM_SEGMENT_SIZES.1))
                .collect();
            res.insert(pid, ForthcomingProcess {
                pid,
                arrival,
                lifetime,
                profile: AddressSpaceProfile::new(sizes)?,
            });
        }

        Ok(res.into_values().collect())
    }
}
//---END SYNTHETIC WORKLOADS

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> SimResult<Vec<ForthcomingProcess>> {
        WorkloadFile::parse(text.as_bytes(), Path::new("inline"))
    }

    #[test]
    fn reads_good_file() {
        let ps = parse(
            "% pid;arrival;lifetime;sizes\n\
             \n\
             1;0;100;512\n\
             7 ; 0 ; 20 ; 0x100, 300 ,4\n\
             % trailing comment\n\
             3;15;1;1,2,3,4\n",
        ).unwrap();
        assert_eq!(ps.iter().map(|p| p.pid).collect::<Vec<_>>(), vec![1, 7, 3]);
        assert_eq!(ps[1].profile.sizes(), &[0x100, 300, 4]);
        assert_eq!(ps[2].arrival, 15);
        assert_eq!(ps[2].lifetime, 1);
    }

    #[test]
    fn rejects_with_line_numbers() {
        let cases = [
            ("1;0;10;100\n1;5;10;100\n", 2),
            ("1;5;10;100\n% c\n2;4;10;100\n", 3),
            ("1;0;0;100\n", 1),
            ("1;0;-3;100\n", 1),
            ("\n1;0;10;1,2,3,4,5\n", 2),
            ("1;0;10\n", 1),
            ("1;0;10;100;7\n", 1),
            ("0;0;10;100\n", 1),
            ("x;0;10;100\n", 1),
            ("1;0;10;100,,200\n", 1),
            ("1;0;10;0\n", 1),
        ];
        for (text, line) in cases {
            match parse(text) {
                Err(SimError::Parse { line: l, .. }) => assert_eq!(l, line, "{text:?}"),
                other => panic!("{text:?} gave {other:?}"),
            }
        }
    }

    #[test]
    fn too_many_processes() {
        let text: String = (1..=MAX_PROCESSES + 1)
            .map(|pid| format!("{pid};{pid};10;256\n"))
            .collect();
        assert!(matches!(parse(&text), Err(SimError::Parse { line, .. }) if line == MAX_PROCESSES + 1));
    }

    #[test]
    fn bad_utf8_is_a_parse_error() {
        let bytes: &[u8] = b"1;0;10;100\n2;1;10;\xff\xfe\n";
        assert!(matches!(
            WorkloadFile::parse(bytes, Path::new("inline")),
            Err(SimError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let w = WorkloadFile::new(PathBuf::from("/definitely/not/here.txt"));
        assert!(matches!(w.read_processes(), Err(SimError::Io { code: Some(_), .. })));
    }

    #[test]
    fn random_is_reproducible_and_sane() {
        let a = RandomWorkload::new(40, 1234).unwrap().read_processes().unwrap();
        let b = RandomWorkload::new(40, 1234).unwrap().read_processes().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
        assert!(a.iter().map(|p| p.pid).all_unique());
        for (x, y) in a.iter().tuple_windows() {
            assert!(x.arrival <= y.arrival);
            assert!(y.arrival - x.arrival <= RANDOM_MAX_GAP);
        }
        for p in &a {
            assert!(p.pid >= 1);
            assert!((RANDOM_LIFETIMES.0..=RANDOM_LIFETIMES.1).contains(&p.lifetime));
            assert!((1..=MAX_SEGMENTS).contains(&p.profile.segment_count()));
            assert!(p.profile.sizes().iter().all(|s| (0x100..=0x800).contains(s)));
        }
    }

    #[test]
    fn random_count_bounds() {
        assert!(RandomWorkload::new(1, 1).is_err());
        assert!(RandomWorkload::new(MAX_PROCESSES + 1, 1).is_err());
        let any = RandomWorkload::new(0, 99).unwrap().read_processes().unwrap();
        assert!((2..=MAX_PROCESSES).contains(&any.len()));
    }
}
