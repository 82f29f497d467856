pub use std::{
    collections::{BinaryHeap, BTreeMap, VecDeque},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
    fmt,
};
pub use thiserror::Error;
pub use itertools::Itertools;
pub use indexmap::IndexMap;
pub use clap::{Parser, ValueEnum};
pub use tracing::{debug, error, info, trace, warn};

pub use crate::{
    AddressSpaceMapping,
    AddressSpaceProfile,
    ForthcomingProcess,
    event::{Event, EventKind, EventQueue},
    pct::{ProcessRecord, ProcessState, ProcessTable},
    swap::{SwapQueue, SwappedProcess},
};

/// Process identifier. Zero is reserved and never names a process.
pub type Pid = u32;

/// A location in simulated main memory.
///
/// 64 bits wide so that rounding the largest configurable memory size up
/// to a chunk multiple can never overflow.
pub type Address = u64;

/// A quantity of simulated memory.
pub type Bytes = u64;

/// Logical simulation time. The engine does not care about units.
pub type Time = u64;

/// Upper bound on the number of processes a workload may hold.
pub const MAX_PROCESSES: usize = 100;

/// Upper bound on the number of segments of an [AddressSpaceProfile].
pub const MAX_SEGMENTS: usize = 4;

pub type SimResult<T> = Result<T, SimError>;

#[derive(Error, Debug)]
/// Everything that can go wrong inside `memsim`.
///
/// Running out of memory is *not* in here: "retry later" and "will never
/// fit" are ordinary outcomes of an allocation, see [crate::alloc::Placement].
pub enum SimError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{what} {key} not found")]
    NotFound {
        what:   &'static str,
        key:    u64,
    },
    #[error("line {line}: {message}")]
    Parse {
        line:       usize,
        message:    String,
    },
    #[error("I/O failure on {} (os error {:?})", path.display(), code)]
    Io {
        path:   PathBuf,
        // The originating system error number, when there is one.
        code:   Option<i32>,
        #[source]
        source: std::io::Error,
    },
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

/// Coarse classification of a [SimError].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    /// Bad input: a broken precondition, a missing entry, a malformed line.
    InvalidArgument,
    /// The file system said no.
    SystemIo,
    /// A guard failed. This is a bug, not bad input.
    Internal,
}

impl SimError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SimError::InvalidArgument(_)
            | SimError::NotFound { .. }
            | SimError::Parse { .. }    => ErrorKind::InvalidArgument,
            SimError::Io { .. }         => ErrorKind::SystemIo,
            SimError::Internal(_)       => ErrorKind::Internal,
        }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        SimError::Io {
            path:   path.to_path_buf(),
            code:   source.raw_os_error(),
            source,
        }
    }
}

/// Placement strategy of the simulated memory. Chosen once, when the
/// engine is built, and fixed for the run.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum Policy {
    /// Coalescing first-fit free list
    FirstFit,
    /// Binary buddy system
    Buddy,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::FirstFit    => write!(f, "FirstFit"),
            Policy::Buddy       => write!(f, "BuddySystem"),
        }
    }
}

/// Parses a size given either in decimal or as `0x`-prefixed hex.
///
/// Used by the command line front ends.
pub fn parse_size(s: &str) -> Result<Bytes, String> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Bytes::from_str_radix(hex, 16)
    } else {
        s.parse::<Bytes>()
    };

    parsed.map_err(|e| format!("bad size `{s}`: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_parse_in_both_radixes() {
        assert_eq!(parse_size("256"), Ok(256));
        assert_eq!(parse_size("0x100"), Ok(256));
        assert_eq!(parse_size(" 0X1000 "), Ok(4096));
        assert!(parse_size("0xZZ").is_err());
        assert!(parse_size("-1").is_err());
    }

    #[test]
    fn error_kinds() {
        assert_eq!(SimError::NotFound { what: "process", key: 3 }.kind(), ErrorKind::InvalidArgument);
        assert_eq!(SimError::Parse { line: 1, message: String::new() }.kind(), ErrorKind::InvalidArgument);
        assert_eq!(SimError::Internal(String::new()).kind(), ErrorKind::Internal);
        let io = std::io::Error::from_raw_os_error(2);
        let err = SimError::io(Path::new("nowhere"), io);
        assert_eq!(err.kind(), ErrorKind::SystemIo);
        assert!(matches!(err, SimError::Io { code: Some(2), .. }));
    }
}
