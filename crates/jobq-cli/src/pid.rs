//! Worker PID bookkeeping.
//!
//! `worker start` records spawned PIDs in `.pids/workers.json` under the
//! working directory; `worker stop` and `status` read them back.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const PID_DIR: &str = ".pids";
const PID_FILE: &str = "workers.json";

pub fn pid_file() -> PathBuf {
    Path::new(PID_DIR).join(PID_FILE)
}

pub fn read_pids() -> Result<Vec<u32>> {
    let path = pid_file();
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

pub fn write_pids(pids: &[u32]) -> Result<()> {
    fs::create_dir_all(PID_DIR)?;
    fs::write(pid_file(), serde_json::to_string_pretty(pids)?)?;
    Ok(())
}

/// Probe a recorded worker without disturbing it.
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    // Signal 0 checks for existence only.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

/// Ask a worker to stop at its next poll boundary.
#[cfg(unix)]
pub fn terminate(pid: u32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
pub fn is_alive(_pid: u32) -> bool {
    false
}

#[cfg(not(unix))]
pub fn terminate(_pid: u32) -> bool {
    false
}
