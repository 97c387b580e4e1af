//! Running a test command as the guarded workload of a registration scope.

use std::ffi::OsString;
use std::process::ExitStatus;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::registrar::RegistrationSet;
use crate::util::process::{self, CommandSpec};

/// Space-separated generated names, exported to the workload.
pub const NAMES_ENV: &str = "STUB_UNIVERSE_NAMES";

#[derive(Default)]
struct InterruptState {
    interrupted: AtomicBool,
    /// Pid of the running workload, 0 while none is running.
    child: AtomicU32,
}

/// Keeps SIGINT/SIGTERM/SIGHUP from terminating the runner before release.
///
/// An interrupt is recorded and a running workload is sent SIGTERM, so a
/// signal aimed only at the runner still stops the test command. A Ctrl-C
/// at the terminal reaches the workload directly as well.
#[derive(Clone, Default)]
pub struct InterruptFlag(Arc<InterruptState>);

impl InterruptFlag {
    pub fn install() -> Result<Self, ctrlc::Error> {
        let flag = Self::default();
        let handle = flag.clone();
        ctrlc::set_handler(move || handle.trigger())?;
        Ok(flag)
    }

    /// Record an interrupt and stop the workload, if one is running.
    pub fn trigger(&self) {
        self.0.interrupted.store(true, Ordering::SeqCst);
        terminate(self.0.child.load(Ordering::SeqCst));
    }

    pub fn interrupted(&self) -> bool {
        self.0.interrupted.load(Ordering::SeqCst)
    }

    fn track(&self, pid: u32) {
        self.0.child.store(pid, Ordering::SeqCst);
        // An interrupt may have landed between the check and the spawn.
        if self.interrupted() {
            terminate(pid);
        }
    }

    fn untrack(&self) {
        self.0.child.store(0, Ordering::SeqCst);
    }
}

#[cfg(unix)]
fn terminate(pid: u32) {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    if pid == 0 {
        return;
    }
    // SAFETY: kill(2) takes plain integers and touches no memory of ours.
    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn terminate(_pid: u32) {}

pub fn workload_spec(command: &[OsString], set: &RegistrationSet) -> Option<CommandSpec> {
    let (program, args) = command.split_first()?;
    let names = set.names().collect::<Vec<_>>().join(" ");
    Some(
        CommandSpec::new(program.clone())
            .args(args)
            .env(NAMES_ENV, names)
            .inherit(),
    )
}

/// Run the workload to completion, forwarding interrupts to it.
pub fn run_workload(spec: &CommandSpec, interrupts: &InterruptFlag) -> std::io::Result<ExitStatus> {
    let mut child = process::spawn(spec)?;
    interrupts.track(child.id());
    let status = child.wait();
    interrupts.untrack();
    status
}
