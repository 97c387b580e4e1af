use std::ffi::OsString;
use std::process::ExitStatus;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{info, warn};
use universe_fixture::agents;
use universe_fixture::cli::RunArgs;
use universe_fixture::config;
use universe_fixture::dcos::DcosCli;
use universe_fixture::registrar::{Registrar, RegistrationSet, parse_url_list};
use universe_fixture::session::{self, InterruptFlag};

/// Exit code reported when the session was interrupted.
const INTERRUPTED_EXIT: i32 = 130;

pub fn run(args: RunArgs) -> Result<i32> {
    let config = config::load()?;
    let mut options = config.registrar_options();
    if let Some(prefix) = args.prefix {
        options.prefix = prefix;
    }
    if let Some(suffix_len) = args.suffix_len {
        options.suffix_len = suffix_len;
    }
    let urls = parse_url_list(args.urls.as_deref());

    let interrupts = InterruptFlag::install().context("failed to install interrupt handler")?;

    if urls.is_empty() && !args.gc {
        info!("no stub universe URLs configured; running without extra repositories");
        let status = launch(&args.command, &RegistrationSet::default(), &interrupts);
        return finish(status, &interrupts);
    }

    let client = DcosCli::from_config(&config)?;
    if args.gc {
        match agents::gc_frameworks(&client) {
            Ok(report) => info!(agents = report.cleaned.len(), "reclaimed framework sandboxes"),
            Err(err) if interrupts.interrupted() => return Ok(interrupted_during("agent cleanup", &err)),
            Err(err) => return Err(err).context("agent framework cleanup failed"),
        }
        if interrupts.interrupted() {
            warn!("test session interrupted before registration");
            return Ok(INTERRUPTED_EXIT);
        }
    }

    let registrar = Registrar::new(&client, options);
    let outcome = registrar.with_registrations(&urls, |set| launch(&args.command, set, &interrupts));
    let (status, report) = match outcome {
        Ok(outcome) => outcome,
        Err(err) if interrupts.interrupted() => return Ok(interrupted_during("registration", &err)),
        Err(err) => return Err(err.into()),
    };
    if !report.is_clean() {
        warn!(
            leaked = %report.failed,
            "stub universe cleanup incomplete; remove them with `dcos package repo remove`"
        );
    }
    finish(status, &interrupts)
}

fn launch(
    command: &[OsString],
    set: &RegistrationSet,
    interrupts: &InterruptFlag,
) -> Result<ExitStatus> {
    if interrupts.interrupted() {
        bail!("interrupted before the test command started");
    }
    let spec = session::workload_spec(command, set).ok_or_else(|| anyhow!("no test command given"))?;
    info!(command = %spec.display(), registrations = set.len(), "starting test command");
    session::run_workload(&spec, interrupts)
        .with_context(|| format!("failed to run `{}`", spec.display()))
}

/// Map the workload outcome to the runner's exit code.
///
/// Failures caused by an interrupt still exit 130 rather than 1.
fn finish(status: Result<ExitStatus>, interrupts: &InterruptFlag) -> Result<i32> {
    match status {
        Ok(status) => Ok(exit_code(status, interrupts)),
        Err(err) if interrupts.interrupted() => Ok(interrupted_during("test command", &err)),
        Err(err) => Err(err),
    }
}

fn interrupted_during(stage: &str, err: &dyn std::fmt::Display) -> i32 {
    warn!(error = %err, "test session interrupted during {stage}");
    INTERRUPTED_EXIT
}

fn exit_code(status: ExitStatus, interrupts: &InterruptFlag) -> i32 {
    let signalled = signal_exit(status);
    if interrupts.interrupted() {
        warn!("test session interrupted");
        return signalled.unwrap_or(INTERRUPTED_EXIT);
    }
    status.code().or(signalled).unwrap_or(1)
}

#[cfg(unix)]
fn signal_exit(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map(|signal| 128 + signal)
}

#[cfg(not(unix))]
fn signal_exit(_status: ExitStatus) -> Option<i32> {
    None
}
