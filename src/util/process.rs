use std::ffi::{OsStr, OsString};
use std::process::{Child, Command, ExitStatus, Stdio};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StreamMode {
    Inherit,
    Capture,
}

#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub env: Vec<(OsString, OsString)>,
    pub stdout: StreamMode,
    pub stderr: StreamMode,
}

impl CommandSpec {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdout: StreamMode::Capture,
            stderr: StreamMode::Capture,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn inherit(mut self) -> Self {
        self.stdout = StreamMode::Inherit;
        self.stderr = StreamMode::Inherit;
        self
    }

    /// Program and arguments joined for log and error messages.
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| part.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

pub fn run(spec: &CommandSpec) -> std::io::Result<CommandOutput> {
    let output = build(spec).output()?;
    Ok(CommandOutput {
        status: output.status,
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

/// Start the command and hand back the running child.
pub fn spawn(spec: &CommandSpec) -> std::io::Result<Child> {
    build(spec).spawn()
}

fn build(spec: &CommandSpec) -> Command {
    let mut command = Command::new(&spec.program);
    command.args(&spec.args);
    // `output()` closes stdin unless told otherwise; inherited runs keep the terminal.
    command.stdin(match spec.stdout {
        StreamMode::Inherit => Stdio::inherit(),
        StreamMode::Capture => Stdio::null(),
    });
    for (key, value) in &spec.env {
        command.env(key, value);
    }
    command.stdout(stdio(spec.stdout));
    command.stderr(stdio(spec.stderr));
    command
}

fn stdio(mode: StreamMode) -> Stdio {
    match mode {
        StreamMode::Inherit => Stdio::inherit(),
        StreamMode::Capture => Stdio::piped(),
    }
}
