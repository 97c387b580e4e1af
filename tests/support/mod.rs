#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use assert_cmd::Command;
use tempfile::TempDir;

/// Fake `dcos` keeping the registry as `name uri` lines in `$FAKE_DCOS_STATE`.
const FAKE_DCOS: &str = r#"#!/bin/sh
state="$FAKE_DCOS_STATE"
echo "$*" >> "$FAKE_DCOS_LOG"
case "$1" in
  package)
    case "$3" in
      list)
        printf '{"repositories":['
        sep=''
        while read -r name uri; do
          [ -z "$name" ] && continue
          printf '%s{"name":"%s","uri":"%s"}' "$sep" "$name" "$uri"
          sep=','
        done < "$state"
        printf ']}\n'
        ;;
      add)
        name="$5"
        uri="$6"
        if [ -n "$FAKE_DCOS_ADD_DELAY" ]; then
          sleep "$FAKE_DCOS_ADD_DELAY"
        fi
        if [ -n "$FAKE_DCOS_FAIL_ADD" ] && [ "$uri" = "$FAKE_DCOS_FAIL_ADD" ]; then
          echo "cannot add $uri" >&2
          exit 1
        fi
        { echo "$name $uri"; cat "$state"; } > "$state.tmp"
        mv "$state.tmp" "$state"
        ;;
      remove)
        name="$4"
        if ! grep -q "^$name " "$state"; then
          echo "repository $name not found" >&2
          exit 1
        fi
        grep -v "^$name " "$state" > "$state.tmp"
        mv "$state.tmp" "$state"
        ;;
    esac
    ;;
  node)
    if [ "$2" = "--json" ]; then
      cat "$FAKE_DCOS_NODES"
    fi
    ;;
esac
"#;

pub struct FakeCluster {
    dir: TempDir,
    pub bin: PathBuf,
    pub state: PathBuf,
    pub log: PathBuf,
    pub nodes: PathBuf,
}

impl FakeCluster {
    pub fn new(repositories: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("dcos");
        fs::write(&bin, FAKE_DCOS).unwrap();
        make_executable(&bin);

        let state = dir.path().join("registry");
        let lines = repositories
            .iter()
            .map(|(name, uri)| format!("{name} {uri}\n"))
            .collect::<String>();
        fs::write(&state, lines).unwrap();

        let log = dir.path().join("calls.log");
        fs::write(&log, "").unwrap();
        let nodes = dir.path().join("nodes.json");
        fs::write(&nodes, "[]").unwrap();

        Self {
            dir,
            bin,
            state,
            log,
            nodes,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn command(&self) -> Command {
        Command::from_std(self.process())
    }

    /// The runner as a plain process, for tests that signal it mid-session.
    pub fn process(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(env!("CARGO_BIN_EXE_universe-fixture"));
        cmd.env("UNIVERSE_FIXTURE_DCOS_BIN", &self.bin)
            .env("UNIVERSE_FIXTURE_CONFIG", self.path("absent-config.toml"))
            .env("FAKE_DCOS_STATE", &self.state)
            .env("FAKE_DCOS_LOG", &self.log)
            .env("FAKE_DCOS_NODES", &self.nodes)
            .env_remove("STUB_UNIVERSE_URL")
            .env_remove("FAKE_DCOS_FAIL_ADD")
            .env_remove("FAKE_DCOS_ADD_DELAY")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Start the runner detached from the test harness's output.
    pub fn spawn(&self, configure: impl FnOnce(&mut std::process::Command)) -> Child {
        let mut cmd = self.process();
        configure(&mut cmd);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap()
    }

    /// Registry contents as `(name, uri)` pairs, highest precedence first.
    pub fn registry(&self) -> Vec<(String, String)> {
        read_registry(&self.state)
    }

    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

pub fn read_registry(path: &Path) -> Vec<(String, String)> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter_map(|line| line.split_once(' '))
        .map(|(name, uri)| (name.to_string(), uri.to_string()))
        .collect()
}

pub fn is_generated_name(name: &str) -> bool {
    name.strip_prefix("testpkg-").is_some_and(|suffix| {
        suffix.len() == 8
            && suffix
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    })
}

/// Poll until `ready` holds, panicking after `timeout`.
pub fn wait_for(what: &str, timeout: Duration, mut ready: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    while !ready() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(50));
    }
}

/// Send `signal` (e.g. `TERM`) to `child` alone, not its process group.
pub fn send_signal(child: &Child, signal: &str) {
    let status = std::process::Command::new("kill")
        .arg(format!("-{signal}"))
        .arg(child.id().to_string())
        .status()
        .unwrap();
    assert!(status.success(), "kill -{signal} failed");
}

/// Wait for `child`, killing it and panicking after `timeout`.
pub fn wait_with_timeout(child: &mut Child, timeout: Duration) -> ExitStatus {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            panic!("runner did not exit within {timeout:?}");
        }
        thread::sleep(Duration::from_millis(50));
    }
}

fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}
