//! End-to-end tests driving the `noctty` binary.
//!
//! Processes are started either in a fresh session with no controlling
//! terminal, or as the session leader of a new pseudo-terminal that becomes
//! their controlling terminal.
#![cfg(target_os = "linux")]

use nix::pty::{openpty, OpenptyResult};
use nix::sys::signal::{kill, Signal};
use nix::unistd::{setsid, Pid};
use std::io::{self, Write};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Duration;

const SEPARATOR: &str = "------------------------------------------------------------\n\n";

/// Opens `/dev/tty` from a shell: exit 10 if it works, 20 if there is no
/// controlling terminal.
const PROBE_TTY: &str = "if true </dev/tty 2>/dev/null; then exit 10; else exit 20; fi";

/// Exit 0 when SIGHUP is not in the shell's ignored set, 1 when it is.
const PROBE_SIGHUP: &str =
    "m=$(sed -n 's/^SigIgn:[[:space:]]*//p' /proc/$$/status); exit $(( 0x$m & 1 ))";

fn noctty() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_noctty"));
    cmd.env_remove("NOCTTY_CONFIG").env_remove("NOCTTY_LOG");
    cmd
}

/// Start `cmd` in a new session, so it has no controlling terminal.
fn without_tty(cmd: &mut Command) -> &mut Command {
    // SAFETY: setsid is async-signal-safe.
    unsafe {
        cmd.pre_exec(|| {
            setsid()?;
            Ok(())
        })
    }
}

/// Start `cmd` as session leader with a new pty on stdin as its controlling
/// terminal. The returned pty must stay alive until the child is done.
fn with_tty(cmd: &mut Command) -> OpenptyResult {
    let pty = openpty(None, None).unwrap();
    let slave = pty.slave.try_clone().unwrap();
    cmd.stdin(Stdio::from(slave));
    // SAFETY: setsid and ioctl are async-signal-safe; fd 0 is the pty slave by
    // the time pre_exec closures run.
    unsafe {
        cmd.pre_exec(|| {
            setsid()?;
            if libc::ioctl(0, libc::TIOCSCTTY as _, 0) == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
    pty
}

fn run_with_tty(args: &[&str]) -> Output {
    let mut cmd = noctty();
    cmd.args(args);
    let _pty = with_tty(&mut cmd);
    cmd.output().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// --- CLI surface ---

#[test]
fn test_help_exits_zero_on_stdout() {
    let output = without_tty(noctty().arg("-h")).output().unwrap();

    assert_eq!(output.status.code(), Some(0));
    let out = stdout(&output);
    assert!(out.contains("Relinquish the controlling terminal. Optionally, run a command."));
    assert!(out.contains("Usage: noctty [-v] [-h] [-c PATH] [COMMAND]\n"));
    assert!(!out.contains("[COMMAND]..."));
    assert!(out.contains("(Built from "));
    assert!(stderr(&output).is_empty());
}

#[test]
fn test_help_short_circuits_other_arguments() {
    let output = without_tty(noctty().args(["-h", "one", "two"]))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert!(!stderr(&output).contains("/dev/tty"));
}

#[test]
fn test_version() {
    let output = noctty().arg("-V").output().unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).starts_with(concat!("noctty ", env!("CARGO_PKG_VERSION"))));
}

#[test]
fn test_two_commands_rejected_before_detaching() {
    let output = without_tty(noctty().args(["true", "false"]))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.starts_with("error: invalid arguments\n\n"));
    assert!(err.contains("Usage: noctty [-v] [-h] [-c PATH] [COMMAND]\n"));
    assert!(!err.contains("[COMMAND]..."));
    assert!(!err.contains("/dev/tty"));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_unknown_flag_exits_one() {
    let output = without_tty(noctty().arg("-x")).output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("Usage: noctty [-v] [-h] [-c PATH] [COMMAND]"));
    assert!(!err.contains("[COMMAND]..."));
    assert!(!err.contains("/dev/tty"));
}

#[test]
fn test_missing_config_file_is_an_invocation_error() {
    let output = without_tty(noctty().args(["-c", "/nonexistent-dir/noctty.toml", "true"]))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("failed to read config /nonexistent-dir/noctty.toml"));
    assert!(!err.contains("/dev/tty"));
}

// --- Detaching ---

#[test]
fn test_no_controlling_terminal_is_fatal() {
    let output = without_tty(noctty().arg("exit 0")).output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).starts_with("noctty: error opening /dev/tty:"));
}

#[test]
fn test_probe_sees_terminal_without_noctty() {
    let mut cmd = Command::new("/bin/sh");
    cmd.args(["-c", PROBE_TTY]);
    let _pty = with_tty(&mut cmd);

    assert_eq!(cmd.status().unwrap().code(), Some(10));
}

#[test]
fn test_command_runs_without_controlling_terminal() {
    let output = run_with_tty(&[PROBE_TTY]);
    assert_eq!(output.status.code(), Some(20), "stderr: {}", stderr(&output));
}

#[test]
fn test_sighup_back_to_default_for_command() {
    let output = run_with_tty(&[PROBE_SIGHUP]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
}

#[test]
fn test_quiet_run_prints_nothing() {
    let output = run_with_tty(&["true"]);

    assert_eq!(output.status.code(), Some(0));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_verbose_reports_terminal() {
    let output = run_with_tty(&["-v", "true"]);

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "Terminal is:");
    assert!(lines[1].starts_with("/dev/"), "unexpected tty line: {}", lines[1]);
    assert!(out.ends_with(SEPARATOR));
}

#[test]
fn test_verbose_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[terminal]\nverbose = true").unwrap();

    let mut cmd = noctty();
    cmd.env("NOCTTY_CONFIG", file.path()).arg("true");
    let _pty = with_tty(&mut cmd);
    let output = cmd.output().unwrap();

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert!(stdout(&output).starts_with("Terminal is:\n"));
}

// --- Exit status mapping ---

#[test]
fn test_exit_code_passed_through() {
    let output = run_with_tty(&["exit 7"]);
    assert_eq!(output.status.code(), Some(7));
}

#[test]
fn test_signal_death_maps_to_128_plus_signal() {
    let output = run_with_tty(&["kill -9 $$"]);
    assert_eq!(output.status.code(), Some(137));
}

#[test]
fn test_flags_after_command() {
    let output = run_with_tty(&["exit 3", "-v"]);

    assert_eq!(output.status.code(), Some(3));
    assert!(stdout(&output).starts_with("Terminal is:\n"));
}

#[test]
fn test_double_dash_allows_dash_command() {
    // `--bogus` reaches the shell as the command instead of failing flag parsing.
    let output = run_with_tty(&["--", "--bogus"]);
    assert!(!stderr(&output).contains("unexpected argument"));
    assert!(!stderr(&output).contains("invalid arguments"));
    assert_ne!(output.status.code(), Some(0));
}

// --- Blocking ---

fn process_state(pid: u32) -> Option<char> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    let after_comm = &stat[stat.rfind(')')? + 1..];
    after_comm.trim_start().chars().next()
}

#[test]
fn test_blocks_asleep_until_killed() {
    let mut cmd = noctty();
    cmd.stdout(Stdio::null()).stderr(Stdio::null());
    let _pty = with_tty(&mut cmd);
    let mut child = cmd.spawn().unwrap();
    let pid = child.id();

    let mut state = None;
    for _ in 0..50 {
        thread::sleep(Duration::from_millis(20));
        state = process_state(pid);
        if state == Some('S') {
            break;
        }
    }
    assert!(child.try_wait().unwrap().is_none(), "noctty exited on its own");
    assert_eq!(state, Some('S'));

    thread::sleep(Duration::from_millis(200));
    assert!(child.try_wait().unwrap().is_none(), "noctty exited on its own");

    kill(Pid::from_raw(pid as i32), Signal::SIGTERM).unwrap();
    let status = child.wait().unwrap();
    assert_eq!(status.signal(), Some(libc::SIGTERM));
}
