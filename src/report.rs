/// Verbose report of the terminal we are about to leave.
///
/// Prints the pathname of the terminal on stdin so it can be handed to
/// whatever takes the terminal over next (e.g. `set inferior-tty` in GDB).
use std::io::{self, Write};
use std::process::{Command, Stdio};

pub const HEADER: &str = "Terminal is:\n";
pub const SEPARATOR: &str = "------------------------------------------------------------\n\n";

/// Print the header, the terminal pathname and the separator to `out`.
///
/// Writes nothing when `verbose` is false. `report_command` (normally `tty`)
/// is only run when verbose; its failure means the environment is broken
/// and aborts.
pub fn print_tty(verbose: bool, report_command: &str, out: &mut impl Write) -> io::Result<()> {
    if !verbose {
        return Ok(());
    }
    let path = terminal_path(report_command);
    write_report(out, &path)
}

/// Write a report for an already known terminal pathname.
pub fn write_report(out: &mut impl Write, path: &str) -> io::Result<()> {
    out.write_all(HEADER.as_bytes())?;
    out.flush()?;
    out.write_all(path.as_bytes())?;
    if !path.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    out.write_all(SEPARATOR.as_bytes())?;
    out.flush()
}

fn terminal_path(report_command: &str) -> String {
    let output = Command::new(report_command)
        .stdin(Stdio::inherit())
        .stderr(Stdio::inherit())
        .output();

    let output = match output {
        Ok(output) => output,
        Err(e) => panic!("failed to run `{report_command}`: {e}"),
    };
    assert!(
        output.status.success(),
        "`{report_command}` exited with {}",
        output.status
    );

    let path = String::from_utf8_lossy(&output.stdout).into_owned();
    tracing::debug!(path = %path.trim_end(), "terminal reported");
    path
}
