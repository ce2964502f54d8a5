//! Administrator rights: detect them, and relaunch elevated when missing.
//!
//! Relaunching is split in two. `plan_relaunch` works out the exact command
//! from a captured `Invocation` and touches nothing; `resolve` asks the user and
//! hands the plan to the OS. `ensure_elevated` turns the outcome into a process
//! exit.

use crate::catch::{Catch, LogLevels};
use crate::config::ElevationConfig;
use crate::error::{JamstarError, Result};
use crate::platform::PrivilegeHost;
use colored::Colorize;
use std::ffi::{OsStr, OsString};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Built and run from a source checkout through cargo.
    SourceCheckout,
    /// A binary resolvable on disk.
    InstalledPackage,
}

/// How the current process was started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Arguments after the program name, exactly as the OS passed them.
    pub args: Vec<OsString>,
    /// Crate directory when started by `cargo run`.
    pub manifest_dir: Option<PathBuf>,
    /// The cargo binary that started us, if any.
    pub cargo: Option<PathBuf>,
    pub installed_binary: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn capture(package: &str) -> Self {
        Self {
            args: std::env::args_os().skip(1).collect(),
            manifest_dir: std::env::var_os("CARGO_MANIFEST_DIR").map(PathBuf::from),
            cargo: std::env::var_os("CARGO").map(PathBuf::from),
            installed_binary: locate_installed(package),
            working_dir: std::env::current_dir().ok(),
        }
    }
}

/// The running executable if it is on disk, otherwise `package` on `PATH`.
fn locate_installed(package: &str) -> Option<PathBuf> {
    Catch::new("locate_installed")
        .field("package", package)
        .level(LogLevels::Warning)
        .message("Failed to resolve the running executable")
        .default(None::<PathBuf>)
        .call(|| std::env::current_exe().map(Some))
        .ok()
        .flatten()
        .filter(|exe| exe.is_file())
        .or_else(|| find_on_path(package))
}

fn find_on_path(package: &str) -> Option<PathBuf> {
    let file_name = format!("{}{}", package, std::env::consts::EXE_SUFFIX);
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.is_file())
}

/// A fully resolved command line for the elevated relaunch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaunchCommand {
    pub mode: ExecutionMode,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_dir: Option<PathBuf>,
}

impl RelaunchCommand {
    /// Arguments as one UTF-16 Windows command line, without terminator.
    pub fn parameters(&self) -> Vec<u16> {
        let mut line = Vec::new();
        for (index, arg) in self.args.iter().enumerate() {
            if index > 0 {
                line.push(SPACE);
            }
            line.extend(quote_argument(&wide(arg)));
        }
        line
    }

    /// `parameters` for log output. Unpaired surrogates become U+FFFD.
    pub fn display_parameters(&self) -> String {
        String::from_utf16_lossy(&self.parameters())
    }
}

const SPACE: u16 = b' ' as u16;
const TAB: u16 = b'\t' as u16;
const NEWLINE: u16 = b'\n' as u16;
const VERTICAL_TAB: u16 = 0x0b;
const QUOTE: u16 = b'"' as u16;
const BACKSLASH: u16 = b'\\' as u16;

#[cfg(windows)]
fn wide(arg: &OsStr) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    arg.encode_wide().collect()
}

// Only Windows consumes the command line; elsewhere it is informational.
#[cfg(not(windows))]
fn wide(arg: &OsStr) -> Vec<u16> {
    arg.to_string_lossy().encode_utf16().collect()
}

/// Quotes one UTF-16 argument the way `CommandLineToArgvW` splits it back.
pub fn quote_argument(arg: &[u16]) -> Vec<u16> {
    let needs_quotes = arg.is_empty()
        || arg
            .iter()
            .any(|&unit| matches!(unit, SPACE | TAB | NEWLINE | VERTICAL_TAB | QUOTE));
    if !needs_quotes {
        return arg.to_vec();
    }

    let mut quoted = Vec::with_capacity(arg.len() + 2);
    quoted.push(QUOTE);
    let mut backslashes = 0;
    for &unit in arg {
        match unit {
            BACKSLASH => backslashes += 1,
            QUOTE => {
                quoted.extend(std::iter::repeat(BACKSLASH).take(backslashes * 2 + 1));
                quoted.push(QUOTE);
                backslashes = 0;
            }
            _ => {
                quoted.extend(std::iter::repeat(BACKSLASH).take(backslashes));
                quoted.push(unit);
                backslashes = 0;
            }
        }
    }
    quoted.extend(std::iter::repeat(BACKSLASH).take(backslashes * 2));
    quoted.push(QUOTE);
    quoted
}

pub fn execution_mode(
    invocation: &Invocation,
    package: &str,
    force_installed: bool,
) -> Result<ExecutionMode> {
    if invocation.manifest_dir.is_some() && !force_installed {
        Ok(ExecutionMode::SourceCheckout)
    } else if invocation.installed_binary.is_some() {
        Ok(ExecutionMode::InstalledPackage)
    } else {
        Err(JamstarError::AdminRights(format!(
            "Package '{}' is not installed.",
            package
        )))
    }
}

/// Builds the command that reruns this invocation with identical arguments.
pub fn plan_relaunch(
    invocation: &Invocation,
    package: &str,
    force_installed: bool,
) -> Result<RelaunchCommand> {
    let mode = execution_mode(invocation, package, force_installed)?;

    let planned = (mode, &invocation.manifest_dir, &invocation.installed_binary);
    let (program, mut args) = match planned {
        (ExecutionMode::SourceCheckout, Some(dir), _) => {
            let cargo = invocation
                .cargo
                .clone()
                .unwrap_or_else(|| PathBuf::from("cargo"));
            let args: Vec<OsString> = vec![
                "run".into(),
                "--quiet".into(),
                "--manifest-path".into(),
                manifest_path(dir).into_os_string(),
                "--bin".into(),
                package.into(),
                "--".into(),
            ];
            (cargo, args)
        }
        (ExecutionMode::InstalledPackage, _, Some(binary)) => (binary.clone(), Vec::new()),
        (mode, _, _) => {
            return Err(JamstarError::AdminRights(format!(
                "Unsupported execution mode: {:?}",
                mode
            )))
        }
    };
    args.extend(invocation.args.iter().cloned());

    Ok(RelaunchCommand {
        mode,
        program,
        args,
        working_dir: invocation.working_dir.clone(),
    })
}

/// Asks on `output` whether to relaunch elevated; only `y` accepts.
pub fn request_elevation<R, W>(input: &mut R, output: &mut W) -> io::Result<bool>
where
    R: BufRead,
    W: Write,
{
    writeln!(
        output,
        "{}",
        "This application needs to run with elevated rights.".yellow()
    )?;
    write!(output, "Request for elevated rights? [y/(n)]: ")?;
    output.flush()?;

    let mut response = String::new();
    input.read_line(&mut response)?;
    Ok(response.trim().eq_ignore_ascii_case("y"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElevationOutcome {
    AlreadyElevated,
    /// An elevated copy was started; this process should exit.
    Relaunched(RelaunchCommand),
    Declined,
}

pub fn resolve<H, R, W>(
    host: &H,
    settings: &ElevationConfig,
    invocation: impl FnOnce() -> Invocation,
    input: &mut R,
    output: &mut W,
) -> Result<ElevationOutcome>
where
    H: PrivilegeHost + ?Sized,
    R: BufRead,
    W: Write,
{
    let elevated = Catch::new("is_elevated")
        .level(LogLevels::Warning)
        .message("Failed to check admin rights")
        .default(false)
        .call(|| host.is_elevated())
        .unwrap_or(false);
    if elevated {
        return Ok(ElevationOutcome::AlreadyElevated);
    }

    if !request_elevation(input, output)? {
        return Ok(ElevationOutcome::Declined);
    }

    info!("Requesting administrator privileges...");
    let command = plan_relaunch(&invocation(), &settings.package, settings.force_installed)?;
    info!(
        mode = ?command.mode,
        program = %command.program.display(),
        parameters = %command.display_parameters(),
        "Relaunch planned"
    );
    host.launch_elevated(&command).map_err(|e| {
        let detail = match e {
            JamstarError::AdminRights(detail) => detail,
            other => other.to_string(),
        };
        JamstarError::AdminRights(format!("Failed to restart with admin rights: {}", detail))
    })?;

    Ok(ElevationOutcome::Relaunched(command))
}

/// Returns only when the process already runs elevated. Otherwise the process
/// exits with code 0, either after relaunching or because the user declined.
pub fn ensure_elevated<H>(host: &H, settings: &ElevationConfig) -> Result<()>
where
    H: PrivilegeHost + ?Sized,
{
    let stdin = io::stdin();
    let outcome = resolve(
        host,
        settings,
        || Invocation::capture(&settings.package),
        &mut stdin.lock(),
        &mut io::stdout(),
    )?;

    match outcome {
        ElevationOutcome::AlreadyElevated => Ok(()),
        ElevationOutcome::Relaunched(command) => {
            info!(mode = ?command.mode, "Elevated instance started, exiting");
            std::process::exit(0);
        }
        ElevationOutcome::Declined => {
            println!("{}", "Operation cancelled. Exiting...".yellow());
            std::process::exit(0);
        }
    }
}

fn manifest_path(dir: &Path) -> PathBuf {
    dir.join("Cargo.toml")
}
