use std::path::{Path, PathBuf};
use sysinfo::{ProcessRefreshKind, RefreshKind, System, UpdateKind};
use tracing::debug;

/// A running process whose executable name is on the allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetProcess {
    pub pid: u32,
    pub name: String,
    pub exe: Option<PathBuf>,
}

#[cfg_attr(test, mockall::automock)]
pub trait ProcessLocator {
    /// Scans the process table afresh. Nothing is cached between calls.
    fn find(&self, names: &[String]) -> Option<TargetProcess>;
}

/// Process table access through `sysinfo`.
#[derive(Default)]
pub struct SysinfoLocator;

impl SysinfoLocator {
    pub fn new() -> Self {
        SysinfoLocator
    }
}

impl ProcessLocator for SysinfoLocator {
    fn find(&self, names: &[String]) -> Option<TargetProcess> {
        let system = System::new_with_specifics(RefreshKind::new().with_processes(
            ProcessRefreshKind::new().with_exe(UpdateKind::OnlyIfNotSet),
        ));

        // Processes we may not inspect simply come back without an exe path.
        let found = match_target(
            system
                .processes()
                .iter()
                .map(|(pid, process)| (pid.as_u32(), process.name(), process.exe())),
            names,
        );
        debug!(?found, "Process scan finished");
        found
    }
}

/// Picks the lowest pid whose name matches one of `names`, ignoring case.
pub fn match_target<'a, I>(candidates: I, names: &[String]) -> Option<TargetProcess>
where
    I: IntoIterator<Item = (u32, &'a str, Option<&'a Path>)>,
{
    candidates
        .into_iter()
        .filter(|(_, name, _)| names.iter().any(|wanted| wanted.eq_ignore_ascii_case(name)))
        .min_by_key(|(pid, _, _)| *pid)
        .map(|(pid, name, exe)| TargetProcess {
            pid,
            name: name.to_string(),
            exe: exe.map(Path::to_path_buf),
        })
}
