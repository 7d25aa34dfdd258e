//! Launching worker processes.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use crate::item_db::ItemId;

/// Starts the OS process that works on one item.
pub trait WorkerLauncher: Send + Sync {
    fn launch(&self, item_id: ItemId) -> io::Result<Child>;
}

/// Runs `<program> <args...> <item id>` detached in its own process group with null stdio.
#[derive(Debug, Clone)]
pub struct ExeLauncher {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ExeLauncher {
    pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `<program> worker <id>`; the program defaults to the running executable.
    pub fn worker(program: Option<PathBuf>) -> io::Result<Self> {
        let program = match program {
            Some(p) => p,
            None => std::env::current_exe()?,
        };
        Ok(Self::new(program, vec!["worker".into()]))
    }
}

impl WorkerLauncher for ExeLauncher {
    fn launch(&self, item_id: ItemId) -> io::Result<Child> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(item_id.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        let child = cmd.spawn()?;
        tracing::debug!(
            item_id,
            pid = child.id(),
            program = %self.program.display(),
            "worker launched"
        );
        Ok(child)
    }
}
