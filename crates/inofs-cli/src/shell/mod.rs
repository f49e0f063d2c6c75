//! Line-oriented command loop over a mounted volume.
//!
//! One command per line. User-facing engine errors are printed as
//! `<command>: <error>` and the loop continues; corruption and device
//! failures end the session with an error. End of input behaves like `exit`.
//! Input is read as bytes: a command line that is not UTF-8 is a usage error,
//! while `cat` content is stored as given.

mod command;
mod input;
mod session;


use std::io::{self, BufRead, Write};

use anyhow::Context;
use inofs_rs::{BLOCK_SIZE, BlockDevice, Fd, FsError, NodeKind, OpenMode, VolumeFs};
use thiserror::Error;
use tracing::{debug, info};

use crate::cli::{FlushMode, FsckMode, ShellConfig};

use command::Command;
use input::Lines;
use session::Session;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Fs(#[from] FsError),

    #[error("cannot remove the current directory")]
    BusyDirectory,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CommandError {
    fn is_fatal(&self) -> bool {
        match self {
            Self::Fs(err) => err.is_fatal(),
            Self::BusyDirectory => false,
            Self::Io(_) => true,
        }
    }
}

pub struct Shell<D: BlockDevice> {
    fs: VolumeFs<D>,
    session: Session,
    config: ShellConfig,
}

impl<D: BlockDevice> Shell<D> {
    pub fn new(fs: VolumeFs<D>, config: ShellConfig) -> Self {
        Self {
            fs,
            session: Session::default(),
            config,
        }
    }

    #[cfg(test)]
    pub fn into_volume(self) -> VolumeFs<D> {
        self.fs
    }

    /// Runs commands from `input` until `exit` or end of input, then flushes
    /// the volume.
    ///
    /// # Errors
    /// Fatal engine errors, failures to read `input` or to write `out`/`err`,
    /// and flush failures.
    pub fn run<R: BufRead, O: Write, E: Write>(
        &mut self,
        input: R,
        out: &mut O,
        err: &mut E,
    ) -> anyhow::Result<()> {
        let mut lines = Lines::new(input);
        loop {
            if self.config.interactive {
                write!(out, "{} $ ", self.session.path)?;
                out.flush()?;
            }
            let Some(line) = lines.next_line().context("failed to read command")? else {
                break;
            };

            let command = match Command::parse_bytes(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(usage) => {
                    writeln!(err, "{usage}")?;
                    continue;
                }
            };
            if command == Command::Exit {
                break;
            }

            debug!(?command, cwd = self.session.cwd, "dispatch");
            match self.execute(&command, &mut lines, out) {
                Ok(()) => {}
                Err(failure) if failure.is_fatal() => {
                    return Err(failure).with_context(|| format!("{} failed", command.name()));
                }
                Err(failure) => writeln!(err, "{}: {failure}", command.name())?,
            }

            if self.config.flush == FlushMode::EachCommand {
                self.fs.flush().context("failed to flush volume")?;
            }
        }

        self.fs.flush().context("failed to flush volume")?;
        info!(
            free_blocks = self.fs.free_blocks(),
            free_inodes = self.fs.free_inodes(),
            "session closed"
        );
        Ok(())
    }

    fn execute<R, O>(
        &mut self,
        command: &Command,
        lines: &mut Lines<R>,
        out: &mut O,
    ) -> Result<(), CommandError>
    where
        R: BufRead,
        O: Write,
    {
        let cwd = self.session.cwd;
        match command {
            Command::Ls => {
                for entry in self.fs.list(cwd)? {
                    let slash = if entry.kind == NodeKind::Dir { "/" } else { "" };
                    writeln!(out, "{}{slash}", entry.name)?;
                }
            }
            Command::Cd(path) => self.session.change_dir(&self.fs, path)?,
            Command::Mkdir(path) => {
                self.fs.mkdir(cwd, path)?;
            }
            Command::Rmdir(path) => self.remove_dir(path)?,
            Command::Cat(path) => self.collect_into(path, lines)?,
            Command::More(path) => self.print_file(path, out)?,
            Command::Stat(path) => {
                let stat = self.fs.stat(cwd, path)?;
                match stat.kind {
                    NodeKind::Dir => writeln!(out, "DIRECTORY")?,
                    NodeKind::File => {
                        writeln!(out, "FILE links={} size={}", stat.links, stat.size)?;
                    }
                }
            }
            Command::Ln { target, name } => self.fs.link_at(cwd, target, name)?,
            Command::Rm(path) => self.fs.unlink_at(cwd, path)?,
            Command::Fsck => self.check(out)?,
            Command::Pwd => writeln!(out, "{}", self.session.path)?,
            Command::Exit => {}
        }
        Ok(())
    }

    fn remove_dir(&mut self, path: &str) -> Result<(), CommandError> {
        let (parent, name) = self.fs.resolve_parent(self.session.cwd, path)?;
        let is_cwd = self.fs.lookup(parent, &name).ok() == Some(self.session.cwd);
        if is_cwd && name != "." && name != ".." {
            return Err(CommandError::BusyDirectory);
        }
        self.fs.rmdir(parent, &name)?;
        Ok(())
    }

    /// Appends each following line plus "\n" until a lone ".". Input is
    /// consumed only if the file could be opened; the first append failure
    /// is reported once the terminator is reached.
    fn collect_into<R: BufRead>(
        &mut self,
        path: &str,
        lines: &mut Lines<R>,
    ) -> Result<(), CommandError> {
        let mode = OpenMode::WRITE.create().append();
        let fd = self
            .fs
            .open(&mut self.session.files, self.session.cwd, path, mode)?;
        let collected = self.append_lines(fd, lines);
        self.fs.close(&mut self.session.files, fd)?;
        collected
    }

    fn append_lines<R: BufRead>(
        &mut self,
        fd: Fd,
        lines: &mut Lines<R>,
    ) -> Result<(), CommandError> {
        let mut failure = None;
        while let Some(mut line) = lines.next_line()? {
            if line == b"." {
                break;
            }
            if failure.is_some() {
                continue;
            }
            line.push(b'\n');
            match self.fs.write(&mut self.session.files, fd, &line) {
                Ok(_) => {}
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => failure = Some(err),
            }
        }
        failure.map_or(Ok(()), |err| Err(err.into()))
    }

    fn print_file<O: Write>(&mut self, path: &str, out: &mut O) -> Result<(), CommandError> {
        let opened = self
            .fs
            .open(&mut self.session.files, self.session.cwd, path, OpenMode::READ);
        let fd = match opened {
            Ok(fd) => fd,
            // Directories have no printable content.
            Err(FsError::NotAFile) => return Ok(()),
            Err(failure) => return Err(failure.into()),
        };
        let printed = self.copy_out(fd, out);
        self.fs.close(&mut self.session.files, fd)?;
        printed
    }

    fn copy_out<O: Write>(&mut self, fd: Fd, out: &mut O) -> Result<(), CommandError> {
        loop {
            let chunk = self
                .fs
                .read(&mut self.session.files, fd, BLOCK_SIZE as u64)?;
            if chunk.is_empty() {
                return Ok(());
            }
            out.write_all(&chunk)?;
        }
    }

    fn check<O: Write>(&self, out: &mut O) -> Result<(), CommandError> {
        if self.config.fsck == FsckMode::Off {
            writeln!(out, "fsck: disabled")?;
            return Ok(());
        }
        let report = self.fs.fsck()?;
        for problem in &report.problems {
            writeln!(out, "fsck: {problem}")?;
        }
        if report.is_clean() {
            writeln!(
                out,
                "fsck: clean ({} inodes, {} blocks in use)",
                report.inodes_checked, report.blocks_in_use
            )?;
        } else {
            writeln!(out, "fsck: {} problem(s) found", report.problems.len())?;
        }
        Ok(())
    }
}
