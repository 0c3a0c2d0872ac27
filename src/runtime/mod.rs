//! Runtime abstraction for system operations.
//!
//! This module provides a trait-based abstraction over the system calls the
//! upgrade flow depends on, enabling dependency injection and testability.
//!
//! # Structure
//!
//! - `env` - Home directory and privilege information
//! - `fs` - File system operations (read, scratch files, removal)
//! - `net` - Outbound interface discovery
//! - `process` - External command execution

mod env;
mod fs;
mod net;
mod process;

use anyhow::Result;
use async_trait::async_trait;
use std::io::Write;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// Captured result of an external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stdout followed by stderr, trimmed.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.trim_end().to_string();
        let err = self.stderr.trim();
        if !err.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(err);
        }
        out.trim().to_string()
    }
}

/// Writer for a scratch file. The file is deleted when the writer is
/// dropped, unless [`ScratchWriter::keep`] was called.
pub trait ScratchWriter: Write + Send {
    fn path(&self) -> &Path;

    /// Close the writer and leave the file on disk.
    fn keep(self: Box<Self>) -> Result<PathBuf>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Runtime: Send + Sync {
    // File System
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn exists(&self, path: &Path) -> bool;
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Create a uniquely named file in the system temp directory.
    fn create_scratch_file(&self, prefix: &str, suffix: &str) -> Result<Box<dyn ScratchWriter>>;

    // Directories
    fn home_dir(&self) -> Option<PathBuf>;
    fn current_dir(&self) -> Result<PathBuf>;

    // Privilege
    fn is_privileged(&self) -> bool;

    // Network
    /// The local address used for outbound traffic.
    fn outbound_ip(&self) -> Result<IpAddr>;

    // Processes
    /// Run a program to completion and capture its output.
    /// A non-zero exit is reported through [`CommandOutput::code`], not as an error.
    async fn run_command(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

pub struct RealRuntime;

#[async_trait]
impl Runtime for RealRuntime {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.remove_file_impl(path)
    }

    fn create_scratch_file(&self, prefix: &str, suffix: &str) -> Result<Box<dyn ScratchWriter>> {
        self.create_scratch_file_impl(prefix, suffix)
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home_dir_impl()
    }

    fn current_dir(&self) -> Result<PathBuf> {
        self.current_dir_impl()
    }

    fn is_privileged(&self) -> bool {
        self.is_privileged_impl()
    }

    fn outbound_ip(&self) -> Result<IpAddr> {
        self.outbound_ip_impl()
    }

    async fn run_command(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        self.run_command_impl(program, args).await
    }
}
