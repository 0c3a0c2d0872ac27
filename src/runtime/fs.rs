//! File system operations (read, scratch files, removal).

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::{RealRuntime, ScratchWriter};

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn read_to_string_impl(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).context("Failed to read file to string")
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn exists_impl(&self, path: &Path) -> bool {
        path.exists()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn remove_file_impl(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).context("Failed to remove file")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn create_scratch_file_impl(
        &self,
        prefix: &str,
        suffix: &str,
    ) -> Result<Box<dyn ScratchWriter>> {
        let file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile()
            .context("Failed to create scratch file")?;
        Ok(Box::new(file))
    }
}

impl ScratchWriter for NamedTempFile {
    fn path(&self) -> &Path {
        NamedTempFile::path(self)
    }

    fn keep(self: Box<Self>) -> Result<PathBuf> {
        let (_, path) = NamedTempFile::keep(*self).context("Failed to persist scratch file")?;
        Ok(path)
    }
}
