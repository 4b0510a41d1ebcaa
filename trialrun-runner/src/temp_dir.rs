// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scoped temporary directories for unit executions.
//!
//! A unit that requests a directory gets a fresh one for every concrete execution. The directory
//! is acquired before the `before_each` hooks run and released after the `after_each` hooks.

use crate::{errors::ScopedDirError, list::UnitId};
use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use debug_ignore::DebugIgnore;
use std::{fmt, io};
use tracing::debug;

/// Describes the execution a directory is being acquired for.
#[derive(Clone, Copy, Debug)]
pub struct ScopedDirRequest<'a> {
    /// The unit being executed.
    pub id: &'a UnitId,

    /// The display name of the execution.
    pub display_name: &'a str,
}

/// Creates scoped directories.
pub trait ScopedDirProvider: fmt::Debug + Send + Sync {
    /// Acquires a new, empty directory.
    fn acquire(&self, request: &ScopedDirRequest<'_>) -> Result<ScopedDir, ScopedDirError>;
}

type ReleaseFn = Box<dyn FnOnce(&Utf8Path) -> io::Result<()> + Send>;

/// A directory that exists for the duration of one execution.
///
/// Call [`release`](Self::release) to remove it and observe errors. If the directory is
/// dropped instead, it is removed and errors are ignored.
#[derive(Debug)]
pub struct ScopedDir {
    path: Utf8PathBuf,
    release: Option<DebugIgnore<ReleaseFn>>,
}

impl ScopedDir {
    /// Creates a scoped directory with a custom release function.
    pub fn new<F>(path: impl Into<Utf8PathBuf>, release: F) -> Self
    where
        F: FnOnce(&Utf8Path) -> io::Result<()> + Send + 'static,
    {
        Self {
            path: path.into(),
            release: Some(DebugIgnore(Box::new(release))),
        }
    }

    /// Creates a scoped directory backed by a [`Utf8TempDir`].
    pub fn from_temp_dir(dir: Utf8TempDir) -> Self {
        let path = dir.path().to_owned();
        Self::new(path, move |_| dir.close())
    }

    /// The path to the directory.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Removes the directory and everything in it.
    pub fn release(mut self) -> Result<(), ScopedDirError> {
        match self.release.take() {
            Some(release) => {
                debug!(path = %self.path, "releasing scoped directory");
                (release.0)(&self.path).map_err(|error| ScopedDirError::Release {
                    path: self.path.clone(),
                    error,
                })
            }
            None => Ok(()),
        }
    }
}

impl Drop for ScopedDir {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            _ = (release.0)(&self.path);
        }
    }
}

/// The default provider: creates directories with [`camino_tempfile`], either in the system
/// temporary directory or under a configured base.
#[derive(Clone, Debug, Default)]
pub struct TempDirProvider {
    base: Option<Utf8PathBuf>,
}

impl TempDirProvider {
    /// Creates a provider that uses the system temporary directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider that creates directories under `base`.
    pub fn with_base(base: impl Into<Utf8PathBuf>) -> Self {
        Self {
            base: Some(base.into()),
        }
    }

    /// The configured base directory, if any.
    pub fn base(&self) -> Option<&Utf8Path> {
        self.base.as_deref()
    }
}

impl ScopedDirProvider for TempDirProvider {
    fn acquire(&self, request: &ScopedDirRequest<'_>) -> Result<ScopedDir, ScopedDirError> {
        let mut builder = camino_tempfile::Builder::new();
        builder.prefix("trialrun-");
        let dir = match &self.base {
            Some(base) => builder.tempdir_in(base),
            None => builder.tempdir(),
        }
        .map_err(|error| ScopedDirError::Create {
            base: self.base.clone(),
            error,
        })?;

        debug!(id = %request.id, path = %dir.path(), "acquired scoped directory");
        Ok(ScopedDir::from_temp_dir(dir))
    }
}
