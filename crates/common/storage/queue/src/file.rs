// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Positioned access to a queue's backing file.
//!
//! Engines own their cursors as plain offsets and address the file through
//! [`DataFile::read_at`] / [`DataFile::write_at`], so the OS handle position is
//! never part of the queue state.

use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use snafu::ResultExt;

use crate::{FlushMode, Result, error::FileIoSnafu};

/// A backing file opened for read/write.
pub struct DataFile {
    file: File,
    path: PathBuf,
}

impl DataFile {
    /// Open the file at `path`, creating it (and its parent directories) if
    /// it does not exist. Existing contents are kept.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context(FileIoSnafu { path: parent })?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .context(FileIoSnafu { path: &path })?;

        Ok(Self { file, path })
    }

    /// Open an existing file read-only. `Ok(None)` when there is no file.
    pub fn open_existing<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref().to_path_buf();
        match File::open(&path) {
            Ok(file) => Ok(Some(Self { file, path })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context(FileIoSnafu { path }),
        }
    }

    /// Current physical length of the file.
    pub fn len(&self) -> Result<u64> { Ok(self.file.metadata()?.len()) }

    /// Read exactly `buf.len()` bytes starting at `offset`.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    /// Write all of `data` starting at `offset`.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }

    /// Cut the file to `len` bytes.
    pub fn truncate(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        Ok(())
    }

    /// Flush written data according to `mode` after a mutation.
    ///
    /// `OnClose` defers durability to the checkpoint written by `close`.
    pub fn flush(&self, mode: FlushMode) -> Result<()> {
        match mode {
            FlushMode::OnClose => Ok(()),
            FlushMode::EveryWrite => Ok(self.file.sync_data()?),
        }
    }

    /// Sync data and metadata to disk.
    pub fn sync(&self) -> Result<()> { Ok(self.file.sync_all()?) }

    /// Get file path.
    pub fn path(&self) -> &Path { &self.path }

    /// Drop the handle and delete the file. A file that is already gone is
    /// not an error.
    pub fn remove(self) -> Result<()> {
        let Self { file, path } = self;
        drop(file);
        match std::fs::remove_file(&path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                Err(e).context(FileIoSnafu { path })
            }
            _ => Ok(()),
        }
    }
}
