//! Filesystem storage backend.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{FalxError, Result};
use crate::storage::traits::{Storage, StorageConfig, StorageInput, StorageOutput};

/// A storage backend rooted at a directory on disk.
///
/// Every stored file lives directly under the root directory. The directory is
/// created on first use.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    config: StorageConfig,
    closed: bool,
}

impl FileStorage {
    /// Create a file storage rooted at `path`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(path: P, config: StorageConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            std::fs::create_dir_all(&path).map_err(|e| {
                FalxError::storage(format!("failed to create directory {}: {e}", path.display()))
            })?;
        }

        if !path.is_dir() {
            return Err(FalxError::storage(format!(
                "storage path is not a directory: {}",
                path.display()
            )));
        }

        Ok(FileStorage {
            path,
            config,
            closed: false,
        })
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed {
            Err(FalxError::storage("storage is closed"))
        } else {
            Ok(())
        }
    }
}

impl Storage for FileStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        self.check_closed()?;

        let path = self.file_path(name);
        let file = File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FalxError::not_found(format!("file not found: {name}"))
            } else {
                FalxError::storage(format!("failed to open {name}: {e}"))
            }
        })?;

        Ok(Box::new(FileInput::new(file, path, self.config.buffer_size)?))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        self.check_closed()?;

        let path = self.file_path(name);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| FalxError::storage(format!("failed to create {name}: {e}")))?;

        Ok(Box::new(FileOutput::new(
            file,
            self.config.buffer_size,
            self.config.sync_writes,
        )))
    }

    fn file_exists(&self, name: &str) -> bool {
        if self.closed {
            return false;
        }
        self.file_path(name).is_file()
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.check_closed()?;

        match std::fs::remove_file(self.file_path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FalxError::storage(format!("failed to delete {name}: {e}"))),
        }
    }

    fn list_files(&self) -> Result<Vec<String>> {
        self.check_closed()?;

        let mut names = Vec::new();
        let entries = std::fs::read_dir(&self.path)
            .map_err(|e| FalxError::storage(format!("failed to list files: {e}")))?;

        for entry in entries {
            let entry =
                entry.map_err(|e| FalxError::storage(format!("failed to read entry: {e}")))?;
            if entry.path().is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        names.sort();
        Ok(names)
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        self.check_closed()?;

        let metadata = std::fs::metadata(self.file_path(name)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FalxError::not_found(format!("file not found: {name}"))
            } else {
                FalxError::storage(format!("failed to stat {name}: {e}"))
            }
        })?;

        Ok(metadata.len())
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        self.check_closed()?;

        std::fs::rename(self.file_path(old_name), self.file_path(new_name)).map_err(|e| {
            FalxError::storage(format!("failed to rename {old_name} to {new_name}: {e}"))
        })
    }

    fn sync(&self) -> Result<()> {
        self.check_closed()?;
        // Outputs sync their own file on close; nothing else is buffered here.
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// A buffered reader over a file on disk.
#[derive(Debug)]
pub struct FileInput {
    reader: BufReader<File>,
    path: PathBuf,
    buffer_size: usize,
    size: u64,
}

impl FileInput {
    fn new(file: File, path: PathBuf, buffer_size: usize) -> Result<Self> {
        let size = file
            .metadata()
            .map_err(|e| FalxError::storage(format!("failed to stat file: {e}")))?
            .len();

        Ok(FileInput {
            reader: BufReader::with_capacity(buffer_size, file),
            path,
            buffer_size,
            size,
        })
    }
}

impl Read for FileInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for FileInput {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.reader.seek(pos)
    }
}

impl StorageInput for FileInput {
    fn size(&self) -> Result<u64> {
        Ok(self.size)
    }

    fn clone_input(&self) -> Result<Box<dyn StorageInput>> {
        let file = File::open(&self.path)
            .map_err(|e| FalxError::storage(format!("failed to reopen file: {e}")))?;
        Ok(Box::new(FileInput::new(
            file,
            self.path.clone(),
            self.buffer_size,
        )?))
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A buffered writer over a file on disk.
#[derive(Debug)]
pub struct FileOutput {
    writer: BufWriter<File>,
    position: u64,
    sync_on_close: bool,
}

impl FileOutput {
    fn new(file: File, buffer_size: usize, sync_on_close: bool) -> Self {
        FileOutput {
            writer: BufWriter::with_capacity(buffer_size, file),
            position: 0,
            sync_on_close,
        }
    }
}

impl Write for FileOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.writer.write(buf)?;
        self.position += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl Seek for FileOutput {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let new_pos = self.writer.seek(pos)?;
        self.position = new_pos;
        Ok(new_pos)
    }
}

impl StorageOutput for FileOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| FalxError::storage(format!("failed to flush: {e}")))?;
        self.writer
            .get_ref()
            .sync_all()
            .map_err(|e| FalxError::storage(format!("failed to sync: {e}")))?;
        Ok(())
    }

    fn position(&self) -> Result<u64> {
        Ok(self.position)
    }

    fn close(&mut self) -> Result<()> {
        if self.sync_on_close {
            self.flush_and_sync()
        } else {
            self.writer
                .flush()
                .map_err(|e| FalxError::storage(format!("failed to flush: {e}")))
        }
    }
}
