//! The file underneath the compressed stream.

use std::fs::File;
use std::io::{self, Write};
use std::os::unix::fs::MetadataExt;
use std::os::unix::io::IntoRawFd;

/// Device and inode of an open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    pub fn of(file: &File) -> io::Result<Self> {
        let metadata = file.metadata()?;
        Ok(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }
}

/// Log file that can be detached from its compressed stream.
///
/// After [`LogFile::detach`] every write is accepted and discarded. Dropping
/// a `GzEncoder<LogFile>` whose file was detached therefore finishes the
/// stream into nothing, which is how a forked child gets rid of the
/// compression state it inherited without emitting it a second time.
#[derive(Debug)]
pub struct LogFile {
    file: Option<File>,
    identity: Option<FileIdentity>,
}

impl LogFile {
    pub fn new(file: File) -> Self {
        let identity = FileIdentity::of(&file).ok();
        Self {
            file: Some(file),
            identity,
        }
    }

    /// Close the descriptor and discard all later output.
    pub fn detach(&mut self) {
        self.file = None;
    }

    /// Give up the descriptor without closing it and discard all later
    /// output. Its number may already belong to the host.
    pub fn release(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.into_raw_fd();
        }
    }

    /// Whether the descriptor still refers to the file it was opened on.
    ///
    /// A host that closes every descriptor and opens something else can
    /// leave our number pointing at one of its own files.
    pub fn is_intact(&self) -> bool {
        match (&self.file, self.identity) {
            (Some(file), Some(identity)) => {
                FileIdentity::of(file).is_ok_and(|current| current == identity)
            }
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Continue on `file`, a new descriptor for the same file. The old
    /// descriptor is released, not closed.
    pub fn reattach(&mut self, file: File) -> io::Result<()> {
        let identity = FileIdentity::of(&file)?;
        if self.identity.is_some_and(|expected| expected != identity) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "log file was replaced",
            ));
        }
        self.release();
        self.file = Some(file);
        self.identity = Some(identity);
        Ok(())
    }
}

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.file {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.file {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}
