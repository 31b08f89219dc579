/*!
* Where raw I/Q bytes come from.
*
* The pipeline is strictly batch: a source is drained once, up front, and
* the buffer is decoded without further I/O. Anything that can hand over
* its bytes in one call can feed the demodulator.
*/
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A one-shot supplier of raw capture bytes
pub trait ByteSource {
    fn read_all(&mut self) -> io::Result<Vec<u8>>;
}

/// An RTL-SDR recording on disk: interleaved unsigned 8-bit I and Q
/// samples at 2 MSPS, no header.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        FileSource {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ByteSource for FileSource {
    fn read_all(&mut self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }
}

/// In-memory captures, mostly useful in tests
impl ByteSource for &[u8] {
    fn read_all(&mut self) -> io::Result<Vec<u8>> {
        Ok(self.to_vec())
    }
}
