//! Plain-text book writer
//!
//! Layout of a downloaded book:
//!
//! ```text
//! <title>
//! <writer>
//! --------------------
//!
//! <chapter title>
//! --------------------
//! <chapter content>
//!
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Rule written under the book header and under each chapter title
pub const SEPARATOR: &str = "--------------------";

/// Content written in place of a chapter that could not be fetched
pub const FAILED_CHAPTER: &str = "error";

/// Streams a book to disk chapter by chapter
pub struct TextBookWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl TextBookWriter {
    /// Creates (or truncates) the file and writes the book header
    pub fn create(path: &Path, title: &str, writer: &str) -> io::Result<Self> {
        let mut out = BufWriter::new(File::create(path)?);
        write!(out, "{}\n{}\n{}\n\n", title, writer, SEPARATOR)?;

        Ok(Self {
            path: path.to_path_buf(),
            out,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_chapter(&mut self, title: &str, content: &str) -> io::Result<()> {
        write!(self.out, "{}\n{}\n{}\n\n", title, SEPARATOR, content)
    }

    /// Flushes buffered output and closes the file
    pub fn finish(mut self) -> io::Result<PathBuf> {
        self.out.flush()?;
        Ok(self.path)
    }
}
