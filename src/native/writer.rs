//! Utilities for writing C++ source code (curly blocks + indentation)

use std::io::{Result, Write};

/// Simplified utility to facilitate writing pretty-printed C++ with block indentation around curly
/// braces.
pub struct CppWriter<W: Write> {
    /// How many blocks have been opened but not closed? This determines how indented new lines
    /// should be.
    open_blocks: usize,

    /// Is there a line already in progress?
    line_in_progress: bool,

    /// Inner writer
    inner: W,
}

/// Indentation aware writer
///
/// Automatically adds indentation after newlines in the text written. This does _not_ have special
/// handling for detecting curly braces (those will get written out literally).
impl<W: Write> Write for CppWriter<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        for line in buf.split_inclusive(|b| *b == b'\n') {
            if line != b"\n" {
                self.ensure_line_indented()?;
            }
            self.inner.write_all(line)?;
            self.line_in_progress = line.last().copied() != Some(b'\n');
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> CppWriter<W> {
    pub fn new(inner: W) -> CppWriter<W> {
        CppWriter {
            open_blocks: 0,
            line_in_progress: false,
            inner,
        }
    }

    /// If we are on a fresh line, make sure the indent is present
    fn ensure_line_indented(&mut self) -> Result<()> {
        if !self.line_in_progress {
            for _ in 0..self.open_blocks {
                self.inner.write_all(b"    ")?;
            }
            self.line_in_progress = true;
        }
        Ok(())
    }

    /// Start a new line
    pub fn newline(&mut self) -> Result<()> {
        self.inner.write_all(b"\n")?;
        self.line_in_progress = false;
        Ok(())
    }

    /// Open a new curly brace block
    ///
    /// If we were mid line, this tacks on a ` {` to the current line then opens a new line.
    pub fn open_curly_block(&mut self) -> Result<()> {
        if self.line_in_progress {
            write!(self, " ")?;
        }
        writeln!(self, "{{")?;
        self.open_blocks += 1;
        Ok(())
    }

    /// Close a curly brace block
    ///
    /// This will put the `}` on a fresh line, followed by `suffix` (eg. `;` after a `struct` or a
    /// comment after a `namespace`) and a new line.
    pub fn close_curly_block_with(&mut self, suffix: &str) -> Result<()> {
        assert!(self.open_blocks > 0, "no blocks to close");
        if self.line_in_progress {
            self.newline()?;
        }
        self.open_blocks -= 1;
        writeln!(self, "}}{}", suffix)?;
        Ok(())
    }

    pub fn close_curly_block(&mut self) -> Result<()> {
        self.close_curly_block_with("")
    }

    /// Write a `goto` label, outdented by one level from the surrounding statements
    pub fn label(&mut self, label: impl std::fmt::Display) -> Result<()> {
        if self.line_in_progress {
            self.newline()?;
        }
        for _ in 1..self.open_blocks {
            self.inner.write_all(b"    ")?;
        }
        writeln!(self.inner, "{}:", label)?;
        self.line_in_progress = false;
        Ok(())
    }

    /// Close the writer, handing back the inner writer
    pub fn close(mut self) -> Result<W> {
        assert_eq!(self.open_blocks, 0, "un-closed blocks remain");
        self.inner.flush()?;
        Ok(self.inner)
    }
}
