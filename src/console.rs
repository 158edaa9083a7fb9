use std::fmt;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

enum Target {
    Stdout,
    Stderr,
    Writer(Mutex<Box<dyn Write + Send>>),
}

/// Console sink: writes whole rendered lines to a terminal stream.
///
/// Standard streams are locked per line by the standard library; a custom
/// writer is guarded by its own mutex.
pub struct Console {
    target: Target,
    colored: bool,
}

impl Console {
    /// Write to standard output.
    pub fn stdout(colored: bool) -> Self {
        Self {
            target: Target::Stdout,
            colored,
        }
    }

    /// Write to standard error.
    pub fn stderr(colored: bool) -> Self {
        Self {
            target: Target::Stderr,
            colored,
        }
    }

    /// Write to an arbitrary writer, e.g. an in-memory buffer.
    pub fn from_writer<W: Write + Send + 'static>(writer: W, colored: bool) -> Self {
        Self {
            target: Target::Writer(Mutex::new(Box::new(writer))),
            colored,
        }
    }

    /// Whether level names should be colorized before writing.
    pub fn colored(&self) -> bool {
        self.colored
    }

    /// Write `line` followed by a newline as a single write, then flush.
    pub fn write_line(&self, line: &str) -> io::Result<()> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        match &self.target {
            Target::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(buf.as_bytes())?;
                out.flush()
            }
            Target::Stderr => {
                let mut out = io::stderr().lock();
                out.write_all(buf.as_bytes())?;
                out.flush()
            }
            Target::Writer(writer) => {
                let mut out = writer.lock().unwrap_or_else(PoisonError::into_inner);
                out.write_all(buf.as_bytes())?;
                out.flush()
            }
        }
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::stdout(true)
    }
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = match self.target {
            Target::Stdout => "stdout",
            Target::Stderr => "stderr",
            Target::Writer(_) => "writer",
        };
        f.debug_struct("Console")
            .field("target", &target)
            .field("colored", &self.colored)
            .finish()
    }
}
