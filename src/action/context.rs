//! FX-004: Execution context: ambient streams and the print callback.

use parking_lot::Mutex;
use std::io::{self, Read, Write};
use std::process::Stdio;
use std::sync::Arc;

/// Where ambient output goes when a plan has no override of its own.
#[derive(Clone, Default)]
pub enum Sink {
    /// The host process's own stream.
    #[default]
    Inherit,
    /// Discarded.
    Null,
    /// Collected in memory.
    Capture(Capture),
}

/// Shared in-memory buffer behind [`Sink::Capture`].
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    pub fn append(&self, bytes: &[u8]) {
        self.0.lock().extend_from_slice(bytes);
    }

    /// Drain `reader` into the buffer until EOF.
    pub fn copy_from(&self, reader: &mut impl Read) -> io::Result<u64> {
        let mut buf = [0u8; 8192];
        let mut total = 0u64;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => return Ok(total),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            self.append(&buf[..n]);
            total += n as u64;
        }
    }
}

impl Sink {
    /// A fresh capture sink and a handle for reading it back.
    pub fn capture() -> (Sink, Capture) {
        let cap = Capture::default();
        (Sink::Capture(cap.clone()), cap)
    }

    /// Child-process wiring for this sink. Capture sinks are piped and must
    /// be drained by the caller.
    pub fn stdio(&self) -> Stdio {
        match self {
            Sink::Inherit => Stdio::inherit(),
            Sink::Null => Stdio::null(),
            Sink::Capture(_) => Stdio::piped(),
        }
    }

    pub fn captured(&self) -> Option<&Capture> {
        match self {
            Sink::Capture(cap) => Some(cap),
            _ => None,
        }
    }
}

type Printer = Arc<dyn Fn(&str) + Send + Sync>;

/// Per-invocation bundle passed by reference into every plan run and call.
#[derive(Clone)]
pub struct ExecContext {
    name: String,
    stdout: Sink,
    stderr: Sink,
    printer: Option<Printer>,
}

impl ExecContext {
    pub fn new(name: impl Into<String>, stdout: Sink, stderr: Sink) -> Self {
        Self {
            name: name.into(),
            stdout,
            stderr,
            printer: None,
        }
    }

    /// Replace the print callback. Without one, prints go to the stdout sink.
    pub fn with_printer(mut self, printer: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.printer = Some(Arc::new(printer));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stdout(&self) -> &Sink {
        &self.stdout
    }

    pub fn stderr(&self) -> &Sink {
        &self.stderr
    }

    /// Emit one diagnostic line from script code.
    pub fn print(&self, msg: &str) {
        match &self.printer {
            Some(printer) => printer(msg),
            None => write_line(&self.stdout, msg),
        }
    }
}

/// Write `msg` plus a newline to a stdout-role sink.
pub fn write_line(sink: &Sink, msg: &str) {
    match sink {
        Sink::Inherit => {
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "{}", msg);
        }
        Sink::Null => {}
        Sink::Capture(cap) => {
            cap.append(msg.as_bytes());
            cap.append(b"\n");
        }
    }
}
