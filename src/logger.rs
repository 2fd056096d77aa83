//! One-line log sink for the binary.
//!
//! Records go to stderr by default, to a file with `--log`, or to
//! syslog with `--syslog`. The library only ever talks to the `log`
//! facade; this module is the single place that knows where lines end
//! up.

use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;

use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::config::LogParams;
use crate::datetime;
use crate::error::Error;

enum Sink {
    Stderr,
    File(Mutex<File>),
    Syslog,
}

struct Logger {
    level: LevelFilter,
    sink: Sink,
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        match &self.sink {
            Sink::Stderr => {
                let mut err = std::io::stderr().lock();
                let _ = writeln!(err, "{} {:5} {}", stamp(), record.level(), record.args());
            }
            Sink::File(file) => {
                if let Ok(mut file) = file.lock() {
                    let _ = writeln!(file, "{} {:5} {}", stamp(), record.level(), record.args());
                }
            }
            Sink::Syslog => {
                let priority = match record.level() {
                    Level::Error => libc::LOG_ERR,
                    Level::Warn => libc::LOG_WARNING,
                    Level::Info => libc::LOG_NOTICE,
                    Level::Debug | Level::Trace => libc::LOG_DEBUG,
                };
                if let Ok(msg) = CString::new(record.args().to_string()) {
                    unsafe {
                        libc::syslog(priority, b"%s\0".as_ptr().cast(), msg.as_ptr());
                    }
                }
            }
        }
    }

    fn flush(&self) {
        if let Sink::File(file) = &self.sink {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
    }
}

/// Timestamp for a log line, UTC with millisecond precision.
fn stamp() -> String {
    let c = datetime::parse(datetime::now_ms());
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        c.year, c.month, c.day, c.hour, c.min, c.sec, c.msec
    )
}

/// Install the process-wide logger. Call once, before any output.
pub fn init(params: &LogParams) -> Result<(), Error> {
    let sink = if params.syslog {
        unsafe {
            libc::openlog(b"longwave\0".as_ptr().cast(), libc::LOG_PID, libc::LOG_USER);
        }
        Sink::Syslog
    } else if let Some(path) = &params.file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::InvalidConfig(format!("{}: {e}", path.display())))?;
        Sink::File(Mutex::new(file))
    } else {
        Sink::Stderr
    };

    log::set_boxed_logger(Box::new(Logger {
        level: params.level,
        sink,
    }))
    .map_err(|e| Error::InvalidConfig(e.to_string()))?;
    log::set_max_level(params.level);
    Ok(())
}
