//! Audio backend adapters.
//!
//! A backend owns the playback stream and drives the station renderer
//! from its callback thread; the main thread sits in [`Backend::run`]
//! until a termination signal arrives or the timeout expires. Backends
//! are probed in order (pipewire, pulse, raw ALSA) and the first one
//! that opens wins; `--method` pins a single route.

mod cpal;

pub use self::cpal::CpalBackend;

use std::fmt;
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::config::{AudioParams, Method};
use crate::error::Error;
use crate::station::StationRenderer;

/// Why the audio loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// SIGINT or SIGTERM was delivered.
    Interrupted,
    /// The configured run time elapsed.
    Timeout,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExitReason::Interrupted => "interrupted",
            ExitReason::Timeout => "timeout",
        })
    }
}

pub trait Backend {
    fn name(&self) -> &'static str;

    /// Open the playback route, negotiate stream parameters, and run
    /// the audio loop until `stop` fires or `timeout` expires.
    ///
    /// The renderer is told the negotiated rate before the first
    /// callback runs.
    fn run(
        &self,
        audio: &AudioParams,
        renderer: StationRenderer,
        stop: &Receiver<()>,
        timeout: Option<Duration>,
    ) -> Result<ExitReason, Error>;
}

/// Backends to try, most preferred first.
pub fn probe_order(audio: &AudioParams) -> Vec<Box<dyn Backend>> {
    match audio.method {
        Some(Method::PipeWire) => vec![CpalBackend::pipewire()],
        Some(Method::Pulse) => vec![CpalBackend::pulse()],
        Some(Method::Alsa) => vec![CpalBackend::alsa(&audio.device)],
        None => vec![
            CpalBackend::pipewire(),
            CpalBackend::pulse(),
            CpalBackend::alsa(&audio.device),
        ],
    }
}
