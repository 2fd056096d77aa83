//! cpal-based playback routes.
//!
//! PipeWire and PulseAudio are reached through their ALSA plugin PCMs
//! (`pipewire` and `pulse`), the raw ALSA route through whatever
//! device name was configured. The stream is opened raw so this
//! crate's own packer produces the final byte layout; formats cpal
//! cannot express (big-endian on a little-endian host, 24-in-32
//! containers) are downgraded to the nearest representable one.

use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Data, Device, OutputCallbackInfo, SampleRate, StreamConfig};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{info, warn};

use super::{Backend, ExitReason};
use crate::config::{AudioParams, Method};
use crate::error::Error;
use crate::sample::{self, Encoding, Endian, SampleFormat};
use crate::station::StationRenderer;

pub struct CpalBackend {
    method: Method,
    device: String,
}

impl CpalBackend {
    pub fn pipewire() -> Box<dyn Backend> {
        Box::new(Self {
            method: Method::PipeWire,
            device: "pipewire".into(),
        })
    }

    pub fn pulse() -> Box<dyn Backend> {
        Box::new(Self {
            method: Method::Pulse,
            device: "pulse".into(),
        })
    }

    pub fn alsa(device: &str) -> Box<dyn Backend> {
        Box::new(Self {
            method: Method::Alsa,
            device: device.into(),
        })
    }

    fn open_device(&self, host: &cpal::Host) -> Result<Device, Error> {
        if self.method == Method::Alsa && self.device == "default" {
            return host
                .default_output_device()
                .ok_or_else(|| Error::backend(self.name(), "no default output device"));
        }
        let mut devices = host
            .output_devices()
            .map_err(|e| Error::backend(self.name(), e))?;
        devices
            .find(|d| d.name().map(|n| n == self.device).unwrap_or(false))
            .ok_or_else(|| Error::backend(self.name(), format!("no device `{}`", self.device)))
    }
}

impl Backend for CpalBackend {
    fn name(&self) -> &'static str {
        match self.method {
            Method::PipeWire => "pipewire",
            Method::Pulse => "pulse",
            Method::Alsa => "alsa",
        }
    }

    fn run(
        &self,
        audio: &AudioParams,
        mut renderer: StationRenderer,
        stop: &Receiver<()>,
        timeout: Option<Duration>,
    ) -> Result<ExitReason, Error> {
        let name = self.name();
        let host = cpal::default_host();
        let device = self.open_device(&host)?;
        let (config, cpal_format, wire_format) = negotiate(&device, audio, name)?;
        info!(
            "{name}: playing {} x{} at {} Hz",
            wire_format, config.channels, config.sample_rate.0
        );

        renderer.set_rate(config.sample_rate.0);
        let channels = usize::from(config.channels);
        let mut scratch: Vec<f64> = Vec::new();

        let stream = device
            .build_output_stream_raw(
                &config,
                cpal_format,
                move |data: &mut Data, _: &OutputCallbackInfo| {
                    let frames = data.len() / channels;
                    scratch.resize(frames, 0.0);
                    renderer.render(&mut scratch);
                    sample::fill(wire_format, channels, frames, data.bytes_mut(), &scratch);
                },
                move |err| warn!("{name}: stream error: {err}"),
                None,
            )
            .map_err(|e| Error::backend(name, e))?;
        stream.play().map_err(|e| Error::backend(name, e))?;

        let reason = match timeout {
            Some(t) => match stop.recv_timeout(t) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => ExitReason::Interrupted,
                Err(RecvTimeoutError::Timeout) => ExitReason::Timeout,
            },
            None => {
                let _ = stop.recv();
                ExitReason::Interrupted
            }
        };
        Ok(reason)
    }
}

/// Closest cpal stream format for a requested wire format, with the
/// wire format actually produced.
fn nearest_format(requested: SampleFormat, backend: &'static str) -> (cpal::SampleFormat, SampleFormat) {
    if requested.endian != Endian::native() {
        warn!("{backend}: {requested} is not representable here, using native byte order");
    }
    let encoding = match requested.encoding {
        Encoding::S24 => {
            warn!("{backend}: no 24-in-32 stream support, upgrading to S32");
            Encoding::S32
        }
        Encoding::U24 => {
            warn!("{backend}: no 24-in-32 stream support, upgrading to U32");
            Encoding::U32
        }
        other => other,
    };
    let cpal_format = match encoding {
        Encoding::S16 => cpal::SampleFormat::I16,
        Encoding::U16 => cpal::SampleFormat::U16,
        Encoding::S32 => cpal::SampleFormat::I32,
        Encoding::U32 => cpal::SampleFormat::U32,
        Encoding::Float => cpal::SampleFormat::F32,
        Encoding::Float64 => cpal::SampleFormat::F64,
        Encoding::S24 | Encoding::U24 => unreachable!(),
    };
    (cpal_format, SampleFormat::native(encoding))
}

fn wire_from_cpal(format: cpal::SampleFormat) -> Option<Encoding> {
    match format {
        cpal::SampleFormat::I16 => Some(Encoding::S16),
        cpal::SampleFormat::U16 => Some(Encoding::U16),
        cpal::SampleFormat::I32 => Some(Encoding::S32),
        cpal::SampleFormat::U32 => Some(Encoding::U32),
        cpal::SampleFormat::F32 => Some(Encoding::Float),
        cpal::SampleFormat::F64 => Some(Encoding::Float64),
        _ => None,
    }
}

/// Find a stream configuration the device supports, preferring the
/// requested format, channel count and rate in that order.
fn negotiate(
    device: &Device,
    audio: &AudioParams,
    backend: &'static str,
) -> Result<(StreamConfig, cpal::SampleFormat, SampleFormat), Error> {
    let (cpal_format, wire) = nearest_format(audio.format, backend);
    let rate = SampleRate(audio.rate);

    let ranges: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| Error::backend(backend, e))?
        .collect();

    let exact = ranges.iter().any(|r| {
        r.sample_format() == cpal_format
            && r.channels() == audio.channels
            && r.min_sample_rate() <= rate
            && rate <= r.max_sample_rate()
    });
    if exact {
        let config = StreamConfig {
            channels: audio.channels,
            sample_rate: rate,
            buffer_size: BufferSize::Default,
        };
        return Ok((config, cpal_format, wire));
    }

    if let Some(range) = ranges.iter().find(|r| r.sample_format() == cpal_format) {
        let channels = range.channels();
        let clamped = rate.clamp(range.min_sample_rate(), range.max_sample_rate());
        if channels != audio.channels {
            warn!("{backend}: {} channels unsupported, using {channels}", audio.channels);
        }
        if clamped != rate {
            warn!("{backend}: {} Hz unsupported, using {} Hz", rate.0, clamped.0);
        }
        let config = StreamConfig {
            channels,
            sample_rate: clamped,
            buffer_size: BufferSize::Default,
        };
        return Ok((config, cpal_format, wire));
    }

    let default = device
        .default_output_config()
        .map_err(|e| Error::backend(backend, e))?;
    let encoding = wire_from_cpal(default.sample_format()).ok_or_else(|| {
        Error::backend(
            backend,
            format!("device format {:?} unsupported", default.sample_format()),
        )
    })?;
    let wire = SampleFormat::native(encoding);
    warn!(
        "{backend}: requested stream unsupported, using device default ({wire} x{} at {} Hz)",
        default.channels(),
        default.sample_rate().0
    );
    Ok((default.config(), default.sample_format(), wire))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_mapping_downgrades() {
        let (cp, wire) = nearest_format("S24_LE".parse().unwrap(), "alsa");
        assert_eq!(cp, cpal::SampleFormat::I32);
        assert_eq!(wire.encoding, Encoding::S32);
        assert_eq!(wire.endian, Endian::native());

        let (cp, wire) = nearest_format("FLOAT64".parse().unwrap(), "alsa");
        assert_eq!(cp, cpal::SampleFormat::F64);
        assert_eq!(wire.encoding, Encoding::Float64);

        let (cp, _) = nearest_format("U16_BE".parse().unwrap(), "alsa");
        assert_eq!(cp, cpal::SampleFormat::U16);
    }
}
