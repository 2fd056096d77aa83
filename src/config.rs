//! Runtime configuration.
//!
//! Options arrive from the command line and optionally from a config
//! file of `name = value` lines; the command line wins. Validation
//! splits the result into two immutable records: [`TimeParams`] for
//! the waveform engine and [`AudioParams`] for the backend, so
//! neither side sees the other's knobs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;

use crate::datetime;
use crate::error::Error;
use crate::sample::{Encoding, SampleFormat};
use crate::station::StationId;

pub const RATES: [u32; 8] = [
    44_100, 48_000, 88_200, 96_000, 176_400, 192_000, 352_800, 384_000,
];

/// Which audio route to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    PipeWire,
    Pulse,
    Alsa,
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_lowercase().as_str() {
            "pipewire" => Ok(Method::PipeWire),
            "pulse" => Ok(Method::Pulse),
            "alsa" => Ok(Method::Alsa),
            _ => Err(Error::InvalidConfig(format!("unknown method `{s}`"))),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::PipeWire => "pipewire",
            Method::Pulse => "pulse",
            Method::Alsa => "alsa",
        })
    }
}

/// Upper bound for the synthesized subharmonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreqLimit {
    /// Cap at 14 kHz so the tone is plainly audible (for bring-up).
    Audible,
    /// Cap at 20 kHz, the top of the hearing range.
    Standard,
    /// Allow anything below Nyquist.
    Ultrasound,
}

/// Time-signal parameters consumed by the station engine.
#[derive(Debug, Clone)]
pub struct TimeParams {
    pub station: StationId,
    /// Fixed time base; `None` follows the system clock.
    pub base_ms: Option<i64>,
    pub offset_ms: i64,
    pub dut1_ms: i64,
    pub smooth: bool,
    pub freq_limit: FreqLimit,
}

/// Audio parameters consumed by the backend.
#[derive(Debug, Clone)]
pub struct AudioParams {
    pub method: Option<Method>,
    pub device: String,
    pub format: SampleFormat,
    pub rate: u32,
    pub channels: u16,
}

/// Logging destination and level for the binary.
#[derive(Debug, Clone)]
pub struct LogParams {
    pub file: Option<PathBuf>,
    pub syslog: bool,
    pub level: LevelFilter,
}

/// Fully validated runtime parameters.
#[derive(Debug, Clone)]
pub struct Params {
    pub time: TimeParams,
    pub audio: AudioParams,
    pub timeout: Option<Duration>,
    pub log: LogParams,
}

/// Partially specified options, as read from one source.
#[derive(Debug, Default, Clone)]
pub struct Options {
    pub station: Option<StationId>,
    pub base: Option<i64>,
    pub offset: Option<i64>,
    pub dut1: Option<i64>,
    pub timeout: Option<u32>,
    pub method: Option<Method>,
    pub device: Option<String>,
    pub format: Option<SampleFormat>,
    pub rate: Option<u32>,
    pub channels: Option<u16>,
    pub smooth: Option<bool>,
    pub ultrasound: Option<bool>,
    pub audible: Option<bool>,
    pub log: Option<PathBuf>,
    pub syslog: Option<bool>,
    pub verbose: Option<bool>,
    pub quiet: Option<bool>,
}

impl Options {
    /// Read options from a config file.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidConfig(format!("{}: {e}", path.display())))?;
        let mut opts = Options::default();
        for (lineno, raw) in text.lines().enumerate() {
            let Some((name, value)) = split_line(raw) else {
                continue;
            };
            opts.set(name, &value).map_err(|e| {
                Error::InvalidConfig(format!("{}:{}: {e}", path.display(), lineno + 1))
            })?;
        }
        Ok(opts)
    }

    fn set(&mut self, name: &str, value: &str) -> Result<(), Error> {
        match name {
            "station" => self.station = Some(value.parse()?),
            "base" => self.base = Some(parse_base(value)?),
            "offset" => self.offset = Some(parse_offset(value)?),
            "dut1" => {
                self.dut1 = Some(value.parse().map_err(|_| {
                    Error::InvalidConfig(format!("bad dut1 value `{value}`"))
                })?)
            }
            "timeout" => self.timeout = Some(parse_timeout(value)?),
            "method" => self.method = Some(value.parse()?),
            "device" => self.device = Some(value.to_string()),
            "format" => self.format = Some(value.parse()?),
            "rate" => {
                self.rate = Some(value.parse().map_err(|_| {
                    Error::InvalidConfig(format!("bad rate `{value}`"))
                })?)
            }
            "channels" => {
                self.channels = Some(value.parse().map_err(|_| {
                    Error::InvalidConfig(format!("bad channel count `{value}`"))
                })?)
            }
            "smooth" => self.smooth = Some(parse_bool(value)?),
            "ultrasound" => self.ultrasound = Some(parse_bool(value)?),
            "audible" => self.audible = Some(parse_bool(value)?),
            "log" => self.log = Some(PathBuf::from(value)),
            "syslog" => self.syslog = Some(parse_bool(value)?),
            "verbose" => self.verbose = Some(parse_bool(value)?),
            "quiet" => self.quiet = Some(parse_bool(value)?),
            _ => return Err(Error::InvalidConfig(format!("unknown option `{name}`"))),
        }
        Ok(())
    }

    /// Overlay `self` on `fallback`; values present in `self` win.
    pub fn or(self, fallback: Options) -> Options {
        Options {
            station: self.station.or(fallback.station),
            base: self.base.or(fallback.base),
            offset: self.offset.or(fallback.offset),
            dut1: self.dut1.or(fallback.dut1),
            timeout: self.timeout.or(fallback.timeout),
            method: self.method.or(fallback.method),
            device: self.device.or(fallback.device),
            format: self.format.or(fallback.format),
            rate: self.rate.or(fallback.rate),
            channels: self.channels.or(fallback.channels),
            smooth: self.smooth.or(fallback.smooth),
            ultrasound: self.ultrasound.or(fallback.ultrasound),
            audible: self.audible.or(fallback.audible),
            log: self.log.or(fallback.log),
            syslog: self.syslog.or(fallback.syslog),
            verbose: self.verbose.or(fallback.verbose),
            quiet: self.quiet.or(fallback.quiet),
        }
    }

    /// Validate and split into the final parameter records.
    pub fn into_params(self) -> Result<Params, Error> {
        let station = self.station.unwrap_or(StationId::Wwvb);

        let rate = self.rate.unwrap_or(48_000);
        if !RATES.contains(&rate) {
            return Err(Error::InvalidConfig(format!(
                "rate {rate} is not supported (choose one of {RATES:?})"
            )));
        }

        let channels = self.channels.unwrap_or(1);
        if !(1..=1023).contains(&channels) {
            return Err(Error::InvalidConfig(format!(
                "channel count {channels} out of range 1..=1023"
            )));
        }

        let dut1_ms = self.dut1.unwrap_or(0);
        if self.dut1.is_some() && !station.carries_dut1() {
            return Err(Error::InvalidConfig(format!(
                "{station} does not transmit DUT1"
            )));
        }
        if dut1_ms.abs() >= 1000 {
            return Err(Error::InvalidConfig(format!(
                "DUT1 {dut1_ms} ms out of range (-1000, 1000)"
            )));
        }
        // MSF keys DUT1 on eight B bits per sign, so only magnitudes
        // below 0.9 s fit on the wire
        if station == StationId::Msf && dut1_ms.abs() >= 900 {
            return Err(Error::InvalidConfig(format!(
                "DUT1 {dut1_ms} ms out of MSF's range (-900, 900)"
            )));
        }

        let ultrasound = self.ultrasound.unwrap_or(false);
        let audible = self.audible.unwrap_or(false);
        if ultrasound && audible {
            return Err(Error::InvalidConfig(
                "ultrasound and audible are mutually exclusive".into(),
            ));
        }
        let freq_limit = if ultrasound {
            FreqLimit::Ultrasound
        } else if audible {
            FreqLimit::Audible
        } else {
            FreqLimit::Standard
        };

        let level = if self.quiet.unwrap_or(false) {
            LevelFilter::Error
        } else if self.verbose.unwrap_or(false) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };

        Ok(Params {
            time: TimeParams {
                station,
                base_ms: self.base,
                offset_ms: self.offset.unwrap_or(0),
                dut1_ms,
                smooth: self.smooth.unwrap_or(false),
                freq_limit,
            },
            audio: AudioParams {
                method: self.method,
                device: self.device.unwrap_or_else(|| "default".into()),
                format: self
                    .format
                    .unwrap_or_else(|| SampleFormat::native(Encoding::S16)),
                rate,
                channels,
            },
            timeout: self.timeout.map(|s| Duration::from_secs(s.into())),
            log: LogParams {
                file: self.log,
                syslog: self.syslog.unwrap_or(false),
                level,
            },
        })
    }
}

/// Split one config-file line into `(name, value)`. Comments start at
/// an unquoted `#`; a bare name means `on`.
fn split_line(raw: &str) -> Option<(&str, String)> {
    let mut quote = None;
    let mut cut = raw.len();
    for (i, c) in raw.char_indices() {
        match (quote, c) {
            (None, '#') => {
                cut = i;
                break;
            }
            (None, '\'' | '"') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            _ => {}
        }
    }
    let line = raw[..cut].trim();
    if line.is_empty() {
        return None;
    }
    match line.split_once('=') {
        Some((name, value)) => Some((name.trim(), unquote(value.trim()).to_string())),
        None => Some((line, "on".to_string())),
    }
}

fn unquote(v: &str) -> &str {
    let b = v.as_bytes();
    if v.len() >= 2 && (b[0] == b'\'' || b[0] == b'"') && b[v.len() - 1] == b[0] {
        &v[1..v.len() - 1]
    } else {
        v
    }
}

fn parse_bool(v: &str) -> Result<bool, Error> {
    match v {
        "on" => Ok(true),
        "off" => Ok(false),
        _ => Err(Error::InvalidConfig(format!("expected on/off, got `{v}`"))),
    }
}

fn field(s: &str, what: &str) -> Result<u32, Error> {
    s.parse()
        .map_err(|_| Error::InvalidConfig(format!("bad {what} `{s}`")))
}

/// Parse a time base of the form `YYYY-MM-DD HH:mm:ss[±hhmm]`.
pub fn parse_base(s: &str) -> Result<i64, Error> {
    let bad = || Error::InvalidConfig(format!("bad base time `{s}`"));
    let (date, time_tz) = s.trim().split_once(' ').ok_or_else(bad)?;

    let mut parts = date.split('-');
    let year = field(parts.next().ok_or_else(bad)?, "year")?;
    let month = field(parts.next().ok_or_else(bad)?, "month")?;
    let day = field(parts.next().ok_or_else(bad)?, "day")?;
    if parts.next().is_some() {
        return Err(bad());
    }

    let (time, tz) = if time_tz.len() > 8 {
        time_tz.split_at(8)
    } else {
        (time_tz, "")
    };
    let mut parts = time.split(':');
    let hour = field(parts.next().ok_or_else(bad)?, "hour")?;
    let min = field(parts.next().ok_or_else(bad)?, "minute")?;
    let sec = field(parts.next().ok_or_else(bad)?, "second")?;
    if parts.next().is_some() {
        return Err(bad());
    }

    let tz_minutes = match tz {
        "" => 0,
        _ if tz.len() == 5 && (tz.starts_with('+') || tz.starts_with('-')) => {
            let hh = field(&tz[1..3], "offset hours")?;
            let mm = field(&tz[3..5], "offset minutes")?;
            if hh > 23 || mm > 59 {
                return Err(bad());
            }
            let mins = (hh * 60 + mm) as i32;
            if tz.starts_with('-') {
                -mins
            } else {
                mins
            }
        }
        _ => return Err(bad()),
    };

    if !(1..=12).contains(&month)
        || year > 9999
        || !(1..=datetime::days_in_month(i64::from(year), month)).contains(&day)
        || hour > 23
        || min > 59
        || sec > 59
    {
        return Err(bad());
    }
    Ok(datetime::compose(
        i64::from(year),
        month,
        day,
        hour,
        min,
        sec,
        0,
        tz_minutes,
    ))
}

/// Parse a user offset of the form `[±]HH:mm:ss[.SSS]`, strictly
/// inside ±24 hours.
pub fn parse_offset(s: &str) -> Result<i64, Error> {
    let bad = || Error::InvalidConfig(format!("bad offset `{s}`"));
    let (sign, rest) = match s.trim().strip_prefix('-') {
        Some(r) => (-1, r),
        None => (1, s.trim().strip_prefix('+').unwrap_or(s.trim())),
    };
    let (hms, frac) = match rest.split_once('.') {
        Some((h, f)) => (h, f),
        None => (rest, ""),
    };
    let mut parts = hms.split(':');
    let hour = field(parts.next().ok_or_else(bad)?, "hours")?;
    let min = field(parts.next().ok_or_else(bad)?, "minutes")?;
    let sec = field(parts.next().ok_or_else(bad)?, "seconds")?;
    if parts.next().is_some() || min > 59 || sec > 59 {
        return Err(bad());
    }
    let msec = match frac.len() {
        0 => 0,
        1..=3 => field(frac, "milliseconds")? * 10u32.pow(3 - frac.len() as u32),
        _ => return Err(bad()),
    };
    let ms = i64::from(sign)
        * (i64::from(hour) * 3_600_000
            + i64::from(min) * 60_000
            + i64::from(sec) * 1000
            + i64::from(msec));
    if ms.abs() >= datetime::MSECS_PER_DAY {
        return Err(Error::InvalidConfig(format!(
            "offset `{s}` out of range (-24h, +24h)"
        )));
    }
    Ok(ms)
}

/// Parse a run timeout of the form `HH:mm:ss`, between one second and
/// 23:59:59. Returns whole seconds.
pub fn parse_timeout(s: &str) -> Result<u32, Error> {
    let bad = || Error::InvalidConfig(format!("bad timeout `{s}`"));
    let mut parts = s.trim().split(':');
    let hour = field(parts.next().ok_or_else(bad)?, "hours")?;
    let min = field(parts.next().ok_or_else(bad)?, "minutes")?;
    let sec = field(parts.next().ok_or_else(bad)?, "seconds")?;
    if parts.next().is_some() || hour > 23 || min > 59 || sec > 59 {
        return Err(bad());
    }
    let total = hour * 3600 + min * 60 + sec;
    if total == 0 {
        return Err(bad());
    }
    Ok(total)
}
