use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::{info, warn};

use longwave::backend;
use longwave::config::{self, Options};
use longwave::logger;
use longwave::station::StationRenderer;
use longwave::Error;

/// Radiate a longwave time-station signal from the sound card.
#[derive(Debug, Parser)]
#[command(name = "longwave", version, about)]
struct Cli {
    /// Station to emulate: BPC, DCF77, JJY, JJY60, MSF or WWVB
    station: Option<String>,

    /// Time base, `YYYY-MM-DD HH:mm:ss[±hhmm]` (default: system time)
    #[arg(short, long, value_name = "TIME")]
    base: Option<String>,

    /// Offset added to the base, `[±]HH:mm:ss[.SSS]`
    #[arg(short, long, value_name = "OFFSET")]
    offset: Option<String>,

    /// DUT1 in milliseconds (MSF and WWVB only)
    #[arg(short, long, value_name = "MS", allow_hyphen_values = true)]
    dut1: Option<i64>,

    /// Stop after `HH:mm:ss` (default: run forever)
    #[arg(short, long, value_name = "TIME")]
    timeout: Option<String>,

    /// Audio route: pipewire, pulse or alsa (default: probe in that order)
    #[arg(short, long)]
    method: Option<String>,

    /// ALSA device name
    #[arg(short = 'D', long, value_name = "NAME")]
    device: Option<String>,

    /// Output sample format (S16, S24_LE, FLOAT64_BE, ...)
    #[arg(short, long)]
    format: Option<String>,

    /// Output sample rate in Hz
    #[arg(short, long)]
    rate: Option<u32>,

    /// Output channel count
    #[arg(short, long)]
    channels: Option<u16>,

    /// Smooth keying transitions
    #[arg(short = 'S', long)]
    smooth: bool,

    /// Allow a synthesized frequency above 20 kHz
    #[arg(short, long)]
    ultrasound: bool,

    /// Force a plainly audible synthesized frequency
    #[arg(short, long, conflicts_with = "ultrasound")]
    audible: bool,

    /// Read options from a config file
    #[arg(short = 'C', long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Append log lines to a file instead of stderr
    #[arg(short, long, value_name = "PATH")]
    log: Option<PathBuf>,

    /// Log to syslog
    #[arg(short = 'L', long)]
    syslog: bool,

    /// Also log debug chatter
    #[arg(short, long)]
    verbose: bool,

    /// Log errors only
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn to_options(&self) -> Result<Options, Error> {
        Ok(Options {
            station: self.station.as_deref().map(str::parse).transpose()?,
            base: self.base.as_deref().map(config::parse_base).transpose()?,
            offset: self.offset.as_deref().map(config::parse_offset).transpose()?,
            dut1: self.dut1,
            timeout: self
                .timeout
                .as_deref()
                .map(config::parse_timeout)
                .transpose()?,
            method: self.method.as_deref().map(str::parse).transpose()?,
            device: self.device.clone(),
            format: self.format.as_deref().map(str::parse).transpose()?,
            rate: self.rate,
            channels: self.channels,
            smooth: self.smooth.then_some(true),
            ultrasound: self.ultrasound.then_some(true),
            audible: self.audible.then_some(true),
            log: self.log.clone(),
            syslog: self.syslog.then_some(true),
            verbose: self.verbose.then_some(true),
            quiet: self.quiet.then_some(true),
        })
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let opts = cli.to_options()?;
    let opts = match &cli.config {
        Some(path) => opts.or(Options::from_file(path)?),
        None => opts,
    };
    let params = opts.into_params()?;
    logger::init(&params.log)?;

    let renderer = StationRenderer::new(&params.time, params.audio.rate);

    let (tx, stop) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })
    .context("installing signal handler")?;

    for backend in backend::probe_order(&params.audio) {
        match backend.run(&params.audio, renderer.clone(), &stop, params.timeout) {
            Ok(reason) => {
                info!("exiting: {reason}");
                return Ok(());
            }
            Err(e) => warn!("{e}"),
        }
    }
    Err(Error::NoBackend.into())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("longwave: {e:#}");
            ExitCode::FAILURE
        }
    }
}
