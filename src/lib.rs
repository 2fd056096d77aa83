//! Longwave time-station emulation through a sound card.
//!
//! Consumer radio-controlled clocks listen for one of a handful of
//! government longwave transmitters: BPC (China, 68.5 kHz), DCF77
//! (Germany, 77.5 kHz), JJY (Japan, 40/60 kHz), MSF (UK, 60 kHz) and
//! WWVB (USA, 60 kHz). Each keys its carrier once per second with the
//! current date and time. This crate synthesizes the same keying on an
//! odd subharmonic of the real carrier; ordinary DACs leak enough of
//! the matching harmonic that a clock held close to the speaker wire
//! will lock onto it.
//!
//! The pieces:
//!
//! - [`station`]: the per-station bit encoders and the clock-driven
//!   [`station::StationRenderer`] that turns them into samples
//! - [`oscillator`]: a cheap phase-controllable sine generator
//! - [`datetime`]: civil calendar math and the EU/US DST rules
//! - [`sample`]: wire formats and the deliberately 16-bit-quantized
//!   buffer packer
//! - [`backend`]: playback routes driving the renderer
//! - [`config`]: CLI/config-file options and the validated parameter
//!   records

pub mod backend;
pub mod config;
pub mod datetime;
pub mod error;
pub mod logger;
pub mod oscillator;
pub mod sample;
pub mod station;

pub use error::Error;
