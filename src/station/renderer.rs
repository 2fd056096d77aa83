//! Clock-driven waveform engine.
//!
//! The renderer is owned by whichever audio backend drives it and is
//! only ever touched from that backend's callback thread. Each call
//! advances a logical clock held in samples, keys the oscillator
//! through the station's [`TickMap`](super::TickMap), and realigns
//! audio time to the wall clock whenever they drift apart (NTP steps,
//! dropped buffers, rate surprises).

use log::{debug, info};

use super::jjy::{MORSE_END_TICK, MORSE_START_TICK};
use super::{Frame, StationId, StationInfo, TickMap, TICKS_PER_MINUTE};
use crate::config::{FreqLimit, TimeParams};
use crate::datetime::{self, MSECS_PER_MIN};
use crate::oscillator::IirOscillator;

/// `next_timestamp` sentinel: no callback has run yet.
const FIRST_RUN: i64 = i64::MIN;
/// `next_timestamp` sentinel: resync on the next callback.
const FORCE_RESYNC: i64 = 0;

/// Resync when audio time and wall time disagree by more than this.
const DRIFT_LIMIT_MS: i64 = 500;
const TICK_MS: i64 = 50;

const SMOOTH_SNAP: f64 = 0.005;
const SMOOTH_KEEP: f64 = 0.985;

/// Pick the synthesized frequency: the real carrier divided by the
/// smallest odd factor that brings it under the output limit.
pub fn subharmonic(carrier_hz: u32, rate: u32, limit: FreqLimit) -> u32 {
    let cap = match limit {
        FreqLimit::Audible => 14_000,
        FreqLimit::Standard => 20_000,
        FreqLimit::Ultrasound => rate / 2,
    };
    let mut k = (carrier_hz + cap - 1) / cap;
    if k % 2 == 0 {
        k += 1;
    }
    carrier_hz / k
}

/// Streaming generator for one station.
///
/// Invariants: `tick` stays below 1200, `samples_since_resync` never
/// passes `next_tick_sample`, and the tick map is rewritten whole at
/// every minute boundary.
#[derive(Debug, Clone)]
pub struct StationRenderer {
    id: StationId,
    info: StationInfo,
    base_ms: Option<i64>,
    user_offset_ms: i64,
    dut1_ms: i64,
    smooth: bool,
    freq_limit: FreqLimit,
    rate: u32,

    /// Fixed on the first callback, constant afterwards.
    base_offset_ms: i64,
    /// Wall-clock milliseconds of the last resync.
    timestamp_ms: i64,
    /// Expected wall-clock milliseconds at the next callback.
    next_timestamp_ms: i64,
    samples_since_resync: u64,
    next_tick_sample: u64,
    samples_per_tick: u64,
    /// Position within the station minute, 0..1200.
    tick: usize,
    is_morse: bool,
    morse_minute: bool,
    iir: IirOscillator,
    map: TickMap,
    freq: u32,
    gain: f64,
}

impl StationRenderer {
    pub fn new(time: &TimeParams, rate: u32) -> Self {
        let info = time.station.info();
        let freq = subharmonic(info.carrier_hz, rate, time.freq_limit);
        info!(
            "{}: carrier {} Hz, synthesizing {} Hz at {} Hz output",
            time.station, info.carrier_hz, freq, rate
        );
        Self {
            id: time.station,
            info,
            base_ms: time.base_ms,
            user_offset_ms: time.offset_ms,
            dut1_ms: time.dut1_ms,
            smooth: time.smooth,
            freq_limit: time.freq_limit,
            rate,
            base_offset_ms: 0,
            timestamp_ms: 0,
            next_timestamp_ms: FIRST_RUN,
            samples_since_resync: 0,
            next_tick_sample: 0,
            samples_per_tick: u64::from(rate / 20),
            tick: 0,
            is_morse: false,
            morse_minute: false,
            iir: IirOscillator::new(freq, rate, 0),
            map: TickMap::new(),
            freq,
            gain: 0.0,
        }
    }

    /// Synthesized carrier frequency in Hz.
    pub fn frequency(&self) -> u32 {
        self.freq
    }

    /// Adopt the rate the backend actually opened the stream at and
    /// schedule a resync.
    pub fn set_rate(&mut self, rate: u32) {
        if rate == self.rate {
            return;
        }
        info!("output rate changed {} -> {}", self.rate, rate);
        self.rate = rate;
        self.samples_per_tick = u64::from(rate / 20);
        self.freq = subharmonic(self.info.carrier_hz, rate, self.freq_limit);
        if self.next_timestamp_ms != FIRST_RUN {
            self.next_timestamp_ms = FORCE_RESYNC;
        }
    }

    /// Fill `out` with the next samples of the station waveform.
    ///
    /// This is the audio callback: it never blocks and does no I/O
    /// beyond one realtime-clock read.
    pub fn render(&mut self, out: &mut [f64]) {
        self.render_at(datetime::now_ms(), out);
    }

    fn render_at(&mut self, wall_ms: i64, out: &mut [f64]) {
        let first_run = self.next_timestamp_ms == FIRST_RUN;
        if first_run {
            self.base_offset_ms = match self.base_ms {
                Some(base) => base - wall_ms + self.user_offset_ms,
                None => self.user_offset_ms,
            };
        }
        let now = wall_ms + self.base_offset_ms;

        // wall_ms of 0 means the clock read failed; keep generating
        // from the current state and let a later callback resync.
        if first_run
            || (wall_ms != 0
                && (self.next_timestamp_ms == FORCE_RESYNC
                    || (now - self.next_timestamp_ms).abs() > DRIFT_LIMIT_MS))
        {
            self.resync(now);
        }

        for sample in out.iter_mut() {
            if self.samples_since_resync == self.next_tick_sample {
                self.advance_tick();
            }
            let target = if self.map.get(self.tick) {
                1.0
            } else if self.is_morse {
                0.0
            } else {
                self.info.low_gain
            };
            self.gain = if !self.smooth || (target - self.gain).abs() <= SMOOTH_SNAP {
                target
            } else {
                SMOOTH_KEEP * self.gain + (1.0 - SMOOTH_KEEP) * target
            };
            // the recursion can overshoot full scale by a few ULPs
            *sample = (self.iir.next() * self.gain).clamp(-1.0, 1.0);
            self.samples_since_resync += 1;
        }

        self.next_timestamp_ms = self.timestamp_ms + self.elapsed_ms(self.samples_since_resync);
    }

    /// Rebuild clock, tick map and oscillator for wall time `now`.
    fn resync(&mut self, now: i64) {
        let civil = datetime::parse(now);
        let msecs_since_min = i64::from(civil.sec) * 1000 + i64::from(civil.msec);
        let msecs_to_tick = TICK_MS - i64::from(civil.msec) % TICK_MS;
        let msecs_to_min = MSECS_PER_MIN - msecs_since_min;

        self.encode(now);
        self.timestamp_ms = now;
        self.samples_since_resync = 0;
        self.next_tick_sample = (msecs_to_tick * i64::from(self.rate) / 1000) as u64;
        self.tick = (msecs_since_min / TICK_MS) as usize;
        self.update_morse();
        // Prime the oscillator behind the minute boundary so a rising
        // zero-crossing lands exactly on it.
        let phase = -(msecs_to_min * i64::from(self.rate) / 1000);
        self.iir = IirOscillator::new(self.freq, self.rate, phase);
        debug!(
            "resync at {now} ms: tick {}, {} ms into the minute",
            self.tick, msecs_since_min
        );
    }

    fn advance_tick(&mut self) {
        self.tick += 1;
        if self.tick == TICKS_PER_MINUTE {
            self.tick = 0;
            let minute_ms = self.timestamp_ms + self.elapsed_ms(self.samples_since_resync);
            self.encode(minute_ms);
        }
        self.update_morse();
        self.next_tick_sample += self.samples_per_tick;
    }

    fn encode(&mut self, utc_ms: i64) {
        let Frame { map, morse_minute } = self.id.encode(utc_ms, self.dut1_ms);
        self.map = map;
        self.morse_minute = morse_minute;
    }

    fn update_morse(&mut self) {
        self.is_morse =
            self.morse_minute && (MORSE_START_TICK..MORSE_END_TICK).contains(&self.tick);
    }

    /// Audio time in milliseconds for a sample count, rounded so the
    /// minute re-encode and the tick counter cannot disagree.
    fn elapsed_ms(&self, samples: u64) -> i64 {
        ((samples as i64) * 1000 + i64::from(self.rate) / 2) / i64::from(self.rate)
    }
}
