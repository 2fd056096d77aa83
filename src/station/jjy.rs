//! JJY (Japan, 40 kHz Fukushima / 60 kHz Kyushu) minute layout.
//!
//! JJY pulses lead with full carrier: a marker is 200 ms high, a 0 bit
//! 800 ms and a 1 bit 500 ms, with the low level for the rest of the
//! second. During minutes 15 and 45 the station announces its callsign
//! in Morse code between seconds 40.55 and 49; the weekday bits are
//! suppressed in those minutes.

use super::{even_parity, put_msb, Frame, StationId, TickMap, TICKS_PER_SECOND};
use crate::datetime;

const MARKERS: [usize; 7] = [0, 9, 19, 29, 39, 49, 59];

/// First tick of the callsign announcement window (40.55 s).
pub(crate) const MORSE_START_TICK: usize = 40 * TICKS_PER_SECOND + 11;
/// One past the last tick of the announcement window (49.0 s).
pub(crate) const MORSE_END_TICK: usize = 49 * TICKS_PER_SECOND;

const DIT: usize = 2;
const DAH: usize = 5;
const ELEMENT_GAP: usize = 1;
const CHAR_GAP: usize = 6;
const WORD_GAP: usize = 10;

pub(super) fn encode(utc_ms: i64) -> Frame {
    let local = datetime::parse(utc_ms + StationId::Jjy40.info().utc_offset_ms);
    let morse_minute = local.min == 15 || local.min == 45;

    let mut bits = [0u8; 60];
    put_msb(&mut bits, 1, 3, local.min / 10);
    put_msb(&mut bits, 5, 4, local.min % 10);
    put_msb(&mut bits, 12, 2, local.hour / 10);
    put_msb(&mut bits, 15, 4, local.hour % 10);
    put_msb(&mut bits, 22, 2, local.doy / 100);
    put_msb(&mut bits, 25, 4, local.doy / 10 % 10);
    put_msb(&mut bits, 30, 4, local.doy % 10);
    bits[36] = even_parity(&bits[12..19]);
    bits[37] = even_parity(&bits[1..9]);
    let y100 = (local.year % 100) as u32;
    put_msb(&mut bits, 41, 4, y100 / 10);
    put_msb(&mut bits, 45, 4, y100 % 10);
    if !morse_minute {
        put_msb(&mut bits, 50, 3, local.dow); // 0 = Sunday
    }

    let mut map = TickMap::new();
    for s in 0..60 {
        let high_ticks = if MARKERS.contains(&s) {
            4
        } else if bits[s] == 1 {
            10
        } else {
            16
        };
        map.write_high_first(s, high_ticks);
    }
    if morse_minute {
        overlay_callsign(&mut map);
    }
    Frame { map, morse_minute }
}

/// Key "JJY JJY" into the announcement window, replacing whatever the
/// regular layout put there.
fn overlay_callsign(map: &mut TickMap) {
    for t in MORSE_START_TICK..MORSE_END_TICK {
        map.set(t, false);
    }

    let j: &[usize] = &[DIT, DAH, DAH, DAH];
    let y: &[usize] = &[DAH, DIT, DAH, DAH];
    let words: [[&[usize]; 3]; 2] = [[j, j, y], [j, j, y]];

    let mut t = MORSE_START_TICK;
    for (wi, word) in words.iter().enumerate() {
        for (ci, chr) in word.iter().enumerate() {
            for (ei, &len) in chr.iter().enumerate() {
                for k in 0..len {
                    map.set(t + k, true);
                }
                t += len;
                if ei + 1 < chr.len() {
                    t += ELEMENT_GAP;
                }
            }
            if ci + 1 < word.len() {
                t += CHAR_GAP;
            }
        }
        if wi + 1 < words.len() {
            t += WORD_GAP;
        }
    }
    debug_assert!(t <= MORSE_END_TICK);
}
