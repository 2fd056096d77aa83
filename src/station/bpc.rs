//! BPC (Shangqiu, China, 68.5 kHz) frame layout.
//!
//! BPC keys 2-bit symbols: a symbol of value v is v·100 + 100 ms of
//! low level at the start of its second, and the frame marker carries
//! no low pulse at all. A frame is 20 symbols; three frames fill one
//! station minute, identical except for the frame-number symbol in
//! slot 1 and its effect on the parity in slot 10. Time fields are
//! Beijing time (UTC+8), hours on a 12-hour dial with an AM/PM flag.

use super::{dow_sun7, StationId, TickMap};
use crate::datetime;

const FRAME_SECONDS: usize = 20;

/// Spread `count` base-4 digits of `value`, most significant first.
fn put_base4(sym: &mut [u8; FRAME_SECONDS], start: usize, count: usize, value: u32) {
    for i in 0..count {
        sym[start + i] = (value >> (2 * (count - 1 - i)) & 3) as u8;
    }
}

fn popcount(sym: &[u8]) -> u32 {
    sym.iter().map(|v| u32::from(*v).count_ones()).sum()
}

pub(super) fn encode(utc_ms: i64) -> TickMap {
    let local = datetime::parse(utc_ms + StationId::Bpc.info().utc_offset_ms);

    let mut sym = [0u8; FRAME_SECONDS];
    put_base4(&mut sym, 3, 2, local.hour % 12);
    put_base4(&mut sym, 5, 3, local.min);
    put_base4(&mut sym, 8, 2, dow_sun7(local.dow));
    sym[10] = (u8::from(local.hour >= 12) << 1) | (popcount(&sym[1..=9]) & 1) as u8;
    put_base4(&mut sym, 11, 3, local.day);
    put_base4(&mut sym, 14, 2, local.month);
    let y100 = (local.year % 100) as u32;
    put_base4(&mut sym, 16, 3, y100 & 63);
    sym[19] = ((y100 >> 5) & 2) as u8 | (popcount(&sym[11..=18]) & 1) as u8;

    let mut map = TickMap::new();
    for p in 0..3u8 {
        let mut frame = sym;
        frame[1] = 2 * p;
        if p == 1 {
            frame[10] ^= 1;
        }
        for s in 0..FRAME_SECONDS {
            let low_ticks = if s == 0 {
                0
            } else {
                (usize::from(frame[s]) + 1) * 2
            };
            map.write_low_first(usize::from(p) * FRAME_SECONDS + s, low_ticks);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datetime::compose;
    use crate::station::TICKS_PER_SECOND;

    fn low_ticks(map: &TickMap, second: usize) -> usize {
        (0..TICKS_PER_SECOND)
            .take_while(|&t| !map.get(second * 20 + t))
            .count()
    }

    /// Symbol value in a given frame slot, from its pulse width.
    fn sym(map: &TickMap, second: usize) -> u8 {
        let low = low_ticks(map, second);
        assert!(low >= 2, "second {second} is a marker");
        (low / 2 - 1) as u8
    }

    #[test]
    fn leap_day_morning() {
        // 2024-02-29 00:00:00 UTC = 08:00:00 Beijing, a Thursday
        let map = encode(compose(2024, 2, 29, 0, 0, 0, 0, 0));

        for p in 0..3 {
            assert_eq!(low_ticks(&map, p * 20), 0, "frame {p} marker");
        }

        // hour 8 (AM): base-4 digits 2,0
        assert_eq!(sym(&map, 3), 2);
        assert_eq!(sym(&map, 4), 0);
        // minute 0
        assert_eq!([sym(&map, 5), sym(&map, 6), sym(&map, 7)], [0, 0, 0]);
        // Thursday -> 4 -> digits 1,0
        assert_eq!([sym(&map, 8), sym(&map, 9)], [1, 0]);
        // day 29 -> 1,3,1
        assert_eq!([sym(&map, 11), sym(&map, 12), sym(&map, 13)], [1, 3, 1]);
        // month 2 -> 0,2
        assert_eq!([sym(&map, 14), sym(&map, 15)], [0, 2]);
        // year 24 -> 1,2,0
        assert_eq!([sym(&map, 16), sym(&map, 17), sym(&map, 18)], [1, 2, 0]);
    }

    #[test]
    fn frame_number_and_parity_adjustment() {
        let map = encode(compose(2024, 2, 29, 0, 0, 0, 0, 0));

        assert_eq!(sym(&map, 1), 0);
        assert_eq!(sym(&map, 21), 2);
        assert_eq!(sym(&map, 41), 4);

        // slot 10 parity flips only in the middle frame
        let first = sym(&map, 10);
        assert_eq!(sym(&map, 30), first ^ 1);
        assert_eq!(sym(&map, 50), first);

        // AM here, and bits 1..=9 hold two ones -> parity 0
        assert_eq!(first, 0);
    }

    #[test]
    fn pm_flag() {
        // 20:30 Beijing = 12:30 UTC
        let map = encode(compose(2024, 2, 29, 12, 30, 0, 0, 0));
        // hour 20 -> 8 on the dial, PM bit set in slot 10
        assert_eq!(sym(&map, 3), 2);
        assert_eq!(sym(&map, 4), 0);
        assert_eq!(sym(&map, 10) & 2, 2);
    }

    #[test]
    fn frames_share_time_fields() {
        let map = encode(compose(2025, 7, 1, 4, 56, 30, 0, 0));
        for s in 2..FRAME_SECONDS {
            if s == 10 {
                continue;
            }
            assert_eq!(sym(&map, s), sym(&map, 20 + s), "second {s}");
            assert_eq!(sym(&map, s), sym(&map, 40 + s), "second {s}");
        }
    }
}
