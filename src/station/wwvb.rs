//! WWVB (Fort Collins, USA, 60 kHz) minute layout.
//!
//! Amplitude drops at the start of each second: 200 ms for a 0 bit,
//! 500 ms for a 1 bit, 800 ms for the frame markers at seconds 0, 9,
//! 19, 29, 39, 49 and 59. Time fields are UTC.

use super::{put_msb, TickMap};
use crate::datetime;

const MARKERS: [usize; 7] = [0, 9, 19, 29, 39, 49, 59];

pub(super) fn encode(utc_ms: i64, dut1_ms: i64) -> TickMap {
    let utc = datetime::parse(utc_ms);
    let (dst_at_start, dst_at_end) = datetime::us_dst(&utc);

    let mut bits = [0u8; 60];
    put_msb(&mut bits, 1, 3, utc.min / 10);
    put_msb(&mut bits, 5, 4, utc.min % 10);
    put_msb(&mut bits, 12, 2, utc.hour / 10);
    put_msb(&mut bits, 15, 4, utc.hour % 10);
    put_msb(&mut bits, 22, 2, utc.doy / 100);
    put_msb(&mut bits, 25, 4, utc.doy / 10 % 10);
    put_msb(&mut bits, 30, 4, utc.doy % 10);

    if dut1_ms >= 0 {
        bits[36] = 1;
        bits[38] = 1;
    } else {
        bits[37] = 1;
    }
    put_msb(&mut bits, 40, 4, (dut1_ms / 100).unsigned_abs() as u32);

    let y100 = (utc.year % 100) as u32;
    put_msb(&mut bits, 45, 4, y100 / 10);
    put_msb(&mut bits, 50, 4, y100 % 10);
    bits[55] = u8::from(datetime::is_leap_year(utc.year));
    bits[57] = u8::from(dst_at_end);
    bits[58] = u8::from(dst_at_start);

    let mut map = TickMap::new();
    for s in 0..60 {
        let low_ticks = if MARKERS.contains(&s) {
            16
        } else if bits[s] == 1 {
            10
        } else {
            4
        };
        map.write_low_first(s, low_ticks);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datetime::compose;

    fn low_ticks(map: &TickMap, second: usize) -> usize {
        (0..super::super::TICKS_PER_SECOND)
            .take_while(|&t| !map.get(second * 20 + t))
            .count()
    }

    fn bit(map: &TickMap, second: usize) -> u32 {
        u32::from(low_ticks(map, second) == 10)
    }

    #[test]
    fn summer_minute() {
        // 2024-06-15 12:34:56 UTC: leap year, DST fully in effect
        let map = encode(compose(2024, 6, 15, 12, 34, 56, 0, 0), 0);
        assert_eq!(low_ticks(&map, 0), 16);
        for t in 16..20 {
            assert!(map.get(t), "tick {t}");
        }
        // minute 34: tens 011, units 0100
        assert_eq!([bit(&map, 1), bit(&map, 2), bit(&map, 3)], [0, 1, 1]);
        assert_eq!(
            [bit(&map, 5), bit(&map, 6), bit(&map, 7), bit(&map, 8)],
            [0, 1, 0, 0]
        );
        assert_eq!(bit(&map, 55), 1);
        assert_eq!(bit(&map, 57), 1);
        assert_eq!(bit(&map, 58), 1);
    }

    #[test]
    fn day_of_year_digits() {
        // 2024-06-15 is day 167
        let map = encode(compose(2024, 6, 15, 0, 0, 0, 0, 0), 0);
        assert_eq!([bit(&map, 22), bit(&map, 23)], [0, 1]);
        assert_eq!(
            [bit(&map, 25), bit(&map, 26), bit(&map, 27), bit(&map, 28)],
            [0, 1, 1, 0]
        );
        assert_eq!(
            [bit(&map, 30), bit(&map, 31), bit(&map, 32), bit(&map, 33)],
            [0, 1, 1, 1]
        );
    }

    #[test]
    fn dut1_sign_and_magnitude() {
        let pos = encode(compose(2024, 1, 10, 6, 0, 0, 0, 0), 600);
        assert_eq!([bit(&pos, 36), bit(&pos, 37), bit(&pos, 38)], [1, 0, 1]);
        assert_eq!(
            [bit(&pos, 40), bit(&pos, 41), bit(&pos, 42), bit(&pos, 43)],
            [0, 1, 1, 0]
        );

        let neg = encode(compose(2024, 1, 10, 6, 0, 0, 0, 0), -300);
        assert_eq!([bit(&neg, 36), bit(&neg, 37), bit(&neg, 38)], [0, 1, 0]);
        assert_eq!(
            [bit(&neg, 40), bit(&neg, 41), bit(&neg, 42), bit(&neg, 43)],
            [0, 0, 1, 1]
        );
    }

    #[test]
    fn winter_clears_dst_and_leap() {
        let map = encode(compose(2023, 1, 10, 6, 0, 0, 0, 0), 0);
        assert_eq!(bit(&map, 55), 0);
        assert_eq!(bit(&map, 57), 0);
        assert_eq!(bit(&map, 58), 0);
    }

    #[test]
    fn transition_days_disagree() {
        // Spring forward 2024-03-10: off at start of day, on at end
        let spring = encode(compose(2024, 3, 10, 12, 0, 0, 0, 0), 0);
        assert_eq!(bit(&spring, 57), 1);
        assert_eq!(bit(&spring, 58), 0);

        // Fall back 2024-11-03: on at start of day, off at end
        let fall = encode(compose(2024, 11, 3, 12, 0, 0, 0, 0), 0);
        assert_eq!(bit(&fall, 57), 0);
        assert_eq!(bit(&fall, 58), 1);
    }

    #[test]
    fn year_digits() {
        let map = encode(compose(2024, 6, 15, 0, 0, 0, 0, 0), 0);
        // 24: tens 0010, units 0100
        assert_eq!(
            [bit(&map, 45), bit(&map, 46), bit(&map, 47), bit(&map, 48)],
            [0, 0, 1, 0]
        );
        assert_eq!(
            [bit(&map, 50), bit(&map, 51), bit(&map, 52), bit(&map, 53)],
            [0, 1, 0, 0]
        );
    }
}
