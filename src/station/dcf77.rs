//! DCF77 (Mainflingen, Germany, 77.5 kHz) minute layout.
//!
//! Amplitude drops at the start of each second: 100 ms for a 0 bit,
//! 200 ms for a 1 bit, and no drop at all in second 59, which is the
//! minute marker. The encoded civil time is CET/CEST of the minute
//! *after* the one being transmitted.

use super::{dow_sun7, even_parity, put_lsb, to_bcd, StationId, TickMap};
use crate::datetime::{self, MSECS_PER_HOUR, MSECS_PER_MIN};

pub(super) fn encode(utc_ms: i64) -> TickMap {
    let now = datetime::parse(utc_ms);
    let (now_summer, change_mins) = datetime::eu_dst(&now);

    // Announced time is the next minute; across a changeover the
    // fields use the post-change offset while the zone bits still
    // describe the minute in progress.
    let xmit_ms = (utc_ms.div_euclid(MSECS_PER_MIN) + 1) * MSECS_PER_MIN;
    let (xmit_summer, _) = datetime::eu_dst(&datetime::parse(xmit_ms));
    let offset = StationId::Dcf77.info().utc_offset_ms
        + if xmit_summer { MSECS_PER_HOUR } else { 0 };
    let local = datetime::parse(xmit_ms + offset);

    let mut bits = [0u8; 60];
    bits[16] = u8::from((1..=60).contains(&change_mins));
    bits[17] = u8::from(now_summer);
    bits[18] = u8::from(!now_summer);
    bits[20] = 1; // start of encoded time
    put_lsb(&mut bits, 21, 7, to_bcd(local.min));
    bits[28] = even_parity(&bits[21..28]);
    put_lsb(&mut bits, 29, 6, to_bcd(local.hour));
    bits[35] = even_parity(&bits[29..35]);
    put_lsb(&mut bits, 36, 6, to_bcd(local.day));
    put_lsb(&mut bits, 42, 3, dow_sun7(local.dow));
    put_lsb(&mut bits, 45, 5, to_bcd(local.month));
    put_lsb(&mut bits, 50, 8, to_bcd((local.year % 100) as u32));
    bits[58] = even_parity(&bits[36..58]);

    let mut map = TickMap::new();
    for s in 0..60 {
        let low_ticks = if s == 59 { 0 } else { 2 + 2 * usize::from(bits[s]) };
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

    fn bit(map: &TickMap, second: usize) -> u8 {
        match low_ticks(map, second) {
            2 => 0,
            4 => 1,
            n => panic!("second {second} has unexpected pulse of {n} ticks"),
        }
    }

    #[test]
    fn minute_marker_is_omitted_pulse() {
        let map = encode(compose(2024, 6, 15, 12, 34, 56, 0, 0));
        assert_eq!(low_ticks(&map, 59), 0);
        assert_eq!(bit(&map, 0), 0);
        assert_eq!(bit(&map, 20), 1);
    }

    #[test]
    fn encodes_following_minute_in_local_time() {
        // 2024-01-15 11:30:10 UTC -> transmits 12:31 CET
        let map = encode(compose(2024, 1, 15, 11, 30, 10, 0, 0));
        let minute: u32 = (0..7).map(|i| u32::from(bit(&map, 21 + i)) << i).sum();
        let hour: u32 = (0..6).map(|i| u32::from(bit(&map, 29 + i)) << i).sum();
        assert_eq!(minute, 0x31); // BCD 31
        assert_eq!(hour, 0x12); // BCD 12
        assert_eq!(bit(&map, 17), 0);
        assert_eq!(bit(&map, 18), 1);
    }

    #[test]
    fn zone_flip_at_end_of_summer_time() {
        // Last Sunday of October 2025, one half minute before the
        // 01:00 UTC changeover: announcement is imminent, the zone
        // bits still say CEST, and the announced minute is 02:00 CET.
        let map = encode(compose(2025, 10, 26, 0, 59, 30, 0, 0));
        assert_eq!(bit(&map, 16), 1);
        assert_eq!(bit(&map, 17), 1);
        assert_eq!(bit(&map, 18), 0);
        let hour: u32 = (0..6).map(|i| u32::from(bit(&map, 29 + i)) << i).sum();
        assert_eq!(hour, 0x02);
    }

    #[test]
    fn parities_are_even() {
        let map = encode(compose(2024, 2, 29, 23, 59, 59, 999, 0));
        let sum = |r: std::ops::Range<usize>| r.map(|s| u32::from(bit(&map, s))).sum::<u32>();
        assert_eq!(sum(21..29) % 2, 0);
        assert_eq!(sum(29..36) % 2, 0);
        assert_eq!(sum(36..59) % 2, 0);
    }

    #[test]
    fn weekday_uses_sunday_as_seven() {
        // 2024-06-16 is a Sunday; 10:00 UTC -> 12:01 CEST, still Sunday
        let map = encode(compose(2024, 6, 16, 10, 0, 30, 0, 0));
        let dow: u32 = (0..3).map(|i| u32::from(bit(&map, 42 + i)) << i).sum();
        assert_eq!(dow, 7);
    }
}
