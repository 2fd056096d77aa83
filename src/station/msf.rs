//! MSF (Anthorn, UK, 60 kHz) minute layout.
//!
//! On-off keying with two data channels: every second starts with
//! 100 ms of carrier-off, the A bit adds 100 ms and the B bit another
//! 100 ms. Second 0 is a 500 ms minute marker, and the A bits of
//! seconds 53–58 form the fixed `01111110` secondary marker. DUT1 is
//! signalled on the B bits of seconds 1–16, parity and summer-time
//! flags on the B bits of seconds 53–58. The encoded civil time is
//! GMT/BST of the minute after the one being transmitted.

use super::{odd_parity, put_msb, to_bcd, StationId, TickMap, TICKS_PER_SECOND};
use crate::datetime::{self, MSECS_PER_HOUR, MSECS_PER_MIN};

pub(super) fn encode(utc_ms: i64, dut1_ms: i64) -> TickMap {
    let now = datetime::parse(utc_ms);
    let (now_summer, change_mins) = datetime::eu_dst(&now);

    let xmit_ms = (utc_ms.div_euclid(MSECS_PER_MIN) + 1) * MSECS_PER_MIN;
    let (xmit_summer, _) = datetime::eu_dst(&datetime::parse(xmit_ms));
    let offset = StationId::Msf.info().utc_offset_ms
        + if xmit_summer { MSECS_PER_HOUR } else { 0 };
    let local = datetime::parse(xmit_ms + offset);

    let mut a = [0u8; 60];
    let mut b = [0u8; 60];

    // DUT1 in positive or negative tenths of a second; config
    // validation keeps the magnitude below 0.9 s, the most the eight
    // bits per sign can key
    let tenths = (dut1_ms / 100).unsigned_abs() as usize;
    let dut1_base = if dut1_ms >= 0 { 1 } else { 9 };
    for i in 0..tenths {
        b[dut1_base + i] = 1;
    }

    put_msb(&mut a, 17, 8, to_bcd((local.year % 100) as u32));
    put_msb(&mut a, 25, 5, to_bcd(local.month));
    put_msb(&mut a, 30, 6, to_bcd(local.day));
    put_msb(&mut a, 36, 3, local.dow);
    put_msb(&mut a, 39, 6, to_bcd(local.hour));
    put_msb(&mut a, 45, 7, to_bcd(local.min));
    for s in 53..=58 {
        a[s] = 1;
    }

    b[53] = u8::from((1..=61).contains(&change_mins));
    b[54] = odd_parity(&a[17..25]);
    b[55] = odd_parity(&a[25..36]);
    b[56] = odd_parity(&a[36..39]);
    b[57] = odd_parity(&a[39..52]);
    b[58] = u8::from(now_summer);

    let mut map = TickMap::new();
    map.write_low_first(0, TICKS_PER_SECOND / 2); // 500 ms marker
    for s in 1..60 {
        map.write_low_first(s, 2 + 2 * usize::from(a[s]) + 2 * usize::from(b[s]));
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datetime::compose;

    fn low_ticks(map: &TickMap, second: usize) -> usize {
        (0..TICKS_PER_SECOND)
            .take_while(|&t| !map.get(second * 20 + t))
            .count()
    }

    #[test]
    fn new_year_with_positive_dut1() {
        // 2024-01-01 00:00:00 UTC, DUT1 = +0.3 s: B bits 1..=3 set,
        // no imminent change, GMT in effect.
        let map = encode(compose(2024, 1, 1, 0, 0, 0, 0, 0), 300);
        assert_eq!(low_ticks(&map, 0), 10);
        for s in 1..=3 {
            assert_eq!(low_ticks(&map, s), 4, "second {s}");
        }
        for s in 4..=16 {
            assert_eq!(low_ticks(&map, s), 2, "second {s}");
        }
        // second 53 carries only the secondary-marker A bit
        assert_eq!(low_ticks(&map, 53), 4);
        // second 58: A bit set, BST bit clear
        assert_eq!(low_ticks(&map, 58), 4);
    }

    #[test]
    fn negative_dut1_moves_to_upper_bits() {
        let map = encode(compose(2024, 1, 1, 0, 0, 0, 0, 0), -200);
        for s in 1..=8 {
            assert_eq!(low_ticks(&map, s), 2, "second {s}");
        }
        assert_eq!(low_ticks(&map, 9), 4);
        assert_eq!(low_ticks(&map, 10), 4);
        assert_eq!(low_ticks(&map, 11), 2);
    }

    #[test]
    fn encodes_following_minute() {
        // 10:29:40 UTC in January -> announces 10:30 GMT
        let map = encode(compose(2024, 1, 15, 10, 29, 40, 0, 0), 0);
        let minute: u32 = (0..7)
            .map(|i| {
                let a = u32::from(low_ticks(&map, 45 + i as usize) >= 4);
                a << (6 - i)
            })
            .sum();
        assert_eq!(minute, 0x30);
    }

    #[test]
    fn bst_flag_in_summer() {
        let map = encode(compose(2024, 6, 15, 12, 0, 30, 0, 0), 0);
        // second 58: A bit plus BST B bit -> 300 ms
        assert_eq!(low_ticks(&map, 58), 6);
    }

    #[test]
    fn secondary_marker_shape() {
        let map = encode(compose(2024, 3, 5, 9, 41, 20, 0, 0), 0);
        assert_eq!(low_ticks(&map, 52), 2);
        for s in 53..=57 {
            assert!(low_ticks(&map, s) >= 4, "second {s}");
        }
        assert_eq!(low_ticks(&map, 59), 2);
    }
}
