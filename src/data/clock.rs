//! Clock payloads for the Current Time Service.
//!
//! The device keeps its schedule against a wall clock set by the client
//! through two standard characteristics: Current Time (0x2A2B) and Local
//! Time Information (0x2A0F).

use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Datelike, Duration, FixedOffset, Local, TimeZone, Timelike, Utc};
use chrono_tz::{OffsetComponents, Tz};

/// Size of the Current Time payload in bytes.
pub const CURRENT_TIME_SIZE: usize = 10;

/// Size of the Local Time Information payload in bytes.
pub const LOCAL_TIME_INFORMATION_SIZE: usize = 2;

/// Adjust reason bit: external reference time update.
pub const ADJUST_REASON_EXTERNAL_REFERENCE: u8 = 0x02;

/// Quarter hours in a day; negative offsets wrap against this.
const QUARTER_HOURS_PER_DAY: i32 = 24 * 4;

/// A local date-time together with its zone's DST component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockTime {
    /// Local time, carrying its total offset from UTC.
    pub local: DateTime<FixedOffset>,
    /// Portion of the UTC offset due to daylight saving.
    pub dst: Duration,
}

impl ClockTime {
    /// Create a clock time with no daylight saving component.
    pub fn new(local: DateTime<FixedOffset>) -> Self {
        Self {
            local,
            dst: Duration::zero(),
        }
    }

    /// Set the daylight saving component.
    pub fn with_dst(mut self, dst: Duration) -> Self {
        self.dst = dst;
        self
    }

    /// Create a clock time from a date-time in a zone that knows its
    /// daylight saving component, such as a [`chrono_tz::Tz`].
    pub fn from_zoned<Z>(time: &DateTime<Z>) -> Self
    where
        Z: TimeZone,
        Z::Offset: OffsetComponents,
    {
        Self {
            local: time.fixed_offset(),
            dst: time.offset().dst_offset(),
        }
    }

    /// The current time in the named IANA zone, with its DST component.
    pub fn now_in(zone: Tz) -> Self {
        Self::from_zoned(&Utc::now().with_timezone(&zone))
    }

    /// The current system time in the system time zone.
    ///
    /// The system zone does not expose its DST component, so it is reported
    /// as zero; prefer [`ClockTime::now_in`] when the zone name is known.
    pub fn now_local() -> Self {
        Self::new(Local::now().fixed_offset())
    }

    /// Offset from UTC in quarter hours, as carried by Local Time Information.
    ///
    /// Negative offsets are encoded as `96 - |quarter hours|`.
    pub fn offset_quarter_hours(&self) -> u8 {
        let quarters = self.local.offset().local_minus_utc() / (15 * 60);
        if quarters < 0 {
            (QUARTER_HOURS_PER_DAY - quarters.abs()) as u8
        } else {
            quarters as u8
        }
    }

    /// DST offset in quarter hours. Negative DST is sent as standard time.
    pub fn dst_quarter_hours(&self) -> u8 {
        (self.dst.num_minutes() / 15).clamp(0, i64::from(u8::MAX)) as u8
    }

    /// Build the 10-byte Current Time payload.
    ///
    /// Layout: year (u16 LE), month, day, hours, minutes, seconds,
    /// ISO weekday (1 = Monday), fractions256 (always 0), adjust reason.
    pub fn current_time_payload(&self) -> Vec<u8> {
        let local = &self.local;
        let mut buf = BytesMut::with_capacity(CURRENT_TIME_SIZE);

        buf.put_u16_le(local.year() as u16);
        buf.put_u8(local.month() as u8);
        buf.put_u8(local.day() as u8);
        buf.put_u8(local.hour() as u8);
        buf.put_u8(local.minute() as u8);
        buf.put_u8(local.second() as u8);
        buf.put_u8(local.weekday().number_from_monday() as u8);
        buf.put_u8(0);
        buf.put_u8(ADJUST_REASON_EXTERNAL_REFERENCE);

        buf.to_vec()
    }

    /// Build the 2-byte Local Time Information payload.
    pub fn local_time_information_payload(&self) -> Vec<u8> {
        vec![self.offset_quarter_hours(), self.dst_quarter_hours()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn at(offset_secs: i32, y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> ClockTime {
        let zone = FixedOffset::east_opt(offset_secs).unwrap();
        ClockTime::new(zone.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap())
    }

    #[test]
    fn test_current_time_payload() {
        // Tuesday
        let time = at(3600, 2023, 3, 14, 9, 5, 30);
        let payload = time.current_time_payload();

        assert_eq!(payload.len(), CURRENT_TIME_SIZE);
        assert_eq!(u16::from_le_bytes([payload[0], payload[1]]), 2023);
        assert_eq!(payload, vec![0xE7, 0x07, 3, 14, 9, 5, 30, 2, 0, 0x02]);
    }

    #[test]
    fn test_local_time_information_positive_offset() {
        let time = at(3600, 2023, 3, 14, 9, 5, 30);
        assert_eq!(time.local_time_information_payload(), vec![4, 0]);
    }

    #[test]
    fn test_local_time_information_negative_offset() {
        let time = at(-30 * 60, 2023, 3, 14, 9, 5, 30);
        assert_eq!(time.offset_quarter_hours(), 94);

        let time = at(-5 * 3600, 2023, 3, 14, 9, 5, 30);
        assert_eq!(time.offset_quarter_hours(), 96 - 20);
    }

    #[test]
    fn test_dst_component() {
        let time = at(-4 * 3600, 2023, 7, 4, 12, 0, 0).with_dst(Duration::hours(1));
        assert_eq!(time.local_time_information_payload(), vec![96 - 16, 4]);
    }

    #[test]
    fn test_negative_dst_is_clamped() {
        let time = at(0, 2023, 1, 10, 12, 0, 0).with_dst(Duration::hours(-1));
        assert_eq!(time.dst_quarter_hours(), 0);
    }

    #[test]
    fn test_named_zone_in_summer_time() {
        let time = ClockTime::from_zoned(
            &chrono_tz::Europe::London
                .with_ymd_and_hms(2023, 7, 4, 12, 0, 0)
                .unwrap(),
        );
        assert_eq!(time.local_time_information_payload(), vec![4, 4]);
        assert_eq!(time.current_time_payload()[4], 12);
    }

    #[test]
    fn test_named_zone_in_standard_time() {
        let time = ClockTime::from_zoned(
            &chrono_tz::America::New_York
                .with_ymd_and_hms(2023, 1, 10, 8, 30, 0)
                .unwrap(),
        );
        assert_eq!(time.local_time_information_payload(), vec![96 - 20, 0]);
    }

    #[test]
    fn test_sunday_is_seven() {
        let time = at(0, 2023, 3, 19, 0, 0, 0);
        assert_eq!(time.current_time_payload()[7], 7);
    }
}
