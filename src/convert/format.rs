//! Scratch-buffer field rendering shared by the converters.
//!
//! Dates render `YYYY-MM-DD`, timestamps `YYYY-MM-DD HH:MM:SS[.mmm]`, and
//! times `HH:MM:SS[.mmm]`, matching what the schema ladder recognizes.

use time::{Date, OffsetDateTime};

pub fn write_date(date: Date, out: &mut Vec<u8>) {
    out.extend_from_slice(date.to_string().as_bytes());
}

pub fn write_datetime(dt: &OffsetDateTime, out: &mut Vec<u8>) {
    let rounded = round_to_millisecond(dt);
    write_date(rounded.date(), out);
    out.push(b' ');
    let time = rounded.time();
    write_two(time.hour(), out);
    out.push(b':');
    write_two(time.minute(), out);
    out.push(b':');
    write_two(time.second(), out);
    let nanos = time.nanosecond();
    if nanos != 0 {
        out.push(b'.');
        let millis = u16::try_from(nanos / 1_000_000).unwrap_or(0);
        write_three(millis, out);
    }
}

/// Renders a time of day given as milliseconds since midnight.
pub fn write_time_millis(total_millis: i64, out: &mut Vec<u8>) {
    let millis = total_millis.rem_euclid(1000);
    let total_seconds = total_millis.div_euclid(1000);
    let seconds = total_seconds.rem_euclid(60);
    let minutes = (total_seconds / 60).rem_euclid(60);
    let hours = total_seconds / 3600;

    write_two(clamp_u8(hours), out);
    out.push(b':');
    write_two(clamp_u8(minutes), out);
    out.push(b':');
    write_two(clamp_u8(seconds), out);
    if millis != 0 {
        out.push(b'.');
        write_three(u16::try_from(millis).unwrap_or(0), out);
    }
}

fn clamp_u8(value: i64) -> u8 {
    u8::try_from(value).unwrap_or(u8::MAX)
}

fn round_to_millisecond(dt: &OffsetDateTime) -> OffsetDateTime {
    let nanos = u64::from(dt.time().nanosecond());
    let mut millis = (nanos + 500_000) / 1_000_000;
    let mut adjusted = *dt;
    if millis == 1_000 {
        millis = 0;
        if let Some(next) = adjusted.checked_add(time::Duration::seconds(1)) {
            adjusted = next;
        } else {
            return *dt;
        }
    }
    let new_nanos = u32::try_from(millis * 1_000_000).unwrap_or(0);
    adjusted.replace_nanosecond(new_nanos).unwrap_or(*dt)
}

#[inline]
pub fn write_two(v: u8, out: &mut Vec<u8>) {
    out.push(b'0' + (v / 10));
    out.push(b'0' + (v % 10));
}

#[inline]
pub fn write_three(v: u16, out: &mut Vec<u8>) {
    let v = v.min(999);
    out.push(b'0' + u8::try_from(v / 100).unwrap_or(0));
    out.push(b'0' + u8::try_from((v / 10) % 10).unwrap_or(0));
    out.push(b'0' + u8::try_from(v % 10).unwrap_or(0));
}

#[cfg(test)]
mod tests {
    use super::{write_datetime, write_time_millis};
    use time::OffsetDateTime;

    fn rendered(f: impl FnOnce(&mut Vec<u8>)) -> String {
        let mut out = Vec::new();
        f(&mut out);
        String::from_utf8(out).expect("ascii")
    }

    #[test]
    fn datetime_rendering() {
        let dt = OffsetDateTime::from_unix_timestamp(1_625_400_000).expect("timestamp");
        assert_eq!(
            rendered(|out| write_datetime(&dt, out)),
            "2021-07-04 12:00:00"
        );
        let with_millis =
            OffsetDateTime::from_unix_timestamp_nanos(1_625_400_000_125_000_000).expect("ts");
        assert_eq!(
            rendered(|out| write_datetime(&with_millis, out)),
            "2021-07-04 12:00:00.125"
        );
    }

    #[test]
    fn time_rendering() {
        assert_eq!(rendered(|out| write_time_millis(0, out)), "00:00:00");
        assert_eq!(
            rendered(|out| write_time_millis((13 * 3600 + 5 * 60 + 7) * 1000 + 250, out)),
            "13:05:07.250"
        );
    }
}
