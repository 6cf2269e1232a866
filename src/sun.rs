//! Sunrise and sunset times for a location.
//!
//! Implements the standard sunrise equation (mean anomaly, equation of
//! center, ecliptic longitude, solar transit, declination, hour angle) with
//! the usual -0.833° correction for refraction and the solar disc. Accuracy
//! is within a minute or two at moderate latitudes, far below the resolution
//! the shade schedule needs.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};
use thiserror::Error;

const J1970: f64 = 2_440_587.5;
const J2000: f64 = 2_451_545.0;
const SECONDS_PER_DAY: f64 = 86_400.0;
const EARTH_OBLIQUITY_DEG: f64 = 23.4397;
const SUN_ALTITUDE_DEG: f64 = -0.833;

/// Why sunrise/sunset could not be determined for a date.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SunError {
    #[error("the sun does not set on {date} at latitude {latitude}")]
    AlwaysUp { date: NaiveDate, latitude: f64 },

    #[error("the sun does not rise on {date} at latitude {latitude}")]
    AlwaysDown { date: NaiveDate, latitude: f64 },

    #[error("invalid location: latitude {latitude}, longitude {longitude}")]
    InvalidLocation { latitude: f64, longitude: f64 },

    #[error("sun time for {0} is out of range")]
    OutOfRange(NaiveDate),
}

/// Sunrise and sunset as local wall-clock times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SunTimes {
    pub sunrise: NaiveDateTime,
    pub sunset: NaiveDateTime,
}

/// Compute sunrise and sunset for `date`.
///
/// Latitude is positive north, longitude positive east, `utc_offset_hours`
/// shifts the result from UTC to local time.
pub fn sunrise_sunset(
    latitude: f64,
    longitude: f64,
    utc_offset_hours: f64,
    date: NaiveDate,
) -> Result<SunTimes, SunError> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(SunError::InvalidLocation {
            latitude,
            longitude,
        });
    }

    let days_since_1970 = date
        .and_hms_opt(0, 0, 0)
        .ok_or(SunError::OutOfRange(date))?
        .and_utc()
        .timestamp()
        .div_euclid(86_400) as f64;
    let julian_midnight = days_since_1970 + J1970;

    let n = (julian_midnight - J2000 + 0.0008).ceil();
    let mean_solar_time = n - longitude / 360.0;
    let mean_anomaly = (357.5291 + 0.985_600_28 * mean_solar_time).rem_euclid(360.0);
    let m = mean_anomaly.to_radians();
    let center = 1.9148 * m.sin() + 0.0200 * (2.0 * m).sin() + 0.0003 * (3.0 * m).sin();
    let ecliptic_longitude = (mean_anomaly + center + 180.0 + 102.9372).rem_euclid(360.0);
    let lambda = ecliptic_longitude.to_radians();
    let transit = J2000 + mean_solar_time + 0.0053 * m.sin() - 0.0069 * (2.0 * lambda).sin();

    let sin_decl = lambda.sin() * EARTH_OBLIQUITY_DEG.to_radians().sin();
    let cos_decl = sin_decl.asin().cos();
    let phi = latitude.to_radians();
    let cos_hour_angle =
        (SUN_ALTITUDE_DEG.to_radians().sin() - phi.sin() * sin_decl) / (phi.cos() * cos_decl);

    if cos_hour_angle < -1.0 {
        return Err(SunError::AlwaysUp { date, latitude });
    }
    if cos_hour_angle > 1.0 {
        return Err(SunError::AlwaysDown { date, latitude });
    }

    let hour_angle = cos_hour_angle.acos().to_degrees();
    let to_local = |julian: f64| -> Result<NaiveDateTime, SunError> {
        let secs = ((julian - J1970) * SECONDS_PER_DAY).round() as i64;
        let utc = DateTime::from_timestamp(secs, 0).ok_or(SunError::OutOfRange(date))?;
        let offset = TimeDelta::try_seconds((utc_offset_hours * 3600.0).round() as i64)
            .ok_or(SunError::OutOfRange(date))?;
        Ok(utc.naive_utc() + offset)
    };

    Ok(SunTimes {
        sunrise: to_local(transit - hour_angle / 360.0)?,
        sunset: to_local(transit + hour_angle / 360.0)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn assert_close(actual: NaiveDateTime, date: NaiveDate, h: u32, m: u32) {
        let expected = date.and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap());
        let diff = (actual - expected).num_seconds().abs();
        assert!(diff <= 120, "expected ~{expected}, got {actual}");
    }

    #[test]
    fn test_amsterdam_summer_solstice() {
        let date = NaiveDate::from_ymd_opt(2021, 6, 21).unwrap();
        let times = sunrise_sunset(52.37, 4.89, 2.0, date).unwrap();
        assert_close(times.sunrise, date, 5, 18);
        assert_close(times.sunset, date, 22, 6);
    }

    #[test]
    fn test_amsterdam_winter_solstice() {
        let date = NaiveDate::from_ymd_opt(2021, 12, 21).unwrap();
        let times = sunrise_sunset(52.37, 4.89, 1.0, date).unwrap();
        assert_close(times.sunrise, date, 8, 48);
        assert_close(times.sunset, date, 16, 29);
    }

    #[test]
    fn test_southern_hemisphere() {
        let date = NaiveDate::from_ymd_opt(2021, 6, 21).unwrap();
        let times = sunrise_sunset(-33.87, 151.21, 10.0, date).unwrap();
        assert_close(times.sunrise, date, 7, 0);
        assert_close(times.sunset, date, 16, 54);
    }

    #[test]
    fn test_polar_night_and_midnight_sun() {
        let winter = NaiveDate::from_ymd_opt(2021, 12, 21).unwrap();
        assert!(matches!(
            sunrise_sunset(78.22, 15.65, 1.0, winter),
            Err(SunError::AlwaysDown { .. })
        ));

        let summer = NaiveDate::from_ymd_opt(2021, 6, 21).unwrap();
        assert!(matches!(
            sunrise_sunset(78.22, 15.65, 2.0, summer),
            Err(SunError::AlwaysUp { .. })
        ));
    }

    #[test]
    fn test_invalid_location() {
        let date = NaiveDate::from_ymd_opt(2021, 6, 21).unwrap();
        assert!(matches!(
            sunrise_sunset(95.0, 0.0, 0.0, date),
            Err(SunError::InvalidLocation { .. })
        ));
    }
}
