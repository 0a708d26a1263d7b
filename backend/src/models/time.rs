use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// MJD of the Unix epoch (1970-01-01 00:00:00 UTC).
pub const MJD_UNIX_EPOCH: f64 = 40587.0;
/// Offset between Julian Date and Modified Julian Date.
pub const MJD_JD_OFFSET: f64 = 2_400_000.5;
const SECONDS_PER_DAY: f64 = 86400.0;

/// Modified Julian Date representation.
/// MJD 0 = 1858-11-17 00:00:00 UTC
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModifiedJulianDate(f64);

impl ModifiedJulianDate {
    /// Create a new MJD value.
    pub const fn new(v: f64) -> Self {
        Self(v)
    }

    /// Current instant.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Raw MJD value as f64.
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Julian Date of this instant.
    pub fn julian_date(&self) -> f64 {
        self.0 + MJD_JD_OFFSET
    }

    /// Convert to Unix timestamp (seconds since 1970-01-01 00:00:00 UTC).
    pub fn to_unix_timestamp(&self) -> f64 {
        (self.0 - MJD_UNIX_EPOCH) * SECONDS_PER_DAY
    }

    /// Create from Unix timestamp (seconds since 1970-01-01 00:00:00 UTC).
    pub fn from_unix_timestamp(timestamp: f64) -> Self {
        Self::new(timestamp / SECONDS_PER_DAY + MJD_UNIX_EPOCH)
    }

    /// Convert to chrono DateTime<Utc>.
    pub fn to_datetime(&self) -> DateTime<Utc> {
        let secs = self.to_unix_timestamp();
        let secs_i64 = secs.floor() as i64;
        let nanos = ((secs - secs.floor()) * 1e9) as u32;
        DateTime::from_timestamp(secs_i64, nanos).unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Create from chrono DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self::from_unix_timestamp(dt.timestamp() as f64 + dt.timestamp_subsec_nanos() as f64 / 1e9)
    }

    /// Shift by a (possibly negative) number of hours.
    pub fn plus_hours(&self, hours: f64) -> Self {
        Self::new(self.0 + hours / 24.0)
    }

    /// Signed difference `self - other` in days.
    pub fn days_since(&self, other: ModifiedJulianDate) -> f64 {
        self.0 - other.0
    }
}

impl From<f64> for ModifiedJulianDate {
    fn from(v: f64) -> Self {
        ModifiedJulianDate::new(v)
    }
}

impl From<DateTime<Utc>> for ModifiedJulianDate {
    fn from(dt: DateTime<Utc>) -> Self {
        ModifiedJulianDate::from_datetime(dt)
    }
}

impl std::fmt::Display for ModifiedJulianDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_datetime().format("%Y-%m-%dT%H:%M:%S%.3fZ"))
    }
}

#[cfg(test)]
mod tests {
    use super::ModifiedJulianDate;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_mjd_new() {
        let mjd = ModifiedJulianDate::new(50000.0);
        assert_eq!(mjd.value(), 50000.0);
    }

    #[test]
    fn test_mjd_ordering() {
        let mjd1 = ModifiedJulianDate::new(50000.0);
        let mjd2 = ModifiedJulianDate::new(51000.0);

        assert!(mjd1 < mjd2);
        assert!(mjd2 > mjd1);
    }

    #[test]
    fn test_mjd_to_unix_timestamp() {
        // MJD 40587.0 corresponds to Unix epoch (1970-01-01)
        let mjd = ModifiedJulianDate::new(40587.0);
        assert!((mjd.to_unix_timestamp()).abs() < 1.0);
    }

    #[test]
    fn test_j2000_julian_date() {
        let j2000 = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        let mjd = ModifiedJulianDate::from_datetime(j2000);
        assert!((mjd.value() - 51544.5).abs() < 1e-9);
        assert!((mjd.julian_date() - 2451545.0).abs() < 1e-9);
    }

    #[test]
    fn test_plus_hours() {
        let mjd = ModifiedJulianDate::new(60000.0).plus_hours(6.0);
        assert!((mjd.value() - 60000.25).abs() < 1e-12);
        assert!((mjd.days_since(ModifiedJulianDate::new(60000.0)) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_datetime_roundtrip() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 20, 1, 6, 0).unwrap();
        let back = ModifiedJulianDate::from_datetime(dt).to_datetime();
        assert!((back - dt).num_milliseconds().abs() <= 1);
    }

    #[test]
    fn test_serializes_as_plain_number() {
        let json = serde_json::to_string(&ModifiedJulianDate::new(60000.5)).unwrap();
        assert_eq!(json, "60000.5");
    }
}
