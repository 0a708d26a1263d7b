//! Equatorial to horizontal coordinate conversion.
//!
//! Sidereal time follows the IAU 1982 GMST expression, which is accurate to
//! well under a second over the decades this bridge cares about. No
//! precession, nutation or refraction is applied: catalogue (J2000) RA/Dec
//! are treated as of-date, which shifts altitudes by at most a few
//! arcminutes and is negligible against horizon limits of tens of degrees.

use qtty::Degrees;

use crate::api::{AltAz, HorizonCrossing, ModifiedJulianDate, ObserverLocation};

/// Ratio of the mean solar day to the sidereal day.
pub const SIDEREAL_RATE: f64 = 1.002_737_909_35;
const JD_J2000: f64 = 2_451_545.0;
const DAYS_PER_JULIAN_CENTURY: f64 = 36525.0;

/// Greenwich Mean Sidereal Time in degrees, wrapped to [0, 360).
pub fn greenwich_sidereal_time(t: ModifiedJulianDate) -> Degrees {
    let d = t.julian_date() - JD_J2000;
    let c = d / DAYS_PER_JULIAN_CENTURY;
    let gmst = 280.460_618_37 + 360.985_647_366_29 * d + 0.000_387_933 * c * c
        - c * c * c / 38_710_000.0;
    Degrees::new(gmst.rem_euclid(360.0))
}

/// Local sidereal time in degrees for an east-positive longitude.
pub fn local_sidereal_time(t: ModifiedJulianDate, longitude: Degrees) -> Degrees {
    Degrees::new((greenwich_sidereal_time(t).value() + longitude.value()).rem_euclid(360.0))
}

/// Hour angle in degrees, wrapped to (-180, 180]. Negative east of the meridian.
pub fn hour_angle(
    ra: Degrees,
    location: &ObserverLocation,
    t: ModifiedJulianDate,
) -> Degrees {
    let lst = local_sidereal_time(t, Degrees::new(location.longitude));
    Degrees::new(wrap_signed(lst.value() - ra.value()))
}

/// Convert equatorial coordinates to altitude/azimuth for an observer.
///
/// Azimuth is measured from north through east.
pub fn equatorial_to_horizontal(
    ra: Degrees,
    dec: Degrees,
    location: &ObserverLocation,
    t: ModifiedJulianDate,
) -> AltAz {
    let ha = hour_angle(ra, location, t).value().to_radians();
    let lat = location.latitude.to_radians();
    let dec = dec.value().to_radians();

    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_dec, cos_dec) = dec.sin_cos();
    let (sin_ha, cos_ha) = ha.sin_cos();

    let sin_alt = (sin_lat * sin_dec + cos_lat * cos_dec * cos_ha).clamp(-1.0, 1.0);
    let altitude = sin_alt.asin().to_degrees();

    let y = -cos_dec * sin_ha;
    let x = sin_dec * cos_lat - cos_dec * sin_lat * cos_ha;
    let azimuth = y.atan2(x).to_degrees().rem_euclid(360.0);

    AltAz {
        altitude: Degrees::new(altitude),
        azimuth: Degrees::new(azimuth),
    }
}

/// Next crossing of `min_altitude` for a fixed equatorial position.
///
/// Uses the closed-form semi-diurnal arc, so the result is exact for the
/// rotation model above and costs a handful of trigonometric calls.
pub fn horizon_crossing(
    ra: Degrees,
    dec: Degrees,
    location: &ObserverLocation,
    t: ModifiedJulianDate,
    min_altitude: Degrees,
) -> HorizonCrossing {
    let lat = location.latitude.to_radians();
    let dec_rad = dec.value().to_radians();
    let denom = lat.cos() * dec_rad.cos();
    let numer = min_altitude.value().to_radians().sin() - lat.sin() * dec_rad.sin();

    // At the poles (of the sky or of the Earth) the altitude does not change.
    if denom.abs() < 1e-12 {
        let altitude = (lat.sin() * dec_rad.sin()).clamp(-1.0, 1.0).asin().to_degrees();
        return if altitude >= min_altitude.value() {
            HorizonCrossing::AlwaysAbove
        } else {
            HorizonCrossing::NeverRises
        };
    }

    let cos_h0 = numer / denom;
    if cos_h0 <= -1.0 {
        return HorizonCrossing::AlwaysAbove;
    }
    if cos_h0 > 1.0 {
        return HorizonCrossing::NeverRises;
    }

    // Semi-diurnal arc: the field is above the limit while |HA| <= h0.
    let h0 = cos_h0.acos().to_degrees();
    let ha = hour_angle(ra, location, t).value();

    if ha.abs() <= h0 {
        HorizonCrossing::SetsIn(sidereal_degrees_to_hours(h0 - ha))
    } else {
        HorizonCrossing::RisesIn(sidereal_degrees_to_hours((-h0 - ha).rem_euclid(360.0)))
    }
}

/// Convert an hour-angle span to elapsed solar hours.
fn sidereal_degrees_to_hours(degrees: f64) -> qtty::Hours {
    qtty::Hours::new(degrees / 15.0 / SIDEREAL_RATE)
}

fn wrap_signed(degrees: f64) -> f64 {
    let wrapped = (degrees + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}
