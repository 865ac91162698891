/*!
 * Compact Position Reporting.
 *
 * Positions are broadcast as 17-bit fractions of a latitude/longitude
 * zone, alternating between an even and an odd zone grid. Two decoding
 * strategies exist:
 *
 * - globally unambiguous decoding, combining the latest odd/even pair;
 * - locally referenced decoding, combining a single message with a
 *   position known to be nearby (operator reference or last decoded
 *   position).
 */
use deku::prelude::*;
use libm::{fabs, floor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of latitude zones between the equator and a pole
const NZ: f64 = 15.0;

/// CPR values are encoded on 17 bits
const CPR_MAX: f64 = 131_072.0;

/// Latitude zone width of the even grid, 6 degrees exactly
pub const AIR_D_LAT_EVEN: f64 = 360.0 / (4.0 * NZ);

/// Latitude zone width of the odd grid, about 6.101695 degrees
pub const AIR_D_LAT_ODD: f64 = 360.0 / (4.0 * NZ - 1.0);

/// A flag qualifying a CPR position as odd or even
#[derive(Debug, PartialEq, Eq, Serialize, DekuRead, Copy, Clone)]
#[deku(type = "u8", bits = "1")]
#[serde(rename_all = "snake_case")]
pub enum CprFormat {
    Even = 0,
    Odd = 1,
}

impl fmt::Display for CprFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Even => "even",
                Self::Odd => "odd",
            }
        )
    }
}

/// A decoded WGS84 position
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Copy)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// A raw 17-bit CPR encoding, one half of an odd/even pair
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct CprCoordinates {
    pub lat_cpr: u32,
    pub lon_cpr: u32,
}

/// Why a position could not be resolved. These are expected on a live
/// feed and never fatal.
#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
pub enum CprError {
    #[error("only one half of the odd/even pair has been received")]
    MissingParity,
    #[error("the matching half of the odd/even pair is too old")]
    Stale,
    #[error("the odd/even pair straddles a longitude zone boundary")]
    ZoneStraddle,
    #[error("the decoded position is out of range of the reference")]
    OutOfRange,
    #[error("surface positions cannot be resolved without a reference")]
    NoReference,
}

/// Latitude transition table from 1090-WP-9-14: `NL_TABLE[k]` is the
/// latitude up to which the globe is divided into `59 - k` longitude
/// zones. The last entry closes the polar zone.
#[rustfmt::skip]
pub const NL_TABLE: [f64; 59] = [
    10.470_471_30, 14.828_174_37, 18.186_263_57, 21.029_394_93,
    23.545_044_87, 25.829_247_07, 27.938_987_10, 29.911_356_86,
    31.772_097_08, 33.539_934_36, 35.228_995_98, 36.850_251_08,
    38.412_418_92, 39.922_566_84, 41.386_518_32, 42.809_140_12,
    44.194_549_51, 45.546_267_23, 46.867_332_52, 48.160_391_28,
    49.427_764_39, 50.671_501_66, 51.893_424_69, 53.095_161_53,
    54.278_174_72, 55.443_784_44, 56.593_187_56, 57.727_473_54,
    58.847_637_76, 59.954_592_77, 61.049_177_74, 62.132_166_59,
    63.204_274_79, 64.266_165_23, 65.318_453_10, 66.361_710_08,
    67.396_467_74, 68.423_220_22, 69.442_426_31, 70.454_510_75,
    71.459_864_73, 72.458_845_45, 73.451_774_42, 74.438_934_16,
    75.420_562_57, 76.396_843_91, 77.367_894_61, 78.333_740_83,
    79.294_282_25, 80.249_232_13, 81.198_013_49, 82.139_569_81,
    83.071_994_45, 83.991_735_63, 84.891_661_91, 85.755_416_21,
    86.535_369_98, 87.000_000_00, 90.000_000_00,
];

/// Number of longitude zones (1 to 59) at a given latitude, by binary
/// search in the transition table.
pub fn num_longitude_zones(lat: f64) -> u64 {
    let lat = fabs(lat);
    let idx = NL_TABLE.partition_point(|&threshold| lat >= threshold);
    std::cmp::max(59 - idx as u64, 1)
}

// The sign of % follows the dividend in Rust; CPR needs the
// non-negative remainder.
fn modulo(a: f64, b: f64) -> f64 {
    if a >= 0. {
        a % b
    } else {
        a % b + fabs(b)
    }
}

fn haversine_nm(p1: &Position, p2: &Position) -> f64 {
    let d_lat = (p2.latitude - p1.latitude).to_radians();
    let d_lon = (p2.longitude - p1.longitude).to_radians();
    let a = (d_lat / 2.0).sin() * (d_lat / 2.0).sin()
        + p1.latitude.to_radians().cos()
            * p2.latitude.to_radians().cos()
            * (d_lon / 2.0).sin()
            * (d_lon / 2.0).sin();
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    const EARTH_RADIUS_KM: f64 = 6371.0;
    EARTH_RADIUS_KM * c / 1.852
}

/// Maximum distance between a globally decoded position and the
/// configured reference
pub const GLOBAL_RANGE_NM: f64 = 45.0;

/// Maximum distance between a locally decoded position and its
/// reference
pub const LOCAL_RANGE_NM: f64 = 180.0;

/**
 * Globally unambiguous decode of an airborne position from the two
 * halves of an odd/even pair. `latest` is the parity of the most
 * recently received half, whose zone grid the result snaps to.
 */
pub fn global_airborne(
    even: &CprCoordinates,
    odd: &CprCoordinates,
    latest: CprFormat,
) -> Result<Position, CprError> {
    let cpr_lat_even = f64::from(even.lat_cpr) / CPR_MAX;
    let cpr_lon_even = f64::from(even.lon_cpr) / CPR_MAX;
    let cpr_lat_odd = f64::from(odd.lat_cpr) / CPR_MAX;
    let cpr_lon_odd = f64::from(odd.lon_cpr) / CPR_MAX;

    // Latitude zone index
    let j = floor(59.0 * cpr_lat_even - 60.0 * cpr_lat_odd + 0.5);

    let mut lat_even = AIR_D_LAT_EVEN * (modulo(j, 60.) + cpr_lat_even);
    let mut lat_odd = AIR_D_LAT_ODD * (modulo(j, 59.) + cpr_lat_odd);

    if lat_even >= 270.0 {
        lat_even -= 360.0;
    }
    if lat_odd >= 270.0 {
        lat_odd -= 360.0;
    }

    if !(-90. ..=90.).contains(&lat_even) || !(-90. ..=90.).contains(&lat_odd)
    {
        return Err(CprError::OutOfRange);
    }

    // Both halves must agree on the longitude zone count, otherwise
    // the aircraft crossed a boundary between the two transmissions
    let nl = num_longitude_zones(lat_even);
    if nl != num_longitude_zones(lat_odd) {
        return Err(CprError::ZoneStraddle);
    }

    let (lat, parity, cpr_lon) = match latest {
        CprFormat::Even => (lat_even, 0, cpr_lon_even),
        CprFormat::Odd => (lat_odd, 1, cpr_lon_odd),
    };

    let ni = std::cmp::max(nl - parity, 1) as f64;
    let m = floor(
        cpr_lon_even * (nl - 1) as f64 - cpr_lon_odd * nl as f64 + 0.5,
    );

    let mut lon = (360.0 / ni) * (modulo(m, ni) + cpr_lon);
    if lon >= 180.0 {
        lon -= 360.0;
    }

    Ok(Position {
        latitude: lat,
        longitude: lon,
    })
}

/**
 * Globally unambiguous decode of a surface position. The zone sizes
 * are a quarter of the airborne ones, so the pair only pins the
 * position down to one of four solutions per axis; the one closest to
 * the reference wins.
 */
pub fn global_surface(
    even: &CprCoordinates,
    odd: &CprCoordinates,
    latest: CprFormat,
    reference: &Position,
) -> Result<Position, CprError> {
    let cpr_lat_even = f64::from(even.lat_cpr) / CPR_MAX;
    let cpr_lon_even = f64::from(even.lon_cpr) / CPR_MAX;
    let cpr_lat_odd = f64::from(odd.lat_cpr) / CPR_MAX;
    let cpr_lon_odd = f64::from(odd.lon_cpr) / CPR_MAX;

    let d_lat_even = AIR_D_LAT_EVEN / 4.0;
    let d_lat_odd = AIR_D_LAT_ODD / 4.0;

    let j = floor(59.0 * cpr_lat_even - 60.0 * cpr_lat_odd + 0.5);

    let lat_even = d_lat_even * (modulo(j, 60.) + cpr_lat_even);
    let lat_odd = d_lat_odd * (modulo(j, 59.) + cpr_lat_odd);

    // The surface grid only spans a quarter of the globe: pick the
    // solution on the hemisphere of the reference
    let resolve = |lat: f64| {
        if reference.latitude < 0. {
            lat - 90.
        } else {
            lat
        }
    };
    let lat_even = resolve(lat_even);
    let lat_odd = resolve(lat_odd);

    if !(-90. ..=90.).contains(&lat_even) || !(-90. ..=90.).contains(&lat_odd)
    {
        return Err(CprError::OutOfRange);
    }

    let nl = num_longitude_zones(lat_even);
    if nl != num_longitude_zones(lat_odd) {
        return Err(CprError::ZoneStraddle);
    }

    let (lat, parity, cpr_lon) = match latest {
        CprFormat::Even => (lat_even, 0, cpr_lon_even),
        CprFormat::Odd => (lat_odd, 1, cpr_lon_odd),
    };

    let ni = std::cmp::max(nl - parity, 1) as f64;
    let m = floor(
        cpr_lon_even * (nl - 1) as f64 - cpr_lon_odd * nl as f64 + 0.5,
    );
    let lon = (90.0 / ni) * (modulo(m, ni) + cpr_lon);

    // Four longitude solutions, 90 degrees apart; again the closest to
    // the reference wins
    let mut best: Option<Position> = None;
    for k in 0..4 {
        let mut candidate = lon + 90.0 * f64::from(k);
        if candidate >= 180.0 {
            candidate -= 360.0;
        }
        let position = Position {
            latitude: lat,
            longitude: candidate,
        };
        best = match best {
            Some(b)
                if haversine_nm(&b, reference)
                    <= haversine_nm(&position, reference) =>
            {
                Some(b)
            }
            _ => Some(position),
        };
    }

    best.ok_or(CprError::NoReference)
}

/**
 * Locally referenced decode of an airborne position: the reference
 * resolves the zone index directly, so a single message suffices. The
 * result is rejected when it falls more than half a zone away from the
 * reference.
 */
pub fn local_airborne(
    msg: &CprCoordinates,
    parity: CprFormat,
    reference: &Position,
) -> Result<Position, CprError> {
    local_decode(msg, parity, reference, false)
}

/// Locally referenced decode of a surface position, on the quarter
/// sized zone grid.
pub fn local_surface(
    msg: &CprCoordinates,
    parity: CprFormat,
    reference: &Position,
) -> Result<Position, CprError> {
    local_decode(msg, parity, reference, true)
}

fn local_decode(
    msg: &CprCoordinates,
    parity: CprFormat,
    reference: &Position,
    surface: bool,
) -> Result<Position, CprError> {
    let cpr_lat = f64::from(msg.lat_cpr) / CPR_MAX;
    let cpr_lon = f64::from(msg.lon_cpr) / CPR_MAX;

    let span = if surface { 90. } else { 360. };
    let d_lat = match parity {
        CprFormat::Even => span / 60.,
        CprFormat::Odd => span / 59.,
    };

    let j = floor(reference.latitude / d_lat)
        + floor(0.5 + modulo(reference.latitude, d_lat) / d_lat - cpr_lat);
    let lat = d_lat * (j + cpr_lat);

    if !(-90. ..=90.).contains(&lat) {
        return Err(CprError::OutOfRange);
    }
    if fabs(lat - reference.latitude) > d_lat / 2. {
        return Err(CprError::OutOfRange);
    }

    let ni = match parity {
        CprFormat::Even => num_longitude_zones(lat),
        CprFormat::Odd => num_longitude_zones(lat) - 1,
    };
    let d_lon = if ni > 0 { span / ni as f64 } else { span };
    let m = floor(reference.longitude / d_lon)
        + floor(0.5 + modulo(reference.longitude, d_lon) / d_lon - cpr_lon);
    let lon = d_lon * (m + cpr_lon);

    if fabs(lon - reference.longitude) > d_lon / 2. {
        return Err(CprError::OutOfRange);
    }

    let position = Position {
        latitude: lat,
        longitude: lon,
    };
    if haversine_nm(&position, reference) > LOCAL_RANGE_NM {
        return Err(CprError::OutOfRange);
    }

    Ok(position)
}

/// Range check of a globally decoded position against the configured
/// receiver location.
pub fn check_global_range(
    position: &Position,
    reference: &Position,
) -> Result<(), CprError> {
    if haversine_nm(position, reference) > GLOBAL_RANGE_NM {
        return Err(CprError::OutOfRange);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zone_widths() {
        assert_eq!(format!("{AIR_D_LAT_EVEN:+0.6}"), "+6.000000");
        assert_eq!(format!("{AIR_D_LAT_ODD:+0.6}"), "+6.101695");
    }

    #[test]
    fn longitude_zone_boundaries() {
        // just below each transition the zone count must still hold
        for i in 1..=59u64 {
            let threshold = NL_TABLE[(59 - i) as usize];
            assert_eq!(num_longitude_zones(threshold - 0.01), i);
        }
        assert_eq!(num_longitude_zones(0.0), 59);
        assert_eq!(num_longitude_zones(-35.0), 49);
        assert_eq!(num_longitude_zones(90.0), 1);
    }

    #[test]
    fn global_airborne_reference_vectors() {
        // (even lat, even lon, odd lat, odd lon) and the expected
        // decode for each of the two arrival orders
        struct Vector {
            even: CprCoordinates,
            odd: CprCoordinates,
            odd_last: (&'static str, &'static str),
            even_last: (&'static str, &'static str),
        }
        let vectors = [
            Vector {
                even: CprCoordinates { lat_cpr: 83068, lon_cpr: 15070 },
                odd: CprCoordinates { lat_cpr: 94790, lon_cpr: 103912 },
                odd_last: ("-32.197483", "+116.028629"),
                even_last: ("-32.197449", "+116.027820"),
            },
            Vector {
                even: CprCoordinates { lat_cpr: 86196, lon_cpr: 13323 },
                odd: CprCoordinates { lat_cpr: 97846, lon_cpr: 102181 },
                odd_last: ("-32.055219", "+115.931602"),
                even_last: ("-32.054260", "+115.931854"),
            },
            Vector {
                even: CprCoordinates { lat_cpr: 80536, lon_cpr: 9432 },
                odd: CprCoordinates { lat_cpr: 61720, lon_cpr: 9192 },
                odd_last: ("+51.686763", "+0.701294"),
                even_last: ("+51.686646", "+0.700156"),
            },
        ];

        for v in &vectors {
            let pos =
                global_airborne(&v.even, &v.odd, CprFormat::Odd).unwrap();
            assert_eq!(format!("{:+0.6}", pos.latitude), v.odd_last.0);
            assert_eq!(format!("{:+0.6}", pos.longitude), v.odd_last.1);

            let pos =
                global_airborne(&v.even, &v.odd, CprFormat::Even).unwrap();
            assert_eq!(format!("{:+0.6}", pos.latitude), v.even_last.0);
            assert_eq!(format!("{:+0.6}", pos.longitude), v.even_last.1);
        }
    }

    #[test]
    fn local_airborne_with_reference() {
        // CPR coordinates of 8D40058B58C901375147EFD09357, even parity
        let msg = CprCoordinates {
            lat_cpr: 39848,
            lon_cpr: 83951,
        };
        let reference = Position {
            latitude: 49.0,
            longitude: 6.0,
        };
        let pos = local_airborne(&msg, CprFormat::Even, &reference).unwrap();
        assert_relative_eq!(pos.latitude, 49.82410, max_relative = 1e-4);
        assert_relative_eq!(pos.longitude, 6.06785, max_relative = 1e-4);
    }

    #[test]
    fn global_range_check() {
        let position = Position {
            latitude: 51.686763,
            longitude: 0.701294,
        };
        let nearby = Position {
            latitude: 51.5,
            longitude: 0.4,
        };
        let distant = Position {
            latitude: 48.85,
            longitude: 2.35,
        };
        assert!(check_global_range(&position, &nearby).is_ok());
        assert_eq!(
            check_global_range(&position, &distant),
            Err(CprError::OutOfRange)
        );
    }
}
