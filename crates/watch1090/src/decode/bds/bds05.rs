use crate::decode::cpr::CprFormat;
use crate::decode::{decode_id13, gray2alt};
use deku::bitvec::{BitSlice, Msb0};
use deku::prelude::*;
use serde::Serialize;

/**
 * ## Airborne Position (BDS 0,5)
 *
 * with barometric altitude (TC=9..=18) or GNSS height (TC=20..=22)
 *
 * | TC | SS | SAF | ALT | T | F | LAT-CPR | LON-CPR |
 * | -- | -- | --- | --- | - | - | ------- | ------- |
 * | 5  | 2  |  1  | 12  | 1 | 1 |   17    |   17    |
 *
 * The typecode is consumed by the ME dispatch and passed down as
 * context; it selects the altitude source.
 */
#[derive(Debug, PartialEq, Serialize, DekuRead, Copy, Clone)]
#[deku(ctx = "tc: u8")]
pub struct AirbornePosition {
    /// Surveillance status
    #[serde(skip)]
    pub ss: SurveillanceStatus,

    /// Single antenna flag (ADS-B v0/v1) or NIC supplement-b (v2)
    #[deku(bits = "1")]
    #[serde(skip)]
    pub saf_or_nicb: u8,

    /// Altitude in feet, None when unavailable
    #[deku(reader = "read_altitude(deku::rest, tc)")]
    #[serde(rename = "altitude")]
    pub alt: Option<u16>,

    /// Altitude source, barometric below TC=19, GNSS above
    #[deku(skip, default = "if tc < 19 { AltitudeSource::Barometric } else { AltitudeSource::Gnss }")]
    pub source: AltitudeSource,

    /// UTC sync flag
    #[deku(bits = "1")]
    #[serde(skip)]
    pub t: bool,

    pub parity: CprFormat,

    #[deku(bits = "17", endian = "big")]
    pub lat_cpr: u32,

    #[deku(bits = "17", endian = "big")]
    pub lon_cpr: u32,
}

/// Decode the 12-bit altitude field: 25 ft or Gillham encoding below
/// TC=19, metres above.
fn read_altitude(
    rest: &BitSlice<u8, Msb0>,
    tc: u8,
) -> Result<(&BitSlice<u8, Msb0>, Option<u16>), DekuError> {
    let (rest, num) =
        u16::read(rest, (deku::ctx::Endian::Big, deku::ctx::BitSize(12)))?;

    if tc >= 20 {
        // GNSS height above ellipsoid, metres
        return Ok((rest, Some((f32::from(num) * 3.28084) as u16)));
    }

    let q = num & 0x10;
    if q > 0 {
        let n = ((num & 0x0fe0) >> 1) | (num & 0x000f);
        let n = n * 25;
        if n > 1000 {
            Ok((rest, Some(n - 1000)))
        } else {
            Ok((rest, None))
        }
    } else {
        let n = ((num & 0x0fc0) << 1) | (num & 0x003f);
        match gray2alt(decode_id13(n)) {
            Some(alt) => Ok((rest, u16::try_from(alt * 100).ok())),
            None => Ok((rest, None)),
        }
    }
}

#[derive(Debug, PartialEq, Eq, DekuRead, Copy, Clone)]
#[deku(type = "u8", bits = "2")]
pub enum SurveillanceStatus {
    NoCondition = 0,
    PermanentAlert = 1,
    TemporaryAlert = 2,
    SpiCondition = 3,
}

#[derive(Debug, PartialEq, Eq, Serialize, Copy, Clone)]
#[serde(rename_all = "snake_case")]
pub enum AltitudeSource {
    Barometric,
    Gnss,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::adsb::Me;
    use crate::decode::{Df, ModeS};
    use hexlit::hex;

    #[test]
    fn decode_airborne_position() {
        let bytes = hex!("8D40621D58C382D690C8AC2863A7");
        let (_, msg) = ModeS::from_bytes((&bytes, 0)).unwrap();
        let Df::ExtendedSquitter(adsb) = msg.df else {
            unreachable!()
        };
        let Me::AirbornePosition(pos) = adsb.message else {
            unreachable!()
        };
        assert_eq!(pos.alt, Some(38000));
        assert_eq!(pos.source, AltitudeSource::Barometric);
        assert_eq!(pos.parity, CprFormat::Even);
        assert_eq!(pos.lat_cpr, 93000);
        assert_eq!(pos.lon_cpr, 51372);
    }

    #[test]
    fn decode_odd_parity() {
        let bytes = hex!("8D40621D58C386435CC412692AD6");
        let (_, msg) = ModeS::from_bytes((&bytes, 0)).unwrap();
        let Df::ExtendedSquitter(adsb) = msg.df else {
            unreachable!()
        };
        let Me::AirbornePosition(pos) = adsb.message else {
            unreachable!()
        };
        assert_eq!(pos.parity, CprFormat::Odd);
        assert_eq!(pos.lat_cpr, 74158);
        assert_eq!(pos.lon_cpr, 50194);
    }
}
