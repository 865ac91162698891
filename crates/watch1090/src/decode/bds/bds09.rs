use deku::prelude::*;
use serde::ser::SerializeStruct;
use serde::Serialize;
use std::fmt;

/**
 * ## Airborne Velocity (BDS 0,9)
 *
 * Always typecode 19; the subtype in the first three bits of the
 * payload selects between ground-referenced velocity (subtypes 1 and
 * 2) and airspeed plus magnetic heading (subtypes 3 and 4, broadcast
 * when the position cannot be derived from GNSS). Subtypes 2 and 4 are
 * the supersonic variants with a 4 kt resolution.
 */
#[derive(Debug, PartialEq, Serialize, DekuRead, Clone)]
pub struct AirborneVelocity {
    #[deku(bits = "3")]
    #[serde(skip)]
    pub subtype: u8,

    /// Intent change flag
    #[deku(bits = "1")]
    #[serde(skip)]
    pub intent_change: bool,

    /// IFR capability flag
    #[deku(bits = "1")]
    #[serde(skip)]
    pub ifr_capability: bool,

    /// Navigation accuracy category for velocity
    #[deku(bits = "3")]
    #[serde(rename = "NACv")]
    pub nac_v: u8,

    #[deku(ctx = "*subtype")]
    #[serde(flatten)]
    pub velocity: VelocitySubType,

    /// Source of the vertical rate measurement
    pub vrate_src: VerticalRateSource,

    #[serde(skip)]
    pub vrate_sign: Sign,

    /// Vertical rate in ft/min, None when unavailable
    #[deku(
        endian = "big",
        bits = "9",
        map = "|v: u16| -> Result<_, DekuError> {
            if v == 0 { Ok(None) }
            else { Ok(Some(vrate_sign.value() * (v as i16 - 1) * 64)) }
        }"
    )]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_rate: Option<i16>,

    #[deku(bits = "2")]
    #[serde(skip)]
    pub reserved: u8,

    #[serde(skip)]
    pub gnss_sign: Sign,

    /// Signed difference between GNSS height and barometric altitude,
    /// in ft
    #[deku(
        endian = "big",
        bits = "7",
        map = "|v: u8| -> Result<_, DekuError> {
            if v > 1 {
                Ok(Some(gnss_sign.value() * 25 * (v as i16 - 1)))
            } else { Ok(None) }
        }"
    )]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo_minus_baro: Option<i16>,
}

#[derive(Debug, PartialEq, Serialize, DekuRead, Clone)]
#[deku(ctx = "subtype: u8", id = "subtype")]
#[serde(untagged)]
pub enum VelocitySubType {
    #[deku(id = "0")]
    Reserved0(#[deku(bits = "22")] u32),

    #[deku(id_pat = "1..=2")]
    GroundSpeed(GroundSpeed),

    #[deku(id_pat = "3..=4")]
    Airspeed(#[deku(ctx = "subtype")] Airspeed),

    #[deku(id_pat = "_")]
    Reserved1(#[deku(bits = "22")] u32),
}

#[derive(Debug, PartialEq, DekuRead, Copy, Clone)]
#[deku(type = "u8", bits = "1")]
pub enum Sign {
    Positive = 0,
    Negative = 1,
}

impl Sign {
    pub fn value(&self) -> i16 {
        match self {
            Self::Positive => 1,
            Self::Negative => -1,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, DekuRead, Copy, Clone)]
pub struct GroundSpeed {
    #[serde(skip)]
    pub ew_sign: Sign,

    /// East-west velocity component in kts
    #[deku(
        endian = "big",
        bits = "10",
        map = "|v: u16| -> Result<_, DekuError> {
            Ok(f64::from((v as i16 - 1) * ew_sign.value()))
        }"
    )]
    #[serde(skip)]
    pub ew_vel: f64,

    #[serde(skip)]
    pub ns_sign: Sign,

    /// North-south velocity component in kts
    #[deku(
        endian = "big",
        bits = "10",
        map = "|v: u16| -> Result<_, DekuError> {
            Ok(f64::from((v as i16 - 1) * ns_sign.value()))
        }"
    )]
    #[serde(skip)]
    pub ns_vel: f64,

    /// Modulus of the velocity vector in kts
    #[deku(skip, default = "libm::hypot(f64::abs(*ew_vel), f64::abs(*ns_vel))")]
    pub groundspeed: f64,

    /// True track angle in degrees, from the velocity vector
    #[deku(
        skip,
        default = "
        let h = libm::atan2(*ew_vel, *ns_vel) *
            (360.0 / (2.0 * std::f64::consts::PI));
        if h < 0.0 { h + 360. } else { h }
        "
    )]
    pub track: f64,
}

#[derive(Debug, PartialEq, DekuRead, Clone)]
#[deku(ctx = "subtype: u8")]
pub struct Airspeed {
    #[deku(bits = "1")]
    pub status_heading: bool,

    /// Magnetic heading in degrees, None when unavailable
    #[deku(
        endian = "big",
        bits = "10",
        map = "|v: u16| -> Result<_, DekuError> {
            Ok(if *status_heading { Some(f64::from(v) * 360. / 1024.) } else { None })
        }"
    )]
    pub heading: Option<f64>,

    pub airspeed_type: AirspeedType,

    /// Airspeed in kts (LSB is 4 kt for the supersonic subtype), None
    /// when unavailable
    #[deku(
        endian = "big",
        bits = "10",
        map = "|v: u16| -> Result<_, DekuError> {
            if v == 0 { return Ok(None) }
            if subtype == 4 { Ok(Some(4 * (v - 1))) } else { Ok(Some(v - 1)) }
        }"
    )]
    pub airspeed: Option<u16>,
}

impl Serialize for Airspeed {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        let mut state = serializer.serialize_struct("Airspeed", 2)?;
        if let Some(heading) = &self.heading {
            state.serialize_field("heading", heading)?;
        }
        if let Some(airspeed) = &self.airspeed {
            match &self.airspeed_type {
                AirspeedType::Ias => state.serialize_field("IAS", airspeed)?,
                AirspeedType::Tas => state.serialize_field("TAS", airspeed)?,
            }
        }
        state.end()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, DekuRead)]
#[deku(type = "u8", bits = "1")]
pub enum AirspeedType {
    Ias = 0,
    Tas = 1,
}

impl fmt::Display for AirspeedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Ias => "IAS",
                Self::Tas => "TAS",
            }
        )
    }
}

#[derive(Debug, PartialEq, Serialize, DekuRead, Copy, Clone)]
#[deku(type = "u8", bits = "1")]
#[serde(rename_all = "snake_case")]
pub enum VerticalRateSource {
    #[serde(rename = "GNSS")]
    Gnss = 0,
    #[serde(rename = "barometric")]
    Barometric = 1,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::adsb::Me;
    use crate::decode::{Df, ModeS};
    use approx::assert_relative_eq;
    use hexlit::hex;

    #[test]
    fn decode_groundspeed() {
        let bytes = hex!("8D485020994409940838175B284F");
        let (_, msg) = ModeS::from_bytes((&bytes, 0)).unwrap();
        let Df::ExtendedSquitter(adsb) = msg.df else {
            unreachable!()
        };
        let Me::AirborneVelocity(v) = adsb.message else {
            unreachable!()
        };
        assert_eq!(v.vertical_rate, Some(-832));
        let VelocitySubType::GroundSpeed(gs) = v.velocity else {
            unreachable!()
        };
        assert_relative_eq!(gs.groundspeed, 159.20, max_relative = 1e-3);
        assert_relative_eq!(gs.track, 182.88, max_relative = 1e-3);
    }

    #[test]
    fn decode_airspeed() {
        let bytes = hex!("8DA05F219B06B6AF189400CBC33F");
        let (_, msg) = ModeS::from_bytes((&bytes, 0)).unwrap();
        let Df::ExtendedSquitter(adsb) = msg.df else {
            unreachable!()
        };
        let Me::AirborneVelocity(v) = adsb.message else {
            unreachable!()
        };
        let VelocitySubType::Airspeed(airspeed) = v.velocity else {
            unreachable!()
        };
        assert_eq!(airspeed.airspeed, Some(375));
        assert_relative_eq!(
            airspeed.heading.unwrap(),
            243.98,
            max_relative = 1e-3
        );
    }
}
