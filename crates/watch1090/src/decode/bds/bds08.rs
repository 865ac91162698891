use deku::bitvec::{BitSlice, Msb0};
use deku::prelude::*;
use serde::Serialize;
use std::fmt;

/**
 * ## Aircraft Identification and Category (BDS 0,8)
 *
 * Broadcasts the callsign and the wake vortex category.
 *
 * | TC  | CA  | C1  | C2  | C3  | C4  | C5  | C6  | C7  | C8  |
 * | --- | --- | --- | --- | --- | --- | --- | --- | --- | --- |
 * | 5   | 3   | 6   | 6   | 6   | 6   | 6   | 6   | 6   | 6   |
 *
 * The typecode (1 to 4) combines with CA to form the category.
 */
#[derive(Debug, PartialEq, DekuRead, Serialize, Clone)]
#[deku(ctx = "tc: u8")]
pub struct AircraftIdentification {
    /// Aircraft category, 3 bits
    #[deku(bits = "3")]
    #[serde(skip)]
    pub ca: u8,

    /// Wake vortex category derived from typecode and CA
    #[deku(skip, default = "wake_vortex(tc, *ca)")]
    pub category: WakeVortex,

    /// Callsign, eight 6-bit characters, trailing spaces trimmed
    #[deku(reader = "callsign_read(deku::rest)")]
    pub callsign: String,
}

/// The ADS-B wake vortex categories; distinct from the ICAO wake
/// turbulence categories used in flight planning.
#[derive(Debug, PartialEq, Serialize, Copy, Clone)]
pub enum WakeVortex {
    Reserved,
    #[serde(rename = "n/a")]
    NoInformation,

    // Typecode 2, ground
    #[serde(rename = "Surface emergency vehicle")]
    EmergencyVehicle,
    #[serde(rename = "Surface service vehicle")]
    ServiceVehicle,
    Obstruction,

    // Typecode 3, without an engine
    Glider,
    #[serde(rename = "Lighter than air")]
    Lighter,
    Parachutist,
    Ultralight,
    #[serde(rename = "UAM")]
    Unmanned,
    Space,

    // Typecode 4, aircraft
    #[serde(rename = "<7000kg")]
    Light,
    #[serde(rename = "<34,000kg")]
    Medium1,
    #[serde(rename = "<136,000kg")]
    Medium2,
    #[serde(rename = "High vortex")]
    HighVortex,
    Heavy,
    #[serde(rename = "High performance")]
    HighPerformance,
    Rotorcraft,
}

impl fmt::Display for WakeVortex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Reserved => "Reserved",
            Self::NoInformation => "No category information",
            Self::EmergencyVehicle => "Surface emergency vehicle",
            Self::ServiceVehicle => "Surface service vehicle",
            Self::Obstruction => "Ground obstruction",
            Self::Glider => "Glider, sailplane",
            Self::Lighter => "Lighter than air",
            Self::Parachutist => "Parachutist, skydiver",
            Self::Ultralight => "Ultralight, hang-glider, paraglider",
            Self::Unmanned => "Unmanned air vehicle",
            Self::Space => "Space vehicle",
            Self::Light => "Light (less than 7000 kg)",
            Self::Medium1 => "Medium 1 (7000 kg to 34000 kg)",
            Self::Medium2 => "Medium 2 (34000 kg to 136000 kg)",
            Self::HighVortex => "High vortex aircraft",
            Self::Heavy => "Heavy (more than 136000 kg)",
            Self::HighPerformance => "High performance, high speed",
            Self::Rotorcraft => "Rotorcraft",
        };
        write!(f, "{s}")
    }
}

fn wake_vortex(tc: u8, ca: u8) -> WakeVortex {
    match (tc, ca) {
        (1, _) => WakeVortex::Reserved,
        (_, 0) => WakeVortex::NoInformation,
        (2, 1) => WakeVortex::EmergencyVehicle,
        (2, 3) => WakeVortex::ServiceVehicle,
        (2, _) => WakeVortex::Obstruction,
        (3, 1) => WakeVortex::Glider,
        (3, 2) => WakeVortex::Lighter,
        (3, 3) => WakeVortex::Parachutist,
        (3, 4) => WakeVortex::Ultralight,
        (3, 6) => WakeVortex::Unmanned,
        (3, 7) => WakeVortex::Space,
        (4, 1) => WakeVortex::Light,
        (4, 2) => WakeVortex::Medium1,
        (4, 3) => WakeVortex::Medium2,
        (4, 4) => WakeVortex::HighVortex,
        (4, 5) => WakeVortex::Heavy,
        (4, 6) => WakeVortex::HighPerformance,
        (4, 7) => WakeVortex::Rotorcraft,
        _ => WakeVortex::Reserved,
    }
}

const CHAR_LOOKUP: &[u8; 64] =
    b"#ABCDEFGHIJKLMNOPQRSTUVWXYZ##### ###############0123456789######";

fn callsign_read(
    rest: &BitSlice<u8, Msb0>,
) -> Result<(&BitSlice<u8, Msb0>, String), DekuError> {
    let mut inside_rest = rest;

    let mut callsign = String::with_capacity(8);
    for _ in 0..8 {
        let (for_rest, c) = <u8>::read(inside_rest, deku::ctx::BitSize(6))?;
        callsign.push(CHAR_LOOKUP[c as usize] as char);
        inside_rest = for_rest;
    }
    let trimmed = callsign.trim_end().to_string();

    Ok((inside_rest, trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::adsb::Me;
    use crate::decode::{Df, ModeS};
    use hexlit::hex;

    #[test]
    fn decode_callsign() {
        let bytes = hex!("8d406b902015a678d4d220aa4bda");
        let (_, msg) = ModeS::from_bytes((&bytes, 0)).unwrap();
        let Df::ExtendedSquitter(adsb) = msg.df else {
            unreachable!()
        };
        let Me::Identification(id) = adsb.message else {
            unreachable!()
        };
        assert_eq!(id.callsign, "EZY85MH");
        assert_eq!(format!("{}", id.category), "No category information");
    }
}
