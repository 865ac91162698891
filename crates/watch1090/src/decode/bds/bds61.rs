use crate::decode::IdentityCode;
use deku::prelude::*;
use serde::Serialize;
use std::fmt;

/**
 * ## Aircraft Status (BDS 6,1, TC=28)
 *
 * Emergency / priority status together with the current squawk.
 *
 * | TC | SUBTYPE | EMERGENCY | SQUAWK | RESERVED |
 * | -- | ------- | --------- | ------ | -------- |
 * | 5  | 3       | 3         | 13     | 32       |
 */
#[derive(Debug, PartialEq, Serialize, DekuRead, Copy, Clone)]
pub struct AircraftStatus {
    #[serde(skip)]
    pub subtype: AircraftStatusType,

    pub emergency_state: EmergencyState,

    /// Mode A identity code, Gillham encoded on the wire
    pub squawk: IdentityCode,

    #[deku(bits = "32")]
    #[serde(skip)]
    pub reserved: u32,
}

#[derive(Debug, PartialEq, Serialize, DekuRead, Copy, Clone)]
#[deku(type = "u8", bits = "3")]
#[serde(rename_all = "snake_case")]
pub enum AircraftStatusType {
    #[deku(id = "0")]
    NoInformation,
    /// Emergency / priority status
    #[deku(id = "1")]
    EmergencyPriority,
    /// ACAS resolution advisory broadcast
    #[deku(id = "2")]
    AcasRaBroadcast,
    #[deku(id_pat = "_")]
    Reserved,
}

#[derive(Debug, PartialEq, Serialize, DekuRead, Copy, Clone)]
#[deku(type = "u8", bits = "3")]
#[serde(rename_all = "snake_case")]
pub enum EmergencyState {
    None = 0,
    /// Mode A code 7700
    General = 1,
    Medical = 2,
    MinimumFuel = 3,
    /// Mode A code 7600
    NoCommunication = 4,
    /// Mode A code 7500
    UnlawfulInterference = 5,
    DownedAircraft = 6,
    Reserved = 7,
}

impl EmergencyState {
    pub fn is_emergency(&self) -> bool {
        !matches!(self, Self::None | Self::Reserved)
    }
}

impl fmt::Display for EmergencyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "no emergency",
            Self::General => "general emergency (7700)",
            Self::Medical => "lifeguard/medical emergency",
            Self::MinimumFuel => "minimum fuel",
            Self::NoCommunication => "no communication (7600)",
            Self::UnlawfulInterference => "unlawful interference (7500)",
            Self::DownedAircraft => "downed aircraft",
            Self::Reserved => "reserved",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deku::bitvec::{BitView, Msb0};
    use deku::DekuRead;
    use hexlit::hex;

    #[test]
    fn decode_aircraft_status() {
        // TC=28 subtype=1, unlawful interference, squawk 7500
        let me = hex!("E1AAA200000000");
        let bits = me.view_bits::<Msb0>();
        let (_, status) = AircraftStatus::read(&bits[5..], ()).unwrap();
        assert_eq!(status.subtype, AircraftStatusType::EmergencyPriority);
        assert_eq!(status.emergency_state, EmergencyState::UnlawfulInterference);
        assert!(status.emergency_state.is_emergency());
        assert_eq!(status.squawk.0, 0x7500);
    }
}
