use super::bds::{bds05, bds06, bds08, bds09, bds61, bds62, bds65};
use super::{Capability, Icao};
use deku::prelude::*;
use serde::Serialize;

/**
 * An ADS-B frame is 112 bits long and consists of five parts:
 *
 * +----------+----------+-------------+------------------------+-----------+
 * |  DF (5)  |  CA (3)  |  ICAO (24)  |         ME (56)        |  PI (24)  |
 * +----------+----------+-------------+------------------------+-----------+
 *
 * The first five bits of the ME field are the typecode selecting the
 * message layout; it is read here and passed down as context so that
 * the payload decoders sharing a typecode range can tell the variants
 * apart.
 */
#[derive(Debug, PartialEq, DekuRead, Clone, Serialize)]
pub struct Adsb {
    /// Transponder capability
    #[serde(skip)]
    pub capability: Capability,

    /// ICAO aircraft address
    pub icao24: Icao,

    /// Typecode, the first five bits of the ME field
    #[deku(bits = "5")]
    #[serde(skip)]
    pub tc: u8,

    #[serde(flatten)]
    #[deku(ctx = "*tc")]
    pub message: Me,

    /// Parity / interrogator ID
    #[serde(skip)]
    pub parity: Icao,
}

/*
* |  TC       |  Message                              |
* | --------- | ------------------------------------- |
* | 0         | No position information               |
* | 1..=4     | Aircraft identification               |
* | 5..=8     | Surface position                      |
* | 9..=18    | Airborne position (barometric)        |
* | 19        | Airborne velocity                     |
* | 20..=22   | Airborne position (GNSS)              |
* | 23..=27   | Reserved / test                       |
* | 28        | Aircraft status                       |
* | 29        | Target state and status               |
* | 31        | Operational status                    |
*/
#[derive(Debug, PartialEq, Serialize, DekuRead, Clone)]
#[deku(ctx = "tc: u8", id = "tc")]
#[serde(tag = "kind")]
pub enum Me {
    #[deku(id = "0")]
    #[serde(skip)]
    NoPosition {
        #[deku(count = "6")]
        unused: Vec<u8>,
    },

    #[deku(id_pat = "1..=4")]
    #[serde(rename = "identification")]
    Identification(#[deku(ctx = "tc")] bds08::AircraftIdentification),

    #[deku(id_pat = "5..=8")]
    #[serde(rename = "surface_position")]
    SurfacePosition(#[deku(ctx = "tc")] bds06::SurfacePosition),

    #[deku(id_pat = "9..=18 | 20..=22")]
    #[serde(rename = "airborne_position")]
    AirbornePosition(#[deku(ctx = "tc")] bds05::AirbornePosition),

    #[deku(id = "19")]
    #[serde(rename = "airborne_velocity")]
    AirborneVelocity(bds09::AirborneVelocity),

    #[deku(id_pat = "23..=27")]
    #[serde(skip)]
    Reserved {
        #[deku(count = "6")]
        unused: Vec<u8>,
    },

    #[deku(id = "28")]
    #[serde(rename = "aircraft_status")]
    AircraftStatus(bds61::AircraftStatus),

    #[deku(id = "29")]
    #[serde(rename = "target_state")]
    TargetState(bds62::TargetState),

    #[deku(id = "30")]
    #[serde(skip)]
    OperationalCoordination {
        #[deku(count = "6")]
        unused: Vec<u8>,
    },

    #[deku(id = "31")]
    #[serde(rename = "operational_status")]
    OperationalStatus(bds65::OperationalStatus),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{Df, ModeS};
    use hexlit::hex;

    #[test]
    fn dispatch_by_typecode() {
        let bytes = hex!("8D406B902015A678D4D220AA4BDA");
        let (_, msg) = ModeS::from_bytes((&bytes, 0)).unwrap();
        let Df::ExtendedSquitter(adsb) = msg.df else {
            unreachable!()
        };
        assert_eq!(format!("{}", adsb.icao24), "406b90");
        assert_eq!(adsb.tc, 4);
        assert!(matches!(adsb.message, Me::Identification(_)));
    }
}
