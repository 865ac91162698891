pub mod adsb;
pub mod bds;
pub mod cpr;
pub mod crc;
pub mod time;

use adsb::Adsb;
use crc::modes_checksum;
use deku::bitvec::{BitSlice, Msb0};
use deku::prelude::*;
use serde::ser::{Serialize, Serializer};
use std::fmt;

/**
 * A Mode S downlink is either 56 or 112 bits long; its first five bits
 * encode the downlink format (DF) which selects the layout of the rest
 * of the frame.
 *
 * |  DF      |  Name                             |
 * | -------- | --------------------------------- |
 * | 0        | Short air-air surveillance (ACAS) |
 * | 4        | Surveillance, altitude reply      |
 * | 5        | Surveillance, identity reply      |
 * | 11       | All-call reply                    |
 * | 16       | Long air-air surveillance (ACAS)  |
 * | 17       | Extended squitter (ADS-B)         |
 * | 18       | Extended squitter (TIS-B)         |
 * | 20       | Comm-B, altitude reply            |
 * | 21       | Comm-B, identity reply            |
 * | 24..=31  | Comm-D extended length message    |
 */
#[derive(Debug, PartialEq, serde::Serialize, DekuRead, Clone)]
#[deku(type = "u8", bits = "5", ctx = "crc: u32")]
#[serde(tag = "df")]
pub enum Df {
    /// DF=0: Short air-air surveillance
    #[deku(id = "0")]
    #[serde(rename = "0")]
    ShortAirAir {
        /// Vertical status, 1 when on the ground
        #[deku(bits = "1")]
        #[serde(skip)]
        vs: u8,
        #[deku(bits = "1")]
        #[serde(skip)]
        cc: u8,
        #[deku(bits = "1")]
        #[serde(skip)]
        unused: u8,
        /// Sensitivity level, ACAS
        #[deku(bits = "3")]
        #[serde(skip)]
        sl: u8,
        #[deku(bits = "2")]
        #[serde(skip)]
        unused1: u8,
        /// Reply information
        #[deku(bits = "4")]
        #[serde(skip)]
        ri: u8,
        #[deku(bits = "2")]
        #[serde(skip)]
        unused2: u8,
        /// Altitude code on 13 bits
        #[serde(rename = "altitude")]
        altitude: Ac13Field,
        /// Address recovered from the overlaid parity
        #[serde(rename = "icao24")]
        #[deku(ctx = "crc")]
        ap: IcaoParity,
    },

    /// DF=4: Surveillance, altitude reply
    #[deku(id = "4")]
    #[serde(rename = "4")]
    AltitudeReply {
        fs: FlightStatus,
        #[serde(skip)]
        dr: DownlinkRequest,
        #[serde(skip)]
        um: UtilityMessage,
        #[serde(rename = "altitude")]
        altitude: Ac13Field,
        #[serde(rename = "icao24")]
        #[deku(ctx = "crc")]
        ap: IcaoParity,
    },

    /// DF=5: Surveillance, identity reply
    #[deku(id = "5")]
    #[serde(rename = "5")]
    IdentityReply {
        fs: FlightStatus,
        #[serde(skip)]
        dr: DownlinkRequest,
        #[serde(skip)]
        um: UtilityMessage,
        /// Identity code (squawk)
        #[serde(rename = "squawk")]
        id: IdentityCode,
        #[serde(rename = "icao24")]
        #[deku(ctx = "crc")]
        ap: IcaoParity,
    },

    /// DF=11: All-call reply
    #[deku(id = "11")]
    #[serde(rename = "11")]
    AllCallReply {
        capability: Capability,
        /// Address announced
        #[serde(rename = "icao24")]
        icao: Icao,
        /// Parity overlaid with the interrogator identifier
        #[serde(skip)]
        p_icao: Icao,
    },

    /// DF=16: Long air-air surveillance
    #[deku(id = "16")]
    #[serde(rename = "16")]
    LongAirAir {
        /// Vertical status, 1 when on the ground
        #[deku(bits = "1")]
        #[serde(skip)]
        vs: u8,
        #[deku(bits = "2")]
        #[serde(skip)]
        reserved1: u8,
        #[deku(bits = "3")]
        #[serde(skip)]
        sl: u8,
        #[deku(bits = "2")]
        #[serde(skip)]
        reserved2: u8,
        #[deku(bits = "4")]
        #[serde(skip)]
        ri: u8,
        #[deku(bits = "2")]
        #[serde(skip)]
        reserved3: u8,
        #[serde(rename = "altitude")]
        altitude: Ac13Field,
        /// ACAS message, 56 bits
        #[deku(count = "7")]
        #[serde(skip)]
        mv: Vec<u8>,
        #[serde(rename = "icao24")]
        #[deku(ctx = "crc")]
        ap: IcaoParity,
    },

    /// DF=17: Extended squitter (ADS-B)
    #[deku(id = "17")]
    #[serde(rename = "17")]
    ExtendedSquitter(Adsb),

    /// DF=18: Extended squitter from non-transponder equipment (TIS-B)
    #[deku(id = "18")]
    #[serde(rename = "18")]
    ExtendedSquitterTisB {
        cf: ControlField,
        /// Parity / interrogator identifier
        #[serde(skip)]
        pi: Icao,
    },

    /// DF=19: Extended squitter, military application
    #[deku(id = "19")]
    #[serde(skip)]
    ExtendedSquitterMilitary {
        #[deku(bits = "3")]
        af: u8,
    },

    /// DF=20: Comm-B altitude reply
    #[deku(id = "20")]
    #[serde(rename = "20")]
    CommBAltitudeReply {
        fs: FlightStatus,
        #[serde(skip)]
        dr: DownlinkRequest,
        #[serde(skip)]
        um: UtilityMessage,
        #[serde(rename = "altitude")]
        altitude: Ac13Field,
        /// Comm-B message, undistinguished BDS register
        #[deku(count = "7")]
        #[serde(skip)]
        mb: Vec<u8>,
        #[serde(rename = "icao24")]
        #[deku(ctx = "crc")]
        ap: IcaoParity,
    },

    /// DF=21: Comm-B identity reply
    #[deku(id = "21")]
    #[serde(rename = "21")]
    CommBIdentityReply {
        fs: FlightStatus,
        #[serde(skip)]
        dr: DownlinkRequest,
        #[serde(skip)]
        um: UtilityMessage,
        #[serde(rename = "squawk")]
        id: IdentityCode,
        /// Comm-B message, undistinguished BDS register
        #[deku(count = "7")]
        #[serde(skip)]
        mb: Vec<u8>,
        #[serde(rename = "icao24")]
        #[deku(ctx = "crc")]
        ap: IcaoParity,
    },

    /// DF=24..=31: Comm-D extended length message, kept opaque
    #[deku(id_pat = "_")]
    #[serde(skip)]
    CommDExtended {
        #[deku(count = "13")]
        md: Vec<u8>,
    },
}

/// The entry point to Mode S decoding, `ModeS::from_bytes()` on a 7 or
/// 14 byte payload.
#[derive(Debug, PartialEq, serde::Serialize, DekuRead, Clone)]
pub struct ModeS {
    /// The checksum computed over the whole frame: 0 for an extended
    /// squitter, the announcing address for surveillance replies
    #[deku(reader = "Self::read_crc(deku::input_bits)")]
    #[serde(skip)]
    pub crc: u32,

    #[serde(flatten)]
    #[deku(ctx = "*crc")]
    pub df: Df,
}

impl ModeS {
    fn read_crc(
        rest: &BitSlice<u8, Msb0>,
    ) -> Result<(&BitSlice<u8, Msb0>, u32), DekuError> {
        let (_, bytes, _) = rest.domain().region().ok_or_else(|| {
            DekuError::Parse("empty Mode S frame".to_string())
        })?;

        // Peek at the DF to know whether this is a short or long frame
        let df = bytes[0] >> 3;
        let bit_len = if df & 0x10 != 0 { 112 } else { 56 };

        let crc = modes_checksum(bytes, bit_len)?;
        // The trailer of an extended squitter is the plain CRC
        match (df, crc) {
            (17 | 18, c) if c > 0 => Err(DekuError::Assertion(format!(
                "invalid CRC in extended squitter: {c:x}"
            ))),
            _ => Ok((rest, crc)),
        }
    }

    /// The 24-bit address announced by this frame, 0 when the frame
    /// carries none that we can recover.
    pub fn icao24(&self) -> u32 {
        match &self.df {
            Df::ShortAirAir { ap, .. }
            | Df::AltitudeReply { ap, .. }
            | Df::IdentityReply { ap, .. }
            | Df::LongAirAir { ap, .. }
            | Df::CommBAltitudeReply { ap, .. }
            | Df::CommBIdentityReply { ap, .. } => ap.0,
            Df::AllCallReply { icao, .. } => icao.0,
            Df::ExtendedSquitter(adsb) => adsb.icao24.0,
            Df::ExtendedSquitterTisB { cf, .. } => cf.aa.0,
            _ => 0,
        }
    }
}

/// ICAO 24-bit transponder address, the key under which aircraft are
/// tracked
#[derive(PartialEq, Eq, PartialOrd, DekuRead, Hash, Copy, Clone, Ord)]
pub struct Icao(#[deku(bits = "24", endian = "big")] pub u32);

impl fmt::Debug for Icao {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06x}", self.0)
    }
}

impl fmt::Display for Icao {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06x}", self.0)
    }
}

impl Serialize for Icao {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{:06x}", self.0))
    }
}

impl core::str::FromStr for Icao {
    type Err = core::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(u32::from_str_radix(s, 16)?))
    }
}

/// Address recovered from a trailer overlaid with the CRC: the bits are
/// already consumed by the checksum pass, so the value comes from the
/// context instead of the bit stream.
#[derive(PartialEq, Eq, PartialOrd, DekuRead, Hash, Copy, Clone, Ord)]
#[deku(ctx = "crc: u32")]
pub struct IcaoParity(
    #[deku(bits = "24", map = "|_v: u32| -> Result<_, DekuError> { Ok(crc) }")]
    pub u32,
);

impl fmt::Debug for IcaoParity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06x}", self.0)
    }
}

impl fmt::Display for IcaoParity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06x}", self.0)
    }
}

impl Serialize for IcaoParity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{:06x}", self.0))
    }
}

/// 13-bit identity code, decoded to the four octal digits of the squawk
/// (stored so that `{:04x}` prints them)
#[derive(PartialEq, Eq, DekuRead, Copy, Clone)]
pub struct IdentityCode(#[deku(reader = "Self::read(deku::rest)")] pub u16);

impl IdentityCode {
    fn read(
        rest: &BitSlice<u8, Msb0>,
    ) -> Result<(&BitSlice<u8, Msb0>, u16), DekuError> {
        let (rest, num) =
            u16::read(rest, (deku::ctx::Endian::Big, deku::ctx::BitSize(13)))?;
        Ok((rest, decode_id13(num)))
    }
}

impl fmt::Debug for IdentityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}

impl fmt::Display for IdentityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}

impl Serialize for IdentityCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{:04x}", self.0))
    }
}

/// 13-bit altitude code, decoded to feet (25 ft or 100 ft Gillham
/// encoding depending on the M and Q bits)
#[derive(Debug, PartialEq, Eq, serde::Serialize, DekuRead, Copy, Clone)]
pub struct Ac13Field(#[deku(reader = "Self::read(deku::rest)")] pub u16);

impl Ac13Field {
    fn read(
        rest: &BitSlice<u8, Msb0>,
    ) -> Result<(&BitSlice<u8, Msb0>, u16), DekuError> {
        let (rest, ac13) =
            u16::read(rest, (deku::ctx::Endian::Big, deku::ctx::BitSize(13)))?;

        let m_bit = ac13 & 0x0040;
        let q_bit = ac13 & 0x0010;

        if m_bit != 0 {
            // metric encoding
            let meters = ((ac13 & 0x1f80) >> 2) | (ac13 & 0x3f);
            Ok((rest, (f32::from(meters) * 3.28084) as u16))
        } else if q_bit != 0 {
            // 11-bit value counting 25 ft steps from -1000 ft
            let n = ((ac13 & 0x1f80) >> 2)
                | ((ac13 & 0x0020) >> 1)
                | (ac13 & 0x000f);
            if n > 40 {
                Ok((rest, n * 25 - 1000))
            } else {
                Ok((rest, 0))
            }
        } else {
            // 11-bit Gillham coded altitude
            match gray2alt(decode_id13(ac13)) {
                Some(n) => Ok((rest, (100 * n) as u16)),
                None => Ok((rest, 0)),
            }
        }
    }
}

/// Transponder capability announced in DF=11 and DF=17
#[derive(Debug, PartialEq, serde::Serialize, DekuRead, Copy, Clone)]
#[deku(type = "u8", bits = "3")]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Level 1 transponder, surveillance only
    Level1 = 0x00,
    #[deku(id_pat = "0x01..=0x03")]
    Reserved,
    /// Level 2 or above transponder, on the ground
    Ground = 0x04,
    /// Level 2 or above transponder, airborne
    Airborne = 0x05,
    /// Level 2 or above transponder, either airborne or on the ground
    GroundOrAirborne = 0x06,
    /// DR is not 0, or FS is 2, 3, 4 or 5
    Dr0 = 0x07,
}

/// Flight status in the surveillance and Comm-B replies (DF=4, 5, 20, 21)
#[derive(Debug, PartialEq, serde::Serialize, DekuRead, Copy, Clone)]
#[deku(type = "u8", bits = "3")]
#[serde(rename_all = "snake_case")]
pub enum FlightStatus {
    NoAlertNoSpiAirborne = 0b000,
    NoAlertNoSpiOnGround = 0b001,
    AlertNoSpiAirborne = 0b010,
    AlertNoSpiOnGround = 0b011,
    AlertSpiAirborneGround = 0b100,
    NoAlertSpiAirborneGround = 0b101,
    Reserved = 0b110,
    NotAssigned = 0b111,
}

impl FlightStatus {
    /// None when the status does not distinguish airborne from ground
    pub fn on_ground(&self) -> Option<bool> {
        match self {
            Self::NoAlertNoSpiAirborne | Self::AlertNoSpiAirborne => {
                Some(false)
            }
            Self::NoAlertNoSpiOnGround | Self::AlertNoSpiOnGround => Some(true),
            _ => None,
        }
    }

    pub fn alert(&self) -> bool {
        matches!(
            self,
            Self::AlertNoSpiAirborne
                | Self::AlertNoSpiOnGround
                | Self::AlertSpiAirborneGround
        )
    }

    pub fn spi(&self) -> bool {
        matches!(
            self,
            Self::AlertSpiAirborneGround | Self::NoAlertSpiAirborneGround
        )
    }
}

/// Downlink request field (DF=4, 5, 20, 21)
#[derive(Debug, PartialEq, Eq, DekuRead, Copy, Clone)]
#[deku(type = "u8", bits = "5")]
pub enum DownlinkRequest {
    None = 0b00000,
    RequestSendCommB = 0b00001,
    CommBBroadcastMsg1 = 0b00100,
    CommBBroadcastMsg2 = 0b00101,
    #[deku(id_pat = "_")]
    Unknown,
}

/// Utility message field (DF=4, 5, 20, 21)
#[derive(Debug, PartialEq, Eq, DekuRead, Copy, Clone)]
pub struct UtilityMessage {
    #[deku(bits = "4")]
    pub iis: u8,
    pub ids: UtilityMessageType,
}

#[derive(Debug, PartialEq, Eq, DekuRead, Copy, Clone)]
#[deku(type = "u8", bits = "2")]
pub enum UtilityMessageType {
    NoInformation = 0b00,
    CommB = 0b01,
    CommC = 0b10,
    CommD = 0b11,
}

/// Control field of a DF=18 frame: same ME layout as ADS-B, but the
/// address may come from a non-transponder device
#[derive(Debug, PartialEq, serde::Serialize, DekuRead, Clone)]
pub struct ControlField {
    #[serde(skip)]
    pub t: ControlFieldType,
    /// Address announced
    #[serde(rename = "icao24")]
    pub aa: Icao,
    #[deku(bits = "5")]
    #[serde(skip)]
    pub tc: u8,
    #[serde(flatten)]
    #[deku(ctx = "*tc")]
    pub me: adsb::Me,
}

#[derive(Debug, PartialEq, serde::Serialize, DekuRead, Copy, Clone)]
#[deku(type = "u8", bits = "3")]
#[serde(rename_all = "snake_case")]
pub enum ControlFieldType {
    /// ADS-B message from a non-transponder device
    AdsbEsNt = 0,
    /// Reserved for ADS-B for ES/NT devices in an alternate address space
    AdsbEsNtAlt = 1,
    /// Fine format TIS-B message
    TisbFine = 2,
    /// Coarse format TIS-B message
    TisbCoarse = 3,
    /// TIS-B management message
    TisbManage = 4,
    /// TIS-B relay of ADS-B messages with anonymous addresses
    TisbAdsbRelay = 5,
    /// ADS-B rebroadcast, same format as DF=17
    TisbAdsb = 6,
    Reserved = 7,
}

/// Spread the 13 bits of an identity field into the hex digits of the
/// four octal squawk numbers.
///
/// Bits interleave as C1-A1-C2-A2-C4-A4-X-B1-D1-B2-D2-B4-D4; each group
/// of A, B, C, D forms one octal digit.
#[rustfmt::skip]
pub fn decode_id13(id13: u16) -> u16 {
    let mut squawk: u16 = 0;

    if id13 & 0x1000 != 0 { squawk |= 0x0010; } // C1
    if id13 & 0x0800 != 0 { squawk |= 0x1000; } // A1
    if id13 & 0x0400 != 0 { squawk |= 0x0020; } // C2
    if id13 & 0x0200 != 0 { squawk |= 0x2000; } // A2
    if id13 & 0x0100 != 0 { squawk |= 0x0040; } // C4
    if id13 & 0x0080 != 0 { squawk |= 0x4000; } // A4
    // bit 6 is X (spare) or M
    if id13 & 0x0020 != 0 { squawk |= 0x0100; } // B1
    if id13 & 0x0010 != 0 { squawk |= 0x0001; } // D1 or Q
    if id13 & 0x0008 != 0 { squawk |= 0x0200; } // B2
    if id13 & 0x0004 != 0 { squawk |= 0x0002; } // D2
    if id13 & 0x0002 != 0 { squawk |= 0x0400; } // B4
    if id13 & 0x0001 != 0 { squawk |= 0x0004; } // D4

    squawk
}

/// Convert a Gillham coded value to an altitude in hundreds of feet,
/// None when the code is not a legal altitude.
#[rustfmt::skip]
pub fn gray2alt(gray: u16) -> Option<i32> {
    let mut five_hundreds: u32 = 0;
    let mut one_hundreds: u32 = 0;

    // D1 set or C1..C4 all zero are illegal altitude codes
    if (gray & 0x8889) != 0 || (gray & 0x00f0) == 0 {
        return None;
    }

    if gray & 0x0010 != 0 { one_hundreds ^= 0x007; } // C1
    if gray & 0x0020 != 0 { one_hundreds ^= 0x003; } // C2
    if gray & 0x0040 != 0 { one_hundreds ^= 0x001; } // C4

    // remap 7 to 5
    if (one_hundreds & 5) == 5 { one_hundreds ^= 2; }
    if one_hundreds > 5 {
        return None;
    }

    if gray & 0x0002 != 0 { five_hundreds ^= 0x0ff; } // D2
    if gray & 0x0004 != 0 { five_hundreds ^= 0x07f; } // D4
    if gray & 0x1000 != 0 { five_hundreds ^= 0x03f; } // A1
    if gray & 0x2000 != 0 { five_hundreds ^= 0x01f; } // A2
    if gray & 0x4000 != 0 { five_hundreds ^= 0x00f; } // A4
    if gray & 0x0100 != 0 { five_hundreds ^= 0x007; } // B1
    if gray & 0x0200 != 0 { five_hundreds ^= 0x003; } // B2
    if gray & 0x0400 != 0 { five_hundreds ^= 0x001; } // B4

    if five_hundreds & 1 != 0 && one_hundreds <= 6 {
        one_hundreds = 6 - one_hundreds;
    }

    let n = (five_hundreds * 5) + one_hundreds;
    if n >= 13 {
        Some(n as i32 - 13)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexlit::hex;

    #[test]
    fn decode_altitude_reply() {
        let bytes = hex!("20001718029FCD");
        let (_, msg) = ModeS::from_bytes((&bytes, 0)).unwrap();
        match msg.df {
            Df::AltitudeReply { altitude, .. } => {
                assert!(altitude.0 > 0);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn decode_identity_reply() {
        let bytes = hex!("28000A00307264");
        let (_, msg) = ModeS::from_bytes((&bytes, 0)).unwrap();
        assert_eq!(msg.icao24(), 0x7c7daa);
        match msg.df {
            Df::IdentityReply { id, .. } => {
                // four octal digits
                assert!(id.0 & 0x8888 == 0);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn decode_all_call() {
        let bytes = hex!("5D7C7DAACD3CE9");
        let (_, msg) = ModeS::from_bytes((&bytes, 0)).unwrap();
        assert_eq!(msg.icao24(), 0x7c7daa);
        assert!(matches!(msg.df, Df::AllCallReply { .. }));
    }

    #[test]
    fn reject_corrupted_extended_squitter() {
        let bytes = hex!("8d4ca251204994b1c36e60a5343d");
        assert!(ModeS::from_bytes((&bytes, 0)).is_err());
    }

    #[test]
    fn extended_squitter_altitude() {
        let bytes = hex!("8D40621D58C382D690C8AC2863A7");
        let (_, msg) = ModeS::from_bytes((&bytes, 0)).unwrap();
        assert_eq!(msg.icao24(), 0x40621d);
    }
}
