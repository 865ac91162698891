use deku::prelude::*;
use serde::Serialize;

/**
 * ## Operational Status (BDS 6,5, TC=31)
 *
 * Capability classes, the equipped ADS-B version and the integrity /
 * accuracy figures. Subtype 0 is broadcast while airborne, subtype 1
 * while on the ground; the tracker derives the air/ground state from
 * the subtype alone.
 */
#[derive(Debug, PartialEq, Serialize, DekuRead, Clone)]
#[deku(type = "u8", bits = "3")]
#[serde(tag = "status")]
pub enum OperationalStatus {
    #[deku(id = "0")]
    #[serde(rename = "airborne")]
    Airborne(AirborneOperationalStatus),

    #[deku(id = "1")]
    #[serde(rename = "surface")]
    Surface(SurfaceOperationalStatus),

    #[deku(id_pat = "_")]
    #[serde(skip)]
    Reserved {
        #[deku(count = "6")]
        unused: Vec<u8>,
    },
}

impl OperationalStatus {
    /// Air/ground state announced by the subtype
    pub fn on_ground(&self) -> Option<bool> {
        match self {
            Self::Airborne(_) => Some(false),
            Self::Surface(_) => Some(true),
            Self::Reserved { .. } => None,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, DekuRead, Copy, Clone)]
pub struct AirborneOperationalStatus {
    /// Capability class codes
    #[deku(bits = "16", endian = "big")]
    #[serde(skip)]
    pub capability_class: u16,

    /// Operational mode codes
    #[deku(bits = "16", endian = "big")]
    #[serde(skip)]
    pub operational_mode: u16,

    /// ADS-B version: 0, 1 (DO-260A) or 2 (DO-260B)
    #[deku(bits = "3")]
    pub version: u8,

    #[deku(bits = "1")]
    #[serde(skip)]
    pub nic_supplement_a: u8,

    /// Navigation accuracy category for position
    #[deku(bits = "4")]
    #[serde(rename = "NACp")]
    pub nac_p: u8,

    /// Geometric vertical accuracy
    #[deku(bits = "2")]
    #[serde(skip)]
    pub gva: u8,

    /// Source integrity level
    #[deku(bits = "2")]
    #[serde(skip)]
    pub sil: u8,

    #[deku(bits = "1")]
    #[serde(skip)]
    pub nic_baro: u8,

    /// Horizontal reference: true north or magnetic north
    #[deku(bits = "1")]
    #[serde(skip)]
    pub hrd: u8,

    #[deku(bits = "1")]
    #[serde(skip)]
    pub sil_supplement: u8,

    #[deku(bits = "1")]
    #[serde(skip)]
    pub reserved: u8,
}

#[derive(Debug, PartialEq, Serialize, DekuRead, Copy, Clone)]
pub struct SurfaceOperationalStatus {
    /// Capability class codes
    #[deku(bits = "12", endian = "big")]
    #[serde(skip)]
    pub capability_class: u16,

    /// Aircraft length and width codes
    #[deku(bits = "4")]
    #[serde(skip)]
    pub lw_codes: u8,

    /// Operational mode codes
    #[deku(bits = "16", endian = "big")]
    #[serde(skip)]
    pub operational_mode: u16,

    /// ADS-B version: 0, 1 (DO-260A) or 2 (DO-260B)
    #[deku(bits = "3")]
    pub version: u8,

    #[deku(bits = "1")]
    #[serde(skip)]
    pub nic_supplement_a: u8,

    /// Navigation accuracy category for position
    #[deku(bits = "4")]
    #[serde(rename = "NACp")]
    pub nac_p: u8,

    #[deku(bits = "2")]
    #[serde(skip)]
    pub reserved0: u8,

    /// Source integrity level
    #[deku(bits = "2")]
    #[serde(skip)]
    pub sil: u8,

    /// Whether the track angle or heading is provided in surface
    /// position messages
    #[deku(bits = "1")]
    #[serde(skip)]
    pub track_heading: u8,

    /// Horizontal reference: true north or magnetic north
    #[deku(bits = "1")]
    #[serde(skip)]
    pub hrd: u8,

    #[deku(bits = "1")]
    #[serde(skip)]
    pub sil_supplement: u8,

    #[deku(bits = "1")]
    #[serde(skip)]
    pub reserved1: u8,
}
