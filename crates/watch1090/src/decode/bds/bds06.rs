use crate::decode::cpr::CprFormat;
use deku::bitvec::{BitSlice, Msb0};
use deku::prelude::*;
use serde::Serialize;

/**
 * ## Surface Position (BDS 0,6)
 *
 * Broadcast instead of the airborne position while the aircraft is on
 * the ground: the altitude field is replaced by ground movement and
 * track.
 *
 * | TC | MOV | S | TRK | T | F | LAT-CPR | LON-CPR |
 * | -- | --- | - | --- | - | - | ------- | ------- |
 * | 5  |  7  | 1 |  7  | 1 | 1 |   17    |   17    |
 */
#[derive(Debug, PartialEq, Serialize, DekuRead, Copy, Clone)]
#[deku(ctx = "_tc: u8")]
pub struct SurfacePosition {
    /// Ground speed in kts from the 7-bit non-linear movement encoding,
    /// None when unavailable or reserved
    #[deku(reader = "read_movement(deku::rest)")]
    pub groundspeed: Option<f64>,

    /// Validity of the track field
    #[deku(bits = "1")]
    #[serde(skip)]
    pub track_status: bool,

    /// Ground track in degrees clockwise from true north, LSB 360/128
    #[deku(
        bits = "7",
        map = "|v: u8| -> Result<_, DekuError> {
            if *track_status {
                Ok(Some(f64::from(v) * 360. / 128.))
            } else {
                Ok(None)
            }
        }"
    )]
    pub track: Option<f64>,

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

/// Movement field: quantization gets coarser as the speed grows.
/// 0 means no information, 124 means 175 kt or above, 125..=127 are
/// reserved.
fn read_movement(
    rest: &BitSlice<u8, Msb0>,
) -> Result<(&BitSlice<u8, Msb0>, Option<f64>), DekuError> {
    let (rest, mov) =
        u8::read(rest, (deku::ctx::Endian::Big, deku::ctx::BitSize(7)))?;
    let speed = match mov {
        0 => None,
        1 => Some(0.),
        2..=8 => Some(0.125 + f64::from(mov - 2) * 0.125),
        9..=12 => Some(1. + f64::from(mov - 9) * 0.25),
        13..=38 => Some(2. + f64::from(mov - 13) * 0.5),
        39..=93 => Some(15. + f64::from(mov - 39)),
        94..=108 => Some(70. + f64::from(mov - 94) * 2.),
        109..=123 => Some(100. + f64::from(mov - 109) * 5.),
        124 => Some(175.),
        _ => None,
    };
    Ok((rest, speed))
}
