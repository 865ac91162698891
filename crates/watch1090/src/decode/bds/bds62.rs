use deku::prelude::*;
use serde::Serialize;

/**
 * ## Target State and Status (BDS 6,2, TC=29)
 *
 * Selected altitude, barometric pressure setting, selected heading and
 * the autopilot mode flags.
 *
 * | TC | SUB | SILs | SRC | ALT | QNH | HDG st | HDG | NACp | NICb | SIL | MODE | RES |
 * | -- | --- | ---- | --- | --- | --- | ------ | --- | ---- | ---- | --- | ---- | --- |
 * | 5  | 2   | 1    | 1   | 11  | 9   | 1      | 9   | 4    | 1    | 2   | 8    | 2   |
 */
#[derive(Copy, Clone, Debug, Serialize, PartialEq, DekuRead)]
pub struct TargetState {
    #[deku(bits = "2")]
    #[serde(skip)]
    pub subtype: u8,

    /// SIL probability basis, per hour or per sample
    #[deku(bits = "1")]
    #[serde(skip)]
    pub sil_supplement: u8,

    /// Source of the selected altitude
    #[serde(rename = "source")]
    pub alt_source: AltitudeSettingSource,

    /// Selected altitude in ft, rounded to the nearest 100 ft; None
    /// when no valid data is available
    #[deku(
        bits = "11",
        endian = "big",
        map = "|alt: u16| -> Result<_, DekuError> {
            Ok(
                if alt > 1 { Some(((alt - 1) * 32 + 16) / 100 * 100) }
                else { None }
            )
        }"
    )]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_altitude: Option<u16>,

    /// QNH / QFE setting in millibar, None when no valid data is
    /// available
    #[deku(
        bits = "9",
        endian = "big",
        map = "|qnh: u32| -> Result<_, DekuError> {
            if qnh == 0 { Ok(None) }
            else { Ok(Some(800.0 + ((qnh - 1) as f32) * 0.8)) }
        }"
    )]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barometric_setting: Option<f32>,

    #[deku(bits = "1")]
    #[serde(skip)]
    pub heading_status: bool,

    /// Selected heading in degrees, LSB 180/256
    #[deku(
        bits = "9",
        endian = "big",
        map = "|v: u16| -> Result<_, DekuError> {
            if *heading_status {
                Ok(Some(f64::from(v) * 180. / 256.))
            } else { Ok(None) }
        }"
    )]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_heading: Option<f64>,

    /// Navigation accuracy category for position
    #[deku(bits = "4")]
    #[serde(rename = "NACp")]
    pub nac_p: u8,

    /// Whether the barometric altitude is cross-checked
    #[deku(bits = "1")]
    #[serde(skip)]
    pub nic_baro: u8,

    /// Source integrity level
    #[deku(bits = "2")]
    #[serde(skip)]
    pub sil: u8,

    #[deku(bits = "1")]
    #[serde(skip)]
    pub mode_status: bool,

    #[deku(bits = "1")]
    pub autopilot: bool,

    #[deku(bits = "1")]
    pub vnav: bool,

    #[deku(bits = "1")]
    pub alt_hold: bool,

    #[deku(bits = "1")]
    #[serde(skip)]
    pub imf: bool,

    #[deku(bits = "1")]
    pub approach: bool,

    #[deku(bits = "1")]
    pub tcas_operational: bool,

    #[deku(bits = "1")]
    pub lnav: bool,

    #[deku(bits = "2")]
    #[serde(skip)]
    pub reserved: u8,
}

#[derive(Debug, PartialEq, Serialize, DekuRead, Copy, Clone)]
#[deku(type = "u8", bits = "1")]
#[serde(rename_all = "snake_case")]
pub enum AltitudeSettingSource {
    /// Mode control panel / flight control unit
    McpFcu = 0,
    /// Flight management system
    Fms = 1,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::adsb::Me;
    use crate::decode::{Df, ModeS};
    use approx::assert_relative_eq;
    use hexlit::hex;

    #[test]
    fn decode_target_state() {
        let bytes = hex!("8DA05629EA21485CBF3F8CADAEEB");
        let (_, msg) = ModeS::from_bytes((&bytes, 0)).unwrap();
        let Df::ExtendedSquitter(adsb) = msg.df else {
            unreachable!()
        };
        let Me::TargetState(ts) = adsb.message else {
            unreachable!()
        };
        assert_eq!(ts.subtype, 1);
        assert_eq!(ts.alt_source, AltitudeSettingSource::McpFcu);
        assert_eq!(ts.selected_altitude, Some(17000));
        assert_eq!(ts.barometric_setting, Some(1012.8));
        assert_relative_eq!(
            ts.selected_heading.unwrap(),
            66.8,
            max_relative = 1e-3
        );
        assert!(ts.tcas_operational);
    }
}
