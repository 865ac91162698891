/*!
 * SBS1 (BaseStation) framing: comma separated records, already decoded
 * by the upstream receiver. Only `MSG` records with transmission types
 * 1 to 8 contribute to tracking; the other record kinds (`STA`, `AIR`,
 * `ID`, `SEL`, `CLK`) are session bookkeeping.
 */
use super::DecodeError;
use serde::Serialize;

/// A tracking record from an SBS1 feed. Every field past the ICAO is
/// optional on the wire; empty CSV cells stay `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sbs1Frame {
    /// Transmission type, 1 to 8
    pub msg_type: u8,
    pub icao24: u32,
    /// Generated date and time as transmitted, e.g.
    /// `2023/01/12,08:31:07.571`
    pub generated: Option<String>,
    /// Unix seconds at reception
    #[serde(skip)]
    pub received_at: f64,
    pub callsign: Option<String>,
    pub altitude: Option<i32>,
    pub ground_speed: Option<f64>,
    pub track: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub vertical_rate: Option<i32>,
    /// Four octal digits, read as hex so that `{:04x}` prints them
    pub squawk: Option<u16>,
    pub alert: Option<bool>,
    pub emergency: Option<bool>,
    pub spi: Option<bool>,
    pub on_ground: Option<bool>,
}

/// Parse one SBS1 line. `Ok(None)` marks records that are valid but
/// carry nothing to track.
pub fn decode(
    line: &str,
    received_at: f64,
) -> Result<Option<Sbs1Frame>, DecodeError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let fields: Vec<&str> = line.split(',').collect();

    match fields[0] {
        "MSG" => {}
        "STA" | "AIR" | "ID" | "SEL" | "CLK" => return Ok(None),
        other => {
            return Err(DecodeError::Framing(format!(
                "unknown SBS1 record kind {other:?}"
            )))
        }
    }

    if fields.len() < 5 {
        return Err(DecodeError::Framing(
            "SBS1 MSG record too short".to_string(),
        ));
    }

    let msg_type: u8 = fields[1].trim().parse().map_err(|_| {
        DecodeError::Framing(format!(
            "bad SBS1 transmission type {:?}",
            fields[1]
        ))
    })?;
    if !(1..=8).contains(&msg_type) {
        return Ok(None);
    }

    let icao24 = u32::from_str_radix(fields[4].trim(), 16).map_err(|_| {
        DecodeError::Framing(format!("bad ICAO field {:?}", fields[4]))
    })?;

    let field = |idx: usize| -> Option<&str> {
        fields.get(idx).map(|s| s.trim()).filter(|s| !s.is_empty())
    };

    let generated = match (field(6), field(7)) {
        (Some(date), Some(time)) => Some(format!("{date},{time}")),
        _ => None,
    };

    Ok(Some(Sbs1Frame {
        msg_type,
        icao24,
        generated,
        received_at,
        callsign: field(10).map(|s| s.to_string()),
        altitude: field(11).and_then(|s| s.parse().ok()),
        ground_speed: field(12).and_then(|s| s.parse().ok()),
        track: field(13).and_then(|s| s.parse().ok()),
        latitude: field(14).and_then(|s| s.parse().ok()),
        longitude: field(15).and_then(|s| s.parse().ok()),
        vertical_rate: field(16).and_then(|s| s.parse().ok()),
        squawk: field(17).and_then(|s| u16::from_str_radix(s, 16).ok()),
        alert: field(18).and_then(parse_flag),
        emergency: field(19).and_then(parse_flag),
        spi: field(20).and_then(parse_flag),
        on_ground: field(21).and_then(parse_flag),
    }))
}

/// SBS1 boolean cells hold "0", "1" or "-1"
fn parse_flag(field: &str) -> Option<bool> {
    match field {
        "1" | "-1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_airborne_position_record() {
        let line = "MSG,3,1,1,7C6B2D,1,2023/01/12,08:31:07.571,2023/01/12,08:31:07.571,,2850,,,-34.8654,138.5358,,,0,,0,0";
        let frame = decode(line, 1.0).unwrap().unwrap();
        assert_eq!(frame.msg_type, 3);
        assert_eq!(frame.icao24, 0x7c6b2d);
        assert_eq!(frame.altitude, Some(2850));
        assert_eq!(frame.latitude, Some(-34.8654));
        assert_eq!(frame.longitude, Some(138.5358));
        assert_eq!(frame.on_ground, Some(false));
        assert_eq!(frame.callsign, None);
    }

    #[test]
    fn decode_identification_record() {
        let line = "MSG,1,1,1,7C6B2D,1,2023/01/12,08:31:07.571,2023/01/12,08:31:07.571,QFA421,,,,,,,,,,,";
        let frame = decode(line, 1.0).unwrap().unwrap();
        assert_eq!(frame.msg_type, 1);
        assert_eq!(frame.callsign.as_deref(), Some("QFA421"));
        assert_eq!(frame.latitude, None);
    }

    #[test]
    fn decode_velocity_record() {
        let line = "MSG,4,1,1,7C6B2D,1,2023/01/12,08:31:07.571,2023/01/12,08:31:07.571,,,288.6,103.2,,,-1832,,,,,";
        let frame = decode(line, 1.0).unwrap().unwrap();
        assert_eq!(frame.ground_speed, Some(288.6));
        assert_eq!(frame.track, Some(103.2));
        assert_eq!(frame.vertical_rate, Some(-1832));
    }

    #[test]
    fn status_records_do_not_track() {
        assert_eq!(decode("STA,,1,1,7C6B2D,1", 0.0).unwrap(), None);
        assert_eq!(decode("AIR,,1,1,7C6B2D,1", 0.0).unwrap(), None);
    }

    #[test]
    fn unknown_kind_is_an_error() {
        assert!(decode("XYZ,3,1,1,7C6B2D,1", 0.0).is_err());
    }

    #[test]
    fn squawk_keeps_octal_digits() {
        let line = "MSG,6,1,1,7C6B2D,1,2023/01/12,08:31:07.571,2023/01/12,08:31:07.571,,,,,,,,7700,1,1,0,0";
        let frame = decode(line, 1.0).unwrap().unwrap();
        assert_eq!(frame.squawk, Some(0x7700));
        assert_eq!(frame.alert, Some(true));
        assert_eq!(frame.emergency, Some(true));
    }
}
