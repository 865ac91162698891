/*!
 * Wire formats and the canonical raw-frame record.
 *
 * Three framings of the same Mode S downlinks coexist on a dump1090
 * host: AVR ASCII lines (port 30002), SBS1 CSV records (port 30003)
 * and the binary Beast protocol (port 30005). The codecs here turn
 * each of them into either a [`RawFrame`] ready for bit-level decoding
 * or an already-decoded [`Sbs1Frame`].
 */
pub mod avr;
pub mod beast;
pub mod sbs1;

use crate::decode::cpr::Position;
use crate::decode::ModeS;
use deku::DekuContainerRead;
use deku::DekuError;
use serde::Serialize;
use std::sync::Arc;

pub use sbs1::Sbs1Frame;

/// Which codec the bytes of a source go through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Avr,
    Sbs1,
    Beast,
}

/// Identity and configuration of one input feed. The reference
/// position rides with every frame of the source instead of living in
/// a process-wide setting.
#[derive(Debug, Clone, Serialize)]
pub struct SourceTag {
    pub name: String,
    pub format: InputFormat,
    /// Receiver location, enables locally referenced CPR decoding and
    /// the range checks
    pub reference: Option<Position>,
}

impl SourceTag {
    pub fn new(name: impl Into<String>, format: InputFormat) -> Self {
        SourceTag {
            name: name.into(),
            format,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: Position) -> Self {
        self.reference = Some(reference);
        self
    }
}

/// One Mode S payload as it came off the wire
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// 7 or 14 bytes of Mode S downlink
    pub payload: Vec<u8>,
    /// Unix seconds at reception
    pub received_at: f64,
    /// Beast device timestamp (12 MHz ticks); never used for ordering
    pub device_timestamp: Option<u64>,
    /// Beast signal level
    pub signal_level: Option<u8>,
    pub tag: Arc<SourceTag>,
}

/// Transient wire errors: counted, logged and skipped, never fatal.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed framing: {0}")]
    Framing(String),
    #[error("unexpected payload length: {0} bytes")]
    Length(usize),
    #[error("checksum could not be reconciled: {0}")]
    Crc(String),
    #[error("bit-level decode failed: {0}")]
    Field(String),
}

impl From<DekuError> for DecodeError {
    fn from(e: DekuError) -> Self {
        match e {
            DekuError::Assertion(msg) => DecodeError::Crc(msg),
            other => DecodeError::Field(other.to_string()),
        }
    }
}

/// A decoded frame on its way to the tracker
#[derive(Debug, Clone)]
pub enum Frame {
    ModeS { msg: ModeS, raw: RawFrame },
    Sbs1(Sbs1Frame),
}

impl Frame {
    /// The aircraft this frame belongs to; 0 when unknown
    pub fn icao24(&self) -> u32 {
        match self {
            Frame::ModeS { msg, .. } => msg.icao24(),
            Frame::Sbs1(sbs1) => sbs1.icao24,
        }
    }

    pub fn received_at(&self) -> f64 {
        match self {
            Frame::ModeS { raw, .. } => raw.received_at,
            Frame::Sbs1(sbs1) => sbs1.received_at,
        }
    }

    pub fn reference(&self) -> Option<Position> {
        match self {
            Frame::ModeS { raw, .. } => raw.tag.reference,
            Frame::Sbs1(_) => None,
        }
    }
}

/// Run the source codec and the Mode S parser over one unit of input
/// (a line for the text formats, an unescaped record for Beast).
///
/// `Ok(None)` marks input that is valid but does not contribute to
/// tracking (status lines, Mode A/C records); errors mark input that
/// could not be understood at all.
pub fn decode(
    data: &[u8],
    received_at: f64,
    tag: &Arc<SourceTag>,
) -> Result<Option<Frame>, DecodeError> {
    match tag.format {
        InputFormat::Avr => {
            let payload = avr::decode(data)?;
            let raw = RawFrame {
                payload,
                received_at,
                device_timestamp: None,
                signal_level: None,
                tag: tag.clone(),
            };
            decode_modes(raw).map(Some)
        }
        InputFormat::Beast => {
            let record = beast::decode(data)?;
            match record.kind {
                beast::RecordKind::ModeAc => Ok(None),
                _ => {
                    let raw = RawFrame {
                        payload: record.payload,
                        received_at,
                        device_timestamp: Some(record.device_timestamp),
                        signal_level: Some(record.signal_level),
                        tag: tag.clone(),
                    };
                    decode_modes(raw).map(Some)
                }
            }
        }
        InputFormat::Sbs1 => {
            let line = std::str::from_utf8(data).map_err(|_| {
                DecodeError::Framing("SBS1 line is not UTF-8".to_string())
            })?;
            match sbs1::decode(line, received_at)? {
                Some(frame) => Ok(Some(Frame::Sbs1(frame))),
                None => Ok(None),
            }
        }
    }
}

fn decode_modes(raw: RawFrame) -> Result<Frame, DecodeError> {
    if raw.payload.len() != 7 && raw.payload.len() != 14 {
        return Err(DecodeError::Length(raw.payload.len()));
    }
    let (_, msg) = ModeS::from_bytes((&raw.payload, 0))?;
    Ok(Frame::ModeS { msg, raw })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(format: InputFormat) -> Arc<SourceTag> {
        Arc::new(SourceTag::new("test", format))
    }

    #[test]
    fn avr_line_to_modes_frame() {
        let frame = decode(
            b"*8D40621D58C382D690C8AC2863A7;",
            0.0,
            &tag(InputFormat::Avr),
        )
        .unwrap()
        .unwrap();
        assert_eq!(frame.icao24(), 0x40621d);
    }

    #[test]
    fn malformed_line_is_a_framing_error() {
        let result = decode(b"nonsense", 0.0, &tag(InputFormat::Avr));
        assert!(matches!(result, Err(DecodeError::Framing(_))));
    }

    #[test]
    fn truncated_payload_is_a_length_error() {
        let result = decode(b"*8D40621D;", 0.0, &tag(InputFormat::Avr));
        assert!(matches!(result, Err(DecodeError::Length(_) | DecodeError::Framing(_))));
    }
}
