/*!
 * Beast binary framing.
 *
 * Each record starts with the escape byte `0x1a` followed by a type
 * byte, a 6-byte device timestamp counted by the receiver's 12 MHz
 * clock, one byte of signal level and the Mode S payload:
 *
 *  - `0x31`: Mode A/C, 2 byte payload
 *  - `0x32`: Mode S short frame, 7 byte payload
 *  - `0x33`: Mode S long frame, 14 byte payload
 *  - `0x34`: receiver status, skipped
 *
 * Every literal `0x1a` inside a record is doubled on the wire.
 */
use super::DecodeError;

const ESCAPE: u8 = 0x1a;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    ModeAc,
    ModeSShort,
    ModeSLong,
}

/// One unescaped Beast record
#[derive(Debug, Clone)]
pub struct BeastRecord {
    pub kind: RecordKind,
    /// 12 MHz ticks since the receiver started counting
    pub device_timestamp: u64,
    pub signal_level: u8,
    pub payload: Vec<u8>,
}

fn body_len(kind: u8) -> Option<usize> {
    // timestamp + signal + payload
    match kind {
        0x31 => Some(6 + 1 + 2),
        0x32 => Some(6 + 1 + 7),
        0x33 => Some(6 + 1 + 14),
        0x34 => Some(6 + 1 + 14),
        _ => None,
    }
}

/// Accumulates the raw byte stream and splits it into unescaped
/// records. Incomplete trailing input stays buffered until the next
/// `push`.
#[derive(Debug, Default)]
pub struct Deframer {
    buf: Vec<u8>,
}

impl Deframer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// The next complete record, as `[0x1a, type, body...]` with the
    /// escape doubling undone. Returns None when more input is needed.
    pub fn next_record(&mut self) -> Option<Vec<u8>> {
        loop {
            // Resynchronize on the next escape byte
            let Some(start) = self.buf.iter().position(|&b| b == ESCAPE)
            else {
                self.buf.clear();
                return None;
            };
            self.buf.drain(..start);

            if self.buf.len() < 2 {
                return None;
            }

            let kind = self.buf[1];
            let Some(need) = body_len(kind) else {
                // Either a doubled escape out of sync or a corrupted
                // record; drop the escape byte and try again
                self.buf.drain(..1);
                continue;
            };

            let mut record = Vec::with_capacity(2 + need);
            record.push(ESCAPE);
            record.push(kind);

            let mut idx = 2;
            let mut truncated = false;
            while record.len() < 2 + need {
                match self.buf.get(idx) {
                    None => return None,
                    Some(&ESCAPE) => match self.buf.get(idx + 1) {
                        None => return None,
                        Some(&ESCAPE) => {
                            record.push(ESCAPE);
                            idx += 2;
                        }
                        Some(_) => {
                            // A new record begins inside this one: the
                            // current record was truncated on the wire
                            truncated = true;
                            break;
                        }
                    },
                    Some(&byte) => {
                        record.push(byte);
                        idx += 1;
                    }
                }
            }

            if truncated {
                self.buf.drain(..idx);
                continue;
            }

            self.buf.drain(..idx);
            if kind == 0x34 {
                // Receiver status, nothing to track
                continue;
            }
            return Some(record);
        }
    }
}

/// Split one unescaped record into its fields.
pub fn decode(record: &[u8]) -> Result<BeastRecord, DecodeError> {
    if record.len() < 2 || record[0] != ESCAPE {
        return Err(DecodeError::Framing(
            "Beast record does not start with 0x1a".to_string(),
        ));
    }
    let kind = match record[1] {
        0x31 => RecordKind::ModeAc,
        0x32 => RecordKind::ModeSShort,
        0x33 => RecordKind::ModeSLong,
        other => {
            return Err(DecodeError::Framing(format!(
                "unknown Beast record type {other:#04x}"
            )))
        }
    };
    let expected = 2 + body_len(record[1]).unwrap_or(0);
    if record.len() != expected {
        return Err(DecodeError::Length(record.len()));
    }

    let mut ts = [0u8; 8];
    ts[2..8].copy_from_slice(&record[2..8]);

    Ok(BeastRecord {
        kind,
        device_timestamp: u64::from_be_bytes(ts),
        signal_level: record[8],
        payload: record[9..].to_vec(),
    })
}
