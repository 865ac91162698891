/*!
 * AVR framing: one ASCII line per frame, the hex payload between a
 * leading `*` and a trailing `;`. The wire format carries no
 * timestamp; frames are stamped on reception.
 */
use super::DecodeError;

/// Parse one AVR line into the Mode S payload bytes.
pub fn decode(line: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let line = trim_ascii(line);

    let inner = line
        .strip_prefix(b"*")
        .and_then(|rest| rest.strip_suffix(b";"))
        .ok_or_else(|| {
            DecodeError::Framing(format!(
                "not an AVR line: {:?}",
                String::from_utf8_lossy(line)
            ))
        })?;

    if inner.len() != 14 && inner.len() != 28 {
        return Err(DecodeError::Length(inner.len() / 2));
    }

    hex::decode(inner)
        .map_err(|e| DecodeError::Framing(format!("bad hex digits: {e}")))
}

/// Render a Mode S payload back to its AVR line.
pub fn encode(payload: &[u8]) -> String {
    format!("*{};", hex::encode_upper(payload))
}

fn trim_ascii(mut line: &[u8]) -> &[u8] {
    while let [rest @ .., last] = line {
        if last.is_ascii_whitespace() {
            line = rest;
        } else {
            break;
        }
    }
    while let [first, rest @ ..] = line {
        if first.is_ascii_whitespace() {
            line = rest;
        } else {
            break;
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let lines = [
            "*8D40621D58C382D690C8AC2863A7;",
            "*8D40621D58C386435CC412692AD6;",
            "*5D7C7DAACD3CE9;",
            "*0005050870B303;",
        ];
        for line in lines {
            let payload = decode(line.as_bytes()).unwrap();
            assert_eq!(encode(&payload), line);
        }
    }

    #[test]
    fn tolerates_line_endings() {
        let payload = decode(b"*8D40621D58C382D690C8AC2863A7;\r\n").unwrap();
        assert_eq!(payload.len(), 14);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(matches!(
            decode(b"8D40621D58C382D690C8AC2863A7"),
            Err(DecodeError::Framing(_))
        ));
        assert!(matches!(
            decode(b"*8D40621D58C382D690C8AC28;"),
            Err(DecodeError::Length(_))
        ));
        assert!(matches!(
            decode(b"*8D40621D58C382D690C8AC2863AZ;"),
            Err(DecodeError::Framing(_))
        ));
    }
}
