use std::path::PathBuf;
use std::str::FromStr;
use url::Url;
use watch1090::prelude::{InputFormat, Position, SourceTag};

/// Where frames come from and how they are framed.
///
/// - `avr://host:30002`, `sbs1://host:30003`, `beast://host:30005`
///   read a live TCP feed;
/// - `file:capture.avr?format=avr` replays a capture.
///
/// A per-source receiver position may be appended as
/// `?ref=43.6,1.36`; it enables locally referenced CPR decoding and
/// the range checks for that source.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub input: Input,
    pub format: InputFormat,
    pub reference: Option<Position>,
}

#[derive(Debug, Clone)]
pub enum Input {
    Tcp(String),
    File(PathBuf),
}

impl SourceSpec {
    pub fn tag(&self, reference: Option<Position>) -> SourceTag {
        let name = match &self.input {
            Input::Tcp(address) => address.clone(),
            Input::File(path) => path.display().to_string(),
        };
        let mut tag = SourceTag::new(name, self.format);
        if let Some(reference) = self.reference.or(reference) {
            tag = tag.with_reference(reference);
        }
        tag
    }
}

fn default_port(format: InputFormat) -> u16 {
    match format {
        InputFormat::Avr => 30002,
        InputFormat::Sbs1 => 30003,
        InputFormat::Beast => 30005,
    }
}

fn parse_format(s: &str) -> Result<InputFormat, String> {
    match s {
        "avr" => Ok(InputFormat::Avr),
        "sbs1" => Ok(InputFormat::Sbs1),
        "beast" => Ok(InputFormat::Beast),
        other => Err(format!("unknown input format {other:?}")),
    }
}

fn parse_reference(s: &str) -> Result<Position, String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| "reference must be lat,lon".to_string())?;
    Ok(Position {
        latitude: lat
            .trim()
            .parse()
            .map_err(|e| format!("latitude: {e}"))?,
        longitude: lon
            .trim()
            .parse()
            .map_err(|e| format!("longitude: {e}"))?,
    })
}

impl FromStr for SourceSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s).map_err(|e| format!("{s:?}: {e}"))?;

        let mut reference = None;
        let mut format_override = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "ref" => reference = Some(parse_reference(&value)?),
                "format" => format_override = Some(parse_format(&value)?),
                other => {
                    return Err(format!("unknown source option {other:?}"))
                }
            }
        }

        match url.scheme() {
            "file" => {
                let format = format_override
                    .ok_or_else(|| "file sources need ?format=".to_string())?;
                Ok(SourceSpec {
                    input: Input::File(PathBuf::from(url.path())),
                    format,
                    reference,
                })
            }
            scheme => {
                let format = parse_format(scheme)?;
                let host = url
                    .host_str()
                    .ok_or_else(|| format!("{s:?}: missing host"))?;
                let port =
                    url.port().unwrap_or_else(|| default_port(format));
                Ok(SourceSpec {
                    input: Input::Tcp(format!("{host}:{port}")),
                    format,
                    reference,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_live_source_with_default_port() {
        let spec: SourceSpec = "beast://localhost".parse().unwrap();
        assert!(matches!(spec.input, Input::Tcp(ref a) if a == "localhost:30005"));
        assert_eq!(spec.format, InputFormat::Beast);
        assert!(spec.reference.is_none());
    }

    #[test]
    fn parse_source_with_reference() {
        let spec: SourceSpec =
            "avr://10.0.0.5:30002?ref=43.6,1.36".parse().unwrap();
        assert_eq!(spec.format, InputFormat::Avr);
        let reference = spec.reference.unwrap();
        assert_eq!(reference.latitude, 43.6);
        assert_eq!(reference.longitude, 1.36);
    }

    #[test]
    fn parse_file_source() {
        let spec: SourceSpec =
            "file:/tmp/capture.bin?format=beast".parse().unwrap();
        assert!(matches!(spec.input, Input::File(_)));
        assert_eq!(spec.format, InputFormat::Beast);
    }

    #[test]
    fn file_source_requires_format() {
        assert!("file:/tmp/capture.bin".parse::<SourceSpec>().is_err());
    }

    #[test]
    fn format_is_never_inferred_from_the_port() {
        // port 30005 on an avr:// source stays AVR
        let spec: SourceSpec = "avr://host:30005".parse().unwrap();
        assert_eq!(spec.format, InputFormat::Avr);
    }
}
