//! Match fields (OXM TLVs).
//!
//! The flow codecs treat a match as an opaque run of TLVs and reach the text form
//! only through [`MatchCodec`]. [`BasicOxm`] covers the common OpenFlow basic class
//! fields; callers needing more inject their own implementation.

use std::fmt::Write as _;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::bits::{Reader, WriteBe};
use crate::error::{DecodeError, EncodeError};

use super::{parse_int, parse_port, port_to_string};

/// Converts between match text and OXM TLV bytes.
pub trait MatchCodec: Sync {
    /// Encode the single match field at the front of `text`.
    ///
    /// Returns the TLV bytes and how many bytes of `text` were consumed. Consuming
    /// nothing means `text` does not start with a field this codec knows.
    fn encode_match(&self, text: &str) -> Result<(Vec<u8>, usize), EncodeError>;

    /// Render a run of TLVs as comma separated match text.
    fn decode_match(&self, tlv: &[u8]) -> Result<String, DecodeError>;
}

/// `OFPXMC_OPENFLOW_BASIC`
pub const OFPXMC_OPENFLOW_BASIC: u16 = 0x8000;

/// Total length of the TLV at the front of `buf`, header included.
pub fn tlv_len(buf: &[u8]) -> Option<usize> {
    buf.get(3).map(|len| 4 + *len as usize)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Format {
    Decimal,
    Hex,
    Port,
    Mac,
    Ipv4,
}

struct Field {
    name: &'static str,
    code: u8,
    width: usize,
    maskable: bool,
    format: Format,
}

const FIELDS: &[Field] = &[
    Field { name: "in_port", code: 0, width: 4, maskable: false, format: Format::Port },
    Field { name: "metadata", code: 2, width: 8, maskable: true, format: Format::Hex },
    Field { name: "eth_dst", code: 3, width: 6, maskable: true, format: Format::Mac },
    Field { name: "eth_src", code: 4, width: 6, maskable: true, format: Format::Mac },
    Field { name: "eth_type", code: 5, width: 2, maskable: false, format: Format::Hex },
    Field { name: "vlan_vid", code: 6, width: 2, maskable: true, format: Format::Hex },
    Field { name: "ip_proto", code: 10, width: 1, maskable: false, format: Format::Decimal },
    Field { name: "ipv4_src", code: 11, width: 4, maskable: true, format: Format::Ipv4 },
    Field { name: "ipv4_dst", code: 12, width: 4, maskable: true, format: Format::Ipv4 },
    Field { name: "tcp_src", code: 13, width: 2, maskable: false, format: Format::Decimal },
    Field { name: "tcp_dst", code: 14, width: 2, maskable: false, format: Format::Decimal },
    Field { name: "udp_src", code: 15, width: 2, maskable: false, format: Format::Decimal },
    Field { name: "udp_dst", code: 16, width: 2, maskable: false, format: Format::Decimal },
];

/// The OpenFlow basic match fields most flow tables use.
#[derive(Copy, Clone, Debug, Default)]
pub struct BasicOxm;

impl MatchCodec for BasicOxm {
    fn encode_match(&self, text: &str) -> Result<(Vec<u8>, usize), EncodeError> {
        let end = text
            .find(|c: char| c == ',' || c.is_whitespace())
            .unwrap_or(text.len());
        let token = &text[..end];
        let (name, arg) = match token.split_once('=') {
            Some((name, arg)) => (name, arg),
            None => return Ok((vec![], 0)),
        };
        let field = match FIELDS.iter().find(|f| f.name == name) {
            Some(field) => field,
            None => return Ok((vec![], 0)),
        };
        let (value, mask) = match arg.split_once('/') {
            Some((value, mask)) if field.maskable => (value, Some(mask)),
            Some(_) => {
                return Err(EncodeError::InvalidValue {
                    field: field.name,
                    value: arg.to_string(),
                })
            }
            None => (arg, None),
        };

        let payload = field.width * if mask.is_some() { 2 } else { 1 };
        let mut bytes = Vec::with_capacity(4 + payload);
        bytes.put_u16(OFPXMC_OPENFLOW_BASIC);
        bytes.put_u8(field.code << 1 | mask.is_some() as u8);
        bytes.put_u8(payload as u8);
        encode_value(field, value, &mut bytes)?;
        if let Some(mask) = mask {
            encode_mask(field, mask, &mut bytes)?;
        }
        Ok((bytes, end))
    }

    fn decode_match(&self, tlv: &[u8]) -> Result<String, DecodeError> {
        let mut bytes = Reader::new(tlv, 0);
        let mut tokens = vec![];
        while bytes.remaining() > 0 {
            let offset = bytes.offset();
            let class = bytes.u16()?;
            let field_hm = bytes.u8()?;
            let len = bytes.u8()? as usize;
            let payload = bytes.take(len)?;
            let has_mask = field_hm & 1 == 1;
            let known = FIELDS
                .iter()
                .find(|f| class == OFPXMC_OPENFLOW_BASIC && f.code == field_hm >> 1);
            let field = match known {
                Some(field) => field,
                None => {
                    tokens.push(format!(
                        "oxm_{:#06x}_{}={}",
                        class,
                        field_hm >> 1,
                        hex(payload)
                    ));
                    continue;
                }
            };
            let expected = field.width * if has_mask { 2 } else { 1 };
            if len != expected {
                return Err(DecodeError::Malformed {
                    offset,
                    what: "oxm field",
                    length: len,
                });
            }
            let mut token = format!("{}={}", field.name, render(field, &payload[..field.width]));
            if has_mask {
                token.push('/');
                token.push_str(&render(field, &payload[field.width..]));
            }
            tokens.push(token);
        }
        Ok(tokens.join(","))
    }
}

fn invalid(field: &Field, value: &str) -> EncodeError {
    EncodeError::InvalidValue {
        field: field.name,
        value: value.to_string(),
    }
}

fn put_uint(field: &Field, value: u64, bytes: &mut Vec<u8>) -> Result<(), EncodeError> {
    let max = if field.width == 8 {
        u64::MAX
    } else {
        (1u64 << (8 * field.width)) - 1
    };
    if value > max {
        return Err(EncodeError::FieldOverflow {
            field: field.name,
            value,
            max,
        });
    }
    for i in (0..field.width).rev() {
        bytes.put_u8((value >> (8 * i)) as u8);
    }
    Ok(())
}

fn encode_value(field: &Field, text: &str, bytes: &mut Vec<u8>) -> Result<(), EncodeError> {
    match field.format {
        Format::Decimal | Format::Hex => {
            let value = parse_int(text).ok_or_else(|| invalid(field, text))?;
            put_uint(field, value, bytes)
        }
        Format::Port => {
            let port = parse_port(field.name, text)?;
            bytes.put_u32(port);
            Ok(())
        }
        Format::Mac => {
            let octets: Vec<&str> = text.split(':').collect();
            if octets.len() != 6 {
                return Err(invalid(field, text));
            }
            for octet in octets {
                let b = u8::from_str_radix(octet, 16).map_err(|_| invalid(field, text))?;
                bytes.put_u8(b);
            }
            Ok(())
        }
        Format::Ipv4 => {
            let addr = Ipv4Addr::from_str(text).map_err(|_| invalid(field, text))?;
            bytes.extend_from_slice(&addr.octets());
            Ok(())
        }
    }
}

fn encode_mask(field: &Field, text: &str, bytes: &mut Vec<u8>) -> Result<(), EncodeError> {
    // ipv4 masks may also be given as a prefix length
    if field.format == Format::Ipv4 && !text.contains('.') {
        let prefix = text
            .parse::<u32>()
            .ok()
            .filter(|p| *p <= 32)
            .ok_or_else(|| invalid(field, text))?;
        let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
        bytes.put_u32(mask);
        return Ok(());
    }
    encode_value(field, text, bytes)
}

fn render(field: &Field, payload: &[u8]) -> String {
    let value = payload.iter().fold(0u64, |acc, b| acc << 8 | *b as u64);
    match field.format {
        Format::Decimal => value.to_string(),
        Format::Hex if field.width == 2 => format!("{:#06x}", value),
        Format::Hex => format!("{:#x}", value),
        Format::Port => port_to_string(value as u32),
        Format::Mac => payload
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":"),
        Format::Ipv4 => Ipv4Addr::from(value as u32).to_string(),
    }
}

/// Lowercase hex, no separators.
pub fn hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(2 * bytes.len());
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

pub fn unhex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| text.get(i..i + 2).and_then(|b| u8::from_str_radix(b, 16).ok()))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_consumes_one_field() {
        let (tlv, used) = BasicOxm.encode_match("eth_type=0x0800,ip_proto=6").unwrap();
        assert_eq!(tlv, vec![0x80, 0x00, 0x0a, 0x02, 0x08, 0x00]);
        assert_eq!(used, "eth_type=0x0800".len());
    }

    #[test]
    fn unknown_field_consumes_nothing() {
        assert_eq!(BasicOxm.encode_match("frobnicate=1"), Ok((vec![], 0)));
        assert_eq!(BasicOxm.encode_match("pop_vlan"), Ok((vec![], 0)));
    }

    #[test]
    fn masks_only_where_allowed() {
        let (tlv, _) = BasicOxm.encode_match("ipv4_dst=10.0.0.0/8").unwrap();
        assert_eq!(
            tlv,
            vec![0x80, 0x00, 0x19, 0x08, 10, 0, 0, 0, 0xff, 0, 0, 0]
        );
        assert!(matches!(
            BasicOxm.encode_match("tcp_dst=80/0xff"),
            Err(EncodeError::InvalidValue { field: "tcp_dst", .. })
        ));
    }

    #[test]
    fn values_must_fit() {
        assert!(matches!(
            BasicOxm.encode_match("ip_proto=256"),
            Err(EncodeError::FieldOverflow { field: "ip_proto", .. })
        ));
    }

    #[test]
    fn decode_renders_fields() {
        let mut tlv = vec![];
        for text in ["in_port=3", "eth_dst=00:11:22:33:44:55", "ipv4_src=192.168.1.0/255.255.255.0"] {
            tlv.extend(BasicOxm.encode_match(text).unwrap().0);
        }
        assert_eq!(
            BasicOxm.decode_match(&tlv).unwrap(),
            "in_port=3,eth_dst=00:11:22:33:44:55,ipv4_src=192.168.1.0/255.255.255.0"
        );
    }

    #[test]
    fn decode_rejects_bad_lengths() {
        let tlv = [0x80, 0x00, 0x0a, 0x01, 0x08];
        assert_eq!(
            BasicOxm.decode_match(&tlv),
            Err(DecodeError::Malformed {
                offset: 0,
                what: "oxm field",
                length: 1,
            })
        );
        assert!(matches!(
            BasicOxm.decode_match(&[0x80, 0x00, 0x0a, 0x02, 0x08]),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn hex_round_trip() {
        assert_eq!(hex(&[0, 0xab, 0x10]), "00ab10");
        assert_eq!(unhex("00ab10"), Some(vec![0, 0xab, 0x10]));
        assert_eq!(unhex("0"), None);
        assert_eq!(unhex("zz"), None);
    }
}
