//! Actions (`ofp_action_header` prefixed TLVs).

use tracing::warn;

use crate::bits::{align8, length16, pad8, Reader, WriteBe};
use crate::error::{DecodeError, EncodeError};

use super::oxm::{hex, tlv_len, unhex};
use super::parser::{Scanner, Token};
use super::vendor::VendorCodec;
use super::{parse_port, parse_uint, port_to_string, Codecs, OFPCML_NO_BUFFER};

#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum OfpActionType {
    Output = 0,
    CopyTtlOut = 11,
    CopyTtlIn = 12,
    SetMplsTtl = 15,
    DecMplsTtl = 16,
    PushVlan = 17,
    PopVlan = 18,
    PushMpls = 19,
    PopMpls = 20,
    SetQueue = 21,
    Group = 22,
    SetNwTtl = 23,
    DecNwTtl = 24,
    SetField = 25,
    PushPbb = 26,
    PopPbb = 27,
    Experimenter = 0xffff,
}

const OFPAT_OUTPUT: u16 = OfpActionType::Output as u16;
const OFPAT_COPY_TTL_OUT: u16 = OfpActionType::CopyTtlOut as u16;
const OFPAT_COPY_TTL_IN: u16 = OfpActionType::CopyTtlIn as u16;
const OFPAT_SET_MPLS_TTL: u16 = OfpActionType::SetMplsTtl as u16;
const OFPAT_DEC_MPLS_TTL: u16 = OfpActionType::DecMplsTtl as u16;
const OFPAT_PUSH_VLAN: u16 = OfpActionType::PushVlan as u16;
const OFPAT_POP_VLAN: u16 = OfpActionType::PopVlan as u16;
const OFPAT_PUSH_MPLS: u16 = OfpActionType::PushMpls as u16;
const OFPAT_POP_MPLS: u16 = OfpActionType::PopMpls as u16;
const OFPAT_SET_QUEUE: u16 = OfpActionType::SetQueue as u16;
const OFPAT_GROUP: u16 = OfpActionType::Group as u16;
const OFPAT_SET_NW_TTL: u16 = OfpActionType::SetNwTtl as u16;
const OFPAT_DEC_NW_TTL: u16 = OfpActionType::DecNwTtl as u16;
const OFPAT_SET_FIELD: u16 = OfpActionType::SetField as u16;
const OFPAT_PUSH_PBB: u16 = OfpActionType::PushPbb as u16;
const OFPAT_POP_PBB: u16 = OfpActionType::PopPbb as u16;
const OFPAT_EXPERIMENTER: u16 = OfpActionType::Experimenter as u16;

/// Length of the `type, length` prefix every action starts with.
const ACTION_HEADER: usize = 4;
/// Experimenter header followed by a vendor subtype.
const VENDOR_HEADER: usize = 10;

/// Actions associated with flows and group buckets.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Output { port: u32, max_len: u16 },
    CopyTtlOut,
    CopyTtlIn,
    SetMplsTtl(u8),
    DecMplsTtl,
    PushVlan(u16),
    PopVlan,
    PushMpls(u16),
    PopMpls(u16),
    SetQueue(u32),
    Group(u32),
    SetNwTtl(u8),
    DecNwTtl,
    /// A single OXM TLV, without trailing padding.
    SetField(Vec<u8>),
    PushPbb(u16),
    PopPbb,
    /// Everything after the experimenter id, trailing padding included.
    Experimenter { experimenter: u32, data: Vec<u8> },
    /// An action type this codec does not know, kept verbatim.
    Unknown { typ: u16, data: Vec<u8> },
}

impl Action {
    /// Output to `port`, sending whole packets when the port is the controller.
    pub fn output(port: u32) -> Action {
        Action::Output {
            port,
            max_len: OFPCML_NO_BUFFER,
        }
    }

    fn type_code(&self) -> u16 {
        match *self {
            Action::Output { .. } => OFPAT_OUTPUT,
            Action::CopyTtlOut => OFPAT_COPY_TTL_OUT,
            Action::CopyTtlIn => OFPAT_COPY_TTL_IN,
            Action::SetMplsTtl(_) => OFPAT_SET_MPLS_TTL,
            Action::DecMplsTtl => OFPAT_DEC_MPLS_TTL,
            Action::PushVlan(_) => OFPAT_PUSH_VLAN,
            Action::PopVlan => OFPAT_POP_VLAN,
            Action::PushMpls(_) => OFPAT_PUSH_MPLS,
            Action::PopMpls(_) => OFPAT_POP_MPLS,
            Action::SetQueue(_) => OFPAT_SET_QUEUE,
            Action::Group(_) => OFPAT_GROUP,
            Action::SetNwTtl(_) => OFPAT_SET_NW_TTL,
            Action::DecNwTtl => OFPAT_DEC_NW_TTL,
            Action::SetField(_) => OFPAT_SET_FIELD,
            Action::PushPbb(_) => OFPAT_PUSH_PBB,
            Action::PopPbb => OFPAT_POP_PBB,
            Action::Experimenter { .. } => OFPAT_EXPERIMENTER,
            Action::Unknown { typ, .. } => typ,
        }
    }

    /// Return the padded wire size of an action, header included.
    pub fn size_of(&self) -> usize {
        match *self {
            Action::Output { .. } => 16,
            Action::SetField(ref tlv) => align8(ACTION_HEADER + tlv.len()),
            Action::Experimenter { ref data, .. } => align8(8 + data.len()),
            Action::Unknown { ref data, .. } => align8(ACTION_HEADER + data.len()),
            _ => 8,
        }
    }

    pub fn size_of_sequence(actions: &[Action]) -> usize {
        actions.iter().fold(0, |acc, x| x.size_of() + acc)
    }

    /// Append the wire form of `self` to `bytes`.
    pub fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), EncodeError> {
        let start = bytes.len();
        bytes.put_u16(self.type_code());
        bytes.put_u16(length16("action length", self.size_of())?);
        match *self {
            Action::Output { port, max_len } => {
                bytes.put_u32(port);
                bytes.put_u16(max_len);
            }
            Action::SetMplsTtl(ttl) | Action::SetNwTtl(ttl) => bytes.put_u8(ttl),
            Action::PushVlan(ethertype)
            | Action::PushMpls(ethertype)
            | Action::PopMpls(ethertype)
            | Action::PushPbb(ethertype) => bytes.put_u16(ethertype),
            Action::SetQueue(id) | Action::Group(id) => bytes.put_u32(id),
            Action::SetField(ref tlv) => bytes.extend_from_slice(tlv),
            Action::Experimenter {
                experimenter,
                ref data,
            } => {
                bytes.put_u32(experimenter);
                bytes.extend_from_slice(data);
            }
            Action::Unknown { ref data, .. } => bytes.extend_from_slice(data),
            Action::CopyTtlOut
            | Action::CopyTtlIn
            | Action::DecMplsTtl
            | Action::PopVlan
            | Action::DecNwTtl
            | Action::PopPbb => (),
        }
        pad8(bytes, start);
        Ok(())
    }

    /// Parse one action from `bytes`.
    pub(crate) fn parse(
        bytes: &mut Reader,
        vendor: &dyn VendorCodec,
    ) -> Result<Action, DecodeError> {
        let offset = bytes.offset();
        let typ = bytes.u16()?;
        let len = bytes.u16()? as usize;
        let malformed = DecodeError::Malformed {
            offset,
            what: "action",
            length: len,
        };
        if len < ACTION_HEADER {
            return Err(malformed);
        }
        let body = bytes.take(len - ACTION_HEADER)?;
        let mut payload = Reader::new(body, offset + ACTION_HEADER);

        if typ == OFPAT_EXPERIMENTER && body.len() >= 4 {
            let experimenter = payload.u32()?;
            if vendor.vendor_id() == Some(experimenter) {
                if len < VENDOR_HEADER {
                    return Err(malformed);
                }
                return Ok(Action::Experimenter {
                    experimenter,
                    data: body[4..].to_vec(),
                });
            }
            payload = Reader::new(body, offset + ACTION_HEADER);
        }
        if len < 8 || len % 8 != 0 {
            return Err(malformed);
        }

        let fixed = |expected: usize| {
            if len == expected {
                Ok(())
            } else {
                Err(DecodeError::Malformed {
                    offset,
                    what: "action",
                    length: len,
                })
            }
        };
        let action = match typ {
            OFPAT_OUTPUT => {
                fixed(16)?;
                Action::Output {
                    port: payload.u32()?,
                    max_len: payload.u16()?,
                }
            }
            OFPAT_COPY_TTL_OUT => fixed(8).map(|_| Action::CopyTtlOut)?,
            OFPAT_COPY_TTL_IN => fixed(8).map(|_| Action::CopyTtlIn)?,
            OFPAT_SET_MPLS_TTL => {
                fixed(8)?;
                Action::SetMplsTtl(payload.u8()?)
            }
            OFPAT_DEC_MPLS_TTL => fixed(8).map(|_| Action::DecMplsTtl)?,
            OFPAT_PUSH_VLAN => {
                fixed(8)?;
                Action::PushVlan(payload.u16()?)
            }
            OFPAT_POP_VLAN => fixed(8).map(|_| Action::PopVlan)?,
            OFPAT_PUSH_MPLS => {
                fixed(8)?;
                Action::PushMpls(payload.u16()?)
            }
            OFPAT_POP_MPLS => {
                fixed(8)?;
                Action::PopMpls(payload.u16()?)
            }
            OFPAT_SET_QUEUE => {
                fixed(8)?;
                Action::SetQueue(payload.u32()?)
            }
            OFPAT_GROUP => {
                fixed(8)?;
                Action::Group(payload.u32()?)
            }
            OFPAT_SET_NW_TTL => {
                fixed(8)?;
                Action::SetNwTtl(payload.u8()?)
            }
            OFPAT_DEC_NW_TTL => fixed(8).map(|_| Action::DecNwTtl)?,
            OFPAT_SET_FIELD => {
                let tlv = match tlv_len(body) {
                    Some(n) if n <= body.len() => n,
                    _ => {
                        return Err(DecodeError::Malformed {
                            offset: offset + ACTION_HEADER,
                            what: "set_field oxm",
                            length: body.len(),
                        })
                    }
                };
                Action::SetField(body[..tlv].to_vec())
            }
            OFPAT_PUSH_PBB => {
                fixed(8)?;
                Action::PushPbb(payload.u16()?)
            }
            OFPAT_POP_PBB => fixed(8).map(|_| Action::PopPbb)?,
            OFPAT_EXPERIMENTER => Action::Experimenter {
                experimenter: payload.u32()?,
                data: body[4..].to_vec(),
            },
            _ => {
                warn!(offset, typ, len, "passing through unknown action type");
                Action::Unknown {
                    typ,
                    data: body.to_vec(),
                }
            }
        };
        Ok(action)
    }

    /// Parse every action in `buf`, the first of which starts at `base` in the message.
    pub(crate) fn parse_sequence(
        buf: &[u8],
        base: usize,
        vendor: &dyn VendorCodec,
    ) -> Result<Vec<Action>, DecodeError> {
        let mut bytes = Reader::new(buf, base);
        let mut actions = vec![];
        while bytes.remaining() > 0 {
            actions.push(Action::parse(&mut bytes, vendor)?);
        }
        Ok(actions)
    }

    /// Parse the action named by `token`, pulling any match text it needs from `scanner`.
    pub(crate) fn parse_text<'a>(
        token: Token<'a>,
        scanner: &mut Scanner<'a>,
        codecs: &Codecs,
    ) -> Result<Action, EncodeError> {
        let source = scanner.text();
        let none = |action: Action| match token.arg {
            None => Ok(action),
            Some(_) => Err(EncodeError::Syntax {
                token: token.text(source).to_string(),
                reason: "action takes no argument",
            }),
        };
        let arg = |field: &'static str| {
            token.arg.ok_or_else(|| EncodeError::InvalidValue {
                field,
                value: String::new(),
            })
        };
        let action = match token.name {
            "output" => {
                let arg = arg("output")?;
                let (port, max_len) = match arg.split_once(':') {
                    Some((port, max_len)) => (
                        port,
                        parse_uint("max_len", max_len, u16::MAX as u64)? as u16,
                    ),
                    None => (arg, OFPCML_NO_BUFFER),
                };
                Action::Output {
                    port: parse_port("output", port)?,
                    max_len,
                }
            }
            "copy_ttl_out" => none(Action::CopyTtlOut)?,
            "copy_ttl_in" => none(Action::CopyTtlIn)?,
            "set_mpls_ttl" => {
                Action::SetMplsTtl(parse_uint("set_mpls_ttl", arg("set_mpls_ttl")?, 0xff)? as u8)
            }
            "dec_mpls_ttl" => none(Action::DecMplsTtl)?,
            "push_vlan" => Action::PushVlan(ethertype("push_vlan", arg("push_vlan")?)?),
            "pop_vlan" => none(Action::PopVlan)?,
            "push_mpls" => Action::PushMpls(ethertype("push_mpls", arg("push_mpls")?)?),
            "pop_mpls" => Action::PopMpls(ethertype("pop_mpls", arg("pop_mpls")?)?),
            "set_queue" => Action::SetQueue(
                parse_uint("set_queue", arg("set_queue")?, u32::MAX as u64)? as u32,
            ),
            "group" => Action::Group(parse_uint("group", arg("group")?, u32::MAX as u64)? as u32),
            "set_nw_ttl" => {
                Action::SetNwTtl(parse_uint("set_nw_ttl", arg("set_nw_ttl")?, 0xff)? as u8)
            }
            "dec_nw_ttl" => none(Action::DecNwTtl)?,
            "push_pbb" => Action::PushPbb(ethertype("push_pbb", arg("push_pbb")?)?),
            "pop_pbb" => none(Action::PopPbb)?,
            "experimenter" => {
                let arg = arg("experimenter")?;
                let invalid = || EncodeError::InvalidValue {
                    field: "experimenter",
                    value: arg.to_string(),
                };
                let (id, data) = arg.split_once(':').unwrap_or((arg, ""));
                Action::Experimenter {
                    experimenter: parse_uint("experimenter", id, u32::MAX as u64)? as u32,
                    data: unhex(data).ok_or_else(invalid)?,
                }
            }
            "unknown_action" => {
                let arg = arg("unknown_action")?;
                let (typ, data) = arg.split_once(':').unwrap_or((arg, ""));
                Action::Unknown {
                    typ: parse_uint("unknown_action", typ, u16::MAX as u64)? as u16,
                    data: unhex(data).ok_or_else(|| EncodeError::InvalidValue {
                        field: "unknown_action",
                        value: arg.to_string(),
                    })?,
                }
            }
            name => {
                if let Some(bytes) = codecs.vendor.encode_vendor_action(name, token.arg) {
                    let mut reader = Reader::new(&bytes, 0);
                    return Action::parse(&mut reader, codecs.vendor).map_err(|_| {
                        EncodeError::InvalidValue {
                            field: "vendor action",
                            value: token.text(source).to_string(),
                        }
                    });
                }
                match name.strip_prefix("set_") {
                    Some(field) => set_field(token, field, scanner, codecs)?,
                    None => {
                        return Err(EncodeError::UnknownToken {
                            token: token.text(source).to_string(),
                        })
                    }
                }
            }
        };
        Ok(action)
    }

    /// Parse a whole comma separated action list.
    pub fn parse_list(text: &str, codecs: &Codecs) -> Result<Vec<Action>, EncodeError> {
        let mut scanner = Scanner::new(text);
        let mut actions = vec![];
        while let Some(token) = scanner.next_token()? {
            actions.push(Action::parse_text(token, &mut scanner, codecs)?);
        }
        Ok(actions)
    }

    /// Render `self` in the text syntax.
    pub fn to_text(&self, codecs: &Codecs) -> Result<String, DecodeError> {
        let text = match *self {
            Action::Output { port, max_len } => {
                if max_len == OFPCML_NO_BUFFER {
                    format!("output={}", port_to_string(port))
                } else {
                    format!("output={}:{:#x}", port_to_string(port), max_len)
                }
            }
            Action::CopyTtlOut => "copy_ttl_out".to_string(),
            Action::CopyTtlIn => "copy_ttl_in".to_string(),
            Action::SetMplsTtl(ttl) => format!("set_mpls_ttl={}", ttl),
            Action::DecMplsTtl => "dec_mpls_ttl".to_string(),
            Action::PushVlan(ethertype) => format!("push_vlan={:#06x}", ethertype),
            Action::PopVlan => "pop_vlan".to_string(),
            Action::PushMpls(ethertype) => format!("push_mpls={:#06x}", ethertype),
            Action::PopMpls(ethertype) => format!("pop_mpls={:#06x}", ethertype),
            Action::SetQueue(id) => format!("set_queue={}", id),
            Action::Group(id) => format!("group={}", id),
            Action::SetNwTtl(ttl) => format!("set_nw_ttl={}", ttl),
            Action::DecNwTtl => "dec_nw_ttl".to_string(),
            Action::SetField(ref tlv) => format!("set_{}", codecs.matcher.decode_match(tlv)?),
            Action::PushPbb(ethertype) => format!("push_pbb={:#06x}", ethertype),
            Action::PopPbb => "pop_pbb".to_string(),
            Action::Experimenter {
                experimenter,
                ref data,
            } => {
                let known = if codecs.vendor.vendor_id() == Some(experimenter) && data.len() >= 2 {
                    let sub_type = (data[0] as u16) << 8 | data[1] as u16;
                    codecs
                        .vendor
                        .decode_vendor_action(experimenter, sub_type, &data[2..])
                } else {
                    None
                };
                match known {
                    Some(text) => text,
                    None if data.is_empty() => format!("experimenter={:#x}", experimenter),
                    None => format!("experimenter={:#x}:{}", experimenter, hex(data)),
                }
            }
            Action::Unknown { typ, ref data } if data.is_empty() => {
                format!("unknown_action={:#x}", typ)
            }
            Action::Unknown { typ, ref data } => {
                format!("unknown_action={:#x}:{}", typ, hex(data))
            }
        };
        Ok(text)
    }
}

fn ethertype(field: &'static str, text: &str) -> Result<u16, EncodeError> {
    Ok(parse_uint(field, text, u16::MAX as u64)? as u16)
}

fn set_field<'a>(
    token: Token<'a>,
    field: &str,
    scanner: &mut Scanner<'a>,
    codecs: &Codecs,
) -> Result<Action, EncodeError> {
    let source = scanner.text();
    let unknown = || EncodeError::UnknownToken {
        token: token.text(source).to_string(),
    };
    if token.call {
        // set_eth_dst(..) spelling: the match codec must take the whole argument
        let text = format!("{}={}", field, token.arg.unwrap_or_default());
        let (tlv, used) = codecs.matcher.encode_match(&text)?;
        if used != text.len() {
            return Err(unknown());
        }
        return Ok(Action::SetField(tlv));
    }
    let from = token.start + "set_".len();
    let (tlv, used) = codecs.matcher.encode_match(&source[from..])?;
    if used == 0 {
        return Err(unknown());
    }
    scanner.seek(from + used)?;
    Ok(Action::SetField(tlv))
}

/// Serialize an action list; every action is padded to 8 bytes.
pub fn encode_actions(actions: &[Action]) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = Vec::with_capacity(Action::size_of_sequence(actions));
    for action in actions {
        action.marshal(&mut bytes)?;
    }
    Ok(bytes)
}

/// Parse a buffer holding nothing but actions.
pub fn decode_actions(buf: &[u8], vendor: &dyn VendorCodec) -> Result<Vec<Action>, DecodeError> {
    Action::parse_sequence(buf, 0, vendor)
}

/// Render an action list as comma separated text.
pub fn actions_to_text(actions: &[Action], codecs: &Codecs) -> Result<String, DecodeError> {
    let texts = actions
        .iter()
        .map(|a| a.to_text(codecs))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(texts.join(","))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::openflow0x04::vendor::NX_VENDOR_ID;
    use crate::openflow0x04::OfpPort;
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    /// Resolves one Nicira action, `resubmit=PORT`, subtype 1.
    struct Resubmit;

    impl VendorCodec for Resubmit {
        fn vendor_id(&self) -> Option<u32> {
            Some(NX_VENDOR_ID)
        }

        fn encode_vendor_action(&self, name: &str, arg: Option<&str>) -> Option<Vec<u8>> {
            if name != "resubmit" {
                return None;
            }
            let port: u16 = arg?.parse().ok()?;
            let mut bytes = vec![];
            bytes.put_u16(0xffff);
            bytes.put_u16(16);
            bytes.put_u32(NX_VENDOR_ID);
            bytes.put_u16(1);
            bytes.put_u16(port);
            bytes.put_zeros(4);
            Some(bytes)
        }

        fn decode_vendor_action(&self, _: u32, sub_type: u16, payload: &[u8]) -> Option<String> {
            match sub_type {
                1 => Some(format!("resubmit={}", (payload[0] as u16) << 8 | payload[1] as u16)),
                _ => None,
            }
        }
    }

    fn codecs() -> Codecs<'static> {
        Codecs {
            matcher: &crate::openflow0x04::BasicOxm,
            vendor: &Resubmit,
        }
    }

    #[test]
    fn output_wire_layout() {
        let bytes = encode_actions(&[Action::Output {
            port: 3,
            max_len: 0x80,
        }])
        .unwrap();
        assert_eq!(
            bytes,
            vec![0, 0, 0, 16, 0, 0, 0, 3, 0, 0x80, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn text_to_wire_and_back() {
        let codecs = codecs();
        let text = "output=controller:0x80,push_vlan=0x8100,set_vlan_vid=0x1005,\
                    set_queue=7,group=2,set_nw_ttl=9,dec_mpls_ttl,pop_mpls=0x0800,resubmit=4";
        let actions = Action::parse_list(text, &codecs).unwrap();
        assert_eq!(actions.len(), 9);
        assert_eq!(
            actions[0],
            Action::Output {
                port: OfpPort::Controller as u32,
                max_len: 0x80
            }
        );
        let bytes = encode_actions(&actions).unwrap();
        assert_eq!(bytes.len() % 8, 0);
        let decoded = decode_actions(&bytes, codecs.vendor).unwrap();
        assert_eq!(decoded, actions);
        assert_eq!(actions_to_text(&decoded, &codecs).unwrap(), text.replace(' ', ""));
    }

    #[test]
    fn set_nw_ttl_is_padded() {
        let bytes = encode_actions(&[Action::SetNwTtl(64)]).unwrap();
        assert_eq!(bytes, vec![0, 23, 0, 8, 64, 0, 0, 0]);
    }

    #[test]
    fn function_call_spelling() {
        let codecs = Codecs::basic();
        assert_eq!(
            Action::parse_list("output(2),set_eth_type(0x86dd)", &codecs).unwrap(),
            vec![
                Action::output(2),
                Action::SetField(vec![0x80, 0, 0x0a, 2, 0x86, 0xdd])
            ]
        );
    }

    #[test]
    fn unknown_names_are_rejected() {
        let codecs = Codecs::basic();
        assert_eq!(
            Action::parse_list("output=1,teleport", &codecs),
            Err(EncodeError::UnknownToken {
                token: "teleport".to_string()
            })
        );
        assert_eq!(
            Action::parse_list("set_nonsense=1", &codecs),
            Err(EncodeError::UnknownToken {
                token: "set_nonsense=1".to_string()
            })
        );
        assert!(matches!(
            Action::parse_list("pop_vlan=3", &codecs),
            Err(EncodeError::Syntax { .. })
        ));
        assert!(matches!(
            Action::parse_list("set_mpls_ttl=300", &codecs),
            Err(EncodeError::FieldOverflow { field: "set_mpls_ttl", .. })
        ));
    }

    #[test]
    fn foreign_experimenter_round_trips() {
        let codecs = Codecs::basic();
        let actions = Action::parse_list("experimenter=0xabcd:0011223344556677", &codecs).unwrap();
        let bytes = encode_actions(&actions).unwrap();
        assert_eq!(bytes.len(), 16);
        let decoded = decode_actions(&bytes, codecs.vendor).unwrap();
        assert_eq!(decoded, actions);
        assert_eq!(
            actions_to_text(&decoded, &codecs).unwrap(),
            "experimenter=0xabcd:0011223344556677"
        );
    }

    #[test]
    fn misaligned_lengths_are_malformed() {
        let bytes = [0u8, 18, 0, 6, 0, 0, 0, 0];
        assert_eq!(
            decode_actions(&bytes, &crate::openflow0x04::NoVendor),
            Err(DecodeError::Malformed {
                offset: 0,
                what: "action",
                length: 6,
            })
        );
        let bytes = [0u8, 0, 0, 8, 0, 0, 0, 1];
        assert!(matches!(
            decode_actions(&bytes, &crate::openflow0x04::NoVendor),
            Err(DecodeError::Malformed { length: 8, .. })
        ));
    }

    #[test]
    fn short_buffer_is_truncated() {
        let bytes = [0u8, 0, 0, 16, 0, 0, 0, 1];
        assert_eq!(
            decode_actions(&bytes, &crate::openflow0x04::NoVendor),
            Err(DecodeError::Truncated {
                offset: 4,
                expected: 12,
                found: 4,
            })
        );
    }

    #[test]
    #[traced_test]
    fn unknown_types_pass_through() {
        let bytes = [0u8, 99, 0, 8, 1, 2, 3, 4];
        let actions = decode_actions(&bytes, &crate::openflow0x04::NoVendor).unwrap();
        assert_eq!(
            actions,
            vec![Action::Unknown {
                typ: 99,
                data: vec![1, 2, 3, 4]
            }]
        );
        assert!(logs_contain("passing through unknown action type"));
        assert_eq!(encode_actions(&actions).unwrap(), bytes.to_vec());

        let codecs = Codecs::basic();
        let text = actions_to_text(&actions, &codecs).unwrap();
        assert_eq!(text, "unknown_action=0x63:01020304");
        let reparsed = Action::parse_list(&text, &codecs).unwrap();
        assert_eq!(encode_actions(&reparsed).unwrap(), bytes.to_vec());
    }

    #[test]
    fn unknown_action_text_forms() {
        let codecs = Codecs::basic();
        assert_eq!(
            Action::parse_list("unknown_action=0x63,unknown_action=200:0102", &codecs).unwrap(),
            vec![
                Action::Unknown {
                    typ: 0x63,
                    data: vec![],
                },
                Action::Unknown {
                    typ: 200,
                    data: vec![1, 2],
                },
            ]
        );
        assert!(matches!(
            Action::parse_list("unknown_action=0x63:0g", &codecs),
            Err(EncodeError::InvalidValue { field: "unknown_action", .. })
        ));
        assert!(matches!(
            Action::parse_list("unknown_action=0x10000", &codecs),
            Err(EncodeError::FieldOverflow { .. })
        ));
    }

    #[test]
    fn encoded_lists_are_aligned() {
        bolero::check!()
            .with_type()
            .for_each(|(kind, value, data): &(u8, u32, Vec<u8>)| {
                let action = match kind % 6 {
                    0 => Action::output(*value),
                    1 => Action::SetNwTtl(*value as u8),
                    2 => Action::PushMpls(*value as u16),
                    3 => Action::Experimenter {
                        experimenter: *value,
                        data: data.iter().take(64).cloned().collect(),
                    },
                    4 => Action::Unknown {
                        typ: 200,
                        data: data.iter().take(64).cloned().collect(),
                    },
                    _ => Action::Group(*value),
                };
                let bytes = encode_actions(&[action.clone(), Action::PopPbb]).unwrap();
                assert_eq!(bytes.len() % 8, 0);
                assert_eq!(bytes.len(), Action::size_of_sequence(&[action, Action::PopPbb]));
            });
    }

    #[test]
    fn noise_never_panics() {
        bolero::check!().with_type().for_each(|buf: &Vec<u8>| {
            let _ = decode_actions(buf, &Resubmit);
        });
    }
}
