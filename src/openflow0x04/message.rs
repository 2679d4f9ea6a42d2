//! Decoding of any message this crate understands.

use crate::error::DecodeError;
use crate::ofp_header::OfpHeader;

use super::flow::{decode_flow_mod, FlowMod};
use super::group::{decode_group_mod, GroupMod};
use super::multipart::{
    decode_flows_multipart_message, decode_groups_desc_multipart_message, FlowStats, GroupDesc,
    MultipartEnvelope,
};
use super::{Codecs, MsgCode, MultipartType};

/// Abstractions of the OpenFlow 1.3 messages handled here, mapping to message codes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    FlowMod(FlowMod),
    GroupMod(GroupMod),
    FlowStats(MultipartEnvelope<FlowStats>),
    GroupDesc(MultipartEnvelope<GroupDesc>),
}

impl Message {
    /// Parse whichever supported message `buf` starts with.
    pub fn parse(buf: &[u8], codecs: &Codecs) -> Result<Message, DecodeError> {
        let header = OfpHeader::parse(buf)?;
        match header.type_code() {
            Some(MsgCode::FlowMod) => Ok(Message::FlowMod(decode_flow_mod(buf, codecs.vendor)?)),
            Some(MsgCode::GroupMod) => Ok(Message::GroupMod(decode_group_mod(buf, codecs.vendor)?)),
            Some(MsgCode::MultipartReq) | Some(MsgCode::MultipartResp) => {
                let mp_type = match buf.get(8..10) {
                    Some(&[hi, lo]) => u16::from_be_bytes([hi, lo]),
                    _ => {
                        return Err(DecodeError::Truncated {
                            offset: 8,
                            expected: 2,
                            found: buf.len().saturating_sub(8),
                        })
                    }
                };
                if mp_type == MultipartType::Flow as u16 {
                    Ok(Message::FlowStats(decode_flows_multipart_message(buf, codecs.vendor)?))
                } else if mp_type == MultipartType::GroupDesc as u16 {
                    Ok(Message::GroupDesc(decode_groups_desc_multipart_message(
                        buf,
                        codecs.vendor,
                    )?))
                } else {
                    Err(DecodeError::UnexpectedType {
                        offset: 8,
                        what: "multipart type",
                        expected: MultipartType::Flow as u16,
                        found: mp_type,
                    })
                }
            }
            None => Err(DecodeError::UnexpectedType {
                offset: 1,
                what: "message type",
                expected: MsgCode::FlowMod as u16,
                found: buf[1] as u16,
            }),
        }
    }

    /// The transaction id of the message.
    pub fn xid(&self) -> u32 {
        match *self {
            Message::FlowMod(ref m) => m.xid,
            Message::GroupMod(ref m) => m.xid,
            Message::FlowStats(ref m) => m.xid,
            Message::GroupDesc(ref m) => m.xid,
        }
    }

    /// Whether more multipart messages of the same transaction follow.
    pub fn more(&self) -> bool {
        match *self {
            Message::FlowMod(_) | Message::GroupMod(_) => false,
            Message::FlowStats(ref m) => m.more,
            Message::GroupDesc(ref m) => m.more,
        }
    }

    pub fn to_text(&self, codecs: &Codecs) -> Result<String, DecodeError> {
        match *self {
            Message::FlowMod(ref m) => m.to_text(codecs),
            Message::GroupMod(ref m) => m.to_text(codecs),
            Message::FlowStats(ref m) => m.body.to_text(codecs),
            Message::GroupDesc(ref m) => m.body.to_text(codecs),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::openflow0x04::flow::encode_flow_mod;
    use crate::openflow0x04::flow::FlowStatsEntry;
    use crate::openflow0x04::multipart::{encode_flows_multipart, encode_groups_desc_multipart};
    use crate::openflow0x04::{FlowModCmd, FlowRule};

    #[test]
    fn dispatches_on_type() {
        let codecs = Codecs::basic();
        let rule = FlowRule::parse("priority=5,@clear", FlowModCmd::AddFlow, &codecs).unwrap();
        let bytes = encode_flow_mod(&rule, FlowModCmd::AddFlow, 3).unwrap();
        let msg = Message::parse(&bytes, &codecs).unwrap();
        assert_eq!(msg.xid(), 3);
        assert!(!msg.more());
        assert_eq!(msg.to_text(&codecs).unwrap(), "priority=5,@clear");

        let bytes = encode_flow_mod(&rule, FlowModCmd::ModFlow, 4).unwrap();
        let msg = Message::parse(&bytes, &codecs).unwrap();
        assert_eq!(msg.to_text(&codecs).unwrap(), "command=modify,priority=5,@clear");

        let entries = (0..2000)
            .map(|i| FlowStatsEntry::new(FlowRule { priority: i, ..rule.clone() }))
            .collect();
        let msgs = encode_flows_multipart(&FlowStats::Reply(entries), 5).unwrap();
        assert!(msgs.len() > 1);
        assert!(Message::parse(&msgs[0], &codecs).unwrap().more());
        assert!(!Message::parse(&msgs[msgs.len() - 1], &codecs).unwrap().more());

        let msgs = encode_groups_desc_multipart(&GroupDesc::Request, 8).unwrap();
        assert!(matches!(
            Message::parse(&msgs[0], &codecs),
            Ok(Message::GroupDesc(MultipartEnvelope {
                xid: 8,
                more: false,
                body: GroupDesc::Request,
            }))
        ));
    }

    #[test]
    fn rejects_other_messages() {
        // a hello
        let bytes = [4u8, 0, 0, 8, 0, 0, 0, 1];
        assert!(matches!(
            Message::parse(&bytes, &Codecs::basic()),
            Err(DecodeError::UnexpectedType { offset: 1, found: 0, .. })
        ));
    }
}
