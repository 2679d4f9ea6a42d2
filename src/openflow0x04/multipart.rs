//! Multipart flow and group-desc dumps.
//!
//! Requests are always a single message. Replies are packed entry by entry into
//! as many messages as the 16-bit length field requires; every message but the
//! last carries `OFPMPF_MORE`. Decoding works on one message at a time, chaining
//! messages while `more` is set is left to the caller.

use tracing::{debug, trace};

use crate::bits::{length16, Reader};
use crate::error::{DecodeError, EncodeError};
use crate::ofp_header::{MultipartHeader, OfpHeader, OFPMPF_MORE};

use super::flow::{FlowStatsEntry, FlowStatsRequest};
use super::group::GroupDescriptor;
use super::vendor::VendorCodec;
use super::{Codecs, MsgCode, MultipartType, OFP_VERSION};

/// Largest multipart body that still fits the 16-bit message length.
pub const MAX_MULTIPART_BODY: usize = 0xffff - MultipartHeader::size();

/// One multipart message: the transaction, the continuation flag and a typed body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultipartEnvelope<B> {
    pub xid: u32,
    pub more: bool,
    pub body: B,
}

/// Body of an `OFPMP_FLOW` message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowStats {
    Request(FlowStatsRequest),
    Reply(Vec<FlowStatsEntry>),
}

impl FlowStats {
    /// A request renders as its filter, a reply as one line per entry.
    pub fn to_text(&self, codecs: &Codecs) -> Result<String, DecodeError> {
        match *self {
            FlowStats::Request(ref req) => req.to_text(codecs),
            FlowStats::Reply(ref entries) => {
                let lines = entries
                    .iter()
                    .map(|e| e.to_text(codecs))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(lines.join("\n"))
            }
        }
    }
}

/// Body of an `OFPMP_GROUP_DESC` message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GroupDesc {
    Request,
    Reply(Vec<GroupDescriptor>),
}

impl GroupDesc {
    pub fn to_text(&self, codecs: &Codecs) -> Result<String, DecodeError> {
        match *self {
            GroupDesc::Request => Ok(String::new()),
            GroupDesc::Reply(ref groups) => {
                let lines = groups
                    .iter()
                    .map(|g| g.to_text(codecs))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(lines.join("\n"))
            }
        }
    }
}

/// Packs serialized entries into multipart messages.
struct Fragmenter {
    code: MsgCode,
    mp_type: MultipartType,
    xid: u32,
    capture: Vec<u8>,
    messages: Vec<Vec<u8>>,
}

impl Fragmenter {
    fn new(code: MsgCode, mp_type: MultipartType, xid: u32) -> Fragmenter {
        Fragmenter {
            code,
            mp_type,
            xid,
            capture: vec![],
            messages: vec![],
        }
    }

    /// Append one entry, closing the current message first if the entry does not fit.
    fn push(&mut self, entry: &[u8]) -> Result<(), EncodeError> {
        if entry.len() > MAX_MULTIPART_BODY {
            return Err(EncodeError::EntryTooLarge {
                length: entry.len(),
            });
        }
        if self.capture.len() + entry.len() > MAX_MULTIPART_BODY {
            self.emit(true)?;
        }
        self.capture.extend_from_slice(entry);
        Ok(())
    }

    fn emit(&mut self, more: bool) -> Result<(), EncodeError> {
        let length = length16("multipart length", MultipartHeader::size() + self.capture.len())?;
        let mut bytes = Vec::with_capacity(length as usize);
        MultipartHeader::marshal(
            &mut bytes,
            MultipartHeader {
                header: OfpHeader::new(OFP_VERSION, self.code as u8, length, self.xid),
                mp_type: self.mp_type as u16,
                flags: if more { OFPMPF_MORE } else { 0 },
            },
        );
        bytes.append(&mut self.capture);
        if more {
            debug!(
                xid = self.xid,
                index = self.messages.len(),
                length,
                "multipart message full, continuing in next"
            );
        }
        self.messages.push(bytes);
        Ok(())
    }

    /// Close the last message, which never carries `OFPMPF_MORE`.
    fn finish(mut self) -> Result<Vec<Vec<u8>>, EncodeError> {
        self.emit(false)?;
        trace!(xid = self.xid, messages = self.messages.len(), "encoded multipart");
        Ok(self.messages)
    }
}

fn single(code: MsgCode, mp_type: MultipartType, xid: u32, body: &[u8]) -> Result<Vec<Vec<u8>>, EncodeError> {
    let mut fragmenter = Fragmenter::new(code, mp_type, xid);
    fragmenter.push(body)?;
    fragmenter.finish()
}

/// Serialize a flow dump request or reply into one or more messages.
pub fn encode_flows_multipart(body: &FlowStats, xid: u32) -> Result<Vec<Vec<u8>>, EncodeError> {
    match *body {
        FlowStats::Request(ref req) => {
            let mut bytes = Vec::with_capacity(req.size_of());
            req.marshal(&mut bytes)?;
            single(MsgCode::MultipartReq, MultipartType::Flow, xid, &bytes)
        }
        FlowStats::Reply(ref entries) => {
            let mut fragmenter = Fragmenter::new(MsgCode::MultipartResp, MultipartType::Flow, xid);
            let mut bytes = vec![];
            for entry in entries {
                bytes.clear();
                entry.marshal(&mut bytes)?;
                fragmenter.push(&bytes)?;
            }
            fragmenter.finish()
        }
    }
}

/// Serialize a group-desc dump request or reply into one or more messages.
pub fn encode_groups_desc_multipart(body: &GroupDesc, xid: u32) -> Result<Vec<Vec<u8>>, EncodeError> {
    match *body {
        GroupDesc::Request => single(MsgCode::MultipartReq, MultipartType::GroupDesc, xid, &[]),
        GroupDesc::Reply(ref groups) => {
            let mut fragmenter =
                Fragmenter::new(MsgCode::MultipartResp, MultipartType::GroupDesc, xid);
            let mut bytes = vec![];
            for group in groups {
                bytes.clear();
                group.marshal(&mut bytes)?;
                fragmenter.push(&bytes)?;
            }
            fragmenter.finish()
        }
    }
}

/// Split a multipart message into its header and a reader over the body.
fn open(buf: &[u8], mp_type: MultipartType) -> Result<(MultipartHeader, Reader), DecodeError> {
    let mp = MultipartHeader::parse(buf, mp_type)?;
    let body = &buf[MultipartHeader::size()..mp.header.length()];
    Ok((mp, Reader::new(body, MultipartHeader::size())))
}

fn is_request(mp: &MultipartHeader) -> bool {
    mp.header.type_code() == Some(MsgCode::MultipartReq)
}

/// Parse one flow dump message. Replies spread over several messages need one
/// call per message.
pub fn decode_flows_multipart_message(
    buf: &[u8],
    vendor: &dyn VendorCodec,
) -> Result<MultipartEnvelope<FlowStats>, DecodeError> {
    let (mp, mut bytes) = open(buf, MultipartType::Flow)?;
    let body = if is_request(&mp) {
        let req = FlowStatsRequest::parse_wire(&mut bytes)?;
        if bytes.remaining() != 0 {
            return Err(DecodeError::Malformed {
                offset: MultipartHeader::size(),
                what: "flow stats request",
                length: mp.header.length() - MultipartHeader::size(),
            });
        }
        FlowStats::Request(req)
    } else {
        let mut entries = vec![];
        while bytes.remaining() > 0 {
            entries.push(FlowStatsEntry::parse_wire(&mut bytes, vendor)?);
        }
        FlowStats::Reply(entries)
    };
    trace!(xid = mp.header.xid(), more = mp.more(), "decoded flow multipart");
    Ok(MultipartEnvelope {
        xid: mp.header.xid(),
        more: mp.more(),
        body,
    })
}

/// Parse one group-desc dump message.
pub fn decode_groups_desc_multipart_message(
    buf: &[u8],
    vendor: &dyn VendorCodec,
) -> Result<MultipartEnvelope<GroupDesc>, DecodeError> {
    let (mp, mut bytes) = open(buf, MultipartType::GroupDesc)?;
    let body = if is_request(&mp) {
        if bytes.remaining() != 0 {
            return Err(DecodeError::Malformed {
                offset: MultipartHeader::size(),
                what: "group desc request",
                length: bytes.remaining(),
            });
        }
        GroupDesc::Request
    } else {
        let mut groups = vec![];
        while bytes.remaining() > 0 {
            groups.push(GroupDescriptor::parse_wire(&mut bytes, vendor)?);
        }
        GroupDesc::Reply(groups)
    };
    trace!(xid = mp.header.xid(), more = mp.more(), "decoded group-desc multipart");
    Ok(MultipartEnvelope {
        xid: mp.header.xid(),
        more: mp.more(),
        body,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::openflow0x04::{Action, Bucket, FlowModCmd, FlowRule, GroupType, NoVendor};
    use pretty_assertions::assert_eq;

    fn entry(priority: u16) -> FlowStatsEntry {
        FlowStatsEntry::new(FlowRule {
            priority,
            ..FlowRule::defaults(FlowModCmd::AddFlow)
        })
    }

    #[test]
    fn empty_reply_is_one_message() {
        let msgs = encode_flows_multipart(&FlowStats::Reply(vec![]), 5).unwrap();
        assert_eq!(msgs, vec![vec![4, 19, 0, 16, 0, 0, 0, 5, 0, 1, 0, 0, 0, 0, 0, 0]]);
        let env = decode_flows_multipart_message(&msgs[0], &NoVendor).unwrap();
        assert_eq!(
            env,
            MultipartEnvelope {
                xid: 5,
                more: false,
                body: FlowStats::Reply(vec![]),
            }
        );
    }

    #[test]
    fn fragmenter_splits_before_overflow() {
        let mut fragmenter = Fragmenter::new(MsgCode::MultipartResp, MultipartType::Flow, 1);
        let half = vec![0u8; MAX_MULTIPART_BODY / 2];
        fragmenter.push(&half).unwrap();
        fragmenter.push(&half).unwrap();
        fragmenter.push(&[0u8; 8]).unwrap();
        let msgs = fragmenter.finish().unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].len(), 16 + 2 * half.len());
        assert_eq!(&msgs[0][10..12], &[0, 1]);
        assert_eq!(msgs[1].len(), 24);
        assert_eq!(&msgs[1][10..12], &[0, 0]);
    }

    #[test]
    fn exact_fit_fills_the_length_field() {
        let mut fragmenter = Fragmenter::new(MsgCode::MultipartResp, MultipartType::Flow, 1);
        fragmenter.push(&vec![0u8; MAX_MULTIPART_BODY]).unwrap();
        let msgs = fragmenter.finish().unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(&msgs[0][2..4], &[0xff, 0xff]);
    }

    #[test]
    fn oversized_entry_is_rejected() {
        let mut fragmenter = Fragmenter::new(MsgCode::MultipartResp, MultipartType::Flow, 1);
        assert_eq!(
            fragmenter.push(&vec![0u8; MAX_MULTIPART_BODY + 1]),
            Err(EncodeError::EntryTooLarge {
                length: MAX_MULTIPART_BODY + 1
            })
        );
    }

    #[test]
    fn flow_reply_round_trip() {
        let entries = vec![entry(1), entry(2), entry(3)];
        let msgs = encode_flows_multipart(&FlowStats::Reply(entries.clone()), 9).unwrap();
        assert_eq!(msgs.len(), 1);
        let env = decode_flows_multipart_message(&msgs[0], &NoVendor).unwrap();
        assert!(!env.more);
        assert_eq!(env.body, FlowStats::Reply(entries));
    }

    #[test]
    fn flow_request_is_single() {
        let req = FlowStatsRequest {
            table: 1,
            ..FlowStatsRequest::default()
        };
        let msgs = encode_flows_multipart(&FlowStats::Request(req.clone()), 2).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0][1], 18);
        assert_eq!(msgs[0].len(), 16 + 32 + 8);
        let env = decode_flows_multipart_message(&msgs[0], &NoVendor).unwrap();
        assert_eq!(env.body, FlowStats::Request(req));
    }

    #[test]
    fn group_desc_request_and_reply() {
        let msgs = encode_groups_desc_multipart(&GroupDesc::Request, 4).unwrap();
        assert_eq!(msgs, vec![vec![4, 18, 0, 16, 0, 0, 0, 4, 0, 7, 0, 0, 0, 0, 0, 0]]);
        assert_eq!(
            decode_groups_desc_multipart_message(&msgs[0], &NoVendor)
                .unwrap()
                .body,
            GroupDesc::Request
        );

        let groups = vec![GroupDescriptor {
            group_id: 2,
            group_type: GroupType::Indirect,
            buckets: vec![Bucket::new(vec![Action::output(1)])],
        }];
        let msgs = encode_groups_desc_multipart(&GroupDesc::Reply(groups.clone()), 4).unwrap();
        let env = decode_groups_desc_multipart_message(&msgs[0], &NoVendor).unwrap();
        assert_eq!(env.body, GroupDesc::Reply(groups));
    }

    #[test]
    fn wrong_multipart_type() {
        let msgs = encode_groups_desc_multipart(&GroupDesc::Request, 4).unwrap();
        assert!(matches!(
            decode_flows_multipart_message(&msgs[0], &NoVendor),
            Err(DecodeError::UnexpectedType {
                what: "multipart type",
                ..
            })
        ));
    }

    #[test]
    fn noise_never_panics() {
        bolero::check!().for_each(|bytes: &[u8]| {
            let _ = decode_flows_multipart_message(bytes, &NoVendor);
            let _ = decode_groups_desc_multipart_message(bytes, &NoVendor);
        });
    }
}
