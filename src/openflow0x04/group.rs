//! Group-mod messages, group descriptions and their buckets.

use std::fmt;

use strum::{EnumIter, EnumString, FromRepr, IntoStaticStr};
use tracing::trace;

use crate::bits::{align8, length16, Reader, WriteBe};
use crate::error::{DecodeError, EncodeError};
use crate::ofp_header::OfpHeader;
use crate::ofp_message::OfpMessage;

use super::action::{actions_to_text, Action};
use super::parser::Scanner;
use super::vendor::VendorCodec;
use super::{
    group_to_string, parse_group, parse_port, parse_uint, port_to_string, Codecs, MsgCode,
    OfpGroup, OfpPort, OFP_VERSION,
};

const BUCKET_HEADER: usize = 16;
/// Group-mod bytes before the buckets, header included.
const GROUP_MOD_FIXED: usize = 16;
/// Group-desc entry bytes before the buckets.
const GROUP_DESC_FIXED: usize = 8;

/// `ofp_group_type`.
#[repr(u8)]
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Hash, EnumIter, EnumString, FromRepr, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum GroupType {
    /// Every bucket is executed.
    #[default]
    All = 0,
    /// One bucket is executed, picked by weight.
    Select = 1,
    /// The single bucket is executed.
    Indirect = 2,
    /// The first live bucket is executed.
    Ff = 3,
}

impl GroupType {
    pub fn of_int(code: u8) -> Option<GroupType> {
        GroupType::from_repr(code)
    }
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(<&'static str>::from(*self))
    }
}

/// `ofp_group_mod_command`.
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, EnumString, FromRepr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum GroupModCmd {
    Add = 0,
    Modify = 1,
    Delete = 2,
}

impl GroupModCmd {
    pub fn of_int(code: u16) -> Option<GroupModCmd> {
        GroupModCmd::from_repr(code)
    }
}

/// One action set of a group.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Bucket {
    /// Only meaningful for select groups.
    pub weight: u16,
    /// Only meaningful for fast-failover groups; `any` when unused.
    pub watch_port: u32,
    /// Only meaningful for fast-failover groups; `any` when unused.
    pub watch_group: u32,
    pub actions: Vec<Action>,
}

impl Default for Bucket {
    fn default() -> Bucket {
        Bucket {
            weight: 0,
            watch_port: OfpPort::Any as u32,
            watch_group: OfpGroup::Any as u32,
            actions: vec![],
        }
    }
}

impl Bucket {
    pub fn new(actions: Vec<Action>) -> Bucket {
        Bucket {
            actions,
            ..Bucket::default()
        }
    }

    pub fn size_of(&self) -> usize {
        BUCKET_HEADER + Action::size_of_sequence(&self.actions)
    }

    pub fn size_of_sequence(buckets: &[Bucket]) -> usize {
        buckets.iter().map(Bucket::size_of).sum()
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), EncodeError> {
        bytes.put_u16(length16("bucket length", align8(self.size_of()))?);
        bytes.put_u16(self.weight);
        bytes.put_u32(self.watch_port);
        bytes.put_u32(self.watch_group);
        bytes.put_zeros(4);
        for action in &self.actions {
            action.marshal(bytes)?;
        }
        Ok(())
    }

    /// Read one bucket, keeping only the fields `group_type` gives meaning to.
    pub(crate) fn parse(
        bytes: &mut Reader,
        group_type: GroupType,
        vendor: &dyn VendorCodec,
    ) -> Result<Bucket, DecodeError> {
        let offset = bytes.offset();
        let length = bytes.u16()? as usize;
        if length < BUCKET_HEADER || length % 8 != 0 {
            return Err(DecodeError::Malformed {
                offset,
                what: "bucket",
                length,
            });
        }
        let body = bytes.take(length - 2)?;
        let mut fields = Reader::new(body, offset + 2);
        let weight = fields.u16()?;
        let watch_port = fields.u32()?;
        let watch_group = fields.u32()?;
        fields.skip(4)?;
        let actions = Action::parse_sequence(&body[BUCKET_HEADER - 2..], offset + BUCKET_HEADER, vendor)?;
        let mut bucket = Bucket::new(actions);
        match group_type {
            GroupType::Select => bucket.weight = weight,
            GroupType::Ff => {
                bucket.watch_port = watch_port;
                bucket.watch_group = watch_group;
            }
            GroupType::All | GroupType::Indirect => (),
        }
        Ok(bucket)
    }

    /// Parse bucket text: optional `weight=`, `watch_port=` and `watch_group=` tokens,
    /// then the actions.
    pub fn parse_text(text: &str, codecs: &Codecs) -> Result<Bucket, EncodeError> {
        let mut scanner = Scanner::new(text);
        let mut bucket = Bucket::default();
        let mut in_actions = false;
        while let Some(token) = scanner.next_token()? {
            let arg = || {
                token.arg.ok_or_else(|| EncodeError::InvalidValue {
                    field: "bucket",
                    value: token.text(text).to_string(),
                })
            };
            match token.name {
                "weight" | "watch_port" | "watch_group" if in_actions => {
                    return Err(EncodeError::Syntax {
                        token: token.text(text).to_string(),
                        reason: "bucket fields must precede its actions",
                    })
                }
                "weight" => bucket.weight = parse_uint("weight", arg()?, u16::MAX as u64)? as u16,
                "watch_port" => bucket.watch_port = parse_port("watch_port", arg()?)?,
                "watch_group" => bucket.watch_group = parse_group("watch_group", arg()?)?,
                _ => {
                    in_actions = true;
                    bucket
                        .actions
                        .push(Action::parse_text(token, &mut scanner, codecs)?);
                }
            }
        }
        Ok(bucket)
    }

    /// Render a bucket of a `group_type` group; fields the type ignores are left out.
    pub fn to_text(&self, group_type: GroupType, codecs: &Codecs) -> Result<String, DecodeError> {
        let mut tokens = vec![];
        if group_type == GroupType::Select {
            tokens.push(format!("weight={}", self.weight));
        }
        if group_type == GroupType::Ff {
            if self.watch_port != OfpPort::Any as u32 {
                tokens.push(format!("watch_port={}", port_to_string(self.watch_port)));
            }
            if self.watch_group != OfpGroup::Any as u32 {
                tokens.push(format!("watch_group={}", group_to_string(self.watch_group)));
            }
        }
        if !self.actions.is_empty() {
            tokens.push(actions_to_text(&self.actions, codecs)?);
        }
        Ok(tokens.join(","))
    }
}

/// Serialize a bucket list; the result is always a multiple of 8 bytes.
pub fn encode_buckets(buckets: &[Bucket]) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = Vec::with_capacity(Bucket::size_of_sequence(buckets));
    for bucket in buckets {
        bucket.marshal(&mut bytes)?;
    }
    Ok(bytes)
}

fn parse_buckets(
    buf: &[u8],
    base: usize,
    group_type: GroupType,
    vendor: &dyn VendorCodec,
) -> Result<Vec<Bucket>, DecodeError> {
    let mut bytes = Reader::new(buf, base);
    let mut buckets = vec![];
    while bytes.remaining() > 0 {
        buckets.push(Bucket::parse(&mut bytes, group_type, vendor)?);
    }
    Ok(buckets)
}

/// Parse a buffer holding nothing but buckets of a `group_type` group.
pub fn decode_buckets(
    buf: &[u8],
    group_type: GroupType,
    vendor: &dyn VendorCodec,
) -> Result<Vec<Bucket>, DecodeError> {
    parse_buckets(buf, 0, group_type, vendor)
}

fn parse_group_type(bytes: &mut Reader) -> Result<GroupType, DecodeError> {
    let offset = bytes.offset();
    let code = bytes.u8()?;
    GroupType::of_int(code).ok_or(DecodeError::InvalidValue {
        offset,
        what: "group type",
        value: code as u64,
    })
}

/// A group table entry, as installed by a group-mod or listed by a group-desc dump.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupDescriptor {
    pub group_id: u32,
    pub group_type: GroupType,
    pub buckets: Vec<Bucket>,
}

impl GroupDescriptor {
    /// Build a group from bucket texts.
    pub fn parse<S: AsRef<str>>(
        group_id: u32,
        group_type: GroupType,
        buckets: &[S],
        codecs: &Codecs,
    ) -> Result<GroupDescriptor, EncodeError> {
        let buckets = buckets
            .iter()
            .map(|b| Bucket::parse_text(b.as_ref(), codecs))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(GroupDescriptor {
            group_id,
            group_type,
            buckets,
        })
    }

    /// Render as a `group_id=N[,type=T]` line followed by one indented line per bucket.
    pub fn to_text(&self, codecs: &Codecs) -> Result<String, DecodeError> {
        let mut lines = vec![if self.group_type == GroupType::All {
            format!("group_id={}", group_to_string(self.group_id))
        } else {
            format!("group_id={},type={}", group_to_string(self.group_id), self.group_type)
        }];
        for bucket in &self.buckets {
            lines.push(format!("  {}", bucket.to_text(self.group_type, codecs)?));
        }
        Ok(lines.join("\n"))
    }

    /// Wire size as a group-desc entry.
    pub fn size_of(&self) -> usize {
        GROUP_DESC_FIXED + Bucket::size_of_sequence(&self.buckets)
    }

    /// Write as a group-desc entry.
    pub fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), EncodeError> {
        bytes.put_u16(length16("group desc length", self.size_of())?);
        bytes.put_u8(self.group_type as u8);
        bytes.put_zeros(1);
        bytes.put_u32(self.group_id);
        for bucket in &self.buckets {
            bucket.marshal(bytes)?;
        }
        Ok(())
    }

    pub(crate) fn parse_wire(
        bytes: &mut Reader,
        vendor: &dyn VendorCodec,
    ) -> Result<GroupDescriptor, DecodeError> {
        let offset = bytes.offset();
        let length = bytes.u16()? as usize;
        if length < GROUP_DESC_FIXED {
            return Err(DecodeError::Malformed {
                offset,
                what: "group desc entry",
                length,
            });
        }
        let entry = bytes.take(length - 2)?;
        let mut bytes = Reader::new(entry, offset + 2);
        let group_type = parse_group_type(&mut bytes)?;
        bytes.skip(1)?;
        let group_id = bytes.u32()?;
        let base = bytes.offset();
        let buckets = parse_buckets(bytes.take(bytes.remaining())?, base, group_type, vendor)?;
        Ok(GroupDescriptor {
            group_id,
            group_type,
            buckets,
        })
    }
}

/// A group-mod message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupMod {
    pub command: GroupModCmd,
    pub xid: u32,
    pub group: GroupDescriptor,
}

impl GroupMod {
    /// Render the command line followed by the group text.
    pub fn to_text(&self, codecs: &Codecs) -> Result<String, DecodeError> {
        Ok(format!(
            "command={}\n{}",
            <&'static str>::from(self.command),
            self.group.to_text(codecs)?
        ))
    }
}

impl OfpMessage for GroupMod {
    fn size_of(&self) -> usize {
        GROUP_MOD_FIXED + Bucket::size_of_sequence(&self.group.buckets)
    }

    fn header_of(&self) -> Result<OfpHeader, EncodeError> {
        Ok(OfpHeader::new(
            OFP_VERSION,
            MsgCode::GroupMod as u8,
            length16("group-mod length", self.size_of())?,
            self.xid,
        ))
    }

    fn marshal(&self) -> Result<Vec<u8>, EncodeError> {
        let header = self.header_of()?;
        let mut bytes = Vec::with_capacity(header.length());
        OfpHeader::marshal(&mut bytes, header);
        bytes.put_u16(self.command as u16);
        bytes.put_u8(self.group.group_type as u8);
        bytes.put_zeros(1);
        bytes.put_u32(self.group.group_id);
        for bucket in &self.group.buckets {
            bucket.marshal(&mut bytes)?;
        }
        trace!(xid = self.xid, len = bytes.len(), "encoded group-mod");
        Ok(bytes)
    }

    fn parse(header: &OfpHeader, body: &[u8], vendor: &dyn VendorCodec) -> Result<GroupMod, DecodeError> {
        let mut bytes = Reader::new(body, OfpHeader::size());
        let command_offset = bytes.offset();
        let command = bytes.u16()?;
        let command = GroupModCmd::of_int(command).ok_or(DecodeError::InvalidValue {
            offset: command_offset,
            what: "group-mod command",
            value: command as u64,
        })?;
        let group_type = parse_group_type(&mut bytes)?;
        bytes.skip(1)?;
        let group_id = bytes.u32()?;
        let base = bytes.offset();
        let buckets = parse_buckets(bytes.take(bytes.remaining())?, base, group_type, vendor)?;
        trace!(xid = header.xid(), len = header.length(), "decoded group-mod");
        Ok(GroupMod {
            command,
            xid: header.xid(),
            group: GroupDescriptor {
                group_id,
                group_type,
                buckets,
            },
        })
    }
}

/// Serialize `group` as a group-mod performing `command`.
pub fn encode_group_mod(
    group: &GroupDescriptor,
    command: GroupModCmd,
    xid: u32,
) -> Result<Vec<u8>, EncodeError> {
    GroupMod {
        command,
        xid,
        group: group.clone(),
    }
    .marshal()
}

/// Parse a complete group-mod message.
pub fn decode_group_mod(buf: &[u8], vendor: &dyn VendorCodec) -> Result<GroupMod, DecodeError> {
    let header = OfpHeader::parse_expecting(buf, MsgCode::GroupMod)?;
    GroupMod::parse(&header, &buf[OfpHeader::size()..header.length()], vendor)
}
