//! Flow-mod messages and flow-stats entries.

use std::str::FromStr;

use tracing::trace;

use crate::bits::{align8, length16, pad8, Reader, WriteBe};
use crate::error::{DecodeError, EncodeError};
use crate::ofp_header::OfpHeader;
use crate::ofp_message::OfpMessage;

use super::instruction::{instructions_to_text, Instruction};
use super::parser::{leading_fields, FlowParser};
use super::vendor::VendorCodec;
use super::{
    group_to_string, parse_uint, port_to_string, Codecs, FlowModCmd, FlowModFlags, MsgCode,
    OfpGroup, OfpPort, OFPTT_ALL, OFP_NO_BUFFER, OFP_VERSION,
};

/// `OFPMT_OXM`, the only match type OpenFlow 1.3 defines for use.
pub const OFPMT_OXM: u16 = 1;

/// Flow-mod bytes before the match, header included.
const FLOW_MOD_FIXED: usize = 48;
/// Flow-stats entry bytes before the match.
const FLOW_STATS_FIXED: usize = 48;
/// Counter fields that may lead the text of a dump entry.
const COUNTERS: [&str; 4] = ["duration_sec", "duration_nsec", "packet_count", "byte_count"];

/// Flow-stats request bytes before the match.
const FLOW_STATS_REQUEST_FIXED: usize = 32;

/// A flow table entry as carried by flow-mods and flow dumps.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FlowRule {
    pub cookie: u64,
    pub cookie_mask: u64,
    pub table: u8,
    pub priority: u16,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub flags: FlowModFlags,
    pub buffer_id: u32,
    pub out_port: u32,
    pub out_group: u32,
    /// OXM TLVs, without the `ofp_match` header or padding.
    pub matches: Vec<u8>,
    pub instructions: Vec<Instruction>,
}

impl FlowRule {
    /// The field values a flow-mod with `command` carries unless told otherwise.
    ///
    /// Deletes wildcard the table and output filters; every other command, and
    /// flow dumps, target table 0 with no filters.
    pub fn defaults(command: FlowModCmd) -> FlowRule {
        let rule = FlowRule {
            cookie: 0,
            cookie_mask: 0,
            table: 0,
            priority: 0x8000,
            idle_timeout: 0,
            hard_timeout: 0,
            flags: FlowModFlags::empty(),
            buffer_id: OFP_NO_BUFFER,
            out_port: 0,
            out_group: 0,
            matches: vec![],
            instructions: vec![],
        };
        if command.is_delete() {
            FlowRule {
                table: OFPTT_ALL,
                buffer_id: 0,
                out_port: OfpPort::Any as u32,
                out_group: OfpGroup::Any as u32,
                ..rule
            }
        } else {
            rule
        }
    }

    /// Parse flow text, filling unset fields from the defaults of `command`.
    pub fn parse(text: &str, command: FlowModCmd, codecs: &Codecs) -> Result<FlowRule, EncodeError> {
        FlowParser::new(FlowRule::defaults(command), codecs).parse(text)
    }

    /// Render flow text, omitting fields equal to the defaults of `command`.
    pub fn to_text(&self, command: FlowModCmd, codecs: &Codecs) -> Result<String, DecodeError> {
        let defaults = FlowRule::defaults(command);
        let mut tokens = self.fixed_text(&defaults);
        if !self.matches.is_empty() {
            tokens.push(codecs.matcher.decode_match(&self.matches)?);
        }
        if !self.instructions.is_empty() {
            tokens.push(instructions_to_text(&self.instructions, codecs)?);
        }
        Ok(tokens.join(","))
    }

    fn fixed_text(&self, defaults: &FlowRule) -> Vec<String> {
        let mut ret = vec![];
        if self.cookie_mask != defaults.cookie_mask {
            ret.push(format!("cookie={:#x}/{:#x}", self.cookie, self.cookie_mask));
        } else if self.cookie != defaults.cookie {
            ret.push(format!("cookie={:#x}", self.cookie));
        }
        if self.table != defaults.table {
            ret.push(format!("table={}", self.table));
        }
        if self.priority != defaults.priority {
            ret.push(format!("priority={}", self.priority));
        }
        if self.buffer_id != defaults.buffer_id {
            ret.push(format!("buffer={:#x}", self.buffer_id));
        }
        if self.out_port != defaults.out_port {
            ret.push(format!("out_port={}", port_to_string(self.out_port)));
        }
        if self.out_group != defaults.out_group {
            ret.push(format!("out_group={}", group_to_string(self.out_group)));
        }
        if self.idle_timeout != defaults.idle_timeout {
            ret.push(format!("idle_timeout={}", self.idle_timeout));
        }
        if self.hard_timeout != defaults.hard_timeout {
            ret.push(format!("hard_timeout={}", self.hard_timeout));
        }
        if self.flags != defaults.flags {
            for (name, flag) in FlowModFlags::NAMES {
                if self.flags.contains(flag) {
                    ret.push(name.to_string());
                }
            }
            let unnamed = self.flags.bits() & !FlowModFlags::all().bits();
            if unnamed != 0 {
                ret.push(format!("flags={:#x}", unnamed));
            }
        }
        ret
    }
}

/// Write an `ofp_match` holding `matches`, padded to 8 bytes.
pub(crate) fn marshal_match(matches: &[u8], bytes: &mut Vec<u8>) -> Result<(), EncodeError> {
    let start = bytes.len();
    bytes.put_u16(OFPMT_OXM);
    bytes.put_u16(length16("match length", 4 + matches.len())?);
    bytes.extend_from_slice(matches);
    pad8(bytes, start);
    Ok(())
}

/// Read an `ofp_match` and its padding, returning the OXM TLVs.
pub(crate) fn parse_match(bytes: &mut Reader) -> Result<Vec<u8>, DecodeError> {
    let offset = bytes.offset();
    let match_type = bytes.u16()?;
    if match_type != OFPMT_OXM {
        return Err(DecodeError::UnsupportedMatchType {
            offset,
            found: match_type,
        });
    }
    let length = bytes.u16()? as usize;
    if length < 4 {
        return Err(DecodeError::Malformed {
            offset,
            what: "match",
            length,
        });
    }
    let tlv = bytes.take(length - 4)?.to_vec();
    bytes.skip(align8(length) - length)?;
    Ok(tlv)
}

fn match_size(matches: &[u8]) -> usize {
    align8(4 + matches.len())
}

/// A flow-mod message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowMod {
    pub command: FlowModCmd,
    pub xid: u32,
    pub rule: FlowRule,
}

impl FlowMod {
    /// Parse flow text that may start with `command=NAME`, which overrides `command`.
    pub fn parse_text(
        text: &str,
        command: FlowModCmd,
        xid: u32,
        codecs: &Codecs,
    ) -> Result<FlowMod, EncodeError> {
        let (fields, rest) = leading_fields(text, &["command"])?;
        let mut command = command;
        for (_, name) in fields {
            command = FlowModCmd::from_str(name).map_err(|_| EncodeError::InvalidValue {
                field: "command",
                value: name.to_string(),
            })?;
        }
        Ok(FlowMod {
            command,
            xid,
            rule: FlowRule::parse(rest, command, codecs)?,
        })
    }

    /// Render the flow text of the rule, terse against the command's defaults and
    /// led by `command=NAME` for anything but an add.
    pub fn to_text(&self, codecs: &Codecs) -> Result<String, DecodeError> {
        let rule = self.rule.to_text(self.command, codecs)?;
        if self.command == FlowModCmd::AddFlow {
            return Ok(rule);
        }
        let command = format!("command={}", <&'static str>::from(self.command));
        if rule.is_empty() {
            Ok(command)
        } else {
            Ok(format!("{},{}", command, rule))
        }
    }
}

impl OfpMessage for FlowMod {
    fn size_of(&self) -> usize {
        FLOW_MOD_FIXED
            + match_size(&self.rule.matches)
            + Instruction::size_of_sequence(&self.rule.instructions)
    }

    fn header_of(&self) -> Result<OfpHeader, EncodeError> {
        Ok(OfpHeader::new(
            OFP_VERSION,
            MsgCode::FlowMod as u8,
            length16("flow-mod length", self.size_of())?,
            self.xid,
        ))
    }

    fn marshal(&self) -> Result<Vec<u8>, EncodeError> {
        let header = self.header_of()?;
        let rule = &self.rule;
        let mut bytes = Vec::with_capacity(header.length());
        OfpHeader::marshal(&mut bytes, header);
        bytes.put_u64(rule.cookie);
        bytes.put_u64(rule.cookie_mask);
        bytes.put_u8(rule.table);
        bytes.put_u8(self.command as u8);
        bytes.put_u16(rule.idle_timeout);
        bytes.put_u16(rule.hard_timeout);
        bytes.put_u16(rule.priority);
        bytes.put_u32(rule.buffer_id);
        bytes.put_u32(rule.out_port);
        bytes.put_u32(rule.out_group);
        bytes.put_u16(rule.flags.bits());
        bytes.put_zeros(2);
        marshal_match(&rule.matches, &mut bytes)?;
        for inst in &rule.instructions {
            inst.marshal(&mut bytes)?;
        }
        trace!(xid = self.xid, len = bytes.len(), "encoded flow-mod");
        Ok(bytes)
    }

    fn parse(header: &OfpHeader, body: &[u8], vendor: &dyn VendorCodec) -> Result<FlowMod, DecodeError> {
        let mut bytes = Reader::new(body, OfpHeader::size());
        let cookie = bytes.u64()?;
        let cookie_mask = bytes.u64()?;
        let table = bytes.u8()?;
        let command_offset = bytes.offset();
        let command = bytes.u8()?;
        let command = FlowModCmd::of_int(command).ok_or(DecodeError::InvalidValue {
            offset: command_offset,
            what: "flow-mod command",
            value: command as u64,
        })?;
        let idle_timeout = bytes.u16()?;
        let hard_timeout = bytes.u16()?;
        let priority = bytes.u16()?;
        let buffer_id = bytes.u32()?;
        let out_port = bytes.u32()?;
        let out_group = bytes.u32()?;
        let flags = FlowModFlags::from_bits_retain(bytes.u16()?);
        bytes.skip(2)?;
        let matches = parse_match(&mut bytes)?;
        let base = bytes.offset();
        let rest = bytes.take(bytes.remaining())?;
        let instructions = Instruction::parse_sequence(rest, base, vendor)?;
        trace!(xid = header.xid(), len = header.length(), "decoded flow-mod");
        Ok(FlowMod {
            command,
            xid: header.xid(),
            rule: FlowRule {
                cookie,
                cookie_mask,
                table,
                priority,
                idle_timeout,
                hard_timeout,
                flags,
                buffer_id,
                out_port,
                out_group,
                matches,
                instructions,
            },
        })
    }
}

/// Serialize `rule` as a flow-mod performing `command`.
pub fn encode_flow_mod(rule: &FlowRule, command: FlowModCmd, xid: u32) -> Result<Vec<u8>, EncodeError> {
    FlowMod {
        command,
        xid,
        rule: rule.clone(),
    }
    .marshal()
}

/// Parse a complete flow-mod message.
pub fn decode_flow_mod(buf: &[u8], vendor: &dyn VendorCodec) -> Result<FlowMod, DecodeError> {
    let header = OfpHeader::parse_expecting(buf, MsgCode::FlowMod)?;
    FlowMod::parse(&header, &buf[OfpHeader::size()..header.length()], vendor)
}

/// One entry of a flow dump reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowStatsEntry {
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub packet_count: u64,
    pub byte_count: u64,
    /// Buffer id, out port/group and cookie mask are not part of a dump entry and
    /// always hold the add defaults.
    pub rule: FlowRule,
}

impl FlowStatsEntry {
    /// A zero-counter entry for `rule`.
    pub fn new(rule: FlowRule) -> FlowStatsEntry {
        FlowStatsEntry {
            duration_sec: 0,
            duration_nsec: 0,
            packet_count: 0,
            byte_count: 0,
            rule,
        }
    }

    /// Parse the flow text of a dump entry. Leading counter fields set the
    /// counters; the rest start at zero.
    pub fn parse(text: &str, codecs: &Codecs) -> Result<FlowStatsEntry, EncodeError> {
        let (counters, rest) = leading_fields(text, &COUNTERS)?;
        let mut entry = FlowStatsEntry::new(FlowRule::parse(rest, FlowModCmd::AddFlow, codecs)?);
        for (name, value) in counters {
            match name {
                "duration_sec" => {
                    entry.duration_sec = parse_uint("duration_sec", value, u32::MAX as u64)? as u32
                }
                "duration_nsec" => {
                    entry.duration_nsec = parse_uint("duration_nsec", value, u32::MAX as u64)? as u32
                }
                "packet_count" => entry.packet_count = parse_uint("packet_count", value, u64::MAX)?,
                _ => entry.byte_count = parse_uint("byte_count", value, u64::MAX)?,
            }
        }
        Ok(entry)
    }

    /// Render a dump entry: its nonzero counters, then the flow text.
    pub fn to_text(&self, codecs: &Codecs) -> Result<String, DecodeError> {
        let values = [
            self.duration_sec as u64,
            self.duration_nsec as u64,
            self.packet_count,
            self.byte_count,
        ];
        let mut tokens: Vec<String> = COUNTERS
            .iter()
            .zip(values)
            .filter(|(_, value)| *value != 0)
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        let rule = self.rule.to_text(FlowModCmd::AddFlow, codecs)?;
        if !rule.is_empty() {
            tokens.push(rule);
        }
        Ok(tokens.join(","))
    }

    pub fn size_of(&self) -> usize {
        FLOW_STATS_FIXED
            + match_size(&self.rule.matches)
            + Instruction::size_of_sequence(&self.rule.instructions)
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), EncodeError> {
        let rule = &self.rule;
        bytes.put_u16(length16("flow stats length", self.size_of())?);
        bytes.put_u8(rule.table);
        bytes.put_zeros(1);
        bytes.put_u32(self.duration_sec);
        bytes.put_u32(self.duration_nsec);
        bytes.put_u16(rule.priority);
        bytes.put_u16(rule.idle_timeout);
        bytes.put_u16(rule.hard_timeout);
        bytes.put_u16(rule.flags.bits());
        bytes.put_zeros(4);
        bytes.put_u64(rule.cookie);
        bytes.put_u64(self.packet_count);
        bytes.put_u64(self.byte_count);
        marshal_match(&rule.matches, bytes)?;
        for inst in &rule.instructions {
            inst.marshal(bytes)?;
        }
        Ok(())
    }

    pub(crate) fn parse_wire(
        bytes: &mut Reader,
        vendor: &dyn VendorCodec,
    ) -> Result<FlowStatsEntry, DecodeError> {
        let offset = bytes.offset();
        let length = bytes.u16()? as usize;
        if length < FLOW_STATS_FIXED + 8 || length % 8 != 0 {
            return Err(DecodeError::Malformed {
                offset,
                what: "flow stats entry",
                length,
            });
        }
        let entry = bytes.take(length - 2)?;
        let mut bytes = Reader::new(entry, offset + 2);
        let table = bytes.u8()?;
        bytes.skip(1)?;
        let duration_sec = bytes.u32()?;
        let duration_nsec = bytes.u32()?;
        let priority = bytes.u16()?;
        let idle_timeout = bytes.u16()?;
        let hard_timeout = bytes.u16()?;
        let flags = FlowModFlags::from_bits_retain(bytes.u16()?);
        bytes.skip(4)?;
        let cookie = bytes.u64()?;
        let packet_count = bytes.u64()?;
        let byte_count = bytes.u64()?;
        let matches = parse_match(&mut bytes)?;
        let base = bytes.offset();
        let rest = bytes.take(bytes.remaining())?;
        let instructions = Instruction::parse_sequence(rest, base, vendor)?;
        Ok(FlowStatsEntry {
            duration_sec,
            duration_nsec,
            packet_count,
            byte_count,
            rule: FlowRule {
                cookie,
                table,
                priority,
                idle_timeout,
                hard_timeout,
                flags,
                matches,
                instructions,
                ..FlowRule::defaults(FlowModCmd::AddFlow)
            },
        })
    }
}

/// Serialize one flow-stats entry.
pub fn encode_flow_stats_entry(entry: &FlowStatsEntry) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = Vec::with_capacity(entry.size_of());
    entry.marshal(&mut bytes)?;
    Ok(bytes)
}

/// Parse a buffer holding exactly one flow-stats entry.
pub fn decode_flow_stats_entry(
    buf: &[u8],
    vendor: &dyn VendorCodec,
) -> Result<FlowStatsEntry, DecodeError> {
    let mut bytes = Reader::new(buf, 0);
    let entry = FlowStatsEntry::parse_wire(&mut bytes, vendor)?;
    if bytes.remaining() != 0 {
        return Err(DecodeError::Malformed {
            offset: 0,
            what: "flow stats entry",
            length: buf.len(),
        });
    }
    Ok(entry)
}

/// The filter of a flow dump request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowStatsRequest {
    pub table: u8,
    pub out_port: u32,
    pub out_group: u32,
    pub cookie: u64,
    pub cookie_mask: u64,
    pub matches: Vec<u8>,
}

impl Default for FlowStatsRequest {
    /// Every flow of every table.
    fn default() -> FlowStatsRequest {
        FlowStatsRequest {
            table: OFPTT_ALL,
            out_port: OfpPort::Any as u32,
            out_group: OfpGroup::Any as u32,
            cookie: 0,
            cookie_mask: 0,
            matches: vec![],
        }
    }
}

impl FlowStatsRequest {
    fn as_rule(&self) -> FlowRule {
        FlowRule {
            table: self.table,
            out_port: self.out_port,
            out_group: self.out_group,
            cookie: self.cookie,
            cookie_mask: self.cookie_mask,
            matches: self.matches.clone(),
            ..FlowRule::defaults(FlowModCmd::DeleteFlow)
        }
    }

    /// Parse filter text: `table`, `out_port`, `out_group`, `cookie` and match fields.
    pub fn parse(text: &str, codecs: &Codecs) -> Result<FlowStatsRequest, EncodeError> {
        let defaults = FlowRule::defaults(FlowModCmd::DeleteFlow);
        let rule = FlowRule::parse(text, FlowModCmd::DeleteFlow, codecs)?;
        if !rule.instructions.is_empty() {
            return Err(EncodeError::Syntax {
                token: text.to_string(),
                reason: "flow dump requests take no instructions",
            });
        }
        if rule.priority != defaults.priority
            || rule.idle_timeout != defaults.idle_timeout
            || rule.hard_timeout != defaults.hard_timeout
            || rule.buffer_id != defaults.buffer_id
            || rule.flags != defaults.flags
        {
            return Err(EncodeError::Syntax {
                token: text.to_string(),
                reason: "flow dump requests filter on table, out_port, out_group, cookie and match only",
            });
        }
        Ok(FlowStatsRequest {
            table: rule.table,
            out_port: rule.out_port,
            out_group: rule.out_group,
            cookie: rule.cookie,
            cookie_mask: rule.cookie_mask,
            matches: rule.matches,
        })
    }

    pub fn to_text(&self, codecs: &Codecs) -> Result<String, DecodeError> {
        self.as_rule().to_text(FlowModCmd::DeleteFlow, codecs)
    }

    pub fn size_of(&self) -> usize {
        FLOW_STATS_REQUEST_FIXED + match_size(&self.matches)
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), EncodeError> {
        bytes.put_u8(self.table);
        bytes.put_zeros(3);
        bytes.put_u32(self.out_port);
        bytes.put_u32(self.out_group);
        bytes.put_zeros(4);
        bytes.put_u64(self.cookie);
        bytes.put_u64(self.cookie_mask);
        marshal_match(&self.matches, bytes)
    }

    pub(crate) fn parse_wire(bytes: &mut Reader) -> Result<FlowStatsRequest, DecodeError> {
        let table = bytes.u8()?;
        bytes.skip(3)?;
        let out_port = bytes.u32()?;
        let out_group = bytes.u32()?;
        bytes.skip(4)?;
        let cookie = bytes.u64()?;
        let cookie_mask = bytes.u64()?;
        let matches = parse_match(bytes)?;
        Ok(FlowStatsRequest {
            table,
            out_port,
            out_group,
            cookie,
            cookie_mask,
            matches,
        })
    }
}
