//! OpenFlow 1.3 flow-mod, group-mod and multipart flow/group-desc codecs.
//!
//! Every message can be built from a record, serialized to the exact wire layout,
//! parsed back, and rendered to (or parsed from) the compact text syntax, e.g.
//! `table=1,priority=10,eth_type=0x0800,@apply,output=2`.

use std::str::FromStr;

use bitflags::bitflags;
use strum::{EnumIter, EnumString, FromRepr, IntoStaticStr};

use crate::error::EncodeError;

pub mod action;
pub mod flow;
pub mod group;
pub mod instruction;
pub mod message;
pub mod multipart;
pub mod oxm;
pub mod parser;
pub mod vendor;

pub use self::action::Action;
pub use self::flow::{FlowMod, FlowRule, FlowStatsEntry, FlowStatsRequest};
pub use self::group::{Bucket, GroupDescriptor, GroupMod, GroupModCmd, GroupType};
pub use self::instruction::Instruction;
pub use self::message::Message;
pub use self::multipart::{FlowStats, GroupDesc, MultipartEnvelope};
pub use self::oxm::{BasicOxm, MatchCodec};
pub use self::vendor::{NoVendor, VendorCodec};

/// Wire version byte of OpenFlow 1.3.
pub const OFP_VERSION: u8 = 0x04;

/// OpenFlow 1.3 message type codes handled by this crate.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromRepr)]
pub enum MsgCode {
    FlowMod = 14,
    GroupMod = 15,
    MultipartReq = 18,
    MultipartResp = 19,
}

impl MsgCode {
    pub fn of_int(code: u8) -> Option<MsgCode> {
        MsgCode::from_repr(code)
    }
}

/// Multipart body kinds handled by this crate.
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MultipartType {
    Flow = 1,
    GroupDesc = 7,
}

/// Highest table number usable in a flow entry.
pub const OFPTT_MAX: u8 = 0xfe;
/// Wildcard table for deletes and stats requests.
pub const OFPTT_ALL: u8 = 0xff;

/// Largest `max_len` an output-to-controller action may request.
pub const OFPCML_MAX: u16 = 0xffe5;
/// Send the whole packet to the controller rather than buffering it.
pub const OFPCML_NO_BUFFER: u16 = 0xffff;

/// The flow-mod does not refer to a packet buffered on the switch.
pub const OFP_NO_BUFFER: u32 = 0xffff_ffff;

/// Reserved port numbers.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, EnumString, FromRepr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum OfpPort {
    Max = 0xffff_ff00,
    InPort = 0xffff_fff8,
    Table = 0xffff_fff9,
    Normal = 0xffff_fffa,
    Flood = 0xffff_fffb,
    All = 0xffff_fffc,
    Controller = 0xffff_fffd,
    Local = 0xffff_fffe,
    Any = 0xffff_ffff,
}

/// Reserved group numbers.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, EnumString, FromRepr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum OfpGroup {
    Max = 0xffff_ff00,
    All = 0xffff_fffc,
    Any = 0xffff_ffff,
}

/// Type of modification to perform on a flow table.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumString, FromRepr, IntoStaticStr)]
pub enum FlowModCmd {
    #[strum(serialize = "add")]
    AddFlow = 0,
    #[strum(serialize = "modify")]
    ModFlow = 1,
    #[strum(serialize = "modify_strict")]
    ModStrictFlow = 2,
    #[strum(serialize = "delete")]
    DeleteFlow = 3,
    #[strum(serialize = "delete_strict")]
    DeleteStrictFlow = 4,
}

impl FlowModCmd {
    pub fn of_int(code: u8) -> Option<FlowModCmd> {
        FlowModCmd::from_repr(code)
    }

    /// Deletes wildcard the table and output filters, so they default differently.
    pub fn is_delete(self) -> bool {
        matches!(self, FlowModCmd::DeleteFlow | FlowModCmd::DeleteStrictFlow)
    }
}

bitflags! {
    /// `ofp_flow_mod_flags`.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FlowModFlags: u16 {
        const SEND_FLOW_REM = 1 << 0;
        const CHECK_OVERLAP = 1 << 1;
        const RESET_COUNTS = 1 << 2;
        const NO_PKT_COUNTS = 1 << 3;
        const NO_BYT_COUNTS = 1 << 4;
    }
}

impl FlowModFlags {
    /// Text names of each flag, in wire bit order.
    pub const NAMES: [(&'static str, FlowModFlags); 5] = [
        ("send_flow_rem", FlowModFlags::SEND_FLOW_REM),
        ("check_overlap", FlowModFlags::CHECK_OVERLAP),
        ("reset_counts", FlowModFlags::RESET_COUNTS),
        ("no_pkt_counts", FlowModFlags::NO_PKT_COUNTS),
        ("no_byt_counts", FlowModFlags::NO_BYT_COUNTS),
    ];

    pub fn by_name(name: &str) -> Option<FlowModFlags> {
        FlowModFlags::NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, f)| *f)
    }
}

/// The collaborators a codec call may need: the match sub-codec, and the
/// vendor-action sub-codec.
#[derive(Copy, Clone)]
pub struct Codecs<'a> {
    pub matcher: &'a dyn MatchCodec,
    pub vendor: &'a dyn VendorCodec,
}

impl Codecs<'static> {
    /// The built-in match codec and no vendor extensions.
    pub fn basic() -> Codecs<'static> {
        Codecs {
            matcher: &BasicOxm,
            vendor: &NoVendor,
        }
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal integer.
pub fn parse_int(text: &str) -> Option<u64> {
    match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => u64::from_str(text).ok(),
    }
}

/// Parse an unsigned integer for `field`, refusing values above `max`.
pub fn parse_uint(field: &'static str, text: &str, max: u64) -> Result<u64, EncodeError> {
    let value = parse_int(text).ok_or_else(|| EncodeError::InvalidValue {
        field,
        value: text.to_string(),
    })?;
    if value > max {
        return Err(EncodeError::FieldOverflow { field, value, max });
    }
    Ok(value)
}

/// Parse a port by reserved name or number.
pub fn parse_port(field: &'static str, text: &str) -> Result<u32, EncodeError> {
    if let Ok(port) = OfpPort::from_str(text) {
        return Ok(port as u32);
    }
    let port = parse_uint(field, text, u32::MAX as u64)? as u32;
    if port > OfpPort::Max as u32 && OfpPort::from_repr(port).is_none() {
        return Err(EncodeError::FieldOverflow {
            field,
            value: port as u64,
            max: OfpPort::Max as u64,
        });
    }
    Ok(port)
}

/// Render a port by reserved name where one exists.
pub fn port_to_string(port: u32) -> String {
    match OfpPort::from_repr(port) {
        Some(p) => <&'static str>::from(p).to_string(),
        None => port.to_string(),
    }
}

/// Parse a group by reserved name or number.
pub fn parse_group(field: &'static str, text: &str) -> Result<u32, EncodeError> {
    if let Ok(group) = OfpGroup::from_str(text) {
        return Ok(group as u32);
    }
    let group = parse_uint(field, text, u32::MAX as u64)? as u32;
    if group > OfpGroup::Max as u32 && OfpGroup::from_repr(group).is_none() {
        return Err(EncodeError::FieldOverflow {
            field,
            value: group as u64,
            max: OfpGroup::Max as u64,
        });
    }
    Ok(group)
}

/// Render a group by reserved name where one exists.
pub fn group_to_string(group: u32) -> String {
    match OfpGroup::from_repr(group) {
        Some(g) => <&'static str>::from(g).to_string(),
        None => group.to_string(),
    }
}
