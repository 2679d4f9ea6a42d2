#![crate_name = "ofp4str"]
#![crate_type = "lib"]

//! Text and wire codec for OpenFlow 1.3 flow-mods, group-mods and their
//! multipart dumps.

pub mod bits;
pub mod error;
pub mod ofp_header;
pub mod ofp_message;
pub mod openflow0x04;

pub use error::{DecodeError, EncodeError};
pub use ofp_message::OfpMessage;
pub use openflow0x04::flow::{decode_flow_mod, encode_flow_mod};
pub use openflow0x04::group::{decode_buckets, decode_group_mod, encode_buckets, encode_group_mod};
pub use openflow0x04::multipart::{
    decode_flows_multipart_message, decode_groups_desc_multipart_message, encode_flows_multipart,
    encode_groups_desc_multipart,
};
pub use openflow0x04::Codecs;
