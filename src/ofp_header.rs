use crate::bits::{Reader, WriteBe};
use crate::error::DecodeError;
use crate::openflow0x04::{MsgCode, MultipartType, OFP_VERSION};

/// OpenFlow Header
///
/// The first fields of every OpenFlow message, no matter the protocol version.
/// This is parsed to determine version and length of the remaining message, so that
/// it can be properly handled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OfpHeader {
    version: u8,
    typ: u8,
    length: u16,
    xid: u32,
}

impl OfpHeader {
    /// Create an `OfpHeader` out of the arguments.
    pub fn new(version: u8, typ: u8, length: u16, xid: u32) -> OfpHeader {
        OfpHeader {
            version,
            typ,
            length,
            xid,
        }
    }

    /// Return the byte-size of an `OfpHeader`.
    pub const fn size() -> usize {
        8
    }

    /// Fills a message buffer with the header fields of an `OfpHeader`.
    pub fn marshal(bytes: &mut Vec<u8>, header: OfpHeader) {
        bytes.put_u8(header.version);
        bytes.put_u8(header.typ);
        bytes.put_u16(header.length);
        bytes.put_u32(header.xid);
    }

    /// Parse the header at the front of `buf` and check that `buf` holds the whole message.
    ///
    /// Only OpenFlow 1.3 headers are accepted.
    pub fn parse(buf: &[u8]) -> Result<OfpHeader, DecodeError> {
        let mut bytes = Reader::new(buf, 0);
        let header = OfpHeader {
            version: bytes.u8()?,
            typ: bytes.u8()?,
            length: bytes.u16()?,
            xid: bytes.u32()?,
        };
        if header.version != OFP_VERSION {
            return Err(DecodeError::UnsupportedVersion {
                found: header.version,
            });
        }
        if header.length() < OfpHeader::size() {
            return Err(DecodeError::Malformed {
                offset: 2,
                what: "message length",
                length: header.length(),
            });
        }
        if header.length() > buf.len() {
            return Err(DecodeError::Truncated {
                offset: 0,
                expected: header.length(),
                found: buf.len(),
            });
        }
        Ok(header)
    }

    /// Parse a header and insist on the given message type.
    pub fn parse_expecting(buf: &[u8], code: MsgCode) -> Result<OfpHeader, DecodeError> {
        let header = OfpHeader::parse(buf)?;
        if header.typ != code as u8 {
            return Err(DecodeError::UnexpectedType {
                offset: 1,
                what: "message type",
                expected: code as u16,
                found: header.typ as u16,
            });
        }
        Ok(header)
    }

    /// Return the `version` field of a header.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Return the OpenFlow message type code of a header, if it is one this crate handles.
    pub fn type_code(&self) -> Option<MsgCode> {
        MsgCode::of_int(self.typ)
    }

    /// Return the `length` field of a header. Includes the length of the header itself.
    pub fn length(&self) -> usize {
        self.length as usize
    }

    /// Return the `xid` field of a header, the transaction id associated with this packet.
    ///  Replies use the same id to facilitate pairing.
    pub fn xid(&self) -> u32 {
        self.xid
    }
}

/// The fields following `OfpHeader` in every multipart request and reply.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MultipartHeader {
    pub header: OfpHeader,
    pub mp_type: u16,
    pub flags: u16,
}

/// Bit 0 of the multipart flags: more messages follow this one.
pub const OFPMPF_MORE: u16 = 1 << 0;

impl MultipartHeader {
    /// Return the byte-size of the common and multipart headers together.
    pub const fn size() -> usize {
        16
    }

    pub fn marshal(bytes: &mut Vec<u8>, mp: MultipartHeader) {
        OfpHeader::marshal(bytes, mp.header);
        bytes.put_u16(mp.mp_type);
        bytes.put_u16(mp.flags);
        bytes.put_zeros(4);
    }

    /// Parse a multipart request or reply header of the given multipart type.
    pub fn parse(buf: &[u8], mp_type: MultipartType) -> Result<MultipartHeader, DecodeError> {
        let header = OfpHeader::parse(buf)?;
        match header.type_code() {
            Some(MsgCode::MultipartReq) | Some(MsgCode::MultipartResp) => (),
            _ => {
                return Err(DecodeError::UnexpectedType {
                    offset: 1,
                    what: "message type",
                    expected: MsgCode::MultipartResp as u16,
                    found: header.typ as u16,
                })
            }
        }
        if header.length() < MultipartHeader::size() {
            return Err(DecodeError::Malformed {
                offset: 2,
                what: "multipart message length",
                length: header.length(),
            });
        }
        let mut bytes = Reader::new(&buf[OfpHeader::size()..], OfpHeader::size());
        let found = bytes.u16()?;
        if found != mp_type as u16 {
            return Err(DecodeError::UnexpectedType {
                offset: OfpHeader::size(),
                what: "multipart type",
                expected: mp_type as u16,
                found,
            });
        }
        let flags = bytes.u16()?;
        bytes.skip(4)?;
        Ok(MultipartHeader {
            header,
            mp_type: found,
            flags,
        })
    }

    /// Whether more messages of the same multipart exchange follow.
    pub fn more(&self) -> bool {
        self.flags & OFPMPF_MORE != 0
    }
}
