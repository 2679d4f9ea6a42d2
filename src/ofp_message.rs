use crate::error::{DecodeError, EncodeError};
use crate::ofp_header::OfpHeader;
use crate::openflow0x04::VendorCodec;

/// OpenFlow Message
///
/// API for handling single (non-multipart) OpenFlow messages at the byte-buffer level.
pub trait OfpMessage: Sized {
    /// Return the byte-size of the whole message, header included.
    fn size_of(&self) -> usize;
    /// Create an `OfpHeader` for the message.
    fn header_of(&self) -> Result<OfpHeader, EncodeError>;
    /// Return a marshaled buffer containing an OpenFlow header and the message.
    fn marshal(&self) -> Result<Vec<u8>, EncodeError>;
    /// Parse the message whose header is `header` from `body`, the bytes following the
    /// header up to the header's length.
    fn parse(header: &OfpHeader, body: &[u8], vendor: &dyn VendorCodec) -> Result<Self, DecodeError>;
}
