//! Vendor (experimenter) action extensions.

/// Experimenter id of the Nicira extensions.
pub const NX_VENDOR_ID: u32 = 0x0000_2320;

/// Resolves the actions of one extension vendor to and from text.
///
/// A vendor action on the wire is an `OFPAT_EXPERIMENTER` header followed by
/// a 16-bit subtype: `type:u16, length:u16, vendor:u32, subtype:u16, payload...`.
pub trait VendorCodec: Sync {
    /// The experimenter id whose actions this codec understands, if any.
    fn vendor_id(&self) -> Option<u32>;

    /// Encode the action `name` with its optional argument into complete action
    /// bytes, header included. `None` when the name is not one of this vendor's.
    fn encode_vendor_action(&self, name: &str, arg: Option<&str>) -> Option<Vec<u8>>;

    /// Render the action with the given subtype and the bytes after the subtype.
    fn decode_vendor_action(&self, vendor_id: u32, sub_type: u16, payload: &[u8])
        -> Option<String>;
}

/// Knows no vendor actions; every experimenter action stays opaque.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoVendor;

impl VendorCodec for NoVendor {
    fn vendor_id(&self) -> Option<u32> {
        None
    }

    fn encode_vendor_action(&self, _: &str, _: Option<&str>) -> Option<Vec<u8>> {
        None
    }

    fn decode_vendor_action(&self, _: u32, _: u16, _: &[u8]) -> Option<String> {
        None
    }
}
