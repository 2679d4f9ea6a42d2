//! Per-table instructions.

use tracing::warn;

use crate::bits::{length16, pad8, Reader, WriteBe};
use crate::error::{DecodeError, EncodeError};

use super::action::{actions_to_text, Action};
use super::oxm::hex;
use super::vendor::VendorCodec;
use super::Codecs;

const OFPIT_GOTO_TABLE: u16 = 1;
const OFPIT_WRITE_METADATA: u16 = 2;
const OFPIT_WRITE_ACTIONS: u16 = 3;
const OFPIT_APPLY_ACTIONS: u16 = 4;
const OFPIT_CLEAR_ACTIONS: u16 = 5;
const OFPIT_METER: u16 = 6;

/// Header of every instruction, padding included for the action-list kinds.
const INSTRUCTION_HEADER: usize = 8;

/// One entry of a flow's instruction list.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Instruction {
    GotoTable(u8),
    /// A zero mask writes the value unconditionally.
    WriteMetadata { metadata: u64, mask: u64 },
    WriteActions(Vec<Action>),
    ApplyActions(Vec<Action>),
    ClearActions,
    Meter(u32),
    /// An instruction type this codec does not know, kept verbatim.
    Unknown { typ: u16, data: Vec<u8> },
}

impl Instruction {
    fn type_code(&self) -> u16 {
        match *self {
            Instruction::GotoTable(_) => OFPIT_GOTO_TABLE,
            Instruction::WriteMetadata { .. } => OFPIT_WRITE_METADATA,
            Instruction::WriteActions(_) => OFPIT_WRITE_ACTIONS,
            Instruction::ApplyActions(_) => OFPIT_APPLY_ACTIONS,
            Instruction::ClearActions => OFPIT_CLEAR_ACTIONS,
            Instruction::Meter(_) => OFPIT_METER,
            Instruction::Unknown { typ, .. } => typ,
        }
    }

    /// Return the wire size of an instruction, header included.
    pub fn size_of(&self) -> usize {
        match *self {
            Instruction::WriteMetadata { .. } => 24,
            Instruction::WriteActions(ref actions) | Instruction::ApplyActions(ref actions) => {
                INSTRUCTION_HEADER + Action::size_of_sequence(actions)
            }
            Instruction::Unknown { ref data, .. } => crate::bits::align8(4 + data.len()),
            _ => 8,
        }
    }

    pub fn size_of_sequence(insts: &[Instruction]) -> usize {
        insts.iter().map(Instruction::size_of).sum()
    }

    pub fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), EncodeError> {
        let start = bytes.len();
        bytes.put_u16(self.type_code());
        bytes.put_u16(length16("instruction length", self.size_of())?);
        match *self {
            Instruction::GotoTable(table) => {
                bytes.put_u8(table);
                bytes.put_zeros(3);
            }
            Instruction::WriteMetadata { metadata, mask } => {
                bytes.put_zeros(4);
                bytes.put_u64(metadata);
                bytes.put_u64(mask);
            }
            Instruction::WriteActions(ref actions) | Instruction::ApplyActions(ref actions) => {
                bytes.put_zeros(4);
                for action in actions {
                    action.marshal(bytes)?;
                }
            }
            Instruction::ClearActions => bytes.put_zeros(4),
            Instruction::Meter(id) => bytes.put_u32(id),
            Instruction::Unknown { ref data, .. } => {
                bytes.extend_from_slice(data);
                pad8(bytes, start);
            }
        }
        Ok(())
    }

    pub(crate) fn parse(
        bytes: &mut Reader,
        vendor: &dyn VendorCodec,
    ) -> Result<Instruction, DecodeError> {
        let offset = bytes.offset();
        let typ = bytes.u16()?;
        let len = bytes.u16()? as usize;
        let malformed = DecodeError::Malformed {
            offset,
            what: "instruction",
            length: len,
        };
        if len < INSTRUCTION_HEADER || len % 8 != 0 {
            return Err(malformed);
        }
        let body = bytes.take(len - 4)?;
        let mut payload = Reader::new(body, offset + 4);
        let inst = match typ {
            OFPIT_GOTO_TABLE if len == 8 => Instruction::GotoTable(payload.u8()?),
            OFPIT_WRITE_METADATA if len == 24 => {
                payload.skip(4)?;
                Instruction::WriteMetadata {
                    metadata: payload.u64()?,
                    mask: payload.u64()?,
                }
            }
            OFPIT_WRITE_ACTIONS => Instruction::WriteActions(Action::parse_sequence(
                &body[4..],
                offset + INSTRUCTION_HEADER,
                vendor,
            )?),
            OFPIT_APPLY_ACTIONS => Instruction::ApplyActions(Action::parse_sequence(
                &body[4..],
                offset + INSTRUCTION_HEADER,
                vendor,
            )?),
            OFPIT_CLEAR_ACTIONS if len == 8 => Instruction::ClearActions,
            OFPIT_METER if len == 8 => Instruction::Meter(payload.u32()?),
            OFPIT_GOTO_TABLE | OFPIT_WRITE_METADATA | OFPIT_CLEAR_ACTIONS | OFPIT_METER => {
                return Err(malformed)
            }
            _ => {
                warn!(offset, typ, len, "passing through unknown instruction type");
                Instruction::Unknown {
                    typ,
                    data: body.to_vec(),
                }
            }
        };
        Ok(inst)
    }

    /// Parse every instruction in `buf`, the first of which starts at `base` in the message.
    pub(crate) fn parse_sequence(
        buf: &[u8],
        base: usize,
        vendor: &dyn VendorCodec,
    ) -> Result<Vec<Instruction>, DecodeError> {
        let mut bytes = Reader::new(buf, base);
        let mut insts = vec![];
        while bytes.remaining() > 0 {
            insts.push(Instruction::parse(&mut bytes, vendor)?);
        }
        Ok(insts)
    }

    pub fn to_text(&self, codecs: &Codecs) -> Result<String, DecodeError> {
        let with_actions = |name: &str, actions: &[Action]| -> Result<String, DecodeError> {
            if actions.is_empty() {
                Ok(name.to_string())
            } else {
                Ok(format!("{},{}", name, actions_to_text(actions, codecs)?))
            }
        };
        let text = match *self {
            Instruction::GotoTable(table) => format!("@goto={}", table),
            Instruction::WriteMetadata { metadata, mask: 0 } => format!("@metadata={:#x}", metadata),
            Instruction::WriteMetadata { metadata, mask } => {
                format!("@metadata={:#x}/{:#x}", metadata, mask)
            }
            Instruction::WriteActions(ref actions) => with_actions("@write", actions)?,
            Instruction::ApplyActions(ref actions) => with_actions("@apply", actions)?,
            Instruction::ClearActions => "@clear".to_string(),
            Instruction::Meter(id) => format!("@meter={}", id),
            Instruction::Unknown { typ, ref data } if data.is_empty() => {
                format!("@unknown={:#x}", typ)
            }
            Instruction::Unknown { typ, ref data } => {
                format!("@unknown={:#x}:{}", typ, hex(data))
            }
        };
        Ok(text)
    }
}

/// Serialize an instruction list in the given order.
pub fn encode_instructions(insts: &[Instruction]) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = Vec::with_capacity(Instruction::size_of_sequence(insts));
    for inst in insts {
        inst.marshal(&mut bytes)?;
    }
    Ok(bytes)
}

/// Parse a buffer holding nothing but instructions.
pub fn decode_instructions(
    buf: &[u8],
    vendor: &dyn VendorCodec,
) -> Result<Vec<Instruction>, DecodeError> {
    Instruction::parse_sequence(buf, 0, vendor)
}

pub fn instructions_to_text(insts: &[Instruction], codecs: &Codecs) -> Result<String, DecodeError> {
    let texts = insts
        .iter()
        .map(|i| i.to_text(codecs))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(texts.join(","))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::openflow0x04::NoVendor;
    use pretty_assertions::assert_eq;

    #[test]
    fn fixed_sizes() {
        let insts = vec![
            Instruction::GotoTable(5),
            Instruction::WriteMetadata {
                metadata: 1,
                mask: 0xff,
            },
            Instruction::ClearActions,
            Instruction::Meter(3),
        ];
        let bytes = encode_instructions(&insts).unwrap();
        assert_eq!(bytes.len(), 8 + 24 + 8 + 8);
        assert_eq!(&bytes[..8], &[0, 1, 0, 8, 5, 0, 0, 0]);
        assert_eq!(&bytes[40..], &[0, 6, 0, 8, 0, 0, 0, 3]);
        assert_eq!(decode_instructions(&bytes, &NoVendor).unwrap(), insts);
    }

    #[test]
    fn action_lists_keep_order() {
        let insts = vec![
            Instruction::ApplyActions(vec![Action::PopVlan, Action::output(1)]),
            Instruction::WriteActions(vec![]),
            Instruction::ApplyActions(vec![Action::output(2)]),
        ];
        let bytes = encode_instructions(&insts).unwrap();
        assert_eq!(&bytes[..4], &[0, 4, 0, 32]);
        assert_eq!(&bytes[32..36], &[0, 3, 0, 8]);
        assert_eq!(decode_instructions(&bytes, &NoVendor).unwrap(), insts);
        assert_eq!(
            instructions_to_text(&insts, &Codecs::basic()).unwrap(),
            "@apply,pop_vlan,output=1,@write,@apply,output=2"
        );
    }

    #[test]
    fn metadata_text_omits_zero_mask() {
        let codecs = Codecs::basic();
        assert_eq!(
            Instruction::WriteMetadata {
                metadata: 0x10,
                mask: 0
            }
            .to_text(&codecs)
            .unwrap(),
            "@metadata=0x10"
        );
    }

    #[test]
    fn wrong_fixed_length_is_malformed() {
        let bytes = [0u8, 6, 0, 16, 0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            decode_instructions(&bytes, &NoVendor),
            Err(DecodeError::Malformed {
                offset: 0,
                what: "instruction",
                length: 16,
            })
        );
    }

    #[test]
    fn nested_action_errors_carry_offsets() {
        let mut bytes = encode_instructions(&[Instruction::GotoTable(1)]).unwrap();
        // apply-actions holding an output action cut to 8 bytes
        bytes.extend_from_slice(&[0, 4, 0, 16, 0, 0, 0, 0, 0, 0, 0, 8, 0, 0, 0, 1]);
        assert_eq!(
            decode_instructions(&bytes, &NoVendor),
            Err(DecodeError::Malformed {
                offset: 16,
                what: "action",
                length: 8,
            })
        );
    }

    #[test]
    fn unknown_instruction_passes_through() {
        let bytes = [0xffu8, 0xff, 0, 16, 0, 0, 0, 1, 1, 2, 3, 4, 5, 6, 7, 8];
        let insts = decode_instructions(&bytes, &NoVendor).unwrap();
        assert_eq!(
            insts,
            vec![Instruction::Unknown {
                typ: 0xffff,
                data: bytes[4..].to_vec(),
            }]
        );
        assert_eq!(encode_instructions(&insts).unwrap(), bytes.to_vec());
        assert_eq!(
            instructions_to_text(&insts, &Codecs::basic()).unwrap(),
            "@unknown=0xffff:000000010102030405060708"
        );
    }
}
