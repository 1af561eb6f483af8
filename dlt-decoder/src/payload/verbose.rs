use super::{payload_error, read_u16, read_u32, read_u64, PayloadDecoder};
use crate::builder::LineBuilder;
use crate::types::{DltArg, Result};

const TYPE_INFO_SIZE: usize = 4;

const TYLE_MASK: u32 = 0x0000_000F;
const TYPE_BOOL: u32 = 0x0000_0010;
const TYPE_SINT: u32 = 0x0000_0020;
const TYPE_UINT: u32 = 0x0000_0040;
const TYPE_FLOAT: u32 = 0x0000_0080;
const TYPE_STRING: u32 = 0x0000_0200;
const TYPE_RAW: u32 = 0x0000_0400;
const VARIABLE_INFO: u32 = 0x0000_0800;
const FIXED_POINT: u32 = 0x0000_1000;
/// Type bits used to select the argument decoder (VARI, FIXP and SCOD excluded)
const TYPE_MASK: u32 = 0x0000_67F0;
const CODING_MASK: u32 = 0x0003_8000;
const CODING_SHIFT: u32 = 15;
const CODING_UTF8: u32 = 1;

/// Decodes the arguments of a verbose message
///
/// Supports booleans, integers, floats, strings and raw data. Arguments with
/// variable info or fixed point scaling are rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct VerboseDecoder;

impl VerboseDecoder {
    pub fn new() -> Self {
        Self
    }
}

/// Byte length of the TYLE field, `None` for reserved values
fn type_length(type_info: u32) -> Option<usize> {
    match type_info & TYLE_MASK {
        1 => Some(1),
        2 => Some(2),
        3 => Some(4),
        4 => Some(8),
        5 => Some(16),
        _ => None,
    }
}

fn decode_arg(type_info: u32, buf: &[u8], big_endian: bool) -> std::result::Result<(DltArg, usize), String> {
    match type_info & TYPE_MASK {
        TYPE_BOOL => {
            if type_info & VARIABLE_INFO != 0 {
                return Err("'Bool' unsupported type info".to_string());
            }
            if buf.len() < TYPE_INFO_SIZE + 1 {
                return Err(format!("'Bool' insufficient buffer length {}", buf.len()));
            }
            Ok((DltArg::Bool(buf[TYPE_INFO_SIZE] != 0), TYPE_INFO_SIZE + 1))
        }
        kind @ (TYPE_SINT | TYPE_UINT) => {
            let name = if kind == TYPE_SINT { "Signed" } else { "Unsigned" };
            if type_info & (VARIABLE_INFO | FIXED_POINT) != 0 {
                return Err(format!("'{}' unsupported type info", name));
            }
            let size = type_length(type_info)
                .ok_or_else(|| format!("'{}' unsupported type length 0x{:x}", name, type_info & TYLE_MASK))?;
            if buf.len() < TYPE_INFO_SIZE + size {
                return Err(format!("'{}' insufficient buffer length {}", name, buf.len()));
            }
            let data = &buf[TYPE_INFO_SIZE..TYPE_INFO_SIZE + size];
            let arg = match (kind, size) {
                (_, 16) => DltArg::Raw(data.to_vec()),
                (TYPE_SINT, 1) => DltArg::Signed(data[0] as i8 as i64),
                (TYPE_SINT, 2) => DltArg::Signed(read_u16(data, big_endian) as i16 as i64),
                (TYPE_SINT, 4) => DltArg::Signed(read_u32(data, big_endian) as i32 as i64),
                (TYPE_SINT, _) => DltArg::Signed(read_u64(data, big_endian) as i64),
                (_, 1) => DltArg::Unsigned(data[0] as u64),
                (_, 2) => DltArg::Unsigned(read_u16(data, big_endian) as u64),
                (_, 4) => DltArg::Unsigned(read_u32(data, big_endian) as u64),
                (_, _) => DltArg::Unsigned(read_u64(data, big_endian)),
            };
            Ok((arg, TYPE_INFO_SIZE + size))
        }
        TYPE_FLOAT => {
            if type_info & VARIABLE_INFO != 0 {
                return Err("'Float' unsupported type info".to_string());
            }
            let size = match type_length(type_info) {
                Some(size @ (2 | 4 | 8 | 16)) => size,
                _ => {
                    return Err(format!(
                        "'Float' unsupported type length 0x{:x}",
                        type_info & TYLE_MASK
                    ))
                }
            };
            if buf.len() < TYPE_INFO_SIZE + size {
                return Err(format!("'Float' insufficient buffer length {}", buf.len()));
            }
            let data = &buf[TYPE_INFO_SIZE..TYPE_INFO_SIZE + size];
            let arg = match size {
                4 => DltArg::Float(f32::from_bits(read_u32(data, big_endian)) as f64),
                8 => DltArg::Float(f64::from_bits(read_u64(data, big_endian))),
                // Half and quad precision are kept as raw bytes
                _ => DltArg::Raw(data.to_vec()),
            };
            Ok((arg, TYPE_INFO_SIZE + size))
        }
        TYPE_STRING => {
            if type_info & VARIABLE_INFO != 0 {
                return Err("'String' unsupported type info".to_string());
            }
            let (data, consumed) = length_prefixed(buf, big_endian, "String")?;
            let data = data.strip_suffix(&[0]).unwrap_or(data);
            let text = if (type_info & CODING_MASK) >> CODING_SHIFT == CODING_UTF8 {
                String::from_utf8_lossy(data).into_owned()
            } else {
                data.iter().map(|&b| b as char).collect()
            };
            Ok((DltArg::String(text), consumed))
        }
        TYPE_RAW => {
            if type_info & VARIABLE_INFO != 0 {
                return Err("'Raw' unsupported type info".to_string());
            }
            let (data, consumed) = length_prefixed(buf, big_endian, "Raw")?;
            Ok((DltArg::Raw(data.to_vec()), consumed))
        }
        _ => Err("unknown type info".to_string()),
    }
}

/// Split a 16-bit length prefixed field following the type info
fn length_prefixed<'a>(
    buf: &'a [u8],
    big_endian: bool,
    name: &str,
) -> std::result::Result<(&'a [u8], usize), String> {
    let data_offset = TYPE_INFO_SIZE + 2;
    if buf.len() < data_offset {
        return Err(format!(
            "'{}' insufficient buffer length {} (minimum {})",
            name,
            buf.len(),
            data_offset
        ));
    }
    let length = read_u16(&buf[TYPE_INFO_SIZE..data_offset], big_endian) as usize;
    if buf.len() < data_offset + length {
        return Err(format!(
            "'{}' insufficient buffer length {} (expected {})",
            name,
            buf.len(),
            data_offset + length
        ));
    }
    Ok((&buf[data_offset..data_offset + length], data_offset + length))
}

impl PayloadDecoder for VerboseDecoder {
    fn decode(&mut self, payload: &[u8], builder: &mut dyn LineBuilder) -> Result<usize> {
        let big_endian = builder.big_endian();
        let expected = builder.number_of_args();
        let mut offset = 0;

        for index in 0..expected {
            let remaining = &payload[offset..];
            if remaining.len() < TYPE_INFO_SIZE {
                return payload_error(
                    builder,
                    format!(
                        "Verbose message with insufficient buffer length decoding arg {} of {}",
                        index + 1,
                        expected
                    ),
                );
            }

            let type_info = read_u32(remaining, big_endian);
            match decode_arg(type_info, remaining, big_endian) {
                Ok((arg, length)) => {
                    builder.add_argument(arg);
                    offset += length;
                }
                Err(reason) => {
                    return payload_error(
                        builder,
                        format!(
                            "Verbose message 0x{:x} arg {} of {}, {}",
                            type_info,
                            index + 1,
                            expected,
                            reason
                        ),
                    );
                }
            }
        }
        Ok(offset)
    }
}
