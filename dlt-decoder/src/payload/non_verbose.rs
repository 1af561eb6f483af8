use super::{payload_error, read_u32, PayloadDecoder};
use crate::builder::LineBuilder;
use crate::types::{DltArg, Result};

const MESSAGE_ID_SIZE: usize = 4;

/// Non-verbose decoder without a message catalogue
///
/// Reads the message id and keeps the remaining bytes as one raw argument.
/// It consumes the whole payload, which makes it the fallback when a more
/// specific non-verbose decoder cannot make sense of a message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonVerboseByteDecoder;

impl NonVerboseByteDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl PayloadDecoder for NonVerboseByteDecoder {
    fn decode(&mut self, payload: &[u8], builder: &mut dyn LineBuilder) -> Result<usize> {
        if payload.len() < MESSAGE_ID_SIZE {
            return payload_error(
                builder,
                format!(
                    "Non-verbose message with insufficient buffer length of {}",
                    payload.len()
                ),
            );
        }

        let message_id = read_u32(payload, builder.big_endian());
        builder.set_message_id(message_id);
        if payload.len() > MESSAGE_ID_SIZE {
            builder.add_argument(DltArg::Raw(payload[MESSAGE_ID_SIZE..].to_vec()));
        }
        Ok(payload.len())
    }
}
