use super::{payload_error, read_u16, read_u32, PayloadDecoder};
use crate::builder::LineBuilder;
use crate::types::{id_to_string, ControlKind, ControlMessage, DltType, Result};
use chrono::DateTime;
use std::collections::HashMap;

const SERVICE_ID_SIZE: usize = 4;
const STATUS_NOT_SUPPORTED: u8 = 1;
const STATUS_ERROR: u8 = 2;
/// Service ids from here on are application defined injections
const SW_INJECTION_BASE: u32 = 0xFFF;

/// How the body of a control service is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// Fixed size including the service id (and status for responses)
    Fixed(usize),
    /// Fixed size, with application and context id following the service id
    AppContext(usize),
    /// Status, then a length prefixed version string
    SoftwareVersion,
    /// Status, nanoseconds, seconds as 48-bit value
    SyncTimeStamp,
    /// Variable size with no length field, consumes the whole payload
    Remaining,
}

#[derive(Debug, Clone, Copy)]
struct Service {
    name: &'static str,
    request: Option<Layout>,
    response: Option<Layout>,
}

/// Known services: id, name, request layout, response layout
const SERVICES: &[(u32, &str, Option<Layout>, Option<Layout>)] = &[
    (0x01, "set_log_level", Some(Layout::AppContext(17)), Some(Layout::Fixed(5))),
    (0x02, "set_trace_status", Some(Layout::AppContext(17)), Some(Layout::Fixed(5))),
    (0x03, "get_log_info", Some(Layout::Fixed(17)), Some(Layout::Remaining)),
    (0x04, "get_default_log_level", Some(Layout::Fixed(4)), Some(Layout::Fixed(6))),
    (0x05, "store_configuration", Some(Layout::Fixed(4)), Some(Layout::Fixed(5))),
    (0x06, "reset_to_factory_default", Some(Layout::Fixed(4)), Some(Layout::Fixed(5))),
    (0x09, "set_verbose_mode", Some(Layout::Fixed(5)), Some(Layout::Fixed(5))),
    (0x0A, "set_message_filtering", Some(Layout::Fixed(5)), Some(Layout::Fixed(5))),
    (0x0B, "set_timing_packets", Some(Layout::Fixed(5)), Some(Layout::Fixed(5))),
    (0x0C, "get_local_time", Some(Layout::Fixed(4)), Some(Layout::Fixed(5))),
    (0x0D, "use_ecu_id", Some(Layout::Fixed(5)), Some(Layout::Fixed(5))),
    (0x0E, "use_session_id", Some(Layout::Fixed(5)), Some(Layout::Fixed(5))),
    (0x0F, "use_timestamp", Some(Layout::Fixed(5)), Some(Layout::Fixed(5))),
    (0x10, "use_extended_header", Some(Layout::Fixed(5)), Some(Layout::Fixed(5))),
    (0x11, "set_default_log_level", Some(Layout::Fixed(9)), Some(Layout::Fixed(5))),
    (0x12, "set_default_trace_status", Some(Layout::Fixed(9)), Some(Layout::Fixed(5))),
    (0x13, "get_software_version", Some(Layout::Fixed(4)), Some(Layout::SoftwareVersion)),
    (0x14, "message_buffer_overflow", Some(Layout::Fixed(4)), Some(Layout::Fixed(6))),
    (0x15, "get_default_trace_status", Some(Layout::Fixed(4)), Some(Layout::Fixed(6))),
    (0x19, "get_verbose_mode", Some(Layout::Fixed(4)), Some(Layout::Fixed(6))),
    (0x1A, "get_message_filtering_status", Some(Layout::Fixed(4)), Some(Layout::Fixed(6))),
    (0x1B, "get_use_ecu_id", Some(Layout::Fixed(4)), Some(Layout::Fixed(6))),
    (0x1C, "get_use_session_id", Some(Layout::Fixed(4)), Some(Layout::Fixed(6))),
    (0x1D, "get_use_timestamp", Some(Layout::Fixed(4)), Some(Layout::Fixed(6))),
    (0x1E, "get_use_extended_header", Some(Layout::Fixed(4)), Some(Layout::Fixed(6))),
    (0x1F, "get_trace_status", Some(Layout::AppContext(12)), Some(Layout::Fixed(6))),
    (0x23, "buffer_overflow_notification", Some(Layout::Fixed(4)), Some(Layout::Fixed(9))),
    (0x24, "sync_timestamp", Some(Layout::Fixed(4)), Some(Layout::SyncTimeStamp)),
    (0xF01, "unregister_context", None, Some(Layout::AppContext(17))),
    (0xF02, "connection_info", None, Some(Layout::Fixed(10))),
    (0xF03, "timezone", None, Some(Layout::Fixed(10))),
    (0xF04, "marker", None, Some(Layout::Fixed(5))),
];

/// Name of a known control service
pub fn service_name(service_id: u32) -> Option<&'static str> {
    SERVICES
        .iter()
        .find(|(id, ..)| *id == service_id)
        .map(|(_, name, ..)| *name)
}

/// Decodes control requests, responses and time markers
///
/// Only the envelope is interpreted: service id, response status and a few
/// fields worth showing (software version, sync time, application/context ids).
/// Unknown service ids below 0xFFF are rejected; higher ids are software
/// injections whose payload is kept as is.
#[derive(Debug, Clone)]
pub struct ControlDecoder {
    services: HashMap<u32, Service>,
}

impl ControlDecoder {
    pub fn new() -> Self {
        let services = SERVICES
            .iter()
            .map(|&(id, name, request, response)| {
                (
                    id,
                    Service {
                        name,
                        request,
                        response,
                    },
                )
            })
            .collect();
        Self { services }
    }

    fn decode_request(
        &self,
        service_id: u32,
        payload: &[u8],
        builder: &mut dyn LineBuilder,
    ) -> Result<(ControlMessage, usize)> {
        let (name, layout) = match self.services.get(&service_id) {
            Some(Service {
                name,
                request: Some(layout),
                ..
            }) => (Some(*name), *layout),
            _ if service_id < SW_INJECTION_BASE => {
                return payload_error(
                    builder,
                    format!("No decoder for control request message service 0x{:x}", service_id),
                );
            }
            _ => return self.decode_injection(service_id, payload, builder),
        };

        let (length, detail) = match layout {
            Layout::Fixed(length) => (length, None),
            Layout::AppContext(length) => (length, app_context(payload, SERVICE_ID_SIZE, length)),
            Layout::Remaining => (payload.len(), None),
            Layout::SoftwareVersion | Layout::SyncTimeStamp => (SERVICE_ID_SIZE, None),
        };
        if payload.len() < length {
            return insufficient(builder, name, service_id, payload.len());
        }

        Ok((
            ControlMessage {
                kind: ControlKind::Request,
                service_id,
                service: name,
                status: None,
                detail,
                body: payload[SERVICE_ID_SIZE..length].to_vec(),
            },
            length,
        ))
    }

    fn decode_response(
        &self,
        service_id: u32,
        payload: &[u8],
        builder: &mut dyn LineBuilder,
    ) -> Result<(ControlMessage, usize)> {
        let (name, layout) = match self.services.get(&service_id) {
            Some(Service {
                name,
                response: Some(layout),
                ..
            }) => (Some(*name), *layout),
            _ if service_id < SW_INJECTION_BASE => {
                return payload_error(
                    builder,
                    format!("No decoder for control response message service 0x{:x}", service_id),
                );
            }
            _ => (None, Layout::Fixed(SERVICE_ID_SIZE + 1)),
        };

        let body_offset = SERVICE_ID_SIZE + 1;
        if payload.len() < body_offset {
            return insufficient(builder, name, service_id, payload.len());
        }
        let status = payload[SERVICE_ID_SIZE];
        let big_endian = builder.big_endian();

        let (length, detail) = if status == STATUS_NOT_SUPPORTED || status == STATUS_ERROR {
            (body_offset, None)
        } else {
            match layout {
                Layout::Fixed(length) => (length, None),
                Layout::AppContext(length) => (length, app_context(payload, body_offset, length)),
                Layout::Remaining => (payload.len(), None),
                Layout::SoftwareVersion => {
                    let string_offset = body_offset + 4;
                    if payload.len() < string_offset {
                        return insufficient(builder, name, service_id, payload.len());
                    }
                    let length = read_u32(&payload[body_offset..string_offset], big_endian) as usize;
                    if length > u16::MAX as usize || payload.len() < string_offset + length {
                        return insufficient(builder, name, service_id, payload.len());
                    }
                    let version = &payload[string_offset..string_offset + length];
                    let version = version.strip_suffix(&[0]).unwrap_or(version);
                    let version: String = version.iter().map(|&b| b as char).collect();
                    (string_offset + length, Some(version))
                }
                Layout::SyncTimeStamp => {
                    if payload.len() < 15 {
                        return insufficient(builder, name, service_id, payload.len());
                    }
                    let nanos = read_u32(&payload[5..9], big_endian);
                    let seconds_low = read_u32(&payload[9..13], big_endian) as i64;
                    let seconds_high = read_u16(&payload[13..15], big_endian) as i64;
                    let seconds = (seconds_high << 32) | seconds_low;
                    let detail = DateTime::from_timestamp(seconds, nanos).map(|ts| ts.to_rfc3339());
                    (15, detail)
                }
            }
        };
        if payload.len() < length {
            return insufficient(builder, name, service_id, payload.len());
        }

        Ok((
            ControlMessage {
                kind: ControlKind::Response,
                service_id,
                service: name,
                status: Some(status),
                detail,
                body: payload[body_offset..length].to_vec(),
            },
            length,
        ))
    }

    /// Software injection request: little endian length, then the data
    fn decode_injection(
        &self,
        service_id: u32,
        payload: &[u8],
        builder: &mut dyn LineBuilder,
    ) -> Result<(ControlMessage, usize)> {
        let data_offset = SERVICE_ID_SIZE + 4;
        if payload.len() < data_offset {
            return insufficient(builder, None, service_id, payload.len());
        }
        let length = u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]) as usize;
        if length != payload.len() - data_offset {
            return payload_error(
                builder,
                format!(
                    "Software injection 0x{:x} length {} does not match payload {}",
                    service_id,
                    length,
                    payload.len() - data_offset
                ),
            );
        }
        Ok((
            ControlMessage {
                kind: ControlKind::Request,
                service_id,
                service: None,
                status: None,
                detail: None,
                body: payload[data_offset..].to_vec(),
            },
            payload.len(),
        ))
    }
}

impl Default for ControlDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn app_context(payload: &[u8], offset: usize, length: usize) -> Option<String> {
    if payload.len() < length || length < offset + 8 {
        return None;
    }
    let app = id_to_string([payload[offset], payload[offset + 1], payload[offset + 2], payload[offset + 3]]);
    let ctx = id_to_string([
        payload[offset + 4],
        payload[offset + 5],
        payload[offset + 6],
        payload[offset + 7],
    ]);
    Some(format!("{} {}", app, ctx))
}

fn insufficient<T>(
    builder: &mut dyn LineBuilder,
    name: Option<&str>,
    service_id: u32,
    length: usize,
) -> Result<T> {
    let message = match name {
        Some(name) => format!("'{}' with insufficient buffer length of {}", name, length),
        None => format!(
            "Control service 0x{:x} with insufficient buffer length of {}",
            service_id, length
        ),
    };
    payload_error(builder, message)
}

impl PayloadDecoder for ControlDecoder {
    fn decode(&mut self, payload: &[u8], builder: &mut dyn LineBuilder) -> Result<usize> {
        let kind = match builder.message_type() {
            Some(DltType::ControlRequest) => ControlKind::Request,
            Some(DltType::ControlResponse) => ControlKind::Response,
            Some(DltType::ControlTime) => {
                builder.set_control_message(ControlMessage {
                    kind: ControlKind::Time,
                    service_id: 0,
                    service: None,
                    status: None,
                    detail: None,
                    body: Vec::new(),
                });
                return Ok(0);
            }
            other => {
                return payload_error(builder, format!("Invalid control message {:?}", other));
            }
        };

        if payload.len() < SERVICE_ID_SIZE {
            return payload_error(
                builder,
                format!("Control message with insufficient buffer length of {}", payload.len()),
            );
        }
        let service_id = read_u32(payload, builder.big_endian());

        let (message, length) = match kind {
            ControlKind::Request => self.decode_request(service_id, payload, builder)?,
            _ => self.decode_response(service_id, payload, builder)?,
        };
        builder.set_control_message(message);
        Ok(length)
    }
}
