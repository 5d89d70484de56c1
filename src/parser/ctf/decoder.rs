//! Binary stream decoding for CTF data files.
//!
//! A stream file is a sequence of packets. Each packet starts with the
//! trace packet header and the stream packet context, followed by events
//! up to `content_size` bits. Events carry a header (id and timestamp),
//! optional stream and event contexts, and the payload.

use super::bits::BitReader;
use super::metadata::{
    ByteOrder, EventClass, Metadata, StreamClass, TypeDecl,
};
use crate::parser::event::{Event, FieldValue};
use crate::utils::error::TraceError;
use log::debug;
use std::collections::BTreeMap;
use std::path::Path;

/// Magic number at the start of every packet header
pub const CTF_MAGIC: u32 = 0xC1FC_1FC1;

/// Fields decoded so far in the enclosing structures, innermost first
struct Scope<'s> {
    fields: &'s [(String, FieldValue)],
    parent: Option<&'s Scope<'s>>,
}

impl Scope<'_> {
    /// Resolve a (possibly dotted) field reference by its last component
    fn lookup(&self, path: &str) -> Option<&FieldValue> {
        let name = path.rsplit('.').next().unwrap_or(path);
        self.fields
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .or_else(|| self.parent.and_then(|p| p.lookup(path)))
    }
}

struct Decoder<'a> {
    reader: BitReader<'a>,
    meta: &'a Metadata,
    file: &'a Path,
    clock_value: u64,
    clock_name: Option<String>,
}

/// Decode every event of one stream file
pub fn decode_stream(meta: &Metadata, data: &[u8], file: &Path) -> Result<Vec<Event>, TraceError> {
    let mut decoder = Decoder {
        reader: BitReader::new(data),
        meta,
        file,
        clock_value: 0,
        clock_name: None,
    };
    let events = decoder.decode_packets()?;
    debug!("Decoded {} events from {}", events.len(), file.display());
    Ok(events)
}

impl<'a> Decoder<'a> {
    fn error(&self, message: impl Into<String>) -> TraceError {
        TraceError::Decode {
            file: self.file.to_path_buf(),
            bit_offset: self.reader.position(),
            message: message.into(),
        }
    }

    fn decode_packets(&mut self) -> Result<Vec<Event>, TraceError> {
        let total = self.reader.len_bits();
        let mut events = Vec::new();
        let mut packet_start = 0u64;

        while packet_start < total {
            self.reader.seek(packet_start);

            let header = match &self.meta.packet_header {
                Some(ty) => Some(self.decode_value(ty, None)?),
                None => None,
            };
            if let Some(magic) = header
                .as_ref()
                .and_then(|h| h.member("magic"))
                .and_then(FieldValue::as_u64)
            {
                if magic != u64::from(CTF_MAGIC) {
                    return Err(self.error(format!("bad packet magic {:#x}", magic)));
                }
            }

            let stream_id = header
                .as_ref()
                .and_then(|h| h.member("stream_id"))
                .and_then(FieldValue::as_u64)
                .unwrap_or(0);
            let stream = self.stream_class(stream_id)?;

            let packet_context = match &stream.packet_context {
                Some(ty) => Some(self.decode_value(ty, None)?),
                None => None,
            };
            let packet_field = |name: &str| {
                packet_context
                    .as_ref()
                    .and_then(|c| c.member(name))
                    .and_then(FieldValue::as_u64)
            };

            let content_size = packet_field("content_size").unwrap_or(total - packet_start);
            let packet_size = packet_field("packet_size").unwrap_or(content_size);
            if packet_size == 0 || content_size > packet_size {
                return Err(self.error(format!(
                    "invalid packet sizes (content {} bits, packet {} bits)",
                    content_size, packet_size
                )));
            }
            if let Some(begin) = packet_field("timestamp_begin") {
                self.clock_value = begin;
            }

            let content_end = (packet_start + content_size).min(total);
            let packet_fields = flatten(packet_context.as_ref());

            while self.reader.position() < content_end {
                let before = self.reader.position();
                let event = self.decode_event(&stream, &packet_fields)?;
                if self.reader.position() > content_end {
                    return Err(self.error("event runs past the end of its packet"));
                }
                events.push(event);
                if self.reader.position() == before {
                    return Err(self.error("event decoded to zero bits"));
                }
            }

            packet_start += packet_size;
        }

        Ok(events)
    }

    fn stream_class(&self, stream_id: u64) -> Result<StreamClass, TraceError> {
        match self.meta.streams.get(&stream_id) {
            Some(stream) => Ok(stream.clone()),
            // Metadata may omit the stream block entirely when there is one stream
            None if self.meta.streams.is_empty() && stream_id == 0 => Ok(StreamClass::default()),
            None => Err(self.error(format!("unknown stream id {}", stream_id))),
        }
    }

    fn decode_event(
        &mut self,
        stream: &StreamClass,
        packet_fields: &BTreeMap<String, FieldValue>,
    ) -> Result<Event, TraceError> {
        let header = match &stream.event_header {
            Some(ty) => Some(self.decode_value(ty, None)?),
            None => None,
        };
        let event_id = header
            .as_ref()
            .and_then(|h| last_integer_named(h, "id"))
            .unwrap_or(0);
        let cycles = self.clock_value;

        let stream_context = match &stream.event_context {
            Some(ty) => Some(self.decode_value(ty, None)?),
            None => None,
        };

        let meta = self.meta;
        let class: &EventClass = meta.events.get(&(stream.id, event_id)).ok_or_else(|| {
            self.error(format!(
                "unknown event id {} in stream {}",
                event_id, stream.id
            ))
        })?;

        let event_context = match &class.context {
            Some(ty) => Some(self.decode_value(ty, None)?),
            None => None,
        };
        let payload = match &class.fields {
            Some(ty) => Some(self.decode_value(ty, None)?),
            None => None,
        };

        let mut context = packet_fields.clone();
        context.extend(flatten(stream_context.as_ref()));
        context.extend(flatten(event_context.as_ref()));

        let clock = meta
            .clock(self.clock_name.as_deref())
            .cloned()
            .unwrap_or_default();

        let timestamp = clock.cycles_to_ns(cycles).ok_or_else(|| {
            self.error(format!(
                "timestamp of {} cycles on clock '{}' overflows i64 nanoseconds",
                cycles, clock.name
            ))
        })?;

        Ok(Event {
            name: class.name.clone(),
            timestamp,
            fields: flatten(payload.as_ref()),
            context,
        })
    }

    fn decode_value(
        &mut self,
        ty: &TypeDecl,
        scope: Option<&Scope<'_>>,
    ) -> Result<FieldValue, TraceError> {
        match ty {
            TypeDecl::Integer(int) => {
                self.reader.align_to(int.align);
                let order = int.byte_order.unwrap_or(self.meta.byte_order);
                let raw = self
                    .reader
                    .read_bits(int.size, order)
                    .ok_or_else(|| self.error("truncated integer"))?;
                if let Some(clock) = &int.clock {
                    self.update_clock(raw, int.size);
                    self.clock_name = Some(clock.clone());
                }
                Ok(integer_value(raw, int.size, int.signed))
            }

            TypeDecl::Float(float) => {
                self.reader.align_to(float.align);
                let order = float.byte_order.unwrap_or(self.meta.byte_order);
                let size = float.exp_dig + float.mant_dig;
                let raw = self
                    .reader
                    .read_bits(size, order)
                    .ok_or_else(|| self.error("truncated floating point value"))?;
                let value = if size == 32 {
                    f64::from(f32::from_bits(raw as u32))
                } else {
                    f64::from_bits(raw)
                };
                Ok(FieldValue::Float(value))
            }

            TypeDecl::String => self
                .reader
                .read_cstring()
                .map(FieldValue::String)
                .ok_or_else(|| self.error("unterminated string")),

            TypeDecl::Enum(en) => {
                let container = TypeDecl::Integer(en.container.clone());
                let value = self
                    .decode_value(&container, scope)?
                    .as_i64()
                    .ok_or_else(|| self.error("enum value does not fit in i64"))?;
                Ok(FieldValue::Enum {
                    label: en.label_for(value).map(str::to_string),
                    value,
                })
            }

            TypeDecl::Struct(st) => {
                self.reader.align_to(ty.alignment());
                let mut fields: Vec<(String, FieldValue)> = Vec::with_capacity(st.fields.len());
                for field in &st.fields {
                    let value = {
                        let inner = Scope {
                            fields: &fields,
                            parent: scope,
                        };
                        self.decode_value(&field.ty, Some(&inner))?
                    };
                    fields.push((field.name.clone(), value));
                }
                Ok(FieldValue::Struct(fields))
            }

            TypeDecl::Variant(variant) => {
                let tag = variant
                    .tag
                    .as_deref()
                    .ok_or_else(|| self.error("variant without a tag"))?;
                let label = scope
                    .and_then(|s| s.lookup(tag))
                    .and_then(|v| match v {
                        FieldValue::Enum { label, .. } => label.clone(),
                        _ => None,
                    })
                    .ok_or_else(|| self.error(format!("variant tag '{}' is not a known enum", tag)))?;
                let option = variant
                    .options
                    .iter()
                    .find(|o| o.name == label || o.name.strip_prefix('_') == Some(label.as_str()))
                    .ok_or_else(|| self.error(format!("variant has no option '{}'", label)))?;
                self.decode_value(&option.ty, scope)
            }

            TypeDecl::Array { element, length } => self.decode_array(element, *length, scope),

            TypeDecl::Sequence { element, length_ref } => {
                let length = scope
                    .and_then(|s| s.lookup(length_ref))
                    .and_then(FieldValue::as_u64)
                    .ok_or_else(|| {
                        self.error(format!("sequence length '{}' is not a known integer", length_ref))
                    })?;
                self.decode_array(element, length as usize, scope)
            }
        }
    }

    fn decode_array(
        &mut self,
        element: &TypeDecl,
        length: usize,
        scope: Option<&Scope<'_>>,
    ) -> Result<FieldValue, TraceError> {
        if length as u64 > self.reader.remaining_bits() {
            return Err(self.error(format!("array length {} exceeds stream size", length)));
        }

        // Character arrays are text
        if let TypeDecl::Integer(int) = element {
            if int.text && int.size == 8 {
                self.reader.align_to(int.align);
                let mut bytes = Vec::with_capacity(length);
                for _ in 0..length {
                    let b = self
                        .reader
                        .read_bits(8, ByteOrder::Little)
                        .ok_or_else(|| self.error("truncated text array"))?;
                    bytes.push(b as u8);
                }
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                return Ok(FieldValue::String(
                    String::from_utf8_lossy(&bytes[..end]).into_owned(),
                ));
            }
        }

        self.reader.align_to(element.alignment());
        let mut items = Vec::with_capacity(length);
        for _ in 0..length {
            items.push(self.decode_value(element, scope)?);
        }
        Ok(FieldValue::Array(items))
    }

    /// Fold a partial-width clock sample into the running 64-bit clock,
    /// assuming at most one wrap of the low bits between samples
    fn update_clock(&mut self, value: u64, size: u32) {
        if size >= 64 {
            self.clock_value = value;
            return;
        }
        let mask = (1u64 << size) - 1;
        let mut updated = (self.clock_value & !mask) | value;
        if value < self.clock_value & mask {
            updated = updated.wrapping_add(mask + 1);
        }
        self.clock_value = updated;
    }
}

fn integer_value(raw: u64, size: u32, signed: bool) -> FieldValue {
    if !signed {
        return FieldValue::Unsigned(raw);
    }
    if size >= 64 {
        return FieldValue::Signed(raw as i64);
    }
    let shift = 64 - size;
    FieldValue::Signed(((raw << shift) as i64) >> shift)
}

/// Top-level members of a structure, keyed without the CTF leading underscore
fn flatten(value: Option<&FieldValue>) -> BTreeMap<String, FieldValue> {
    match value {
        Some(FieldValue::Struct(fields)) => fields
            .iter()
            .map(|(name, value)| (display_name(name).to_string(), value.clone()))
            .collect(),
        _ => BTreeMap::new(),
    }
}

fn display_name(name: &str) -> &str {
    name.strip_prefix('_').unwrap_or(name)
}

/// The last integer named `name` in pre-order, so an extended header's
/// inner id overrides the enum selector that precedes it
fn last_integer_named(value: &FieldValue, name: &str) -> Option<u64> {
    let mut found = None;
    if let FieldValue::Struct(fields) = value {
        for (field_name, field_value) in fields {
            if display_name(field_name) == name {
                if let Some(v) = field_value.as_u64() {
                    found = Some(v);
                }
            }
            if let Some(v) = last_integer_named(field_value, name) {
                found = Some(v);
            }
        }
    }
    found
}
