//! OSC 1.0 packet encoding.
//!
//! Strings are NUL-terminated and padded to 4 bytes, numbers are big-endian.
//! Bundles are flattened into their contained messages on decode.

use crate::error::{OscError, Result};
use crate::value::{TypedArg, Value};

const BUNDLE_TAG: &[u8] = b"#bundle\0";

/// One OSC message: an address plus its typed arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<TypedArg>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>, args: Vec<TypedArg>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }

    /// Build a message from plain values, inferring each tag.
    pub fn from_values(address: impl Into<String>, values: &[Value]) -> Self {
        Self::new(address, values.iter().map(TypedArg::infer).collect())
    }

    /// Strip the argument tags.
    pub fn into_values(self) -> Vec<Value> {
        self.args.into_iter().map(TypedArg::into_value).collect()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        if !self.address.starts_with('/') {
            return Err(OscError::Codec(format!(
                "address must start with '/': {:?}",
                self.address
            )));
        }

        let mut buf = Vec::with_capacity(32 + self.args.len() * 8);
        write_string(&mut buf, &self.address);

        let mut tags = String::with_capacity(self.args.len() + 1);
        tags.push(',');
        tags.extend(self.args.iter().map(TypedArg::tag));
        write_string(&mut buf, &tags);

        for arg in &self.args {
            match arg {
                TypedArg::Int(i) => buf.extend_from_slice(&i.to_be_bytes()),
                TypedArg::Int64(i) => buf.extend_from_slice(&i.to_be_bytes()),
                TypedArg::Float(f) => buf.extend_from_slice(&f.to_be_bytes()),
                TypedArg::Double(d) => buf.extend_from_slice(&d.to_be_bytes()),
                TypedArg::String(s) => write_string(&mut buf, s),
                TypedArg::True | TypedArg::False | TypedArg::Nil => {}
            }
        }

        Ok(buf)
    }
}

/// Decode a UDP datagram into the messages it carries.
pub fn decode_packet(data: &[u8]) -> Result<Vec<OscMessage>> {
    let mut out = Vec::new();
    decode_into(data, &mut out)?;
    Ok(out)
}

fn decode_into(data: &[u8], out: &mut Vec<OscMessage>) -> Result<()> {
    if data.starts_with(BUNDLE_TAG) {
        let mut reader = Reader::new(data);
        reader.skip(BUNDLE_TAG.len())?;
        // timetag is ignored
        reader.skip(8)?;
        while !reader.is_empty() {
            let size = reader.read_i32()?;
            let size = usize::try_from(size)
                .map_err(|_| OscError::Codec(format!("negative bundle element size {}", size)))?;
            let element = reader.take(size)?;
            decode_into(element, out)?;
        }
        Ok(())
    } else {
        out.push(decode_message(data)?);
        Ok(())
    }
}

pub fn decode_message(data: &[u8]) -> Result<OscMessage> {
    let mut reader = Reader::new(data);
    let address = reader.read_string()?;
    if !address.starts_with('/') {
        return Err(OscError::Codec(format!("invalid OSC address {:?}", address)));
    }

    // Some senders omit the type tag string entirely for argument-less messages
    if reader.is_empty() {
        return Ok(OscMessage::new(address, Vec::new()));
    }

    let tags = reader.read_string()?;
    let tags = tags
        .strip_prefix(',')
        .ok_or_else(|| OscError::Codec(format!("type tag string missing ',': {:?}", tags)))?;

    let mut args = Vec::with_capacity(tags.len());
    for tag in tags.chars() {
        let arg = match tag {
            'i' => TypedArg::Int(reader.read_i32()?),
            'h' => TypedArg::Int64(reader.read_i64()?),
            'f' => TypedArg::Float(f32::from_bits(reader.read_u32()?)),
            'd' => TypedArg::Double(f64::from_bits(reader.read_i64()? as u64)),
            's' | 'S' => TypedArg::String(reader.read_string()?),
            'T' => TypedArg::True,
            'F' => TypedArg::False,
            'N' | 'I' => TypedArg::Nil,
            other => {
                return Err(OscError::Codec(format!(
                    "unsupported OSC type tag '{}' in {}",
                    other, address
                )))
            }
        };
        args.push(arg);
    }

    Ok(OscMessage::new(address, args))
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                OscError::Codec(format!(
                    "truncated packet: need {} bytes at offset {}, have {}",
                    len,
                    self.pos,
                    self.data.len()
                ))
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i32(&mut self) -> Result<i32> {
        self.read_u32().map(|v| v as i32)
    }

    fn read_i64(&mut self) -> Result<i64> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(i64::from_be_bytes(raw))
    }

    fn read_string(&mut self) -> Result<String> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let nul = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| OscError::Codec("unterminated OSC string".into()))?;
        let s = std::str::from_utf8(&rest[..nul])
            .map_err(|e| OscError::Codec(format!("invalid UTF-8 in OSC string: {}", e)))?
            .to_string();
        // NUL plus padding to the next 4-byte boundary
        let padded = (nul + 4) & !3;
        self.skip(padded.min(rest.len()))?;
        Ok(s)
    }
}
