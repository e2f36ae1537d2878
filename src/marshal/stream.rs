//! Marshalling streams.
//!
//! A stream starts with a one-byte version header, followed by any mix of
//! marshalled values and raw bytes (packed counts, terminators). Values are
//! encoded with bincode under a size limit so a corrupt length prefix cannot
//! trigger an unbounded allocation.

use std::io::{Cursor, ErrorKind};

use bincode::Options;
use bytes::{Buf, Bytes};

use crate::error::ProtocolError;
use crate::marshal::packed::{read_packed, write_packed};
use crate::marshal::Value;

/// Stream format version spoken by protocol version one.
pub const STREAM_VERSION: u8 = 2;

/// Upper bound on a single marshalled value.
pub const DEFAULT_MAX_VALUE_BYTES: u64 = 8 * 1024 * 1024;

/// Fixed marshalling configuration shared by every codec in the process.
#[derive(Debug, Clone, Copy)]
pub struct MarshallingConfig {
    pub version: u8,
    pub max_value_bytes: u64,
}

impl Default for MarshallingConfig {
    fn default() -> Self {
        Self {
            version: STREAM_VERSION,
            max_value_bytes: DEFAULT_MAX_VALUE_BYTES,
        }
    }
}

impl MarshallingConfig {
    pub fn with_max_value_bytes(max_value_bytes: u64) -> Self {
        Self {
            max_value_bytes,
            ..Self::default()
        }
    }

    fn options(&self) -> impl Options {
        bincode::DefaultOptions::new().with_limit(self.max_value_bytes)
    }

    pub fn marshaller(&self) -> Marshaller {
        Marshaller::start(*self)
    }

    pub fn unmarshaller<'a>(&self, bytes: &'a [u8]) -> Result<Unmarshaller<'a>, ProtocolError> {
        Unmarshaller::start(*self, bytes)
    }

    /// Marshal a single value into a complete stream.
    pub fn serialize(&self, value: &Value) -> Result<Bytes, ProtocolError> {
        let mut marshaller = self.marshaller();
        marshaller.write_value(value)?;
        Ok(marshaller.finish())
    }

    /// Read exactly `arity` values from a complete stream.
    pub fn deserialize(&self, bytes: &[u8], arity: usize) -> Result<Vec<Value>, ProtocolError> {
        let mut unmarshaller = self.unmarshaller(bytes)?;
        let mut values = Vec::with_capacity(arity.min(64));
        for _ in 0..arity {
            values.push(unmarshaller.read_value()?);
        }
        unmarshaller.finish()?;
        Ok(values)
    }
}

/// Writes a marshalling stream into an in-memory buffer.
#[derive(Debug)]
pub struct Marshaller {
    config: MarshallingConfig,
    buf: Vec<u8>,
}

impl Marshaller {
    fn start(config: MarshallingConfig) -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.push(config.version);
        Self { config, buf }
    }

    pub fn write_value(&mut self, value: &Value) -> Result<(), ProtocolError> {
        self.config
            .options()
            .serialize_into(&mut self.buf, value)
            .map_err(|e| ProtocolError::CorruptPayload(format!("cannot marshal value: {}", e)))
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    pub fn write_packed(&mut self, value: u32) {
        write_packed(&mut self.buf, value);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Bytes {
        Bytes::from(self.buf)
    }
}

/// Reads a marshalling stream from a fully buffered body.
#[derive(Debug)]
pub struct Unmarshaller<'a> {
    config: MarshallingConfig,
    cursor: Cursor<&'a [u8]>,
}

impl<'a> Unmarshaller<'a> {
    fn start(config: MarshallingConfig, bytes: &'a [u8]) -> Result<Self, ProtocolError> {
        let mut cursor = Cursor::new(bytes);
        if !cursor.has_remaining() {
            return Err(ProtocolError::TruncatedBody);
        }
        let version = cursor.get_u8();
        if version != config.version {
            return Err(ProtocolError::CorruptPayload(format!(
                "unsupported stream version {} (expected {})",
                version, config.version
            )));
        }
        Ok(Self { config, cursor })
    }

    pub fn read_value(&mut self) -> Result<Value, ProtocolError> {
        self.config
            .options()
            .deserialize_from(&mut self.cursor)
            .map_err(map_decode_error)
    }

    pub fn read_byte(&mut self) -> Result<u8, ProtocolError> {
        if !self.cursor.has_remaining() {
            return Err(ProtocolError::TruncatedBody);
        }
        Ok(self.cursor.get_u8())
    }

    pub fn read_packed(&mut self) -> Result<u32, ProtocolError> {
        read_packed(&mut self.cursor)
    }

    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }

    /// End of stream: anything left over is an error.
    pub fn finish(self) -> Result<(), ProtocolError> {
        if self.cursor.has_remaining() {
            return Err(ProtocolError::UnexpectedTrailingData);
        }
        Ok(())
    }
}

fn map_decode_error(err: bincode::Error) -> ProtocolError {
    match *err {
        bincode::ErrorKind::Io(ref io) if io.kind() == ErrorKind::UnexpectedEof => {
            ProtocolError::TruncatedBody
        }
        other => ProtocolError::CorruptPayload(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_starts_with_version() {
        let config = MarshallingConfig::default();
        let bytes = config.serialize(&Value::from("hello")).unwrap();
        assert_eq!(bytes[0], STREAM_VERSION);
        assert_eq!(config.deserialize(&bytes, 1).unwrap(), vec![Value::from("hello")]);
    }

    #[test]
    fn test_mixed_values_and_raw_bytes() {
        let config = MarshallingConfig::default();
        let mut out = config.marshaller();
        out.write_value(&Value::Int(42)).unwrap();
        out.write_packed(300);
        out.write_value(&Value::List(vec![Value::Null, Value::from(true)])).unwrap();
        out.write_byte(0);
        let bytes = out.finish();

        let mut input = config.unmarshaller(&bytes).unwrap();
        assert_eq!(input.read_value().unwrap(), Value::Int(42));
        assert_eq!(input.read_packed().unwrap(), 300);
        assert_eq!(
            input.read_value().unwrap(),
            Value::List(vec![Value::Null, Value::Bool(true)])
        );
        assert_eq!(input.read_byte().unwrap(), 0);
        input.finish().unwrap();
    }

    #[test]
    fn test_wrong_version_is_corrupt() {
        let config = MarshallingConfig::default();
        let err = config.deserialize(&[1, 0], 1).unwrap_err();
        assert!(matches!(err, ProtocolError::CorruptPayload(_)));
    }

    #[test]
    fn test_empty_stream_is_truncated() {
        let config = MarshallingConfig::default();
        assert!(matches!(config.deserialize(&[], 0), Err(ProtocolError::TruncatedBody)));
    }

    #[test]
    fn test_short_stream_is_truncated() {
        let config = MarshallingConfig::default();
        let bytes = config.serialize(&Value::from("a longer string value")).unwrap();
        let cut = &bytes[..bytes.len() - 4];
        assert!(matches!(config.deserialize(cut, 1), Err(ProtocolError::TruncatedBody)));
        assert!(matches!(config.deserialize(&bytes, 2), Err(ProtocolError::TruncatedBody)));
    }

    #[test]
    fn test_extra_bytes_are_trailing_data() {
        let config = MarshallingConfig::default();
        let mut bytes = config.serialize(&Value::Int(1)).unwrap().to_vec();
        bytes.push(7);
        assert!(matches!(
            config.deserialize(&bytes, 1),
            Err(ProtocolError::UnexpectedTrailingData)
        ));
    }

    #[test]
    fn test_unknown_variant_is_corrupt() {
        let config = MarshallingConfig::default();
        // Variant index far beyond the Value enum.
        let bytes = [STREAM_VERSION, 0xfb, 0xff, 0x00];
        assert!(matches!(config.deserialize(&bytes, 1), Err(ProtocolError::CorruptPayload(_))));
    }

    #[test]
    fn test_size_limit_applies() {
        let config = MarshallingConfig::with_max_value_bytes(16);
        let big = Value::Bytes(vec![0u8; 64]);
        assert!(matches!(config.serialize(&big), Err(ProtocolError::CorruptPayload(_))));

        let roomy = MarshallingConfig::default().serialize(&big).unwrap();
        assert!(matches!(config.deserialize(&roomy, 1), Err(ProtocolError::CorruptPayload(_))));
    }
}
