//! Decoding of framed responses.

use crate::client::ClientError;
use crate::error::ProtocolError;
use crate::http::response::TERMINATOR;
use crate::marshal::{MarshallingConfig, Value};
use crate::protocol::ResponseKind;

/// Decode the body of a response the caller expected to be of kind `expected`.
///
/// Exception responses are returned as [`ClientError::Remote`] whatever the
/// status. Affinity responses carry no value and decode to [`Value::Null`].
pub fn decode_response(
    marshalling: &MarshallingConfig,
    expected: ResponseKind,
    status: u16,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<Value, ClientError> {
    let kind = content_type.and_then(ResponseKind::from_content_type);

    if kind == Some(ResponseKind::Exception) {
        let value = read_framed(marshalling, ResponseKind::Exception, body)?;
        return match value {
            Value::Failure(failure) => Err(ClientError::Remote { status, failure }),
            _ => Err(ClientError::UnexpectedDataInResponse),
        };
    }
    if !(200..300).contains(&status) {
        return Err(ClientError::InvalidResponseCode(status));
    }
    if kind != Some(expected) {
        return Err(ClientError::InvalidResponseType {
            expected: expected.content_type(),
            actual: content_type.map(str::to_string),
        });
    }

    if expected == ResponseKind::Affinity {
        if !body.is_empty() {
            return Err(ClientError::UnexpectedDataInResponse);
        }
        return Ok(Value::Null);
    }
    read_framed(marshalling, expected, body)
}

fn read_framed(marshalling: &MarshallingConfig, kind: ResponseKind, body: &[u8]) -> Result<Value, ClientError> {
    let mut input = marshalling.unmarshaller(body)?;
    let value = input.read_value()?;
    if kind.has_terminator() && input.read_byte()? != TERMINATOR {
        return Err(ClientError::UnexpectedDataInResponse);
    }
    input.finish().map_err(|err| match err {
        ProtocolError::UnexpectedTrailingData => ClientError::UnexpectedDataInResponse,
        other => ClientError::Protocol(other),
    })?;
    Ok(value)
}
