
use http::{
    header::{
        self,
        HeaderValue,
        HeaderName,
    },
    HeaderMap,
    Response,
    Version,
};

use crate::character_types;
use crate::error::Error;


fn unparse_version(version: Version) -> Vec<u8> {
    let mut bytes = b"HTTP/".to_vec();
    bytes.extend(
        match version {
            Version::HTTP_10 => b"1.0",
            // the parser only ever produces 1.0 and 1.1
            _ => b"1.1",
        }
    );
    bytes
}

// Doesn’t unparse the trailing CRLF
fn unparse_header_field(name: &HeaderName, value: &HeaderValue) -> Vec<u8> {
    debug_assert!(character_types::is_token(name.as_str().as_bytes()));
    let mut v = name.as_str().as_bytes().to_vec();
    v.extend(b": ");
    v.extend(value.as_bytes());
    v
}

fn unparse_headers(headers: &HeaderMap) -> Vec<u8> {
    let mut v: Vec<u8> = Vec::new();
    for (name, value) in headers.iter() {
        v.extend(unparse_header_field(name, value));
        v.extend(b"\r\n")
    }
    v
}

/// Serializes a status line and headers.
pub fn unparse_response_head<B>(response: &Response<B>) -> Vec<u8> {
    let mut v = unparse_version(response.version());
    v.extend(b" ");
    v.extend(response.status().as_str().as_bytes());
    if let Some(reason) = response.status().canonical_reason() {
        v.extend(b" ");
        v.extend(reason.as_bytes());
    }
    v.extend(b"\r\n");
    v.extend(unparse_headers(response.headers()));
    v.extend(b"\r\n");
    v
}

/// Serializes a whole response into a byte array.
///
/// The body is written as is, framing is up to the headers.
pub fn unparse_response_sync(response: &Response<Vec<u8>>) -> Vec<u8> {
    let mut v = unparse_response_head(response);
    v.extend(response.body());
    v
}

/// Builds the response for a rejected request.
///
/// The connection is always closed afterwards: once a request failed to
/// parse, nothing tells where the next one starts.
pub fn error_response(error: &Error) -> Response<Vec<u8>> {
    let status = error.status();
    let body = format!(
        "{} {}\n",
        status.as_str(),
        status.canonical_reason().unwrap_or("Error"),
    ).into_bytes();

    let content_length = HeaderValue::from(body.len());
    let mut response = Response::new(body);
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    headers.insert(header::CONTENT_LENGTH, content_length);
    headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}


#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn status_line_and_headers() {
        let mut response = Response::new(b"hello".to_vec());
        *response.version_mut() = Version::HTTP_10;
        response.headers_mut().insert(header::CONTENT_LENGTH, HeaderValue::from(5usize));

        assert_eq!(
            unparse_response_sync(&response),
            b"HTTP/1.0 200 OK\r\ncontent-length: 5\r\n\r\nhello".to_vec()
        );
    }

    #[test]
    fn unknown_status_has_no_reason_phrase() {
        let mut response = Response::new(Vec::<u8>::new());
        *response.status_mut() = StatusCode::from_u16(599).unwrap();
        assert_eq!(unparse_response_head(&response), b"HTTP/1.1 599\r\n\r\n".to_vec());
    }

    #[test]
    fn error_responses() {
        let response = error_response(&Error::LengthRequired);
        assert_eq!(response.status(), StatusCode::LENGTH_REQUIRED);
        assert_eq!(response.body(), b"411 Length Required\n");

        let bytes = unparse_response_sync(&response);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 411 Length Required\r\n"));
        assert!(text.contains("\r\nconnection: close\r\n"));
        assert!(text.contains("\r\ncontent-length: 20\r\n"));
        assert!(text.ends_with("\r\n\r\n411 Length Required\n"));

        let response = error_response(&Error::MethodNotImplemented);
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(response.body(), b"501 Not Implemented\n");

        let response = error_response(&Error::InvalidHeader);
        assert_eq!(response.body(), b"400 Bad Request\n");
    }
}
