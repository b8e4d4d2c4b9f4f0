use std::collections::BTreeMap;

use http::{
    Method,
    Request,
    Uri,
    Version,
    header::{
        HeaderName,
        HeaderValue,
    },
};

use crate::error::Error;

/// Canonical storage form of a header name: `Content-Length` becomes
/// `CONTENT_LENGTH`.
pub fn canonical_header_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == '-' { '_' } else { c.to_ascii_uppercase() })
        .collect()
}

/// Header fields keyed by canonical name.
///
/// A repeated field is combined with the earlier one into a single
/// comma-separated value, in order of arrival.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderFields {
    fields: BTreeMap<String, String>,
}

impl HeaderFields {
    pub fn set(&mut self, name: &str, value: &str) {
        let name = canonical_header_name(name);
        match self.fields.get_mut(&name) {
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            None => {
                self.fields.insert(name, value.to_owned());
            }
        }
    }

    pub fn update(&mut self, name: &str, value: &str) {
        self.fields.insert(canonical_header_name(name), value.to_owned());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.fields.remove(&canonical_header_name(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(&canonical_header_name(name))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(&canonical_header_name(name)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// One part of a `multipart/*` body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Part {
    pub headers: HeaderFields,
    pub content: Vec<u8>,
}

/// A request as produced by the parser.
///
/// This is plain data: all validation happens in the parser, so the
/// response layer can use it as is.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestMessage {
    method: Method,
    target: String,
    uri: Uri,
    version: Version,
    headers: HeaderFields,
    body: Vec<u8>,
    parts: Vec<Part>,
}

impl Default for RequestMessage {
    fn default() -> Self {
        Self {
            method: Method::GET,
            target: String::new(),
            uri: Uri::default(),
            version: Version::HTTP_11,
            headers: HeaderFields::default(),
            body: Vec::new(),
            parts: Vec::new(),
        }
    }
}

impl RequestMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// The request target exactly as it appeared on the request line.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn set_target(&mut self, target: String, uri: Uri) {
        self.target = target;
        self.uri = uri;
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    pub fn headers(&self) -> &HeaderFields {
        &self.headers
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.set(name, value)
    }

    pub fn update_header(&mut self, name: &str, value: &str) {
        self.headers.update(name, value)
    }

    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        self.headers.remove(name)
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains(name)
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The payload. For chunked requests this is the decoded payload.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn append_body(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes)
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn push_part(&mut self, part: Part) {
        self.parts.push(part)
    }

    /// Converts into an `http::Request`, restoring wire header names
    /// (`CONTENT_LENGTH` becomes `content-length`).
    pub fn into_http(self) -> Result<Request<Vec<u8>>, Error> {
        let mut builder = Request::builder()
            .method(self.method)
            .uri(self.uri)
            .version(self.version);

        for (name, value) in self.headers.iter() {
            let wire_name = name.replace('_', "-").to_ascii_lowercase();
            let name = HeaderName::from_bytes(wire_name.as_bytes()).map_err(|_| Error::InvalidHeader)?;
            let value = HeaderValue::from_str(value).map_err(|_| Error::InvalidHeader)?;
            builder = builder.header(name, value);
        }

        builder.body(self.body).map_err(|_| Error::InvalidHeader)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_names_are_case_insensitive() {
        let mut request = RequestMessage::new();
        request.set_header("Content-Length", "5");

        assert!(request.has_header("content-length"));
        assert!(request.has_header("CONTENT-LENGTH"));
        assert!(request.has_header("CONTENT_LENGTH"));
        assert_eq!(request.header_value("content-length"), Some("5"));

        request.update_header("CONTENT-LENGTH", "9");
        assert_eq!(request.headers().len(), 1);
        assert_eq!(request.header_value("Content-Length"), Some("9"));
        assert_eq!(request.headers().iter().next(), Some(("CONTENT_LENGTH", "9")));
    }

    #[test]
    fn repeated_fields_are_combined() {
        let mut request = RequestMessage::new();
        request.set_header("Accept", "text/html");
        request.set_header("accept", "image/webp");
        assert_eq!(request.header_value("ACCEPT"), Some("text/html, image/webp"));

        assert_eq!(request.remove_header("Accept").as_deref(), Some("text/html, image/webp"));
        assert!(!request.has_header("accept"));
        assert!(request.headers().is_empty());
    }

    #[test]
    fn converts_to_http_request() {
        let mut request = RequestMessage::new();
        request.set_method(Method::POST);
        request.set_target("/upload?x=1".to_owned(), Uri::from_static("/upload?x=1"));
        request.set_version(Version::HTTP_10);
        request.set_header("Content-Type", "text/plain");
        request.set_header("X-Request-Id", "abc");
        request.append_body(b"hi");

        let req = request.into_http().unwrap();
        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.uri().path(), "/upload");
        assert_eq!(req.uri().query(), Some("x=1"));
        assert_eq!(req.version(), Version::HTTP_10);
        assert_eq!(req.headers().get("content-type").unwrap(), "text/plain");
        assert_eq!(req.headers().get("x-request-id").unwrap(), "abc");
        assert_eq!(req.body(), b"hi");
    }
}
