use http::{Method, Uri};

use crate::Config;
use crate::error::Error;

/// Parses a request target, as found on the request line, into a `Uri`.
///
/// The form of the target has to fit the method (see section 5.3 of
/// RFC 7230): the asterisk form is only allowed with `OPTIONS` and the
/// authority form only with `CONNECT`.
pub fn parse_request_target(target: &[u8], method: &Method, config: &Config) -> Result<Uri, Error> {
    if target.len() > config.max_request_target_length {
        return Err(Error::RequestTargetTooLong)
    }
    if !target.is_ascii() {
        return Err(Error::InvalidRequestTarget)
    }

    let uri = Uri::try_from(target).map_err(|_| Error::InvalidRequestTarget)?;

    if target == b"*" {
        return if *method == Method::OPTIONS { Ok(uri) } else { Err(Error::InvalidRequestTarget) }
    }

    if target.first() == Some(&b'/') || uri.scheme().is_some() {
        return Ok(uri)
    }

    if *method == Method::CONNECT && uri.authority().is_some() {
        return Ok(uri)
    }

    Err(Error::InvalidRequestTarget)
}


#[cfg(test)]
mod tests {
    use super::*;

    const C: &Config = &Config::DEFAULT;

    #[test]
    fn origin_form() {
        let uri = parse_request_target(b"/index.html?lang=fr", &Method::GET, C).unwrap();
        assert_eq!(uri.path(), "/index.html");
        assert_eq!(uri.query(), Some("lang=fr"));
        assert!(uri.authority().is_none());
    }

    #[test]
    fn absolute_form() {
        let uri = parse_request_target(b"http://example.com:8080/a/b", &Method::GET, C).unwrap();
        assert_eq!(uri.host(), Some("example.com"));
        assert_eq!(uri.port_u16(), Some(8080));
        assert_eq!(uri.path(), "/a/b");
    }

    #[test]
    fn asterisk_and_authority_forms_depend_on_method() {
        assert!(parse_request_target(b"*", &Method::OPTIONS, C).is_ok());
        assert_eq!(
            parse_request_target(b"*", &Method::GET, C).unwrap_err(),
            Error::InvalidRequestTarget
        );

        let uri = parse_request_target(b"example.com:443", &Method::CONNECT, C).unwrap();
        assert_eq!(uri.host(), Some("example.com"));
        assert_eq!(
            parse_request_target(b"example.com:443", &Method::GET, C).unwrap_err(),
            Error::InvalidRequestTarget
        );
    }

    #[test]
    fn rejects_invalid_targets() {
        assert_eq!(
            parse_request_target("/café".as_bytes(), &Method::GET, C).unwrap_err(),
            Error::InvalidRequestTarget
        );
        assert_eq!(
            parse_request_target(b"/a b", &Method::GET, C).unwrap_err(),
            Error::InvalidRequestTarget
        );

        let long = format!("/{}", "a".repeat(C.max_request_target_length));
        assert_eq!(
            parse_request_target(long.as_bytes(), &Method::GET, C).unwrap_err(),
            Error::RequestTargetTooLong
        );
    }
}
