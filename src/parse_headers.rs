
use crate::error::Error;
use crate::message::canonical_header_name;

/// RFC 2046 limits boundaries to 70 characters.
pub const MAX_BOUNDARY_LENGTH: usize = 70;

/// Fields a sender must not put in a trailer section.
const DISALLOWED_TRAILERS: &[&str] = &[
    "Transfer-Encoding",
    "Content-Length",
    "Host",
    "Cache-Control",
    "Max-Forwards",
    "Authorization",
    "Set-Cookie",
    "Content-Encoding",
    "Content-Type",
    "Content-Range",
    "Trailer",
];

/// How the length of the payload is determined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Framing {
    ContentLength,
    Chunked,
    NotFound,
}

fn trim_ows(s: &str) -> &str {
    s.trim_matches(|c| c == ' ' || c == '\t')
}

fn list_items(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(trim_ows)
}

/// `chunked` is only valid as the final coding.
pub fn parse_transfer_encoding(value: &str) -> Result<Framing, Error> {
    let codings: Vec<&str> = list_items(value).collect();
    if codings.iter().any(|c| c.is_empty()) {
        return Err(Error::InvalidTransferEncoding)
    }

    match codings.iter().position(|c| c.eq_ignore_ascii_case("chunked")) {
        None => Ok(Framing::NotFound),
        Some(i) if i == codings.len() - 1 => Ok(Framing::Chunked),
        Some(_) => Err(Error::InvalidTransferEncoding),
    }
}

/// Removes the final `chunked` coding, `None` if nothing is left.
pub fn strip_chunked(value: &str) -> Option<String> {
    let mut codings: Vec<&str> = list_items(value).collect();
    if codings.last().map_or(false, |c| c.eq_ignore_ascii_case("chunked")) {
        codings.pop();
    }
    if codings.is_empty() {
        None
    } else {
        Some(codings.join(", "))
    }
}

/// A repeated `Content-Length` (`5, 5`) is accepted only if every value is
/// the same.
pub fn parse_content_length(value: &str) -> Result<u64, Error> {
    let mut values = list_items(value);
    let first = values.next().unwrap_or("");
    if values.any(|v| v != first) {
        return Err(Error::MultipleContentLengths)
    }

    // Necessary because things like `+123` successfully parse below
    // and are forbidden by RFC 7230
    if first.is_empty() || !first.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidContentLength)
    }

    first.parse::<u64>().map_err(|_| Error::InvalidContentLength)
}

fn is_multipart(media_type: &str) -> bool {
    let prefix = "multipart/";
    media_type
        .get(..prefix.len())
        .map_or(false, |p| p.eq_ignore_ascii_case(prefix))
}

/// Returns the delimiter line (`"--" + boundary`) of a `multipart/*`
/// content type, `None` for any other content type.
pub fn multipart_delimiter(content_type: &str) -> Result<Option<String>, Error> {
    let mut params = content_type.split(';');
    let media_type = trim_ows(params.next().unwrap_or(""));
    if !is_multipart(media_type) {
        return Ok(None)
    }

    for param in params {
        let (name, value) = match trim_ows(param).split_once('=') {
            Some(pair) => pair,
            None => continue,
        };
        if !trim_ows(name).eq_ignore_ascii_case("boundary") {
            continue
        }

        let mut value = trim_ows(value);
        if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
            value = &value[1..value.len() - 1];
        }
        if value.len() > MAX_BOUNDARY_LENGTH {
            return Err(Error::BoundaryTooLong)
        }
        if value.is_empty() {
            return Err(Error::InvalidBoundary)
        }
        return Ok(Some(format!("--{}", value)))
    }

    Err(Error::InvalidBoundary)
}

/// Checks the field names listed by a `Trailer` header.
pub fn check_trailer_declaration(trailer: &str) -> Result<(), Error> {
    let disallowed = list_items(trailer)
        .any(|name| DISALLOWED_TRAILERS.iter().any(|d| d.eq_ignore_ascii_case(name)));
    if disallowed {
        Err(Error::DisallowedTrailer)
    } else {
        Ok(())
    }
}

pub fn is_declared_trailer(trailer: &str, name: &str) -> bool {
    let name = canonical_header_name(name);
    list_items(trailer)
        .filter(|declared| !declared.is_empty())
        .any(|declared| canonical_header_name(declared) == name)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_encoding() {
        assert_eq!(parse_transfer_encoding("chunked").unwrap(), Framing::Chunked);
        assert_eq!(parse_transfer_encoding("gzip, chunked").unwrap(), Framing::Chunked);
        assert_eq!(parse_transfer_encoding("gzip,chunked").unwrap(), Framing::Chunked);
        assert_eq!(parse_transfer_encoding("Chunked").unwrap(), Framing::Chunked);
        assert_eq!(parse_transfer_encoding("gzip").unwrap(), Framing::NotFound);

        let invalid = [
            "chunked, gzip",
            "chunked, chunked",
            "",
            "gzip, , chunked",
        ];
        for te in invalid.iter() {
            assert_eq!(parse_transfer_encoding(te).unwrap_err(), Error::InvalidTransferEncoding);
        }
    }

    #[test]
    fn stripping_chunked() {
        assert_eq!(strip_chunked("chunked"), None);
        assert_eq!(strip_chunked("gzip, chunked").as_deref(), Some("gzip"));
        assert_eq!(strip_chunked("deflate,gzip,chunked").as_deref(), Some("deflate, gzip"));
    }

    #[test]
    fn content_length() {
        assert_eq!(parse_content_length("5").unwrap(), 5);
        assert_eq!(parse_content_length("0").unwrap(), 0);
        assert_eq!(parse_content_length("5, 5").unwrap(), 5);
        assert_eq!(parse_content_length("5,5 ,  5").unwrap(), 5);

        assert_eq!(parse_content_length("5, 6").unwrap_err(), Error::MultipleContentLengths);
        assert_eq!(parse_content_length("+2").unwrap_err(), Error::InvalidContentLength);
        assert_eq!(parse_content_length("-1").unwrap_err(), Error::InvalidContentLength);
        assert_eq!(parse_content_length("").unwrap_err(), Error::InvalidContentLength);
        assert_eq!(parse_content_length("0x10").unwrap_err(), Error::InvalidContentLength);
        assert_eq!(
            parse_content_length("99999999999999999999").unwrap_err(),
            Error::InvalidContentLength
        );
    }

    #[test]
    fn multipart_boundaries() {
        assert_eq!(multipart_delimiter("text/plain").unwrap(), None);
        assert_eq!(multipart_delimiter("application/json; charset=utf-8").unwrap(), None);
        assert_eq!(
            multipart_delimiter("multipart/form-data; boundary=abc123").unwrap().as_deref(),
            Some("--abc123")
        );
        assert_eq!(
            multipart_delimiter("Multipart/Mixed;charset=utf-8;Boundary=\"a b\"").unwrap().as_deref(),
            Some("--a b")
        );

        let longest = format!("multipart/form-data; boundary={}", "x".repeat(70));
        assert!(multipart_delimiter(&longest).unwrap().is_some());
        let too_long = format!("multipart/form-data; boundary={}", "x".repeat(71));
        assert_eq!(multipart_delimiter(&too_long).unwrap_err(), Error::BoundaryTooLong);

        assert_eq!(multipart_delimiter("multipart/form-data").unwrap_err(), Error::InvalidBoundary);
        assert_eq!(
            multipart_delimiter("multipart/form-data; boundary=").unwrap_err(),
            Error::InvalidBoundary
        );
    }

    #[test]
    fn trailer_declarations() {
        assert!(check_trailer_declaration("X-Checksum, Expires").is_ok());
        assert_eq!(check_trailer_declaration("Content-Length").unwrap_err(), Error::DisallowedTrailer);
        assert_eq!(
            check_trailer_declaration("X-Checksum, transfer-encoding").unwrap_err(),
            Error::DisallowedTrailer
        );
        // a name merely containing a disallowed one is fine
        assert!(check_trailer_declaration("X-Host-Checksum").is_ok());

        assert!(is_declared_trailer("X-Checksum, Expires", "x-checksum"));
        assert!(is_declared_trailer("X-Checksum, Expires", "EXPIRES"));
        assert!(!is_declared_trailer("X-Checksum", "X-Check"));
        assert!(!is_declared_trailer("", "X-Check"));
    }
}
