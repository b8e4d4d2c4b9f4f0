
use std::io;

use http::StatusCode;

/// Errors that can be raised while parsing a request.
///
/// Every variant maps to the HTTP status the response layer should answer
/// with, see [`Error::status`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    IO(io::Error),
    #[error("unexpected end of request")]
    UnexpectedEof,
    #[error("malformed request line")]
    InvalidRequestLine,
    #[error("unknown request method")]
    UnknownMethod,
    #[error("request method not implemented")]
    MethodNotImplemented,
    #[error("request target too long")]
    RequestTargetTooLong,
    #[error("invalid request target")]
    InvalidRequestTarget,
    #[error("malformed HTTP version")]
    InvalidVersion,
    #[error("unsupported HTTP version")]
    UnsupportedVersion,
    #[error("malformed header field")]
    InvalidHeader,
    #[error("too many header fields")]
    TooManyHeaders,
    #[error("invalid content length")]
    InvalidContentLength,
    #[error("conflicting content lengths")]
    MultipleContentLengths,
    #[error("invalid transfer encoding")]
    InvalidTransferEncoding,
    #[error("length required")]
    LengthRequired,
    #[error("content too large")]
    ContentTooLarge,
    #[error("request exceeds the maximum request size")]
    RequestTooLarge,
    #[error("payload longer than its declared length")]
    PayloadOverrun,
    #[error("invalid chunk size")]
    InvalidChunkSize,
    #[error("chunk too large")]
    ChunkTooLarge,
    #[error("expected CRLF after chunk data")]
    InvalidChunkTerminator,
    #[error("disallowed field declared as trailer")]
    DisallowedTrailer,
    #[error("invalid multipart boundary")]
    InvalidBoundary,
    #[error("multipart boundary too long")]
    BoundaryTooLong,
    #[error("multipart body ended before its closing delimiter")]
    UnterminatedMultipart,
}

impl Error {
    pub fn from_io(io_error: io::Error) -> Error {
        if io_error.kind() == io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEof
        } else {
            Error::IO(io_error)
        }
    }

    /// The status code of the error response for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::LengthRequired => StatusCode::LENGTH_REQUIRED,
            Error::ContentTooLarge | Error::RequestTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Error::RequestTargetTooLong => StatusCode::URI_TOO_LONG,
            Error::TooManyHeaders => StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
            Error::MethodNotImplemented => StatusCode::NOT_IMPLEMENTED,
            Error::UnsupportedVersion => StatusCode::HTTP_VERSION_NOT_SUPPORTED,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl PartialEq<Error> for Error {
    fn eq(&self, other: &Error) -> bool {
        macro_rules! d {
            ($n:ident) => {(Error::$n, Error::$n)};
        }

        match (self, other) {
            (Error::IO(io_e0), Error::IO(io_e1)) => io_e0.kind() == io_e1.kind(),

            d!(UnexpectedEof) => true,
            d!(InvalidRequestLine) => true,
            d!(UnknownMethod) => true,
            d!(MethodNotImplemented) => true,
            d!(RequestTargetTooLong) => true,
            d!(InvalidRequestTarget) => true,
            d!(InvalidVersion) => true,
            d!(UnsupportedVersion) => true,
            d!(InvalidHeader) => true,
            d!(TooManyHeaders) => true,
            d!(InvalidContentLength) => true,
            d!(MultipleContentLengths) => true,
            d!(InvalidTransferEncoding) => true,
            d!(LengthRequired) => true,
            d!(ContentTooLarge) => true,
            d!(RequestTooLarge) => true,
            d!(PayloadOverrun) => true,
            d!(InvalidChunkSize) => true,
            d!(ChunkTooLarge) => true,
            d!(InvalidChunkTerminator) => true,
            d!(DisallowedTrailer) => true,
            d!(InvalidBoundary) => true,
            d!(BoundaryTooLong) => true,
            d!(UnterminatedMultipart) => true,

            (_, _) => false,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_taxonomy() {
        assert_eq!(Error::InvalidRequestLine.status(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::UnknownMethod.status(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::MethodNotImplemented.status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(Error::LengthRequired.status(), StatusCode::LENGTH_REQUIRED);
        assert_eq!(Error::ContentTooLarge.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(Error::RequestTooLarge.status().as_u16(), 413);
        assert_eq!(Error::ChunkTooLarge.status(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::RequestTargetTooLong.status().as_u16(), 414);
        assert_eq!(Error::TooManyHeaders.status().as_u16(), 431);
        assert_eq!(Error::UnsupportedVersion.status().as_u16(), 505);
        assert_eq!(Error::UnexpectedEof.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn eof_is_a_syntax_error() {
        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        assert_eq!(Error::from_io(eof), Error::UnexpectedEof);

        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        match Error::from_io(reset) {
            Error::IO(e) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
            _ => panic!(),
        }
    }

    #[test]
    fn equality_compares_variants_and_io_kinds() {
        assert_eq!(Error::BoundaryTooLong, Error::BoundaryTooLong);
        assert_ne!(Error::BoundaryTooLong, Error::InvalidBoundary);
        assert_eq!(
            Error::IO(io::Error::new(io::ErrorKind::BrokenPipe, "a")),
            Error::IO(io::Error::new(io::ErrorKind::BrokenPipe, "b"))
        );
    }
}
