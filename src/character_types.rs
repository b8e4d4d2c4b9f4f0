
/// SP or HTAB
pub fn is_whitespace_byte(b: u8) -> bool {
    return b == b' ' || b == b'\t'
}

/// VCHAR
pub fn is_visible_byte(byte: u8) -> bool {
    byte >= 0x21 && byte <= 0x7e
}

pub fn is_token_byte(byte: u8) -> bool {
    b"!#$%&'*+-.^_`|~".contains(&byte) || byte.is_ascii_digit() || byte.is_ascii_alphabetic()
}

fn is_obs_text_byte(byte: u8) -> bool {
    byte >= 0x80 // and implicitly `byte <= 0xff`
}

/// Field content may carry obs-text (UTF-8 is checked later), but never
/// CR, LF or other control characters.
pub fn is_header_value_byte(byte: u8) -> bool {
    is_visible_byte(byte) || is_whitespace_byte(byte) || is_obs_text_byte(byte)
}

pub fn is_token(bytes: &[u8]) -> bool {
    !bytes.is_empty() && bytes.iter().all(|b| is_token_byte(*b))
}

pub fn trim_whitespace(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if !is_whitespace_byte(*first) {
            break
        }
        bytes = rest;
    }
    while let [rest @ .., last] = bytes {
        if !is_whitespace_byte(*last) {
            break
        }
        bytes = rest;
    }
    bytes
}
