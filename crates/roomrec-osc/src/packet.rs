//! Just enough OSC 1.0 to read string-argument messages.
//!
//! An OSC message is a null-terminated, 4-byte-padded address pattern,
//! followed by a type tag string (`,` then one tag per argument, same
//! padding), followed by the arguments. We only accept string (`s`)
//! arguments; a message with any other tag is dropped rather than
//! partially decoded.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<String>,
}

/// Decode a single OSC message from one UDP datagram.
///
/// Returns `None` for anything malformed or unsupported; the listener
/// treats such datagrams as noise, not errors.
pub fn decode_message(buf: &[u8]) -> Option<OscMessage> {
    let mut cursor = 0;

    let address = read_padded_str(buf, &mut cursor)?;
    if !address.starts_with('/') {
        return None;
    }

    let tags = read_padded_str(buf, &mut cursor)?;
    let tags = tags.strip_prefix(',')?;

    let mut args = Vec::with_capacity(tags.len());
    for tag in tags.chars() {
        if tag != 's' {
            return None;
        }
        args.push(read_padded_str(buf, &mut cursor)?.to_string());
    }

    Some(OscMessage {
        address: address.to_string(),
        args,
    })
}

/// Read a null-terminated string and advance past its 4-byte padding.
fn read_padded_str<'a>(buf: &'a [u8], cursor: &mut usize) -> Option<&'a str> {
    let rest = buf.get(*cursor..)?;
    let nul = rest.iter().position(|&b| b == 0)?;
    let s = std::str::from_utf8(&rest[..nul]).ok()?;
    // Strings occupy a multiple of four bytes including the terminator
    let advance = (nul / 4 + 1) * 4;
    if *cursor + advance > buf.len() {
        return None;
    }
    *cursor += advance;
    Some(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(address: &str, args: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        push_padded(&mut buf, address);
        let mut tags = String::from(",");
        for _ in args {
            tags.push('s');
        }
        push_padded(&mut buf, &tags);
        for arg in args {
            push_padded(&mut buf, arg);
        }
        buf
    }

    fn push_padded(buf: &mut Vec<u8>, s: &str) {
        buf.extend_from_slice(s.as_bytes());
        buf.push(0);
        while buf.len() % 4 != 0 {
            buf.push(0);
        }
    }

    #[test]
    fn test_decode_two_string_args() {
        let datagram = encode("/room/participant/joined", &["Alice", "usr_001"]);
        let msg = decode_message(&datagram).unwrap();
        assert_eq!(msg.address, "/room/participant/joined");
        assert_eq!(msg.args, vec!["Alice", "usr_001"]);
    }

    #[test]
    fn test_decode_single_string_arg() {
        let datagram = encode("/room/participant/left", &["usr_001"]);
        let msg = decode_message(&datagram).unwrap();
        assert_eq!(msg.args, vec!["usr_001"]);
    }

    #[test]
    fn test_decode_no_args() {
        let datagram = encode("/room/participant/joined", &[]);
        let msg = decode_message(&datagram).unwrap();
        assert!(msg.args.is_empty());
    }

    #[test]
    fn test_rejects_non_string_tags() {
        let mut buf = Vec::new();
        push_padded(&mut buf, "/room/participant/joined");
        push_padded(&mut buf, ",i");
        buf.extend_from_slice(&42i32.to_be_bytes());
        assert!(decode_message(&buf).is_none());
    }

    #[test]
    fn test_rejects_missing_type_tags() {
        let mut buf = Vec::new();
        push_padded(&mut buf, "/room/participant/joined");
        assert!(decode_message(&buf).is_none());
    }

    #[test]
    fn test_rejects_address_without_leading_slash() {
        let datagram = encode("room/participant/joined", &["Alice", "usr_001"]);
        assert!(decode_message(&datagram).is_none());
    }

    #[test]
    fn test_rejects_truncated_argument() {
        let mut datagram = encode("/room/participant/joined", &["Alice", "usr_001"]);
        datagram.truncate(datagram.len() - 4);
        assert!(decode_message(&datagram).is_none());
    }

    #[test]
    fn test_rejects_empty_datagram() {
        assert!(decode_message(&[]).is_none());
    }
}
