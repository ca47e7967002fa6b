//! ELM327 protocol helpers for OBD2 communication
//!
//! This library provides the pieces of the ELM327 text protocol that the
//! poller and the mock adapter share: request formatting, response-token
//! location and PID decoding.
//!
//! Adapters answer a mode 01 request `010C` with `41 0C A B` (or the
//! compact `410CAB` when spaces are disabled), followed by the `>` prompt.

/// End-of-reply prompt byte sent by the adapter after every response.
pub const PROMPT: u8 = b'>';

/// Mode 01 - show current data.
pub const MODE_CURRENT_DATA: u8 = 0x01;

/// PID 0C - engine RPM.
pub const PID_ENGINE_RPM: u8 = 0x0C;

/// Build the ASCII request for a mode/PID pair, e.g. `(0x01, 0x0C)` -> `"010C"`.
///
/// The carriage-return terminator is added by the transport, not here.
#[must_use]
pub fn pid_request(mode: u8, pid: u8) -> String {
    format!("{mode:02X}{pid:02X}")
}

/// Locate the response token for a mode/PID pair and return up to
/// `max_bytes` data bytes following it.
///
/// Accepts both byte-separated (`41 0C 0B B8`) and concatenated (`410C0BB8`)
/// representations, case-insensitive. Returns `None` when the token is
/// absent or fewer than `max_bytes` data bytes follow it.
#[must_use]
pub fn pid_payload(text: &str, mode: u8, pid: u8, max_bytes: usize) -> Option<Vec<u8>> {
    let upper = text.to_ascii_uppercase();
    // Mode byte in the response is the request mode + 0x40
    let spaced = format!("{:02X} {pid:02X}", mode + 0x40);
    let compact = format!("{:02X}{pid:02X}", mode + 0x40);

    let after = if let Some(pos) = upper.find(&spaced) {
        &upper[pos + spaced.len()..]
    } else if let Some(pos) = upper.find(&compact) {
        &upper[pos + compact.len()..]
    } else {
        return None;
    };

    let hex: String = after
        .chars()
        .filter(char::is_ascii_hexdigit)
        .take(max_bytes * 2)
        .collect();
    if hex.len() < max_bytes * 2 {
        return None;
    }

    let mut bytes = Vec::with_capacity(max_bytes);
    for i in 0..max_bytes {
        // take() above guarantees pure hex digit pairs
        bytes.push(u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?);
    }
    Some(bytes)
}

/// Decode engine RPM from a raw adapter reply.
///
/// Looks for the `41 0C` (or `410C`) token and applies the PID 0C formula
/// `((A << 8) | B) / 4`. Returns `None` when the token is absent or
/// malformed; never panics on garbage input.
#[must_use]
pub fn decode_rpm(reply: &[u8]) -> Option<u32> {
    let text = String::from_utf8_lossy(reply);
    let bytes = pid_payload(&text, MODE_CURRENT_DATA, PID_ENGINE_RPM, 2)?;
    let a = u32::from(bytes[0]);
    let b = u32::from(bytes[1]);
    Some(((a << 8) | b) / 4)
}

/// Encode an RPM value as the two data bytes of a PID 0C response.
#[must_use]
pub fn encode_rpm(rpm: u32) -> [u8; 2] {
    let raw = (rpm * 4).min(0xFFFF);
    [(raw >> 8) as u8, (raw & 0xFF) as u8]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_request() {
        assert_eq!(pid_request(MODE_CURRENT_DATA, PID_ENGINE_RPM), "010C");
        assert_eq!(pid_request(0x01, 0x0D), "010D");
    }

    #[test]
    fn test_decode_rpm_spaced() {
        assert_eq!(decode_rpm(b"41 0C 0B B8"), Some(750));
        assert_eq!(decode_rpm(b"41 0C 1A F8\r\r"), Some(1726));
    }

    #[test]
    fn test_decode_rpm_compact() {
        assert_eq!(decode_rpm(b"410C0BB8"), Some(750));
        assert_eq!(decode_rpm(b"410C1AF8\r\r"), Some(1726));
    }

    #[test]
    fn test_decode_rpm_case_insensitive() {
        assert_eq!(decode_rpm(b"41 0c 0b b8"), Some(750));
    }

    #[test]
    fn test_decode_rpm_with_echo_and_noise() {
        // Echo of the request plus headers around the token
        assert_eq!(decode_rpm(b"010C\r41 0C 0B B8\r\r"), Some(750));
    }

    #[test]
    fn test_decode_rpm_absent_or_malformed() {
        assert_eq!(decode_rpm(b"41 0D 28\r\r"), None);
        assert_eq!(decode_rpm(b"NO DATA\r\r"), None);
        assert_eq!(decode_rpm(b""), None);
        // Token present but truncated payload
        assert_eq!(decode_rpm(b"41 0C 0B"), None);
        // Not valid UTF-8 around the token must not panic
        assert_eq!(decode_rpm(&[0xFF, 0xFE, b'4', b'1']), None);
    }

    #[test]
    fn test_encode_rpm_round_trip() {
        let [a, b] = encode_rpm(750);
        let reply = format!("41 0C {a:02X} {b:02X}");
        assert_eq!(decode_rpm(reply.as_bytes()), Some(750));
    }
}
