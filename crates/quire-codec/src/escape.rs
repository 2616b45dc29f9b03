//! Reversible escaping of arbitrary strings into path-safe segments.

/// Encodes arbitrary strings into the `[0-9A-Za-z_-]` character set and back.
///
/// Characters outside the safe set (and the escape symbol itself) are emitted
/// as one escape unit per UTF-8 byte: the escape symbol followed by two
/// uppercase hex digits. The decoder reassembles consecutive units into the
/// original characters, so `decode(encode(s)) == s` for every string, and
/// `encode` leaves already-safe strings untouched.
///
/// Encoders are explicitly constructed and immutable; there is no shared
/// default instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathEncoder {
    escape_symbol: char,
}

impl Default for PathEncoder {
    fn default() -> Self {
        Self::new('_')
    }
}

impl PathEncoder {
    pub fn new(escape_symbol: char) -> Self {
        Self { escape_symbol }
    }

    pub fn escape_symbol(&self) -> char {
        self.escape_symbol
    }

    /// A character passes through unescaped iff it is ASCII alphanumeric,
    /// `-`, or `_`, and is not the escape symbol itself.
    fn is_safe(&self, c: char) -> bool {
        c != self.escape_symbol && (c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    pub fn encode(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut utf8 = [0u8; 4];
        for c in input.chars() {
            if self.is_safe(c) {
                out.push(c);
            } else {
                for byte in c.encode_utf8(&mut utf8).as_bytes() {
                    out.push(self.escape_symbol);
                    out.push_str(&format!("{byte:02X}"));
                }
            }
        }
        out
    }

    /// Decode an escaped string.
    ///
    /// The decoder is permissive: a trailing escape with fewer than two hex
    /// characters left, or an escape followed by non-hex characters, is
    /// silently dropped rather than reported.
    pub fn decode(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut pending: Vec<u8> = Vec::new();
        let chars: Vec<char> = input.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c == self.escape_symbol {
                if i + 3 > chars.len() {
                    // incomplete trailing escape: dropped
                    break;
                }
                let hex: String = chars[i + 1..i + 3].iter().collect();
                if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                    pending.push(byte);
                }
                i += 3;
            } else {
                flush(&mut pending, &mut out);
                out.push(c);
                i += 1;
            }
        }
        flush(&mut pending, &mut out);
        out
    }
}

fn flush(pending: &mut Vec<u8>, out: &mut String) {
    if pending.is_empty() {
        return;
    }
    out.push_str(&String::from_utf8_lossy(pending));
    pending.clear();
}
