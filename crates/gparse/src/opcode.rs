//! Opcodes packed into a right-aligned big-endian word for fast comparison.
//!
//! Mirrors the original firmware's `bigEndianStr` trick: instead of
//! comparing `&str`s, an opcode of up to 4 ASCII characters is packed
//! MSB-first into a `u32`, right-adjusted (so `"G1"` and `"G01"` are
//! distinct words, but comparison is a single integer compare).

/// A G-code or M-code opcode, packed as a right-aligned big-endian word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opcode(u32);

impl Opcode {
    /// The empty opcode (no command present on this line).
    pub const EMPTY: Opcode = Opcode(0);

    /// Packs up to 4 uppercase ASCII bytes into an opcode word.
    ///
    /// Bytes beyond the 4th are ignored; callers are expected to have
    /// already validated the opcode length.
    pub fn pack(bytes: &[u8]) -> Opcode {
        let mut word: u32 = 0;
        for &b in bytes.iter().take(4) {
            word = (word << 8) | b as u32;
        }
        Opcode(word)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// The packed word's bytes, most-significant first (so unused
    /// leading positions read as `0`).
    fn bytes(&self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Whether this opcode's letter (its first non-zero byte) is
    /// `letter`. Used for opcode families like T-code tool select,
    /// where the numeric suffix varies per command and so can't be
    /// matched against a single constant the way `G28` can.
    pub fn is_letter(&self, letter: u8) -> bool {
        self.bytes().iter().find(|&&b| b != 0).is_some_and(|&b| b == letter)
    }

    /// The numeric suffix following this opcode's letter, e.g. `Some(3)`
    /// for the opcode packed from `"T3"`. `None` if the opcode isn't a
    /// single letter followed only by digits (or has no suffix at all).
    pub fn numeric_suffix(&self) -> Option<u32> {
        let bytes = self.bytes();
        let first = bytes.iter().position(|&b| b != 0)?;
        if !bytes[first].is_ascii_alphabetic() {
            return None;
        }
        let digits = &bytes[first + 1..];
        if digits.iter().any(|&b| !b.is_ascii_digit()) {
            return None;
        }
        let mut value: u32 = 0;
        let mut saw_digit = false;
        for &b in digits {
            value = value * 10 + (b - b'0') as u32;
            saw_digit = true;
        }
        saw_digit.then_some(value)
    }

    /// Builds an opcode from a letter and numeric code, e.g. `('G', 28)`.
    pub fn from_letter_code(letter: u8, code: u32) -> Opcode {
        let digits = code.to_string();
        let mut bytes = Vec::with_capacity(1 + digits.len());
        bytes.push(letter);
        bytes.extend_from_slice(digits.as_bytes());
        Opcode::pack(&bytes)
    }
}

macro_rules! opcode_const {
    ($name:ident, $letter:expr, $code:expr) => {
        #[allow(non_upper_case_globals)]
        pub const $name: Opcode = Opcode::from_letter_code_const($letter, $code);
    };
}

impl Opcode {
    const fn from_letter_code_const(letter: u8, code: u32) -> Opcode {
        // const-fn equivalent of from_letter_code, restricted to codes < 1000
        // since that covers every opcode this firmware recognizes.
        let hundreds = (code / 100) % 10;
        let tens = (code / 10) % 10;
        let ones = code % 10;
        let mut word = letter as u32;
        if code >= 100 {
            word = (word << 8) | (b'0' as u32 + hundreds);
        }
        if code >= 10 {
            word = (word << 8) | (b'0' as u32 + tens);
        }
        word = (word << 8) | (b'0' as u32 + ones);
        Opcode(word)
    }
}

opcode_const!(G0, b'G', 0);
opcode_const!(G1, b'G', 1);
opcode_const!(G2, b'G', 2);
opcode_const!(G3, b'G', 3);
opcode_const!(G4, b'G', 4);
opcode_const!(G20, b'G', 20);
opcode_const!(G21, b'G', 21);
opcode_const!(G28, b'G', 28);
opcode_const!(G90, b'G', 90);
opcode_const!(G91, b'G', 91);
opcode_const!(G92, b'G', 92);
opcode_const!(M0, b'M', 0);
opcode_const!(M17, b'M', 17);
opcode_const!(M18, b'M', 18);
opcode_const!(M20, b'M', 20);
opcode_const!(M21, b'M', 21);
opcode_const!(M23, b'M', 23);
opcode_const!(M24, b'M', 24);
opcode_const!(M25, b'M', 25);
opcode_const!(M26, b'M', 26);
opcode_const!(M27, b'M', 27);
opcode_const!(M32, b'M', 32);
opcode_const!(M82, b'M', 82);
opcode_const!(M83, b'M', 83);
opcode_const!(M84, b'M', 84);
opcode_const!(M99, b'M', 99);
opcode_const!(M104, b'M', 104);
opcode_const!(M105, b'M', 105);
opcode_const!(M106, b'M', 106);
opcode_const!(M107, b'M', 107);
opcode_const!(M109, b'M', 109);
opcode_const!(M112, b'M', 112);
opcode_const!(M116, b'M', 116);
opcode_const!(M117, b'M', 117);
opcode_const!(M140, b'M', 140);
opcode_const!(M190, b'M', 190);
opcode_const!(M280, b'M', 280);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_matches_letter_code_helper() {
        assert_eq!(Opcode::pack(b"G28"), G28);
        assert_eq!(Opcode::pack(b"M105"), M105);
        assert_eq!(Opcode::pack(b"G1"), G1);
    }

    #[test]
    fn distinct_lengths_are_distinct_words() {
        assert_ne!(Opcode::pack(b"G1"), Opcode::pack(b"G01"));
    }

    #[test]
    fn empty_is_zero() {
        assert!(Opcode::EMPTY.is_empty());
        assert!(!G28.is_empty());
    }

    #[test]
    fn numeric_suffix_reads_tool_index() {
        assert_eq!(Opcode::pack(b"T0").numeric_suffix(), Some(0));
        assert_eq!(Opcode::pack(b"T12").numeric_suffix(), Some(12));
        assert!(Opcode::pack(b"T0").is_letter(b'T'));
        assert!(!G28.is_letter(b'T'));
    }

    #[test]
    fn from_letter_code_matches_pack() {
        assert_eq!(Opcode::from_letter_code(b'M', 117), M117);
        assert_eq!(Opcode::from_letter_code(b'G', 3), G3);
    }
}
