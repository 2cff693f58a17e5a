use crate::command::Command;
use crate::opcode::Opcode;

/// Errors encountered while tokenizing a line of G-code.
///
/// These are for malformed numeric parameters only; an unrecognized
/// but well-formed opcode is not a parse error (the caller decides
/// whether it knows how to execute it).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed numeric parameter '{0}'")]
    MalformedParameter(char),
}

/// Parses one line of G-code text into a [`Command`].
///
/// Contract (SPEC_FULL.md 4.1):
/// - carriage returns are ignored
/// - a leading `N<digits>` line number and a trailing `*<checksum>`
///   are stripped and unchecked
/// - `;` begins a comment consumed to end of line
/// - empty lines, comment-only lines, and line-number-only lines
///   return `Command::empty()`
/// - the opcode is upper-cased and packed into an [`Opcode`] word
/// - M32 and M117 take one trailing "special string" parameter
///   instead of letter/number pairs
pub fn parse_line(line: &str) -> Result<Command, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let line = match line.find(';') {
        Some(idx) => &line[..idx],
        None => line,
    };
    let mut tokens = tokenize(line);

    // Strip a leading line number, e.g. "N12 G1 X1" -> "G1 X1".
    if let Some(first) = tokens.first() {
        if first.len() > 1 && (first.as_bytes()[0] | 0x20) == b'n' {
            if first[1..].bytes().all(|b| b.is_ascii_digit()) {
                tokens.remove(0);
            }
        }
    }

    // Strip a trailing checksum, e.g. "G1 X1*33" -> "G1 X1".
    if let Some(last) = tokens.last_mut() {
        if let Some(star) = last.find('*') {
            last.truncate(star);
            if last.is_empty() {
                tokens.pop();
            }
        }
    }

    let Some(opcode_token) = tokens.first() else {
        return Ok(Command::empty());
    };
    if opcode_token.is_empty() {
        return Ok(Command::empty());
    }

    let opcode_upper = opcode_token.to_ascii_uppercase();
    let opcode = Opcode::pack(opcode_upper.as_bytes());
    let mut command = Command::new(opcode);

    let wants_special_string =
        opcode_upper == "M32" || opcode_upper == "M117" || opcode_upper == "M118";

    if wants_special_string {
        // Everything after the opcode token, rejoined with single
        // spaces, is the filename or message (comments already
        // stripped above).
        let rest_start = line
            .find(opcode_token.as_str())
            .map(|idx| idx + opcode_token.len())
            .unwrap_or(line.len());
        let rest = line[rest_start..].trim();
        if !rest.is_empty() {
            command.set_special_string_param(rest.to_string());
        }
        return Ok(command);
    }

    for token in tokens.iter().skip(1) {
        if token.is_empty() {
            continue;
        }
        let letter = token.as_bytes()[0];
        if !letter.is_ascii_alphabetic() {
            continue;
        }
        let rest = token[1..].trim();
        if rest.is_empty() {
            // Bare letter (e.g. a lone "G" token): treat as present
            // with no numeric value attached; rare but harmless to skip.
            continue;
        }
        let value: f32 = rest
            .parse()
            .map_err(|_| ParseError::MalformedParameter(letter as char))?;
        command.set_argument(letter, value);
    }

    Ok(command)
}

/// Splits a line on whitespace, preserving punctuation within tokens.
fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode;

    #[test]
    fn blank_and_comment_only_lines_are_empty() {
        assert!(parse_line("").unwrap().is_empty());
        assert!(parse_line("   ").unwrap().is_empty());
        assert!(parse_line("; a comment").unwrap().is_empty());
        assert!(parse_line("N5").unwrap().is_empty());
    }

    #[test]
    fn strips_line_number_and_checksum() {
        let cmd = parse_line("N12 G1 X10 Y20*33").unwrap();
        assert!(cmd.is_opcode(opcode::G1));
        assert_eq!(cmd.x(), Some(10.0));
        assert_eq!(cmd.y(), Some(20.0));
    }

    #[test]
    fn case_insensitive_opcode_and_letters() {
        let cmd = parse_line("g1 x10 y-5.5").unwrap();
        assert!(cmd.is_opcode(opcode::G1));
        assert_eq!(cmd.x(), Some(10.0));
        assert_eq!(cmd.y(), Some(-5.5));
    }

    #[test]
    fn comment_strips_trailing_text() {
        let cmd = parse_line("G1 X1 ; move to x=1").unwrap();
        assert!(cmd.is_opcode(opcode::G1));
        assert_eq!(cmd.x(), Some(1.0));
    }

    #[test]
    fn m32_takes_a_filename_not_letter_pairs() {
        let cmd = parse_line("M32 sub/part1.gco").unwrap();
        assert!(cmd.is_opcode(opcode::M32));
        assert_eq!(cmd.special_string_param(), Some("sub/part1.gco"));
    }

    #[test]
    fn m117_takes_a_free_text_message() {
        let cmd = parse_line("M117 Hello World").unwrap();
        assert!(cmd.is_opcode(opcode::M117));
        assert_eq!(cmd.special_string_param(), Some("Hello World"));
    }

    #[test]
    fn malformed_parameter_is_an_error() {
        assert_eq!(
            parse_line("G1 Xabc"),
            Err(ParseError::MalformedParameter('X'))
        );
    }

    #[test]
    fn carriage_return_is_ignored() {
        let cmd = parse_line("G28\r").unwrap();
        assert!(cmd.is_opcode(opcode::G28));
    }
}
