//! Scanf-subset template engine for response matching.
//!
//! A response template is compiled into one [`TemplateLine`] per logical line.
//! Lines are delimited by a literal `\n` in the template, except when the
//! `\n` sits inside a `%[...]` character class. Each line is matched in two
//! passes, mirroring the classic probe/extract split:
//!
//! - [`probe_line`] is the strict validation pass: every segment must match
//!   and the number of consumed bytes is reported, so the caller can check
//!   the accumulation was consumed end-to-end.
//! - [`extract_line`] is the best-effort extraction pass: it collects the
//!   values of non-suppressed conversions and stops at the first segment
//!   that no longer matches.
//!
//! Matching follows scanf rules: whitespace in the template matches any run
//! of input whitespace (possibly empty), `%d`/`%u`/`%x`/`%s` skip leading
//! whitespace, `%c` and `%[...]` do not, and `%s`/`%[...]` require at least
//! one byte.

use crate::captures::AtValue;
use crate::error::{AtError, AtResult};

/// A conversion kind inside a template.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ConvKind {
    /// `%d`: signed decimal integer.
    Int,
    /// `%u`: unsigned decimal integer.
    Uint,
    /// `%x` / `%X`: unsigned hexadecimal integer, optional `0x` prefix.
    Hex,
    /// `%s`: run of non-whitespace bytes.
    Str,
    /// `%c`: exactly `width` bytes (default 1), no whitespace skip.
    Char,
    /// `%[...]` / `%[^...]`: run of bytes inside (outside) the set.
    Class { negated: bool, set: Vec<(u8, u8)> },
}

/// One `%` conversion with its flags.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Conversion {
    pub suppressed: bool,
    pub width: Option<usize>,
    pub kind: ConvKind,
}

/// A matched unit of a template line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Segment {
    /// Non-whitespace literal bytes, matched exactly.
    Literal(Vec<u8>),
    /// Template whitespace: matches any run of input whitespace.
    Whitespace,
    Conversion(Conversion),
}

/// One logical line of a compiled template.
#[derive(Debug, Clone)]
pub(crate) struct TemplateLine {
    pub segments: Vec<Segment>,
    /// The line ended with a literal `\n`: hold validation until a wire
    /// newline arrives, so `"Foo: %s\n"` does not match on the first byte
    /// of the value.
    pub whole_line_wanted: bool,
    /// Display form of the suppressed probe format, for wire tracing.
    pub probe_repr: String,
}

/// Compile a template into its logical lines.
pub(crate) fn parse_template(template: &str) -> AtResult<Vec<TemplateLine>> {
    let bytes = template.as_bytes();
    let mut lines = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let (line, next) = parse_line(bytes, pos)?;
        lines.push(line);
        pos = next;
    }
    Ok(lines)
}

fn parse_line(bytes: &[u8], start: usize) -> AtResult<(TemplateLine, usize)> {
    let mut segments = Vec::new();
    let mut literal: Vec<u8> = Vec::new();
    let mut whole_line_wanted = false;
    let mut i = start;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'%' {
            if bytes.get(i + 1) == Some(&b'%') {
                literal.push(b'%');
                i += 2;
                continue;
            }
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            let (conv, next) = parse_conversion(bytes, i)?;
            segments.push(Segment::Conversion(conv));
            i = next;
            continue;
        }
        if b.is_ascii_whitespace() {
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            if !matches!(segments.last(), Some(Segment::Whitespace)) {
                segments.push(Segment::Whitespace);
            }
            i += 1;
            if b == b'\n' {
                whole_line_wanted = true;
                break;
            }
            continue;
        }
        literal.push(b);
        i += 1;
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    let probe_repr = build_probe_repr(&bytes[start..i]);
    Ok((
        TemplateLine {
            segments,
            whole_line_wanted,
            probe_repr,
        },
        i,
    ))
}

fn parse_conversion(bytes: &[u8], at: usize) -> AtResult<(Conversion, usize)> {
    let mut i = at + 1;
    let mut suppressed = false;
    if bytes.get(i) == Some(&b'*') {
        suppressed = true;
        i += 1;
    }

    let mut width: Option<usize> = None;
    while let Some(d) = bytes.get(i).filter(|b| b.is_ascii_digit()) {
        width = Some(width.unwrap_or(0) * 10 + (d - b'0') as usize);
        i += 1;
    }

    let Some(&key) = bytes.get(i) else {
        return Err(AtError::Template("truncated conversion".to_string()));
    };
    i += 1;

    let kind = match key {
        b'd' => ConvKind::Int,
        b'u' => ConvKind::Uint,
        b'x' | b'X' => ConvKind::Hex,
        b's' => ConvKind::Str,
        b'c' => ConvKind::Char,
        b'[' => {
            let mut negated = false;
            if bytes.get(i) == Some(&b'^') {
                negated = true;
                i += 1;
            }
            let mut set: Vec<(u8, u8)> = Vec::new();
            // A leading `]` is a set member, not the terminator.
            if bytes.get(i) == Some(&b']') {
                set.push((b']', b']'));
                i += 1;
            }
            loop {
                match bytes.get(i) {
                    None => {
                        return Err(AtError::Template("unterminated `%[` class".to_string()));
                    }
                    Some(&b']') => {
                        i += 1;
                        break;
                    }
                    Some(&lo) => {
                        if bytes.get(i + 1) == Some(&b'-')
                            && bytes.get(i + 2).is_some_and(|&b| b != b']')
                        {
                            let hi = bytes[i + 2];
                            set.push((lo.min(hi), lo.max(hi)));
                            i += 3;
                        } else {
                            set.push((lo, lo));
                            i += 1;
                        }
                    }
                }
            }
            if set.is_empty() {
                return Err(AtError::Template("empty `%[` class".to_string()));
            }
            ConvKind::Class { negated, set }
        }
        other => {
            return Err(AtError::Template(format!(
                "unsupported conversion `%{}`",
                other as char
            )));
        }
    };

    Ok((
        Conversion {
            suppressed,
            width,
            kind,
        },
        i,
    ))
}

/// Render the suppressed probe form of a raw template line: every
/// non-suppressed conversion gains a `*`, and the consumed-length sentinel
/// is appended.
fn build_probe_repr(raw: &[u8]) -> String {
    let mut out = String::new();
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        if b == b'%' && raw.get(i + 1) == Some(&b'%') {
            out.push_str("%%");
            i += 2;
            continue;
        }
        if b == b'%' && raw.get(i + 1).is_some_and(|&n| n != b'*') {
            out.push_str("%*");
            i += 1;
            continue;
        }
        out.push(b as char);
        i += 1;
    }
    out.push_str("%n");
    out
}

/// Strict validation pass.
///
/// Returns the number of input bytes consumed when every segment of the
/// line matched, `None` otherwise. The caller decides whether the count
/// covers the whole accumulation.
pub(crate) fn probe_line(line: &TemplateLine, input: &[u8]) -> Option<usize> {
    let (consumed, matched, _) = run(&line.segments, input, false);
    matched.then_some(consumed)
}

/// Best-effort extraction pass.
///
/// Collects values for non-suppressed conversions in order, stopping at the
/// first segment that fails to match.
pub(crate) fn extract_line(line: &TemplateLine, input: &[u8]) -> Vec<AtValue> {
    run(&line.segments, input, true).2
}

fn run(segments: &[Segment], input: &[u8], collect: bool) -> (usize, bool, Vec<AtValue>) {
    let mut pos = 0usize;
    let mut values = Vec::new();

    for seg in segments {
        match seg {
            Segment::Whitespace => {
                while pos < input.len() && input[pos].is_ascii_whitespace() {
                    pos += 1;
                }
            }
            Segment::Literal(lit) => {
                if !input[pos..].starts_with(lit) {
                    return (pos, false, values);
                }
                pos += lit.len();
            }
            Segment::Conversion(conv) => match match_conversion(conv, input, pos, collect) {
                Some((next, value)) => {
                    pos = next;
                    if let Some(v) = value {
                        values.push(v);
                    }
                }
                None => return (pos, false, values),
            },
        }
    }

    (pos, true, values)
}

fn match_conversion(
    conv: &Conversion,
    input: &[u8],
    mut pos: usize,
    collect: bool,
) -> Option<(usize, Option<AtValue>)> {
    let width = conv.width.unwrap_or(usize::MAX);
    let capture = collect && !conv.suppressed;

    match &conv.kind {
        ConvKind::Int => {
            while pos < input.len() && input[pos].is_ascii_whitespace() {
                pos += 1;
            }
            let end = pos.saturating_add(width).min(input.len());
            let mut i = pos;
            let mut negative = false;
            if i < end && (input[i] == b'+' || input[i] == b'-') {
                negative = input[i] == b'-';
                i += 1;
            }
            let digits = i;
            let mut value: i64 = 0;
            while i < end && input[i].is_ascii_digit() {
                value = value.wrapping_mul(10).wrapping_add((input[i] - b'0') as i64);
                i += 1;
            }
            if i == digits {
                return None;
            }
            if negative {
                value = -value;
            }
            Some((i, capture.then(|| AtValue::Int(value as i32))))
        }
        ConvKind::Uint => {
            while pos < input.len() && input[pos].is_ascii_whitespace() {
                pos += 1;
            }
            let end = pos.saturating_add(width).min(input.len());
            let mut i = pos;
            if i < end && input[i] == b'+' {
                i += 1;
            }
            let digits = i;
            let mut value: u64 = 0;
            while i < end && input[i].is_ascii_digit() {
                value = value.wrapping_mul(10).wrapping_add((input[i] - b'0') as u64);
                i += 1;
            }
            if i == digits {
                return None;
            }
            Some((i, capture.then(|| AtValue::Uint(value as u32))))
        }
        ConvKind::Hex => {
            while pos < input.len() && input[pos].is_ascii_whitespace() {
                pos += 1;
            }
            let end = pos.saturating_add(width).min(input.len());
            let mut i = pos;
            if i + 2 < end
                && input[i] == b'0'
                && (input[i + 1] | 0x20) == b'x'
                && input[i + 2].is_ascii_hexdigit()
            {
                i += 2;
            }
            let digits = i;
            let mut value: u64 = 0;
            while i < end && input[i].is_ascii_hexdigit() {
                let d = (input[i] as char).to_digit(16).unwrap() as u64;
                value = value.wrapping_mul(16).wrapping_add(d);
                i += 1;
            }
            if i == digits {
                return None;
            }
            Some((i, capture.then(|| AtValue::Uint(value as u32))))
        }
        ConvKind::Str => {
            while pos < input.len() && input[pos].is_ascii_whitespace() {
                pos += 1;
            }
            let end = pos.saturating_add(width).min(input.len());
            let mut i = pos;
            while i < end && !input[i].is_ascii_whitespace() {
                i += 1;
            }
            if i == pos {
                return None;
            }
            let value = capture
                .then(|| AtValue::Text(String::from_utf8_lossy(&input[pos..i]).into_owned()));
            Some((i, value))
        }
        ConvKind::Char => {
            let n = conv.width.unwrap_or(1);
            if input.len() - pos < n {
                return None;
            }
            let value = capture.then(|| {
                if n == 1 {
                    AtValue::Char(input[pos] as char)
                } else {
                    AtValue::Text(String::from_utf8_lossy(&input[pos..pos + n]).into_owned())
                }
            });
            Some((pos + n, value))
        }
        ConvKind::Class { negated, set } => {
            let end = pos.saturating_add(width).min(input.len());
            let in_set =
                |b: u8| set.iter().any(|&(lo, hi)| b >= lo && b <= hi) != *negated;
            let mut i = pos;
            while i < end && in_set(input[i]) {
                i += 1;
            }
            if i == pos {
                return None;
            }
            let value = capture
                .then(|| AtValue::Text(String::from_utf8_lossy(&input[pos..i]).into_owned()));
            Some((i, value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(template: &str) -> TemplateLine {
        let mut lines = parse_template(template).unwrap();
        assert_eq!(lines.len(), 1);
        lines.remove(0)
    }

    #[test]
    fn test_parse_splits_lines_at_newline() {
        let lines = parse_template("AT\r\nOK\r\n").unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].whole_line_wanted);
        assert!(lines[1].whole_line_wanted);
    }

    #[test]
    fn test_newline_inside_class_is_not_a_line_break() {
        let lines = parse_template("%[^\n]\n").unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].whole_line_wanted);
    }

    #[test]
    fn test_line_without_newline_is_not_whole_line() {
        let l = line("OK");
        assert!(!l.whole_line_wanted);
    }

    #[test]
    fn test_probe_literal_match() {
        let l = line("OK\r\n");
        assert_eq!(probe_line(&l, b"OK\r\n"), Some(4));
        assert_eq!(probe_line(&l, b"NO\r\n"), None);
    }

    #[test]
    fn test_probe_counts_partial_consumption() {
        // Trailing junk is consumed-length mismatch territory, not failure.
        let l = line("OK");
        assert_eq!(probe_line(&l, b"OKOK"), Some(2));
    }

    #[test]
    fn test_extract_signed_and_unsigned() {
        let l = line("+CSQ: %d,%u\r\n");
        assert_eq!(probe_line(&l, b"+CSQ: -7,99\r\n"), Some(13));
        let values = extract_line(&l, b"+CSQ: -7,99\r\n");
        assert_eq!(values, vec![AtValue::Int(-7), AtValue::Uint(99)]);
    }

    #[test]
    fn test_extract_hex_with_prefix() {
        let l = line("+ADDR: %x\r\n");
        let values = extract_line(&l, b"+ADDR: 0x1A2B\r\n");
        assert_eq!(values, vec![AtValue::Uint(0x1A2B)]);
        let values = extract_line(&l, b"+ADDR: ff\r\n");
        assert_eq!(values, vec![AtValue::Uint(0xFF)]);
    }

    #[test]
    fn test_string_requires_nonempty_run() {
        let l = line("cmd:%s\r\n");
        assert_eq!(probe_line(&l, b"cmd:\r\n"), None);
        assert_eq!(probe_line(&l, b"cmd:val\r\n"), Some(9));
        assert_eq!(
            extract_line(&l, b"cmd:val\r\n"),
            vec![AtValue::Text("val".to_string())]
        );
    }

    #[test]
    fn test_suppressed_conversion_produces_no_value() {
        let l = line("%*s %d\r\n");
        assert_eq!(extract_line(&l, b"tag 42\r\n"), vec![AtValue::Int(42)]);
    }

    #[test]
    fn test_char_takes_exactly_one_byte() {
        let l = line("%c%d");
        assert_eq!(
            extract_line(&l, b"A5"),
            vec![AtValue::Char('A'), AtValue::Int(5)]
        );
    }

    #[test]
    fn test_negated_class_stops_at_member() {
        let l = line("+IPD,%[^:]:");
        assert_eq!(probe_line(&l, b"+IPD,12:"), Some(8));
        assert_eq!(
            extract_line(&l, b"+IPD,12:"),
            vec![AtValue::Text("12".to_string())]
        );
    }

    #[test]
    fn test_class_with_range() {
        let l = line("%[0-9a-f]");
        assert_eq!(
            extract_line(&l, b"12ef"),
            vec![AtValue::Text("12ef".to_string())]
        );
    }

    #[test]
    fn test_percent_literal() {
        let l = line("100%%\r\n");
        assert_eq!(probe_line(&l, b"100%\r\n"), Some(6));
    }

    #[test]
    fn test_width_limits_field() {
        let l = line("%2d%d");
        assert_eq!(
            extract_line(&l, b"1234"),
            vec![AtValue::Int(12), AtValue::Int(34)]
        );
    }

    #[test]
    fn test_template_whitespace_matches_any_run() {
        let l = line("OK\r\n");
        // A peripheral that terminates with a bare newline still matches.
        assert_eq!(probe_line(&l, b"OK\n"), Some(3));
    }

    #[test]
    fn test_unsupported_conversion_is_rejected() {
        assert!(matches!(
            parse_template("%f\r\n"),
            Err(AtError::Template(_))
        ));
        assert!(matches!(parse_template("%"), Err(AtError::Template(_))));
        assert!(matches!(
            parse_template("%[^abc"),
            Err(AtError::Template(_))
        ));
    }

    #[test]
    fn test_probe_repr_suppresses_and_appends_sentinel() {
        let l = line("+CSQ: %d,%*u\r\n");
        assert_eq!(l.probe_repr, "+CSQ: %*d,%*u\r\n%n");
    }

    #[test]
    fn test_extraction_is_best_effort_after_failure() {
        let l = line("%d,%d,%d");
        // Second field is malformed: keep the first, stop there.
        assert_eq!(extract_line(&l, b"1,x,3"), vec![AtValue::Int(1)]);
    }
}
