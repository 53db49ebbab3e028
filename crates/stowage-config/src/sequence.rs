//! Printf-style sequence formats with two integer slots.
//!
//! # Design
//! - Parse once at job start; rendering is infallible afterwards.
//! - Slot 1 is the task index, slot 2 the per-task file counter.
//! - Zero padding, width, and alignment follow `%[index$][flags][width]d` semantics so
//!   names sort the same way downstream consumers expect.

use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, ConfigResult};

/// Number of values a sequence format can reference.
const ARGUMENT_COUNT: usize = 2;

/// Parsed sequence template mapping `(task_index, file_index)` to a path suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceFormat {
    raw: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(Slot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    argument: usize,
    width: usize,
    zero_pad: bool,
    left_align: bool,
    sign: Sign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sign {
    Omitted,
    Plus,
    Space,
}

impl SequenceFormat {
    /// Parse a printf-style template.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSequenceFormat`] for dangling `%`, unsupported
    /// conversions, conflicting flags, or references beyond the two available values.
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        let chars: Vec<char> = raw.chars().collect();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut next_ordinal = 0usize;
        let mut pos = 0usize;

        while pos < chars.len() {
            let current = chars[pos];
            pos += 1;
            if current != '%' {
                literal.push(current);
                continue;
            }
            if chars.get(pos) == Some(&'%') {
                literal.push('%');
                pos += 1;
                continue;
            }

            let (slot, consumed) = parse_slot(raw, &chars[pos..], &mut next_ordinal)?;
            pos += consumed;
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Slot(slot));
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// Raw template as supplied by the caller.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Render the suffix for a task index and file counter.
    #[must_use]
    pub fn render(&self, task_index: usize, file_index: usize) -> String {
        let values = [task_index, file_index];
        let mut rendered = String::with_capacity(self.raw.len() + 8);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Slot(slot) => slot.render_into(values[slot.argument], &mut rendered),
            }
        }
        rendered
    }

    /// Whether the template references both the task index and the file counter.
    ///
    /// Templates that omit either slot can map distinct files onto one path.
    #[must_use]
    pub fn references_both_slots(&self) -> bool {
        let mut seen = [false; ARGUMENT_COUNT];
        for segment in &self.segments {
            if let Segment::Slot(slot) = segment {
                seen[slot.argument] = true;
            }
        }
        seen.iter().all(|flag| *flag)
    }

    /// Whether the template would introduce additional directory levels.
    #[must_use]
    pub fn contains_separator(&self) -> bool {
        self.raw.contains('/')
    }
}

impl Default for SequenceFormat {
    fn default() -> Self {
        Self {
            raw: "%03d.%02d.".to_string(),
            segments: vec![
                Segment::Slot(Slot::zero_padded(0, 3)),
                Segment::Literal(".".to_string()),
                Segment::Slot(Slot::zero_padded(1, 2)),
                Segment::Literal(".".to_string()),
            ],
        }
    }
}

impl FromStr for SequenceFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl fmt::Display for SequenceFormat {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.raw)
    }
}

impl Slot {
    const fn zero_padded(argument: usize, width: usize) -> Self {
        Self {
            argument,
            width,
            zero_pad: true,
            left_align: false,
            sign: Sign::Omitted,
        }
    }

    fn render_into(self, value: usize, out: &mut String) {
        let sign = match self.sign {
            Sign::Omitted => "",
            Sign::Plus => "+",
            Sign::Space => " ",
        };
        let digits = value.to_string();
        let body_len = sign.len() + digits.len();
        let padding = self.width.saturating_sub(body_len);

        if self.zero_pad {
            out.push_str(sign);
            out.extend(std::iter::repeat_n('0', padding));
            out.push_str(&digits);
        } else if self.left_align {
            out.push_str(sign);
            out.push_str(&digits);
            out.extend(std::iter::repeat_n(' ', padding));
        } else {
            out.extend(std::iter::repeat_n(' ', padding));
            out.push_str(sign);
            out.push_str(&digits);
        }
    }
}

/// Parse one conversion starting right after its `%`; returns the slot and the
/// number of characters consumed.
fn parse_slot(raw: &str, rest: &[char], next_ordinal: &mut usize) -> ConfigResult<(Slot, usize)> {
    let mut pos = 0usize;

    let leading_digits = rest.iter().take_while(|c| c.is_ascii_digit()).count();
    let explicit_index = if leading_digits > 0 && rest.get(leading_digits) == Some(&'$') {
        let index: usize = collect_number(&rest[..leading_digits])
            .ok_or_else(|| ConfigError::sequence(raw, "argument index is too large"))?;
        if index == 0 || index > ARGUMENT_COUNT {
            return Err(ConfigError::sequence(
                raw,
                "argument index must be 1 (task index) or 2 (file counter)",
            ));
        }
        pos = leading_digits + 1;
        Some(index - 1)
    } else {
        None
    };

    let mut zero_pad = false;
    let mut left_align = false;
    let mut sign = Sign::Omitted;
    while let Some(flag) = rest.get(pos) {
        match flag {
            '0' => zero_pad = true,
            '-' => left_align = true,
            '+' if sign == Sign::Space => {
                return Err(ConfigError::sequence(raw, "`+` and ` ` flags are exclusive"));
            }
            '+' => sign = Sign::Plus,
            ' ' if sign == Sign::Plus => {
                return Err(ConfigError::sequence(raw, "`+` and ` ` flags are exclusive"));
            }
            ' ' => sign = Sign::Space,
            _ => break,
        }
        pos += 1;
    }

    let width_digits = rest[pos..]
        .iter()
        .take_while(|c| c.is_ascii_digit())
        .count();
    let width = if width_digits == 0 {
        0
    } else {
        collect_number(&rest[pos..pos + width_digits])
            .ok_or_else(|| ConfigError::sequence(raw, "width is too large"))?
    };
    pos += width_digits;

    let conversion = rest
        .get(pos)
        .copied()
        .ok_or_else(|| ConfigError::sequence(raw, "dangling `%` at end of format"))?;
    pos += 1;

    match conversion {
        'd' => {}
        's' if zero_pad || sign != Sign::Omitted => {
            return Err(ConfigError::sequence(
                raw,
                "`%s` only accepts the `-` flag and a width",
            ));
        }
        's' => {}
        _ => {
            return Err(ConfigError::sequence(
                raw,
                "only `%d` and `%s` conversions are supported",
            ));
        }
    }

    if zero_pad && left_align {
        return Err(ConfigError::sequence(raw, "`-` and `0` flags are exclusive"));
    }
    if (zero_pad || left_align) && width == 0 {
        return Err(ConfigError::sequence(raw, "`-` and `0` flags require a width"));
    }

    let argument = if let Some(index) = explicit_index {
        index
    } else {
        let ordinal = *next_ordinal;
        *next_ordinal += 1;
        if ordinal >= ARGUMENT_COUNT {
            return Err(ConfigError::sequence(
                raw,
                "format references more than two values",
            ));
        }
        ordinal
    };

    Ok((
        Slot {
            argument,
            width,
            zero_pad,
            left_align,
            sign,
        },
        pos,
    ))
}

fn collect_number(digits: &[char]) -> Option<usize> {
    digits.iter().collect::<String>().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult<T> = anyhow::Result<T>;

    #[test]
    fn default_format_zero_pads_both_slots() -> TestResult<()> {
        let parsed = SequenceFormat::parse("%03d.%02d.")?;
        assert_eq!(parsed, SequenceFormat::default());
        assert_eq!(parsed.render(1, 0), "001.00.");
        assert_eq!(parsed.render(12, 7), "012.07.");
        assert_eq!(parsed.render(1234, 100), "1234.100.");
        Ok(())
    }

    #[test]
    fn explicit_indices_reorder_values() -> TestResult<()> {
        let parsed = SequenceFormat::parse("part-%2$04d-of-task-%1$d")?;
        assert_eq!(parsed.render(3, 9), "part-0009-of-task-3");
        assert!(parsed.references_both_slots());
        Ok(())
    }

    #[test]
    fn alignment_sign_and_escapes_render() -> TestResult<()> {
        assert_eq!(SequenceFormat::parse("%%%d")?.render(7, 0), "%7");
        assert_eq!(SequenceFormat::parse("[%-4d]")?.render(3, 0), "[3   ]");
        assert_eq!(SequenceFormat::parse("[%4d]")?.render(3, 0), "[   3]");
        assert_eq!(SequenceFormat::parse("%+04d")?.render(5, 0), "+005");
        assert_eq!(SequenceFormat::parse("%s_%s")?.render(4, 2), "4_2");
        Ok(())
    }

    #[test]
    fn degenerate_formats_are_detected() -> TestResult<()> {
        let single = SequenceFormat::parse("%03d.")?;
        assert!(!single.references_both_slots());
        assert_eq!(single.render(1, 0), single.render(1, 5));

        let literal = SequenceFormat::parse("static")?;
        assert!(!literal.references_both_slots());
        assert_eq!(literal.render(1, 2), "static");
        Ok(())
    }

    #[test]
    fn separators_are_reported() -> TestResult<()> {
        assert!(SequenceFormat::parse("%03d/%02d.")?.contains_separator());
        assert!(!SequenceFormat::default().contains_separator());
        Ok(())
    }

    #[test]
    fn invalid_formats_are_rejected() {
        for raw in [
            "%", "%3", "%x", "%d%d%d", "%-05d", "%0d", "%-d", "%3$d", "%0$d", "%+ d", "%05s",
        ] {
            let err = SequenceFormat::parse(raw);
            assert!(
                matches!(err, Err(ConfigError::InvalidSequenceFormat { .. })),
                "expected `{raw}` to be rejected"
            );
        }
    }
}
