//! Parser for the compact layout descriptor printed by `Display`.
//!
//! ```text
//! layout   := value | sequence | group | padding
//! value    := carrier size ('%' align)? name? (':' layout)?
//! sequence := '[' count ':' layout ']' name?
//! group    := '[' layout* ']' name?            struct
//!           | '[' layout ('|' layout)+ ']' name?  union
//! padding  := 'x' size name?
//! name     := '(' chars ')'
//! ```
//!
//! Upper-case carrier letters select big-endian byte order. A group with a
//! single member parses as a struct.

use std::str::FromStr;

use super::{ByteOrder, Carrier, LayoutError, MemoryLayout, ValueLayout};

impl FromStr for MemoryLayout {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser {
            input: s.as_bytes(),
            pos: 0,
        };
        let layout = parser.layout()?;
        if parser.pos != parser.input.len() {
            return Err(parser.error("trailing characters"));
        }
        Ok(layout)
    }
}

/// Parse a function signature `(arg*)ret`, where `ret` is a layout or `v`
/// for void.
pub(crate) fn parse_signature(s: &str) -> Result<(Vec<MemoryLayout>, Option<MemoryLayout>), LayoutError> {
    let mut parser = Parser {
        input: s.as_bytes(),
        pos: 0,
    };
    parser.expect(b'(')?;
    let mut args = Vec::new();
    while !parser.eat(b')') {
        args.push(parser.layout()?);
    }
    let ret = if parser.eat(b'v') {
        None
    } else {
        Some(parser.layout()?)
    };
    if parser.pos != parser.input.len() {
        return Err(parser.error("trailing characters"));
    }
    Ok((args, ret))
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, message: &str) -> LayoutError {
        LayoutError::Parse {
            position: self.pos,
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), LayoutError> {
        if self.eat(byte) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn number(&mut self) -> Result<u64, LayoutError> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        std::str::from_utf8(self.input.get(start..self.pos).unwrap_or_default())
            .ok()
            .and_then(|digits| digits.parse().ok())
            .ok_or(LayoutError::Parse {
                position: start,
                message: "expected a number".to_string(),
            })
    }

    fn name(&mut self) -> Result<Option<String>, LayoutError> {
        if !self.eat(b'(') {
            return Ok(None);
        }
        let start = self.pos;
        while self.peek().is_some_and(|b| b != b')') {
            self.pos += 1;
        }
        let name = String::from_utf8_lossy(self.input.get(start..self.pos).unwrap_or_default()).into_owned();
        self.expect(b')')?;
        Ok(Some(name))
    }

    fn named(&mut self, layout: MemoryLayout) -> Result<MemoryLayout, LayoutError> {
        Ok(match self.name()? {
            Some(name) => layout.with_name(name),
            None => layout,
        })
    }

    fn layout(&mut self) -> Result<MemoryLayout, LayoutError> {
        match self.peek() {
            Some(b'[') => self.bracketed(),
            Some(b'x') => {
                self.pos += 1;
                let padding = MemoryLayout::padding_layout(self.number()?)?;
                self.named(padding)
            }
            Some(c) if Carrier::from_descriptor(c as char).is_some() => self.value(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of descriptor")),
        }
    }

    fn value(&mut self) -> Result<MemoryLayout, LayoutError> {
        let letter = self.peek().unwrap_or_default() as char;
        let carrier = Carrier::from_descriptor(letter).ok_or(self.error("unknown carrier"))?;
        self.pos += 1;
        let order = if letter.is_ascii_uppercase() {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        };
        let size = self.number()?;
        if size != carrier.byte_size() {
            return Err(self.error(&format!(
                "{} has size {}, not {}",
                carrier.name(),
                carrier.byte_size(),
                size
            )));
        }
        let mut layout = ValueLayout::of(carrier).with_order(order);
        if self.eat(b'%') {
            layout = layout.with_byte_alignment(self.number()?)?;
        }
        if let Some(name) = self.name()? {
            layout = layout.with_name(name);
        }
        if self.eat(b':') {
            layout = layout.with_target_layout(self.layout()?)?;
        }
        Ok(MemoryLayout::Value(layout))
    }

    fn bracketed(&mut self) -> Result<MemoryLayout, LayoutError> {
        self.expect(b'[')?;
        if self.peek().is_some_and(|b| b.is_ascii_digit()) {
            let count = self.number()?;
            self.expect(b':')?;
            let element = self.layout()?;
            self.expect(b']')?;
            let sequence = MemoryLayout::sequence_layout(count, element)?;
            return self.named(sequence);
        }
        let mut members = Vec::new();
        let mut union = false;
        while !self.eat(b']') {
            if !members.is_empty() && self.eat(b'|') {
                union = true;
            }
            members.push(self.layout()?);
        }
        let group = if union {
            MemoryLayout::union_layout(members)
        } else {
            MemoryLayout::struct_layout(members)?
        };
        self.named(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> MemoryLayout {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_display_forms() {
        for text in ["i4", "[3:i4]", "[i4(x)i4(y)](point)", "[i4|f4]", "[b1x3i4]", "a8(p):[j8d8]", "I4%16"] {
            assert_eq!(parse(text).to_string(), text);
        }
    }

    #[test]
    fn test_parse_big_endian() {
        let layout = parse("J8");
        assert_eq!(layout.as_value().unwrap().order(), ByteOrder::BigEndian);
    }

    #[test]
    fn test_parse_rejects_wrong_size() {
        assert!(matches!(
            "i8".parse::<MemoryLayout>(),
            Err(LayoutError::Parse { position: 2, .. })
        ));
    }

    #[test]
    fn test_parse_rejects_misaligned_struct() {
        assert!(matches!(
            "[i4d8]".parse::<MemoryLayout>(),
            Err(LayoutError::MisalignedMember { .. })
        ));
    }

    #[test]
    fn test_parse_signature() {
        let (args, ret) = parse_signature("(i4[d8d8])v").unwrap();
        assert_eq!(args.len(), 2);
        assert!(ret.is_none());
        let (args, ret) = parse_signature("()a8").unwrap();
        assert!(args.is_empty());
        assert_eq!(ret.unwrap().byte_size(), 8);
        assert!(parse_signature("(i4").is_err());
    }

    #[test]
    fn test_parse_reports_trailing_input() {
        assert!("i4]".parse::<MemoryLayout>().is_err());
        assert!("[i4".parse::<MemoryLayout>().is_err());
    }
}
