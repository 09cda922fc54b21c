//! Parser for the dictionary literal that describes an array stream, e.g.
//! `{'descr': '<f4', 'fortran_order': False, 'shape': (5, 1, 28, 28), }`.

use npzeval_core::FormatError;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Literal {
    Str(String),
    Bool(bool),
    Int(i64),
    None,
    Tuple(Vec<Literal>),
    List(Vec<Literal>),
    Dict(Vec<(String, Literal)>),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ArrayHeader {
    /// Usually a string code; structured dtypes show up as lists.
    pub descr: Literal,
    pub fortran_order: bool,
    pub shape: Vec<usize>,
}

pub(crate) fn parse_header(text: &str) -> Result<ArrayHeader, FormatError> {
    let mut parser = Parser {
        src: text.as_bytes(),
        pos: 0,
        depth: 0,
    };
    let literal = parser.value().map_err(FormatError::MalformedHeader)?;
    parser.skip_ws();
    if parser.pos != parser.src.len() {
        return Err(malformed(format!(
            "unexpected trailing text at byte {}",
            parser.pos
        )));
    }

    let Literal::Dict(entries) = literal else {
        return Err(malformed("header is not a dictionary"));
    };

    let mut descr = None;
    let mut fortran_order = None;
    let mut shape = None;
    for (key, value) in entries {
        let slot_taken = match key.as_str() {
            "descr" => descr.replace(value).is_some(),
            "fortran_order" => match value {
                Literal::Bool(b) => fortran_order.replace(b).is_some(),
                other => return Err(malformed(format!("fortran_order is not a bool: {other:?}"))),
            },
            "shape" => shape.replace(parse_shape(value)?).is_some(),
            other => return Err(malformed(format!("unexpected key `{other}`"))),
        };
        if slot_taken {
            return Err(malformed(format!("key `{key}` repeated")));
        }
    }

    Ok(ArrayHeader {
        descr: descr.ok_or_else(|| malformed("missing key `descr`"))?,
        fortran_order: fortran_order.ok_or_else(|| malformed("missing key `fortran_order`"))?,
        shape: shape.ok_or_else(|| malformed("missing key `shape`"))?,
    })
}

fn parse_shape(value: Literal) -> Result<Vec<usize>, FormatError> {
    let Literal::Tuple(items) = value else {
        return Err(malformed(format!("shape is not a tuple: {value:?}")));
    };
    items
        .into_iter()
        .map(|item| match item {
            Literal::Int(d) => {
                usize::try_from(d).map_err(|_| malformed(format!("negative dimension {d}")))
            }
            other => Err(malformed(format!("dimension is not an integer: {other:?}"))),
        })
        .collect()
}

fn malformed(msg: impl Into<String>) -> FormatError {
    FormatError::MalformedHeader(msg.into())
}

/// Deepest dict/tuple/list nesting accepted in a header.
const MAX_DEPTH: usize = 32;

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, byte: u8) -> bool {
        self.skip_ws();
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn value(&mut self) -> Result<Literal, String> {
        self.skip_ws();
        match self.peek() {
            Some(b'{' | b'(' | b'[') => self.nested(),
            Some(q @ (b'\'' | b'"')) => self.string(q).map(Literal::Str),
            Some(b'-' | b'0'..=b'9') => self.int(),
            Some(c) if c.is_ascii_alphabetic() => self.word(),
            Some(c) => Err(format!("unexpected `{}` at byte {}", c as char, self.pos)),
            None => Err("unexpected end of header".to_string()),
        }
    }

    fn nested(&mut self) -> Result<Literal, String> {
        if self.depth == MAX_DEPTH {
            return Err(format!("nesting deeper than {MAX_DEPTH} at byte {}", self.pos));
        }
        self.depth += 1;
        let literal = match self.peek() {
            Some(b'{') => self.dict(),
            Some(b'(') => self.sequence(b')').map(Literal::Tuple),
            _ => self.sequence(b']').map(Literal::List),
        };
        self.depth -= 1;
        literal
    }

    fn dict(&mut self) -> Result<Literal, String> {
        self.pos += 1;
        let mut entries = Vec::new();
        loop {
            if self.eat(b'}') {
                return Ok(Literal::Dict(entries));
            }
            let key = match self.value()? {
                Literal::Str(key) => key,
                other => return Err(format!("dictionary key is not a string: {other:?}")),
            };
            if !self.eat(b':') {
                return Err(format!("expected `:` after key `{key}`"));
            }
            let value = self.value()?;
            entries.push((key, value));
            if !self.eat(b',') {
                if self.eat(b'}') {
                    return Ok(Literal::Dict(entries));
                }
                return Err(format!("expected `,` or `}}` at byte {}", self.pos));
            }
        }
    }

    fn sequence(&mut self, close: u8) -> Result<Vec<Literal>, String> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                return Ok(items);
            }
            items.push(self.value()?);
            if !self.eat(b',') {
                if self.eat(close) {
                    return Ok(items);
                }
                return Err(format!(
                    "expected `,` or `{}` at byte {}",
                    close as char, self.pos
                ));
            }
        }
    }

    fn string(&mut self, quote: u8) -> Result<String, String> {
        let start = self.pos + 1;
        let len = self.src[start..]
            .iter()
            .position(|&b| b == quote)
            .ok_or_else(|| "unterminated string".to_string())?;
        let raw = &self.src[start..start + len];
        if raw.contains(&b'\\') {
            return Err("escape sequences are not supported".to_string());
        }
        self.pos = start + len + 1;
        String::from_utf8(raw.to_vec()).map_err(|e| e.to_string())
    }

    fn int(&mut self) -> Result<Literal, String> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        let digits = std::str::from_utf8(&self.src[start..self.pos]).map_err(|e| e.to_string())?;
        let value = digits
            .parse::<i64>()
            .map_err(|e| format!("bad integer `{digits}`: {e}"))?;
        // Headers written by Python 2 carry long suffixes: (3L, 4L).
        if matches!(self.peek(), Some(b'L' | b'l')) {
            self.pos += 1;
        }
        Ok(Literal::Int(value))
    }

    fn word(&mut self) -> Result<Literal, String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
            self.pos += 1;
        }
        match &self.src[start..self.pos] {
            b"True" => Ok(Literal::Bool(true)),
            b"False" => Ok(Literal::Bool(false)),
            b"None" => Ok(Literal::None),
            other => Err(format!("unknown name `{}`", String::from_utf8_lossy(other))),
        }
    }
}
