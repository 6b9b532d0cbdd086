//! Directive syntax: `{{ name(arg, key=value) }}` spans inside a document.
//!
//! ```text
//! expr := call | string | bool
//! call := ident "(" [ arg { "," arg } [","] ] ")"
//! arg  := ident "=" expr | expr
//! ```
//!
//! Strings take single or double quotes with `\"`, `\'`, `\\` and `\n`
//! escapes. Booleans are `true` / `false`. A directive must open and close
//! on the same line; `}}` inside a quoted string does not close it.

use crate::error::FigrefError;
use std::collections::HashMap;
use std::iter::Peekable;
use std::str::CharIndices;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// A piece of a source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Text copied to the output unchanged.
    Text(&'a str),
    /// The expression between `{{` and `}}`, untrimmed.
    Directive(&'a str),
}

/// Split one line into text and directive segments.
pub fn split_line(line: &str, line_no: usize) -> Result<Vec<Segment<'_>>, FigrefError> {
    let mut segments = Vec::new();
    let mut rest = line;

    while let Some(open) = rest.find(OPEN) {
        if open > 0 {
            segments.push(Segment::Text(&rest[..open]));
        }
        let body_start = open + OPEN.len();
        let close = find_close(&rest[body_start..])
            .ok_or(FigrefError::UnterminatedDirective { line: line_no })?;
        segments.push(Segment::Directive(&rest[body_start..body_start + close]));
        rest = &rest[body_start + close + CLOSE.len()..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }
    Ok(segments)
}

/// Offset of the first `}}` outside a quoted string.
fn find_close(s: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '}' if s[i..].starts_with(CLOSE) => return Some(i),
            _ => {}
        }
    }
    None
}

// ── AST ──────────────────────────────────────────────────────────────────

/// A directive value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Bool(bool),
    Call(Call),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "a string",
            Value::Bool(_) => "a boolean",
            Value::Call(_) => "a function call",
        }
    }
}

/// A function call, e.g. `cap("fig_a", "Sources", center=true)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub name: String,
    pub args: Vec<Arg>,
}

/// One call argument, positional when `name` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Value,
}

/// Arguments matched to a function's parameter list.
#[derive(Debug)]
pub struct Args<'a> {
    func: &'a str,
    values: HashMap<&'static str, &'a Value>,
}

impl Call {
    /// Match arguments to `params`. Positional arguments fill parameters in
    /// order; keywords may name any parameter once.
    pub fn bind(&self, params: &[&'static str]) -> Result<Args<'_>, String> {
        let mut values: HashMap<&'static str, &Value> = HashMap::with_capacity(self.args.len());
        let mut position = 0;

        for arg in &self.args {
            let param = match arg.name {
                Some(ref name) => params
                    .iter()
                    .copied()
                    .find(|p| *p == name.as_str())
                    .ok_or_else(|| format!("{}() has no parameter '{}'", self.name, name))?,
                None => {
                    let p = params.get(position).copied().ok_or_else(|| {
                        format!(
                            "{}() takes at most {} positional arguments",
                            self.name,
                            params.len()
                        )
                    })?;
                    position += 1;
                    p
                }
            };
            if values.insert(param, &arg.value).is_some() {
                return Err(format!("{}() got '{}' twice", self.name, param));
            }
        }

        Ok(Args {
            func: &self.name,
            values,
        })
    }
}

impl<'a> Args<'a> {
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.values.get(name).copied()
    }

    pub fn str(&self, name: &str) -> Result<Option<&'a str>, String> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.as_str())),
            Some(v) => Err(format!(
                "{}(): '{}' must be a string, got {}",
                self.func,
                name,
                v.kind()
            )),
        }
    }

    pub fn required_str(&self, name: &str) -> Result<&'a str, String> {
        self.str(name)?
            .ok_or_else(|| format!("{}(): missing required argument '{}'", self.func, name))
    }

    pub fn bool(&self, name: &str) -> Result<Option<bool>, String> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(v) => Err(format!(
                "{}(): '{}' must be true or false, got {}",
                self.func,
                name,
                v.kind()
            )),
        }
    }
}

// ── Parser ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    Comma,
    Eq,
}

fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars: Peekable<CharIndices<'_>> = src.char_indices().peekable();

    while let Some(&(i, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Eq);
            }
            '"' | '\'' => {
                chars.next();
                tokens.push(Token::Str(read_string(&mut chars, c, i)?));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => return Err(format!("unexpected character '{}' at column {}", other, i + 1)),
        }
    }
    Ok(tokens)
}

/// Decode the quoted string literal `src` starts with, escapes included.
///
/// Returns `None` when `src` does not open with a quote or the string is
/// never closed. The pre-scan uses this so its labels match what the
/// tokenizer reads from the same call.
pub fn leading_string(src: &str) -> Option<String> {
    let mut chars = src.char_indices().peekable();
    match chars.next() {
        Some((i, q @ ('"' | '\''))) => read_string(&mut chars, q, i).ok(),
        _ => None,
    }
}

fn read_string(
    chars: &mut Peekable<CharIndices<'_>>,
    quote: char,
    start: usize,
) -> Result<String, String> {
    let mut s = String::new();
    while let Some((_, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => s.push('\n'),
                Some((_, e)) => s.push(e),
                None => break,
            },
            c if c == quote => return Ok(s),
            c => s.push(c),
        }
    }
    Err(format!("unterminated string starting at column {}", start + 1))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect(&mut self, want: Token, what: &str) -> Result<(), String> {
        match self.next() {
            Some(ref t) if *t == want => Ok(()),
            Some(t) => Err(format!("expected {}, found {}", what, describe(&t))),
            None => Err(format!("expected {}, found end of directive", what)),
        }
    }

    fn value(&mut self) -> Result<Value, String> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Value::Str(s)),
            Some(Token::Ident(id)) => match id.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => self.call_rest(id).map(Value::Call),
            },
            Some(t) => Err(format!("expected a value, found {}", describe(&t))),
            None => Err("expected a value, found end of directive".into()),
        }
    }

    fn call_rest(&mut self, name: String) -> Result<Call, String> {
        self.expect(Token::LParen, &format!("'(' after '{}'", name))?;
        let mut args = Vec::new();

        loop {
            if self.peek() == Some(&Token::RParen) {
                self.next();
                break;
            }
            args.push(self.arg()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                Some(t) => return Err(format!("expected ',' or ')', found {}", describe(&t))),
                None => return Err(format!("missing ')' to close {}(", name)),
            }
        }
        Ok(Call { name, args })
    }

    fn arg(&mut self) -> Result<Arg, String> {
        if let (Some(Token::Ident(name)), Some(Token::Eq)) =
            (self.tokens.get(self.pos), self.tokens.get(self.pos + 1))
        {
            let name = name.clone();
            self.pos += 2;
            return Ok(Arg {
                name: Some(name),
                value: self.value()?,
            });
        }
        Ok(Arg {
            name: None,
            value: self.value()?,
        })
    }
}

fn describe(t: &Token) -> String {
    match t {
        Token::Ident(s) => format!("'{}'", s),
        Token::Str(s) => format!("string \"{}\"", s),
        Token::LParen => "'('".into(),
        Token::RParen => "')'".into(),
        Token::Comma => "','".into(),
        Token::Eq => "'='".into(),
    }
}

/// Parse a directive body into a single function call.
pub fn parse(src: &str, line_no: usize) -> Result<Call, FigrefError> {
    let invalid = |detail: String| FigrefError::InvalidDirective {
        line: line_no,
        detail,
    };

    let tokens = tokenize(src).map_err(invalid)?;
    if tokens.is_empty() {
        return Err(invalid("empty directive".into()));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let call = match parser.value().map_err(invalid)? {
        Value::Call(c) => c,
        other => {
            return Err(invalid(format!(
                "a directive must be a function call, got {}",
                other.kind()
            )))
        }
    };
    if let Some(t) = parser.peek() {
        return Err(invalid(format!("unexpected {} after call", describe(t))));
    }
    Ok(call)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Value {
        Value::Str(v.into())
    }

    #[test]
    fn test_split_plain_line() {
        assert_eq!(split_line("no directives", 1).unwrap(), vec![Segment::Text("no directives")]);
        assert!(split_line("", 1).unwrap().is_empty());
    }

    #[test]
    fn test_split_mixed_line() {
        let segs = split_line("See {{ ref(\"a\") }} and {{ref('b')}}.", 1).unwrap();
        assert_eq!(
            segs,
            vec![
                Segment::Text("See "),
                Segment::Directive(" ref(\"a\") "),
                Segment::Text(" and "),
                Segment::Directive("ref('b')"),
                Segment::Text("."),
            ]
        );
    }

    #[test]
    fn test_close_inside_string_ignored() {
        let segs = split_line("{{ cap(\"a\", \"x }} y\") }}", 1).unwrap();
        assert_eq!(segs, vec![Segment::Directive(" cap(\"a\", \"x }} y\") ")]);
    }

    #[test]
    fn test_unterminated() {
        let err = split_line("text {{ ref(\"a\")", 7).unwrap_err();
        assert!(matches!(err, FigrefError::UnterminatedDirective { line: 7 }));
    }

    #[test]
    fn test_parse_call_with_keywords() {
        let call = parse("cap(\"fig_a\", 'Sources', center=true, color=\"gray\",)", 1).unwrap();
        assert_eq!(call.name, "cap");
        assert_eq!(call.args.len(), 4);
        assert_eq!(call.args[1].value, s("Sources"));
        assert_eq!(call.args[2].name.as_deref(), Some("center"));
        assert_eq!(call.args[2].value, Value::Bool(true));
    }

    #[test]
    fn test_parse_nested_call() {
        let call = parse("figure(\"r.png\", caption=cap(\"fig_r\", \"R\"), align=\"center\")", 1).unwrap();
        match &call.args[1].value {
            Value::Call(inner) => {
                assert_eq!(inner.name, "cap");
                assert_eq!(inner.args[0].value, s("fig_r"));
            }
            other => panic!("expected nested call, got {other:?}"),
        }
    }

    #[test]
    fn test_string_escapes() {
        let call = parse(r#"cap("a", "say \"hi\"\nnow")"#, 1).unwrap();
        assert_eq!(call.args[1].value, s("say \"hi\"\nnow"));
    }

    #[test]
    fn test_leading_string() {
        assert_eq!(leading_string(r#"" a\"b ", "x")"#).as_deref(), Some(" a\"b "));
        assert_eq!(leading_string("'it\"s')").as_deref(), Some("it\"s"));
        assert_eq!(leading_string("label)"), None);
        assert_eq!(leading_string("\"open"), None);
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "\"just a string\"", "cap(", "cap(\"a\" \"b\")", "cap(\"a\") extra", "cap(#)", "cap(\"open)"] {
            let err = parse(bad, 4).unwrap_err();
            assert!(
                matches!(err, FigrefError::InvalidDirective { line: 4, .. }),
                "input {bad:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_bind_positional_and_keyword() {
        let call = parse("ref(\"a\", check=false)", 1).unwrap();
        let args = call.bind(&["label", "link", "check"]).unwrap();
        assert_eq!(args.required_str("label").unwrap(), "a");
        assert_eq!(args.bool("check").unwrap(), Some(false));
        assert_eq!(args.bool("link").unwrap(), None);
    }

    #[test]
    fn test_bind_rejects_unknown_and_duplicate() {
        let call = parse("ref(\"a\", colour=\"red\")", 1).unwrap();
        assert!(call.bind(&["label"]).unwrap_err().contains("colour"));

        let call = parse("ref(\"a\", label=\"b\")", 1).unwrap();
        assert!(call.bind(&["label"]).unwrap_err().contains("twice"));

        let call = parse("ref(\"a\", \"b\")", 1).unwrap();
        assert!(call.bind(&["label"]).is_err());
    }

    #[test]
    fn test_type_errors() {
        let call = parse("cap(true)", 1).unwrap();
        let args = call.bind(&["label"]).unwrap();
        assert!(args.required_str("label").unwrap_err().contains("must be a string"));

        let call = parse("cap()", 1).unwrap();
        let args = call.bind(&["label"]).unwrap();
        assert!(args.required_str("label").unwrap_err().contains("missing"));
    }
}
