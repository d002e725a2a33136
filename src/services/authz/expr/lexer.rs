use serde_json::Number;

use super::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Str(String),
    Num(Number),
    Hash,
    LParen,
    RParen,
    Comma,
    Dot,
    SafeDot,
    Bang,
    AndAnd,
    OrOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

pub fn tokenize(src: &str) -> Result<Vec<Spanned>, ParseError> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut out = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);

        let (token, width) = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            ',' => (Token::Comma, 1),
            '.' => (Token::Dot, 1),
            '#' => (Token::Hash, 1),
            '?' if next == Some('.') => (Token::SafeDot, 2),
            '!' if next == Some('=') => (Token::Ne, 2),
            '!' => (Token::Bang, 1),
            '=' if next == Some('=') => (Token::Eq, 2),
            '<' if next == Some('=') => (Token::Le, 2),
            '<' => (Token::Lt, 1),
            '>' if next == Some('=') => (Token::Ge, 2),
            '>' => (Token::Gt, 1),
            '&' if next == Some('&') => (Token::AndAnd, 2),
            '|' if next == Some('|') => (Token::OrOr, 2),
            '\'' | '"' => {
                let (s, consumed) = read_string(&chars, i, c)?;
                out.push(Spanned {
                    token: Token::Str(s),
                    pos,
                });
                i += consumed;
                continue;
            }
            c if c.is_ascii_digit() => {
                let (n, consumed) = read_number(&chars, i)?;
                out.push(Spanned {
                    token: Token::Num(n),
                    pos,
                });
                i += consumed;
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().map(|(_, c)| *c).collect();
                out.push(Spanned {
                    token: Token::Ident(ident),
                    pos,
                });
                continue;
            }
            other => return Err(ParseError::new(pos, format!("unexpected character '{other}'"))),
        };

        out.push(Spanned { token, pos });
        i += width;
    }

    Ok(out)
}

/// Quote doubling (`'it''s'`) escapes the quote character.
fn read_string(chars: &[(usize, char)], start: usize, quote: char) -> Result<(String, usize), ParseError> {
    let mut s = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i].1;
        if c == quote {
            if chars.get(i + 1).map(|(_, c)| *c) == Some(quote) {
                s.push(quote);
                i += 2;
                continue;
            }
            return Ok((s, i + 1 - start));
        }
        s.push(c);
        i += 1;
    }

    Err(ParseError::new(chars[start].0, "unterminated string literal"))
}

fn read_number(chars: &[(usize, char)], start: usize) -> Result<(Number, usize), ParseError> {
    let mut i = start;
    let mut seen_dot = false;

    while i < chars.len() {
        let c = chars[i].1;
        if c.is_ascii_digit() {
            i += 1;
        } else if c == '.'
            && !seen_dot
            && chars.get(i + 1).is_some_and(|(_, d)| d.is_ascii_digit())
        {
            seen_dot = true;
            i += 1;
        } else {
            break;
        }
    }

    let text: String = chars[start..i].iter().map(|(_, c)| *c).collect();
    let pos = chars[start].0;

    let number = if seen_dot {
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .ok_or_else(|| ParseError::new(pos, format!("invalid number '{text}'")))?
    } else {
        text.parse::<i64>()
            .map(Number::from)
            .map_err(|_| ParseError::new(pos, format!("invalid number '{text}'")))?
    };

    Ok((number, i - start))
}
