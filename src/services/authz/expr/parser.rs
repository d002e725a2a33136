use serde_json::Value;

use super::ParseError;
use super::lexer::{Spanned, Token, tokenize};

/// The closed set of callable predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    HasRole,
    HasAnyRole,
    HasAllRoles,
    IsAuthenticated,
}

impl Builtin {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "hasRole" => Some(Self::HasRole),
            "hasAnyRole" => Some(Self::HasAnyRole),
            "hasAllRoles" => Some(Self::HasAllRoles),
            "isAuthenticated" => Some(Self::IsAuthenticated),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::HasRole => "hasRole",
            Self::HasAnyRole => "hasAnyRole",
            Self::HasAllRoles => "hasAllRoles",
            Self::IsAuthenticated => "isAuthenticated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// `user` or a bare argument name.
    Var(String),
    /// `#name`
    Arg(String),
    Member {
        target: Box<Expr>,
        field: String,
        null_safe: bool,
    },
    Call {
        builtin: Builtin,
        args: Vec<Expr>,
    },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: CmpOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    In {
        needle: Box<Expr>,
        haystack: Box<Expr>,
    },
}

pub fn parse(src: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: src.len(),
    };

    if parser.tokens.is_empty() {
        return Err(ParseError::new(0, "empty expression"));
    }

    let expr = parser.or_expr()?;
    match parser.peek() {
        None => Ok(expr),
        Some(t) => Err(ParseError::new(t.pos, format!("unexpected token {:?}", t.token))),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn here(&self) -> usize {
        self.peek().map(|t| t.pos).unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek().is_some_and(|t| &t.token == token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let hit = matches!(self.peek(), Some(Spanned { token: Token::Ident(s), .. }) if s.eq_ignore_ascii_case(keyword));
        if hit {
            self.pos += 1;
        }
        hit
    }

    fn expect(&mut self, token: Token) -> Result<(), ParseError> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(ParseError::new(self.here(), format!("expected {token:?}")))
        }
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.and_expr()?;
        while self.eat(&Token::OrOr) || self.eat_keyword("or") {
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.not_expr()?;
        while self.eat(&Token::AndAnd) || self.eat_keyword("and") {
            let rhs = self.not_expr()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Bang) || self.eat_keyword("not") {
            return Ok(Expr::Not(Box::new(self.not_expr()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.postfix()?;

        if self.eat_keyword("in") {
            let haystack = self.postfix()?;
            return Ok(Expr::In {
                needle: Box::new(lhs),
                haystack: Box::new(haystack),
            });
        }

        let op = match self.peek().map(|t| &t.token) {
            Some(Token::Eq) => CmpOp::Eq,
            Some(Token::Ne) => CmpOp::Ne,
            Some(Token::Lt) => CmpOp::Lt,
            Some(Token::Le) => CmpOp::Le,
            Some(Token::Gt) => CmpOp::Gt,
            Some(Token::Ge) => CmpOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;

        let rhs = self.postfix()?;
        Ok(Expr::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            let null_safe = if self.eat(&Token::Dot) {
                false
            } else if self.eat(&Token::SafeDot) {
                true
            } else {
                return Ok(expr);
            };

            let field = self.ident()?;
            expr = Expr::Member {
                target: Box::new(expr),
                field,
                null_safe,
            };
        }
    }

    fn ident(&mut self) -> Result<String, ParseError> {
        let pos = self.here();
        match self.advance() {
            Some(Spanned {
                token: Token::Ident(name),
                ..
            }) => Ok(name),
            _ => Err(ParseError::new(pos, "expected identifier")),
        }
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let pos = self.here();
        let Some(Spanned { token, .. }) = self.advance() else {
            return Err(ParseError::new(pos, "unexpected end of expression"));
        };

        match token {
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Num(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::LParen => {
                let inner = self.or_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Hash => {
                let name = self.ident()?;
                if self.peek().is_some_and(|t| t.token == Token::LParen) {
                    self.call(&name, pos)
                } else {
                    Ok(Expr::Arg(name))
                }
            }
            Token::Ident(name) => {
                if self.peek().is_some_and(|t| t.token == Token::LParen) {
                    return self.call(&name, pos);
                }
                match name.to_ascii_lowercase().as_str() {
                    "true" => Ok(Expr::Literal(Value::Bool(true))),
                    "false" => Ok(Expr::Literal(Value::Bool(false))),
                    "null" => Ok(Expr::Literal(Value::Null)),
                    "and" | "or" | "not" | "in" => {
                        Err(ParseError::new(pos, format!("unexpected keyword '{name}'")))
                    }
                    _ => Ok(Expr::Var(name)),
                }
            }
            other => Err(ParseError::new(pos, format!("unexpected token {other:?}"))),
        }
    }

    fn call(&mut self, name: &str, pos: usize) -> Result<Expr, ParseError> {
        let builtin = Builtin::from_name(name)
            .ok_or_else(|| ParseError::new(pos, format!("unknown function '{name}'")))?;

        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.or_expr()?);
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(Token::Comma)?;
            }
        }

        Ok(Expr::Call { builtin, args })
    }
}
