//! Target function expressions in the single variable `x`.
//!
//! Grammar (usual precedence, `^` binds tighter than unary minus and is right
//! associative):
//!
//! ```text
//! expr  := term (('+' | '-') term)*
//! term  := unary (('*' | '/') unary)*
//! unary := ('-' | '+') unary | power
//! power := atom (('^' | '**') unary)?
//! atom  := number | 'x' | 'pi' | 'e' | name '(' expr ')' | '(' expr ')'
//! ```

use std::fmt;
use std::str::FromStr;

use axf_core::errors::{AxfError, ErrorInfo};

/// Deepest syntax tree the parser builds; operator chains count one level per operator.
pub const MAX_DEPTH: usize = 256;

fn parse_error(source: &str, position: usize, message: impl Into<String>) -> AxfError {
    AxfError::Evaluation(
        ErrorInfo::new("expr-parse", message.into())
            .with_context("expr", source)
            .with_context("position", position.to_string()),
    )
}

/// Elementary functions accepted in expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Exp,
    Expm1,
    Log,
    Log1p,
    Log2,
    Log10,
    Sqrt,
    Cbrt,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Abs,
}

impl Func {
    fn from_name(name: &str) -> Option<Self> {
        let func = match name {
            "exp" => Func::Exp,
            "expm1" => Func::Expm1,
            "log" | "ln" => Func::Log,
            "log1p" => Func::Log1p,
            "log2" => Func::Log2,
            "log10" => Func::Log10,
            "sqrt" => Func::Sqrt,
            "cbrt" => Func::Cbrt,
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "asin" => Func::Asin,
            "acos" => Func::Acos,
            "atan" => Func::Atan,
            "sinh" => Func::Sinh,
            "cosh" => Func::Cosh,
            "tanh" => Func::Tanh,
            "abs" => Func::Abs,
            _ => return None,
        };
        Some(func)
    }

    fn name(self) -> &'static str {
        match self {
            Func::Exp => "exp",
            Func::Expm1 => "expm1",
            Func::Log => "log",
            Func::Log1p => "log1p",
            Func::Log2 => "log2",
            Func::Log10 => "log10",
            Func::Sqrt => "sqrt",
            Func::Cbrt => "cbrt",
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Asin => "asin",
            Func::Acos => "acos",
            Func::Atan => "atan",
            Func::Sinh => "sinh",
            Func::Cosh => "cosh",
            Func::Tanh => "tanh",
            Func::Abs => "abs",
        }
    }

    fn apply(self, v: f64) -> f64 {
        match self {
            Func::Exp => v.exp(),
            Func::Expm1 => v.exp_m1(),
            Func::Log => v.ln(),
            Func::Log1p => v.ln_1p(),
            Func::Log2 => v.log2(),
            Func::Log10 => v.log10(),
            Func::Sqrt => v.sqrt(),
            Func::Cbrt => v.cbrt(),
            Func::Sin => v.sin(),
            Func::Cos => v.cos(),
            Func::Tan => v.tan(),
            Func::Asin => v.asin(),
            Func::Acos => v.acos(),
            Func::Atan => v.atan(),
            Func::Sinh => v.sinh(),
            Func::Cosh => v.cosh(),
            Func::Tanh => v.tanh(),
            Func::Abs => v.abs(),
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Pow => "^",
        }
    }
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f64),
    Var,
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(Func, Box<Expr>),
}

impl Expr {
    /// Parses an expression in `x`.
    pub fn parse(source: &str) -> Result<Self, AxfError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            source,
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.expr()?;
        if let Some((offset, token)) = parser.tokens.get(parser.pos) {
            return Err(parse_error(
                source,
                *offset,
                format!("unexpected trailing token {token:?}"),
            ));
        }
        Ok(expr)
    }

    /// Evaluates at `x`. Domain errors surface as NaN or infinities.
    pub fn eval(&self, x: f64) -> f64 {
        match self {
            Expr::Const(value) => *value,
            Expr::Var => x,
            Expr::Neg(inner) => -inner.eval(x),
            Expr::Binary(op, lhs, rhs) => {
                let a = lhs.eval(x);
                let b = rhs.eval(x);
                match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                    BinOp::Pow => pow(a, b),
                }
            }
            Expr::Call(func, arg) => func.apply(arg.eval(x)),
        }
    }
}

fn pow(base: f64, exponent: f64) -> f64 {
    if exponent.fract() == 0.0 && exponent.abs() <= i32::MAX as f64 {
        base.powi(exponent as i32)
    } else {
        base.powf(exponent)
    }
}

impl FromStr for Expr {
    type Err = AxfError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        Expr::parse(source)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(value) => write!(f, "{value}"),
            Expr::Var => write!(f, "x"),
            Expr::Neg(inner) => write!(f, "(-{inner})"),
            Expr::Binary(op, lhs, rhs) => write!(f, "({lhs} {} {rhs})", op.symbol()),
            Expr::Call(func, arg) => write!(f, "{}({arg})", func.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    Pow,
    LParen,
    RParen,
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, AxfError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let (offset, c) = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                    i += 1;
                }
                if i < chars.len() && matches!(chars[i].1, 'e' | 'E') {
                    let digit_at = |j: usize| chars.get(j).is_some_and(|(_, c)| c.is_ascii_digit());
                    let signed = chars.get(i + 1).is_some_and(|(_, c)| matches!(c, '+' | '-'));
                    if digit_at(i + 1) || (signed && digit_at(i + 2)) {
                        i += if signed { 2 } else { 1 };
                        while i < chars.len() && chars[i].1.is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let end = chars.get(i).map_or(source.len(), |(offset, _)| *offset);
                let text = &source[chars[start].0..end];
                let value = text
                    .parse::<f64>()
                    .map_err(|_| parse_error(source, offset, format!("invalid number `{text}`")))?;
                tokens.push((offset, Token::Number(value)));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].1.is_ascii_alphanumeric() || chars[i].1 == '_') {
                    i += 1;
                }
                let end = chars.get(i).map_or(source.len(), |(offset, _)| *offset);
                tokens.push((offset, Token::Ident(source[chars[start].0..end].to_string())));
            }
            '*' if chars.get(i + 1).is_some_and(|(_, c)| *c == '*') => {
                tokens.push((offset, Token::Pow));
                i += 2;
            }
            '^' => {
                tokens.push((offset, Token::Pow));
                i += 1;
            }
            '+' | '-' | '*' | '/' => {
                tokens.push((offset, Token::Op(c)));
                i += 1;
            }
            '(' => {
                tokens.push((offset, Token::LParen));
                i += 1;
            }
            ')' => {
                tokens.push((offset, Token::RParen));
                i += 1;
            }
            other => {
                return Err(parse_error(
                    source,
                    offset,
                    format!("unexpected character `{other}`"),
                ))
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, token)| token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.source.len(), |(offset, _)| *offset)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, token)| token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn enter(&mut self) -> Result<(), AxfError> {
        if self.depth >= MAX_DEPTH {
            return Err(parse_error(
                self.source,
                self.offset(),
                format!("expression nests deeper than {MAX_DEPTH} levels"),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn expr(&mut self) -> Result<Expr, AxfError> {
        let saved = self.depth;
        let result = self.expr_chain();
        self.depth = saved;
        result
    }

    fn expr_chain(&mut self) -> Result<Expr, AxfError> {
        let mut lhs = self.term()?;
        while let Some(Token::Op(c @ ('+' | '-'))) = self.peek() {
            let op = if *c == '+' { BinOp::Add } else { BinOp::Sub };
            self.enter()?;
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, AxfError> {
        let saved = self.depth;
        let result = self.term_chain();
        self.depth = saved;
        result
    }

    fn term_chain(&mut self) -> Result<Expr, AxfError> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(c @ ('*' | '/'))) = self.peek() {
            let op = if *c == '*' { BinOp::Mul } else { BinOp::Div };
            self.enter()?;
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, AxfError> {
        self.enter()?;
        let result = self.unary_inner();
        self.depth -= 1;
        result
    }

    fn unary_inner(&mut self) -> Result<Expr, AxfError> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                Ok(Expr::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, AxfError> {
        let base = self.atom()?;
        if let Some(Token::Pow) = self.peek() {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, AxfError> {
        let offset = self.offset();
        match self.bump() {
            Some(Token::Number(value)) => Ok(Expr::Const(value)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect_rparen()?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "x" => Ok(Expr::Var),
                "pi" => Ok(Expr::Const(std::f64::consts::PI)),
                "e" => Ok(Expr::Const(std::f64::consts::E)),
                _ => {
                    let func = Func::from_name(&name).ok_or_else(|| {
                        parse_error(self.source, offset, format!("unknown identifier `{name}`"))
                    })?;
                    if self.bump() != Some(Token::LParen) {
                        return Err(parse_error(
                            self.source,
                            offset,
                            format!("expected `(` after `{name}`"),
                        ));
                    }
                    let arg = self.expr()?;
                    self.expect_rparen()?;
                    Ok(Expr::Call(func, Box::new(arg)))
                }
            },
            Some(token) => Err(parse_error(
                self.source,
                offset,
                format!("unexpected token {token:?}"),
            )),
            None => Err(parse_error(self.source, offset, "unexpected end of expression")),
        }
    }

    fn expect_rparen(&mut self) -> Result<(), AxfError> {
        let offset = self.offset();
        match self.bump() {
            Some(Token::RParen) => Ok(()),
            _ => Err(parse_error(self.source, offset, "expected `)`")),
        }
    }
}
