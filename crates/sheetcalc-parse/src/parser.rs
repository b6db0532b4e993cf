use std::error::Error;
use std::fmt::{self, Display};

use sheetcalc_common::{ErrorKind, Value, column_to_number, number_to_column, parse_number};

use crate::tokenizer::{Token, TokenSubType, TokenType, Tokenizer, TokenizerError};
use crate::types::{Associativity, BinaryOp, UnaryOp};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A parse failure. `position` is a byte offset into the formula text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParseError at position {}: {}", self.position, self.message)
    }
}

impl Error for ParseError {}

impl From<TokenizerError> for ParseError {
    fn from(err: TokenizerError) -> Self {
        ParseError {
            message: err.message,
            position: err.pos,
        }
    }
}

/// A syntactic reference, exactly as written. Rows and columns are 1-based
/// and range corners are not reordered; binding happens later.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReferenceType {
    Cell {
        sheet: Option<String>,
        row: u32,
        col: u32,
    },
    Range {
        sheet: Option<String>,
        start_row: u32,
        start_col: u32,
        end_row: u32,
        end_col: u32,
    },
    NamedRange(String),
}

impl ReferenceType {
    /// Parse reference text such as `A1`, `$B$2`, `Sheet2!A1:B5`,
    /// `'My Sheet'!C3` or a bare name.
    pub fn from_string(reference: &str) -> Result<Self, String> {
        let (sheet, rest) = Self::extract_sheet_name(reference)?;

        if let Some((first, second)) = rest.split_once(':') {
            let (start_col, start_row) = Self::parse_cell_reference(first)?;
            let (end_col, end_row) = Self::parse_cell_reference(second)?;
            return Ok(ReferenceType::Range {
                sheet,
                start_row,
                start_col,
                end_row,
                end_col,
            });
        }

        if let Ok((col, row)) = Self::parse_cell_reference(rest) {
            return Ok(ReferenceType::Cell { sheet, row, col });
        }

        if sheet.is_some() || looks_like_cell(rest) {
            return Err(format!("Invalid cell reference: {rest}"));
        }
        if is_identifier(rest) {
            return Ok(ReferenceType::NamedRange(rest.to_string()));
        }
        Err(format!("Invalid reference: {reference}"))
    }

    pub fn sheet(&self) -> Option<&str> {
        match self {
            ReferenceType::Cell { sheet, .. } | ReferenceType::Range { sheet, .. } => {
                sheet.as_deref()
            }
            ReferenceType::NamedRange(_) => None,
        }
    }

    /// Split `Sheet!rest` / `'Quoted ''Sheet'''!rest`.
    fn extract_sheet_name(reference: &str) -> Result<(Option<String>, &str), String> {
        if let Some(body) = reference.strip_prefix('\'') {
            let bytes = body.as_bytes();
            let mut name = String::new();
            let mut i = 0;
            while i < bytes.len() {
                if bytes[i] == b'\'' {
                    if bytes.get(i + 1) == Some(&b'\'') {
                        name.push('\'');
                        i += 2;
                        continue;
                    }
                    if bytes.get(i + 1) == Some(&b'!') && !name.is_empty() {
                        return Ok((Some(name), &body[i + 2..]));
                    }
                    break;
                }
                let ch_len = body[i..].chars().next().map_or(1, char::len_utf8);
                name.push_str(&body[i..i + ch_len]);
                i += ch_len;
            }
            return Err(format!("Invalid sheet qualifier in {reference}"));
        }

        match reference.split_once('!') {
            Some(("", _)) => Err(format!("Missing sheet name in {reference}")),
            Some((sheet, rest)) => Ok((Some(sheet.to_string()), rest)),
            None => Ok((None, reference)),
        }
    }

    /// `(col, row)`, both 1-based. `$` markers are accepted and ignored.
    fn parse_cell_reference(reference: &str) -> Result<(u32, u32), String> {
        let bytes = reference.as_bytes();
        let mut i = 0;

        if bytes.get(i) == Some(&b'$') {
            i += 1;
        }
        let col_start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }
        let col = column_to_number(&reference[col_start..i])
            .ok_or_else(|| format!("Invalid column in {reference}"))?;

        if bytes.get(i) == Some(&b'$') {
            i += 1;
        }
        let row_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == row_start || i != bytes.len() {
            return Err(format!("Invalid cell reference: {reference}"));
        }
        let row = reference[row_start..i]
            .parse::<u32>()
            .map_err(|_| format!("Invalid row in {reference}"))?;
        if row == 0 {
            return Err(format!("Row 0 is not valid in {reference}"));
        }
        Ok((col, row))
    }
}

/// Letters followed by digits, e.g. `A0` or `ABCD1`: never a name.
fn looks_like_cell(s: &str) -> bool {
    let body = s.trim_start_matches('$');
    let letters = body.bytes().take_while(u8::is_ascii_alphabetic).count();
    let rest = body[letters..].trim_start_matches('$');
    letters > 0 && !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit())
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

fn quote_sheet(sheet: &str) -> String {
    if sheet.chars().all(|c| c.is_alphanumeric() || c == '_') {
        sheet.to_string()
    } else {
        format!("'{}'", sheet.replace('\'', "''"))
    }
}

impl Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceType::Cell { sheet, row, col } => {
                if let Some(s) = sheet {
                    write!(f, "{}!", quote_sheet(s))?;
                }
                write!(f, "{}{}", number_to_column(*col), row)
            }
            ReferenceType::Range {
                sheet,
                start_row,
                start_col,
                end_row,
                end_col,
            } => {
                if let Some(s) = sheet {
                    write!(f, "{}!", quote_sheet(s))?;
                }
                write!(
                    f,
                    "{}{}:{}{}",
                    number_to_column(*start_col),
                    start_row,
                    number_to_column(*end_col),
                    end_row
                )
            }
            ReferenceType::NamedRange(name) => f.write_str(name),
        }
    }
}

/// Byte span of a node in the formula text.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    fn to(self, other: Span) -> Span {
        Span::new(self.start, other.end)
    }
}

impl From<&Token> for Span {
    fn from(token: &Token) -> Self {
        Span::new(token.start, token.end)
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum ASTNodeType {
    Literal(Value),
    Reference {
        original: String,
        reference: ReferenceType,
    },
    UnaryOp {
        op: UnaryOp,
        expr: Box<ASTNode>,
    },
    BinaryOp {
        op: BinaryOp,
        left: Box<ASTNode>,
        right: Box<ASTNode>,
    },
    Function {
        name: String,
        args: Vec<ASTNode>,
    },
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ASTNode {
    pub node_type: ASTNodeType,
    pub span: Span,
}

impl ASTNode {
    pub fn new(node_type: ASTNodeType, span: Span) -> Self {
        ASTNode { node_type, span }
    }

    /// All references in source order.
    pub fn references(&self) -> Vec<&ReferenceType> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, refs: &mut Vec<&'a ReferenceType>) {
        match &self.node_type {
            ASTNodeType::Reference { reference, .. } => refs.push(reference),
            ASTNodeType::UnaryOp { expr, .. } => expr.collect_references(refs),
            ASTNodeType::BinaryOp { left, right, .. } => {
                left.collect_references(refs);
                right.collect_references(refs);
            }
            ASTNodeType::Function { args, .. } => {
                for arg in args {
                    arg.collect_references(refs);
                }
            }
            ASTNodeType::Literal(_) => {}
        }
    }
}

/// Fully parenthesised rendering, mostly useful for checking precedence.
impl Display for ASTNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node_type {
            ASTNodeType::Literal(Value::Text(s)) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            ASTNodeType::Literal(v) => write!(f, "{v}"),
            ASTNodeType::Reference { reference, .. } => write!(f, "{reference}"),
            ASTNodeType::UnaryOp { op, expr } => write!(f, "{op}{expr}"),
            ASTNodeType::BinaryOp { op, left, right } => write!(f, "({left}{op}{right})"),
            ASTNodeType::Function { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Precedence-climbing parser over a token stream.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    source_len: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, source_len: usize) -> Self {
        Parser {
            tokens,
            position: 0,
            source_len,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn error_at(&self, message: impl Into<String>, position: usize) -> ParseError {
        ParseError {
            message: message.into(),
            position,
        }
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        let position = self.peek().map_or(self.source_len, |t| t.start);
        self.error_at(message, position)
    }

    pub fn parse(&mut self) -> Result<ASTNode, ParseError> {
        if self.tokens.is_empty() {
            return Err(self.error_at("Empty formula", 0));
        }

        let ast = self.parse_expression()?;
        if let Some(token) = self.peek() {
            return Err(self.error_at(
                format!("Unexpected trailing token '{}'", token.value),
                token.start,
            ));
        }
        Ok(ast)
    }

    fn parse_expression(&mut self) -> Result<ASTNode, ParseError> {
        self.parse_binary_op(0)
    }

    fn parse_binary_op(&mut self, min_precedence: u8) -> Result<ASTNode, ParseError> {
        let mut left = self.parse_unary_op()?;

        while let Some(token) = self.peek() {
            if token.token_type != TokenType::OpInfix {
                break;
            }
            let Some(op) = BinaryOp::from_symbol(&token.value) else {
                return Err(self.error_here(format!("Unknown operator '{}'", token.value)));
            };
            let (precedence, associativity) = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.position += 1;

            let next_min_precedence = match associativity {
                Associativity::Left => precedence + 1,
                Associativity::Right => precedence,
            };

            let right = self.parse_binary_op(next_min_precedence)?;
            let span = left.span.to(right.span);
            left = ASTNode::new(
                ASTNodeType::BinaryOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }

        Ok(left)
    }

    fn parse_unary_op(&mut self) -> Result<ASTNode, ParseError> {
        if let Some(token) = self.peek() {
            if token.token_type == TokenType::OpPrefix {
                let start = token.start;
                let Some(op) = UnaryOp::from_symbol(&token.value) else {
                    return Err(self.error_here(format!("Unknown prefix '{}'", token.value)));
                };
                self.position += 1;
                let expr = self.parse_unary_op()?;
                let span = Span::new(start, expr.span.end);
                return Ok(ASTNode::new(
                    ASTNodeType::UnaryOp {
                        op,
                        expr: Box::new(expr),
                    },
                    span,
                ));
            }
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<ASTNode, ParseError> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.error_here("Unexpected end of formula"));
        };

        match token.token_type {
            TokenType::Operand => {
                self.position += 1;
                self.parse_operand(token)
            }
            TokenType::Func if token.is_open() => {
                self.position += 1;
                self.parse_function(token)
            }
            TokenType::Paren if token.is_open() => {
                self.position += 1;
                let expr = self.parse_expression()?;
                match self.peek() {
                    Some(t) if t.token_type == TokenType::Paren && t.is_close() => {
                        let span = Span::new(token.start, t.end);
                        self.position += 1;
                        Ok(ASTNode::new(expr.node_type, span))
                    }
                    _ => Err(self.error_here("Expected closing parenthesis")),
                }
            }
            _ => Err(self.error_at(format!("Unexpected token '{}'", token.value), token.start)),
        }
    }

    fn parse_operand(&mut self, token: Token) -> Result<ASTNode, ParseError> {
        let span = Span::from(&token);
        let node_type = match token.subtype {
            TokenSubType::Number => {
                let value = parse_number(&token.value).ok_or_else(|| {
                    self.error_at(format!("Invalid number '{}'", token.value), token.start)
                })?;
                ASTNodeType::Literal(Value::Number(value))
            }
            TokenSubType::Text => {
                let inner = &token.value[1..token.value.len() - 1];
                ASTNodeType::Literal(Value::Text(inner.replace("\"\"", "\"")))
            }
            TokenSubType::Logical => {
                ASTNodeType::Literal(Value::Boolean(token.value.eq_ignore_ascii_case("TRUE")))
            }
            TokenSubType::Error => {
                let kind = ErrorKind::parse(&token.value).ok_or_else(|| {
                    self.error_at(format!("Invalid error literal '{}'", token.value), token.start)
                })?;
                ASTNodeType::Literal(Value::Error(kind))
            }
            TokenSubType::Range => {
                let reference = ReferenceType::from_string(&token.value)
                    .map_err(|e| self.error_at(e, token.start))?;
                ASTNodeType::Reference {
                    original: token.value,
                    reference,
                }
            }
            other => {
                return Err(self.error_at(
                    format!("Unexpected operand subtype {other:?}"),
                    token.start,
                ));
            }
        };
        Ok(ASTNode::new(node_type, span))
    }

    fn parse_function(&mut self, func_token: Token) -> Result<ASTNode, ParseError> {
        let name = &func_token.value[..func_token.value.len() - 1];
        if !is_identifier(name) {
            return Err(self.error_at(
                format!("Invalid function name '{name}'"),
                func_token.start,
            ));
        }
        let (args, end) = self.parse_function_arguments()?;
        Ok(ASTNode::new(
            ASTNodeType::Function {
                name: name.to_string(),
                args,
            },
            Span::new(func_token.start, end),
        ))
    }

    /// Arguments up to and including the closing `)`. Returns the end offset.
    fn parse_function_arguments(&mut self) -> Result<(Vec<ASTNode>, usize), ParseError> {
        let mut args = Vec::new();

        if let Some(t) = self.peek() {
            if t.token_type == TokenType::Func && t.is_close() {
                let end = t.end;
                self.position += 1;
                return Ok((args, end));
            }
        }

        loop {
            let empty_slot = matches!(
                self.peek(),
                Some(t) if t.token_type == TokenType::Sep
                    || (t.token_type == TokenType::Func && t.is_close())
            );
            if empty_slot {
                return Err(self.error_here("Empty function argument"));
            }
            args.push(self.parse_expression()?);

            match self.peek() {
                Some(t) if t.token_type == TokenType::Sep => {
                    self.position += 1;
                }
                Some(t) if t.token_type == TokenType::Func && t.is_close() => {
                    let end = t.end;
                    self.position += 1;
                    return Ok((args, end));
                }
                Some(t) => {
                    return Err(self.error_at(
                        format!("Expected ',' or ')' in function arguments, got '{}'", t.value),
                        t.start,
                    ));
                }
                None => return Err(self.error_here("Unexpected end of function arguments")),
            }
        }
    }
}

/// Parse formula text (leading `=` optional) into an unbound AST.
pub fn parse<T: AsRef<str>>(formula: T) -> Result<ASTNode, ParseError> {
    let formula = formula.as_ref();
    let tokenizer = Tokenizer::new(formula)?;
    let mut parser = Parser::new(tokenizer.into_tokens(), formula.len());
    parser.parse()
}
