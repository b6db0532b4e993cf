use std::error::Error;
use std::fmt::{self, Display};

use sheetcalc_common::ErrorKind;

use crate::types::{Associativity, BinaryOp, UNARY_PRECEDENCE};

const TOKEN_ENDERS: &str = ",;) +-*/^&=><\t\r\n";

const fn build_token_enders() -> [bool; 256] {
    let mut tbl = [false; 256];
    let bytes = TOKEN_ENDERS.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        tbl[bytes[i] as usize] = true;
        i += 1;
    }
    tbl
}
static TOKEN_ENDERS_TABLE: [bool; 256] = build_token_enders();

#[inline(always)]
fn is_token_ender(c: u8) -> bool {
    TOKEN_ENDERS_TABLE[c as usize]
}

/// A tokenizer failure with the byte offset where it was noticed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizerError {
    pub message: String,
    pub pos: usize,
}

impl fmt::Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenizerError at {}: {}", self.pos, self.message)
    }
}

impl Error for TokenizerError {}

/// The type of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Operand,
    Func,
    Paren,
    Sep,
    OpPrefix,
    OpInfix,
}

impl Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// The subtype of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenSubType {
    None,
    Text,
    Number,
    Logical,
    Error,
    Range,
    Open,
    Close,
    Arg,
}

/// A token in a formula. `start..end` is the byte span in the source text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub value: String,
    pub token_type: TokenType,
    pub subtype: TokenSubType,
    pub start: usize,
    pub end: usize,
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} subtype: {:?} value: {}>",
            self.token_type, self.subtype, self.value
        )
    }
}

impl Token {
    fn from_slice(
        source: &str,
        token_type: TokenType,
        subtype: TokenSubType,
        start: usize,
        end: usize,
    ) -> Self {
        Token {
            value: source[start..end].to_string(),
            token_type,
            subtype,
            start,
            end,
        }
    }

    fn make_operand_from_slice(source: &str, start: usize, end: usize) -> Self {
        let value_str = &source[start..end];
        let first = value_str.as_bytes().first().copied().unwrap_or(b' ');
        let subtype = if first == b'"' {
            TokenSubType::Text
        } else if first == b'#' {
            TokenSubType::Error
        } else if value_str.eq_ignore_ascii_case("TRUE") || value_str.eq_ignore_ascii_case("FALSE")
        {
            TokenSubType::Logical
        } else if first.is_ascii_digit() || first == b'.' {
            TokenSubType::Number
        } else {
            TokenSubType::Range
        };
        Token::from_slice(source, TokenType::Operand, subtype, start, end)
    }

    pub fn is_operator(&self) -> bool {
        matches!(self.token_type, TokenType::OpPrefix | TokenType::OpInfix)
    }

    pub fn is_open(&self) -> bool {
        self.subtype == TokenSubType::Open
    }

    pub fn is_close(&self) -> bool {
        self.subtype == TokenSubType::Close
    }

    pub fn get_precedence(&self) -> Option<(u8, Associativity)> {
        match self.token_type {
            TokenType::OpPrefix => Some((UNARY_PRECEDENCE, Associativity::Right)),
            TokenType::OpInfix => BinaryOp::from_symbol(&self.value).map(BinaryOp::precedence),
            _ => None,
        }
    }
}

/// A tokenizer for formula text. A leading `=` is optional.
pub struct Tokenizer {
    formula: String,
    pub items: Vec<Token>,
    token_stack: Vec<Token>,
    offset: usize,
    token_start: usize,
    token_end: usize,
}

impl Tokenizer {
    /// Create a new tokenizer and immediately tokenize the formula.
    pub fn new(formula: &str) -> Result<Self, TokenizerError> {
        let mut tokenizer = Tokenizer {
            formula: formula.to_string(),
            items: Vec::with_capacity(formula.len() / 2),
            token_stack: Vec::with_capacity(8),
            offset: 0,
            token_start: 0,
            token_end: 0,
        };
        tokenizer.parse()?;
        Ok(tokenizer)
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.items
    }

    #[inline]
    fn current_byte(&self) -> Option<u8> {
        self.formula.as_bytes().get(self.offset).copied()
    }

    #[inline]
    fn has_token(&self) -> bool {
        self.token_end > self.token_start
    }

    #[inline]
    fn start_token(&mut self) {
        self.token_start = self.offset;
        self.token_end = self.offset;
    }

    #[inline]
    fn extend_token(&mut self) {
        self.token_end = self.offset;
    }

    fn error(&self, message: impl Into<String>, pos: usize) -> TokenizerError {
        TokenizerError {
            message: message.into(),
            pos,
        }
    }

    fn parse(&mut self) -> Result<(), TokenizerError> {
        if self.formula.as_bytes().first() == Some(&b'=') {
            self.offset = 1;
        }
        self.start_token();

        while self.offset < self.formula.len() {
            if self.check_scientific_notation() {
                continue;
            }

            let curr_byte = self.formula.as_bytes()[self.offset];

            if is_token_ender(curr_byte) && self.has_token() {
                self.save_token();
                self.start_token();
            }

            match curr_byte {
                b'"' => self.parse_string()?,
                b'\'' => self.parse_quoted_sheet()?,
                b'#' => self.parse_error()?,
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.offset += 1;
                    self.start_token();
                }
                b'+' | b'-' | b'*' | b'/' | b'^' | b'&' | b'=' | b'>' | b'<' => {
                    self.parse_operator()
                }
                b'(' => self.parse_opener(),
                b')' => self.parse_closer()?,
                b',' => self.parse_separator()?,
                b';' | b'{' | b'}' | b'[' | b']' | b'%' => {
                    return Err(self.error(
                        format!("Unsupported character '{}'", curr_byte as char),
                        self.offset,
                    ));
                }
                _ => {
                    if !self.has_token() {
                        self.start_token();
                    }
                    self.offset += 1;
                    self.extend_token();
                }
            }
        }

        if self.has_token() {
            self.save_token();
        }

        if let Some(open) = self.token_stack.first() {
            return Err(self.error("Unmatched opening parenthesis", open.start));
        }

        Ok(())
    }

    /// Consume the sign of an exponent (`1.5E-3`) as part of the number.
    fn check_scientific_notation(&mut self) -> bool {
        if let Some(curr_byte) = self.current_byte() {
            if (curr_byte == b'+' || curr_byte == b'-')
                && self.has_token()
                && self.is_scientific_notation_base()
            {
                self.offset += 1;
                self.extend_token();
                return true;
            }
        }
        false
    }

    fn is_scientific_notation_base(&self) -> bool {
        let token_slice = &self.formula.as_bytes()[self.token_start..self.token_end];
        if token_slice.len() < 2 {
            return false;
        }
        let last = token_slice[token_slice.len() - 1];
        if !(last == b'E' || last == b'e') || !token_slice[0].is_ascii_digit() {
            return false;
        }
        let mut dot_seen = false;
        for &ch in &token_slice[1..token_slice.len() - 1] {
            match ch {
                b'0'..=b'9' => {}
                b'.' if !dot_seen => dot_seen = true,
                _ => return false,
            }
        }
        true
    }

    fn save_token(&mut self) {
        if self.has_token() {
            let token =
                Token::make_operand_from_slice(&self.formula, self.token_start, self.token_end);
            self.items.push(token);
        }
    }

    /// `"..."` with `""` as an escaped quote.
    fn parse_string(&mut self) -> Result<(), TokenizerError> {
        if self.has_token() {
            return Err(self.error("Unexpected '\"' inside operand", self.offset));
        }
        let start = self.offset;
        let bytes = self.formula.as_bytes();
        let mut i = start + 1;
        while i < bytes.len() {
            if bytes[i] == b'"' {
                if bytes.get(i + 1) == Some(&b'"') {
                    i += 2;
                    continue;
                }
                self.items.push(Token::from_slice(
                    &self.formula,
                    TokenType::Operand,
                    TokenSubType::Text,
                    start,
                    i + 1,
                ));
                self.offset = i + 1;
                self.start_token();
                return Ok(());
            }
            i += 1;
        }
        Err(self.error("Unterminated string literal", start))
    }

    /// `'Sheet name'!` prefix. The quoted part joins the operand being built.
    fn parse_quoted_sheet(&mut self) -> Result<(), TokenizerError> {
        if self.has_token() {
            return Err(self.error("Unexpected quote inside operand", self.offset));
        }
        let start = self.offset;
        let bytes = self.formula.as_bytes();
        let mut i = start + 1;
        while i < bytes.len() {
            if bytes[i] == b'\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    i += 2;
                    continue;
                }
                if bytes.get(i + 1) != Some(&b'!') {
                    return Err(self.error("Quoted sheet name must be followed by '!'", start));
                }
                self.token_start = start;
                self.offset = i + 1;
                self.extend_token();
                return Ok(());
            }
            i += 1;
        }
        Err(self.error("Unterminated sheet name", start))
    }

    fn parse_error(&mut self) -> Result<(), TokenizerError> {
        if self.has_token() {
            return Err(self.error("Unexpected '#' inside operand", self.offset));
        }
        let rest = &self.formula[self.offset..];
        let matched = ErrorKind::ALL
            .iter()
            .map(|k| k.as_str())
            .chain(std::iter::once("#CIRC!"))
            .filter(|code| {
                rest.get(..code.len())
                    .is_some_and(|head| head.eq_ignore_ascii_case(code))
            })
            .max_by_key(|code| code.len());
        match matched {
            Some(code) => {
                let start = self.offset;
                let end = start + code.len();
                self.items.push(Token::from_slice(
                    &self.formula,
                    TokenType::Operand,
                    TokenSubType::Error,
                    start,
                    end,
                ));
                self.offset = end;
                self.start_token();
                Ok(())
            }
            None => Err(self.error("Invalid error literal", self.offset)),
        }
    }

    fn parse_operator(&mut self) {
        self.save_token();

        if self.offset + 1 < self.formula.len() {
            let two_char = &self.formula.as_bytes()[self.offset..self.offset + 2];
            if two_char == b">=" || two_char == b"<=" || two_char == b"<>" {
                self.items.push(Token::from_slice(
                    &self.formula,
                    TokenType::OpInfix,
                    TokenSubType::None,
                    self.offset,
                    self.offset + 2,
                ));
                self.offset += 2;
                self.start_token();
                return;
            }
        }

        let curr_byte = self.formula.as_bytes()[self.offset];
        let token_type = match curr_byte {
            b'+' | b'-' => match self.items.last() {
                Some(prev)
                    if prev.token_type == TokenType::Operand
                        || prev.subtype == TokenSubType::Close =>
                {
                    TokenType::OpInfix
                }
                _ => TokenType::OpPrefix,
            },
            _ => TokenType::OpInfix,
        };

        self.items.push(Token::from_slice(
            &self.formula,
            token_type,
            TokenSubType::None,
            self.offset,
            self.offset + 1,
        ));
        self.offset += 1;
        self.start_token();
    }

    /// `(`: a function call when an operand is pending, else a group.
    fn parse_opener(&mut self) {
        let token = if self.has_token() {
            Token::from_slice(
                &self.formula,
                TokenType::Func,
                TokenSubType::Open,
                self.token_start,
                self.offset + 1,
            )
        } else {
            Token::from_slice(
                &self.formula,
                TokenType::Paren,
                TokenSubType::Open,
                self.offset,
                self.offset + 1,
            )
        };

        self.items.push(token.clone());
        self.token_stack.push(token);
        self.offset += 1;
        self.start_token();
    }

    fn parse_closer(&mut self) -> Result<(), TokenizerError> {
        self.save_token();

        let Some(open_token) = self.token_stack.pop() else {
            return Err(self.error("No matching opening parenthesis", self.offset));
        };
        self.items.push(Token::from_slice(
            &self.formula,
            open_token.token_type,
            TokenSubType::Close,
            self.offset,
            self.offset + 1,
        ));

        self.offset += 1;
        self.start_token();
        Ok(())
    }

    fn parse_separator(&mut self) -> Result<(), TokenizerError> {
        self.save_token();

        match self.token_stack.last() {
            Some(top) if top.token_type == TokenType::Func => {
                self.items.push(Token::from_slice(
                    &self.formula,
                    TokenType::Sep,
                    TokenSubType::Arg,
                    self.offset,
                    self.offset + 1,
                ));
                self.offset += 1;
                self.start_token();
                Ok(())
            }
            _ => Err(self.error("Unexpected ',' outside a function call", self.offset)),
        }
    }

    /// Reconstruct the formula from the tokens, without whitespace.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.formula.len() + 1);
        out.push('=');
        for token in &self.items {
            out.push_str(&token.value);
        }
        out
    }
}

impl TryFrom<&str> for Tokenizer {
    type Error = TokenizerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Tokenizer::new(value)
    }
}
