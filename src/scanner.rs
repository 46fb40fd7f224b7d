//! Lexical analyzer

use std::iter::Peekable;
use std::str::CharIndices;

use crate::diag::{LexError, LexErrorKind, Line, ScanErrors};
use crate::token::{Literal, Token, TokenKind};

/// Turn source text into a sequence of tokens.
///
/// Lexical errors do not stop the scan: they are collected and the scanner carries on with the
/// next character so that a single pass reports every problem.
#[derive(Debug)]
pub struct Scanner<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    // Byte offsets of the lexeme being scanned.
    start: usize,
    current: usize,
    line: Line,
    errors: Vec<LexError>,
    done: bool,
}

/// Scans the whole of `source`.
///
/// The token sequence always ends with exactly one `Eof` token.  If any lexical error occurred
/// the partial token sequence is discarded and every error is returned.
pub fn scan(source: &str) -> Result<Vec<Token>, ScanErrors> {
    let (tokens, errors) = Scanner::new(source).scan_tokens();
    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(ScanErrors(errors))
    }
}

impl<'a> Scanner<'a> {
    /// Creates a new scanner operating on `source`.
    pub fn new(source: &'a str) -> Scanner<'a> {
        Scanner {
            source,
            chars: source.char_indices().peekable(),
            start: 0,
            current: 0,
            line: 1,
            errors: vec![],
            done: false,
        }
    }

    /// Scans until end of input and returns the tokens alongside the errors met on the way.
    pub fn scan_tokens(mut self) -> (Vec<Token>, Vec<LexError>) {
        let tokens = self.by_ref().collect::<Vec<_>>();
        (tokens, self.errors)
    }

    /// Scan next token and return it.  Returns `Eof` once input is exhausted.
    pub fn get_token(&mut self) -> Token {
        loop {
            self.start = self.current;
            let ch = match self.advance() {
                None => return self.make(TokenKind::Eof),
                Some(ch) => ch,
            };
            let kind = match ch {
                '\n' => {
                    self.line += 1;
                    continue;
                }
                ' ' | '\t' | '\r' => continue,
                '(' => TokenKind::LeftParen,
                ')' => TokenKind::RightParen,
                '{' => TokenKind::LeftBrace,
                '}' => TokenKind::RightBrace,
                ',' => TokenKind::Comma,
                '.' => TokenKind::Dot,
                ';' => TokenKind::Semicolon,
                '*' => TokenKind::Star,
                '+' => self.either('+', TokenKind::PlusPlus, TokenKind::Plus),
                '-' => self.either('-', TokenKind::MinusMinus, TokenKind::Minus),
                '!' => self.either('=', TokenKind::BangEqual, TokenKind::Bang),
                '=' => self.either('=', TokenKind::EqualEqual, TokenKind::Equal),
                '<' => self.either('=', TokenKind::LessEqual, TokenKind::Less),
                '>' => self.either('=', TokenKind::GreaterEqual, TokenKind::Greater),
                '/' => {
                    if self.matches('/') {
                        self.skip_comment();
                        continue;
                    }
                    TokenKind::Slash
                }
                '"' => match self.scan_string() {
                    Some(token) => return token,
                    None => continue,
                },
                '0'..='9' => return self.scan_number(),
                ch if ch.is_alphabetic() || ch == '_' => return self.scan_identifier(),
                ch => {
                    self.error(self.line, LexErrorKind::UnexpectedCharacter(ch));
                    continue;
                }
            };
            return self.make(kind);
        }
    }

    fn scan_string(&mut self) -> Option<Token> {
        let first_line = self.line;
        loop {
            match self.advance() {
                None => {
                    self.error(first_line, LexErrorKind::UnterminatedString);
                    return None;
                }
                Some('"') => break,
                Some('\n') => self.line += 1,
                Some(_) => (),
            }
        }
        let value = &self.source[self.start + 1..self.current - 1];
        let mut token = self.make(TokenKind::String);
        token.line = first_line;
        Some(token.with_literal(Literal::String(value.into())))
    }

    fn scan_number(&mut self) -> Token {
        self.skip_digits();

        // A '.' only belongs to the number when a digit follows it.
        if self.peek() == Some('.') && self.peek_next().is_some_and(|ch| ch.is_ascii_digit()) {
            self.advance();
            self.skip_digits();
        }

        // Digits with an optional fraction always parse.
        let n = self.lexeme().parse::<f64>().unwrap_or(f64::NAN);
        self.make(TokenKind::Number).with_literal(Literal::Number(n))
    }

    fn scan_identifier(&mut self) -> Token {
        while self
            .peek()
            .is_some_and(|ch| ch.is_alphanumeric() || ch == '_')
        {
            self.advance();
        }
        let kind = TokenKind::keyword(self.lexeme()).unwrap_or(TokenKind::Identifier);
        self.make(kind)
    }

    fn skip_digits(&mut self) {
        while self.peek().is_some_and(|ch| ch.is_ascii_digit()) {
            self.advance();
        }
    }

    // The newline is left in place so that the line counter sees it.
    fn skip_comment(&mut self) {
        while self.peek().is_some_and(|ch| ch != '\n') {
            self.advance();
        }
    }

    fn either(&mut self, expected: char, matched: TokenKind, otherwise: TokenKind) -> TokenKind {
        if self.matches(expected) {
            matched
        } else {
            otherwise
        }
    }

    /// Conditional advance.
    fn matches(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) -> Option<char> {
        let (offset, ch) = self.chars.next()?;
        self.current = offset + ch.len_utf8();
        Some(ch)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, ch)| ch)
    }

    fn peek_next(&self) -> Option<char> {
        self.source[self.current..].chars().nth(1)
    }

    fn lexeme(&self) -> &'a str {
        &self.source[self.start..self.current]
    }

    fn make(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.lexeme(), self.line)
    }

    fn error(&mut self, line: Line, kind: LexErrorKind) {
        self.errors.push(LexError { line, kind });
    }
}

/// Yields every token up to and including the final `Eof`.
impl Iterator for Scanner<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let token = self.get_token();
        if token.kind == TokenKind::Eof {
            self.done = true;
        }
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(input: &str) -> Result<Vec<TokenKind>, ScanErrors> {
        Ok(scan(input)?.into_iter().map(|t| t.kind).collect())
    }

    #[test]
    fn empty_source_is_just_eof() -> Result<(), ScanErrors> {
        let tokens = scan("\n\t\t\t")?;
        assert_eq!(tokens, vec![Token::new(TokenKind::Eof, "", 2)]);
        Ok(())
    }

    #[test]
    fn single_number() -> Result<(), ScanErrors> {
        let tokens = scan("123")?;
        assert_eq!(
            tokens,
            vec![
                Token::new(TokenKind::Number, "123", 1).with_literal(Literal::Number(123.0)),
                Token::new(TokenKind::Eof, "", 1),
            ]
        );
        Ok(())
    }

    #[test]
    fn dots_around_numbers() -> Result<(), ScanErrors> {
        let tokens = scan("1. .5 007")?;
        assert_eq!(
            tokens,
            vec![
                Token::new(TokenKind::Number, "1", 1).with_literal(Literal::Number(1.0)),
                Token::new(TokenKind::Dot, ".", 1),
                Token::new(TokenKind::Dot, ".", 1),
                Token::new(TokenKind::Number, "5", 1).with_literal(Literal::Number(5.0)),
                Token::new(TokenKind::Number, "007", 1).with_literal(Literal::Number(7.0)),
                Token::new(TokenKind::Eof, "", 1),
            ]
        );
        Ok(())
    }

    #[test]
    fn var_declaration() -> Result<(), ScanErrors> {
        let tokens = scan("var x=3.3")?;
        assert_eq!(
            tokens,
            vec![
                Token::new(TokenKind::Var, "var", 1),
                Token::new(TokenKind::Identifier, "x", 1),
                Token::new(TokenKind::Equal, "=", 1),
                Token::new(TokenKind::Number, "3.3", 1).with_literal(Literal::Number(3.3)),
                Token::new(TokenKind::Eof, "", 1),
            ]
        );
        Ok(())
    }

    #[test]
    fn fixed_tokens() -> Result<(), ScanErrors> {
        assert_eq!(
            kinds("(){},.;*/ + ++ - -- ! != = == < <= > >=")?,
            vec![
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::Comma,
                TokenKind::Dot,
                TokenKind::Semicolon,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Plus,
                TokenKind::PlusPlus,
                TokenKind::Minus,
                TokenKind::MinusMinus,
                TokenKind::Bang,
                TokenKind::BangEqual,
                TokenKind::Equal,
                TokenKind::EqualEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Eof,
            ]
        );
        Ok(())
    }

    #[test]
    fn keywords_and_identifiers() -> Result<(), ScanErrors> {
        assert_eq!(
            kinds("fun while foo _bar t42 print break")?,
            vec![
                TokenKind::Fun,
                TokenKind::While,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Break,
                TokenKind::Eof,
            ]
        );
        Ok(())
    }

    #[test]
    fn string_literal_strips_quotes() -> Result<(), ScanErrors> {
        let tokens = scan("\"hello\"")?;
        assert_eq!(
            tokens[0],
            Token::new(TokenKind::String, "\"hello\"", 1).with_literal(Literal::String("hello".into()))
        );
        Ok(())
    }

    #[test]
    fn dot_without_fraction_is_not_consumed() -> Result<(), ScanErrors> {
        let tokens = scan("1.foo")?;
        assert_eq!(tokens[0].literal, Some(Literal::Number(1.0)));
        assert_eq!(tokens[1].kind, TokenKind::Dot);
        assert_eq!(tokens[2].kind, TokenKind::Identifier);
        Ok(())
    }

    #[test]
    fn comments_are_ignored() -> Result<(), ScanErrors> {
        assert_eq!(
            kinds("true // false\nnil")?,
            vec![TokenKind::True, TokenKind::Nil, TokenKind::Eof]
        );
        Ok(())
    }

    #[test]
    fn scanner_keeps_track_of_lines() -> Result<(), ScanErrors> {
        let tokens = scan("1\n\"a\nb\" 2 // c\n3")?;
        let lines = tokens.iter().map(|t| t.line).collect::<Vec<_>>();
        assert_eq!(lines, vec![1, 2, 3, 4, 4]);
        Ok(())
    }

    #[test]
    fn eof_appears_exactly_once_at_the_end() {
        for source in ["", "1 + 2", "fun f() { return 1; }", "\"a\" // x"] {
            let (tokens, _) = Scanner::new(source).scan_tokens();
            let eofs = tokens.iter().filter(|t| t.kind == TokenKind::Eof).count();
            assert_eq!(eofs, 1);
            assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
        }
    }

    #[test]
    fn unexpected_character() {
        match scan("\n@\n") {
            Err(ScanErrors(errors))
                if errors
                    == vec![LexError {
                        line: 2,
                        kind: LexErrorKind::UnexpectedCharacter('@'),
                    }] => {}
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn unterminated_string() {
        match scan("\"123\n") {
            Err(ScanErrors(errors))
                if errors
                    == vec![LexError {
                        line: 1,
                        kind: LexErrorKind::UnterminatedString,
                    }] => {}
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn every_error_is_reported_in_one_pass() {
        let (tokens, errors) = Scanner::new("@ 1 # 2").scan_tokens();
        assert_eq!(errors.len(), 2);
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![TokenKind::Number, TokenKind::Number, TokenKind::Eof]
        );
    }
}
