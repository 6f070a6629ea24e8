// Fern lexer -- tokenizer for the Fern programming language.

mod cursor;

use cursor::Cursor;
use fern_common::error::{LexError, LexErrorKind};
use fern_common::span::Span;
use fern_common::token::{keyword_from_str, Token, TokenKind};

/// Tokens for a whole file plus whatever went wrong while producing them.
#[derive(Debug)]
pub struct Lexed {
    /// Always ends with exactly one `Eof` token.
    pub tokens: Vec<Token>,
    pub errors: Vec<LexError>,
}

/// Converts Fern source text into tokens.
///
/// Whitespace and `(* ... *)` comments are skipped. Problems are recorded in
/// `errors` and surface in the token stream as `TokenKind::Error`, so the
/// parser can stop at the first one with a position.
pub struct Lexer<'src> {
    cursor: Cursor<'src>,
    emitted_eof: bool,
    errors: Vec<LexError>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            cursor: Cursor::new(source),
            emitted_eof: false,
            errors: Vec::new(),
        }
    }

    /// Tokenize the entire source.
    pub fn tokenize(source: &str) -> Lexed {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.by_ref().collect();
        Lexed {
            tokens,
            errors: lexer.errors,
        }
    }

    pub fn errors(&self) -> &[LexError] {
        &self.errors
    }

    fn next_token(&mut self) -> Token {
        if let Some(err) = self.skip_trivia() {
            return err;
        }

        let start = self.cursor.pos();
        let Some(c) = self.cursor.peek() else {
            return Token::new(TokenKind::Eof, start, start);
        };

        match c {
            '(' => self.single(TokenKind::LParen, start),
            ')' => self.single(TokenKind::RParen, start),
            ',' => self.single(TokenKind::Comma, start),
            '+' => self.single(TokenKind::Plus, start),
            '*' => self.single(TokenKind::Star, start),
            '/' => self.single(TokenKind::Slash, start),
            '=' => self.single(TokenKind::Eq, start),
            ';' => {
                self.cursor.advance();
                let kind = if self.cursor.eat(';') {
                    TokenKind::SemiSemi
                } else {
                    TokenKind::Semicolon
                };
                self.finish(kind, start)
            }
            '-' => {
                self.cursor.advance();
                let kind = if self.cursor.eat('>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                };
                self.finish(kind, start)
            }
            '<' => {
                self.cursor.advance();
                let kind = if self.cursor.eat('=') {
                    TokenKind::LtEq
                } else if self.cursor.eat('>') {
                    TokenKind::NotEq
                } else {
                    TokenKind::Lt
                };
                self.finish(kind, start)
            }
            '>' => {
                self.cursor.advance();
                let kind = if self.cursor.eat('=') {
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                };
                self.finish(kind, start)
            }
            '0'..='9' => self.lex_int(start),
            c if is_ident_start(c) => self.lex_ident(start),
            other => {
                self.cursor.advance();
                let span = Span::new(start, self.cursor.pos());
                self.errors
                    .push(LexError::new(LexErrorKind::UnexpectedCharacter(other), span));
                self.finish(TokenKind::Error, start)
            }
        }
    }

    fn single(&mut self, kind: TokenKind, start: u32) -> Token {
        self.cursor.advance();
        self.finish(kind, start)
    }

    fn finish(&self, kind: TokenKind, start: u32) -> Token {
        Token::new(kind, start, self.cursor.pos())
    }

    /// Skip whitespace and comments. Returns an `Error` token if a comment
    /// runs off the end of the input.
    fn skip_trivia(&mut self) -> Option<Token> {
        loop {
            self.cursor.eat_while(char::is_whitespace);
            if !self.cursor.at("(*") {
                return None;
            }
            let start = self.cursor.pos();
            if !self.skip_comment() {
                let span = Span::new(start, self.cursor.pos());
                self.errors
                    .push(LexError::new(LexErrorKind::UnterminatedComment, span));
                return Some(self.finish(TokenKind::Error, start));
            }
        }
    }

    /// Consume a `(* ... *)` comment, honoring nesting. Returns false at EOF.
    fn skip_comment(&mut self) -> bool {
        let mut depth = 0u32;
        loop {
            if self.cursor.at("(*") {
                self.cursor.advance();
                self.cursor.advance();
                depth += 1;
            } else if self.cursor.at("*)") {
                self.cursor.advance();
                self.cursor.advance();
                depth -= 1;
                if depth == 0 {
                    return true;
                }
            } else if self.cursor.advance().is_none() {
                return false;
            }
        }
    }

    fn lex_int(&mut self, start: u32) -> Token {
        self.cursor.eat_while(|c| c.is_ascii_digit());
        let end = self.cursor.pos();
        let text = self.cursor.slice(start, end);
        if text.parse::<i64>().is_err() {
            self.errors.push(LexError::new(
                LexErrorKind::IntegerOverflow(text.to_string()),
                Span::new(start, end),
            ));
            return self.finish(TokenKind::Error, start);
        }
        self.finish(TokenKind::IntLiteral, start)
    }

    fn lex_ident(&mut self, start: u32) -> Token {
        self.cursor.eat_while(is_ident_continue);
        let text = self.cursor.slice(start, self.cursor.pos());
        let kind = keyword_from_str(text).unwrap_or(TokenKind::Ident);
        self.finish(kind, start)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.emitted_eof {
            return None;
        }
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            self.emitted_eof = true;
        }
        Some(token)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// Identifiers may contain primes after the first character (`x'`, `f''`).
fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '\''
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::tokenize(source)
            .tokens
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn empty_source_is_just_eof() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
        assert_eq!(kinds("  \n\t "), vec![TokenKind::Eof]);
    }

    #[test]
    fn two_char_operators() {
        assert_eq!(
            kinds("-> <> <= >= ;; ; - < >"),
            vec![
                TokenKind::Arrow,
                TokenKind::NotEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::SemiSemi,
                TokenKind::Semicolon,
                TokenKind::Minus,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn primes_continue_identifiers() {
        let lexed = Lexer::tokenize("x' f''");
        assert_eq!(lexed.tokens[0].kind, TokenKind::Ident);
        assert_eq!(lexed.tokens[0].span, Span::new(0, 2));
        assert_eq!(lexed.tokens[1].span, Span::new(3, 6));
    }

    #[test]
    fn nested_comments_are_skipped() {
        assert_eq!(
            kinds("1 (* outer (* inner *) still *) 2"),
            vec![TokenKind::IntLiteral, TokenKind::IntLiteral, TokenKind::Eof]
        );
    }

    #[test]
    fn unterminated_comment_is_an_error() {
        let lexed = Lexer::tokenize("1 (* never closed");
        assert_eq!(lexed.tokens[1].kind, TokenKind::Error);
        assert_eq!(lexed.errors[0].kind, LexErrorKind::UnterminatedComment);
    }

    #[test]
    fn unexpected_character_is_recorded() {
        let lexed = Lexer::tokenize("x @ y");
        assert_eq!(lexed.tokens[1].kind, TokenKind::Error);
        assert_eq!(
            lexed.errors,
            vec![LexError::new(
                LexErrorKind::UnexpectedCharacter('@'),
                Span::new(2, 3)
            )]
        );
    }

    #[test]
    fn oversized_integer_is_rejected() {
        let lexed = Lexer::tokenize("99999999999999999999");
        assert_eq!(lexed.tokens[0].kind, TokenKind::Error);
        assert!(matches!(
            lexed.errors[0].kind,
            LexErrorKind::IntegerOverflow(_)
        ));
    }
}
