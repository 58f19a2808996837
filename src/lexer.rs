use std::{iter::Peekable, str::CharIndices};

use crate::color::Color;
use crate::token::{Span, Token, TokenKind};

pub mod error;

pub use error::{LexError, LexResult};

const VERSION_PREFIX: &str = "//@version=";

pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
    /// Open `(`/`[` count; newlines inside are not statement separators.
    nesting: usize,
    /// Only whitespace has been seen on the current line so far.
    at_line_start: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            line: 1,
            column: 1,
            nesting: 0,
            at_line_start: true,
        }
    }

    pub fn next_token(&mut self) -> LexResult<Token<'a>> {
        loop {
            self.skip_whitespace();

            let Some(&(start_idx, ch)) = self.chars.peek() else {
                let index = self.input.len();
                return Ok(Token::new(
                    TokenKind::EOF,
                    "",
                    Span {
                        start: index,
                        end: index,
                        line: self.line,
                        column: self.column,
                    },
                ));
            };

            let line = self.line;
            let column = self.column;

            if ch == '\n' {
                self.advance_char();
                self.at_line_start = true;
                if self.nesting > 0 {
                    continue;
                }
                return Ok(self.token_from(TokenKind::Newline, start_idx, line, column));
            }

            if self.input[start_idx..].starts_with("//") {
                let at_line_start = self.at_line_start;
                let end = self.skip_to_line_end();
                if at_line_start && self.input[start_idx..].starts_with(VERSION_PREFIX) {
                    let text = &self.input[start_idx..end];
                    return Ok(Token::new(
                        TokenKind::VersionComment(text),
                        text,
                        Span {
                            start: start_idx,
                            end,
                            line,
                            column,
                        },
                    ));
                }
                continue;
            }

            self.at_line_start = false;
            return self.read_token(start_idx, ch, line, column);
        }
    }

    fn read_token(
        &mut self,
        start_idx: usize,
        ch: char,
        line: usize,
        column: usize,
    ) -> LexResult<Token<'a>> {
        let kind = match ch {
            '"' | '\'' => return self.read_string(start_idx, ch, line, column),
            '#' => return self.read_color(start_idx, line, column),
            c if c.is_ascii_digit() => return self.read_number(start_idx, line, column),
            c if c.is_alphabetic() || c == '_' => {
                return Ok(self.read_identifier(start_idx, line, column));
            }
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '?' => TokenKind::Question,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '(' => {
                self.nesting += 1;
                TokenKind::LParen
            }
            ')' => {
                self.nesting = self.nesting.saturating_sub(1);
                TokenKind::RParen
            }
            '[' => {
                self.nesting += 1;
                TokenKind::LBracket
            }
            ']' => {
                self.nesting = self.nesting.saturating_sub(1);
                TokenKind::RBracket
            }
            '=' => self.with_equals(TokenKind::Equal, TokenKind::Assign),
            '>' => self.with_equals(TokenKind::GreaterEq, TokenKind::Greater),
            '<' => self.with_equals(TokenKind::LessEq, TokenKind::Less),
            ':' => self.with_equals(TokenKind::Reassign, TokenKind::Colon),
            '!' => {
                if self.second_char() != Some('=') {
                    return Err(LexError::UnexpectedCharacter {
                        character: ch,
                        line,
                        column,
                    });
                }
                self.advance_char();
                TokenKind::NotEqual
            }
            _ => {
                return Err(LexError::UnexpectedCharacter {
                    character: ch,
                    line,
                    column,
                });
            }
        };
        self.advance_char();
        Ok(self.token_from(kind, start_idx, line, column))
    }

    /// Picks `paired` when the character after the current one is `=`,
    /// consuming that `=`. The current character is left for the caller.
    fn with_equals(&mut self, paired: TokenKind<'a>, single: TokenKind<'a>) -> TokenKind<'a> {
        if self.second_char() == Some('=') {
            self.advance_char();
            paired
        } else {
            single
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c == ' ' || c == '\t' || c == '\r' {
                self.advance_char();
            } else {
                break;
            }
        }
    }

    /// Consumes up to (not including) the next newline and returns the byte
    /// offset where it stopped.
    fn skip_to_line_end(&mut self) -> usize {
        while let Some(&(_, c)) = self.chars.peek() {
            if c == '\n' {
                break;
            }
            self.advance_char();
        }
        self.current_index()
    }

    fn read_identifier(&mut self, start: usize, line: usize, column: usize) -> Token<'a> {
        self.advance_char();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance_char();
            } else {
                break;
            }
        }

        let end = self.current_index();
        let ident = &self.input[start..end];
        let kind = match ident {
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "true" => TokenKind::Bool(true),
            "false" => TokenKind::Bool(false),
            _ => TokenKind::Identifier(ident),
        };
        Token::new(
            kind,
            ident,
            Span {
                start,
                end,
                line,
                column,
            },
        )
    }

    fn read_number(&mut self, start: usize, line: usize, column: usize) -> LexResult<Token<'a>> {
        self.consume_digits();

        if matches!(self.chars.peek(), Some(&(_, '.'))) {
            self.advance_char();
            self.consume_digits();
        }

        if matches!(self.chars.peek(), Some(&(_, 'e' | 'E'))) {
            let mut ahead = self.chars.clone();
            ahead.next();
            let mut sign_len = 0;
            if matches!(ahead.peek(), Some(&(_, '+' | '-'))) {
                ahead.next();
                sign_len = 1;
            }
            if matches!(ahead.peek(), Some(&(_, c)) if c.is_ascii_digit()) {
                for _ in 0..=sign_len {
                    self.advance_char();
                }
                self.consume_digits();
            }
        }

        let end = self.current_index();
        let literal = &self.input[start..end];
        let value = literal.parse::<f64>().map_err(|_| LexError::InvalidNumber {
            literal: literal.to_string(),
            line,
            column,
        })?;
        Ok(Token::new(
            TokenKind::Number(value),
            literal,
            Span {
                start,
                end,
                line,
                column,
            },
        ))
    }

    fn consume_digits(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                self.advance_char();
            } else {
                break;
            }
        }
    }

    fn read_color(&mut self, start: usize, line: usize, column: usize) -> LexResult<Token<'a>> {
        self.advance_char(); // '#'
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_alphanumeric() {
                self.advance_char();
            } else {
                break;
            }
        }

        let end = self.current_index();
        let literal = &self.input[start..end];
        let color = Color::from_hex(&literal[1..]).ok_or_else(|| LexError::InvalidColor {
            literal: literal.to_string(),
            line,
            column,
        })?;
        Ok(Token::new(
            TokenKind::Color(color.argb()),
            literal,
            Span {
                start,
                end,
                line,
                column,
            },
        ))
    }

    fn read_string(
        &mut self,
        start: usize,
        quote: char,
        line: usize,
        column: usize,
    ) -> LexResult<Token<'a>> {
        self.advance_char(); // opening quote
        let content_start = start + quote.len_utf8();
        while let Some(&(idx, c)) = self.chars.peek() {
            if c == quote {
                self.advance_char();
                let end = idx + quote.len_utf8();
                return Ok(Token::new(
                    TokenKind::String(&self.input[content_start..idx]),
                    &self.input[start..end],
                    Span {
                        start,
                        end,
                        line,
                        column,
                    },
                ));
            }
            if c == '\n' {
                break;
            }
            if c == '\\' {
                self.advance_char();
                if matches!(self.chars.peek(), None | Some(&(_, '\n'))) {
                    break;
                }
            }
            self.advance_char();
        }
        Err(LexError::UnterminatedString { line, column })
    }

    fn token_from(
        &mut self,
        kind: TokenKind<'a>,
        start: usize,
        line: usize,
        column: usize,
    ) -> Token<'a> {
        let end = self.current_index();
        Token::new(
            kind,
            &self.input[start..end],
            Span {
                start,
                end,
                line,
                column,
            },
        )
    }

    fn advance_char(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn second_char(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.peek().map(|&(_, c)| c)
    }

    fn current_index(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.input.len())
    }
}

pub fn tokenize(input: &str) -> LexResult<Vec<Token<'_>>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = matches!(token.kind, TokenKind::EOF);
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn kinds(input: &str) -> Vec<TokenKind<'_>> {
        tokenize(input)
            .expect("tokenize should succeed")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_simple_script() {
        let input = indoc! {"
            //@version=5
            indicator(\"Fast\", overlay=true)
            fast = ema(close, 9) // trailing comment
            plot(fast)
        "};
        let expected_tokens = vec![
            TokenKind::VersionComment("//@version=5"),
            TokenKind::Newline,
            TokenKind::Identifier("indicator"),
            TokenKind::LParen,
            TokenKind::String("Fast"),
            TokenKind::Comma,
            TokenKind::Identifier("overlay"),
            TokenKind::Assign,
            TokenKind::Bool(true),
            TokenKind::RParen,
            TokenKind::Newline,
            TokenKind::Identifier("fast"),
            TokenKind::Assign,
            TokenKind::Identifier("ema"),
            TokenKind::LParen,
            TokenKind::Identifier("close"),
            TokenKind::Comma,
            TokenKind::Number(9.0),
            TokenKind::RParen,
            TokenKind::Newline,
            TokenKind::Identifier("plot"),
            TokenKind::LParen,
            TokenKind::Identifier("fast"),
            TokenKind::RParen,
            TokenKind::Newline,
            TokenKind::EOF,
        ];
        assert_eq!(kinds(input), expected_tokens);
    }

    #[test]
    fn lexes_operators_and_keywords() {
        assert_eq!(
            kinds("a >= 1 and not b != 2 or c := d == e <= f"),
            vec![
                TokenKind::Identifier("a"),
                TokenKind::GreaterEq,
                TokenKind::Number(1.0),
                TokenKind::And,
                TokenKind::Not,
                TokenKind::Identifier("b"),
                TokenKind::NotEqual,
                TokenKind::Number(2.0),
                TokenKind::Or,
                TokenKind::Identifier("c"),
                TokenKind::Reassign,
                TokenKind::Identifier("d"),
                TokenKind::Equal,
                TokenKind::Identifier("e"),
                TokenKind::LessEq,
                TokenKind::Identifier("f"),
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn lexes_color_literals_as_argb() {
        assert_eq!(
            kinds("#FF8800 #FF880080"),
            vec![
                TokenKind::Color(0xFFFF_8800),
                TokenKind::Color(0x80FF_8800),
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn lexes_decimal_and_exponent_numbers() {
        assert_eq!(
            kinds("1.5 2e3 7.25E-1 3."),
            vec![
                TokenKind::Number(1.5),
                TokenKind::Number(2000.0),
                TokenKind::Number(0.725),
                TokenKind::Number(3.0),
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn suppresses_newlines_inside_parentheses() {
        let input = indoc! {"
            plot(close,
                 color=#00FF00)
        "};
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Identifier("plot"),
                TokenKind::LParen,
                TokenKind::Identifier("close"),
                TokenKind::Comma,
                TokenKind::Identifier("color"),
                TokenKind::Assign,
                TokenKind::Color(0xFF00_FF00),
                TokenKind::RParen,
                TokenKind::Newline,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn version_comment_only_at_line_start() {
        assert_eq!(
            kinds("x = 1 //@version=4\n"),
            vec![
                TokenKind::Identifier("x"),
                TokenKind::Assign,
                TokenKind::Number(1.0),
                TokenKind::Newline,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn records_one_based_locations() {
        let tokens = tokenize("a = 1\n  plot(a)").expect("tokenize should succeed");
        let plot = tokens
            .iter()
            .find(|token| token.kind == TokenKind::Identifier("plot"))
            .expect("plot token");
        assert_eq!((plot.span.line, plot.span.column), (2, 3));
        assert_eq!(plot.text, "plot");
    }

    #[test]
    fn keeps_raw_string_escapes() {
        let tokens = tokenize(r#"alert(x, "say \"hi\"")"#).expect("tokenize should succeed");
        assert_eq!(tokens[4].kind, TokenKind::String(r#"say \"hi\""#));
    }

    #[test]
    fn errors_on_invalid_character() {
        let err = tokenize("x = 1\ny = 2 @ 3\n").expect_err("expected lexing failure");
        assert_eq!(
            err,
            LexError::UnexpectedCharacter {
                character: '@',
                line: 2,
                column: 7,
            }
        );
        assert_eq!(err.to_string(), "Unexpected character '@'");
    }

    #[test]
    fn errors_on_malformed_color() {
        let err = tokenize("c = #FF00\n").expect_err("expected lexing failure");
        assert!(matches!(err, LexError::InvalidColor { line: 1, column: 5, .. }));
    }

    #[test]
    fn errors_on_unterminated_string() {
        let err = tokenize("plot(close, \"oops)\n").expect_err("expected lexing failure");
        assert_eq!(err.location(), (1, 13));
    }
}
