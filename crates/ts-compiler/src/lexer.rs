//! UTF-8 lexer with one-token pushback (§4.1).

use crate::error::{CompileError, CompileResult};
use crate::token::{keyword, Token, TokenKind, MAX_TOKEN_LEN};

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    file: String,
    pushed_back: Option<Token>,
}

impl Lexer {
    pub fn new(source: &str, file: impl Into<String>) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            file: file.into(),
            pushed_back: None,
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    /// Returns the next token, consuming it.
    pub fn next_token(&mut self) -> CompileResult<Token> {
        if let Some(token) = self.pushed_back.take() {
            return Ok(token);
        }
        self.skip_trivia()?;
        let line = self.line;

        let Some(ch) = self.peek() else {
            return Ok(Token::new(TokenKind::Eof, line));
        };

        if ch == '@' {
            self.advance();
            let name = self.scan_identifier_body()?;
            return Ok(Token::new(TokenKind::Annotation(name), line));
        }
        if ch.is_ascii_digit() {
            return self.scan_number(line);
        }
        if ch == '"' || ch == '\'' {
            return self.scan_string(ch, line);
        }
        if is_identifier_start(ch) {
            let name = self.scan_identifier_body()?;
            let kind = keyword(&name).unwrap_or(TokenKind::Identifier(name));
            return Ok(Token::new(kind, line));
        }

        self.scan_operator(line)
    }

    /// Un-consumes `token`; the next call to [`next_token`](Self::next_token)
    /// returns it again. Only one token of pushback is supported.
    pub fn push_back(&mut self, token: Token) {
        debug_assert!(self.pushed_back.is_none(), "only one token of pushback is supported");
        self.pushed_back = Some(token);
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
        }
        Some(ch)
    }

    fn skip_trivia(&mut self) -> CompileResult<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek2() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek2() == Some('*') => {
                    let start_line = self.line;
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek() {
                            None => {
                                return Err(CompileError::UnterminatedComment {
                                    file: self.file.clone(),
                                    line: start_line,
                                })
                            }
                            Some('*') if self.peek2() == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            Some(_) => {
                                self.advance();
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn scan_identifier_body(&mut self) -> CompileResult<String> {
        let line = self.line;
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if is_identifier_char(c) {
                text.push(c);
                self.advance();
                if text.len() > MAX_TOKEN_LEN {
                    return Err(CompileError::TokenTooLong { file: self.file.clone(), line, max: MAX_TOKEN_LEN });
                }
            } else {
                break;
            }
        }
        Ok(text)
    }

    fn scan_number(&mut self, line: usize) -> CompileResult<Token> {
        let mut text = String::new();
        let mut seen_dot = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else if c == '.' && !seen_dot && self.peek2().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                seen_dot = true;
                text.push(c);
                self.advance();
            } else {
                break;
            }
            if text.len() > MAX_TOKEN_LEN {
                return Err(CompileError::TokenTooLong { file: self.file.clone(), line, max: MAX_TOKEN_LEN });
            }
        }
        let value: f64 = text.parse().unwrap_or(0.0);
        Ok(Token::new(TokenKind::Number(value), line))
    }

    fn scan_string(&mut self, quote: char, line: usize) -> CompileResult<Token> {
        self.advance();
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(CompileError::UnterminatedString { file: self.file.clone(), line }),
                Some('\n') => return Err(CompileError::UnterminatedString { file: self.file.clone(), line }),
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    let escaped = self.advance().ok_or(CompileError::UnterminatedString { file: self.file.clone(), line })?;
                    text.push(unescape(escaped));
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
            if text.len() > MAX_TOKEN_LEN {
                return Err(CompileError::TokenTooLong { file: self.file.clone(), line, max: MAX_TOKEN_LEN });
            }
        }
        Ok(Token::new(TokenKind::String(text), line))
    }

    fn scan_operator(&mut self, line: usize) -> CompileResult<Token> {
        use TokenKind::*;
        let ch = self.advance().expect("checked by caller");
        let kind = match ch {
            '=' if self.eat('=') => Eq,
            '=' if self.eat('>') => FatArrow,
            '=' => Assign,
            '!' if self.eat('=') => NotEq,
            '!' => Bang,
            '<' if self.eat('=') => LtEq,
            '<' => Lt,
            '>' if self.eat('=') => GtEq,
            '>' => Gt,
            '+' if self.eat('+') => PlusPlus,
            '+' if self.eat('=') => PlusAssign,
            '+' => Plus,
            '-' if self.eat('-') => MinusMinus,
            '-' if self.eat('=') => MinusAssign,
            '-' => Minus,
            '*' if self.eat('=') => StarAssign,
            '*' => Star,
            '/' if self.eat('=') => SlashAssign,
            '/' => Slash,
            '%' => Percent,
            '&' if self.eat('&') => AndAnd,
            '|' if self.eat('|') => OrOr,
            '?' => Question,
            ':' => Colon,
            '.' => Dot,
            ',' => Comma,
            ';' => Semicolon,
            '(' => LParen,
            ')' => RParen,
            '[' => LBracket,
            ']' => RBracket,
            '{' => LBrace,
            '}' => RBrace,
            other => return Err(CompileError::UnexpectedChar { file: self.file.clone(), line, ch: other }),
        };
        Ok(Token::new(kind, line))
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'f' => '\x0C',
        'v' => '\x0B',
        'b' => '\x08',
        '\\' => '\\',
        '\'' => '\'',
        '"' => '"',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src, "test.ss");
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token.kind == TokenKind::Eof {
                break;
            }
            out.push(token.kind);
        }
        out
    }

    #[test]
    fn skips_line_and_block_comments() {
        let tokens = kinds("// hi\nobject /* inline */ \"A\"");
        assert_eq!(tokens, vec![TokenKind::Object, TokenKind::String("A".into())]);
    }

    #[test]
    fn unterminated_block_comment_is_fatal() {
        let mut lexer = Lexer::new("/* never closes", "test.ss");
        assert!(matches!(lexer.next_token(), Err(CompileError::UnterminatedComment { .. })));
    }

    #[test]
    fn string_escapes_decode() {
        let tokens = kinds(r#""a\nb""#);
        assert_eq!(tokens, vec![TokenKind::String("a\nb".into())]);
    }

    #[test]
    fn raw_newline_in_string_is_fatal() {
        let mut lexer = Lexer::new("\"abc\ndef\"", "test.ss");
        assert!(matches!(lexer.next_token(), Err(CompileError::UnterminatedString { .. })));
    }

    #[test]
    fn keywords_are_recognized() {
        assert_eq!(kinds("state fun return"), vec![TokenKind::State, TokenKind::Fun, TokenKind::Return]);
    }

    #[test]
    fn number_with_single_dot() {
        assert_eq!(kinds("3.5"), vec![TokenKind::Number(3.5)]);
    }

    #[test]
    fn push_back_returns_same_token_once() {
        let mut lexer = Lexer::new("a b", "test.ss");
        let first = lexer.next_token().unwrap();
        lexer.push_back(first.clone());
        let replayed = lexer.next_token().unwrap();
        assert_eq!(first, replayed);
        let second = lexer.next_token().unwrap();
        assert_eq!(second.kind, TokenKind::Identifier("b".into()));
    }

    #[test]
    fn token_exceeding_buffer_is_fatal() {
        let huge = "a".repeat(MAX_TOKEN_LEN + 1);
        let mut lexer = Lexer::new(&huge, "test.ss");
        assert!(matches!(lexer.next_token(), Err(CompileError::TokenTooLong { .. })));
    }
}
