/// Character cursor over Fern source with byte-offset tracking.
pub struct Cursor<'src> {
    source: &'src str,
    pos: u32,
    chars: std::str::Chars<'src>,
}

impl<'src> Cursor<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            pos: 0,
            chars: source.chars(),
        }
    }

    pub fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    pub fn peek_next(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next()
    }

    pub fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos += c.len_utf8() as u32;
        Some(c)
    }

    /// Consume `expected` if it is the next character.
    pub fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Whether the unconsumed input begins with `prefix`.
    pub fn at(&self, prefix: &str) -> bool {
        self.chars.as_str().starts_with(prefix)
    }

    pub fn pos(&self) -> u32 {
        self.pos
    }

    pub fn eat_while(&mut self, predicate: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&predicate) {
            self.advance();
        }
    }

    pub fn slice(&self, start: u32, end: u32) -> &'src str {
        &self.source[start as usize..end as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_tracks_byte_offsets() {
        let mut cursor = Cursor::new("\u{00E9}x");
        assert_eq!(cursor.advance(), Some('\u{00E9}'));
        assert_eq!(cursor.pos(), 2);
        assert_eq!(cursor.advance(), Some('x'));
        assert_eq!(cursor.pos(), 3);
        assert_eq!(cursor.advance(), None);
    }

    #[test]
    fn eat_only_consumes_a_match() {
        let mut cursor = Cursor::new(";;");
        assert!(!cursor.eat(':'));
        assert!(cursor.eat(';'));
        assert!(cursor.eat(';'));
        assert_eq!(cursor.pos(), 2);
    }

    #[test]
    fn at_and_peek_do_not_move() {
        let cursor = Cursor::new("(* c *)");
        assert!(cursor.at("(*"));
        assert_eq!(cursor.peek(), Some('('));
        assert_eq!(cursor.peek_next(), Some('*'));
        assert_eq!(cursor.pos(), 0);
    }

    #[test]
    fn eat_while_and_slice() {
        let mut cursor = Cursor::new("1234 rest");
        cursor.eat_while(|c| c.is_ascii_digit());
        assert_eq!(cursor.slice(0, cursor.pos()), "1234");
    }
}
