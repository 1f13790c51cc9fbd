/// A forward-only cursor over expression text.
///
/// Offsets are byte offsets into the source, which is what error positions report.
#[derive(Debug, Clone)]
pub struct CharStream<'a> {
    source: &'a str,
    offset: usize,
}

impl<'a> CharStream<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, offset: 0 }
    }

    pub fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.offset += c.len_utf8();
        Some(c)
    }

    /// Consumes up to `n` characters and returns them.
    pub fn next_n(&mut self, n: usize) -> &'a str {
        let taken = self.peek_n(n);
        self.offset += taken.len();
        taken
    }

    pub fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    pub fn peek_n(&self, n: usize) -> &'a str {
        let rest = self.remaining();
        let end = rest
            .char_indices()
            .nth(n)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        &rest[..end]
    }

    pub fn eof(&self) -> bool {
        self.offset >= self.source.len()
    }

    pub fn position(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> &'a str {
        &self.source[self.offset..]
    }

    /// Moves the cursor to the start of `rest`, a suffix of the source returned by a
    /// sub-parser.
    pub fn advance_to(&mut self, rest: &'a str) {
        self.offset = self.source.len() - rest.len();
    }

    pub fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.next();
        }
    }
}
