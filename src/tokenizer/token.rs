use std::fmt;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::char,
    combinator::opt,
    error::{context, VerboseError, VerboseErrorKind},
    sequence::tuple,
    IResult,
};
use thiserror::Error;

use super::{
    chars::CharStream,
    keyword::{parse_keyword, Keyword},
    literal::{parse_literal, Literal},
    symbol::{parse_operator, parse_punctuation, Operator, Punctuation},
};

pub type ParserResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

pub fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// `Owner#name(args)` or `Owner::name(args)`; the owner is optional.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceToken {
    pub owner: Option<String>,
    pub name: String,
    pub args: Vec<Token>,
}

impl ReferenceToken {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            owner: None,
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_args(mut self, args: Vec<Token>) -> Self {
        self.args = args;
        self
    }

    /// `Owner#name` or `#name`.
    pub fn qualified_name(&self, sigil: &str) -> String {
        match &self.owner {
            Some(owner) => format!("{}{}{}", owner, sigil, self.name),
            None => format!("{}{}", sigil, self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Value(Literal),
    Reference(ReferenceToken),
    Generator(ReferenceToken),
    Operator(Operator),
    Keyword(Keyword),
    Punctuation(Punctuation),
    /// An argument span the structured grammar does not understand, kept verbatim.
    Raw(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Value(Literal::String(s)) => write!(f, "{:?}", s),
            Token::Value(literal) => write!(f, "{}", literal.to_value()),
            Token::Reference(r) => write!(f, "{}", r.qualified_name("#")),
            Token::Generator(r) => write!(f, "{}", r.qualified_name("::")),
            Token::Operator(op) => write!(f, "{}", op),
            Token::Keyword(kw) => write!(f, "{}", kw),
            Token::Punctuation(p) => write!(f, "{}", p),
            Token::Raw(text) => write!(f, "{}", text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenSpan {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LexError {
    #[error("undefined token '{found}' at position {position}")]
    UndefinedToken { found: String, position: usize },
}

impl LexError {
    pub fn position(&self) -> usize {
        match self {
            LexError::UndefinedToken { position, .. } => *position,
        }
    }
}

pub type LexResult<T> = Result<T, LexError>;

fn failure<'a, T>(input: &'a str, ctx: &'static str) -> ParserResult<'a, T> {
    Err(nom::Err::Failure(VerboseError {
        errors: vec![(input, VerboseErrorKind::Context(ctx))],
    }))
}

/// Splits a parenthesized argument block at top-level commas, honoring quotes and
/// nested parentheses. Returns the raw text of each argument.
fn split_arguments(input: &str) -> ParserResult<Vec<&str>> {
    let (body, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut args = Vec::new();
    let mut arg_start = 0usize;

    for (i, c) in body.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let last = &body[arg_start..i];
                    if !(args.is_empty() && last.trim().is_empty()) {
                        args.push(last);
                    }
                    return Ok((&body[i + 1..], args));
                }
            }
            ',' if depth == 1 => {
                args.push(&body[arg_start..i]);
                arg_start = i + 1;
            }
            _ => {}
        }
    }
    failure(input, "unclosed argument list")
}

/// A single argument is a literal or a reference when it lexes to exactly one such
/// token; anything else is passed through as [`Token::Raw`].
fn classify_argument(text: &str) -> Option<Token> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let single = Lexer::new(trimmed).tokenize().ok().and_then(|mut tokens| {
        if tokens.len() == 1 {
            tokens.pop().map(|span| span.token)
        } else {
            None
        }
    });
    match single {
        Some(token @ (Token::Value(_) | Token::Reference(_) | Token::Generator(_))) => Some(token),
        _ => Some(Token::Raw(trimmed.to_string())),
    }
}

fn parse_arguments(input: &str) -> ParserResult<Vec<Token>> {
    let (rest, raw_args) = split_arguments(input)?;
    let mut args = Vec::with_capacity(raw_args.len());
    for raw in raw_args {
        match classify_argument(raw) {
            Some(token) => args.push(token),
            None => return failure(input, "empty argument"),
        }
    }
    Ok((rest, args))
}

fn parse_owner(input: &str) -> ParserResult<&str> {
    take_while(|c: char| is_identifier_char(c) || c == '.')(input)
}

fn reference_with<'a>(
    sigil: &'static str,
) -> impl FnMut(&'a str) -> ParserResult<'a, ReferenceToken> {
    move |input| {
        let (rest, (owner, _, name)) =
            tuple((parse_owner, tag(sigil), take_while1(is_identifier_char)))(input)?;
        let (rest, args) = if rest.starts_with('(') {
            parse_arguments(rest)?
        } else {
            (rest, Vec::new())
        };
        let owner = (!owner.is_empty()).then(|| owner.to_string());
        Ok((
            rest,
            ReferenceToken {
                owner,
                name: name.to_string(),
                args,
            },
        ))
    }
}

pub fn parse_reference(input: &str) -> ParserResult<Token> {
    let (rest, reference) = context("reference", reference_with("#"))(input)?;
    Ok((rest, Token::Reference(reference)))
}

pub fn parse_generator(input: &str) -> ParserResult<Token> {
    let (rest, reference) = context("generator", reference_with("::"))(input)?;
    Ok((rest, Token::Generator(reference)))
}

/// Pull-based tokenizer with one token of lookahead.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    stream: CharStream<'a>,
    peeked: Option<Option<TokenSpan>>,
    consumed_end: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            stream: CharStream::new(source),
            peeked: None,
            consumed_end: 0,
        }
    }

    fn read_token(&mut self) -> LexResult<Option<TokenSpan>> {
        self.stream.skip_whitespace();
        if self.stream.eof() {
            return Ok(None);
        }
        let start = self.stream.position();
        let remaining = self.stream.remaining();
        let result = opt(alt((
            parse_literal,
            parse_generator,
            parse_reference,
            parse_keyword,
            parse_operator,
            parse_punctuation,
        )))(remaining);

        match result {
            Ok((rest, Some(token))) => {
                self.stream.advance_to(rest);
                Ok(Some(TokenSpan {
                    token,
                    start,
                    end: self.stream.position(),
                }))
            }
            Ok((_, None)) | Err(_) => {
                let found = remaining
                    .split_whitespace()
                    .next()
                    .unwrap_or(remaining)
                    .chars()
                    .take(20)
                    .collect::<String>();
                Err(LexError::UndefinedToken {
                    found,
                    position: start,
                })
            }
        }
    }

    pub fn next(&mut self) -> LexResult<Option<TokenSpan>> {
        let span = match self.peeked.take() {
            Some(span) => span,
            None => self.read_token()?,
        };
        if let Some(span) = &span {
            self.consumed_end = span.end;
        }
        Ok(span)
    }

    pub fn peek(&mut self) -> LexResult<Option<&TokenSpan>> {
        if self.peeked.is_none() {
            let span = self.read_token()?;
            self.peeked = Some(span);
        }
        Ok(self.peeked.as_ref().and_then(|span| span.as_ref()))
    }

    /// Offset just past the last consumed token.
    pub fn position(&self) -> usize {
        self.consumed_end
    }

    #[tracing::instrument(level = "debug", skip(self), fields(source = self.stream.remaining()))]
    pub fn tokenize(mut self) -> LexResult<Vec<TokenSpan>> {
        let mut tokens = Vec::new();
        while let Some(span) = self.next()? {
            tokens.push(span);
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(source: &str) -> Vec<Token> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|span| span.token)
            .collect()
    }

    #[test]
    fn test_simple_references() {
        assert_eq!(
            tokens("#a -> Owner#b ; ::gen"),
            vec![
                Token::Reference(ReferenceToken::new("a")),
                Token::Operator(Operator::Chain),
                Token::Reference(ReferenceToken::new("b").with_owner("Owner")),
                Token::Operator(Operator::Parallel),
                Token::Generator(ReferenceToken::new("gen")),
            ]
        );
    }

    #[test]
    fn test_keyword_prefix_in_owner() {
        assert_eq!(
            tokens("if_ignore.Class#method"),
            vec![Token::Reference(
                ReferenceToken::new("method").with_owner("if_ignore.Class")
            )]
        );
    }

    #[test]
    fn test_conditional_tokens() {
        assert_eq!(
            tokens("IF #a DO 1 else (#b)"),
            vec![
                Token::Keyword(Keyword::If),
                Token::Reference(ReferenceToken::new("a")),
                Token::Keyword(Keyword::Do),
                Token::Value(Literal::Integer(1)),
                Token::Keyword(Keyword::Else),
                Token::Punctuation(Punctuation::OpenParen),
                Token::Reference(ReferenceToken::new("b")),
                Token::Punctuation(Punctuation::CloseParen),
            ]
        );
    }

    #[test]
    fn test_arguments() {
        assert_eq!(
            tokens(r#"#m(123, "a, b", null, #x(true), Util::gen(""))"#),
            vec![Token::Reference(ReferenceToken::new("m").with_args(vec![
                Token::Value(Literal::Integer(123)),
                Token::Value(Literal::String("a, b".to_string())),
                Token::Value(Literal::Null),
                Token::Reference(
                    ReferenceToken::new("x").with_args(vec![Token::Value(Literal::Boolean(true))])
                ),
                Token::Generator(
                    ReferenceToken::new("gen")
                        .with_owner("Util")
                        .with_args(vec![Token::Value(Literal::String(String::new()))])
                ),
            ]))]
        );
    }

    #[test]
    fn test_raw_arguments() {
        assert_eq!(
            tokens("#method((1 + 2) / (3 - (3 + 1)), controller.getValue())"),
            vec![Token::Reference(ReferenceToken::new("method").with_args(vec![
                Token::Raw("(1 + 2) / (3 - (3 + 1))".to_string()),
                Token::Raw("controller.getValue()".to_string()),
            ]))]
        );
        assert_eq!(
            tokens("#second(!true)"),
            vec![Token::Reference(
                ReferenceToken::new("second").with_args(vec![Token::Raw("!true".to_string())])
            )]
        );
    }

    #[test]
    fn test_empty_argument_list() {
        assert_eq!(tokens("#a()"), vec![Token::Reference(ReferenceToken::new("a"))]);
    }

    #[test]
    fn test_undefined_token_position() {
        let err = Lexer::new("#a -> ${1 + 2}").tokenize().unwrap_err();
        assert_eq!(
            err,
            LexError::UndefinedToken {
                found: "${1".to_string(),
                position: 6
            }
        );
        assert_eq!(Lexer::new("#a(1").tokenize().unwrap_err().position(), 0);
        assert!(Lexer::new("#a(1, )").tokenize().is_err());
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut lexer = Lexer::new("#a AND #b");
        assert_eq!(
            lexer.peek().unwrap().map(|s| s.token.clone()),
            Some(Token::Reference(ReferenceToken::new("a")))
        );
        assert_eq!(lexer.position(), 0);
        let first = lexer.next().unwrap().unwrap();
        assert_eq!((first.start, first.end), (0, 2));
        assert_eq!(lexer.position(), 2);
        assert_eq!(
            lexer.next().unwrap().map(|s| s.token),
            Some(Token::Operator(Operator::And))
        );
        lexer.next().unwrap();
        assert_eq!(lexer.next().unwrap(), None);
    }
}
