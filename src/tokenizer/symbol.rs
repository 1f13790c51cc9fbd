//! # Operators and Punctuation
//!
//! Symbol operators are matched longest-first so `->`, `<=` and `>=` never split into
//! two tokens. The word operators `AND` and `OR` are matched as whole words only.
//!
//! Binding strength lives on [`Operator::precedence`]; the tokenizer itself does not
//! care about it.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    combinator::{map, value},
    error::{context, VerboseError, VerboseErrorKind},
};
use strum_macros::{AsRefStr, Display, EnumString};

use super::token::{is_identifier_char, ParserResult, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
pub enum Operator {
    /// Evaluates both sides, keeps the left result (`;`)
    #[strum(serialize = ";")]
    Parallel,
    /// Builds a flat list (`,`)
    #[strum(serialize = ",")]
    Tuple,
    #[strum(serialize = "OR", ascii_case_insensitive)]
    Or,
    #[strum(serialize = "AND", ascii_case_insensitive)]
    And,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = "<=")]
    LessEqual,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = ">=")]
    GreaterEqual,
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
    /// Pipes the left result into the right (`->`)
    #[strum(serialize = "->")]
    Chain,
}

impl Operator {
    pub fn precedence(&self) -> u8 {
        match self {
            Operator::Parallel => 1,
            Operator::Tuple => 2,
            Operator::Or => 4,
            Operator::And => 5,
            Operator::Less | Operator::LessEqual | Operator::Greater | Operator::GreaterEqual => 6,
            Operator::Equal | Operator::NotEqual => 7,
            Operator::Chain => 11,
        }
    }

    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            Operator::Less | Operator::LessEqual | Operator::Greater | Operator::GreaterEqual
        )
    }

    pub fn is_equality(&self) -> bool {
        matches!(self, Operator::Equal | Operator::NotEqual)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
pub enum Punctuation {
    #[strum(serialize = "(")]
    OpenParen,
    #[strum(serialize = ")")]
    CloseParen,
}

fn parse_symbol_operator(input: &str) -> ParserResult<Operator> {
    alt((
        value(Operator::Chain, tag("->")),
        value(Operator::Equal, tag("==")),
        value(Operator::NotEqual, tag("!=")),
        value(Operator::LessEqual, tag("<=")),
        value(Operator::GreaterEqual, tag(">=")),
        value(Operator::Less, tag("<")),
        value(Operator::Greater, tag(">")),
        value(Operator::Parallel, tag(";")),
        value(Operator::Tuple, tag(",")),
    ))(input)
}

fn parse_word_operator(input: &str) -> ParserResult<Operator> {
    let (rest, word) = take_while1(is_identifier_char)(input)?;
    if word.eq_ignore_ascii_case("AND") {
        Ok((rest, Operator::And))
    } else if word.eq_ignore_ascii_case("OR") {
        Ok((rest, Operator::Or))
    } else {
        Err(nom::Err::Error(VerboseError {
            errors: vec![(input, VerboseErrorKind::Context("word operator"))],
        }))
    }
}

pub fn parse_operator(input: &str) -> ParserResult<Token> {
    context(
        "operator",
        map(
            alt((parse_symbol_operator, parse_word_operator)),
            Token::Operator,
        ),
    )(input)
}

pub fn parse_punctuation(input: &str) -> ParserResult<Token> {
    context(
        "punctuation",
        map(
            alt((
                value(Punctuation::OpenParen, tag("(")),
                value(Punctuation::CloseParen, tag(")")),
            )),
            Token::Punctuation,
        ),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_match() {
        let cases = [
            ("->", Operator::Chain),
            ("<=", Operator::LessEqual),
            (">=", Operator::GreaterEqual),
            ("<", Operator::Less),
            ("==", Operator::Equal),
            ("!=", Operator::NotEqual),
            (";", Operator::Parallel),
            (",", Operator::Tuple),
        ];
        for (input, expected) in cases {
            let (rest, token) = parse_operator(input).unwrap();
            assert_eq!(rest, "", "input: {}", input);
            assert_eq!(token, Token::Operator(expected));
        }
    }

    #[test]
    fn test_word_operators() {
        assert_eq!(
            parse_operator("AND #b").unwrap(),
            (" #b", Token::Operator(Operator::And))
        );
        assert_eq!(
            parse_operator("or(").unwrap(),
            ("(", Token::Operator(Operator::Or))
        );
        assert!(parse_operator("ORDER").is_err());
        assert!(parse_operator("ANDROID").is_err());
    }

    #[test]
    fn test_precedence_order() {
        assert!(Operator::Parallel.precedence() < Operator::Tuple.precedence());
        assert!(Operator::Tuple.precedence() < Operator::Or.precedence());
        assert!(Operator::Or.precedence() < Operator::And.precedence());
        assert!(Operator::And.precedence() < Operator::Less.precedence());
        assert!(Operator::Less.precedence() < Operator::Equal.precedence());
        assert!(Operator::Equal.precedence() < Operator::Chain.precedence());
    }

    #[test]
    fn test_punctuation() {
        assert_eq!(
            parse_punctuation(")").unwrap(),
            ("", Token::Punctuation(Punctuation::CloseParen))
        );
        assert!(parse_punctuation("[").is_err());
    }
}
