use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, take_while1},
    character::complete::{char, digit1, satisfy},
    combinator::{map, map_res, not, opt, peek, recognize, value},
    error::{context, VerboseError, VerboseErrorKind},
    sequence::{delimited, pair, terminated, tuple},
};

use crate::types::{Value, ValueType};

use super::token::{is_identifier_char, ParserResult, Token};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Null,
}

impl Literal {
    /// The declared type of the literal. Integers are `Long`, `null` is `Any`.
    pub fn value_type(&self) -> ValueType {
        match self {
            Literal::String(_) => ValueType::String,
            Literal::Integer(_) => ValueType::Long,
            Literal::Decimal(_) => ValueType::Double,
            Literal::Boolean(_) => ValueType::Bool,
            Literal::Null => ValueType::Any,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Literal::String(s) => Value::String(s.clone()),
            Literal::Integer(i) => Value::Long(*i),
            Literal::Decimal(d) => Value::Double(*d),
            Literal::Boolean(b) => Value::Bool(*b),
            Literal::Null => Value::Null,
        }
    }
}

fn quoted<'a>(quote: char) -> impl FnMut(&'a str) -> ParserResult<'a, String> {
    let stop: &'static str = if quote == '"' { "\"\\" } else { "'\\" };
    move |input| {
        delimited(
            char(quote),
            map(
                opt(escaped_transform(
                    is_not(stop),
                    '\\',
                    alt((
                        value("\\", char('\\')),
                        value("\"", char('"')),
                        value("'", char('\'')),
                        value("\n", char('n')),
                        value("\t", char('t')),
                    )),
                )),
                Option::unwrap_or_default,
            ),
            char(quote),
        )(input)
    }
}

fn parse_string_literal(input: &str) -> ParserResult<Literal> {
    context(
        "string literal",
        map(alt((quoted('"'), quoted('\''))), Literal::String),
    )(input)
}

/// A number must not run straight into an identifier (`12ab`) or a sigil (`1#x`).
fn number_boundary(input: &str) -> ParserResult<()> {
    not(peek(satisfy(|c| is_identifier_char(c) || c == '#' || c == '.')))(input)
}

fn parse_decimal_literal(input: &str) -> ParserResult<Literal> {
    context(
        "decimal literal",
        map_res(
            terminated(
                recognize(tuple((opt(char('-')), digit1, char('.'), digit1))),
                number_boundary,
            ),
            |s: &str| s.parse::<f64>().map(Literal::Decimal),
        ),
    )(input)
}

fn parse_integer_literal(input: &str) -> ParserResult<Literal> {
    context(
        "integer literal",
        map_res(
            terminated(recognize(pair(opt(char('-')), digit1)), number_boundary),
            |s: &str| s.parse::<i64>().map(Literal::Integer),
        ),
    )(input)
}

fn parse_word_literal(input: &str) -> ParserResult<Literal> {
    let (rest, word) = take_while1(is_identifier_char)(input)?;
    let literal = match word {
        "true" => Literal::Boolean(true),
        "false" => Literal::Boolean(false),
        "null" => Literal::Null,
        _ => {
            return Err(nom::Err::Error(VerboseError {
                errors: vec![(input, VerboseErrorKind::Context("word literal"))],
            }))
        }
    };
    Ok((rest, literal))
}

pub fn parse_literal_value(input: &str) -> ParserResult<Literal> {
    context(
        "literal",
        alt((
            parse_string_literal,
            parse_decimal_literal,
            parse_integer_literal,
            parse_word_literal,
        )),
    )(input)
}

pub fn parse_literal(input: &str) -> ParserResult<Token> {
    map(parse_literal_value, Token::Value)(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_string_literals() {
        let (rest, result) = parse_string_literal("\"hello world\" ->").unwrap();
        assert_eq!(rest, " ->");
        assert_eq!(result, Literal::String("hello world".to_string()));

        let (_, result) = parse_string_literal("'it''").unwrap();
        assert_eq!(result, Literal::String("it".to_string()));

        let (_, result) = parse_string_literal(r#""say \"hi\"\n""#).unwrap();
        assert_eq!(result, Literal::String("say \"hi\"\n".to_string()));

        let (_, result) = parse_string_literal("\"\"").unwrap();
        assert_eq!(result, Literal::String(String::new()));
    }

    #[test]
    fn test_number_literals() {
        assert_eq!(parse_literal_value("123").unwrap(), ("", Literal::Integer(123)));
        assert_eq!(parse_literal_value("-7 ").unwrap(), (" ", Literal::Integer(-7)));
        assert_eq!(parse_literal_value("1.5)").unwrap(), (")", Literal::Decimal(1.5)));
        assert!(parse_literal_value("12ab").is_err());
        assert!(parse_literal_value("99999999999999999999").is_err());
    }

    #[test]
    fn test_word_literals() {
        assert_eq!(parse_literal_value("true").unwrap(), ("", Literal::Boolean(true)));
        assert_eq!(parse_literal_value("false,").unwrap(), (",", Literal::Boolean(false)));
        assert_eq!(parse_literal_value("null").unwrap(), ("", Literal::Null));
        assert!(parse_literal_value("trueish").is_err());
    }

    #[test]
    fn test_literal_types() {
        assert_eq!(Literal::Integer(1).value_type(), ValueType::Long);
        assert_eq!(Literal::Null.value_type(), ValueType::Any);
        assert_eq!(Literal::Decimal(0.5).to_value(), Value::Double(0.5));
    }

    proptest! {
        #[test]
        fn test_integer_literal_roundtrip(n in any::<i64>()) {
            let text = n.to_string();
            let (rest, literal) = parse_literal_value(&text).unwrap();
            prop_assert_eq!(rest, "");
            prop_assert_eq!(literal, Literal::Integer(n));
        }
    }
}
