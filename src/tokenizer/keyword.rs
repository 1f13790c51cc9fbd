use nom::{bytes::complete::take_while1, error::context};

use super::token::{is_identifier_char, ParserResult, Token};

/// Keywords of the conditional construct. Matched case-insensitively.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::EnumString,
    strum::Display,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Keyword {
    If,
    Do,
    Else,
}

/// Parses a keyword only when it is a whole word, so `if_ignore` or `dollar` never
/// produce a keyword token.
pub fn parse_keyword(input: &str) -> ParserResult<Token> {
    let (rest, word) = context("keyword", take_while1(is_identifier_char))(input)?;
    match word.parse::<Keyword>() {
        Ok(keyword) => Ok((rest, Token::Keyword(keyword))),
        Err(_) => Err(nom::Err::Error(nom::error::VerboseError {
            errors: vec![(
                input,
                nom::error::VerboseErrorKind::Context("keyword"),
            )],
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_keywords_case_insensitive() {
        for (input, expected) in [("IF", Keyword::If), ("do", Keyword::Do), ("Else", Keyword::Else)] {
            let (rest, token) = parse_keyword(input).unwrap();
            assert_eq!(rest, "");
            assert_eq!(token, Token::Keyword(expected));
        }
    }

    #[test]
    fn test_keyword_requires_word_boundary() {
        assert!(parse_keyword("if_ignore").is_err());
        assert!(parse_keyword("done").is_err());
        let (rest, _) = parse_keyword("IF(#a)").unwrap();
        assert_eq!(rest, "(#a)");
    }

    #[test]
    fn test_keyword_display() {
        let words: Vec<String> = Keyword::iter().map(|k| k.to_string()).collect();
        assert_eq!(words, vec!["IF", "DO", "ELSE"]);
    }
}
