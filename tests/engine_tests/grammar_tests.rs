use botexpr::{
    analyzer::{self, ErrorCode},
    tokenizer::{Lexer, ReferenceToken, Token},
    Error, ValueType,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use super::fixtures::{factory, namespace, Recorder};

#[test]
fn test_keyword_prefix_lexes_as_reference() {
    let tokens: Vec<Token> = Lexer::new("if_ignore.Class#method")
        .tokenize()
        .unwrap()
        .into_iter()
        .map(|span| span.token)
        .collect();
    assert_eq!(
        tokens,
        vec![Token::Reference(
            ReferenceToken::new("method").with_owner("if_ignore.Class")
        )]
    );
}

#[test]
fn test_qualified_reference_evaluates() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, &Recorder::default());
    let value = factory
        .create::<String>("if_ignore.Class#method", &namespace())
        .unwrap();
    assert_eq!(value.generate(&Default::default()).unwrap(), "ignored");
}

#[test]
fn test_missing_do_position() {
    let err = analyzer::parse("IF #a").unwrap_err();
    assert_eq!(err.code(), ErrorCode::MissingDoStatement);
    assert_eq!(err.position(), 5);
}

#[test]
fn test_chain_is_left_associative() {
    assert_eq!(
        analyzer::parse("#a -> #b -> #c").unwrap().to_string(),
        "((#a -> #b) -> #c)"
    );
}

#[test]
fn test_grammar_error_reports_origin() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, &Recorder::default());
    let err = factory
        .create_at(
            "IF #first DO",
            ValueType::Int,
            &namespace(),
            Some("menu.xml:7".to_string()),
        )
        .unwrap_err();
    match err {
        Error::InvalidExpression { text, location, .. } => {
            assert_eq!(text, "IF #first DO");
            assert_eq!(location.origin.as_deref(), Some("menu.xml:7"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_compile_error_reports_origin() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, &Recorder::default());
    let err = factory
        .create_at(
            "#first -> #missing",
            ValueType::Any,
            &namespace(),
            Some("menu.xml:9".to_string()),
        )
        .unwrap_err();
    assert!(err.to_string().contains("#missing"));
    assert!(err.to_string().contains("menu.xml:9"));
}
