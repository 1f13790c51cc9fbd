use tracing::debug;

use crate::tokenizer::{Keyword, Lexer, Punctuation, Token, TokenSpan};

use super::{
    core::{ParseError, ParseResult},
    node::SyntaxNode,
};

/// Precedence-climbing parser over a [`Lexer`].
///
/// Binary operators bind by [`crate::tokenizer::Operator::precedence`] and associate
/// to the left, so `#a -> #b -> #c` groups as `((#a -> #b) -> #c)`. The `IF`
/// construct has its own rule in [`Parser::parse_conditional`].
pub struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            lexer: Lexer::new(source),
        }
    }

    /// Parses the whole input into one tree.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn parse(&mut self) -> ParseResult<SyntaxNode> {
        let node = self.parse_expression(0)?;
        if let Some(span) = self.lexer.next()? {
            return Err(ParseError::UnexpectedToken {
                found: span.token.to_string(),
                position: span.start,
            });
        }
        debug!("parsed {}", node);
        Ok(node)
    }

    fn parse_expression(&mut self, min_precedence: u8) -> ParseResult<SyntaxNode> {
        let mut left = self.parse_atom()?;

        loop {
            let (operator, position) = match self.lexer.peek()? {
                None => break,
                Some(TokenSpan {
                    token: Token::Operator(op),
                    start,
                    ..
                }) => (*op, *start),
                Some(TokenSpan {
                    token:
                        Token::Punctuation(Punctuation::CloseParen)
                        | Token::Keyword(Keyword::Do | Keyword::Else),
                    ..
                }) => break,
                Some(span) => {
                    return Err(ParseError::UndefinedOperator {
                        found: span.token.to_string(),
                        position: span.start,
                    })
                }
            };
            if operator.precedence() < min_precedence {
                break;
            }
            self.lexer.next()?;
            let right = self.parse_expression(operator.precedence() + 1)?;
            left = SyntaxNode::Binary {
                left: Box::new(left),
                right: Box::new(right),
                operator,
                position,
            };
        }

        Ok(left)
    }

    fn parse_atom(&mut self) -> ParseResult<SyntaxNode> {
        let position = self.lexer.position();
        let Some(span) = self.lexer.next()? else {
            return Err(ParseError::UnexpectedEnd { position });
        };

        match span.token {
            token @ (Token::Value(_) | Token::Reference(_) | Token::Generator(_)) => {
                Ok(SyntaxNode::Leaf {
                    token,
                    position: span.start,
                })
            }
            Token::Punctuation(Punctuation::OpenParen) => {
                let inner = self.parse_expression(0)?;
                match self.lexer.next()? {
                    Some(TokenSpan {
                        token: Token::Punctuation(Punctuation::CloseParen),
                        ..
                    }) => Ok(inner),
                    Some(other) => Err(ParseError::UnexpectedToken {
                        found: other.token.to_string(),
                        position: other.start,
                    }),
                    None => Err(ParseError::UnexpectedEnd {
                        position: self.lexer.position(),
                    }),
                }
            }
            Token::Keyword(Keyword::If) => self.parse_conditional(span.start),
            other => Err(ParseError::UnexpectedToken {
                found: other.to_string(),
                position: span.start,
            }),
        }
    }

    /// Rejects anything after `IF`, `DO` or `ELSE` that cannot start an operand.
    fn check_if_argument(&mut self) -> ParseResult<()> {
        let position = self.lexer.position();
        match self.lexer.peek()? {
            Some(TokenSpan {
                token:
                    Token::Value(_)
                    | Token::Reference(_)
                    | Token::Generator(_)
                    | Token::Keyword(Keyword::If)
                    | Token::Punctuation(Punctuation::OpenParen),
                ..
            }) => Ok(()),
            Some(span) => Err(ParseError::IllegalIfArgument {
                found: span.token.to_string(),
                position: span.start,
            }),
            None => Err(ParseError::IllegalIfArgument {
                found: String::new(),
                position,
            }),
        }
    }

    fn parse_conditional(&mut self, position: usize) -> ParseResult<SyntaxNode> {
        self.check_if_argument()?;
        let predicate = self.parse_expression(0)?;

        match self.lexer.peek()? {
            Some(TokenSpan {
                token: Token::Keyword(Keyword::Do),
                ..
            }) => {
                self.lexer.next()?;
            }
            _ => {
                return Err(ParseError::MissingDoStatement {
                    position: self.lexer.position(),
                })
            }
        }

        self.check_if_argument()?;
        let do_branch = self.parse_expression(0)?;

        let else_branch = match self.lexer.peek()? {
            Some(TokenSpan {
                token: Token::Keyword(Keyword::Else),
                ..
            }) => {
                self.lexer.next()?;
                self.check_if_argument()?;
                Some(Box::new(self.parse_expression(0)?))
            }
            _ => None,
        };

        Ok(SyntaxNode::Conditional {
            predicate: Box::new(predicate),
            do_branch: Box::new(do_branch),
            else_branch,
            position,
        })
    }
}

pub fn parse(source: &str) -> ParseResult<SyntaxNode> {
    Parser::new(source).parse()
}
