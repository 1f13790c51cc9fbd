use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{all_consuming, map, map_res, opt, recognize, value},
    error::{context, VerboseError, VerboseErrorKind},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult, InputTake,
};
use nom_locate::LocatedSpan;

use crate::tokenizer::token::is_identifier_char;

use super::{
    ast::{BinaryOp, SnippetExpr, SnippetLiteral, UnaryOp},
    SnippetError,
};

type Span<'a> = LocatedSpan<&'a str>;
type SnippetResult<'a, T> = IResult<Span<'a>, T, VerboseError<Span<'a>>>;

fn failure<'a, T>(input: Span<'a>, message: &'static str) -> SnippetResult<'a, T> {
    Err(nom::Err::Error(VerboseError {
        errors: vec![(input, VerboseErrorKind::Context(message))],
    }))
}

fn ws<'a, T>(
    inner: impl FnMut(Span<'a>) -> SnippetResult<'a, T>,
) -> impl FnMut(Span<'a>) -> SnippetResult<'a, T> {
    delimited(multispace0, inner, multispace0)
}

fn number(input: Span) -> SnippetResult<SnippetLiteral> {
    context(
        "number",
        alt((
            map_res(
                recognize(tuple((digit1, char('.'), digit1))),
                |s: Span| s.fragment().parse::<f64>().map(SnippetLiteral::Decimal),
            ),
            map_res(digit1, |s: Span| {
                s.fragment().parse::<i64>().map(SnippetLiteral::Integer)
            }),
        )),
    )(input)
}

/// Single or double quoted, with backslash escapes.
fn string(input: Span) -> SnippetResult<SnippetLiteral> {
    let quote = match input.fragment().chars().next() {
        Some(q @ ('"' | '\'')) => q,
        _ => return failure(input, "string"),
    };
    let mut text = String::new();
    let mut escaped = false;
    for (offset, c) in input.fragment().char_indices().skip(1) {
        if escaped {
            text.push(match c {
                'n' => '\n',
                't' => '\t',
                other => other,
            });
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            let (rest, _) = input.take_split(offset + c.len_utf8());
            return Ok((rest, SnippetLiteral::String(text)));
        } else {
            text.push(c);
        }
    }
    Err(nom::Err::Failure(VerboseError {
        errors: vec![(input, VerboseErrorKind::Context("unterminated string"))],
    }))
}

fn identifier(input: Span) -> SnippetResult<Span> {
    take_while1(is_identifier_char)(input)
}

fn word_literal(input: Span) -> SnippetResult<SnippetLiteral> {
    let (rest, word) = identifier(input)?;
    let literal = match *word.fragment() {
        "true" => SnippetLiteral::Bool(true),
        "false" => SnippetLiteral::Bool(false),
        "null" => SnippetLiteral::Null,
        _ => return failure(input, "word literal"),
    };
    if rest.fragment().starts_with(['(', '.']) {
        return failure(input, "word literal");
    }
    Ok((rest, literal))
}

fn arguments(input: Span) -> SnippetResult<Vec<SnippetExpr>> {
    delimited(
        ws(char('(')),
        separated_list0(char(','), ws(ternary)),
        char(')'),
    )(input)
}

/// `#name`, `name(args)`, or `Owner.Path.name(args)`. The sigil makes the
/// argument list optional.
fn call(input: Span) -> SnippetResult<SnippetExpr> {
    let (rest, (sigil, first, more)) = tuple((
        opt(char('#')),
        identifier,
        many0(preceded(char('.'), identifier)),
    ))(input)?;
    let (rest, args) = if sigil.is_some() {
        map(opt(arguments), Option::unwrap_or_default)(rest)?
    } else {
        context("argument list", arguments)(rest)?
    };

    let mut path: Vec<&str> = std::iter::once(*first.fragment())
        .chain(more.iter().map(|s| *s.fragment()))
        .collect();
    let name = path.pop().unwrap_or_default().to_string();
    let owner = if path.is_empty() {
        None
    } else {
        Some(path.join("."))
    };
    Ok((rest, SnippetExpr::Call { owner, name, args }))
}

fn primary(input: Span) -> SnippetResult<SnippetExpr> {
    ws(alt((
        map(number, SnippetExpr::literal),
        map(string, SnippetExpr::literal),
        delimited(char('('), ternary, char(')')),
        map(word_literal, SnippetExpr::literal),
        context("call", call),
    )))(input)
}

fn unary(input: Span) -> SnippetResult<SnippetExpr> {
    alt((
        map(preceded(ws(char('!')), unary), |e| SnippetExpr::unary(UnaryOp::Not, e)),
        map(preceded(ws(char('-')), unary), |e| {
            SnippetExpr::unary(UnaryOp::Negate, e)
        }),
        primary,
    ))(input)
}

fn fold(first: SnippetExpr, rest: Vec<(BinaryOp, SnippetExpr)>) -> SnippetExpr {
    rest.into_iter()
        .fold(first, |left, (op, right)| SnippetExpr::binary(op, left, right))
}

fn product(input: Span) -> SnippetResult<SnippetExpr> {
    let op = alt((
        value(BinaryOp::Mul, char('*')),
        value(BinaryOp::Div, char('/')),
        value(BinaryOp::Rem, char('%')),
    ));
    map(pair(unary, many0(pair(ws(op), unary))), |(first, rest)| {
        fold(first, rest)
    })(input)
}

fn sum(input: Span) -> SnippetResult<SnippetExpr> {
    let op = alt((
        value(BinaryOp::Add, char('+')),
        value(BinaryOp::Sub, char('-')),
    ));
    map(pair(product, many0(pair(ws(op), product))), |(first, rest)| {
        fold(first, rest)
    })(input)
}

fn comparison(input: Span) -> SnippetResult<SnippetExpr> {
    let op = alt((
        value(BinaryOp::Eq, tag("==")),
        value(BinaryOp::Ne, tag("!=")),
        value(BinaryOp::Le, tag("<=")),
        value(BinaryOp::Ge, tag(">=")),
        value(BinaryOp::Lt, char('<')),
        value(BinaryOp::Gt, char('>')),
    ));
    map(pair(sum, opt(pair(ws(op), sum))), |(left, rest)| match rest {
        Some((op, right)) => SnippetExpr::binary(op, left, right),
        None => left,
    })(input)
}

fn conjunction(input: Span) -> SnippetResult<SnippetExpr> {
    map(
        pair(comparison, many0(preceded(ws(tag("&&")), comparison))),
        |(first, rest)| fold(first, rest.into_iter().map(|e| (BinaryOp::And, e)).collect()),
    )(input)
}

fn disjunction(input: Span) -> SnippetResult<SnippetExpr> {
    map(
        pair(conjunction, many0(preceded(ws(tag("||")), conjunction))),
        |(first, rest)| fold(first, rest.into_iter().map(|e| (BinaryOp::Or, e)).collect()),
    )(input)
}

fn ternary(input: Span) -> SnippetResult<SnippetExpr> {
    let (rest, condition) = disjunction(input)?;
    let (rest, branches) = opt(pair(
        preceded(ws(char('?')), ternary),
        preceded(ws(char(':')), ternary),
    ))(rest)?;
    Ok(match branches {
        Some((then, otherwise)) => (
            rest,
            SnippetExpr::Ternary {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
        ),
        None => (rest, condition),
    })
}

/// Parses the body of a `${...}` snippet.
pub fn parse_snippet(text: &str) -> Result<SnippetExpr, SnippetError> {
    let input = Span::new(text);
    match all_consuming(terminated(ternary, multispace0))(input) {
        Ok((_, expr)) => Ok(expr),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let (span, kind) = e
                .errors
                .iter()
                .find(|(_, kind)| matches!(kind, VerboseErrorKind::Context(_)))
                .or_else(|| e.errors.first())
                .cloned()
                .unwrap_or((input, VerboseErrorKind::Context("expression")));
            let message = match kind {
                VerboseErrorKind::Context(context) => format!("expected {}", context),
                VerboseErrorKind::Char(c) => format!("expected '{}'", c),
                VerboseErrorKind::Nom(kind) => format!("unexpected input ({:?})", kind),
            };
            Err(SnippetError::Syntax {
                message,
                position: span.location_offset(),
            })
        }
        Err(nom::Err::Incomplete(_)) => Err(SnippetError::Syntax {
            message: "incomplete input".to_string(),
            position: text.len(),
        }),
    }
}
