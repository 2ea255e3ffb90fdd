//! This module defines [Symbol] and [Constant].

use std::fmt::Display;

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag},
    character::complete::{char, digit1},
    combinator::{all_consuming, map, map_res, opt, recognize, rest},
    sequence::{delimited, pair},
    IResult,
};

use sarasate_physical::datavalues::{is_variable_text, NO_PATH};

use crate::util::traced;

/// Constant operand of a clause
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Constant {
    /// Integer constant
    Int(i64),
    /// String constant, including [NO_PATH]
    Str(String),
}

impl Constant {
    /// Text of the constant when compared as a string.
    pub fn text(&self) -> String {
        match self {
            Constant::Int(value) => value.to_string(),
            Constant::Str(text) => text.clone(),
        }
    }
}

impl Display for Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constant::Int(value) => write!(f, "{value}"),
            Constant::Str(text) if is_variable_text(text) || text.trim().parse::<i64>().is_ok() => {
                write!(f, "'{text}'")
            }
            Constant::Str(text) => write!(f, "{text}"),
        }
    }
}

/// Operand of a clause
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
    /// Free placeholder that is never evaluated
    Variable(String),
    /// Concrete value
    Constant(Constant),
    /// Integer-valued path length `l(<argument>)`
    ///
    /// The term is identified by its argument text,
    /// so `l(x1)` and `l(3303 9583)` are both opaque integer terms.
    Length(String),
}

impl Symbol {
    /// Create a variable.
    pub fn variable<S: Into<String>>(name: S) -> Self {
        Self::Variable(name.into())
    }

    /// Create a string constant.
    pub fn string<S: Into<String>>(text: S) -> Self {
        Self::Constant(Constant::Str(text.into()))
    }

    /// Create an integer constant.
    pub fn int(value: i64) -> Self {
        Self::Constant(Constant::Int(value))
    }

    /// Classify an operand.
    ///
    /// Quoted text is a string constant, integers are integer constants,
    /// `l(..)` is a length term and text starting with a letter is a variable.
    /// Everything else, including [NO_PATH], is a string constant.
    pub fn parse(operand: &str) -> Self {
        match all_consuming(symbol)(operand.trim()) {
            Ok((_, symbol)) => symbol,
            Err(_) => Self::string(operand.trim()),
        }
    }

    /// Returns `true` if this is a variable.
    pub fn is_variable(&self) -> bool {
        matches!(self, Symbol::Variable(_))
    }

    /// Returns `true` if this is the [NO_PATH] sentinel.
    pub fn is_no_path(&self) -> bool {
        matches!(self, Symbol::Constant(Constant::Str(text)) if text == NO_PATH)
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Symbol::Variable(name) => write!(f, "{name}"),
            Symbol::Constant(constant) => write!(f, "{constant}"),
            Symbol::Length(argument) => write!(f, "l({argument})"),
        }
    }
}

fn quoted(input: &str) -> IResult<&str, Symbol> {
    traced(
        "quoted",
        map(
            alt((
                delimited(char('\''), opt(is_not("'")), char('\'')),
                delimited(char('"'), opt(is_not("\"")), char('"')),
            )),
            |text: Option<&str>| Symbol::string(text.unwrap_or_default()),
        ),
    )(input)
}

fn length(input: &str) -> IResult<&str, Symbol> {
    traced(
        "length",
        map(
            delimited(tag("l("), is_not(")"), char(')')),
            |argument: &str| Symbol::Length(argument.trim().to_string()),
        ),
    )(input)
}

fn integer(input: &str) -> IResult<&str, Symbol> {
    traced(
        "integer",
        map_res(recognize(pair(opt(char('-')), digit1)), |digits: &str| {
            digits.parse::<i64>().map(Symbol::int)
        }),
    )(input)
}

fn word(input: &str) -> IResult<&str, Symbol> {
    traced(
        "word",
        map(rest, |text: &str| {
            if is_variable_text(text) {
                Symbol::variable(text)
            } else {
                Symbol::string(text)
            }
        }),
    )(input)
}

fn symbol(input: &str) -> IResult<&str, Symbol> {
    alt((
        all_consuming(quoted),
        all_consuming(length),
        all_consuming(integer),
        word,
    ))(input)
}
