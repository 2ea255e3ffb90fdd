//! This module collects small helpers used by the parsers.

use std::fmt::Debug;

use nom::IResult;

/// A combinator to add tracing to the parser.
/// [fun] is an identifier for the parser and [parser] is the actual parser.
pub(crate) fn traced<'a, T, P>(
    fun: &'static str,
    mut parser: P,
) -> impl FnMut(&'a str) -> IResult<&'a str, T>
where
    T: Debug,
    P: FnMut(&'a str) -> IResult<&'a str, T>,
{
    move |input| {
        log::trace!(target: "parser", "{fun}({input:?})");
        let result = parser(input);
        log::trace!(target: "parser", "{fun}({input:?}) -> {result:?}");
        result
    }
}

/// Returns `true` if the character may be part of a word.
fn is_word_character(character: char) -> bool {
    character.is_alphanumeric() || character == '_' || character == '.'
}

/// Byte offsets of the case-insensitive occurrences of `keyword` as a whole word,
/// ignoring quoted text.
///
/// Unless `nested` is set, occurrences inside parentheses are ignored.
pub(crate) fn keyword_positions(text: &str, keyword: &str, nested: bool) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut previous: Option<char> = None;

    for (index, character) in text.char_indices() {
        match (quote, character) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(character),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, _) if depth == 0 || nested => {
                let starts_word = !previous.is_some_and(is_word_character);
                let matches = text
                    .get(index..index + keyword.len())
                    .is_some_and(|candidate| candidate.eq_ignore_ascii_case(keyword));
                let ends_word = !text[index..]
                    .get(keyword.len()..)
                    .and_then(|rest| rest.chars().next())
                    .is_some_and(is_word_character);

                if starts_word && matches && ends_word {
                    positions.push(index);
                }
            }
            _ => {}
        }

        previous = Some(character);
    }

    positions
}

/// Split the text at every top-level occurrence of `keyword`.
pub(crate) fn split_keyword<'a>(text: &'a str, keyword: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;

    for position in keyword_positions(text, keyword, false) {
        parts.push(&text[start..position]);
        start = position + keyword.len();
    }
    parts.push(&text[start..]);

    parts
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::{keyword_positions, split_keyword};

    #[test]
    fn keywords() {
        let text = "SELECT * FROM policy WHERE path = 'from where' AND (a = 1 or b = 2)";
        assert_eq!(keyword_positions(text, "select", false), vec![0]);
        assert_eq!(keyword_positions(text, "from", false), vec![9]);
        assert_eq!(keyword_positions(text, "where", false), vec![21]);
        assert_eq!(keyword_positions(text, "or", false), Vec::<usize>::new());
        assert_eq!(keyword_positions(text, "or", true).len(), 1);
        assert!(keyword_positions("landmark = 3 and t.and = 2", "and", false) == vec![13]);
    }

    #[test]
    fn split() {
        assert_eq!(
            split_keyword("a<=b and c>=d AND e!=f", "and"),
            vec!["a<=b ", " c>=d ", " e!=f"]
        );
        assert_eq!(split_keyword("min_len <= 3", "and"), vec!["min_len <= 3"]);
    }
}
