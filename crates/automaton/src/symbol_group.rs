use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use itertools::Itertools;
use log::trace;
use rustc_hash::FxHashSet;
use thiserror::Error;

use fsm_collections::VecSet;

/// The textual notation of the empty symbol.
pub const EMPTY_SYMBOL: char = 'ε';

/// The ASCII alternative for the empty symbol.
pub const EMPTY_SYMBOL_ALT: char = '~';

/// The delimiter that is used when no other delimiter is given.
pub const DEFAULT_DELIMITER: char = ',';

/// The contiguous blocks of characters in which `x-y` ranges are allowed.
const RANGE_BLOCKS: [(char, char); 6] = [
    ('A', 'Z'),
    ('a', 'z'),
    ('0', '9'),
    ('\u{0391}', '\u{03A9}'),
    ('\u{03B1}', '\u{03C9}'),
    ('\u{0410}', '\u{044F}'),
];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SymbolGroupError {
    #[error("Invalid character {0:?} in symbol group")]
    InvalidCharacter(char),

    #[error("Invalid escape sequence \\{0}")]
    InvalidEscape(char),

    #[error("Symbol group ends with a dangling escape")]
    DanglingEscape,

    #[error("Invalid range {0}-{1}, both ends must lie in the same block and be ordered")]
    InvalidRange(char, char),

    #[error("Invalid token {0:?}, expected a single symbol or a range x-y")]
    InvalidToken(String),
}

/// A single symbol of a transition label.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Symbol {
    /// The empty symbol, a transition labelled with it consumes no input.
    Empty,
    /// An input character.
    Char(char),
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Empty => write!(f, "{EMPTY_SYMBOL}"),
            Symbol::Char(c) => write!(f, "{}", escape(*c, DEFAULT_DELIMITER)),
        }
    }
}

/// A set of symbols that labels a single transition.
///
/// Cloning is cheap since the underlying set is shared, and operations that do
/// not change the set return a clone sharing the same storage, which can be
/// checked with [`SymbolGroup::ptr_eq`].
#[derive(Clone)]
pub struct SymbolGroup {
    symbols: Rc<VecSet<Symbol>>,
}

impl SymbolGroup {
    /// Parses a symbol group separated by the default delimiter `,`.
    pub fn parse(text: &str) -> Result<SymbolGroup, SymbolGroupError> {
        Self::parse_with_delimiter(text, DEFAULT_DELIMITER)
    }

    /// Parses a symbol group where tokens are separated by the given delimiter.
    ///
    /// Every token is either a single (possibly escaped) character, `~` or `ε`
    /// for the empty symbol, or a range `x-y` within one of the allowed blocks.
    /// Empty input denotes the group containing only the empty symbol.
    pub fn parse_with_delimiter(text: &str, delimiter: char) -> Result<SymbolGroup, SymbolGroupError> {
        let mut symbols = Vec::new();

        for token in tokenize(text, delimiter)? {
            match token.as_slice() {
                [] => {}
                [(c, false)] if *c == EMPTY_SYMBOL || *c == EMPTY_SYMBOL_ALT => symbols.push(Symbol::Empty),
                [(c, escaped)] => {
                    if !escaped && !is_valid_literal(*c) {
                        return Err(SymbolGroupError::InvalidCharacter(*c));
                    }
                    symbols.push(Symbol::Char(*c));
                }
                [(from, false), ('-', false), (to, false)] => {
                    let block = range_block(*from);
                    if block.is_none() || block != range_block(*to) || from > to {
                        return Err(SymbolGroupError::InvalidRange(*from, *to));
                    }
                    symbols.extend((*from..=*to).map(Symbol::Char));
                }
                _ => {
                    return Err(SymbolGroupError::InvalidToken(
                        token.iter().map(|(c, _)| c).collect(),
                    ));
                }
            }
        }

        if symbols.is_empty() {
            symbols.push(Symbol::Empty);
        }

        trace!("Parsed symbol group {text:?} into {} symbols", symbols.len());
        Ok(SymbolGroup::from_symbols(symbols))
    }

    /// Creates a group from the given symbols, which may be empty.
    pub fn from_symbols(symbols: impl IntoIterator<Item = Symbol>) -> SymbolGroup {
        SymbolGroup {
            symbols: Rc::new(symbols.into_iter().collect()),
        }
    }

    /// Creates a group from the given input characters.
    pub fn from_chars(chars: impl IntoIterator<Item = char>) -> SymbolGroup {
        Self::from_symbols(chars.into_iter().map(Symbol::Char))
    }

    /// The group only containing the empty symbol.
    pub fn empty_symbol() -> SymbolGroup {
        Self::from_symbols([Symbol::Empty])
    }

    /// A group without any symbols, this is never a valid transition label.
    pub fn nothing() -> SymbolGroup {
        Self::from_symbols(std::iter::empty())
    }

    /// Returns true iff the group contains the given input character.
    pub fn has(&self, symbol: char) -> bool {
        self.symbols.contains(&Symbol::Char(symbol))
    }

    /// Returns true iff the group contains the given symbol.
    pub fn has_symbol(&self, symbol: Symbol) -> bool {
        self.symbols.contains(&symbol)
    }

    /// Returns true iff the group contains the empty symbol.
    pub fn has_empty(&self) -> bool {
        self.symbols.contains(&Symbol::Empty)
    }

    /// Returns true iff every symbol of `other` is also in this group.
    pub fn contains(&self, other: &SymbolGroup) -> bool {
        other.symbols.is_subset(&self.symbols)
    }

    /// Returns true iff both groups share at least one symbol.
    pub fn intersects(&self, other: &SymbolGroup) -> bool {
        self.symbols.intersects(&other.symbols)
    }

    /// Returns true iff the group has no symbols at all, not even the empty symbol.
    pub fn is_nothing(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Returns the number of symbols, including the empty symbol.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Iterates over the symbols in code point order, the empty symbol first.
    pub fn iter(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.symbols.iter().copied()
    }

    /// Iterates over the input characters in code point order.
    pub fn chars(&self) -> impl Iterator<Item = char> + '_ {
        self.symbols.iter().filter_map(|symbol| match symbol {
            Symbol::Empty => None,
            Symbol::Char(c) => Some(*c),
        })
    }

    /// Returns true iff both groups share the same storage.
    pub fn ptr_eq(left: &SymbolGroup, right: &SymbolGroup) -> bool {
        Rc::ptr_eq(&left.symbols, &right.symbols)
    }

    /// Returns the union of this group with all the given groups, or this
    /// group itself when nothing is added.
    pub fn merge<'a>(&self, others: impl IntoIterator<Item = &'a SymbolGroup>) -> SymbolGroup {
        let mut result: Option<VecSet<Symbol>> = None;
        for other in others {
            let current = result.as_ref().unwrap_or(self.symbols.as_ref());
            if !other.symbols.is_subset(current) {
                result = Some(current.union(&other.symbols));
            }
        }

        match result {
            Some(symbols) => SymbolGroup {
                symbols: Rc::new(symbols),
            },
            None => self.clone(),
        }
    }

    /// Returns this group without the symbols of the given groups, or this
    /// group itself when nothing is removed.
    pub fn subtract<'a>(&self, others: impl IntoIterator<Item = &'a SymbolGroup>) -> SymbolGroup {
        let mut result: Option<VecSet<Symbol>> = None;
        for other in others {
            let current = result.as_ref().unwrap_or(self.symbols.as_ref());
            if current.intersects(&other.symbols) {
                result = Some(current.difference(&other.symbols));
            }
        }

        match result {
            Some(symbols) => SymbolGroup {
                symbols: Rc::new(symbols),
            },
            None => self.clone(),
        }
    }

    /// Returns this group without the empty symbol.
    pub fn without_empty(&self) -> SymbolGroup {
        if self.has_empty() {
            self.subtract([&SymbolGroup::empty_symbol()])
        } else {
            self.clone()
        }
    }

    /// Returns true iff any two of the given groups share a symbol.
    pub fn share_any<'a>(groups: impl IntoIterator<Item = &'a SymbolGroup>) -> bool {
        let mut seen: FxHashSet<Symbol> = FxHashSet::default();
        for group in groups {
            for symbol in group.iter() {
                if !seen.insert(symbol) {
                    return true;
                }
            }
        }

        false
    }

    /// Prints the canonical form of the group.
    ///
    /// Runs of at least three consecutive characters within one of the range
    /// blocks are printed as `x-y`, when that is strictly shorter than listing
    /// them. When the delimiter is a single character surrounded by optional
    /// whitespace, occurrences of that character are escaped such that the
    /// result can be parsed again with [`SymbolGroup::parse_with_delimiter`].
    /// Otherwise the default delimiter is escaped.
    pub fn to_string_with(&self, delimiter: &str, include_empty: bool) -> String {
        let delimiter_len = delimiter.chars().count();
        let escaped_delimiter = delimiter.trim().chars().exactly_one().unwrap_or(DEFAULT_DELIMITER);
        let mut tokens: Vec<String> = Vec::new();

        if include_empty && self.has_empty() {
            tokens.push(EMPTY_SYMBOL.to_string());
        }

        let chars: Vec<char> = self.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            // Find the maximal run of consecutive characters within one block.
            let block = range_block(chars[i]);
            let mut end = i + 1;
            if block.is_some() {
                while end < chars.len()
                    && chars[end] as u32 == chars[end - 1] as u32 + 1
                    && range_block(chars[end]) == block
                {
                    end += 1;
                }
            }

            let run = &chars[i..end];
            let listed: Vec<String> = run.iter().map(|c| escape(*c, escaped_delimiter)).collect();
            let listed_len = listed.iter().map(|token| token.chars().count()).sum::<usize>()
                + (listed.len() - 1) * delimiter_len;

            if run.len() >= 3 && 3 < listed_len {
                tokens.push(format!("{}-{}", run[0], run[run.len() - 1]));
            } else {
                tokens.extend(listed);
            }

            i = end;
        }

        tokens.join(delimiter)
    }
}

impl PartialEq for SymbolGroup {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other) || self.symbols == other.symbols
    }
}

impl Eq for SymbolGroup {}

impl FromStr for SymbolGroup {
    type Err = SymbolGroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SymbolGroup::parse(s)
    }
}

impl fmt::Display for SymbolGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_with(", ", true))
    }
}

impl fmt::Debug for SymbolGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.symbols.iter().format(" "))
    }
}

/// Splits the text at unescaped delimiters, every character is paired with
/// whether it was escaped. Unescaped whitespace around a token is removed.
fn tokenize(text: &str, delimiter: char) -> Result<Vec<Vec<(char, bool)>>, SymbolGroupError> {
    let mut tokens = Vec::new();
    let mut current: Vec<(char, bool)> = Vec::new();

    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            let escaped = chars.next().ok_or(SymbolGroupError::DanglingEscape)?;
            current.push((unescape(escaped, delimiter)?, true));
        } else if c == delimiter {
            tokens.push(trim_token(std::mem::take(&mut current)));
        } else {
            current.push((c, false));
        }
    }
    tokens.push(trim_token(current));

    Ok(tokens)
}

/// Removes the unescaped whitespace at both ends of a token.
fn trim_token(mut token: Vec<(char, bool)>) -> Vec<(char, bool)> {
    while token.last().is_some_and(|(c, escaped)| !escaped && c.is_whitespace()) {
        token.pop();
    }

    let leading = token
        .iter()
        .take_while(|(c, escaped)| !escaped && c.is_whitespace())
        .count();
    token.drain(..leading);
    token
}

/// Returns the character denoted by the escape sequence `\c`.
fn unescape(c: char, delimiter: char) -> Result<char, SymbolGroupError> {
    match c {
        'n' => Ok('\n'),
        'r' => Ok('\r'),
        't' => Ok('\t'),
        'f' => Ok('\u{000C}'),
        'v' => Ok('\u{000B}'),
        '\\' | '-' | ' ' | DEFAULT_DELIMITER | EMPTY_SYMBOL | EMPTY_SYMBOL_ALT => Ok(c),
        _ if c == delimiter => Ok(c),
        _ => Err(SymbolGroupError::InvalidEscape(c)),
    }
}

/// Returns the textual form of a single character such that it parses back
/// to the same character.
fn escape(c: char, delimiter: char) -> String {
    match c {
        '\n' => "\\n".to_string(),
        '\r' => "\\r".to_string(),
        '\t' => "\\t".to_string(),
        '\u{000C}' => "\\f".to_string(),
        '\u{000B}' => "\\v".to_string(),
        '\\' | ' ' | EMPTY_SYMBOL | EMPTY_SYMBOL_ALT => format!("\\{c}"),
        _ if c == delimiter => format!("\\{c}"),
        _ => c.to_string(),
    }
}

/// Returns true iff the character may appear unescaped as a symbol.
fn is_valid_literal(c: char) -> bool {
    !c.is_control() && !c.is_whitespace()
}

/// Returns the range block that contains the given character.
fn range_block(c: char) -> Option<usize> {
    RANGE_BLOCKS.iter().position(|(from, to)| (*from..=*to).contains(&c))
}

#[cfg(test)]
mod tests {
    use test_case::test_case;
    use test_log::test;

    use super::*;

    fn group(text: &str) -> SymbolGroup {
        SymbolGroup::parse(text).unwrap()
    }

    #[test]
    fn test_range_printing() {
        let abc = group("a-c");
        assert_eq!(abc.to_string_with(",", false), "a-c");
        assert!(abc.has('b'));
        assert!(!abc.has('d'));
    }

    #[test]
    fn test_merge_printing() {
        let merged = group("a").merge([&group("b")]);
        assert_eq!(merged.to_string_with(", ", false), "a, b");
    }

    #[test_case("", &[Symbol::Empty] ; "empty input")]
    #[test_case("~", &[Symbol::Empty] ; "tilde")]
    #[test_case("ε", &[Symbol::Empty] ; "epsilon")]
    #[test_case("\\ε", &[Symbol::Char('ε')] ; "escaped epsilon")]
    #[test_case("b, a", &[Symbol::Char('a'), Symbol::Char('b')] ; "unordered")]
    #[test_case("\\n,\\,", &[Symbol::Char('\n'), Symbol::Char(',')] ; "escapes")]
    #[test_case("-", &[Symbol::Char('-')] ; "dash")]
    #[test_case("ε,x", &[Symbol::Empty, Symbol::Char('x')] ; "empty and char")]
    #[test_case("1-3", &[Symbol::Char('1'), Symbol::Char('2'), Symbol::Char('3')] ; "digit range")]
    fn test_parse(text: &str, expected: &[Symbol]) {
        let parsed = group(text);
        assert_eq!(parsed.iter().collect::<Vec<_>>(), expected);
    }

    #[test_case("ab", SymbolGroupError::InvalidToken("ab".to_string()) ; "two characters")]
    #[test_case("a-Z", SymbolGroupError::InvalidRange('a', 'Z') ; "different blocks")]
    #[test_case("c-a", SymbolGroupError::InvalidRange('c', 'a') ; "reversed range")]
    #[test_case("!-&", SymbolGroupError::InvalidRange('!', '&') ; "not whitelisted")]
    #[test_case("\\q", SymbolGroupError::InvalidEscape('q') ; "unknown escape")]
    #[test_case("a\\", SymbolGroupError::DanglingEscape ; "dangling escape")]
    #[test_case("\u{0007}", SymbolGroupError::InvalidCharacter('\u{0007}') ; "control character")]
    fn test_parse_failure(text: &str, expected: SymbolGroupError) {
        assert_eq!(SymbolGroup::parse(text).unwrap_err(), expected);
    }

    #[test]
    fn test_custom_delimiter() {
        let parsed = SymbolGroup::parse_with_delimiter("a;b;\\;", ';').unwrap();
        assert_eq!(parsed, SymbolGroup::from_chars(['a', 'b', ';']));
    }

    #[test]
    fn test_custom_delimiter_printing_parses_back() {
        let original = SymbolGroup::from_chars([';', ',', 'a']);

        let printed = original.to_string_with(";", false);
        assert_eq!(printed, ",;\\;;a");
        assert_eq!(SymbolGroup::parse_with_delimiter(&printed, ';').unwrap(), original);

        let printed = original.to_string_with(" ; ", false);
        assert_eq!(SymbolGroup::parse_with_delimiter(&printed, ';').unwrap(), original);

        // Delimiters of several characters fall back to escaping the default one.
        assert_eq!(original.to_string_with(" | ", false), "\\, | ; | a");
    }

    #[test]
    fn test_range_only_when_shorter() {
        // Three symbols without a delimiter are as long as the range.
        assert_eq!(group("a-c").to_string_with("", false), "abc");
        assert_eq!(group("a-d").to_string_with("", false), "a-d");
        assert_eq!(group("a,b").to_string_with(",", false), "a,b");

        // Runs do not cross block boundaries.
        assert_eq!(group("8,9,A,B").to_string_with(",", false), "8,9,A,B");
        assert_eq!(group("x-z,A-C").to_string_with(",", false), "A-C,x-z");
    }

    #[test]
    fn test_include_empty() {
        let g = group("ε, a");
        assert_eq!(g.to_string_with(",", false), "a");
        assert_eq!(g.to_string_with(",", true), "ε,a");
        assert_eq!(format!("{}", g), "ε, a");
    }

    #[test]
    fn test_printing_parses_back() {
        for text in ["a-z,0-9", "\\,,\\\\,\\n", "\\ε,~", "α-ω", "А-я,Α-Ω", "!,?,-,a-f", "\\ ,a"] {
            let original = group(text);
            let printed = original.to_string_with(", ", true);
            assert_eq!(group(&printed), original, "{printed} should parse back to {original:?}");
        }
    }

    #[test]
    fn test_merge_and_subtract_identity() {
        let ab = group("a,b");
        assert!(SymbolGroup::ptr_eq(&ab.merge([&group("a")]), &ab));
        assert!(SymbolGroup::ptr_eq(&ab.subtract([&group("c")]), &ab));
        assert!(SymbolGroup::ptr_eq(&ab.merge(std::iter::empty()), &ab));

        let abc = ab.merge([&group("b"), &group("c")]);
        assert_eq!(abc, group("a-c"));

        let a = abc.subtract([&group("b"), &group("c")]);
        assert_eq!(a, group("a"));
        assert!(ab.subtract([&ab]).is_nothing());
    }

    #[test]
    fn test_contains_and_equality() {
        assert!(group("a-e").contains(&group("b,d")));
        assert!(!group("b,d").contains(&group("a-e")));
        assert_eq!(group("c,a,b"), group("a-c"));
        assert_ne!(group("a"), group("a,ε"));
    }

    #[test]
    fn test_share_any() {
        assert!(!SymbolGroup::share_any([&group("a"), &group("b"), &group("c-e")]));
        assert!(SymbolGroup::share_any([&group("a"), &group("b"), &group("a-c")]));
        assert!(!SymbolGroup::share_any(std::iter::empty()));
    }
}
