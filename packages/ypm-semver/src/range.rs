use std::{borrow::Borrow, fmt};

use ypm_utils::{impl_serialization_traits, FromFileString, ToFileString, ToHumanString, DataType};

use crate::{Error, MAX_LENGTH};

use super::{extract, Version};

#[cfg(test)]
#[path = "./range.test.rs"]
mod range_tests;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RangeKind {
    Caret,
    Tilde,
    Exact,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenType {
    LParen,
    RParen,
    SAnd,
    And,
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperatorType {
    Equal,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Token {
    Syntax(TokenType),
    Operation(OperatorType, Version),
}

/// Outcome of evaluating a sub-expression against a version.
///
/// A prerelease version only satisfies a set of comparators if one of them
/// carries a prerelease on the very same `major.minor.patch` tuple, so we
/// track that information alongside the boolean result.
#[derive(Clone, Copy)]
struct Evaluation {
    matches: bool,
    allows_rc: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Range {
    pub source: String,

    tokens: Vec<Token>,
}

impl Range {
    fn tokenize<P: AsRef<str>>(str: P) -> Option<Vec<Token>> {
        extract::extract_tokens(&mut str.as_ref().chars().peekable())
    }

    pub fn check<P: Borrow<Version>>(&self, version: P) -> bool {
        let version = version.borrow();
        let mut n = 0;

        let evaluation
            = self.check_from(version, &mut n);

        evaluation.matches && (!version.is_prerelease() || evaluation.allows_rc)
    }

    /// Like `check`, but prereleases are compared as if they were the
    /// release they precede. Used for engine checks on tool versions.
    pub fn check_ignore_rc<P: Borrow<Version>>(&self, version: P) -> bool {
        self.check(version.borrow().without_rc())
    }

    pub fn max_satisfying<'a, I: IntoIterator<Item = &'a Version>>(&self, versions: I) -> Option<&'a Version> {
        versions.into_iter()
            .filter(|version| self.check(*version))
            .max()
    }

    pub fn kind(&self) -> Option<RangeKind> {
        match self.source.chars().next() {
            Some('0'..='9')
                => Some(RangeKind::Exact),

            Some('^') => Some(RangeKind::Caret),
            Some('~') => Some(RangeKind::Tilde),

            _ => None,
        }
    }

    fn check_from(&self, version: &Version, n: &mut usize) -> Evaluation {
        let token = self.tokens.get(*n);
        *n += 1;

        let compare = |result: bool, operand: &Version| Evaluation {
            matches: result,
            allows_rc: operand.is_prerelease() && operand.same_tuple(version),
        };

        match token {
            Some(Token::Syntax(TokenType::SAnd)) | Some(Token::Syntax(TokenType::And)) => {
                let left = self.check_from(version, n);
                let right = self.check_from(version, n);

                Evaluation {
                    matches: left.matches && right.matches,
                    allows_rc: left.allows_rc || right.allows_rc,
                }
            }

            Some(Token::Syntax(TokenType::Or)) => {
                let left = self.check_from(version, n);
                let right = self.check_from(version, n);

                let accept = |evaluation: Evaluation| {
                    evaluation.matches && (!version.is_prerelease() || evaluation.allows_rc)
                };

                Evaluation {
                    matches: accept(left) || accept(right),
                    allows_rc: true,
                }
            }

            Some(Token::Operation(OperatorType::Equal, operand)) => {
                compare(version == operand, operand)
            }

            Some(Token::Operation(OperatorType::GreaterThan, operand)) => {
                compare(version > operand, operand)
            }

            Some(Token::Operation(OperatorType::GreaterThanOrEqual, operand)) => {
                compare(version >= operand, operand)
            }

            Some(Token::Operation(OperatorType::LessThan, operand)) => {
                compare(version < operand, operand)
            }

            Some(Token::Operation(OperatorType::LessThanOrEqual, operand)) => {
                compare(version <= operand, operand)
            }

            _ => {
                unreachable!("Prefix token lists are validated at parse time");
            }
        }
    }
}

impl FromFileString for Range {
    type Error = Error;

    fn from_file_string(src: &str) -> Result<Self, Error> {
        if src.len() > MAX_LENGTH {
            return Err(Error::InvalidRange(src.to_string()));
        }

        let effective = match src.trim() {
            "" => "*",
            trimmed => trimmed,
        };

        let tokens = Range::tokenize(effective)
            .ok_or_else(|| Error::InvalidRange(src.to_string()))?;

        let prefix = extract::infix_to_prefix(&tokens)
            .filter(|prefix| extract::is_well_formed(prefix))
            .ok_or_else(|| Error::InvalidRange(src.to_string()))?;

        Ok(Range {
            source: src.to_string(),
            tokens: prefix,
        })
    }
}

impl ToFileString for Range {
    fn write_file_string<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        out.write_str(&self.source)
    }
}

impl ToHumanString for Range {
    fn to_print_string(&self) -> String {
        DataType::Range.colorize(&self.source)
    }
}

impl_serialization_traits!(Range);
