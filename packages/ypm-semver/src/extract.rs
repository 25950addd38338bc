use std::{iter::Peekable, str::Chars};

use super::{range::{OperatorType, Token, TokenType}, version::VersionRc, Version};
use crate::{
    MAX_SAFE_COMPONENT_LENGTH,
    MAX_SAFE_INTEGER,
};

pub fn extract_number(str: &mut Peekable<Chars>) -> Option<u32> {
    let mut num: u64 = 0;
    let mut valid = false;
    let mut digits = 0usize;

    while let Some(&c) = str.peek() {
        if c.is_ascii_digit() {
            digits += 1;
            if digits > MAX_SAFE_COMPONENT_LENGTH {
                return None;
            }

            let digit = c.to_digit(10)? as u64;
            num = num.checked_mul(10)?.checked_add(digit)?;
            if num > MAX_SAFE_INTEGER {
                return None;
            }
            valid = true;

            str.next();
        } else {
            break;
        }
    }

    match valid {
        true => u32::try_from(num).ok(),
        false => None,
    }
}

pub fn extract_alnum_hyphen(str: &mut Peekable<Chars>) -> Option<String> {
    let mut res = String::new();

    while let Some(&c) = str.peek() {
        if c.is_alphanumeric() || c == '-' {
            res.push(c);
            str.next();
        } else {
            break;
        }
    }

    match res.is_empty() {
        true => None,
        false => Some(res),
    }
}

pub fn extract_rc_segment(str: &mut Peekable<Chars>) -> Option<VersionRc> {
    let curr = str.clone();

    if let Some(n) = extract_number(str) {
        if let Some('.' | '+' | ' ') | None = str.peek() {
            return Some(VersionRc::Number(n));
        }
    }

    *str = curr;

    Some(VersionRc::String(extract_alnum_hyphen(str)?))
}

pub fn extract_rc(str: &mut Peekable<Chars>) -> Option<Vec<VersionRc>> {
    let mut segments = vec![extract_rc_segment(str)?];

    while str.next_if_eq(&'.').is_some() {
        segments.push(extract_rc_segment(str)?);
    }

    Some(segments)
}

/// Extracts a possibly partial version. The second member of the tuple is
/// the number of components (major, minor, patch) left unspecified.
pub fn extract_version(str: &mut Peekable<Chars>) -> Option<(Version, u8)> {
    let mut major = 0;
    let mut minor = 0;
    let mut patch = 0;
    let mut rc = None;
    let mut missing = 3;

    if let Some('v') = str.peek() {
        str.next();
    }

    if let Some('*' | 'x' | 'X') = str.peek() {
        str.next();
    } else if let Some(n) = extract_number(str) {
        major = n;
        missing -= 1;
    } else {
        return None;
    }

    if str.next_if_eq(&'.').is_some() {
        if let Some('*' | 'x' | 'X') = str.peek() {
            str.next();
        } else if let Some(n) = extract_number(str) {
            if missing == 2 {
                minor = n;
                missing -= 1;
            }
        } else {
            return None;
        }

        if str.next_if_eq(&'.').is_some() {
            if let Some('*' | 'x' | 'X') = str.peek() {
                str.next();
            } else if let Some(n) = extract_number(str) {
                if missing == 1 {
                    patch = n;
                    missing -= 1;
                }
            } else {
                return None;
            }
        }
    }

    if str.next_if_eq(&'-').is_some() {
        rc = Some(extract_rc(str)?);
    }

    if str.next_if_eq(&'+').is_some() {
        extract_rc(str)?;
    }

    Some((Version::new_from_components(major, minor, patch, rc), missing))
}

fn skip_spaces(str: &mut Peekable<Chars>) {
    while str.next_if_eq(&' ').is_some() {
        // Skip all whitespaces
    }
}

fn bounded(lower: Version, upper_operator: OperatorType, upper: Version) -> Vec<Token> {
    vec![
        Token::Operation(OperatorType::GreaterThanOrEqual, lower),
        Token::Syntax(TokenType::SAnd),
        Token::Operation(upper_operator, upper),
    ]
}

fn partial_upper_bound(version: &Version, missing: u8) -> Option<Version> {
    match missing {
        2 => Some(version.next_major_rc()),
        1 => Some(version.next_minor_rc()),
        _ => None,
    }
}

pub fn extract_predicate(str: &mut Peekable<Chars>) -> Option<Vec<Token>> {
    let c = *str.peek()?;

    match c {
        '^' => {
            str.next();
            skip_spaces(str);

            let (version, missing) = extract_version(str)?;

            if missing == 3 {
                return Some(vec![Token::Operation(OperatorType::GreaterThanOrEqual, version)]);
            }

            let upper_bound = match (version.major, version.minor, missing) {
                (_, _, 2) => version.next_major_rc(),
                (0, _, 1) => version.next_minor_rc(),
                (0, 0, _) => version.next_patch_rc(),
                (0, _, _) => version.next_minor_rc(),
                _ => version.next_major_rc(),
            };

            Some(bounded(version, OperatorType::LessThan, upper_bound))
        }

        '~' => {
            str.next();
            str.next_if_eq(&'>');
            skip_spaces(str);

            let (version, missing) = extract_version(str)?;

            let upper_bound = match missing {
                3 => return Some(vec![Token::Operation(OperatorType::GreaterThanOrEqual, version)]),
                2 => version.next_major_rc(),
                _ => version.next_minor_rc(),
            };

            Some(bounded(version, OperatorType::LessThan, upper_bound))
        }

        '>' => {
            str.next();

            let operator = match str.next_if_eq(&'=') {
                Some(_) => OperatorType::GreaterThanOrEqual,
                None => OperatorType::GreaterThan,
            };

            skip_spaces(str);

            let (version, missing) = extract_version(str)?;

            // >1.2 means >=1.3.0, >1 means >=2.0.0
            match (operator, missing) {
                (OperatorType::GreaterThan, 2) => {
                    Some(vec![Token::Operation(OperatorType::GreaterThanOrEqual, version.next_major())])
                }

                (OperatorType::GreaterThan, 1) => {
                    Some(vec![Token::Operation(OperatorType::GreaterThanOrEqual, version.next_minor())])
                }

                _ => {
                    Some(vec![Token::Operation(operator, version)])
                }
            }
        }

        '<' => {
            str.next();

            let operator = match str.next_if_eq(&'=') {
                Some(_) => OperatorType::LessThanOrEqual,
                None => OperatorType::LessThan,
            };

            skip_spaces(str);

            let (version, missing) = extract_version(str)?;

            // <=1.2 means <1.3.0-0
            match (operator, partial_upper_bound(&version, missing)) {
                (OperatorType::LessThanOrEqual, Some(upper_bound)) => {
                    Some(vec![Token::Operation(OperatorType::LessThan, upper_bound)])
                }

                _ => {
                    Some(vec![Token::Operation(operator, version)])
                }
            }
        }

        '=' => {
            str.next();
            str.next_if_eq(&'=');
            skip_spaces(str);

            let (version, missing) = extract_version(str)?;

            Some(x_range(version, missing))
        }

        _ => {
            let (version, missing) = extract_version(str)?;

            let mut lookahead = str.clone();

            if lookahead.next_if_eq(&' ').is_some() {
                skip_spaces(&mut lookahead);

                if lookahead.next_if_eq(&'-').is_some() && lookahead.next_if_eq(&' ').is_some() {
                    skip_spaces(&mut lookahead);
                    *str = lookahead;

                    let (other_version, other_missing) = extract_version(str)?;

                    let upper = match partial_upper_bound(&other_version, other_missing) {
                        Some(upper_bound) => Token::Operation(OperatorType::LessThan, upper_bound),
                        None if other_missing == 3 => return Some(vec![Token::Operation(OperatorType::GreaterThanOrEqual, version)]),
                        None => Token::Operation(OperatorType::LessThanOrEqual, other_version),
                    };

                    return Some(vec![
                        Token::Operation(OperatorType::GreaterThanOrEqual, version),
                        Token::Syntax(TokenType::SAnd),
                        upper,
                    ]);
                }
            }

            Some(x_range(version, missing))
        }
    }
}

fn x_range(version: Version, missing: u8) -> Vec<Token> {
    match missing {
        0 => vec![Token::Operation(OperatorType::Equal, version)],
        3 => vec![Token::Operation(OperatorType::GreaterThanOrEqual, version)],
        _ => {
            let upper_bound = partial_upper_bound(&version, missing)
                .expect("Expected a partial version to have an upper bound");

            bounded(version, OperatorType::LessThan, upper_bound)
        }
    }
}

pub fn extract_tokens(str: &mut Peekable<Chars>) -> Option<Vec<Token>> {
    let mut tokens = vec![];

    while let Some(c) = str.peek() {
        match c {
            ' ' | '\t' => {
                str.next();
            }

            '|' => {
                str.next();

                if str.next_if_eq(&'|').is_some() {
                    tokens.push(Token::Syntax(TokenType::Or));
                } else {
                    return None;
                }
            }

            '&' => {
                str.next();

                if str.next_if_eq(&'&').is_some() {
                    tokens.push(Token::Syntax(TokenType::And));
                } else {
                    return None;
                }
            }

            '(' => {
                str.next();

                tokens.push(Token::Syntax(TokenType::LParen));
            }

            ')' => {
                str.next();

                tokens.push(Token::Syntax(TokenType::RParen));
            }

            _ => {
                let predicate = extract_predicate(str)?;

                if let Some(Token::Operation(_, _) | Token::Syntax(TokenType::RParen)) = tokens.last() {
                    tokens.push(Token::Syntax(TokenType::SAnd));
                }

                tokens.extend(predicate);
            }
        }
    }

    Some(tokens)
}

pub fn infix_to_prefix(input: &[Token]) -> Option<Vec<Token>> {
    let mut prefix = vec![];
    let mut stack = vec![];

    for token in input.iter().rev() {
        match token {
            Token::Operation(_, _) => {
                prefix.push(token.clone());
            }

            Token::Syntax(TokenType::RParen) => {
                stack.push(token.clone())
            }

            Token::Syntax(TokenType::LParen) => {
                loop {
                    match stack.pop() {
                        Some(Token::Syntax(TokenType::RParen)) => break,
                        Some(top) => prefix.push(top),
                        None => return None,
                    }
                }
            }

            _ => {
                while stack.last() == Some(&Token::Syntax(TokenType::SAnd)) {
                    prefix.extend(stack.pop());
                }

                stack.push(token.clone());
            }
        }
    }

    while let Some(token) = stack.pop() {
        if let Token::Syntax(TokenType::RParen) = token {
            return None;
        }

        prefix.push(token);
    }

    prefix.reverse();

    Some(prefix)
}

/// Checks that a prefix token list describes exactly one expression.
pub fn is_well_formed(prefix: &[Token]) -> bool {
    let mut pending = 1usize;

    for token in prefix {
        if pending == 0 {
            return false;
        }

        match token {
            Token::Operation(_, _) => pending -= 1,
            Token::Syntax(TokenType::LParen | TokenType::RParen) => return false,
            Token::Syntax(_) => pending += 1,
        }
    }

    pending == 0
}
