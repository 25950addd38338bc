use std::sync::LazyLock;

use regex::Regex;

use crate::error::Error;

use super::value::{LockObject, LockValue};

#[cfg(test)]
#[path = "./parse.test.rs"]
mod parse_tests;

pub const LOCKFILE_VERSION: u32 = 1;

const MERGE_CONFLICT_ANCESTOR: &str = "|||||||";
const MERGE_CONFLICT_END: &str = ">>>>>>>";
const MERGE_CONFLICT_SEP: &str = "=======";
const MERGE_CONFLICT_START: &str = "<<<<<<<";

static VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^yarn lockfile v(\d+)$").unwrap()
});

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseResultType {
    Success,
    Merge,
    Conflict,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseResult {
    pub result_type: ParseResultType,
    pub object: LockObject,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum TokenKind {
    Boolean(bool),
    String(String),
    Number(u64),
    Comment(String),
    Indent(usize),
    Newline,
    Colon,
    Comma,
    Invalid,
    Eof,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Token {
    kind: TokenKind,
    line: usize,
    col: usize,
}

fn syntax_error(message: &str, line: usize, column: usize) -> Error {
    Error::LockfileParseError {
        line,
        column,
        message: message.to_string(),
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, Error> {
    let chars: Vec<char>
        = input.chars().collect();

    let mut tokens = vec![];
    let mut last_newline = false;
    let mut line = 1;
    let mut col = 0;
    let mut pos = 0;

    while pos < chars.len() {
        let rest = &chars[pos..];
        let mut chop = 0;

        let mut push = |kind: TokenKind, line: usize, col: usize| {
            tokens.push(Token {kind, line, col});
        };

        match rest[0] {
            '\n' | '\r' => {
                chop += 1;
                if rest.get(1) == Some(&'\n') {
                    chop += 1;
                }

                line += 1;
                col = 0;
                push(TokenKind::Newline, line, col);
            },

            '#' => {
                let end = rest.iter()
                    .position(|c| *c == '\n')
                    .unwrap_or(rest.len());

                push(TokenKind::Comment(rest[1..end].iter().collect()), line, col);
                chop = end;
            },

            ' ' if last_newline => {
                let size = rest.iter()
                    .take_while(|c| **c == ' ')
                    .count();

                if size % 2 != 0 {
                    return Err(syntax_error("Invalid number of spaces", line, col));
                }

                push(TokenKind::Indent(size / 2), line, col);
                chop = size;
            },

            ' ' => {
                chop += 1;
            },

            '"' => {
                let mut end = 1;

                while end < rest.len() {
                    if rest[end] == '"' {
                        let is_escaped = rest[end - 1] == '\\' && (end < 2 || rest[end - 2] != '\\');
                        if !is_escaped {
                            end += 1;
                            break;
                        }
                    }

                    end += 1;
                }

                let raw: String
                    = rest[..end].iter().collect();

                match serde_json::from_str::<String>(&raw) {
                    Ok(value) => push(TokenKind::String(value), line, col),
                    Err(_) => push(TokenKind::Invalid, line, col),
                }

                chop = end;
            },

            c if c.is_ascii_digit() => {
                let digits: String = rest.iter()
                    .take_while(|c| c.is_ascii_digit())
                    .collect();

                match digits.parse::<u64>() {
                    Ok(value) => push(TokenKind::Number(value), line, col),
                    Err(_) => push(TokenKind::Invalid, line, col),
                }

                chop = digits.len();
            },

            't' if rest.starts_with(&['t', 'r', 'u', 'e']) => {
                push(TokenKind::Boolean(true), line, col);
                chop = 4;
            },

            'f' if rest.starts_with(&['f', 'a', 'l', 's', 'e']) => {
                push(TokenKind::Boolean(false), line, col);
                chop = 5;
            },

            ':' => {
                push(TokenKind::Colon, line, col);
                chop += 1;
            },

            ',' => {
                push(TokenKind::Comma, line, col);
                chop += 1;
            },

            c if c.is_ascii_alphabetic() || c == '/' || c == '.' || c == '-' => {
                let end = rest.iter()
                    .position(|c| matches!(c, ':' | ' ' | '\n' | '\r' | ','))
                    .unwrap_or(rest.len());

                push(TokenKind::String(rest[..end].iter().collect()), line, col);
                chop = end;
            },

            _ => {
                push(TokenKind::Invalid, line, col);
            },
        }

        if chop == 0 {
            push(TokenKind::Invalid, line, col);
            chop = 1;
        }

        last_newline = rest[0] == '\n' || (rest[0] == '\r' && rest.get(1) == Some(&'\n'));
        col += chop;
        pos += chop;
    }

    tokens.push(Token {kind: TokenKind::Eof, line, col});

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    comments: Vec<String>,
}

impl Parser {
    fn new(input: &str) -> Result<Parser, Error> {
        let mut parser = Parser {
            tokens: tokenize(input)?,
            pos: 0,
            comments: vec![],
        };

        parser.skip_comments()?;

        Ok(parser)
    }

    fn token(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn skip_comments(&mut self) -> Result<(), Error> {
        while let TokenKind::Comment(comment) = &self.token().kind {
            let comment = comment.trim().to_string();

            if let Some(captures) = VERSION_REGEX.captures(&comment) {
                let version = captures[1].parse::<u32>()
                    .unwrap_or(u32::MAX);

                if version > LOCKFILE_VERSION {
                    return Err(Error::UnsupportedLockfileVersion(version));
                }
            }

            self.comments.push(comment);
            self.pos += 1;
        }

        Ok(())
    }

    fn next(&mut self) -> Result<(), Error> {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }

        self.skip_comments()
    }

    fn unexpected<T>(&self, message: &str) -> Result<T, Error> {
        let token = self.token();
        Err(syntax_error(message, token.line, token.col))
    }

    fn is_blank_line(&self) -> bool {
        matches!(self.tokens.get(self.pos + 1).map(|token| &token.kind), Some(TokenKind::Newline | TokenKind::Eof))
    }

    fn parse(&mut self, indent: usize) -> Result<LockObject, Error> {
        let mut object
            = LockObject::new();

        loop {
            match self.token().kind.clone() {
                TokenKind::Newline => {
                    self.next()?;

                    if indent == 0 {
                        continue;
                    }

                    match self.token().kind {
                        TokenKind::Indent(size) if size == indent => self.next()?,
                        _ => break,
                    }
                },

                TokenKind::Indent(size) if size == indent => {
                    self.next()?;
                },

                // Lines made only of spaces
                TokenKind::Indent(_) if self.is_blank_line() => {
                    self.next()?;
                },

                TokenKind::Indent(_) | TokenKind::Eof => {
                    break;
                },

                TokenKind::String(key) => {
                    let mut keys = vec![key];
                    self.next()?;

                    while self.token().kind == TokenKind::Comma {
                        self.next()?;

                        let TokenKind::String(key) = self.token().kind.clone() else {
                            return self.unexpected("Expected string");
                        };

                        keys.push(key);
                        self.next()?;
                    }

                    let was_colon
                        = self.token().kind == TokenKind::Colon;

                    if was_colon {
                        self.next()?;
                    }

                    let value = match &self.token().kind {
                        TokenKind::Boolean(value) => Some(LockValue::Boolean(*value)),
                        TokenKind::String(value) => Some(LockValue::String(value.clone())),
                        TokenKind::Number(value) => Some(LockValue::Number(*value)),
                        _ => None,
                    };

                    if let Some(value) = value {
                        object.insert(keys, value);
                        self.next()?;
                    } else if was_colon {
                        let value = self.parse(indent + 1)?;
                        object.insert(keys, LockValue::Object(value));

                        if indent > 0 && !matches!(self.token().kind, TokenKind::Indent(_)) {
                            break;
                        }
                    } else {
                        return self.unexpected("Invalid value type");
                    }
                },

                _ => {
                    return self.unexpected("Unknown token");
                },
            }
        }

        Ok(object)
    }
}

fn yaml_to_lock_value(value: serde_yaml::Value) -> Option<LockValue> {
    match value {
        serde_yaml::Value::Bool(value) => Some(LockValue::Boolean(value)),
        serde_yaml::Value::Number(value) => Some(match value.as_u64() {
            Some(value) => LockValue::Number(value),
            None => LockValue::String(value.to_string()),
        }),
        serde_yaml::Value::String(value) => Some(LockValue::String(value)),
        serde_yaml::Value::Mapping(mapping) => {
            let mut object = LockObject::new();

            for (key, value) in mapping {
                let key = match key {
                    serde_yaml::Value::String(key) => key,
                    serde_yaml::Value::Number(key) => key.to_string(),
                    serde_yaml::Value::Bool(key) => key.to_string(),
                    _ => return None,
                };

                // Lockfiles written by newer releases join patterns with commas
                let keys = key.split(',')
                    .map(|key| key.trim().to_string())
                    .filter(|key| !key.is_empty())
                    .collect();

                object.insert(keys, yaml_to_lock_value(value)?);
            }

            Some(LockValue::Object(object))
        },
        _ => None,
    }
}

fn parse_document(input: &str) -> Result<LockObject, Error> {
    let parse_result = Parser::new(input)
        .and_then(|mut parser| parser.parse(0));

    match parse_result {
        Ok(object) => Ok(object),
        Err(error @ Error::LockfileParseError {..}) => {
            match serde_yaml::from_str::<serde_yaml::Value>(input).ok().and_then(yaml_to_lock_value) {
                Some(LockValue::Object(object)) => Ok(object),
                _ => Err(error),
            }
        },
        Err(error) => Err(error),
    }
}

fn has_merge_conflicts(input: &str) -> bool {
    input.contains(MERGE_CONFLICT_START) && input.contains(MERGE_CONFLICT_SEP) && input.contains(MERGE_CONFLICT_END)
}

/// Splits a conflicted file into "ours" and "theirs". The common ancestor
/// section of diff3-style conflicts is dropped.
fn extract_conflict_variants(input: &str) -> (String, String) {
    let mut ours = vec![];
    let mut theirs = vec![];

    let mut lines = input.lines();

    while let Some(line) = lines.next() {
        if !line.starts_with(MERGE_CONFLICT_START) {
            ours.push(line);
            theirs.push(line);
            continue;
        }

        let mut skip = false;

        for line in lines.by_ref() {
            if line == MERGE_CONFLICT_SEP {
                break;
            } else if skip || line.starts_with(MERGE_CONFLICT_ANCESTOR) {
                skip = true;
            } else {
                ours.push(line);
            }
        }

        for line in lines.by_ref() {
            if line.starts_with(MERGE_CONFLICT_END) {
                break;
            }

            theirs.push(line);
        }
    }

    (ours.join("\n"), theirs.join("\n"))
}

/// Parses the text of a lockfile. Files containing git conflict markers
/// are parsed once per side and merged, entries from "theirs" winning.
pub fn parse(input: &str) -> Result<ParseResult, Error> {
    let input
        = input.strip_prefix('\u{feff}').unwrap_or(input);

    if !has_merge_conflicts(input) {
        return Ok(ParseResult {
            result_type: ParseResultType::Success,
            object: parse_document(input)?,
        });
    }

    let (ours, theirs)
        = extract_conflict_variants(input);

    let merged = parse_document(&ours)
        .and_then(|ours| Ok(ours.merge(parse_document(&theirs)?)));

    match merged {
        Ok(object) => Ok(ParseResult {
            result_type: ParseResultType::Merge,
            object,
        }),

        Err(Error::LockfileParseError {..}) => Ok(ParseResult {
            result_type: ParseResultType::Conflict,
            object: LockObject::new(),
        }),

        Err(error) => Err(error),
    }
}
