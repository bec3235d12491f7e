//! POSIX-style word splitting for command strings run without a shell.
//!
//! Only quoting and escaping are understood. Expansions, globs, pipes and
//! redirections are left as literal text; commands that need them must be
//! run with `shell` enabled.

use crate::error::{ExecError, Result};

/// Split `line` into argv tokens.
///
/// Fails with [`ExecError::InvalidCommandShape`] on an unterminated quote or
/// a trailing escape.
pub fn split_words(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    // Distinguishes `''` (an empty argument) from no argument at all.
    let mut in_word = false;
    let mut in_single = false;
    let mut in_double = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        if in_single {
            if c == '\'' {
                in_single = false;
            } else {
                current.push(c);
            }
            continue;
        }

        if in_double {
            match c {
                '"' => in_double = false,
                '\\' => match chars.next() {
                    Some(next @ ('"' | '\\' | '$' | '`')) => current.push(next),
                    Some('\n') => {}
                    Some(next) => {
                        current.push('\\');
                        current.push(next);
                    }
                    None => return Err(ExecError::invalid_shape("unterminated double quote")),
                },
                _ => current.push(c),
            }
            continue;
        }

        match c {
            '\'' => {
                in_single = true;
                in_word = true;
            }
            '"' => {
                in_double = true;
                in_word = true;
            }
            '\\' => match chars.next() {
                Some('\n') => {}
                Some(next) => {
                    current.push(next);
                    in_word = true;
                }
                None => return Err(ExecError::invalid_shape("trailing backslash")),
            },
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            _ => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if in_single {
        return Err(ExecError::invalid_shape("unterminated single quote"));
    }
    if in_double {
        return Err(ExecError::invalid_shape("unterminated double quote"));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}
