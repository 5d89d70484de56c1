//! Tokenizer for TSDL, the metadata language of CTF.

use crate::utils::error::TraceError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Int(i128),
    Str(String),
    /// Single punctuation character: `{ } ( ) [ ] ; , = < > : . -`
    Punct(char),
    /// `:=`
    Assign,
    /// `...`
    Ellipsis,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Self::Ident(s) => format!("identifier '{}'", s),
            Self::Int(v) => format!("integer {}", v),
            Self::Str(s) => format!("string \"{}\"", s),
            Self::Punct(c) => format!("'{}'", c),
            Self::Assign => "':='".to_string(),
            Self::Ellipsis => "'...'".to_string(),
        }
    }
}

/// Split TSDL source into tokens, dropping comments and whitespace
pub fn tokenize(src: &str) -> Result<Vec<Token>, TraceError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // Comments
        if c == '/' && chars.get(i + 1) == Some(&'*') {
            let end = find_comment_end(&chars, i + 2).ok_or_else(|| {
                TraceError::Metadata("unterminated block comment".to_string())
            })?;
            i = end;
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }

        if c.is_ascii_digit() {
            let (value, next) = lex_number(&chars, i)?;
            tokens.push(Token::Int(value));
            i = next;
            continue;
        }

        if c == '"' {
            let (value, next) = lex_string(&chars, i + 1)?;
            tokens.push(Token::Str(value));
            i = next;
            continue;
        }

        if c == ':' && chars.get(i + 1) == Some(&'=') {
            tokens.push(Token::Assign);
            i += 2;
            continue;
        }

        if c == '.' && chars.get(i + 1) == Some(&'.') && chars.get(i + 2) == Some(&'.') {
            tokens.push(Token::Ellipsis);
            i += 3;
            continue;
        }

        if "{}()[];,=<>:.-+".contains(c) {
            tokens.push(Token::Punct(c));
            i += 1;
            continue;
        }

        return Err(TraceError::Metadata(format!(
            "unexpected character '{}' in metadata",
            c
        )));
    }

    Ok(tokens)
}

fn find_comment_end(chars: &[char], mut i: usize) -> Option<usize> {
    while i + 1 < chars.len() {
        if chars[i] == '*' && chars[i + 1] == '/' {
            return Some(i + 2);
        }
        i += 1;
    }
    None
}

/// Decimal, hex (`0x`), or octal (leading `0`) literal with optional
/// C integer suffixes
fn lex_number(chars: &[char], start: usize) -> Result<(i128, usize), TraceError> {
    let mut i = start;
    let (radix, digits_start) = if chars[i] == '0'
        && matches!(chars.get(i + 1), Some('x') | Some('X'))
    {
        (16, i + 2)
    } else if chars[i] == '0' && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()) {
        (8, i + 1)
    } else {
        (10, i)
    };

    i = digits_start;
    while i < chars.len() && chars[i].is_digit(radix) {
        i += 1;
    }
    let digits: String = chars[digits_start..i].iter().collect();

    // Skip integer suffixes such as 'U', 'UL', 'ULL'
    while i < chars.len() && matches!(chars[i], 'u' | 'U' | 'l' | 'L') {
        i += 1;
    }

    let value = i128::from_str_radix(&digits, radix).map_err(|e| {
        TraceError::Metadata(format!("invalid integer literal '{}': {}", digits, e))
    })?;
    Ok((value, i))
}

fn lex_string(chars: &[char], mut i: usize) -> Result<(String, usize), TraceError> {
    let mut value = String::new();
    while i < chars.len() {
        match chars[i] {
            '"' => return Ok((value, i + 1)),
            '\\' if i + 1 < chars.len() => {
                let escaped = match chars[i + 1] {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                };
                value.push(escaped);
                i += 2;
            }
            c => {
                value.push(c);
                i += 1;
            }
        }
    }
    Err(TraceError::Metadata("unterminated string literal".to_string()))
}
