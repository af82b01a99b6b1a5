use std::fmt;

use lalrpop_util::lexer::Token;
use lalrpop_util::ParseError;

use crate::ast::Program;
use crate::grammar;


// A single malformed-source failure, with a 1-based location.
#[derive(Clone, Debug, PartialEq)]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub expected: Vec<String>,
    pub found: Option<String>,
}


pub fn parse(source: &str) -> Result<Program, SyntaxError> {
    grammar::ProgramParser::new()
        .parse(source)
        .map_err(|e| convert(source, e))
}


// Translate byte offsets into 1-based line/column pairs.
fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let upto = &source[..offset.min(source.len())];
    let line = upto.matches('\n').count() + 1;
    let column = offset - upto.rfind('\n').map(|i| i + 1).unwrap_or(0) + 1;
    (line, column)
}


fn convert(
    source: &str,
    error: ParseError<usize, Token, &'static str>
) -> SyntaxError {
    match error {
        ParseError::InvalidToken { location } => {
            let (line, column) = line_col(source, location);
            SyntaxError {
                line,
                column,
                expected: Vec::new(),
                found: source[location..].chars().next().map(String::from),
            }
        },
        ParseError::UnrecognizedEOF { location, expected } => {
            let (line, column) = line_col(source, location);
            SyntaxError { line, column, expected, found: None }
        },
        ParseError::UnrecognizedToken { token, expected } => {
            let (start, tok, _) = token;
            let (line, column) = line_col(source, start);
            SyntaxError {
                line,
                column,
                expected,
                found: Some(String::from(tok.1)),
            }
        },
        ParseError::ExtraToken { token } => {
            let (start, tok, _) = token;
            let (line, column) = line_col(source, start);
            SyntaxError {
                line,
                column,
                expected: Vec::new(),
                found: Some(String::from(tok.1)),
            }
        },
        // User errors come out of literal actions, which have no
        // position of their own.
        ParseError::User { error } => SyntaxError {
            line: 0,
            column: 0,
            expected: Vec::new(),
            found: Some(String::from(error)),
        },
    }
}


impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "syntax error")?;
        if self.line > 0 {
            write!(f, " at line {}, column {}", self.line, self.column)?;
        }
        match &self.found {
            Some(found) => write!(f, ": found {}", found)?,
            None => write!(f, ": unexpected end of input")?,
        }
        if !self.expected.is_empty() {
            write!(f, ", expected one of {}", self.expected.join(", "))?;
        }
        Ok(())
    }
}
