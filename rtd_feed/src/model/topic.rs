//! RTD topics and formula parsing.
//!
//! A topic is what one RTD formula subscribes to. The simulator recognises
//! formulas of the form `=RTD("<prog_id>","<server>","<ticker>","<field>")`,
//! with quotes inside string arguments doubled.
use std::fmt;

/// Subscription key of one cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    /// Instrument identifier.
    pub ticker: String,
    /// Quote attribute.
    pub field: String,
}

impl Topic {
    /// Creates a topic.
    pub fn new(ticker: &str, field: &str) -> Self {
        Topic {
            ticker: ticker.to_string(),
            field: field.to_string(),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ticker, self.field)
    }
}

/// Parsed RTD formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtdCall {
    /// Provider program identifier.
    pub prog_id: String,
    /// Topic requested from the provider.
    pub topic: Topic,
}

/// Parses an RTD formula; `None` for any other formula.
pub fn parse_rtd(formula: &str) -> Option<RtdCall> {
    let body = formula.trim().strip_prefix('=')?.trim_start();
    let (name, rest) = body.split_at_checked(3)?;
    if !name.eq_ignore_ascii_case("RTD") {
        return None;
    }
    let args = rest.trim().strip_prefix('(')?.strip_suffix(')')?;
    let args = string_args(args)?;
    match args.as_slice() {
        [prog_id, _server, ticker, field, ..] => Some(RtdCall {
            prog_id: prog_id.clone(),
            topic: Topic::new(ticker, field),
        }),
        _ => None,
    }
}

/// Splits `"a","b",...` into its unquoted arguments.
fn string_args(raw: &str) -> Option<Vec<String>> {
    let mut args = Vec::new();
    let mut chars = raw.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.next()? != '"' {
            return None;
        }
        let mut arg = String::new();
        loop {
            match chars.next()? {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    arg.push('"');
                }
                '"' => break,
                c => arg.push(c),
            }
        }
        args.push(arg);
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.next() {
            Some(',') => continue,
            None => return Some(args),
            Some(_) => return None,
        }
    }
}
