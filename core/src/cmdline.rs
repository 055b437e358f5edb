use std::fmt;

pub type Result = std::result::Result<CommandLine, SplitError>;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SplitError {
    #[error("Empty command")]
    Empty,

    #[error("Unclosed quote (found open quote at {})", .0+1)]
    UnclosedQuote(usize),

    #[error("Trailing backslash at {}", .0+1)]
    TrailingBackslash(usize),
}

/// A program and its arguments, ready to be spawned without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn parse(s: &str) -> Result {
        self::split(s)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Splits a command string into words the way a POSIX shell does, minus expansion.
///
/// ```
/// use runjudge_core::cmdline::split;
///
/// let cmd = split(r#"python3 "./Solution/My Sol.py" -O"#).unwrap();
/// assert_eq!(cmd.program, "python3");
/// assert_eq!(cmd.args, vec!["./Solution/My Sol.py", "-O"]);
/// ```
pub fn split(s: &str) -> Result {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum State {
        Between,
        Word,
        Backslash,
        SingleQuote,
        DoubleQuote,
        DoubleQuoteBackslash,
    }
    use State::*;

    let mut state = Between;
    let mut pos_quote = 0;
    let mut words: Vec<String> = Vec::new();
    let mut word = String::with_capacity(32);

    for (i, c) in s.chars().enumerate() {
        match (c, state) {
            (c, Between | Word) if c.is_whitespace() => {
                if state == Word {
                    words.push(std::mem::take(&mut word));
                }
                state = Between;
            }
            ('\\', Between | Word) => {
                pos_quote = i;
                state = Backslash;
            }
            ('\'', Between | Word) => {
                pos_quote = i;
                state = SingleQuote;
            }
            ('"', Between | Word) => {
                pos_quote = i;
                state = DoubleQuote;
            }
            (_, Between | Word) => {
                word.push(c);
                state = Word;
            }
            (_, Backslash) => {
                word.push(c);
                state = Word;
            }
            ('\'', SingleQuote) | ('"', DoubleQuote) => {
                state = Word;
            }
            ('\\', DoubleQuote) => {
                state = DoubleQuoteBackslash;
            }
            (_, SingleQuote | DoubleQuote) => {
                word.push(c);
            }
            (_, DoubleQuoteBackslash) => {
                if !matches!(c, '"' | '\\' | '$' | '`') {
                    word.push('\\');
                }
                word.push(c);
                state = DoubleQuote;
            }
        }
    }

    match state {
        SingleQuote | DoubleQuote | DoubleQuoteBackslash => {
            return Err(SplitError::UnclosedQuote(pos_quote))
        }
        Backslash => return Err(SplitError::TrailingBackslash(pos_quote)),
        Word => words.push(word),
        Between => (),
    }

    let mut words = words.into_iter();
    let Some(program) = words.next() else {
        return Err(SplitError::Empty)
    };
    Ok(CommandLine {
        program,
        args: words.collect(),
    })
}
