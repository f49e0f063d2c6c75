use thiserror::Error;

/// One parsed shell line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ls,
    Cd(String),
    Mkdir(String),
    Rmdir(String),
    Cat(String),
    More(String),
    Stat(String),
    Ln { target: String, name: String },
    Rm(String),
    Fsck,
    Pwd,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("{0}: command not found")]
    Unknown(String),

    #[error("{name}: usage: {usage}")]
    Arguments {
        name: &'static str,
        usage: &'static str,
    },

    #[error("command line is not valid UTF-8")]
    Encoding,
}

impl Command {
    /// Parses one raw input line, which must decode as UTF-8.
    ///
    /// # Errors
    /// [`UsageError::Encoding`] for undecodable bytes, then as [`Self::parse`].
    pub fn parse_bytes(line: &[u8]) -> Result<Option<Self>, UsageError> {
        let line = std::str::from_utf8(line).map_err(|_| UsageError::Encoding)?;
        Self::parse(line)
    }

    /// Parses one line. Blank lines yield `None`.
    ///
    /// # Errors
    /// [`UsageError`] for an unknown keyword or a wrong argument count.
    pub fn parse(line: &str) -> Result<Option<Self>, UsageError> {
        let mut words = line.split_whitespace();
        let Some(keyword) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match (keyword, args.as_slice()) {
            ("ls", []) => Self::Ls,
            ("cd", [path]) => Self::Cd((*path).to_string()),
            ("mkdir", [path]) => Self::Mkdir((*path).to_string()),
            ("rmdir", [path]) => Self::Rmdir((*path).to_string()),
            ("cat", [path]) => Self::Cat((*path).to_string()),
            ("more", [path]) => Self::More((*path).to_string()),
            ("stat", [path]) => Self::Stat((*path).to_string()),
            ("ln", [target, name]) => Self::Ln {
                target: (*target).to_string(),
                name: (*name).to_string(),
            },
            ("rm", [path]) => Self::Rm((*path).to_string()),
            ("fsck", []) => Self::Fsck,
            ("pwd", []) => Self::Pwd,
            ("exit", []) => Self::Exit,
            (keyword, _) => {
                return Err(match usage(keyword) {
                    Some((name, usage)) => UsageError::Arguments { name, usage },
                    None => UsageError::Unknown(keyword.to_string()),
                });
            }
        };
        Ok(Some(command))
    }

    /// Keyword used to prefix diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ls => "ls",
            Self::Cd(_) => "cd",
            Self::Mkdir(_) => "mkdir",
            Self::Rmdir(_) => "rmdir",
            Self::Cat(_) => "cat",
            Self::More(_) => "more",
            Self::Stat(_) => "stat",
            Self::Ln { .. } => "ln",
            Self::Rm(_) => "rm",
            Self::Fsck => "fsck",
            Self::Pwd => "pwd",
            Self::Exit => "exit",
        }
    }
}

fn usage(keyword: &str) -> Option<(&'static str, &'static str)> {
    Some(match keyword {
        "ls" => ("ls", "ls"),
        "cd" => ("cd", "cd <path>"),
        "mkdir" => ("mkdir", "mkdir <path>"),
        "rmdir" => ("rmdir", "rmdir <path>"),
        "cat" => ("cat", "cat <path>"),
        "more" => ("more", "more <path>"),
        "stat" => ("stat", "stat <path>"),
        "ln" => ("ln", "ln <target> <name>"),
        "rm" => ("rm", "rm <path>"),
        "fsck" => ("fsck", "fsck"),
        "pwd" => ("pwd", "pwd"),
        "exit" => ("exit", "exit"),
        _ => return None,
    })
}
