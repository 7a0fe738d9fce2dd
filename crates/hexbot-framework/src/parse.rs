//! Splits message content into a command name and arguments.

/// A command invocation extracted from message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// The command name, case preserved.
    pub name: String,
    /// Whitespace-separated arguments after the name.
    pub args: Vec<String>,
}

/// Result of parsing message content against the command prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    /// The content does not start with the prefix.
    NotACommand,
    /// The content is the prefix followed by nothing but whitespace.
    Empty,
    /// A well-formed invocation.
    Command(Invocation),
}

/// Parses `content` as a prefixed command.
///
/// The prefix must appear at the very start of the content. Everything after
/// it is split on runs of whitespace; the first token is the command name.
pub fn parse_invocation(content: &str, prefix: &str) -> Parsed {
    let Some(rest) = content.strip_prefix(prefix) else {
        return Parsed::NotACommand;
    };

    let mut tokens = rest.split_whitespace();
    let Some(name) = tokens.next() else {
        return Parsed::Empty;
    };

    Parsed::Command(Invocation {
        name: name.to_string(),
        args: tokens.map(str::to_string).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(name: &str, args: &[&str]) -> Parsed {
        Parsed::Command(Invocation {
            name: name.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(parse_invocation("hello there", "!"), Parsed::NotACommand);
        assert_eq!(parse_invocation(" !ping", "!"), Parsed::NotACommand);
        assert_eq!(parse_invocation("", "!"), Parsed::NotACommand);
    }

    #[test]
    fn test_prefix_only_is_empty() {
        assert_eq!(parse_invocation("!", "!"), Parsed::Empty);
        assert_eq!(parse_invocation("!   \t", "!"), Parsed::Empty);
    }

    #[test]
    fn test_splits_on_whitespace_runs() {
        assert_eq!(
            parse_invocation("!stats  add\tfoo   bar ", "!"),
            command("stats", &["add", "foo", "bar"])
        );
    }

    #[test]
    fn test_name_case_is_preserved() {
        assert_eq!(parse_invocation("!Ping", "!"), command("Ping", &[]));
    }

    #[test]
    fn test_multi_character_prefix() {
        assert_eq!(parse_invocation("hb!tip add", "hb!"), command("tip", &["add"]));
        assert_eq!(parse_invocation("!tip", "hb!"), Parsed::NotACommand);
    }
}
