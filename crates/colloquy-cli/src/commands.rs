/// One line of terminal input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    New,
    List,
    /// 1-based position in the last listing
    Open(usize),
    Delete(usize),
    Close,
    Help,
    Quit,
    Say(String),
    Invalid(String),
}

pub const HELP: &str = "\
Commands:
  /new          start a new conversation
  /list         show your conversations
  /open <n>     switch to conversation n from the list
  /delete <n>   delete conversation n and its messages
  /close        leave the current conversation
  /help         show this help
  /quit         exit
Anything else is sent as a message.";

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Say(line.to_string());
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or("");
        let arg = parts.next();

        match (name, arg) {
            ("new", None) => Self::New,
            ("list", None) => Self::List,
            ("close", None) => Self::Close,
            ("help", None) => Self::Help,
            ("quit" | "exit", None) => Self::Quit,
            ("open", Some(n)) => position(n).map_or_else(|| invalid(line), Self::Open),
            ("delete", Some(n)) => position(n).map_or_else(|| invalid(line), Self::Delete),
            _ => invalid(line),
        }
    }

    /// Index into the listing for `Open`/`Delete`
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Open(n) | Self::Delete(n) => Some(n - 1),
            _ => None,
        }
    }
}

fn position(arg: &str) -> Option<usize> {
    arg.parse::<usize>().ok().filter(|n| *n > 0)
}

fn invalid(line: &str) -> Command {
    Command::Invalid(format!("unrecognized command: {line} (try /help)"))
}
