use std::fmt;

use super::state_machine::State;

/// Symbolic classification of a single client line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Connect,
    Ehlo,
    Mail,
    Rcpt,
    Data,
    /// The lone `.` terminating DATA.
    DataEnd,
    /// Header or body text received during DATA.
    Unrecognized,
    /// Separator between headers and body.
    BlankLine,
    Quit,
    Reset,
    Verify,
    Expand,
    Help,
    Noop,
    /// A command line that matched no known keyword.
    Invalid,
}

impl Action {
    pub const ALL: [Action; 15] = [
        Action::Connect,
        Action::Ehlo,
        Action::Mail,
        Action::Rcpt,
        Action::Data,
        Action::DataEnd,
        Action::Unrecognized,
        Action::BlankLine,
        Action::Quit,
        Action::Reset,
        Action::Verify,
        Action::Expand,
        Action::Help,
        Action::Noop,
        Action::Invalid,
    ];

    /// Stateless actions are answered without consulting the session state.
    pub fn is_stateless(self) -> bool {
        matches!(
            self,
            Action::Reset | Action::Verify | Action::Expand | Action::Help | Action::Noop
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Connect => "Connect",
            Action::Ehlo => "EHLO",
            Action::Mail => "MAIL",
            Action::Rcpt => "RCPT",
            Action::Data => "DATA",
            Action::DataEnd => ".",
            Action::Unrecognized => "Unrecognized command / data",
            Action::BlankLine => "Blank line",
            Action::Quit => "QUIT",
            Action::Reset => "RSET",
            Action::Verify => "VRFY",
            Action::Expand => "EXPN",
            Action::Help => "HELP",
            Action::Noop => "NOOP",
            Action::Invalid => "Invalid",
        };

        f.write_str(name)
    }
}

/// Keyword prefixes in match priority order, with the byte offset at which
/// the parameter starts (if the command carries one).
///
/// Both `EHLO ` and `HELO` cut at offset 5, so `HELO` without a trailing
/// space loses the first character of its argument. Existing clients
/// depend on this exact cut.
const COMMANDS: &[(&str, Action, Option<usize>)] = &[
    ("EHLO ", Action::Ehlo, Some(5)),
    ("HELO", Action::Ehlo, Some(5)),
    ("MAIL FROM:", Action::Mail, Some(10)),
    ("RCPT TO:", Action::Rcpt, Some(8)),
    ("DATA", Action::Data, None),
    ("QUIT", Action::Quit, None),
    ("RSET", Action::Reset, None),
    ("NOOP", Action::Noop, None),
    ("EXPN", Action::Expand, None),
    ("VRFY", Action::Verify, None),
    ("HELP", Action::Help, None),
];

/// Classify a raw line (without its line terminator) received in `state`.
pub fn classify(line: &str, state: State) -> (Action, Option<String>) {
    match state {
        State::DataHeaders => match line {
            "." => (Action::DataEnd, None),
            "" => (Action::BlankLine, None),
            _ => (Action::Unrecognized, Some(line.to_string())),
        },
        State::DataBody => match line {
            "." => (Action::DataEnd, None),
            _ => (Action::Unrecognized, Some(line.to_string())),
        },
        _ => classify_command(line),
    }
}

fn classify_command(line: &str) -> (Action, Option<String>) {
    for &(prefix, action, offset) in COMMANDS {
        if starts_with_ignore_case(line, prefix) {
            let params = offset.and_then(|offset| line.get(offset..).map(str::to_string));
            return (action, params);
        }
    }

    (Action::Invalid, None)
}

fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    line.as_bytes()
        .get(..prefix.len())
        .map_or(false, |head| head.eq_ignore_ascii_case(prefix.as_bytes()))
}
