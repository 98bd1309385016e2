use super::action::{classify, Action};

/// Stage of a single SMTP session.
///
/// `Connect` is both the initial state and the marker for a finished
/// session: a successful `QUIT` transitions back to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Connect,
    Greet,
    Mail,
    Rcpt,
    DataHeaders,
    DataBody,
    Quit,
}

impl State {
    pub const ALL: [State; 7] = [
        State::Connect,
        State::Greet,
        State::Mail,
        State::Rcpt,
        State::DataHeaders,
        State::DataBody,
        State::Quit,
    ];
}

/// A classified client line together with the state it arrived in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub action: Action,
    pub params: Option<String>,
    pub state: State,
}

impl Request {
    /// The synthetic request evaluated when a client connects.
    pub fn connect() -> Self {
        Self {
            action: Action::Connect,
            params: None,
            state: State::Connect,
        }
    }

    /// Classify `line` received while the session is in `state`.
    pub fn parse(line: &str, state: State) -> Self {
        let (action, params) = classify(line, state);

        Self {
            action,
            params,
            state,
        }
    }

    pub fn evaluate(&self) -> Response {
        evaluate(self.action, self.state)
    }
}

/// Outcome of evaluating a request.
///
/// A `code` of `None` means nothing is written back to the client; this is
/// how header and body lines are taken in silently during DATA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: Option<u16>,
    pub message: String,
    pub next_state: State,
}

impl Response {
    pub const GREETING: &'static str = "localhost SMTP fixture service ready";
    pub const OK: &'static str = "OK";
    pub const SEND_DATA: &'static str = "Start mail input; end with <CRLF>.<CRLF>";
    pub const NOT_SUPPORTED: &'static str = "Not supported";
    pub const NO_HELP: &'static str = "No help available";
    pub const NOT_RECOGNIZED: &'static str = "Command not recognized";

    fn reply(code: u16, message: impl Into<String>, next_state: State) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
            next_state,
        }
    }

    fn silent(next_state: State) -> Self {
        Self {
            code: None,
            message: String::new(),
            next_state,
        }
    }

    fn bad_sequence(action: Action, state: State) -> Self {
        Self::reply(503, format!("Bad sequence of commands: {}", action), state)
    }

    pub fn is_silent(&self) -> bool {
        self.code.is_none()
    }

    /// The bytes to send for this response, if any.
    pub fn wire(&self) -> Option<String> {
        self.code.map(|code| format!("{} {}\r\n", code, self.message))
    }
}

/// Evaluate `action` against the current `state`.
///
/// Total over every `(Action, State)` pair: disallowed combinations yield a
/// 503 reply and leave the state untouched.
pub fn evaluate(action: Action, state: State) -> Response {
    if action.is_stateless() {
        return evaluate_stateless(action, state);
    }

    match (action, state) {
        (Action::Connect, State::Connect) => {
            Response::reply(220, Response::GREETING, State::Greet)
        }
        (Action::Ehlo, State::Greet) => Response::reply(250, Response::OK, State::Mail),
        (Action::Mail, State::Mail) => Response::reply(250, Response::OK, State::Rcpt),
        (Action::Rcpt, State::Rcpt) => Response::reply(250, Response::OK, State::Rcpt),
        (Action::Data, State::Rcpt) => {
            Response::reply(354, Response::SEND_DATA, State::DataHeaders)
        }
        (Action::Unrecognized, State::DataHeaders | State::DataBody) => Response::silent(state),
        (Action::DataEnd, State::DataHeaders | State::DataBody) => {
            Response::reply(250, Response::OK, State::Quit)
        }
        (Action::BlankLine, State::DataHeaders | State::DataBody) => {
            Response::silent(State::DataBody)
        }
        (Action::Quit, State::Quit) => Response::reply(250, Response::OK, State::Connect),
        (Action::Invalid, _) => Response::reply(500, Response::NOT_RECOGNIZED, state),
        (action, state) => Response::bad_sequence(action, state),
    }
}

fn evaluate_stateless(action: Action, state: State) -> Response {
    match action {
        Action::Verify | Action::Expand => Response::reply(252, Response::NOT_SUPPORTED, state),
        Action::Help => Response::reply(211, Response::NO_HELP, state),
        Action::Noop => Response::reply(250, Response::OK, state),
        Action::Reset => Response::reply(250, Response::OK, State::Greet),
        _ => Response::reply(500, Response::NOT_RECOGNIZED, state),
    }
}
