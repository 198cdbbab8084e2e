//! Response handlers
//!
//! A handler looks at one response line at a time and tells the executor
//! whether the command is finished. Error lines always win over data lines.

use super::{SimError, SimState};

/// Final result code of a successful command
pub const OK: &str = "OK";

const ERROR_PREFIX: &str = "ERROR";
const CME_ERROR_PREFIX: &str = "+CME ERROR:";
const CPIN_PREFIX: &str = "+CPIN:";

/// What a handler wants after seeing a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Keep feeding lines to this command
    NeedMore,
    /// The command finished successfully
    Done,
    /// The command finished with a modem-reported error.
    ///
    /// Lines the modem sends afterwards (usually the final `OK`) are left for
    /// the next command to drain.
    Failed(SimError),
}

/// Classify a line as a modem error, if it is one
pub fn classify_error(line: &str) -> Option<SimError> {
    if line.starts_with(ERROR_PREFIX) {
        return Some(SimError::unspecified());
    }
    line.strip_prefix(CME_ERROR_PREFIX)
        .map(|text| SimError::from_text(text.strip_prefix(' ').unwrap_or(text)))
}

/// Wait for `OK`, failing on any error line and skipping everything else
pub fn default_handler() -> impl FnMut(&str) -> Reply + Send {
    |line: &str| {
        if let Some(err) = classify_error(line) {
            return Reply::Failed(err);
        }
        if line == OK {
            Reply::Done
        } else {
            Reply::NeedMore
        }
    }
}

/// Like [`default_handler`], but lines starting with `prefix` go to `on_match`
pub fn prefix_handler<'a, F>(
    prefix: &'static str,
    mut on_match: F,
) -> impl FnMut(&str) -> Reply + Send + 'a
where
    F: FnMut(&str) -> Reply + Send + 'a,
{
    move |line: &str| {
        if let Some(err) = classify_error(line) {
            return Reply::Failed(err);
        }
        if line.starts_with(prefix) {
            return on_match(line);
        }
        if line == OK {
            Reply::Done
        } else {
            Reply::NeedMore
        }
    }
}

/// Map a `+CPIN: <state>` line.
///
/// `READY` keeps reading up to the final `OK`; every other state ends the
/// command with the matching lock state.
pub fn pin_status(line: &str) -> Reply {
    let state = line
        .strip_prefix(CPIN_PREFIX)
        .unwrap_or(line)
        .trim()
        .to_uppercase();

    let locked = match state.as_str() {
        "READY" => return Reply::NeedMore,
        "SIM PIN" => SimState::PinLocked,
        "SIM PUK" => SimState::PukLocked,
        "SIM PIN2" => SimState::Pin2Locked,
        "SIM PUK2" => SimState::Puk2Locked,
        _ => SimState::Unknown,
    };
    Reply::Failed(SimError::from_state(locked))
}

/// Handler for `AT+CPIN?`
pub fn pin_handler() -> impl FnMut(&str) -> Reply + Send {
    prefix_handler(CPIN_PREFIX, pin_status)
}
