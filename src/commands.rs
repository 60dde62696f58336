// Chat command parsing. Only text starting with '/' is a command; "@botname" suffixes
// on the command word are ignored.

use crate::period::Period;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopScope {
    Period(Period),
    Hours(u32),
    /// Unknown argument or "0h"; answered with the usage text.
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Report(Period),
    Top(TopScope),
    Archive,
    Help,
}

pub fn parse(text: &str) -> Option<Command> {
    let text = text.trim();
    if !text.starts_with('/') {
        return None;
    }
    let mut parts = text.split_whitespace();
    let head = parts.next()?;
    let word = head.split('@').next().unwrap_or(head).to_ascii_lowercase();
    let arg = parts.next();

    match word.as_str() {
        "/today" => Some(Command::Report(Period::Today)),
        "/week" => Some(Command::Report(Period::Week)),
        "/month" => Some(Command::Report(Period::Month)),
        "/top" => Some(Command::Top(top_scope(arg))),
        "/archive" => Some(Command::Archive),
        "/help" | "/start" => Some(Command::Help),
        _ => None,
    }
}

fn top_scope(arg: Option<&str>) -> TopScope {
    let Some(arg) = arg else {
        return TopScope::Period(Period::Today);
    };
    let arg = arg.to_ascii_lowercase();
    match arg.as_str() {
        "today" | "t" => TopScope::Period(Period::Today),
        "week" | "w" => TopScope::Period(Period::Week),
        "month" | "m" => TopScope::Period(Period::Month),
        other => match other.strip_suffix('h').map(str::parse::<u32>) {
            Some(Ok(hours)) if hours > 0 => TopScope::Hours(hours),
            _ => TopScope::Invalid,
        },
    }
}
