//! TwiML documents returned to the telephony provider.

/// Spoken when an inbound call cannot be bridged to an assistant.
pub const CONNECT_ERROR_MESSAGE: &str =
    "We're sorry, there was an error connecting your call. Please try again later.";

/// Say a message, then hang up.
pub fn say_and_hangup(message: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Response><Say>{}</Say><Hangup/></Response>"#,
        escape(message)
    )
}

/// The static reply used whenever call setup fails.
pub fn connect_error() -> String {
    say_and_hangup(CONNECT_ERROR_MESSAGE)
}

/// Acknowledge without any action (used for inbound SMS).
pub fn empty() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?><Response/>"#.to_string()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
