//! Built-in tool implementations.

mod contacts;
mod scheduling;
mod scrape_website;
mod send_email;
mod team_note;
pub(crate) mod time;
mod web_search;

pub use contacts::{CreateTask, UpdateContact};
pub use scheduling::{BookAppointment, CheckAvailability, ListEvents, SelfSchedule};
pub use scrape_website::ScrapeWebsite;
pub use send_email::SendEmail;
pub use team_note::AddTeamNote;
pub use web_search::WebSearch;

/// Cut `input` to at most `max_bytes` on a char boundary.
pub(crate) fn truncate_utf8(input: &str, max_bytes: usize) -> String {
    if input.len() <= max_bytes {
        return input.to_string();
    }

    let mut idx = max_bytes;
    while idx > 0 && !input.is_char_boundary(idx) {
        idx -= 1;
    }

    input[..idx].to_string()
}

#[cfg(test)]
mod tests {
    use super::truncate_utf8;

    #[test]
    fn test_truncate_utf8_boundary() {
        assert_eq!(truncate_utf8("héllo", 2), "h");
        assert_eq!(truncate_utf8("hello", 10), "hello");
        assert_eq!(truncate_utf8("hello", 0), "");
    }
}
