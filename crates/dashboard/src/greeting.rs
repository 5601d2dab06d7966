//! Per-call greeting templates.
//!
//! A template may reference `{{first_name}}`, `{{last_name}}`,
//! `{{full_name}}`, `{{phone}}` and `{{email}}`. Placeholders for an unknown
//! caller render empty and the leftover whitespace is collapsed, so
//! `"Hi {{first_name}}, thanks for calling"` becomes
//! `"Hi, thanks for calling"` rather than keeping the braces.

use ghl_client::Contact;

/// Render `template` for a caller.
pub fn render(template: &str, contact: Option<&Contact>, caller: &str) -> String {
    let first = field(contact.and_then(|c| c.first_name.as_deref()));
    let last = field(contact.and_then(|c| c.last_name.as_deref()));
    let email = field(contact.and_then(|c| c.email.as_deref()));
    let full = contact.map(Contact::full_name).unwrap_or_default();
    let phone = contact
        .and_then(|c| c.phone.as_deref())
        .filter(|p| !p.is_empty())
        .unwrap_or(caller);

    let rendered = template
        .replace("{{first_name}}", &first)
        .replace("{{last_name}}", &last)
        .replace("{{full_name}}", &full)
        .replace("{{phone}}", phone)
        .replace("{{email}}", &email);

    collapse_whitespace(&rendered)
}

fn field(value: Option<&str>) -> String {
    value.unwrap_or_default().trim().to_string()
}

fn collapse_whitespace(s: &str) -> String {
    let joined = s.split_whitespace().collect::<Vec<_>>().join(" ");
    // "Hi , there" -> "Hi, there"
    joined
        .replace(" ,", ",")
        .replace(" .", ".")
        .replace(" !", "!")
        .replace(" ?", "?")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jane() -> Contact {
        Contact {
            id: "c1".to_string(),
            first_name: Some("Jane".to_string()),
            last_name: Some("Doe".to_string()),
            email: Some("jane@example.com".to_string()),
            phone: Some("+15551234567".to_string()),
            company_name: None,
        }
    }

    #[test]
    fn test_known_contact() {
        let out = render(
            "Hello {{first_name}}! Is {{email}} still the best address, {{full_name}}?",
            Some(&jane()),
            "+15550000000",
        );
        assert_eq!(
            out,
            "Hello Jane! Is jane@example.com still the best address, Jane Doe?"
        );
    }

    #[test]
    fn test_unknown_contact_collapses() {
        let out = render(
            "Hi {{first_name}} {{last_name}}, thanks for calling from {{phone}}.",
            None,
            "+15550000000",
        );
        assert_eq!(out, "Hi, thanks for calling from +15550000000.");
    }

    #[test]
    fn test_plain_template_untouched() {
        assert_eq!(render("Thanks for calling.", None, ""), "Thanks for calling.");
    }
}
