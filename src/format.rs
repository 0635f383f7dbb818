//! Text formatting
//!
//! Pure helpers that turn records into chat messages. No I/O here; the bot
//! layer decides where the text goes.

use crate::record::ConventionRecord;

pub const MSG_NOT_FOUND: &str = "No matching conventions found.";
pub const MSG_SEARCH_FAILED: &str = "Search failed, please try again later.";
pub const MSG_INVALID_CHOICE: &str = "Invalid choice, please reply with a listed number.";
pub const MSG_CANCELLED: &str = "Cancelled.";
pub const MSG_SELECTION_TIMEOUT: &str = "No selection made in time, please search again.";
pub const MSG_NO_SUBSCRIPTIONS: &str = "You have no subscriptions.";
pub const MSG_DIGEST_EMPTY: &str = "No conventions found for your subscriptions.";
pub const MSG_CONFIRM_DECLINED: &str = "Operation cancelled.";
pub const MSG_RENDERING_UNAVAILABLE: &str =
    "Image rendering needs the screenshot service; ask the administrator to enable it.";
pub const MSG_RENDER_FAILED: &str = "Rendering failed, please try again later.";

const SELECT_FOOTER: &str = "Reply with a number for details, or 0 to cancel.";

/// One line per record: 1-based index, name and address, with the
/// subscription keyword prefixed when the record came from a batch query.
pub fn format_list(records: &[ConventionRecord]) -> String {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| match &r.keyword {
            Some(kw) => format!("[{}]\t[{}] {} - {}", i + 1, kw, r.name, r.address),
            None => format!("[{}]\t{} - {}", i + 1, r.name, r.address),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fixed label/value detail block for one record.
pub fn format_detail(record: &ConventionRecord) -> String {
    let status = if record.status.is_empty() {
        "unknown"
    } else {
        &record.status
    };

    format!(
        "Name:\t{}\n\
         Venue:\t{}\n\
         Address:\t{}\n\
         Time:\t{}\n\
         Tags:\t{}\n\
         Status:\t{}\n\
         Interested:\t{}\n\
         Circles:\t{}\n\
         Doujinshi:\t{}\n\
         Link:\t{}\n\
         Participation:\t{}",
        record.name,
        record.location,
        record.address,
        record.time,
        record.tag,
        status,
        record.wanna_go_count,
        record.circle_count,
        record.doujinshi_count,
        record.url,
        record.participation,
    )
}

/// Full reply for a single-keyword search.
pub fn search_results_message(records: &[ConventionRecord]) -> String {
    format!(
        "Found the following conventions:\n{}\n{}",
        format_list(records),
        SELECT_FOOTER
    )
}

/// Full reply for a subscription batch query.
pub fn digest_results_message(records: &[ConventionRecord]) -> String {
    format!(
        "Conventions for your subscribed keywords:\n{}\n{}",
        format_list(records),
        SELECT_FOOTER
    )
}

/// Footer appended under a rendered list image.
pub fn image_select_footer() -> &'static str {
    SELECT_FOOTER
}

pub fn subscribed_message(keyword: &str) -> String {
    format!("Subscribed to \"{}\".", keyword)
}

pub fn unsubscribed_message(keyword: &str) -> String {
    format!("Unsubscribed from \"{}\".", keyword)
}

pub fn not_subscribed_message(keyword: &str) -> String {
    format!("No subscription found for \"{}\".", keyword)
}

pub fn removed_all_message(count: usize) -> String {
    format!("Removed all {} subscriptions.", count)
}

pub fn subscription_list_message(keywords: &[String]) -> String {
    let lines = keywords
        .iter()
        .map(|k| format!("- {}", k))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Your subscribed keywords:\n{}", lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, address: &str) -> ConventionRecord {
        ConventionRecord {
            name: name.to_string(),
            location: "Nanjing".to_string(),
            address: address.to_string(),
            time: "2026-09-12".to_string(),
            tag: "doujin".to_string(),
            status: "进行中".to_string(),
            wanna_go_count: 12,
            circle_count: 3,
            doujinshi_count: 7,
            url: "https://example.com/e/1".to_string(),
            participation: "offline".to_string(),
            keyword: None,
            logo_url: String::new(),
        }
    }

    #[test]
    fn test_list_line_format() {
        let records = vec![record("CompA", "Hall 1"), record("CompB", "Hall 2")];
        assert_eq!(
            format_list(&records),
            "[1]\tCompA - Hall 1\n[2]\tCompB - Hall 2"
        );
    }

    #[test]
    fn test_list_includes_keyword_tag() {
        let mut r = record("CompA", "Hall 1");
        r.keyword = Some("南京".to_string());
        assert_eq!(format_list(&[r]), "[1]\t[南京] CompA - Hall 1");
    }

    #[test]
    fn test_detail_block() {
        let detail = format_detail(&record("CompA", "Hall 1"));
        assert!(detail.starts_with("Name:\tCompA\n"));
        assert!(detail.contains("Status:\t进行中"));
        assert!(detail.contains("Interested:\t12"));
        assert!(detail.contains("Participation:\toffline"));
    }

    #[test]
    fn test_detail_unknown_status() {
        let mut r = record("CompA", "Hall 1");
        r.status = String::new();
        assert!(format_detail(&r).contains("Status:\tunknown"));
    }

    #[test]
    fn test_search_message_has_footer() {
        let msg = search_results_message(&[record("CompA", "Hall 1")]);
        assert!(msg.contains("[1]\tCompA - Hall 1"));
        assert!(msg.ends_with(SELECT_FOOTER));
    }

    #[test]
    fn test_subscription_list() {
        let msg = subscription_list_message(&["a".to_string(), "b".to_string()]);
        assert!(msg.contains("- a\n- b"));
    }
}
