//! HTML document builders
//!
//! Pure markup generation for the rendered list and detail views. The
//! list header carries aggregate counters derived from the same status
//! classification the cards use, so the three buckets always sum to the
//! record total.

use base64::Engine;

use crate::record::{classify, ConventionRecord, Status};

/// Escape text interpolated into markup.
fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn dash_if_empty(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}

const BASE_STYLE: &str = r#"
    * { margin: 0; padding: 0; box-sizing: border-box; }
    body {
      background: linear-gradient(135deg, #fff8e1 0%, #ffe0b2 50%, #ffcc80 100%);
      font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", "Helvetica Neue", "Microsoft YaHei", sans-serif;
      padding: 20px;
      color: #333;
    }
    .container {
      margin: 0 auto;
      background: rgba(255, 255, 255, 0.95);
      border-radius: 20px;
      padding: 25px;
      box-shadow: 0 8px 32px rgba(245, 166, 35, 0.25);
      border: 1px solid rgba(255, 255, 255, 0.4);
    }
    .status-badge { font-size: 12px; padding: 4px 10px; border-radius: 20px; font-weight: 600; }
    .status-badge.ongoing { background: linear-gradient(135deg, #f5a623, #e8a000); color: white; }
    .status-badge.ended { background: #e0e0e0; color: #666; }
    .status-badge.upcoming { background: linear-gradient(135deg, #4ecdc4, #44a08d); color: white; }
    .keyword-badge {
      font-size: 12px; padding: 4px 10px; border-radius: 20px;
      background: linear-gradient(135deg, #667eea, #764ba2); color: white; font-weight: 500;
    }
    .info-row { display: flex; align-items: flex-start; gap: 10px; padding: 4px 0; }
    .info-label { font-size: 13px; color: #888; min-width: 80px; flex-shrink: 0; }
    .info-value { font-size: 13px; color: #444; word-break: break-all; }
    .stat-value { font-weight: 700; color: #e8a000; }
    .stat-label { font-size: 12px; color: #888; }
    .footer { text-align: center; margin-top: 20px; color: #888; font-size: 12px; }
"#;

fn info_row(label: &str, value: &str) -> String {
    format!(
        r#"<div class="info-row"><span class="info-label">{}</span><span class="info-value">{}</span></div>"#,
        label,
        escape(dash_if_empty(value))
    )
}

fn keyword_badge(record: &ConventionRecord) -> String {
    match &record.keyword {
        Some(kw) => format!(r#"<span class="keyword-badge">🔖 {}</span>"#, escape(kw)),
        None => String::new(),
    }
}

fn event_card(record: &ConventionRecord, index: usize) -> String {
    let status = classify(&record.status);

    format!(
        r#"
    <div class="event-card {class}">
      <div class="event-header">
        <span class="event-index">{index}</span>
        <span class="status-badge {class}">{badge}</span>
        {keyword}
      </div>
      <div class="event-title">{name}</div>
      <div class="event-info">
        {location}
        {address}
        {time}
        {tag}
        {participation}
      </div>
      <div class="event-stats">
        <span>❤️ <span class="stat-value">{wanna_go}</span> <span class="stat-label">interested</span></span>
        <span>🏠 <span class="stat-value">{circles}</span> <span class="stat-label">circles</span></span>
        <span>📚 <span class="stat-value">{doujinshi}</span> <span class="stat-label">doujinshi</span></span>
      </div>
      <div class="event-link"><a href="{url}">{url}</a></div>
    </div>"#,
        class = status.css_class(),
        index = index,
        badge = status.badge(),
        keyword = keyword_badge(record),
        name = escape(&record.name),
        location = info_row("📍 Venue", &record.location),
        address = info_row("📮 Address", &record.address),
        time = info_row("📅 Time", &record.time),
        tag = info_row("🏷️ Tags", &record.tag),
        participation = info_row("🌐 Mode", &record.participation),
        wanna_go = record.wanna_go_count,
        circles = record.circle_count,
        doujinshi = record.doujinshi_count,
        url = escape(&record.url),
    )
}

fn header_stat(label: &str, value: usize) -> String {
    format!(
        r#"<div class="header-stat"><span class="header-stat-label">{}</span> <span class="header-stat-value">{}</span></div>"#,
        label, value
    )
}

/// Multi-record list document with aggregate header counters.
pub fn list_document(title: &str, records: &[ConventionRecord]) -> String {
    let total = records.len();
    let ended = records
        .iter()
        .filter(|r| classify(&r.status) == Status::Ended)
        .count();
    let upcoming = records
        .iter()
        .filter(|r| classify(&r.status) == Status::Upcoming)
        .count();
    let ongoing = total - ended - upcoming;

    let cards: String = records
        .iter()
        .enumerate()
        .map(|(i, r)| event_card(r, i + 1))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <style>
    {base}
    .container {{ max-width: 800px; }}
    .header {{
      text-align: center; margin-bottom: 25px; padding-bottom: 20px;
      border-bottom: 2px dashed rgba(245, 166, 35, 0.3);
    }}
    .title {{ font-size: 32px; font-weight: 700; color: #e8a000; margin-bottom: 15px; }}
    .stats-row {{ display: flex; justify-content: center; gap: 20px; flex-wrap: wrap; }}
    .header-stat {{
      background: rgba(245, 166, 35, 0.15); border-radius: 12px; padding: 10px 20px;
    }}
    .header-stat-label {{ font-size: 14px; color: #666; }}
    .header-stat-value {{ font-size: 20px; font-weight: 700; color: #e8a000; }}
    .events-container {{ display: flex; flex-direction: column; gap: 15px; }}
    .event-card {{
      background: rgba(255, 255, 255, 0.9); border-radius: 16px; padding: 18px;
      box-shadow: 0 4px 15px rgba(0, 0, 0, 0.08); border-left: 4px solid #f5a623;
    }}
    .event-card.ended {{ border-left-color: #aaa; opacity: 0.75; }}
    .event-card.upcoming {{ border-left-color: #4ecdc4; }}
    .event-header {{ display: flex; align-items: center; gap: 10px; margin-bottom: 12px; }}
    .event-index {{
      background: linear-gradient(135deg, #f5a623, #e8a000); color: white;
      width: 28px; height: 28px; border-radius: 50%;
      display: flex; align-items: center; justify-content: center;
      font-weight: 700; font-size: 14px;
    }}
    .event-title {{ font-size: 18px; font-weight: 700; margin-bottom: 12px; line-height: 1.4; }}
    .event-stats {{
      display: flex; gap: 15px; padding: 12px 0; margin-bottom: 12px;
      border-top: 1px dashed rgba(0, 0, 0, 0.1); border-bottom: 1px dashed rgba(0, 0, 0, 0.1);
      font-size: 14px;
    }}
    .event-link {{ font-size: 12px; word-break: break-all; }}
    .event-link a {{ color: #f5a623; text-decoration: none; }}
  </style>
</head>
<body>
  <div class="container">
    <div class="header">
      <div class="title">🎉 {title}</div>
      <div class="stats-row">
        {total}
        {ongoing}
        {upcoming}
        {ended}
      </div>
    </div>
    <div class="events-container">{cards}</div>
    <div class="footer">Data source: AllCPP</div>
  </div>
</body>
</html>"#,
        base = BASE_STYLE,
        title = escape(title),
        total = header_stat("Total", total),
        ongoing = header_stat("Ongoing", ongoing),
        upcoming = header_stat("Upcoming", upcoming),
        ended = header_stat("Ended", ended),
        cards = cards,
    )
}

/// Single-record detail document, optionally embedding the cover image as
/// a base64 data URI.
pub fn detail_document(record: &ConventionRecord, logo: Option<&[u8]>) -> String {
    let status = classify(&record.status);

    let logo_html = match logo {
        Some(bytes) => format!(
            r#"<div class="logo-section"><img src="data:image/jpeg;base64,{}" alt="cover" /></div>"#,
            base64::engine::general_purpose::STANDARD.encode(bytes)
        ),
        None => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <style>
    {base}
    .container {{ max-width: 600px; }}
    .logo-section {{
      margin-bottom: 20px; border-radius: 12px; overflow: hidden;
      box-shadow: 0 4px 15px rgba(0, 0, 0, 0.1);
    }}
    .logo-section img {{ width: 100%; height: auto; display: block; }}
    .header {{
      display: flex; align-items: center; gap: 12px; margin-bottom: 20px;
      padding-bottom: 15px; border-bottom: 2px dashed rgba(245, 166, 35, 0.3);
    }}
    .title {{ font-size: 24px; font-weight: 700; margin-bottom: 20px; line-height: 1.4; }}
    .info-section {{ margin-bottom: 20px; }}
    .info-section .info-row {{ padding: 12px 0; border-bottom: 1px solid rgba(0, 0, 0, 0.06); }}
    .info-section .info-row:last-child {{ border-bottom: none; }}
    .stats-section {{
      display: flex; justify-content: space-around; padding: 20px 0;
      background: rgba(245, 166, 35, 0.08); border-radius: 12px; margin-bottom: 20px;
    }}
    .stat-item {{ text-align: center; }}
    .stat-item .stat-value {{ font-size: 28px; display: block; }}
    .link-section {{
      padding: 15px; background: rgba(245, 166, 35, 0.08); border-radius: 10px;
      text-align: center; font-size: 13px; word-break: break-all;
    }}
    .link-section a {{ color: #f5a623; text-decoration: none; }}
  </style>
</head>
<body>
  <div class="container">
    {logo}
    <div class="header">
      <span class="status-badge {class}">{badge}</span>
      <span class="keyword-badge">{participation}</span>
      {keyword}
    </div>
    <div class="title">{name}</div>
    <div class="info-section">
      {location}
      {address}
      {time}
      {tag}
    </div>
    <div class="stats-section">
      <div class="stat-item"><span class="stat-value">{wanna_go}</span><span class="stat-label">❤️ interested</span></div>
      <div class="stat-item"><span class="stat-value">{circles}</span><span class="stat-label">🏠 circles</span></div>
      <div class="stat-item"><span class="stat-value">{doujinshi}</span><span class="stat-label">📚 doujinshi</span></div>
    </div>
    <div class="link-section"><a href="{url}">{url}</a></div>
    <div class="footer">Data source: AllCPP</div>
  </div>
</body>
</html>"#,
        base = BASE_STYLE,
        logo = logo_html,
        class = status.css_class(),
        badge = status.badge(),
        participation = escape(dash_if_empty(&record.participation)),
        keyword = keyword_badge(record),
        name = escape(&record.name),
        location = info_row("📍 Venue", &record.location),
        address = info_row("📮 Address", &record.address),
        time = info_row("📅 Time", &record.time),
        tag = info_row("🏷️ Tags", &record.tag),
        wanna_go = record.wanna_go_count,
        circles = record.circle_count,
        doujinshi = record.doujinshi_count,
        url = escape(&record.url),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{STATUS_ENDED, STATUS_UPCOMING};

    fn record(name: &str, status: &str) -> ConventionRecord {
        ConventionRecord {
            name: name.to_string(),
            location: "Nanjing".to_string(),
            address: "Expo Hall".to_string(),
            time: "2026-09-12".to_string(),
            tag: "doujin".to_string(),
            status: status.to_string(),
            wanna_go_count: 10,
            circle_count: 2,
            doujinshi_count: 5,
            url: "https://example.com/e/1".to_string(),
            participation: "offline".to_string(),
            logo_url: String::new(),
            keyword: None,
        }
    }

    #[test]
    fn test_header_counters_sum_to_total() {
        let records = vec![
            record("a", STATUS_ENDED),
            record("b", STATUS_UPCOMING),
            record("c", "进行中"),
            record("d", ""),
            record("e", "奇怪的状态"),
        ];
        let html = list_document("Test", &records);

        // ended=1, upcoming=1, ongoing=3, total=5
        assert!(html.contains(r#"<span class="header-stat-label">Total</span> <span class="header-stat-value">5</span>"#));
        assert!(html.contains(r#"<span class="header-stat-label">Ongoing</span> <span class="header-stat-value">3</span>"#));
        assert!(html.contains(r#"<span class="header-stat-label">Upcoming</span> <span class="header-stat-value">1</span>"#));
        assert!(html.contains(r#"<span class="header-stat-label">Ended</span> <span class="header-stat-value">1</span>"#));
    }

    #[test]
    fn test_list_cards_carry_index_and_status_class() {
        let html = list_document("Test", &[record("a", STATUS_ENDED), record("b", "")]);
        assert!(html.contains(r#"<span class="event-index">1</span>"#));
        assert!(html.contains(r#"<span class="event-index">2</span>"#));
        assert!(html.contains(r#"event-card ended"#));
        assert!(html.contains(r#"event-card ongoing"#));
    }

    #[test]
    fn test_fields_are_escaped() {
        let mut r = record("<script>alert(1)</script>", "");
        r.address = "a & b".to_string();
        let html = list_document("x<y", &[r]);
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("a &amp; b"));
        assert!(html.contains("x&lt;y"));
    }

    #[test]
    fn test_keyword_badge_only_when_tagged() {
        let mut tagged = record("a", "");
        tagged.keyword = Some("南京".to_string());
        assert!(list_document("t", &[tagged]).contains("keyword-badge"));
        assert!(!list_document("t", &[record("a", "")]).contains("🔖"));
    }

    #[test]
    fn test_detail_embeds_logo_when_given() {
        let r = record("a", STATUS_UPCOMING);
        let with_logo = detail_document(&r, Some(&[1u8, 2, 3]));
        assert!(with_logo.contains("data:image/jpeg;base64,"));
        assert!(with_logo.contains("logo-section"));

        let without = detail_document(&r, None);
        assert!(!without.contains("logo-section"));
        assert!(without.contains("Upcoming"));
    }

    #[test]
    fn test_empty_fields_render_dash() {
        let mut r = record("a", "");
        r.location = String::new();
        let html = detail_document(&r, None);
        assert!(html.contains(r#"<span class="info-label">📍 Venue</span><span class="info-value">-</span>"#));
    }
}
