// src/notify/render.rs
use crate::monitor::Snapshot;
use std::fmt::Write;

pub const SUBJECT: &str = "The server state changed";

fn status_label(online: bool) -> &'static str {
    if online {
        "Online"
    } else {
        "Offline"
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// HTML table, one row per target, sorted by key.
pub fn render_html(snapshot: &Snapshot) -> String {
    let mut html = String::from(
        "<b>Hi,</b> the server state changed:<br/>\n\
         <table>\n\
         <thead>\n<tr><th>Code</th><th>Server</th><th>Status</th></tr>\n</thead>\n\
         <tbody>\n",
    );

    for (key, status) in &snapshot.statuses {
        let color = if status.online { "green" } else { "red" };
        // Writing into a String cannot fail.
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td><span style='color:{};'>{}</span></td></tr>",
            escape(key),
            escape(&status.address),
            color,
            status_label(status.online),
        );
    }

    let _ = write!(
        html,
        "</tbody>\n</table>\n<p>Checked at {}</p>\n",
        snapshot.taken_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    html
}

/// Plain-text fallback with aligned columns.
pub fn render_text(snapshot: &Snapshot) -> String {
    let key_width = snapshot
        .statuses
        .keys()
        .map(|k| k.chars().count())
        .chain(std::iter::once("Code".len()))
        .max()
        .unwrap_or(0);
    let addr_width = snapshot
        .statuses
        .values()
        .map(|s| s.address.chars().count())
        .chain(std::iter::once("Server".len()))
        .max()
        .unwrap_or(0);

    let mut text = String::from("Hi, the server state changed:\n\n");
    let _ = writeln!(
        text,
        "{:<kw$}  {:<aw$}  Status",
        "Code",
        "Server",
        kw = key_width,
        aw = addr_width
    );

    for (key, status) in &snapshot.statuses {
        let _ = writeln!(
            text,
            "{:<kw$}  {:<aw$}  {}",
            key,
            status.address,
            status_label(status.online),
            kw = key_width,
            aw = addr_width
        );
    }

    let _ = write!(
        text,
        "\nChecked at {}\n",
        snapshot.taken_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::TargetStatus;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn snapshot() -> Snapshot {
        let mut statuses = BTreeMap::new();
        statuses.insert(
            "web".to_string(),
            TargetStatus {
                address: "10.0.0.1:80".to_string(),
                online: true,
            },
        );
        statuses.insert(
            "db".to_string(),
            TargetStatus {
                address: "db.internal:5432".to_string(),
                online: false,
            },
        );

        Snapshot {
            round: 3,
            taken_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            statuses,
        }
    }

    #[test]
    fn test_html_has_one_row_per_target() {
        let html = render_html(&snapshot());

        assert_eq!(html.matches("<tr><td>").count(), 2);
        assert!(html.contains("<td>web</td><td>10.0.0.1:80</td>"));
        assert!(html.contains("<span style='color:green;'>Online</span>"));
        assert!(html.contains("<td>db</td><td>db.internal:5432</td>"));
        assert!(html.contains("<span style='color:red;'>Offline</span>"));
        assert!(html.contains("2024-05-01 12:30:00 UTC"));
        // Rows are sorted by key.
        assert!(html.find("<td>db</td>").unwrap() < html.find("<td>web</td>").unwrap());
    }

    #[test]
    fn test_html_escapes_keys() {
        let mut snap = snapshot();
        snap.statuses.insert(
            "<script>".to_string(),
            TargetStatus {
                address: "a&b:1".to_string(),
                online: true,
            },
        );

        let html = render_html(&snap);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("a&amp;b:1"));
    }

    #[test]
    fn test_text_table() {
        let text = render_text(&snapshot());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[2], "Code  Server            Status");
        assert_eq!(lines[3], "db    db.internal:5432  Offline");
        assert_eq!(lines[4], "web   10.0.0.1:80       Online");
    }
}
