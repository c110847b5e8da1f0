// Report rendering: JSON or a self-contained HTML document

use crate::error::AnalyticsError;
use crate::models::{AnalysisResult, ApiResponse, Bucket, ReportFormat};
use std::fmt::Write;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub content_type: &'static str,
    pub body: String,
}

pub fn render(result: &AnalysisResult, format: ReportFormat) -> Result<Rendered, AnalyticsError> {
    match format {
        ReportFormat::Json => Ok(Rendered {
            content_type: JSON_CONTENT_TYPE,
            body: serde_json::to_string_pretty(result)?,
        }),
        ReportFormat::Html => Ok(Rendered {
            content_type: HTML_CONTENT_TYPE,
            body: render_html(result).map_err(|e| AnalyticsError::Render(e.to_string()))?,
        }),
    }
}

/// Render an HTTP envelope. JSON carries the whole envelope; HTML renders
/// the report inside it.
pub fn render_envelope(
    envelope: &ApiResponse<AnalysisResult>,
    format: ReportFormat,
) -> Result<Rendered, AnalyticsError> {
    match format {
        ReportFormat::Json => Ok(Rendered {
            content_type: JSON_CONTENT_TYPE,
            body: serde_json::to_string(envelope)?,
        }),
        ReportFormat::Html => {
            let result = envelope
                .data
                .as_ref()
                .ok_or_else(|| AnalyticsError::Render("no report to render".into()))?;
            render(result, ReportFormat::Html)
        }
    }
}

/// Escape text for HTML element content and quoted attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
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

const STYLE: &str = "body{font-family:system-ui,sans-serif;margin:2rem;color:#222}\
table{border-collapse:collapse;margin:1rem 0}\
th,td{border:1px solid #ccc;padding:.3rem .6rem;text-align:right}\
th{background:#f3f3f3}td.id{text-align:left}\
dl{display:grid;grid-template-columns:max-content auto;gap:.2rem 1rem}";

fn render_html(result: &AnalysisResult) -> Result<String, std::fmt::Error> {
    let summary = &result.summary;
    let mut html = String::new();

    writeln!(html, "<!DOCTYPE html>")?;
    writeln!(html, "<html lang=\"en\">")?;
    writeln!(html, "<head>")?;
    writeln!(html, "<meta charset=\"utf-8\">")?;
    writeln!(html, "<title>High-Value User Report {}</title>", result.reference_date)?;
    writeln!(html, "<style>{STYLE}</style>")?;
    writeln!(html, "</head>")?;
    writeln!(html, "<body>")?;
    writeln!(html, "<h1>High-Value User Report</h1>")?;

    writeln!(html, "<dl>")?;
    writeln!(html, "<dt>Reference date</dt><dd>{}</dd>", result.reference_date)?;
    writeln!(html, "<dt>Inactivity threshold</dt><dd>{} days</dd>", result.threshold_days)?;
    writeln!(html, "<dt>Minimum net bet</dt><dd>{}</dd>", result.min_net_bet)?;
    writeln!(html, "<dt>Users</dt><dd>{}</dd>", summary.count)?;
    writeln!(html, "<dt>Active / dormant</dt><dd>{} / {}</dd>", summary.active_count, summary.dormant_count)?;
    writeln!(html, "<dt>Total net bet</dt><dd>{}</dd>", summary.net_bet_total)?;
    writeln!(html, "<dt>Average net bet</dt><dd>{:.2}</dd>", summary.average_net_bet)?;
    writeln!(html, "</dl>")?;

    write_buckets(&mut html, "Net bet distribution", &summary.net_bet_distribution)?;
    write_buckets(&mut html, "Inactivity distribution (days)", &summary.inactivity_distribution)?;

    writeln!(html, "<h2>Users</h2>")?;
    if result.segment.is_empty() {
        writeln!(html, "<p>No users match these criteria.</p>")?;
    } else {
        writeln!(html, "<table>")?;
        writeln!(
            html,
            "<tr><th>User</th><th>Segment</th><th>Logins</th><th>Last activity</th><th>Inactive days</th><th>Net bet</th></tr>"
        )?;
        for r in &result.segment {
            writeln!(
                html,
                "<tr><td class=\"id\">{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&r.user_id),
                r.segment.as_str(),
                r.login_count,
                r.last_activity,
                r.inactive_days,
                r.net_bet
            )?;
        }
        writeln!(html, "</table>")?;
    }

    if let Some(effects) = &result.event_effects {
        writeln!(html, "<h2>Event effects</h2>")?;
        if effects.is_empty() {
            writeln!(html, "<p>No events in the lookback window.</p>")?;
        } else {
            writeln!(html, "<table>")?;
            writeln!(
                html,
                "<tr><th>Event</th><th>Dates</th><th>Participants</th><th>Event net bet</th><th>Baseline net bet</th><th>Lift</th></tr>"
            )?;
            for e in effects {
                let lift = e
                    .net_bet_lift_pct
                    .map(|p| format!("{p:+.2}%"))
                    .unwrap_or_else(|| "n/a".to_string());
                writeln!(
                    html,
                    "<tr><td class=\"id\">{}</td><td>{} to {}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    escape_html(&e.event_name),
                    e.start_date,
                    e.end_date,
                    e.participants,
                    e.event_net_bet,
                    e.baseline_net_bet,
                    lift
                )?;
            }
            writeln!(html, "</table>")?;
        }
    }

    writeln!(html, "</body>")?;
    writeln!(html, "</html>")?;
    Ok(html)
}

fn write_buckets(html: &mut String, title: &str, buckets: &[Bucket]) -> std::fmt::Result {
    writeln!(html, "<h2>{}</h2>", escape_html(title))?;
    writeln!(html, "<table>")?;
    writeln!(html, "<tr><th>Range</th><th>Users</th></tr>")?;
    for b in buckets {
        writeln!(html, "<tr><td class=\"id\">{}</td><td>{}</td></tr>", escape_html(&b.label), b.count)?;
    }
    writeln!(html, "</table>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::summarize;
    use crate::models::{EventEffect, SegmentKind, UserActivityRecord};
    use chrono::NaiveDate;

    fn sample(user_id: &str) -> AnalysisResult {
        let today = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let segment = vec![
            UserActivityRecord {
                user_id: user_id.into(),
                login_count: 12,
                last_activity: NaiveDate::from_ymd_opt(2024, 6, 28).unwrap(),
                inactive_days: 2,
                net_bet: 80_000,
                segment: SegmentKind::Active,
            },
            UserActivityRecord {
                user_id: "10442".into(),
                login_count: 3,
                last_activity: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                inactive_days: 180,
                net_bet: 2_000_000,
                segment: SegmentKind::Dormant,
            },
        ];
        let summary = summarize(&segment);
        AnalysisResult {
            reference_date: today,
            threshold_days: 30,
            min_net_bet: 50_000.0,
            segment,
            summary,
            event_effects: Some(vec![EventEffect {
                event_id: "3".into(),
                event_name: "Spring <Bonus> & Free Spins".into(),
                start_date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2024, 4, 7).unwrap(),
                participants: 1,
                event_net_bet: 12_000,
                baseline_net_bet: 8_000,
                net_bet_lift_pct: Some(50.0),
            }]),
        }
    }

    #[test]
    fn test_json_round_trip() {
        let result = sample("u-1");
        let rendered = render(&result, ReportFormat::Json).unwrap();
        assert_eq!(rendered.content_type, JSON_CONTENT_TYPE);

        let parsed: AnalysisResult = serde_json::from_str(&rendered.body).unwrap();
        assert_eq!(parsed, result);
    }

    #[test]
    fn test_html_escapes_markup_in_user_id() {
        let result = sample("<script>alert('x')</script>");
        let rendered = render(&result, ReportFormat::Html).unwrap();
        assert_eq!(rendered.content_type, HTML_CONTENT_TYPE);

        let body = &rendered.body;
        assert!(!body.contains("<script>"));
        assert!(body.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
        assert!(body.contains("Spring &lt;Bonus&gt; &amp; Free Spins"));
        assert!(body.contains("+50.00%"));
    }

    #[test]
    fn test_html_lists_every_user() {
        let body = render(&sample("vip-7"), ReportFormat::Html).unwrap().body;
        assert!(body.starts_with("<!DOCTYPE html>"));
        assert!(body.contains("vip-7"));
        assert!(body.contains("10442"));
        assert!(body.contains("<dt>Users</dt><dd>2</dd>"));
    }

    #[test]
    fn test_envelope_renders_through_both_formats() {
        let envelope = ApiResponse::ok(sample("<i>vip</i>")).with_message("Found 2 high-value users");

        let json = render_envelope(&envelope, ReportFormat::Json).unwrap();
        assert_eq!(json.content_type, JSON_CONTENT_TYPE);
        let parsed: ApiResponse<AnalysisResult> = serde_json::from_str(&json.body).unwrap();
        assert_eq!(parsed.message.as_deref(), Some("Found 2 high-value users"));
        assert_eq!(parsed.data, envelope.data);

        let html = render_envelope(&envelope, ReportFormat::Html).unwrap();
        assert_eq!(html, render(envelope.data.as_ref().unwrap(), ReportFormat::Html).unwrap());
        assert!(!html.body.contains("<i>vip</i>"));
    }

    #[test]
    fn test_envelope_without_data_fails_html() {
        let envelope = ApiResponse::<AnalysisResult> {
            success: true,
            message: None,
            data: None,
            error: None,
            pagination: None,
        };
        let err = render_envelope(&envelope, ReportFormat::Html).unwrap_err();
        assert!(matches!(err, AnalyticsError::Render(_)));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a&b<c>\"d'"), "a&amp;b&lt;c&gt;&quot;d&#39;");
        assert_eq!(escape_html("plain"), "plain");
    }
}
