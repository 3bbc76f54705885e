//! Batch summary page.
//!
//! One standalone HTML file per batch for whoever runs the pipeline: totals,
//! every delivery outcome, the weak questions as a bar chart and the raw
//! report JSON. Styles and script are inlined.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use remedia_core::message::escape_html;
use remedia_core::report::BatchReport;

/// Render the summary page for a batch report.
pub fn generate_html(report: &BatchReport) -> String {
    let mut page = String::with_capacity(8 * 1024);
    let _ = write!(
        page,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>remedia batch {id}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n",
        id = report.batch_id,
    );

    write_heading(&mut page, report);
    write_totals(&mut page, report);
    write_deliveries(&mut page, report);
    write_weak_questions(&mut page, report);
    write_raw_json(&mut page, report);

    let _ = write!(page, "<script>{SCRIPT}</script>\n</body>\n</html>\n");
    page
}

/// Render and save the summary page, creating parent directories.
pub fn write_html_report(report: &BatchReport, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    std::fs::write(path, generate_html(report))
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::debug!(path = %path.display(), "batch summary written");
    Ok(())
}

fn write_heading(page: &mut String, report: &BatchReport) {
    let _ = writeln!(
        page,
        "<h1>Remediation batch report</h1>\n<p class=\"muted\">{} &middot; created {}</p>",
        report.batch_id,
        report.created_at.format("%d %b %Y %H:%M UTC"),
    );
    if report.partial {
        let _ = writeln!(
            page,
            "<p class=\"notice\">Batch cut short: {} job(s) abandoned ({})</p>",
            report.abandoned.len(),
            escape_html(&report.abandoned.join(", ")),
        );
    }
}

fn write_totals(page: &mut String, report: &BatchReport) {
    let tiles = [
        ("Students", report.total_students.to_string()),
        ("Average", format!("{:.1}%", report.average_score)),
        ("Sent", report.emails_sent.to_string()),
        ("Failed", report.failed_count().to_string()),
        ("Skipped rows", report.skipped_rows.to_string()),
    ];
    page.push_str("<div class=\"tiles\">\n");
    for (label, value) in tiles {
        let _ = writeln!(
            page,
            "<div class=\"tile\"><span class=\"value\">{value}</span><span class=\"label\">{label}</span></div>"
        );
    }
    page.push_str("</div>\n");
}

fn write_deliveries(page: &mut String, report: &BatchReport) {
    page.push_str("<h2>Deliveries</h2>\n");
    if report.email_results.is_empty() {
        page.push_str("<p class=\"muted\">No student needed remediation.</p>\n");
        return;
    }

    page.push_str(
        "<label><input type=\"checkbox\" id=\"only-failed\"> Show failures only</label>\n\
         <table id=\"deliveries\">\n\
         <tr><th>Student</th><th>Score</th><th>Percentage</th><th>Status</th></tr>\n",
    );
    for result in &report.email_results {
        let class = if result.status.is_sent() { "sent" } else { "failed" };
        let _ = writeln!(
            page,
            "<tr class=\"{class}\"><td>{}</td><td>{}</td><td>{:.1}%</td><td>{}</td></tr>",
            escape_html(&result.student_id),
            escape_html(&result.score),
            result.percentage,
            escape_html(&result.status.to_string()),
        );
    }
    page.push_str("</table>\n");
}

fn write_weak_questions(page: &mut String, report: &BatchReport) {
    if report.weak_questions.is_empty() {
        return;
    }
    page.push_str("<h2>Weak questions</h2>\n");

    const ROW: usize = 30;
    const LABEL: usize = 320;
    const BAR: f64 = 400.0;

    let height = report.weak_questions.len() * ROW + 10;
    let _ = writeln!(
        page,
        "<svg class=\"chart\" width=\"{}\" height=\"{height}\" role=\"img\">",
        LABEL + BAR as usize + 70,
    );
    for (i, question) in report.weak_questions.iter().enumerate() {
        let top = 5 + i * ROW;
        let middle = top + ROW / 2 - 2;
        let rate = question.success_rate.clamp(0.0, 100.0);
        let width = (rate / 100.0 * BAR).round() as usize;
        let fill = if rate < 40.0 { "#dc2626" } else { "#d97706" };
        let short: String = question.question.chars().take(48).collect();

        let _ = writeln!(
            page,
            "<text x=\"{}\" y=\"{middle}\" text-anchor=\"end\"><title>{}</title>{}</text>\n\
             <rect x=\"{LABEL}\" y=\"{top}\" width=\"{width}\" height=\"{}\" fill=\"{fill}\"/>\n\
             <text x=\"{}\" y=\"{middle}\">{:.1}%</text>",
            LABEL - 8,
            escape_html(&question.question),
            escape_html(&short),
            ROW - 8,
            LABEL + width + 6,
            question.success_rate,
        );
    }
    page.push_str("</svg>\n");
}

fn write_raw_json(page: &mut String, report: &BatchReport) {
    let json = serde_json::to_string_pretty(report).unwrap_or_default();
    let _ = writeln!(
        page,
        "<details><summary>Report JSON</summary><pre>{}</pre></details>",
        escape_html(&json),
    );
}

const STYLE: &str = "
body { font: 15px/1.5 system-ui, sans-serif; max-width: 960px; margin: 2rem auto; padding: 0 1rem; color: #1f2937; }
.muted { color: #6b7280; }
.notice { background: #fef3c7; border-left: 4px solid #d97706; padding: 0.5rem 1rem; }
.tiles { display: flex; gap: 1rem; flex-wrap: wrap; }
.tile { border: 1px solid #d1d5db; border-radius: 6px; padding: 0.75rem 1.25rem; min-width: 7rem; }
.tile .value { display: block; font-size: 1.6rem; font-weight: 600; }
.tile .label { color: #6b7280; font-size: 0.8rem; text-transform: uppercase; }
#deliveries { border-collapse: collapse; width: 100%; margin-top: 0.5rem; }
#deliveries th, #deliveries td { border-bottom: 1px solid #e5e7eb; padding: 0.4rem 0.6rem; text-align: left; }
tr.sent td:last-child { color: #15803d; }
tr.failed td:last-child { color: #b91c1c; }
.chart text { font-size: 12px; dominant-baseline: middle; fill: currentColor; }
pre { background: #f3f4f6; padding: 1rem; overflow-x: auto; }
";

const SCRIPT: &str = "
const toggle = document.getElementById('only-failed');
if (toggle) {
  toggle.addEventListener('change', () => {
    document.querySelectorAll('#deliveries tr.sent').forEach(row => {
      row.style.display = toggle.checked ? 'none' : '';
    });
  });
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use remedia_core::error::{Stage, StageFailure};
    use remedia_core::model::WeakQuestion;
    use remedia_core::report::{DeliveryResult, DeliveryStatus};

    fn sample() -> BatchReport {
        BatchReport {
            batch_id: uuid::Uuid::nil(),
            created_at: chrono::Utc::now(),
            total_students: 3,
            average_score: 46.7,
            emails_sent: 1,
            email_results: vec![
                DeliveryResult {
                    student_id: "a@x.com".into(),
                    status: DeliveryStatus::Sent,
                    score: "2/10".into(),
                    percentage: 20.0,
                },
                DeliveryResult {
                    student_id: "b@x.com".into(),
                    status: DeliveryStatus::Failed(StageFailure::new(
                        Stage::Delivery,
                        "mailbox <full>",
                    )),
                    score: "4/10".into(),
                    percentage: 40.0,
                },
            ],
            weak_questions: vec![WeakQuestion {
                question: "What is a sarai?".into(),
                success_rate: 33.3,
            }],
            skipped_rows: 2,
            partial: false,
            abandoned: vec![],
        }
    }

    #[test]
    fn page_lists_outcomes_and_weak_questions() {
        let page = generate_html(&sample());

        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.trim_end().ends_with("</html>"));
        assert!(page.contains("<tr class=\"sent\"><td>a@x.com</td>"));
        assert!(page.contains("Failed (delivery): mailbox &lt;full&gt;"));
        assert!(page.contains("<title>What is a sarai?</title>"));
        assert!(page.contains("33.3%"));
        assert!(page.contains("<span class=\"value\">46.7%</span>"));
        assert!(!page.contains("Batch cut short"));
    }

    #[test]
    fn partial_batch_shows_notice() {
        let mut report = sample();
        report.partial = true;
        report.abandoned = vec!["c@x.com".into()];
        let page = generate_html(&report);
        assert!(page.contains("Batch cut short: 1 job(s) abandoned (c@x.com)"));
    }

    #[test]
    fn empty_batch_has_no_table_or_chart() {
        let mut report = sample();
        report.email_results.clear();
        report.weak_questions.clear();
        let page = generate_html(&report);
        assert!(page.contains("No student needed remediation."));
        assert!(!page.contains("<table"));
        assert!(!page.contains("<svg"));
    }

    #[test]
    fn writes_into_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batches").join("summary.html");

        write_html_report(&sample(), &path).unwrap();
        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains("Remediation batch report"));
    }
}
