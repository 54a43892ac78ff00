//! Self-contained HTML research reports.

use std::fmt::Write as _;

use chrono::Utc;

use veritas_core::error::{Result, VeritasError};
use veritas_core::traits::ReportRenderer;
use veritas_core::types::{ReportNarrative, Source, SourceStats, DEFAULT_TRUST_THRESHOLD};

const PREVIEW_CHARS: usize = 300;

const STYLES: &str = "
* { margin: 0; padding: 0; box-sizing: border-box; }
body { font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; line-height: 1.6; color: #333; background: #f5f5f5; }
.container { max-width: 1200px; margin: 0 auto; padding: 20px; background: white; }
header { background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; padding: 40px; border-radius: 8px; margin-bottom: 30px; }
header h1 { font-size: 2.5em; margin-bottom: 10px; }
header h2 { font-size: 1.8em; font-weight: normal; opacity: 0.9; }
.metadata { margin-top: 20px; opacity: 0.8; font-size: 0.9em; }
section { margin-bottom: 40px; }
section h2 { color: #667eea; border-bottom: 2px solid #667eea; padding-bottom: 10px; margin-bottom: 20px; }
.content p { margin-bottom: 15px; }
.stats-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr)); gap: 20px; margin-bottom: 20px; }
.stat-card { background: #f8f9fa; padding: 20px; border-radius: 8px; text-align: center; }
.stat-value { font-size: 2em; font-weight: bold; color: #667eea; }
.distribution ul { list-style: none; }
.source { border-left: 4px solid #ccc; padding: 20px; margin-bottom: 20px; background: #fafafa; border-radius: 4px; }
.source.trust-high { border-left-color: #28a745; }
.source.trust-medium { border-left-color: #ffc107; }
.source.trust-low { border-left-color: #dc3545; }
span.trust-high { color: #28a745; }
span.trust-medium { color: #ffc107; }
span.trust-low { color: #dc3545; }
.source-header { display: flex; justify-content: space-between; align-items: center; }
.trustworthiness-badge { background: #667eea; color: white; padding: 5px 15px; border-radius: 20px; }
.source-url a { color: #667eea; word-break: break-all; }
.source-meta { color: #777; font-size: 0.9em; margin: 5px 0 10px; }
.analysis { margin-top: 15px; }
.strengths { color: #28a745; margin-top: 10px; }
.red-flags { color: #dc3545; margin-top: 10px; }
footer { text-align: center; color: #999; padding: 20px; border-top: 1px solid #eee; }
";

/// Escape text for interpolation into HTML content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

/// Blank-line separated paragraphs as escaped `<p>` elements.
pub fn paragraphs_to_html(text: &str) -> String {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", escape_html(p)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Page returned when no source survived analysis.
pub fn empty_report_html(topic: &str, errors: &[String]) -> String {
    let topic = escape_html(topic);
    let errors = if errors.is_empty() {
        "None".to_string()
    } else {
        escape_html(&errors.join(", "))
    };
    format!(
        "<!DOCTYPE html>
<html>
<head><meta charset=\"UTF-8\"><title>Research Report: {topic}</title></head>
<body>
    <h1>Research Report: {topic}</h1>
    <p>No sources were successfully analyzed.</p>
    <p>Errors: {errors}</p>
</body>
</html>
"
    )
}

/// Page returned when rendering the full report failed.
pub fn error_report_html(topic: &str, message: &str) -> String {
    format!(
        "<!DOCTYPE html>
<html>
<head><meta charset=\"UTF-8\"><title>Error Report: {}</title></head>
<body>
    <h1>Report Generation Error</h1>
    <p>{}</p>
</body>
</html>
",
        escape_html(topic),
        escape_html(message)
    )
}

fn trust_class(score: f64) -> &'static str {
    if score >= 85.0 {
        "trust-high"
    } else if score >= 70.0 {
        "trust-medium"
    } else {
        "trust-low"
    }
}

/// Renders the full HTML report.
#[derive(Debug, Clone)]
pub struct HtmlReportRenderer {
    threshold: f64,
    max_sources: Option<usize>,
}

impl Default for HtmlReportRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_TRUST_THRESHOLD, None)
    }
}

impl HtmlReportRenderer {
    pub fn new(threshold: f64, max_sources: Option<usize>) -> Self {
        Self {
            threshold,
            max_sources,
        }
    }

    fn write_statistics(&self, out: &mut String, stats: &SourceStats) -> std::fmt::Result {
        write!(
            out,
            r#"
        <section class="statistics">
            <h2>Statistics</h2>
            <div class="stats-grid">
                <div class="stat-card"><div class="stat-value">{}</div><div class="stat-label">Total Sources</div></div>
                <div class="stat-card"><div class="stat-value">{:.1}</div><div class="stat-label">Average Score</div></div>
                <div class="stat-card"><div class="stat-value">{:.1} - {:.1}</div><div class="stat-label">Score Range</div></div>
            </div>
            <div class="distribution">
                <h3>Score Distribution</h3>
                <ul>
                    <li><span class="trust-high">&#9632;</span> Excellent (90-100): {}</li>
                    <li><span class="trust-medium">&#9632;</span> Good (80-89): {}</li>
                    <li><span class="trust-medium">&#9632;</span> Fair (70-79): {}</li>
                    <li><span class="trust-low">&#9632;</span> Poor (0-69): {}</li>
                </ul>
            </div>
        </section>"#,
            stats.total,
            stats.average,
            stats.min,
            stats.max,
            stats.excellent,
            stats.good,
            stats.fair,
            stats.poor
        )
    }

    fn write_source(&self, out: &mut String, index: usize, source: &Source) -> std::fmt::Result {
        let assessment = source.assessment();
        let reasoning = assessment
            .as_ref()
            .map(|a| a.reasoning.as_str())
            .filter(|r| !r.is_empty())
            .unwrap_or("No analysis available");
        let word_count = source
            .metadata
            .get("word_count")
            .and_then(|v| v.as_u64())
            .map(|n| n.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let url = escape_html(&source.url);

        write!(
            out,
            r#"
            <div class="source {class}">
                <div class="source-header">
                    <h3>{index}. {title}</h3>
                    <div class="trustworthiness-badge"><span class="score">{score:.1}</span>/100</div>
                </div>
                <div class="source-url"><a href="{url}" target="_blank">{url}</a></div>
                <div class="source-meta"><span>Domain: {domain}</span> | <span>Words: {word_count}</span></div>
                <div class="source-preview"><p>{preview}</p></div>
                <div class="analysis">
                    <h4>Trustworthiness Analysis</h4>
                    <p>{reasoning}</p>"#,
            class = trust_class(source.trustworthiness_score),
            title = escape_html(&source.title),
            score = source.trustworthiness_score,
            domain = escape_html(&source.domain()),
            preview = escape_html(&source.content_preview(PREVIEW_CHARS)),
            reasoning = escape_html(reasoning),
        )?;

        if let Some(a) = &assessment {
            for (class, label, items) in [
                ("strengths", "Strengths", &a.strengths),
                ("red-flags", "Concerns", &a.red_flags),
            ] {
                if items.is_empty() {
                    continue;
                }
                write!(out, "\n<div class=\"{}\"><strong>{}:</strong><ul>", class, label)?;
                for item in items {
                    write!(out, "<li>{}</li>", escape_html(item))?;
                }
                out.push_str("</ul></div>");
            }
        }
        out.push_str("\n                </div>\n            </div>");
        Ok(())
    }

    fn render_document(
        &self,
        topic: &str,
        sources: &[Source],
        narrative: &ReportNarrative,
    ) -> std::result::Result<String, std::fmt::Error> {
        let stats = SourceStats::from_sources(sources, self.threshold);
        let generated_at = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
        let listed = match self.max_sources {
            Some(n) => &sources[..n.min(sources.len())],
            None => sources,
        };

        let mut out = String::new();
        write!(
            out,
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Research Report: {title}</title>
    <style>{styles}</style>
</head>
<body>
    <div class="container">
        <header>
            <h1>Research Report</h1>
            <h2>{title}</h2>
            <div class="metadata">
                <p>Generated: {generated_at}</p>
                <p>Total Sources: {total} | Trustworthy: {trustworthy} | Avg Score: {average:.1}/100</p>
            </div>
        </header>

        <section class="executive-summary">
            <h2>Executive Summary</h2>
            <div class="content">
{summary}
            </div>
        </section>

        <section class="key-findings">
            <h2>Key Findings</h2>
            <div class="content">
{findings}
            </div>
        </section>"#,
            title = escape_html(topic),
            styles = STYLES,
            total = stats.total,
            trustworthy = stats.trustworthy,
            average = stats.average,
            summary = paragraphs_to_html(&narrative.summary),
            findings = paragraphs_to_html(&narrative.findings),
        )?;

        if !sources.is_empty() {
            self.write_statistics(&mut out, &stats)?;
        }

        out.push_str("\n\n        <section class=\"sources\">\n            <h2>Sources</h2>");
        for (i, source) in listed.iter().enumerate() {
            self.write_source(&mut out, i + 1, source)?;
        }
        write!(
            out,
            r#"
        </section>

        <footer>
            <p>Generated by Veritas research pipeline</p>
            <p class="timestamp">{}</p>
        </footer>
    </div>
</body>
</html>
"#,
            generated_at
        )?;
        Ok(out)
    }
}

impl ReportRenderer for HtmlReportRenderer {
    fn render(&self, topic: &str, sources: &[Source], narrative: &ReportNarrative) -> Result<String> {
        self.render_document(topic, sources, narrative)
            .map_err(|e| VeritasError::Report(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veritas_test_utils::analyzed_sources;

    fn narrative() -> ReportNarrative {
        ReportNarrative {
            summary: "First paragraph.\n\nSecond <b>paragraph</b>.".into(),
            findings: "1. Qubits superpose.\n\n2. Gates entangle.".into(),
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
    }

    #[test]
    fn test_paragraphs_to_html() {
        assert_eq!(
            paragraphs_to_html("one\n\n\n\n two \n\n"),
            "<p>one</p>\n<p>two</p>"
        );
    }

    #[test]
    fn test_render_report_sections() {
        let sources = analyzed_sources(&[92.0, 88.0, 76.0, 40.0]);
        let html = HtmlReportRenderer::default()
            .render("quantum computing basics", &sources, &narrative())
            .unwrap();

        assert!(html.contains("<h2>quantum computing basics</h2>"));
        assert!(html.contains("Total Sources: 4 | Trustworthy: 2 | Avg Score: 74.0/100"));
        assert!(html.contains("<p>Second &lt;b&gt;paragraph&lt;/b&gt;.</p>"));
        assert!(html.contains("<p>2. Gates entangle.</p>"));
        assert!(html.contains("Excellent (90-100): 1"));
        assert!(html.contains("Poor (0-69): 1"));
        assert!(html.contains("class=\"source trust-high\""));
        assert!(html.contains("class=\"source trust-medium\""));
        assert!(html.contains("class=\"source trust-low\""));
        assert!(html.contains("<h3>4. Article at https://source4.example.org/</h3>"));
        assert!(html.contains("Domain: source1.example.org"));
        assert!(html.contains("<strong>Concerns:</strong><ul><li>Unsupported claims</li>"));
        assert!(html.contains("<strong>Strengths:</strong>"));
    }

    #[test]
    fn test_render_caps_listed_sources() {
        let sources = analyzed_sources(&[92.0, 88.0, 75.0]);
        let html = HtmlReportRenderer::new(85.0, Some(1))
            .render("t", &sources, &narrative())
            .unwrap();
        assert!(html.contains("<h3>1. "));
        assert!(!html.contains("<h3>2. "));
        // Totals still cover every source.
        assert!(html.contains("Total Sources: 3"));
    }

    #[test]
    fn test_render_without_sources_omits_statistics() {
        let html = HtmlReportRenderer::default()
            .render("t", &[], &narrative())
            .unwrap();
        assert!(!html.contains("Score Distribution"));
        assert!(html.contains("Total Sources: 0"));
    }

    #[test]
    fn test_missing_assessment_defaults() {
        let source = Source::new("https://a.org", "A", "body");
        let html = HtmlReportRenderer::default()
            .render("t", &[source], &narrative())
            .unwrap();
        assert!(html.contains("No analysis available"));
        assert!(html.contains("Words: N/A"));
    }

    #[test]
    fn test_fallback_pages_escape_input() {
        let html = empty_report_html("<t>", &["No URLs to scrape".into()]);
        assert!(html.contains("Research Report: &lt;t&gt;"));
        assert!(html.contains("No sources were successfully analyzed."));
        assert!(html.contains("Errors: No URLs to scrape"));
        assert!(empty_report_html("t", &[]).contains("Errors: None"));

        let html = error_report_html("t", "Report generation failed: boom");
        assert!(html.contains("<h1>Report Generation Error</h1>"));
        assert!(html.contains("Report generation failed: boom"));
    }
}
