//! Regex-based HTML text extraction.

use std::sync::OnceLock;

use regex::Regex;

macro_rules! regex {
    ($re:literal) => {{
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new($re).unwrap())
    }};
}

/// Which extraction strategy produced a page's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    /// Paragraphs of the main content area.
    Article,
    /// Every text node of the page.
    Fallback,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Article => "article",
            ExtractionMethod::Fallback => "fallback",
        }
    }
}

/// Remove elements that never hold article text.
pub fn remove_boilerplate(html: &str) -> String {
    let patterns = [
        regex!(r"(?is)<script\b[^>]*>.*?</script>"),
        regex!(r"(?is)<style\b[^>]*>.*?</style>"),
        regex!(r"(?is)<nav\b[^>]*>.*?</nav>"),
        regex!(r"(?is)<header\b[^>]*>.*?</header>"),
        regex!(r"(?is)<footer\b[^>]*>.*?</footer>"),
        regex!(r"(?is)<aside\b[^>]*>.*?</aside>"),
        regex!(r"(?s)<!--.*?-->"),
    ];
    let mut cleaned = html.to_string();
    for re in patterns {
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }
    cleaned
}

/// Decode the handful of entities that show up in real pages.
pub fn decode_entities(text: &str) -> String {
    let numeric = regex!(r"&#(x[0-9a-fA-F]+|[0-9]+);");
    let text = numeric.replace_all(text, |caps: &regex::Captures| {
        let code = &caps[1];
        let parsed = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse().ok(),
        };
        parsed
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Strip every tag and collapse blank runs. Used as the last-resort extraction.
pub fn strip_html_tags(html: &str) -> String {
    let cleaned = remove_boilerplate(html);
    let text = regex!(r"<[^>]+>").replace_all(&cleaned, "\n");
    let text = decode_entities(&text);

    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    lines.join("\n")
}

/// Inline text of a fragment: tags removed, whitespace collapsed.
fn inline_text(fragment: &str) -> String {
    let text = regex!(r"<[^>]+>").replace_all(fragment, " ");
    let text = decode_entities(&text);
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Page title from `<title>`, else the first `<h1>`.
pub fn extract_title(html: &str) -> String {
    let title = regex!(r"(?is)<title\b[^>]*>(.*?)</title>")
        .captures(html)
        .map(|c| inline_text(&c[1]))
        .filter(|t| !t.is_empty());
    title
        .or_else(|| {
            regex!(r"(?is)<h1\b[^>]*>(.*?)</h1>")
                .captures(html)
                .map(|c| inline_text(&c[1]))
        })
        .unwrap_or_default()
}

/// The region most likely to hold the article: `<article>`, `<main>`, a content div, `<body>`.
fn content_area(html: &str) -> Option<&str> {
    let containers = [
        regex!(r"(?is)<article\b[^>]*>(.*)</article>"),
        regex!(r"(?is)<main\b[^>]*>(.*)</main>"),
        regex!(r#"(?is)<div\b[^>]*\b(?:class|id)\s*=\s*["']content["'][^>]*>(.*)"#),
        regex!(r"(?is)<body\b[^>]*>(.*)</body>"),
    ];
    containers
        .iter()
        .find_map(|re| re.captures(html).and_then(|c| c.get(1)))
        .map(|m| m.as_str())
}

/// Non-empty `<p>` texts of the main content area joined by blank lines.
pub fn extract_paragraphs(html: &str) -> String {
    let cleaned = remove_boilerplate(html);
    let Some(area) = content_area(&cleaned) else {
        return String::new();
    };
    let paragraphs: Vec<String> = regex!(r"(?is)<p\b[^>]*>(.*?)</p>")
        .captures_iter(area)
        .map(|c| inline_text(&c[1]))
        .filter(|p| !p.is_empty())
        .collect();
    paragraphs.join("\n\n")
}

/// Readable text of a page, preferring article paragraphs over the full tag strip.
pub fn extract_text(html: &str, min_chars: usize) -> (String, ExtractionMethod) {
    let article = extract_paragraphs(html);
    if article.trim().chars().count() >= min_chars {
        return (article, ExtractionMethod::Article);
    }
    (strip_html_tags(html), ExtractionMethod::Fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title>Qubits &amp; Gates</title>
<style>p { color: red }</style></head>
<body>
<nav><p>Home | About</p></nav>
<header><h1>Site name</h1></header>
<article>
  <h1>Understanding qubits</h1>
  <p>A <b>qubit</b> is the basic unit of quantum information.</p>
  <p></p>
  <p>Unlike a classical bit it can exist in a superposition of states.</p>
</article>
<script>var p = "<p>tracking</p>";</script>
<footer><p>Copyright</p></footer>
</body></html>"#;

    #[test]
    fn test_extract_title() {
        assert_eq!(extract_title(PAGE), "Qubits & Gates");
        assert_eq!(
            extract_title("<body><h1>Only <em>heading</em></h1></body>"),
            "Only heading"
        );
        assert_eq!(extract_title("<p>nothing</p>"), "");
    }

    #[test]
    fn test_extract_paragraphs_skips_boilerplate() {
        let text = extract_paragraphs(PAGE);
        assert_eq!(
            text,
            "A qubit is the basic unit of quantum information.\n\n\
             Unlike a classical bit it can exist in a superposition of states."
        );
        assert!(!text.contains("Home"));
        assert!(!text.contains("tracking"));
        assert!(!text.contains("Copyright"));
    }

    #[test]
    fn test_extract_text_falls_back_without_paragraphs() {
        let html = "<html><body><div>Plain text that lives outside of any paragraph \
                    element but is long enough to keep.</div></body></html>";
        let (text, method) = extract_text(html, 50);
        assert_eq!(method, ExtractionMethod::Fallback);
        assert!(text.starts_with("Plain text"));

        let (_, method) = extract_text(PAGE, 50);
        assert_eq!(method, ExtractionMethod::Article);
    }

    #[test]
    fn test_strip_html_tags() {
        let text = strip_html_tags("<div><p>One</p>\n\n\n<p>Two &lt;3&gt;</p></div>");
        assert_eq!(text, "One\nTwo <3>");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a&#39;b &#x41; &amp;lt;"), "a'b A &lt;");
    }
}
