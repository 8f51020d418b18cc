//! URL ingestion: fetch with a browser-like user agent and boil the HTML
//! down to meta descriptions plus main-content text.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tracing::info;

use dealscope_core::errors::IngestionError;

pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const REGION_CHAR_LIMIT: usize = 2000;

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .timeout(FETCH_TIMEOUT)
        .build()
        .expect("reqwest client construction cannot fail with static options")
}

pub async fn fetch_url(client: &reqwest::Client, url: &str) -> Result<String, IngestionError> {
    let response = client.get(url).send().await.map_err(|error| {
        IngestionError::UnreachableUrl { url: url.to_string(), detail: error.to_string() }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(IngestionError::UnreachableUrl {
            url: url.to_string(),
            detail: format!("status {status}"),
        });
    }

    let body = response.text().await.map_err(|error| IngestionError::UnreachableUrl {
        url: url.to_string(),
        detail: error.to_string(),
    })?;

    info!(url, bytes = body.len(), "fetched url for ingestion");
    Ok(body)
}

fn meta_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?is)<meta\s+[^>]*(?:name|property)\s*=\s*["'](?:description|og:description|og:title)["'][^>]*content\s*=\s*["']([^"']*)["']"#,
        )
        .expect("meta regex")
    })
}

fn meta_reversed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?is)<meta\s+[^>]*content\s*=\s*["']([^"']*)["'][^>]*(?:name|property)\s*=\s*["'](?:description|og:description|og:title)["']"#,
        )
        .expect("reversed meta regex")
    })
}

fn dead_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style|noscript)\b.*?</(script|style|noscript)>")
            .expect("dead block regex")
    })
}

fn main_region_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(main|article)\b[^>]*>(.*?)</(main|article)>").expect("main regex")
    })
}

fn content_div_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<div\b[^>]*class\s*=\s*["'][^"']*(?:content|main|article)[^"']*["'][^>]*>(.*?)</div>"#)
            .expect("content div regex")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]+>").expect("tag regex"))
}

/// Reduce an HTML document to ingestion text: meta description / OpenGraph
/// fields first, then the text of the main content region, each truncated
/// to 2000 characters.
pub fn extract_page_text(html: &str) -> String {
    let without_dead_blocks = dead_block_re().replace_all(html, " ");

    let mut meta_values = Vec::new();
    for captures in meta_re().captures_iter(&without_dead_blocks) {
        meta_values.push(captures[1].trim().to_string());
    }
    for captures in meta_reversed_re().captures_iter(&without_dead_blocks) {
        meta_values.push(captures[1].trim().to_string());
    }
    meta_values.retain(|value| !value.is_empty());
    meta_values.dedup();

    let region = main_region_re()
        .captures(&without_dead_blocks)
        .map(|captures| captures[2].to_string())
        .or_else(|| {
            content_div_re()
                .captures(&without_dead_blocks)
                .map(|captures| captures[1].to_string())
        })
        .unwrap_or_else(|| without_dead_blocks.to_string());

    let body_text = collapse_whitespace(&decode_entities(&tag_re().replace_all(&region, " ")));

    let mut parts = Vec::new();
    let meta_text = meta_values.join("\n");
    if !meta_text.is_empty() {
        parts.push(truncate_chars(&meta_text, REGION_CHAR_LIMIT));
    }
    if !body_text.is_empty() {
        parts.push(truncate_chars(&body_text, REGION_CHAR_LIMIT));
    }

    parts.join("\n\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::extract_page_text;

    const PAGE: &str = r#"<!doctype html>
<html>
<head>
  <title>Gridline</title>
  <meta name="description" content="Routing software for regional freight.">
  <meta property="og:title" content="Gridline - full trucks only">
  <script>window.analytics = { "track": true };</script>
  <style>body { color: red; }</style>
</head>
<body>
  <noscript>Please enable JavaScript</noscript>
  <nav>Home | About</nav>
  <main>
    <h1>Gridline</h1>
    <p>We match freight loads to &amp; from regional carriers.</p>
    <p>Currently moving 1,400 loads a month.</p>
  </main>
  <footer>© Gridline</footer>
</body>
</html>"#;

    #[test]
    fn meta_fields_and_main_text_are_extracted() {
        let text = extract_page_text(PAGE);
        assert!(text.contains("Routing software for regional freight."));
        assert!(text.contains("Gridline - full trucks only"));
        assert!(text.contains("We match freight loads to & from regional carriers."));
        assert!(text.contains("1,400 loads a month"));
    }

    #[test]
    fn scripts_styles_and_noscript_are_stripped() {
        let text = extract_page_text(PAGE);
        assert!(!text.contains("analytics"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("enable JavaScript"));
    }

    #[test]
    fn chrome_outside_main_is_ignored_when_main_exists() {
        let text = extract_page_text(PAGE);
        assert!(!text.contains("Home | About"));
    }

    #[test]
    fn content_class_divs_are_used_without_main() {
        let html = r#"<body><div class="page-content">Inside the region</div>
                      <div class="sidebar">Outside</div></body>"#;
        let text = extract_page_text(html);
        assert!(text.contains("Inside the region"));
        assert!(!text.contains("Outside"));
    }

    #[test]
    fn whole_body_is_used_as_last_resort() {
        let text = extract_page_text("<p>bare paragraph soup</p>");
        assert_eq!(text, "bare paragraph soup");
    }

    #[test]
    fn regions_are_truncated_to_two_thousand_chars() {
        let long_body = format!("<main>{}</main>", "x".repeat(6000));
        let text = extract_page_text(&long_body);
        assert_eq!(text.chars().count(), 2000);
    }

    #[test]
    fn empty_documents_produce_empty_text() {
        assert_eq!(extract_page_text(""), "");
        assert_eq!(extract_page_text("<script>only()</script>"), "");
    }
}
