//! Summarizing web pages

use ai_chatter_core::utils::{collapse_blank_lines, truncate};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Node};
use std::time::Duration;
use tracing::{debug, info};

use crate::application::{Application, Program};
use crate::error::{AppError, AppResult};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 ai-chatter";
const MAX_REDIRECTS: usize = 5;
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Page text beyond this many bytes is cut before it is sent
pub const DEFAULT_MAX_CHARS: usize = 12_000;

/// Elements whose content never reaches the model
const REMOVED_TAGS: [&str; 8] = [
    "script", "style", "header", "footer", "nav", "input", "textarea", "img",
];

const BLOCK_TAGS: [&str; 14] = [
    "p", "div", "section", "article", "main", "aside", "blockquote", "table", "tr", "ul", "ol",
    "dl", "form", "figure",
];

/// Validate URL
fn validate_url(url: &str) -> Result<(), String> {
    let parsed = reqwest::Url::parse(url).map_err(|e| format!("Invalid URL: {}", e))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(format!("Only http/https allowed, got '{}'", scheme)),
    }
}

/// Reduce an HTML document to light Markdown
///
/// Only `<main>` is kept when the page has one. Scripts, styles, page chrome,
/// form fields and images are dropped and `<code>` is unwrapped.
pub fn html_to_markdown(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let start = root
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == "main")
        .unwrap_or(root);

    let mut out = String::new();
    render_children(start, &mut out, false);

    let trimmed: Vec<&str> = out.lines().map(str::trim).collect();
    collapse_blank_lines(&trimmed.join("\n"))
}

fn render_children(element: ElementRef<'_>, out: &mut String, preformatted: bool) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                if preformatted {
                    out.push_str(text);
                } else {
                    push_text(out, text);
                }
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    render_element(child, out, preformatted);
                }
            }
            _ => {}
        }
    }
}

fn render_element(element: ElementRef<'_>, out: &mut String, preformatted: bool) {
    let name = element.value().name();
    if REMOVED_TAGS.contains(&name) {
        return;
    }

    match name {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "title" => {
            let level = name[1..].parse::<usize>().unwrap_or(1);
            let text = inline_text(element);
            if !text.is_empty() {
                out.push_str(&format!("\n\n{} {}\n\n", "#".repeat(level), text));
            }
        }
        "li" => {
            out.push_str("\n- ");
            render_children(element, out, preformatted);
        }
        "br" => out.push('\n'),
        "hr" => out.push_str("\n\n---\n\n"),
        "pre" => {
            out.push_str("\n\n```\n");
            render_children(element, out, true);
            out.push_str("\n```\n\n");
        }
        "a" => {
            let text = inline_text(element);
            match element.value().attr("href") {
                Some(href) if !text.is_empty() && !href.starts_with('#') => {
                    out.push_str(&format!("[{}]({})", text, href));
                }
                _ => out.push_str(&text),
            }
        }
        tag if BLOCK_TAGS.contains(&tag) => {
            out.push_str("\n\n");
            render_children(element, out, preformatted);
            out.push_str("\n\n");
        }
        // Inline elements, `code` included, are unwrapped
        _ => render_children(element, out, preformatted),
    }
}

fn inline_text(element: ElementRef<'_>) -> String {
    let mut text = String::new();
    render_children(element, &mut text, false);
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Append text with runs of whitespace squeezed to one space
fn push_text(out: &mut String, text: &str) {
    let needs_space = |out: &String| !out.is_empty() && !out.ends_with(char::is_whitespace);

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        if !text.is_empty() && needs_space(out) {
            out.push(' ');
        }
        return;
    }
    if text.starts_with(char::is_whitespace) && needs_space(out) {
        out.push(' ');
    }
    out.push_str(&words.join(" "));
    if text.ends_with(char::is_whitespace) {
        out.push(' ');
    }
}

/// Fetch a page and ask the model for a summary of its text
///
/// Pages are read as served; scripts are not executed.
pub struct SummarizePage {
    url: String,
    max_chars: usize,
    client: Client,
}

impl SummarizePage {
    pub fn new(url: impl Into<String>) -> AppResult<Self> {
        Self::with_max_chars(url, DEFAULT_MAX_CHARS)
    }

    pub fn with_max_chars(url: impl Into<String>, max_chars: usize) -> AppResult<Self> {
        let url = url.into();
        validate_url(&url).map_err(AppError::Fetch)?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| AppError::Fetch(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url,
            max_chars,
            client,
        })
    }

    async fn fetch(&self) -> AppResult<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AppError::Fetch(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Fetch(format!("HTTP {} for {}", status, self.url)));
        }
        debug!("Fetched {} (final URL {})", self.url, response.url());

        response
            .text()
            .await
            .map_err(|e| AppError::Fetch(format!("Failed to read response: {}", e)))
    }

    fn summary_prompt(&self, markdown: &str) -> String {
        format!(
            "Summarize the following web page. Focus on its main points.\n\nURL: {}\n\n{}",
            self.url, markdown
        )
    }
}

#[async_trait]
impl Program for SummarizePage {
    fn name(&self) -> &'static str {
        "SummarizePage"
    }

    async fn run(&mut self, app: &mut Application) -> AppResult<()> {
        let html = self.fetch().await?;
        let markdown = html_to_markdown(&html);
        if markdown.is_empty() {
            return Err(AppError::Fetch(format!(
                "No readable content at {}",
                self.url
            )));
        }
        info!(
            "Extracted {} bytes of text from {}",
            markdown.len(),
            self.url
        );

        let markdown = truncate(&markdown, self.max_chars);
        let response = app.complete(&self.summary_prompt(&markdown)).await?;
        app.communicator().show_response(&response)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{test_settings, StubProvider};
    use crate::communicator::testing::ScriptedCommunicator;
    use tempfile::TempDir;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head><title>Ignored</title><style>p { color: red; }</style></head>
  <body>
    <nav>Home | About</nav>
    <main>
      <h1>Rust   news</h1>
      <p>Version <code>1.80</code> is out.</p>


      <script>alert("hi")</script>
      <ul>
        <li>Faster builds</li>
        <li>See <a href="https://blog.rust-lang.org">the blog</a></li>
      </ul>
      <img src="x.png" alt="picture">
      <footer>Copyright</footer>
    </main>
  </body>
</html>"#;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com").is_ok());
        assert!(validate_url("http://example.com/a?b=c").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("not a url").is_err());
    }

    #[test]
    fn test_html_to_markdown_keeps_main() {
        assert_eq!(
            html_to_markdown(PAGE),
            "# Rust news\n\nVersion 1.80 is out.\n\n- Faster builds\n- See [the blog](https://blog.rust-lang.org)"
        );
    }

    #[test]
    fn test_html_to_markdown_without_main() {
        let html = "<html><body><header>Logo</header><div>First</div>\
                    <div>Second<br>line</div><textarea>typed</textarea>\
                    <pre>  indented\n    code</pre></body></html>";
        assert_eq!(
            html_to_markdown(html),
            "First\n\nSecond\nline\n\n```\nindented\ncode\n```"
        );
    }

    #[test]
    fn test_rejects_non_http_urls() {
        assert!(matches!(
            SummarizePage::new("file:///etc/passwd"),
            Err(AppError::Fetch(_))
        ));
    }

    #[tokio::test]
    async fn test_summarize_sends_page_text() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/article")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(PAGE)
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let provider = StubProvider::default();
        let communicator = ScriptedCommunicator::default();
        let mut app = Application::new(test_settings(temp_dir.path(), false))
            .unwrap()
            .with_provider(provider.clone())
            .with_communicator(communicator.clone());

        let mut program = SummarizePage::new(format!("{}/article", server.url())).unwrap();
        app.start(&mut program).await.unwrap();

        let requests = provider.requests();
        let prompt = &requests[0].1.last().unwrap().content;
        assert!(prompt.starts_with("Summarize the following web page"));
        assert!(prompt.contains("Version 1.80 is out."));
        assert!(!prompt.contains("alert"));
        assert!(!prompt.contains("Home | About"));
        assert_eq!(communicator.responses(), vec!["reply 1"]);
    }

    #[tokio::test]
    async fn test_summarize_reports_http_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let provider = StubProvider::default();
        let mut app = Application::new(test_settings(temp_dir.path(), false))
            .unwrap()
            .with_provider(provider.clone())
            .with_communicator(ScriptedCommunicator::default());

        let mut program = SummarizePage::new(format!("{}/missing", server.url())).unwrap();
        let err = app.start(&mut program).await.unwrap_err();
        assert!(matches!(err, AppError::Fetch(msg) if msg.contains("404")));
        assert!(provider.requests().is_empty());
    }
}
