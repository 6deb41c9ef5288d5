use anyhow::{Context, Result};
use scraper::{Html, Selector};
use url::Url;

/// Preview fields pulled from a recipe page.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

pub struct RecipeScraper {
    client: reqwest::Client,
}

impl RecipeScraper {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("haus/{} (recipe preview)", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(10))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    /// Whether `url` answers with a success status. Servers that reject
    /// `HEAD` get a second chance with `GET`.
    pub async fn url_exists(&self, url: &Url) -> bool {
        let head = self.client.head(url.clone()).send().await;
        if head.is_ok_and(|r| r.status().is_success()) {
            return true;
        }
        self.client
            .get(url.clone())
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }

    pub async fn fetch_metadata(&self, url: &Url) -> Result<PageMetadata> {
        let html = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Failed to fetch {url}"))?
            .error_for_status()
            .with_context(|| format!("Failed to fetch {url}"))?
            .text()
            .await
            .context("Failed to read page body")?;
        Ok(parse_metadata(&html, url))
    }
}

/// Parse a client-supplied recipe URL. Only `http` and `https` are accepted.
pub fn parse_recipe_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// Host name without a leading `www.`.
pub fn domain_of(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

fn first_attr(doc: &Html, selectors: &[&str], attr: &str) -> Option<String> {
    selectors.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        doc.select(&selector)
            .filter_map(|el| el.value().attr(attr))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(ToString::to_string)
    })
}

fn first_text(doc: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    doc.select(&selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|t| !t.is_empty())
}

/// Extract title, description and image, preferring Open Graph tags.
///
/// Relative image URLs are resolved against `base`.
pub fn parse_metadata(html: &str, base: &Url) -> PageMetadata {
    let doc = Html::parse_document(html);

    let title = first_attr(
        &doc,
        &[r#"meta[property="og:title"]"#, r#"meta[name="twitter:title"]"#],
        "content",
    )
    .or_else(|| first_text(&doc, "title"));

    let description = first_attr(
        &doc,
        &[
            r#"meta[property="og:description"]"#,
            r#"meta[name="description"]"#,
            r#"meta[name="twitter:description"]"#,
        ],
        "content",
    );

    let image = first_attr(
        &doc,
        &[
            r#"meta[property="og:image"]"#,
            r#"meta[name="twitter:image"]"#,
        ],
        "content",
    )
    .or_else(|| first_attr(&doc, &[r#"link[rel="image_src"]"#], "href"))
    .map(|src| base.join(&src).map_or(src, String::from));

    PageMetadata {
        title,
        description,
        image,
    }
}
