//! Image inlining: rewrites remote image references in HTML and, for the
//! raw-message transport, fetches them into content-addressed parts.
//!
//! Everything here is best effort. A URL that cannot be fetched or probed is
//! left exactly as it was; image handling never fails a send.

use regex::Regex;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

use crate::message::InlinePart;

/// Extensions treated as images without a network probe.
const IMAGE_EXTENSIONS: &str =
    "png|jpg|jpeg|gif|webp|svg|avif|bmp|ico|tif|tiff|jfif|pjpeg|pjp|apng";

const IMG_STYLE: &str =
    "max-width:100%; height:auto; border-radius:8px; margin:12px 0; display:block;";

fn anchor_image_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r#"(?i)<a\b[^>]*?href=["'](https?://[^"'>]+\.(?:{IMAGE_EXTENSIONS})(?:\?[^"'>]*)?)["'][^>]*>.*?</a>"#
        ))
        .expect("valid anchor image regex")
    })
}

fn bare_image_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r#"(?i)(^|\s)(?:Image\s*)?["']?(https?://[^\s"'<>]+\.(?:{IMAGE_EXTENSIONS}))(\?[^\s"'<>]*)?["']?"#
        ))
        .expect("valid bare image url regex")
    })
}

fn img_src_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<img\b[^>]*?src=["']([^"']+)["']"#).expect("valid img src regex")
    })
}

fn anchor_href_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<a\b[^>]*?href=["'](https?://[^"'>]+)["'][^>]*>.*?</a>"#)
            .expect("valid anchor href regex")
    })
}

fn generic_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s"'<>\)]+"#).expect("valid generic url regex"))
}

fn img_tag(src: &str) -> String {
    format!(r#"<img src="{src}" alt="Image" style="{IMG_STYLE}"/>"#)
}

/// Normalize known redirect-style image hosts to their direct-image form.
///
/// Gyazo page URLs (`gyazo.com/<id>`) point at an HTML landing page; the
/// actual bytes live on the `i.gyazo.com` CDN.
pub fn normalize_image_host(raw: &str) -> String {
    let Ok(parsed) = Url::parse(raw) else {
        return raw.to_string();
    };
    let Some(host) = parsed.host_str() else {
        return raw.to_string();
    };
    if host.contains("gyazo.com") && !host.starts_with("i.") {
        if let Some(id) = parsed.path_segments().and_then(|mut s| s.next()) {
            if !id.is_empty() {
                return format!("https://i.gyazo.com/{id}.png");
            }
        }
    }
    raw.to_string()
}

/// Rewrite anchor-wrapped and bare image URLs into `<img>` tags.
///
/// Pure text transformation; idempotent on already-rewritten HTML because a
/// URL sitting inside `src="…"` matches neither pattern again.
pub fn rewrite_images(html: &str) -> String {
    let html = anchor_image_regex().replace_all(html, |caps: &regex::Captures| {
        img_tag(&normalize_image_host(&caps[1]))
    });
    bare_image_url_regex()
        .replace_all(&html, |caps: &regex::Captures| {
            format!("{}{}", &caps[1], img_tag(&normalize_image_host(&caps[2])))
        })
        .into_owned()
}

/// Probe a URL's `Content-Type` with a `HEAD` request, falling back to `GET`.
/// Returns `None` on any failure.
async fn probe_content_type(client: &Client, url: &str) -> Option<String> {
    for builder in [client.head(url), client.get(url)] {
        if let Ok(response) = builder.send().await {
            if let Some(ct) = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
            {
                if !ct.is_empty() {
                    return Some(ct.to_string());
                }
            }
        }
    }
    None
}

fn is_image_type(content_type: &Option<String>) -> bool {
    content_type
        .as_deref()
        .map(|ct| ct.starts_with("image/"))
        .unwrap_or(false)
}

fn used_as_img_src(html: &str, url: &str) -> bool {
    html.contains(&format!("src=\"{url}")) || html.contains(&format!("src='{url}"))
}

/// Rewrite remaining bare URLs and non-extension anchor hrefs into `<img>`
/// tags when a network probe says they serve `image/*` content.
pub async fn rewrite_by_content_type(client: &Client, html: &str) -> String {
    let mut result = html.to_string();

    // Anchors first: the whole <a>…</a> collapses into an <img>.
    let anchor_hrefs: Vec<String> = anchor_href_regex()
        .captures_iter(html)
        .map(|c| c[1].to_string())
        .collect();
    for href in anchor_hrefs {
        let normalized = normalize_image_host(&href);
        if !is_image_type(&probe_content_type(client, &normalized).await) {
            continue;
        }
        let anchor_pattern = format!(
            r#"(?i)<a[^>]*?href=["']{}["'][^>]*>.*?</a>"#,
            regex::escape(&href)
        );
        if let Ok(re) = Regex::new(&anchor_pattern) {
            result = re.replace_all(&result, img_tag(&normalized)).into_owned();
        }
    }

    // Then any bare URL not already serving as an img src.
    let mut seen = HashSet::new();
    let urls: Vec<String> = generic_url_regex()
        .find_iter(html)
        .map(|m| m.as_str().to_string())
        .filter(|url| seen.insert(url.clone()))
        .collect();
    for url in urls {
        if used_as_img_src(&result, &url) {
            continue;
        }
        let normalized = normalize_image_host(&url);
        if !is_image_type(&probe_content_type(client, &normalized).await) {
            continue;
        }
        result = result.replace(&url, &img_tag(&normalized));
    }

    result
}

/// Fetch every remote `<img>` source, rewrite it to a `cid:` reference, and
/// collect the bytes as inline parts for the raw-message encoder.
///
/// Failed fetches leave the original URL in place.
pub async fn fetch_inline_parts(client: &Client, html: &str) -> (String, Vec<InlinePart>) {
    // Repeated sources are fetched once; the cid substitution below already
    // rewrites every occurrence.
    let mut seen = HashSet::new();
    let urls: Vec<String> = img_src_regex()
        .captures_iter(html)
        .map(|c| c[1].to_string())
        .filter(|src| src.starts_with("http://") || src.starts_with("https://"))
        .filter(|src| seen.insert(src.clone()))
        .collect();

    let mut result = html.to_string();
    let mut parts = Vec::new();

    for url in urls {
        let normalized = normalize_image_host(&url);
        let response = match client.get(&normalized).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::debug!(url = %normalized, status = %r.status(), "skipping inline image");
                continue;
            }
            Err(err) => {
                tracing::debug!(url = %normalized, error = %err, "skipping inline image");
                continue;
            }
        };

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| infer_content_type(&normalized));

        let Ok(data) = response.bytes().await else {
            continue;
        };

        let content_id = format!("img-{}@mailblast", uuid::Uuid::new_v4().simple());
        let cid_ref = format!("cid:{content_id}");
        result = result.replace(&url, &cid_ref).replace(&normalized, &cid_ref);
        parts.push(InlinePart {
            data: data.to_vec(),
            content_type,
            content_id,
            filename: filename_from_url(&normalized),
        });
    }

    (result, parts)
}

/// Infer a content type from the URL's filename extension.
pub fn infer_content_type(url: &str) -> String {
    mime_guess::from_path(filename_from_url(url))
        .first_or_octet_stream()
        .to_string()
}

/// Last path segment of a URL, without the query string.
pub fn filename_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|s| s.last().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "image".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_url_becomes_img_tag() {
        let out = rewrite_images("See https://example.com/photo.jpg today");
        assert!(out.contains(r#"<img src="https://example.com/photo.jpg""#));
        assert!(!out.contains(">https://example.com/photo.jpg<"));
    }

    #[test]
    fn anchor_wrapped_image_url_becomes_img_tag() {
        let html = r#"<a href="https://example.com/pic.png">click</a>"#;
        let out = rewrite_images(html);
        assert_eq!(
            out,
            img_tag("https://example.com/pic.png"),
            "anchor should collapse into an img tag"
        );
    }

    #[test]
    fn anchor_with_query_string_is_recognized() {
        let html = r#"<a href="https://example.com/pic.png?w=200">pic</a>"#;
        let out = rewrite_images(html);
        assert!(out.starts_with("<img "));
        assert!(out.contains("https://example.com/pic.png?w=200"));
    }

    #[test]
    fn gyazo_page_url_is_normalized_to_cdn() {
        assert_eq!(
            normalize_image_host("https://gyazo.com/abc123"),
            "https://i.gyazo.com/abc123.png"
        );
        // Direct CDN URLs pass through.
        assert_eq!(
            normalize_image_host("https://i.gyazo.com/abc123.png"),
            "https://i.gyazo.com/abc123.png"
        );
        assert_eq!(
            normalize_image_host("not a url"),
            "not a url"
        );
    }

    #[test]
    fn rewriting_is_idempotent() {
        let once = rewrite_images("Look: https://example.com/a.gif");
        let twice = rewrite_images(&once);
        assert_eq!(once, twice);
        assert_eq!(once.matches("<img").count(), 1);
    }

    #[test]
    fn non_image_urls_are_untouched() {
        let html = "Visit https://example.com/page and https://example.com/doc.pdf";
        assert_eq!(rewrite_images(html), html);
    }

    #[test]
    fn existing_img_tags_are_untouched() {
        let html = r#"<img src="https://example.com/a.png" alt="a"/>"#;
        assert_eq!(rewrite_images(html), html);
    }

    #[test]
    fn filename_and_content_type_from_url() {
        assert_eq!(
            filename_from_url("https://example.com/a/b/photo.jpg?x=1"),
            "photo.jpg"
        );
        assert_eq!(filename_from_url("https://example.com/"), "image");
        assert_eq!(infer_content_type("https://example.com/p.png"), "image/png");
        assert_eq!(
            infer_content_type("https://example.com/p.svg"),
            "image/svg+xml"
        );
        assert_eq!(
            infer_content_type("https://example.com/p.mystery"),
            "application/octet-stream"
        );
    }
}
