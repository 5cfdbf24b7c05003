//! Website content extraction for the website analysis pipeline.

use futures::StreamExt;

/// Maximum bytes to read from the response body (1 MB).
const MAX_BODY_BYTES: usize = 1_048_576;

/// Maximum bytes of extracted text sent to the model (50 KB).
const MAX_TEXT_BYTES: usize = 51_200;

/// Prepend a scheme when the URL has none.
///
/// Targets arrive as bare hostnames ("example.com") as often as full URLs;
/// the fetch needs a scheme either way.
pub fn normalize_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{url}")
    }
}

/// Fetch a page and reduce it to visible text.
///
/// Script and style content is dropped along with the rest of the markup by
/// the HTML-to-markdown conversion; the result is capped so a large page
/// cannot blow up the generation prompt.
pub async fn fetch_page_text(
    client: &reqwest::Client,
    url: &str,
) -> Result<String, reqwest::Error> {
    let response = client.get(url).send().await?;
    let response = response.error_for_status()?;

    let body_bytes = read_limited_body(response, MAX_BODY_BYTES).await?;
    let html = String::from_utf8_lossy(&body_bytes);
    let mut text = html_to_markdown_rs::convert(&html, None)
        .ok()
        .and_then(|result| result.content)
        .unwrap_or_else(|| html.into_owned());

    if text.len() > MAX_TEXT_BYTES {
        truncate_at_char_boundary(&mut text, MAX_TEXT_BYTES);
        text.push_str("\n\n[content truncated]");
    }

    Ok(text)
}

/// Read response body up to a byte limit.
async fn read_limited_body(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, reqwest::Error> {
    let mut stream = response.bytes_stream();
    let mut body = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let remaining = limit.saturating_sub(body.len());
        if remaining == 0 {
            break;
        }
        let take = chunk.len().min(remaining);
        body.extend_from_slice(&chunk[..take]);
    }

    Ok(body)
}

/// Truncate a string at a char boundary, in place.
fn truncate_at_char_boundary(s: &mut String, max_bytes: usize) {
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

// ============================================================================
// Tests
// ============================================================================
