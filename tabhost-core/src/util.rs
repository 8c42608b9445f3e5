use url::form_urlencoded;
use url::Url;

/// URL-safe base64 of U+200E (left-to-right mark), which the search page
/// treats as an empty query.
const BLANK_QUERY: &str = "4oCO";

/// Route of the internal search page shown in a fresh tab.
pub fn placeholder_route(token: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("id", "none")
        .append_pair("url", BLANK_QUERY)
        .append_pair("verify", token)
        .finish();
    format!("search?{}", query)
}

/// Conventional `/favicon.ico` location for a web page, used when the page
/// does not declare an icon. Non-web URLs have none.
pub fn default_favicon_url(page_url: &str) -> Option<String> {
    let parsed = Url::parse(page_url).ok()?;
    match parsed.scheme() {
        "http" | "https" => parsed.join("/favicon.ico").ok().map(|u| u.to_string()),
        _ => None,
    }
}
