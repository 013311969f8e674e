//! Shared constants used across the application.

/// User agent sent with every listing and detail request.
///
/// The site serves its login placeholder to obvious bots much sooner than to
/// browsers, so this mirrors a desktop browser.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Exact `<title>` of the page served instead of content once the session
/// or IP has lost access.
pub const LOGIN_PLACEHOLDER_TITLE: &str = "豆瓣";

/// Default scheme and host of the listing site.
pub const DEFAULT_SITE_BASE_URL: &str = "https://www.douban.com";
