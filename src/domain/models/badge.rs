use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use url::form_urlencoded;

/// Characters escaped inside a single path segment of the badge URL.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b':')
    .remove(b'=')
    .remove(b'@');

/// A status badge rendered by an external badge service.
///
/// `subject` and `status` form the two halves of the image; the remaining
/// fields are styling hints forwarded as query parameters when non-empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Badge {
    pub subject: String,
    pub status: String,
    pub color: String,
    pub label: String,
    pub list: String,
    pub icon: String,
}

impl Badge {
    /// Builds `<service>/badge/<subject>/<status>?<styling>` against the given service base URL.
    pub fn url(&self, service_url: &str) -> String {
        let mut url = format!(
            "{}/badge/{}/{}",
            service_url.trim_end_matches('/'),
            utf8_percent_encode(&self.subject, PATH_SEGMENT),
            utf8_percent_encode(&self.status, PATH_SEGMENT),
        );

        // keys in sorted order
        let styling = [
            ("color", &self.color),
            ("icon", &self.icon),
            ("label", &self.label),
            ("list", &self.list),
        ];
        let mut query = form_urlencoded::Serializer::new(String::new());
        let mut has_query = false;
        for (key, value) in styling {
            if !value.is_empty() {
                query.append_pair(key, value);
                has_query = true;
            }
        }
        if has_query {
            url.push('?');
            url.push_str(&query.finish());
        }

        url
    }
}
