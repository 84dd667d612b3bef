use url::form_urlencoded;

use super::Backend;

/// Public URL of a stored file, with the access token as a query parameter when
/// one is given. Empty tokens are treated as absent.
#[must_use]
pub fn file_link(host: &str, file_id: &str, access_token: Option<&str>) -> String {
    let host = host.trim_end_matches('/');
    match access_token.filter(|token| !token.is_empty()) {
        Some(token) => {
            let query = form_urlencoded::Serializer::new(String::new())
                .append_pair("access_token", token)
                .finish();
            format!("{host}/assets/{file_id}?{query}")
        }
        None => format!("{host}/assets/{file_id}"),
    }
}

impl Backend {
    #[must_use]
    pub fn file_link(&self, file_id: &str, access_token: Option<&str>) -> String {
        file_link(self.host(), file_id, access_token)
    }
}
