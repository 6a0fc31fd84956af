use serde::{Deserialize, Serialize};

/// Placeholder in [`ShortcutEntry::url`] replaced by the encoded query.
pub const QUERY_PLACEHOLDER: &str = "%s";

/// One user-defined search shortcut.
///
/// `id` is assigned by the registry and never changes afterwards; `name` is
/// free-form and may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShortcutEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(
        default,
        rename = "ReplaceWhitespace",
        skip_serializing_if = "Option::is_none"
    )]
    pub whitespace_replacement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_args: Option<String>,
}

impl ShortcutEntry {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    /// Encodes `query` for substitution into the url template.
    ///
    /// Spaces become `+` unless `whitespace_replacement` asks otherwise:
    /// `"%20"` keeps percent encoding, any other non-blank value replaces
    /// spaces before encoding.
    pub fn encode_query(&self, query: &str) -> String {
        match self.whitespace_replacement.as_deref() {
            None => form_encode(query),
            Some(replacement) if replacement.trim().is_empty() => form_encode(query),
            Some("%20") => form_encode(query).replace('+', "%20"),
            Some(replacement) => form_encode(&query.replace(' ', replacement)),
        }
    }

    pub fn search_url(&self, query: &str) -> String {
        self.url.replace(QUERY_PLACEHOLDER, &self.encode_query(query))
    }

    /// Scheme and authority of the url template, e.g. `https://www.bing.com`.
    pub fn domain(&self) -> Option<String> {
        let base = self.url.split(' ').next().unwrap_or_default();
        let base = base.split('?').next().unwrap_or_default();
        let (scheme, rest) = base.split_once("://")?;
        let scheme_ok = scheme
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !scheme_ok {
            return None;
        }
        let authority = rest.split(['/', '#']).next().unwrap_or_default();
        if authority.is_empty() {
            return None;
        }
        Some(format!(
            "{}://{}",
            scheme.to_ascii_lowercase(),
            authority.to_ascii_lowercase()
        ))
    }

    pub fn home_page_url(&self) -> Option<String> {
        match self.home_page.as_deref() {
            Some(home) if !home.trim().is_empty() => Some(home.to_string()),
            _ => self.domain(),
        }
    }
}

/// Form encoding with `! * ( )` left bare and `~` escaped, the set browsers
/// and search engines expect in a query string.
fn form_encode(value: &str) -> String {
    let encoded = urlencoding::encode(value);
    let mut out = String::with_capacity(encoded.len());
    let mut rest: &str = &encoded;
    while let Some(c) = rest.chars().next() {
        let (piece, len) = match c {
            '%' => match rest.get(..3) {
                Some("%20") => ("+", 3),
                Some("%21") => ("!", 3),
                Some("%2A") => ("*", 3),
                Some("%28") => ("(", 3),
                Some("%29") => (")", 3),
                Some(escape) => (escape, 3),
                None => (rest, rest.len()),
            },
            '~' => ("%7E", 1),
            _ => (&rest[..c.len_utf8()], c.len_utf8()),
        };
        out.push_str(piece);
        rest = &rest[len..];
    }
    out
}
