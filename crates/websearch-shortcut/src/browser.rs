//! Resolves which browser opens a shortcut and with what arguments.
//!
//! Browser discovery itself lives outside this crate behind
//! [`BrowserCatalog`].

use crate::shortcut::ShortcutEntry;

/// Placeholder in an argument pattern replaced by the target url.
pub const URL_PLACEHOLDER: &str = "%1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserInfo {
    pub name: String,
    pub path: String,
    pub arguments_pattern: String,
}

pub trait BrowserCatalog {
    fn default_browser(&self) -> Option<BrowserInfo>;
    fn installed_browsers(&self) -> Vec<BrowserInfo>;
}

/// Executable and argument pattern for launching one shortcut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserExecutionInfo {
    pub path: Option<String>,
    pub arguments_pattern: String,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

impl BrowserExecutionInfo {
    pub fn resolve(entry: &ShortcutEntry, catalog: &dyn BrowserCatalog) -> Self {
        let browser_path = non_blank(entry.browser_path.as_deref());
        let default_browser = catalog.default_browser();

        let path = match browser_path {
            Some(path) => Some(path.to_string()),
            None => default_browser.as_ref().map(|b| b.path.clone()),
        };

        let args = match (non_blank(entry.browser_args.as_deref()), browser_path) {
            (Some(args), _) => Some(args.trim().to_string()),
            (None, None) => default_browser.map(|b| b.arguments_pattern.trim().to_string()),
            (None, Some(path)) => catalog
                .installed_browsers()
                .into_iter()
                .find(|b| b.path.eq_ignore_ascii_case(path))
                .map(|b| b.arguments_pattern.trim().to_string()),
        }
        .unwrap_or_default();

        let arguments_pattern = if args.contains(URL_PLACEHOLDER) {
            args
        } else if args.is_empty() {
            URL_PLACEHOLDER.to_string()
        } else {
            format!("{args} {URL_PLACEHOLDER}")
        };

        Self {
            path,
            arguments_pattern,
        }
    }

    pub fn arguments_for(&self, url: &str) -> String {
        self.arguments_pattern.replace(URL_PLACEHOLDER, url)
    }
}
