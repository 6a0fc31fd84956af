//! Shortcut records and the registry that owns them.

pub mod entry;
pub mod ids;
pub mod registry;

pub use entry::ShortcutEntry;
pub use ids::{ensure_unique_ids, generate_id};
pub use registry::ShortcutRegistry;

/// Shortcuts a fresh shortcut file is seeded with.
pub fn default_shortcuts() -> Vec<ShortcutEntry> {
    vec![
        ShortcutEntry {
            name: "Google".to_string(),
            url: "https://www.google.com/search?q=%s".to_string(),
            suggestion_provider: Some("Google".to_string()),
            ..ShortcutEntry::default()
        },
        ShortcutEntry {
            name: "Bing".to_string(),
            url: "https://www.bing.com/search?q=%s".to_string(),
            suggestion_provider: Some("Bing".to_string()),
            ..ShortcutEntry::default()
        },
        ShortcutEntry {
            name: "Youtube".to_string(),
            url: "https://www.youtube.com/results?search_query=%s".to_string(),
            suggestion_provider: Some("YouTube".to_string()),
            ..ShortcutEntry::default()
        },
    ]
}
