use std::collections::HashSet;

use uuid::Uuid;

use super::ShortcutEntry;

const ID_PREFIX: &str = "WebSearchShortcut";

/// A fresh id built from 64 bits of OS randomness.
///
/// v4 uuids fix six version/variant bits; folding the two halves together
/// leaves every output bit random.
pub fn generate_id() -> String {
    let (high, low) = Uuid::new_v4().as_u64_pair();
    format!("{ID_PREFIX}{}", high ^ low)
}

fn generate_id_avoiding(taken: &HashSet<String>) -> String {
    loop {
        let id = generate_id();
        if !taken.contains(&id) {
            return id;
        }
    }
}

pub(crate) fn is_blank_id(id: &str) -> bool {
    id.trim().is_empty()
}

/// Gives every blank or repeated id a fresh one, keeping the first holder of
/// each id. Returns how many entries were reassigned.
pub fn ensure_unique_ids(entries: &mut [ShortcutEntry]) -> usize {
    let mut taken: HashSet<String> = entries
        .iter()
        .filter(|entry| !is_blank_id(&entry.id))
        .map(|entry| entry.id.clone())
        .collect();
    let mut seen = HashSet::with_capacity(entries.len());
    let mut reassigned = 0;

    for entry in entries.iter_mut() {
        if is_blank_id(&entry.id) || seen.contains(&entry.id) {
            let id = generate_id_avoiding(&taken);
            taken.insert(id.clone());
            entry.id = id;
            reassigned += 1;
        }
        seen.insert(entry.id.clone());
    }

    reassigned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(id: &str, name: &str) -> ShortcutEntry {
        ShortcutEntry {
            id: id.to_string(),
            name: name.to_string(),
            ..ShortcutEntry::default()
        }
    }

    #[test]
    fn generated_ids_are_prefixed_and_distinct() {
        let ids: HashSet<String> = (0..256).map(|_| generate_id()).collect();
        assert_eq!(ids.len(), 256);
        assert!(ids.iter().all(|id| id.starts_with(ID_PREFIX)));
    }

    #[test]
    fn repairs_blank_and_duplicate_ids() {
        let mut entries = vec![
            named("a", "Google"),
            named("", "Bing"),
            named("a", "YouTube"),
            named("   ", "npm"),
        ];

        assert_eq!(ensure_unique_ids(&mut entries), 3);
        assert_eq!(entries[0].id, "a");

        let ids: HashSet<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), entries.len());
        assert!(entries.iter().all(|e| !is_blank_id(&e.id)));
    }

    #[test]
    fn unique_ids_are_left_alone() {
        let mut entries = vec![named("a", "Google"), named("b", "Google")];
        assert_eq!(ensure_unique_ids(&mut entries), 0);
        assert_eq!(entries[0].id, "a");
        assert_eq!(entries[1].id, "b");
    }
}
