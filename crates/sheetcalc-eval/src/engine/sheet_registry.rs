use rustc_hash::FxHashMap;
use sheetcalc_common::SheetId;

/// Sheet names and ids. Lookups ignore case; ids are never reused, so a
/// removed sheet leaves a tombstone.
#[derive(Default, Debug)]
pub struct SheetRegistry {
    id_by_name: FxHashMap<String, SheetId>,
    name_by_id: Vec<Option<String>>,
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

/// Sheet names may not be empty or contain `! [ ] * ? / \ :`.
pub fn is_valid_sheet_name(name: &str) -> bool {
    !name.trim().is_empty()
        && !name.contains(['!', '[', ']', '*', '?', '/', '\\', ':'])
        && !name.starts_with('\'')
        && !name.ends_with('\'')
}

impl SheetRegistry {
    pub fn new() -> Self {
        SheetRegistry::default()
    }

    /// Register `name`, or `None` if a live sheet already has it.
    pub fn add(&mut self, name: &str) -> Option<SheetId> {
        if self.id_by_name.contains_key(&key(name)) {
            return None;
        }
        let id = self.name_by_id.len() as SheetId;
        self.name_by_id.push(Some(name.to_string()));
        self.id_by_name.insert(key(name), id);
        Some(id)
    }

    pub fn get_id(&self, name: &str) -> Option<SheetId> {
        self.id_by_name.get(&key(name)).copied()
    }

    pub fn name(&self, id: SheetId) -> Option<&str> {
        self.name_by_id.get(id as usize)?.as_deref()
    }

    pub fn is_live(&self, id: SheetId) -> bool {
        self.name(id).is_some()
    }

    pub fn remove(&mut self, id: SheetId) -> Option<String> {
        let name = self.name_by_id.get_mut(id as usize)?.take()?;
        self.id_by_name.remove(&key(&name));
        Some(name)
    }

    /// Live sheets in id order.
    pub fn sheets(&self) -> impl Iterator<Item = (SheetId, &str)> {
        self.name_by_id
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_deref().map(|n| (i as SheetId, n)))
    }

    pub fn len(&self) -> usize {
        self.id_by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_case_insensitive_and_ids_are_not_reused() {
        let mut reg = SheetRegistry::new();
        let s1 = reg.add("Sheet1").unwrap();
        assert_eq!(reg.add("SHEET1"), None);
        assert_eq!(reg.get_id("sheet1"), Some(s1));
        assert_eq!(reg.remove(s1).as_deref(), Some("Sheet1"));
        assert!(!reg.is_live(s1));
        let again = reg.add("Sheet1").unwrap();
        assert_ne!(again, s1);
        assert_eq!(reg.sheets().collect::<Vec<_>>(), vec![(again, "Sheet1")]);
    }

    #[test]
    fn sheet_name_rules() {
        assert!(is_valid_sheet_name("Q1 '24"));
        assert!(!is_valid_sheet_name(""));
        assert!(!is_valid_sheet_name("a!b"));
        assert!(!is_valid_sheet_name("'quoted'"));
    }
}
