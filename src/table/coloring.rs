use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Coloring – hierarchical grouping of column names
// ---------------------------------------------------------------------------

/// Named groups of column names, expressing hierarchical structure over a
/// table's columns (e.g. "all columns that came from sub-directory X").
///
/// Invariants maintained here and at attach time in [`crate::Table`]:
/// * a group name never collides with a column name;
/// * member lists only reference existing columns (after `restrict`);
/// * groups with no surviving members are removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coloring {
    groups: BTreeMap<String, Vec<String>>,
}

impl PartialEq for Coloring {
    /// Same groups with the same member sets; member order is not
    /// significant (directory listings and merges may reorder it).
    fn eq(&self, other: &Self) -> bool {
        self.groups.len() == other.groups.len()
            && self.groups.iter().all(|(k, m)| {
                other
                    .groups
                    .get(k)
                    .map(|om| m.len() == om.len() && m.iter().all(|x| om.contains(x)))
                    .unwrap_or(false)
            })
    }
}

impl Eq for Coloring {}

impl Coloring {
    pub fn new() -> Self {
        Coloring::default()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Member list of a group, if present.
    pub fn get(&self, group: &str) -> Option<&[String]> {
        self.groups.get(group).map(|v| v.as_slice())
    }

    pub fn contains(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.groups.iter()
    }

    pub fn group_names(&self) -> impl Iterator<Item = &String> {
        self.groups.keys()
    }

    /// Insert or overwrite a group.  Members are de-duplicated, preserving
    /// first occurrence.
    pub fn insert<S: Into<String>>(&mut self, group: S, members: Vec<String>) {
        self.groups.insert(group.into(), uniqify(members));
    }

    pub fn remove(&mut self, group: &str) -> Option<Vec<String>> {
        self.groups.remove(group)
    }

    /// Strip groups whose name collides with an actual column name.  The
    /// data column wins; the group is dropped with a diagnostic.
    pub fn strip_collisions(&mut self, column_names: &[String]) {
        let colliding: Vec<String> = self
            .groups
            .keys()
            .filter(|k| column_names.iter().any(|n| n == *k))
            .cloned()
            .collect();
        if !colliding.is_empty() {
            warn!(
                "coloring groups {colliding:?} are also column names; \
                 dropping the groups (the data columns are kept)"
            );
            for k in &colliding {
                self.groups.remove(k);
            }
        }
    }

    /// Restrict member lists to `names`, dropping groups that become empty.
    /// Used when merging colorings across stacked tables.
    pub fn restrict(&mut self, names: &[String]) {
        self.groups
            .values_mut()
            .for_each(|m| m.retain(|c| names.iter().any(|n| n == c)));
        self.groups.retain(|_, m| !m.is_empty());
    }

    /// `restrict`, then additionally drop groups whose member set equals the
    /// entire column set (degenerate).  Used by column subsetting and by the
    /// HSV loader.
    pub fn threshold(&mut self, names: &[String]) {
        self.restrict(names);
        self.groups.retain(|_, m| {
            !(m.len() == names.len() && names.iter().all(|n| m.contains(n)))
        });
    }

    /// Rewrite every member entry equal to `old` as `new`.
    pub fn rename_column(&mut self, old: &str, new: &str) {
        for members in self.groups.values_mut() {
            for m in members.iter_mut() {
                if m == old {
                    *m = new.to_string();
                }
            }
        }
    }

    /// Union-merge another coloring into this one; shared groups get the
    /// de-duplicated concatenation of their member lists.
    pub fn merge(&mut self, other: &Coloring) {
        for (k, members) in &other.groups {
            match self.groups.get_mut(k) {
                Some(mine) => {
                    let mut combined = mine.clone();
                    combined.extend(members.iter().cloned());
                    *mine = uniqify(combined);
                }
                None => {
                    self.groups.insert(k.clone(), members.clone());
                }
            }
        }
    }
}

impl FromIterator<(String, Vec<String>)> for Coloring {
    fn from_iter<T: IntoIterator<Item = (String, Vec<String>)>>(iter: T) -> Self {
        let mut c = Coloring::new();
        for (k, v) in iter {
            c.insert(k, v);
        }
        c
    }
}

/// First-occurrence de-duplication, order preserving.
pub(crate) fn uniqify(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    items.into_iter().filter(|x| seen.insert(x.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn restrict_drops_empty_groups() {
        let mut c = Coloring::new();
        c.insert("g", names(&["a", "b"]));
        c.insert("h", names(&["z"]));
        c.restrict(&names(&["a", "b", "c"]));
        assert_eq!(c.get("g"), Some(names(&["a", "b"]).as_slice()));
        assert!(c.get("h").is_none());
    }

    #[test]
    fn threshold_drops_full_set_groups() {
        let mut c = Coloring::new();
        c.insert("all", names(&["a", "b"]));
        c.insert("g", names(&["a"]));
        c.threshold(&names(&["a", "b"]));
        assert!(c.get("all").is_none());
        assert_eq!(c.get("g"), Some(names(&["a"]).as_slice()));
    }

    #[test]
    fn strip_collisions_prefers_columns() {
        let mut c = Coloring::new();
        c.insert("a", names(&["b"]));
        c.insert("g", names(&["a"]));
        c.strip_collisions(&names(&["a", "b"]));
        assert!(c.get("a").is_none());
        assert!(c.get("g").is_some());
    }

    #[test]
    fn rename_rewrites_members() {
        let mut c = Coloring::new();
        c.insert("g", names(&["a", "b"]));
        c.rename_column("a", "x");
        assert_eq!(c.get("g"), Some(names(&["x", "b"]).as_slice()));
    }

    #[test]
    fn merge_uniqifies() {
        let mut c = Coloring::new();
        c.insert("g", names(&["a", "b"]));
        let mut d = Coloring::new();
        d.insert("g", names(&["b", "c"]));
        d.insert("h", names(&["d"]));
        c.merge(&d);
        assert_eq!(c.get("g"), Some(names(&["a", "b", "c"]).as_slice()));
        assert_eq!(c.get("h"), Some(names(&["d"]).as_slice()));
    }
}
