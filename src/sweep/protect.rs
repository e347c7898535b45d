use std::collections::HashSet;

/// Tweet ids that must survive the sweep. Built once, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ProtectSet {
    ids: HashSet<String>,
}

impl ProtectSet {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids
                .into_iter()
                .map(|id| id.into().trim().to_string())
                .filter(|id| !id.is_empty())
                .collect(),
        }
    }

    pub fn is_protected(&self, id_str: &str) -> bool {
        self.ids.contains(id_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
