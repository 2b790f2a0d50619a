use crate::core::ChangeRecord;

/// Ordered, append-only list of the changes applied during one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeLedger {
    entries: Vec<ChangeRecord>,
}

impl ChangeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: ChangeRecord) {
        self.entries.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = ChangeRecord>) {
        self.entries.extend(entries);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn into_vec(self) -> Vec<ChangeRecord> {
        self.entries
    }
}
