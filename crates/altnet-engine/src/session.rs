use altnet_core::{ExplorationId, RecordId};

use crate::lineage::{LineageOutcome, LineageState, ParentLink};

/// A page the session has shown.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    pub address: String,
    pub packed_content: String,
    pub record_id: Option<RecordId>,
    pub exploration_id: Option<ExplorationId>,
}

/// Per-user navigation state, passed to every navigation.
#[derive(Debug, Default)]
pub struct Session {
    history: Vec<HistoryEntry>,
    index: Option<usize>,
    current_record: Option<RecordId>,
    current_exploration: Option<ExplorationId>,
    tonal_modifier: Option<String>,
    lineage: LineageState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.index.and_then(|i| self.history.get(i))
    }

    pub fn current_record(&self) -> Option<&RecordId> {
        self.current_record.as_ref()
    }

    pub fn current_exploration(&self) -> Option<&ExplorationId> {
        self.current_exploration.as_ref()
    }

    pub fn tonal_modifier(&self) -> Option<&str> {
        self.tonal_modifier.as_deref()
    }

    pub fn set_tonal_modifier(&mut self, modifier: Option<String>) {
        self.tonal_modifier = modifier;
    }

    pub fn lineage(&self) -> &LineageState {
        &self.lineage
    }

    pub fn can_go_back(&self) -> bool {
        self.index.is_some_and(|i| i > 0)
    }

    pub fn can_go_forward(&self) -> bool {
        self.index.map_or(!self.history.is_empty(), |i| i + 1 < self.history.len())
    }

    /// Push a page, dropping any forward entries, and make it current.
    pub fn push(&mut self, entry: HistoryEntry) {
        let keep = self.index.map_or(0, |i| i + 1);
        self.history.truncate(keep);
        self.current_record = entry.record_id.clone();
        self.current_exploration = entry.exploration_id.clone();
        self.history.push(entry);
        self.index = Some(self.history.len() - 1);
    }

    pub fn back(&mut self) -> Option<&HistoryEntry> {
        let i = self.index.filter(|&i| i > 0)? - 1;
        self.move_to(i)
    }

    pub fn forward(&mut self) -> Option<&HistoryEntry> {
        let i = self.index.map_or(0, |i| i + 1);
        if i >= self.history.len() {
            return None;
        }
        self.move_to(i)
    }

    fn move_to(&mut self, i: usize) -> Option<&HistoryEntry> {
        self.index = Some(i);
        let entry = self.history.get(i)?;
        self.current_record = entry.record_id.clone();
        self.current_exploration = entry.exploration_id.clone();
        Some(entry)
    }

    /// Link the current page to its published record.
    pub fn attach_record(&mut self, record_id: RecordId) {
        if let Some(entry) = self.index.and_then(|i| self.history.get_mut(i)) {
            entry.record_id = Some(record_id.clone());
        }
        self.current_record = Some(record_id);
    }

    /// Record where the current page landed in its lineage.
    pub fn record_lineage(&mut self, outcome: &LineageOutcome) {
        self.lineage = self.lineage.advance(outcome);
        self.current_exploration = Some(outcome.exploration_id.clone());
        if let Some(entry) = self.index.and_then(|i| self.history.get_mut(i)) {
            entry.exploration_id = Some(outcome.exploration_id.clone());
        }
    }

    /// Make an already published page current without extending a lineage.
    pub fn adopt(&mut self, record_id: RecordId, exploration_id: Option<ExplorationId>) {
        self.current_record = Some(record_id);
        self.current_exploration = exploration_id;
        self.lineage = match &self.current_exploration {
            Some(id) => LineageState::Extended { exploration_id: id.clone(), depth: 0 },
            None => LineageState::None,
        };
    }

    /// Back to the welcome screen: history is kept, the position and the
    /// lineage are cleared.
    pub fn go_home(&mut self) {
        self.index = None;
        self.current_record = None;
        self.current_exploration = None;
        self.tonal_modifier = None;
        self.lineage = LineageState::None;
    }

    /// The parent for a link-follow from the current page, when the page is
    /// published and part of a lineage.
    pub fn parent_link(&self) -> Option<ParentLink> {
        let packed = self.current().map(|e| e.packed_content.as_str()).filter(|p| !p.is_empty())?;
        Some(ParentLink {
            exploration_id: self.current_exploration.clone()?,
            record_id: self.current_record.clone()?,
            packed_content: packed.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::StepKind;
    use altnet_core::NodeId;

    fn entry(address: &str, record: Option<&str>, exploration: Option<&str>) -> HistoryEntry {
        HistoryEntry {
            address: address.into(),
            packed_content: format!("<p>{address}</p>"),
            record_id: record.map(RecordId::from_raw),
            exploration_id: exploration.map(ExplorationId::from_raw),
        }
    }

    #[test]
    fn back_and_forward_restore_position() {
        let mut session = Session::new();
        assert!(!session.can_go_back());
        session.push(entry("a", Some("r1"), Some("e1")));
        session.push(entry("b", Some("r2"), Some("e2")));
        assert!(session.can_go_back());
        assert!(!session.can_go_forward());

        assert_eq!(session.back().map(|e| e.address.clone()), Some("a".into()));
        assert_eq!(session.current_record().map(RecordId::as_str), Some("r1"));
        assert_eq!(session.current_exploration().map(ExplorationId::as_str), Some("e1"));
        assert!(session.back().is_none());

        assert_eq!(session.forward().map(|e| e.address.clone()), Some("b".into()));
        assert!(session.forward().is_none());
    }

    #[test]
    fn push_drops_forward_entries() {
        let mut session = Session::new();
        session.push(entry("a", None, None));
        session.push(entry("b", None, None));
        session.back();
        session.push(entry("c", None, None));
        let addresses: Vec<&str> = session.history().iter().map(|e| e.address.as_str()).collect();
        assert_eq!(addresses, vec!["a", "c"]);
    }

    #[test]
    fn parent_link_needs_record_and_lineage() {
        let mut session = Session::new();
        assert!(session.parent_link().is_none());

        session.push(entry("a", Some("r1"), None));
        assert!(session.parent_link().is_none());

        let outcome = LineageOutcome {
            exploration_id: ExplorationId::from_raw("e1"),
            node_id: NodeId::from_raw("n1"),
            kind: StepKind::Root,
        };
        session.record_lineage(&outcome);
        let link = session.parent_link().unwrap();
        assert_eq!(link.record_id.as_str(), "r1");
        assert_eq!(link.exploration_id.as_str(), "e1");
        assert_eq!(link.packed_content, "<p>a</p>");
        assert_eq!(session.current().unwrap().exploration_id, Some(ExplorationId::from_raw("e1")));
    }

    #[test]
    fn go_home_clears_lineage() {
        let mut session = Session::new();
        session.push(entry("a", Some("r1"), Some("e1")));
        session.set_tonal_modifier(Some("hushed".into()));
        session.go_home();
        assert!(session.current().is_none());
        assert!(session.tonal_modifier().is_none());
        assert_eq!(session.lineage(), &LineageState::None);
        assert!(session.parent_link().is_none());
        // History survives, so forward returns to the first page.
        assert_eq!(session.forward().map(|e| e.address.clone()), Some("a".into()));
    }
}
