use clinic_core::model::{Session, SessionId};
use storage::repository::Page;

/// Rows backing a session listing screen.
///
/// Only the owner mutates it: a fetch replaces everything, a successful
/// create, edit or delete patches the affected row in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionTable {
    rows: Vec<Session>,
    total: u64,
    page: u32,
    has_next: bool,
}

impl SessionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, page_number: u32, page: Page<Session>) {
        self.rows = page.items;
        self.total = page.total;
        self.page = page_number;
        self.has_next = page.has_next;
    }

    /// Newly created sessions go on top, as the listing is newest first.
    pub fn apply_created(&mut self, session: Session) {
        self.rows.retain(|row| row.id() != session.id());
        self.rows.insert(0, session);
        self.total += 1;
    }

    /// Returns `false` when the session is not on this page.
    pub fn apply_updated(&mut self, session: Session) -> bool {
        match self.rows.iter_mut().find(|row| row.id() == session.id()) {
            Some(row) => {
                *row = session;
                true
            }
            None => false,
        }
    }

    pub fn apply_deleted(&mut self, id: SessionId) -> bool {
        let before = self.rows.len();
        self.rows.retain(|row| row.id() != id);
        let removed = self.rows.len() != before;
        if removed {
            self.total = self.total.saturating_sub(1);
        }
        removed
    }

    #[must_use]
    pub fn rows(&self) -> &[Session] {
        &self.rows
    }

    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.rows.iter().find(|row| row.id() == id)
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.has_next
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use clinic_core::model::{ConsultationId, Percent, PlanId, PlanItemId, SessionPatch};

    fn session(id: u64, current: f64) -> Session {
        Session::from_remote(
            SessionId::new(id),
            PlanItemId::new(7),
            ConsultationId::new(3),
            Some(PlanId::new(2)),
            NaiveDate::from_ymd_opt(2025, 10, 27).unwrap(),
            None,
            30,
            Percent::ZERO,
            Percent::new(current).unwrap(),
            "Profilaxis".into(),
        )
        .unwrap()
    }

    #[test]
    fn fetch_replaces_all_rows() {
        let mut table = SessionTable::new();
        table.replace(1, Page::single(vec![session(1, 20.0), session(2, 40.0)]));
        table.replace(
            2,
            Page {
                items: vec![session(3, 60.0)],
                total: 21,
                has_next: false,
            },
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.total(), 21);
        assert_eq!(table.page(), 2);
        assert!(table.get(SessionId::new(1)).is_none());
    }

    #[test]
    fn mutations_patch_rows_locally() {
        let mut table = SessionTable::new();
        table.replace(1, Page::single(vec![session(1, 20.0)]));

        table.apply_created(session(2, 50.0));
        assert_eq!(table.rows()[0].id(), SessionId::new(2));
        assert_eq!(table.total(), 2);

        let mut edited = session(1, 20.0);
        edited
            .apply_patch(&SessionPatch {
                current_progress: Some(35.0),
                ..SessionPatch::default()
            })
            .unwrap();
        assert!(table.apply_updated(edited));
        assert_eq!(
            table.get(SessionId::new(1)).unwrap().current_progress().value(),
            35.0
        );

        assert!(table.apply_deleted(SessionId::new(2)));
        assert!(!table.apply_deleted(SessionId::new(2)));
        assert_eq!(table.total(), 1);
        assert!(!table.apply_updated(session(9, 10.0)));
    }
}
