use std::sync::atomic::{AtomicBool, Ordering};

/// One-at-a-time flag for a form's mutating request.
#[derive(Debug, Default)]
pub struct InFlight(AtomicBool);

impl InFlight {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the flag. `None` while another ticket is alive.
    #[must_use]
    pub fn try_begin(&self) -> Option<InFlightTicket<'_>> {
        if self.0.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(InFlightTicket(&self.0))
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Releases the flag when dropped, whatever the request's outcome.
#[derive(Debug)]
pub struct InFlightTicket<'a>(&'a AtomicBool);

impl Drop for InFlightTicket<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_refused_until_release() {
        let flag = InFlight::new();
        let ticket = flag.try_begin().expect("first claim");
        assert!(flag.is_busy());
        assert!(flag.try_begin().is_none());
        drop(ticket);
        assert!(!flag.is_busy());
        assert!(flag.try_begin().is_some());
    }
}
