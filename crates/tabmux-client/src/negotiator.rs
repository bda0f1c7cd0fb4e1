//! Terminal size bookkeeping for one session.

use tabmux_core::Dimensions;

/// Remembers the last cell grid announced for a session and decides whether
/// a newly proposed grid is worth a resize command.
#[derive(Debug, Clone, Default)]
pub struct Negotiator {
    last: Option<Dimensions>,
}

impl Negotiator {
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Last stored size.
    pub fn current(&self) -> Option<Dimensions> {
        self.last
    }

    /// Store `dims` unconditionally.
    pub fn store(&mut self, dims: Dimensions) {
        self.last = Some(dims);
    }

    /// Record a proposed size. Returns it when it differs from the stored
    /// one; unusable or identical proposals return `None` and change nothing.
    pub fn propose(&mut self, proposed: Option<Dimensions>) -> Option<Dimensions> {
        let proposed = proposed.filter(Dimensions::is_usable)?;
        if self.last == Some(proposed) {
            return None;
        }
        self.last = Some(proposed);
        Some(proposed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_proposal_is_ignored() {
        let mut n = Negotiator::new();
        n.store(Dimensions::new(80, 24));
        assert_eq!(n.propose(Some(Dimensions::new(80, 24))), None);
        assert_eq!(n.current(), Some(Dimensions::new(80, 24)));
    }

    #[test]
    fn changed_proposal_is_stored() {
        let mut n = Negotiator::new();
        n.store(Dimensions::new(80, 24));
        assert_eq!(
            n.propose(Some(Dimensions::new(100, 30))),
            Some(Dimensions::new(100, 30))
        );
        assert_eq!(n.current(), Some(Dimensions::new(100, 30)));
    }

    #[test]
    fn unusable_proposal_is_ignored() {
        let mut n = Negotiator::new();
        assert_eq!(n.propose(None), None);
        assert_eq!(n.propose(Some(Dimensions::new(0, 10))), None);
        assert_eq!(n.current(), None);
    }
}
