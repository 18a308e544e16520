//! Record of phrases the user has already chosen.
//!
//! Used only to keep already-chosen options from being offered again.

use parley_core::normalize_phrase;

/// Append-only list of normalized phrases (typed text and clicked options).
#[derive(Debug, Default, Clone)]
pub struct OptionTracker {
    chosen: Vec<String>,
}

impl OptionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize and append a phrase. Duplicates are kept.
    pub fn record(&mut self, phrase: &str) {
        self.chosen.push(normalize_phrase(phrase));
    }

    pub fn contains(&self, phrase: &str) -> bool {
        self.chosen.iter().any(|c| c == phrase)
    }

    /// Candidates not yet chosen, in their original order.
    ///
    /// Candidates are compared as given against the normalized entries, so a
    /// differently-cased candidate is not suppressed.
    pub fn filter_unseen(&self, candidates: &[String]) -> Vec<String> {
        candidates
            .iter()
            .filter(|c| !self.contains(c.as_str()))
            .cloned()
            .collect()
    }

    pub fn entries(&self) -> &[String] {
        &self.chosen
    }

    pub fn len(&self) -> usize {
        self.chosen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chosen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unseen_phrase_passes_through() {
        let tracker = OptionTracker::new();
        assert_eq!(tracker.filter_unseen(&strings(&["pricing"])), strings(&["pricing"]));
    }

    #[test]
    fn test_recorded_phrase_is_filtered() {
        let mut tracker = OptionTracker::new();
        tracker.record("pricing");
        assert!(tracker.filter_unseen(&strings(&["pricing"])).is_empty());
    }

    #[test]
    fn test_filter_preserves_order() {
        let mut tracker = OptionTracker::new();
        tracker.record("pro");
        let result = tracker.filter_unseen(&strings(&["basic", "pro", "enterprise", "trial"]));
        assert_eq!(result, strings(&["basic", "enterprise", "trial"]));
    }

    #[test]
    fn test_record_normalizes() {
        let mut tracker = OptionTracker::new();
        tracker.record("  Contact Us ");
        assert_eq!(tracker.entries(), &["contact us".to_string()]);
        assert!(tracker.filter_unseen(&strings(&["contact us"])).is_empty());
    }

    #[test]
    fn test_differently_cased_candidate_slips_through() {
        let mut tracker = OptionTracker::new();
        tracker.record("Contact Us");
        assert_eq!(
            tracker.filter_unseen(&strings(&["Contact Us"])),
            strings(&["Contact Us"])
        );
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut tracker = OptionTracker::new();
        tracker.record("pricing");
        tracker.record("pricing");
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_empty_candidates() {
        let mut tracker = OptionTracker::new();
        tracker.record("pricing");
        assert!(tracker.filter_unseen(&[]).is_empty());
        assert!(!tracker.is_empty());
    }
}
