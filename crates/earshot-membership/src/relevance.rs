//! Local relevance - distance threshold eligibility
//!
//! The threshold belongs to the stream and can be changed at any time; the
//! membership engine reads it fresh on every cycle.

use earshot_core::{Anchor, Position3D};

use crate::Candidate;

/// True iff `candidate` is within `threshold` of `anchor`
#[inline]
pub fn is_eligible(anchor: &Position3D, candidate: &Position3D, threshold: f32) -> bool {
    anchor.distance(candidate) <= threshold
}

/// Distance-threshold relevance rule
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalRelevance {
    threshold: f32,
}

impl LocalRelevance {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    #[inline]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    #[inline]
    pub fn is_eligible(&self, anchor: &Position3D, candidate: &Position3D) -> bool {
        is_eligible(anchor, candidate, self.threshold)
    }

    /// Distance of a candidate that may listen, `None` if it may not.
    ///
    /// A candidate qualifies when it has the companion client, can see the
    /// anchor, is not the anchor's own participant and is within range.
    pub fn qualify(&self, anchor: &Anchor, origin: &Position3D, candidate: &Candidate) -> Option<f32> {
        if !candidate.capable || !candidate.visible {
            return None;
        }
        if anchor.tracked_participant() == Some(candidate.participant) {
            return None;
        }

        let distance = origin.distance(&candidate.position);
        (distance <= self.threshold).then_some(distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use earshot_core::ParticipantId;

    fn candidate(id: u16, x: f32) -> Candidate {
        Candidate {
            participant: ParticipantId::new(id),
            position: Position3D::new(x, 0.0, 0.0),
            capable: true,
            visible: true,
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let origin = Position3D::origin();
        assert!(is_eligible(&origin, &Position3D::new(10.0, 0.0, 0.0), 10.0));
        assert!(!is_eligible(&origin, &Position3D::new(10.5, 0.0, 0.0), 10.0));
    }

    #[test]
    fn test_qualify_filters_capability_and_visibility() {
        let relevance = LocalRelevance::new(10.0);
        let anchor = Anchor::Fixed(Position3D::origin());
        let origin = Position3D::origin();

        assert_eq!(relevance.qualify(&anchor, &origin, &candidate(1, 3.0)), Some(3.0));

        let mut no_plugin = candidate(1, 3.0);
        no_plugin.capable = false;
        assert_eq!(relevance.qualify(&anchor, &origin, &no_plugin), None);

        let mut hidden = candidate(1, 3.0);
        hidden.visible = false;
        assert_eq!(relevance.qualify(&anchor, &origin, &hidden), None);

        assert_eq!(relevance.qualify(&anchor, &origin, &candidate(1, 11.0)), None);
    }

    #[test]
    fn test_anchor_participant_never_hears_itself() {
        let relevance = LocalRelevance::new(10.0);
        let anchor = Anchor::Participant(ParticipantId::new(4));
        let origin = Position3D::origin();

        assert_eq!(relevance.qualify(&anchor, &origin, &candidate(4, 0.0)), None);
        assert_eq!(relevance.qualify(&anchor, &origin, &candidate(5, 0.0)), Some(0.0));
    }

    #[test]
    fn test_threshold_update_applies_to_next_query() {
        let mut relevance = LocalRelevance::new(5.0);
        let origin = Position3D::origin();
        let far = Position3D::new(8.0, 0.0, 0.0);
        assert!(!relevance.is_eligible(&origin, &far));

        relevance.set_threshold(8.0);
        assert!(relevance.is_eligible(&origin, &far));
    }
}
