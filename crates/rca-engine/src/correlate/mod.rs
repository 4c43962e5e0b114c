//! Root-cause correlation
//!
//! Critical events are matched with the anomalies and log errors that fall
//! inside a time window around them. Each matched group is scored against
//! the dependency topology and the resulting hypotheses are ranked.

mod ranker;
mod recommend;
mod window;

pub use ranker::{
    evidence_confidence, sort_hypotheses, RootCauseRanker, BASE_CONFIDENCE, EVIDENCE_CAP,
    EVIDENCE_WEIGHT, UPSTREAM_BONUS,
};
pub use recommend::recommend;
pub use window::{
    Evidence, EvidenceGroup, TemporalCorrelator, DEFAULT_PARALLEL_THRESHOLD, DEFAULT_WINDOW,
};
