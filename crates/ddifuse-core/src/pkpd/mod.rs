//! Pharmacokinetic and pharmacodynamic overlap inference.

pub mod pd;
pub mod pk;
pub mod summary;

pub use pd::{PdOverlap, pd_overlap, pd_score};
pub use pk::{OverlapResult, detect_overlaps, extract_roles};
pub use summary::{PkPdSummary, summarize_pkpd_risk, summarize_pkpd_risk_with};
