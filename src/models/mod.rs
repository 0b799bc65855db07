pub mod decision;

pub use decision::{
    BatchDecisionRequest, BatchDecisionResponse, BatchReportEntry, BatchSummary,
    ClassificationResult, Decision, DecisionResponse, HistoryFilter, NewDecision,
    SingleDecisionRequest,
};
