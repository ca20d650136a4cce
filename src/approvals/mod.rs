// Human-in-the-Loop Approvals Module
//
// Tracks outstanding approval requests with expiry semantics and audit
// emission. Gating itself is a two-phase call: request an approval, then
// execute the gated operation against its id (see the orchestrator).

pub mod manager;
pub mod types;

pub use manager::{ApprovalError, ApprovalManager, NewApproval};
pub use types::{ApprovalRequest, ApprovalStatus, ApprovalSummary, ApprovalType};
