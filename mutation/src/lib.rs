mod field;
mod sequencer;

pub use field::{FieldDiff, FieldName, MutationField, PriorityGroup};
pub use sequencer::{
    FieldApplier, FieldFailure, FieldRecord, FieldState, MutationSequencer, PartialConvergenceError,
    RunOutcome, RunReport,
};
