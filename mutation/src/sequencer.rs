use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;

use async_trait::async_trait;
use concord_diff::ValidationError;
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use tracing::{debug, error, info};

use crate::field::{FieldName, MutationField, PriorityGroup};

/// Applies one field's mutation to the backend.
#[async_trait]
pub trait FieldApplier<M: Send + Sync>: Send + Sync {
    type Error: Error + Send + Sync + 'static;

    async fn apply(&self, field: &MutationField<M>) -> Result<(), Self::Error>;
}

/// Per-field state: `Pending -> Applying -> Applied | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldState {
    Pending,
    Applying,
    Applied,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Converged,
    Partial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRecord {
    pub priority: PriorityGroup,
    pub state: FieldState,
}

/// A backend error tagged with the field whose apply produced it.
#[derive(Debug, Serialize)]
#[serde(bound(serialize = "E: Display"))]
pub struct FieldFailure<E> {
    pub field: FieldName,
    pub priority: PriorityGroup,
    #[serde(serialize_with = "serialize_display")]
    pub error: E,
}

fn serialize_display<E: Display, S: Serializer>(
    error: &E,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// What happened to every field in one run, in application order.
#[derive(Debug, Serialize)]
#[serde(bound(serialize = "E: Display"))]
pub struct RunReport<E> {
    pub outcome: RunOutcome,
    pub fields: IndexMap<FieldName, FieldRecord>,
    pub failures: Vec<FieldFailure<E>>,
}

impl<E> RunReport<E> {
    pub fn applied(&self) -> impl Iterator<Item = &FieldName> {
        self.fields
            .iter()
            .filter(|(_, record)| record.state == FieldState::Applied)
            .map(|(name, _)| name)
    }

    pub fn is_converged(&self) -> bool {
        self.outcome == RunOutcome::Converged
    }

    /// Turn a partial run into an error carrying one entry per failed field.
    pub fn into_result(self) -> Result<Self, PartialConvergenceError<E>> {
        match self.outcome {
            RunOutcome::Converged => Ok(self),
            RunOutcome::Partial => Err(PartialConvergenceError {
                applied: self.applied().cloned().collect(),
                failures: self.failures,
            }),
        }
    }
}

/// At least one field failed to apply. Fields that were applied stay
/// applied; the next run picks the failed ones up from a fresh fetch.
#[derive(Debug)]
pub struct PartialConvergenceError<E> {
    pub applied: Vec<FieldName>,
    pub failures: Vec<FieldFailure<E>>,
}

impl<E: Display> Display for PartialConvergenceError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.failures.len();
        let noun = if count == 1 { "field" } else { "fields" };
        write!(f, "{count} {noun} failed to converge")?;
        for failure in &self.failures {
            write!(f, "\n  {}: {}", failure.field, failure.error)?;
        }
        Ok(())
    }
}

impl<E: Error + 'static> Error for PartialConvergenceError<E> {}

/// Applies changed fields group by group in [`PriorityGroup`] order.
///
/// A failed apply never stops the run: every field gets exactly one
/// attempt, and the failures are collected into the report.
#[derive(Debug)]
pub struct MutationSequencer<M> {
    groups: BTreeMap<PriorityGroup, Vec<MutationField<M>>>,
    fields: IndexMap<FieldName, FieldRecord>,
}

impl<M: Send + Sync> MutationSequencer<M> {
    /// Fails if two fields share a name.
    pub fn new(fields: Vec<MutationField<M>>) -> Result<Self, ValidationError> {
        let mut groups: BTreeMap<PriorityGroup, Vec<MutationField<M>>> = BTreeMap::new();
        for field in fields {
            groups.entry(field.priority).or_default().push(field);
        }

        let mut records = IndexMap::new();
        for field in groups.values().flatten() {
            let record = FieldRecord {
                priority: field.priority,
                state: FieldState::Pending,
            };
            if records.insert(field.name.clone(), record).is_some() {
                return Err(ValidationError::DuplicateField {
                    field: field.name.to_string(),
                });
            }
        }

        Ok(Self {
            groups,
            fields: records,
        })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn state(&self, name: &FieldName) -> Option<FieldState> {
        self.fields.get(name).map(|record| record.state)
    }

    fn transition(&mut self, name: &FieldName, state: FieldState) {
        if let Some(record) = self.fields.get_mut(name) {
            debug!(field = %name, from = ?record.state, to = ?state, "field state");
            record.state = state;
        }
    }

    pub async fn run<A>(mut self, applier: &A) -> RunReport<A::Error>
    where
        A: FieldApplier<M>,
    {
        let mut failures = Vec::new();
        let groups = std::mem::take(&mut self.groups);

        for (priority, fields) in groups {
            debug!(%priority, count = fields.len(), "applying group");

            for field in fields {
                self.transition(&field.name, FieldState::Applying);
                match applier.apply(&field).await {
                    Ok(()) => self.transition(&field.name, FieldState::Applied),
                    Err(err) => {
                        error!(field = %field.name, %priority, "apply failed: {err}");
                        self.transition(&field.name, FieldState::Failed);
                        failures.push(FieldFailure {
                            field: field.name,
                            priority,
                            error: err,
                        });
                    }
                }
            }
        }

        let outcome = if failures.is_empty() {
            RunOutcome::Converged
        } else {
            RunOutcome::Partial
        };
        info!(
            outcome = ?outcome,
            fields = self.fields.len(),
            failed = failures.len(),
            "mutation run finished"
        );

        RunReport {
            outcome,
            fields: self.fields,
            failures,
        }
    }
}
