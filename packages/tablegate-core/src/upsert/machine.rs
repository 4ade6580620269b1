//! Upsert state machine.
//!
//! ```text
//! ValidateInputs --Start--> AttemptUpdate --1 row--> Resolved(Updated)
//!                                         --0 rows, insert permitted--> AttemptInsert --> Resolved(Inserted)
//!                                         --0 rows, insert not permitted--> Resolved(NotFound)
//!                           any statement --store error--> Resolved(StoreFailed)
//! ```
//!
//! [`transition`] is a pure function of the current state and the event; it
//! never touches a store. [`UpsertMachine`] pairs it with the two plans.

use crate::error::{GatewayError, StoreError};
use crate::executor::MutationOutcome;
use crate::plan::MutationPlan;
use crate::policy::Predicate;
use crate::route::PrimaryKeyRoute;
use crate::schema::EntitySchema;
use crate::validation::ValidatedBody;

/// Planner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertState {
    ValidateInputs,
    AttemptUpdate,
    AttemptInsert,
    Resolved,
}

/// Input to a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertEvent {
    Start,
    Executed(MutationOutcome),
    Failed(StoreError),
}

/// Final outcome of an upsert.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Updated(MutationOutcome),
    Inserted(MutationOutcome),
    NotFound,
    StoreFailed(StoreError),
}

/// What the driver must do next.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertEffect {
    RunUpdate,
    RunInsert,
    Resolve(Resolution),
}

/// Per-request facts the transition function depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineContext {
    pub entity: String,
    /// False when every key column is store-generated or the request is
    /// update-only
    pub insert_permitted: bool,
}

/// Computes the next state and effect.
pub fn transition(
    state: UpsertState,
    event: UpsertEvent,
    context: &MachineContext,
) -> Result<(UpsertState, UpsertEffect), GatewayError> {
    use UpsertEffect::*;
    use UpsertState::*;

    match (state, event) {
        (ValidateInputs, UpsertEvent::Start) => Ok((AttemptUpdate, RunUpdate)),

        (AttemptUpdate, UpsertEvent::Executed(outcome)) => match outcome.rows_affected {
            1 => Ok((Resolved, Resolve(Resolution::Updated(outcome)))),
            0 if context.insert_permitted => Ok((AttemptInsert, RunInsert)),
            0 => Ok((Resolved, Resolve(Resolution::NotFound))),
            rows => {
                tracing::error!(
                    "Primary key update on {} matched {} rows",
                    context.entity,
                    rows
                );
                Err(GatewayError::MultipleRowsAffected {
                    entity: context.entity.clone(),
                    rows,
                })
            }
        },

        (AttemptInsert, UpsertEvent::Executed(outcome)) => {
            if outcome.rows_affected == 1 {
                Ok((Resolved, Resolve(Resolution::Inserted(outcome))))
            } else {
                Err(GatewayError::Internal(format!(
                    "insert into {} affected {} rows",
                    context.entity, outcome.rows_affected
                )))
            }
        }

        (AttemptUpdate | AttemptInsert, UpsertEvent::Failed(error)) => {
            tracing::warn!("Statement on {} failed: {}", context.entity, error);
            Ok((Resolved, Resolve(Resolution::StoreFailed(error))))
        }

        (state, event) => Err(GatewayError::Internal(format!(
            "invalid upsert transition from {:?} on {:?}",
            state, event
        ))),
    }
}

/// State machine bound to one request's plans.
#[derive(Debug)]
pub struct UpsertMachine {
    state: UpsertState,
    context: MachineContext,
    update: MutationPlan,
    insert: MutationPlan,
}

impl UpsertMachine {
    /// Merges route and body into the update and insert plans.
    ///
    /// A key field repeated in the body must agree with the route.
    pub fn new(
        entity: &EntitySchema,
        route: &PrimaryKeyRoute,
        body: &ValidatedBody,
        policy: Option<Predicate>,
    ) -> Result<Self, GatewayError> {
        for supplied in body.supplied_keys() {
            if route.get(&supplied.column) != Some(&supplied.value) {
                let field = entity
                    .column(&supplied.column)
                    .map(|c| c.exposed_name.clone())
                    .unwrap_or_else(|| supplied.column.clone());
                return Err(GatewayError::PrimaryKeyConflict { field });
            }
        }

        Ok(Self {
            state: UpsertState::ValidateInputs,
            context: MachineContext {
                entity: entity.name().to_string(),
                insert_permitted: !entity.has_autogenerated_key(),
            },
            update: MutationPlan::update(entity, route, body, policy),
            insert: MutationPlan::insert(entity, route, body),
        })
    }

    /// Disables the insert branch, as `If-Match: *` requests.
    pub fn update_only(mut self) -> Self {
        self.context.insert_permitted = false;
        self
    }

    pub fn state(&self) -> UpsertState {
        self.state
    }

    pub fn context(&self) -> &MachineContext {
        &self.context
    }

    /// Applies an event, returning the effect to perform.
    pub fn step(&mut self, event: UpsertEvent) -> Result<UpsertEffect, GatewayError> {
        let (next, effect) = transition(self.state, event, &self.context)?;
        tracing::debug!(
            "Upsert on {}: {:?} -> {:?}",
            self.context.entity,
            self.state,
            next
        );
        self.state = next;
        Ok(effect)
    }

    /// Plan for a statement effect.
    pub fn plan(&self, effect: &UpsertEffect) -> Option<&MutationPlan> {
        match effect {
            UpsertEffect::RunUpdate => Some(&self.update),
            UpsertEffect::RunInsert => Some(&self.insert),
            UpsertEffect::Resolve(_) => None,
        }
    }
}
