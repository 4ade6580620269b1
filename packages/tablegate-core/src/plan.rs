//! Mutation plans handed to the executor.

use crate::policy::Predicate;
use crate::route::PrimaryKeyRoute;
use crate::schema::EntitySchema;
use crate::validation::ValidatedBody;
use crate::value::Value;

/// Statement kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Update,
    Insert,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Update => "UPDATE",
            MutationKind::Insert => "INSERT",
        }
    }
}

/// One column written by a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldAssignment {
    pub column: String,
    pub value: Value,
}

impl FieldAssignment {
    pub fn new(column: impl Into<String>, value: Value) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }
}

/// A single UPDATE or INSERT against the entity's physical table.
///
/// Column names in `predicate`, `assignments` and `returning` are physical
/// column names of `table`.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationPlan {
    pub kind: MutationKind,
    /// Entity the request addressed
    pub entity: String,
    /// Table the statement runs against
    pub table: String,
    /// Row filter; `None` for inserts
    pub predicate: Option<Predicate>,
    pub assignments: Vec<FieldAssignment>,
    /// Columns to return from the affected row
    pub returning: Vec<String>,
}

impl MutationPlan {
    /// UPDATE with the full-replace SET list, filtered by key equality and
    /// the caller's policy. Absent store-defaulted columns are set to NULL.
    pub fn update(
        entity: &EntitySchema,
        route: &PrimaryKeyRoute,
        body: &ValidatedBody,
        policy: Option<Predicate>,
    ) -> Self {
        let key = route.predicate(entity);
        let predicate = match policy {
            Some(policy) => key.and(policy),
            None => key,
        };
        let nulled: Vec<FieldAssignment> = body
            .store_defaulted()
            .iter()
            .map(|name| FieldAssignment::new(name.clone(), Value::Null))
            .collect();
        let mut assignments = physical_assignments(entity, body.assignments());
        assignments.extend(physical_assignments(entity, &nulled));
        Self {
            kind: MutationKind::Update,
            entity: entity.name().to_string(),
            table: entity.physical_table().to_string(),
            predicate: Some(predicate),
            assignments,
            returning: returning_columns(entity),
        }
    }

    /// INSERT of route key values plus the validated body. Store-defaulted
    /// columns are left out so the store fills them.
    pub fn insert(entity: &EntitySchema, route: &PrimaryKeyRoute, body: &ValidatedBody) -> Self {
        let keys: Vec<FieldAssignment> = route
            .values()
            .iter()
            .map(|(name, value)| FieldAssignment::new(name.clone(), value.clone()))
            .collect();
        let mut assignments = physical_assignments(entity, &keys);
        assignments.extend(physical_assignments(entity, body.assignments()));
        Self {
            kind: MutationKind::Insert,
            entity: entity.name().to_string(),
            table: entity.physical_table().to_string(),
            predicate: None,
            assignments,
            returning: returning_columns(entity),
        }
    }
}

fn physical_assignments(entity: &EntitySchema, logical: &[FieldAssignment]) -> Vec<FieldAssignment> {
    logical
        .iter()
        .map(|assignment| {
            let column = entity
                .column(&assignment.column)
                .map(|c| entity.physical_column(c))
                .unwrap_or(&assignment.column);
            FieldAssignment::new(column, assignment.value.clone())
        })
        .collect()
}

/// Physical columns of the target table that the entity projects.
fn returning_columns(entity: &EntitySchema) -> Vec<String> {
    let table = entity.physical_table();
    entity
        .columns()
        .iter()
        .filter(|c| entity.owning_table(&c.name) == Some(table))
        .map(|c| entity.physical_column(c).to_string())
        .collect()
}
