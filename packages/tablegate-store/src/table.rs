//! Table storage and per-statement constraint checks.

use std::collections::HashMap;

use tablegate_core::error::StoreError;
use tablegate_core::plan::FieldAssignment;
use tablegate_core::policy::{Predicate, RowLookup};
use tablegate_core::schema::{ColumnDefault, ColumnType, EntitySchema};
use tablegate_core::value::Value;

/// Column as the store sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreColumn {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    /// Value used when an insert omits the column
    pub default: Option<Value>,
    /// Value generated from the table's identity counter
    pub identity: bool,
}

impl StoreColumn {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            default: None,
            identity: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// Rows of one table in column order.
#[derive(Debug, Clone)]
pub struct StoreTable {
    pub(crate) name: String,
    pub(crate) columns: Vec<StoreColumn>,
    pub(crate) index: HashMap<String, usize>,
    /// Primary key column indices
    pub(crate) key: Vec<usize>,
    pub(crate) rows: Vec<Vec<Value>>,
    pub(crate) next_identity: i64,
}

/// Borrowed row addressable by column name.
pub(crate) struct RowRef<'a> {
    table: &'a StoreTable,
    values: &'a [Value],
}

impl RowLookup for RowRef<'_> {
    fn get(&self, column: &str) -> Option<&Value> {
        self.table.index.get(column).map(|&i| &self.values[i])
    }
}

/// Row produced by an insert.
#[derive(Debug)]
pub(crate) struct InsertedRow {
    pub values: Vec<Value>,
    pub generated: HashMap<String, Value>,
    /// New identity counter, if it moved
    pub next_identity: Option<i64>,
}

impl StoreTable {
    /// Creates an empty table.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<StoreColumn>,
        key: &[&str],
    ) -> Result<Self, StoreError> {
        let name = name.into();
        let index: HashMap<String, usize> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        let key = key
            .iter()
            .map(|k| {
                index
                    .get(*k)
                    .copied()
                    .ok_or_else(|| StoreError::ColumnNotFound {
                        table: name.clone(),
                        column: k.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name,
            columns,
            index,
            key,
            rows: Vec::new(),
            next_identity: 1,
        })
    }

    /// Creates an empty table mirroring a catalog table entity.
    ///
    /// Catalog-owned defaults are applied by request validation and are not
    /// copied; store-owned defaults are.
    pub fn from_entity(entity: &EntitySchema) -> Result<Self, StoreError> {
        let columns = entity
            .columns()
            .iter()
            .map(|c| StoreColumn {
                name: c.name.clone(),
                column_type: c.column_type,
                nullable: c.nullable,
                default: match &c.default {
                    Some(ColumnDefault::Store(value)) => Some(value.clone()),
                    _ => None,
                },
                identity: c.autogenerated,
            })
            .collect();
        let key: Vec<&str> = entity.primary_key().iter().map(String::as_str).collect();
        Self::new(entity.name(), columns, &key)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[StoreColumn] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn row_ref<'a>(&'a self, values: &'a [Value]) -> RowRef<'a> {
        RowRef {
            table: self,
            values,
        }
    }

    /// Named view of a row, restricted to `columns` when given.
    pub(crate) fn row_map(&self, values: &[Value], columns: Option<&[String]>) -> HashMap<String, Value> {
        match columns {
            Some(columns) => columns
                .iter()
                .filter_map(|c| {
                    self.index
                        .get(c)
                        .map(|&i| (c.clone(), values[i].clone()))
                })
                .collect(),
            None => self
                .columns
                .iter()
                .zip(values)
                .map(|(c, v)| (c.name.clone(), v.clone()))
                .collect(),
        }
    }

    pub(crate) fn key_of<'a>(&self, values: &'a [Value]) -> Vec<&'a Value> {
        self.key.iter().map(|&i| &values[i]).collect()
    }

    pub(crate) fn describe_key(&self, values: &[Value]) -> String {
        self.key_of(values)
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Index of the row whose key equals `key`.
    pub(crate) fn find_key(&self, key: &[&Value], skip: Option<usize>) -> Option<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .find(|(_, row)| self.key_of(row).as_slice() == key)
            .map(|(i, _)| i)
    }

    fn column_index(&self, column: &str) -> Result<usize, StoreError> {
        self.index
            .get(column)
            .copied()
            .ok_or_else(|| StoreError::ColumnNotFound {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    fn check_value(&self, index: usize, value: &Value) -> Result<(), StoreError> {
        let column = &self.columns[index];
        if column.column_type.accepts(value) {
            Ok(())
        } else {
            Err(StoreError::TypeMismatch {
                table: self.name.clone(),
                column: column.name.clone(),
                expected: column.column_type.name().to_string(),
            })
        }
    }

    fn check_not_null(&self, values: &[Value], operation: &'static str) -> Result<(), StoreError> {
        match self
            .columns
            .iter()
            .zip(values)
            .find(|(c, v)| !c.nullable && v.is_null())
        {
            Some((column, _)) => Err(StoreError::NullViolation {
                table: self.name.clone(),
                column: column.name.clone(),
                operation,
            }),
            None => Ok(()),
        }
    }

    /// Builds and checks a new row without storing it.
    pub(crate) fn prepare_insert(
        &self,
        assignments: &[FieldAssignment],
    ) -> Result<InsertedRow, StoreError> {
        let mut values = vec![Value::Null; self.columns.len()];
        let mut assigned = vec![false; self.columns.len()];
        let mut next_identity = self.next_identity;

        for assignment in assignments {
            let i = self.column_index(&assignment.column)?;
            self.check_value(i, &assignment.value)?;
            values[i] = assignment.value.clone();
            assigned[i] = true;
            if let (true, Value::Int(explicit)) = (self.columns[i].identity, &assignment.value) {
                next_identity = next_identity.max(explicit.saturating_add(1));
            }
        }

        let mut generated = HashMap::new();
        for (i, column) in self.columns.iter().enumerate() {
            if assigned[i] {
                continue;
            }
            if column.identity {
                values[i] = Value::Int(next_identity);
                next_identity += 1;
                generated.insert(column.name.clone(), values[i].clone());
            } else if let Some(default) = &column.default {
                values[i] = default.clone();
            }
        }

        self.check_not_null(&values, "INSERT")?;
        if self.find_key(&self.key_of(&values), None).is_some() {
            return Err(StoreError::DuplicateKey {
                table: self.name.clone(),
                key: self.describe_key(&values),
            });
        }

        Ok(InsertedRow {
            values,
            generated,
            next_identity: (next_identity != self.next_identity).then_some(next_identity),
        })
    }

    /// Computes new images for every row matching `predicate`.
    pub(crate) fn prepare_update(
        &self,
        predicate: Option<&Predicate>,
        assignments: &[FieldAssignment],
    ) -> Result<Vec<(usize, Vec<Value>)>, StoreError> {
        let mut targets = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let i = self.column_index(&assignment.column)?;
            self.check_value(i, &assignment.value)?;
            targets.push((i, &assignment.value));
        }
        let touches_key = targets.iter().any(|(i, _)| self.key.contains(i));

        let mut updated = Vec::new();
        for (index, row) in self.rows.iter().enumerate() {
            let matches = predicate.map_or(true, |p| p.evaluate(&self.row_ref(row)));
            if !matches {
                continue;
            }
            let mut image = row.clone();
            for (i, value) in &targets {
                image[*i] = (*value).clone();
            }
            self.check_not_null(&image, "UPDATE")?;
            if touches_key && self.find_key(&self.key_of(&image), Some(index)).is_some() {
                return Err(StoreError::DuplicateKey {
                    table: self.name.clone(),
                    key: self.describe_key(&image),
                });
            }
            updated.push((index, image));
        }
        Ok(updated)
    }
}
