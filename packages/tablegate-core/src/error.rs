//! Gateway error types.

use thiserror::Error;

/// Sub-status reported for request validation failures.
pub const SUB_STATUS_BAD_REQUEST: &str = "BadRequest";
/// Sub-status reported when the target row does not exist.
pub const SUB_STATUS_ENTITY_NOT_FOUND: &str = "EntityNotFound";
/// Sub-status reported when the store rejects a statement.
pub const SUB_STATUS_DATABASE_OPERATION_FAILED: &str = "DatabaseOperationFailed";
/// Sub-status reported for invariant violations and internal faults.
pub const SUB_STATUS_UNEXPECTED_ERROR: &str = "UnexpectedError";

/// Errors surfaced by the PUT pipeline.
///
/// Every user-facing variant renders a fixed message template that names the
/// offending entity, field, column or value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// Entity name or REST path is not in the catalog
    #[error("Entity {entity} not found.")]
    EntityNotRecognized { entity: String },

    /// PUT requests do not accept query strings
    #[error("Query string for PUT requests is an invalid url.")]
    QueryStringNotAllowed,

    /// Body is not a JSON object
    #[error("Invalid request body. Expected a JSON object: {detail}.")]
    MalformedBody { detail: String },

    /// No primary key segments in the URL
    #[error("Primary Key for UPSERT requests is required.")]
    RouteMissing,

    /// URL segments do not enumerate exactly the primary key columns
    #[error("Primary key column(s) provided do not match DB schema.")]
    RouteMismatch,

    /// A literal could not be parsed into the column's declared type
    #[error("Parameter \"{value}\" cannot be resolved as column \"{column}\" with type \"{type_name}\".")]
    UncastableValue {
        value: String,
        column: String,
        type_name: String,
    },

    /// Body names a field the entity does not expose
    #[error("Invalid request body. Contained unexpected fields in body: {field}")]
    UnknownField { field: String },

    /// JSON null supplied for a non-nullable column
    #[error("Invalid value for field {field} in request body.")]
    InvalidNullValue { field: String },

    /// Required column absent from a full-replace body
    #[error("Invalid request body. Missing field in body: {field}.")]
    MissingField { field: String },

    /// JSON kind or range does not fit the column type
    #[error("Invalid value for field {field} in request body: expected {expected}.")]
    InvalidValue { field: String, expected: String },

    /// Body supplies a value for a store-generated column
    #[error("Invalid request body. Field {field} is autogenerated and cannot be supplied.")]
    AutogeneratedFieldSupplied { field: String },

    /// Body supplies a key field that disagrees with the URL
    #[error("Invalid request body. Primary key field {field} does not match the value in the URL.")]
    PrimaryKeyConflict { field: String },

    /// View write touches a column outside its single base table
    #[error("Cannot perform UPSERT on view {view}: field {field} does not belong to its base table.")]
    ViewMultiTableUpdate { view: String, field: String },

    /// Update matched nothing and insert is not permitted
    #[error("Cannot perform INSERT and could not find {entity} with primary key <{key}> to perform UPDATE on.")]
    EntityNotFound { entity: String, key: String },

    /// Store rejected a statement; message passed through
    #[error("{message}")]
    DatabaseOperationFailed { message: String },

    /// Update predicate matched more than one row
    #[error("Primary key predicate on {entity} matched {rows} rows.")]
    MultipleRowsAffected { entity: String, rows: u64 },

    /// Caller went away before the transaction committed
    #[error("Request was cancelled before the mutation committed.")]
    Cancelled,

    /// Internal fault
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::EntityNotRecognized { .. } | GatewayError::EntityNotFound { .. } => 404,
            GatewayError::Cancelled => 408,
            GatewayError::MultipleRowsAffected { .. } | GatewayError::Internal(_) => 500,
            _ => 400,
        }
    }

    /// Sub-status string carried in the error body.
    pub fn sub_status(&self) -> &'static str {
        match self {
            GatewayError::EntityNotRecognized { .. } | GatewayError::EntityNotFound { .. } => {
                SUB_STATUS_ENTITY_NOT_FOUND
            }
            GatewayError::DatabaseOperationFailed { .. } => SUB_STATUS_DATABASE_OPERATION_FAILED,
            GatewayError::MultipleRowsAffected { .. }
            | GatewayError::Cancelled
            | GatewayError::Internal(_) => SUB_STATUS_UNEXPECTED_ERROR,
            _ => SUB_STATUS_BAD_REQUEST,
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(e: StoreError) -> Self {
        GatewayError::DatabaseOperationFailed {
            message: e.to_string(),
        }
    }
}

/// Errors raised by the mutation executor boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Target table does not exist in the store
    #[error("Invalid object name '{0}'.")]
    TableNotFound(String),

    /// Statement references an unknown column
    #[error("Invalid column name '{column}' in table '{table}'.")]
    ColumnNotFound { table: String, column: String },

    /// NULL written to a NOT NULL column
    #[error("Cannot insert the value NULL into column '{column}', table '{table}'; column does not allow nulls. {operation} fails.")]
    NullViolation {
        table: String,
        column: String,
        operation: &'static str,
    },

    /// Insert collides with an existing primary key
    #[error("Violation of PRIMARY KEY constraint on table '{table}'. Cannot insert duplicate key ({key}).")]
    DuplicateKey { table: String, key: String },

    /// Value does not fit the stored column type
    #[error("Type mismatch for column '{column}' in table '{table}': expected {expected}")]
    TypeMismatch {
        table: String,
        column: String,
        expected: String,
    },

    /// Transaction used after commit or abort
    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),
}
