//! Row-level policy predicates.
//!
//! Policies are written as small expressions over the target row and the
//! caller's claims, e.g. `@item.id ne 1234 and @claims.role eq 'editor'`.
//! They are parsed when the catalog loads and resolved into a [`Predicate`]
//! per request, once the claims are known.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::{ColumnType, EntitySchema};
use crate::value::Value;

/// Claim carrying the caller's role.
pub const ROLE_CLAIM: &str = "role";

/// Caller claims (already authenticated upstream).
pub type Claims = HashMap<String, String>;

/// Operation a policy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyAction {
    Create,
    Read,
    Update,
    Delete,
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "eq" => Some(CompareOp::Eq),
            "ne" => Some(CompareOp::Ne),
            "gt" => Some(CompareOp::Gt),
            "ge" => Some(CompareOp::Ge),
            "lt" => Some(CompareOp::Lt),
            "le" => Some(CompareOp::Le),
            _ => None,
        }
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
        }
    }
}

/// Column reference (physical name) or literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(String),
    Literal(Value),
}

/// Read access to a row by physical column name.
pub trait RowLookup {
    fn get(&self, column: &str) -> Option<&Value>;
}

impl RowLookup for HashMap<String, Value> {
    fn get(&self, column: &str) -> Option<&Value> {
        HashMap::get(self, column)
    }
}

/// Row filter evaluated by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    And(Vec<Predicate>),
    Const(bool),
}

impl Predicate {
    /// `column = value`
    pub fn column_eq(column: impl Into<String>, value: Value) -> Self {
        Predicate::Compare {
            left: Operand::Column(column.into()),
            op: CompareOp::Eq,
            right: Operand::Literal(value),
        }
    }

    /// Conjunction, flattening nested `And`s.
    pub fn and(self, other: Predicate) -> Self {
        let mut terms = match self {
            Predicate::And(terms) => terms,
            p => vec![p],
        };
        match other {
            Predicate::And(more) => terms.extend(more),
            p => terms.push(p),
        }
        Predicate::And(terms)
    }

    /// Evaluates against a row. Comparisons involving NULL, unknown
    /// columns or incomparable kinds are false.
    pub fn evaluate(&self, row: &dyn RowLookup) -> bool {
        match self {
            Predicate::Const(b) => *b,
            Predicate::And(terms) => terms.iter().all(|t| t.evaluate(row)),
            Predicate::Compare { left, op, right } => {
                let (Some(l), Some(r)) = (operand_value(left, row), operand_value(right, row))
                else {
                    return false;
                };
                l.compare(r).is_some_and(|ordering| op.holds(ordering))
            }
        }
    }
}

fn operand_value<'a>(operand: &'a Operand, row: &'a dyn RowLookup) -> Option<&'a Value> {
    match operand {
        Operand::Column(name) => row.get(name),
        Operand::Literal(value) => Some(value),
    }
}

/// Errors while parsing a policy expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyParseError {
    #[error("Policy expression is empty")]
    Empty,

    #[error("Unexpected token '{0}' in policy expression")]
    UnexpectedToken(String),

    #[error("Unknown operator '{0}' in policy expression")]
    UnknownOperator(String),

    #[error("Unterminated string literal in policy expression")]
    UnterminatedString,

    #[error("Incomplete comparison in policy expression")]
    Incomplete,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
enum PolicyOperand {
    Item(String),
    Claim(String),
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq)]
struct PolicyTerm {
    left: PolicyOperand,
    op: CompareOp,
    right: PolicyOperand,
}

/// Parsed, unresolved policy expression.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyExpression {
    source: String,
    terms: Vec<PolicyTerm>,
}

impl PolicyExpression {
    /// Parses `comparison ( and comparison )*`.
    pub fn parse(source: &str) -> Result<Self, PolicyParseError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(PolicyParseError::Empty);
        }

        let mut terms = Vec::new();
        let mut iter = tokens.into_iter();
        loop {
            let left = parse_operand(iter.next().ok_or(PolicyParseError::Incomplete)?)?;
            let op = match iter.next() {
                Some(Token::Word(w)) => {
                    CompareOp::parse(&w).ok_or(PolicyParseError::UnknownOperator(w))?
                }
                Some(Token::Str(s)) => return Err(PolicyParseError::UnknownOperator(s)),
                None => return Err(PolicyParseError::Incomplete),
            };
            let right = parse_operand(iter.next().ok_or(PolicyParseError::Incomplete)?)?;
            terms.push(PolicyTerm { left, op, right });

            match iter.next() {
                None => break,
                Some(Token::Word(w)) if w.eq_ignore_ascii_case("and") => continue,
                Some(Token::Word(w)) | Some(Token::Str(w)) => {
                    return Err(PolicyParseError::UnexpectedToken(w))
                }
            }
        }

        Ok(Self {
            source: source.to_string(),
            terms,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the first `@item` field the entity does not expose.
    pub fn unknown_field(&self, entity: &EntitySchema) -> Option<&str> {
        self.terms
            .iter()
            .flat_map(|t| [&t.left, &t.right])
            .find_map(|operand| match operand {
                PolicyOperand::Item(field) if entity.column_by_exposed(field).is_none() => {
                    Some(field.as_str())
                }
                _ => None,
            })
    }

    /// Substitutes claims and maps fields to physical columns.
    ///
    /// A term whose claim is missing or whose literal does not fit the
    /// compared column resolves to `false`, so policies only ever narrow.
    pub fn resolve(&self, entity: &EntitySchema, claims: &Claims) -> Predicate {
        let mut resolved = self.terms.iter().map(|term| {
            let left = resolve_operand(&term.left, &term.right, entity, claims);
            let right = resolve_operand(&term.right, &term.left, entity, claims);
            match (left, right) {
                (Some(left), Some(right)) => Predicate::Compare {
                    left,
                    op: term.op,
                    right,
                },
                _ => Predicate::Const(false),
            }
        });
        let first = resolved.next().unwrap_or(Predicate::Const(false));
        resolved.fold(first, Predicate::and)
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, PolicyParseError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '\'' {
            chars.next();
            let mut literal = String::new();
            loop {
                match chars.next() {
                    Some('\'') if chars.peek() == Some(&'\'') => {
                        chars.next();
                        literal.push('\'');
                    }
                    Some('\'') => break,
                    Some(ch) => literal.push(ch),
                    None => return Err(PolicyParseError::UnterminatedString),
                }
            }
            tokens.push(Token::Str(literal));
        } else {
            let mut word = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                word.push(ch);
                chars.next();
            }
            tokens.push(Token::Word(word));
        }
    }
    Ok(tokens)
}

fn parse_operand(token: Token) -> Result<PolicyOperand, PolicyParseError> {
    let word = match token {
        Token::Str(s) => return Ok(PolicyOperand::Literal(Value::Text(s))),
        Token::Word(w) => w,
    };
    if let Some(field) = word.strip_prefix("@item.") {
        return Ok(PolicyOperand::Item(field.to_string()));
    }
    if let Some(claim) = word.strip_prefix("@claims.") {
        return Ok(PolicyOperand::Claim(claim.to_string()));
    }
    let literal = match word.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => {
            if let Ok(i) = word.parse::<i64>() {
                Value::Int(i)
            } else if let Ok(f) = word.parse::<f64>() {
                Value::Float(f)
            } else {
                return Err(PolicyParseError::UnexpectedToken(word));
            }
        }
    };
    Ok(PolicyOperand::Literal(literal))
}

fn counterpart_type(other: &PolicyOperand, entity: &EntitySchema) -> Option<ColumnType> {
    match other {
        PolicyOperand::Item(field) => entity.column_by_exposed(field).map(|c| c.column_type),
        _ => None,
    }
}

fn resolve_operand(
    operand: &PolicyOperand,
    other: &PolicyOperand,
    entity: &EntitySchema,
    claims: &Claims,
) -> Option<Operand> {
    match operand {
        PolicyOperand::Item(field) => {
            let column = entity.column_by_exposed(field)?;
            Some(Operand::Column(entity.physical_column(column).to_string()))
        }
        PolicyOperand::Claim(name) => {
            let raw = claims.get(name)?;
            let value = match counterpart_type(other, entity) {
                Some(column_type) => column_type.parse_literal(raw)?,
                None => Value::Text(raw.clone()),
            };
            Some(Operand::Literal(value))
        }
        PolicyOperand::Literal(Value::Text(raw)) => {
            let value = match counterpart_type(other, entity) {
                Some(column_type) => column_type.parse_literal(raw)?,
                None => Value::Text(raw.clone()),
            };
            Some(Operand::Literal(value))
        }
        PolicyOperand::Literal(value) => Some(Operand::Literal(value.clone())),
    }
}

/// Source of row filters derived from caller claims.
pub trait PolicyResolver: Send + Sync {
    fn resolve_predicate(
        &self,
        entity: &EntitySchema,
        action: PolicyAction,
        claims: &Claims,
    ) -> Option<Predicate>;
}

/// Resolver that never restricts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPolicies;

impl PolicyResolver for NoPolicies {
    fn resolve_predicate(&self, _: &EntitySchema, _: PolicyAction, _: &Claims) -> Option<Predicate> {
        None
    }
}

/// Resolver backed by policies declared in the catalog file, keyed by
/// entity, role and action.
#[derive(Debug, Default)]
pub struct CatalogPolicyResolver {
    rules: HashMap<(String, String, PolicyAction), PolicyExpression>,
}

impl CatalogPolicyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(
        &mut self,
        entity: impl Into<String>,
        role: impl Into<String>,
        action: PolicyAction,
        expression: PolicyExpression,
    ) {
        self.rules
            .insert((entity.into(), role.into(), action), expression);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl PolicyResolver for CatalogPolicyResolver {
    fn resolve_predicate(
        &self,
        entity: &EntitySchema,
        action: PolicyAction,
        claims: &Claims,
    ) -> Option<Predicate> {
        let role = claims.get(ROLE_CLAIM)?;
        let key = (entity.name().to_string(), role.clone(), action);
        let expression = self.rules.get(&key)?;
        tracing::debug!(
            "Applying {:?} policy '{}' on {} for role {}",
            action,
            expression.source(),
            entity.name(),
            role
        );
        Some(expression.resolve(entity, claims))
    }
}
