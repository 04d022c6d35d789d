//! Batched-fetch predicates.
//!
//! A [`Criteria`] is what the loader asks the storage layer for when it flushes
//! one entity class. There are two shapes:
//!
//! - `In`: one field compared against a set of values, `field IN (v1, v2, ...)`.
//!   Used for single-field identifiers and for to-many inverse lookups.
//! - `AnyOf`: a disjunction of conjunctions,
//!   `(a = 1 AND b = 10) OR (a = 2 AND b = 20)`. Used for composite identifiers,
//!   because tuple membership cannot be expressed portably with a single `IN`.
//!
//! SQL-backed ports render a criteria with [`Criteria::select_statement`]; other
//! ports can evaluate it directly with [`Criteria::matches`].

use crate::metadata::{IdentifierValues, OrderBy};
use sea_query::{
    Asterisk, Condition, DynIden, Expr, ExprTrait, Iden, PostgresQueryBuilder, SelectStatement,
    Value,
};

/// Predicate of one batched fetch
#[derive(Debug, Clone, PartialEq)]
pub enum Criteria {
    /// `field IN (values)`
    In { field: String, values: Vec<Value> },
    /// OR of AND-ed identifier groups
    AnyOf(Vec<IdentifierValues>),
}

impl Criteria {
    /// Number of values (`In`) or groups (`AnyOf`)
    pub fn len(&self) -> usize {
        match self {
            Self::In { values, .. } => values.len(),
            Self::AnyOf(groups) => groups.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build the SeaQuery `Condition` for this criteria
    ///
    /// # Example
    ///
    /// ```
    /// use relations_loader::query::Criteria;
    /// use relations_loader::metadata::IdentifierValues;
    /// use sea_query::Value;
    ///
    /// let by_author = Criteria::In {
    ///     field: "author".to_string(),
    ///     values: vec![Value::from(1), Value::from(2)],
    /// };
    /// let _condition = by_author.to_condition();
    ///
    /// let by_membership = Criteria::AnyOf(vec![
    ///     IdentifierValues::new().with("tenant_id", 1).with("id", 10),
    ///     IdentifierValues::new().with("tenant_id", 2).with("id", 20),
    /// ]);
    /// let _condition = by_membership.to_condition();
    /// ```
    pub fn to_condition(&self) -> Condition {
        match self {
            Self::In { field, values } => {
                let col = DynIden::from(field.clone());
                Condition::all().add(Expr::col(col).is_in(values.iter().cloned()))
            }
            Self::AnyOf(groups) => {
                let mut or_condition = Condition::any();
                for group in groups {
                    let mut and_condition = Condition::all();
                    for (field, value) in group.iter() {
                        let col = DynIden::from(field.to_string());
                        and_condition = and_condition.add(Expr::col(col).eq(value.clone()));
                    }
                    or_condition = or_condition.add(and_condition);
                }
                or_condition
            }
        }
    }

    /// `SELECT * FROM table WHERE <criteria> ORDER BY <order_by>`
    pub fn select_statement(&self, table: &str, order_by: &[OrderBy]) -> SelectStatement {
        struct TableName(String);
        impl Iden for TableName {
            fn unquoted(&self) -> &str {
                &self.0
            }
        }

        let mut query = SelectStatement::default();
        query
            .column(Asterisk)
            .from(TableName(table.to_string()))
            .cond_where(self.to_condition());
        for term in order_by {
            query.order_by(DynIden::from(term.field.clone()), term.order.clone());
        }
        query
    }

    /// Render the select statement as inline PostgreSQL, for logs and tests.
    pub fn to_sql(&self, table: &str, order_by: &[OrderBy]) -> String {
        self.select_statement(table, order_by)
            .to_string(PostgresQueryBuilder)
    }

    /// Evaluate the criteria against one row; `resolve` returns a field's value.
    pub fn matches<F>(&self, resolve: F) -> bool
    where
        F: Fn(&str) -> Option<Value>,
    {
        match self {
            Self::In { field, values } => match resolve(field) {
                Some(value) => values.contains(&value),
                None => false,
            },
            Self::AnyOf(groups) => groups.iter().any(|group| {
                group
                    .iter()
                    .all(|(field, value)| resolve(field).as_ref() == Some(value))
            }),
        }
    }

    /// Split into criteria of at most `size` values or groups each.
    pub fn chunks(&self, size: usize) -> Vec<Criteria> {
        let size = size.max(1);
        match self {
            Self::In { field, values } => values
                .chunks(size)
                .map(|chunk| Self::In {
                    field: field.clone(),
                    values: chunk.to_vec(),
                })
                .collect(),
            Self::AnyOf(groups) => groups
                .chunks(size)
                .map(|chunk| Self::AnyOf(chunk.to_vec()))
                .collect(),
        }
    }
}
