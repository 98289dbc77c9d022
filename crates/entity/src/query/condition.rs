//! Query conditions.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::QueryError;

/// Comparison operators understood by the query builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Eq,
    /// `<>`
    NotEq,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `STARTS_WITH`
    StartsWith,
    /// `CONTAINS`
    Contains,
    /// `ENDS_WITH`
    EndsWith,
    /// `IN`
    In,
    /// `NOT IN`
    NotIn,
    /// `BETWEEN`
    Between,
    /// `NOT BETWEEN`
    NotBetween,
    /// `IS NULL`
    IsNull,
    /// `IS NOT NULL`
    IsNotNull,
}

impl Operator {
    /// Every supported operator, in canonical order.
    pub const ALL: [Operator; 15] = [
        Operator::Eq,
        Operator::NotEq,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::StartsWith,
        Operator::Contains,
        Operator::EndsWith,
        Operator::In,
        Operator::NotIn,
        Operator::Between,
        Operator::NotBetween,
        Operator::IsNull,
        Operator::IsNotNull,
    ];

    /// Returns the wire form of the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "<>",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::StartsWith => "STARTS_WITH",
            Operator::Contains => "CONTAINS",
            Operator::EndsWith => "ENDS_WITH",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NOT BETWEEN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }

    /// Returns true for operators that take no value.
    pub fn is_existence_check(&self) -> bool {
        matches!(self, Operator::IsNull | Operator::IsNotNull)
    }

    /// Returns true for operators whose value must be a list.
    pub fn requires_list(&self) -> bool {
        matches!(
            self,
            Operator::In | Operator::NotIn | Operator::Between | Operator::NotBetween
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| QueryError::UnsupportedOperator {
                operator: s.to_string(),
            })
    }
}

/// How the members of a group combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Conjunction {
    /// Every member must match.
    #[default]
    And,
    /// At least one member must match.
    Or,
}

impl Conjunction {
    /// Returns the wire form of the conjunction.
    pub fn as_str(&self) -> &'static str {
        match self {
            Conjunction::And => "AND",
            Conjunction::Or => "OR",
        }
    }
}

impl FromStr for Conjunction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AND" => Ok(Conjunction::And),
            "OR" => Ok(Conjunction::Or),
            _ => Err(()),
        }
    }
}

/// A member of a condition group.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionMember {
    /// A comparison on a field path.
    Condition {
        /// Dotted storage path.
        field: String,
        /// Comparison value.
        value: Value,
        /// Operator.
        operator: Operator,
    },
    /// The path has at least one non-null value.
    Exists(String),
    /// The path has no non-null value.
    NotExists(String),
    /// A nested group.
    Group(ConditionGroup),
}

/// A group of conditions joined by one conjunction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionGroup {
    conjunction: Conjunction,
    members: Vec<ConditionMember>,
}

impl ConditionGroup {
    /// Creates an empty group.
    pub fn new(conjunction: Conjunction) -> Self {
        Self {
            conjunction,
            members: Vec::new(),
        }
    }

    /// Creates an empty AND group.
    pub fn and() -> Self {
        Self::new(Conjunction::And)
    }

    /// Creates an empty OR group.
    pub fn or() -> Self {
        Self::new(Conjunction::Or)
    }

    /// Adds a comparison.
    pub fn condition(&mut self, field: impl Into<String>, value: Value, operator: Operator) -> &mut Self {
        self.members.push(ConditionMember::Condition {
            field: field.into(),
            value,
            operator,
        });
        self
    }

    /// Adds an existence check.
    pub fn exists(&mut self, field: impl Into<String>) -> &mut Self {
        self.members.push(ConditionMember::Exists(field.into()));
        self
    }

    /// Adds a non-existence check.
    pub fn not_exists(&mut self, field: impl Into<String>) -> &mut Self {
        self.members.push(ConditionMember::NotExists(field.into()));
        self
    }

    /// Adds a nested group.
    pub fn add_group(&mut self, group: ConditionGroup) -> &mut Self {
        self.members.push(ConditionMember::Group(group));
        self
    }

    /// Returns the conjunction.
    pub fn conjunction(&self) -> Conjunction {
        self.conjunction
    }

    /// Returns the members in insertion order.
    pub fn members(&self) -> &[ConditionMember] {
        &self.members
    }

    /// Returns true if the group has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
