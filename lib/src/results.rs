//! SPARQL Results JSON data model.
//!
//! The remote service answers with the W3C `application/sparql-results+json`
//! format (https://www.w3.org/TR/sparql11-results-json/), plus the
//! `typed-literal` binding type that Virtuoso-backed endpoints such as
//! DBpedia emit instead of `literal` + `datatype`.

use crate::error::{CompletenessError, Result};
use crate::types::EntityRef;
use oxigraph::model::{BlankNode, Literal, NamedNode, Term};
use serde::Deserialize;
use std::collections::HashMap;

/// Sentinel recorded in tabular artifacts for plain literals without a
/// language tag. Absence is never persisted as an empty field so that
/// downstream equality comparisons stay unambiguous.
pub const LANG_NOT_SPECIFIED: &str = "not specified";

#[derive(Debug, Clone, Deserialize)]
pub struct SparqlResults {
    pub head: ResultsHead,
    pub results: ResultsBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultsHead {
    #[serde(default)]
    pub vars: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultsBody {
    #[serde(default)]
    pub bindings: Vec<HashMap<String, BindingValue>>,
}

/// One variable binding, discriminated by its `type` field.
///
/// The `type` field is authoritative: a `typed-literal` stays a typed literal
/// even when the row also carries a language tag.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BindingValue {
    Uri {
        value: String,
    },
    Literal {
        value: String,
        #[serde(default)]
        datatype: Option<String>,
        #[serde(default, rename = "xml:lang")]
        lang: Option<String>,
    },
    #[serde(rename = "typed-literal")]
    TypedLiteral {
        value: String,
        datatype: String,
        #[serde(default, rename = "xml:lang")]
        lang: Option<String>,
    },
    Bnode {
        value: String,
    },
}

impl BindingValue {
    pub fn value(&self) -> &str {
        match self {
            BindingValue::Uri { value }
            | BindingValue::Literal { value, .. }
            | BindingValue::TypedLiteral { value, .. }
            | BindingValue::Bnode { value } => value,
        }
    }

    /// The wire-level discriminator, used for the persisted type column.
    pub fn type_tag(&self) -> &'static str {
        match self {
            BindingValue::Uri { .. } => "uri",
            BindingValue::Literal { .. } => "literal",
            BindingValue::TypedLiteral { .. } => "typed-literal",
            BindingValue::Bnode { .. } => "bnode",
        }
    }

    pub fn datatype(&self) -> Option<&str> {
        match self {
            BindingValue::Literal { datatype, .. } => datatype.as_deref(),
            BindingValue::TypedLiteral { datatype, .. } => Some(datatype),
            _ => None,
        }
    }

    /// The language tag with absence normalized to [`LANG_NOT_SPECIFIED`].
    pub fn lang_or_sentinel(&self) -> &str {
        match self {
            BindingValue::Literal { lang, .. } | BindingValue::TypedLiteral { lang, .. } => {
                lang.as_deref().unwrap_or(LANG_NOT_SPECIFIED)
            }
            _ => LANG_NOT_SPECIFIED,
        }
    }

    /// Builds the RDF term for this binding, inspecting the type discriminator
    /// before any language tag.
    pub fn to_term(&self) -> Result<Term> {
        match self {
            BindingValue::Uri { value } => {
                let node = NamedNode::new(value).map_err(|e| CompletenessError::InvalidIri {
                    iri: value.clone(),
                    message: e.to_string(),
                })?;
                Ok(Term::NamedNode(node))
            }
            BindingValue::TypedLiteral {
                value, datatype, ..
            } => typed_literal(value, datatype),
            BindingValue::Literal {
                value,
                datatype: Some(datatype),
                ..
            } => typed_literal(value, datatype),
            BindingValue::Literal { value, lang, .. } => match lang.as_deref() {
                Some(tag) if tag != LANG_NOT_SPECIFIED => {
                    let lit = Literal::new_language_tagged_literal(value, tag).map_err(|e| {
                        CompletenessError::MalformedRow(format!(
                            "invalid language tag {:?}: {}",
                            tag, e
                        ))
                    })?;
                    Ok(Term::Literal(lit))
                }
                _ => Ok(Term::Literal(Literal::new_simple_literal(value))),
            },
            BindingValue::Bnode { value } => {
                let bn = BlankNode::new(value).map_err(|e| {
                    CompletenessError::MalformedRow(format!(
                        "invalid blank node id {:?}: {}",
                        value, e
                    ))
                })?;
                Ok(Term::BlankNode(bn))
            }
        }
    }
}

fn typed_literal(value: &str, datatype: &str) -> Result<Term> {
    let dt = NamedNode::new(datatype).map_err(|e| CompletenessError::InvalidIri {
        iri: datatype.to_string(),
        message: e.to_string(),
    })?;
    Ok(Term::Literal(Literal::new_typed_literal(value, dt)))
}

/// A tabular query result: declared variables plus one binding map per row.
///
/// Rows accumulated across windows preserve no cross-window ordering
/// guarantee beyond "all rows present".
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    pub vars: Vec<String>,
    pub rows: Vec<HashMap<String, BindingValue>>,
}

impl ResultTable {
    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: SparqlResults = serde_json::from_str(json)
            .map_err(|e| CompletenessError::Results(e.to_string()))?;
        Ok(ResultTable {
            vars: parsed.head.vars,
            rows: parsed.results.bindings,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends another table's rows, unioning variable declarations.
    pub fn extend(&mut self, other: ResultTable) {
        for var in other.vars {
            if !self.vars.contains(&var) {
                self.vars.push(var);
            }
        }
        self.rows.extend(other.rows);
    }

    /// The values of one column, skipping rows where the variable is unbound.
    pub fn column<'a>(&'a self, var: &'a str) -> impl Iterator<Item = &'a BindingValue> {
        self.rows.iter().filter_map(move |row| row.get(var))
    }

    /// Extracts the entity list from an instance-query result, in row order.
    pub fn entity_column(&self, var: &str) -> Result<Vec<EntityRef>> {
        let mut entities = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            match row.get(var) {
                Some(BindingValue::Uri { value }) => entities.push(EntityRef::new(value.clone())),
                Some(other) => {
                    return Err(CompletenessError::MalformedRow(format!(
                        "binding ?{} is a {}, expected a resource",
                        var,
                        other.type_tag()
                    )))
                }
                None => {
                    return Err(CompletenessError::MalformedRow(format!(
                        "binding ?{} missing from instance-query row",
                        var
                    )))
                }
            }
        }
        Ok(entities)
    }

    /// Parses the single scalar a COUNT-style query returns.
    pub fn scalar_u64(&self) -> Result<u64> {
        let row = self
            .rows
            .first()
            .ok_or_else(|| CompletenessError::Results("empty result for scalar query".into()))?;
        let var = self
            .vars
            .first()
            .ok_or_else(|| CompletenessError::Results("scalar query declared no variables".into()))?;
        let value = row.get(var).ok_or_else(|| {
            CompletenessError::Results(format!("scalar variable ?{} unbound", var))
        })?;
        value.value().parse::<u64>().map_err(|e| {
            CompletenessError::Results(format!(
                "scalar value {:?} is not an integer: {}",
                value.value(),
                e
            ))
        })
    }
}
