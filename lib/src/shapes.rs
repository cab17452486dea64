//! Constraint-shape documents.
//!
//! A shapes document is one node shape (class target or node target) owning
//! an ordered list of minimum-occurrence property shapes. It is built once
//! per run as a structured value and serialized in a single pass; the output
//! is deterministic byte for byte, with property shapes in input order.

use crate::error::{CompletenessError, Result};
use crate::types::{Prefixes, PropertyConstraint, PropertyRef};
use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::{Quad, Subject, Term};
use std::collections::HashMap;

const SH_NODE_SHAPE: &str = "http://www.w3.org/ns/shacl#NodeShape";
const SH_TARGET_CLASS: &str = "http://www.w3.org/ns/shacl#targetClass";
const SH_TARGET_NODE: &str = "http://www.w3.org/ns/shacl#targetNode";
const SH_PROPERTY: &str = "http://www.w3.org/ns/shacl#property";
const SH_PATH: &str = "http://www.w3.org/ns/shacl#path";
const SH_MIN_COUNT: &str = "http://www.w3.org/ns/shacl#minCount";
const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// What the node shape selects: every instance of a class, or one fixed node.
///
/// The term is kept as written (CURIE or full URI) so the serialized document
/// matches its source spreadsheet or CLI argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeTarget {
    Class(String),
    Node(String),
}

impl ShapeTarget {
    pub fn term(&self) -> &str {
        match self {
            ShapeTarget::Class(t) | ShapeTarget::Node(t) => t,
        }
    }
}

/// One node shape plus its ordered property constraints.
#[derive(Debug, Clone)]
pub struct ShapeDocument {
    pub name: String,
    pub target: ShapeTarget,
    pub constraints: Vec<PropertyConstraint>,
    prefixes: Prefixes,
}

/// Builds a shapes document. Pure; identical inputs produce identical
/// documents. Zero properties yield a degenerate, always-conformant shape.
pub fn build_shape(
    name: &str,
    target: ShapeTarget,
    constraints: &[PropertyConstraint],
    prefixes: &Prefixes,
) -> ShapeDocument {
    ShapeDocument {
        name: name.to_string(),
        target,
        constraints: constraints.to_vec(),
        prefixes: prefixes.clone(),
    }
}

impl ShapeDocument {
    /// The target as a full URI, CURIEs expanded.
    pub fn target_uri(&self) -> Result<String> {
        self.prefixes.expand(self.target.term())
    }

    pub fn prefixes(&self) -> &Prefixes {
        &self.prefixes
    }

    /// Serializes the document to Turtle: the fixed prefix block followed by
    /// the node shape and one property shape per constraint.
    pub fn to_turtle(&self) -> String {
        let mut clauses = vec![
            "a sh:NodeShape".to_string(),
            match &self.target {
                ShapeTarget::Class(t) => format!("sh:targetClass {}", self.prefixes.render(t)),
                ShapeTarget::Node(t) => format!("sh:targetNode {}", self.prefixes.render(t)),
            },
        ];
        for constraint in &self.constraints {
            clauses.push(format!(
                "sh:property [ a sh:PropertyShape ;\n        sh:path {} ;\n        sh:minCount {} ]",
                self.prefixes.render(constraint.property.as_str()),
                constraint.min_count
            ));
        }
        format!(
            "{}\nex:{}\n    {} .\n",
            self.prefixes.turtle_header(),
            self.name,
            clauses.join(" ;\n    ")
        )
    }

    /// Parses a Turtle shapes document back into its structured form.
    ///
    /// Constraint order follows document order of the `sh:property` triples.
    pub fn from_turtle(turtle: &str, prefixes: &Prefixes) -> Result<ShapeDocument> {
        let quads = parse_quads(turtle)?;

        let node_shape = quads
            .iter()
            .find(|q| {
                q.predicate.as_str() == RDF_TYPE
                    && matches!(&q.object, Term::NamedNode(n) if n.as_str() == SH_NODE_SHAPE)
            })
            .map(|q| q.subject.clone())
            .ok_or_else(|| CompletenessError::Shapes("no sh:NodeShape found".into()))?;

        let target = quads
            .iter()
            .filter(|q| q.subject == node_shape)
            .find_map(|q| match (q.predicate.as_str(), &q.object) {
                (SH_TARGET_CLASS, Term::NamedNode(n)) => {
                    Some(ShapeTarget::Class(n.as_str().to_string()))
                }
                (SH_TARGET_NODE, Term::NamedNode(n)) => {
                    Some(ShapeTarget::Node(n.as_str().to_string()))
                }
                _ => None,
            })
            .ok_or_else(|| {
                CompletenessError::Shapes("node shape declares no class or node target".into())
            })?;

        // Property shape details keyed by their (blank node) subject.
        let mut paths: HashMap<String, PropertyRef> = HashMap::new();
        let mut min_counts: HashMap<String, u64> = HashMap::new();
        for quad in &quads {
            let key = subject_key(&quad.subject);
            match (quad.predicate.as_str(), &quad.object) {
                (SH_PATH, Term::NamedNode(n)) => {
                    paths.insert(key, PropertyRef::new(n.as_str()));
                }
                (SH_MIN_COUNT, Term::Literal(lit)) => {
                    let count = lit.value().parse::<u64>().map_err(|e| {
                        CompletenessError::Shapes(format!(
                            "sh:minCount {:?} is not an integer: {}",
                            lit.value(),
                            e
                        ))
                    })?;
                    min_counts.insert(key, count);
                }
                _ => {}
            }
        }

        let mut constraints = Vec::new();
        for quad in &quads {
            if quad.subject != node_shape || quad.predicate.as_str() != SH_PROPERTY {
                continue;
            }
            let key = match &quad.object {
                Term::BlankNode(b) => b.as_str().to_string(),
                Term::NamedNode(n) => n.as_str().to_string(),
                other => {
                    return Err(CompletenessError::Shapes(format!(
                        "sh:property value must be a shape, found {}",
                        other
                    )))
                }
            };
            let path = paths.remove(&key).ok_or_else(|| {
                CompletenessError::Shapes("property shape without sh:path".into())
            })?;
            let min_count = min_counts.remove(&key).unwrap_or(1);
            constraints.push(PropertyConstraint::with_min_count(path, min_count));
        }

        let name = match &node_shape {
            Subject::NamedNode(n) => n
                .as_str()
                .rsplit(['#', '/'])
                .next()
                .unwrap_or(n.as_str())
                .to_string(),
            _ => "Shape".to_string(),
        };

        Ok(ShapeDocument {
            name,
            target,
            constraints,
            prefixes: prefixes.clone(),
        })
    }

    /// The checked property list, in constraint order.
    pub fn property_list(&self) -> Vec<PropertyRef> {
        self.constraints
            .iter()
            .map(|c| c.property.clone())
            .collect()
    }
}

fn subject_key(subject: &Subject) -> String {
    match subject {
        Subject::NamedNode(n) => n.as_str().to_string(),
        Subject::BlankNode(b) => b.as_str().to_string(),
        other => other.to_string(),
    }
}

fn parse_quads(turtle: &str) -> Result<Vec<Quad>> {
    RdfParser::from_format(RdfFormat::Turtle)
        .for_reader(turtle.as_bytes())
        .collect::<std::result::Result<Vec<Quad>, _>>()
        .map_err(|e| CompletenessError::Shapes(format!("turtle parse error: {}", e)))
}
