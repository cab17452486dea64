use crate::error::{CompletenessError, Result};
use oxigraph::model::NamedNode;
use std::fmt;

/// An opaque resource identifier for one subject in the graph.
///
/// Entity references are parsed from query results and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef(String);

impl EntityRef {
    pub fn new(uri: impl Into<String>) -> Self {
        EntityRef(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `<uri>` rendering used in VALUES clauses and the derived CSV column.
    pub fn bracketed(&self) -> String {
        format!("<{}>", self.0)
    }

    pub fn to_named_node(&self) -> Result<NamedNode> {
        NamedNode::new(&self.0).map_err(|e| CompletenessError::InvalidIri {
            iri: self.0.clone(),
            message: e.to_string(),
        })
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A predicate URI identifying one checked property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyRef(String);

impl PropertyRef {
    pub fn new(uri: impl Into<String>) -> Self {
        PropertyRef(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn bracketed(&self) -> String {
        format!("<{}>", self.0)
    }

    pub fn to_named_node(&self) -> Result<NamedNode> {
        NamedNode::new(&self.0).map_err(|e| CompletenessError::InvalidIri {
            iri: self.0.clone(),
            message: e.to_string(),
        })
    }
}

impl fmt::Display for PropertyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A property together with its declared minimum-occurrence constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyConstraint {
    pub property: PropertyRef,
    pub min_count: u64,
}

impl PropertyConstraint {
    /// A constraint with the default cardinality of 1.
    pub fn new(property: PropertyRef) -> Self {
        PropertyConstraint {
            property,
            min_count: 1,
        }
    }

    pub fn with_min_count(property: PropertyRef, min_count: u64) -> Self {
        PropertyConstraint {
            property,
            min_count,
        }
    }
}

/// One failed minCount check as emitted by the constraint engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintViolation {
    pub focus_node: EntityRef,
    pub path: PropertyRef,
}

/// An immutable, ordered prefix-to-namespace mapping.
///
/// Passed into the shape builder and anything expanding CURIEs; never a
/// shared global.
#[derive(Debug, Clone)]
pub struct Prefixes {
    entries: Vec<(String, String)>,
}

impl Prefixes {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Prefixes { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, n)| (p.as_str(), n.as_str()))
    }

    /// The `@prefix` block emitted at the top of every shapes document.
    pub fn turtle_header(&self) -> String {
        let mut out = String::new();
        for (prefix, namespace) in self.iter() {
            out.push_str(&format!("@prefix {}: <{}> .\n", prefix, namespace));
        }
        out
    }

    /// Expands `prefix:local` to a full URI; full URIs pass through unchanged.
    pub fn expand(&self, term: &str) -> Result<String> {
        let trimmed = term.trim_start_matches('<').trim_end_matches('>');
        if trimmed.contains("://") {
            return Ok(trimmed.to_string());
        }
        if let Some((prefix, local)) = trimmed.split_once(':') {
            for (p, namespace) in self.iter() {
                if p == prefix {
                    return Ok(format!("{}{}", namespace, local));
                }
            }
        }
        Err(CompletenessError::InvalidIri {
            iri: term.to_string(),
            message: "not a full URI and no matching prefix".to_string(),
        })
    }

    /// Renders a CURIE or URI the way it should appear in Turtle or SPARQL
    /// text: full URIs get angle brackets, CURIEs stay as-is.
    pub fn render(&self, term: &str) -> String {
        let trimmed = term.trim_start_matches('<').trim_end_matches('>');
        if trimmed.contains("://") {
            format!("<{}>", trimmed)
        } else {
            trimmed.to_string()
        }
    }
}

impl Default for Prefixes {
    fn default() -> Self {
        let entries = [
            ("dash", "http://datashapes.org/dash#"),
            ("dbc", "http://dbpedia.org/resource/Category:"),
            ("dbo", "http://dbpedia.org/ontology/"),
            ("dbp", "http://dbpedia.org/property/"),
            ("dbr", "http://dbpedia.org/resource/"),
            ("dct", "http://purl.org/dc/terms/"),
            ("ex", "http://example.org/ns#"),
            ("foaf", "http://xmlns.com/foaf/0.1/"),
            ("geo", "http://www.opengis.net/ont/geosparql#"),
            ("owl", "http://www.w3.org/2002/07/owl#"),
            ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
            ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
            ("schema", "http://schema.org/"),
            ("sh", "http://www.w3.org/ns/shacl#"),
            ("skos", "http://www.w3.org/2004/02/skos/core#"),
            ("xsd", "http://www.w3.org/2001/XMLSchema#"),
            ("wd", "http://www.wikidata.org/entity/"),
            ("wdt", "http://www.wikidata.org/prop/direct/"),
        ];
        Prefixes::new(
            entries
                .iter()
                .map(|(p, n)| (p.to_string(), n.to_string()))
                .collect(),
        )
    }
}
