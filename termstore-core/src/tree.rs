//! Two-level term tree reconstructed from flat TOML sections.
//!
//! A bare section `[<term>]` is a term. A compound section
//! `[<term>.taxonomies.<taxonomy>]` is a taxonomy record owned by that term.
//! Identities live only in section names; inside the tree they are map
//! keys, never fields.

use indexmap::IndexMap;

use crate::codec::Sections;
use crate::repository::VP_ID;
use crate::value::Fields;
use crate::vp_id::VpId;

/// Infix joining a term id and a taxonomy id in a compound section name.
pub const TAXONOMIES_INFIX: &str = ".taxonomies.";
/// Table under a term that groups its taxonomies. Not usable as a term field.
pub const TAXONOMIES_KEY: &str = "taxonomies";

/// A term together with its taxonomy records.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Term {
    pub fields: Fields,
    pub taxonomies: IndexMap<VpId, Fields>,
    /// Set when the term was never declared by its own bare section and
    /// exists only because a taxonomy section referenced it.
    pub placeholder: bool,
}

/// All terms of one file, in load order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TermTree {
    pub terms: IndexMap<VpId, Term>,
    /// Sections whose names are not term or taxonomy identities. Carried
    /// through untouched so a write never drops them.
    pub foreign: Sections,
}

enum SectionName {
    Term(VpId),
    Taxonomy(VpId, VpId),
    Invalid,
}

fn classify(name: &str) -> SectionName {
    match name.split_once(TAXONOMIES_INFIX) {
        Some((term, taxonomy)) => match (VpId::parse(term), VpId::parse(taxonomy)) {
            (Ok(term), Ok(taxonomy)) => SectionName::Taxonomy(term, taxonomy),
            _ => SectionName::Invalid,
        },
        None => match VpId::parse(name) {
            Ok(id) => SectionName::Term(id),
            Err(_) => SectionName::Invalid,
        },
    }
}

/// Section fields without a stored `vp_id`; the section name is authoritative.
fn without_identity(fields: &Fields) -> Fields {
    let mut fields = fields.clone();
    fields.shift_remove(VP_ID);
    fields
}

/// Builds the term tree from flat sections.
///
/// Terms are registered first so a taxonomy section that precedes its term
/// still lands on the declared term. A taxonomy whose term never appears
/// gets a placeholder term instead of being dropped.
pub fn reconstruct(sections: &Sections) -> TermTree {
    let mut tree = TermTree::default();

    for (name, fields) in sections {
        if let SectionName::Term(id) = classify(name) {
            tree.terms.insert(
                id,
                Term {
                    fields: without_identity(fields),
                    ..Term::default()
                },
            );
        }
    }

    for (name, fields) in sections {
        match classify(name) {
            SectionName::Term(_) => {}
            SectionName::Taxonomy(term_id, taxonomy_id) => {
                let term = tree.terms.entry(term_id).or_insert_with_key(|id| {
                    tracing::warn!(
                        term = %id,
                        "taxonomy section without term section, using placeholder term"
                    );
                    Term {
                        placeholder: true,
                        ..Term::default()
                    }
                });
                term.taxonomies.insert(taxonomy_id, without_identity(fields));
            }
            SectionName::Invalid => {
                tracing::warn!(
                    section = %name,
                    "section name is not a term or taxonomy identity"
                );
                tree.foreign.insert(name.clone(), fields.clone());
            }
        }
    }

    tree
}

/// Flattens the tree back to sections: each term, then its taxonomies.
pub fn flatten(tree: &TermTree) -> Sections {
    let mut sections = Sections::new();

    for (term_id, term) in &tree.terms {
        if !term.placeholder {
            sections.insert(term_id.to_string(), term.fields.clone());
        }
        for (taxonomy_id, fields) in &term.taxonomies {
            sections.insert(
                format!("{}{}{}", term_id, TAXONOMIES_INFIX, taxonomy_id),
                fields.clone(),
            );
        }
    }

    for (name, fields) in &tree.foreign {
        sections.insert(name.clone(), fields.clone());
    }

    sections
}
