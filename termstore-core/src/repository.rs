//! Term/taxonomy repository over a single TOML file.
//!
//! Taxonomies are stored together with their terms. A term is a bare
//! section, each of its taxonomies a compound section beneath it:
//!
//! ```text
//! [8ABB7E35241445A096E60C67977EEA52]
//! name = "Uncategorized"
//! slug = "uncategorized"
//! term_group = 0
//!
//! [8ABB7E35241445A096E60C67977EEA52.taxonomies.B915DEDDA9634BE38367AD6A65D8CA8B]
//! taxonomy = "category"
//! description = ""
//! ```
//!
//! Every operation reloads the file first and writes it back only when the
//! tree actually changed.

use indexmap::IndexMap;
use serde::Serialize;

use crate::change_info::{ChangeAction, ChangeInfo};
use crate::codec;
use crate::storage::{RawStorage, SingleFileStorage, StorageError};
use crate::tree::{self, Term, TermTree, TAXONOMIES_KEY};
use crate::value::{Fields, Value};
use crate::vp_id::VpId;

/// Identity field of every record.
pub const VP_ID: &str = "vp_id";
/// Back-reference from a taxonomy to its term. Injected on read only.
pub const VP_TERM_ID: &str = "vp_term_id";
/// Discriminator naming the taxonomy a record belongs to.
pub const TAXONOMY_FIELD: &str = "taxonomy";
/// Display name of a term.
pub const NAME_FIELD: &str = "name";
/// Derived usage counter.
pub const COUNT_FIELD: &str = "count";

/// Fields accepted in taxonomy updates but never persisted. They are either
/// derived on read or database ids that differ between installations.
pub const NOT_SAVED_FIELDS: &[&str] = &[VP_TERM_ID, COUNT_FIELD, "term_id", "term_taxonomy_id"];

/// A taxonomy record as handed out to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxonomyRecord {
    pub vp_id: VpId,
    pub vp_term_id: VpId,
    #[serde(flatten)]
    pub fields: Fields,
}

impl TaxonomyRecord {
    /// The record's `taxonomy` value.
    pub fn taxonomy(&self) -> Option<&str> {
        self.fields.get(TAXONOMY_FIELD).and_then(Value::as_str)
    }

    /// Flattens the record into a field bag with `vp_id` and `vp_term_id`
    /// injected.
    pub fn into_fields(self) -> Fields {
        let mut out = Fields::with_capacity(self.fields.len() + 2);
        out.insert(VP_ID.to_string(), Value::String(self.vp_id.to_string()));
        out.insert(
            VP_TERM_ID.to_string(),
            Value::String(self.vp_term_id.to_string()),
        );
        for (key, value) in self.fields {
            out.entry(key).or_insert(value);
        }
        out
    }
}

/// Repository for taxonomies nested under terms.
pub struct TermTaxonomyStorage<S = SingleFileStorage> {
    storage: S,
}

impl<S: RawStorage> TermTaxonomyStorage<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Returns the underlying raw storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Creates or merges a taxonomy record.
    ///
    /// The owning term is the one that already holds `vp_id`, or else the
    /// one named by `vp_term_id`. Returns `None` when no term resolves or
    /// the merge changes nothing.
    pub fn save(&self, update: &Fields) -> Result<Option<ChangeInfo>, StorageError> {
        let taxonomy_id = required_id(update, VP_ID)?;
        check_fields(update)?;
        let hint = term_hint(update);

        let mut tree = self.load_tree()?;
        let Some(term_id) = find_term_id(&tree, &taxonomy_id, hint.as_ref()) else {
            tracing::debug!(taxonomy = %taxonomy_id, "no term owns taxonomy, nothing to save");
            return Ok(None);
        };
        let Some(term) = tree.terms.get_mut(&term_id) else {
            return Ok(None);
        };

        let original = term.taxonomies.clone();
        let is_new = !original.contains_key(&taxonomy_id);

        let record = term.taxonomies.entry(taxonomy_id.clone()).or_default();
        for (key, value) in update {
            if key == VP_ID || NOT_SAVED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            record.insert(key.clone(), value.clone());
        }

        if term.taxonomies == original {
            tracing::debug!(taxonomy = %taxonomy_id, "taxonomy unchanged, skipping write");
            return Ok(None);
        }

        let change = ChangeInfo::taxonomy_change(
            term_id.clone(),
            term_name(term),
            term.taxonomies
                .get(&taxonomy_id)
                .and_then(|r| r.get(TAXONOMY_FIELD))
                .map(Value::to_string),
        );

        self.save_tree(&tree)?;
        let inferred = if is_new {
            ChangeAction::Create
        } else {
            ChangeAction::Edit
        };
        tracing::info!(
            term = %term_id,
            taxonomy = %taxonomy_id,
            action = %inferred,
            "saved taxonomy"
        );

        Ok(Some(change))
    }

    /// Removes a taxonomy record from its term.
    ///
    /// The change record describes the term as it was before the removal.
    pub fn delete(&self, restriction: &Fields) -> Result<Option<ChangeInfo>, StorageError> {
        let taxonomy_id = required_id(restriction, VP_ID)?;
        let hint = term_hint(restriction);

        let mut tree = self.load_tree()?;
        let Some(term_id) = find_term_id(&tree, &taxonomy_id, hint.as_ref()) else {
            tracing::debug!(taxonomy = %taxonomy_id, "no term owns taxonomy, nothing to delete");
            return Ok(None);
        };
        let Some(term) = tree.terms.get_mut(&term_id) else {
            return Ok(None);
        };

        let original_term = term.clone();
        let Some(removed) = term.taxonomies.shift_remove(&taxonomy_id) else {
            tracing::debug!(taxonomy = %taxonomy_id, "taxonomy not present, nothing to delete");
            return Ok(None);
        };

        let change = ChangeInfo::taxonomy_change(
            term_id.clone(),
            term_name(&original_term),
            removed.get(TAXONOMY_FIELD).map(Value::to_string),
        );

        self.save_tree(&tree)?;
        tracing::info!(term = %term_id, taxonomy = %taxonomy_id, "deleted taxonomy");

        Ok(Some(change))
    }

    /// Loads a single taxonomy record by identity.
    pub fn load_entity(&self, id: &VpId) -> Result<Option<TaxonomyRecord>, StorageError> {
        let tree = self.load_tree()?;

        Ok(tree.terms.iter().find_map(|(term_id, term)| {
            term.taxonomies.get(id).map(|fields| TaxonomyRecord {
                vp_id: id.clone(),
                vp_term_id: term_id.clone(),
                fields: fields.clone(),
            })
        }))
    }

    /// Loads every taxonomy record across all terms, keyed by identity.
    pub fn load_all(&self) -> Result<IndexMap<VpId, TaxonomyRecord>, StorageError> {
        let tree = self.load_tree()?;
        let mut all = IndexMap::new();

        for (term_id, term) in tree.terms {
            for (taxonomy_id, fields) in term.taxonomies {
                all.insert(
                    taxonomy_id.clone(),
                    TaxonomyRecord {
                        vp_id: taxonomy_id,
                        vp_term_id: term_id.clone(),
                        fields,
                    },
                );
            }
        }

        Ok(all)
    }

    /// Checks whether any term holds a taxonomy with this identity.
    pub fn exists(&self, id: &VpId) -> Result<bool, StorageError> {
        let tree = self.load_tree()?;
        Ok(tree.terms.values().any(|term| term.taxonomies.contains_key(id)))
    }

    /// Returns false for updates that carry nothing but the usage counter
    /// and the two identity columns.
    pub fn should_be_saved(&self, data: &Fields) -> bool {
        !(data.len() == 3
            && data.contains_key(COUNT_FIELD)
            && data.contains_key(self.storage.id_column_name())
            && data.contains_key(VP_ID))
    }

    /// Creates a term or merges fields into an existing one.
    ///
    /// The term's taxonomies are left as they are.
    pub fn save_term(&self, update: &Fields) -> Result<Option<ChangeInfo>, StorageError> {
        let term_id = required_id(update, VP_ID)?;
        check_fields(update)?;
        if update.contains_key(TAXONOMIES_KEY) {
            return Err(StorageError::InvalidUpdate(format!(
                "`{}` is reserved for nested taxonomies",
                TAXONOMIES_KEY
            )));
        }

        let mut tree = self.load_tree()?;
        let is_new = tree.terms.get(&term_id).map_or(true, |term| term.placeholder);
        let term = tree.terms.entry(term_id.clone()).or_default();
        let original = term.clone();

        term.placeholder = false;
        for (key, value) in update {
            if key == VP_ID || NOT_SAVED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            term.fields.insert(key.clone(), value.clone());
        }

        if *term == original {
            tracing::debug!(term = %term_id, "term unchanged, skipping write");
            return Ok(None);
        }

        let action = if is_new {
            ChangeAction::Create
        } else {
            ChangeAction::Edit
        };
        let change = ChangeInfo::term_change(action, term_id.clone(), term_name(term));

        self.save_tree(&tree)?;
        tracing::info!(term = %term_id, action = %action, "saved term");

        Ok(Some(change))
    }

    /// Loads a term's own fields with `vp_id` injected.
    pub fn load_term(&self, id: &VpId) -> Result<Option<Fields>, StorageError> {
        let tree = self.load_tree()?;

        Ok(tree.terms.get(id).map(|term| {
            let mut out = Fields::with_capacity(term.fields.len() + 1);
            out.insert(VP_ID.to_string(), Value::String(id.to_string()));
            for (key, value) in &term.fields {
                out.entry(key.clone()).or_insert_with(|| value.clone());
            }
            out
        }))
    }

    fn load_tree(&self) -> Result<TermTree, StorageError> {
        let Some(text) = self.storage.read_raw()? else {
            return Ok(TermTree::default());
        };

        let tree = tree::reconstruct(&codec::deserialize(&text)?);
        tracing::debug!(terms = tree.terms.len(), "loaded term tree");

        Ok(tree)
    }

    fn save_tree(&self, tree: &TermTree) -> Result<(), StorageError> {
        let text = codec::serialize(&tree::flatten(tree))?;
        self.storage.write_raw(&text)
    }
}

/// Finds the term owning `taxonomy_id`, falling back to the hinted term.
///
/// A taxonomy that already belongs to a term stays there: a hint naming a
/// different term is ignored rather than moving the record.
fn find_term_id(tree: &TermTree, taxonomy_id: &VpId, hint: Option<&VpId>) -> Option<VpId> {
    let owner = tree
        .terms
        .iter()
        .find(|(_, term)| term.taxonomies.contains_key(taxonomy_id))
        .map(|(id, _)| id.clone());

    match (owner, hint) {
        (Some(owner), Some(hint)) if owner != *hint => {
            tracing::warn!(
                taxonomy = %taxonomy_id,
                owner = %owner,
                hint = %hint,
                "taxonomy already belongs to another term, ignoring term hint"
            );
            Some(owner)
        }
        (Some(owner), _) => Some(owner),
        (None, Some(hint)) if tree.terms.contains_key(hint) => Some(hint.clone()),
        (None, _) => None,
    }
}

fn term_name(term: &Term) -> Option<String> {
    term.fields.get(NAME_FIELD).map(Value::to_string)
}

fn field_id(data: &Fields, field: &str) -> Option<Result<VpId, String>> {
    let raw = match data.get(field)? {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        other => return Some(Err(format!("must be a string, got {}", other))),
    };
    Some(VpId::parse(&raw).map_err(|e| e.to_string()))
}

fn required_id(data: &Fields, field: &str) -> Result<VpId, StorageError> {
    match field_id(data, field) {
        Some(Ok(id)) => Ok(id),
        Some(Err(e)) => Err(StorageError::InvalidUpdate(format!("`{}`: {}", field, e))),
        None => Err(StorageError::InvalidUpdate(format!("missing `{}`", field))),
    }
}

/// The `vp_term_id` hint. One that cannot name a term resolves nothing.
fn term_hint(data: &Fields) -> Option<VpId> {
    match field_id(data, VP_TERM_ID)? {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unusable term hint");
            None
        }
    }
}

/// Rejects keys that cannot be stored as field names and floats that would
/// never compare equal to themselves.
fn check_fields(update: &Fields) -> Result<(), StorageError> {
    for (key, value) in update {
        if let Err(reason) = check_key(key) {
            return Err(StorageError::InvalidUpdate(format!(
                "field {:?}: {}",
                key, reason
            )));
        }
        if let Value::Float(f) = value {
            if !f.is_finite() {
                return Err(StorageError::InvalidUpdate(format!(
                    "field {:?} is not a finite number",
                    key
                )));
            }
        }
    }
    Ok(())
}

fn check_key(key: &str) -> Result<(), &'static str> {
    if key.is_empty() {
        return Err("empty key");
    }
    if key.trim() != key {
        return Err("surrounding whitespace");
    }
    if key.contains(['=', '\n', '\r']) {
        return Err("contains `=` or a line break");
    }
    if key.starts_with(['[', ';', '#']) {
        return Err("starts with a section or comment marker");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(s: &str) -> VpId {
        VpId::parse(s).unwrap()
    }

    fn fields(pairs: &[(&str, Value)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn test_repo(initial: Option<&str>) -> (TermTaxonomyStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = SingleFileStorage::new(temp_dir.path().join("terms.toml"), "term_taxonomy_id");
        if let Some(text) = initial {
            storage.write_raw(text).unwrap();
        }
        (TermTaxonomyStorage::new(storage), temp_dir)
    }

    fn raw(repo: &TermTaxonomyStorage) -> String {
        repo.storage().read_raw().unwrap().unwrap_or_default()
    }

    const TWO_TAXONOMIES: &str = r#"[P]
name = "News"

[P.taxonomies.C1]
taxonomy = "category"
a = 1
b = 2

[P.taxonomies.C2]
taxonomy = "post_tag"
"#;

    #[test]
    fn test_save_creates_taxonomy_under_hinted_term() {
        let (repo, _temp) = test_repo(Some("[P1]\nname = \"News\"\n"));

        let change = repo
            .save(&fields(&[
                ("vp_id", "T1".into()),
                ("vp_term_id", "P1".into()),
                ("taxonomy", "category".into()),
                ("name", "News".into()),
            ]))
            .unwrap()
            .unwrap();

        assert_eq!(change.action, ChangeAction::Edit);
        assert_eq!(change.term_vp_id, id("P1"));
        assert_eq!(change.term_name.as_deref(), Some("News"));
        assert_eq!(change.taxonomy.as_deref(), Some("category"));

        let text = raw(&repo);
        assert!(text.contains("[P1]\nname = \"News\"\n"));
        assert!(text.contains("[P1.taxonomies.T1]\ntaxonomy = \"category\"\nname = \"News\"\n"));
    }

    #[test]
    fn test_save_without_resolvable_term_is_noop() {
        let (repo, _temp) = test_repo(Some("[P1]\n"));

        let result = repo
            .save(&fields(&[
                ("vp_id", "T1".into()),
                ("vp_term_id", "MISSING".into()),
                ("taxonomy", "category".into()),
            ]))
            .unwrap();
        assert!(result.is_none());

        let result = repo
            .save(&fields(&[("vp_id", "T1".into()), ("taxonomy", "category".into())]))
            .unwrap();
        assert!(result.is_none());
        assert_eq!(raw(&repo), "[P1]\n");
    }

    #[test]
    fn test_save_on_missing_file_is_noop() {
        let (repo, _temp) = test_repo(None);
        let result = repo
            .save(&fields(&[("vp_id", "T1".into()), ("vp_term_id", "P1".into())]))
            .unwrap();
        assert!(result.is_none());
        assert!(!repo.storage().exists());
    }

    #[test]
    fn test_save_twice_second_is_noop() {
        let (repo, _temp) = test_repo(Some("[P1]\n"));
        let update = fields(&[
            ("vp_id", "T1".into()),
            ("vp_term_id", "P1".into()),
            ("taxonomy", "category".into()),
        ]);

        assert!(repo.save(&update).unwrap().is_some());
        let after_first = raw(&repo);
        assert!(repo.save(&update).unwrap().is_none());
        assert_eq!(raw(&repo), after_first);
    }

    #[test]
    fn test_save_merges_fields() {
        let (repo, _temp) = test_repo(Some(TWO_TAXONOMIES));

        let change = repo
            .save(&fields(&[
                ("vp_id", "C1".into()),
                ("taxonomy", "category".into()),
                ("a", Value::Integer(3)),
            ]))
            .unwrap()
            .unwrap();
        assert_eq!(change.term_vp_id, id("P"));

        let record = repo.load_entity(&id("C1")).unwrap().unwrap();
        assert_eq!(record.fields["a"], Value::Integer(3));
        assert_eq!(record.fields["b"], Value::Integer(2));
        let keys: Vec<&str> = record.fields.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["taxonomy", "a", "b"]);
    }

    #[test]
    fn test_save_filters_not_saved_fields() {
        let (repo, _temp) = test_repo(Some("[P1]\n"));

        repo.save(&fields(&[
            ("vp_id", "T1".into()),
            ("vp_term_id", "P1".into()),
            ("taxonomy", "category".into()),
            ("count", Value::Integer(5)),
            ("term_id", Value::Integer(12)),
            ("term_taxonomy_id", Value::Integer(34)),
        ]))
        .unwrap()
        .unwrap();

        let text = raw(&repo);
        for field in ["vp_id", "vp_term_id", "count", "term_id", "term_taxonomy_id"] {
            assert!(!text.contains(field), "{} leaked into {:?}", field, text);
        }
    }

    #[test]
    fn test_update_with_only_transient_fields_is_noop() {
        let (repo, _temp) = test_repo(Some(TWO_TAXONOMIES));
        let result = repo
            .save(&fields(&[("vp_id", "C2".into()), ("count", Value::Integer(9))]))
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_existing_owner_wins_over_hint() {
        let text = format!("{}\n[Q]\nname = \"Other\"\n", TWO_TAXONOMIES);
        let (repo, _temp) = test_repo(Some(text.as_str()));

        let change = repo
            .save(&fields(&[
                ("vp_id", "C2".into()),
                ("vp_term_id", "Q".into()),
                ("description", "moved?".into()),
            ]))
            .unwrap()
            .unwrap();

        assert_eq!(change.term_vp_id, id("P"));
        let record = repo.load_entity(&id("C2")).unwrap().unwrap();
        assert_eq!(record.vp_term_id, id("P"));
    }

    #[test]
    fn test_save_preserves_siblings_and_term() {
        let (repo, _temp) = test_repo(Some(TWO_TAXONOMIES));
        repo.save(&fields(&[("vp_id", "C2".into()), ("slug", "tag".into())]))
            .unwrap()
            .unwrap();

        let c1 = repo.load_entity(&id("C1")).unwrap().unwrap();
        assert_eq!(c1.fields.len(), 3);
        let term = repo.load_term(&id("P")).unwrap().unwrap();
        assert_eq!(term["name"], Value::from("News"));
    }

    #[test]
    fn test_delete_removes_only_target() {
        let (repo, _temp) = test_repo(Some(TWO_TAXONOMIES));

        let change = repo
            .delete(&fields(&[("vp_id", "C2".into())]))
            .unwrap()
            .unwrap();
        assert_eq!(change.action, ChangeAction::Edit);
        assert_eq!(change.term_vp_id, id("P"));
        assert_eq!(change.term_name.as_deref(), Some("News"));
        assert_eq!(change.taxonomy.as_deref(), Some("post_tag"));

        let all = repo.load_all().unwrap();
        let ids: Vec<&str> = all.keys().map(|k| k.as_str()).collect();
        assert_eq!(ids, vec!["C1"]);
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let (repo, _temp) = test_repo(Some(TWO_TAXONOMIES));
        assert!(repo
            .delete(&fields(&[("vp_id", "NOPE".into())]))
            .unwrap()
            .is_none());
        assert!(repo
            .delete(&fields(&[("vp_id", "NOPE".into()), ("vp_term_id", "P".into())]))
            .unwrap()
            .is_none());
        assert_eq!(raw(&repo), TWO_TAXONOMIES);
    }

    #[test]
    fn test_load_entity_injects_term_reference() {
        let (repo, _temp) = test_repo(Some(TWO_TAXONOMIES));

        let record = repo.load_entity(&id("C1")).unwrap().unwrap();
        assert_eq!(record.vp_term_id, id("P"));
        assert_eq!(record.taxonomy(), Some("category"));

        let flat = record.into_fields();
        assert_eq!(flat["vp_id"], Value::from("C1"));
        assert_eq!(flat["vp_term_id"], Value::from("P"));

        assert!(repo.load_entity(&id("NOPE")).unwrap().is_none());
    }

    #[test]
    fn test_exists() {
        let (repo, _temp) = test_repo(Some(TWO_TAXONOMIES));
        assert!(repo.exists(&id("C1")).unwrap());
        assert!(!repo.exists(&id("P")).unwrap());
        assert!(!repo.exists(&id("NOPE")).unwrap());
    }

    #[test]
    fn test_should_be_saved() {
        let (repo, _temp) = test_repo(None);
        let counter_only = fields(&[
            ("count", Value::Integer(5)),
            ("term_taxonomy_id", "X".into()),
            ("vp_id", "X".into()),
        ]);
        assert!(!repo.should_be_saved(&counter_only));

        let mut named = counter_only.clone();
        named.insert("name".into(), "Y".into());
        assert!(repo.should_be_saved(&named));

        let other_column = fields(&[
            ("count", Value::Integer(5)),
            ("id", "X".into()),
            ("vp_id", "X".into()),
        ]);
        assert!(repo.should_be_saved(&other_column));
    }

    #[test]
    fn test_missing_vp_id_is_invalid_update() {
        let (repo, _temp) = test_repo(Some("[P1]\n"));
        let err = repo
            .save(&fields(&[("taxonomy", "category".into())]))
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidUpdate(_)));

        let err = repo
            .delete(&fields(&[("vp_id", "bad id".into())]))
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidUpdate(_)));
    }

    #[test]
    fn test_parse_error_propagates() {
        let (repo, _temp) = test_repo(Some("[P1\n"));
        let err = repo.load_all().unwrap_err();
        assert!(matches!(err, StorageError::CodecError(_)));

        let (repo, _temp) = test_repo(Some("orphan = 1\n"));
        let err = repo.load_all().unwrap_err();
        assert!(matches!(err, StorageError::CodecError(_)));
    }

    /// Raw storage that can be read but refuses every write.
    struct ReadOnlyStorage {
        text: String,
    }

    impl RawStorage for ReadOnlyStorage {
        fn read_raw(&self) -> Result<Option<String>, StorageError> {
            Ok(Some(self.text.clone()))
        }

        fn write_raw(&self, _text: &str) -> Result<(), StorageError> {
            Err(StorageError::IoError(
                "read-only.toml".into(),
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            ))
        }

        fn exists(&self) -> bool {
            true
        }

        fn id_column_name(&self) -> &str {
            "term_taxonomy_id"
        }
    }

    #[test]
    fn test_write_failure_propagates() {
        let repo = TermTaxonomyStorage::new(ReadOnlyStorage {
            text: TWO_TAXONOMIES.to_string(),
        });

        let err = repo
            .save(&fields(&[("vp_id", "C1".into()), ("a", Value::Integer(9))]))
            .unwrap_err();
        assert!(matches!(err, StorageError::IoError(..)));

        let err = repo.delete(&fields(&[("vp_id", "C2".into())])).unwrap_err();
        assert!(matches!(err, StorageError::IoError(..)));

        let err = repo
            .save_term(&fields(&[("vp_id", "P".into()), ("name", "Renamed".into())]))
            .unwrap_err();
        assert!(matches!(err, StorageError::IoError(..)));

        // A no-op never reaches the write.
        assert!(repo
            .save(&fields(&[("vp_id", "C2".into()), ("taxonomy", "post_tag".into())]))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_io_failure_on_directory_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("terms.toml");
        std::fs::create_dir(&path).unwrap();
        let repo = TermTaxonomyStorage::new(SingleFileStorage::new(path, "term_taxonomy_id"));

        let err = repo
            .save_term(&fields(&[("vp_id", "P1".into())]))
            .unwrap_err();
        assert!(matches!(err, StorageError::IoError(..)));
    }

    #[test]
    fn test_bad_keys_are_invalid_update() {
        let (repo, _temp) = test_repo(Some("[P1]\nname = \"News\"\n"));
        let before = raw(&repo);

        for key in ["", "a=b", "line\nbreak", "[x", ";x", "#x", " padded", "padded "] {
            let update = fields(&[
                ("vp_id", "T1".into()),
                ("vp_term_id", "P1".into()),
                (key, Value::Integer(1)),
            ]);
            let err = repo.save(&update).unwrap_err();
            assert!(
                matches!(err, StorageError::InvalidUpdate(_)),
                "save accepted key {:?}",
                key
            );

            let update = fields(&[("vp_id", "P1".into()), (key, Value::Integer(1))]);
            let err = repo.save_term(&update).unwrap_err();
            assert!(
                matches!(err, StorageError::InvalidUpdate(_)),
                "save_term accepted key {:?}",
                key
            );
        }

        assert_eq!(raw(&repo), before);
        assert!(repo.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_save_term_rejects_taxonomies_field() {
        let (repo, _temp) = test_repo(Some(TWO_TAXONOMIES));
        let err = repo
            .save_term(&fields(&[("vp_id", "P".into()), ("taxonomies", "x".into())]))
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidUpdate(_)));
        assert_eq!(repo.load_all().unwrap().len(), 2);
    }

    #[test]
    fn test_non_finite_floats_are_invalid_update() {
        let (repo, _temp) = test_repo(Some("[P1]\n"));

        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let update = fields(&[
                ("vp_id", "T1".into()),
                ("vp_term_id", "P1".into()),
                ("w", Value::Float(bad)),
            ]);
            assert!(matches!(
                repo.save(&update).unwrap_err(),
                StorageError::InvalidUpdate(_)
            ));
            assert!(matches!(
                repo.save_term(&fields(&[("vp_id", "P1".into()), ("w", Value::Float(bad))]))
                    .unwrap_err(),
                StorageError::InvalidUpdate(_)
            ));
        }

        let update = fields(&[
            ("vp_id", "T1".into()),
            ("vp_term_id", "P1".into()),
            ("w", Value::Float(0.5)),
        ]);
        assert!(repo.save(&update).unwrap().is_some());
        assert!(repo.save(&update).unwrap().is_none());
        let record = repo.load_entity(&id("T1")).unwrap().unwrap();
        assert_eq!(record.fields["w"], Value::Float(0.5));
    }

    #[test]
    fn test_malformed_hint_resolves_nothing() {
        let (repo, _temp) = test_repo(Some(TWO_TAXONOMIES));

        let result = repo
            .save(&fields(&[
                ("vp_id", "NEW".into()),
                ("vp_term_id", "a b".into()),
                ("taxonomy", "category".into()),
            ]))
            .unwrap();
        assert!(result.is_none());
        assert!(!repo.exists(&id("NEW")).unwrap());

        // The owner is still found for an existing record.
        let change = repo
            .save(&fields(&[
                ("vp_id", "C2".into()),
                ("vp_term_id", Value::Bool(true)),
                ("slug", "tag".into()),
            ]))
            .unwrap()
            .unwrap();
        assert_eq!(change.term_vp_id, id("P"));

        let change = repo
            .delete(&fields(&[("vp_id", "C2".into()), ("vp_term_id", "a b".into())]))
            .unwrap()
            .unwrap();
        assert_eq!(change.term_vp_id, id("P"));
    }

    #[test]
    fn test_save_term_create_then_edit() {
        let (repo, _temp) = test_repo(None);

        let created = repo
            .save_term(&fields(&[("vp_id", "P1".into()), ("name", "News".into())]))
            .unwrap()
            .unwrap();
        assert_eq!(created.action, ChangeAction::Create);
        assert_eq!(created.to_string(), "term/create/P1");

        let edited = repo
            .save_term(&fields(&[("vp_id", "P1".into()), ("slug", "news".into())]))
            .unwrap()
            .unwrap();
        assert_eq!(edited.action, ChangeAction::Edit);
        assert_eq!(edited.term_name.as_deref(), Some("News"));

        assert!(repo
            .save_term(&fields(&[("vp_id", "P1".into()), ("slug", "news".into())]))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_save_term_keeps_taxonomies() {
        let (repo, _temp) = test_repo(Some(TWO_TAXONOMIES));
        repo.save_term(&fields(&[("vp_id", "P".into()), ("name", "Renamed".into())]))
            .unwrap()
            .unwrap();
        assert_eq!(repo.load_all().unwrap().len(), 2);
    }

    #[test]
    fn test_save_term_declares_placeholder() {
        let (repo, _temp) = test_repo(Some("[P.taxonomies.T]\ntaxonomy = \"category\"\n"));

        let change = repo
            .save_term(&fields(&[("vp_id", "P".into()), ("name", "Found".into())]))
            .unwrap()
            .unwrap();
        assert_eq!(change.action, ChangeAction::Create);
        assert!(raw(&repo).contains("[P]\nname = \"Found\"\n"));

        let tree = repo.load_tree().unwrap();
        assert!(!tree.terms[&id("P")].placeholder);
        assert!(tree.terms[&id("P")].taxonomies.contains_key(&id("T")));
    }

    #[test]
    fn test_save_term_filters_not_saved_fields() {
        let (repo, _temp) = test_repo(None);

        repo.save_term(&fields(&[
            ("vp_id", "P1".into()),
            ("name", "N".into()),
            ("count", Value::Integer(5)),
            ("term_id", Value::Integer(7)),
            ("term_taxonomy_id", Value::Integer(8)),
            ("vp_term_id", "P0".into()),
        ]))
        .unwrap()
        .unwrap();

        let term = repo.load_term(&id("P1")).unwrap().unwrap();
        let keys: Vec<&str> = term.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["vp_id", "name"]);

        let text = raw(&repo);
        for field in ["count", "term_id", "term_taxonomy_id", "vp_term_id"] {
            assert!(!text.contains(field), "{} leaked into {:?}", field, text);
        }

        // Transient fields alone change nothing.
        assert!(repo
            .save_term(&fields(&[("vp_id", "P1".into()), ("count", Value::Integer(6))]))
            .unwrap()
            .is_none());
    }
}
