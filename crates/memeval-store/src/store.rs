//! JSON persistence for personas and accepted evidence items.
//!
//! One file per person, named `{person_id}_{role}.json`, holding a JSON
//! array of evidence items. Writes always append to the existing array —
//! a run resumed halfway never clobbers earlier results. Person-level
//! parallelism guarantees a single writer per file.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use memeval_core::{EvidenceItem, GenError, GenResult, Persona};

/// File name convention: `{person_id}_{role}.json`, role lowercased with
/// spaces collapsed to underscores.
pub fn evidence_file_name(person_id: &str, role: &str) -> String {
    let role = role.to_lowercase().replace(char::is_whitespace, "_");
    format!("{person_id}_{role}.json")
}

/// Recover the person id from a `{person_id}_{role}.json` path.
pub fn person_id_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let (id, _) = stem.split_once('_')?;
    (!id.is_empty()).then(|| id.to_string())
}

/// Load all evidence items from a per-person file. A missing file is an
/// empty dataset, not an error. Items persisted without a `person_id` are
/// back-filled from the filename convention.
pub fn load_evidence_items(path: &Path) -> GenResult<Vec<EvidenceItem>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)?;
    let mut items: Vec<EvidenceItem> = serde_json::from_str(&content)?;

    if let Some(person_id) = person_id_from_path(path) {
        for item in items.iter_mut().filter(|i| i.person_id.is_empty()) {
            debug!(path = %path.display(), "back-filling person_id from filename");
            item.person_id = person_id.clone();
        }
    }

    Ok(items)
}

/// Append `items` to the persona's evidence file under `dir`. Existing
/// items are preserved; the result is the union in call order.
pub fn append_evidence(persona: &Persona, items: &[EvidenceItem], dir: &Path) -> GenResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(evidence_file_name(&persona.id, &persona.role));

    let mut existing = load_evidence_items(&path)?;
    existing.extend(items.iter().cloned());

    let json = serde_json::to_string_pretty(&existing)?;
    fs::write(&path, json)?;
    debug!(path = %path.display(), added = items.len(), total = existing.len(), "evidence appended");
    Ok(path)
}

/// Load every persona from `dir` (all `*.json` files). Files that fail to
/// parse are skipped with a warning so one bad file doesn't sink the run.
pub fn load_personas(dir: &Path) -> GenResult<Vec<Persona>> {
    let mut personas = Vec::new();
    let entries = fs::read_dir(dir)
        .map_err(|e| GenError::Config(format!("cannot read persona dir {}: {e}", dir.display())))?;

    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let content = fs::read_to_string(&path)?;
        match serde_json::from_str::<Persona>(&content) {
            Ok(p) => personas.push(p),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unparseable persona"),
        }
    }

    personas.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(personas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memeval_core::{
        Conversation, EvidenceCategory, EvidenceCore, EvidenceItem, EvidenceUseCase, Message,
        Speaker,
    };

    fn item(person_id: &str, question: &str) -> EvidenceItem {
        let core = EvidenceCore {
            question: question.into(),
            answer: "an answer".into(),
            evidence_messages: vec![Message::new(Speaker::User, "a fact")],
            generating_model: None,
        };
        let mut conv = Conversation::unstamped(vec![Message::new(Speaker::User, "a fact")], None);
        conv.stamp();
        let uc = EvidenceUseCase::new(EvidenceCategory::UserFacts, "scenario");
        EvidenceItem::from_parts(core, vec![conv], &uc, person_id)
    }

    #[test]
    fn test_file_name_convention() {
        assert_eq!(evidence_file_name("p01", "Data Analyst"), "p01_data_analyst.json");
    }

    #[test]
    fn test_person_id_from_path() {
        assert_eq!(
            person_id_from_path(Path::new("/out/p01_data_analyst.json")),
            Some("p01".into())
        );
        assert_eq!(person_id_from_path(Path::new("/out/noextension")), None);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let items = load_evidence_items(&dir.path().join("p09_chef.json")).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_append_is_union_in_call_order() {
        let dir = tempfile::tempdir().unwrap();
        let persona = Persona::new("p01", "Maya", "analyst", "");

        append_evidence(&persona, &[item("p01", "q1"), item("p01", "q2")], dir.path()).unwrap();
        let path = append_evidence(&persona, &[item("p01", "q3")], dir.path()).unwrap();

        let items = load_evidence_items(&path).unwrap();
        let questions: Vec<&str> = items.iter().map(|i| i.question.as_str()).collect();
        assert_eq!(questions, vec!["q1", "q2", "q3"]);
    }

    #[test]
    fn test_person_id_backfill() {
        let dir = tempfile::tempdir().unwrap();
        let persona = Persona::new("p42", "Iris", "chef", "");
        let mut anonymous = item("", "q1");
        anonymous.person_id.clear();
        let path = append_evidence(&persona, &[anonymous], dir.path()).unwrap();

        let items = load_evidence_items(&path).unwrap();
        assert_eq!(items[0].person_id, "p42");
    }

    #[test]
    fn test_load_personas_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.json"),
            r#"{"id":"p01","name":"A","role":"r"}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let personas = load_personas(dir.path()).unwrap();
        assert_eq!(personas.len(), 1);
        assert_eq!(personas[0].id, "p01");
    }
}
