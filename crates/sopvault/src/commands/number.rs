//! SOP number allocation: `<ACRONYM>-<NNN>`.
//!
//! The acronym comes from reference data; unknown types fall back to the
//! initials of a multi-word type name, or the first four letters of a
//! single word. `NNN` is one past the highest number ever used with the
//! acronym, archived and trashed documents included, so numbers are never
//! reused.

use super::helpers::require_text;
use super::Services;
use crate::error::{Result, VaultError};
use crate::store::DataStore;

pub fn next_sop_number<S: DataStore>(store: &S, services: &Services, doc_type: &str) -> Result<String> {
    let doc_type = require_text(doc_type, "Document type")?;
    let acronym = services
        .reference
        .doc_type_acronym(&doc_type)
        .map(|a| a.trim().to_ascii_uppercase())
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| fallback_acronym(&doc_type));

    let tables = store.load()?;
    let used = tables
        .documents
        .iter()
        .map(|d| d.sop_number.as_str())
        .chain(tables.sops.iter().map(|s| s.sop_number.as_str()))
        .chain(tables.deletion_logs.iter().map(|l| l.sop_number.as_str()));
    let highest = used
        .filter_map(|number| sequence_of(number, &acronym))
        .max()
        .unwrap_or(0);

    let next = highest.checked_add(1).ok_or_else(|| {
        VaultError::Validation(format!("No SOP numbers left for acronym {}", acronym))
    })?;
    Ok(format!("{}-{:03}", acronym, next))
}

fn fallback_acronym(doc_type: &str) -> String {
    let words: Vec<&str> = doc_type
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    match words.as_slice() {
        [] => "DOC".to_string(),
        [word] => word.chars().take(4).collect::<String>().to_uppercase(),
        many => many
            .iter()
            .filter_map(|w| w.chars().next())
            .collect::<String>()
            .to_uppercase(),
    }
}

/// The numeric part of `number` when it is `<acronym>-<digits>`.
fn sequence_of(number: &str, acronym: &str) -> Option<u32> {
    let (prefix, digits) = number.trim().rsplit_once('-')?;
    if !prefix.eq_ignore_ascii_case(acronym) || digits.is_empty() {
        return None;
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::StaticDirectory;
    use crate::store::Tables;
    use crate::test_utils::{sample_document, sample_log, TestEnv};

    #[test]
    fn fallback_acronyms() {
        assert_eq!(fallback_acronym("Work Instruction"), "WI");
        assert_eq!(fallback_acronym("policy"), "POLI");
        assert_eq!(fallback_acronym("SOP"), "SOP");
        assert_eq!(fallback_acronym("--"), "DOC");
    }

    #[test]
    fn sequences_parse_only_matching_prefixes() {
        assert_eq!(sequence_of("QA-012", "QA"), Some(12));
        assert_eq!(sequence_of("qa-7", "QA"), Some(7));
        assert_eq!(sequence_of("QAX-012", "QA"), None);
        assert_eq!(sequence_of("QA-12a", "QA"), None);
        assert_eq!(sequence_of("QA-", "QA"), None);
    }

    #[test]
    fn counts_past_live_and_trashed_numbers() {
        let mut env = TestEnv::new();
        env.reference = StaticDirectory::new().with_acronym("Quality Manual", "QA");

        let mut tables = Tables::new();
        tables.insert_document(sample_document("QA-003")).unwrap();
        let trashed = sample_document("QA-009");
        tables.insert_deletion_log(sample_log(&trashed));
        tables.insert_document(sample_document("WI-050")).unwrap();
        env.store.backend().seed(tables);

        let (store, services) = env.parts();
        assert_eq!(next_sop_number(&*store, &services, "quality manual").unwrap(), "QA-010");
        assert_eq!(next_sop_number(&*store, &services, "Work Instruction").unwrap(), "WI-051");
        assert_eq!(next_sop_number(&*store, &services, "Policy").unwrap(), "POLI-001");
    }

    #[test]
    fn exhausted_sequence_is_a_validation_error() {
        let mut env = TestEnv::new();
        let mut tables = Tables::new();
        tables
            .insert_document(sample_document(&format!("SOP-{}", u32::MAX)))
            .unwrap();
        env.store.backend().seed(tables);

        let (store, services) = env.parts();
        assert!(matches!(
            next_sop_number(&*store, &services, "SOP"),
            Err(VaultError::Validation(_))
        ));
    }
}
