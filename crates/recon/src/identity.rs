use std::collections::BTreeMap;

use crate::model::{MatchCandidate, MatchType, Transaction};

/// Result of the identity pass.
#[derive(Debug, Default)]
pub struct IdentityOutput {
    /// Exact matches in identifier sort order. Positions index the input slices.
    pub matched: Vec<MatchCandidate>,
    /// Identifiers present on both sides but duplicated on at least one.
    pub ambiguous: Vec<String>,
}

/// Pair transactions whose `external_id` occurs exactly once on each side.
///
/// Absent ids never match. An id seen more than once on either side is left
/// for the fuzzy pass rather than guessing which duplicate is meant.
pub fn match_by_identifier(bank: &[Transaction], internal: &[Transaction]) -> IdentityOutput {
    let bank_ids = group_by_id(bank);
    let internal_ids = group_by_id(internal);

    let mut output = IdentityOutput::default();

    for (id, bank_positions) in &bank_ids {
        let Some(internal_positions) = internal_ids.get(id) else {
            continue;
        };

        if bank_positions.len() == 1 && internal_positions.len() == 1 {
            output.matched.push(MatchCandidate {
                bank: bank_positions[0],
                internal: internal_positions[0],
                score: 1.0,
                match_type: MatchType::ExactId,
                breakdown: None,
            });
        } else {
            log::warn!(
                "ambiguous identifier '{id}': {} bank / {} internal occurrences; deferring to fuzzy matching",
                bank_positions.len(),
                internal_positions.len(),
            );
            output.ambiguous.push((*id).to_string());
        }
    }

    log::debug!(
        "identity pass: {} exact matches, {} ambiguous identifiers",
        output.matched.len(),
        output.ambiguous.len(),
    );

    output
}

fn group_by_id(txs: &[Transaction]) -> BTreeMap<&str, Vec<usize>> {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (pos, tx) in txs.iter().enumerate() {
        if let Some(id) = tx.external_id.as_deref() {
            groups.entry(id).or_default().push(pos);
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Side;
    use chrono::NaiveDate;

    fn tx(side: Side, idx: usize, id: Option<&str>) -> Transaction {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        Transaction::new(side, idx, date, 100_000_000, "x", id)
    }

    #[test]
    fn unique_ids_match_in_id_order() {
        let bank = vec![tx(Side::Bank, 0, Some("b")), tx(Side::Bank, 1, Some("a"))];
        let internal = vec![
            tx(Side::Internal, 0, Some("a")),
            tx(Side::Internal, 1, Some("c")),
            tx(Side::Internal, 2, Some("b")),
        ];
        let out = match_by_identifier(&bank, &internal);
        assert_eq!(out.matched.len(), 2);
        // "a" sorts before "b"
        assert_eq!((out.matched[0].bank, out.matched[0].internal), (1, 0));
        assert_eq!((out.matched[1].bank, out.matched[1].internal), (0, 2));
        assert!(out.matched.iter().all(|m| m.score == 1.0 && m.match_type == MatchType::ExactId));
        assert!(out.ambiguous.is_empty());
    }

    #[test]
    fn absent_ids_never_match() {
        let bank = vec![tx(Side::Bank, 0, None), tx(Side::Bank, 1, Some(""))];
        let internal = vec![tx(Side::Internal, 0, None), tx(Side::Internal, 1, Some("  "))];
        let out = match_by_identifier(&bank, &internal);
        assert!(out.matched.is_empty());
        assert!(out.ambiguous.is_empty());
    }

    #[test]
    fn duplicated_id_is_ambiguous() {
        let bank = vec![tx(Side::Bank, 0, Some("A"))];
        let internal = vec![tx(Side::Internal, 0, Some("A")), tx(Side::Internal, 1, Some("A"))];
        let out = match_by_identifier(&bank, &internal);
        assert!(out.matched.is_empty());
        assert_eq!(out.ambiguous, vec!["A".to_string()]);
    }

    #[test]
    fn duplicates_on_one_side_only_are_not_reported() {
        let bank = vec![tx(Side::Bank, 0, Some("X")), tx(Side::Bank, 1, Some("X"))];
        let internal = vec![tx(Side::Internal, 0, Some("Y"))];
        let out = match_by_identifier(&bank, &internal);
        assert!(out.matched.is_empty());
        assert!(out.ambiguous.is_empty());
    }

    #[test]
    fn ids_are_case_sensitive() {
        let bank = vec![tx(Side::Bank, 0, Some("abc"))];
        let internal = vec![tx(Side::Internal, 0, Some("ABC"))];
        assert!(match_by_identifier(&bank, &internal).matched.is_empty());
    }
}
