use gcpj_migrate::{
    identifier::{KeyPolicy, TransformationRule, normalize, normalize_text},
    value::{CellValue, parse_cell},
};
use proptest::prelude::*;

fn renormalize(value: &CellValue) -> Option<String> {
    let first = normalize(value)?;
    let again = normalize_text(first.as_str())?;
    Some(again.into_string())
}

proptest! {
    #[test]
    fn integers_and_integral_floats_agree(n in 0i64..1_000_000_000_000) {
        let from_int = normalize(&CellValue::Integer(n)).unwrap();
        let from_float = normalize(&CellValue::Float(n as f64)).unwrap();
        prop_assert_eq!(from_int.as_str(), n.to_string());
        prop_assert_eq!(from_int, from_float);
    }

    #[test]
    fn normalization_is_idempotent(n in 0u64..10_000_000_000, zeros in 1usize..4, pad in 0usize..3) {
        let raws = vec![
            CellValue::Integer(n as i64),
            CellValue::Float(n as f64),
            CellValue::Text(format!("{}{n}.{}", " ".repeat(pad), "0".repeat(zeros))),
            CellValue::Text(format!("{:0>12}", n)),
            CellValue::Text(format!("  {n}  ")),
        ];
        for raw in raws {
            let once = normalize(&raw).map(|k| k.into_string());
            prop_assert_eq!(renormalize(&raw), once);
        }
    }

    #[test]
    fn parsed_cells_normalize_like_their_text(n in 1u64..10_000_000_000) {
        let text = format!("{n}.0");
        let parsed = parse_cell(&text).unwrap();
        prop_assert_eq!(
            normalize(&parsed).map(|k| k.into_string()),
            normalize_text(&text).map(|k| k.into_string())
        );
    }

    #[test]
    fn alternate_keys_start_with_canonical_and_never_repeat(
        key in "[0-9]{1,10}",
        prefixes in proptest::collection::vec(("[0-9]{2}", "[0-9]{2}"), 0..4),
    ) {
        let canonical = normalize_text(&key).unwrap();
        let pairs: Vec<(&str, &str)> = prefixes
            .iter()
            .map(|(a, b)| (a.as_str(), b.as_str()))
            .collect();
        let mut rules = KeyPolicy::with_prefix_pairs(&pairs).rules().to_vec();
        rules.push(TransformationRule::StripLeadingZeros);
        let keys = KeyPolicy::new(rules).alternate_keys(&canonical);
        prop_assert_eq!(keys[0].as_str(), canonical.as_str());
        let mut sorted = keys.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(sorted.len(), keys.len());
    }
}

#[test]
fn absent_values_are_not_identifiers() {
    assert!(normalize(&CellValue::Float(f64::NAN)).is_none());
    assert!(normalize(&CellValue::Boolean(true)).is_none());
    assert!(normalize_text("").is_none());
    assert!(parse_cell("").is_none());
}
