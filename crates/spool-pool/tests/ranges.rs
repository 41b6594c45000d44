use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use spool_pool::{PoolConfig, PoolError, SyncMode, ValuePool};
use spool_store::MemDir;
use spool_types::{Category, NodeId, TypedValue, XSD_NS};

fn new_pool() -> ValuePool {
    let config = PoolConfig {
        sync_mode: SyncMode::OsDefault,
        ..PoolConfig::default()
    };
    let pool = ValuePool::open(Arc::new(MemDir::new()), config).unwrap();
    pool.clear().unwrap();
    pool
}

fn xsd(local: &str) -> String {
    format!("{XSD_NS}{local}")
}

/// A pool holding values of every category, so ranges have neighbours to
/// exclude.
fn mixed_pool() -> ValuePool {
    let pool = new_pool();
    for v in [
        TypedValue::uri("http://example.org/z"),
        TypedValue::uri("http://example.org/a"),
        TypedValue::literal("mid"),
        TypedValue::lang_literal("mid", "de"),
        TypedValue::string("s"),
        TypedValue::integer(3),
        TypedValue::double(-1.0),
        TypedValue::boolean(false),
        TypedValue::float(9.5),
        TypedValue::date_time_millis(0),
    ] {
        pool.put(&v).unwrap();
    }
    pool
}

fn values_of(pool: &ValuePool, ids: impl IntoIterator<Item = NodeId>) -> Vec<TypedValue> {
    ids.into_iter()
        .map(|id| pool.find_value(id).unwrap().unwrap())
        .collect()
}

#[test]
fn untyped_literals_in_value_order() {
    let pool = mixed_pool();
    let charlie = pool.put(&TypedValue::literal("charlie")).unwrap();
    let alpha = pool.put(&TypedValue::literal("alpha")).unwrap();
    let bravo = pool.put(&TypedValue::literal("bravo")).unwrap();

    let ids: Vec<NodeId> = pool
        .find_range_by_type(Some(Category::UntypedLiteral), None)
        .unwrap()
        .collect();
    let named: Vec<NodeId> = ids
        .into_iter()
        .filter(|id| [alpha, bravo, charlie].contains(id))
        .collect();
    assert_eq!(named, vec![alpha, bravo, charlie]);
}

#[test]
fn double_bounds_inclusive_and_exclusive() {
    let pool = mixed_pool();
    let low = TypedValue::double(42.0);
    let high = TypedValue::double(123.0);
    let a = pool.put(&low).unwrap();
    let b = pool.put(&high).unwrap();
    pool.put(&TypedValue::double(500.0)).unwrap();

    let both: Vec<NodeId> = pool.find_range(Some(&low), true, Some(&high), true).unwrap().collect();
    assert_eq!(both, vec![a, b]);
    let upper: Vec<NodeId> = pool.find_range(Some(&low), false, Some(&high), true).unwrap().collect();
    assert_eq!(upper, vec![b]);
    let lower: Vec<NodeId> = pool.find_range(Some(&low), true, Some(&high), false).unwrap().collect();
    assert_eq!(lower, vec![a]);
}

#[test]
fn bounds_between_stored_values() {
    let pool = mixed_pool();
    let ids: Vec<NodeId> = [10, 20, 30]
        .iter()
        .map(|&i| pool.put(&TypedValue::integer(i)).unwrap())
        .collect();
    let range: Vec<NodeId> = pool
        .find_range(
            Some(&TypedValue::integer(15)),
            false,
            Some(&TypedValue::integer(35)),
            false,
        )
        .unwrap()
        .collect();
    assert_eq!(range, vec![ids[1], ids[2]]);
}

#[test]
fn one_sided_bounds_stay_within_type() {
    let pool = mixed_pool();
    let from: Vec<TypedValue> = values_of(
        &pool,
        pool.find_range(Some(&TypedValue::integer(0)), true, None, false).unwrap(),
    );
    assert_eq!(from, vec![TypedValue::integer(3)]);

    let below: Vec<TypedValue> = values_of(
        &pool,
        pool.find_range(None, false, Some(&TypedValue::uri("http://example.org/m")), false)
            .unwrap(),
    );
    assert_eq!(below, vec![TypedValue::uri("http://example.org/a")]);
}

#[test]
fn typed_range_selects_one_datatype() {
    let pool = mixed_pool();
    let doubles: Vec<NodeId> = [7.0, -3.5, 1e10]
        .iter()
        .map(|&d| pool.put(&TypedValue::double(d)).unwrap())
        .collect();

    let values = values_of(
        &pool,
        pool.find_range_by_type(Some(Category::TypedLiteral), Some(xsd("double").as_str()))
            .unwrap(),
    );
    assert_eq!(
        values,
        vec![
            TypedValue::double(-3.5),
            TypedValue::double(-1.0),
            TypedValue::double(7.0),
            TypedValue::double(1e10),
        ]
    );
    for id in doubles {
        assert!(pool
            .find_range_by_type(Some(Category::TypedLiteral), Some(xsd("double").as_str()))
            .unwrap()
            .any(|x| x == id));
    }
}

#[test]
fn integer_subtypes_share_a_range() {
    let pool = new_pool();
    let int = pool.put(&TypedValue::typed("5", xsd("int"))).unwrap();
    let long = pool.put(&TypedValue::typed("5", xsd("long"))).unwrap();
    let integer = pool.put(&TypedValue::integer(4)).unwrap();
    let ids: Vec<NodeId> = pool
        .find_range_by_type(Some(Category::TypedLiteral), Some(xsd("short").as_str()))
        .unwrap()
        .collect();
    assert_eq!(ids, vec![integer, long, int]);
}

#[test]
fn category_ranges_partition_the_pool() {
    let pool = mixed_pool();
    let total = pool.find_range(None, true, None, true).unwrap().len();
    let by_category: usize = Category::ALL
        .iter()
        .map(|&c| pool.find_range_by_type(Some(c), None).unwrap().len())
        .sum();
    assert_eq!(by_category, total);
    assert_eq!(pool.find_range_by_type(Some(Category::Blank), None).unwrap().len(), 0);
    assert_eq!(pool.find_range_by_type(None, None).unwrap().len(), total);
}

#[test]
fn empty_and_rejected_ranges() {
    let pool = mixed_pool();
    let three = TypedValue::integer(3);
    assert_eq!(
        pool.find_range(Some(&three), true, Some(&three), true).unwrap().len(),
        1
    );
    assert_eq!(
        pool.find_range(Some(&three), false, Some(&three), true).unwrap().len(),
        0
    );
    assert_eq!(
        pool.find_range(Some(&TypedValue::integer(9)), true, Some(&three), true)
            .unwrap()
            .len(),
        0
    );

    let rejected = [
        pool.find_range(Some(&three), true, Some(&TypedValue::double(4.0)), true),
        pool.find_range(Some(&TypedValue::literal("a")), true, Some(&TypedValue::uri("b")), true),
        pool.find_range_by_type(None, Some(xsd("double").as_str())),
        pool.find_range_by_type(Some(Category::TypedLiteral), Some("http://example.org/unknown")),
        pool.find_range_by_type(Some(Category::Uri), Some(xsd("double").as_str())),
    ];
    for r in rejected {
        assert!(matches!(r, Err(PoolError::InvalidArgument(_))));
    }
}

#[test]
fn plain_and_language_literals_share_bounds() {
    let pool = new_pool();
    let plain = pool.put(&TypedValue::literal("chat")).unwrap();
    let tagged = pool.put(&TypedValue::lang_literal("chat", "fr")).unwrap();
    let ids: Vec<NodeId> = pool
        .find_range(
            Some(&TypedValue::literal("chat")),
            true,
            Some(&TypedValue::lang_literal("chat", "fr")),
            true,
        )
        .unwrap()
        .collect();
    assert_eq!(ids, vec![plain, tagged]);
}

fn typed(lexical: &str, local: &str) -> TypedValue {
    TypedValue::typed(lexical, xsd(local))
}

#[test]
fn decimal_range_is_numeric() {
    let pool = mixed_pool();
    let nine = pool.put(&typed("9", "decimal")).unwrap();
    let ten = pool.put(&typed("10", "decimal")).unwrap();
    let big = pool.put(&typed("123456789012345678901234567890.5", "decimal")).unwrap();
    let neg = pool.put(&typed("-0.25", "decimal")).unwrap();

    let ids: Vec<NodeId> = pool
        .find_range(Some(&typed("9", "decimal")), true, Some(&typed("10", "decimal")), true)
        .unwrap()
        .collect();
    assert_eq!(ids, vec![nine, ten]);

    let all: Vec<NodeId> = pool
        .find_range_by_type(Some(Category::TypedLiteral), Some(xsd("decimal").as_str()))
        .unwrap()
        .collect();
    assert_eq!(all, vec![neg, nine, ten, big]);

    // Same number, different lexical form.
    assert_eq!(pool.find_id(&typed("+09.000", "decimal")).unwrap(), Some(nine));
}

#[test]
fn date_range_by_day() {
    let pool = mixed_pool();
    let days: Vec<NodeId> = ["2024-03-01", "2023-12-31", "2024-02-29", "2024-03-02"]
        .iter()
        .map(|d| pool.put(&typed(d, "date")).unwrap())
        .collect();

    let ids: Vec<NodeId> = pool
        .find_range(
            Some(&typed("2024-01-01", "date")),
            true,
            Some(&typed("2024-03-01", "date")),
            true,
        )
        .unwrap()
        .collect();
    assert_eq!(ids, vec![days[2], days[0]]);
    assert_eq!(
        values_of(&pool, ids.iter().copied())
            .iter()
            .map(|v| v.lexical_form())
            .collect::<Vec<_>>(),
        vec!["2024-02-29", "2024-03-01"]
    );
}

#[test]
fn each_calendar_fragment_has_its_own_range() {
    let pool = mixed_pool();
    let years: Vec<NodeId> = ["2024", "-0044", "1999"]
        .iter()
        .map(|y| pool.put(&typed(y, "gYear")).unwrap())
        .collect();
    pool.put(&typed("2024-05", "gYearMonth")).unwrap();
    pool.put(&typed("--05", "gMonth")).unwrap();
    pool.put(&typed("---05", "gDay")).unwrap();
    let md = pool.put(&typed("--05-05", "gMonthDay")).unwrap();

    let ids: Vec<NodeId> = pool
        .find_range_by_type(Some(Category::TypedLiteral), Some(xsd("gYear").as_str()))
        .unwrap()
        .collect();
    assert_eq!(ids, vec![years[1], years[2], years[0]]);

    let after: Vec<NodeId> = pool
        .find_range(Some(&typed("1999", "gYear")), false, None, true)
        .unwrap()
        .collect();
    assert_eq!(after, vec![years[0]]);

    for local in ["gYearMonth", "gMonth", "gDay", "gMonthDay"] {
        let n = pool
            .find_range_by_type(Some(Category::TypedLiteral), Some(xsd(local).as_str()))
            .unwrap()
            .count();
        assert_eq!(n, 1, "{local}");
    }
    assert_eq!(
        pool.find_value(md).unwrap().unwrap().lexical_form(),
        "--05-05"
    );
}

#[test]
fn binary_literals_range_by_bytes() {
    let pool = mixed_pool();
    let low = pool.put(&typed("00FF", "hexBinary")).unwrap();
    let high = pool.put(&typed("FF00", "hexBinary")).unwrap();
    let b64 = pool.put(&typed("AAEC", "base64Binary")).unwrap();

    let hex: Vec<NodeId> = pool
        .find_range(Some(&typed("00", "hexBinary")), true, None, true)
        .unwrap()
        .collect();
    assert_eq!(hex, vec![low, high]);

    let base64: Vec<NodeId> = pool
        .find_range_by_type(Some(Category::TypedLiteral), Some(xsd("base64Binary").as_str()))
        .unwrap()
        .collect();
    assert_eq!(base64, vec![b64]);
    assert_eq!(pool.find_value(b64).unwrap().unwrap().data(), &[0, 1, 2]);

    // Binary types are distinct even for equal bytes.
    assert!(pool
        .find_range(Some(&typed("00FF", "hexBinary")), true, Some(&typed("AP8=", "base64Binary")), true)
        .is_err());
}

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-c]{0,6}",
        "[a-c]{60,80}",
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn integer_range_matches_reference_sort(
        stored in proptest::collection::btree_set(-50i64..50, 0..40),
        a in -60i64..60,
        b in -60i64..60,
    ) {
        let pool = new_pool();
        pool.put(&TypedValue::double(0.0)).unwrap();
        pool.put(&TypedValue::literal("0")).unwrap();
        let mut ids = BTreeMap::new();
        for &i in &stored {
            ids.insert(i, pool.find_or_create(&TypedValue::integer(i)).unwrap());
        }
        let got: Vec<NodeId> = pool
            .find_range(Some(&TypedValue::integer(a)), true, Some(&TypedValue::integer(b)), false)
            .unwrap()
            .collect();
        let expected: Vec<NodeId> = ids
            .range(a..b.max(a))
            .map(|(_, &id)| id)
            .collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn literal_range_matches_reference_sort(
        stored in proptest::collection::btree_set(arb_text(), 0..30),
        a in arb_text(),
        b in arb_text(),
    ) {
        let pool = new_pool();
        let mut ids = BTreeMap::new();
        for s in &stored {
            let v = TypedValue::literal(s);
            ids.insert(v.clone(), pool.find_or_create(&v).unwrap());
        }
        let (low, high) = (TypedValue::literal(&a), TypedValue::literal(&b));
        let got: Vec<NodeId> = pool
            .find_range(Some(&low), true, Some(&high), false)
            .unwrap()
            .collect();
        let expected: Vec<NodeId> = ids
            .iter()
            .filter(|(v, _)| &low <= *v && *v < &high)
            .map(|(_, &id)| id)
            .collect();
        prop_assert_eq!(got, expected);
    }
}
