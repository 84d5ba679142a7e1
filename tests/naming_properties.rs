mod common;

use common::strategies::*;
use proptest::prelude::*;
use tenant_provisioner::naming::{decode_escaped, normalize, NamingPolicy, TenantId, SEPARATOR};

proptest! {
    /// Normalized names never contain the separator and are stable across calls.
    #[test]
    fn normalize_is_separator_free_and_deterministic(raw in raw_identifier_strategy()) {
        let tenant = TenantId::new(raw).unwrap();
        let first = normalize(&tenant);
        let second = normalize(&tenant);
        prop_assert!(!first.as_str().contains(SEPARATOR));
        prop_assert_eq!(first, second);
    }

    /// Substitution collides for identifiers differing only by `.` vs `-`.
    #[test]
    fn substitute_policy_collides_on_separator_twins((dotted, dashed) in separator_twins_strategy()) {
        let a = NamingPolicy::Substitute.apply(&TenantId::new(dotted).unwrap());
        let b = NamingPolicy::Substitute.apply(&TenantId::new(dashed).unwrap());
        prop_assert_eq!(a, b);
    }

    /// The escaped policy keeps separator twins apart and round-trips.
    #[test]
    fn escaped_policy_is_injective_on_separator_twins((dotted, dashed) in separator_twins_strategy()) {
        let a = NamingPolicy::Escaped.apply(&TenantId::new(dotted.clone()).unwrap());
        let b = NamingPolicy::Escaped.apply(&TenantId::new(dashed.clone()).unwrap());
        prop_assert_ne!(&a, &b);
        prop_assert_eq!(decode_escaped(&a), Some(dotted));
        prop_assert_eq!(decode_escaped(&b), Some(dashed));
    }

    #[test]
    fn escaped_policy_round_trips(raw in tenant_identifier_strategy()) {
        let tenant = TenantId::new(raw.clone()).unwrap();
        let name = NamingPolicy::Escaped.apply(&tenant);
        prop_assert!(!name.as_str().contains(SEPARATOR));
        prop_assert_eq!(decode_escaped(&name), Some(raw));
    }

    /// Hash-suffixed names keep the readable prefix and separate twins.
    #[test]
    fn hash_suffix_policy_separates_twins((dotted, dashed) in separator_twins_strategy()) {
        let a = NamingPolicy::HashSuffix.apply(&TenantId::new(dotted).unwrap());
        let b = NamingPolicy::HashSuffix.apply(&TenantId::new(dashed.clone()).unwrap());
        prop_assert_ne!(&a, &b);
        let expected_prefix = format!("{dashed}-");
        prop_assert!(a.as_str().starts_with(&expected_prefix));
        prop_assert_eq!(a.as_str().len(), dashed.len() + 9);
    }
}

#[test]
fn documented_collision_example() {
    let dotted = normalize(&TenantId::new("a.b").unwrap());
    let dashed = normalize(&TenantId::new("a-b").unwrap());
    assert_eq!(dotted, dashed);
    assert_eq!(dotted.as_str(), "a-b");
}
