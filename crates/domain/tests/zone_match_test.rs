use prismdns_domain::{Config, Zone};

fn table(json: &str) -> Config {
    Config::parse_str(json).expect("valid test configuration")
}

#[test]
fn test_wildcard_matches_subdomains_only() {
    assert!(Zone::matches_domain("foo.bench.local.", "*.bench.local"));
    assert!(Zone::matches_domain("a.b.bench.local.", "*.bench.local"));

    // The bare suffix is not covered by its own wildcard.
    assert!(!Zone::matches_domain("bench.local.", "*.bench.local"));
    assert!(!Zone::matches_domain("notbench.local.", "*.bench.local"));
}

#[test]
fn test_exact_and_subdomain_arms() {
    assert!(Zone::matches_domain("corp.example.", "corp.example"));
    assert!(Zone::matches_domain("deep.sub.corp.example.", "corp.example"));
    assert!(!Zone::matches_domain("notcorp.example.", "corp.example"));
    assert!(!Zone::matches_domain("corp.example.org.", "corp.example"));
}

#[test]
fn test_matching_is_case_insensitive() {
    assert!(Zone::matches_domain("FOO.Bench.LOCAL", "*.bench.local"));
    assert!(Zone::matches_domain("corp.example", "CORP.EXAMPLE."));
}

#[test]
fn test_select_zone_prefers_longest_pattern() {
    let config = table(
        r#"{
            "zones": {
                "wide": { "domains": ["*.corp.example"] },
                "narrow": { "domains": ["special.corp.example"] },
            },
        }"#,
    );

    let (name, _) = config.select_zone("special.corp.example.").unwrap();
    assert_eq!(name, "narrow");

    let (name, _) = config.select_zone("other.corp.example.").unwrap();
    assert_eq!(name, "wide");
}

#[test]
fn test_select_zone_tie_breaks_by_zone_name() {
    let config = table(
        r#"{
            "zones": {
                "beta": { "domains": ["*.shared.example"] },
                "alpha": { "domains": ["*.shared.example"] },
            },
        }"#,
    );

    for _ in 0..32 {
        let (name, _) = config.select_zone("host.shared.example.").unwrap();
        assert_eq!(name, "alpha");
    }
}

#[test]
fn test_catch_all_wildcard_matches_everything() {
    let config = table(r#"{ "zones": { "any": { "domains": ["*"] } } }"#);

    assert!(config.select_zone("example.com.").is_some());
    assert!(config.select_zone("deep.sub.example.org").is_some());

    // A longer pattern still beats the catch-all.
    let config = table(
        r#"{
            "zones": {
                "any": { "domains": ["*"] },
                "lab": { "domains": ["*.lab.example"] },
            },
        }"#,
    );
    let (name, _) = config.select_zone("host.lab.example.").unwrap();
    assert_eq!(name, "lab");
}

#[test]
fn test_select_zone_none_for_unmatched_name() {
    let config = table(r#"{ "zones": { "z": { "domains": ["*.bench.local"] } } }"#);

    assert!(config.select_zone("example.org.").is_none());
    assert!(config.select_zone("bench.local.").is_none());
}

#[test]
fn test_select_zone_normalizes_query_name() {
    let config = table(r#"{ "zones": { "z": { "domains": ["*.bench.local"] } } }"#);

    // No trailing dot, mixed case.
    let (name, _) = config.select_zone("Foo.BENCH.local").unwrap();
    assert_eq!(name, "z");
}

#[test]
fn test_selected_zone_pattern_actually_matches() {
    let config = table(
        r#"{
            "zones": {
                "a": { "domains": ["*.x.example", "y.example"] },
                "b": { "domains": ["deep.x.example"] },
            },
        }"#,
    );

    for query in ["foo.x.example.", "deep.x.example.", "sub.y.example.", "y.example."] {
        if let Some((_, zone)) = config.select_zone(query) {
            assert!(
                zone.domains.iter().any(|p| Zone::matches_domain(query, p)),
                "selected zone has no matching pattern for {query}"
            );
        }
    }
}
