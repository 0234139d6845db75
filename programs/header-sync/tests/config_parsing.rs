use header_sync::config::{AppConfig, Family};
use header_sync_core::{GenesisPolicy, ParentLinkage};
use rstest::rstest;
use serde_json::json;

/// Build a minimal valid configuration with a single Cosmos chain so that we
/// can tweak it in each test.
fn base_config_json() -> serde_json::Value {
    json!({
        "log_level": "debug",
        "state_path": "./state.json",
        "chains": [
            {
                "chain_id": 5,
                "family": "cosmos",
                "sync": {
                    "parent_linkage": "nearest_ancestor",
                    "max_batch_size": 16,
                    "genesis_policy": {
                        "type": "authorities",
                        "addresses": [
                            "0101010101010101010101010101010101010101",
                            "0202020202020202020202020202020202020202"
                        ],
                        "min_signers": 2
                    }
                }
            }
        ]
    })
}

#[test]
fn parses_full_config() {
    let config = AppConfig::from_value(base_config_json()).unwrap();
    assert_eq!(config.log_level(), tracing::Level::DEBUG);
    assert_eq!(config.chains.len(), 1);

    let chain = config.chain(5).unwrap();
    assert_eq!(chain.family, Family::Cosmos);
    assert_eq!(chain.sync.parent_linkage, ParentLinkage::NearestAncestor);
    assert_eq!(chain.sync.max_batch_size, 16);
    assert_eq!(
        chain.sync.genesis_policy,
        GenesisPolicy::Authorities {
            addresses: vec![[1; 20], [2; 20]],
            min_signers: 2,
        }
    );
    assert!(config.chain(6).is_none());
}

#[test]
fn sync_settings_default_when_omitted() {
    let config = AppConfig::from_value(json!({
        "state_path": "./state.json",
        "chains": [{ "chain_id": 5, "family": "cosmos" }]
    }))
    .unwrap();
    assert_eq!(config.log_level(), tracing::Level::INFO);

    let sync = &config.chains[0].sync;
    assert_eq!(sync.parent_linkage, ParentLinkage::Strict);
    assert_eq!(sync.max_batch_size, 256);
    assert_eq!(sync.genesis_policy, GenesisPolicy::Open);
}

#[test]
fn error_names_the_failing_path() {
    let mut value = base_config_json();
    value["chains"][0]["sync"]["parent_linkage"] = json!("loose");

    let err = AppConfig::from_value(value).unwrap_err().to_string();
    assert!(err.contains("chains[0].sync.parent_linkage"), "{err}");
}

#[rstest]
#[case::unknown_family("/chains/0/family", json!("ethereum"))]
#[case::unknown_field("/chains/0/sync/max_batch", json!(3))]
#[case::short_authority("/chains/0/sync/genesis_policy/addresses/0", json!("0101"))]
fn rejects_malformed_values(#[case] pointer: &str, #[case] replacement: serde_json::Value) {
    let mut value = base_config_json();
    let (parent, key) = pointer.rsplit_once('/').unwrap();
    match value.pointer_mut(parent).unwrap() {
        serde_json::Value::Array(items) => items[key.parse::<usize>().unwrap()] = replacement,
        serde_json::Value::Object(map) => {
            map.insert(key.to_string(), replacement);
        }
        _ => unreachable!(),
    }
    assert!(AppConfig::from_value(value).is_err());
}

#[rstest]
#[case::zero_batch(json!({ "max_batch_size": 0 }))]
#[case::unsatisfiable_policy(json!({
    "genesis_policy": {
        "type": "authorities",
        "addresses": ["0101010101010101010101010101010101010101"],
        "min_signers": 2
    }
}))]
fn rejects_inconsistent_sync_settings(#[case] sync: serde_json::Value) {
    let mut value = base_config_json();
    value["chains"][0]["sync"] = sync;
    let err = AppConfig::from_value(value).unwrap_err();
    assert!(format!("{err:#}").contains("chain 5"), "{err:#}");
}

#[test]
fn rejects_duplicate_chains() {
    let mut value = base_config_json();
    let chain = value["chains"][0].clone();
    value["chains"].as_array_mut().unwrap().push(chain);

    let err = AppConfig::from_value(value).unwrap_err().to_string();
    assert!(err.contains("more than once"), "{err}");
}
