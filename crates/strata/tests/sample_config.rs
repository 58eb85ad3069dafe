//! The shipped sample config must stay loadable and match the built-in defaults.

use std::path::Path;

use strata::models::StrataConfig;

#[test]
fn sample_config_matches_defaults() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/strata.toml");
    let config = strata::load_config(Some(&path)).unwrap();
    assert_eq!(config, StrataConfig::default());
}
