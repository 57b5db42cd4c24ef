use sark_domain::config::Config;

#[test]
fn config_round_trips_through_toml() {
    let cfg = Config::default();
    let serialized = toml::to_string(&cfg).expect("serialize");
    let reloaded: Config = toml::from_str(&serialized).expect("deserialize");
    assert_eq!(reloaded.server.port, cfg.server.port);
    assert_eq!(reloaded.audit.retention_days, cfg.audit.retention_days);
}

#[test]
fn load_missing_file_falls_back_to_defaults() {
    let path = std::path::Path::new("/nonexistent/sark-config-does-not-exist.toml");
    let cfg = Config::load(path).expect("falls back to defaults");
    assert_eq!(cfg.server.port, Config::default().server.port);
}
