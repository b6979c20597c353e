//! Config resolution precedence and file-format handling.

use hist_config::{resolve_config, Backend, ConfigError, ConfigPaths, ConfigSource};
use std::fs;
use tempfile::tempdir;

#[test]
fn defaults_when_nothing_exists() {
    let dir = tempdir().unwrap();
    let paths = ConfigPaths {
        xdg: Some(dir.path().join("historian").join("historian.toml")),
        ..Default::default()
    };
    let resolved = resolve_config(&paths).unwrap();
    assert_eq!(resolved.snapshot.source, ConfigSource::Defaults);
    assert!(resolved.snapshot.path.is_none());
    assert_eq!(resolved.config.query.default_count, 20);
}

#[test]
fn cli_beats_env_and_xdg() {
    let dir = tempdir().unwrap();
    let cli = dir.path().join("cli.toml");
    let env = dir.path().join("env.toml");
    let xdg = dir.path().join("xdg.toml");
    fs::write(&cli, "[tables]\nprefix = \"cli_\"\n").unwrap();
    fs::write(&env, "[tables]\nprefix = \"env_\"\n").unwrap();
    fs::write(&xdg, "[tables]\nprefix = \"xdg_\"\n").unwrap();

    let mut paths = ConfigPaths {
        cli: Some(cli),
        env: Some(env),
        xdg: Some(xdg),
    };
    let resolved = resolve_config(&paths).unwrap();
    assert_eq!(resolved.snapshot.source, ConfigSource::Cli);
    assert_eq!(resolved.config.tables.prefix, "cli_");

    paths.cli = None;
    let resolved = resolve_config(&paths).unwrap();
    assert_eq!(resolved.snapshot.source, ConfigSource::Env);
    assert_eq!(resolved.config.tables.prefix, "env_");

    paths.env = None;
    let resolved = resolve_config(&paths).unwrap();
    assert_eq!(resolved.snapshot.source, ConfigSource::Xdg);
    assert_eq!(resolved.config.tables.prefix, "xdg_");
}

#[test]
fn explicit_missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    let paths = ConfigPaths {
        cli: Some(dir.path().join("absent.toml")),
        ..Default::default()
    };
    assert!(matches!(resolve_config(&paths), Err(ConfigError::NotFound(_))));
}

#[test]
fn json_and_toml_give_same_fingerprint() {
    let dir = tempdir().unwrap();
    let toml_path = dir.path().join("a.toml");
    let json_path = dir.path().join("a.json");
    fs::write(
        &toml_path,
        "[storage]\nbackend = \"duckdb\"\n\n[query]\ndefault_count = 50\nmax_count = 500\n",
    )
    .unwrap();
    fs::write(
        &json_path,
        r#"{"storage": {"backend": "duckdb"}, "query": {"default_count": 50, "max_count": 500}}"#,
    )
    .unwrap();

    let from_toml = resolve_config(&ConfigPaths {
        cli: Some(toml_path),
        ..Default::default()
    })
    .unwrap();
    let from_json = resolve_config(&ConfigPaths {
        cli: Some(json_path),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(from_toml.config.storage.backend, Backend::Duckdb);
    assert_eq!(from_toml.config, from_json.config);
    assert_eq!(from_toml.snapshot.fingerprint, from_json.snapshot.fingerprint);
}

#[test]
fn unsupported_extension() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("historian.yaml");
    fs::write(&path, "storage: {}\n").unwrap();
    let err = resolve_config(&ConfigPaths {
        cli: Some(path),
        ..Default::default()
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
}

#[test]
fn invalid_values_are_reported_together() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(
        &path,
        "[tables]\nprefix = \"no-dashes\"\n\n[query]\ndefault_count = 0\n",
    )
    .unwrap();
    match resolve_config(&ConfigPaths {
        cli: Some(path),
        ..Default::default()
    }) {
        Err(ConfigError::Invalid(errors)) => assert_eq!(errors.len(), 2),
        other => panic!("expected invalid config, got {other:?}"),
    }
}

#[test]
fn parse_errors_name_the_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[storage\n").unwrap();
    let err = resolve_config(&ConfigPaths {
        cli: Some(path.clone()),
        ..Default::default()
    })
    .unwrap_err();
    assert!(err.to_string().contains("broken.toml"));
}
