//! Tests for db::factory and repository.toml - repository creation and configuration.

mod support;

use std::io::Write;
use std::str::FromStr;

use sasi_backend::db::factory::{RepositoryFactory, RepositoryType, FIXTURE_ENV};
use sasi_backend::db::{
    AreaRepository, InstallationRepository, QueryRepository, RepositoryConfig, RepositoryError,
};

#[test]
fn test_repository_type_from_str_postgres() {
    assert_eq!(
        RepositoryType::from_str("POSTGRES").unwrap(),
        RepositoryType::Postgres
    );
    assert_eq!(
        RepositoryType::from_str("pg").unwrap(),
        RepositoryType::Postgres
    );
}

#[test]
fn test_repository_type_from_str_invalid() {
    let result = RepositoryType::from_str("sqlite");
    assert!(result.unwrap_err().contains("Unknown repository type"));
}

#[test]
fn test_repository_type_from_env_default() {
    support::with_scoped_env(
        &[
            ("REPOSITORY_TYPE", None),
            ("DATABASE_URL", None),
            ("PG_DATABASE_URL", None),
        ],
        || {
            assert_eq!(RepositoryType::from_env(), RepositoryType::Local);
        },
    );
}

#[test]
fn test_repository_type_from_env_database_url() {
    support::with_scoped_env(
        &[
            ("REPOSITORY_TYPE", None),
            ("DATABASE_URL", Some("postgres://localhost/sasi")),
        ],
        || {
            assert_eq!(RepositoryType::from_env(), RepositoryType::Postgres);
        },
    );
}

#[test]
fn test_repository_type_explicit_wins() {
    support::with_scoped_env(
        &[
            ("REPOSITORY_TYPE", Some("local")),
            ("DATABASE_URL", Some("postgres://localhost/sasi")),
        ],
        || {
            assert_eq!(RepositoryType::from_env(), RepositoryType::Local);
        },
    );
}

#[test]
fn test_from_env_seeds_local_repository_from_fixture() {
    let fixture = support::sample_fixture_path();
    let fixture = fixture.to_str().unwrap();
    let runtime = tokio::runtime::Runtime::new().unwrap();

    support::with_scoped_env(
        &[
            ("REPOSITORY_TYPE", Some("local")),
            (FIXTURE_ENV, Some(fixture)),
        ],
        || {
            runtime.block_on(async {
                let repo = RepositoryFactory::from_env().await.unwrap();
                assert_eq!(repo.list_main_queries().await.unwrap().len(), 2);
                assert!(repo.get_installation("INST040").await.unwrap().is_some());
            });
        },
    );
}

#[test]
fn test_from_env_without_fixture_is_empty() {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    support::with_scoped_env(
        &[("REPOSITORY_TYPE", Some("local")), (FIXTURE_ENV, None)],
        || {
            runtime.block_on(async {
                let repo = RepositoryFactory::from_env().await.unwrap();
                assert!(repo.health_check().await.unwrap());
                assert!(repo.list_main_queries().await.unwrap().is_empty());
            });
        },
    );
}

#[tokio::test]
async fn test_from_config_file_local_with_fixture() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[repository]\ntype = \"local\"\n\n[local]\nfixture = {:?}\n",
        support::sample_fixture_path()
    )
    .unwrap();

    let repo = RepositoryFactory::from_config_file(file.path())
        .await
        .unwrap();
    assert_eq!(repo.list_municipalities().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_from_config_file_invalid_type() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[repository]\ntype = \"sqlite\"").unwrap();

    let err = RepositoryFactory::from_config_file(file.path())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, RepositoryError::ConfigurationError { .. }));
}

#[tokio::test]
async fn test_from_config_file_bad_fixture() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = dir.path().join("broken.json");
    std::fs::write(&fixture, "{ not json").unwrap();
    let config = dir.path().join("repository.toml");
    std::fs::write(
        &config,
        format!("[repository]\ntype = \"local\"\n\n[local]\nfixture = {:?}\n", fixture),
    )
    .unwrap();

    let err = RepositoryFactory::from_config_file(&config)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, RepositoryError::ConfigurationError { .. }));
    assert!(err.to_string().contains("parse"));
}

#[test]
fn test_config_file_missing_section_is_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[local]\nfixture = \"x.json\"").unwrap();
    assert!(RepositoryConfig::from_file(file.path()).is_err());
}

#[cfg(not(feature = "postgres-repo"))]
#[tokio::test]
async fn test_postgres_config_without_feature() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[repository]\ntype = \"postgres\"\n\n[postgres]\ndatabase_url = \"postgres://localhost/sasi\""
    )
    .unwrap();

    let err = RepositoryFactory::from_config_file(file.path())
        .await
        .err()
        .unwrap();
    assert!(err.to_string().contains("feature not enabled"));
}
