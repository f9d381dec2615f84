//! Metadata cache over the shared store.
//!
//! Analysis results are keyed by structure hash: a stored row is only
//! served when the repository's file set has not changed. One analysis
//! lands in a single transaction, so readers see the previous result or
//! the new one, never a mix.

use anyhow::Result;
use chrono::{DateTime, Local};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use super::store::{get_or_create_repository, Store};
use crate::analyzer::{DependencyInfo, FrameworkInfo, LanguageInfo, LicenseInfo, ProjectMetadata};

#[derive(Clone)]
pub struct MetadataCache {
    store: Store,
}

impl MetadataCache {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Fetch cached metadata for `path` if its structure hash still matches.
    pub fn get(&self, path: &str, structure_hash: &str) -> Result<Option<ProjectMetadata>> {
        self.store.with_connection(|conn| {
            let base = conn
                .query_row(
                    "SELECT rm.project_type, rm.main_language, rm.total_lines_of_code,
                            rm.file_count, rm.directory_count, rm.repository_size,
                            rm.has_readme, rm.has_license, rm.has_tests, rm.has_ci, rm.has_docs,
                            rm.structure_hash, rm.analyzed_at
                     FROM repository_metadata rm
                     JOIN repositories r ON r.id = rm.repository_id
                     WHERE r.path = ?1 AND rm.structure_hash = ?2",
                    params![path, structure_hash],
                    |row| {
                        Ok(ProjectMetadata {
                            project_type: row.get(0)?,
                            main_language: row.get(1)?,
                            total_lines_of_code: row.get::<_, i64>(2)? as u64,
                            file_count: row.get::<_, i64>(3)? as u64,
                            directory_count: row.get::<_, i64>(4)? as u64,
                            repository_size: row.get::<_, i64>(5)? as u64,
                            has_readme: row.get(6)?,
                            has_license: row.get(7)?,
                            has_tests: row.get(8)?,
                            has_ci: row.get(9)?,
                            has_docs: row.get(10)?,
                            structure_hash: row.get(11)?,
                            analyzed_at: row
                                .get::<_, Option<String>>(12)?
                                .and_then(|s| parse_timestamp(&s)),
                            ..ProjectMetadata::default()
                        })
                    },
                )
                .optional()?;

            let Some(mut meta) = base else {
                return Ok(None);
            };

            meta.languages = load_languages(conn, path)?;
            meta.frameworks = load_frameworks(conn, path)?;
            meta.licenses = load_licenses(conn, path)?;
            meta.dependencies = load_dependencies(conn, path)?;

            debug!("metadata cache hit: {path}");
            Ok(Some(meta))
        })
    }

    /// Store one analysis atomically, replacing whatever was there.
    pub fn save(&self, path: &str, name: &str, meta: &ProjectMetadata) -> Result<()> {
        self.store.with_transaction(|tx| {
            let repo_id = get_or_create_repository(tx, path, name)?;
            save_base(tx, repo_id, meta)?;
            replace_children(tx, repo_id, meta)?;
            Ok(())
        })
    }

    /// Drop cached metadata (and the description row) for one repository.
    /// Cascade takes the child tables with it.
    pub fn refresh(&self, path: &str) -> Result<bool> {
        self.store.remove(path)
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Local>> {
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .and_then(|naive| naive.and_local_timezone(Local).single())
}

fn save_base(tx: &Transaction, repo_id: i64, meta: &ProjectMetadata) -> Result<()> {
    tx.execute(
        "INSERT INTO repository_metadata
             (repository_id, project_type, main_language, total_lines_of_code,
              file_count, directory_count, repository_size,
              has_readme, has_license, has_tests, has_ci, has_docs,
              structure_hash, analyzed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
         ON CONFLICT(repository_id) DO UPDATE SET
             project_type = excluded.project_type,
             main_language = excluded.main_language,
             total_lines_of_code = excluded.total_lines_of_code,
             file_count = excluded.file_count,
             directory_count = excluded.directory_count,
             repository_size = excluded.repository_size,
             has_readme = excluded.has_readme,
             has_license = excluded.has_license,
             has_tests = excluded.has_tests,
             has_ci = excluded.has_ci,
             has_docs = excluded.has_docs,
             structure_hash = excluded.structure_hash,
             analyzed_at = excluded.analyzed_at,
             updated_at = CURRENT_TIMESTAMP",
        params![
            repo_id,
            meta.project_type,
            meta.main_language,
            meta.total_lines_of_code as i64,
            meta.file_count as i64,
            meta.directory_count as i64,
            meta.repository_size as i64,
            meta.has_readme,
            meta.has_license,
            meta.has_tests,
            meta.has_ci,
            meta.has_docs,
            meta.structure_hash,
            meta.analyzed_at.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
        ],
    )?;
    Ok(())
}

fn replace_children(tx: &Transaction, repo_id: i64, meta: &ProjectMetadata) -> Result<()> {
    for table in [
        "repository_languages",
        "repository_frameworks",
        "repository_licenses",
        "repository_dependencies",
    ] {
        tx.execute(&format!("DELETE FROM {table} WHERE repository_id = ?1"), params![repo_id])?;
    }

    for lang in &meta.languages {
        tx.execute(
            "INSERT INTO repository_languages
                 (repository_id, language, percentage, lines_of_code, file_count, bytes_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                repo_id,
                lang.name,
                lang.percentage,
                lang.lines_of_code as i64,
                lang.file_count as i64,
                lang.bytes_count as i64
            ],
        )?;
    }

    for framework in &meta.frameworks {
        tx.execute(
            "INSERT INTO repository_frameworks
                 (repository_id, framework, version, category, confidence, detection_method)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                repo_id,
                framework.name,
                framework.version,
                framework.category,
                framework.confidence,
                framework.detection_method
            ],
        )?;
    }

    for license in &meta.licenses {
        tx.execute(
            "INSERT INTO repository_licenses
                 (repository_id, license_name, license_key, license_type, source_file, confidence)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                repo_id,
                license.name,
                license.key,
                license.license_type,
                license.source_file,
                license.confidence
            ],
        )?;
    }

    for dep in &meta.dependencies {
        tx.execute(
            "INSERT INTO repository_dependencies
                 (repository_id, dependency_name, version, dep_type, package_manager, source_file)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                repo_id,
                dep.name,
                dep.version,
                dep.dep_type,
                dep.package_manager,
                dep.source_file
            ],
        )?;
    }

    Ok(())
}

fn load_languages(conn: &Connection, path: &str) -> Result<Vec<LanguageInfo>> {
    let mut stmt = conn.prepare(
        "SELECT rl.language, rl.percentage, rl.lines_of_code, rl.file_count, rl.bytes_count
         FROM repository_languages rl
         JOIN repositories r ON r.id = rl.repository_id
         WHERE r.path = ?1
         ORDER BY rl.lines_of_code DESC",
    )?;
    let rows = stmt.query_map(params![path], |row| {
        Ok(LanguageInfo {
            name: row.get(0)?,
            percentage: row.get(1)?,
            lines_of_code: row.get::<_, i64>(2)? as u64,
            file_count: row.get::<_, i64>(3)? as u64,
            bytes_count: row.get::<_, i64>(4)? as u64,
        })
    })?;
    Ok(rows.collect::<std::result::Result<_, _>>()?)
}

fn load_frameworks(conn: &Connection, path: &str) -> Result<Vec<FrameworkInfo>> {
    let mut stmt = conn.prepare(
        "SELECT rf.framework, rf.version, rf.category, rf.confidence, rf.detection_method
         FROM repository_frameworks rf
         JOIN repositories r ON r.id = rf.repository_id
         WHERE r.path = ?1
         ORDER BY rf.confidence DESC",
    )?;
    let rows = stmt.query_map(params![path], |row| {
        Ok(FrameworkInfo {
            name: row.get(0)?,
            version: row.get(1)?,
            category: row.get(2)?,
            confidence: row.get(3)?,
            detection_method: row.get(4)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<_, _>>()?)
}

fn load_licenses(conn: &Connection, path: &str) -> Result<Vec<LicenseInfo>> {
    let mut stmt = conn.prepare(
        "SELECT rl.license_name, rl.license_key, rl.license_type, rl.source_file, rl.confidence
         FROM repository_licenses rl
         JOIN repositories r ON r.id = rl.repository_id
         WHERE r.path = ?1
         ORDER BY rl.confidence DESC",
    )?;
    let rows = stmt.query_map(params![path], |row| {
        Ok(LicenseInfo {
            name: row.get(0)?,
            key: row.get(1)?,
            license_type: row.get(2)?,
            source_file: row.get(3)?,
            confidence: row.get(4)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<_, _>>()?)
}

fn load_dependencies(conn: &Connection, path: &str) -> Result<Vec<DependencyInfo>> {
    let mut stmt = conn.prepare(
        "SELECT rd.dependency_name, rd.version, rd.dep_type, rd.package_manager, rd.source_file
         FROM repository_dependencies rd
         JOIN repositories r ON r.id = rd.repository_id
         WHERE r.path = ?1
         ORDER BY rd.dependency_name",
    )?;
    let rows = stmt.query_map(params![path], |row| {
        Ok(DependencyInfo {
            name: row.get(0)?,
            version: row.get(1)?,
            dep_type: row.get(2)?,
            package_manager: row.get(3)?,
            source_file: row.get(4)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<_, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> ProjectMetadata {
        ProjectMetadata {
            project_type: "rust".to_string(),
            main_language: "Rust".to_string(),
            total_lines_of_code: 1200,
            file_count: 14,
            directory_count: 3,
            repository_size: 80_000,
            has_readme: true,
            has_license: true,
            has_tests: true,
            has_ci: false,
            has_docs: false,
            structure_hash: "hash-a".to_string(),
            analyzed_at: Some(Local::now()),
            languages: vec![LanguageInfo {
                name: "Rust".to_string(),
                percentage: 100.0,
                lines_of_code: 1200,
                file_count: 14,
                bytes_count: 80_000,
            }],
            frameworks: vec![FrameworkInfo {
                name: "Tokio".to_string(),
                version: "1".to_string(),
                category: "runtime".to_string(),
                confidence: 0.9,
                detection_method: "dependency in Cargo.toml".to_string(),
            }],
            licenses: vec![LicenseInfo {
                name: "MIT License".to_string(),
                key: "mit".to_string(),
                license_type: "permissive".to_string(),
                source_file: "LICENSE".to_string(),
                confidence: 0.95,
            }],
            dependencies: vec![DependencyInfo {
                name: "tokio".to_string(),
                version: "1".to_string(),
                dep_type: "runtime".to_string(),
                package_manager: "cargo".to_string(),
                source_file: "Cargo.toml".to_string(),
            }],
        }
    }

    fn cache() -> MetadataCache {
        MetadataCache::new(Store::open_in_memory().unwrap())
    }

    #[test]
    fn test_save_and_get_roundtrip() {
        let cache = cache();
        let meta = sample_metadata();
        cache.save("/r1", "r1", &meta).unwrap();

        let loaded = cache.get("/r1", "hash-a").unwrap().unwrap();
        assert_eq!(loaded.main_language, "Rust");
        assert_eq!(loaded.languages.len(), 1);
        assert_eq!(loaded.frameworks[0].name, "Tokio");
        assert_eq!(loaded.licenses[0].key, "mit");
        assert_eq!(loaded.dependencies[0].name, "tokio");
    }

    #[test]
    fn test_stale_structure_hash_misses() {
        let cache = cache();
        cache.save("/r1", "r1", &sample_metadata()).unwrap();
        assert!(cache.get("/r1", "hash-b").unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_children() {
        let cache = cache();
        cache.save("/r1", "r1", &sample_metadata()).unwrap();

        let mut updated = sample_metadata();
        updated.structure_hash = "hash-b".to_string();
        updated.dependencies = vec![DependencyInfo {
            name: "serde".to_string(),
            version: "1".to_string(),
            dep_type: "runtime".to_string(),
            package_manager: "cargo".to_string(),
            source_file: "Cargo.toml".to_string(),
        }];
        cache.save("/r1", "r1", &updated).unwrap();

        let loaded = cache.get("/r1", "hash-b").unwrap().unwrap();
        assert_eq!(loaded.dependencies.len(), 1);
        assert_eq!(loaded.dependencies[0].name, "serde");
    }

    #[test]
    fn test_refresh_cascades() {
        let store = Store::open_in_memory().unwrap();
        let cache = MetadataCache::new(store.clone());
        cache.save("/r1", "r1", &sample_metadata()).unwrap();

        assert!(cache.refresh("/r1").unwrap());

        let orphans: i64 = store
            .with_connection(|c| {
                Ok(c.query_row("SELECT COUNT(*) FROM repository_languages", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(orphans, 0);
        assert!(cache.get("/r1", "hash-a").unwrap().is_none());
    }
}
