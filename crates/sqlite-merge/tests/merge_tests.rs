//! End-to-end merge tests over real database files.
//!
//! Fixtures follow the Owner / TodoList shape: an Owner has a unique name,
//! a TodoList belongs to an Owner and is unique per (name, owner). The
//! schema document deliberately lists TodoList before Owner so the tests
//! also exercise the dependency ordering.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use sqlite_merge::{MergeConfig, MergeReport, Merger, Schema};
use tempfile::TempDir;

fn schema() -> Schema {
    Schema::from_json(
        r#"{
            "models": {
                "TodoList": {
                    "columns": [
                        { "name": "id",      "type": { "name": "String" }, "primary_key": true },
                        { "name": "name",    "type": { "name": "String" } },
                        { "name": "ownerId", "type": { "name": "String" } },
                        { "name": "owner",   "type": { "name": "Owner" },
                          "relation": { "fields": ["ownerId"], "references": ["id"] } }
                    ],
                    "unique_fields": ["name", "ownerId"]
                },
                "Owner": {
                    "columns": [
                        { "name": "id",   "type": { "name": "String" }, "primary_key": true },
                        { "name": "name", "type": { "name": "String" }, "unique": true }
                    ]
                }
            }
        }"#,
    )
    .unwrap()
}

fn apply_ddl(conn: &Connection) {
    conn.execute_batch(
        r#"
            CREATE TABLE IF NOT EXISTS "Owner" (
                "id"    TEXT NOT NULL PRIMARY KEY,
                "name"  TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS "Owner_name_key"
            ON "Owner"("name");

            CREATE TABLE IF NOT EXISTS "TodoList" (
                "id"      TEXT NOT NULL PRIMARY KEY,
                "name"    TEXT NOT NULL,
                "ownerId" TEXT NOT NULL,
                CONSTRAINT "TodoList_ownerId_fkey"
                    FOREIGN KEY ("ownerId")
                    REFERENCES "Owner" ("id")
                    ON DELETE RESTRICT
                    ON UPDATE CASCADE
            );

            CREATE UNIQUE INDEX IF NOT EXISTS "TodoList_name_ownerId_key"
            ON "TodoList"("name", "ownerId");
        "#,
    )
    .unwrap();
}

fn create_database(dir: &TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    let conn = Connection::open(&path).unwrap();
    apply_ddl(&conn);
    path
}

fn create_owner(path: &Path, name: &str) -> String {
    let conn = Connection::open(path).unwrap();
    let id = uuid_string();
    conn.execute(
        "INSERT INTO \"Owner\" (\"id\", \"name\") VALUES (?1, ?2)",
        [id.as_str(), name],
    )
    .unwrap();
    id
}

fn create_todo_list(path: &Path, name: &str, owner_id: &str) -> String {
    let conn = Connection::open(path).unwrap();
    let id = uuid_string();
    conn.execute(
        "INSERT INTO \"TodoList\" (\"id\", \"name\", \"ownerId\") VALUES (?1, ?2, ?3)",
        [id.as_str(), name, owner_id],
    )
    .unwrap();
    id
}

fn uuid_string() -> String {
    // The engine treats keys as opaque TEXT; any unique string works.
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT: AtomicU64 = AtomicU64::new(0);
    format!("fixture-{:08x}", NEXT.fetch_add(1, Ordering::Relaxed))
}

/// name → id
fn owners_by_name(path: &Path) -> HashMap<String, String> {
    let conn = Connection::open(path).unwrap();
    let mut stmt = conn.prepare("SELECT \"name\", \"id\" FROM \"Owner\"").unwrap();
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap();
    rows.collect::<Result<_, _>>().unwrap()
}

/// name → (id, ownerId)
fn todo_lists_by_name(path: &Path) -> HashMap<String, (String, String)> {
    let conn = Connection::open(path).unwrap();
    let mut stmt = conn
        .prepare("SELECT \"name\", \"id\", \"ownerId\" FROM \"TodoList\"")
        .unwrap();
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, (row.get(1)?, row.get(2)?)))
        })
        .unwrap();
    rows.collect::<Result<_, _>>().unwrap()
}

fn map_entries(path: &Path, table: &str) -> Vec<(String, String)> {
    let conn = Connection::open(path).unwrap();
    let mut stmt = conn
        .prepare(&format!("SELECT old_id, new_id FROM \"{}\"", table))
        .unwrap();
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap();
    rows.collect::<Result<_, _>>().unwrap()
}

fn table_exists(path: &Path, name: &str) -> bool {
    let conn = Connection::open(path).unwrap();
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )
        .unwrap();
    count > 0
}

fn run_merge(
    dir: &TempDir,
    inputs: &[&Path],
    configure: impl FnOnce(&mut MergeConfig),
) -> (MergeReport, PathBuf) {
    let output = dir.path().join("merged.db");
    let mut config = MergeConfig::new(inputs.iter().map(|p| p.to_path_buf()).collect());
    config.output_path = output.clone();
    config.batch_threshold = 1;
    configure(&mut config);

    let report = Merger::new(schema(), config).unwrap().run().unwrap();
    (report, output)
}

#[test]
fn merges_tables_with_no_foreign_keys() {
    let dir = TempDir::new().unwrap();
    let first = create_database(&dir, "first.db");
    let second = create_database(&dir, "second.db");

    let woody = create_owner(&first, "Woody");
    let jessie = create_owner(&second, "Jessie");
    let bo = create_owner(&second, "Bo");

    let (report, output) = run_merge(&dir, &[&first, &second], |_| {});

    let owners = owners_by_name(&output);
    assert_eq!(owners.len(), 3);
    assert_eq!(report.rows_merged, 3);
    assert!(report.integrity_warnings.is_empty());

    // Jessie and Bo come from the primary (two Owner rows vs. one) and
    // keep their ids; Woody is re-keyed.
    assert_eq!(owners["Jessie"], jessie);
    assert_eq!(owners["Bo"], bo);
    assert_ne!(owners["Woody"], woody);
}

#[test]
fn merges_tables_with_foreign_keys() {
    let dir = TempDir::new().unwrap();
    let first = create_database(&dir, "first.db");
    let second = create_database(&dir, "second.db");

    let woody = create_owner(&first, "Woody");
    let jessie = create_owner(&second, "Jessie");
    let bo = create_owner(&second, "Bo");

    create_todo_list(&first, "Groceries", &woody);
    create_todo_list(&second, "Chores", &jessie);
    create_todo_list(&second, "Errands", &bo);

    let (report, output) = run_merge(&dir, &[&first, &second], |_| {});

    let owners = owners_by_name(&output);
    let todo_lists = todo_lists_by_name(&output);

    assert_eq!(owners.len(), 3);
    assert_eq!(todo_lists.len(), 3);
    assert_eq!(report.rows_merged, 6);
    assert!(report.integrity_warnings.is_empty());

    // Every list points at the merged id of its owner.
    assert_eq!(todo_lists["Groceries"].1, owners["Woody"]);
    assert_eq!(todo_lists["Chores"].1, owners["Jessie"]);
    assert_eq!(todo_lists["Errands"].1, owners["Bo"]);
}

#[test]
fn merges_duplicate_records() {
    let dir = TempDir::new().unwrap();
    let first = create_database(&dir, "first.db");
    let second = create_database(&dir, "second.db");

    let first_woody = create_owner(&first, "Woody");
    let second_woody = create_owner(&second, "Woody");

    create_todo_list(&first, "Chores", &first_woody);
    create_todo_list(&second, "Errands", &second_woody);

    let (report, output) = run_merge(&dir, &[&first, &second], |_| {});

    let owners = owners_by_name(&output);
    let todo_lists = todo_lists_by_name(&output);

    // The two Woodys collapse into one row; both lists follow it.
    assert_eq!(owners.len(), 1);
    assert_eq!(todo_lists.len(), 2);
    assert_eq!(report.rows_merged, 4);

    let merged_woody = &owners["Woody"];
    assert!([&first_woody, &second_woody].contains(&merged_woody));

    for (_, (_, owner_id)) in &todo_lists {
        assert_eq!(owner_id, merged_woody);
    }
}

#[test]
fn map_tables_are_dropped_by_default() {
    let dir = TempDir::new().unwrap();
    let first = create_database(&dir, "first.db");
    create_owner(&first, "Woody");

    let (_, output) = run_merge(&dir, &[&first], |_| {});

    assert!(!table_exists(&output, "Owner_id_map"));
    assert!(!table_exists(&output, "TodoList_id_map"));
}

#[test]
fn keep_id_maps_retains_one_entry_per_source_row() {
    let dir = TempDir::new().unwrap();
    let first = create_database(&dir, "first.db");
    let second = create_database(&dir, "second.db");

    let first_woody = create_owner(&first, "Woody");
    let second_woody = create_owner(&second, "Woody");
    let jessie = create_owner(&second, "Jessie");

    let (_, output) = run_merge(&dir, &[&first, &second], |config| {
        config.keep_id_maps = true;
    });

    let mut entries = map_entries(&output, "Owner_id_map");
    entries.sort();

    // Three source rows, three entries; the duplicated Woody rows share
    // one destination key.
    assert_eq!(entries.len(), 3);
    let owners = owners_by_name(&output);
    let by_old: HashMap<String, String> = entries.into_iter().collect();
    assert_eq!(by_old[&first_woody], owners["Woody"]);
    assert_eq!(by_old[&second_woody], owners["Woody"]);
    assert_eq!(by_old[&jessie], owners["Jessie"]);

    // The retained map tables carry their three lookup indices.
    let conn = Connection::open(&output).unwrap();
    let indices: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND tbl_name = 'Owner_id_map'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(indices, 3);
}

#[test]
fn merging_a_single_database_preserves_it() {
    let dir = TempDir::new().unwrap();
    let first = create_database(&dir, "first.db");

    let woody = create_owner(&first, "Woody");
    let jessie = create_owner(&first, "Jessie");
    create_todo_list(&first, "Groceries", &woody);
    create_todo_list(&first, "Chores", &jessie);

    let (report, output) = run_merge(&dir, &[&first], |_| {});

    // A lone source is its own primary: ids survive untouched.
    let owners = owners_by_name(&output);
    assert_eq!(owners.len(), 2);
    assert_eq!(owners["Woody"], woody);
    assert_eq!(owners["Jessie"], jessie);

    let todo_lists = todo_lists_by_name(&output);
    assert_eq!(todo_lists.len(), 2);
    assert_eq!(todo_lists["Groceries"].1, woody);
    assert_eq!(todo_lists["Chores"].1, jessie);

    assert_eq!(report.rows_merged, 4);
    assert!(report.integrity_warnings.is_empty());
}

#[test]
fn stale_foreign_keys_produce_an_integrity_warning() {
    // A schema document that omits the relation annotation: ownerId is
    // copied verbatim instead of being translated, so re-keyed owners
    // leave lists dangling.
    let schema = Schema::from_json(
        r#"{
            "models": {
                "Owner": {
                    "columns": [
                        { "name": "id",   "type": { "name": "String" }, "primary_key": true },
                        { "name": "name", "type": { "name": "String" }, "unique": true }
                    ]
                },
                "TodoList": {
                    "columns": [
                        { "name": "id",      "type": { "name": "String" }, "primary_key": true },
                        { "name": "name",    "type": { "name": "String" } },
                        { "name": "ownerId", "type": { "name": "String" } }
                    ],
                    "unique_fields": ["name", "ownerId"]
                }
            }
        }"#,
    )
    .unwrap();

    let dir = TempDir::new().unwrap();
    let first = create_database(&dir, "first.db");
    let second = create_database(&dir, "second.db");

    let woody = create_owner(&first, "Woody");
    create_todo_list(&first, "Chores", &woody);
    create_owner(&second, "Jessie");
    create_owner(&second, "Bo");

    let output = dir.path().join("merged.db");
    let mut config = MergeConfig::new(vec![first.clone(), second.clone()]);
    config.output_path = output.clone();
    config.batch_threshold = 1;

    let report = Merger::new(schema, config).unwrap().run().unwrap();

    // Woody came from the secondary Owner source and was re-keyed, so the
    // verbatim ownerId no longer resolves.
    assert_eq!(report.integrity_warnings.len(), 1);
    assert_eq!(report.integrity_warnings[0].model, "TodoList");
    assert_eq!(report.integrity_warnings[0].violations, 1);
}

#[test]
fn batch_threshold_does_not_change_the_outcome() {
    let dir = TempDir::new().unwrap();
    let first = create_database(&dir, "first.db");

    let owner = create_owner(&first, "Collector");
    for n in 0..10 {
        create_todo_list(&first, &format!("List {}", n), &owner);
    }

    let (report, output) = run_merge(&dir, &[&first], |config| {
        config.batch_threshold = 3;
    });

    assert_eq!(report.rows_merged, 11);
    assert_eq!(todo_lists_by_name(&output).len(), 10);
    assert!(report.integrity_warnings.is_empty());
}

#[test]
fn remove_existing_replaces_a_previous_output() {
    let dir = TempDir::new().unwrap();
    let first = create_database(&dir, "first.db");
    create_owner(&first, "Woody");

    let (_, output) = run_merge(&dir, &[&first], |_| {});
    assert!(output.exists());

    // Without the remove flag the merge collides with the rows already
    // present in the leftover output.
    let mut config = MergeConfig::new(vec![first.clone()]);
    config.output_path = output.clone();
    assert!(Merger::new(schema(), config).unwrap().run().is_err());

    let mut config = MergeConfig::new(vec![first.clone()]);
    config.output_path = output.clone();
    config.remove_existing = true;
    let report = Merger::new(schema(), config).unwrap().run().unwrap();
    assert_eq!(report.rows_merged, 1);
}
