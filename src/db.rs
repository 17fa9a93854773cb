use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "multicourse.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Creates the host mirror tables. Safe to call on an existing workspace.
pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS cohorts(
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            idnumber TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id INTEGER PRIMARY KEY,
            firstname TEXT NOT NULL,
            lastname TEXT NOT NULL,
            email TEXT NOT NULL DEFAULT '',
            picture INTEGER NOT NULL DEFAULT 0,
            deleted INTEGER NOT NULL DEFAULT 0,
            suspended INTEGER NOT NULL DEFAULT 0,
            is_guest INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS cohort_members(
            cohort_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            PRIMARY KEY(cohort_id, user_id),
            FOREIGN KEY(cohort_id) REFERENCES cohorts(id),
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id INTEGER PRIMARY KEY,
            shortname TEXT NOT NULL,
            fullname TEXT NOT NULL
        )",
        [],
    )?;

    // Enrolment instances. `enrol` is the plugin name; cohort-sync
    // instances carry the cohort they mirror.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrol(
            id INTEGER PRIMARY KEY,
            course_id INTEGER NOT NULL,
            enrol TEXT NOT NULL,
            cohort_id INTEGER,
            status INTEGER NOT NULL DEFAULT 0,
            sortorder INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrol_cohort ON enrol(cohort_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS user_enrolments(
            id INTEGER PRIMARY KEY,
            enrol_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            status INTEGER NOT NULL DEFAULT 0,
            time_start INTEGER NOT NULL DEFAULT 0,
            time_end INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(enrol_id) REFERENCES enrol(id),
            FOREIGN KEY(user_id) REFERENCES users(id),
            UNIQUE(enrol_id, user_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_user_enrolments_user ON user_enrolments(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS role_assignments(
            course_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            role TEXT NOT NULL,
            PRIMARY KEY(course_id, user_id, role),
            FOREIGN KEY(course_id) REFERENCES courses(id),
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS scales(
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            items TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_categories(
            id INTEGER PRIMARY KEY,
            course_id INTEGER NOT NULL,
            parent_id INTEGER,
            name TEXT NOT NULL,
            aggregation TEXT NOT NULL DEFAULT 'mean',
            hidden INTEGER NOT NULL DEFAULT 0,
            sortorder INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grade_categories_course ON grade_categories(course_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_items(
            id INTEGER PRIMARY KEY,
            course_id INTEGER NOT NULL,
            category_id INTEGER,
            name TEXT NOT NULL,
            itemtype TEXT NOT NULL,
            grademin REAL NOT NULL DEFAULT 0,
            grademax REAL NOT NULL DEFAULT 100,
            gradepass REAL NOT NULL DEFAULT 0,
            decimals INTEGER NOT NULL DEFAULT 2,
            display_type TEXT NOT NULL DEFAULT 'numeric',
            scale_id INTEGER,
            hidden INTEGER NOT NULL DEFAULT 0,
            locked INTEGER NOT NULL DEFAULT 0,
            needsupdate INTEGER NOT NULL DEFAULT 0,
            sortorder INTEGER NOT NULL DEFAULT 0,
            depends_on TEXT NOT NULL DEFAULT '',
            FOREIGN KEY(course_id) REFERENCES courses(id),
            FOREIGN KEY(scale_id) REFERENCES scales(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grade_items_course ON grade_items(course_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_grades(
            item_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            finalgrade REAL,
            feedback TEXT,
            hidden INTEGER NOT NULL DEFAULT 0,
            excluded INTEGER NOT NULL DEFAULT 0,
            overridden INTEGER NOT NULL DEFAULT 0,
            time_submitted INTEGER,
            FOREIGN KEY(item_id) REFERENCES grade_items(id),
            FOREIGN KEY(user_id) REFERENCES users(id),
            UNIQUE(item_id, user_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grade_grades_user ON grade_grades(user_id)",
        [],
    )?;

    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}
