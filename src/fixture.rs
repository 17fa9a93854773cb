//! Sample host mirror shared by unit tests.
//!
//! Cohort "Year 10" is enrolled in Biology (sortorder 1) and Chemistry
//! (sortorder 5). Ada, Ben and Cara are active members; a deleted and a
//! suspended account are members too. Cara's Chemistry enrolment is
//! suspended. Ben's Biology essay grade is hidden.

use crate::db;
use crate::snapshot::*;
use rusqlite::Connection;

pub const NOW: i64 = 1_750_000_000;

pub const COHORT_ID: i64 = 1;
pub const EMPTY_COHORT: i64 = 2;
pub const COURSELESS_COHORT: i64 = 3;

pub const ADA: i64 = 101;
pub const BEN: i64 = 102;
pub const CARA: i64 = 103;
const DELETED_USER: i64 = 104;
const SUSPENDED_USER: i64 = 105;

pub const BIOLOGY: i64 = 11;
pub const CHEMISTRY: i64 = 12;
/// No gradebook at all; only added by `with_ungraded_course`.
pub const PHYSICS: i64 = 13;

pub const BIO_QUIZ: i64 = 1001;
pub const BIO_ESSAY: i64 = 1002;
pub const BIO_ESSAYS_TOTAL: i64 = 1003;
pub const BIO_TOTAL: i64 = 1004;
pub const CHEM_LAB: i64 = 2001;
pub const CHEM_MIDTERM: i64 = 2002;
pub const CHEM_TOTAL: i64 = 2003;

pub const ESSAY_SUBMITTED: i64 = 1_700_000_000;

fn user(id: i64, first: &str, last: &str) -> SnapshotUser {
    SnapshotUser {
        id,
        firstname: first.to_string(),
        lastname: last.to_string(),
        email: format!("{}@school.test", first.to_ascii_lowercase()),
        picture: id == ADA,
        deleted: false,
        suspended: false,
        guest: false,
    }
}

fn enrolment(id: i64, course_id: i64, cohort_id: i64, sortorder: i64) -> SnapshotEnrolment {
    SnapshotEnrolment {
        id,
        course_id,
        enrol: "cohort".to_string(),
        cohort_id: Some(cohort_id),
        status: 0,
        sortorder,
    }
}

fn user_enrolment(enrol_id: i64, user_id: i64) -> SnapshotUserEnrolment {
    SnapshotUserEnrolment {
        enrol_id,
        user_id,
        status: 0,
        time_start: 0,
        time_end: 0,
    }
}

fn role(course_id: i64, user_id: i64, role: &str) -> SnapshotRoleAssignment {
    SnapshotRoleAssignment {
        course_id,
        user_id,
        role: role.to_string(),
    }
}

fn category(id: i64, course_id: i64, parent_id: Option<i64>, name: &str, sortorder: i64) -> SnapshotGradeCategory {
    SnapshotGradeCategory {
        id,
        course_id,
        parent_id,
        name: name.to_string(),
        aggregation: "mean".to_string(),
        hidden: false,
        sortorder,
    }
}

fn item(
    id: i64,
    course_id: i64,
    category_id: i64,
    itemtype: &str,
    name: &str,
    grademax: f64,
    decimals: i64,
    sortorder: i64,
) -> SnapshotGradeItem {
    SnapshotGradeItem {
        id,
        course_id,
        category_id: Some(category_id),
        name: name.to_string(),
        itemtype: itemtype.to_string(),
        grademin: 0.0,
        grademax,
        gradepass: 0.0,
        decimals,
        display_type: "numeric".to_string(),
        scale_id: None,
        hidden: false,
        locked: false,
        needsupdate: false,
        sortorder,
        depends_on: Vec::new(),
    }
}

fn grade(item_id: i64, user_id: i64, finalgrade: f64) -> SnapshotGrade {
    SnapshotGrade {
        item_id,
        user_id,
        finalgrade: Some(finalgrade),
        feedback: None,
        hidden: false,
        excluded: false,
        overridden: false,
        time_submitted: None,
    }
}

pub fn sample_snapshot() -> Snapshot {
    let mut deleted = user(DELETED_USER, "Dan", "Dropped");
    deleted.deleted = true;
    let mut suspended = user(SUSPENDED_USER, "Sam", "Stopped");
    suspended.suspended = true;
    let mut guest = user(203, "Gus", "Guest");
    guest.guest = true;

    let mut chem_cara = user_enrolment(1, CARA);
    chem_cara.status = 1;
    let mut chem_ben = user_enrolment(1, BEN);
    chem_ben.time_start = NOW - 1000;

    let mut essay = item(BIO_ESSAY, BIOLOGY, 101, "mod", "Essay on photosynthesis and cellular respiration", 100.0, 0, 1);
    essay.gradepass = 50.0;
    let mut lab = item(CHEM_LAB, CHEMISTRY, 200, "mod", "Lab report", 3.0, 0, 1);
    lab.grademin = 1.0;
    lab.display_type = "scale".to_string();
    lab.scale_id = Some(1);
    let mut chem_total = item(CHEM_TOTAL, CHEMISTRY, 200, "course", "Course total", 100.0, 1, 99);
    chem_total.needsupdate = true;

    let mut ben_essay = grade(BIO_ESSAY, BEN, 40.0);
    ben_essay.hidden = true;
    ben_essay.time_submitted = Some(ESSAY_SUBMITTED);
    let mut cara_essay = grade(BIO_ESSAY, CARA, 90.0);
    cara_essay.overridden = true;
    cara_essay.feedback = Some("Excellent structure".to_string());

    Snapshot {
        cohorts: vec![
            SnapshotCohort { id: COHORT_ID, name: "Year 10".to_string(), idnumber: Some("Y10".to_string()) },
            SnapshotCohort { id: EMPTY_COHORT, name: "Year 11".to_string(), idnumber: None },
            SnapshotCohort { id: COURSELESS_COHORT, name: "Staff".to_string(), idnumber: None },
        ],
        users: vec![
            user(ADA, "Ada", "Adams"),
            user(BEN, "Ben", "Baker"),
            user(CARA, "Cara", "Cole"),
            deleted,
            suspended,
            user(201, "Sue", "Lee"),
            user(202, "Tom", "Hardy"),
            guest,
        ],
        courses: vec![
            SnapshotCourse { id: BIOLOGY, shortname: "BIO10".to_string(), fullname: "Biology 10".to_string() },
            SnapshotCourse { id: CHEMISTRY, shortname: "CHEM10".to_string(), fullname: "Chemistry 10".to_string() },
        ],
        cohort_members: [ADA, BEN, CARA, DELETED_USER, SUSPENDED_USER]
            .iter()
            .map(|u| SnapshotCohortMember { cohort_id: COHORT_ID, user_id: *u })
            .chain(std::iter::once(SnapshotCohortMember { cohort_id: COURSELESS_COHORT, user_id: ADA }))
            .collect(),
        enrolments: vec![
            enrolment(1, CHEMISTRY, COHORT_ID, 5),
            enrolment(2, BIOLOGY, COHORT_ID, 1),
            enrolment(3, BIOLOGY, EMPTY_COHORT, 0),
        ],
        user_enrolments: vec![
            user_enrolment(2, ADA),
            user_enrolment(2, BEN),
            user_enrolment(2, CARA),
            user_enrolment(1, ADA),
            chem_ben,
            chem_cara,
        ],
        role_assignments: vec![
            role(BIOLOGY, ADA, "student"),
            role(BIOLOGY, BEN, "student"),
            role(BIOLOGY, CARA, "student"),
            role(CHEMISTRY, ADA, "student"),
            role(CHEMISTRY, BEN, "student"),
            role(CHEMISTRY, CARA, "student"),
            role(BIOLOGY, 201, "editingteacher"),
            role(BIOLOGY, 202, "editingteacher"),
            role(BIOLOGY, 202, "teacher"),
            role(BIOLOGY, 203, "teacher"),
        ],
        scales: vec![SnapshotScale {
            id: 1,
            name: "Lab scale".to_string(),
            items: vec!["Poor".to_string(), "Fair".to_string(), "Good".to_string()],
        }],
        grade_categories: vec![
            category(100, BIOLOGY, None, "BIO10", 0),
            category(101, BIOLOGY, Some(100), "Essays", 2),
            category(200, CHEMISTRY, None, "CHEM10", 0),
        ],
        grade_items: vec![
            item(BIO_QUIZ, BIOLOGY, 100, "mod", "Quiz 1", 10.0, 1, 1),
            essay,
            item(BIO_ESSAYS_TOTAL, BIOLOGY, 101, "category", "Essays total", 100.0, 1, 9),
            item(BIO_TOTAL, BIOLOGY, 100, "course", "Course total", 100.0, 1, 99),
            lab,
            item(CHEM_MIDTERM, CHEMISTRY, 200, "manual", "Midterm", 50.0, 0, 2),
            chem_total,
        ],
        grades: vec![
            grade(BIO_QUIZ, ADA, 8.0),
            grade(BIO_ESSAY, ADA, 72.0),
            grade(BIO_ESSAYS_TOTAL, ADA, 72.0),
            grade(BIO_TOTAL, ADA, 76.0),
            grade(BIO_QUIZ, BEN, 6.0),
            ben_essay,
            grade(BIO_ESSAYS_TOTAL, BEN, 40.0),
            grade(BIO_TOTAL, BEN, 50.0),
            cara_essay,
            grade(BIO_ESSAYS_TOTAL, CARA, 90.0),
            grade(BIO_TOTAL, CARA, 90.0),
            grade(CHEM_LAB, ADA, 3.0),
            grade(CHEM_MIDTERM, ADA, 45.0),
            grade(CHEM_LAB, BEN, 2.0),
            grade(CHEM_LAB, CARA, 1.0),
        ],
    }
}

/// Adds Physics to Year 10 after Chemistry, with one teacher and no grade
/// categories or items.
pub fn with_ungraded_course(mut snapshot: Snapshot) -> Snapshot {
    snapshot.courses.push(SnapshotCourse {
        id: PHYSICS,
        shortname: "PHYS10".to_string(),
        fullname: "Physics 10".to_string(),
    });
    snapshot.enrolments.push(enrolment(4, PHYSICS, COHORT_ID, 9));
    for uid in [ADA, BEN, CARA] {
        snapshot.user_enrolments.push(user_enrolment(4, uid));
        snapshot.role_assignments.push(role(PHYSICS, uid, "student"));
    }
    snapshot.role_assignments.push(role(PHYSICS, 201, "editingteacher"));
    snapshot
}

pub fn db_from(snapshot: &Snapshot) -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    db::init_schema(&conn).expect("init schema");
    import_snapshot(&conn, snapshot).expect("import sample snapshot");
    conn
}

pub fn sample_db() -> Connection {
    db_from(&sample_snapshot())
}
