use crate::host::{EnrollmentStore, GradeStore, GradeTreeProvider, RoleStore};
use crate::model::{
    sort_learners, Aggregation, Cohort, Course, DisplayType, Grade, GradeCategory, GradeItem,
    ItemKind, Learner, Teacher,
};
use crate::tree::{CollapsedState, GradeTree};
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};

pub const TEACHER_ROLES: [&str; 2] = ["editingteacher", "teacher"];
pub const STUDENT_ROLE: &str = "student";

/// Host collaborators backed by the workspace mirror tables.
pub struct SqliteHost<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteHost<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn scale_labels(&self, scale_id: i64) -> anyhow::Result<Option<Vec<String>>> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT items FROM scales WHERE id = ?", [scale_id], |r| r.get(0))
            .optional()?;
        Ok(raw.map(|s| split_csv(&s)))
    }

    fn learners_where<P: rusqlite::Params>(&self, sql: &str, params: P) -> anyhow::Result<Vec<Learner>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut learners = stmt
            .query_map(params, |r| {
                Ok(Learner {
                    id: r.get(0)?,
                    firstname: r.get(1)?,
                    lastname: r.get(2)?,
                    email: r.get(3)?,
                    picture: r.get::<_, i64>(4)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        sort_learners(&mut learners);
        Ok(learners)
    }
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| p.to_string())
        .collect()
}

fn in_placeholders(n: usize) -> String {
    std::iter::repeat("?").take(n).collect::<Vec<_>>().join(",")
}

impl GradeTreeProvider for SqliteHost<'_> {
    fn grade_tree(&self, course: &Course, collapsed: &CollapsedState) -> anyhow::Result<GradeTree> {
        let mut cat_stmt = self.conn.prepare(
            "SELECT id, parent_id, name, aggregation, hidden, sortorder
             FROM grade_categories
             WHERE course_id = ?
             ORDER BY sortorder, id",
        )?;
        let categories = cat_stmt
            .query_map([course.id], |r| {
                let aggregation: String = r.get(3)?;
                Ok(GradeCategory {
                    id: r.get(0)?,
                    course_id: course.id,
                    parent_id: r.get(1)?,
                    name: r.get(2)?,
                    aggregation: Aggregation::parse(&aggregation).unwrap_or(Aggregation::Mean),
                    hidden: r.get::<_, i64>(4)? != 0,
                    sortorder: r.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("load grade categories for course {}", course.id))?;

        let mut item_stmt = self.conn.prepare(
            "SELECT id, category_id, name, itemtype, grademin, grademax, gradepass, decimals,
                    display_type, scale_id, hidden, locked, needsupdate, sortorder, depends_on
             FROM grade_items
             WHERE course_id = ?
             ORDER BY sortorder, id",
        )?;
        let rows = item_stmt
            .query_map([course.id], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, Option<i64>>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    (
                        r.get::<_, f64>(4)?,
                        r.get::<_, f64>(5)?,
                        r.get::<_, f64>(6)?,
                        r.get::<_, i64>(7)?,
                    ),
                    r.get::<_, String>(8)?,
                    r.get::<_, Option<i64>>(9)?,
                    (
                        r.get::<_, i64>(10)? != 0,
                        r.get::<_, i64>(11)? != 0,
                        r.get::<_, i64>(12)? != 0,
                    ),
                    r.get::<_, i64>(13)?,
                    r.get::<_, String>(14)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("load grade items for course {}", course.id))?;

        let mut items = Vec::with_capacity(rows.len());
        for (
            id,
            category_id,
            name,
            itemtype,
            (grademin, grademax, gradepass, decimals),
            display_type,
            scale_id,
            (hidden, locked, needsupdate),
            sortorder,
            depends_on,
        ) in rows
        {
            let kind = ItemKind::parse(&itemtype)
                .ok_or_else(|| anyhow::anyhow!("grade item {} has unknown itemtype {}", id, itemtype))?;
            let scale = match scale_id {
                Some(sid) => self.scale_labels(sid)?,
                None => None,
            };
            let display_type = DisplayType::parse(&display_type).unwrap_or(if scale.is_some() {
                DisplayType::Scale
            } else {
                DisplayType::Numeric
            });
            items.push(GradeItem {
                id,
                course_id: course.id,
                category_id,
                name,
                kind,
                grademin,
                grademax,
                gradepass,
                decimals: decimals.clamp(0, 5) as u8,
                display_type,
                scale,
                hidden,
                locked,
                needsupdate,
                sortorder,
                depends_on: split_csv(&depends_on)
                    .iter()
                    .filter_map(|s| s.parse::<i64>().ok())
                    .collect(),
            });
        }

        Ok(GradeTree::build(
            course.id,
            &course.shortname,
            categories,
            items,
            collapsed,
        ))
    }
}

impl GradeStore for SqliteHost<'_> {
    fn final_grades_for(
        &self,
        course_id: i64,
        user_ids: &[i64],
    ) -> anyhow::Result<HashMap<(i64, i64), Grade>> {
        let mut out = HashMap::new();
        if user_ids.is_empty() {
            return Ok(out);
        }
        let sql = format!(
            "SELECT g.user_id, g.item_id, g.finalgrade, g.feedback, g.hidden, g.excluded,
                    g.overridden, g.time_submitted
             FROM grade_grades g
             JOIN grade_items gi ON gi.id = g.item_id
             WHERE gi.course_id = ? AND g.user_id IN ({})",
            in_placeholders(user_ids.len())
        );
        let mut params: Vec<i64> = Vec::with_capacity(user_ids.len() + 1);
        params.push(course_id);
        params.extend_from_slice(user_ids);

        let mut stmt = self.conn.prepare(&sql)?;
        let grades = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), |r| {
                Ok(Grade {
                    user_id: r.get(0)?,
                    item_id: r.get(1)?,
                    finalgrade: r.get(2)?,
                    feedback: r.get(3)?,
                    hidden: r.get::<_, i64>(4)? != 0,
                    excluded: r.get::<_, i64>(5)? != 0,
                    overridden: r.get::<_, i64>(6)? != 0,
                    time_submitted: r.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("load grades for course {}", course_id))?;
        for g in grades {
            out.insert((g.user_id, g.item_id), g);
        }
        Ok(out)
    }
}

impl EnrollmentStore for SqliteHost<'_> {
    fn cohort(&self, cohort_id: i64) -> anyhow::Result<Option<Cohort>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, idnumber FROM cohorts WHERE id = ?",
                [cohort_id],
                |r| {
                    Ok(Cohort {
                        id: r.get(0)?,
                        name: r.get(1)?,
                        idnumber: r.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    fn cohort_courses(&self, cohort_id: i64) -> anyhow::Result<Vec<Course>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.shortname, c.fullname, MIN(e.sortorder) AS so
             FROM enrol e
             JOIN courses c ON c.id = e.course_id
             WHERE e.enrol = 'cohort' AND e.cohort_id = ?
             GROUP BY c.id, c.shortname, c.fullname
             ORDER BY so, c.id",
        )?;
        let courses = stmt
            .query_map([cohort_id], |r| {
                Ok(Course {
                    id: r.get(0)?,
                    shortname: r.get(1)?,
                    fullname: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(courses)
    }

    fn cohort_learners(&self, cohort_id: i64) -> anyhow::Result<Vec<Learner>> {
        self.learners_where(
            "SELECT u.id, u.firstname, u.lastname, u.email, u.picture
             FROM users u
             JOIN cohort_members cm ON cm.user_id = u.id
             WHERE cm.cohort_id = ? AND u.deleted = 0 AND u.suspended = 0",
            [cohort_id],
        )
    }

    fn course_learners(&self, course_id: i64) -> anyhow::Result<Vec<Learner>> {
        self.learners_where(
            "SELECT DISTINCT u.id, u.firstname, u.lastname, u.email, u.picture
             FROM users u
             JOIN role_assignments ra ON ra.user_id = u.id
             WHERE ra.course_id = ? AND ra.role = ? AND u.deleted = 0",
            (course_id, STUDENT_ROLE),
        )
    }

    fn course(&self, course_id: i64) -> anyhow::Result<Option<Course>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, shortname, fullname FROM courses WHERE id = ?",
                [course_id],
                |r| {
                    Ok(Course {
                        id: r.get(0)?,
                        shortname: r.get(1)?,
                        fullname: r.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    fn active_enrolments(
        &self,
        course_id: i64,
        user_ids: &[i64],
        now: i64,
    ) -> anyhow::Result<HashSet<i64>> {
        if user_ids.is_empty() {
            return Ok(HashSet::new());
        }
        // Enabled instance, active user enrolment, `now` inside the window.
        let sql = format!(
            "SELECT DISTINCT ue.user_id
             FROM user_enrolments ue
             JOIN enrol e ON e.id = ue.enrol_id
             WHERE e.course_id = ?
               AND ue.status = 0 AND e.status = 0
               AND ue.time_start < ? AND (ue.time_end = 0 OR ue.time_end > ?)
               AND ue.user_id IN ({})",
            in_placeholders(user_ids.len())
        );
        let mut params: Vec<i64> = vec![course_id, now, now];
        params.extend_from_slice(user_ids);
        let mut stmt = self.conn.prepare(&sql)?;
        let active = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), |r| r.get::<_, i64>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(active)
    }
}

impl RoleStore for SqliteHost<'_> {
    fn teachers_for(&self, course_id: i64) -> anyhow::Result<Vec<Teacher>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT u.id, u.firstname, u.lastname, c.shortname
             FROM role_assignments ra
             JOIN users u ON u.id = ra.user_id
             JOIN courses c ON c.id = ra.course_id
             WHERE ra.course_id = ? AND ra.role IN (?, ?)
               AND u.deleted = 0 AND u.suspended = 0 AND u.is_guest = 0
             ORDER BY u.lastname, u.firstname, c.shortname, u.id",
        )?;
        let rows = stmt
            .query_map((course_id, TEACHER_ROLES[0], TEACHER_ROLES[1]), |r| {
                Ok(Teacher {
                    id: r.get(0)?,
                    firstname: r.get(1)?,
                    lastname: r.get(2)?,
                    course_shortname: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::new();
        Ok(rows.into_iter().filter(|t| seen.insert(t.id)).collect())
    }
}
