use crate::host::RoleStore;
use crate::model::Teacher;
use std::collections::HashMap;

/// Teaching staff per course, looked up at most once per course within a
/// single render.
#[derive(Debug, Default)]
pub struct RosterCache {
    by_course: HashMap<i64, Vec<Teacher>>,
    lookups: usize,
}

impl RosterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn teachers_for<R: RoleStore + ?Sized>(
        &mut self,
        store: &R,
        course_id: i64,
    ) -> anyhow::Result<&[Teacher]> {
        if !self.by_course.contains_key(&course_id) {
            self.lookups += 1;
            let teachers = store.teachers_for(course_id)?;
            self.by_course.insert(course_id, teachers);
        }
        Ok(self
            .by_course
            .get(&course_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }

    /// Store lookups performed so far.
    pub fn lookups(&self) -> usize {
        self.lookups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;
    use crate::store::SqliteHost;

    #[test]
    fn repeated_lookups_hit_the_store_once_per_course() {
        let conn = fixture::sample_db();
        let host = SqliteHost::new(&conn);
        let mut cache = RosterCache::new();
        for _ in 0..3 {
            let names: Vec<String> = cache
                .teachers_for(&host, fixture::BIOLOGY)
                .expect("teachers")
                .iter()
                .map(|t| t.lastname.clone())
                .collect();
            assert_eq!(names, vec!["Hardy", "Lee"]);
        }
        assert!(cache
            .teachers_for(&host, fixture::CHEMISTRY)
            .expect("teachers")
            .is_empty());
        assert_eq!(cache.lookups(), 2);
    }
}
