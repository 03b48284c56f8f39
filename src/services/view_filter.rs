use serde::Deserialize;
use std::fmt;

use crate::models::identity::{Identity, Role};
use crate::models::pass::Pass;
use crate::services::role_resolver::{RoleResolver, TeacherMatch};

/// Which list of passes a page or feed shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Monitor,
    #[default]
    Dashboard,
    Teacher,
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            View::Monitor => "monitor",
            View::Dashboard => "dashboard",
            View::Teacher => "teacher",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Newest first
pub fn sort_newest_first(passes: &mut [Pass]) {
    passes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Picks the passes a view shows, newest first.
///
/// The dashboard keeps every pass and leaves action visibility to the page.
/// The teacher view is empty for callers who are not signed-in staff.
pub fn filter_for_view<'a, I>(
    passes: I,
    view: View,
    identity: Option<&Identity>,
    role: Role,
    roster: &RoleResolver,
) -> Vec<Pass>
where
    I: IntoIterator<Item = &'a Pass>,
{
    let mut sorted: Vec<Pass> = passes.into_iter().cloned().collect();
    sort_newest_first(&mut sorted);

    match view {
        View::Monitor => sorted.retain(Pass::is_active),
        View::Dashboard => {}
        View::Teacher => match identity.filter(|_| role.is_staff()) {
            Some(identity) => {
                let matcher = TeacherMatcher::new(identity, roster);
                sorted.retain(|pass| matcher.matches(&pass.teacher));
            }
            None => sorted.clear(),
        },
    }

    sorted
}

/// Decides whether a pass's free-text `teacher` field names a teacher.
struct TeacherMatcher {
    mode: TeacherMatch,
    name: Option<String>,
    email: Option<String>,
    email_local_part: Option<String>,
}

impl TeacherMatcher {
    fn new(identity: &Identity, roster: &RoleResolver) -> Self {
        Self {
            mode: roster.teacher_match(),
            name: roster.teacher_name(identity).map(str::to_lowercase),
            email: identity.normalized_email(),
            email_local_part: identity.email_local_part(),
        }
    }

    fn matches(&self, teacher_field: &str) -> bool {
        let field = teacher_field.trim().to_lowercase();
        if field.is_empty() {
            return false;
        }

        match self.mode {
            TeacherMatch::Substring => [&self.name, &self.email_local_part]
                .into_iter()
                .flatten()
                .any(|needle| field.contains(needle.as_str())),
            TeacherMatch::Keyed => [&self.name, &self.email]
                .into_iter()
                .flatten()
                .any(|key| field == *key),
        }
    }
}
