use serde::Deserialize;

use crate::models::pass::Destination;

/// Query string of the home page, as sent by browsers and kiosk links
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NavigationQuery {
    pub mode: Option<String>,
    pub view: Option<String>,
    pub destination: Option<String>,
    pub teacher: Option<String>,
}

/// Fixed kiosk fields a pass form starts with
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KioskPreset {
    pub destination: Option<Destination>,
    pub teacher: Option<String>,
}

impl KioskPreset {
    pub fn new(destination: Option<&str>, teacher: Option<&str>) -> Self {
        Self {
            destination: destination
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(Destination::parse),
            teacher: teacher
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        }
    }

    /// Query string that reopens the kiosk with this preset
    pub fn query_string(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("mode", "kiosk");
        if let Some(destination) = &self.destination {
            query.append_pair("destination", destination.as_str());
        }
        if let Some(teacher) = &self.teacher {
            query.append_pair("teacher", teacher);
        }
        query.finish()
    }

    /// Local path of the kiosk page, used to come back after submitting
    pub fn path(&self) -> String {
        format!("/?{}", self.query_string())
    }
}

/// Page the home route renders
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Kiosk(KioskPreset),
    Monitor,
    Teacher,
    Dashboard,
}

impl Navigation {
    /// `mode=kiosk` wins over `view`; unknown values fall back to the dashboard
    pub fn from_query(query: &NavigationQuery) -> Self {
        if is(&query.mode, "kiosk") {
            return Navigation::Kiosk(KioskPreset::new(
                query.destination.as_deref(),
                query.teacher.as_deref(),
            ));
        }

        if is(&query.view, "monitor") {
            Navigation::Monitor
        } else if is(&query.view, "teacher") {
            Navigation::Teacher
        } else {
            Navigation::Dashboard
        }
    }
}

fn is(value: &Option<String>, expected: &str) -> bool {
    value
        .as_deref()
        .is_some_and(|v| v.trim().eq_ignore_ascii_case(expected))
}
