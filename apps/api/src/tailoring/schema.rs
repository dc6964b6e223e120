//! Schema coercion — turns whatever JSON the structuring/arbitrage model
//! returned into a canonical `ResumeDocument`.
//!
//! Total function: it never fails. Aliased keys are tried in priority
//! order, scalar/list shapes are coerced, and anything unusable is dropped.
//! Experience count and order are preserved because experiences are
//! identified by position.

use serde_json::Value;

use crate::models::fields::{first_present, non_blank, sequence, string_list, text};
use crate::models::resume::{
    sanitize_bullets, Award, Certification, Education, Experience, Language, Personal, Project,
    ResumeDocument, MAX_EXPERIENCE_BULLETS,
};

const MAX_SUMMARY_CHARS: usize = 600;
const MAX_PROJECT_BULLETS: usize = 4;

pub fn coerce_document(value: &Value) -> ResumeDocument {
    if !value.is_object() {
        return ResumeDocument::default();
    }

    ResumeDocument {
        personal: coerce_personal(value),
        summary: coerce_summary(value),
        experience: list(value, &["experience", "experiences", "work", "workExperience"])
            .into_iter()
            .map(coerce_experience)
            .collect(),
        education: list(value, &["education"])
            .into_iter()
            .map(coerce_education)
            .filter(|e| !e.school.is_empty())
            .collect(),
        skills: coerce_skills(first_present(value, &["skills"])),
        languages: list(value, &["languages"])
            .into_iter()
            .filter_map(coerce_language)
            .collect(),
        certifications: list(value, &["certifications", "certificates"])
            .into_iter()
            .filter_map(coerce_certification)
            .collect(),
        projects: list(value, &["projects"])
            .into_iter()
            .filter_map(coerce_project)
            .collect(),
        awards: list(value, &["awards", "honors"])
            .into_iter()
            .filter_map(coerce_award)
            .collect(),
    }
}

fn list<'a>(value: &'a Value, keys: &[&str]) -> Vec<&'a Value> {
    first_present(value, keys).map(sequence).unwrap_or_default()
}

fn string_of(value: &Value, keys: &[&str]) -> String {
    non_blank(value, keys).unwrap_or_default()
}

// ── personal ────────────────────────────────────────────────────────────────

fn coerce_personal(doc: &Value) -> Personal {
    let src = first_present(doc, &["personal", "header", "personalInfo", "contact"])
        .filter(|v| v.is_object())
        .unwrap_or(&Value::Null);
    let links = first_present(src, &["links"]).unwrap_or(&Value::Null);

    let email = string_of(src, &["email", "mail"]);
    let linked_in = non_blank(src, &["linkedIn", "linkedin", "linkedin_url"])
        .or_else(|| non_blank(links, &["linkedin", "linkedIn"]))
        .unwrap_or_default();
    let website = non_blank(src, &["website", "portfolio", "url"])
        .or_else(|| non_blank(links, &["portfolio", "website", "github"]))
        .unwrap_or_default();

    Personal {
        full_name: string_of(src, &["fullName", "full_name", "name"]),
        title: string_of(src, &["title", "headline", "role"]),
        email: if looks_like_email(&email) { email } else { String::new() },
        phone: string_of(src, &["phone", "telephone", "mobile"]),
        location: string_of(src, &["location", "city", "address"]),
        website,
        linked_in,
        photo: string_of(src, &["photo", "avatar", "picture"]),
    }
}

fn looks_like_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .map(|(host, tld)| !host.is_empty() && !tld.is_empty())
                    .unwrap_or(false)
        }
        None => false,
    }
}

fn coerce_summary(doc: &Value) -> String {
    let summary = string_of(doc, &["summary", "profile", "about"]);
    summary.chars().take(MAX_SUMMARY_CHARS).collect::<String>().trim_end().to_string()
}

// ── experience ──────────────────────────────────────────────────────────────

fn coerce_experience(item: &Value) -> Experience {
    let mut start = non_blank(item, &["startDate", "start_date", "start", "from", "startDateRaw"]);
    let mut end = non_blank(item, &["endDate", "end_date", "end", "to", "endDateRaw"]);

    if start.is_none() || end.is_none() {
        if let Some(range) = non_blank(item, &["datesRaw", "dates", "period", "years"]) {
            let (range_start, range_end) = split_date_range(&range);
            start = start.or(range_start);
            end = end.or(range_end);
        }
    }

    let bullets = first_present(
        item,
        &["bullets", "achievements", "responsibilities", "tasks", "highlights"],
    )
    .map(string_list)
    .unwrap_or_default();

    Experience {
        company: string_of(
            item,
            &["company", "company_name", "employer", "organization", "organisation", "org"],
        ),
        title: string_of(item, &["title", "position", "role"]),
        location: string_of(item, &["location", "city", "place"]),
        start_date: start.as_deref().and_then(normalize_date),
        end_date: end.as_deref().and_then(normalize_date),
        bullets: sanitize_bullets(bullets, MAX_EXPERIENCE_BULLETS),
    }
}

/// Pulls the first two date-like tokens out of a free-text range such as
/// `"03/2019 – Present"`.
fn split_date_range(range: &str) -> (Option<String>, Option<String>) {
    let tokens: Vec<&str> = range
        .split(|c: char| c.is_whitespace() || matches!(c, '–' | '—' | ',' | '(' | ')'))
        .map(|t| t.trim_matches('-'))
        .flat_map(|t| {
            // "2019-2021" is a range, "2019-03" a single date
            if normalize_date(t).is_some() {
                vec![t]
            } else {
                t.split('-').collect()
            }
        })
        .filter(|t| !t.is_empty() && normalize_date(t).is_some())
        .collect();

    let start = tokens
        .first()
        .filter(|t| normalize_date(t).as_deref() != Some(PRESENT))
        .map(|t| t.to_string());
    let end = tokens.get(1).map(|t| t.to_string());
    (start, end)
}

const PRESENT: &str = "Present";

/// Normalizes a date to `YYYY-MM` or `Present`. Unrecognized input → `None`.
pub fn normalize_date(input: &str) -> Option<String> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if matches!(
        s.to_lowercase().as_str(),
        "present" | "présent" | "now" | "current" | "today"
    ) {
        return Some(PRESENT.to_string());
    }

    let parts: Vec<&str> = s.split(['-', '/', '.']).collect();
    let all_digits = parts
        .iter()
        .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    if !all_digits {
        return None;
    }

    let (year, month) = match parts.as_slice() {
        [y] if y.len() == 4 => (*y, "1"),
        [y, m] if y.len() == 4 && m.len() <= 2 => (*y, *m),
        [m, y] if y.len() == 4 && m.len() <= 2 => (*y, *m),
        [_, m, y] if y.len() == 4 && m.len() <= 2 => (*y, *m),
        [y, m, _] if y.len() == 4 && m.len() <= 2 => (*y, *m),
        _ => return None,
    };

    let year: u32 = year.parse().ok()?;
    let month: u32 = month.parse::<u32>().ok()?.clamp(1, 12);
    Some(format!("{year:04}-{month:02}"))
}

// ── other sections ──────────────────────────────────────────────────────────

fn coerce_education(item: &Value) -> Education {
    Education {
        school: string_of(
            item,
            &["school", "institution", "university", "college", "school_name"],
        ),
        degree: string_of(item, &["degree", "diploma", "qualification"]),
        location: string_of(item, &["location", "city"]),
        dates: string_of(item, &["dates", "period", "years"]),
    }
}

/// Skills arrive as a list, a comma-separated string, or a categorized
/// object. Output is flat and de-duplicated case-insensitively.
fn coerce_skills(value: Option<&Value>) -> Vec<String> {
    let raw: Vec<String> = match value {
        Some(Value::String(s)) => s.split([',', ';']).map(String::from).collect(),
        Some(Value::Object(map)) => {
            let mut ordered = Vec::new();
            for key in ["languages", "frameworks", "tools", "other"] {
                if let Some(v) = map.get(key) {
                    ordered.extend(string_list(v));
                }
            }
            for (key, v) in map {
                if !matches!(key.as_str(), "languages" | "frameworks" | "tools" | "other") {
                    ordered.extend(string_list(v));
                }
            }
            ordered
        }
        Some(other) => sequence(other)
            .into_iter()
            .map(|item| match item {
                Value::Object(_) => string_of(item, &["name", "skill", "label"]),
                scalar => text(scalar),
            })
            .collect(),
        None => Vec::new(),
    };

    let mut seen = std::collections::HashSet::new();
    raw.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
        .collect()
}

fn coerce_language(item: &Value) -> Option<Language> {
    let language = match item {
        Value::String(s) => Language {
            name: s.trim().to_string(),
            level: None,
        },
        Value::Object(_) => Language {
            name: string_of(item, &["name", "language"]),
            level: non_blank(item, &["level", "proficiency", "fluency"]),
        },
        _ => return None,
    };
    (!language.name.is_empty()).then_some(language)
}

fn coerce_certification(item: &Value) -> Option<Certification> {
    let certification = match item {
        Value::String(s) => Certification {
            name: s.trim().to_string(),
            ..Default::default()
        },
        Value::Object(_) => Certification {
            name: string_of(item, &["name", "title"]),
            issuer: string_of(item, &["issuer", "authority", "organization"]),
            date: string_of(item, &["date", "year"]),
        },
        _ => return None,
    };
    (!certification.name.is_empty()).then_some(certification)
}

fn coerce_award(item: &Value) -> Option<Award> {
    let award = match item {
        Value::String(s) => Award {
            title: s.trim().to_string(),
            ..Default::default()
        },
        Value::Object(_) => Award {
            title: string_of(item, &["title", "name"]),
            issuer: string_of(item, &["issuer", "authority", "organization"]),
            date: string_of(item, &["date", "year"]),
        },
        _ => return None,
    };
    (!award.title.is_empty()).then_some(award)
}

fn coerce_project(item: &Value) -> Option<Project> {
    let name = string_of(item, &["name", "title"]);
    if name.is_empty() {
        return None;
    }
    let bullets = first_present(item, &["bullets", "highlights"])
        .map(string_list)
        .unwrap_or_default();
    Some(Project {
        name,
        dates: string_of(item, &["dates", "period"]),
        description: string_of(item, &["description", "summary"]),
        bullets: sanitize_bullets(bullets, MAX_PROJECT_BULLETS),
    })
}
