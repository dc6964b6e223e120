use serde::{Deserialize, Serialize};

/// Maximum bullets kept per experience.
pub const MAX_EXPERIENCE_BULLETS: usize = 5;

/// Canonical structured résumé.
///
/// Two independent instances live in a session: the clean document (the
/// structuring output, reviewed by the user) and the adapted document (the
/// arbitrage output, progressively edited). Experiences have no identity
/// beyond their position in `experience`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResumeDocument {
    pub personal: Personal,
    pub summary: String,
    pub experience: Vec<Experience>,
    pub education: Vec<Education>,
    pub skills: Vec<String>,
    pub languages: Vec<Language>,
    pub certifications: Vec<Certification>,
    pub projects: Vec<Project>,
    pub awards: Vec<Award>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Personal {
    pub full_name: String,
    pub title: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub website: String,
    #[serde(rename = "linkedIn", alias = "linkedin")]
    pub linked_in: String,
    pub photo: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Experience {
    pub company: String,
    #[serde(alias = "position")]
    pub title: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Education {
    pub school: String,
    pub degree: String,
    pub location: String,
    pub dates: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Language {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Certification {
    pub name: String,
    pub issuer: String,
    pub date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    pub name: String,
    pub dates: String,
    pub description: String,
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Award {
    pub title: String,
    pub issuer: String,
    pub date: String,
}

/// Trims bullets, drops empty ones and keeps at most `limit`.
pub fn sanitize_bullets<I, S>(bullets: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    bullets
        .into_iter()
        .map(|b| b.as_ref().trim().to_string())
        .filter(|b| !b.is_empty())
        .take(limit)
        .collect()
}

/// Output of the structuring step, as the front-end hands it over.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuringResult {
    #[serde(alias = "clean_cv")]
    pub clean_cv: serde_json::Value,
    #[serde(default, alias = "raw_cv")]
    pub raw_cv: Option<RawCv>,
}

/// Extracted CV text and how it was obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCv {
    pub text: String,
    /// "client", "vision" or "server".
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images_count: Option<u32>,
}
