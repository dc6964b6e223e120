// Prompt constants for the structuring, arbitrage and judge steps.
// Replace the `{placeholders}` before sending.

/// Structuring: raw CV text → résumé JSON.
pub const STRUCTURE_PROMPT_TEMPLATE: &str = r#"Convert the following CV text into structured JSON.

Return a JSON object with this EXACT schema (no extra fields):
{
  "personal": {"fullName": "", "title": "", "email": "", "phone": "", "location": "", "website": "", "linkedIn": ""},
  "summary": "",
  "experience": [
    {"company": "", "title": "", "location": "", "startDate": "YYYY-MM", "endDate": "YYYY-MM or Present", "bullets": [""]}
  ],
  "education": [{"school": "", "degree": "", "location": "", "dates": ""}],
  "skills": [""],
  "languages": [{"name": "", "level": ""}],
  "certifications": [{"name": "", "issuer": "", "date": ""}],
  "projects": [{"name": "", "dates": "", "description": "", "bullets": [""]}],
  "awards": [{"title": "", "issuer": "", "date": ""}]
}

Rules:
- Keep experiences in the order they appear in the CV.
- At most 5 bullets per experience, copied or lightly condensed from the text.
- Leave a field empty rather than guessing.

CV TEXT:
{cv_text}
"#;

/// Arbitrage: clean résumé + job description → adapted résumé + decision report.
pub const ARBITRAGE_PROMPT_TEMPLATE: &str = r#"Tailor the résumé below to the job description.

You may drop experiences that are irrelevant to the job and rewrite bullets to use the
job's terminology. Experiences are referenced by their zero-based position in the
SOURCE RÉSUMÉ "experience" array (the sourceIndex).

Return a JSON object with this EXACT schema:
{
  "result": { ...same schema as the source résumé... },
  "report": {
    "fitScore": 0,
    "jdCoverage": {"matchedKeywords": [""], "missingKeywords": [""], "partialMatches": [""]},
    "decisions": {
      "keptExperiences": [{"sourceIndex": 0, "reason": ""}],
      "removedExperiences": [{"sourceIndex": 0, "reason": ""}],
      "bulletEdits": [{"sourceIndex": 0, "before": "", "after": "", "reason": ""}]
    },
    "warnings": [""],
    "narrative": ""
  }
}

Rules:
- "before" must be the exact source bullet text; "after" the exact text placed in "result".
- Keep startDate/endDate of every kept experience unchanged.
- fitScore is 0-100.

JOB DESCRIPTION:
{jd_text}

SOURCE RÉSUMÉ:
{clean_json}
"#;

/// Judge: scores how well the adaptation serves the job description.
pub const JUDGE_PROMPT_TEMPLATE: &str = r#"Evaluate the tailoring of a résumé to a job description.

Return a JSON object with this EXACT schema:
{
  "score": 0,
  "faithfulness": 0,
  "relevance": 0,
  "issues": [""],
  "verdict": ""
}

Scores are 0-100. Penalize any fact in the ADAPTED résumé not supported by the SOURCE.

JOB DESCRIPTION:
{jd_text}

SOURCE RÉSUMÉ:
{clean_json}

ADAPTED RÉSUMÉ:
{adapted_json}
"#;
