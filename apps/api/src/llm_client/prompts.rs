// Cross-cutting prompt fragments shared by every pipeline call.
// Step-specific prompts live in pipeline/prompts.rs.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Keeps the résumé in the language it was written in.
pub const LANGUAGE_INSTRUCTION: &str = "\
    CRITICAL: Write every field in the language of the source CV. \
    Never translate company names, job titles or dates.";

/// Forbids invented facts in rewrites.
pub const FIDELITY_INSTRUCTION: &str = "\
    CRITICAL: Do NOT invent employers, titles, dates, metrics or technologies. \
    Every rewritten bullet must be supported by the source CV text. \
    If the source does not support a claim, omit it.";
