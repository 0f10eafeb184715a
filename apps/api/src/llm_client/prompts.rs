// Shared prompt fragments. Each stage keeps its own prompts in copilot/prompts.rs;
// this file only holds the cross-cutting pieces.

/// System prompt suffix that enforces JSON-only output.
pub const JSON_ONLY_INSTRUCTION: &str = "You MUST respond with a single valid JSON object only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";
