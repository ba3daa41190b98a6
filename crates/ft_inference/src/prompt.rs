//! The funding-extraction prompt shared by every provider, plus the text
//! utilities both clients need.

/// Instructs the model to return the startup-record fields or an explicit
/// "no funding" marker as strict JSON.
pub const SYSTEM_PROMPT: &str = r#"You are an expert at analyzing news articles and identifying startup funding announcements.
Your task is to extract structured information about Indian startups that have received funding.

Return only valid JSON with the following structure:
{
    "is_funding_news": true/false,
    "companies": [
        {
            "name": "Company Name",
            "funding_amount": "Amount raised",
            "funding_stage": "Seed/Series A/Series B/etc",
            "investors": ["Investor 1", "Investor 2"],
            "industry": "Industry sector",
            "location": "City, State"
        }
    ]
}

Only extract companies that are clearly based in India and have received funding."#;

/// Provider-safe cap on article text sent per request.
pub const MAX_PROMPT_CHARS: usize = 3000;

pub fn build_user_prompt(title: &str, body: &str) -> String {
    format!(
        "Analyze this news article for startup funding announcements:\n\n\
         Title: {}\n\
         Content: {}\n\n\
         Extract information about startups that received funding. Return only valid JSON.",
        title,
        truncate_to_char_boundary(body, MAX_PROMPT_CHARS)
    )
}

/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

/// Strip markdown code fences a model may wrap its JSON reply in.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}
