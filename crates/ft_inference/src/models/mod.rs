use ft_core::{ExtractionResponse, Result};

use crate::prompt::strip_code_blocks;

pub mod gemini;
pub mod openai;

/// Parse a provider's text reply into the extraction schema.
///
/// A reply containing no JSON object, or JSON that does not match the
/// schema, reads as "not a funding announcement" rather than an error:
/// the provider answered, it just found nothing. Unknown fields are
/// ignored by serde.
pub fn parse_response(raw: &str) -> Result<ExtractionResponse> {
    let cleaned = strip_code_blocks(raw);

    if let Ok(parsed) = serde_json::from_str::<ExtractionResponse>(cleaned) {
        return Ok(parsed);
    }

    // Some models wrap the JSON in prose; take the outermost object.
    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end {
            if let Ok(parsed) = serde_json::from_str::<ExtractionResponse>(&cleaned[start..=end]) {
                return Ok(parsed);
            }
        }
    }

    Ok(ExtractionResponse::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let raw = r#"{"is_funding_news": true, "companies": [{"name": "Acme", "funding_stage": "Seed"}]}"#;
        let parsed = parse_response(raw).unwrap();
        assert!(parsed.is_funding_news);
        assert_eq!(parsed.companies[0].name, "Acme");
        assert_eq!(parsed.companies[0].funding_stage.as_deref(), Some("Seed"));
    }

    #[test]
    fn parses_fenced_json_with_prose() {
        let raw = "Here is the analysis:\n```json\n{\"is_funding_news\": false, \"companies\": []}\n```";
        let parsed = parse_response(raw).unwrap();
        assert!(!parsed.is_funding_news);
    }

    #[test]
    fn json_embedded_in_text_is_found() {
        let raw = "Sure! {\"is_funding_news\": true, \"companies\": []} Hope that helps.";
        assert!(parse_response(raw).unwrap().is_funding_news);
    }

    #[test]
    fn garbage_reads_as_no_match() {
        let parsed = parse_response("I could not find anything relevant.").unwrap();
        assert!(!parsed.is_funding_news);
        assert!(parsed.companies.is_empty());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let raw = r#"{"is_funding_news": true, "confidence": 0.9, "companies": [{"name": "Acme", "ticker": "ACME"}]}"#;
        let parsed = parse_response(raw).unwrap();
        assert_eq!(parsed.companies.len(), 1);
    }
}
