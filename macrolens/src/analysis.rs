//! Structured output of the analysis step and the schema the model must follow.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Lowest and highest accepted `importance_score`
pub const IMPORTANCE_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

/// One analysed news item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroAnalysisItem {
    pub news_summary: String,
    pub identified_macro_factors: Vec<String>,
    pub impact_analysis: String,
    /// 1 (minor) to 10 (market moving); optional in the schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance_score: Option<u8>,
}

/// Full result of one analysis run, serialized as `{"macro_analysis": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroAnalysisResult {
    pub macro_analysis: Vec<MacroAnalysisItem>,
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("response is not valid JSON for the analysis schema: {0}")]
    Json(#[from] serde_json::Error),
    #[error("item {index} has importance_score {score}, expected 1 to 10")]
    ScoreOutOfRange { index: usize, score: u8 },
}

impl MacroAnalysisResult {
    /// Parse model output into a result. Markdown fences around the JSON are
    /// tolerated; anything else that does not match the schema is rejected.
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        let parsed = match serde_json::from_str::<MacroAnalysisResult>(text.trim()) {
            Ok(result) => result,
            Err(first_err) => match crate::llm::extract_json_from_text(text) {
                Some(cleaned) => serde_json::from_str(&cleaned)?,
                None => return Err(first_err.into()),
            },
        };
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        for (index, item) in self.macro_analysis.iter().enumerate() {
            if let Some(score) = item.importance_score {
                if !IMPORTANCE_RANGE.contains(&score) {
                    return Err(SchemaError::ScoreOutOfRange { index, score });
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.macro_analysis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macro_analysis.is_empty()
    }
}

/// Schema sent with the analysis request (Gemini schema dialect).
pub fn response_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "macro_analysis": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "news_summary": {
                            "type": "STRING",
                            "description": "One or two sentence summary of the news item."
                        },
                        "identified_macro_factors": {
                            "type": "ARRAY",
                            "items": { "type": "STRING" },
                            "description": "Macroeconomic factors touched by the news, e.g. interest rates, inflation, employment."
                        },
                        "impact_analysis": {
                            "type": "STRING",
                            "description": "Expected impact on the economy and financial markets."
                        },
                        "importance_score": {
                            "type": "INTEGER",
                            "description": "Importance from 1 (minor) to 10 (market moving)."
                        }
                    },
                    "required": ["news_summary", "identified_macro_factors", "impact_analysis"]
                }
            }
        },
        "required": ["macro_analysis"]
    })
}

/// Schema for the verification verdict.
pub fn verdict_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "verified": { "type": "BOOLEAN" },
            "reason": { "type": "STRING" }
        },
        "required": ["verified", "reason"]
    })
}
