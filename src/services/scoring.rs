//! Weighted-score grading contract.
//!
//! The model is asked for one `- Criterion: NN%` line per rubric criterion. Each
//! percentage is pulled out of the free text on a best-effort basis: a criterion
//! that cannot be found scores 0 instead of failing the evaluation.

use regex::Regex;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::services::errors::GradingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CriterionWeight {
    pub(crate) name: &'static str,
    /// Percentage points; a rubric's weights add up to 100.
    pub(crate) weight: u32,
    pub(crate) description: &'static str,
}

pub(crate) const STANDARD_CRITERIA: [CriterionWeight; 4] = [
    CriterionWeight {
        name: "Accuracy",
        weight: 40,
        description: "How closely the student's answer matches the correct answer.",
    },
    CriterionWeight {
        name: "Completeness",
        weight: 30,
        description: "Does the student's answer cover all key aspects?",
    },
    CriterionWeight {
        name: "Clarity",
        weight: 20,
        description: "Is the student's answer clear and well-articulated?",
    },
    CriterionWeight {
        name: "Understanding",
        weight: 10,
        description: "Does the student demonstrate an understanding of the core concept?",
    },
];

#[derive(Debug, Clone)]
pub(crate) struct ScoringRubric {
    criteria: Vec<(CriterionWeight, Regex)>,
}

impl ScoringRubric {
    pub(crate) fn standard() -> Result<Self, GradingError> {
        Self::new(&STANDARD_CRITERIA)
    }

    pub(crate) fn new(criteria: &[CriterionWeight]) -> Result<Self, GradingError> {
        if criteria.is_empty() {
            return Err(GradingError::Configuration("scoring rubric has no criteria".to_string()));
        }

        let total: u32 = criteria.iter().map(|criterion| criterion.weight).sum();
        if total != 100 {
            return Err(GradingError::Configuration(format!(
                "scoring rubric weights must sum to 100, got {total}"
            )));
        }

        let mut compiled = Vec::with_capacity(criteria.len());
        for (index, criterion) in criteria.iter().enumerate() {
            if criteria[..index].iter().any(|other| other.name == criterion.name) {
                return Err(GradingError::Configuration(format!(
                    "duplicate scoring criterion {}",
                    criterion.name
                )));
            }
            compiled.push((*criterion, score_pattern(criterion.name)?));
        }

        Ok(Self { criteria: compiled })
    }

    pub(crate) fn criteria(&self) -> impl Iterator<Item = &CriterionWeight> {
        self.criteria.iter().map(|(criterion, _)| criterion)
    }

    pub(crate) fn system_prompt(&self) -> String {
        let mut prompt = String::from(
            "You are a precise university evaluator. Evaluate the student's answer based on the following criteria:\n",
        );
        for (position, criterion) in self.criteria().enumerate() {
            prompt.push_str(&format!(
                "{}. **{}** ({}% weight): {}\n",
                position + 1,
                criterion.name,
                criterion.weight,
                criterion.description
            ));
        }
        prompt.push_str(
            "\nProvide a percentage score (0-100%) for each criterion. Output the evaluation in this format:\n",
        );
        let format_lines: Vec<String> =
            self.criteria().map(|criterion| format!("- {}: [Score]%", criterion.name)).collect();
        prompt.push_str(&format_lines.join("\n"));
        prompt
    }

    pub(crate) fn extract_scores(&self, text: &str) -> CriterionScores {
        CriterionScores(
            self.criteria
                .iter()
                .map(|(criterion, pattern)| {
                    (criterion.name, extract_percentage(pattern, text).unwrap_or(0))
                })
                .collect(),
        )
    }

    /// `sum(score * weight) / sum(weight)`, in percent.
    pub(crate) fn total_score(&self, scores: &CriterionScores) -> f64 {
        let total_weight: u32 = self.criteria().map(|criterion| criterion.weight).sum();
        let weighted: u32 =
            self.criteria().map(|criterion| scores.get(criterion.name) * criterion.weight).sum();
        f64::from(weighted) / f64::from(total_weight)
    }

    pub(crate) fn evaluate(&self, model_output: &str) -> WeightedEvaluation {
        let breakdown = self.extract_scores(model_output);
        let missing: Vec<&str> = self
            .criteria
            .iter()
            .filter(|(_, pattern)| extract_percentage(pattern, model_output).is_none())
            .map(|(criterion, _)| criterion.name)
            .collect();
        if !missing.is_empty() {
            tracing::warn!(missing = ?missing, "Criteria absent from model output scored as 0");
        }

        WeightedEvaluation {
            total_score: self.total_score(&breakdown),
            breakdown,
            raw_response: model_output.to_string(),
        }
    }
}

/// `Name: NN%`, tolerating markdown emphasis around the name.
fn score_pattern(name: &str) -> Result<Regex, GradingError> {
    Regex::new(&format!(r"\**{}\**\s*:\s*(\d+)\s*%", regex::escape(name))).map_err(|err| {
        GradingError::Configuration(format!("invalid pattern for criterion {name}: {err}"))
    })
}

/// First percentage matched by `pattern`, capped at 100.
pub(crate) fn extract_percentage(pattern: &Regex, text: &str) -> Option<u32> {
    let digits = pattern.captures(text)?.get(1)?.as_str();
    let value = digits.parse::<u64>().unwrap_or(u64::MAX);
    Some(value.min(100) as u32)
}

/// Per-criterion percentages in rubric order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CriterionScores(Vec<(&'static str, u32)>);

impl CriterionScores {
    pub(crate) fn get(&self, name: &str) -> u32 {
        self.0.iter().find(|(criterion, _)| *criterion == name).map(|(_, score)| *score).unwrap_or(0)
    }
}

impl Serialize for CriterionScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, score) in &self.0 {
            map.serialize_entry(name, score)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct WeightedEvaluation {
    #[serde(rename = "Total Score", serialize_with = "serialize_percentage")]
    pub(crate) total_score: f64,
    #[serde(rename = "Scores Breakdown")]
    pub(crate) breakdown: CriterionScores,
    #[serde(rename = "Raw Evaluation Response")]
    pub(crate) raw_response: String,
}

fn serialize_percentage<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{value:.2}%"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_RESPONSE: &str = "Here is my evaluation:\n\
        - Accuracy: 80%\n\
        - Completeness: 70%\n\
        - Clarity: 90%\n\
        - Understanding: 60%\n";

    #[test]
    fn standard_rubric_weights_sum_to_100() {
        let rubric = ScoringRubric::standard().expect("standard rubric");
        let total: u32 = rubric.criteria().map(|criterion| criterion.weight).sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn rubric_rejects_weights_not_summing_to_100() {
        let mut criteria = STANDARD_CRITERIA;
        criteria[3].weight = 15;
        let err = ScoringRubric::new(&criteria).expect_err("105 total");
        assert!(matches!(err, GradingError::Configuration(ref msg) if msg.contains("105")));
    }

    #[test]
    fn rubric_rejects_empty_and_duplicate_criteria() {
        assert!(ScoringRubric::new(&[]).is_err());

        let duplicate = [
            CriterionWeight { name: "Accuracy", weight: 50, description: "" },
            CriterionWeight { name: "Accuracy", weight: 50, description: "" },
        ];
        assert!(ScoringRubric::new(&duplicate).is_err());
    }

    #[test]
    fn all_criteria_present_gives_exact_weighted_average() {
        let rubric = ScoringRubric::standard().unwrap();
        let evaluation = rubric.evaluate(FULL_RESPONSE);

        assert_eq!(evaluation.breakdown.get("Accuracy"), 80);
        assert_eq!(evaluation.breakdown.get("Understanding"), 60);
        assert!((evaluation.total_score - 77.0).abs() < f64::EPSILON);
        assert_eq!(evaluation.raw_response, FULL_RESPONSE);
    }

    #[test]
    fn missing_criteria_score_zero() {
        let rubric = ScoringRubric::standard().unwrap();
        let evaluation = rubric.evaluate("- Accuracy: 100%\nThe rest was unreadable.");

        assert_eq!(evaluation.breakdown.get("Completeness"), 0);
        assert_eq!(evaluation.breakdown.get("Clarity"), 0);
        assert!((evaluation.total_score - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn free_text_without_scores_totals_zero() {
        let rubric = ScoringRubric::standard().unwrap();
        let evaluation = rubric.evaluate("I cannot grade this answer.");
        assert_eq!(evaluation.total_score, 0.0);
    }

    #[test]
    fn markdown_emphasis_and_spacing_are_tolerated() {
        let rubric = ScoringRubric::standard().unwrap();
        let scores = rubric.extract_scores("- **Accuracy**: 85 %\n- Clarity:72%");
        assert_eq!(scores.get("Accuracy"), 85);
        assert_eq!(scores.get("Clarity"), 72);
    }

    #[test]
    fn out_of_range_scores_are_capped() {
        let rubric = ScoringRubric::standard().unwrap();
        let scores = rubric.extract_scores("- Accuracy: 120%\n- Clarity: 99999999999999999999999%");
        assert_eq!(scores.get("Accuracy"), 100);
        assert_eq!(scores.get("Clarity"), 100);
    }

    #[test]
    fn first_occurrence_wins() {
        let pattern = score_pattern("Accuracy").unwrap();
        assert_eq!(extract_percentage(&pattern, "Accuracy: 10%\nAccuracy: 90%"), Some(10));
        assert_eq!(extract_percentage(&pattern, "Accuracy is good"), None);
    }

    #[test]
    fn system_prompt_lists_criteria_and_format() {
        let prompt = ScoringRubric::standard().unwrap().system_prompt();
        assert!(prompt.contains("1. **Accuracy** (40% weight)"));
        assert!(prompt.contains("4. **Understanding** (10% weight)"));
        assert!(prompt.ends_with("- Understanding: [Score]%"));
    }

    #[test]
    fn serializes_with_two_decimal_total_in_rubric_order() {
        let rubric = ScoringRubric::standard().unwrap();
        let evaluation = rubric.evaluate("- Accuracy: 55%\n- Completeness: 61%");
        let json = serde_json::to_string(&evaluation).unwrap();

        // 55*40 + 61*30 = 4030 -> 40.30
        assert!(json.starts_with(
            r#"{"Total Score":"40.30%","Scores Breakdown":{"Accuracy":55,"Completeness":61,"Clarity":0,"Understanding":0}"#
        ));
    }
}
