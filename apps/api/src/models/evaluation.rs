use serde::{Deserialize, Deserializer, Serialize};

/// The five rubric categories, in display order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Listening,
    Questioning,
    Understanding,
    Rapport,
    Overall,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Listening,
        Category::Questioning,
        Category::Understanding,
        Category::Rapport,
        Category::Overall,
    ];

    /// JSON key the model is asked to emit.
    pub fn key(self) -> &'static str {
        match self {
            Category::Listening => "listening",
            Category::Questioning => "questioning",
            Category::Understanding => "understanding",
            Category::Rapport => "rapport",
            Category::Overall => "overall",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Listening => "傾聴姿勢",
            Category::Questioning => "質問技法",
            Category::Understanding => "問題把握",
            Category::Rapport => "ラポール形成",
            Category::Overall => "総合評価",
        }
    }
}

/// Display band for a score: ≥80 strong, ≥60 fair, otherwise weak.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Strong,
    Fair,
    Weak,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryScore {
    /// As returned by the model, rounded to a whole number; not range-checked.
    #[serde(deserialize_with = "deserialize_score")]
    pub score: i64,
    pub feedback: String,
}

/// Accepts integer or fractional JSON numbers (`85`, `85.0`, `72.6`).
fn deserialize_score<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    Ok(raw.round() as i64)
}

impl CategoryScore {
    pub fn display_score(&self) -> u8 {
        self.score.clamp(0, 100) as u8
    }

    pub fn band(&self) -> ScoreBand {
        match self.display_score() {
            80..=100 => ScoreBand::Strong,
            60..=79 => ScoreBand::Fair,
            _ => ScoreBand::Weak,
        }
    }
}

/// Rubric result for an ended session. All five categories are required.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evaluation {
    pub listening: CategoryScore,
    pub questioning: CategoryScore,
    pub understanding: CategoryScore,
    pub rapport: CategoryScore,
    pub overall: CategoryScore,
}

/// One display row: clamped score, band and label alongside the raw feedback.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoreCard {
    pub category: Category,
    pub label: &'static str,
    pub score: u8,
    pub band: ScoreBand,
    pub feedback: String,
}

impl Evaluation {
    pub fn scorecard(&self) -> Vec<ScoreCard> {
        Category::ALL
            .iter()
            .map(|&category| {
                let entry = self.category(category);
                ScoreCard {
                    category,
                    label: category.label(),
                    score: entry.display_score(),
                    band: entry.band(),
                    feedback: entry.feedback.clone(),
                }
            })
            .collect()
    }

    pub fn category(&self, category: Category) -> &CategoryScore {
        match category {
            Category::Listening => &self.listening,
            Category::Questioning => &self.questioning,
            Category::Understanding => &self.understanding,
            Category::Rapport => &self.rapport,
            Category::Overall => &self.overall,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(n: i64) -> CategoryScore {
        CategoryScore {
            score: n,
            feedback: String::new(),
        }
    }

    #[test]
    fn test_display_score_clamps_out_of_range_values() {
        assert_eq!(score(-5).display_score(), 0);
        assert_eq!(score(140).display_score(), 100);
        assert_eq!(score(73).display_score(), 73);
    }

    #[test]
    fn test_score_accepts_fractional_numbers() {
        let whole: CategoryScore =
            serde_json::from_str(r#"{"score": 85.0, "feedback": "ok"}"#).unwrap();
        assert_eq!(whole.score, 85);

        let fractional: CategoryScore =
            serde_json::from_str(r#"{"score": 72.6, "feedback": "ok"}"#).unwrap();
        assert_eq!(fractional.score, 73);

        let integer: CategoryScore =
            serde_json::from_str(r#"{"score": 64, "feedback": "ok"}"#).unwrap();
        assert_eq!(integer.score, 64);
    }

    #[test]
    fn test_score_rejects_non_numbers() {
        assert!(serde_json::from_str::<CategoryScore>(r#"{"score": "high", "feedback": "ok"}"#)
            .is_err());
    }

    #[test]
    fn test_band_thresholds() {
        assert_eq!(score(80).band(), ScoreBand::Strong);
        assert_eq!(score(79).band(), ScoreBand::Fair);
        assert_eq!(score(60).band(), ScoreBand::Fair);
        assert_eq!(score(59).band(), ScoreBand::Weak);
        assert_eq!(score(250).band(), ScoreBand::Strong);
    }

    #[test]
    fn test_scorecard_lists_categories_in_display_order() {
        let evaluation = Evaluation {
            listening: score(85),
            questioning: score(-3),
            understanding: score(60),
            rapport: score(101),
            overall: score(70),
        };
        let card = evaluation.scorecard();
        let labels: Vec<_> = card.iter().map(|c| c.label).collect();
        assert_eq!(
            labels,
            ["傾聴姿勢", "質問技法", "問題把握", "ラポール形成", "総合評価"]
        );
        assert_eq!(card[1].score, 0);
        assert_eq!(card[1].band, ScoreBand::Weak);
        assert_eq!(card[3].score, 100);
        assert_eq!(card[2].band, ScoreBand::Fair);
    }

    #[test]
    fn test_category_keys_are_unique() {
        let mut keys: Vec<_> = Category::ALL.iter().map(|c| c.key()).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), 5);
    }
}
