use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

/// The simulated client's profile. Fixed for the lifetime of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Persona {
    pub id: u32,
    pub title: String,
    pub description: String,
    /// Embedded verbatim in every turn prompt.
    pub biography: String,
    pub difficulty: Difficulty,
    /// Opening client line; no model call is made for it.
    pub greeting: String,
}

#[derive(Debug, Clone)]
pub struct PersonaCatalog {
    personas: Vec<Persona>,
}

impl PersonaCatalog {
    pub fn new(personas: Vec<Persona>) -> Result<Self> {
        if personas.is_empty() {
            bail!("persona catalog must contain at least one persona");
        }
        let mut seen = HashSet::new();
        for persona in &personas {
            if !seen.insert(persona.id) {
                bail!("duplicate persona id {}", persona.id);
            }
        }
        Ok(Self { personas })
    }

    pub fn builtin() -> Self {
        Self {
            personas: builtin_personas(),
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read persona file {}", path.display()))?;
        let personas: Vec<Persona> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid persona file {}", path.display()))?;
        Self::new(personas)
    }

    pub fn get(&self, id: u32) -> Option<&Persona> {
        self.personas.iter().find(|p| p.id == id)
    }

    pub fn list(&self, difficulty: Option<Difficulty>) -> Vec<&Persona> {
        self.personas
            .iter()
            .filter(|p| difficulty.map_or(true, |d| p.difficulty == d))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }
}

fn builtin_personas() -> Vec<Persona> {
    vec![
        Persona {
            id: 1,
            title: "転職を考える20代後半の会社員".to_string(),
            description: "現職に不満があり、キャリアチェンジを検討中".to_string(),
            biography: "27歳、営業職3年目、人間関係と将来性に悩んでいる".to_string(),
            difficulty: Difficulty::Beginner,
            greeting: "こんにちは...。今日は相談に乗っていただきたくて来ました。実は、今の仕事を続けていいのか悩んでいて...".to_string(),
        },
        Persona {
            id: 2,
            title: "育児と仕事の両立に悩む30代女性".to_string(),
            description: "復職後のキャリアと家庭の両立について相談".to_string(),
            biography: "34歳、育休明け、時短勤務で今後のキャリアに不安".to_string(),
            difficulty: Difficulty::Intermediate,
            greeting: "はじめまして。育休から復帰して半年なんですが、仕事と育児の両立がうまくいかなくて...このままでいいのか不安なんです。".to_string(),
        },
        Persona {
            id: 3,
            title: "定年後の再就職を考える50代男性".to_string(),
            description: "定年を見据えたセカンドキャリアの構築".to_string(),
            biography: "56歳、製造業管理職、定年後の働き方を模索中".to_string(),
            difficulty: Difficulty::Advanced,
            greeting: "よろしくお願いします。あと4年ほどで定年なんですが、その後どうしようかと考えていまして...まだ働きたいんですけどね。".to_string(),
        },
    ]
}
