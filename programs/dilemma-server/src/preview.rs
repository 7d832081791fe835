//! Readable export of a subject's scenario

use match_logic::{generate_scenario, Color, ScenarioConfig, Stage, Strategy};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ScenarioPreview {
    pub seed: u64,
    pub color: Color,
    pub matches: Vec<MatchPreview>,
}

#[derive(Debug, Serialize)]
pub struct MatchPreview {
    pub index: usize,
    pub name: String,
    pub avatar: String,
    pub is_female: bool,
    pub stage: Stage,
    pub strategy: Strategy,
    pub description: &'static str,
    pub rounds: u32,
    pub loading_secs: f64,
}

pub fn preview(config: &ScenarioConfig, seed: u64, avatar: &str, is_female: bool) -> ScenarioPreview {
    let scenario = generate_scenario(config, seed, avatar, is_female);
    let matches = scenario
        .matches
        .into_iter()
        .enumerate()
        .map(|(index, m)| MatchPreview {
            index,
            description: m.strategy.describe(),
            rounds: m.rounds_remaining,
            name: m.name,
            avatar: m.avatar,
            is_female: m.is_female,
            stage: m.stage,
            strategy: m.strategy,
            loading_secs: m.loading_secs,
        })
        .collect();
    ScenarioPreview {
        seed,
        color: scenario.color,
        matches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_lists_every_match() {
        let preview = preview(&ScenarioConfig::default(), 1, "robot", true);
        assert_eq!(preview.matches.len(), 10);
        assert!(preview.matches.iter().all(|m| m.rounds == 5));
        assert!(preview
            .matches
            .iter()
            .any(|m| m.avatar == "robot" && m.is_female));

        let json = serde_json::to_value(&preview).unwrap();
        assert_eq!(json["seed"], 1);
        assert!(json["matches"][0]["description"].is_string());
    }
}
