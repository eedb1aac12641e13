use serde::{Deserialize, Serialize};

pub const LEADERBOARD_SIZE: usize = 10;

/// Options for starting a rumble, as typed by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    pub duration_secs: u64,
    /// Free text holding the mentions of the roles allowed to join.
    pub roles: String,
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub reward_role: Option<String>,
    /// Raw text; anything but a positive integer means no points.
    #[serde(default)]
    pub reward_points: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Command {
    Start(StartRequest),
    Leaderboard,
    Balance,
}

pub fn render_leaderboard(ranked: &[(String, u64)]) -> String {
    if ranked.is_empty() {
        return "No points have been awarded yet.".to_string();
    }
    let mut lines = vec!["🏆 Rumble leaderboard".to_string()];
    for (place, (id, points)) in ranked.iter().take(LEADERBOARD_SIZE).enumerate() {
        lines.push(format!("{}. <@{id}>: {points} {}", place + 1, noun(*points)));
    }
    lines.join("\n")
}

pub fn render_balance(points: u64) -> String {
    format!("You have {points} {}.", noun(points))
}

fn noun(points: u64) -> &'static str {
    if points == 1 {
        "point"
    } else {
        "points"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_leaderboard_says_so() {
        assert_eq!(render_leaderboard(&[]), "No points have been awarded yet.");
    }

    #[test]
    fn leaderboard_lists_in_given_order() {
        let ranked = vec![("2".to_string(), 30), ("1".to_string(), 1)];
        assert_eq!(
            render_leaderboard(&ranked),
            "🏆 Rumble leaderboard\n1. <@2>: 30 points\n2. <@1>: 1 point"
        );
    }

    #[test]
    fn leaderboard_is_capped() {
        let ranked: Vec<(String, u64)> = (0..25).map(|i| (i.to_string(), 100 - i)).collect();
        assert_eq!(render_leaderboard(&ranked).lines().count(), LEADERBOARD_SIZE + 1);
    }

    #[test]
    fn balance_defaults_to_zero_wording() {
        assert_eq!(render_balance(0), "You have 0 points.");
    }

    #[test]
    fn start_command_parses_with_optional_fields() {
        let command: Command = serde_json::from_value(serde_json::json!({
            "name": "start",
            "duration_secs": 60,
            "roles": "<@&1>"
        }))
        .unwrap();
        assert_eq!(
            command,
            Command::Start(StartRequest {
                duration_secs: 60,
                roles: "<@&1>".to_string(),
                track: None,
                reward_role: None,
                reward_points: None,
            })
        );
    }
}
