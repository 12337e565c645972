use serde_json::json;
use tracing::info;
use crate::core::DataError;
use super::{Filter, NewReward, Repository, Reward};

/// Points granted each time a user finishes watching a class.
pub const WATCH_REWARD_POINTS: i64 = 10;

/// Adds `points` to the user's reward record for a class, creating it on first award.
pub async fn award_points(
    rewards: &Repository<Reward>,
    user_id: &str,
    class_id: &str,
    points: i64,
) -> Result<Reward, DataError> {
    let filter = Filter::new().eq("userId", user_id).eq("classId", class_id);
    let existing = rewards.list(&filter).await?;

    let reward = match existing.into_iter().next() {
        Some(reward) => {
            rewards
                .update(&reward.id, &json!({ "point": reward.point + points }))
                .await?
        }
        None => {
            rewards
                .create(&NewReward {
                    user_id: user_id.to_string(),
                    class_id: class_id.to_string(),
                    point: points,
                })
                .await?
        }
    };

    info!(user_id, class_id, total = reward.point, "Reward updated");
    Ok(reward)
}
