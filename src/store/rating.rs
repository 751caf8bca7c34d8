use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

/// Running tally of scores for one laptop.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rating {
    /// Number of scores received.
    pub count: u32,
    /// Sum of all scores received.
    pub sum: f64,
}

impl Rating {
    /// Mean score, or 0 before any score was added.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / f64::from(self.count)
    }
}

/// Concurrent accumulator of laptop ratings.
#[derive(Clone, Default)]
pub struct InMemoryRatingStore {
    ratings: Arc<RwLock<HashMap<String, Rating>>>,
}

impl InMemoryRatingStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `score` to the tally of `laptop_id` and returns the updated tally.
    ///
    /// The update and the returned snapshot happen under one write lock, so
    /// concurrent raters never lose updates.
    pub async fn add(&self, laptop_id: &str, score: f64) -> Rating {
        let mut ratings = self.ratings.write().await;
        let rating = ratings.entry(laptop_id.to_string()).or_default();
        rating.count += 1;
        rating.sum += score;
        *rating
    }

    /// Current tally of `laptop_id`, if it was ever rated.
    pub async fn get(&self, laptop_id: &str) -> Option<Rating> {
        self.ratings.read().await.get(laptop_id).copied()
    }
}
