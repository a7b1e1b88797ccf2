/// Recently active users
///
/// Authenticated requests touch the caller's entry; the `active_users` gauge
/// reports how many entries were touched within the window. User ids are
/// stored as a short SHA-256 digest so the tracker never holds raw ids.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// How long a user counts as active after their last request
pub const ACTIVE_WINDOW: Duration = Duration::from_secs(5 * 60);

pub struct ActiveUsers {
    window: Duration,
    seen: Mutex<HashMap<String, Instant>>,
}

impl Default for ActiveUsers {
    fn default() -> Self {
        Self::new(ACTIVE_WINDOW)
    }
}

impl ActiveUsers {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Records activity for `user_id`
    pub fn touch(&self, user_id: Uuid) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.insert(mask_user_id(user_id), Instant::now());
        }
    }

    /// Drops stale entries and returns the live count
    pub fn count_active(&self) -> usize {
        let Ok(mut seen) = self.seen.lock() else {
            return 0;
        };

        let now = Instant::now();
        let window = self.window;
        seen.retain(|_, last| now.duration_since(*last) < window);
        seen.len()
    }
}

/// First 12 hex characters of the SHA-256 of the id
pub fn mask_user_id(user_id: Uuid) -> String {
    let digest = Sha256::digest(user_id.as_bytes());
    let mut masked = hex::encode(digest);
    masked.truncate(12);
    masked
}
