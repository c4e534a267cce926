//! Well-known cache keys.
//!
//! Collection keys are plain constants; per-entity keys are built from a
//! prefix and an identifier, e.g. `cadet:scores:<id>`.

/// Full cadet roster (rating page).
pub const CADETS: &str = "cadets";

/// Profile of the signed-in user.
pub const USER_PROFILE: &str = "user_profile";

/// Achievement catalogue.
pub const ACHIEVEMENTS: &str = "achievements";

/// News feed.
pub const NEWS: &str = "news";

/// Task board.
pub const TASKS: &str = "tasks";

const CADET_PREFIX: &str = "cadet:";
const CADET_SCORES_PREFIX: &str = "cadet:scores:";
const CADET_ACHIEVEMENTS_PREFIX: &str = "cadet:achievements:";
const NEWS_PAGE_PREFIX: &str = "news:page:";

/// Key for a single cadet profile.
pub fn cadet_key(cadet_id: &str) -> String {
    format!("{}{}", CADET_PREFIX, cadet_id)
}

/// Key for a cadet's score history.
pub fn cadet_scores_key(cadet_id: &str) -> String {
    format!("{}{}", CADET_SCORES_PREFIX, cadet_id)
}

/// Key for a cadet's earned achievements.
pub fn cadet_achievements_key(cadet_id: &str) -> String {
    format!("{}{}", CADET_ACHIEVEMENTS_PREFIX, cadet_id)
}

/// Key for one page of the news feed.
pub fn news_page_key(page: u32) -> String {
    format!("{}{}", NEWS_PAGE_PREFIX, page)
}
