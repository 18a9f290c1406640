use std::cmp::Ordering;

use crate::domain::{
    Pagination, SortOrder,
    player::PlayerWithStats,
    stats::PlayerClass,
    validation::is_username_char,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsernameFilter {
    Prefix(String),
    Contains(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerSortBy {
    Rating,
    Username,
    MatchesPlayed,
    CreatedAt,
}

/// Caller supplied search parameters, unvalidated. Pagination values are
/// signed so that bad input can be reported instead of wrapped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerSearchFilters {
    pub username: Option<UsernameFilter>,
    pub min_rating: Option<i32>,
    pub max_rating: Option<i32>,
    pub favorite_class: Option<PlayerClass>,
    pub min_matches_played: Option<u32>,
    pub include_inactive: bool,
    pub include_anonymous: bool,
    pub sort: Option<(SortOrder, PlayerSortBy)>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A validated, bounded player query. Username needles are lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerQuery {
    pub username: Option<UsernameFilter>,
    pub min_rating: Option<i32>,
    pub max_rating: Option<i32>,
    pub favorite_class: Option<PlayerClass>,
    pub min_matches_played: Option<u32>,
    pub include_inactive: bool,
    pub include_anonymous: bool,
    pub sort: (SortOrder, PlayerSortBy),
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryConfig {
    pub max_limit: usize,
    pub default_search_limit: usize,
    pub default_leaderboard_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_limit: 100,
            default_search_limit: 20,
            default_leaderboard_limit: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error("min_rating {min} is greater than max_rating {max}")]
    InvalidRange { min: i32, max: i32 },
    #[error("invalid pagination: {0}")]
    InvalidPagination(String),
    #[error("invalid username filter: {0}")]
    InvalidUsernameFilter(String),
}

fn normalize_needle(needle: &str) -> Result<String, SearchError> {
    let trimmed = needle.trim();
    if trimmed.is_empty() {
        return Err(SearchError::InvalidUsernameFilter(
            "filter text is empty".to_string(),
        ));
    }
    if !trimmed.chars().all(is_username_char) {
        return Err(SearchError::InvalidUsernameFilter(format!(
            "'{}' contains characters that cannot appear in a username",
            trimmed
        )));
    }
    Ok(trimmed.to_lowercase())
}

impl PlayerSearchFilters {
    pub fn into_query(self, config: &QueryConfig) -> Result<PlayerQuery, SearchError> {
        if let (Some(min), Some(max)) = (self.min_rating, self.max_rating) {
            if min > max {
                return Err(SearchError::InvalidRange { min, max });
            }
        }

        let max_limit = config.max_limit.max(1);
        let limit = match self.limit {
            None => config.default_search_limit.clamp(1, max_limit),
            Some(l) if l < 1 => {
                return Err(SearchError::InvalidPagination(format!(
                    "limit must be positive, got {}",
                    l
                )));
            }
            Some(l) => (l as u64).min(max_limit as u64) as usize,
        };
        let offset = match self.offset {
            None => 0,
            Some(o) if o < 0 => {
                return Err(SearchError::InvalidPagination(format!(
                    "offset must not be negative, got {}",
                    o
                )));
            }
            Some(o) => o as usize,
        };

        let username = match self.username {
            None => None,
            Some(UsernameFilter::Prefix(s)) => Some(UsernameFilter::Prefix(normalize_needle(&s)?)),
            Some(UsernameFilter::Contains(s)) => {
                Some(UsernameFilter::Contains(normalize_needle(&s)?))
            }
        };

        Ok(PlayerQuery {
            username,
            min_rating: self.min_rating,
            max_rating: self.max_rating,
            favorite_class: self.favorite_class,
            min_matches_played: self.min_matches_played,
            include_inactive: self.include_inactive,
            include_anonymous: self.include_anonymous,
            sort: self
                .sort
                .unwrap_or((SortOrder::Descending, PlayerSortBy::Rating)),
            pagination: Pagination { offset, limit },
        })
    }
}

impl PlayerQuery {
    pub fn matches(&self, entry: &PlayerWithStats) -> bool {
        if !self.include_inactive && !entry.player.is_active {
            return false;
        }
        if !self.include_anonymous && entry.player.is_anonymous() {
            return false;
        }
        if let Some(filter) = &self.username {
            let Some(username) = entry.player.username() else {
                return false;
            };
            let username = username.to_lowercase();
            let hit = match filter {
                UsernameFilter::Prefix(needle) => username.starts_with(needle.as_str()),
                UsernameFilter::Contains(needle) => username.contains(needle.as_str()),
            };
            if !hit {
                return false;
            }
        }
        if self.min_rating.is_some_and(|min| entry.stats.rating < min) {
            return false;
        }
        if self.max_rating.is_some_and(|max| entry.stats.rating > max) {
            return false;
        }
        if self
            .min_matches_played
            .is_some_and(|min| entry.stats.matches_played < min)
        {
            return false;
        }
        if let Some(class) = self.favorite_class {
            if entry.stats.favorite_class != Some(class) {
                return false;
            }
        }
        true
    }

    /// Ordering for the requested sort key, with player id ascending as the
    /// final tie-break. Players without a username sort before named ones.
    pub fn ordering(&self, a: &PlayerWithStats, b: &PlayerWithStats) -> Ordering {
        let (order, sort_by) = self.sort;
        let primary = match sort_by {
            PlayerSortBy::Rating => a.stats.rating.cmp(&b.stats.rating),
            PlayerSortBy::Username => a
                .player
                .username()
                .map(str::to_lowercase)
                .cmp(&b.player.username().map(str::to_lowercase)),
            PlayerSortBy::MatchesPlayed => a.stats.matches_played.cmp(&b.stats.matches_played),
            PlayerSortBy::CreatedAt => a.player.created_at.cmp(&b.player.created_at),
        };
        let primary = match order {
            SortOrder::Ascending => primary,
            SortOrder::Descending => primary.reverse(),
        };
        primary.then_with(|| a.player.player_id.cmp(&b.player.player_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_rating_range_is_rejected() {
        let filters = PlayerSearchFilters {
            min_rating: Some(1200),
            max_rating: Some(1000),
            ..Default::default()
        };
        assert_eq!(
            filters.into_query(&QueryConfig::default()),
            Err(SearchError::InvalidRange {
                min: 1200,
                max: 1000
            })
        );
    }

    #[test]
    fn test_equal_bounds_are_allowed() {
        let filters = PlayerSearchFilters {
            min_rating: Some(1000),
            max_rating: Some(1000),
            ..Default::default()
        };
        assert!(filters.into_query(&QueryConfig::default()).is_ok());
    }

    #[test]
    fn test_limit_is_clamped_and_defaulted() {
        let config = QueryConfig::default();
        let query = PlayerSearchFilters {
            limit: Some(10_000),
            ..Default::default()
        }
        .into_query(&config)
        .unwrap();
        assert_eq!(query.pagination.limit, 100);

        let query = PlayerSearchFilters::default().into_query(&config).unwrap();
        assert_eq!(query.pagination.limit, 20);
        assert_eq!(query.pagination.offset, 0);
    }

    #[test]
    fn test_zero_limit_settings_still_return_rows() {
        let config = QueryConfig {
            max_limit: 0,
            default_search_limit: 0,
            default_leaderboard_limit: 0,
        };
        let query = PlayerSearchFilters::default().into_query(&config).unwrap();
        assert_eq!(query.pagination.limit, 1);

        let query = PlayerSearchFilters {
            limit: Some(25),
            ..Default::default()
        }
        .into_query(&config)
        .unwrap();
        assert_eq!(query.pagination.limit, 1);
    }

    #[test]
    fn test_bad_pagination_is_rejected() {
        let config = QueryConfig::default();
        for (limit, offset) in [(Some(0), None), (Some(-5), None), (None, Some(-1))] {
            let result = PlayerSearchFilters {
                limit,
                offset,
                ..Default::default()
            }
            .into_query(&config);
            assert!(matches!(result, Err(SearchError::InvalidPagination(_))));
        }
    }

    #[test]
    fn test_username_needle_is_normalized() {
        let query = PlayerSearchFilters {
            username: Some(UsernameFilter::Prefix("  PlaYer ".to_string())),
            ..Default::default()
        }
        .into_query(&QueryConfig::default())
        .unwrap();
        assert_eq!(
            query.username,
            Some(UsernameFilter::Prefix("player".to_string()))
        );

        let result = PlayerSearchFilters {
            username: Some(UsernameFilter::Contains("50%".to_string())),
            ..Default::default()
        }
        .into_query(&QueryConfig::default());
        assert!(matches!(
            result,
            Err(SearchError::InvalidUsernameFilter(_))
        ));
    }

    #[test]
    fn test_default_sort_is_rating_descending() {
        let query = PlayerSearchFilters::default()
            .into_query(&QueryConfig::default())
            .unwrap();
        assert_eq!(query.sort, (SortOrder::Descending, PlayerSortBy::Rating));
    }
}
