use std::str::FromStr;

use serde::Serialize;

use crate::post::PostType;
use crate::CoreError;

/// The `type` parameter of the search endpoints. `itinerary` is the public name of `plan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    All,
    Itinerary,
    Experience,
    Trek,
    Service,
}

impl SearchType {
    pub fn post_types(&self) -> Vec<PostType> {
        match self {
            SearchType::All => PostType::ALL.to_vec(),
            SearchType::Itinerary => vec![PostType::Plan],
            SearchType::Experience => vec![PostType::Experience],
            SearchType::Trek => vec![PostType::Trek],
            SearchType::Service => vec![PostType::Service],
        }
    }
}

impl SearchType {
    /// Location browsing only covers itineraries and experiences.
    pub fn location_post_types(&self) -> Result<Vec<PostType>, CoreError> {
        match self {
            SearchType::All => Ok(vec![PostType::Plan, PostType::Experience]),
            SearchType::Itinerary => Ok(vec![PostType::Plan]),
            SearchType::Experience => Ok(vec![PostType::Experience]),
            SearchType::Trek | SearchType::Service => Err(CoreError::ValidationError(
                "Invalid type parameter. Must be 'all', 'itinerary', or 'experience'".to_string(),
            )),
        }
    }
}

impl FromStr for SearchType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(SearchType::All),
            "itinerary" => Ok(SearchType::Itinerary),
            "experience" => Ok(SearchType::Experience),
            "trek" => Ok(SearchType::Trek),
            "service" => Ok(SearchType::Service),
            _ => Err(CoreError::ValidationError(
                "Invalid type parameter. Must be 'all', 'itinerary', 'experience', 'trek', or 'service'"
                    .to_string(),
            )),
        }
    }
}

/// Autocomplete entry.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Suggestion {
    pub text: String,
    pub location: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl Suggestion {
    pub fn from_post(post: &crate::post::Post) -> Self {
        Self {
            text: post.title.clone(),
            location: post.location.city.clone().unwrap_or_default(),
            kind: match post.post_type {
                PostType::Plan => "itinerary",
                other => other.as_str(),
            },
        }
    }
}

/// Split a comma-separated query value, dropping blanks.
pub fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
