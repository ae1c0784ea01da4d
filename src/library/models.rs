//! Personal library records

use crate::results::ShopRecord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

/// A shop the user saved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteShop {
    pub place_id: String,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub rating: Option<f32>,
    /// Epoch milliseconds
    pub saved_at: i64,
    #[serde(default)]
    pub visit_count: u32,
    #[serde(default)]
    pub last_visit: Option<i64>,
    #[serde(default)]
    pub personal_notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl FavoriteShop {
    pub fn new(
        place_id: impl Into<String>,
        name: impl Into<String>,
        address: impl Into<String>,
        saved_at: i64,
    ) -> Self {
        Self {
            place_id: place_id.into(),
            name: name.into(),
            address: address.into(),
            rating: None,
            saved_at,
            visit_count: 0,
            last_visit: None,
            personal_notes: None,
            tags: Vec::new(),
        }
    }

    pub fn from_shop(shop: &ShopRecord, saved_at: i64) -> Self {
        Self {
            rating: shop.rating,
            ..Self::new(&shop.id, &shop.name, &shop.address, saved_at)
        }
    }
}

/// Shop fields a client sends when saving a favorite
#[derive(Debug, Clone, Deserialize)]
pub struct NewFavorite {
    pub place_id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub rating: Option<f32>,
}

/// One visit to a shop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub place_id: String,
    pub shop_name: String,
    /// Epoch milliseconds
    pub visited_at: i64,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// A visit to record; the time defaults to now
#[derive(Debug, Clone, Deserialize)]
pub struct NewVisit {
    pub place_id: String,
    pub shop_name: String,
    #[serde(default)]
    pub visited_at: Option<i64>,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl NewVisit {
    pub fn new(place_id: impl Into<String>, shop_name: impl Into<String>) -> Self {
        Self {
            place_id: place_id.into(),
            shop_name: shop_name.into(),
            visited_at: None,
            rating: None,
            comment: None,
        }
    }

    pub fn at(mut self, visited_at: i64) -> Self {
        self.visited_at = Some(visited_at);
        self
    }
}

/// A photo-and-comment post about a shop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPost {
    pub post_id: String,
    pub place_id: String,
    pub comment: String,
    /// Image URL or data URL
    pub image: String,
    /// Epoch milliseconds
    pub created_at: i64,
    #[serde(default)]
    pub likes: u32,
}

/// A post to publish; both the comment and the image are required
#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    pub place_id: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub image: String,
}

impl NewPost {
    pub fn new(
        place_id: impl Into<String>,
        comment: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            place_id: place_id.into(),
            comment: comment.into(),
            image: image.into(),
        }
    }

    /// Name of the first missing field, if any
    pub(crate) fn missing_field(&self) -> Option<&'static str> {
        if self.place_id.trim().is_empty() {
            Some("place_id")
        } else if self.comment.trim().is_empty() {
            Some("comment")
        } else if self.image.trim().is_empty() {
            Some("image")
        } else {
            None
        }
    }
}

/// Orderings for the favorites list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FavoriteSort {
    /// Most recently saved first
    #[default]
    Recent,
    Rating,
    Name,
    Visits,
}

impl FromStr for FavoriteSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "recent" => Ok(Self::Recent),
            "rating" => Ok(Self::Rating),
            "name" => Ok(Self::Name),
            "visits" => Ok(Self::Visits),
            other => Err(format!("unknown favorites sort: {}", other)),
        }
    }
}

impl FavoriteSort {
    pub(crate) fn sort(self, favorites: &mut [FavoriteShop]) {
        match self {
            Self::Recent => favorites.sort_by(|a, b| b.saved_at.cmp(&a.saved_at)),
            Self::Rating => favorites.sort_by(|a, b| match (a.rating, b.rating) {
                (Some(x), Some(y)) => y.total_cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }),
            Self::Name => favorites.sort_by_cached_key(|f| f.name.to_lowercase()),
            Self::Visits => favorites.sort_by(|a, b| b.visit_count.cmp(&a.visit_count)),
        }
    }
}

/// Full library dump for backup and transfer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryExport {
    pub favorites: Vec<FavoriteShop>,
    pub visits: Vec<VisitRecord>,
    #[serde(default)]
    pub bookmarks: Vec<String>,
    #[serde(default)]
    pub posts: Vec<UserPost>,
}

/// Library data to restore; absent sections are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryImport {
    #[serde(default)]
    pub favorites: Option<Vec<FavoriteShop>>,
    #[serde(default)]
    pub visits: Option<Vec<VisitRecord>>,
    #[serde(default)]
    pub bookmarks: Option<Vec<String>>,
    #[serde(default)]
    pub posts: Option<Vec<UserPost>>,
}

impl From<LibraryExport> for LibraryImport {
    fn from(export: LibraryExport) -> Self {
        Self {
            favorites: Some(export.favorites),
            visits: Some(export.visits),
            bookmarks: Some(export.bookmarks),
            posts: Some(export.posts),
        }
    }
}
