//! Personal shop library
//!
//! Favorites, bookmarks, visit history and shop posts kept in a
//! [`CacheStore`] with a long retention TTL.

mod models;

pub use models::*;

use crate::cache::{CacheStore, Clock, SystemClock};
use crate::results::ShopFlags;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

pub const FAVORITES_KEY: &str = "user_favorites";
pub const VISITS_KEY: &str = "user_visits";
pub const BOOKMARKS_KEY: &str = "user_bookmarks";
pub const POSTS_KEY: &str = "user_posts";

/// Visit records kept by default
pub const MAX_VISITS: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LibraryError {
    #[error("shop {0} is not in favorites")]
    NotFavorite(String),
    #[error("post {0} not found")]
    PostNotFound(String),
    #[error("{0} is required")]
    MissingField(&'static str),
}

/// Library markers for many shops at once
#[derive(Debug, Clone, Default)]
pub struct FlagIndex {
    favorites: HashSet<String>,
    bookmarks: HashSet<String>,
    visited: HashSet<String>,
}

impl FlagIndex {
    pub fn flags(&self, place_id: &str) -> ShopFlags {
        ShopFlags {
            bookmarked: self.bookmarks.contains(place_id),
            visited: self.visited.contains(place_id),
            favorite: self.favorites.contains(place_id),
        }
    }
}

pub struct ShopLibrary {
    store: Arc<CacheStore>,
    clock: Arc<dyn Clock>,
    retention: Duration,
    max_visits: usize,
    // Serializes read-modify-write cycles on the stored lists
    write_lock: Mutex<()>,
}

impl ShopLibrary {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            retention: Duration::from_secs(365 * 24 * 60 * 60),
            max_visits: MAX_VISITS,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_settings(self, settings: &crate::config::LibrarySettings) -> Self {
        Self {
            retention: settings.retention(),
            max_visits: settings.max_visits.max(1),
            ..self
        }
    }

    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self { clock, ..self }
    }

    pub async fn favorites(&self) -> Vec<FavoriteShop> {
        self.store.get(FAVORITES_KEY).await.unwrap_or_default()
    }

    /// Save a shop; a shop already saved is left as is
    pub async fn add_favorite(&self, shop: NewFavorite) -> FavoriteShop {
        let _guard = self.write_lock.lock().await;
        let mut favorites = self.favorites().await;

        if let Some(existing) = favorites.iter().find(|f| f.place_id == shop.place_id) {
            debug!("Shop {} is already a favorite", shop.place_id);
            return existing.clone();
        }

        let favorite = FavoriteShop {
            rating: shop.rating,
            ..FavoriteShop::new(shop.place_id, shop.name, shop.address, self.clock.now_ms())
        };
        favorites.push(favorite.clone());
        self.save(FAVORITES_KEY, &favorites).await;
        favorite
    }

    /// Returns whether the shop was a favorite
    pub async fn remove_favorite(&self, place_id: &str) -> bool {
        let _guard = self.write_lock.lock().await;
        let mut favorites = self.favorites().await;
        let before = favorites.len();
        favorites.retain(|f| f.place_id != place_id);
        self.save(FAVORITES_KEY, &favorites).await;
        favorites.len() != before
    }

    pub async fn is_favorite(&self, place_id: &str) -> bool {
        self.favorites().await.iter().any(|f| f.place_id == place_id)
    }

    pub async fn update_notes(&self, place_id: &str, notes: impl Into<String>) -> Result<(), LibraryError> {
        let notes = notes.into();
        self.update_favorite(place_id, |f| f.personal_notes = Some(notes))
            .await
    }

    pub async fn update_tags(&self, place_id: &str, tags: Vec<String>) -> Result<(), LibraryError> {
        self.update_favorite(place_id, |f| f.tags = tags).await
    }

    async fn update_favorite(
        &self,
        place_id: &str,
        update: impl FnOnce(&mut FavoriteShop),
    ) -> Result<(), LibraryError> {
        let _guard = self.write_lock.lock().await;
        let mut favorites = self.favorites().await;
        let favorite = favorites
            .iter_mut()
            .find(|f| f.place_id == place_id)
            .ok_or_else(|| LibraryError::NotFavorite(place_id.to_string()))?;
        update(favorite);
        self.save(FAVORITES_KEY, &favorites).await;
        Ok(())
    }

    pub async fn favorites_sorted(&self, sort: FavoriteSort) -> Vec<FavoriteShop> {
        let mut favorites = self.favorites().await;
        sort.sort(&mut favorites);
        favorites
    }

    pub async fn bookmarks(&self) -> Vec<String> {
        self.store.get(BOOKMARKS_KEY).await.unwrap_or_default()
    }

    /// Flip the bookmark on a shop; returns the new state
    pub async fn toggle_bookmark(&self, place_id: &str) -> bool {
        let _guard = self.write_lock.lock().await;
        let mut bookmarks = self.bookmarks().await;
        let bookmarked = match bookmarks.iter().position(|id| id == place_id) {
            Some(pos) => {
                bookmarks.remove(pos);
                false
            }
            None => {
                bookmarks.push(place_id.to_string());
                true
            }
        };
        self.save(BOOKMARKS_KEY, &bookmarks).await;
        bookmarked
    }

    /// Visits, most recent first
    pub async fn visit_history(&self) -> Vec<VisitRecord> {
        let mut visits: Vec<VisitRecord> = self.store.get(VISITS_KEY).await.unwrap_or_default();
        visits.sort_by(|a, b| b.visited_at.cmp(&a.visited_at));
        visits
    }

    pub async fn shop_visits(&self, place_id: &str) -> Vec<VisitRecord> {
        self.visit_history()
            .await
            .into_iter()
            .filter(|v| v.place_id == place_id)
            .collect()
    }

    /// Record a visit, keeping only the most recent ones, and refresh
    /// the favorite's visit count when the shop is saved
    pub async fn add_visit(&self, visit: NewVisit) -> VisitRecord {
        let _guard = self.write_lock.lock().await;
        let record = VisitRecord {
            place_id: visit.place_id,
            shop_name: visit.shop_name,
            visited_at: visit.visited_at.unwrap_or_else(|| self.clock.now_ms()),
            rating: visit.rating,
            comment: visit.comment,
        };

        let mut visits = self.visit_history().await;
        visits.insert(0, record.clone());
        visits.sort_by(|a, b| b.visited_at.cmp(&a.visited_at));
        visits.truncate(self.max_visits);
        self.save(VISITS_KEY, &visits).await;

        let mut favorites = self.favorites().await;
        if let Some(favorite) = favorites.iter_mut().find(|f| f.place_id == record.place_id) {
            favorite.visit_count = visits
                .iter()
                .filter(|v| v.place_id == record.place_id)
                .count() as u32;
            favorite.last_visit = Some(
                favorite
                    .last_visit
                    .map_or(record.visited_at, |last| last.max(record.visited_at)),
            );
            self.save(FAVORITES_KEY, &favorites).await;
        }

        record
    }

    /// All posts, newest first
    pub async fn posts(&self) -> Vec<UserPost> {
        let mut posts: Vec<UserPost> = self.store.get(POSTS_KEY).await.unwrap_or_default();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts
    }

    pub async fn shop_posts(&self, place_id: &str) -> Vec<UserPost> {
        self.posts()
            .await
            .into_iter()
            .filter(|p| p.place_id == place_id)
            .collect()
    }

    /// Publish a post with zero likes
    pub async fn add_post(&self, post: NewPost) -> Result<UserPost, LibraryError> {
        if let Some(field) = post.missing_field() {
            return Err(LibraryError::MissingField(field));
        }

        let _guard = self.write_lock.lock().await;
        let mut posts = self.posts().await;
        let created_at = self.clock.now_ms();

        let mut post_id = format!("post-{}", created_at);
        let mut n = 1;
        while posts.iter().any(|p| p.post_id == post_id) {
            post_id = format!("post-{}-{}", created_at, n);
            n += 1;
        }

        let record = UserPost {
            post_id,
            place_id: post.place_id,
            comment: post.comment.trim().to_string(),
            image: post.image,
            created_at,
            likes: 0,
        };
        posts.insert(0, record.clone());
        self.save(POSTS_KEY, &posts).await;
        Ok(record)
    }

    /// Add or take back a like; returns the updated post
    pub async fn like_post(&self, post_id: &str, liked: bool) -> Result<UserPost, LibraryError> {
        let _guard = self.write_lock.lock().await;
        let mut posts = self.posts().await;
        let post = posts
            .iter_mut()
            .find(|p| p.post_id == post_id)
            .ok_or_else(|| LibraryError::PostNotFound(post_id.to_string()))?;
        post.likes = if liked {
            post.likes.saturating_add(1)
        } else {
            post.likes.saturating_sub(1)
        };
        let updated = post.clone();
        self.save(POSTS_KEY, &posts).await;
        Ok(updated)
    }

    /// Returns whether the post existed
    pub async fn remove_post(&self, post_id: &str) -> bool {
        let _guard = self.write_lock.lock().await;
        let mut posts = self.posts().await;
        let before = posts.len();
        posts.retain(|p| p.post_id != post_id);
        if posts.len() == before {
            return false;
        }
        self.save(POSTS_KEY, &posts).await;
        true
    }

    pub async fn flag_index(&self) -> FlagIndex {
        FlagIndex {
            favorites: self.favorites().await.into_iter().map(|f| f.place_id).collect(),
            bookmarks: self.bookmarks().await.into_iter().collect(),
            visited: self.visit_history().await.into_iter().map(|v| v.place_id).collect(),
        }
    }

    pub async fn flags(&self, place_id: &str) -> ShopFlags {
        self.flag_index().await.flags(place_id)
    }

    pub async fn export(&self) -> LibraryExport {
        LibraryExport {
            favorites: self.favorites().await,
            visits: self.visit_history().await,
            bookmarks: self.bookmarks().await,
            posts: self.posts().await,
        }
    }

    /// Replace the sections present in `data`
    pub async fn import(&self, data: LibraryImport) {
        let _guard = self.write_lock.lock().await;
        if let Some(favorites) = data.favorites {
            self.save(FAVORITES_KEY, &favorites).await;
        }
        if let Some(mut visits) = data.visits {
            visits.sort_by(|a, b| b.visited_at.cmp(&a.visited_at));
            visits.truncate(self.max_visits);
            self.save(VISITS_KEY, &visits).await;
        }
        if let Some(bookmarks) = data.bookmarks {
            self.save(BOOKMARKS_KEY, &bookmarks).await;
        }
        if let Some(mut posts) = data.posts {
            posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            self.save(POSTS_KEY, &posts).await;
        }
    }

    pub async fn clear(&self) {
        let _guard = self.write_lock.lock().await;
        for key in [FAVORITES_KEY, VISITS_KEY, BOOKMARKS_KEY, POSTS_KEY] {
            self.store.remove(key).await;
        }
    }

    async fn save<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T) {
        self.store.set(key, value, self.retention).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheLimits, ManualClock, MemoryMedium};
    use tokio_test::assert_ok;

    const START: i64 = 1_700_000_000_000;

    async fn library() -> (ShopLibrary, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START));
        let store = CacheStore::open(
            "library",
            Arc::new(MemoryMedium::new()),
            CacheLimits::default(),
            clock.clone(),
        )
        .await
        .unwrap();
        let library = ShopLibrary::new(Arc::new(store)).with_clock(clock.clone());
        (library, clock)
    }

    fn shop(id: &str) -> NewFavorite {
        NewFavorite {
            place_id: id.to_string(),
            name: format!("Shop {}", id),
            address: "Tokyo".to_string(),
            rating: Some(4.0),
        }
    }

    #[tokio::test]
    async fn test_add_favorite_is_idempotent() {
        let (library, clock) = library().await;

        let first = library.add_favorite(shop("p1")).await;
        clock.advance(Duration::from_secs(10));
        let second = library.add_favorite(shop("p1")).await;

        assert_eq!(first, second);
        assert_eq!(library.favorites().await.len(), 1);
        assert!(library.is_favorite("p1").await);
        assert!(!library.is_favorite("p2").await);
    }

    #[tokio::test]
    async fn test_remove_favorite() {
        let (library, _) = library().await;
        library.add_favorite(shop("p1")).await;

        assert!(library.remove_favorite("p1").await);
        assert!(!library.remove_favorite("p1").await);
        assert!(library.favorites().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_notes_and_tags() {
        let (library, _) = library().await;
        library.add_favorite(shop("p1")).await;

        assert_ok!(library.update_notes("p1", "ask for firm noodles").await);
        assert_ok!(library.update_tags("p1", vec!["tonkotsu".to_string()]).await);

        let favorite = &library.favorites().await[0];
        assert_eq!(favorite.personal_notes.as_deref(), Some("ask for firm noodles"));
        assert_eq!(favorite.tags, vec!["tonkotsu"]);

        assert_eq!(
            library.update_tags("missing", vec![]).await,
            Err(LibraryError::NotFavorite("missing".to_string()))
        );
    }

    #[tokio::test]
    async fn test_toggle_bookmark() {
        let (library, _) = library().await;

        assert!(library.toggle_bookmark("p1").await);
        assert!(library.flags("p1").await.bookmarked);
        assert!(!library.toggle_bookmark("p1").await);
        assert!(library.bookmarks().await.is_empty());
    }

    #[tokio::test]
    async fn test_visits_newest_first_and_capped() {
        let (library, clock) = library().await;

        for i in 0..(MAX_VISITS + 5) {
            clock.advance(Duration::from_secs(60));
            library.add_visit(NewVisit::new(format!("p{}", i), "Shop")).await;
        }

        let history = library.visit_history().await;
        assert_eq!(history.len(), MAX_VISITS);
        assert_eq!(history[0].place_id, format!("p{}", MAX_VISITS + 4));
        assert!(history.windows(2).all(|w| w[0].visited_at >= w[1].visited_at));
        assert!(history.iter().all(|v| v.place_id != "p0"));
    }

    #[tokio::test]
    async fn test_visit_refreshes_favorite() {
        let (library, clock) = library().await;
        library.add_favorite(shop("p1")).await;

        clock.advance(Duration::from_secs(3600));
        library.add_visit(NewVisit::new("p1", "Shop p1")).await;
        clock.advance(Duration::from_secs(3600));
        let latest = library.add_visit(NewVisit::new("p1", "Shop p1")).await;
        library.add_visit(NewVisit::new("p2", "Shop p2")).await;

        let favorite = &library.favorites().await[0];
        assert_eq!(favorite.visit_count, 2);
        assert_eq!(favorite.last_visit, Some(latest.visited_at));
        assert_eq!(library.shop_visits("p1").await.len(), 2);

        let flags = library.flags("p1").await;
        assert!(flags.favorite && flags.visited && !flags.bookmarked);
    }

    #[tokio::test]
    async fn test_favorites_sorted_recent() {
        let (library, clock) = library().await;
        library.add_favorite(shop("old")).await;
        clock.advance(Duration::from_secs(5));
        library.add_favorite(shop("new")).await;

        let sorted = library.favorites_sorted(FavoriteSort::Recent).await;
        assert_eq!(sorted[0].place_id, "new");
    }

    #[tokio::test]
    async fn test_export_import_clear() {
        let (library, _) = library().await;
        library.add_favorite(shop("p1")).await;
        library.toggle_bookmark("p2").await;
        library.add_visit(NewVisit::new("p3", "Shop p3")).await;
        assert_ok!(library.add_post(NewPost::new("p3", "rich broth", "bowl.jpg")).await);

        let export = library.export().await;
        library.clear().await;
        assert_eq!(library.export().await, LibraryExport::default());

        library.import(export.clone().into()).await;
        assert_eq!(library.export().await, export);

        // Sections missing from an import are kept
        library
            .import(LibraryImport {
                bookmarks: Some(vec![]),
                ..Default::default()
            })
            .await;
        assert!(library.bookmarks().await.is_empty());
        assert_eq!(library.favorites().await.len(), 1);
        assert_eq!(library.posts().await.len(), 1);
    }

    #[tokio::test]
    async fn test_posts_newest_first_per_shop() {
        let (library, clock) = library().await;

        let first = assert_ok!(library.add_post(NewPost::new("p1", "first bowl", "a.jpg")).await);
        let same_ms = assert_ok!(library.add_post(NewPost::new("p1", "second bowl", "b.jpg")).await);
        clock.advance(Duration::from_secs(60));
        assert_ok!(library.add_post(NewPost::new("p2", "other shop", "c.jpg")).await);
        let latest = assert_ok!(library.add_post(NewPost::new("p1", "third bowl", "d.jpg")).await);

        assert_ne!(first.post_id, same_ms.post_id);
        assert_eq!(first.likes, 0);

        let posts = library.shop_posts("p1").await;
        assert_eq!(posts.len(), 3);
        assert_eq!(posts[0], latest);
        assert_eq!(library.posts().await.len(), 4);
    }

    #[tokio::test]
    async fn test_post_requires_comment_and_image() {
        let (library, _) = library().await;

        assert_eq!(
            library.add_post(NewPost::new("p1", "", "a.jpg")).await,
            Err(LibraryError::MissingField("comment"))
        );
        assert_eq!(
            library.add_post(NewPost::new("p1", "tasty", " ")).await,
            Err(LibraryError::MissingField("image"))
        );
        assert!(library.posts().await.is_empty());
    }

    #[tokio::test]
    async fn test_like_and_remove_post() {
        let (library, _) = library().await;
        let post = assert_ok!(library.add_post(NewPost::new("p1", "tasty", "a.jpg")).await);

        assert_eq!(assert_ok!(library.like_post(&post.post_id, true).await).likes, 1);
        assert_eq!(assert_ok!(library.like_post(&post.post_id, false).await).likes, 0);
        assert_eq!(assert_ok!(library.like_post(&post.post_id, false).await).likes, 0);
        assert_eq!(
            library.like_post("nope", true).await,
            Err(LibraryError::PostNotFound("nope".to_string()))
        );

        assert!(library.remove_post(&post.post_id).await);
        assert!(!library.remove_post(&post.post_id).await);
        assert!(library.posts().await.is_empty());
    }
}
