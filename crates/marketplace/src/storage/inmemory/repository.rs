//! In-memory repository implementation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::RwLock;

use marketplace_core::marketplace::{
    find_first_index, listing_matches_search, user_matches_name, Listing, ListingKey,
    ListingToRate, ProfileField, Tag, User,
};
use marketplace_core::storage::{
    ContinuationToken, ListingRepository, Page, PageRequest, RepositoryError, Result,
    TagRepository, UserRepository,
};

/// In-memory storage backend for testing.
///
/// Uses maps wrapped in `Arc<RwLock<_>>` for thread-safe access. Every
/// single-record operation runs under one write lock, so the read-then-remove
/// sequences are race-free here, unlike on a remote store.
///
/// Operations can be made to fail on demand with [`fail_operation`] to
/// exercise partially applied multi-record sequences.
///
/// [`fail_operation`]: InMemoryRepository::fail_operation
#[derive(Debug, Clone)]
pub struct InMemoryRepository {
    users: Arc<RwLock<HashMap<String, User>>>,
    listings: Arc<RwLock<BTreeMap<ListingKey, Listing>>>,
    tags: Arc<RwLock<HashMap<String, Tag>>>,
    failing: Arc<Mutex<HashSet<&'static str>>>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    /// Creates a new empty in-memory repository.
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            listings: Arc::new(RwLock::new(BTreeMap::new())),
            tags: Arc::new(RwLock::new(HashMap::new())),
            failing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Makes every later call of the named trait method fail with
    /// `ConnectionFailed` until [`clear_failures`](Self::clear_failures).
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn fail_operation(&self, operation: &'static str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(operation);
        }
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn clear_failures(&self) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.clear();
        }
    }

    fn check(&self, operation: &'static str) -> Result<()> {
        let failing = self
            .failing
            .lock()
            .map_err(|_| RepositoryError::ConnectionFailed("poisoned fault table".into()))?;
        if failing.contains(operation) {
            return Err(RepositoryError::ConnectionFailed(format!(
                "injected failure in {operation}"
            )));
        }
        Ok(())
    }
}

fn user_not_found(user_id: &str) -> RepositoryError {
    RepositoryError::NotFound {
        entity_type: "User",
        id: user_id.to_string(),
    }
}

fn listing_not_found(key: &ListingKey) -> RepositoryError {
    RepositoryError::NotFound {
        entity_type: "Listing",
        id: key.to_string(),
    }
}

fn remove_first<T: PartialEq>(items: &mut Vec<T>, value: &T) -> bool {
    match find_first_index(items, value) {
        Some(index) => {
            items.remove(index);
            true
        }
        None => false,
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.check("get_user")?;
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn create_user(&self, user: &User) -> Result<()> {
        self.check("create_user")?;
        let mut users = self.users.write().await;
        if users.contains_key(&user.user_id) {
            return Err(RepositoryError::AlreadyExists {
                entity_type: "User",
                id: user.user_id.clone(),
            });
        }
        users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn search_users_by_name(&self, name: &str) -> Result<Vec<User>> {
        self.check("search_users_by_name")?;
        let users = self.users.read().await;
        Ok(users
            .values()
            .filter(|u| user_matches_name(u, name))
            .cloned()
            .collect())
    }

    async fn search_users_by_email(&self, email: &str) -> Result<Vec<User>> {
        self.check("search_users_by_email")?;
        let users = self.users.read().await;
        Ok(users.values().filter(|u| u.email == email).cloned().collect())
    }

    async fn update_profile_field(
        &self,
        user_id: &str,
        field: ProfileField,
        value: &str,
    ) -> Result<()> {
        self.check("update_profile_field")?;
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| user_not_found(user_id))?;
        user.apply_field(field, value);
        Ok(())
    }

    async fn add_rating(&self, user_id: &str, rating: f64) -> Result<()> {
        self.check("add_rating")?;
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| user_not_found(user_id))?;
        user.rating = user.rating.with_rating(rating);
        Ok(())
    }

    async fn add_saved_listing(&self, user_id: &str, listing: &ListingKey) -> Result<bool> {
        self.check("add_saved_listing")?;
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| user_not_found(user_id))?;
        if user.saved_listings.contains(listing) {
            return Ok(false);
        }
        user.saved_listings.push(listing.clone());
        Ok(true)
    }

    async fn remove_saved_listing(&self, user_id: &str, listing: &ListingKey) -> Result<bool> {
        self.check("remove_saved_listing")?;
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| user_not_found(user_id))?;
        Ok(remove_first(&mut user.saved_listings, listing))
    }

    async fn add_active_listing(&self, user_id: &str, listing: &ListingKey) -> Result<()> {
        self.check("add_active_listing")?;
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| user_not_found(user_id))?;
        user.active_listings.push(listing.clone());
        Ok(())
    }

    async fn remove_active_listing(&self, user_id: &str, listing: &ListingKey) -> Result<bool> {
        self.check("remove_active_listing")?;
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| user_not_found(user_id))?;
        Ok(remove_first(&mut user.active_listings, listing))
    }

    async fn add_listing_to_rate(&self, user_id: &str, entry: &ListingToRate) -> Result<()> {
        self.check("add_listing_to_rate")?;
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| user_not_found(user_id))?;
        user.listings_to_rate.push(entry.clone());
        Ok(())
    }

    async fn remove_listing_to_rate(&self, user_id: &str, listing: &ListingKey) -> Result<bool> {
        self.check("remove_listing_to_rate")?;
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| user_not_found(user_id))?;
        match user.listings_to_rate.iter().position(|e| e.refers_to(listing)) {
            Some(index) => {
                user.listings_to_rate.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl ListingRepository for InMemoryRepository {
    async fn create_listing(&self, listing: &Listing) -> Result<()> {
        self.check("create_listing")?;
        let mut listings = self.listings.write().await;
        let key = listing.key();
        if listings.contains_key(&key) {
            return Err(RepositoryError::AlreadyExists {
                entity_type: "Listing",
                id: key.to_string(),
            });
        }
        listings.insert(key, listing.clone());
        Ok(())
    }

    async fn list_listings(&self, page: PageRequest) -> Result<Page<Listing>> {
        self.check("list_listings")?;
        let start = match &page.start {
            Some(token) => Bound::Excluded(token.to_key()?),
            None => Bound::Unbounded,
        };
        let limit = page.limit.map_or(usize::MAX, |l| l as usize);

        let listings = self.listings.read().await;
        let mut range = listings.range((start, Bound::Unbounded));
        let items: Vec<Listing> = range.by_ref().take(limit).map(|(_, l)| l.clone()).collect();

        let next_key = match (range.next(), items.last()) {
            (Some(_), Some(last)) => Some(ContinuationToken::from_key(&last.key())?),
            _ => None,
        };

        Ok(Page { items, next_key })
    }

    async fn get_listings_by_keys(&self, keys: &[ListingKey]) -> Result<Vec<Listing>> {
        self.check("get_listings_by_keys")?;
        let listings = self.listings.read().await;
        Ok(keys
            .iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .filter_map(|k| listings.get(k).cloned())
            .collect())
    }

    async fn get_listing(&self, key: &ListingKey) -> Result<Option<Listing>> {
        self.check("get_listing")?;
        Ok(self.listings.read().await.get(key).cloned())
    }

    async fn search_listings(&self, term: &str) -> Result<Vec<Listing>> {
        self.check("search_listings")?;
        let listings = self.listings.read().await;
        Ok(listings
            .values()
            .filter(|l| listing_matches_search(l, term))
            .cloned()
            .collect())
    }

    async fn mark_sold(&self, key: &ListingKey, buyer_id: &str) -> Result<()> {
        self.check("mark_sold")?;
        let mut listings = self.listings.write().await;
        let listing = listings.get_mut(key).ok_or_else(|| listing_not_found(key))?;
        listing.sold = true;
        listing.sold_to = Some(buyer_id.to_string());
        Ok(())
    }

    async fn increment_saved_count(&self, key: &ListingKey) -> Result<()> {
        self.check("increment_saved_count")?;
        let mut listings = self.listings.write().await;
        let listing = listings.get_mut(key).ok_or_else(|| listing_not_found(key))?;
        listing.saved_count += 1;
        Ok(())
    }

    async fn decrement_saved_count(&self, key: &ListingKey) -> Result<()> {
        self.check("decrement_saved_count")?;
        let mut listings = self.listings.write().await;
        let listing = listings.get_mut(key).ok_or_else(|| listing_not_found(key))?;
        listing.saved_count =
            listing
                .saved_count
                .checked_sub(1)
                .ok_or_else(|| RepositoryError::Conflict {
                    entity_type: "Listing",
                    id: key.to_string(),
                })?;
        Ok(())
    }

    async fn add_tag(&self, key: &ListingKey, tag: &str) -> Result<()> {
        self.check("add_tag")?;
        let mut listings = self.listings.write().await;
        let listing = listings.get_mut(key).ok_or_else(|| listing_not_found(key))?;
        listing.tags.push(tag.to_string());
        Ok(())
    }

    async fn remove_tag(&self, key: &ListingKey, tag: &str) -> Result<bool> {
        self.check("remove_tag")?;
        let mut listings = self.listings.write().await;
        let listing = listings.get_mut(key).ok_or_else(|| listing_not_found(key))?;
        Ok(remove_first(&mut listing.tags, &tag.to_string()))
    }

    async fn add_picture(&self, key: &ListingKey, picture: &str) -> Result<()> {
        self.check("add_picture")?;
        let mut listings = self.listings.write().await;
        let listing = listings.get_mut(key).ok_or_else(|| listing_not_found(key))?;
        listing.pictures.push(picture.to_string());
        Ok(())
    }

    async fn remove_picture(&self, key: &ListingKey, picture: &str) -> Result<bool> {
        self.check("remove_picture")?;
        let mut listings = self.listings.write().await;
        let listing = listings.get_mut(key).ok_or_else(|| listing_not_found(key))?;
        Ok(remove_first(&mut listing.pictures, &picture.to_string()))
    }

    async fn delete_listing(&self, key: &ListingKey) -> Result<()> {
        self.check("delete_listing")?;
        self.listings.write().await.remove(key);
        Ok(())
    }
}

#[async_trait]
impl TagRepository for InMemoryRepository {
    async fn get_tag(&self, name: &str) -> Result<Option<Tag>> {
        self.check("get_tag")?;
        Ok(self.tags.read().await.get(name).cloned())
    }

    async fn create_tag(&self, name: &str) -> Result<()> {
        self.check("create_tag")?;
        let mut tags = self.tags.write().await;
        if tags.contains_key(name) {
            return Err(RepositoryError::AlreadyExists {
                entity_type: "Tag",
                id: name.to_string(),
            });
        }
        tags.insert(name.to_string(), Tag::new(name));
        Ok(())
    }

    async fn add_listing(&self, name: &str, listing: &ListingKey) -> Result<()> {
        self.check("add_listing")?;
        let mut tags = self.tags.write().await;
        let tag = tags.get_mut(name).ok_or_else(|| RepositoryError::NotFound {
            entity_type: "Tag",
            id: name.to_string(),
        })?;
        tag.listings.push(listing.clone());
        Ok(())
    }

    async fn remove_listing(&self, name: &str, listing: &ListingKey) -> Result<bool> {
        self.check("remove_listing")?;
        let mut tags = self.tags.write().await;
        Ok(match tags.get_mut(name) {
            Some(tag) => remove_first(&mut tag.listings, listing),
            None => false,
        })
    }

    async fn delete_tag_if_empty(&self, name: &str) -> Result<bool> {
        self.check("delete_tag_if_empty")?;
        let mut tags = self.tags.write().await;
        if !tags.get(name).is_some_and(Tag::is_empty) {
            return Ok(false);
        }
        tags.remove(name);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketplace_core::marketplace::NewListing;

    fn listing(id: &str, time: &str, title: &str) -> Listing {
        Listing::new(
            NewListing {
                key: ListingKey::new(id, time),
                title: title.to_string(),
                price: 10.0,
                description: "d".to_string(),
                location: "l".to_string(),
                tags: vec!["a".to_string(), "b".to_string(), "a".to_string()],
                pictures: vec!["p1".to_string()],
            },
            "owner",
        )
    }

    fn user(id: &str, name: &str, email: &str) -> User {
        User::new(id, name, email, "pic.png")
    }

    #[tokio::test]
    async fn test_create_user_twice_fails_and_keeps_first() {
        let repo = InMemoryRepository::new();
        repo.create_user(&user("u1", "First", "a@x.com")).await.unwrap();

        let result = repo.create_user(&user("u1", "Second", "b@x.com")).await;

        assert!(matches!(result, Err(RepositoryError::AlreadyExists { .. })));
        let stored = repo.get_user("u1").await.unwrap().unwrap();
        assert_eq!(stored.name, "First");
    }

    #[tokio::test]
    async fn test_search_users() {
        let repo = InMemoryRepository::new();
        repo.create_user(&user("u1", "Alice Smith", "alice@x.com")).await.unwrap();
        repo.create_user(&user("u2", "Bob", "bob@x.com")).await.unwrap();

        let by_name = repo.search_users_by_name("SMITH").await.unwrap();
        let by_email = repo.search_users_by_email("bob@x.com").await.unwrap();
        let partial_email = repo.search_users_by_email("bob").await.unwrap();

        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].user_id, "u1");
        assert_eq!(by_email.len(), 1);
        assert_eq!(by_email[0].user_id, "u2");
        assert!(partial_email.is_empty());
    }

    #[tokio::test]
    async fn test_update_field_on_missing_user_is_not_found() {
        let repo = InMemoryRepository::new();

        let result = repo
            .update_profile_field("ghost", ProfileField::Phone, "555")
            .await;

        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_add_rating_accumulates() {
        let repo = InMemoryRepository::new();
        repo.create_user(&user("u1", "A", "a@x.com")).await.unwrap();

        repo.add_rating("u1", 5.0).await.unwrap();
        repo.add_rating("u1", 3.0).await.unwrap();

        let stored = repo.get_user("u1").await.unwrap().unwrap();
        assert_eq!(stored.rating.count, 2);
        assert_eq!(stored.rating.average(), 4.0);
    }

    #[tokio::test]
    async fn test_saved_listing_add_is_idempotent() {
        let repo = InMemoryRepository::new();
        repo.create_user(&user("u1", "A", "a@x.com")).await.unwrap();
        let key = ListingKey::new("L1", "1");

        assert!(repo.add_saved_listing("u1", &key).await.unwrap());
        assert!(!repo.add_saved_listing("u1", &key).await.unwrap());
        assert!(repo.remove_saved_listing("u1", &key).await.unwrap());
        assert!(!repo.remove_saved_listing("u1", &key).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_listing_to_rate_matches_by_key() {
        let repo = InMemoryRepository::new();
        repo.create_user(&user("b", "Buyer", "b@x.com")).await.unwrap();
        let entry = ListingToRate {
            buyer_id: "b".to_string(),
            listing_id: "L1".to_string(),
            creation_time: "1".to_string(),
            seller_id: "s".to_string(),
        };
        repo.add_listing_to_rate("b", &entry).await.unwrap();

        let removed = repo
            .remove_listing_to_rate("b", &ListingKey::new("L1", "1"))
            .await
            .unwrap();

        assert!(removed);
        let stored = repo.get_user("b").await.unwrap().unwrap();
        assert!(stored.listings_to_rate.is_empty());
    }

    #[tokio::test]
    async fn test_pagination_walks_all_listings() {
        let repo = InMemoryRepository::new();
        for i in 0..5 {
            repo.create_listing(&listing(&format!("L{i}"), "1", "t"))
                .await
                .unwrap();
        }

        let mut seen = Vec::new();
        let mut start = None;
        loop {
            let page = repo
                .list_listings(PageRequest::new(start, Some(2)))
                .await
                .unwrap();
            seen.extend(page.items.iter().map(|l| l.listing_id.clone()));
            match page.next_key {
                Some(token) => start = Some(token),
                None => break,
            }
        }

        assert_eq!(seen, vec!["L0", "L1", "L2", "L3", "L4"]);
    }

    #[tokio::test]
    async fn test_exact_final_page_has_no_token() {
        let repo = InMemoryRepository::new();
        for i in 0..2 {
            repo.create_listing(&listing(&format!("L{i}"), "1", "t"))
                .await
                .unwrap();
        }

        let page = repo
            .list_listings(PageRequest::new(None, Some(2)))
            .await
            .unwrap();

        assert_eq!(page.items.len(), 2);
        assert!(page.next_key.is_none());
    }

    #[tokio::test]
    async fn test_batch_get_skips_missing_and_duplicates() {
        let repo = InMemoryRepository::new();
        repo.create_listing(&listing("L1", "1", "t")).await.unwrap();
        let keys = vec![
            ListingKey::new("L1", "1"),
            ListingKey::new("L1", "1"),
            ListingKey::new("missing", "1"),
        ];

        let found = repo.get_listings_by_keys(&keys).await.unwrap();

        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_tag_removes_first_occurrence_only() {
        let repo = InMemoryRepository::new();
        let item = listing("L1", "1", "t");
        repo.create_listing(&item).await.unwrap();

        assert!(repo.remove_tag(&item.key(), "a").await.unwrap());
        assert!(!repo.remove_tag(&item.key(), "zzz").await.unwrap());

        let stored = repo.get_listing(&item.key()).await.unwrap().unwrap();
        assert_eq!(stored.tags, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_pictures_append_and_remove() {
        let repo = InMemoryRepository::new();
        let item = listing("L1", "1", "t");
        repo.create_listing(&item).await.unwrap();

        repo.add_picture(&item.key(), "p2").await.unwrap();
        repo.remove_picture(&item.key(), "p1").await.unwrap();

        let stored = repo.get_listing(&item.key()).await.unwrap().unwrap();
        assert_eq!(stored.pictures, vec!["p2"]);
    }

    #[tokio::test]
    async fn test_decrement_below_zero_is_conflict() {
        let repo = InMemoryRepository::new();
        let item = listing("L1", "1", "t");
        repo.create_listing(&item).await.unwrap();

        let result = repo.decrement_saved_count(&item.key()).await;

        assert!(matches!(result, Err(RepositoryError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_mark_sold_sets_both_fields() {
        let repo = InMemoryRepository::new();
        let item = listing("L1", "1", "t");
        repo.create_listing(&item).await.unwrap();

        repo.mark_sold(&item.key(), "buyer").await.unwrap();

        let stored = repo.get_listing(&item.key()).await.unwrap().unwrap();
        assert!(stored.sold);
        assert_eq!(stored.sold_to.as_deref(), Some("buyer"));
    }

    #[tokio::test]
    async fn test_search_listings_by_title() {
        let repo = InMemoryRepository::new();
        repo.create_listing(&listing("L1", "1", "Red Sofa")).await.unwrap();
        repo.create_listing(&listing("L2", "1", "Desk")).await.unwrap();

        let found = repo.search_listings("  sofa").await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].listing_id, "L1");
    }

    #[tokio::test]
    async fn test_tag_lifecycle() {
        let repo = InMemoryRepository::new();
        let key = ListingKey::new("L1", "1");

        assert!(matches!(
            repo.add_listing("t", &key).await,
            Err(RepositoryError::NotFound { .. })
        ));
        repo.create_tag("t").await.unwrap();
        assert!(matches!(
            repo.create_tag("t").await,
            Err(RepositoryError::AlreadyExists { .. })
        ));
        repo.add_listing("t", &key).await.unwrap();
        assert!(repo.remove_listing("t", &key).await.unwrap());
        assert!(repo.get_tag("t").await.unwrap().unwrap().is_empty());
        assert!(repo.delete_tag_if_empty("t").await.unwrap());
        assert!(repo.get_tag("t").await.unwrap().is_none());
        assert!(!repo.remove_listing("t", &key).await.unwrap());
        assert!(!repo.delete_tag_if_empty("t").await.unwrap());
    }

    #[tokio::test]
    async fn test_referenced_tag_is_not_deleted() {
        let repo = InMemoryRepository::new();
        let key = ListingKey::new("L2", "2");
        repo.create_tag("t").await.unwrap();
        repo.add_listing("t", &key).await.unwrap();

        assert!(!repo.delete_tag_if_empty("t").await.unwrap());

        let tag = repo.get_tag("t").await.unwrap().unwrap();
        assert_eq!(tag.listings, vec![key]);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let repo = InMemoryRepository::new();
        repo.fail_operation("get_tag");

        assert!(matches!(
            repo.get_tag("t").await,
            Err(RepositoryError::ConnectionFailed(_))
        ));

        repo.clear_failures();
        assert!(repo.get_tag("t").await.unwrap().is_none());
    }
}
