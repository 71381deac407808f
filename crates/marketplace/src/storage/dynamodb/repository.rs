//! DynamoDB repository implementation.
//!
//! Implements the repository traits from `marketplace_core::storage` over
//! three tables: users (hash key `userId`), listings (hash `listingId`, range
//! `creationTime`) and tags (hash `name`).

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, KeysAndAttributes};
use aws_sdk_dynamodb::Client;

use marketplace_core::marketplace::{
    find_first_index, normalize_search_text, Listing, ListingKey, ListingToRate, ProfileField,
    Tag, User,
};
use marketplace_core::storage::{
    ContinuationToken, ListingRepository, Page, PageRequest, RepositoryError, Result,
    TagRepository, UserRepository,
};

use super::conversions::{
    item_to_listing, item_to_listing_key, item_to_tag, item_to_user, listing_key,
    listing_ref_to_value, listing_to_item, listing_to_rate_to_value, new_tag_item, tag_key,
    user_key, user_to_item, Item, ACTIVE_LISTINGS, LISTINGS_TO_RATE, LISTING_ID, PICTURES,
    RATING_COUNT, RATING_TOTAL, SAVED_COUNT, SAVED_LISTINGS, SEARCH_NAME, SEARCH_TITLE, TAGS,
    TAG_LISTINGS, TAG_NAME, USER_ID,
};
use super::error::{
    map_create_error, map_guarded_update_error, map_read_error, map_update_error,
};
use crate::config::Config;

/// BatchGetItem accepts at most this many keys per request.
const BATCH_GET_LIMIT: usize = 100;
const BATCH_GET_MAX_ATTEMPTS: u32 = 5;
const BATCH_GET_BASE_DELAY: Duration = Duration::from_millis(50);
/// Attempts for a length-guarded append that lost a race with another append.
const SAVED_LISTING_ATTEMPTS: u32 = 3;

/// Runs `op` again while it fails with `Conflict`, at most `attempts` times.
async fn retry_on_conflict<T, F, Fut>(attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(RepositoryError::Conflict { entity_type, id }) if attempt < attempts => {
                tracing::debug!(entity_type, %id, attempt, "Retrying after concurrent update");
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Table names for the three collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub users: String,
    pub listings: String,
    pub tags: String,
}

impl TableNames {
    pub fn from_config(config: &Config) -> Self {
        Self {
            users: config.users_table.clone(),
            listings: config.listings_table.clone(),
            tags: config.tags_table.clone(),
        }
    }
}

/// A single record addressed by an update, with what to report if it fails.
struct Record<'a> {
    table: &'a str,
    key: Item,
    /// Hash key attribute, used in `attribute_exists` conditions.
    hash_key: &'static str,
    entity_type: &'static str,
    id: String,
}

/// DynamoDB-based repository implementation.
///
/// Every method issues independent single-item requests. List removals read
/// the record, resolve the index, and remove that index on the condition that
/// it still holds the expected value.
pub struct DynamoDbRepository {
    client: Client,
    tables: TableNames,
}

impl DynamoDbRepository {
    /// Creates a new repository with the given DynamoDB client and table names.
    pub fn new(client: Client, tables: TableNames) -> Self {
        Self { client, tables }
    }

    /// Creates a repository using the AWS SDK default credential chain.
    ///
    /// `DYNAMODB_ENDPOINT` points the client at a local DynamoDB instead of AWS.
    pub async fn from_config(config: &Config) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(endpoint) = &config.dynamodb_endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        Self::new(Client::new(&sdk_config), TableNames::from_config(config))
    }

    fn user_record(&self, user_id: &str) -> Record<'_> {
        Record {
            table: &self.tables.users,
            key: user_key(user_id),
            hash_key: USER_ID,
            entity_type: "User",
            id: user_id.to_string(),
        }
    }

    fn listing_record(&self, key: &ListingKey) -> Record<'_> {
        Record {
            table: &self.tables.listings,
            key: listing_key(key),
            hash_key: LISTING_ID,
            entity_type: "Listing",
            id: key.to_string(),
        }
    }

    fn tag_record(&self, name: &str) -> Record<'_> {
        Record {
            table: &self.tables.tags,
            key: tag_key(name),
            hash_key: TAG_NAME,
            entity_type: "Tag",
            id: name.to_string(),
        }
    }

    async fn get_item(&self, table: &str, key: Item, operation: &'static str) -> Result<Option<Item>> {
        let result = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(key))
            .send()
            .await
            .map_err(|e| map_read_error(e, operation))?;

        Ok(result.item)
    }

    async fn put_new_item(&self, record: Record<'_>, item: Item, operation: &'static str) -> Result<()> {
        self.client
            .put_item()
            .table_name(record.table)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(#pk)")
            .expression_attribute_names("#pk", record.hash_key)
            .send()
            .await
            .map_err(|e| map_create_error(e, operation, record.entity_type, record.id))?;

        Ok(())
    }

    /// Appends one element to a list attribute of an existing record.
    async fn append(
        &self,
        record: Record<'_>,
        list: &str,
        value: AttributeValue,
        operation: &'static str,
    ) -> Result<()> {
        self.client
            .update_item()
            .table_name(record.table)
            .set_key(Some(record.key))
            .update_expression("SET #list = list_append(if_not_exists(#list, :empty), :value)")
            .condition_expression("attribute_exists(#pk)")
            .expression_attribute_names("#list", list)
            .expression_attribute_names("#pk", record.hash_key)
            .expression_attribute_values(":empty", AttributeValue::L(Vec::new()))
            .expression_attribute_values(":value", AttributeValue::L(vec![value]))
            .send()
            .await
            .map_err(|e| map_update_error(e, operation, record.entity_type, record.id))?;

        Ok(())
    }

    /// Removes `list[index]` if it still equals `expected`.
    async fn remove_at(
        &self,
        record: Record<'_>,
        list: &str,
        index: usize,
        expected: AttributeValue,
        operation: &'static str,
    ) -> Result<()> {
        self.client
            .update_item()
            .table_name(record.table)
            .set_key(Some(record.key))
            .update_expression(format!("REMOVE #list[{index}]"))
            .condition_expression(format!("#list[{index}] = :expected"))
            .expression_attribute_names("#list", list)
            .expression_attribute_values(":expected", expected)
            .send()
            .await
            .map_err(|e| map_guarded_update_error(e, operation, record.entity_type, record.id))?;

        Ok(())
    }

    /// Runs `SET`/`ADD` expressions on an existing record.
    async fn update_existing(
        &self,
        record: Record<'_>,
        expression: &str,
        names: HashMap<String, String>,
        values: HashMap<String, AttributeValue>,
        operation: &'static str,
    ) -> Result<()> {
        self.client
            .update_item()
            .table_name(record.table)
            .set_key(Some(record.key))
            .update_expression(expression)
            .condition_expression("attribute_exists(#pk)")
            .set_expression_attribute_names(Some(names))
            .expression_attribute_names("#pk", record.hash_key)
            .set_expression_attribute_values(Some(values))
            .send()
            .await
            .map_err(|e| map_update_error(e, operation, record.entity_type, record.id))?;

        Ok(())
    }

    /// Scans a whole table with a filter, following `LastEvaluatedKey`.
    async fn scan_all(
        &self,
        table: &str,
        filter: &str,
        names: HashMap<String, String>,
        values: HashMap<String, AttributeValue>,
        operation: &'static str,
    ) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut start_key = None;

        loop {
            let result = self
                .client
                .scan()
                .table_name(table)
                .filter_expression(filter)
                .set_expression_attribute_names(Some(names.clone()))
                .set_expression_attribute_values(Some(values.clone()))
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| map_read_error(e, operation))?;

            items.extend(result.items.unwrap_or_default());
            match result.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn load_user(&self, user_id: &str) -> Result<User> {
        self.get_user(user_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity_type: "User",
                id: user_id.to_string(),
            })
    }

    async fn load_listing(&self, key: &ListingKey) -> Result<Listing> {
        self.get_listing(key)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity_type: "Listing",
                id: key.to_string(),
            })
    }

    /// Removes the first listing reference equal to `listing` from a user list.
    async fn remove_user_listing_ref(
        &self,
        user_id: &str,
        list: &str,
        listing: &ListingKey,
        operation: &'static str,
    ) -> Result<bool> {
        let user = self.load_user(user_id).await?;
        let current = if list == SAVED_LISTINGS {
            &user.saved_listings
        } else {
            &user.active_listings
        };
        let Some(index) = find_first_index(current, listing) else {
            return Ok(false);
        };

        self.remove_at(
            self.user_record(user_id),
            list,
            index,
            listing_ref_to_value(listing),
            operation,
        )
        .await?;
        Ok(true)
    }

    /// Removes the first string equal to `value` from a listing list attribute.
    async fn remove_listing_value(
        &self,
        key: &ListingKey,
        list: &str,
        value: &str,
        operation: &'static str,
    ) -> Result<bool> {
        let listing = self.load_listing(key).await?;
        let current = if list == TAGS {
            &listing.tags
        } else {
            &listing.pictures
        };
        let Some(index) = find_first_index(current, &value.to_string()) else {
            return Ok(false);
        };

        self.remove_at(
            self.listing_record(key),
            list,
            index,
            AttributeValue::S(value.to_string()),
            operation,
        )
        .await?;
        Ok(true)
    }

    /// Appends to the saved list only if it still has the length just read.
    ///
    /// This stops two concurrent saves of the same listing from both landing.
    /// A concurrent save of a different listing also trips the guard and
    /// surfaces as `Conflict`, which the caller retries after a fresh read.
    async fn try_add_saved_listing(&self, user_id: &str, listing: &ListingKey) -> Result<bool> {
        let user = self.load_user(user_id).await?;
        if user.saved_listings.contains(listing) {
            return Ok(false);
        }

        let record = self.user_record(user_id);
        self.client
            .update_item()
            .table_name(record.table)
            .set_key(Some(record.key))
            .update_expression("SET #list = list_append(if_not_exists(#list, :empty), :value)")
            .condition_expression(
                "attribute_exists(#pk) AND (attribute_not_exists(#list) OR size(#list) = :len)",
            )
            .expression_attribute_names("#list", SAVED_LISTINGS)
            .expression_attribute_names("#pk", USER_ID)
            .expression_attribute_values(":empty", AttributeValue::L(Vec::new()))
            .expression_attribute_values(":value", AttributeValue::L(vec![listing_ref_to_value(listing)]))
            .expression_attribute_values(
                ":len",
                AttributeValue::N(user.saved_listings.len().to_string()),
            )
            .send()
            .await
            .map_err(|e| map_guarded_update_error(e, "add_saved_listing", "User", user_id))?;

        Ok(true)
    }

    /// Fetches one chunk of keys, retrying unprocessed keys with backoff.
    async fn batch_get_chunk(&self, keys: Vec<Item>) -> Result<Vec<Item>> {
        let mut found = Vec::new();
        let mut pending = keys;
        let mut attempt = 0;

        while !pending.is_empty() {
            if attempt == BATCH_GET_MAX_ATTEMPTS {
                return Err(RepositoryError::Throttled {
                    code: "UnprocessedKeys".to_string(),
                });
            }
            if attempt > 0 {
                tokio::time::sleep(BATCH_GET_BASE_DELAY * 2u32.pow(attempt - 1)).await;
            }
            attempt += 1;

            let request = KeysAndAttributes::builder()
                .set_keys(Some(pending))
                .build()
                .map_err(|e| RepositoryError::InvalidData(e.to_string()))?;

            let result = self
                .client
                .batch_get_item()
                .request_items(&self.tables.listings, request)
                .send()
                .await
                .map_err(|e| map_read_error(e, "get_listings_by_keys"))?;

            if let Some(mut responses) = result.responses {
                found.extend(responses.remove(&self.tables.listings).unwrap_or_default());
            }
            pending = result
                .unprocessed_keys
                .and_then(|mut unprocessed| unprocessed.remove(&self.tables.listings))
                .map(|remaining| remaining.keys().to_vec())
                .unwrap_or_default();

            if !pending.is_empty() {
                tracing::debug!(remaining = pending.len(), attempt, "Retrying unprocessed keys");
            }
        }

        Ok(found)
    }
}

// ============================================================================
// UserRepository implementation
// ============================================================================

#[async_trait]
impl UserRepository for DynamoDbRepository {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let item = self
            .get_item(&self.tables.users, user_key(user_id), "get_user")
            .await?;

        item.as_ref().map(item_to_user).transpose()
    }

    async fn create_user(&self, user: &User) -> Result<()> {
        self.put_new_item(
            self.user_record(&user.user_id),
            user_to_item(user),
            "create_user",
        )
        .await
    }

    async fn search_users_by_name(&self, name: &str) -> Result<Vec<User>> {
        let items = self
            .scan_all(
                &self.tables.users,
                "contains(#search, :name)",
                HashMap::from([("#search".to_string(), SEARCH_NAME.to_string())]),
                HashMap::from([(
                    ":name".to_string(),
                    AttributeValue::S(normalize_search_text(name)),
                )]),
                "search_users_by_name",
            )
            .await?;

        items.iter().map(item_to_user).collect()
    }

    async fn search_users_by_email(&self, email: &str) -> Result<Vec<User>> {
        let items = self
            .scan_all(
                &self.tables.users,
                "#email = :email",
                HashMap::from([("#email".to_string(), "email".to_string())]),
                HashMap::from([(":email".to_string(), AttributeValue::S(email.to_string()))]),
                "search_users_by_email",
            )
            .await?;

        items.iter().map(item_to_user).collect()
    }

    async fn update_profile_field(
        &self,
        user_id: &str,
        field: ProfileField,
        value: &str,
    ) -> Result<()> {
        let mut names = HashMap::from([("#field".to_string(), field.attribute().to_string())]);
        let mut values = HashMap::from([(":value".to_string(), AttributeValue::S(value.to_string()))]);
        let expression = if field == ProfileField::Name {
            names.insert("#search".to_string(), SEARCH_NAME.to_string());
            values.insert(
                ":search".to_string(),
                AttributeValue::S(normalize_search_text(value)),
            );
            "SET #field = :value, #search = :search"
        } else {
            "SET #field = :value"
        };

        self.update_existing(
            self.user_record(user_id),
            expression,
            names,
            values,
            "update_profile_field",
        )
        .await
    }

    async fn add_rating(&self, user_id: &str, rating: f64) -> Result<()> {
        self.update_existing(
            self.user_record(user_id),
            "ADD #total :rating, #count :one",
            HashMap::from([
                ("#total".to_string(), RATING_TOTAL.to_string()),
                ("#count".to_string(), RATING_COUNT.to_string()),
            ]),
            HashMap::from([
                (":rating".to_string(), AttributeValue::N(rating.to_string())),
                (":one".to_string(), AttributeValue::N("1".to_string())),
            ]),
            "add_rating",
        )
        .await
    }

    async fn add_saved_listing(&self, user_id: &str, listing: &ListingKey) -> Result<bool> {
        retry_on_conflict(SAVED_LISTING_ATTEMPTS, || {
            self.try_add_saved_listing(user_id, listing)
        })
        .await
    }

    async fn remove_saved_listing(&self, user_id: &str, listing: &ListingKey) -> Result<bool> {
        self.remove_user_listing_ref(user_id, SAVED_LISTINGS, listing, "remove_saved_listing")
            .await
    }

    async fn add_active_listing(&self, user_id: &str, listing: &ListingKey) -> Result<()> {
        self.append(
            self.user_record(user_id),
            ACTIVE_LISTINGS,
            listing_ref_to_value(listing),
            "add_active_listing",
        )
        .await
    }

    async fn remove_active_listing(&self, user_id: &str, listing: &ListingKey) -> Result<bool> {
        self.remove_user_listing_ref(user_id, ACTIVE_LISTINGS, listing, "remove_active_listing")
            .await
    }

    async fn add_listing_to_rate(&self, user_id: &str, entry: &ListingToRate) -> Result<()> {
        self.append(
            self.user_record(user_id),
            LISTINGS_TO_RATE,
            listing_to_rate_to_value(entry),
            "add_listing_to_rate",
        )
        .await
    }

    async fn remove_listing_to_rate(&self, user_id: &str, listing: &ListingKey) -> Result<bool> {
        let user = self.load_user(user_id).await?;
        let Some(index) = user
            .listings_to_rate
            .iter()
            .position(|entry| entry.refers_to(listing))
        else {
            return Ok(false);
        };

        self.remove_at(
            self.user_record(user_id),
            LISTINGS_TO_RATE,
            index,
            listing_to_rate_to_value(&user.listings_to_rate[index]),
            "remove_listing_to_rate",
        )
        .await?;
        Ok(true)
    }
}

// ============================================================================
// ListingRepository implementation
// ============================================================================

#[async_trait]
impl ListingRepository for DynamoDbRepository {
    async fn create_listing(&self, listing: &Listing) -> Result<()> {
        self.put_new_item(
            self.listing_record(&listing.key()),
            listing_to_item(listing),
            "create_listing",
        )
        .await
    }

    async fn list_listings(&self, page: PageRequest) -> Result<Page<Listing>> {
        let start_key = page
            .start
            .as_ref()
            .map(|token| token.to_key().map(|key| listing_key(&key)))
            .transpose()?;

        let result = self
            .client
            .scan()
            .table_name(&self.tables.listings)
            .set_limit(page.limit.map(|l| l.min(i32::MAX as u32) as i32))
            .set_exclusive_start_key(start_key)
            .send()
            .await
            .map_err(|e| map_read_error(e, "list_listings"))?;

        let items = result
            .items
            .unwrap_or_default()
            .iter()
            .map(item_to_listing)
            .collect::<Result<Vec<_>>>()?;
        let next_key = match result.last_evaluated_key {
            Some(key) if !key.is_empty() => {
                Some(ContinuationToken::from_key(&item_to_listing_key(&key)?)?)
            }
            _ => None,
        };

        Ok(Page { items, next_key })
    }

    async fn get_listings_by_keys(&self, keys: &[ListingKey]) -> Result<Vec<Listing>> {
        let unique: BTreeSet<&ListingKey> = keys.iter().collect();
        let unique: Vec<Item> = unique.into_iter().map(listing_key).collect();

        let mut listings = Vec::with_capacity(unique.len());
        for chunk in unique.chunks(BATCH_GET_LIMIT) {
            for item in self.batch_get_chunk(chunk.to_vec()).await? {
                listings.push(item_to_listing(&item)?);
            }
        }

        Ok(listings)
    }

    async fn get_listing(&self, key: &ListingKey) -> Result<Option<Listing>> {
        let item = self
            .get_item(&self.tables.listings, listing_key(key), "get_listing")
            .await?;

        item.as_ref().map(item_to_listing).transpose()
    }

    async fn search_listings(&self, term: &str) -> Result<Vec<Listing>> {
        let items = self
            .scan_all(
                &self.tables.listings,
                "contains(#search, :term)",
                HashMap::from([("#search".to_string(), SEARCH_TITLE.to_string())]),
                HashMap::from([(
                    ":term".to_string(),
                    AttributeValue::S(normalize_search_text(term)),
                )]),
                "search_listings",
            )
            .await?;

        items.iter().map(item_to_listing).collect()
    }

    async fn mark_sold(&self, key: &ListingKey, buyer_id: &str) -> Result<()> {
        self.update_existing(
            self.listing_record(key),
            "SET #sold = :sold, #soldTo = :buyer",
            HashMap::from([
                ("#sold".to_string(), "sold".to_string()),
                ("#soldTo".to_string(), "soldTo".to_string()),
            ]),
            HashMap::from([
                (":sold".to_string(), AttributeValue::Bool(true)),
                (":buyer".to_string(), AttributeValue::S(buyer_id.to_string())),
            ]),
            "mark_sold",
        )
        .await
    }

    async fn increment_saved_count(&self, key: &ListingKey) -> Result<()> {
        self.update_existing(
            self.listing_record(key),
            "ADD #count :one",
            HashMap::from([("#count".to_string(), SAVED_COUNT.to_string())]),
            HashMap::from([(":one".to_string(), AttributeValue::N("1".to_string()))]),
            "increment_saved_count",
        )
        .await
    }

    async fn decrement_saved_count(&self, key: &ListingKey) -> Result<()> {
        let record = self.listing_record(key);
        let result = self
            .client
            .update_item()
            .table_name(record.table)
            .set_key(Some(record.key))
            .update_expression("ADD #count :minus_one")
            .condition_expression("attribute_exists(#pk) AND #count > :zero")
            .expression_attribute_names("#count", SAVED_COUNT)
            .expression_attribute_names("#pk", LISTING_ID)
            .expression_attribute_values(":minus_one", AttributeValue::N("-1".to_string()))
            .expression_attribute_values(":zero", AttributeValue::N("0".to_string()))
            .send()
            .await;

        let Err(e) = result else {
            return Ok(());
        };
        let error = map_guarded_update_error(e, "decrement_saved_count", "Listing", key.to_string());
        // The condition also fails for a missing listing; tell the two apart.
        if matches!(error, RepositoryError::Conflict { .. }) && self.get_listing(key).await?.is_none() {
            return Err(RepositoryError::NotFound {
                entity_type: "Listing",
                id: key.to_string(),
            });
        }
        Err(error)
    }

    async fn add_tag(&self, key: &ListingKey, tag: &str) -> Result<()> {
        self.append(
            self.listing_record(key),
            TAGS,
            AttributeValue::S(tag.to_string()),
            "add_tag",
        )
        .await
    }

    async fn remove_tag(&self, key: &ListingKey, tag: &str) -> Result<bool> {
        self.remove_listing_value(key, TAGS, tag, "remove_tag").await
    }

    async fn add_picture(&self, key: &ListingKey, picture: &str) -> Result<()> {
        self.append(
            self.listing_record(key),
            PICTURES,
            AttributeValue::S(picture.to_string()),
            "add_picture",
        )
        .await
    }

    async fn remove_picture(&self, key: &ListingKey, picture: &str) -> Result<bool> {
        self.remove_listing_value(key, PICTURES, picture, "remove_picture")
            .await
    }

    async fn delete_listing(&self, key: &ListingKey) -> Result<()> {
        self.client
            .delete_item()
            .table_name(&self.tables.listings)
            .set_key(Some(listing_key(key)))
            .send()
            .await
            .map_err(|e| map_read_error(e, "delete_listing"))?;

        Ok(())
    }
}

// ============================================================================
// TagRepository implementation
// ============================================================================

#[async_trait]
impl TagRepository for DynamoDbRepository {
    async fn get_tag(&self, name: &str) -> Result<Option<Tag>> {
        let item = self
            .get_item(&self.tables.tags, tag_key(name), "get_tag")
            .await?;

        item.as_ref().map(item_to_tag).transpose()
    }

    async fn create_tag(&self, name: &str) -> Result<()> {
        self.put_new_item(self.tag_record(name), new_tag_item(name), "create_tag")
            .await
    }

    async fn add_listing(&self, name: &str, listing: &ListingKey) -> Result<()> {
        self.append(
            self.tag_record(name),
            TAG_LISTINGS,
            listing_ref_to_value(listing),
            "add_tag_listing",
        )
        .await
    }

    async fn remove_listing(&self, name: &str, listing: &ListingKey) -> Result<bool> {
        let Some(tag) = self.get_tag(name).await? else {
            return Ok(false);
        };
        let Some(index) = find_first_index(&tag.listings, listing) else {
            return Ok(false);
        };

        self.remove_at(
            self.tag_record(name),
            TAG_LISTINGS,
            index,
            listing_ref_to_value(listing),
            "remove_tag_listing",
        )
        .await?;
        Ok(true)
    }

    async fn delete_tag_if_empty(&self, name: &str) -> Result<bool> {
        let result = self
            .client
            .delete_item()
            .table_name(&self.tables.tags)
            .set_key(Some(tag_key(name)))
            .condition_expression(
                "attribute_exists(#pk) AND (attribute_not_exists(#list) OR size(#list) = :zero)",
            )
            .expression_attribute_names("#pk", TAG_NAME)
            .expression_attribute_names("#list", TAG_LISTINGS)
            .expression_attribute_values(":zero", AttributeValue::N("0".to_string()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => match map_guarded_update_error(e, "delete_tag_if_empty", "Tag", name) {
                RepositoryError::Conflict { .. } => Ok(false),
                other => Err(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn config() -> Config {
        Config {
            users_table: "u".to_string(),
            listings_table: "l".to_string(),
            tags_table: "t".to_string(),
            dynamodb_endpoint: Some("http://localhost:8000".to_string()),
            cors_allowed_origin: "http://localhost".to_string(),
            request_timeout_seconds: 1,
            default_page_size: 20,
            max_page_size: 100,
        }
    }

    fn conflict() -> RepositoryError {
        RepositoryError::Conflict {
            entity_type: "User",
            id: "u1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_conflict_is_retried_until_success() {
        let calls = AtomicU32::new(0);

        let result = retry_on_conflict(3, || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call == 0 {
                    Err(conflict())
                } else {
                    Ok(call)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_conflict_retries_are_bounded() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = retry_on_conflict(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(conflict()) }
        })
        .await;

        assert_eq!(result, Err(conflict()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = retry_on_conflict(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RepositoryError::ConnectionFailed("down".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(RepositoryError::ConnectionFailed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_table_names_from_config() {
        let tables = TableNames::from_config(&config());

        assert_eq!(
            tables,
            TableNames {
                users: "u".to_string(),
                listings: "l".to_string(),
                tags: "t".to_string(),
            }
        );
    }

    fn repository() -> DynamoDbRepository {
        let sdk_config = aws_sdk_dynamodb::Config::builder()
            .behavior_version(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new("us-east-1"))
            .build();

        DynamoDbRepository::new(
            Client::from_conf(sdk_config),
            TableNames::from_config(&config()),
        )
    }

    #[test]
    fn test_records_address_the_right_tables() {
        let repo = repository();
        let key = ListingKey::new("L1", "1000");

        let listing = repo.listing_record(&key);
        assert_eq!(listing.table, "l");
        assert_eq!(listing.key, listing_key(&key));
        assert_eq!(listing.id, "L1@1000");

        let tag = repo.tag_record("furniture");
        assert_eq!(tag.table, "t");
        assert_eq!(tag.hash_key, TAG_NAME);

        assert_eq!(repo.user_record("u1").hash_key, USER_ID);
    }
}
