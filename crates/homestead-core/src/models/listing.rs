//! Property listing models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Identity;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[default]
    Active,
    Pending,
    Sold,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Pending => "pending",
            ListingStatus::Sold => "sold",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ListingStatus::Active => "Active",
            ListingStatus::Pending => "Pending",
            ListingStatus::Sold => "Sold",
        }
    }
}

impl std::str::FromStr for ListingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(ListingStatus::Active),
            "pending" => Ok(ListingStatus::Pending),
            "sold" => Ok(ListingStatus::Sold),
            other => Err(format!("unknown listing status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingImage {
    pub id: i64,
    pub image_url: String,
}

/// A property listing as served by the API.
///
/// `price` and `bathrooms` are decimal strings (`"350000.00"`, `"1.5"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: i64,
    #[serde(default)]
    pub owner: Option<i64>,
    #[serde(default)]
    pub owner_username: Option<String>,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub price: String,
    pub bedrooms: u32,
    pub bathrooms: String,
    pub size: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ListingStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub images: Vec<ListingImage>,
}

impl Listing {
    pub fn price_value(&self) -> Option<f64> {
        self.price.parse().ok()
    }

    pub fn bathrooms_value(&self) -> Option<f64> {
        self.bathrooms.parse().ok()
    }

    /// Street address with city and state on one line.
    pub fn full_address(&self) -> String {
        let mut parts = vec![self.address.clone()];
        if !self.city.is_empty() {
            parts.push(self.city.clone());
        }
        let state_zip = format!("{} {}", self.state, self.zip_code);
        if !state_zip.trim().is_empty() {
            parts.push(state_zip.trim().to_string());
        }
        parts.join(", ")
    }

    pub fn is_owned_by(&self, identity: &Identity) -> bool {
        self.owner == Some(identity.id)
    }

    pub fn image_urls(&self) -> Vec<String> {
        self.images.iter().map(|i| i.image_url.clone()).collect()
    }
}

/// Body for creating or replacing a listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingDraft {
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub price: f64,
    pub bedrooms: u32,
    pub bathrooms: f64,
    pub size: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ListingStatus,
    /// New image URLs. When present they replace the listing's images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
}

impl ListingDraft {
    /// Draft pre-filled from an existing listing, for editing.
    /// Images are left untouched unless `image_urls` is set afterwards.
    pub fn from_listing(listing: &Listing) -> Self {
        Self {
            address: listing.address.clone(),
            city: listing.city.clone(),
            state: listing.state.clone(),
            zip_code: listing.zip_code.clone(),
            price: listing.price_value().unwrap_or_default(),
            bedrooms: listing.bedrooms,
            bathrooms: listing.bathrooms_value().unwrap_or_default(),
            size: listing.size,
            description: listing.description.clone(),
            status: listing.status,
            image_urls: None,
        }
    }
}

/// Search filters for the listings endpoint. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFilter {
    /// Substring of address, city or state
    pub location: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_size: Option<u32>,
    pub max_size: Option<u32>,
    /// Minimum number of bedrooms
    pub bedrooms: Option<u32>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub status: Option<ListingStatus>,
}

impl ListingFilter {
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        let mut push = |key: &str, value: Option<String>| {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                query.push((key.to_string(), value));
            }
        };

        push("location", self.location.clone());
        push("min_price", self.min_price.map(|v| v.to_string()));
        push("max_price", self.max_price.map(|v| v.to_string()));
        push("min_size", self.min_size.map(|v| v.to_string()));
        push("max_size", self.max_size.map(|v| v.to_string()));
        push("bedrooms", self.bedrooms.map(|v| v.to_string()));
        push("city", self.city.clone());
        push("state", self.state.clone());
        push("zip_code", self.zip_code.clone());
        push("status", self.status.map(|s| s.as_str().to_string()));
        query
    }

    pub fn is_empty(&self) -> bool {
        self.to_query().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING_JSON: &str = r#"{
        "id": 12,
        "owner": 3,
        "owner_username": "alice",
        "address": "12 Elm St",
        "city": "Springfield",
        "state": "IL",
        "zip_code": "62701",
        "price": "350000.00",
        "bedrooms": 3,
        "bathrooms": "1.5",
        "size": 1800,
        "description": null,
        "status": "pending",
        "created_at": "2024-05-01T12:00:00Z",
        "updated_at": "2024-05-02T08:30:00Z",
        "images": [{"id": 1, "image_url": "https://cdn.test/a.jpg"}]
    }"#;

    #[test]
    fn test_parse_listing() {
        let listing: Listing = serde_json::from_str(LISTING_JSON).unwrap();
        assert_eq!(listing.id, 12);
        assert_eq!(listing.status, ListingStatus::Pending);
        assert_eq!(listing.price_value(), Some(350000.0));
        assert_eq!(listing.bathrooms_value(), Some(1.5));
        assert_eq!(listing.full_address(), "12 Elm St, Springfield, IL 62701");
        assert_eq!(listing.image_urls(), vec!["https://cdn.test/a.jpg".to_string()]);
    }

    #[test]
    fn test_parse_minimal_listing() {
        // The trimmed serializer omits owner, images and timestamps
        let json = r#"{"id": 1, "address": "1 Main", "city": "X", "state": "Y",
            "zip_code": "1", "price": "10.00", "bedrooms": 1, "bathrooms": "1.0",
            "size": 500, "status": "active"}"#;
        let listing: Listing = serde_json::from_str(json).unwrap();
        assert_eq!(listing.owner, None);
        assert!(listing.images.is_empty());
    }

    #[test]
    fn test_ownership() {
        let listing: Listing = serde_json::from_str(LISTING_JSON).unwrap();
        let mut identity = Identity {
            id: 3,
            email: "a@b.com".to_string(),
            username: None,
            expires_at: None,
        };
        assert!(listing.is_owned_by(&identity));
        identity.id = 4;
        assert!(!listing.is_owned_by(&identity));
    }

    #[test]
    fn test_draft_serialization() {
        let listing: Listing = serde_json::from_str(LISTING_JSON).unwrap();
        let mut draft = ListingDraft::from_listing(&listing);
        assert_eq!(draft.price, 350000.0);

        let value = serde_json::to_value(&draft).unwrap();
        assert!(value.get("image_urls").is_none());
        assert_eq!(value["status"], "pending");

        draft.image_urls = Some(vec!["https://cdn.test/b.jpg".to_string()]);
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["image_urls"][0], "https://cdn.test/b.jpg");
    }

    #[test]
    fn test_filter_query() {
        assert!(ListingFilter::default().is_empty());

        let filter = ListingFilter {
            location: Some("spring".to_string()),
            max_price: Some(400000.0),
            bedrooms: Some(2),
            city: Some("  ".to_string()),
            status: Some(ListingStatus::Active),
            ..Default::default()
        };
        assert_eq!(
            filter.to_query(),
            vec![
                ("location".to_string(), "spring".to_string()),
                ("max_price".to_string(), "400000".to_string()),
                ("bedrooms".to_string(), "2".to_string()),
                ("status".to_string(), "active".to_string()),
            ]
        );
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("SOLD".parse::<ListingStatus>(), Ok(ListingStatus::Sold));
        assert!("rented".parse::<ListingStatus>().is_err());
    }
}
