// Product catalog queries
// Maps listing, search and category calls onto the authenticated pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::cache::ProductQueryCache;
use crate::error::Result;
use crate::http_client::{ApiClient, ApiRequest};

pub const DEFAULT_LIMIT: u32 = 30;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
    pub depth: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub rating: f64,
    pub comment: String,
    pub date: String,
    pub reviewer_name: String,
    pub reviewer_email: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductMeta {
    pub created_at: String,
    pub updated_at: String,
    pub barcode: String,
    pub qr_code: String,
}

/// Catalog product
///
/// Only `id`, `title`, `price` and `category` are guaranteed; the API omits
/// the rest for some products or when `select` is used.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub price: f64,
    #[serde(default)]
    pub discount_percentage: f64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
    #[serde(default)]
    pub warranty_information: Option<String>,
    #[serde(default)]
    pub shipping_information: Option<String>,
    #[serde(default)]
    pub availability_status: Option<String>,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub return_policy: Option<String>,
    #[serde(default)]
    pub minimum_order_quantity: Option<u32>,
    #[serde(default)]
    pub meta: Option<ProductMeta>,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// One page of products
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProductsPage {
    pub products: Vec<Product>,
    pub total: u64,
    pub skip: u64,
    pub limit: u64,
}

/// Sortable product fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    Title,
    Price,
    Rating,
    Stock,
    Brand,
    Category,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Title => "title",
            SortField::Price => "price",
            SortField::Rating => "rating",
            SortField::Stock => "stock",
            SortField::Brand => "brand",
            SortField::Category => "category",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "title" => Ok(SortField::Title),
            "price" => Ok(SortField::Price),
            "rating" => Ok(SortField::Rating),
            "stock" => Ok(SortField::Stock),
            "brand" => Ok(SortField::Brand),
            "category" => Ok(SortField::Category),
            other => Err(format!("unknown sort field: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order: {}", other)),
        }
    }
}

/// Pagination and sorting parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageParams {
    pub skip: u32,
    pub limit: u32,
    pub sort_by: Option<SortField>,
    pub order: Option<SortOrder>,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_LIMIT,
            sort_by: None,
            order: None,
        }
    }
}

impl PageParams {
    /// Append `skip`, `limit` and the optional sort parameters
    fn apply(&self, request: ApiRequest) -> ApiRequest {
        let mut request = request
            .query("skip", self.skip)
            .query("limit", self.limit);
        if let Some(sort_by) = self.sort_by {
            request = request.query("sortBy", sort_by);
        }
        if let Some(order) = self.order {
            request = request.query("order", order);
        }
        request
    }
}

/// Which listing a query targets
///
/// A non-empty search wins over a category; blank values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub page: PageParams,
}

impl ProductFilter {
    /// Drop blank search and category values
    pub fn normalized(&self) -> Self {
        let clean = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            search: clean(&self.search),
            category: clean(&self.category),
            page: self.page,
        }
    }
}

/// Catalog API client
pub struct CatalogClient {
    api: Arc<ApiClient>,
    cache: ProductQueryCache,
}

impl CatalogClient {
    pub fn new(api: Arc<ApiClient>, cache: ProductQueryCache) -> Self {
        Self { api, cache }
    }

    pub fn cache(&self) -> &ProductQueryCache {
        &self.cache
    }

    /// GET /products
    pub async fn list_products(&self, page: PageParams) -> Result<ProductsPage> {
        let request = page.apply(ApiRequest::get("/products"));
        self.api.send_json(request).await
    }

    /// GET /products/search?q=
    pub async fn search_products(&self, q: &str, page: PageParams) -> Result<ProductsPage> {
        let request = page.apply(ApiRequest::get("/products/search").query("q", q));
        self.api.send_json(request).await
    }

    /// GET /products/category-list
    pub async fn list_categories(&self) -> Result<Vec<String>> {
        self.api
            .send_json(ApiRequest::get("/products/category-list"))
            .await
    }

    /// GET /products/category/{category}
    pub async fn list_products_by_category(
        &self,
        category: &str,
        page: PageParams,
    ) -> Result<ProductsPage> {
        let path = format!("/products/category/{}", urlencoding::encode(category));
        self.api.send_json(page.apply(ApiRequest::get(path))).await
    }

    /// GET /products/{id}
    pub async fn get_product(&self, id: u64) -> Result<Product> {
        self.api
            .send_json(ApiRequest::get(format!("/products/{}", id)))
            .await
    }

    /// Run the listing selected by the filter
    pub async fn query(&self, filter: &ProductFilter) -> Result<ProductsPage> {
        let filter = filter.normalized();
        if let Some(q) = &filter.search {
            return self.search_products(q, filter.page).await;
        }
        if let Some(category) = &filter.category {
            return self.list_products_by_category(category, filter.page).await;
        }
        self.list_products(filter.page).await
    }

    /// Like `query`, but answers from the cache while the entry is fresh
    pub async fn query_cached(&self, filter: &ProductFilter) -> Result<ProductsPage> {
        let key = filter.normalized();
        if let Some(page) = self.cache.get(&key) {
            tracing::debug!(?key, "Product query served from cache");
            return Ok(page);
        }

        let page = self.query(&key).await?;
        self.cache.insert(key, page.clone());
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthManager;
    use crate::http_client::ApiResponse;
    use crate::testing::{FakeAuthApi, FakeTransport};
    use serde_json::json;
    use tokio_test::block_on;

    fn page_body() -> serde_json::Value {
        json!({
            "products": [{
                "id": 1,
                "title": "Essence Mascara Lash Princess",
                "category": "beauty",
                "price": 9.99,
                "discountPercentage": 7.17,
                "thumbnail": "https://cdn.dummyjson.com/products/images/beauty/1/thumbnail.png"
            }],
            "total": 194,
            "skip": 0,
            "limit": 30
        })
    }

    fn catalog() -> (CatalogClient, Arc<FakeTransport>) {
        let transport = Arc::new(FakeTransport::new(|request| {
            Ok(ApiResponse {
                status: 200,
                body: if request.path == "/products/category-list" {
                    json!(["beauty", "fragrances"])
                } else {
                    page_body()
                },
            })
        }));
        let auth = Arc::new(AuthManager::new(Arc::new(FakeAuthApi::new())));
        let api = Arc::new(ApiClient::new(transport.clone(), auth));
        (CatalogClient::new(api, ProductQueryCache::default()), transport)
    }

    fn query_of(request: &ApiRequest) -> Vec<(&str, &str)> {
        request
            .query
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    #[test]
    fn test_sort_parsing() {
        assert_eq!("price".parse::<SortField>().unwrap(), SortField::Price);
        assert_eq!("Brand".parse::<SortField>().unwrap(), SortField::Brand);
        assert!("weight".parse::<SortField>().is_err());
        assert_eq!("DESC".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert!("up".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_list_products_default_params() {
        let (catalog, transport) = catalog();
        let page = block_on(catalog.list_products(PageParams::default())).unwrap();
        assert_eq!(page.total, 194);
        assert_eq!(page.products[0].brand, None);

        let requests = transport.requests();
        assert_eq!(requests[0].path, "/products");
        assert_eq!(query_of(&requests[0]), vec![("skip", "0"), ("limit", "30")]);
    }

    #[test]
    fn test_search_with_sorting() {
        let (catalog, transport) = catalog();
        let page = PageParams {
            skip: 10,
            limit: 5,
            sort_by: Some(SortField::Price),
            order: Some(SortOrder::Desc),
        };
        block_on(catalog.search_products("phone", page)).unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].path, "/products/search");
        assert_eq!(
            query_of(&requests[0]),
            vec![
                ("q", "phone"),
                ("skip", "10"),
                ("limit", "5"),
                ("sortBy", "price"),
                ("order", "desc")
            ]
        );
    }

    #[test]
    fn test_category_path_is_encoded() {
        let (catalog, transport) = catalog();
        block_on(catalog.list_products_by_category("home decoration", PageParams::default()))
            .unwrap();
        assert_eq!(
            transport.requests()[0].path,
            "/products/category/home%20decoration"
        );
    }

    #[test]
    fn test_list_categories() {
        let (catalog, _) = catalog();
        let categories = block_on(catalog.list_categories()).unwrap();
        assert_eq!(categories, vec!["beauty", "fragrances"]);
    }

    #[test]
    fn test_query_selects_endpoint() {
        let (catalog, transport) = catalog();

        let filter = ProductFilter {
            search: Some("phone".to_string()),
            category: Some("smartphones".to_string()),
            page: PageParams::default(),
        };
        block_on(catalog.query(&filter)).unwrap();

        let filter = ProductFilter {
            search: Some("  ".to_string()),
            category: Some("smartphones".to_string()),
            page: PageParams::default(),
        };
        block_on(catalog.query(&filter)).unwrap();

        block_on(catalog.query(&ProductFilter::default())).unwrap();

        let paths: Vec<String> = transport.requests().into_iter().map(|r| r.path).collect();
        assert_eq!(
            paths,
            vec!["/products/search", "/products/category/smartphones", "/products"]
        );
    }

    #[test]
    fn test_query_cached_reuses_fresh_page() {
        let (catalog, transport) = catalog();
        let filter = ProductFilter {
            search: Some("phone".to_string()),
            ..Default::default()
        };

        block_on(catalog.query_cached(&filter)).unwrap();
        block_on(catalog.query_cached(&filter)).unwrap();
        assert_eq!(transport.requests().len(), 1);

        catalog.cache().invalidate_all();
        block_on(catalog.query_cached(&filter)).unwrap();
        assert_eq!(transport.requests().len(), 2);
    }
}
