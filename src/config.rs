use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;

use crate::catalog::{PageParams, ProductFilter, SortField, SortOrder};

/// Catalog Client - authenticated product catalog queries
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Catalog API base URL
    #[arg(short = 'u', long, env = "API_BASE_URL", default_value = "https://dummyjson.com/")]
    pub base_url: String,

    /// HTTP request timeout in milliseconds
    #[arg(long, env = "HTTP_TIMEOUT_MS", default_value = "15000")]
    pub timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Username to sign in with
    #[arg(long, env = "CATALOG_USERNAME")]
    pub username: Option<String>,

    /// Password to sign in with
    #[arg(long, env = "CATALOG_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Cart file (JSON)
    #[arg(long, env = "CART_FILE")]
    pub cart_file: Option<String>,

    /// Search text
    #[arg(short = 'q', long)]
    pub search: Option<String>,

    /// Category to list
    #[arg(short = 'c', long)]
    pub category: Option<String>,

    /// Items to skip
    #[arg(long, default_value = "0")]
    pub skip: u32,

    /// Page size
    #[arg(short = 'l', long, default_value = "30")]
    pub limit: u32,

    /// Sort field (title, price, rating, stock, brand, category)
    #[arg(long)]
    pub sort_by: Option<String>,

    /// Sort order (asc, desc)
    #[arg(long)]
    pub order: Option<String>,

    /// List categories instead of products
    #[arg(long)]
    pub categories: bool,

    /// Add the first product of the result page to the cart
    #[arg(long)]
    pub add_first_to_cart: bool,
}

/// Log line format
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Clone, Debug)]
pub struct Config {
    // API
    pub base_url: String,
    pub http_timeout: Duration,

    // Credentials
    pub username: Option<String>,
    pub password: Option<String>,

    // Logging
    pub log_level: String,
    pub log_format: LogFormat,

    // Cart
    pub cart_file: Option<PathBuf>,

    // Query
    pub filter: ProductFilter,
    pub list_categories: bool,
    pub add_first_to_cart: bool,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_args(CliArgs::parse())
    }

    /// Build configuration from parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let sort_by = args
            .sort_by
            .as_deref()
            .map(str::parse::<SortField>)
            .transpose()
            .map_err(anyhow::Error::msg)
            .context("Invalid --sort-by")?;

        let order = args
            .order
            .as_deref()
            .map(str::parse::<SortOrder>)
            .transpose()
            .map_err(anyhow::Error::msg)
            .context("Invalid --order")?;

        Ok(Config {
            base_url: args.base_url,
            http_timeout: Duration::from_millis(args.timeout_ms),
            username: args.username.filter(|u| !u.is_empty()),
            password: args.password,
            log_level: args.log_level,
            log_format: args.log_format,
            cart_file: args.cart_file.map(|s| expand_tilde(&s)),
            filter: ProductFilter {
                search: args.search,
                category: args.category,
                page: PageParams {
                    skip: args.skip,
                    limit: args.limit,
                    sort_by,
                    order,
                },
            },
            list_categories: args.categories,
            add_first_to_cart: args.add_first_to_cart,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.base_url)
            .with_context(|| format!("API_BASE_URL is not a valid URL: {}", self.base_url))?;

        if self.http_timeout.is_zero() {
            anyhow::bail!("HTTP_TIMEOUT_MS must be greater than zero");
        }

        if self.filter.page.limit == 0 {
            anyhow::bail!("--limit must be greater than zero");
        }

        if self.username.is_some() && self.password.is_none() {
            anyhow::bail!("CATALOG_PASSWORD is required when CATALOG_USERNAME is set");
        }

        if self.add_first_to_cart && self.cart_file.is_none() {
            anyhow::bail!("--add-first-to-cart requires CART_FILE (use --cart-file)");
        }

        Ok(())
    }
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["catalog-client"];
        argv.extend_from_slice(args);
        Config::from_args(CliArgs::try_parse_from(argv).unwrap()).unwrap()
    }

    #[test]
    fn test_expand_tilde() {
        let path = expand_tilde("~/test/cart.json");
        assert!(path.to_string_lossy().contains("test/cart.json"));
        assert!(!path.to_string_lossy().starts_with("~"));

        let path = expand_tilde("/absolute/path");
        assert_eq!(path, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_tilde_just_tilde() {
        // Just "~" without slash should not expand
        let path = expand_tilde("~");
        assert_eq!(path, PathBuf::from("~"));
    }

    #[test]
    fn test_query_flags() {
        let config = parse(&[
            "--search", "phone", "--skip", "10", "--limit", "5", "--sort-by", "price", "--order",
            "desc",
        ]);
        assert_eq!(config.filter.search.as_deref(), Some("phone"));
        assert_eq!(config.filter.page.skip, 10);
        assert_eq!(config.filter.page.limit, 5);
        assert_eq!(config.filter.page.sort_by, Some(SortField::Price));
        assert_eq!(config.filter.page.order, Some(SortOrder::Desc));
    }

    #[test]
    fn test_log_format() {
        assert_eq!(parse(&[]).log_format, LogFormat::Text);
        assert_eq!(parse(&["--log-format", "json"]).log_format, LogFormat::Json);
        assert!(CliArgs::try_parse_from(["catalog-client", "--log-format", "xml"]).is_err());
    }

    #[test]
    fn test_invalid_sort_is_rejected() {
        let args =
            CliArgs::try_parse_from(["catalog-client", "--sort-by", "weight"]).unwrap();
        assert!(Config::from_args(args).is_err());
    }

    #[test]
    fn test_validate() {
        let mut config = parse(&["--base-url", "http://localhost:1234"]);
        assert!(config.validate().is_ok());

        config.filter.page.limit = 0;
        assert!(config.validate().is_err());
        config.filter.page.limit = 30;

        config.username = Some("emilys".to_string());
        config.password = None;
        assert!(config.validate().is_err());
        config.password = Some("emilyspass".to_string());
        assert!(config.validate().is_ok());

        config.add_first_to_cart = true;
        assert!(config.validate().is_err());

        config.base_url = "not a url".to_string();
        config.add_first_to_cart = false;
        assert!(config.validate().is_err());
    }
}
