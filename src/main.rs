use anyhow::{Context, Result};
use std::sync::Arc;

use catalog_client::auth::{AuthManager, HttpAuthApi};
use catalog_client::cache::ProductQueryCache;
use catalog_client::cart::{Cart, CartItem};
use catalog_client::catalog::CatalogClient;
use catalog_client::config::{Config, LogFormat};
use catalog_client::http_client::{ApiClient, ReqwestTransport, Transport};
use catalog_client::navigation::{self, Navigation};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let config = Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }

    tracing::info!("Catalog client starting against {}", config.base_url);

    let transport: Arc<dyn Transport> =
        Arc::new(ReqwestTransport::new(&config.base_url, config.http_timeout)?);
    let auth_manager = Arc::new(AuthManager::new(Arc::new(HttpAuthApi::new(
        transport.clone(),
    ))));
    let api = Arc::new(ApiClient::new(transport, auth_manager.clone()));
    let catalog = CatalogClient::new(api, ProductQueryCache::default());

    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        match auth_manager.sign_in(username, password).await {
            Ok(()) => {
                let name = auth_manager
                    .user()
                    .await
                    .map(|u| u.display_name())
                    .unwrap_or_else(|| username.clone());
                tracing::info!("Signed in as {}", name);
            }
            Err(e) => {
                tracing::error!("Sign-in failed: {}", e);
                tracing::warn!("Continuing without authentication");
            }
        }
    }

    if config.list_categories {
        let categories = catalog.list_categories().await?;
        println!("{}", serde_json::to_string_pretty(&categories)?);
        return Ok(());
    }

    let page = catalog.query_cached(&config.filter).await?;
    tracing::info!(
        "Fetched {} of {} products (skip {})",
        page.products.len(),
        page.total,
        page.skip
    );
    println!("{}", serde_json::to_string_pretty(&page)?);

    if config.add_first_to_cart {
        add_first_to_cart(&config, &auth_manager, &page.products).await?;
    }

    Ok(())
}

/// Add the first listed product to the cart file, behind the cart route guard
async fn add_first_to_cart(
    config: &Config,
    auth_manager: &AuthManager,
    products: &[catalog_client::catalog::Product],
) -> Result<()> {
    let route = navigation::resolve("/cart").context("Cart route is not registered")?;
    if let Navigation::Redirect { to, redirect } =
        navigation::guard(route, "/cart", auth_manager.is_authenticated().await)
    {
        anyhow::bail!("Sign in required for {} (redirect to {})", redirect, to);
    }

    let Some(product) = products.first() else {
        tracing::warn!("No products to add to the cart");
        return Ok(());
    };

    let path = config
        .cart_file
        .as_deref()
        .context("CART_FILE is not configured")?;
    let mut cart = Cart::load(path)?;
    cart.add(CartItem::from_product(product, 1), 1);
    cart.save(path)?;

    tracing::info!(
        "Added '{}' to cart ({} items, total {:.2})",
        product.title,
        cart.total_quantity(),
        cart.discounted_total()
    );
    Ok(())
}
