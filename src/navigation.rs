// Route table and authentication guard

/// A named application route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub name: &'static str,
    pub path: &'static str,
    pub requires_auth: bool,
    pub hide_layout: bool,
}

pub const LOGIN: &str = "login";

pub const ROUTES: &[Route] = &[
    Route {
        name: LOGIN,
        path: "/login",
        requires_auth: false,
        hide_layout: false,
    },
    Route {
        name: "home",
        path: "/",
        requires_auth: false,
        hide_layout: false,
    },
    Route {
        name: "product-detail",
        path: "/products/:id",
        requires_auth: false,
        hide_layout: false,
    },
    Route {
        name: "products",
        path: "/products",
        requires_auth: false,
        hide_layout: false,
    },
    Route {
        name: "coming-soon",
        path: "/coming-soon",
        requires_auth: false,
        hide_layout: false,
    },
    Route {
        name: "cart",
        path: "/cart",
        requires_auth: true,
        hide_layout: false,
    },
];

/// Guard decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Proceed,
    /// Send the user to the login route, remembering where they were going
    Redirect { to: &'static str, redirect: String },
}

/// Find the route for a path; `:param` segments match any non-empty segment
pub fn resolve(path: &str) -> Option<&'static Route> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    ROUTES.iter().find(|route| matches(route.path, path))
}

fn matches(pattern: &str, path: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    pattern.len() == path.len()
        && pattern
            .iter()
            .zip(&path)
            .all(|(p, s)| p.starts_with(':') || p == s)
}

/// Decide whether navigation to `full_path` may proceed
pub fn guard(route: &Route, full_path: &str, is_authenticated: bool) -> Navigation {
    if route.requires_auth && !is_authenticated {
        tracing::debug!(route = route.name, "Redirecting unauthenticated user to login");
        Navigation::Redirect {
            to: LOGIN,
            redirect: full_path.to_string(),
        }
    } else {
        Navigation::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        assert_eq!(resolve("/").unwrap().name, "home");
        assert_eq!(resolve("/products").unwrap().name, "products");
        assert_eq!(resolve("/products/42").unwrap().name, "product-detail");
        assert_eq!(resolve("/cart?coupon=x").unwrap().name, "cart");
        assert!(resolve("/products/42/reviews").is_none());
        assert!(resolve("/unknown").is_none());
    }

    #[test]
    fn test_guard_redirects_when_signed_out() {
        let cart = resolve("/cart").unwrap();
        assert_eq!(
            guard(cart, "/cart?step=2", false),
            Navigation::Redirect {
                to: "login",
                redirect: "/cart?step=2".to_string()
            }
        );
        assert_eq!(guard(cart, "/cart", true), Navigation::Proceed);
    }

    #[test]
    fn test_public_routes_always_proceed() {
        let products = resolve("/products").unwrap();
        assert_eq!(guard(products, "/products", false), Navigation::Proceed);
    }
}
