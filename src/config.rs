use std::env;

/// AuthorizeConfig
///
/// Everything the authorization layer and its host read from the environment.
/// Loaded once at startup and cloned into the shared state afterwards.
#[derive(Clone, Debug)]
pub struct AuthorizeConfig {
    // Runtime environment marker. Controls the local `x-user-id` login bypass.
    pub env: Env,
    // Secret used to validate bearer tokens.
    pub jwt_secret: String,
    // Where unauthenticated callers are sent; the return url is appended as `r`.
    pub login_url: String,
    // Namespaces of the managed area, authorized by default.
    pub managed_areas: Vec<String>,
    // View name handed to the renderer when access is denied.
    pub forbidden_view: String,
    // Listen address of the hosting binary.
    pub bind_addr: String,
}

/// Env
///
/// Switches between development conveniences and the hardened production setup.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";
const DEFAULT_LOGIN_URL: &str = "/Admin/User/Login";
const DEFAULT_FORBIDDEN_VIEW: &str = "NoPermission";
const DEFAULT_MANAGED_AREA: &str = "Cube.Areas.Admin";

impl Default for AuthorizeConfig {
    /// Non-panicking values for test scaffolding.
    fn default() -> Self {
        Self {
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            login_url: DEFAULT_LOGIN_URL.to_string(),
            managed_areas: vec![DEFAULT_MANAGED_AREA.to_string()],
            forbidden_view: DEFAULT_FORBIDDEN_VIEW.to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl AuthorizeConfig {
    /// load
    ///
    /// Reads the configuration from environment variables.
    ///
    /// # Panics
    /// Panics in production when `JWT_SECRET` is not set, so the service never
    /// starts validating tokens against a well-known secret.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = match env {
            Env::Production => {
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production.")
            }
            Env::Local => env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
        };

        let managed_areas = env::var("MANAGED_AREAS")
            .map(|v| parse_list(&v))
            .unwrap_or_else(|_| vec![DEFAULT_MANAGED_AREA.to_string()]);

        Self {
            env,
            jwt_secret,
            login_url: env::var("LOGIN_URL").unwrap_or_else(|_| DEFAULT_LOGIN_URL.to_string()),
            managed_areas,
            forbidden_view: env::var("FORBIDDEN_VIEW")
                .unwrap_or_else(|_| DEFAULT_FORBIDDEN_VIEW.to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        }
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
