//! Axum + Askama listing pages for Rentverse.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use askama::Template;
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rentverse_core::{FurnishedFilter, PropertyRecord, PropertyType, TypeFilter};
use rentverse_search::{
    Criterion, FilterParams, ListingOutcome, ListingView, LoadState, ProfileError, ProfileRegistry,
    PropertyFeed, ViewProfile,
};
use rentverse_storage::{
    ClientConfig, HttpPropertySource, ListingSource, PropertyClient, PropertySource,
};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{info, warn};

pub const CRATE_NAME: &str = "rentverse-web";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub web_port: u16,
    pub view: String,
    pub views_file: Option<PathBuf>,
    pub snapshot_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            api_base_url: std::env::var("RENTVERSE_API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000/api".to_string()),
            api_token: std::env::var("RENTVERSE_API_TOKEN")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            http_timeout_secs: std::env::var("RENTVERSE_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            user_agent: std::env::var("RENTVERSE_USER_AGENT")
                .unwrap_or_else(|_| "rentverse-search/0.1".to_string()),
            web_port: std::env::var("RENTVERSE_WEB_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            view: std::env::var("RENTVERSE_VIEW").unwrap_or_else(|_| "guest".to_string()),
            views_file: std::env::var("RENTVERSE_VIEWS_FILE").ok().map(PathBuf::from),
            snapshot_dir: std::env::var("RENTVERSE_SNAPSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./snapshots")),
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api_base_url.clone(),
            timeout: Duration::from_secs(self.http_timeout_secs),
            user_agent: Some(self.user_agent.clone()),
            bearer_token: self.api_token.clone(),
        }
    }

    pub fn profiles(&self) -> Result<ProfileRegistry, ProfileError> {
        match &self.views_file {
            Some(path) => ProfileRegistry::load(path),
            None => Ok(ProfileRegistry::builtin()),
        }
    }

    pub fn profile(&self) -> Result<ViewProfile, ProfileError> {
        self.profiles()?.require(&self.view).cloned()
    }

    /// Tenant listings need a token; every other view reads the public list.
    pub fn listing_source(&self) -> ListingSource {
        if self.view == "tenant" {
            ListingSource::Tenant
        } else {
            ListingSource::Guest
        }
    }
}

pub struct AppState {
    profile: ViewProfile,
    source: Arc<dyn PropertySource>,
    feed: RwLock<PropertyFeed>,
}

impl AppState {
    pub fn new(profile: ViewProfile, source: Arc<dyn PropertySource>) -> Self {
        Self {
            profile,
            source,
            feed: RwLock::new(PropertyFeed::new()),
        }
    }

    pub fn profile(&self) -> &ViewProfile {
        &self.profile
    }

    /// Fetch the raw collection once. Overlapping refreshes resolve to the
    /// most recently started one.
    pub async fn refresh(&self) -> bool {
        let ticket = self.feed.write().await.begin_fetch();
        let result = self
            .source
            .list_properties()
            .await
            .map_err(|err| err.user_message());
        let installed = self.feed.write().await.complete_fetch(ticket, result);
        if installed {
            info!(source = self.source.source_id(), "property feed refreshed");
        }
        installed
    }

    async fn view_for(&self, params: &FilterParams) -> ListingView {
        let feed = self.feed.read().await.clone();
        let mut view = ListingView::with_feed(self.profile.clone(), feed);
        view.set_criteria(params.to_criteria(&self.profile));
        if let Some(page) = params.page() {
            view.go_to_page(page);
        }
        view
    }
}

#[derive(Debug, Clone)]
struct PropertyCard {
    id: String,
    name: String,
    type_label: String,
    price: String,
    rooms: u32,
    size: String,
    furnished_label: &'static str,
    address: String,
    image_url: String,
    summary: String,
}

impl PropertyCard {
    fn from_record(record: &PropertyRecord) -> Self {
        let name = if record.name.trim().is_empty() {
            "Unnamed Property".to_string()
        } else {
            record.name.clone()
        };
        let summary = if record.description.is_empty() {
            "No description available".to_string()
        } else if record.description.chars().count() > 80 {
            format!("{}...", record.description.chars().take(80).collect::<String>())
        } else {
            record.description.clone()
        };
        Self {
            id: record.id.clone(),
            name,
            type_label: record.property_type.to_string(),
            price: format!("MYR {:.0}", record.price),
            rooms: record.number_of_rooms,
            size: format!("{:.0} m²", record.size),
            furnished_label: if record.furnished { "Furnished" } else { "Unfurnished" },
            address: record
                .address
                .as_ref()
                .map(|a| a.display_line())
                .unwrap_or_default(),
            image_url: record
                .cover_image()
                .map(|img| img.url.clone())
                .unwrap_or_else(|| "/placeholder-image.jpg".to_string()),
            summary,
        }
    }
}

#[derive(Debug, Clone)]
struct PageLink {
    number: usize,
    href: String,
    current: bool,
}

/// Flattened [`ListingOutcome`] for the templates. `status` is one of
/// `not_loaded`, `loading`, `failed`, `empty`, `page`.
#[derive(Debug, Clone)]
struct ListingPanel {
    status: &'static str,
    message: String,
    total_loaded: usize,
    cards: Vec<PropertyCard>,
    page: usize,
    total_pages: usize,
    total_matches: usize,
    prev_href: String,
    next_href: String,
    page_links: Vec<PageLink>,
    refresh_action: String,
}

impl ListingPanel {
    fn build(view: &ListingView) -> Self {
        let base = FilterParams::from_criteria(view.criteria(), None);
        let href = |page: usize| page_href(&base.clone().with_page(page));
        let mut panel = Self {
            status: "page",
            message: String::new(),
            total_loaded: view.feed().records().len(),
            cards: Vec::new(),
            page: view.current_page(),
            total_pages: 0,
            total_matches: 0,
            prev_href: String::new(),
            next_href: String::new(),
            page_links: Vec::new(),
            refresh_action: refresh_href(&base),
        };
        match view.outcome() {
            ListingOutcome::NotLoaded => panel.status = "not_loaded",
            ListingOutcome::Loading => panel.status = "loading",
            ListingOutcome::Failed { message } => {
                panel.status = "failed";
                panel.message = message.to_string();
            }
            ListingOutcome::NoMatches { total_loaded } => {
                panel.status = "empty";
                panel.total_loaded = total_loaded;
            }
            ListingOutcome::Page(page) => {
                panel.cards = page.items.iter().map(|r| PropertyCard::from_record(r)).collect();
                panel.page = page.page;
                panel.total_pages = page.total_pages;
                panel.total_matches = page.total_matches;
                if page.has_previous {
                    panel.prev_href = href(page.page - 1);
                }
                if page.has_next {
                    panel.next_href = href(page.page + 1);
                }
                panel.page_links = (1..=page.total_pages)
                    .map(|number| PageLink {
                        number,
                        href: href(number),
                        current: number == page.page,
                    })
                    .collect();
            }
        }
        panel
    }
}

fn page_href(params: &FilterParams) -> String {
    let query = params.to_query_string();
    if query.is_empty() {
        "/properties".to_string()
    } else {
        format!("/properties?{query}")
    }
}

fn refresh_href(params: &FilterParams) -> String {
    let query = params.to_query_string();
    if query.is_empty() {
        "/properties/refresh".to_string()
    } else {
        format!("/properties/refresh?{query}")
    }
}

#[derive(Debug, Clone)]
struct TypeButton {
    label: String,
    href: String,
    selected: bool,
}

/// Current form values, echoed back into the filter inputs.
#[derive(Debug, Clone)]
struct FilterForm {
    location: String,
    min_price: String,
    max_price: String,
    min_rooms: String,
    min_size: String,
    furnished: &'static str,
    show_location: bool,
    show_min_price: bool,
    show_max_price: bool,
    show_min_rooms: bool,
    show_min_size: bool,
    show_furnished: bool,
    show_clear: bool,
}

impl FilterForm {
    fn build(view: &ListingView) -> Self {
        let params = FilterParams::from_criteria(view.criteria(), None);
        let profile = view.profile();
        Self {
            location: view.criteria().location_text.clone(),
            min_price: params.min_price.unwrap_or_default(),
            max_price: params.max_price.unwrap_or_default(),
            min_rooms: params.min_rooms.unwrap_or_default(),
            min_size: params.min_size.unwrap_or_default(),
            furnished: view.criteria().furnished.as_query_value().unwrap_or(""),
            show_location: profile.exposes(Criterion::Location),
            show_min_price: profile.exposes(Criterion::MinPrice),
            show_max_price: profile.exposes(Criterion::MaxPrice),
            show_min_rooms: profile.exposes(Criterion::MinRooms),
            show_min_size: profile.exposes(Criterion::MinSize),
            show_furnished: profile.exposes(Criterion::Furnished),
            show_clear: !view.active_criteria().is_empty(),
        }
    }

    fn furnished_options(&self) -> [(&'static str, &'static str, bool); 3] {
        let selected = self.furnished;
        [
            ("", "Any", selected.is_empty()),
            (
                FurnishedFilter::FurnishedOnly.as_query_value().unwrap_or_default(),
                "Furnished",
                selected == "furnished",
            ),
            (
                FurnishedFilter::UnfurnishedOnly.as_query_value().unwrap_or_default(),
                "Unfurnished",
                selected == "unfurnished",
            ),
        ]
    }
}

fn type_buttons(view: &ListingView) -> Vec<TypeButton> {
    if !view.profile().exposes(Criterion::PropertyType) {
        return Vec::new();
    }
    let current = &view.criteria().property_type;
    let mut buttons = vec![{
        let mut criteria = view.criteria().clone();
        criteria.property_type = TypeFilter::Any;
        TypeButton {
            label: "All".to_string(),
            href: page_href(&FilterParams::from_criteria(&criteria, None)),
            selected: !current.is_active(),
        }
    }];
    for ty in PropertyType::ALL {
        let filter = TypeFilter::Only(ty.clone());
        let mut criteria = view.criteria().clone();
        criteria.property_type = filter.clone();
        buttons.push(TypeButton {
            label: ty.to_string(),
            href: page_href(&FilterParams::from_criteria(&criteria, None)),
            selected: current == &filter,
        });
    }
    buttons
}

#[derive(Template)]
#[template(path = "properties.html")]
struct PropertiesPageTemplate {
    view_name: String,
    form: FilterForm,
    type_buttons: Vec<TypeButton>,
    panel: ListingPanel,
}

#[derive(Template)]
#[template(path = "properties_table_partial.html")]
struct PropertiesTablePartialTemplate {
    panel: ListingPanel,
}

#[derive(Template)]
#[template(path = "property_detail.html")]
struct PropertyDetailTemplate {
    card: PropertyCard,
    description: String,
    owner_line: String,
    status_label: String,
    image_urls: Vec<String>,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/healthz", get(healthz_handler))
        .route("/properties", get(properties_page_handler))
        .route("/properties/table", get(properties_table_handler))
        .route("/properties/refresh", post(properties_refresh_handler))
        .route("/properties/{id}", get(property_detail_handler))
        .with_state(state)
}

pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let profile = config.profile()?;
    let client = PropertyClient::new(config.client_config())?;
    let source = Arc::new(HttpPropertySource::new(client, config.listing_source()));
    let state = Arc::new(AppState::new(profile, source));

    let initial = state.clone();
    tokio::spawn(async move {
        initial.refresh().await;
    });

    let listener = TcpListener::bind(("0.0.0.0", config.web_port)).await?;
    info!(port = config.web_port, view = %config.view, "serving listing pages");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    serve(AppConfig::from_env()).await
}

async fn index_handler() -> Response {
    (StatusCode::SEE_OTHER, [(header::LOCATION, "/properties")]).into_response()
}

async fn healthz_handler(State(state): State<Arc<AppState>>) -> Response {
    let feed = match state.feed.read().await.state() {
        LoadState::NotLoaded => "not_loaded",
        LoadState::Loading => "loading",
        LoadState::Failed(_) => "failed",
        LoadState::Loaded(_) => "loaded",
    };
    Json(serde_json::json!({
        "status": "ok",
        "view": state.profile.name,
        "feed": feed,
    }))
    .into_response()
}

async fn properties_page_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilterParams>,
) -> Response {
    let view = state.view_for(&params).await;
    render_html(PropertiesPageTemplate {
        view_name: state.profile.name.clone(),
        form: FilterForm::build(&view),
        type_buttons: type_buttons(&view),
        panel: ListingPanel::build(&view),
    })
}

async fn properties_table_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilterParams>,
) -> Response {
    let view = state.view_for(&params).await;
    render_table(&view)
}

async fn properties_refresh_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilterParams>,
) -> Response {
    if !state.refresh().await {
        warn!("refresh superseded by a newer fetch");
    }
    let view = state.view_for(&params).await;
    render_table(&view)
}

async fn property_detail_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
) -> Response {
    let feed = state.feed.read().await.clone();
    let Some(record) = feed.records().iter().find(|r| r.id == id) else {
        return (StatusCode::NOT_FOUND, Html("Property not found".to_string())).into_response();
    };
    let owner_line = record
        .owner
        .as_ref()
        .map(|o| format!("{} <{}>", o.name, o.email))
        .unwrap_or_else(|| "unknown".to_string());
    render_html(PropertyDetailTemplate {
        card: PropertyCard::from_record(record),
        description: record.description.clone(),
        owner_line,
        status_label: record
            .status
            .map(|s| format!("{s:?}"))
            .unwrap_or_else(|| "n/a".to_string()),
        image_urls: record.images.iter().map(|img| img.url.clone()).collect(),
    })
}

fn render_table(view: &ListingView) -> Response {
    let mut resp = render_html(PropertiesTablePartialTemplate {
        panel: ListingPanel::build(view),
    });
    resp.headers_mut().insert(
        header::HeaderName::from_static("hx-trigger"),
        header::HeaderValue::from_static("propertiesTableLoaded"),
    );
    resp
}

fn render_html<T: Template>(tpl: T) -> Response {
    match tpl.render() {
        Ok(html) => Html(html).into_response(),
        Err(err) => server_error(anyhow::anyhow!(err.to_string())),
    }
}

fn server_error(err: anyhow::Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(format!("Server error: {}", err)),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use rentverse_core::Address;
    use rentverse_storage::FetchError;
    use tower::ServiceExt;

    struct StaticSource(Result<Vec<PropertyRecord>, String>);

    #[async_trait]
    impl PropertySource for StaticSource {
        fn source_id(&self) -> &str {
            "static"
        }

        async fn list_properties(&self) -> Result<Vec<PropertyRecord>, FetchError> {
            self.0.clone().map_err(FetchError::Rejected)
        }
    }

    fn listing(id: usize, property_type: PropertyType, price: f64, area: &str) -> PropertyRecord {
        PropertyRecord {
            id: format!("p-{id}"),
            name: format!("Residence {id}"),
            property_type,
            number_of_rooms: 3,
            size: 90.0,
            price,
            furnished: id % 2 == 0,
            description: "Close to the ferry terminal".into(),
            address: Some(Address {
                area: area.into(),
                town: "Penang".into(),
                state: "Penang".into(),
                country: "Malaysia".into(),
                ..Default::default()
            }),
            images: vec![],
            owner: None,
            confidence_score: Some(90.0),
            status: None,
            owner_id: None,
            address_id: None,
            ownership_certificate_url: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn sample() -> Vec<PropertyRecord> {
        let mut out = Vec::new();
        for i in 1..=8 {
            out.push(listing(i, PropertyType::Condo, 1000.0 + i as f64, "George Town"));
        }
        out.push(listing(9, PropertyType::House, 4000.0, "Bayan Lepas"));
        out
    }

    async fn state_with(result: Result<Vec<PropertyRecord>, String>, load: bool) -> Arc<AppState> {
        let state = Arc::new(AppState::new(ViewProfile::guest(), Arc::new(StaticSource(result))));
        if load {
            state.refresh().await;
        }
        state
    }

    async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
        let resp = app
            .oneshot(axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn handler_smoke_listing_page() {
        let app = app(state_with(Ok(sample()), true).await);
        let (status, text) = get_text(app, "/properties").await;
        assert_eq!(status, StatusCode::OK);
        assert!(text.contains("Showing 9 properties"));
        assert!(text.contains("Residence 1"));
        assert!(!text.contains("Residence 7"));
        assert!(text.contains("Page 1 of 2"));
    }

    #[tokio::test]
    async fn type_and_location_params_seed_filters() {
        let app = app(state_with(Ok(sample()), true).await);
        let (_, text) = get_text(app.clone(), "/properties/table?type=house").await;
        assert!(text.contains("Showing 1 properties"));
        assert!(text.contains("Residence 9"));

        let (_, text) = get_text(app, "/properties/table?location=GEORGE%20town&page=2").await;
        assert!(text.contains("Showing 8 properties"));
        assert!(text.contains("Residence 7"));
        assert!(text.contains("Page 2 of 2"));
    }

    #[tokio::test]
    async fn three_empty_states_render_differently() {
        let (_, not_loaded) = get_text(app(state_with(Ok(sample()), false).await), "/properties/table").await;
        assert!(not_loaded.contains("No properties loaded yet"));

        let (_, failed) = get_text(
            app(state_with(Err("Failed to fetch properties".into()), true).await),
            "/properties/table",
        )
        .await;
        assert!(failed.contains("Could not load properties"));
        assert!(failed.contains("Failed to fetch properties"));
        assert!(failed.contains("Retry"));

        let (_, empty) = get_text(
            app(state_with(Ok(sample()), true).await),
            "/properties/table?location=atlantis",
        )
        .await;
        assert!(empty.contains("No properties match your filters"));
    }

    #[tokio::test]
    async fn refresh_post_loads_feed() {
        let state = state_with(Ok(sample()), false).await;
        let app = app(state.clone());
        let resp = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/properties/refresh?type=condo")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["hx-trigger"], "propertiesTableLoaded");
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8(body.to_vec()).unwrap().contains("Showing 8 properties"));

        let (_, health) = get_text(app, "/healthz").await;
        let health: serde_json::Value = serde_json::from_str(&health).unwrap();
        assert_eq!(health["feed"], "loaded");
    }

    #[tokio::test]
    async fn detail_page_and_missing_property() {
        let app = app(state_with(Ok(sample()), true).await);
        let (status, text) = get_text(app.clone(), "/properties/p-9").await;
        assert_eq!(status, StatusCode::OK);
        assert!(text.contains("Residence 9"));
        assert!(text.contains("Bayan Lepas"));

        let (status, _) = get_text(app, "/properties/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_numbers_do_not_reject_request() {
        let app = app(state_with(Ok(sample()), true).await);
        let (status, text) = get_text(app, "/properties/table?max_price=lots&min_rooms=-2").await;
        assert_eq!(status, StatusCode::OK);
        assert!(text.contains("Showing 9 properties"));
    }
}
