//! Headless page
//!
//! An in-memory model of the site's pages. Each route has a fixed layout of
//! elements; workflows mutate element state through [`Page`], and every
//! notification, navigation and reload is recorded so callers can inspect
//! what a user would have seen.

use app_core::{ElementId, Page, PostCard, Route};
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::render::post_card_element;

/// Elements present on each page
pub fn layout(route: Route) -> &'static [ElementId] {
    match route {
        Route::Home => &[
            ElementId::GetStarted,
            ElementId::ProfilePicture,
            ElementId::CreatePostLink,
            ElementId::Logout,
            ElementId::RecentPosts,
        ],
        Route::Login => &[ElementId::EmailInput, ElementId::PasswordInput],
        Route::CreatePost => &[
            ElementId::GetStarted,
            ElementId::ProfilePicture,
            ElementId::CreatePostLink,
            ElementId::Logout,
            ElementId::HeadingInput,
            ElementId::ContentInput,
            ElementId::CategoryInput,
        ],
    }
}

/// State of one element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementState {
    /// Whether the element is shown
    pub visible: bool,
    /// Attributes set on the element
    pub attributes: HashMap<String, String>,
    /// Input value
    pub value: String,
    /// Child markup, in order
    pub children: Vec<String>,
}

impl ElementState {
    fn new(id: ElementId) -> Self {
        // Signed-in controls start hidden
        let visible = !matches!(id, ElementId::CreatePostLink | ElementId::Logout);
        Self {
            visible,
            attributes: HashMap::new(),
            value: String::new(),
            children: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct PageState {
    route: Route,
    elements: HashMap<ElementId, ElementState>,
    alerts: Vec<String>,
    navigations: Vec<Route>,
    reloads: usize,
}

impl PageState {
    fn load(route: Route) -> Self {
        Self {
            route,
            elements: layout(route).iter().map(|&id| (id, ElementState::new(id))).collect(),
            alerts: Vec::new(),
            navigations: Vec::new(),
            reloads: 0,
        }
    }
}

/// In-memory page implementing [`Page`]
#[derive(Debug)]
pub struct HeadlessPage {
    state: RwLock<PageState>,
}

impl HeadlessPage {
    /// Load a page with its initial layout
    pub fn new(route: Route) -> Self {
        tracing::debug!("Loading {}", route.path());
        Self { state: RwLock::new(PageState::load(route)) }
    }

    /// Type into an input, as a user would
    pub fn type_into(&self, id: ElementId, text: &str) {
        self.set_value(id, text);
    }

    /// Snapshot of an element's state
    pub fn element(&self, id: ElementId) -> Option<ElementState> {
        self.state.read().elements.get(&id).cloned()
    }

    /// Whether an element is shown; `None` if the page lacks it
    pub fn is_visible(&self, id: ElementId) -> Option<bool> {
        self.state.read().elements.get(&id).map(|e| e.visible)
    }

    /// Attribute of an element
    pub fn attribute(&self, id: ElementId, name: &str) -> Option<String> {
        self.state
            .read()
            .elements
            .get(&id)
            .and_then(|e| e.attributes.get(name).cloned())
    }

    /// Child markup of an element
    pub fn children(&self, id: ElementId) -> Vec<String> {
        self.state
            .read()
            .elements
            .get(&id)
            .map(|e| e.children.clone())
            .unwrap_or_default()
    }

    /// Notifications shown so far
    pub fn alerts(&self) -> Vec<String> {
        self.state.read().alerts.clone()
    }

    /// Most recent notification
    pub fn last_alert(&self) -> Option<String> {
        self.state.read().alerts.last().cloned()
    }

    /// Navigations requested so far
    pub fn navigations(&self) -> Vec<Route> {
        self.state.read().navigations.clone()
    }

    /// Number of reloads requested
    pub fn reloads(&self) -> usize {
        self.state.read().reloads
    }

    fn with_element(&self, id: ElementId, f: impl FnOnce(&mut ElementState)) {
        let mut state = self.state.write();
        match state.elements.get_mut(&id) {
            Some(element) => f(element),
            None => tracing::debug!("No #{} on {}", id.dom_id(), state.route.path()),
        }
    }
}

impl Page for HeadlessPage {
    fn has_element(&self, id: ElementId) -> bool {
        self.state.read().elements.contains_key(&id)
    }

    fn set_visible(&self, id: ElementId, visible: bool) {
        self.with_element(id, |e| e.visible = visible);
    }

    fn set_attribute(&self, id: ElementId, name: &str, value: &str) {
        self.with_element(id, |e| {
            e.attributes.insert(name.to_string(), value.to_string());
        });
    }

    fn value(&self, id: ElementId) -> Option<String> {
        self.state.read().elements.get(&id).map(|e| e.value.clone())
    }

    fn set_value(&self, id: ElementId, value: &str) {
        self.with_element(id, |e| e.value = value.to_string());
    }

    fn clear_children(&self, id: ElementId) {
        self.with_element(id, |e| e.children.clear());
    }

    fn append_post_card(&self, id: ElementId, card: &PostCard) {
        let markup = post_card_element(card);
        self.with_element(id, |e| e.children.push(markup));
    }

    fn alert(&self, message: &str) {
        tracing::debug!("alert: {}", message);
        self.state.write().alerts.push(message.to_string());
    }

    fn navigate(&self, route: Route) {
        let mut state = self.state.write();
        state.navigations.push(route);
        state.route = route;
    }

    fn reload(&self) {
        let mut state = self.state.write();
        let route = state.route;
        let alerts = std::mem::take(&mut state.alerts);
        let navigations = std::mem::take(&mut state.navigations);
        let reloads = state.reloads + 1;

        *state = PageState::load(route);
        state.alerts = alerts;
        state.navigations = navigations;
        state.reloads = reloads;
    }

    fn current_route(&self) -> Route {
        self.state.read().route
    }
}
