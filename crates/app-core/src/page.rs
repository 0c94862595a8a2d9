//! Page surface
//!
//! The workflows only need a handful of DOM operations: look an element up
//! by id, toggle its visibility, set attributes and input values, replace
//! the children of the feed container, show a blocking notification and
//! navigate. [`Page`] names exactly those.

/// Elements the workflows touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementId {
    /// "Get started" call to action shown to signed-out visitors
    GetStarted,
    /// Profile picture in the header
    ProfilePicture,
    /// Link to the post editor
    CreatePostLink,
    /// Logout control
    Logout,
    /// Email input of the sign-in form
    EmailInput,
    /// Password input of the sign-in form
    PasswordInput,
    /// Title input of the post editor
    HeadingInput,
    /// Body input of the post editor
    ContentInput,
    /// Category input of the post editor
    CategoryInput,
    /// Container of the recent-post feed
    RecentPosts,
}

impl ElementId {
    /// Every element id
    pub const ALL: [ElementId; 10] = [
        ElementId::GetStarted,
        ElementId::ProfilePicture,
        ElementId::CreatePostLink,
        ElementId::Logout,
        ElementId::EmailInput,
        ElementId::PasswordInput,
        ElementId::HeadingInput,
        ElementId::ContentInput,
        ElementId::CategoryInput,
        ElementId::RecentPosts,
    ];

    /// The element's id attribute in the site's markup
    pub fn dom_id(&self) -> &'static str {
        match self {
            ElementId::GetStarted => "getStartedBtn",
            ElementId::ProfilePicture => "profilePic",
            ElementId::CreatePostLink => "createPostLink",
            ElementId::Logout => "logout",
            ElementId::EmailInput => "email",
            ElementId::PasswordInput => "password",
            ElementId::HeadingInput => "headingInput",
            ElementId::ContentInput => "contentInput",
            ElementId::CategoryInput => "categoryInput",
            ElementId::RecentPosts => "recentPostsContainer",
        }
    }
}

/// Pages of the site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Landing page with the feed
    Home,
    /// Sign-in / sign-up entry page
    Login,
    /// Post editor
    CreatePost,
}

impl Route {
    /// Path of the page on the site
    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/html/index.html",
            Route::Login => "/html/login.html",
            Route::CreatePost => "/html/create-post.html",
        }
    }
}

/// One rendered feed entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostCard {
    /// Post title
    pub title: String,
    /// Two-line preview
    pub preview: String,
    /// Estimated reading time in minutes
    pub reading_time: u32,
    /// Author email
    pub author: String,
}

/// Image shown as the profile picture once signed in
pub const PROFILE_IMAGE: &str = "../images/profile.jpg";

/// DOM operations used by the workflows
///
/// Operations on elements the page does not contain are ignored.
pub trait Page: Send + Sync {
    /// Whether the page contains the element
    fn has_element(&self, id: ElementId) -> bool;

    /// Show or hide an element
    fn set_visible(&self, id: ElementId, visible: bool);

    /// Set an attribute of an element
    fn set_attribute(&self, id: ElementId, name: &str, value: &str);

    /// Current value of an input element
    fn value(&self, id: ElementId) -> Option<String>;

    /// Set the value of an input element
    fn set_value(&self, id: ElementId, value: &str);

    /// Remove every child of an element
    fn clear_children(&self, id: ElementId);

    /// Append a post card to a container
    fn append_post_card(&self, id: ElementId, card: &PostCard);

    /// Show a blocking notification
    fn alert(&self, message: &str);

    /// Navigate to another page
    fn navigate(&self, route: Route);

    /// Reload the current page
    fn reload(&self);

    /// The page currently shown
    fn current_route(&self) -> Route;
}

/// Switch the header to its signed-in state
pub fn show_signed_in(page: &dyn Page) {
    page.set_visible(ElementId::GetStarted, false);
    page.set_visible(ElementId::CreatePostLink, true);
    page.set_attribute(ElementId::ProfilePicture, "src", PROFILE_IMAGE);
    page.set_visible(ElementId::Logout, true);
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording page for unit tests

    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Debug, Default)]
    pub struct PageLog {
        pub visible: HashMap<ElementId, bool>,
        pub attributes: HashMap<(ElementId, String), String>,
        pub values: HashMap<ElementId, String>,
        pub cards: Vec<PostCard>,
        pub alerts: Vec<String>,
        pub navigations: Vec<Route>,
        pub reloads: usize,
    }

    /// Page with every element present, recording each call
    pub struct RecordingPage {
        pub route: Route,
        pub missing: Vec<ElementId>,
        pub log: Mutex<PageLog>,
    }

    impl RecordingPage {
        pub fn new(route: Route) -> Self {
            Self { route, missing: Vec::new(), log: Mutex::new(PageLog::default()) }
        }

        pub fn without(mut self, id: ElementId) -> Self {
            self.missing.push(id);
            self
        }

        pub fn fill(&self, id: ElementId, value: &str) {
            self.log.lock().values.insert(id, value.to_string());
        }

        pub fn alerts(&self) -> Vec<String> {
            self.log.lock().alerts.clone()
        }

        pub fn is_visible(&self, id: ElementId) -> Option<bool> {
            self.log.lock().visible.get(&id).copied()
        }
    }

    impl Page for RecordingPage {
        fn has_element(&self, id: ElementId) -> bool {
            !self.missing.contains(&id)
        }

        fn set_visible(&self, id: ElementId, visible: bool) {
            self.log.lock().visible.insert(id, visible);
        }

        fn set_attribute(&self, id: ElementId, name: &str, value: &str) {
            self.log.lock().attributes.insert((id, name.to_string()), value.to_string());
        }

        fn value(&self, id: ElementId) -> Option<String> {
            self.log.lock().values.get(&id).cloned()
        }

        fn set_value(&self, id: ElementId, value: &str) {
            self.log.lock().values.insert(id, value.to_string());
        }

        fn clear_children(&self, _id: ElementId) {
            self.log.lock().cards.clear();
        }

        fn append_post_card(&self, _id: ElementId, card: &PostCard) {
            self.log.lock().cards.push(card.clone());
        }

        fn alert(&self, message: &str) {
            self.log.lock().alerts.push(message.to_string());
        }

        fn navigate(&self, route: Route) {
            self.log.lock().navigations.push(route);
        }

        fn reload(&self) {
            self.log.lock().reloads += 1;
        }

        fn current_route(&self) -> Route {
            self.route
        }
    }
}
