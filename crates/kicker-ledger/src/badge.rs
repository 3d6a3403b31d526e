//! Unread badge propagation.
//!
//! The device-visible surfaces (tab title, platform application badge, and a
//! cooperating background worker) are one injected [`NotificationSurface`]
//! with an explicit lifecycle. [`BadgeSync`] owns it and pushes a count only
//! when it changes.

/// Device-visible unread surfaces.
///
/// Implementations are best-effort: a missing platform badge API or a worker
/// that is not running is silently skipped.
pub trait NotificationSurface {
    /// Acquire the surfaces.
    fn init(&mut self);

    /// Show `count` unread items; `title` is the formatted document title.
    fn update(&mut self, count: u64, title: &str);

    /// Tell a background worker about the new count.
    fn notify_worker(&mut self, count: u64);

    /// Release the surfaces.
    fn teardown(&mut self);
}

/// Document title for an unread count: `"(N) AppName"`, or just the app name
/// when nothing is unread.
pub fn badge_title(app_name: &str, count: u64) -> String {
    if count == 0 { app_name.to_string() } else { format!("({count}) {app_name}") }
}

/// Keeps a [`NotificationSurface`] in step with the unread count.
#[derive(Debug)]
pub struct BadgeSync<S: NotificationSurface> {
    surface: S,
    app_name: String,
    count: Option<u64>,
    active: bool,
}

impl<S: NotificationSurface> BadgeSync<S> {
    /// Wrap a surface. Nothing is touched until [`BadgeSync::init`].
    pub fn new(surface: S, app_name: impl Into<String>) -> Self {
        Self { surface, app_name: app_name.into(), count: None, active: false }
    }

    /// Initialise the surface.
    pub fn init(&mut self) {
        if !self.active {
            self.surface.init();
            self.active = true;
        }
    }

    /// Last count pushed to the surface.
    pub fn count(&self) -> Option<u64> {
        self.count
    }

    /// Borrow the surface.
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Push a new unread count. Returns false when nothing changed or the
    /// surface is not initialised.
    pub fn set_count(&mut self, count: u64) -> bool {
        if !self.active || self.count == Some(count) {
            return false;
        }
        let title = badge_title(&self.app_name, count);
        tracing::debug!(count, %title, "updating unread badge");
        self.surface.update(count, &title);
        self.surface.notify_worker(count);
        self.count = Some(count);
        true
    }

    /// Release the surface.
    pub fn teardown(&mut self) {
        if self.active {
            self.surface.teardown();
            self.active = false;
            self.count = None;
        }
    }
}
