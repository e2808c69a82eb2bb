use biometrics::{Collector, Counter, Moments};

pub(crate) static CHAT_REQUESTS: Counter = Counter::new("lochat.chat.requests");
pub(crate) static CHAT_REQUEST_ERRORS: Counter = Counter::new("lochat.chat.request_errors");
pub(crate) static CHAT_REQUEST_DURATION: Moments =
    Moments::new("lochat.chat.request_duration_seconds");

pub(crate) static CATALOG_REFRESHES: Counter = Counter::new("lochat.catalog.refreshes");
pub(crate) static CATALOG_ERRORS: Counter = Counter::new("lochat.catalog.errors");

pub(crate) static SESSION_SUBMITS: Counter = Counter::new("lochat.session.submits");
pub(crate) static SESSION_BUSY_REJECTIONS: Counter =
    Counter::new("lochat.session.busy_rejections");
pub(crate) static SESSION_RESETS: Counter = Counter::new("lochat.session.resets");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CHAT_REQUESTS);
    collector.register_counter(&CHAT_REQUEST_ERRORS);
    collector.register_moments(&CHAT_REQUEST_DURATION);

    collector.register_counter(&CATALOG_REFRESHES);
    collector.register_counter(&CATALOG_ERRORS);

    collector.register_counter(&SESSION_SUBMITS);
    collector.register_counter(&SESSION_BUSY_REJECTIONS);
    collector.register_counter(&SESSION_RESETS);
}
